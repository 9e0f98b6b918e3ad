// Copyright 2026 the Tessera Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Surface identity and move-only buffer handles.
//!
//! A [`Buffer`] is the engine's handle to one rendered image that a pool has
//! handed out. It is neither `Clone` nor `Copy`: it moves from the pool to the
//! frame matcher, into a frame's region slot, through the compositor, and is
//! released when dropped. Because every buffer value exists exactly once,
//! double release and use after release cannot be expressed.

use core::fmt;
use std::sync::Arc;

use crate::pool::PoolShared;
use crate::region::RegionId;
use crate::time::Timestamp;

/// Identifies one allocated surface (one pool generation of a region).
///
/// Every allocation, including a resize of an existing region, gets a fresh
/// id, so notifications for a replaced surface can be told apart from the
/// current one.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SurfaceId(pub u32);

impl fmt::Debug for SurfaceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SurfaceId({})", self.0)
    }
}

/// Opaque reference to image content owned by a
/// [`BufferSource`](crate::backend::BufferSource).
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct ImageHandle(pub u64);

impl fmt::Debug for ImageHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ImageHandle({:#x})", self.0)
    }
}

/// An image as handed out by a buffer source.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct SourceImage {
    /// The image content.
    pub image: ImageHandle,
    /// When the producer acquired (finished rendering) the image.
    pub timestamp: Timestamp,
}

/// Per-pool sequence number of an acquired buffer.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct BufferId(pub u64);

/// A rendered image on loan from a [`BufferPool`](crate::pool::BufferPool).
///
/// Dropping the buffer (or calling [`release`](Self::release)) asks the pool
/// to reclaim it, subject to the pool's retention policy. If the pool already
/// reclaimed the image under pressure or was closed, the release is a no-op.
pub struct Buffer {
    id: BufferId,
    image: ImageHandle,
    timestamp: Timestamp,
    pool: Arc<PoolShared>,
}

impl Buffer {
    pub(crate) fn new(id: BufferId, image: SourceImage, pool: Arc<PoolShared>) -> Self {
        Self {
            id,
            image: image.image,
            timestamp: image.timestamp,
            pool,
        }
    }

    /// Pool-local sequence number.
    #[inline]
    #[must_use]
    pub fn id(&self) -> BufferId {
        self.id
    }

    /// The surface this buffer was acquired from.
    #[inline]
    #[must_use]
    pub fn surface(&self) -> SurfaceId {
        self.pool.surface()
    }

    /// The region the surface renders.
    #[inline]
    #[must_use]
    pub fn region(&self) -> RegionId {
        self.pool.region()
    }

    /// The image content.
    #[inline]
    #[must_use]
    pub fn image(&self) -> ImageHandle {
        self.image
    }

    /// The acquisition timestamp.
    #[inline]
    #[must_use]
    pub fn timestamp(&self) -> Timestamp {
        self.timestamp
    }

    /// Whether the pool has already taken the image back (under pressure or
    /// on close). A reclaimed buffer's image must not be presented.
    #[must_use]
    pub fn is_reclaimed(&self) -> bool {
        self.pool.is_reclaimed(self.id)
    }

    /// Releases the buffer back to its pool.
    pub fn release(self) {
        drop(self);
    }
}

impl Drop for Buffer {
    fn drop(&mut self) {
        self.pool.release(self.id);
    }
}

impl fmt::Debug for Buffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Buffer")
            .field("id", &self.id)
            .field("surface", &self.surface())
            .field("image", &self.image)
            .field("timestamp", &self.timestamp)
            .finish()
    }
}
