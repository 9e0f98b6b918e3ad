// Copyright 2026 the Tessera Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Bounded buffer pools with deferred release.
//!
//! A [`BufferPool`] owns one surface's [`BufferSource`] and tracks every image
//! it has handed out as an outstanding [`Buffer`]. Outstanding buffers form a
//! FIFO: when the pool is at its pressure threshold
//! ([`PoolConfig::pressure_threshold`]) the oldest one is reclaimed as the
//! next image is taken over, so the source never has more than
//! [`PoolConfig::max_outstanding`] images out.
//!
//! Releasing a buffer does not always reclaim it immediately. A pool whose
//! historical peak stayed below [`PoolConfig::keep_open`] and which is not
//! under pressure holds the image for [`PoolConfig::release_delay_ticks`]
//! host ticks first. This keeps cheap, short-lived images from thrashing
//! while still bounding memory under sustained load.

use std::collections::VecDeque;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::backend::{BufferSource, SourceSpec};
use crate::buffer::{Buffer, BufferId, ImageHandle, SurfaceId};
use crate::config::PoolConfig;
use crate::error::{Error, Result};
use crate::region::RegionId;
use crate::trace::{BufferReclaimedEvent, ReclaimReason, ReleaseDeferredEvent, Tracer};

/// Bounded set of outstanding buffers for one surface.
///
/// Cloning the pool clones the handle; all clones share the same state.
#[derive(Clone, Debug)]
pub struct BufferPool {
    shared: Arc<PoolShared>,
}

pub(crate) struct PoolShared {
    surface: SurfaceId,
    region: RegionId,
    size: (i32, i32),
    config: PoolConfig,
    tracer: Tracer,
    state: Mutex<PoolState>,
}

struct PoolState {
    source: Box<dyn BufferSource>,
    outstanding: VecDeque<Outstanding>,
    deferred: Vec<Deferred>,
    peak: usize,
    next_id: u64,
    closed: bool,
}

#[derive(Clone, Copy, Debug)]
struct Outstanding {
    id: BufferId,
    image: ImageHandle,
}

#[derive(Clone, Copy, Debug)]
struct Deferred {
    id: BufferId,
    ticks_left: u32,
}

impl BufferPool {
    /// Creates a pool around `source`, which was built for `spec`.
    #[must_use]
    pub fn new(
        spec: &SourceSpec,
        source: Box<dyn BufferSource>,
        config: PoolConfig,
        tracer: Tracer,
    ) -> Self {
        let config = config.sanitized();
        Self {
            shared: Arc::new(PoolShared {
                surface: spec.surface,
                region: spec.region,
                size: (spec.width, spec.height),
                config,
                tracer,
                state: Mutex::new(PoolState {
                    source,
                    outstanding: VecDeque::with_capacity(config.max_outstanding),
                    deferred: Vec::new(),
                    peak: 0,
                    next_id: 0,
                    closed: false,
                }),
            }),
        }
    }

    /// The surface this pool serves.
    #[must_use]
    pub fn surface(&self) -> SurfaceId {
        self.shared.surface
    }

    /// The region the surface renders.
    #[must_use]
    pub fn region(&self) -> RegionId {
        self.shared.region
    }

    /// Surface size in pixels.
    #[must_use]
    pub fn size(&self) -> (i32, i32) {
        self.shared.size
    }

    /// The retention policy in effect (after sanitizing).
    #[must_use]
    pub fn config(&self) -> PoolConfig {
        self.shared.config
    }

    /// Number of buffers handed out and not yet reclaimed, including those
    /// whose release is deferred.
    #[must_use]
    pub fn outstanding(&self) -> usize {
        self.shared.state.lock().outstanding.len()
    }

    /// Highest outstanding count ever observed.
    #[must_use]
    pub fn peak(&self) -> usize {
        self.shared.state.lock().peak
    }

    /// Number of releases waiting for their delay to elapse.
    #[must_use]
    pub fn deferred(&self) -> usize {
        self.shared.state.lock().deferred.len()
    }

    /// Whether the pool has been closed.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.shared.state.lock().closed
    }

    /// Drains every image the source currently has available.
    ///
    /// For each image taken over, a pool at its pressure threshold first
    /// reclaims its oldest outstanding buffer.
    ///
    /// # Errors
    ///
    /// Returns [`Error::PoolClosed`] if the pool has been closed.
    pub fn acquire_available(&self) -> Result<Vec<Buffer>> {
        let shared = &self.shared;
        let threshold = shared.config.pressure_threshold();
        let mut state = shared.state.lock();
        if state.closed {
            return Err(Error::PoolClosed(shared.surface));
        }

        let mut acquired = Vec::new();
        // The source holds at most `threshold + 1` images while one is being
        // taken over.
        while let Some(image) = state.source.acquire_next_buffer() {
            while state.outstanding.len() >= threshold {
                if let Some(id) = state.reclaim_at(0) {
                    shared.trace_reclaim(id, ReclaimReason::Pressure, state.outstanding.len());
                }
            }
            let id = BufferId(state.next_id);
            state.next_id += 1;
            state.outstanding.push_back(Outstanding {
                id,
                image: image.image,
            });
            state.peak = state.peak.max(state.outstanding.len());
            acquired.push(Buffer::new(id, image, Arc::clone(shared)));
        }
        Ok(acquired)
    }

    /// Advances deferred releases by one host tick, reclaiming those whose
    /// delay has elapsed.
    pub fn on_tick(&self) {
        let shared = &self.shared;
        let mut state = shared.state.lock();
        if state.closed || state.deferred.is_empty() {
            return;
        }
        let mut due = Vec::new();
        state.deferred.retain_mut(|d| {
            d.ticks_left = d.ticks_left.saturating_sub(1);
            if d.ticks_left == 0 {
                due.push(d.id);
                false
            } else {
                true
            }
        });
        for id in due {
            if let Some(index) = state.position(id) {
                state.reclaim_at(index);
                shared.trace_reclaim(id, ReclaimReason::DeferredRelease, state.outstanding.len());
            }
        }
    }

    /// Reclaims every outstanding buffer and closes the source.
    ///
    /// Buffers still held elsewhere become inert: dropping them later is a
    /// no-op. Closing twice is harmless.
    pub fn close(&self) {
        let shared = &self.shared;
        let mut state = shared.state.lock();
        if state.closed {
            return;
        }
        while let Some(entry) = state.outstanding.pop_front() {
            state.source.reclaim(entry.image);
            shared.trace_reclaim(entry.id, ReclaimReason::PoolClosed, state.outstanding.len());
        }
        state.deferred.clear();
        state.source.close();
        state.closed = true;
        tracing::debug!(surface = ?shared.surface, "buffer pool closed");
    }
}

impl PoolShared {
    pub(crate) fn surface(&self) -> SurfaceId {
        self.surface
    }

    pub(crate) fn region(&self) -> RegionId {
        self.region
    }

    pub(crate) fn is_reclaimed(&self, id: BufferId) -> bool {
        let state = self.state.lock();
        state.closed || state.position(id).is_none()
    }

    /// Applies a release request for `id`; called from [`Buffer`]'s `Drop`.
    pub(crate) fn release(&self, id: BufferId) {
        let mut state = self.state.lock();
        if state.closed {
            return;
        }
        // Already reclaimed under pressure.
        let Some(index) = state.position(id) else {
            return;
        };
        let config = &self.config;
        let lightly_loaded = state.peak < config.keep_open
            && state.outstanding.len() < config.pressure_threshold();
        if lightly_loaded && config.release_delay_ticks > 0 {
            state.deferred.push(Deferred {
                id,
                ticks_left: config.release_delay_ticks,
            });
            self.tracer.release_deferred(&ReleaseDeferredEvent {
                surface: self.surface,
                buffer: id,
                ticks: config.release_delay_ticks,
            });
        } else {
            state.reclaim_at(index);
            self.trace_reclaim(id, ReclaimReason::Released, state.outstanding.len());
        }
    }

    fn trace_reclaim(&self, buffer: BufferId, reason: ReclaimReason, outstanding: usize) {
        self.tracer.buffer_reclaimed(&BufferReclaimedEvent {
            surface: self.surface,
            buffer,
            reason,
            outstanding,
        });
    }
}

impl core::fmt::Debug for PoolShared {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("PoolShared")
            .field("surface", &self.surface)
            .field("region", &self.region)
            .field("size", &self.size)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl PoolState {
    fn position(&self, id: BufferId) -> Option<usize> {
        self.outstanding.iter().position(|o| o.id == id)
    }

    fn reclaim_at(&mut self, index: usize) -> Option<BufferId> {
        let entry = self.outstanding.remove(index)?;
        self.deferred.retain(|d| d.id != entry.id);
        self.source.reclaim(entry.image);
        Some(entry.id)
    }
}
