// Copyright 2026 the Tessera Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Collaborator contract for host integrations.
//!
//! The engine owns frame matching, readiness, and buffer lifecycles. Everything
//! platform-specific is supplied by the host through three seams:
//!
//! - **Buffer source**: Implements [`BufferSource`] for one surface: hands
//!   out rendered images with their acquisition timestamps and takes them back
//!   when the engine reclaims them. A [`SourceFactory`] builds one per surface
//!   from a [`SourceSpec`], with the allocation strategy fixed at engine
//!   construction.
//!
//! - **Presenter**: Implements [`Presenter`] to apply a reconciled frame to
//!   the platform's presentation tree (views, layers, DOM nodes).
//!
//! - **Tick scheduler**: Implements [`TickScheduler`] so the engine can ask
//!   for the next host tick when it has deferred work. The host's per-frame
//!   callback calls [`Engine::on_host_tick`](crate::engine::Engine::on_host_tick).
//!
//! # Frame loop pseudocode
//!
//! ```rust,ignore
//! // Raster thread: a new raster pass starts.
//! engine.register_frame(raster_start, &[RegionId::BASE, RegionId(3)])?;
//! engine.update_region(RegionId(3), raster_start, update)?;
//!
//! // Producer context: the source signals new content.
//! engine.on_buffer_produced(surface_id)?;
//!
//! // Host frame callback.
//! engine.on_host_tick()?;
//! ```

use crate::buffer::{ImageHandle, SourceImage, SurfaceId};
use crate::compositor::RegionChanges;
use crate::config::AllocationStrategy;
use crate::frame::Frame;
use crate::region::{RegionId, RegionKind};
use crate::scheduler::CancelToken;

/// Parameters for allocating one surface's buffer source.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct SourceSpec {
    /// Fresh id of the surface being allocated.
    pub surface: SurfaceId,
    /// Region the surface renders.
    pub region: RegionId,
    /// Width in pixels, at least 1.
    pub width: i32,
    /// Height in pixels, at least 1.
    pub height: i32,
    /// Maximum number of images the source needs to keep alive at once.
    pub max_images: usize,
    /// How images are allocated.
    pub strategy: AllocationStrategy,
}

impl SourceSpec {
    /// Whether the surface backs the base layer or an overlay.
    #[must_use]
    pub const fn kind(&self) -> RegionKind {
        self.region.kind()
    }
}

/// One surface's producer of rendered images.
///
/// The engine calls [`acquire_next_buffer`](Self::acquire_next_buffer)
/// repeatedly after each content notification until it returns `None`, and
/// calls [`reclaim`](Self::reclaim) exactly once for every image it acquired.
pub trait BufferSource: Send {
    /// Returns the next available image, or `None` when the source has no
    /// more content right now.
    fn acquire_next_buffer(&mut self) -> Option<SourceImage>;

    /// Returns an image to the source for reuse.
    fn reclaim(&mut self, image: ImageHandle);

    /// Closes the source. No acquisition follows.
    fn close(&mut self);
}

/// Builds a [`BufferSource`] for each surface the host requests.
pub trait SourceFactory: Send + Sync {
    /// Allocates a source matching `spec`.
    fn create(&self, spec: &SourceSpec) -> Box<dyn BufferSource>;
}

/// Applies reconciled frames to a platform-native presentation tree.
///
/// Both view-based and layer-based presenters implement this trait, enabling
/// test doubles that record what was presented.
pub trait Presenter: Send {
    /// Presents `frame`. `changes` lists which regions must be created,
    /// updated, and torn down, and the final live order (paint order, back to
    /// front).
    fn apply(&mut self, frame: &Frame, changes: &RegionChanges);

    /// Tears down every live region when the engine is disposed.
    fn teardown(&mut self, live: &[RegionId]) {
        _ = live;
    }
}

/// Requests host ticks on the engine's behalf.
///
/// The engine calls [`schedule_next_tick`](Self::schedule_next_tick) at most
/// once per tick when it has deferred work. The request fires once: the host
/// should call [`Engine::on_host_tick`](crate::engine::Engine::on_host_tick)
/// on its next frame unless `token` has been cancelled by then. Hosts that
/// already tick the engine every frame can ignore the request.
pub trait TickScheduler: Send + Sync {
    /// Asks for one more host tick.
    fn schedule_next_tick(&self, token: &CancelToken);
}

/// A [`TickScheduler`] for hosts that tick the engine unconditionally.
#[derive(Clone, Copy, Debug, Default)]
pub struct EveryTick;

impl TickScheduler for EveryTick {
    fn schedule_next_tick(&self, token: &CancelToken) {
        _ = token;
    }
}
