// Copyright 2026 the Tessera Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! The engine root and its host-facing operations.
//!
//! [`Engine`] owns the surface registry, the frame matcher, the compositor and
//! the tick queue. Operations take `&self`: buffer notifications may arrive on
//! a producer thread while the host ticks on another. Internally each
//! component has its own lock, always taken in the order matcher, compositor,
//! tick queue, pool. Every operation also holds a shared gate that
//! [`Engine::dispose`] takes exclusively, so disposal waits for running ticks
//! and notifications and nothing reaches the presenter after teardown.
//!
//! A buffer arriving through [`Engine::on_buffer_produced`] pumps the matcher
//! immediately, so a frame can be presented on the producer's thread.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use parking_lot::{RwLock, RwLockReadGuard};

use crate::backend::{Presenter, SourceFactory, TickScheduler};
use crate::buffer::SurfaceId;
use crate::compositor::{Compositor, ForeignId, LiveItem};
use crate::config::EngineConfig;
use crate::error::{Error, Result};
use crate::frame::{Frame, FrameState};
use crate::matcher::FrameMatcher;
use crate::pool::BufferPool;
use crate::producer::{Producer, SurfaceHandle};
use crate::region::{RegionDecl, RegionId, RegionUpdate};
use crate::scheduler::{TickQueue, TickTask};
use crate::time::Timestamp;
use crate::trace::{FrameReleasedEvent, Registration, Tracer};

/// Frame-synchronization engine.
pub struct Engine {
    config: EngineConfig,
    producer: Producer,
    matcher: FrameMatcher,
    compositor: Compositor,
    queue: TickQueue,
    tracer: Tracer,
    gate: RwLock<()>,
    disposed: AtomicBool,
}

impl Engine {
    /// Creates an engine from its host collaborators.
    #[must_use]
    pub fn new(
        config: EngineConfig,
        factory: Arc<dyn SourceFactory>,
        presenter: Box<dyn Presenter>,
        scheduler: Arc<dyn TickScheduler>,
        tracer: Tracer,
    ) -> Self {
        Self {
            config,
            producer: Producer::new(
                factory,
                config.pool,
                config.strategy,
                config.viewport,
                tracer.clone(),
            ),
            matcher: FrameMatcher::new(tracer.clone()),
            compositor: Compositor::new(presenter, tracer.clone()),
            queue: TickQueue::new(scheduler),
            tracer,
            gate: RwLock::new(()),
            disposed: AtomicBool::new(false),
        }
    }

    /// The configuration the engine was built with.
    #[must_use]
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    fn enter(&self) -> Result<RwLockReadGuard<'_, ()>> {
        // Recursive so a collaborator re-entering the engine cannot deadlock
        // against a waiting dispose.
        let gate = self.gate.read_recursive();
        if self.disposed.load(Ordering::Acquire) {
            Err(Error::Disposed)
        } else {
            Ok(gate)
        }
    }

    /// Allocates a surface for `region`, or resizes the one it has.
    ///
    /// A `width` or `height` of `-1` fills the viewport in that dimension when
    /// the viewport size is known. Non-positive sizes are clamped to 1.
    /// Requesting the current size again keeps the surface.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Disposed`] after [`dispose`](Self::dispose).
    pub fn create_or_resize_surface(
        &self,
        region: RegionId,
        width: i32,
        height: i32,
        x: i32,
        y: i32,
    ) -> Result<SurfaceHandle> {
        let _gate = self.enter()?;
        Ok(self.producer.create_or_resize(region, width, height, x, y))
    }

    /// Closes the surface of `region`. Releasing a region without a surface
    /// is a no-op.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Disposed`] after [`dispose`](Self::dispose).
    pub fn release_surface(&self, region: RegionId) -> Result<()> {
        let _gate = self.enter()?;
        if !self.producer.release_surface(region) {
            tracing::debug!(?region, "release of region without a surface");
        }
        Ok(())
    }

    /// Drains the buffers `surface` has available and matches them to frames.
    /// Returns how many buffers were forwarded.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnknownSurface`] if `surface` is not the current
    /// surface of any region, [`Error::PoolClosed`] if it was closed
    /// concurrently, and [`Error::Disposed`] after disposal.
    pub fn on_buffer_produced(&self, surface: SurfaceId) -> Result<usize> {
        let _gate = self.enter()?;
        let buffers = self.producer.drain(surface)?;
        let count = buffers.len();
        for buffer in buffers {
            self.matcher
                .on_buffer_ready(buffer, &self.compositor, &self.queue);
        }
        if self.producer.has_deferred() {
            self.queue.request_tick();
        }
        Ok(count)
    }

    /// Registers a frame for a raster pass that started at `start`.
    ///
    /// Regions convert from [`RegionId`] (a region that needs a buffer) or
    /// [`RegionDecl`].
    ///
    /// # Errors
    ///
    /// Returns [`Error::Disposed`] after [`dispose`](Self::dispose).
    pub fn register_frame<I>(&self, start: Timestamp, regions: I) -> Result<Registration>
    where
        I: IntoIterator,
        I::Item: Into<RegionDecl>,
    {
        let _gate = self.enter()?;
        let regions: Vec<RegionDecl> = regions.into_iter().map(Into::into).collect();
        Ok(self.matcher.register(start, &regions, &self.queue))
    }

    /// Updates `region` in the frame that started exactly at `start`. Returns
    /// `false` if no such frame or region is pending.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Disposed`] after [`dispose`](Self::dispose).
    pub fn update_region(
        &self,
        region: RegionId,
        start: Timestamp,
        update: RegionUpdate,
    ) -> Result<bool> {
        let _gate = self.enter()?;
        Ok(self.matcher.update(region, start, &update, &self.queue))
    }

    /// Runs the work deferred to this host tick.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Disposed`] after [`dispose`](Self::dispose).
    pub fn on_host_tick(&self) -> Result<()> {
        let _gate = self.enter()?;
        let tasks = self.queue.take();
        let deferred = self.producer.on_tick();
        for task in tasks {
            match task {
                TickTask::PumpFrames => self.matcher.pump(&self.compositor, &self.queue),
                TickTask::PresentPendingEmpty => self.compositor.present_pending_empty(&self.queue),
                TickTask::CompositorAvailable => {
                    if self.compositor.complete(&self.queue) {
                        self.matcher.pump(&self.compositor, &self.queue);
                    }
                }
                TickTask::ReleaseFrame(frame) => self.release_frame(frame),
            }
        }
        if deferred || self.producer.has_deferred() {
            self.queue.request_tick();
        }
        Ok(())
    }

    fn release_frame(&self, frame: Frame) {
        self.tracer.frame_released(&FrameReleasedEvent {
            timestamp: frame.start(),
            presented: frame.state() == FrameState::Presented,
        });
        drop(frame);
    }

    /// Records the viewport size used to resolve fill dimensions.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Disposed`] after [`dispose`](Self::dispose).
    pub fn set_viewport(&self, width: i32, height: i32) -> Result<()> {
        let _gate = self.enter()?;
        self.producer.set_viewport(width, height);
        Ok(())
    }

    /// Inserts a host-owned item into the live list at `index`, or moves it
    /// there.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Disposed`] after [`dispose`](Self::dispose).
    pub fn insert_foreign(&self, id: ForeignId, index: usize) -> Result<()> {
        let _gate = self.enter()?;
        self.compositor.insert_foreign(id, index);
        Ok(())
    }

    /// Removes a host-owned item. Returns `false` if it was not live.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Disposed`] after [`dispose`](Self::dispose).
    pub fn remove_foreign(&self, id: ForeignId) -> Result<bool> {
        let _gate = self.enter()?;
        Ok(self.compositor.remove_foreign(id))
    }

    /// Start timestamps of the frames still waiting, oldest first.
    #[must_use]
    pub fn pending_frames(&self) -> Vec<Timestamp> {
        self.matcher.pending()
    }

    /// Whether no presentation is in flight.
    #[must_use]
    pub fn compositor_available(&self) -> bool {
        self.compositor.available()
    }

    /// The live list after the most recent presentation.
    #[must_use]
    pub fn live_items(&self) -> Vec<LiveItem> {
        self.compositor.live()
    }

    /// The surface currently allocated for `region`.
    #[must_use]
    pub fn surface(&self, region: RegionId) -> Option<SurfaceHandle> {
        self.producer.surface(region)
    }

    /// The pool currently serving `region`.
    #[must_use]
    pub fn pool(&self, region: RegionId) -> Option<BufferPool> {
        self.producer.pool(region)
    }

    /// Number of tasks armed for the next tick.
    #[must_use]
    pub fn armed_tasks(&self) -> usize {
        self.queue.len()
    }

    /// Whether [`dispose`](Self::dispose) has been called.
    #[must_use]
    pub fn is_disposed(&self) -> bool {
        self.disposed.load(Ordering::Acquire)
    }

    /// Cancels pending ticks, releases every frame and buffer, tears down the
    /// live regions, and closes every pool. Calling it again does nothing.
    ///
    /// Waits for operations running on other threads to finish. Must not be
    /// called from a collaborator callback.
    pub fn dispose(&self) {
        let _gate = self.gate.write();
        if self.disposed.swap(true, Ordering::AcqRel) {
            return;
        }
        for task in self.queue.cancel() {
            if let TickTask::ReleaseFrame(frame) = task {
                self.release_frame(frame);
            }
        }
        for frame in self.matcher.release() {
            self.release_frame(frame);
        }
        for frame in self.compositor.dispose() {
            self.release_frame(frame);
        }
        self.producer.release_all();
        tracing::debug!("engine disposed");
    }
}

impl Drop for Engine {
    fn drop(&mut self) {
        self.dispose();
    }
}

impl core::fmt::Debug for Engine {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Engine")
            .field("config", &self.config)
            .field("pending", &self.matcher.pending())
            .field("disposed", &self.is_disposed())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::EveryTick;
    use crate::testing::{LogPresenter, ScriptedFactory};

    fn engine() -> (Engine, ScriptedFactory, LogPresenter) {
        let factory = ScriptedFactory::default();
        let presenter = LogPresenter::default();
        let engine = Engine::new(
            EngineConfig::default(),
            Arc::new(factory.clone()),
            Box::new(presenter.clone()),
            Arc::new(EveryTick),
            Tracer::none(),
        );
        (engine, factory, presenter)
    }

    #[test]
    fn presented_buffers_are_released_two_ticks_later() {
        let (engine, factory, presenter) = engine();
        let handle = engine.create_or_resize_surface(RegionId(1), 8, 8, 0, 0).unwrap();
        let (_, source) = factory.last();

        engine.register_frame(Timestamp(100), [RegionId(1)]).unwrap();
        source.push(Timestamp(110));
        assert_eq!(engine.on_buffer_produced(handle.surface).unwrap(), 1);
        assert_eq!(presenter.presented(), [Timestamp(100)]);
        assert!(!engine.compositor_available());

        engine.on_host_tick().unwrap();
        assert!(engine.compositor_available());
        let pool = engine.pool(RegionId(1)).unwrap();
        assert_eq!(pool.deferred(), 0);

        engine.on_host_tick().unwrap();
        assert_eq!(pool.deferred(), 1);
        for _ in 0..3 {
            engine.on_host_tick().unwrap();
        }
        assert_eq!(source.reclaimed_count(), 1);
        assert_eq!(pool.outstanding(), 0);
    }

    #[test]
    fn operations_fail_after_dispose() {
        let (engine, factory, _) = engine();
        let handle = engine.create_or_resize_surface(RegionId(1), 8, 8, 0, 0).unwrap();
        engine.register_frame(Timestamp(1), [RegionId(1)]).unwrap();
        factory.last().1.push(Timestamp(0));
        engine.dispose();
        engine.dispose();

        assert!(engine.is_disposed());
        assert!(engine.pending_frames().is_empty());
        assert!(factory.last().1.is_closed());
        assert!(matches!(engine.on_host_tick(), Err(Error::Disposed)));
        assert!(matches!(
            engine.on_buffer_produced(handle.surface),
            Err(Error::Disposed)
        ));
        assert!(matches!(
            engine.register_frame(Timestamp(2), [RegionId(1)]),
            Err(Error::Disposed)
        ));
    }

    #[test]
    fn unknown_surface_is_rejected() {
        let (engine, _, _) = engine();
        assert!(matches!(
            engine.on_buffer_produced(SurfaceId(42)),
            Err(Error::UnknownSurface(SurfaceId(42)))
        ));
    }
}
