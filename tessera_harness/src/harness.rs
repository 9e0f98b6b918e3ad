// Copyright 2026 the Tessera Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! An engine wired to the fakes, with a host tick the test drives.

use std::collections::HashMap;
use std::sync::Arc;

use tessera_core::buffer::SurfaceId;
use tessera_core::config::EngineConfig;
use tessera_core::producer::SurfaceHandle;
use tessera_core::region::{RegionDecl, RegionId, RegionUpdate};
use tessera_core::time::Timestamp;
use tessera_core::trace::{Registration, Tracer};
use tessera_core::{Engine, Result};
use tessera_debug::recorder::{RecordedEvent, RecorderSink};

use crate::fakes::{FakeSourceFactory, Ledger, ManualScheduler, RecordingPresenter};
use crate::grading::{SyncReport, SyncSample, SyncTracker};

/// Upper bound on ticks [`Harness::run_until_idle`] will run.
pub const IDLE_TICK_LIMIT: usize = 64;

/// An [`Engine`] plus the doubles it talks to.
#[derive(Debug)]
pub struct Harness {
    /// The engine under test.
    pub engine: Engine,
    /// Source factory and ledger.
    pub factory: FakeSourceFactory,
    /// Records presentations.
    pub presenter: RecordingPresenter,
    /// Records tick requests.
    pub scheduler: ManualScheduler,
    /// Records trace events.
    pub recorder: Arc<RecorderSink>,
    ticks: u64,
    registered_at: HashMap<Timestamp, u64>,
    presented_at: Vec<u64>,
}

impl Harness {
    /// Builds a harness with the default configuration.
    #[must_use]
    pub fn new() -> Self {
        Self::with_config(EngineConfig::default())
    }

    /// Builds a harness with `config`.
    #[must_use]
    pub fn with_config(config: EngineConfig) -> Self {
        let factory = FakeSourceFactory::new();
        let presenter = RecordingPresenter::new();
        let scheduler = ManualScheduler::new();
        let recorder = Arc::new(RecorderSink::new());
        let engine = Engine::new(
            config,
            Arc::new(factory.clone()),
            Box::new(presenter.clone()),
            Arc::new(scheduler.clone()),
            Tracer::new(recorder.clone()),
        );
        Self {
            engine,
            factory,
            presenter,
            scheduler,
            recorder,
            ticks: 0,
            registered_at: HashMap::new(),
            presented_at: Vec::new(),
        }
    }

    /// The source-side ledger.
    #[must_use]
    pub fn ledger(&self) -> &Ledger {
        self.factory.ledger()
    }

    /// Host ticks run so far.
    #[must_use]
    pub fn ticks(&self) -> u64 {
        self.ticks
    }

    /// Allocates (or resizes) a surface for `region` at the origin.
    ///
    /// # Errors
    ///
    /// Propagates engine errors.
    pub fn surface(&self, region: RegionId, width: i32, height: i32) -> Result<SurfaceHandle> {
        self.engine
            .create_or_resize_surface(region, width, height, 0, 0)
    }

    /// Registers a frame.
    ///
    /// # Errors
    ///
    /// Propagates engine errors.
    pub fn register<I>(&mut self, start: u64, regions: I) -> Result<Registration>
    where
        I: IntoIterator,
        I::Item: Into<RegionDecl>,
    {
        let start = Timestamp(start);
        let outcome = self.engine.register_frame(start, regions)?;
        if outcome == Registration::Queued {
            self.registered_at.insert(start, self.ticks);
        }
        self.note_presentations();
        Ok(outcome)
    }

    /// Updates a region of a pending frame.
    ///
    /// # Errors
    ///
    /// Propagates engine errors.
    pub fn update(&mut self, region: RegionId, start: u64, update: RegionUpdate) -> Result<bool> {
        let applied = self
            .engine
            .update_region(region, Timestamp(start), update)?;
        self.note_presentations();
        Ok(applied)
    }

    /// Makes one image acquired at `timestamp` available on `surface` and
    /// notifies the engine.
    ///
    /// # Errors
    ///
    /// Propagates engine errors, including
    /// [`Error::UnknownSurface`](tessera_core::Error::UnknownSurface) for a
    /// surface that was replaced or released.
    pub fn produce(&mut self, surface: SurfaceId, timestamp: u64) -> Result<usize> {
        self.factory.queue(surface, Timestamp(timestamp));
        let forwarded = self.engine.on_buffer_produced(surface)?;
        self.note_presentations();
        Ok(forwarded)
    }

    /// Like [`produce`](Self::produce), for several images at once.
    ///
    /// # Errors
    ///
    /// Propagates engine errors.
    pub fn produce_batch(&mut self, surface: SurfaceId, timestamps: &[u64]) -> Result<usize> {
        for &ts in timestamps {
            self.factory.queue(surface, Timestamp(ts));
        }
        let forwarded = self.engine.on_buffer_produced(surface)?;
        self.note_presentations();
        Ok(forwarded)
    }

    /// Runs one host tick.
    ///
    /// # Errors
    ///
    /// Propagates engine errors.
    pub fn tick(&mut self) -> Result<()> {
        let _ = self.scheduler.take_request();
        self.ticks += 1;
        self.engine.on_host_tick()?;
        self.note_presentations();
        Ok(())
    }

    /// Runs `n` host ticks.
    ///
    /// # Errors
    ///
    /// Propagates engine errors.
    pub fn ticks_n(&mut self, n: usize) -> Result<()> {
        for _ in 0..n {
            self.tick()?;
        }
        Ok(())
    }

    /// Ticks while the engine keeps asking for ticks, up to
    /// [`IDLE_TICK_LIMIT`]. Returns the number of ticks run.
    ///
    /// # Errors
    ///
    /// Propagates engine errors.
    pub fn run_until_idle(&mut self) -> Result<usize> {
        let mut ran = 0;
        while ran < IDLE_TICK_LIMIT && self.scheduler.is_requested() {
            self.tick()?;
            ran += 1;
        }
        Ok(ran)
    }

    /// Start timestamps of the presented frames, as plain ticks.
    #[must_use]
    pub fn presented(&self) -> Vec<u64> {
        self.presenter
            .timestamps()
            .into_iter()
            .map(Timestamp::ticks)
            .collect()
    }

    /// Start timestamps of the pending frames, as plain ticks.
    #[must_use]
    pub fn pending(&self) -> Vec<u64> {
        self.engine
            .pending_frames()
            .into_iter()
            .map(Timestamp::ticks)
            .collect()
    }

    /// Decoded trace events.
    #[must_use]
    pub fn events(&self) -> Vec<RecordedEvent> {
        self.recorder.events()
    }

    /// Grades every presentation so far.
    #[must_use]
    pub fn grade<const N: usize>(&self) -> SyncReport {
        let mut tracker = SyncTracker::<N>::new(0);
        let dropped = self
            .events()
            .iter()
            .filter(|e| matches!(e, RecordedEvent::FrameReleased(r) if !r.presented))
            .count();
        tracker.observe_dropped(dropped as u64);

        let mut previous: Option<Timestamp> = None;
        for (frame, &tick) in self.presenter.frames().iter().zip(&self.presented_at) {
            let registered = self.registered_at.get(&frame.start).copied().unwrap_or(tick);
            let _ = tracker.observe(SyncSample {
                latency_ticks: tick.saturating_sub(registered),
                out_of_order: previous.is_some_and(|p| frame.start < p),
                incomplete: !frame.is_complete(),
                reclaimed_buffer: frame.slots.iter().any(|s| s.reclaimed),
            });
            previous = Some(frame.start);
        }
        tracker.report()
    }

    fn note_presentations(&mut self) {
        let presented = self.presenter.frames().len();
        while self.presented_at.len() < presented {
            self.presented_at.push(self.ticks);
        }
    }
}

impl Default for Harness {
    fn default() -> Self {
        Self::new()
    }
}
