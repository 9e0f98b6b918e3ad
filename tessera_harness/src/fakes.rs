// Copyright 2026 the Tessera Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Deterministic stand-ins for the host collaborators.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;
use tessera_core::backend::{BufferSource, Presenter, SourceFactory, SourceSpec, TickScheduler};
use tessera_core::buffer::{ImageHandle, SourceImage, SurfaceId};
use tessera_core::compositor::RegionChanges;
use tessera_core::frame::Frame;
use tessera_core::region::RegionId;
use tessera_core::scheduler::CancelToken;
use tessera_core::time::Timestamp;

// ---------------------------------------------------------------------------
// Buffer sources
// ---------------------------------------------------------------------------

#[derive(Debug, Default)]
struct SurfaceLedger {
    spec: Option<SourceSpec>,
    queued: Vec<SourceImage>,
    live: usize,
    peak_live: usize,
    closed: bool,
}

#[derive(Debug, Default)]
struct LedgerState {
    surfaces: HashMap<SurfaceId, SurfaceLedger>,
    images: HashMap<ImageHandle, (SurfaceId, Timestamp)>,
    reclaims: HashMap<ImageHandle, u32>,
    foreign_reclaims: Vec<ImageHandle>,
    acquired: usize,
    next_image: u64,
}

/// Source-side record of every image handed out and taken back.
///
/// All sources built by one [`FakeSourceFactory`] share a ledger, so
/// hygiene checks cover resizes and released surfaces too.
#[derive(Clone, Debug, Default)]
pub struct Ledger {
    state: Arc<Mutex<LedgerState>>,
}

impl Ledger {
    /// Total images acquired by the engine.
    #[must_use]
    pub fn acquired(&self) -> usize {
        self.state.lock().acquired
    }

    /// Total reclaim calls received.
    #[must_use]
    pub fn reclaimed(&self) -> usize {
        self.state.lock().reclaims.values().map(|&n| n as usize).sum()
    }

    /// Images acquired and not yet reclaimed.
    #[must_use]
    pub fn live(&self) -> usize {
        self.state.lock().surfaces.values().map(|s| s.live).sum()
    }

    /// Images acquired from `surface` and not yet reclaimed.
    #[must_use]
    pub fn live_on(&self, surface: SurfaceId) -> usize {
        self.state.lock().surfaces.get(&surface).map_or(0, |s| s.live)
    }

    /// Highest number of images `surface` ever had out at once.
    #[must_use]
    pub fn peak_live_on(&self, surface: SurfaceId) -> usize {
        self.state.lock().surfaces.get(&surface).map_or(0, |s| s.peak_live)
    }

    /// Highest per-surface live count across all surfaces.
    #[must_use]
    pub fn peak_live(&self) -> usize {
        self.state
            .lock()
            .surfaces
            .values()
            .map(|s| s.peak_live)
            .max()
            .unwrap_or(0)
    }

    /// Timestamps of the images reclaimed from `surface`, in image order.
    #[must_use]
    pub fn reclaimed_on(&self, surface: SurfaceId) -> Vec<Timestamp> {
        let state = self.state.lock();
        let mut stamps: Vec<(ImageHandle, Timestamp)> = state
            .reclaims
            .keys()
            .filter_map(|image| match state.images.get(image) {
                Some(&(s, ts)) if s == surface => Some((*image, ts)),
                _ => None,
            })
            .collect();
        stamps.sort_by_key(|(image, _)| image.0);
        stamps.into_iter().map(|(_, ts)| ts).collect()
    }

    /// Images reclaimed more than once.
    #[must_use]
    pub fn double_reclaims(&self) -> Vec<ImageHandle> {
        let state = self.state.lock();
        let mut out: Vec<ImageHandle> = state
            .reclaims
            .iter()
            .filter(|&(_, &n)| n > 1)
            .map(|(image, _)| *image)
            .collect();
        out.sort_by_key(|image| image.0);
        out
    }

    /// Reclaims of images that no source handed out, or that went to the
    /// wrong source.
    #[must_use]
    pub fn foreign_reclaims(&self) -> Vec<ImageHandle> {
        self.state.lock().foreign_reclaims.clone()
    }

    /// Whether the source of `surface` has been closed.
    #[must_use]
    pub fn is_closed(&self, surface: SurfaceId) -> bool {
        self.state.lock().surfaces.get(&surface).is_some_and(|s| s.closed)
    }

    /// The [`SourceSpec`] `surface` was allocated with.
    #[must_use]
    pub fn spec(&self, surface: SurfaceId) -> Option<SourceSpec> {
        self.state.lock().surfaces.get(&surface).and_then(|s| s.spec)
    }

    /// Every image acquired has been reclaimed exactly once.
    #[must_use]
    pub fn is_balanced(&self) -> bool {
        let state = self.state.lock();
        state.foreign_reclaims.is_empty()
            && state.images.len() == state.acquired
            && state
                .images
                .keys()
                .all(|image| state.reclaims.get(image) == Some(&1))
    }

    fn queue(&self, surface: SurfaceId, timestamp: Timestamp) {
        let mut state = self.state.lock();
        let image = ImageHandle(state.next_image);
        state.next_image += 1;
        state
            .surfaces
            .entry(surface)
            .or_default()
            .queued
            .push(SourceImage { image, timestamp });
    }
}

/// A [`BufferSource`] backed by the shared [`Ledger`].
#[derive(Debug)]
pub struct FakeSource {
    surface: SurfaceId,
    ledger: Ledger,
}

impl BufferSource for FakeSource {
    fn acquire_next_buffer(&mut self) -> Option<SourceImage> {
        let mut state = self.ledger.state.lock();
        let surface = state.surfaces.entry(self.surface).or_default();
        if surface.closed || surface.queued.is_empty() {
            return None;
        }
        let next = surface.queued.remove(0);
        surface.live += 1;
        surface.peak_live = surface.peak_live.max(surface.live);
        state.images.insert(next.image, (self.surface, next.timestamp));
        state.acquired += 1;
        Some(next)
    }

    fn reclaim(&mut self, image: ImageHandle) {
        let mut state = self.ledger.state.lock();
        match state.images.get(&image) {
            Some(&(surface, _)) if surface == self.surface => {}
            _ => {
                state.foreign_reclaims.push(image);
                return;
            }
        }
        let first = {
            let count = state.reclaims.entry(image).or_insert(0);
            *count += 1;
            *count == 1
        };
        if first && let Some(surface) = state.surfaces.get_mut(&self.surface) {
            surface.live -= 1;
        }
    }

    fn close(&mut self) {
        let mut state = self.ledger.state.lock();
        let surface = state.surfaces.entry(self.surface).or_default();
        surface.closed = true;
        surface.queued.clear();
    }
}

/// Builds [`FakeSource`]s that record into one [`Ledger`].
#[derive(Clone, Debug, Default)]
pub struct FakeSourceFactory {
    ledger: Ledger,
}

impl FakeSourceFactory {
    /// Creates a factory with an empty ledger.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// The shared ledger.
    #[must_use]
    pub fn ledger(&self) -> &Ledger {
        &self.ledger
    }

    /// Makes an image with `timestamp` available on `surface`.
    pub fn queue(&self, surface: SurfaceId, timestamp: Timestamp) {
        self.ledger.queue(surface, timestamp);
    }
}

impl SourceFactory for FakeSourceFactory {
    fn create(&self, spec: &SourceSpec) -> Box<dyn BufferSource> {
        self.ledger
            .state
            .lock()
            .surfaces
            .entry(spec.surface)
            .or_default()
            .spec = Some(*spec);
        Box::new(FakeSource {
            surface: spec.surface,
            ledger: self.ledger.clone(),
        })
    }
}

// ---------------------------------------------------------------------------
// Presenter
// ---------------------------------------------------------------------------

/// What one slot looked like when its frame was presented.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PresentedSlot {
    /// The region.
    pub region: RegionId,
    /// Whether the slot required a buffer.
    pub requires_buffer: bool,
    /// Acquisition timestamp of the attached buffer.
    pub buffer: Option<Timestamp>,
    /// Whether the attached buffer had already been reclaimed.
    pub reclaimed: bool,
}

/// One call to [`Presenter::apply`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PresentedFrame {
    /// Frame start timestamp.
    pub start: Timestamp,
    /// Slots in declared order.
    pub slots: Vec<PresentedSlot>,
    /// The reconciliation the engine computed.
    pub changes: RegionChanges,
}

impl PresentedFrame {
    /// Whether every buffer-requiring slot held a buffer.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.slots
            .iter()
            .all(|s| !s.requires_buffer || s.buffer.is_some())
    }
}

#[derive(Debug, Default)]
struct PresenterLog {
    frames: Vec<PresentedFrame>,
    teardowns: Vec<Vec<RegionId>>,
}

/// A [`Presenter`] that records every frame it is given.
#[derive(Clone, Debug, Default)]
pub struct RecordingPresenter {
    log: Arc<Mutex<PresenterLog>>,
}

impl RecordingPresenter {
    /// Creates an empty recorder.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Every presented frame, oldest first.
    #[must_use]
    pub fn frames(&self) -> Vec<PresentedFrame> {
        self.log.lock().frames.clone()
    }

    /// Start timestamps of the presented frames.
    #[must_use]
    pub fn timestamps(&self) -> Vec<Timestamp> {
        self.log.lock().frames.iter().map(|f| f.start).collect()
    }

    /// The most recent presentation.
    #[must_use]
    pub fn last(&self) -> Option<PresentedFrame> {
        self.log.lock().frames.last().cloned()
    }

    /// Region lists passed to [`Presenter::teardown`].
    #[must_use]
    pub fn teardowns(&self) -> Vec<Vec<RegionId>> {
        self.log.lock().teardowns.clone()
    }
}

impl Presenter for RecordingPresenter {
    fn apply(&mut self, frame: &Frame, changes: &RegionChanges) {
        let slots = frame
            .slots()
            .iter()
            .map(|slot| PresentedSlot {
                region: slot.id(),
                requires_buffer: slot.requires_buffer(),
                buffer: slot.buffer().map(|b| b.timestamp()),
                reclaimed: slot.buffer().is_some_and(|b| b.is_reclaimed()),
            })
            .collect();
        self.log.lock().frames.push(PresentedFrame {
            start: frame.start(),
            slots,
            changes: changes.clone(),
        });
    }

    fn teardown(&mut self, live: &[RegionId]) {
        self.log.lock().teardowns.push(live.to_vec());
    }
}

// ---------------------------------------------------------------------------
// Scheduler
// ---------------------------------------------------------------------------

#[derive(Debug, Default)]
struct SchedulerState {
    requested: bool,
    requests: u64,
    token: Option<CancelToken>,
}

/// A [`TickScheduler`] that only records requests; the test decides when to
/// tick.
#[derive(Clone, Debug, Default)]
pub struct ManualScheduler {
    state: Arc<Mutex<SchedulerState>>,
}

impl ManualScheduler {
    /// Creates a scheduler with no pending request.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Consumes the pending request. Returns `false` if none was made or its
    /// token was cancelled.
    pub fn take_request(&self) -> bool {
        let mut state = self.state.lock();
        let requested = core::mem::take(&mut state.requested);
        requested && !state.token.as_ref().is_some_and(CancelToken::is_cancelled)
    }

    /// Whether a request is pending.
    #[must_use]
    pub fn is_requested(&self) -> bool {
        self.state.lock().requested
    }

    /// Total requests received.
    #[must_use]
    pub fn requests(&self) -> u64 {
        self.state.lock().requests
    }

    /// Whether the engine's token has been cancelled.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.state
            .lock()
            .token
            .as_ref()
            .is_some_and(CancelToken::is_cancelled)
    }
}

impl TickScheduler for ManualScheduler {
    fn schedule_next_tick(&self, token: &CancelToken) {
        let mut state = self.state.lock();
        state.requested = true;
        state.requests += 1;
        state.token = Some(token.clone());
    }
}
