// Copyright 2026 the Tessera Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Buffer-to-frame matching and readiness gating.
//!
//! The matcher keeps the pending frames in strictly ascending timestamp order.
//! A buffer acquired at time `t` belongs to the latest pending frame that
//! started at or before `t`. Earlier frames that are still waiting when that
//! happens can no longer complete coherently and are dropped.
//!
//! The pump hands the first ready frame to the compositor when it is
//! available. While frames remain queued the pump re-arms itself for the next
//! host tick.

use std::collections::VecDeque;

use parking_lot::Mutex;

use crate::buffer::Buffer;
use crate::compositor::Compositor;
use crate::frame::Frame;
use crate::region::{RegionDecl, RegionId, RegionUpdate};
use crate::scheduler::{TickQueue, TickTask};
use crate::time::Timestamp;
use crate::trace::{
    BufferMatchedEvent, FrameReadyEvent, FrameRegisteredEvent, FrameReleasedEvent,
    FramesInvalidatedEvent, InvalidationCause, Registration, Tracer,
};

#[derive(Default)]
struct MatcherState {
    pending: VecDeque<Frame>,
}

/// Ordered queue of pending frames.
pub(crate) struct FrameMatcher {
    state: Mutex<MatcherState>,
    tracer: Tracer,
}

impl FrameMatcher {
    pub(crate) fn new(tracer: Tracer) -> Self {
        Self {
            state: Mutex::new(MatcherState::default()),
            tracer,
        }
    }

    /// Appends a frame for a new raster pass.
    pub(crate) fn register(
        &self,
        start: Timestamp,
        regions: &[RegionDecl],
        queue: &TickQueue,
    ) -> Registration {
        let mut state = self.state.lock();
        let outcome = match state.pending.back() {
            Some(tail) if start <= tail.start() => {
                tracing::debug!(?start, tail = ?tail.start(), "stale frame registration discarded");
                Registration::Stale
            }
            Some(tail) if regions.is_empty() && tail.is_empty() => Registration::Coalesced,
            _ => Registration::Queued,
        };
        self.tracer.frame_registered(&FrameRegisteredEvent {
            timestamp: start,
            regions: regions.len(),
            outcome,
        });
        if outcome != Registration::Queued {
            return outcome;
        }

        let frame = Frame::new(start, regions);
        if frame.is_ready() {
            self.tracer.frame_ready(&FrameReadyEvent { timestamp: start });
            queue.schedule(TickTask::PumpFrames);
        }
        state.pending.push_back(frame);
        outcome
    }

    /// Applies a host update to the frame that started exactly at `start`.
    pub(crate) fn update(
        &self,
        region: RegionId,
        start: Timestamp,
        update: &RegionUpdate,
        queue: &TickQueue,
    ) -> bool {
        let mut state = self.state.lock();
        let Some(frame) = state.pending.iter_mut().find(|f| f.start() == start) else {
            tracing::debug!(?region, ?start, "update for unknown frame ignored");
            return false;
        };
        if !frame.apply_update(region, update) {
            tracing::debug!(?region, ?start, "update for undeclared region ignored");
            return false;
        }
        if frame.refresh_readiness() {
            self.tracer.frame_ready(&FrameReadyEvent { timestamp: start });
            queue.schedule(TickTask::PumpFrames);
        }
        true
    }

    /// Matches a freshly acquired buffer to its frame, then pumps.
    pub(crate) fn on_buffer_ready(&self, buffer: Buffer, compositor: &Compositor, queue: &TickQueue) {
        let mut state = self.state.lock();
        let acquired = buffer.timestamp();
        let Some(index) = state.pending.iter().rposition(|f| f.start() <= acquired) else {
            self.tracer.buffer_matched(&BufferMatchedEvent {
                region: buffer.region(),
                surface: buffer.surface(),
                buffer_timestamp: acquired,
                frame: None,
            });
            tracing::debug!(region = ?buffer.region(), ?acquired, "stale buffer released");
            drop(buffer);
            return;
        };

        let index = self.invalidate_before(&mut state.pending, index);
        let frame = &mut state.pending[index];
        self.tracer.buffer_matched(&BufferMatchedEvent {
            region: buffer.region(),
            surface: buffer.surface(),
            buffer_timestamp: acquired,
            frame: Some(frame.start()),
        });
        match frame.attach(buffer) {
            Ok(replaced) => drop(replaced),
            Err(buffer) => {
                tracing::debug!(
                    region = ?buffer.region(),
                    start = ?frame.start(),
                    "buffer for undeclared region released"
                );
                drop(buffer);
            }
        }
        if frame.refresh_readiness() {
            self.tracer.frame_ready(&FrameReadyEvent {
                timestamp: frame.start(),
            });
        }
        self.pump_locked(&mut state, compositor, queue);
    }

    /// Hands the first ready frame to the compositor if it is available.
    pub(crate) fn pump(&self, compositor: &Compositor, queue: &TickQueue) {
        let mut state = self.state.lock();
        self.pump_locked(&mut state, compositor, queue);
    }

    fn pump_locked(&self, state: &mut MatcherState, compositor: &Compositor, queue: &TickQueue) {
        if let Some(index) = state.pending.iter().position(Frame::is_ready)
            && compositor.available()
            && let Some(frame) = state.pending.remove(index)
        {
            let start = frame.start();
            match compositor.present(frame, queue) {
                Ok(()) => {
                    let dropped: Vec<Frame> = state.pending.drain(..index).collect();
                    self.report_invalidated(&dropped, start, InvalidationCause::LaterReadyFrame);
                }
                // Became busy since the check; retried on the next pump.
                Err(frame) => state.pending.insert(index, frame),
            }
        }
        if !state.pending.is_empty() {
            queue.schedule(TickTask::PumpFrames);
        }
    }

    /// Drops the frames before `index` that are still pending. Returns the
    /// new index of the frame that was at `index`.
    fn invalidate_before(&self, pending: &mut VecDeque<Frame>, index: usize) -> usize {
        if !pending.iter().take(index).any(|f| !f.is_ready()) {
            return index;
        }
        let later = pending.split_off(index);
        let (kept, dropped): (Vec<Frame>, Vec<Frame>) =
            pending.drain(..).partition(Frame::is_ready);
        *pending = kept.into();
        let index = pending.len();
        pending.extend(later);
        self.report_invalidated(&dropped, pending[index].start(), InvalidationCause::LaterBuffer);
        index
    }

    fn report_invalidated(&self, dropped: &[Frame], kept: Timestamp, cause: InvalidationCause) {
        let Some(oldest) = dropped.first() else {
            return;
        };
        tracing::warn!(
            dropped = dropped.len(),
            oldest = ?oldest.start(),
            ?kept,
            gap = kept.saturating_since(oldest.start()),
            ?cause,
            "pending frames invalidated out of order"
        );
        self.tracer.frames_invalidated(&FramesInvalidatedEvent {
            kept,
            dropped: dropped.len(),
            oldest_dropped: oldest.start(),
            cause,
        });
        for frame in dropped {
            self.tracer.frame_released(&FrameReleasedEvent {
                timestamp: frame.start(),
                presented: false,
            });
        }
    }

    pub(crate) fn pending(&self) -> Vec<Timestamp> {
        self.state.lock().pending.iter().map(Frame::start).collect()
    }

    /// Removes every pending frame.
    pub(crate) fn release(&self) -> Vec<Frame> {
        self.state.lock().pending.drain(..).collect()
    }
}

impl core::fmt::Debug for FrameMatcher {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("FrameMatcher")
            .field("pending", &self.pending())
            .finish_non_exhaustive()
    }
}
