// Copyright 2026 the Tessera Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Structured instrumentation for frame matching and buffer lifecycles.
//!
//! This module provides a [`TraceSink`] trait with per-event methods that the
//! engine calls at each stage of a frame's life. All method bodies default to
//! no-ops, so implementing only the events you care about is fine.
//!
//! [`Tracer`] wraps an optional shared sink. When the `trace` feature is
//! **off**, every `Tracer` method compiles to nothing (zero overhead). When
//! **on**, each method performs a single `Option` branch before dispatching.
//!
//! Free-form diagnostics (anomalies, stale input) are also logged through
//! `tracing`; sinks receive the same information as typed events.
//!
//! # Crate features
//!
//! - `trace`: enables the `Tracer` method bodies (one branch per call).

#[cfg(feature = "trace")]
use std::sync::Arc;

use crate::buffer::{BufferId, SurfaceId};
use crate::region::RegionId;
use crate::time::Timestamp;

// ---------------------------------------------------------------------------
// Enums
// ---------------------------------------------------------------------------

/// What happened to a frame registration.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Registration {
    /// The frame was appended to the pending queue.
    Queued,
    /// The frame was empty and the tail was already an empty pending frame.
    Coalesced,
    /// The timestamp was not after the pending tail; the frame was discarded.
    Stale,
}

/// Why pending frames were dropped without being presented.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum InvalidationCause {
    /// A buffer matched a later frame while these were still pending.
    LaterBuffer,
    /// A later frame became ready and was presented first.
    LaterReadyFrame,
}

/// Why a pool returned an image to its source.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ReclaimReason {
    /// The buffer was released and the pool reclaimed it immediately.
    Released,
    /// A deferred release's delay elapsed.
    DeferredRelease,
    /// The pool was at its pressure threshold and reclaimed its oldest buffer.
    Pressure,
    /// The pool was closed.
    PoolClosed,
}

// ---------------------------------------------------------------------------
// Event structs
// ---------------------------------------------------------------------------

/// Emitted for every frame registration.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FrameRegisteredEvent {
    /// Raster start timestamp of the frame.
    pub timestamp: Timestamp,
    /// Number of declared regions.
    pub regions: usize,
    /// What happened to the registration.
    pub outcome: Registration,
}

/// Emitted for every buffer delivered to the frame matcher.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BufferMatchedEvent {
    /// Region the buffer renders.
    pub region: RegionId,
    /// Surface the buffer came from.
    pub surface: SurfaceId,
    /// Acquisition timestamp of the buffer.
    pub buffer_timestamp: Timestamp,
    /// The frame the buffer was matched to, or `None` if it was stale.
    pub frame: Option<Timestamp>,
}

/// Emitted when pending frames are dropped as an ordering anomaly.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FramesInvalidatedEvent {
    /// The later frame that caused the invalidation.
    pub kept: Timestamp,
    /// Number of frames dropped.
    pub dropped: usize,
    /// Oldest dropped frame.
    pub oldest_dropped: Timestamp,
    /// What triggered the invalidation.
    pub cause: InvalidationCause,
}

/// Emitted when a frame first becomes ready.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FrameReadyEvent {
    /// Raster start timestamp of the frame.
    pub timestamp: Timestamp,
}

/// Emitted when the compositor presents a frame.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FramePresentedEvent {
    /// Raster start timestamp of the frame.
    pub timestamp: Timestamp,
    /// Regions created.
    pub created: usize,
    /// Regions updated in place.
    pub updated: usize,
    /// Regions torn down.
    pub removed: usize,
}

/// Emitted when a presented (or superseded) frame is destroyed and its
/// buffers released.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FrameReleasedEvent {
    /// Raster start timestamp of the frame.
    pub timestamp: Timestamp,
    /// Whether the presenter applied the frame before release.
    pub presented: bool,
}

/// Emitted when a pool returns an image to its source.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BufferReclaimedEvent {
    /// Surface the buffer belonged to.
    pub surface: SurfaceId,
    /// The buffer.
    pub buffer: BufferId,
    /// Why it was reclaimed.
    pub reason: ReclaimReason,
    /// Outstanding buffers left in the pool afterwards.
    pub outstanding: usize,
}

/// Emitted when a pool defers a release.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ReleaseDeferredEvent {
    /// Surface the buffer belongs to.
    pub surface: SurfaceId,
    /// The buffer.
    pub buffer: BufferId,
    /// Ticks until it is reclaimed.
    pub ticks: u32,
}

// ---------------------------------------------------------------------------
// TraceSink trait
// ---------------------------------------------------------------------------

/// Receives trace events from the engine.
///
/// Events can arrive from the host tick and from producer notifications,
/// possibly on different threads, so sinks take `&self` and provide their own
/// synchronization. All methods have default no-op implementations.
pub trait TraceSink: Send + Sync {
    /// Called for every frame registration.
    fn on_frame_registered(&self, e: &FrameRegisteredEvent) {
        _ = e;
    }

    /// Called for every buffer delivered to the matcher.
    fn on_buffer_matched(&self, e: &BufferMatchedEvent) {
        _ = e;
    }

    /// Called when pending frames are invalidated.
    fn on_frames_invalidated(&self, e: &FramesInvalidatedEvent) {
        _ = e;
    }

    /// Called when a frame first becomes ready.
    fn on_frame_ready(&self, e: &FrameReadyEvent) {
        _ = e;
    }

    /// Called when a frame is presented.
    fn on_frame_presented(&self, e: &FramePresentedEvent) {
        _ = e;
    }

    /// Called when a frame is destroyed.
    fn on_frame_released(&self, e: &FrameReleasedEvent) {
        _ = e;
    }

    /// Called when a pool reclaims an image.
    fn on_buffer_reclaimed(&self, e: &BufferReclaimedEvent) {
        _ = e;
    }

    /// Called when a pool defers a release.
    fn on_release_deferred(&self, e: &ReleaseDeferredEvent) {
        _ = e;
    }
}

// ---------------------------------------------------------------------------
// NoopSink
// ---------------------------------------------------------------------------

/// A [`TraceSink`] that discards all events.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoopSink;

impl TraceSink for NoopSink {}

// ---------------------------------------------------------------------------
// Tracer wrapper
// ---------------------------------------------------------------------------

/// Thin, cloneable wrapper around an optional shared [`TraceSink`].
///
/// When the `trace` feature is **off**, every method compiles to nothing. When
/// **on**, each method checks the inner `Option` (one branch) before
/// dispatching to the sink.
#[derive(Clone, Default)]
pub struct Tracer {
    #[cfg(feature = "trace")]
    sink: Option<Arc<dyn TraceSink>>,
}

impl core::fmt::Debug for Tracer {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Tracer").finish_non_exhaustive()
    }
}

macro_rules! dispatch {
    ($self:ident, $method:ident, $e:ident) => {{
        #[cfg(feature = "trace")]
        if let Some(s) = &$self.sink {
            s.$method($e);
        }
        #[cfg(not(feature = "trace"))]
        {
            _ = $e;
        }
    }};
}

impl Tracer {
    /// Creates a tracer that dispatches to the given sink.
    #[inline]
    #[must_use]
    #[cfg(feature = "trace")]
    pub fn new(sink: Arc<dyn TraceSink>) -> Self {
        Self { sink: Some(sink) }
    }

    /// Creates a tracer that discards all events.
    #[inline]
    #[must_use]
    pub fn none() -> Self {
        Self::default()
    }

    /// Emits a [`FrameRegisteredEvent`].
    #[inline]
    pub fn frame_registered(&self, e: &FrameRegisteredEvent) {
        dispatch!(self, on_frame_registered, e);
    }

    /// Emits a [`BufferMatchedEvent`].
    #[inline]
    pub fn buffer_matched(&self, e: &BufferMatchedEvent) {
        dispatch!(self, on_buffer_matched, e);
    }

    /// Emits a [`FramesInvalidatedEvent`].
    #[inline]
    pub fn frames_invalidated(&self, e: &FramesInvalidatedEvent) {
        dispatch!(self, on_frames_invalidated, e);
    }

    /// Emits a [`FrameReadyEvent`].
    #[inline]
    pub fn frame_ready(&self, e: &FrameReadyEvent) {
        dispatch!(self, on_frame_ready, e);
    }

    /// Emits a [`FramePresentedEvent`].
    #[inline]
    pub fn frame_presented(&self, e: &FramePresentedEvent) {
        dispatch!(self, on_frame_presented, e);
    }

    /// Emits a [`FrameReleasedEvent`].
    #[inline]
    pub fn frame_released(&self, e: &FrameReleasedEvent) {
        dispatch!(self, on_frame_released, e);
    }

    /// Emits a [`BufferReclaimedEvent`].
    #[inline]
    pub fn buffer_reclaimed(&self, e: &BufferReclaimedEvent) {
        dispatch!(self, on_buffer_reclaimed, e);
    }

    /// Emits a [`ReleaseDeferredEvent`].
    #[inline]
    pub fn release_deferred(&self, e: &ReleaseDeferredEvent) {
        dispatch!(self, on_release_deferred, e);
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_reclaim() -> BufferReclaimedEvent {
        BufferReclaimedEvent {
            surface: SurfaceId(1),
            buffer: BufferId(4),
            reason: ReclaimReason::Pressure,
            outstanding: 5,
        }
    }

    #[test]
    fn noop_sink_compiles() {
        let sink = NoopSink;
        sink.on_buffer_reclaimed(&sample_reclaim());
        sink.on_frame_ready(&FrameReadyEvent {
            timestamp: Timestamp(100),
        });
    }

    #[test]
    fn tracer_none_does_nothing() {
        let tracer = Tracer::none();
        tracer.buffer_reclaimed(&sample_reclaim());
        tracer.frame_registered(&FrameRegisteredEvent {
            timestamp: Timestamp(1),
            regions: 0,
            outcome: Registration::Coalesced,
        });
    }

    #[cfg(feature = "trace")]
    #[test]
    fn tracer_dispatches_to_sink() {
        use parking_lot::Mutex;

        #[derive(Default)]
        struct ReadySink {
            ready: Mutex<Vec<u64>>,
        }
        impl TraceSink for ReadySink {
            fn on_frame_ready(&self, e: &FrameReadyEvent) {
                self.ready.lock().push(e.timestamp.ticks());
            }
        }

        let sink = Arc::new(ReadySink::default());
        let tracer = Tracer::new(sink.clone());
        let clone = tracer.clone();
        tracer.frame_ready(&FrameReadyEvent {
            timestamp: Timestamp(100),
        });
        clone.frame_ready(&FrameReadyEvent {
            timestamp: Timestamp(200),
        });
        assert_eq!(*sink.ready.lock(), [100, 200]);
    }
}
