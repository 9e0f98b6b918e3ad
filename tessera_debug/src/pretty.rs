// Copyright 2026 the Tessera Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Human-readable trace output.
//!
//! [`PrettyPrintSink`] implements [`TraceSink`] and writes one line per event
//! to a [`Write`](std::io::Write) destination (default: stderr).

use std::io::Write;

use parking_lot::Mutex;

use tessera_core::trace::{
    BufferMatchedEvent, BufferReclaimedEvent, FramePresentedEvent, FrameReadyEvent,
    FrameRegisteredEvent, FrameReleasedEvent, FramesInvalidatedEvent, ReleaseDeferredEvent,
    TraceSink,
};

/// Writes human-readable trace lines to a [`Write`](std::io::Write) destination.
pub struct PrettyPrintSink<W: Write + Send = Box<dyn Write + Send>> {
    writer: Mutex<W>,
}

impl<W: Write + Send> std::fmt::Debug for PrettyPrintSink<W> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PrettyPrintSink").finish_non_exhaustive()
    }
}

impl PrettyPrintSink {
    /// Creates a sink that writes to stderr.
    #[must_use]
    pub fn stderr() -> Self {
        Self::new(Box::new(std::io::stderr()))
    }

    /// Creates a sink that writes to a boxed writer.
    #[must_use]
    pub fn new(writer: Box<dyn Write + Send>) -> Self {
        Self {
            writer: Mutex::new(writer),
        }
    }
}

impl<W: Write + Send> PrettyPrintSink<W> {
    /// Creates a sink that writes to the given destination.
    #[must_use]
    pub fn with_writer(writer: W) -> Self {
        Self {
            writer: Mutex::new(writer),
        }
    }

    /// Consumes the sink and returns its writer.
    #[must_use]
    pub fn into_writer(self) -> W {
        self.writer.into_inner()
    }

    fn line(&self, args: std::fmt::Arguments<'_>) {
        let _ = writeln!(self.writer.lock(), "{args}");
    }
}

impl<W: Write + Send> TraceSink for PrettyPrintSink<W> {
    fn on_frame_registered(&self, e: &FrameRegisteredEvent) {
        self.line(format_args!(
            "[register] frame={} regions={} {:?}",
            e.timestamp.ticks(),
            e.regions,
            e.outcome,
        ));
    }

    fn on_buffer_matched(&self, e: &BufferMatchedEvent) {
        match e.frame {
            Some(frame) => self.line(format_args!(
                "[buffer] {:?} {:?} at={} -> frame={}",
                e.region,
                e.surface,
                e.buffer_timestamp.ticks(),
                frame.ticks(),
            )),
            None => self.line(format_args!(
                "[buffer] {:?} {:?} at={} STALE",
                e.region,
                e.surface,
                e.buffer_timestamp.ticks(),
            )),
        }
    }

    fn on_frames_invalidated(&self, e: &FramesInvalidatedEvent) {
        self.line(format_args!(
            "[invalidate] dropped={} oldest={} kept={} cause={:?}",
            e.dropped,
            e.oldest_dropped.ticks(),
            e.kept.ticks(),
            e.cause,
        ));
    }

    fn on_frame_ready(&self, e: &FrameReadyEvent) {
        self.line(format_args!("[ready] frame={}", e.timestamp.ticks()));
    }

    fn on_frame_presented(&self, e: &FramePresentedEvent) {
        self.line(format_args!(
            "[present] frame={} +{} ~{} -{}",
            e.timestamp.ticks(),
            e.created,
            e.updated,
            e.removed,
        ));
    }

    fn on_frame_released(&self, e: &FrameReleasedEvent) {
        let how = if e.presented { "presented" } else { "dropped" };
        self.line(format_args!(
            "[release] frame={} {how}",
            e.timestamp.ticks()
        ));
    }

    fn on_buffer_reclaimed(&self, e: &BufferReclaimedEvent) {
        self.line(format_args!(
            "[reclaim] {:?} buffer={} {:?} outstanding={}",
            e.surface, e.buffer.0, e.reason, e.outstanding,
        ));
    }

    fn on_release_deferred(&self, e: &ReleaseDeferredEvent) {
        self.line(format_args!(
            "[defer] {:?} buffer={} ticks={}",
            e.surface, e.buffer.0, e.ticks,
        ));
    }
}
