// Copyright 2026 the Tessera Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Compact binary event recording and decoding.
//!
//! [`RecorderSink`] implements [`TraceSink`] and encodes events into a
//! `Vec<u8>` as fixed-size little-endian records. [`decode`] reads them back
//! as an iterator of [`RecordedEvent`].

use parking_lot::Mutex;

use tessera_core::buffer::{BufferId, SurfaceId};
use tessera_core::region::RegionId;
use tessera_core::time::Timestamp;
use tessera_core::trace::{
    BufferMatchedEvent, BufferReclaimedEvent, FrameReadyEvent, FrameRegisteredEvent,
    FrameReleasedEvent, FramePresentedEvent, FramesInvalidatedEvent, InvalidationCause,
    ReclaimReason, Registration, ReleaseDeferredEvent, TraceSink,
};

// ---------------------------------------------------------------------------
// Event type discriminants
// ---------------------------------------------------------------------------

const TAG_FRAME_REGISTERED: u8 = 1;
const TAG_BUFFER_MATCHED: u8 = 2;
const TAG_FRAMES_INVALIDATED: u8 = 3;
const TAG_FRAME_READY: u8 = 4;
const TAG_FRAME_PRESENTED: u8 = 5;
const TAG_FRAME_RELEASED: u8 = 6;
const TAG_BUFFER_RECLAIMED: u8 = 7;
const TAG_RELEASE_DEFERRED: u8 = 8;

// ---------------------------------------------------------------------------
// RecorderSink
// ---------------------------------------------------------------------------

/// A [`TraceSink`] that encodes events into a compact binary buffer.
#[derive(Debug, Default)]
pub struct RecorderSink {
    buf: Mutex<Vec<u8>>,
}

impl RecorderSink {
    /// Creates an empty recorder.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a copy of the recorded bytes.
    #[must_use]
    pub fn bytes(&self) -> Vec<u8> {
        self.buf.lock().clone()
    }

    /// Takes the recorded bytes, leaving the recorder empty.
    #[must_use]
    pub fn take_bytes(&self) -> Vec<u8> {
        core::mem::take(&mut *self.buf.lock())
    }

    /// Decodes everything recorded so far.
    #[must_use]
    pub fn events(&self) -> Vec<RecordedEvent> {
        decode(&self.buf.lock()).collect()
    }

    fn record(&self, encode: impl FnOnce(&mut Writer<'_>)) {
        let mut buf = self.buf.lock();
        encode(&mut Writer(&mut buf));
    }
}

struct Writer<'a>(&'a mut Vec<u8>);

impl Writer<'_> {
    fn u8(&mut self, v: u8) {
        self.0.push(v);
    }

    fn u32(&mut self, v: u32) {
        self.0.extend_from_slice(&v.to_le_bytes());
    }

    fn i32(&mut self, v: i32) {
        self.0.extend_from_slice(&v.to_le_bytes());
    }

    fn u64(&mut self, v: u64) {
        self.0.extend_from_slice(&v.to_le_bytes());
    }

    fn count(&mut self, v: usize) {
        #[expect(
            clippy::cast_possible_truncation,
            reason = "counts capped at u32::MAX for recording"
        )]
        self.u32(v.min(u32::MAX as usize) as u32);
    }

    fn bool(&mut self, v: bool) {
        self.u8(u8::from(v));
    }

    fn option_timestamp(&mut self, v: Option<Timestamp>) {
        match v {
            Some(t) => {
                self.u8(1);
                self.u64(t.ticks());
            }
            None => {
                self.u8(0);
                self.u64(0);
            }
        }
    }

    fn registration(&mut self, r: Registration) {
        self.u8(match r {
            Registration::Queued => 0,
            Registration::Coalesced => 1,
            Registration::Stale => 2,
        });
    }

    fn cause(&mut self, c: InvalidationCause) {
        self.u8(match c {
            InvalidationCause::LaterBuffer => 0,
            InvalidationCause::LaterReadyFrame => 1,
        });
    }

    fn reason(&mut self, r: ReclaimReason) {
        self.u8(match r {
            ReclaimReason::Released => 0,
            ReclaimReason::DeferredRelease => 1,
            ReclaimReason::Pressure => 2,
            ReclaimReason::PoolClosed => 3,
        });
    }
}

impl TraceSink for RecorderSink {
    fn on_frame_registered(&self, e: &FrameRegisteredEvent) {
        self.record(|w| {
            w.u8(TAG_FRAME_REGISTERED);
            w.u64(e.timestamp.ticks());
            w.count(e.regions);
            w.registration(e.outcome);
        });
    }

    fn on_buffer_matched(&self, e: &BufferMatchedEvent) {
        self.record(|w| {
            w.u8(TAG_BUFFER_MATCHED);
            w.i32(e.region.0);
            w.u32(e.surface.0);
            w.u64(e.buffer_timestamp.ticks());
            w.option_timestamp(e.frame);
        });
    }

    fn on_frames_invalidated(&self, e: &FramesInvalidatedEvent) {
        self.record(|w| {
            w.u8(TAG_FRAMES_INVALIDATED);
            w.u64(e.kept.ticks());
            w.count(e.dropped);
            w.u64(e.oldest_dropped.ticks());
            w.cause(e.cause);
        });
    }

    fn on_frame_ready(&self, e: &FrameReadyEvent) {
        self.record(|w| {
            w.u8(TAG_FRAME_READY);
            w.u64(e.timestamp.ticks());
        });
    }

    fn on_frame_presented(&self, e: &FramePresentedEvent) {
        self.record(|w| {
            w.u8(TAG_FRAME_PRESENTED);
            w.u64(e.timestamp.ticks());
            w.count(e.created);
            w.count(e.updated);
            w.count(e.removed);
        });
    }

    fn on_frame_released(&self, e: &FrameReleasedEvent) {
        self.record(|w| {
            w.u8(TAG_FRAME_RELEASED);
            w.u64(e.timestamp.ticks());
            w.bool(e.presented);
        });
    }

    fn on_buffer_reclaimed(&self, e: &BufferReclaimedEvent) {
        self.record(|w| {
            w.u8(TAG_BUFFER_RECLAIMED);
            w.u32(e.surface.0);
            w.u64(e.buffer.0);
            w.reason(e.reason);
            w.count(e.outstanding);
        });
    }

    fn on_release_deferred(&self, e: &ReleaseDeferredEvent) {
        self.record(|w| {
            w.u8(TAG_RELEASE_DEFERRED);
            w.u32(e.surface.0);
            w.u64(e.buffer.0);
            w.u32(e.ticks);
        });
    }
}

// ---------------------------------------------------------------------------
// Decoder
// ---------------------------------------------------------------------------

/// A decoded event from a binary recording.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RecordedEvent {
    /// A [`FrameRegisteredEvent`].
    FrameRegistered(FrameRegisteredEvent),
    /// A [`BufferMatchedEvent`].
    BufferMatched(BufferMatchedEvent),
    /// A [`FramesInvalidatedEvent`].
    FramesInvalidated(FramesInvalidatedEvent),
    /// A [`FrameReadyEvent`].
    FrameReady(FrameReadyEvent),
    /// A [`FramePresentedEvent`].
    FramePresented(FramePresentedEvent),
    /// A [`FrameReleasedEvent`].
    FrameReleased(FrameReleasedEvent),
    /// A [`BufferReclaimedEvent`].
    BufferReclaimed(BufferReclaimedEvent),
    /// A [`ReleaseDeferredEvent`].
    ReleaseDeferred(ReleaseDeferredEvent),
}

impl RecordedEvent {
    /// Short event name, as used in exported traces.
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Self::FrameRegistered(_) => "FrameRegistered",
            Self::BufferMatched(_) => "BufferMatched",
            Self::FramesInvalidated(_) => "FramesInvalidated",
            Self::FrameReady(_) => "FrameReady",
            Self::FramePresented(_) => "FramePresented",
            Self::FrameReleased(_) => "FrameReleased",
            Self::BufferReclaimed(_) => "BufferReclaimed",
            Self::ReleaseDeferred(_) => "ReleaseDeferred",
        }
    }
}

/// Decodes a byte slice produced by [`RecorderSink`] into an iterator of
/// [`RecordedEvent`].
pub fn decode(bytes: &[u8]) -> DecodeIter<'_> {
    DecodeIter {
        data: bytes,
        pos: 0,
    }
}

/// Iterator over decoded events.
#[derive(Debug)]
pub struct DecodeIter<'a> {
    data: &'a [u8],
    pos: usize,
}

impl DecodeIter<'_> {
    fn take<const N: usize>(&mut self) -> Option<[u8; N]> {
        let end = self.pos.checked_add(N)?;
        let bytes = self.data.get(self.pos..end)?.try_into().ok()?;
        self.pos = end;
        Some(bytes)
    }

    fn read_u8(&mut self) -> Option<u8> {
        self.take::<1>().map(|[v]| v)
    }

    fn read_u32(&mut self) -> Option<u32> {
        self.take().map(u32::from_le_bytes)
    }

    fn read_i32(&mut self) -> Option<i32> {
        self.take().map(i32::from_le_bytes)
    }

    fn read_u64(&mut self) -> Option<u64> {
        self.take().map(u64::from_le_bytes)
    }

    fn read_timestamp(&mut self) -> Option<Timestamp> {
        self.read_u64().map(Timestamp)
    }

    fn read_count(&mut self) -> Option<usize> {
        self.read_u32().and_then(|v| usize::try_from(v).ok())
    }

    fn read_option_timestamp(&mut self) -> Option<Option<Timestamp>> {
        let present = self.read_u8()?;
        let val = self.read_u64()?;
        Some((present != 0).then_some(Timestamp(val)))
    }

    fn read_registration(&mut self) -> Option<Registration> {
        Some(match self.read_u8()? {
            0 => Registration::Queued,
            1 => Registration::Coalesced,
            _ => Registration::Stale,
        })
    }

    fn read_cause(&mut self) -> Option<InvalidationCause> {
        Some(match self.read_u8()? {
            0 => InvalidationCause::LaterBuffer,
            _ => InvalidationCause::LaterReadyFrame,
        })
    }

    fn read_reason(&mut self) -> Option<ReclaimReason> {
        Some(match self.read_u8()? {
            0 => ReclaimReason::Released,
            1 => ReclaimReason::DeferredRelease,
            2 => ReclaimReason::Pressure,
            _ => ReclaimReason::PoolClosed,
        })
    }

    fn decode_frame_registered(&mut self) -> Option<RecordedEvent> {
        Some(RecordedEvent::FrameRegistered(FrameRegisteredEvent {
            timestamp: self.read_timestamp()?,
            regions: self.read_count()?,
            outcome: self.read_registration()?,
        }))
    }

    fn decode_buffer_matched(&mut self) -> Option<RecordedEvent> {
        Some(RecordedEvent::BufferMatched(BufferMatchedEvent {
            region: RegionId(self.read_i32()?),
            surface: SurfaceId(self.read_u32()?),
            buffer_timestamp: self.read_timestamp()?,
            frame: self.read_option_timestamp()?,
        }))
    }

    fn decode_frames_invalidated(&mut self) -> Option<RecordedEvent> {
        Some(RecordedEvent::FramesInvalidated(FramesInvalidatedEvent {
            kept: self.read_timestamp()?,
            dropped: self.read_count()?,
            oldest_dropped: self.read_timestamp()?,
            cause: self.read_cause()?,
        }))
    }

    fn decode_frame_presented(&mut self) -> Option<RecordedEvent> {
        Some(RecordedEvent::FramePresented(FramePresentedEvent {
            timestamp: self.read_timestamp()?,
            created: self.read_count()?,
            updated: self.read_count()?,
            removed: self.read_count()?,
        }))
    }

    fn decode_frame_released(&mut self) -> Option<RecordedEvent> {
        Some(RecordedEvent::FrameReleased(FrameReleasedEvent {
            timestamp: self.read_timestamp()?,
            presented: self.read_u8()? != 0,
        }))
    }

    fn decode_buffer_reclaimed(&mut self) -> Option<RecordedEvent> {
        Some(RecordedEvent::BufferReclaimed(BufferReclaimedEvent {
            surface: SurfaceId(self.read_u32()?),
            buffer: BufferId(self.read_u64()?),
            reason: self.read_reason()?,
            outstanding: self.read_count()?,
        }))
    }

    fn decode_release_deferred(&mut self) -> Option<RecordedEvent> {
        Some(RecordedEvent::ReleaseDeferred(ReleaseDeferredEvent {
            surface: SurfaceId(self.read_u32()?),
            buffer: BufferId(self.read_u64()?),
            ticks: self.read_u32()?,
        }))
    }
}

impl Iterator for DecodeIter<'_> {
    type Item = RecordedEvent;

    fn next(&mut self) -> Option<Self::Item> {
        let tag = self.read_u8()?;
        match tag {
            TAG_FRAME_REGISTERED => self.decode_frame_registered(),
            TAG_BUFFER_MATCHED => self.decode_buffer_matched(),
            TAG_FRAMES_INVALIDATED => self.decode_frames_invalidated(),
            TAG_FRAME_READY => Some(RecordedEvent::FrameReady(FrameReadyEvent {
                timestamp: self.read_timestamp()?,
            })),
            TAG_FRAME_PRESENTED => self.decode_frame_presented(),
            TAG_FRAME_RELEASED => self.decode_frame_released(),
            TAG_BUFFER_RECLAIMED => self.decode_buffer_reclaimed(),
            TAG_RELEASE_DEFERRED => self.decode_release_deferred(),
            _ => None, // unknown tag → stop iteration
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_invalidated() -> FramesInvalidatedEvent {
        FramesInvalidatedEvent {
            kept: Timestamp(250),
            dropped: 2,
            oldest_dropped: Timestamp(100),
            cause: InvalidationCause::LaterBuffer,
        }
    }

    #[test]
    fn events_decode_in_recording_order() {
        let rec = RecorderSink::new();
        rec.on_frame_registered(&FrameRegisteredEvent {
            timestamp: Timestamp(100),
            regions: 2,
            outcome: Registration::Queued,
        });
        rec.on_buffer_matched(&BufferMatchedEvent {
            region: RegionId::BASE,
            surface: SurfaceId(3),
            buffer_timestamp: Timestamp(40),
            frame: None,
        });
        rec.on_frames_invalidated(&sample_invalidated());
        rec.on_buffer_reclaimed(&BufferReclaimedEvent {
            surface: SurfaceId(3),
            buffer: BufferId(9),
            reason: ReclaimReason::Pressure,
            outstanding: 5,
        });

        let events = rec.events();
        assert_eq!(events.len(), 4);
        match &events[1] {
            RecordedEvent::BufferMatched(e) => {
                assert_eq!(e.region, RegionId::BASE);
                assert_eq!(e.frame, None);
            }
            other => panic!("expected BufferMatched, got {other:?}"),
        }
        assert_eq!(events[2], RecordedEvent::FramesInvalidated(sample_invalidated()));
        assert_eq!(events[3].name(), "BufferReclaimed");
    }

    #[test]
    fn take_bytes_empties_recorder() {
        let rec = RecorderSink::new();
        rec.on_frame_ready(&FrameReadyEvent {
            timestamp: Timestamp(7),
        });
        let bytes = rec.take_bytes();
        assert_eq!(decode(&bytes).count(), 1);
        assert!(rec.events().is_empty());
    }

    #[test]
    fn truncated_recording_stops_cleanly() {
        let rec = RecorderSink::new();
        rec.on_frames_invalidated(&sample_invalidated());
        rec.on_frame_released(&FrameReleasedEvent {
            timestamp: Timestamp(1),
            presented: true,
        });
        let bytes = rec.bytes();
        let events: Vec<_> = decode(&bytes[..bytes.len() - 1]).collect();
        assert_eq!(events.len(), 1);
    }
}
