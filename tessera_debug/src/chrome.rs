// Copyright 2026 the Tessera Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Chrome Trace Event Format exporter.
//!
//! [`export`] reads recorded bytes from a [`RecorderSink`](super::recorder::RecorderSink)
//! and writes [Chrome Trace Event Format][spec] JSON to the given writer.
//!
//! Recorded events carry frame timestamps but no wall-clock time, so events
//! are laid out in recording order, one microsecond apart. Each presented
//! frame becomes an async span from presentation to release, keyed by its
//! start timestamp.
//!
//! [spec]: https://docs.google.com/document/d/1CvAClvFfyA5R-PhYUmn5OOQtYMH4h6I0nSsKchNAySU

use std::io::{self, Write};

use serde_json::{Value, json};

use crate::recorder::{RecordedEvent, decode};

const PID_MATCHER: u32 = 0;
const PID_POOLS: u32 = 1;

/// Exports recorded events as Chrome Trace Event Format JSON.
///
/// The output is a complete JSON array of trace event objects, suitable for
/// loading into `chrome://tracing` or [Perfetto](https://ui.perfetto.dev/).
pub fn export(bytes: &[u8], writer: &mut dyn Write) -> io::Result<()> {
    let mut events: Vec<Value> = Vec::new();

    for (seq, recorded) in decode(bytes).enumerate() {
        let name = recorded.name();
        let event = match recorded {
            RecordedEvent::FrameRegistered(e) => instant(
                name,
                "Matcher",
                seq,
                PID_MATCHER,
                json!({
                    "frame": e.timestamp.ticks(),
                    "regions": e.regions,
                    "outcome": format!("{:?}", e.outcome),
                }),
            ),
            RecordedEvent::BufferMatched(e) => instant(
                name,
                "Matcher",
                seq,
                PID_MATCHER,
                json!({
                    "region": e.region.0,
                    "surface": e.surface.0,
                    "buffer_ts": e.buffer_timestamp.ticks(),
                    "frame": e.frame.map(|t| t.ticks()),
                }),
            ),
            RecordedEvent::FramesInvalidated(e) => {
                let mut v = instant(
                    name,
                    "Anomaly",
                    seq,
                    PID_MATCHER,
                    json!({
                        "kept": e.kept.ticks(),
                        "dropped": e.dropped,
                        "oldest_dropped": e.oldest_dropped.ticks(),
                        "cause": format!("{:?}", e.cause),
                    }),
                );
                v["s"] = json!("g");
                v
            }
            RecordedEvent::FrameReady(e) => instant(
                name,
                "Matcher",
                seq,
                PID_MATCHER,
                json!({ "frame": e.timestamp.ticks() }),
            ),
            RecordedEvent::FramePresented(e) => json!({
                "ph": "b",
                "name": "Frame",
                "cat": "Compositor",
                "id": e.timestamp.ticks(),
                "ts": seq,
                "pid": PID_MATCHER,
                "tid": 0,
                "args": {
                    "created": e.created,
                    "updated": e.updated,
                    "removed": e.removed,
                }
            }),
            RecordedEvent::FrameReleased(e) if e.presented => json!({
                "ph": "e",
                "name": "Frame",
                "cat": "Compositor",
                "id": e.timestamp.ticks(),
                "ts": seq,
                "pid": PID_MATCHER,
                "tid": 0,
            }),
            RecordedEvent::FrameReleased(e) => instant(
                "FrameDropped",
                "Matcher",
                seq,
                PID_MATCHER,
                json!({ "frame": e.timestamp.ticks() }),
            ),
            RecordedEvent::BufferReclaimed(e) => instant(
                name,
                "Pool",
                seq,
                PID_POOLS,
                json!({
                    "surface": e.surface.0,
                    "buffer": e.buffer.0,
                    "reason": format!("{:?}", e.reason),
                    "outstanding": e.outstanding,
                }),
            ),
            RecordedEvent::ReleaseDeferred(e) => instant(
                name,
                "Pool",
                seq,
                PID_POOLS,
                json!({
                    "surface": e.surface.0,
                    "buffer": e.buffer.0,
                    "ticks": e.ticks,
                }),
            ),
        };
        events.push(event);
    }

    serde_json::to_writer_pretty(writer, &events)?;
    Ok(())
}

fn instant(name: &str, cat: &str, seq: usize, pid: u32, args: Value) -> Value {
    json!({
        "ph": "i",
        "name": name,
        "cat": cat,
        "ts": seq,
        "pid": pid,
        "tid": 0,
        "s": "t",
        "args": args,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::recorder::RecorderSink;
    use tessera_core::time::Timestamp;
    use tessera_core::trace::{
        FramePresentedEvent, FrameRegisteredEvent, FrameReleasedEvent, Registration, TraceSink,
    };

    #[test]
    fn export_produces_valid_json() {
        let rec = RecorderSink::new();
        rec.on_frame_registered(&FrameRegisteredEvent {
            timestamp: Timestamp(100),
            regions: 1,
            outcome: Registration::Queued,
        });
        rec.on_frame_presented(&FramePresentedEvent {
            timestamp: Timestamp(100),
            created: 1,
            updated: 0,
            removed: 0,
        });
        rec.on_frame_released(&FrameReleasedEvent {
            timestamp: Timestamp(100),
            presented: true,
        });
        rec.on_frame_released(&FrameReleasedEvent {
            timestamp: Timestamp(50),
            presented: false,
        });

        let mut out = Vec::new();
        export(&rec.bytes(), &mut out).unwrap();
        let json_str = String::from_utf8(out).unwrap();

        // Should parse as a JSON array.
        let parsed: Vec<Value> = serde_json::from_str(&json_str).unwrap();
        assert_eq!(parsed.len(), 4);

        assert_eq!(parsed[0]["ph"], "i");
        assert_eq!(parsed[0]["name"], "FrameRegistered");
        assert_eq!(parsed[0]["args"]["outcome"], "Queued");

        // Presentation opens an async span that release closes.
        assert_eq!(parsed[1]["ph"], "b");
        assert_eq!(parsed[2]["ph"], "e");
        assert_eq!(parsed[1]["id"], parsed[2]["id"]);

        assert_eq!(parsed[3]["name"], "FrameDropped");
    }

    #[test]
    fn export_empty_recording() {
        let mut out = Vec::new();
        export(&[], &mut out).unwrap();
        let json_str = String::from_utf8(out).unwrap();
        let parsed: Vec<Value> = serde_json::from_str(&json_str).unwrap();
        assert!(parsed.is_empty());
    }
}
