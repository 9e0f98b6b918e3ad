// Copyright 2026 the Tessera Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Recording, pretty-printing, and Chrome trace export for tessera
//! diagnostics.
//!
//! This crate provides [`TraceSink`](tessera_core::trace::TraceSink)
//! implementations for development and post-mortem analysis:
//!
//! - [`pretty::PrettyPrintSink`]: human-readable one-line-per-event output.
//! - [`recorder::RecorderSink`]: compact binary recording with
//!   [`recorder::decode`] for playback.
//! - [`chrome::export`]: writes Chrome Trace Event Format JSON from
//!   recorded bytes.
//!
//! Sinks are shared with the engine behind an `Arc` and may receive events
//! from several threads, so each one serializes writes internally.

pub mod chrome;
pub mod pretty;
pub mod recorder;
