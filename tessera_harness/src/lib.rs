// Copyright 2026 the Tessera Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Deterministic host doubles and sync grading for exercising tessera
//! engines.
//!
//! [`Harness`] wires an [`Engine`](tessera_core::Engine) to a
//! [`FakeSourceFactory`], a [`RecordingPresenter`] and a [`ManualScheduler`],
//! and records trace events through a
//! [`RecorderSink`](tessera_debug::recorder::RecorderSink). Nothing runs
//! unless the test calls it, so every scenario is reproducible.
//!
//! [`SyncTracker`] grades a run: presentation order, readiness, buffer
//! hygiene, dropped frames and latency.

mod fakes;
mod grading;
mod harness;

pub use fakes::{
    FakeSource, FakeSourceFactory, Ledger, ManualScheduler, PresentedFrame, PresentedSlot,
    RecordingPresenter,
};
pub use grading::{SyncGrade, SyncReport, SyncSample, SyncTracker};
pub use harness::{Harness, IDLE_TICK_LIMIT};

/// Installs a `tracing` subscriber that writes through the test harness's
/// captured output, filtered by `RUST_LOG` (default `tessera_core=debug`).
///
/// Safe to call from every test; only the first call installs anything.
pub fn init_tracing() {
    use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

    let _ = tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "tessera_core=debug".into()),
        ))
        .with(tracing_subscriber::fmt::layer().with_test_writer())
        .try_init();
}
