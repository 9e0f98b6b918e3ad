// Copyright 2026 the Tessera Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Frame matching and readiness gating for compositing asynchronously rendered
//! regions.
//!
//! `tessera_core` presents one coherent frame made of a base region plus
//! overlay regions, where each region is rendered by an unrelated producer and
//! arrives on its own schedule through a bounded pool of reusable buffers. The
//! engine matches buffers to logical frames, withholds a frame until every
//! required region is ready, bounds buffer production, and presents frames one
//! at a time in timestamp order.
//!
//! # Architecture
//!
//! ```text
//!   BufferSource ──► BufferPool ──► Producer
//!                                      │  on_buffer_produced
//!                                      ▼
//!   register_frame ──────────────► FrameMatcher ──► Compositor ──► Presenter::apply()
//!   update_region                      ▲                │
//!                                      │   on_host_tick │
//!                                      └── TickQueue ◄──┘
//! ```
//!
//! **[`pool`]**: Bounded buffer pools with FIFO pressure reclaim and
//! tick-counted deferred release.
//!
//! **[`buffer`]**: Move-only [`Buffer`](buffer::Buffer) handles; dropping one
//! releases it.
//!
//! **[`frame`]**: Frames, region slots, and latching readiness.
//!
//! **[`compositor`]**: Live-list reconciliation into
//! [`RegionChanges`](compositor::RegionChanges).
//!
//! **[`engine`]**: The [`Engine`](engine::Engine) root and its host
//! operations.
//!
//! **[`backend`]**: The traits hosts implement: buffer sources, presenters
//! and tick schedulers.
//!
//! **[`trace`]**: [`TraceSink`](trace::TraceSink) trait and event types for
//! frame and buffer lifecycles, with a zero-overhead
//! [`Tracer`](trace::Tracer) wrapper.
//!
//! Diagnostics are logged through `tracing`; the crate never installs a
//! subscriber.
//!
//! # Crate features
//!
//! - `trace` (disabled by default): Enables `Tracer` method bodies (one branch
//!   per call site).

#![cfg_attr(docsrs, feature(doc_auto_cfg))]

pub mod backend;
pub mod buffer;
pub mod compositor;
pub mod config;
pub mod engine;
pub mod error;
pub mod frame;
mod matcher;
pub mod pool;
pub mod producer;
pub mod region;
pub mod scheduler;
pub mod time;
pub mod trace;

#[cfg(test)]
mod testing;

pub use engine::Engine;
pub use error::{Error, Result};
