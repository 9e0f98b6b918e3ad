// Copyright 2026 the Tessera Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Work deferred to the next host tick.
//!
//! Every deferral in the engine is by exactly one tick. Components push a
//! tagged [`TickTask`] into the engine's [`TickQueue`]; the first push after a
//! tick asks the host's [`TickScheduler`] for another one. On the next
//! [`Engine::on_host_tick`](crate::engine::Engine::on_host_tick) the queue is
//! swapped out and the tasks run in the order they were scheduled.
//!
//! Disposal cancels the queue's [`CancelToken`] and drops every armed task.

use core::mem;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use parking_lot::Mutex;

use crate::backend::TickScheduler;
use crate::frame::Frame;

/// Shared cancellation flag handed to the host with every tick request.
///
/// Once cancelled, a pending tick request should not call back into the
/// engine. Cancellation cannot be undone.
#[derive(Clone, Debug, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    /// Creates a live token.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Cancels the token and every clone of it.
    pub fn cancel(&self) {
        self.0.store(true, Ordering::Release);
    }

    /// Whether [`cancel`](Self::cancel) has been called.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }
}

/// One unit of deferred work.
#[derive(Debug)]
pub(crate) enum TickTask {
    /// Run the frame matcher's pump. Never queued twice for the same tick.
    PumpFrames,
    /// Present the empty frame parked in the compositor, if still parked.
    PresentPendingEmpty,
    /// Complete the in-flight presentation and pump the matcher.
    CompositorAvailable,
    /// Destroy a presented frame, releasing its buffers.
    ReleaseFrame(Frame),
}

struct QueueState {
    tasks: Vec<TickTask>,
    requested: bool,
    cancelled: bool,
}

/// Tasks due on the next host tick.
pub(crate) struct TickQueue {
    state: Mutex<QueueState>,
    scheduler: Arc<dyn TickScheduler>,
    token: CancelToken,
}

impl TickQueue {
    pub(crate) fn new(scheduler: Arc<dyn TickScheduler>) -> Self {
        Self {
            state: Mutex::new(QueueState {
                tasks: Vec::new(),
                requested: false,
                cancelled: false,
            }),
            scheduler,
            token: CancelToken::new(),
        }
    }

    /// Arms `task` for the next tick.
    pub(crate) fn schedule(&self, task: TickTask) {
        let mut state = self.state.lock();
        if state.cancelled {
            drop(state);
            drop(task);
            return;
        }
        if matches!(task, TickTask::PumpFrames)
            && state.tasks.iter().any(|t| matches!(t, TickTask::PumpFrames))
        {
            return;
        }
        state.tasks.push(task);
        let request = !mem::replace(&mut state.requested, true);
        drop(state);
        if request {
            self.scheduler.schedule_next_tick(&self.token);
        }
    }

    /// Asks for a tick without arming a task, e.g. to advance deferred
    /// buffer releases.
    pub(crate) fn request_tick(&self) {
        let mut state = self.state.lock();
        if state.cancelled || mem::replace(&mut state.requested, true) {
            return;
        }
        drop(state);
        self.scheduler.schedule_next_tick(&self.token);
    }

    /// Takes every task due on this tick.
    pub(crate) fn take(&self) -> Vec<TickTask> {
        let mut state = self.state.lock();
        state.requested = false;
        mem::take(&mut state.tasks)
    }

    /// Number of armed tasks.
    pub(crate) fn len(&self) -> usize {
        self.state.lock().tasks.len()
    }

    /// Cancels the token and returns the tasks that will never run.
    pub(crate) fn cancel(&self) -> Vec<TickTask> {
        self.token.cancel();
        let mut state = self.state.lock();
        state.cancelled = true;
        mem::take(&mut state.tasks)
    }
}

impl core::fmt::Debug for TickQueue {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("TickQueue")
            .field("token", &self.token)
            .finish_non_exhaustive()
    }
}
