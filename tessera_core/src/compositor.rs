// Copyright 2026 the Tessera Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Live-list reconciliation and two-phase presentation.
//!
//! The compositor presents one ready frame at a time. For each frame it diffs
//! the previous live list against the frame's regions, producing a
//! [`RegionChanges`] that the [`Presenter`] applies. The live list may also
//! contain foreign items the host inserted itself; those keep their relative
//! order and always sit behind the frame's regions.
//!
//! Presentation is two-phase against the host tick:
//!
//! 1. [`present`](Compositor::present) reconciles and presents immediately and
//!    marks the compositor busy. While busy it refuses further frames.
//! 2. On the next tick the compositor becomes available again and the matcher
//!    is pumped; the tick after that destroys the presented frame.
//!
//! An empty frame (no regions) that arrives while nothing is parked is held
//! for one tick instead. A non-empty frame presented in the meantime
//! supersedes it.

use parking_lot::Mutex;

use crate::backend::Presenter;
use crate::frame::Frame;
use crate::region::RegionId;
use crate::scheduler::{TickQueue, TickTask};
use crate::trace::{FramePresentedEvent, Tracer};

/// Identifies a host-owned item in the live list.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ForeignId(pub u32);

/// One entry of the live list, in paint order.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum LiveItem {
    /// An item the host manages itself.
    Foreign(ForeignId),
    /// A region presented by the engine.
    Region(RegionId),
}

/// The delta between two consecutive live lists.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RegionChanges {
    /// Regions new in this frame, in declared order.
    pub created: Vec<RegionId>,
    /// Regions kept from the previous frame, in declared order.
    pub updated: Vec<RegionId>,
    /// Regions absent from this frame, in previous live order.
    pub removed: Vec<RegionId>,
    /// The complete live list after this frame.
    pub order: Vec<LiveItem>,
    /// Whether `order` differs from the previous live list.
    pub order_changed: bool,
}

impl RegionChanges {
    /// Diffs `live` against the regions of a new frame.
    #[must_use]
    pub fn reconcile(live: &[LiveItem], regions: &[RegionId]) -> Self {
        let was_live = |id: RegionId| live.contains(&LiveItem::Region(id));

        let removed = live
            .iter()
            .filter_map(|item| match *item {
                LiveItem::Region(id) if !regions.contains(&id) => Some(id),
                _ => None,
            })
            .collect();
        let (updated, created) = regions.iter().copied().partition(|id| was_live(*id));

        let order: Vec<LiveItem> = live
            .iter()
            .copied()
            .filter(|item| matches!(item, LiveItem::Foreign(_)))
            .chain(regions.iter().copied().map(LiveItem::Region))
            .collect();
        let order_changed = order.as_slice() != live;

        Self {
            created,
            updated,
            removed,
            order,
            order_changed,
        }
    }

    /// Whether any region was created or removed.
    #[must_use]
    pub fn is_structural(&self) -> bool {
        !self.created.is_empty() || !self.removed.is_empty()
    }
}

struct CompositorState {
    presenter: Box<dyn Presenter>,
    live: Vec<LiveItem>,
    in_flight: Option<Frame>,
    pending_empty: Option<Frame>,
}

/// Presents frames handed over by the frame matcher.
pub(crate) struct Compositor {
    state: Mutex<CompositorState>,
    tracer: Tracer,
}

impl Compositor {
    pub(crate) fn new(presenter: Box<dyn Presenter>, tracer: Tracer) -> Self {
        Self {
            state: Mutex::new(CompositorState {
                presenter,
                live: Vec::new(),
                in_flight: None,
                pending_empty: None,
            }),
            tracer,
        }
    }

    /// Whether no presentation is in flight.
    pub(crate) fn available(&self) -> bool {
        self.state.lock().in_flight.is_none()
    }

    /// Presents `frame`, or parks it for a tick if it is the first empty one.
    ///
    /// Hands the frame back if a presentation is already in flight. The check
    /// and the hand-over happen under one lock, so a parked frame started on
    /// another thread cannot be overwritten.
    pub(crate) fn present(&self, frame: Frame, queue: &TickQueue) -> Result<(), Frame> {
        let mut state = self.state.lock();
        if state.in_flight.is_some() {
            return Err(frame);
        }
        if frame.is_empty() && state.pending_empty.is_none() {
            tracing::debug!(start = ?frame.start(), "empty frame parked");
            state.pending_empty = Some(frame);
            queue.schedule(TickTask::PresentPendingEmpty);
            return Ok(());
        }
        if let Some(superseded) = state.pending_empty.take() {
            tracing::debug!(start = ?superseded.start(), "parked empty frame superseded");
            queue.schedule(TickTask::ReleaseFrame(superseded));
        }
        self.begin(&mut state, frame, queue);
        Ok(())
    }

    /// Presents the parked empty frame, if it is still parked.
    pub(crate) fn present_pending_empty(&self, queue: &TickQueue) {
        let mut state = self.state.lock();
        let Some(frame) = state.pending_empty.take() else {
            return;
        };
        if state.in_flight.is_some() {
            queue.schedule(TickTask::ReleaseFrame(frame));
            return;
        }
        self.begin(&mut state, frame, queue);
    }

    /// Completes the in-flight presentation. Returns `true` if one was
    /// completed; the frame is destroyed on the next tick.
    pub(crate) fn complete(&self, queue: &TickQueue) -> bool {
        let mut state = self.state.lock();
        match state.in_flight.take() {
            Some(frame) => {
                queue.schedule(TickTask::ReleaseFrame(frame));
                true
            }
            None => false,
        }
    }

    fn begin(&self, state: &mut CompositorState, mut frame: Frame, queue: &TickQueue) {
        frame.mark_presented();
        let regions: Vec<RegionId> = frame.regions().collect();
        let changes = RegionChanges::reconcile(&state.live, &regions);
        state.presenter.apply(&frame, &changes);
        self.tracer.frame_presented(&FramePresentedEvent {
            timestamp: frame.start(),
            created: changes.created.len(),
            updated: changes.updated.len(),
            removed: changes.removed.len(),
        });
        tracing::debug!(
            start = ?frame.start(),
            created = changes.created.len(),
            removed = changes.removed.len(),
            "frame presented"
        );
        state.live = changes.order;
        state.in_flight = Some(frame);
        queue.schedule(TickTask::CompositorAvailable);
    }

    /// Inserts a host item into the live list at `index` (clamped), moving it
    /// if already present.
    pub(crate) fn insert_foreign(&self, id: ForeignId, index: usize) {
        let mut state = self.state.lock();
        let item = LiveItem::Foreign(id);
        state.live.retain(|i| *i != item);
        let index = index.min(state.live.len());
        state.live.insert(index, item);
    }

    /// Removes a host item. Returns `false` if it was not live.
    pub(crate) fn remove_foreign(&self, id: ForeignId) -> bool {
        let mut state = self.state.lock();
        let before = state.live.len();
        state.live.retain(|i| *i != LiveItem::Foreign(id));
        state.live.len() != before
    }

    pub(crate) fn live(&self) -> Vec<LiveItem> {
        self.state.lock().live.clone()
    }

    /// Tears down every live region and returns the frames still held.
    pub(crate) fn dispose(&self) -> Vec<Frame> {
        let mut state = self.state.lock();
        let regions: Vec<RegionId> = state
            .live
            .iter()
            .filter_map(|item| match *item {
                LiveItem::Region(id) => Some(id),
                LiveItem::Foreign(_) => None,
            })
            .collect();
        state.presenter.teardown(&regions);
        state.live.clear();
        state
            .in_flight
            .take()
            .into_iter()
            .chain(state.pending_empty.take())
            .collect()
    }
}

impl core::fmt::Debug for Compositor {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Compositor").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::backend::EveryTick;
    use crate::region::RegionDecl;
    use crate::testing::LogPresenter;
    use crate::time::Timestamp;

    const A: RegionId = RegionId(1);
    const B: RegionId = RegionId(2);
    const C: RegionId = RegionId(3);
    const F: LiveItem = LiveItem::Foreign(ForeignId(9));

    #[test]
    fn reconcile_from_empty_creates_everything() {
        let changes = RegionChanges::reconcile(&[], &[RegionId::BASE, A]);
        assert_eq!(changes.created, [RegionId::BASE, A]);
        assert!(changes.updated.is_empty());
        assert!(changes.removed.is_empty());
        assert!(changes.order_changed);
        assert!(changes.is_structural());
    }

    #[test]
    fn reconcile_keeps_updates_and_removes_missing() {
        let live = [LiveItem::Region(A), LiveItem::Region(B)];
        let changes = RegionChanges::reconcile(&live, &[B, C]);
        assert_eq!(changes.created, [C]);
        assert_eq!(changes.updated, [B]);
        assert_eq!(changes.removed, [A]);
        assert_eq!(changes.order, [LiveItem::Region(B), LiveItem::Region(C)]);
    }

    #[test]
    fn foreign_items_stay_behind_regions() {
        let live = [LiveItem::Region(A), F, LiveItem::Region(B)];
        let changes = RegionChanges::reconcile(&live, &[A, B]);
        assert_eq!(changes.order, [F, LiveItem::Region(A), LiveItem::Region(B)]);
        assert!(changes.order_changed);
        assert!(!changes.is_structural());

        let again = RegionChanges::reconcile(&changes.order, &[A, B]);
        assert!(!again.order_changed);
    }

    fn compositor() -> (Compositor, LogPresenter, TickQueue) {
        let presenter = LogPresenter::default();
        let compositor = Compositor::new(Box::new(presenter.clone()), Tracer::none());
        (compositor, presenter, TickQueue::new(Arc::new(EveryTick)))
    }

    #[test]
    fn presentation_is_two_phase() {
        let (compositor, presenter, queue) = compositor();
        let frame = Frame::new(Timestamp(5), &[RegionDecl::pass_through(A)]);
        compositor.present(frame, &queue).unwrap();
        assert_eq!(presenter.presented(), [Timestamp(5)]);
        assert!(!compositor.available());

        let tasks = queue.take();
        assert!(matches!(tasks[..], [TickTask::CompositorAvailable]));
        assert!(compositor.complete(&queue));
        assert!(compositor.available());
        assert!(matches!(queue.take()[..], [TickTask::ReleaseFrame(_)]));
        assert!(!compositor.complete(&queue));
    }

    #[test]
    fn first_empty_frame_is_parked_then_presented() {
        let (compositor, presenter, queue) = compositor();
        compositor.present(Frame::new(Timestamp(1), &[]), &queue).unwrap();
        assert!(presenter.presented().is_empty());
        assert!(compositor.available());

        assert!(matches!(queue.take()[..], [TickTask::PresentPendingEmpty]));
        compositor.present_pending_empty(&queue);
        assert_eq!(presenter.presented(), [Timestamp(1)]);
        assert!(!compositor.available());
    }

    #[test]
    fn parked_empty_frame_is_superseded() {
        let (compositor, presenter, queue) = compositor();
        compositor.present(Frame::new(Timestamp(1), &[]), &queue).unwrap();
        compositor
            .present(Frame::new(Timestamp(2), &[RegionDecl::pass_through(A)]), &queue)
            .unwrap();
        assert_eq!(presenter.presented(), [Timestamp(2)]);

        compositor.present_pending_empty(&queue);
        assert_eq!(presenter.presented(), [Timestamp(2)]);
    }

    #[test]
    fn second_empty_frame_is_presented_immediately() {
        let (compositor, presenter, queue) = compositor();
        compositor.present(Frame::new(Timestamp(1), &[]), &queue).unwrap();
        compositor.present(Frame::new(Timestamp(2), &[]), &queue).unwrap();
        assert_eq!(presenter.presented(), [Timestamp(2)]);
    }

    #[test]
    fn busy_compositor_hands_frame_back() {
        let (compositor, presenter, queue) = compositor();
        compositor.present(Frame::new(Timestamp(1), &[]), &queue).unwrap();
        assert!(compositor.available());
        let _ = queue.take();

        // The parked frame starts between an availability check and the next
        // hand-over.
        compositor.present_pending_empty(&queue);
        let frame = Frame::new(Timestamp(2), &[RegionDecl::pass_through(A)]);
        let returned = compositor.present(frame, &queue).unwrap_err();
        assert_eq!(returned.start(), Timestamp(2));
        assert_eq!(presenter.presented(), [Timestamp(1)]);

        let tasks = queue.take();
        assert!(matches!(tasks[..], [TickTask::CompositorAvailable]));
        assert!(compositor.complete(&queue));
        compositor.present(returned, &queue).unwrap();
        assert_eq!(presenter.presented(), [Timestamp(1), Timestamp(2)]);
    }

    #[test]
    fn foreign_items_can_be_moved_and_removed() {
        let (compositor, _, queue) = compositor();
        compositor
            .present(Frame::new(Timestamp(1), &[RegionDecl::pass_through(A)]), &queue)
            .unwrap();
        compositor.insert_foreign(ForeignId(9), 5);
        assert_eq!(compositor.live(), [LiveItem::Region(A), F]);
        compositor.insert_foreign(ForeignId(9), 0);
        assert_eq!(compositor.live(), [F, LiveItem::Region(A)]);
        assert!(compositor.remove_foreign(ForeignId(9)));
        assert!(!compositor.remove_foreign(ForeignId(9)));
    }
}
