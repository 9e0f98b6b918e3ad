// Copyright 2026 the Tessera Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Logical compositor frames and their region slots.
//!
//! A [`Frame`] is created for every raster pass the host registers. It holds
//! one [`RegionSlot`] per declared region, in declared (paint) order, and
//! collects buffers for them as producers deliver content. Readiness is
//! tracked by the frame itself and latches: once every slot is ready the frame
//! stays [`FrameState::Ready`] even if a later update adds a requirement.

use crate::buffer::Buffer;
use crate::region::{PaintOps, Placement, RegionDecl, RegionId, RegionUpdate};
use crate::time::Timestamp;

/// Where a frame is in its life.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum FrameState {
    /// Waiting for buffers.
    Pending,
    /// Every slot is ready; waiting for the compositor.
    Ready,
    /// Applied by the presenter.
    Presented,
}

/// One expected region within a frame.
#[derive(Debug)]
pub struct RegionSlot {
    id: RegionId,
    placement: Placement,
    requires_buffer: bool,
    buffer: Option<Buffer>,
    paint_ops: Option<PaintOps>,
}

impl RegionSlot {
    fn new(decl: RegionDecl) -> Self {
        Self {
            id: decl.id,
            placement: decl.id.kind().initial_placement(),
            requires_buffer: decl.requires_buffer,
            buffer: None,
            paint_ops: None,
        }
    }

    /// The region this slot expects.
    #[must_use]
    pub fn id(&self) -> RegionId {
        self.id
    }

    /// Where the region is placed.
    #[must_use]
    pub fn placement(&self) -> Placement {
        self.placement
    }

    /// Whether the frame waits for a buffer for this slot.
    #[must_use]
    pub fn requires_buffer(&self) -> bool {
        self.requires_buffer
    }

    /// The attached buffer, if one has arrived.
    #[must_use]
    pub fn buffer(&self) -> Option<&Buffer> {
        self.buffer.as_ref()
    }

    /// Paint operations supplied by the host.
    #[must_use]
    pub fn paint_ops(&self) -> Option<PaintOps> {
        self.paint_ops
    }

    /// A slot is ready when it holds a buffer or does not need one.
    #[must_use]
    pub fn is_ready(&self) -> bool {
        self.buffer.is_some() || !self.requires_buffer
    }
}

/// One logical compositor frame.
#[derive(Debug)]
pub struct Frame {
    start: Timestamp,
    slots: Vec<RegionSlot>,
    state: FrameState,
}

impl Frame {
    /// Creates a pending frame with one slot per declared region.
    ///
    /// A region declared more than once keeps its first declaration.
    #[must_use]
    pub fn new(start: Timestamp, regions: &[RegionDecl]) -> Self {
        let mut slots: Vec<RegionSlot> = Vec::with_capacity(regions.len());
        for decl in regions {
            if slots.iter().any(|s| s.id == decl.id) {
                tracing::debug!(region = ?decl.id, ?start, "duplicate region declaration ignored");
                continue;
            }
            slots.push(RegionSlot::new(*decl));
        }
        let mut frame = Self {
            start,
            slots,
            state: FrameState::Pending,
        };
        frame.refresh_readiness();
        frame
    }

    /// Raster start timestamp; the frame's identity.
    #[inline]
    #[must_use]
    pub fn start(&self) -> Timestamp {
        self.start
    }

    /// Current lifecycle state.
    #[inline]
    #[must_use]
    pub fn state(&self) -> FrameState {
        self.state
    }

    /// Whether the frame has at least reached [`FrameState::Ready`].
    #[inline]
    #[must_use]
    pub fn is_ready(&self) -> bool {
        self.state != FrameState::Pending
    }

    /// Whether the frame declares no regions.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Slots in declared order.
    #[must_use]
    pub fn slots(&self) -> &[RegionSlot] {
        &self.slots
    }

    /// The slot for `region`, if declared.
    #[must_use]
    pub fn slot(&self, region: RegionId) -> Option<&RegionSlot> {
        self.slots.iter().find(|s| s.id == region)
    }

    /// Declared region ids in order.
    pub fn regions(&self) -> impl Iterator<Item = RegionId> + '_ {
        self.slots.iter().map(|s| s.id)
    }

    /// Promotes a pending frame whose slots are all ready. Returns `true` if
    /// the frame became ready on this call.
    pub(crate) fn refresh_readiness(&mut self) -> bool {
        if self.state == FrameState::Pending && self.slots.iter().all(RegionSlot::is_ready) {
            self.state = FrameState::Ready;
            true
        } else {
            false
        }
    }

    /// Attaches `buffer` to the slot of its region.
    ///
    /// Returns the buffer it replaced, if any. If the frame does not declare
    /// the region, the buffer is handed back in `Err`.
    pub(crate) fn attach(&mut self, buffer: Buffer) -> Result<Option<Buffer>, Buffer> {
        let region = buffer.region();
        match self.slots.iter_mut().find(|s| s.id == region) {
            Some(slot) => Ok(slot.buffer.replace(buffer)),
            None => Err(buffer),
        }
    }

    /// Applies a host update to the slot of `region`. Returns `false` if the
    /// frame does not declare it.
    pub(crate) fn apply_update(&mut self, region: RegionId, update: &RegionUpdate) -> bool {
        let Some(slot) = self.slots.iter_mut().find(|s| s.id == region) else {
            return false;
        };
        slot.placement = update.placement;
        slot.requires_buffer = update.has_overlay;
        slot.paint_ops = update.paint_ops;
        true
    }

    pub(crate) fn mark_presented(&mut self) {
        self.state = FrameState::Presented;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::region::Geometry;

    const T: Timestamp = Timestamp(100);

    #[test]
    fn empty_frame_is_ready_at_creation() {
        let frame = Frame::new(T, &[]);
        assert!(frame.is_empty());
        assert_eq!(frame.state(), FrameState::Ready);
    }

    #[test]
    fn pass_through_slots_do_not_block() {
        let frame = Frame::new(T, &[RegionDecl::pass_through(RegionId(2))]);
        assert!(frame.is_ready());

        let frame = Frame::new(
            T,
            &[RegionDecl::buffered(RegionId(1)), RegionDecl::pass_through(RegionId(2))],
        );
        assert_eq!(frame.state(), FrameState::Pending);
        assert!(!frame.slot(RegionId(1)).unwrap().is_ready());
        assert!(frame.slot(RegionId(2)).unwrap().is_ready());
    }

    #[test]
    fn base_slot_fills_and_overlays_start_at_origin() {
        let frame = Frame::new(T, &[RegionId::BASE.into(), RegionId(3).into()]);
        assert_eq!(frame.slots()[0].placement(), Placement::Fill);
        assert_eq!(frame.slots()[1].placement(), Placement::At(Geometry::ZERO));
    }

    #[test]
    fn duplicate_declarations_keep_the_first() {
        let frame = Frame::new(
            T,
            &[RegionDecl::pass_through(RegionId(1)), RegionDecl::buffered(RegionId(1))],
        );
        assert_eq!(frame.slots().len(), 1);
        assert!(frame.is_ready());
    }

    #[test]
    fn update_clearing_requirement_makes_frame_ready() {
        let mut frame = Frame::new(T, &[RegionId(1).into()]);
        let update = RegionUpdate::new(10, 10, 1, 2, false, None);
        assert!(frame.apply_update(RegionId(1), &update));
        assert!(frame.refresh_readiness());
        assert!(!frame.refresh_readiness());
        assert!(!frame.apply_update(RegionId(9), &update));
    }

    #[test]
    fn readiness_latches() {
        let mut frame = Frame::new(T, &[RegionDecl::pass_through(RegionId(1))]);
        assert!(frame.is_ready());
        let update = RegionUpdate::new(10, 10, 0, 0, true, None);
        frame.apply_update(RegionId(1), &update);
        assert!(!frame.slot(RegionId(1)).unwrap().is_ready());
        assert_eq!(frame.state(), FrameState::Ready);
    }
}
