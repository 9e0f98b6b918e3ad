// Copyright 2026 the Tessera Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Region identity, geometry, and per-frame declarations.

use core::fmt;

use kurbo::Rect;

/// Identifies a region (the base layer or one overlay) across frames.
///
/// Region ids are assigned by the host. The reserved id [`RegionId::BASE`]
/// names the base layer, which always covers the whole viewport.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct RegionId(pub i32);

impl RegionId {
    /// The base layer.
    pub const BASE: Self = Self(-1);

    /// Returns whether this is the base layer or an overlay.
    #[inline]
    #[must_use]
    pub const fn kind(self) -> RegionKind {
        if self.0 == Self::BASE.0 {
            RegionKind::Base
        } else {
            RegionKind::Overlay
        }
    }
}

impl fmt::Debug for RegionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind() {
            RegionKind::Base => f.write_str("RegionId(base)"),
            RegionKind::Overlay => write!(f, "RegionId({})", self.0),
        }
    }
}

/// Whether a region is the base layer or an overlay.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum RegionKind {
    /// The full-viewport base layer.
    Base,
    /// An overlay composited above (or between) platform content.
    Overlay,
}

impl RegionKind {
    /// Placement a freshly declared slot of this kind starts with.
    #[must_use]
    pub const fn initial_placement(self) -> Placement {
        match self {
            Self::Base => Placement::Fill,
            Self::Overlay => Placement::At(Geometry::ZERO),
        }
    }
}

/// Integer rectangle in host pixels.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct Geometry {
    /// Left edge.
    pub x: i32,
    /// Top edge.
    pub y: i32,
    /// Width.
    pub width: i32,
    /// Height.
    pub height: i32,
}

impl Geometry {
    /// The empty rectangle at the origin.
    pub const ZERO: Self = Self::new(0, 0, 0, 0);

    /// Creates a rectangle from its origin and size.
    #[must_use]
    pub const fn new(x: i32, y: i32, width: i32, height: i32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// Returns the rectangle as a `kurbo` rect.
    #[must_use]
    pub fn to_rect(self) -> Rect {
        Rect::new(
            f64::from(self.x),
            f64::from(self.y),
            f64::from(self.x) + f64::from(self.width),
            f64::from(self.y) + f64::from(self.height),
        )
    }
}

/// Where a region is placed within the frame.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Placement {
    /// Covers the whole viewport.
    Fill,
    /// Covers the given rectangle.
    At(Geometry),
}

impl Placement {
    /// Builds a placement from host parameters, where a size of `-1` in both
    /// dimensions means "fill".
    #[must_use]
    pub const fn from_host(geometry: Geometry) -> Self {
        if geometry.width == -1 && geometry.height == -1 {
            Self::Fill
        } else {
            Self::At(geometry)
        }
    }

    /// Resolves the placement to a rectangle within a viewport of the given
    /// size.
    #[must_use]
    pub fn resolve(self, viewport: (i32, i32)) -> Rect {
        match self {
            Self::Fill => Geometry::new(0, 0, viewport.0, viewport.1).to_rect(),
            Self::At(geometry) => geometry.to_rect(),
        }
    }
}

/// Opaque host token describing how a region is painted (transform and clip
/// stack). The engine carries it to the presenter untouched.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct PaintOps(pub u64);

/// Declares one region expected in a frame.
///
/// A bare [`RegionId`] converts into a declaration that requires a buffer;
/// use [`RegionDecl::pass_through`] for a region whose content does not come
/// from a producer.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct RegionDecl {
    /// Which region.
    pub id: RegionId,
    /// Whether the frame must wait for a buffer for this region.
    pub requires_buffer: bool,
}

impl RegionDecl {
    /// A region the frame must wait for.
    #[must_use]
    pub const fn buffered(id: RegionId) -> Self {
        Self {
            id,
            requires_buffer: true,
        }
    }

    /// A region the frame does not wait for.
    #[must_use]
    pub const fn pass_through(id: RegionId) -> Self {
        Self {
            id,
            requires_buffer: false,
        }
    }
}

impl From<RegionId> for RegionDecl {
    fn from(id: RegionId) -> Self {
        Self::buffered(id)
    }
}

impl From<&RegionDecl> for RegionDecl {
    fn from(decl: &Self) -> Self {
        *decl
    }
}

impl From<&RegionId> for RegionDecl {
    fn from(id: &RegionId) -> Self {
        Self::buffered(*id)
    }
}

/// A host update for one region of one frame.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct RegionUpdate {
    /// New placement of the region.
    pub placement: Placement,
    /// Whether the region has overlay content, i.e. requires a buffer.
    pub has_overlay: bool,
    /// Paint operations for the region, if any.
    pub paint_ops: Option<PaintOps>,
}

impl RegionUpdate {
    /// Builds an update from the host's raw parameters.
    #[must_use]
    pub const fn new(
        width: i32,
        height: i32,
        x: i32,
        y: i32,
        has_overlay: bool,
        paint_ops: Option<PaintOps>,
    ) -> Self {
        Self {
            placement: Placement::from_host(Geometry::new(x, y, width, height)),
            has_overlay,
            paint_ops,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn base_id_is_base_kind() {
        assert_eq!(RegionId::BASE.kind(), RegionKind::Base);
        assert_eq!(RegionId(4).kind(), RegionKind::Overlay);
        assert_eq!(format!("{:?}", RegionId::BASE), "RegionId(base)");
    }

    #[test]
    fn host_fill_sentinel_maps_to_fill() {
        let update = RegionUpdate::new(-1, -1, 0, 0, true, None);
        assert_eq!(update.placement, Placement::Fill);

        let update = RegionUpdate::new(20, 10, 5, 6, false, Some(PaintOps(1)));
        assert_eq!(update.placement, Placement::At(Geometry::new(5, 6, 20, 10)));
    }

    #[test]
    fn placement_resolves_against_viewport() {
        let r = Placement::Fill.resolve((300, 200));
        assert_eq!(r, Rect::new(0.0, 0.0, 300.0, 200.0));
        let r = Placement::At(Geometry::new(10, 20, 30, 40)).resolve((300, 200));
        assert_eq!(r, Rect::new(10.0, 20.0, 40.0, 60.0));
    }

    #[test]
    fn bare_ids_require_buffers() {
        let decl: RegionDecl = RegionId(2).into();
        assert!(decl.requires_buffer);
        assert!(!RegionDecl::pass_through(RegionId(2)).requires_buffer);
    }
}
