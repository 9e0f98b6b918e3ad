// Copyright 2026 the Tessera Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Monotonic timestamps used as frame identity.
//!
//! A [`Timestamp`] is an opaque point on the host's monotonic clock, in
//! whatever unit the host uses (typically nanoseconds from the system's
//! monotonic source). The engine only ever compares timestamps; it never
//! converts them or measures durations, so the unit does not matter as long
//! as raster timestamps and buffer acquisition timestamps share it.

use core::fmt;

/// A point on the host's monotonic clock.
///
/// Frames are identified by the timestamp at which their raster pass started.
/// Buffers carry the timestamp at which the producer acquired them; the engine
/// matches a buffer to the latest frame whose start is not after the buffer.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Timestamp(pub u64);

impl Timestamp {
    /// The earliest representable timestamp.
    pub const ZERO: Self = Self(0);

    /// Returns the raw clock value.
    #[inline]
    #[must_use]
    pub const fn ticks(self) -> u64 {
        self.0
    }

    /// Returns the clock distance from `earlier` to `self`, or zero if
    /// `earlier` is after `self`.
    #[inline]
    #[must_use]
    pub const fn saturating_since(self, earlier: Self) -> u64 {
        self.0.saturating_sub(earlier.0)
    }
}

impl From<u64> for Timestamp {
    #[inline]
    fn from(ticks: u64) -> Self {
        Self(ticks)
    }
}

impl fmt::Debug for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Timestamp({})", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ordering_follows_raw_ticks() {
        assert!(Timestamp(100) < Timestamp(101));
        assert_eq!(Timestamp::from(7), Timestamp(7));
        assert_eq!(Timestamp::ZERO.ticks(), 0);
    }

    #[test]
    fn saturating_since_clamps_at_zero() {
        assert_eq!(Timestamp(250).saturating_since(Timestamp(200)), 50);
        assert_eq!(Timestamp(200).saturating_since(Timestamp(250)), 0);
    }

    #[test]
    fn debug_format() {
        let s = format!("{:?}", Timestamp(42));
        assert_eq!(s, "Timestamp(42)");
    }
}
