// Copyright 2026 the Tessera Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Presentation metrics and grading.

use core::fmt;

/// Per-frame sample fed into [`SyncTracker::observe`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SyncSample {
    /// Host ticks between registration and presentation.
    pub latency_ticks: u64,
    /// The frame started before the previously presented one.
    pub out_of_order: bool,
    /// A buffer-requiring slot had no buffer when presented.
    pub incomplete: bool,
    /// A presented buffer had already been reclaimed by its pool.
    pub reclaimed_buffer: bool,
}

impl SyncSample {
    fn is_violation(&self) -> bool {
        self.out_of_order || self.incomplete || self.reclaimed_buffer
    }
}

/// Letter grade for presentation quality.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SyncGrade {
    /// Low latency and almost no dropped frames.
    A,
    /// Good, with moderate drops or latency.
    B,
    /// Degraded but usable.
    C,
    /// Poor, or an ordering or readiness violation was observed.
    D,
}

impl SyncGrade {
    /// Returns a short label for HUD rendering.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::A => "A",
            Self::B => "B",
            Self::C => "C",
            Self::D => "D",
        }
    }
}

/// Aggregated report returned by [`SyncTracker::observe`].
#[derive(Clone, Copy, Debug)]
pub struct SyncReport {
    /// Current grade.
    pub grade: SyncGrade,
    /// Dropped frames per 1000 frames seen (presented plus dropped).
    pub drop_rate_per_1000: f64,
    /// Latency of the most recent frame, in host ticks.
    pub latency_ticks: u64,
    /// Total frames presented.
    pub total_frames: u64,
    /// Total frames dropped without presentation.
    pub dropped_frames: u64,
    /// Presentations that broke ordering or readiness guarantees.
    pub violations: u64,
}

impl fmt::Display for SyncReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "grade {} ({} presented, {} dropped, {} violations, {:.1} drops/1000, last latency {} ticks)",
            self.grade.as_str(),
            self.total_frames,
            self.dropped_frames,
            self.violations,
            self.drop_rate_per_1000,
            self.latency_ticks,
        )
    }
}

/// Rolling presentation tracker with fixed-size latency history.
#[derive(Debug)]
pub struct SyncTracker<const N: usize> {
    latencies: [u64; N],
    cursor: usize,
    total_frames: u64,
    dropped_frames: u64,
    violations: u64,
    last_latency: u64,
}

impl<const N: usize> Default for SyncTracker<N> {
    fn default() -> Self {
        Self::new(1)
    }
}

impl<const N: usize> SyncTracker<N> {
    /// Creates a tracker with `seed_latency` prefilled in the ring buffer.
    #[must_use]
    pub const fn new(seed_latency: u64) -> Self {
        Self {
            latencies: [seed_latency; N],
            cursor: 0,
            total_frames: 0,
            dropped_frames: 0,
            violations: 0,
            last_latency: seed_latency,
        }
    }

    /// Records frames that were dropped without being presented.
    pub fn observe_dropped(&mut self, frames: u64) {
        self.dropped_frames = self.dropped_frames.saturating_add(frames);
    }

    /// Observes one presented frame and returns an updated report.
    #[must_use]
    pub fn observe(&mut self, sample: SyncSample) -> SyncReport {
        self.total_frames = self.total_frames.saturating_add(1);
        self.latencies[self.cursor % N] = sample.latency_ticks;
        self.cursor = (self.cursor + 1) % N;
        self.last_latency = sample.latency_ticks;
        if sample.is_violation() {
            self.violations = self.violations.saturating_add(1);
        }
        self.report()
    }

    /// The report for everything observed so far.
    #[must_use]
    pub fn report(&self) -> SyncReport {
        let seen = self.total_frames.saturating_add(self.dropped_frames);
        let drop_rate = if seen == 0 {
            0.0
        } else {
            self.dropped_frames as f64 * 1000.0 / seen as f64
        };
        let grade = if self.violations > 0 {
            SyncGrade::D
        } else {
            grade_for(self.mean_latency(), drop_rate)
        };
        SyncReport {
            grade,
            drop_rate_per_1000: drop_rate,
            latency_ticks: self.last_latency,
            total_frames: self.total_frames,
            dropped_frames: self.dropped_frames,
            violations: self.violations,
        }
    }

    /// Mean latency over the ring buffer.
    #[must_use]
    pub fn mean_latency(&self) -> f64 {
        if N == 0 {
            return 0.0;
        }
        self.latencies.iter().sum::<u64>() as f64 / N as f64
    }

    /// Returns ring-buffer latencies oldest→newest.
    #[must_use]
    pub fn latencies(&self) -> [u64; N] {
        let mut out = [0; N];
        let mut i = 0;
        while i < N {
            out[i] = self.latencies[(self.cursor + i) % N];
            i += 1;
        }
        out
    }

    /// Returns an ASCII sparkline over `latencies()`.
    #[must_use]
    pub fn sparkline_ascii(&self, max_ticks: u64) -> String {
        const LEVELS: &[u8] = b" .:-=+*#%@";
        let max_ticks = max_ticks.max(1);
        self.latencies()
            .iter()
            .map(|&v| {
                let t = v.min(max_ticks) as f64 / max_ticks as f64;
                #[expect(
                    clippy::cast_possible_truncation,
                    reason = "index is clamped to ASCII level count"
                )]
                let level = (t * (LEVELS.len() as f64 - 1.0) + 0.5) as usize;
                LEVELS[level] as char
            })
            .collect()
    }
}

fn grade_for(mean_latency: f64, drop_rate_per_1000: f64) -> SyncGrade {
    if mean_latency <= 2.0 && drop_rate_per_1000 < 10.0 {
        SyncGrade::A
    } else if mean_latency <= 4.0 && drop_rate_per_1000 < 50.0 {
        SyncGrade::B
    } else if mean_latency <= 8.0 && drop_rate_per_1000 < 150.0 {
        SyncGrade::C
    } else {
        SyncGrade::D
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const CLEAN: SyncSample = SyncSample {
        latency_ticks: 1,
        out_of_order: false,
        incomplete: false,
        reclaimed_buffer: false,
    };

    #[test]
    fn drop_rate_accumulates() {
        let mut t = SyncTracker::<8>::new(1);
        for _ in 0..8 {
            let _ = t.observe(CLEAN);
        }
        t.observe_dropped(2);
        let report = t.report();
        assert!((report.drop_rate_per_1000 - 200.0).abs() < 1e-6, "{report:?}");
        assert_eq!(report.grade, SyncGrade::D);
    }

    #[test]
    fn latency_degrades_grade() {
        let mut t = SyncTracker::<4>::new(1);
        assert_eq!(t.observe(CLEAN).grade, SyncGrade::A);
        for _ in 0..4 {
            let _ = t.observe(SyncSample {
                latency_ticks: 3,
                ..CLEAN
            });
        }
        assert_eq!(t.report().grade, SyncGrade::B);
        assert_eq!(t.latencies(), [3, 3, 3, 3]);
    }

    #[test]
    fn any_violation_fails() {
        let mut t = SyncTracker::<4>::default();
        let report = t.observe(SyncSample {
            incomplete: true,
            ..CLEAN
        });
        assert_eq!(report.grade, SyncGrade::D);
        assert_eq!(report.violations, 1);
    }

    #[test]
    fn report_renders_grade_label() {
        let mut t = SyncTracker::<4>::new(0);
        let report = t.observe(CLEAN);
        assert_eq!(
            report.to_string(),
            "grade A (1 presented, 0 dropped, 0 violations, 0.0 drops/1000, last latency 1 ticks)"
        );
    }

    #[test]
    fn sparkline_has_one_char_per_slot() {
        let mut t = SyncTracker::<4>::new(0);
        let _ = t.observe(SyncSample {
            latency_ticks: 9,
            ..CLEAN
        });
        let line = t.sparkline_ascii(9);
        assert_eq!(line.len(), 4);
        assert!(line.ends_with('@'), "got: {line:?}");
    }
}
