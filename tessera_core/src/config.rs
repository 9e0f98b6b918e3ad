// Copyright 2026 the Tessera Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Engine and pool configuration.
//!
//! Configuration is plain data chosen once when the [`Engine`] is built.
//! Presets mirror the two buffer-allocation strategies hosts usually have:
//! hardware buffers that the presenter can sample directly, and CPU-visible
//! buffers whose pixels are copied out.
//!
//! [`Engine`]: crate::engine::Engine

/// Retention policy for one surface's [`BufferPool`](crate::pool::BufferPool).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct PoolConfig {
    /// Maximum number of buffers a pool may have outstanding at once.
    ///
    /// A pool holding `max_outstanding - 1` or more buffers reclaims its
    /// oldest one as it takes over another. Values below 2 are promoted to 2.
    pub max_outstanding: usize,
    /// Peak-usage threshold below which releases are deferred.
    ///
    /// A pool whose historical peak stayed below this count is considered
    /// lightly loaded; releasing a buffer there waits
    /// [`release_delay_ticks`](Self::release_delay_ticks) ticks instead of
    /// reclaiming immediately.
    pub keep_open: usize,
    /// Number of host ticks a deferred release waits before reclaiming.
    pub release_delay_ticks: u32,
}

impl PoolConfig {
    /// Seven outstanding buffers, deferral below a peak of three, three-tick
    /// release delay.
    pub const DEFAULT: Self = Self {
        max_outstanding: 7,
        keep_open: 3,
        release_delay_ticks: 3,
    };

    /// Returns this configuration with out-of-range values promoted.
    #[must_use]
    pub const fn sanitized(self) -> Self {
        let max_outstanding = if self.max_outstanding < 2 {
            2
        } else {
            self.max_outstanding
        };
        Self {
            max_outstanding,
            keep_open: self.keep_open,
            release_delay_ticks: self.release_delay_ticks,
        }
    }

    /// Outstanding count at or above which the oldest buffer is reclaimed
    /// when another is acquired.
    #[inline]
    #[must_use]
    pub const fn pressure_threshold(&self) -> usize {
        self.max_outstanding - 1
    }
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self::DEFAULT
    }
}

/// How a [`BufferSource`](crate::backend::BufferSource) allocates its images.
///
/// Selected once in [`EngineConfig`] and handed to the
/// [`SourceFactory`](crate::backend::SourceFactory) for every surface, so the
/// choice is never re-evaluated per buffer.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum AllocationStrategy {
    /// GPU-sampled hardware buffers the presenter can wrap without copying.
    HardwareBuffer,
    /// CPU-visible buffers whose pixels are copied into presenter-owned
    /// storage.
    CpuCopy,
}

/// Configuration for the [`Engine`](crate::engine::Engine).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct EngineConfig {
    /// Retention policy applied to every surface's pool.
    pub pool: PoolConfig,
    /// Allocation strategy passed to the source factory.
    pub strategy: AllocationStrategy,
    /// Host viewport size, used when a surface is requested with a `-1`
    /// ("fill") dimension. Can be updated later with
    /// [`Engine::set_viewport`](crate::engine::Engine::set_viewport).
    pub viewport: Option<(i32, i32)>,
}

impl EngineConfig {
    /// Default configuration for hosts with hardware buffer support.
    #[must_use]
    pub const fn hardware() -> Self {
        Self {
            pool: PoolConfig::DEFAULT,
            strategy: AllocationStrategy::HardwareBuffer,
            viewport: None,
        }
    }

    /// Default configuration for hosts that copy pixels out of CPU buffers.
    #[must_use]
    pub const fn cpu_copy() -> Self {
        Self {
            pool: PoolConfig::DEFAULT,
            strategy: AllocationStrategy::CpuCopy,
            viewport: None,
        }
    }

    /// Returns this configuration with a different pool policy.
    #[must_use]
    pub const fn with_pool(mut self, pool: PoolConfig) -> Self {
        self.pool = pool;
        self
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self::hardware()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tiny_pools_are_promoted() {
        let cfg = PoolConfig {
            max_outstanding: 0,
            keep_open: 0,
            release_delay_ticks: 0,
        }
        .sanitized();
        assert_eq!(cfg.max_outstanding, 2);
        assert_eq!(cfg.pressure_threshold(), 1);
    }

    #[test]
    fn presets_differ_only_in_strategy() {
        let hw = EngineConfig::hardware();
        let cpu = EngineConfig::cpu_copy();
        assert_eq!(hw.pool, cpu.pool);
        assert_eq!(hw.strategy, AllocationStrategy::HardwareBuffer);
        assert_eq!(cpu.strategy, AllocationStrategy::CpuCopy);
        assert_eq!(hw.pool.pressure_threshold(), 6);
    }
}
