// Copyright 2026 the Tessera Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Surface registry: one buffer pool per region.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::backend::{SourceFactory, SourceSpec};
use crate::buffer::{Buffer, SurfaceId};
use crate::config::{AllocationStrategy, PoolConfig};
use crate::error::{Error, Result};
use crate::pool::BufferPool;
use crate::region::RegionId;
use crate::trace::Tracer;

/// Describes the surface currently allocated for a region.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct SurfaceHandle {
    /// Fresh id of this allocation.
    pub surface: SurfaceId,
    /// The region the surface renders.
    pub region: RegionId,
    /// Width in pixels, at least 1.
    pub width: i32,
    /// Height in pixels, at least 1.
    pub height: i32,
    /// Horizontal position requested by the host.
    pub x: i32,
    /// Vertical position requested by the host.
    pub y: i32,
}

#[derive(Debug)]
struct SurfaceEntry {
    handle: SurfaceHandle,
    pool: BufferPool,
}

#[derive(Debug, Default)]
struct Registry {
    surfaces: HashMap<RegionId, SurfaceEntry>,
    next_surface: u32,
    viewport: Option<(i32, i32)>,
}

/// Allocates pools for regions and drains them on content notifications.
pub(crate) struct Producer {
    registry: Mutex<Registry>,
    factory: Arc<dyn SourceFactory>,
    pool_config: PoolConfig,
    strategy: AllocationStrategy,
    tracer: Tracer,
}

impl Producer {
    pub(crate) fn new(
        factory: Arc<dyn SourceFactory>,
        pool_config: PoolConfig,
        strategy: AllocationStrategy,
        viewport: Option<(i32, i32)>,
        tracer: Tracer,
    ) -> Self {
        Self {
            registry: Mutex::new(Registry {
                viewport,
                ..Registry::default()
            }),
            factory,
            pool_config: pool_config.sanitized(),
            strategy,
            tracer,
        }
    }

    pub(crate) fn set_viewport(&self, width: i32, height: i32) {
        self.registry.lock().viewport = Some((width, height));
    }

    /// Allocates a surface for `region`, or resizes the existing one.
    pub(crate) fn create_or_resize(
        &self,
        region: RegionId,
        width: i32,
        height: i32,
        x: i32,
        y: i32,
    ) -> SurfaceHandle {
        let mut registry = self.registry.lock();
        let (width, height) = resolve_size(region, width, height, registry.viewport);

        if let Some(entry) = registry.surfaces.get_mut(&region)
            && (entry.handle.width, entry.handle.height) == (width, height)
        {
            entry.handle.x = x;
            entry.handle.y = y;
            return entry.handle;
        }

        let surface = SurfaceId(registry.next_surface);
        registry.next_surface = registry.next_surface.wrapping_add(1);
        let spec = SourceSpec {
            surface,
            region,
            width,
            height,
            max_images: self.pool_config.max_outstanding,
            strategy: self.strategy,
        };
        let source = self.factory.create(&spec);
        let pool = BufferPool::new(&spec, source, self.pool_config, self.tracer.clone());
        let handle = SurfaceHandle {
            surface,
            region,
            width,
            height,
            x,
            y,
        };
        let replaced = registry
            .surfaces
            .insert(region, SurfaceEntry { handle, pool });
        drop(registry);

        if let Some(old) = replaced {
            tracing::debug!(?region, old = ?old.handle.surface, new = ?surface, "surface resized");
            old.pool.close();
        }
        handle
    }

    /// Closes and forgets the surface of `region`. Returns `false` if there
    /// was none.
    pub(crate) fn release_surface(&self, region: RegionId) -> bool {
        let removed = self.registry.lock().surfaces.remove(&region);
        match removed {
            Some(entry) => {
                entry.pool.close();
                true
            }
            None => false,
        }
    }

    /// Acquires every available buffer of `surface`.
    pub(crate) fn drain(&self, surface: SurfaceId) -> Result<Vec<Buffer>> {
        let pool = self
            .registry
            .lock()
            .surfaces
            .values()
            .find(|e| e.handle.surface == surface)
            .map(|e| e.pool.clone())
            .ok_or(Error::UnknownSurface(surface))?;
        pool.acquire_available()
    }

    /// Advances every pool's deferred releases. Returns whether any pool
    /// still has releases waiting.
    pub(crate) fn on_tick(&self) -> bool {
        let pools = self.pools();
        let mut waiting = false;
        for pool in pools {
            pool.on_tick();
            waiting |= pool.deferred() > 0;
        }
        waiting
    }

    pub(crate) fn has_deferred(&self) -> bool {
        self.pools().iter().any(|p| p.deferred() > 0)
    }

    pub(crate) fn surface(&self, region: RegionId) -> Option<SurfaceHandle> {
        self.registry.lock().surfaces.get(&region).map(|e| e.handle)
    }

    pub(crate) fn pool(&self, region: RegionId) -> Option<BufferPool> {
        self.registry
            .lock()
            .surfaces
            .get(&region)
            .map(|e| e.pool.clone())
    }

    /// Closes every pool.
    pub(crate) fn release_all(&self) {
        let entries: Vec<SurfaceEntry> = self
            .registry
            .lock()
            .surfaces
            .drain()
            .map(|(_, e)| e)
            .collect();
        for entry in entries {
            entry.pool.close();
        }
    }

    fn pools(&self) -> Vec<BufferPool> {
        self.registry
            .lock()
            .surfaces
            .values()
            .map(|e| e.pool.clone())
            .collect()
    }
}

impl core::fmt::Debug for Producer {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Producer")
            .field("registry", &*self.registry.lock())
            .field("pool_config", &self.pool_config)
            .field("strategy", &self.strategy)
            .finish_non_exhaustive()
    }
}

/// Replaces `-1` with the viewport dimension when known, then clamps the
/// remaining non-positive dimensions to 1.
fn resolve_size(
    region: RegionId,
    width: i32,
    height: i32,
    viewport: Option<(i32, i32)>,
) -> (i32, i32) {
    let fill = |value: i32, viewport: Option<i32>| match (value, viewport) {
        (-1, Some(v)) => v,
        _ => value,
    };
    let width = fill(width, viewport.map(|v| v.0));
    let height = fill(height, viewport.map(|v| v.1));
    if width <= 0 || height <= 0 {
        tracing::warn!(?region, width, height, "non-positive surface size clamped to 1");
    }
    (width.max(1), height.max(1))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::ScriptedFactory;
    use crate::time::Timestamp;

    fn producer(viewport: Option<(i32, i32)>) -> (Producer, ScriptedFactory) {
        let factory = ScriptedFactory::default();
        let producer = Producer::new(
            Arc::new(factory.clone()),
            PoolConfig::DEFAULT,
            AllocationStrategy::HardwareBuffer,
            viewport,
            Tracer::none(),
        );
        (producer, factory)
    }

    #[test]
    fn fill_dimensions_take_viewport_size() {
        let (producer, factory) = producer(Some((800, 600)));
        let handle = producer.create_or_resize(RegionId::BASE, -1, -1, 0, 0);
        assert_eq!((handle.width, handle.height), (800, 600));
        let (spec, _) = factory.last();
        assert_eq!(spec.max_images, 7);
        assert_eq!(spec.strategy, AllocationStrategy::HardwareBuffer);
    }

    #[test]
    fn non_positive_dimensions_are_clamped() {
        let (producer, _) = producer(None);
        let handle = producer.create_or_resize(RegionId(2), -1, 0, 5, 5);
        assert_eq!((handle.width, handle.height), (1, 1));
        assert_eq!(resolve_size(RegionId(2), -7, 20, Some((100, 100))), (1, 20));
    }

    #[test]
    fn same_size_is_idempotent() {
        let (producer, factory) = producer(None);
        let first = producer.create_or_resize(RegionId(1), 10, 10, 0, 0);
        let second = producer.create_or_resize(RegionId(1), 10, 10, 3, 4);
        assert_eq!(first.surface, second.surface);
        assert_eq!((second.x, second.y), (3, 4));
        assert_eq!(factory.created(), 1);

        // A clamped request matches the clamped size already allocated.
        let tiny = producer.create_or_resize(RegionId(2), 0, 0, 0, 0);
        let again = producer.create_or_resize(RegionId(2), -5, 1, 0, 0);
        assert_eq!(tiny.surface, again.surface);
    }

    #[test]
    fn resize_closes_old_pool_and_forgets_its_surface() {
        let (producer, factory) = producer(None);
        let first = producer.create_or_resize(RegionId(1), 10, 10, 0, 0);
        let (_, old_source) = factory.last();
        old_source.push(Timestamp(1));
        let held = producer.drain(first.surface).unwrap();

        let second = producer.create_or_resize(RegionId(1), 20, 10, 0, 0);
        assert_ne!(first.surface, second.surface);
        assert!(old_source.is_closed());
        assert_eq!(old_source.reclaimed_count(), 1);
        drop(held);
        assert_eq!(old_source.reclaimed_count(), 1);

        assert!(matches!(
            producer.drain(first.surface),
            Err(Error::UnknownSurface(_))
        ));
        assert!(producer.drain(second.surface).unwrap().is_empty());
    }

    #[test]
    fn release_surface_closes_pool() {
        let (producer, factory) = producer(None);
        let handle = producer.create_or_resize(RegionId(1), 10, 10, 0, 0);
        assert!(producer.release_surface(RegionId(1)));
        assert!(factory.last().1.is_closed());
        assert!(!producer.release_surface(RegionId(1)));
        assert!(producer.drain(handle.surface).is_err());
    }
}
