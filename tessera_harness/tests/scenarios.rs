// Copyright 2026 the Tessera Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! End-to-end frame matching scenarios.

use tessera_core::Error;
use tessera_core::compositor::{ForeignId, LiveItem};
use tessera_core::config::{EngineConfig, PoolConfig};
use tessera_core::region::{RegionDecl, RegionId, RegionUpdate};
use tessera_core::time::Timestamp;
use tessera_core::trace::{
    FramesInvalidatedEvent, InvalidationCause, ReclaimReason, Registration,
};
use tessera_debug::recorder::RecordedEvent;
use tessera_harness::{Harness, SyncGrade, init_tracing};

const A: RegionId = RegionId(1);
const B: RegionId = RegionId(2);

fn harness() -> Harness {
    init_tracing();
    Harness::new()
}

fn invalidations(h: &Harness) -> Vec<FramesInvalidatedEvent> {
    h.events()
        .into_iter()
        .filter_map(|e| match e {
            RecordedEvent::FramesInvalidated(e) => Some(e),
            _ => None,
        })
        .collect()
}

#[test]
fn frame_waits_only_for_buffered_regions() {
    let mut h = harness();
    let a = h.surface(A, 64, 64).unwrap();
    h.register(100, [RegionDecl::buffered(A), RegionDecl::pass_through(B)])
        .unwrap();
    assert!(h.presented().is_empty());

    assert_eq!(h.produce(a.surface, 120).unwrap(), 1);
    assert_eq!(h.presented(), [100]);
    let frame = h.presenter.last().unwrap();
    assert!(frame.is_complete());
    assert_eq!(frame.slots[0].buffer, Some(Timestamp(120)));
    assert_eq!(frame.slots[1].buffer, None);
    assert_eq!(frame.changes.created, [A, B]);

    h.run_until_idle().unwrap();
    assert_eq!(h.ledger().live(), 0);
    assert!(h.ledger().is_balanced());
}

#[test]
fn buffer_matches_latest_frame_started_before_it() {
    let mut h = harness();
    let a = h.surface(A, 64, 64).unwrap();
    h.register(100, [A]).unwrap();
    h.register(200, [A]).unwrap();

    h.produce(a.surface, 150).unwrap();
    assert_eq!(h.presented(), [100]);
    assert_eq!(h.pending(), [200]);
    assert!(invalidations(&h).is_empty());
}

#[test]
fn later_buffer_invalidates_waiting_frame() {
    let mut h = harness();
    let a = h.surface(A, 64, 64).unwrap();
    h.register(100, [A]).unwrap();
    h.register(200, [A]).unwrap();

    h.produce(a.surface, 250).unwrap();
    assert_eq!(h.presented(), [200]);
    assert!(h.pending().is_empty());
    assert_eq!(
        invalidations(&h),
        [FramesInvalidatedEvent {
            kept: Timestamp(200),
            dropped: 1,
            oldest_dropped: Timestamp(100),
            cause: InvalidationCause::LaterBuffer,
        }]
    );
}

#[test]
fn later_ready_frame_invalidates_waiting_frame() {
    let mut h = harness();
    h.surface(A, 64, 64).unwrap();
    h.register(100, [A]).unwrap();
    h.register(200, [RegionDecl::pass_through(B)]).unwrap();
    assert!(h.presented().is_empty());

    h.tick().unwrap();
    assert_eq!(h.presented(), [200]);
    let causes: Vec<_> = invalidations(&h).iter().map(|e| e.cause).collect();
    assert_eq!(causes, [InvalidationCause::LaterReadyFrame]);
}

#[test]
fn fourth_buffer_in_small_pool_reclaims_oldest() {
    init_tracing();
    let config = EngineConfig::default().with_pool(PoolConfig {
        max_outstanding: 3,
        keep_open: 3,
        release_delay_ticks: 3,
    });
    let mut h = Harness::with_config(config);
    let a = h.surface(A, 64, 64).unwrap();

    assert_eq!(h.produce_batch(a.surface, &[10, 20, 30, 40]).unwrap(), 4);
    assert!(h.ledger().peak_live_on(a.surface) <= 3);
    assert_eq!(
        h.ledger().reclaimed_on(a.surface),
        [Timestamp(10), Timestamp(20), Timestamp(30)]
    );
    let pressure = h
        .events()
        .iter()
        .filter(|e| {
            matches!(e, RecordedEvent::BufferReclaimed(r) if r.reason == ReclaimReason::Pressure)
        })
        .count();
    assert_eq!(pressure, 2);

    h.run_until_idle().unwrap();
    assert!(h.ledger().is_balanced());
}

#[test]
fn consecutive_empty_frames_present_once() {
    let mut h = harness();
    assert_eq!(h.register(1, Vec::<RegionId>::new()).unwrap(), Registration::Queued);
    assert_eq!(
        h.register(2, Vec::<RegionId>::new()).unwrap(),
        Registration::Coalesced
    );
    assert_eq!(h.pending(), [1]);

    // Pump, then the parked empty frame is presented a tick later.
    h.tick().unwrap();
    assert!(h.presented().is_empty());
    assert!(h.engine.compositor_available());
    h.tick().unwrap();
    assert_eq!(h.presented(), [1]);

    h.run_until_idle().unwrap();
    assert_eq!(h.presented(), [1]);
}

#[test]
fn non_empty_frame_supersedes_parked_empty_frame() {
    let mut h = harness();
    let a = h.surface(A, 64, 64).unwrap();
    h.register(1, Vec::<RegionId>::new()).unwrap();
    h.tick().unwrap();
    assert!(h.presented().is_empty());

    // The buffer presents frame 2 before the parked frame's tick comes round.
    h.register(2, [A]).unwrap();
    h.produce(a.surface, 5).unwrap();
    assert_eq!(h.presented(), [2]);

    h.run_until_idle().unwrap();
    assert_eq!(h.presented(), [2]);
    assert!(h.events().iter().any(|e| matches!(
        e,
        RecordedEvent::FrameReleased(r) if r.timestamp == Timestamp(1) && !r.presented
    )));
}

#[test]
fn busy_compositor_presents_one_frame_per_cycle() {
    let mut h = harness();
    h.register(1, [RegionDecl::pass_through(A)]).unwrap();
    h.register(2, [RegionDecl::pass_through(A)]).unwrap();

    h.tick().unwrap();
    assert_eq!(h.presented(), [1]);
    assert!(!h.engine.compositor_available());
    h.tick().unwrap();
    assert_eq!(h.presented(), [1, 2]);

    h.run_until_idle().unwrap();
    let report = h.grade::<8>();
    assert_eq!(report.total_frames, 2);
    assert_eq!(report.violations, 0);
    assert_eq!(report.grade, SyncGrade::A, "{report}");
}

#[test]
fn update_clearing_overlay_presents_on_next_tick() {
    let mut h = harness();
    h.register(100, [B]).unwrap();
    let update = RegionUpdate::new(30, 20, 5, 5, false, None);
    assert!(h.update(B, 100, update).unwrap());
    assert!(!h.update(B, 101, update).unwrap());
    assert!(h.presented().is_empty());

    h.tick().unwrap();
    assert_eq!(h.presented(), [100]);
}

#[test]
fn stale_inputs_are_ignored() {
    let mut h = harness();
    let a = h.surface(A, 64, 64).unwrap();
    h.register(100, [A]).unwrap();
    assert_eq!(h.register(90, [A]).unwrap(), Registration::Stale);

    h.produce(a.surface, 50).unwrap();
    assert!(h.presented().is_empty());
    assert_eq!(h.pending(), [100]);
    assert!(h.events().iter().any(|e| matches!(
        e,
        RecordedEvent::BufferMatched(m) if m.frame.is_none()
    )));

    h.ticks_n(3).unwrap();
    assert_eq!(h.ledger().live_on(a.surface), 0);
}

#[test]
fn resize_replaces_surface() {
    let mut h = harness();
    let old = h.surface(A, 64, 64).unwrap();
    assert_eq!(h.surface(A, 64, 64).unwrap().surface, old.surface);

    let new = h.surface(A, 128, 64).unwrap();
    assert_ne!(new.surface, old.surface);
    assert!(h.ledger().is_closed(old.surface));
    assert!(matches!(
        h.produce(old.surface, 10),
        Err(Error::UnknownSurface(s)) if s == old.surface
    ));
    assert_eq!(h.ledger().spec(new.surface).unwrap().width, 128);
}

#[test]
fn fill_sizes_follow_viewport() {
    let h = harness();
    h.engine.set_viewport(1080, 1920).unwrap();
    let base = h.surface(RegionId::BASE, -1, -1).unwrap();
    assert_eq!((base.width, base.height), (1080, 1920));
    let tiny = h.surface(A, 0, -3).unwrap();
    assert_eq!((tiny.width, tiny.height), (1, 1));
}

#[test]
fn foreign_items_stay_behind_regions() {
    let mut h = harness();
    h.engine.insert_foreign(ForeignId(7), 0).unwrap();
    h.register(1, [RegionDecl::pass_through(RegionId::BASE)]).unwrap();
    h.tick().unwrap();

    let frame = h.presenter.last().unwrap();
    assert_eq!(
        frame.changes.order,
        [LiveItem::Foreign(ForeignId(7)), LiveItem::Region(RegionId::BASE)]
    );
    assert_eq!(h.engine.live_items(), frame.changes.order);
    assert!(h.engine.remove_foreign(ForeignId(7)).unwrap());
}

#[test]
fn removed_regions_are_reported() {
    let mut h = harness();
    h.register(1, [RegionDecl::pass_through(A), RegionDecl::pass_through(B)])
        .unwrap();
    h.tick().unwrap();
    h.register(2, [RegionDecl::pass_through(B)]).unwrap();
    h.run_until_idle().unwrap();

    let frames = h.presenter.frames();
    assert_eq!(frames.len(), 2);
    assert_eq!(frames[1].changes.removed, [A]);
    assert_eq!(frames[1].changes.updated, [B]);
    assert!(frames[1].changes.created.is_empty());
}

#[test]
fn dispose_releases_everything() {
    let mut h = harness();
    let base = h.surface(RegionId::BASE, 64, 64).unwrap();
    let a = h.surface(A, 32, 32).unwrap();
    h.register(100, [RegionId::BASE]).unwrap();
    h.produce(base.surface, 110).unwrap();
    h.register(200, [RegionId::BASE, A]).unwrap();
    h.produce(a.surface, 210).unwrap();
    assert_eq!(h.pending(), [200]);

    h.engine.dispose();
    h.engine.dispose();
    assert!(h.scheduler.is_cancelled());
    assert!(h.ledger().is_balanced());
    assert!(h.ledger().is_closed(base.surface));
    assert!(h.ledger().is_closed(a.surface));
    assert_eq!(h.presenter.teardowns(), [vec![RegionId::BASE]]);

    assert!(matches!(h.tick(), Err(Error::Disposed)));
    assert!(matches!(h.register(300, [A]), Err(Error::Disposed)));
    assert!(matches!(
        h.engine.create_or_resize_surface(A, 1, 1, 0, 0),
        Err(Error::Disposed)
    ));
    assert!(matches!(h.engine.release_surface(A), Err(Error::Disposed)));
}

#[test]
fn release_surface_closes_its_pool() {
    let mut h = harness();
    let a = h.surface(A, 64, 64).unwrap();
    h.register(100, [A, B]).unwrap();
    h.produce(a.surface, 110).unwrap();

    h.engine.release_surface(A).unwrap();
    assert!(h.ledger().is_closed(a.surface));
    assert_eq!(h.ledger().live_on(a.surface), 0);
    assert!(h.engine.surface(A).is_none());
    h.engine.release_surface(A).unwrap();
}
