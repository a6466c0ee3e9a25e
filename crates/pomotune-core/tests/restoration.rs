//! Restoring timer state across process restarts and suspensions.

mod common;

use std::sync::Arc;

use chrono::Duration;
use common::{settings, t0, Harness};
use pomotune_core::storage::{
    KvSnapshotStore, MirrorSet, SnapshotOrigin, SnapshotStore,
};
use pomotune_core::platform::LiveStatusHost;
use pomotune_core::testing::LoggedSession;
use pomotune_core::timer::{Phase, RunState, SessionKind, TimerEngine, TimerSnapshot};
use pomotune_core::{Database, Event};

fn running_work(remaining: f64, at: chrono::DateTime<chrono::Utc>) -> TimerSnapshot {
    TimerSnapshot {
        phase: Phase::Work,
        time_remaining_seconds: remaining,
        run_state: RunState::Running,
        completed_work_sessions: 0,
        last_update_timestamp: at,
        work_duration_minutes: 25,
        short_break_duration_minutes: 5,
        long_break_duration_minutes: 15,
        sessions_until_long_break: 4,
    }
}

#[test]
fn test_nothing_persisted_stays_idle() {
    let h = Harness::new();
    let mut engine = h.engine(settings(0));
    assert!(engine.restore().is_none());
    assert_eq!(engine.run_state(), RunState::Idle);
}

#[test]
fn test_paused_overnight_restores_unchanged() {
    let h = Harness::new();
    let mut first = h.engine(settings(0));
    first.start();
    h.run_ticks(&mut first, 10);
    first.pause();
    drop(first);

    h.time.advance_secs(3600);
    let mut second = h.engine(settings(0));
    let event = second.restore().unwrap();

    assert!(matches!(
        event,
        Event::Restored {
            run_state: RunState::Paused,
            boundary_crossed: false,
            ..
        }
    ));
    assert_eq!(second.run_state(), RunState::Paused);
    assert_eq!(second.phase(), Phase::Work);
    assert_eq!(second.time_remaining_secs(), 1490.0);
    assert!(h.stats.sessions().is_empty());
}

#[test]
fn test_running_restore_subtracts_gap_and_rearms_notification() {
    let h = Harness::new();
    let mut first = h.engine(settings(0));
    first.start();
    h.run_ticks(&mut first, 100);
    first.persist();
    drop(first);

    h.platform.clear();
    h.time.advance_secs(200);
    let mut second = h.engine(settings(0));
    second.restore();

    assert_eq!(second.run_state(), RunState::Running);
    assert_eq!(second.time_remaining_secs(), 1200.0);
    assert_eq!(h.platform.pending_completion(), Some(1200.0));
    assert_eq!(second.accounting().session_start(), Some(h.now()));
}

#[test]
fn test_single_boundary_replay() {
    let h = Harness::new();
    h.durable.save(&running_work(30.0, t0())).unwrap();
    h.time.advance_secs(90);

    let mut engine = h.engine(settings(0));
    let event = engine.restore().unwrap();

    assert!(matches!(
        event,
        Event::Restored {
            origin: SnapshotOrigin::Durable,
            phase: Phase::ShortBreak,
            run_state: RunState::Running,
            boundary_crossed: true,
            ..
        }
    ));
    assert_eq!(
        h.stats.sessions(),
        vec![LoggedSession {
            kind: SessionKind::Work,
            minutes: 25,
            project_id: None
        }]
    );
    assert_eq!(engine.phase(), Phase::ShortBreak);
    assert_eq!(engine.completed_work_sessions(), 1);
    assert_eq!(engine.time_remaining_secs(), 300.0);

    // Re-persisted straight away, to both mirrors.
    let durable = h.durable.load().unwrap().unwrap();
    assert_eq!(durable.phase, Phase::ShortBreak);
    assert_eq!(durable.last_update_timestamp, t0() + Duration::seconds(90));
    assert_eq!(h.live.len(), 1);
}

#[test]
fn test_repeated_restore_is_debounced() {
    let h = Harness::new();
    h.durable.save(&running_work(30.0, t0())).unwrap();
    h.time.advance_secs(90);

    let mut engine = h.engine(settings(0));
    assert!(engine.restore().is_some());
    let state = engine.timer_snapshot();

    h.time.advance(Duration::milliseconds(500));
    assert!(engine.restore().is_none());
    let again = engine.timer_snapshot();
    assert_eq!(again.phase, state.phase);
    assert_eq!(again.time_remaining_seconds, state.time_remaining_seconds);
    assert_eq!(again.completed_work_sessions, state.completed_work_sessions);
    assert_eq!(h.stats.sessions().len(), 1, "boundary logged once");
}

#[test]
fn test_restore_after_a_tick_is_not_debounced() {
    let h = Harness::new();
    h.durable.save(&running_work(600.0, t0())).unwrap();
    let mut engine = h.engine(settings(0));
    assert!(engine.restore().is_some());
    h.run_ticks(&mut engine, 1);
    assert!(engine.restore().is_some());
}

#[test]
fn test_reset_clears_both_mirrors() {
    let h = Harness::new();
    let mut engine = h.engine(settings(0));
    engine.start();
    h.run_ticks(&mut engine, 30);
    engine.persist();
    assert!(h.durable.load().unwrap().is_some());
    assert_eq!(h.live.len(), 1);

    engine.reset();
    assert!(h.durable.load().unwrap().is_none());
    assert!(h.live.is_empty());

    let mut fresh = h.engine(settings(0));
    assert!(fresh.restore().is_none());
    assert_eq!(fresh.run_state(), RunState::Idle);
}

#[test]
fn test_fresher_live_status_wins() {
    let h = Harness::new();
    h.durable.save(&running_work(600.0, t0())).unwrap();
    h.live
        .seed(running_work(300.0, t0() + Duration::seconds(100)));
    h.time.advance_secs(100);

    let mut engine = h.engine(settings(0));
    let event = engine.restore().unwrap();
    assert!(matches!(
        event,
        Event::Restored {
            origin: SnapshotOrigin::LiveStatus,
            ..
        }
    ));
    assert_eq!(engine.time_remaining_secs(), 300.0);
}

#[test]
fn test_equal_timestamps_prefer_durable() {
    let h = Harness::new();
    h.durable.save(&running_work(600.0, t0())).unwrap();
    h.live.seed(running_work(300.0, t0()));

    let mut engine = h.engine(settings(0));
    engine.restore();
    assert_eq!(engine.time_remaining_secs(), 600.0);
}

#[test]
fn test_torn_down_live_status_falls_back_to_durable() {
    let h = Harness::new();
    let mut first = h.engine(settings(0));
    first.start();
    h.run_ticks(&mut first, 60);
    first.persist();
    h.live.tear_down();

    let mut second = h.engine(settings(0));
    let event = second.restore().unwrap();
    assert!(matches!(
        event,
        Event::Restored {
            origin: SnapshotOrigin::Durable,
            ..
        }
    ));
    assert_eq!(second.time_remaining_secs(), 1440.0);
}

#[test]
fn test_duplicate_live_activities_collapse_on_persist() {
    let h = Harness::new();
    h.live.seed(running_work(100.0, t0()));
    h.live.seed(running_work(200.0, t0()));
    let mut engine = h.engine(settings(0));
    engine.start();
    assert_eq!(h.live.len(), 1);
}

#[test]
fn test_live_status_follows_project_switch() {
    let h = Harness::new();
    let mut engine = h.engine(settings(0));
    engine.switch_project(Some("alpha".to_string()));
    engine.start();
    h.run_ticks(&mut engine, 60);

    engine.switch_project(Some("beta".to_string()));
    let activities = h.live.activities().unwrap();
    assert_eq!(activities.len(), 1);
    assert_eq!(activities[0].attributes.project_id.as_deref(), Some("beta"));
    assert_eq!(activities[0].state.run_state, RunState::Paused);
}

#[test]
fn test_durable_database_store_round_trip() {
    let h = Harness::new();
    let db = Arc::new(Database::open_memory().unwrap());
    let mirrors = MirrorSet::new().with(Arc::new(KvSnapshotStore::new(db.clone())));

    let mut first = TimerEngine::new(settings(0))
        .with_clock(Arc::new(h.time.clone()))
        .with_mirrors(mirrors.clone());
    first.start();
    h.run_ticks(&mut first, 25);
    first.pause();

    let mut second = TimerEngine::new(settings(0))
        .with_clock(Arc::new(h.time.clone()))
        .with_mirrors(mirrors);
    second.restore();
    assert_eq!(second.run_state(), RunState::Paused);
    assert_eq!(second.time_remaining_secs(), 1475.0);
}

#[test]
fn test_corrupt_durable_snapshot_is_discarded() {
    let h = Harness::new();
    let db = Arc::new(Database::open_memory().unwrap());
    db.kv_set("timer_snapshot", "{\"phase\": \"work\", \"timeRem").unwrap();
    let mut engine = TimerEngine::new(settings(0))
        .with_clock(Arc::new(h.time.clone()))
        .with_mirrors(MirrorSet::new().with(Arc::new(KvSnapshotStore::new(db.clone()))));

    assert!(engine.restore().is_none());
    assert_eq!(engine.run_state(), RunState::Idle);
    assert!(db.kv_get("timer_snapshot").unwrap().is_none());
}

#[test]
fn test_legacy_blob_is_restored() {
    let h = Harness::new();
    let db = Arc::new(Database::open_memory().unwrap());
    let legacy = format!(
        r#"{{"phase":"shortBreak","timeRemainingSeconds":200.0,"isRunning":true,"isPaused":true,
            "completedWorkSessions":3,"lastUpdateTimestamp":{},
            "workDurationMinutes":50,"shortBreakDurationMinutes":10,
            "longBreakDurationMinutes":30,"sessionsUntilLongBreak":4}}"#,
        t0().timestamp()
    );
    db.kv_set("timer_snapshot", &legacy).unwrap();
    h.time.advance_secs(5000);

    let mut engine = TimerEngine::new(settings(0))
        .with_clock(Arc::new(h.time.clone()))
        .with_mirrors(MirrorSet::new().with(Arc::new(KvSnapshotStore::new(db))));
    engine.restore();

    assert_eq!(engine.run_state(), RunState::Paused);
    assert_eq!(engine.phase(), Phase::ShortBreak);
    assert_eq!(engine.time_remaining_secs(), 200.0);
    assert_eq!(engine.completed_work_sessions(), 3);
    assert_eq!(engine.settings().work_minutes, 50);
}
