//! The countdown driver under tokio's paused clock.

mod common;

use std::sync::Arc;
use std::time::Duration;

use common::{settings, Harness};
use pomotune_core::platform::MusicOutcome;
use pomotune_core::storage::SnapshotStore;
use pomotune_core::timer::{DriverSettings, Phase, RunState, TimerDriver, TimerSettings};
use pomotune_core::Event;

fn remaining(event: &Event) -> f64 {
    match event {
        Event::StateSnapshot { remaining_secs, .. } => *remaining_secs,
        other => panic!("expected a state snapshot, got {other:?}"),
    }
}

fn run_state(event: &Event) -> RunState {
    match event {
        Event::StateSnapshot { run_state, .. } => *run_state,
        other => panic!("expected a state snapshot, got {other:?}"),
    }
}

#[tokio::test(start_paused = true)]
async fn test_countdown_ticks_once_per_second() {
    let h = Harness::new();
    let handle = TimerDriver::spawn(h.engine(settings(0)), DriverSettings::default());

    handle.start().await.unwrap();
    tokio::time::sleep(Duration::from_millis(5_500)).await;

    let state = handle.snapshot().await.unwrap();
    assert_eq!(run_state(&state), RunState::Running);
    assert_eq!(remaining(&state), 1495.0);
}

#[tokio::test(start_paused = true)]
async fn test_countdown_stops_while_paused() {
    let h = Harness::new();
    let handle = TimerDriver::spawn(h.engine(settings(0)), DriverSettings::default());

    handle.start().await.unwrap();
    tokio::time::sleep(Duration::from_millis(3_500)).await;
    handle.notification("pause").await.unwrap();
    tokio::time::sleep(Duration::from_secs(30)).await;

    let state = handle.snapshot().await.unwrap();
    assert_eq!(run_state(&state), RunState::Paused);
    assert_eq!(remaining(&state), 1497.0);

    handle.resume().await.unwrap();
    tokio::time::sleep(Duration::from_millis(2_500)).await;
    assert_eq!(remaining(&handle.snapshot().await.unwrap()), 1495.0);
}

#[tokio::test(start_paused = true)]
async fn test_periodic_persistence_while_running() {
    let h = Harness::new();
    let handle = TimerDriver::spawn(
        h.engine(settings(0)),
        DriverSettings::default().with_persist_interval_secs(10),
    );

    handle.start().await.unwrap();
    tokio::time::sleep(Duration::from_millis(9_500)).await;
    let persisted = h.durable.load().unwrap().unwrap();
    assert_eq!(persisted.time_remaining_seconds, 1500.0);

    tokio::time::sleep(Duration::from_secs(1)).await;
    let persisted = h.durable.load().unwrap().unwrap();
    assert_eq!(persisted.time_remaining_seconds, 1490.0);
}

#[tokio::test(start_paused = true)]
async fn test_phase_completion_is_broadcast() {
    let h = Harness::new();
    let handle = TimerDriver::spawn(
        h.engine(TimerSettings {
            work_minutes: 1,
            ..settings(0)
        }),
        DriverSettings::default(),
    );
    let mut events = handle.subscribe();

    handle.start().await.unwrap();
    tokio::time::sleep(Duration::from_millis(60_500)).await;

    let mut seen = Vec::new();
    while let Ok(event) = events.try_recv() {
        seen.push(event);
    }
    assert!(matches!(seen[0], Event::PhaseStarted { phase: Phase::Work, .. }));
    assert!(seen.iter().any(|e| matches!(
        e,
        Event::PhaseCompleted {
            completed: Phase::Work,
            next: Phase::ShortBreak,
            ..
        }
    )));
    assert!(seen
        .iter()
        .any(|e| matches!(e, Event::SessionLogged { duration_min: 1, .. })));
}

#[tokio::test(start_paused = true)]
async fn test_music_failure_becomes_advisory() {
    let h = Harness::new();
    h.music.answer_with(MusicOutcome::failed("Playlist not found"));
    let handle = TimerDriver::spawn(
        h.engine(settings(0)),
        DriverSettings::default().with_music(Arc::new(h.music.clone())),
    );

    handle.start().await.unwrap();
    tokio::time::sleep(Duration::from_millis(100)).await;

    match handle.snapshot().await.unwrap() {
        Event::StateSnapshot {
            advisory,
            run_state,
            ..
        } => {
            assert_eq!(advisory.as_deref(), Some("Playlist not found"));
            assert_eq!(run_state, RunState::Running, "music never blocks the timer");
        }
        other => panic!("unexpected {other:?}"),
    }
}

#[tokio::test(start_paused = true)]
async fn test_unknown_notification_action_is_rejected() {
    let h = Harness::new();
    let handle = TimerDriver::spawn(h.engine(settings(0)), DriverSettings::default());
    assert!(handle.notification("snooze").await.is_err());
}

#[tokio::test(start_paused = true)]
async fn test_shutdown_persists_and_returns_engine() {
    let h = Harness::new();
    let handle = TimerDriver::spawn(h.engine(settings(0)), DriverSettings::default());
    handle.start().await.unwrap();
    tokio::time::sleep(Duration::from_millis(4_500)).await;

    let engine = handle.shutdown().await.unwrap();
    assert_eq!(engine.time_remaining_secs(), 1496.0);
    let persisted = h.durable.load().unwrap().unwrap();
    assert_eq!(persisted.time_remaining_seconds, 1496.0);
}
