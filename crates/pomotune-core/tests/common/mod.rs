//! Shared harness: an engine wired to recording collaborators, two
//! in-memory mirrors and a manual clock.

#![allow(dead_code)]

use std::sync::Arc;

use chrono::{DateTime, Utc};
use pomotune_core::platform::Collaborators;
use pomotune_core::storage::{LiveStatusMirror, MemorySnapshotStore, MirrorSet};
use pomotune_core::testing::{
    MemoryLiveStatusHost, RecordingMusic, RecordingPlatform, RecordingStats,
};
use pomotune_core::timer::{Clock, ManualClock, TimerEngine, TimerSettings};

pub struct Harness {
    pub time: ManualClock,
    pub platform: RecordingPlatform,
    pub stats: RecordingStats,
    pub music: RecordingMusic,
    pub durable: MemorySnapshotStore,
    pub live: MemoryLiveStatusHost,
}

pub fn t0() -> DateTime<Utc> {
    DateTime::parse_from_rfc3339("2025-03-01T09:00:00Z")
        .unwrap()
        .with_timezone(&Utc)
}

pub fn settings(warmup: u32) -> TimerSettings {
    TimerSettings {
        warmup_minutes: warmup,
        work_minutes: 25,
        short_break_minutes: 5,
        long_break_minutes: 15,
        sessions_until_long_break: 4,
    }
}

impl Harness {
    pub fn new() -> Self {
        Self {
            time: ManualClock::new(t0()),
            platform: RecordingPlatform::new(),
            stats: RecordingStats::new(),
            music: RecordingMusic::new(),
            durable: MemorySnapshotStore::durable(),
            live: MemoryLiveStatusHost::new(),
        }
    }

    pub fn mirrors(&self) -> MirrorSet {
        MirrorSet::new()
            .with(Arc::new(self.durable.clone()))
            .with(Arc::new(LiveStatusMirror::new(Arc::new(self.live.clone()))))
    }

    /// A fresh engine sharing this harness's clock, collaborators and
    /// mirrors, as a new process would after a restart.
    pub fn engine(&self, settings: TimerSettings) -> TimerEngine {
        TimerEngine::new(settings)
            .with_clock(Arc::new(self.time.clone()))
            .with_collaborators(
                Collaborators::default()
                    .with_platform(Arc::new(self.platform.clone()))
                    .with_music(Arc::new(self.music.clone()))
                    .with_stats(Arc::new(self.stats.clone()))
                    .with_projects(Arc::new(self.stats.clone())),
            )
            .with_mirrors(self.mirrors())
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.time.now()
    }

    /// Tick `n` times, advancing wall-clock time one second per tick.
    pub fn run_ticks(&self, engine: &mut TimerEngine, n: u32) {
        for _ in 0..n {
            self.time.advance_secs(1);
            engine.tick();
        }
    }
}
