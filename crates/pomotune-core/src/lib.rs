//! # Pomotune Core Library
//!
//! Core logic for the Pomotune Pomodoro timer: the phase cycle, session
//! accounting, and the persistence that lets a timer survive its process
//! being suspended or killed. The `pomotune` CLI is a thin layer over this
//! crate.
//!
//! ## Architecture
//!
//! - **Timer**: a phase state machine ([`PhaseClock`]) owned by the
//!   [`TimerEngine`], which logs sessions, drives notifications and music,
//!   and mirrors every change to persistent storage. [`TimerDriver`] runs an
//!   engine on a tokio task with a one-second countdown.
//! - **Restoration**: on start-up or wake, the freshest persisted
//!   [`TimerSnapshot`] is reconciled against elapsed wall-clock time.
//! - **Storage**: SQLite for sessions, projects and the durable snapshot;
//!   TOML for configuration.
//! - **Platform**: traits for notifications, the live-status surface, music
//!   services, statistics and projects, chosen when the engine is composed.

pub mod error;
pub mod events;
pub mod platform;
pub mod storage;
#[cfg(any(test, feature = "test-support"))]
pub mod testing;
pub mod timer;

pub use error::{ConfigError, CoreError, DatabaseError, Result, SnapshotError};
pub use events::Event;
pub use platform::{Collaborators, LiveStatusHost, MusicOutcome, MusicProvider, Platform};
pub use storage::{Config, Database, MirrorSet, Project, SessionRecord, Stats};
pub use timer::{
    DriverHandle, DriverSettings, Phase, PhaseClock, RunState, SessionKind, TimerDriver,
    TimerEngine, TimerSettings, TimerSnapshot,
};
