use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::storage::SnapshotOrigin;
use crate::timer::{Phase, RunState, SessionKind};

/// Every state change in the engine produces an Event.
/// The CLI prints them; the driver rebroadcasts them to subscribers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Event {
    PhaseStarted {
        phase: Phase,
        duration_secs: f64,
        completed_work_sessions: u32,
        at: DateTime<Utc>,
    },
    TimerPaused {
        phase: Phase,
        remaining_secs: f64,
        at: DateTime<Utc>,
    },
    TimerResumed {
        phase: Phase,
        remaining_secs: f64,
        at: DateTime<Utc>,
    },
    /// The countdown reached zero and the cycle advanced.
    PhaseCompleted {
        completed: Phase,
        next: Phase,
        completed_work_sessions: u32,
        at: DateTime<Utc>,
    },
    PhaseSkipped {
        skipped: Phase,
        next: Phase,
        elapsed_min: u32,
        at: DateTime<Utc>,
    },
    TimerReset {
        at: DateTime<Utc>,
    },
    ProjectSwitched {
        project_id: Option<String>,
        paused: bool,
        at: DateTime<Utc>,
    },
    /// A snapshot was reconciled into live state.
    Restored {
        origin: SnapshotOrigin,
        phase: Phase,
        run_state: RunState,
        remaining_secs: f64,
        /// The snapshot's phase finished while nobody was watching.
        boundary_crossed: bool,
        at: DateTime<Utc>,
    },
    SessionLogged {
        kind: SessionKind,
        duration_min: u32,
        project_id: Option<String>,
        at: DateTime<Utc>,
    },
    StateSnapshot {
        phase: Phase,
        run_state: RunState,
        remaining_secs: f64,
        total_secs: f64,
        completed_work_sessions: u32,
        project_id: Option<String>,
        advisory: Option<String>,
        at: DateTime<Utc>,
    },
}
