//! Reconstructs present-moment timer state from a possibly stale snapshot.
//!
//! Pure: takes candidates and `now`, returns the clock to install. The engine
//! applies side effects (logging, persistence, notifications).
//!
//! At most one phase boundary is replayed. When a running snapshot's phase
//! would have finished during the gap, that phase counts as completed and
//! the next phase starts with its full configured duration, whatever the
//! length of the gap.

use chrono::{DateTime, Utc};

use super::clock::PhaseClock;
use super::phase::{Phase, RunState};
use crate::storage::{Candidate, SnapshotOrigin};

/// The phase that finished unobserved while the process was away.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CrossedBoundary {
    pub completed: Phase,
    /// Configured length of the completed phase, which is what gets logged.
    pub configured_minutes: u32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Restoration {
    pub origin: SnapshotOrigin,
    pub clock: PhaseClock,
    pub crossed: Option<CrossedBoundary>,
    /// Seconds between the snapshot and `now`, clamped at zero.
    pub gap_secs: f64,
}

impl Restoration {
    /// Whether the countdown should be ticking after the restore.
    pub fn should_tick(&self) -> bool {
        self.clock.is_running() && self.clock.time_remaining_secs() > 0.0
    }
}

/// The freshest candidate. Candidates arrive in rank order and an earlier
/// candidate wins a tie.
pub fn pick_freshest(candidates: &[Candidate]) -> Option<&Candidate> {
    candidates.iter().fold(None, |best: Option<&Candidate>, c| match best {
        Some(b) if b.snapshot.last_update_timestamp >= c.snapshot.last_update_timestamp => Some(b),
        _ => Some(c),
    })
}

/// Reconcile the freshest of `candidates` against `now`. `None` means
/// nothing to restore.
pub fn reconcile(
    candidates: &[Candidate],
    warmup_minutes: u32,
    now: DateTime<Utc>,
) -> Option<Restoration> {
    let candidate = pick_freshest(candidates)?;
    let snapshot = &candidate.snapshot;
    let settings = snapshot.settings(warmup_minutes);
    let gap_secs = ((now - snapshot.last_update_timestamp).num_milliseconds() as f64 / 1000.0)
        .max(0.0);

    let mut clock = PhaseClock::new(settings);
    let mut crossed = None;

    match snapshot.run_state {
        RunState::Idle => {
            clock.restore(
                settings,
                snapshot.phase,
                settings.duration_secs(snapshot.phase),
                RunState::Idle,
                snapshot.completed_work_sessions,
            );
        }
        RunState::Paused if snapshot.time_remaining_seconds <= 0.0 => {
            // A paused phase with nothing left was saved inconsistently.
            clock.restore(
                settings,
                snapshot.phase,
                settings.duration_secs(snapshot.phase),
                RunState::Idle,
                snapshot.completed_work_sessions,
            );
        }
        RunState::Paused => {
            clock.restore(
                settings,
                snapshot.phase,
                snapshot.time_remaining_seconds,
                RunState::Paused,
                snapshot.completed_work_sessions,
            );
        }
        RunState::Running => {
            let projected = snapshot.time_remaining_seconds - gap_secs;
            if projected > 0.0 {
                clock.restore(
                    settings,
                    snapshot.phase,
                    projected,
                    RunState::Running,
                    snapshot.completed_work_sessions,
                );
            } else {
                clock.restore(
                    settings,
                    snapshot.phase,
                    0.0,
                    RunState::Running,
                    snapshot.completed_work_sessions,
                );
                crossed = Some(CrossedBoundary {
                    completed: snapshot.phase,
                    configured_minutes: settings.minutes(snapshot.phase),
                });
                clock.start_next_phase();
                clock.run();
            }
        }
    }

    Some(Restoration {
        origin: candidate.origin,
        clock,
        crossed,
        gap_secs,
    })
}
