//! Pure phase state: which phase is active, how much of it remains, and
//! whether it is advancing. No I/O and no wall-clock reads; the countdown
//! only moves when `tick()` is called.

use serde::{Deserialize, Serialize};

use super::phase::{Phase, RunState, TimerSettings};

/// Result of a single `tick()`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    /// The clock is not running; nothing changed.
    Inactive,
    /// One second elapsed and the phase is still in progress.
    Ticked,
    /// The phase reached zero. The caller must log and transition.
    Completed,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PhaseClock {
    settings: TimerSettings,
    phase: Phase,
    time_remaining_secs: f64,
    run_state: RunState,
    completed_work_sessions: u32,
}

impl PhaseClock {
    /// A fresh idle clock resting on the settings' initial phase.
    pub fn new(settings: TimerSettings) -> Self {
        let phase = settings.initial_phase();
        Self {
            time_remaining_secs: settings.duration_secs(phase),
            settings,
            phase,
            run_state: RunState::Idle,
            completed_work_sessions: 0,
        }
    }

    // ── Queries ──────────────────────────────────────────────────────

    pub fn settings(&self) -> &TimerSettings {
        &self.settings
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn run_state(&self) -> RunState {
        self.run_state
    }

    /// Remaining seconds of the active phase. Always zero while idle.
    pub fn time_remaining_secs(&self) -> f64 {
        if self.run_state == RunState::Idle {
            0.0
        } else {
            self.time_remaining_secs
        }
    }

    /// Seconds the phase will run for once started, including while idle.
    pub fn pending_secs(&self) -> f64 {
        self.time_remaining_secs
    }

    pub fn completed_work_sessions(&self) -> u32 {
        self.completed_work_sessions
    }

    pub fn is_running(&self) -> bool {
        self.run_state == RunState::Running
    }

    // ── Transitions ──────────────────────────────────────────────────

    /// Enter the warmup phase. Only valid from `Idle` with a non-zero warmup.
    pub fn start_warmup(&mut self) -> bool {
        if self.run_state != RunState::Idle || !self.settings.has_warmup() {
            return false;
        }
        self.phase = Phase::Warmup;
        self.time_remaining_secs = self.settings.duration_secs(Phase::Warmup);
        self.run_state = RunState::Running;
        true
    }

    /// Bypass warmup and enter work directly, running. Only valid from `Idle`.
    pub fn start_work_directly(&mut self) -> bool {
        if self.run_state != RunState::Idle {
            return false;
        }
        self.phase = Phase::Work;
        self.time_remaining_secs = self.settings.duration_secs(Phase::Work);
        self.run_state = RunState::Running;
        true
    }

    /// Advance to the phase that follows the current one and load its full
    /// duration. Counts a work session when leaving `Work`. The run state is
    /// left untouched.
    pub fn start_next_phase(&mut self) -> Phase {
        if self.phase == Phase::Work {
            self.completed_work_sessions = self.completed_work_sessions.saturating_add(1);
        }
        self.phase = self
            .settings
            .next_phase(self.phase, self.completed_work_sessions);
        self.time_remaining_secs = self.settings.duration_secs(self.phase);
        self.phase
    }

    /// Make the countdown advance on the current phase.
    pub fn run(&mut self) {
        self.run_state = RunState::Running;
    }

    pub fn pause(&mut self) -> bool {
        if self.run_state != RunState::Running {
            return false;
        }
        self.run_state = RunState::Paused;
        true
    }

    pub fn resume(&mut self) -> bool {
        if self.run_state != RunState::Paused {
            return false;
        }
        self.run_state = RunState::Running;
        true
    }

    pub fn reset(&mut self) {
        self.phase = self.settings.initial_phase();
        self.time_remaining_secs = self.settings.duration_secs(self.phase);
        self.run_state = RunState::Idle;
        self.completed_work_sessions = 0;
    }

    /// Advance the countdown by exactly one second.
    pub fn tick(&mut self) -> TickOutcome {
        if self.run_state != RunState::Running {
            return TickOutcome::Inactive;
        }
        self.time_remaining_secs = (self.time_remaining_secs - 1.0).max(0.0);
        if self.time_remaining_secs <= 0.0 {
            TickOutcome::Completed
        } else {
            TickOutcome::Ticked
        }
    }

    /// Overwrite every field, as restoration does. Negative remaining time is
    /// clamped to zero.
    pub(crate) fn restore(
        &mut self,
        settings: TimerSettings,
        phase: Phase,
        time_remaining_secs: f64,
        run_state: RunState,
        completed_work_sessions: u32,
    ) {
        self.settings = settings;
        self.phase = phase;
        self.time_remaining_secs = time_remaining_secs.max(0.0);
        self.run_state = run_state;
        self.completed_work_sessions = completed_work_sessions;
    }
}
