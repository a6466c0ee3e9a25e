//! Timer engine: the single owner of timer state.
//!
//! The engine drives the phase cycle, does the session accounting, and calls
//! out to its collaborators. It has no threads and no timer of its own. The
//! caller invokes `tick()` once per second while running, which is the
//! job of [`TimerDriver`](super::TimerDriver).
//!
//! ## State Transitions
//!
//! ```text
//! Idle -> Running <-> Paused
//!   ^        |          |
//!   +--------+----------+   reset
//! ```
//!
//! ## Usage
//!
//! ```ignore
//! let mut engine = TimerEngine::new(settings).with_mirrors(mirrors);
//! engine.restore();
//! engine.start();
//! // Once per second:
//! engine.tick(); // Returns Some(Event) when a phase completes
//! ```
//!
//! Every command returns the event describing what happened, or `None` when
//! the command did not apply in the current state. Secondary events (logged
//! sessions) queue up and are collected with [`TimerEngine::drain_events`].

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use tracing::{debug, info, warn};

use super::accounting::SessionAccounting;
use super::clock::{PhaseClock, TickOutcome};
use super::phase::{Phase, RunState, TimerSettings};
use super::reconciler;
use super::snapshot::TimerSnapshot;
use super::time_source::{Clock, SystemClock};
use crate::events::Event;
use crate::platform::{Collaborators, MusicController, MusicOutcome, MusicRequest};
use crate::storage::MirrorSet;

/// Default window in which a repeated restore is ignored.
pub const DEFAULT_RESTORE_DEBOUNCE_MS: i64 = 1_500;

#[derive(Debug, Clone, Copy)]
struct RestoreMark {
    at: DateTime<Utc>,
    ticks: u64,
}

pub struct TimerEngine {
    clock: PhaseClock,
    accounting: SessionAccounting,
    time: Arc<dyn Clock>,
    collaborators: Collaborators,
    mirrors: MirrorSet,
    project_id: Option<String>,
    /// User-facing message from a failed collaborator call.
    advisory: Option<String>,
    notifications: bool,
    restore_debounce: Duration,
    ticks: u64,
    last_restore: Option<RestoreMark>,
    pending: Vec<Event>,
    /// The current phase was split by a project switch; its earlier part
    /// is already logged.
    split_by_switch: bool,
}

impl std::fmt::Debug for TimerEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TimerEngine")
            .field("clock", &self.clock)
            .field("accounting", &self.accounting)
            .field("project_id", &self.project_id)
            .field("advisory", &self.advisory)
            .finish_non_exhaustive()
    }
}

impl TimerEngine {
    /// Create an idle engine with no-op collaborators and no mirrors.
    pub fn new(settings: TimerSettings) -> Self {
        Self {
            clock: PhaseClock::new(settings),
            accounting: SessionAccounting::new(),
            time: Arc::new(SystemClock),
            collaborators: Collaborators::default(),
            mirrors: MirrorSet::new(),
            project_id: None,
            advisory: None,
            notifications: true,
            restore_debounce: Duration::milliseconds(DEFAULT_RESTORE_DEBOUNCE_MS),
            ticks: 0,
            last_restore: None,
            pending: Vec::new(),
            split_by_switch: false,
        }
    }

    pub fn with_clock(mut self, time: Arc<dyn Clock>) -> Self {
        self.time = time;
        self
    }

    /// Install collaborators and read the selected project from them.
    pub fn with_collaborators(mut self, collaborators: Collaborators) -> Self {
        self.project_id = collaborators.projects.current_project_id();
        self.collaborators = collaborators;
        self.mirrors.set_project(self.project_id.as_deref());
        self
    }

    pub fn with_mirrors(mut self, mirrors: MirrorSet) -> Self {
        mirrors.set_project(self.project_id.as_deref());
        self.mirrors = mirrors;
        self
    }

    pub fn with_restore_debounce(mut self, window: Duration) -> Self {
        self.restore_debounce = window;
        self
    }

    /// Whether completion notifications are scheduled at all.
    pub fn with_notifications(mut self, enabled: bool) -> Self {
        self.notifications = enabled;
        self
    }

    pub fn set_music_controller(&mut self, music: Arc<dyn MusicController>) {
        self.collaborators.music = music;
    }

    // ── Queries ──────────────────────────────────────────────────────

    pub fn phase(&self) -> Phase {
        self.clock.phase()
    }

    pub fn run_state(&self) -> RunState {
        self.clock.run_state()
    }

    pub fn is_running(&self) -> bool {
        self.clock.is_running()
    }

    pub fn time_remaining_secs(&self) -> f64 {
        self.clock.time_remaining_secs()
    }

    pub fn completed_work_sessions(&self) -> u32 {
        self.clock.completed_work_sessions()
    }

    pub fn settings(&self) -> &TimerSettings {
        self.clock.settings()
    }

    pub fn accounting(&self) -> &SessionAccounting {
        &self.accounting
    }

    pub fn project_id(&self) -> Option<&str> {
        self.project_id.as_deref()
    }

    pub fn advisory(&self) -> Option<&str> {
        self.advisory.as_deref()
    }

    /// The persisted form of the current state.
    pub fn timer_snapshot(&self) -> TimerSnapshot {
        TimerSnapshot::capture(&self.clock, self.time.now())
    }

    /// Build a full state snapshot event.
    pub fn snapshot(&self) -> Event {
        Event::StateSnapshot {
            phase: self.clock.phase(),
            run_state: self.clock.run_state(),
            remaining_secs: self.clock.time_remaining_secs(),
            total_secs: self.clock.settings().duration_secs(self.clock.phase()),
            completed_work_sessions: self.clock.completed_work_sessions(),
            project_id: self.project_id.clone(),
            advisory: self.advisory.clone(),
            at: self.time.now(),
        }
    }

    /// Take the secondary events queued since the last call.
    pub fn drain_events(&mut self) -> Vec<Event> {
        std::mem::take(&mut self.pending)
    }

    // ── Commands ─────────────────────────────────────────────────────

    pub fn start(&mut self) -> Option<Event> {
        if self.clock.run_state() != RunState::Idle {
            return None;
        }
        let settings = *self.clock.settings();
        match self.clock.phase() {
            Phase::Warmup if settings.has_warmup() => {
                self.clock.start_warmup();
            }
            Phase::Warmup => {
                self.clock.start_work_directly();
            }
            Phase::Work if self.clock.completed_work_sessions() == 0 => {
                self.clock.run();
            }
            _ => {
                self.clock.start_next_phase();
                self.clock.run();
            }
        }
        let now = self.time.now();
        self.begin_phase(now);
        info!(phase = %self.clock.phase(), "timer started");
        Some(Event::PhaseStarted {
            phase: self.clock.phase(),
            duration_secs: self.clock.time_remaining_secs(),
            completed_work_sessions: self.clock.completed_work_sessions(),
            at: now,
        })
    }

    pub fn pause(&mut self) -> Option<Event> {
        if !self.clock.pause() {
            return None;
        }
        let now = self.time.now();
        self.accounting.on_pause(now);
        self.music(MusicRequest::Pause);
        self.cancel_notifications();
        self.persist();
        info!(phase = %self.clock.phase(), remaining = self.clock.time_remaining_secs(), "timer paused");
        Some(Event::TimerPaused {
            phase: self.clock.phase(),
            remaining_secs: self.clock.time_remaining_secs(),
            at: now,
        })
    }

    pub fn resume(&mut self) -> Option<Event> {
        if !self.clock.resume() {
            return None;
        }
        let now = self.time.now();
        self.accounting.on_resume(now);
        self.music(MusicRequest::Resume);
        self.arm_notification();
        self.persist();
        info!(phase = %self.clock.phase(), remaining = self.clock.time_remaining_secs(), "timer resumed");
        Some(Event::TimerResumed {
            phase: self.clock.phase(),
            remaining_secs: self.clock.time_remaining_secs(),
            at: now,
        })
    }

    /// End the current phase early and start the next one.
    pub fn skip(&mut self) -> Option<Event> {
        if self.clock.run_state() == RunState::Idle {
            return None;
        }
        let now = self.time.now();
        self.collaborators.platform.play_alert();

        let skipped = self.clock.phase();
        let elapsed = self.accounting.elapsed_minutes(now);
        self.log_elapsed(skipped, elapsed, now);

        let next = self.clock.start_next_phase();
        self.clock.run();
        self.begin_phase(now);
        info!(skipped = %skipped, next = %next, "phase skipped");
        Some(Event::PhaseSkipped {
            skipped,
            next,
            elapsed_min: elapsed.unwrap_or(0),
            at: now,
        })
    }

    /// Advance the countdown by one second. Returns an event only when the
    /// phase completed and the next one began.
    pub fn tick(&mut self) -> Option<Event> {
        self.ticks = self.ticks.wrapping_add(1);
        match self.clock.tick() {
            TickOutcome::Inactive | TickOutcome::Ticked => None,
            TickOutcome::Completed => Some(self.complete_phase()),
        }
    }

    fn complete_phase(&mut self) -> Event {
        let now = self.time.now();
        self.collaborators.platform.play_alert();

        let completed = self.clock.phase();
        if self.split_by_switch {
            let elapsed = self.accounting.elapsed_minutes(now);
            self.log_elapsed(completed, elapsed, now);
        } else {
            let minutes = self.clock.settings().minutes(completed);
            self.log_minutes(completed, minutes, now);
        }

        let next = self.clock.start_next_phase();
        // The completion scheduled for this moment is replaced by the
        // immediate notification.
        self.cancel_notifications();
        if self.notifications {
            let title = format!("{completed} complete");
            let body = format!("{next} has started");
            if let Err(e) = self.collaborators.platform.notify_now(&title, &body) {
                warn!(error = %e, "failed to deliver completion notification");
            }
        }
        self.clock.run();
        self.begin_phase(now);
        info!(completed = %completed, next = %next, "phase completed");
        Event::PhaseCompleted {
            completed,
            next,
            completed_work_sessions: self.clock.completed_work_sessions(),
            at: now,
        }
    }

    /// Return to idle and forget every persisted snapshot.
    pub fn reset(&mut self) -> Option<Event> {
        let now = self.time.now();
        let was_active = self.clock.run_state() != RunState::Idle;
        if was_active {
            let phase = self.clock.phase();
            let elapsed = self.accounting.elapsed_minutes(now);
            self.log_elapsed(phase, elapsed, now);
        }
        self.clock.reset();
        self.accounting.clear();
        self.split_by_switch = false;
        self.mirrors.clear_all();
        self.cancel_notifications();
        if was_active {
            self.music(MusicRequest::Pause);
        }
        info!("timer reset");
        Some(Event::TimerReset { at: now })
    }

    /// Attribute future sessions to `project_id`. A running phase is logged
    /// under the previous project and paused, so music and time stop
    /// counting towards it.
    pub fn switch_project(&mut self, project_id: Option<String>) -> Option<Event> {
        let now = self.time.now();
        let was_running = self.clock.is_running();
        if was_running {
            let phase = self.clock.phase();
            let elapsed = self.accounting.elapsed_minutes(now);
            self.log_elapsed(phase, elapsed, now);
            self.accounting.on_phase_start(now);
            self.clock.pause();
            self.accounting.on_pause(now);
            self.split_by_switch = true;
            self.music(MusicRequest::Pause);
            self.cancel_notifications();
        }
        self.project_id = project_id;
        self.mirrors.set_project(self.project_id.as_deref());
        if self.clock.run_state() != RunState::Idle {
            self.persist();
        }
        info!(project = ?self.project_id, paused = was_running, "project switched");
        Some(Event::ProjectSwitched {
            project_id: self.project_id.clone(),
            paused: was_running,
            at: now,
        })
    }

    /// Write the current state to every mirror. Failures are logged only.
    pub fn persist(&self) {
        let snapshot = self.timer_snapshot();
        debug!(
            phase = %snapshot.phase,
            run_state = ?snapshot.run_state,
            remaining = snapshot.time_remaining_seconds,
            "persisting snapshot"
        );
        self.mirrors.save_all(&snapshot);
    }

    /// Reconcile the freshest persisted snapshot into live state.
    ///
    /// Returns `None` when there is nothing to restore, or when a restore
    /// already ran within the debounce window with no tick since.
    pub fn restore(&mut self) -> Option<Event> {
        let now = self.time.now();
        if let Some(mark) = self.last_restore {
            if mark.ticks == self.ticks && now - mark.at < self.restore_debounce {
                debug!("restore debounced");
                return None;
            }
        }
        self.last_restore = Some(RestoreMark {
            at: now,
            ticks: self.ticks,
        });

        let candidates = self.mirrors.candidates();
        let warmup = self.clock.settings().warmup_minutes;
        let restored = reconciler::reconcile(&candidates, warmup, now)?;
        let resumes_ticking = restored.should_tick();

        self.clock = restored.clock;
        self.split_by_switch = false;
        match self.clock.run_state() {
            RunState::Idle => self.accounting.clear(),
            RunState::Running => self.accounting.on_phase_start(now),
            RunState::Paused => {
                self.accounting.on_phase_start(now);
                self.accounting.on_pause(now);
            }
        }

        if let Some(crossed) = restored.crossed {
            self.log_minutes(crossed.completed, crossed.configured_minutes, now);
            self.persist();
        }
        if resumes_ticking {
            self.arm_notification();
        } else {
            self.cancel_notifications();
        }

        info!(
            origin = ?restored.origin,
            phase = %self.clock.phase(),
            run_state = ?self.clock.run_state(),
            gap_secs = restored.gap_secs,
            boundary_crossed = restored.crossed.is_some(),
            "timer restored"
        );
        Some(Event::Restored {
            origin: restored.origin,
            phase: self.clock.phase(),
            run_state: self.clock.run_state(),
            remaining_secs: self.clock.time_remaining_secs(),
            boundary_crossed: restored.crossed.is_some(),
            at: now,
        })
    }

    pub fn set_advisory(&mut self, message: Option<String>) {
        self.advisory = message;
    }

    /// Fold a music call's result into the advisory message.
    pub fn apply_music_outcome(&mut self, outcome: MusicOutcome) {
        if outcome.success {
            self.advisory = None;
        } else {
            let message = outcome
                .message
                .unwrap_or_else(|| "Music playback failed".to_string());
            warn!(message = %message, "music request failed");
            self.advisory = Some(message);
        }
    }

    // ── Internals ────────────────────────────────────────────────────

    /// Side effects shared by every path that puts a fresh phase in motion.
    fn begin_phase(&mut self, now: DateTime<Utc>) {
        self.accounting.on_phase_start(now);
        self.split_by_switch = false;
        self.music(MusicRequest::PlayForPhase(self.clock.phase()));
        self.arm_notification();
        self.persist();
    }

    fn music(&self, request: MusicRequest) {
        self.collaborators.music.request(request);
    }

    fn cancel_notifications(&self) {
        if let Err(e) = self.collaborators.platform.cancel_pending() {
            warn!(error = %e, "failed to cancel pending notifications");
        }
    }

    /// Replace any pending completion notification with one for the
    /// current phase.
    fn arm_notification(&self) {
        self.cancel_notifications();
        if !self.notifications || !self.clock.is_running() {
            return;
        }
        let remaining = self.clock.time_remaining_secs();
        if remaining <= 0.0 {
            return;
        }
        let phase = self.clock.phase();
        let next = self
            .clock
            .settings()
            .next_phase(phase, self.clock.completed_work_sessions() + u32::from(phase == Phase::Work));
        let title = format!("{phase} complete");
        let body = format!("Time for {next}");
        if let Err(e) = self
            .collaborators
            .platform
            .schedule_completion(remaining, &title, &body)
        {
            warn!(error = %e, "failed to schedule completion notification");
        }
    }

    fn log_elapsed(&mut self, phase: Phase, elapsed: Option<u32>, now: DateTime<Utc>) {
        if phase.session_kind().is_none() {
            return;
        }
        match elapsed {
            Some(minutes) => self.log_minutes(phase, minutes, now),
            None => warn!(phase = %phase, "no session start recorded; session not logged"),
        }
    }

    fn log_minutes(&mut self, phase: Phase, minutes: u32, now: DateTime<Utc>) {
        let Some(kind) = phase.session_kind() else {
            return;
        };
        if minutes < 1 {
            debug!(phase = %phase, "under a minute; session not logged");
            return;
        }
        self.collaborators
            .stats
            .log_session(kind, minutes, self.project_id.as_deref());
        self.pending.push(Event::SessionLogged {
            kind,
            duration_min: minutes,
            project_id: self.project_id.clone(),
            at: now,
        });
    }
}
