//! Wall-clock accounting for the phase in progress.
//!
//! Tracks when the phase started and how long it has spent paused, so the
//! minutes logged for a skipped or interrupted phase reflect real work time
//! rather than the configured duration. This state is ephemeral and is not
//! part of the persisted snapshot.

use chrono::{DateTime, Duration, Utc};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionAccounting {
    session_start: Option<DateTime<Utc>>,
    accumulated_paused: Duration,
    last_pause: Option<DateTime<Utc>>,
}

impl SessionAccounting {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn session_start(&self) -> Option<DateTime<Utc>> {
        self.session_start
    }

    pub fn is_paused(&self) -> bool {
        self.last_pause.is_some()
    }

    pub fn on_phase_start(&mut self, now: DateTime<Utc>) {
        self.session_start = Some(now);
        self.accumulated_paused = Duration::zero();
        self.last_pause = None;
    }

    pub fn on_pause(&mut self, now: DateTime<Utc>) {
        self.last_pause = Some(now);
    }

    pub fn on_resume(&mut self, now: DateTime<Utc>) {
        if let Some(paused_at) = self.last_pause.take() {
            self.accumulated_paused += (now - paused_at).max(Duration::zero());
        }
    }

    /// Forget everything, as a reset does.
    pub fn clear(&mut self) {
        *self = Self::default();
    }

    /// Total time spent paused, including an ongoing pause.
    pub fn total_paused(&self, now: DateTime<Utc>) -> Duration {
        let ongoing = self
            .last_pause
            .map(|paused_at| (now - paused_at).max(Duration::zero()))
            .unwrap_or_else(Duration::zero);
        self.accumulated_paused + ongoing
    }

    /// Real minutes spent in the phase, rounded to the nearest minute.
    ///
    /// Returns `None` when no phase start has been recorded. Must be read
    /// before any transition calls `on_phase_start` again.
    pub fn elapsed_minutes(&self, now: DateTime<Utc>) -> Option<u32> {
        let start = self.session_start?;
        let elapsed = (now - start) - self.total_paused(now);
        let minutes = (elapsed.num_milliseconds() as f64 / 60_000.0).round();
        Some(minutes.max(0.0) as u32)
    }
}
