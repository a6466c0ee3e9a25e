//! The persisted unit of timer state.
//!
//! A snapshot is always written and read whole. Its JSON layout is shared by
//! every mirror (the durable key-value blob and the live-status surface):
//!
//! ```json
//! {
//!   "phase": "work",
//!   "timeRemainingSeconds": 1490.0,
//!   "runState": "paused",
//!   "completedWorkSessions": 2,
//!   "lastUpdateTimestamp": 1740819600.0,
//!   "workDurationMinutes": 25,
//!   "shortBreakDurationMinutes": 5,
//!   "longBreakDurationMinutes": 15,
//!   "sessionsUntilLongBreak": 4
//! }
//! ```
//!
//! Readers also accept an ISO-8601 `lastUpdateTimestamp`, and older blobs
//! that carry `isRunning` / `isPaused` booleans instead of `runState`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize, Serializer};

use super::clock::PhaseClock;
use super::phase::{Phase, RunState, TimerSettings};
use crate::error::SnapshotError;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", try_from = "StoredSnapshot")]
pub struct TimerSnapshot {
    pub phase: Phase,
    pub time_remaining_seconds: f64,
    pub run_state: RunState,
    pub completed_work_sessions: u32,
    #[serde(serialize_with = "serialize_epoch_seconds")]
    pub last_update_timestamp: DateTime<Utc>,
    pub work_duration_minutes: u32,
    pub short_break_duration_minutes: u32,
    pub long_break_duration_minutes: u32,
    pub sessions_until_long_break: u32,
}

impl TimerSnapshot {
    /// Capture the clock's state as of `now`.
    pub fn capture(clock: &PhaseClock, now: DateTime<Utc>) -> Self {
        let settings = clock.settings();
        Self {
            phase: clock.phase(),
            time_remaining_seconds: clock.time_remaining_secs(),
            run_state: clock.run_state(),
            completed_work_sessions: clock.completed_work_sessions(),
            last_update_timestamp: now,
            work_duration_minutes: settings.work_minutes,
            short_break_duration_minutes: settings.short_break_minutes,
            long_break_duration_minutes: settings.long_break_minutes,
            sessions_until_long_break: settings.sessions_until_long_break,
        }
    }

    /// Durations carried by the snapshot. Warmup is not persisted, so the
    /// caller supplies it.
    pub fn settings(&self, warmup_minutes: u32) -> TimerSettings {
        TimerSettings {
            warmup_minutes,
            work_minutes: self.work_duration_minutes,
            short_break_minutes: self.short_break_duration_minutes,
            long_break_minutes: self.long_break_duration_minutes,
            sessions_until_long_break: self.sessions_until_long_break,
        }
    }

    pub fn to_json(&self) -> Result<String, SnapshotError> {
        serde_json::to_string(self).map_err(|e| SnapshotError::Corrupt(e.to_string()))
    }

    pub fn from_json(json: &str) -> Result<Self, SnapshotError> {
        serde_json::from_str(json).map_err(|e| SnapshotError::Corrupt(e.to_string()))
    }
}

fn serialize_epoch_seconds<S: Serializer>(
    at: &DateTime<Utc>,
    serializer: S,
) -> Result<S::Ok, S::Error> {
    serializer.serialize_f64(at.timestamp_millis() as f64 / 1000.0)
}

/// Wire shape accepted on read, including legacy fields.
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct StoredSnapshot {
    phase: Phase,
    time_remaining_seconds: f64,
    #[serde(default)]
    run_state: Option<RunState>,
    #[serde(default)]
    is_running: Option<bool>,
    #[serde(default)]
    is_paused: Option<bool>,
    #[serde(default)]
    completed_work_sessions: u32,
    last_update_timestamp: StoredTimestamp,
    #[serde(default = "default_work")]
    work_duration_minutes: u32,
    #[serde(default = "default_short_break")]
    short_break_duration_minutes: u32,
    #[serde(default = "default_long_break")]
    long_break_duration_minutes: u32,
    #[serde(default = "default_cadence")]
    sessions_until_long_break: u32,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum StoredTimestamp {
    EpochSeconds(f64),
    Iso8601(String),
}

fn default_work() -> u32 {
    TimerSettings::default().work_minutes
}
fn default_short_break() -> u32 {
    TimerSettings::default().short_break_minutes
}
fn default_long_break() -> u32 {
    TimerSettings::default().long_break_minutes
}
fn default_cadence() -> u32 {
    TimerSettings::default().sessions_until_long_break
}

impl StoredTimestamp {
    fn into_utc(self) -> Result<DateTime<Utc>, SnapshotError> {
        match self {
            StoredTimestamp::EpochSeconds(secs) => {
                if !secs.is_finite() {
                    return Err(SnapshotError::Unsupported(format!(
                        "non-finite timestamp {secs}"
                    )));
                }
                DateTime::from_timestamp_millis((secs * 1000.0).round() as i64).ok_or_else(|| {
                    SnapshotError::Unsupported(format!("timestamp {secs} out of range"))
                })
            }
            StoredTimestamp::Iso8601(text) => DateTime::parse_from_rfc3339(&text)
                .map(|at| at.with_timezone(&Utc))
                .map_err(|e| SnapshotError::Corrupt(format!("timestamp '{text}': {e}"))),
        }
    }
}

/// Paused wins when a legacy blob claims both.
fn legacy_run_state(is_running: Option<bool>, is_paused: Option<bool>) -> RunState {
    if is_paused.unwrap_or(false) {
        RunState::Paused
    } else if is_running.unwrap_or(false) {
        RunState::Running
    } else {
        RunState::Idle
    }
}

impl TryFrom<StoredSnapshot> for TimerSnapshot {
    type Error = SnapshotError;

    fn try_from(stored: StoredSnapshot) -> Result<Self, Self::Error> {
        if !stored.time_remaining_seconds.is_finite() || stored.time_remaining_seconds < 0.0 {
            return Err(SnapshotError::Unsupported(format!(
                "timeRemainingSeconds must be >= 0, got {}",
                stored.time_remaining_seconds
            )));
        }
        let run_state = stored
            .run_state
            .unwrap_or_else(|| legacy_run_state(stored.is_running, stored.is_paused));
        let time_remaining_seconds = if run_state == RunState::Idle {
            0.0
        } else {
            stored.time_remaining_seconds
        };

        Ok(Self {
            phase: stored.phase,
            time_remaining_seconds,
            run_state,
            completed_work_sessions: stored.completed_work_sessions,
            last_update_timestamp: stored.last_update_timestamp.into_utc()?,
            work_duration_minutes: stored.work_duration_minutes,
            short_break_duration_minutes: stored.short_break_duration_minutes,
            long_break_duration_minutes: stored.long_break_duration_minutes,
            sessions_until_long_break: stored.sessions_until_long_break,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(secs: i64) -> DateTime<Utc> {
        DateTime::from_timestamp(secs, 0).unwrap()
    }

    fn paused_work() -> TimerSnapshot {
        TimerSnapshot {
            phase: Phase::Work,
            time_remaining_seconds: 1490.0,
            run_state: RunState::Paused,
            completed_work_sessions: 2,
            last_update_timestamp: at(1_740_819_600),
            work_duration_minutes: 25,
            short_break_duration_minutes: 5,
            long_break_duration_minutes: 15,
            sessions_until_long_break: 4,
        }
    }

    #[test]
    fn writes_documented_field_names() {
        let json: serde_json::Value =
            serde_json::from_str(&paused_work().to_json().unwrap()).unwrap();
        assert_eq!(json["phase"], "work");
        assert_eq!(json["runState"], "paused");
        assert_eq!(json["timeRemainingSeconds"], 1490.0);
        assert_eq!(json["lastUpdateTimestamp"], 1_740_819_600.0);
        assert_eq!(json["sessionsUntilLongBreak"], 4);
        assert!(json.get("isRunning").is_none());
    }

    #[test]
    fn reads_back_what_it_writes() {
        let snapshot = paused_work();
        let decoded = TimerSnapshot::from_json(&snapshot.to_json().unwrap()).unwrap();
        assert_eq!(decoded, snapshot);
    }

    #[test]
    fn accepts_iso_timestamp() {
        let json = r#"{
            "phase": "shortBreak",
            "timeRemainingSeconds": 120.5,
            "runState": "running",
            "completedWorkSessions": 1,
            "lastUpdateTimestamp": "2025-03-01T09:00:00Z",
            "workDurationMinutes": 25,
            "shortBreakDurationMinutes": 5,
            "longBreakDurationMinutes": 15,
            "sessionsUntilLongBreak": 4
        }"#;
        let snapshot = TimerSnapshot::from_json(json).unwrap();
        assert_eq!(snapshot.phase, Phase::ShortBreak);
        assert_eq!(snapshot.time_remaining_seconds, 120.5);
        assert_eq!(
            snapshot.last_update_timestamp,
            DateTime::parse_from_rfc3339("2025-03-01T09:00:00Z").unwrap()
        );
    }

    #[test]
    fn legacy_flags_synthesize_run_state() {
        let base = r#""phase": "work", "timeRemainingSeconds": 600.0,
            "completedWorkSessions": 0, "lastUpdateTimestamp": 1740819600.0,
            "workDurationMinutes": 25, "shortBreakDurationMinutes": 5,
            "longBreakDurationMinutes": 15, "sessionsUntilLongBreak": 4"#;

        let both = format!("{{{base}, \"isRunning\": true, \"isPaused\": true}}");
        assert_eq!(TimerSnapshot::from_json(&both).unwrap().run_state, RunState::Paused);

        let running = format!("{{{base}, \"isRunning\": true}}");
        assert_eq!(TimerSnapshot::from_json(&running).unwrap().run_state, RunState::Running);

        let neither = format!("{{{base}}}");
        let idle = TimerSnapshot::from_json(&neither).unwrap();
        assert_eq!(idle.run_state, RunState::Idle);
        assert_eq!(idle.time_remaining_seconds, 0.0);
    }

    #[test]
    fn run_state_field_wins_over_legacy_flags() {
        let json = r#"{"phase": "work", "timeRemainingSeconds": 600.0,
            "runState": "running", "isPaused": true,
            "lastUpdateTimestamp": 1740819600.0}"#;
        assert_eq!(TimerSnapshot::from_json(json).unwrap().run_state, RunState::Running);
    }

    #[test]
    fn rejects_negative_remaining_time() {
        let json = r#"{"phase": "work", "timeRemainingSeconds": -3.0,
            "runState": "running", "lastUpdateTimestamp": 1740819600.0}"#;
        assert!(matches!(
            TimerSnapshot::from_json(json),
            Err(SnapshotError::Corrupt(_))
        ));
    }

    #[test]
    fn rejects_garbage() {
        assert!(TimerSnapshot::from_json("not json").is_err());
        assert!(TimerSnapshot::from_json(r#"{"phase": "nap"}"#).is_err());
    }
}
