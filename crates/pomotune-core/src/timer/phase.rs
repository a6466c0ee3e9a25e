use serde::{Deserialize, Serialize};

/// One segment of the Pomodoro cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Phase {
    Warmup,
    Work,
    ShortBreak,
    LongBreak,
}

impl Phase {
    pub fn is_break(self) -> bool {
        matches!(self, Phase::ShortBreak | Phase::LongBreak)
    }

    /// The statistics kind this phase is logged as. Warmup is never logged.
    pub fn session_kind(self) -> Option<SessionKind> {
        match self {
            Phase::Warmup => None,
            Phase::Work => Some(SessionKind::Work),
            Phase::ShortBreak => Some(SessionKind::ShortBreak),
            Phase::LongBreak => Some(SessionKind::LongBreak),
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Phase::Warmup => "Warm Up",
            Phase::Work => "Work",
            Phase::ShortBreak => "Short Break",
            Phase::LongBreak => "Long Break",
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Phase::Warmup => "warmup",
            Phase::Work => "work",
            Phase::ShortBreak => "shortBreak",
            Phase::LongBreak => "longBreak",
        }
    }
}

impl std::fmt::Display for Phase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

/// Phase kinds that produce a session record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SessionKind {
    Work,
    ShortBreak,
    LongBreak,
}

impl SessionKind {
    pub fn as_str(self) -> &'static str {
        match self {
            SessionKind::Work => "work",
            SessionKind::ShortBreak => "shortBreak",
            SessionKind::LongBreak => "longBreak",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "work" => Some(SessionKind::Work),
            "shortBreak" => Some(SessionKind::ShortBreak),
            "longBreak" => Some(SessionKind::LongBreak),
            _ => None,
        }
    }
}

/// Whether the active phase's countdown is advancing.
///
/// `Idle -> Running` is the only way out of `Idle`; `Running` and `Paused`
/// only reach each other.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum RunState {
    #[default]
    Idle,
    Running,
    Paused,
}

/// Configured durations and the long-break cadence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimerSettings {
    pub warmup_minutes: u32,
    pub work_minutes: u32,
    pub short_break_minutes: u32,
    pub long_break_minutes: u32,
    /// Every Nth completed work session is followed by a long break.
    pub sessions_until_long_break: u32,
}

impl Default for TimerSettings {
    fn default() -> Self {
        Self {
            warmup_minutes: 0,
            work_minutes: 25,
            short_break_minutes: 5,
            long_break_minutes: 15,
            sessions_until_long_break: 4,
        }
    }
}

impl TimerSettings {
    /// Configured length of `phase` in minutes.
    pub fn minutes(&self, phase: Phase) -> u32 {
        match phase {
            Phase::Warmup => self.warmup_minutes,
            Phase::Work => self.work_minutes,
            Phase::ShortBreak => self.short_break_minutes,
            Phase::LongBreak => self.long_break_minutes,
        }
    }

    /// Configured length of `phase` in seconds.
    pub fn duration_secs(&self, phase: Phase) -> f64 {
        f64::from(self.minutes(phase)) * 60.0
    }

    pub fn has_warmup(&self) -> bool {
        self.warmup_minutes > 0
    }

    /// The phase the clock rests on while idle.
    pub fn initial_phase(&self) -> Phase {
        if self.has_warmup() {
            Phase::Warmup
        } else {
            Phase::Work
        }
    }

    /// A cadence of zero would never schedule a long break; treat it as 1.
    pub fn cadence(&self) -> u32 {
        self.sessions_until_long_break.max(1)
    }

    /// Phase following `current`, given the work-session count *after* the
    /// current phase has been accounted for.
    pub fn next_phase(&self, current: Phase, completed_work_sessions: u32) -> Phase {
        match current {
            Phase::Work => {
                if completed_work_sessions > 0 && completed_work_sessions % self.cadence() == 0 {
                    Phase::LongBreak
                } else {
                    Phase::ShortBreak
                }
            }
            Phase::Warmup | Phase::ShortBreak | Phase::LongBreak => Phase::Work,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn initial_phase_depends_on_warmup() {
        let mut settings = TimerSettings::default();
        assert_eq!(settings.initial_phase(), Phase::Work);
        settings.warmup_minutes = 5;
        assert_eq!(settings.initial_phase(), Phase::Warmup);
    }

    #[test]
    fn fourth_work_session_earns_long_break() {
        let settings = TimerSettings::default();
        assert_eq!(settings.next_phase(Phase::Work, 1), Phase::ShortBreak);
        assert_eq!(settings.next_phase(Phase::Work, 3), Phase::ShortBreak);
        assert_eq!(settings.next_phase(Phase::Work, 4), Phase::LongBreak);
        assert_eq!(settings.next_phase(Phase::Work, 8), Phase::LongBreak);
        assert_eq!(settings.next_phase(Phase::LongBreak, 4), Phase::Work);
        assert_eq!(settings.next_phase(Phase::Warmup, 0), Phase::Work);
    }

    #[test]
    fn zero_cadence_behaves_like_one() {
        let settings = TimerSettings {
            sessions_until_long_break: 0,
            ..TimerSettings::default()
        };
        assert_eq!(settings.next_phase(Phase::Work, 1), Phase::LongBreak);
    }

    #[test]
    fn phase_serializes_camel_case() {
        let json = serde_json::to_string(&Phase::ShortBreak).unwrap();
        assert_eq!(json, "\"shortBreak\"");
        let state: RunState = serde_json::from_str("\"paused\"").unwrap();
        assert_eq!(state, RunState::Paused);
    }
}
