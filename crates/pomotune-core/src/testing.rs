//! Recording collaborators for tests.
//!
//! Each fake records what the engine asked of it. Clones share their
//! recording, so a test can keep one clone and hand another to the engine.

use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;

use crate::error::{CoreError, Result};
use crate::platform::{
    LiveActivity, LiveStatusAttributes, LiveStatusHost, MusicController, MusicOutcome,
    MusicProvider, MusicRequest, Platform, ProjectSource, StatsStore,
};
use crate::timer::{Phase, SessionKind, TimerSnapshot};

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|e| e.into_inner())
}

/// One call made on a [`RecordingPlatform`].
#[derive(Debug, Clone, PartialEq)]
pub enum PlatformCall {
    Scheduled { after_secs: f64, title: String },
    Cancelled,
    Notified { title: String },
    Alert,
    OpenedUrl(String),
}

#[derive(Debug, Clone, Default)]
pub struct RecordingPlatform {
    calls: Arc<Mutex<Vec<PlatformCall>>>,
}

impl RecordingPlatform {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn calls(&self) -> Vec<PlatformCall> {
        lock(&self.calls).clone()
    }

    pub fn clear(&self) {
        lock(&self.calls).clear();
    }

    pub fn alerts(&self) -> usize {
        self.calls()
            .iter()
            .filter(|c| matches!(c, PlatformCall::Alert))
            .count()
    }

    /// The completion notification still pending: the last one scheduled
    /// after the last cancel.
    pub fn pending_completion(&self) -> Option<f64> {
        let mut pending = None;
        for call in self.calls() {
            match call {
                PlatformCall::Scheduled { after_secs, .. } => pending = Some(after_secs),
                PlatformCall::Cancelled => pending = None,
                _ => {}
            }
        }
        pending
    }

    fn record(&self, call: PlatformCall) {
        lock(&self.calls).push(call);
    }
}

impl Platform for RecordingPlatform {
    fn schedule_completion(&self, after_secs: f64, title: &str, _body: &str) -> Result<()> {
        self.record(PlatformCall::Scheduled {
            after_secs,
            title: title.to_string(),
        });
        Ok(())
    }

    fn cancel_pending(&self) -> Result<()> {
        self.record(PlatformCall::Cancelled);
        Ok(())
    }

    fn notify_now(&self, title: &str, _body: &str) -> Result<()> {
        self.record(PlatformCall::Notified {
            title: title.to_string(),
        });
        Ok(())
    }

    fn play_alert(&self) {
        self.record(PlatformCall::Alert);
    }

    fn open_url(&self, url: &str) -> Result<()> {
        self.record(PlatformCall::OpenedUrl(url.to_string()));
        Ok(())
    }
}

/// A logged session as the stats store received it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoggedSession {
    pub kind: SessionKind,
    pub minutes: u32,
    pub project_id: Option<String>,
}

/// Stats store and project source in one.
#[derive(Debug, Clone, Default)]
pub struct RecordingStats {
    sessions: Arc<Mutex<Vec<LoggedSession>>>,
    project: Arc<Mutex<Option<String>>>,
}

impl RecordingStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_project(self, project_id: &str) -> Self {
        *lock(&self.project) = Some(project_id.to_string());
        self
    }

    pub fn sessions(&self) -> Vec<LoggedSession> {
        lock(&self.sessions).clone()
    }
}

impl StatsStore for RecordingStats {
    fn log_session(&self, kind: SessionKind, duration_minutes: u32, project_id: Option<&str>) {
        lock(&self.sessions).push(LoggedSession {
            kind,
            minutes: duration_minutes,
            project_id: project_id.map(str::to_string),
        });
    }
}

impl ProjectSource for RecordingStats {
    fn current_project_id(&self) -> Option<String> {
        lock(&self.project).clone()
    }
}

/// Music controller and provider that records requests and answers with a
/// configurable outcome.
#[derive(Debug, Clone)]
pub struct RecordingMusic {
    requests: Arc<Mutex<Vec<MusicRequest>>>,
    outcome: Arc<Mutex<MusicOutcome>>,
}

impl Default for RecordingMusic {
    fn default() -> Self {
        Self {
            requests: Arc::default(),
            outcome: Arc::new(Mutex::new(MusicOutcome::ok())),
        }
    }
}

impl RecordingMusic {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every provider call from now on answers with `outcome`.
    pub fn answer_with(&self, outcome: MusicOutcome) {
        *lock(&self.outcome) = outcome;
    }

    pub fn requests(&self) -> Vec<MusicRequest> {
        lock(&self.requests).clone()
    }

    fn answer(&self, request: MusicRequest) -> MusicOutcome {
        lock(&self.requests).push(request);
        lock(&self.outcome).clone()
    }
}

impl MusicController for RecordingMusic {
    fn request(&self, request: MusicRequest) {
        lock(&self.requests).push(request);
    }
}

#[async_trait]
impl MusicProvider for RecordingMusic {
    async fn play_for_phase(&self, phase: Phase) -> MusicOutcome {
        self.answer(MusicRequest::PlayForPhase(phase))
    }

    async fn pause(&self) -> MusicOutcome {
        self.answer(MusicRequest::Pause)
    }

    async fn resume(&self) -> MusicOutcome {
        self.answer(MusicRequest::Resume)
    }
}

/// In-memory live-status host. Can hold duplicates and can be torn down
/// the way an OS drops a surface.
#[derive(Debug, Clone, Default)]
pub struct MemoryLiveStatusHost {
    activities: Arc<Mutex<Vec<LiveActivity>>>,
    next_id: Arc<Mutex<u64>>,
}

impl MemoryLiveStatusHost {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert an activity directly, bypassing the mirror.
    pub fn seed(&self, state: TimerSnapshot) -> String {
        self.create(&LiveStatusAttributes::default(), &state)
            .unwrap_or_default()
    }

    /// Drop every activity without going through `end`.
    pub fn tear_down(&self) {
        lock(&self.activities).clear();
    }

    pub fn len(&self) -> usize {
        lock(&self.activities).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl LiveStatusHost for MemoryLiveStatusHost {
    fn activities(&self) -> Result<Vec<LiveActivity>> {
        Ok(lock(&self.activities).clone())
    }

    fn create(&self, attributes: &LiveStatusAttributes, state: &TimerSnapshot) -> Result<String> {
        let id = {
            let mut next = lock(&self.next_id);
            *next += 1;
            format!("activity-{}", *next)
        };
        lock(&self.activities).push(LiveActivity {
            id: id.clone(),
            attributes: attributes.clone(),
            state: state.clone(),
        });
        Ok(id)
    }

    fn update(&self, id: &str, state: &TimerSnapshot) -> Result<()> {
        let mut activities = lock(&self.activities);
        let activity = activities
            .iter_mut()
            .find(|a| a.id == id)
            .ok_or_else(|| CoreError::platform("live_status", format!("no activity '{id}'")))?;
        activity.state = state.clone();
        Ok(())
    }

    fn end(&self, id: &str) -> Result<()> {
        lock(&self.activities).retain(|a| a.id != id);
        Ok(())
    }
}
