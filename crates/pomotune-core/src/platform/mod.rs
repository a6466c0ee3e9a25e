//! Interfaces to the collaborators the timer engine drives but does not own.
//!
//! Platform-specific behaviour (notifications, alert sounds, the live-status
//! surface, music services) lives behind these traits and is chosen when the
//! engine is composed. The engine never branches on the host OS.

mod file_host;

pub use file_host::FileLiveStatusHost;

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::{CoreError, Result};
use crate::timer::{Phase, SessionKind, TimerSnapshot};

/// OS capabilities: notifications, alert sound, URL opening.
pub trait Platform: Send + Sync {
    /// Schedule a notification to fire `after_secs` from now.
    fn schedule_completion(&self, after_secs: f64, title: &str, body: &str) -> Result<()>;
    /// Cancel every notification scheduled by `schedule_completion`.
    fn cancel_pending(&self) -> Result<()>;
    /// Deliver a notification immediately.
    fn notify_now(&self, title: &str, body: &str) -> Result<()>;
    fn play_alert(&self);
    fn open_url(&self, url: &str) -> Result<()>;
}

/// A platform that does nothing.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopPlatform;

impl Platform for NoopPlatform {
    fn schedule_completion(&self, _after_secs: f64, _title: &str, _body: &str) -> Result<()> {
        Ok(())
    }

    fn cancel_pending(&self) -> Result<()> {
        Ok(())
    }

    fn notify_now(&self, _title: &str, _body: &str) -> Result<()> {
        Ok(())
    }

    fn play_alert(&self) {}

    fn open_url(&self, _url: &str) -> Result<()> {
        Ok(())
    }
}

/// Open `url` with the desktop's default handler without waiting on it.
pub fn open_in_default_handler(url: &str) -> Result<()> {
    open::that_detached(url).map_err(|e| CoreError::platform("open_url", e.to_string()))
}

// ── Live status ──────────────────────────────────────────────────────

/// Static attributes of a live-status activity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LiveStatusAttributes {
    pub title: String,
    #[serde(default)]
    pub project_id: Option<String>,
}

impl Default for LiveStatusAttributes {
    fn default() -> Self {
        Self {
            title: "Pomotune".into(),
            project_id: None,
        }
    }
}

/// One activity as held by the host.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LiveActivity {
    pub id: String,
    pub attributes: LiveStatusAttributes,
    pub state: TimerSnapshot,
}

/// A surface owned by the OS that displays timer state and may outlive the
/// process (lock screen, menu bar). The host may hold zero, one or, briefly,
/// several activities at once.
pub trait LiveStatusHost: Send + Sync {
    fn activities(&self) -> Result<Vec<LiveActivity>>;
    fn create(&self, attributes: &LiveStatusAttributes, state: &TimerSnapshot) -> Result<String>;
    fn update(&self, id: &str, state: &TimerSnapshot) -> Result<()>;
    fn end(&self, id: &str) -> Result<()>;
}

// ── Music ────────────────────────────────────────────────────────────

/// What a music provider reports back. Payloads are never inspected.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MusicOutcome {
    pub success: bool,
    /// User-facing advisory when the call failed.
    pub message: Option<String>,
}

impl MusicOutcome {
    pub fn ok() -> Self {
        Self {
            success: true,
            message: None,
        }
    }

    pub fn failed(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: Some(message.into()),
        }
    }
}

/// A streaming music service.
#[async_trait]
pub trait MusicProvider: Send + Sync {
    async fn play_for_phase(&self, phase: Phase) -> MusicOutcome;
    async fn pause(&self) -> MusicOutcome;
    async fn resume(&self) -> MusicOutcome;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MusicRequest {
    PlayForPhase(Phase),
    Pause,
    Resume,
}

impl MusicRequest {
    pub async fn send(self, provider: &dyn MusicProvider) -> MusicOutcome {
        match self {
            MusicRequest::PlayForPhase(phase) => provider.play_for_phase(phase).await,
            MusicRequest::Pause => provider.pause().await,
            MusicRequest::Resume => provider.resume().await,
        }
    }
}

/// Fire-and-forget seam the engine calls. Implementations must not block;
/// outcomes come back to the engine through its owner.
pub trait MusicController: Send + Sync {
    fn request(&self, request: MusicRequest);
}

#[derive(Debug, Clone, Copy, Default)]
pub struct NoMusic;

impl MusicController for NoMusic {
    fn request(&self, _request: MusicRequest) {}
}

#[async_trait]
impl MusicProvider for NoMusic {
    async fn play_for_phase(&self, _phase: Phase) -> MusicOutcome {
        MusicOutcome::ok()
    }

    async fn pause(&self) -> MusicOutcome {
        MusicOutcome::ok()
    }

    async fn resume(&self) -> MusicOutcome {
        MusicOutcome::ok()
    }
}

// ── Statistics and projects ──────────────────────────────────────────

/// Receives one record per logged session. Fire-and-forget.
pub trait StatsStore: Send + Sync {
    fn log_session(&self, kind: SessionKind, duration_minutes: u32, project_id: Option<&str>);
}

/// Read-only view of the selected project.
pub trait ProjectSource: Send + Sync {
    fn current_project_id(&self) -> Option<String>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct NoStats;

impl StatsStore for NoStats {
    fn log_session(&self, _kind: SessionKind, _duration_minutes: u32, _project_id: Option<&str>) {}
}

impl ProjectSource for NoStats {
    fn current_project_id(&self) -> Option<String> {
        None
    }
}

/// Everything the engine calls out to, bundled for construction.
#[derive(Clone)]
pub struct Collaborators {
    pub platform: Arc<dyn Platform>,
    pub music: Arc<dyn MusicController>,
    pub stats: Arc<dyn StatsStore>,
    pub projects: Arc<dyn ProjectSource>,
}

impl Default for Collaborators {
    fn default() -> Self {
        Self {
            platform: Arc::new(NoopPlatform),
            music: Arc::new(NoMusic),
            stats: Arc::new(NoStats),
            projects: Arc::new(NoStats),
        }
    }
}

impl Collaborators {
    pub fn with_platform(mut self, platform: Arc<dyn Platform>) -> Self {
        self.platform = platform;
        self
    }

    pub fn with_music(mut self, music: Arc<dyn MusicController>) -> Self {
        self.music = music;
        self
    }

    pub fn with_stats(mut self, stats: Arc<dyn StatsStore>) -> Self {
        self.stats = stats;
        self
    }

    pub fn with_projects(mut self, projects: Arc<dyn ProjectSource>) -> Self {
        self.projects = projects;
        self
    }
}
