//! Terminal implementations of the engine's collaborators, and the wiring
//! that builds an engine from the config and data directory.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{Duration, Utc};
use pomotune_core::platform::{
    open_in_default_handler, Collaborators, FileLiveStatusHost, LiveStatusAttributes,
    MusicController, MusicOutcome, MusicProvider, MusicRequest, Platform,
};
use pomotune_core::storage::{data_dir, KvSnapshotStore, LiveStatusMirror, MirrorSet};
use pomotune_core::timer::Phase;
use pomotune_core::{Config, Database, Result, TimerEngine};
use tracing::{debug, info, warn};

pub const LIVE_STATUS_FILE: &str = "live_status.json";

/// Notifications go to stderr; the alert is the terminal bell.
pub struct TerminalPlatform {
    alert_sound: bool,
}

impl TerminalPlatform {
    pub fn new(config: &Config) -> Self {
        Self {
            alert_sound: config.notifications.alert_sound,
        }
    }
}

impl Platform for TerminalPlatform {
    fn schedule_completion(&self, after_secs: f64, title: &str, _body: &str) -> Result<()> {
        let due = Utc::now() + Duration::milliseconds((after_secs * 1000.0) as i64);
        debug!(title, due = %due.to_rfc3339(), "completion due");
        Ok(())
    }

    fn cancel_pending(&self) -> Result<()> {
        Ok(())
    }

    fn notify_now(&self, title: &str, body: &str) -> Result<()> {
        eprintln!("[pomotune] {title}: {body}");
        Ok(())
    }

    fn play_alert(&self) {
        if self.alert_sound {
            eprint!("\x07");
        }
    }

    fn open_url(&self, url: &str) -> Result<()> {
        open_in_default_handler(url)
    }
}

/// Opens the playlist configured for each phase in the desktop's default
/// player. Pausing and resuming are left to the player.
///
/// Used as a plain controller, the outcome of the last request is kept until
/// [`PlaylistLauncher::take_outcome`] collects it. Clones share that slot.
#[derive(Clone)]
pub struct PlaylistLauncher {
    playlists: HashMap<Phase, String>,
    platform: Arc<dyn Platform>,
    last_outcome: Arc<Mutex<Option<MusicOutcome>>>,
}

impl PlaylistLauncher {
    pub fn new(config: &Config, platform: Arc<dyn Platform>) -> Self {
        let playlists = [Phase::Warmup, Phase::Work, Phase::ShortBreak, Phase::LongBreak]
            .into_iter()
            .filter_map(|phase| {
                config
                    .playlist_for(phase)
                    .map(|uri| (phase, uri.to_string()))
            })
            .collect();
        Self {
            playlists,
            platform,
            last_outcome: Arc::default(),
        }
    }

    pub fn take_outcome(&self) -> Option<MusicOutcome> {
        self.last_outcome
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .take()
    }

    fn play(&self, phase: Phase) -> MusicOutcome {
        let Some(uri) = self.playlists.get(&phase) else {
            return MusicOutcome::ok();
        };
        match self.platform.open_url(uri) {
            Ok(()) => {
                info!(%phase, uri, "playlist opened");
                MusicOutcome::ok()
            }
            Err(e) => MusicOutcome::failed(format!("Could not open playlist for {phase}: {e}")),
        }
    }
}

impl MusicController for PlaylistLauncher {
    fn request(&self, request: MusicRequest) {
        if let MusicRequest::PlayForPhase(phase) = request {
            let outcome = self.play(phase);
            if let Some(message) = &outcome.message {
                warn!(message = %message, "music request failed");
            }
            *self.last_outcome.lock().unwrap_or_else(|e| e.into_inner()) = Some(outcome);
        }
    }
}

#[async_trait]
impl MusicProvider for PlaylistLauncher {
    async fn play_for_phase(&self, phase: Phase) -> MusicOutcome {
        let launcher = self.clone();
        tokio::task::spawn_blocking(move || launcher.play(phase))
            .await
            .unwrap_or_else(|e| MusicOutcome::failed(e.to_string()))
    }

    async fn pause(&self) -> MusicOutcome {
        MusicOutcome::ok()
    }

    async fn resume(&self) -> MusicOutcome {
        MusicOutcome::ok()
    }
}

/// Everything a command needs to run the engine.
pub struct Host {
    pub config: Config,
    pub db: Arc<Database>,
    pub platform: Arc<dyn Platform>,
    music: Option<PlaylistLauncher>,
}

impl Host {
    pub fn open() -> Result<Self> {
        let config = Config::load()?;
        let db = Arc::new(Database::open()?);
        let platform: Arc<dyn Platform> = Arc::new(TerminalPlatform::new(&config));
        Ok(Self::with_parts(config, db, platform))
    }

    pub fn with_parts(config: Config, db: Arc<Database>, platform: Arc<dyn Platform>) -> Self {
        let music = config
            .music
            .enabled
            .then(|| PlaylistLauncher::new(&config, platform.clone()));
        Self {
            config,
            db,
            platform,
            music,
        }
    }

    pub fn playlists(&self) -> Option<PlaylistLauncher> {
        self.music.clone()
    }

    /// Fold the outcome of the last music request into the engine's
    /// advisory.
    pub fn settle_music(&self, engine: &mut TimerEngine) {
        if let Some(outcome) = self.music.as_ref().and_then(PlaylistLauncher::take_outcome) {
            engine.apply_music_outcome(outcome);
        }
    }

    /// Durable kv store first, then the live-status file.
    pub fn mirrors(&self) -> Result<MirrorSet> {
        let live = LiveStatusMirror::new(Arc::new(FileLiveStatusHost::new(
            data_dir()?.join(LIVE_STATUS_FILE),
        )));
        live.set_attributes(LiveStatusAttributes {
            project_id: self.db.current_project()?,
            ..LiveStatusAttributes::default()
        });
        Ok(MirrorSet::new()
            .with(Arc::new(KvSnapshotStore::new(self.db.clone())))
            .with(Arc::new(live)))
    }

    /// An engine wired to this host. Not yet restored.
    pub fn engine(&self) -> Result<TimerEngine> {
        let mut collaborators = Collaborators::default()
            .with_platform(self.platform.clone())
            .with_stats(self.db.clone())
            .with_projects(self.db.clone());
        if let Some(launcher) = self.playlists() {
            collaborators = collaborators.with_music(Arc::new(launcher));
        }
        let debounce_ms = i64::try_from(self.config.persistence.restore_debounce_ms).unwrap_or(i64::MAX);
        Ok(TimerEngine::new(self.config.timer_settings())
            .with_collaborators(collaborators)
            .with_mirrors(self.mirrors()?)
            .with_notifications(self.config.notifications.enabled)
            .with_restore_debounce(Duration::milliseconds(debounce_ms)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pomotune_core::CoreError;

    /// A desktop with no handler for any URL.
    struct NoHandler;

    impl Platform for NoHandler {
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

        fn open_url(&self, url: &str) -> Result<()> {
            Err(CoreError::platform("open_url", format!("no handler for {url}")))
        }
    }

    fn host_with_playlist() -> Host {
        let mut config = Config::default();
        config.music.enabled = true;
        config
            .music
            .playlists
            .insert("work".to_string(), "spotify:playlist:focus".to_string());
        Host::with_parts(
            config,
            Arc::new(Database::open_memory().unwrap()),
            Arc::new(NoHandler),
        )
    }

    #[test]
    fn failed_playlist_becomes_advisory() {
        let host = host_with_playlist();
        let launcher = host.playlists().unwrap();
        let mut engine = TimerEngine::new(host.config.timer_settings())
            .with_collaborators(Collaborators::default().with_music(Arc::new(launcher)));

        engine.start();
        assert!(engine.advisory().is_none());
        host.settle_music(&mut engine);

        let advisory = engine.advisory().unwrap();
        assert!(advisory.contains("Could not open playlist"));
        assert!(host.playlists().unwrap().take_outcome().is_none());
    }

    #[test]
    fn music_disabled_leaves_advisory_alone() {
        let mut host = host_with_playlist();
        host.music = None;
        let mut engine = TimerEngine::new(host.config.timer_settings());
        engine.set_advisory(Some("earlier".to_string()));
        host.settle_music(&mut engine);
        assert_eq!(engine.advisory(), Some("earlier"));
    }
}
