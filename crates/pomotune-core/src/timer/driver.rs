//! Countdown driver: runs a [`TimerEngine`] on a tokio task.
//!
//! The task is the engine's only owner. User actions, notification actions,
//! music results and the one-second tick all arrive on that task and are
//! handled one at a time, so no two of them ever touch the engine at once.

use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{broadcast, mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::{self, Interval, MissedTickBehavior};
use tracing::{debug, info, warn};

use super::engine::TimerEngine;
use super::phase::RunState;
use crate::error::{CoreError, Result};
use crate::events::Event;
use crate::platform::{MusicController, MusicOutcome, MusicProvider, MusicRequest};

const COMMAND_BUFFER: usize = 64;
const EVENT_BUFFER: usize = 256;

/// Actions offered on a delivered notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotificationAction {
    Pause,
    Resume,
    Skip,
    Reset,
}

impl FromStr for NotificationAction {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "pause" => Ok(Self::Pause),
            "resume" => Ok(Self::Resume),
            "skip" => Ok(Self::Skip),
            "reset" => Ok(Self::Reset),
            other => Err(CoreError::Custom(format!(
                "unknown notification action '{other}'"
            ))),
        }
    }
}

#[derive(Debug)]
pub enum Command {
    Start,
    Pause,
    Resume,
    Skip,
    Reset,
    SwitchProject(Option<String>),
    Restore,
    Notification(NotificationAction),
    Snapshot(oneshot::Sender<Event>),
    MusicFinished(MusicOutcome),
    Shutdown,
}

#[derive(Clone)]
pub struct DriverSettings {
    pub tick: Duration,
    /// Persist every this many ticks while running.
    pub persist_every_ticks: u32,
    /// Provider the music requests are dispatched to. `None` keeps the
    /// engine's own music controller.
    pub music: Option<Arc<dyn MusicProvider>>,
}

impl std::fmt::Debug for DriverSettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DriverSettings")
            .field("tick", &self.tick)
            .field("persist_every_ticks", &self.persist_every_ticks)
            .field("music", &self.music.is_some())
            .finish()
    }
}

impl Default for DriverSettings {
    fn default() -> Self {
        Self {
            tick: Duration::from_secs(1),
            persist_every_ticks: 10,
            music: None,
        }
    }
}

impl DriverSettings {
    pub fn with_persist_interval_secs(mut self, secs: u64) -> Self {
        let ticks = secs.saturating_mul(1000) / self.tick.as_millis().max(1) as u64;
        self.persist_every_ticks = ticks.clamp(1, u64::from(u32::MAX)) as u32;
        self
    }

    pub fn with_music(mut self, provider: Arc<dyn MusicProvider>) -> Self {
        self.music = Some(provider);
        self
    }
}

/// Dispatches music requests to a provider on the runtime and posts each
/// outcome back to the driver.
struct SpawnedMusic {
    provider: Arc<dyn MusicProvider>,
    commands: mpsc::Sender<Command>,
}

impl MusicController for SpawnedMusic {
    fn request(&self, request: MusicRequest) {
        let provider = Arc::clone(&self.provider);
        let commands = self.commands.clone();
        tokio::spawn(async move {
            let outcome = request.send(provider.as_ref()).await;
            debug!(?request, success = outcome.success, "music request finished");
            let _ = commands.send(Command::MusicFinished(outcome)).await;
        });
    }
}

/// The one-second countdown. Armed only while the engine runs.
struct Countdown {
    period: Duration,
    interval: Option<Interval>,
}

impl Countdown {
    fn new(period: Duration) -> Self {
        Self {
            period,
            interval: None,
        }
    }

    fn start(&mut self) {
        if self.interval.is_none() {
            let mut interval = time::interval_at(time::Instant::now() + self.period, self.period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
            self.interval = Some(interval);
        }
    }

    fn stop(&mut self) {
        self.interval = None;
    }

    fn sync(&mut self, running: bool) {
        if running {
            self.start();
        } else {
            self.stop();
        }
    }

    async fn tick(&mut self) {
        match self.interval.as_mut() {
            Some(interval) => {
                interval.tick().await;
            }
            None => std::future::pending::<()>().await,
        }
    }
}

pub struct TimerDriver {
    engine: TimerEngine,
    commands: mpsc::Receiver<Command>,
    events: broadcast::Sender<Event>,
    countdown: Countdown,
    persist_every_ticks: u32,
    ticks_since_persist: u32,
}

impl TimerDriver {
    /// Move `engine` onto a new task. Must be called inside a tokio runtime.
    pub fn spawn(mut engine: TimerEngine, settings: DriverSettings) -> DriverHandle {
        let (tx, rx) = mpsc::channel(COMMAND_BUFFER);
        let (events, _) = broadcast::channel(EVENT_BUFFER);

        if let Some(provider) = settings.music {
            engine.set_music_controller(Arc::new(SpawnedMusic {
                provider,
                commands: tx.clone(),
            }));
        }

        let driver = TimerDriver {
            engine,
            commands: rx,
            events: events.clone(),
            countdown: Countdown::new(settings.tick),
            persist_every_ticks: settings.persist_every_ticks.max(1),
            ticks_since_persist: 0,
        };
        let task = tokio::spawn(driver.run());
        DriverHandle { tx, events, task }
    }

    async fn run(mut self) -> TimerEngine {
        info!("timer driver started");
        self.countdown.sync(self.engine.is_running());
        loop {
            tokio::select! {
                command = self.commands.recv() => match command {
                    Some(Command::Shutdown) | None => break,
                    Some(command) => self.handle(command),
                },
                _ = self.countdown.tick() => self.on_tick(),
            }
            self.countdown.sync(self.engine.is_running());
        }
        if self.engine.run_state() != RunState::Idle {
            self.engine.persist();
        }
        info!("timer driver stopped");
        self.engine
    }

    fn handle(&mut self, command: Command) {
        let event = match command {
            Command::Start => self.engine.start(),
            Command::Pause | Command::Notification(NotificationAction::Pause) => {
                self.engine.pause()
            }
            Command::Resume | Command::Notification(NotificationAction::Resume) => {
                self.engine.resume()
            }
            Command::Skip | Command::Notification(NotificationAction::Skip) => self.engine.skip(),
            Command::Reset | Command::Notification(NotificationAction::Reset) => {
                self.engine.reset()
            }
            Command::SwitchProject(project_id) => self.engine.switch_project(project_id),
            Command::Restore => self.engine.restore(),
            Command::Snapshot(reply) => {
                let _ = reply.send(self.engine.snapshot());
                None
            }
            Command::MusicFinished(outcome) => {
                self.engine.apply_music_outcome(outcome);
                None
            }
            Command::Shutdown => None,
        };
        if event.is_some() {
            self.ticks_since_persist = 0;
        }
        self.publish(event);
    }

    fn on_tick(&mut self) {
        let event = self.engine.tick();
        if event.is_some() {
            self.ticks_since_persist = 0;
        } else if self.engine.is_running() {
            self.ticks_since_persist += 1;
            if self.ticks_since_persist >= self.persist_every_ticks {
                self.ticks_since_persist = 0;
                self.engine.persist();
            }
        }
        self.publish(event);
    }

    fn publish(&mut self, event: Option<Event>) {
        for event in event.into_iter().chain(self.engine.drain_events()) {
            // No subscribers is fine.
            let _ = self.events.send(event);
        }
    }
}

/// Control surface for a spawned driver.
pub struct DriverHandle {
    tx: mpsc::Sender<Command>,
    events: broadcast::Sender<Event>,
    task: JoinHandle<TimerEngine>,
}

impl DriverHandle {
    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.events.subscribe()
    }

    pub async fn send(&self, command: Command) -> Result<()> {
        self.tx
            .send(command)
            .await
            .map_err(|_| CoreError::Custom("timer driver has stopped".to_string()))
    }

    pub async fn start(&self) -> Result<()> {
        self.send(Command::Start).await
    }

    pub async fn pause(&self) -> Result<()> {
        self.send(Command::Pause).await
    }

    pub async fn resume(&self) -> Result<()> {
        self.send(Command::Resume).await
    }

    pub async fn skip(&self) -> Result<()> {
        self.send(Command::Skip).await
    }

    pub async fn reset(&self) -> Result<()> {
        self.send(Command::Reset).await
    }

    pub async fn restore(&self) -> Result<()> {
        self.send(Command::Restore).await
    }

    pub async fn switch_project(&self, project_id: Option<String>) -> Result<()> {
        self.send(Command::SwitchProject(project_id)).await
    }

    /// Route a notification action identifier such as `"skip"`.
    pub async fn notification(&self, action: &str) -> Result<()> {
        let action = action.parse::<NotificationAction>()?;
        self.send(Command::Notification(action)).await
    }

    /// Current state, as seen by the owning task.
    pub async fn snapshot(&self) -> Result<Event> {
        let (reply, rx) = oneshot::channel();
        self.send(Command::Snapshot(reply)).await?;
        rx.await
            .map_err(|_| CoreError::Custom("timer driver dropped the reply".to_string()))
    }

    /// Stop the task, persisting once more, and hand the engine back.
    pub async fn shutdown(self) -> Result<TimerEngine> {
        if self.tx.send(Command::Shutdown).await.is_err() {
            warn!("timer driver already stopped");
        }
        self.task
            .await
            .map_err(|e| CoreError::Custom(format!("timer driver panicked: {e}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_notification_actions() {
        assert_eq!("skip".parse::<NotificationAction>().unwrap(), NotificationAction::Skip);
        assert_eq!(" Pause ".parse::<NotificationAction>().unwrap(), NotificationAction::Pause);
        assert!("snooze".parse::<NotificationAction>().is_err());
    }

    #[test]
    fn persist_interval_converts_to_ticks() {
        let settings = DriverSettings::default().with_persist_interval_secs(30);
        assert_eq!(settings.persist_every_ticks, 30);
        let settings = DriverSettings::default().with_persist_interval_secs(0);
        assert_eq!(settings.persist_every_ticks, 1);
    }
}
