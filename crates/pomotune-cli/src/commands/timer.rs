use clap::Subcommand;
use pomotune_core::timer::{DriverSettings, TimerDriver};
use pomotune_core::{Event, TimerEngine};
use tracing::info;

use super::print_json;
use crate::host::Host;

#[derive(Subcommand)]
pub enum TimerAction {
    /// Start the timer, or begin the next phase
    Start,
    /// Pause the running phase
    Pause,
    /// Resume a paused phase
    Resume,
    /// End the current phase early and start the next one
    Skip,
    /// Stop and return to idle, discarding persisted state
    Reset,
    /// Print current timer state as JSON
    Status,
    /// Drive the countdown in the foreground until interrupted
    Run,
}

/// Restore, apply one action, print what happened.
///
/// Every invocation is a fresh process, so the persisted snapshot is the
/// only link to the previous one.
pub fn run(action: TimerAction) -> Result<(), Box<dyn std::error::Error>> {
    let host = Host::open()?;
    if let TimerAction::Run = action {
        return run_foreground(&host);
    }

    let mut engine = host.engine()?;
    let restored = engine.restore();
    if let Some(event) = &restored {
        info!(?event, "restored");
    }

    let event = match action {
        TimerAction::Start => engine.start(),
        TimerAction::Pause => engine.pause(),
        TimerAction::Resume => engine.resume(),
        TimerAction::Skip => engine.skip(),
        TimerAction::Reset => engine.reset(),
        TimerAction::Status | TimerAction::Run => None,
    };
    host.settle_music(&mut engine);
    print_outcome(&mut engine, restored, event)
}

fn print_outcome(
    engine: &mut TimerEngine,
    restored: Option<Event>,
    event: Option<Event>,
) -> Result<(), Box<dyn std::error::Error>> {
    // A phase that finished while no process was running is news.
    if let Some(crossed @ Event::Restored {
        boundary_crossed: true,
        ..
    }) = &restored
    {
        print_json(crossed)?;
    }
    for logged in engine.drain_events() {
        print_json(&logged)?;
    }
    if let Some(event) = &event {
        print_json(event)?;
    }
    print_json(&engine.snapshot())
}

fn run_foreground(host: &Host) -> Result<(), Box<dyn std::error::Error>> {
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;
    runtime.block_on(async {
        let mut engine = host.engine()?;
        engine.restore();
        if !engine.is_running() {
            engine.start();
        }

        let mut settings = DriverSettings::default()
            .with_persist_interval_secs(u64::from(host.config.persistence.persist_interval_secs));
        if let Some(launcher) = host.playlists() {
            settings = settings.with_music(std::sync::Arc::new(launcher));
        }
        let handle = TimerDriver::spawn(engine, settings);
        let mut events = handle.subscribe();
        print_json(&handle.snapshot().await?)?;

        loop {
            tokio::select! {
                _ = tokio::signal::ctrl_c() => break,
                event = events.recv() => match event {
                    Ok(event) => print_json(&event)?,
                    Err(tokio::sync::broadcast::error::RecvError::Lagged(n)) => {
                        tracing::warn!(skipped = n, "event stream lagged");
                    }
                    Err(tokio::sync::broadcast::error::RecvError::Closed) => break,
                },
            }
        }

        let engine = handle.shutdown().await?;
        print_json(&engine.snapshot())?;
        Ok::<(), Box<dyn std::error::Error>>(())
    })
}
