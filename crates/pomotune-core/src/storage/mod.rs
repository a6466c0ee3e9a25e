mod config;
pub mod database;
pub mod mirror;

pub use config::{Config, MusicConfig, NotificationsConfig, PersistenceConfig, TimerConfig};
pub use database::{Database, Project, SessionRecord, Stats};
pub use mirror::{
    Candidate, KvSnapshotStore, LiveStatusMirror, MemorySnapshotStore, MirrorSet, SnapshotOrigin,
    SnapshotStore,
};

use std::path::PathBuf;

use crate::error::Result;

/// Returns the data directory, creating it if needed.
///
/// `POMOTUNE_DATA_DIR` wins outright. Otherwise `~/.config/pomotune`, or
/// `~/.config/pomotune-dev` when `POMOTUNE_ENV=dev`.
pub fn data_dir() -> Result<PathBuf> {
    let dir = match std::env::var_os("POMOTUNE_DATA_DIR") {
        Some(dir) => PathBuf::from(dir),
        None => {
            let base_dir = dirs::home_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join(".config");
            let env = std::env::var("POMOTUNE_ENV").unwrap_or_else(|_| "production".to_string());
            if env == "dev" {
                base_dir.join("pomotune-dev")
            } else {
                base_dir.join("pomotune")
            }
        }
    };

    std::fs::create_dir_all(&dir)?;
    Ok(dir)
}
