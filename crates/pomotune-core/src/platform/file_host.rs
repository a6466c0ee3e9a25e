//! Live-status host backed by a JSON file.
//!
//! Desktop menu-bar helpers and shell prompts read this file to show the
//! timer while no pomotune process is running. Writes go through a temp file
//! and a rename so readers never observe a half-written list.

use std::fs;
use std::path::{Path, PathBuf};

use uuid::Uuid;

use super::{LiveActivity, LiveStatusAttributes, LiveStatusHost};
use crate::error::{CoreError, Result, SnapshotError};
use crate::timer::TimerSnapshot;

#[derive(Debug, Clone)]
pub struct FileLiveStatusHost {
    path: PathBuf,
}

impl FileLiveStatusHost {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read(&self) -> Result<Vec<LiveActivity>> {
        let text = match fs::read_to_string(&self.path) {
            Ok(text) => text,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };
        if text.trim().is_empty() {
            return Ok(Vec::new());
        }
        serde_json::from_str(&text)
            .map_err(|e| CoreError::Snapshot(SnapshotError::Corrupt(e.to_string())))
    }

    fn write(&self, activities: &[LiveActivity]) -> Result<()> {
        if activities.is_empty() {
            return match fs::remove_file(&self.path) {
                Err(e) if e.kind() != std::io::ErrorKind::NotFound => Err(e.into()),
                _ => Ok(()),
            };
        }
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, serde_json::to_vec_pretty(activities)?)?;
        fs::rename(&tmp, &self.path)?;
        Ok(())
    }

    /// Read the list, treating an unreadable file as empty so a corrupt file
    /// can still be overwritten or ended.
    fn read_or_empty(&self) -> Vec<LiveActivity> {
        self.read().unwrap_or_default()
    }
}

impl LiveStatusHost for FileLiveStatusHost {
    fn activities(&self) -> Result<Vec<LiveActivity>> {
        self.read()
    }

    fn create(&self, attributes: &LiveStatusAttributes, state: &TimerSnapshot) -> Result<String> {
        let mut activities = self.read_or_empty();
        let id = Uuid::new_v4().to_string();
        activities.push(LiveActivity {
            id: id.clone(),
            attributes: attributes.clone(),
            state: state.clone(),
        });
        self.write(&activities)?;
        Ok(id)
    }

    fn update(&self, id: &str, state: &TimerSnapshot) -> Result<()> {
        let mut activities = self.read()?;
        let activity = activities
            .iter_mut()
            .find(|a| a.id == id)
            .ok_or_else(|| CoreError::platform("live_status", format!("no activity '{id}'")))?;
        activity.state = state.clone();
        self.write(&activities)
    }

    fn end(&self, id: &str) -> Result<()> {
        let mut activities = self.read_or_empty();
        activities.retain(|a| a.id != id);
        self.write(&activities)
    }
}
