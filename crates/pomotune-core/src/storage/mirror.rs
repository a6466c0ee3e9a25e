//! Snapshot mirrors: the places a timer snapshot is written so it survives
//! the process.
//!
//! Each store exposes whole-snapshot `save`, `load` and `clear` with no merge
//! logic. [`MirrorSet`] fans writes out to every store and hands restoration
//! one candidate per store, in rank order.

use std::sync::{Arc, Mutex};

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::database::Database;
use crate::error::{CoreError, Result};
use crate::platform::{LiveActivity, LiveStatusAttributes, LiveStatusHost};
use crate::timer::TimerSnapshot;

/// kv key holding the durable snapshot blob.
pub const SNAPSHOT_KEY: &str = "timer_snapshot";

/// Where a snapshot came from. Declaration order is rank order: on equal
/// timestamps the earlier origin wins.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SnapshotOrigin {
    Durable,
    LiveStatus,
}

/// Single-slot snapshot persistence with overwrite semantics.
pub trait SnapshotStore: Send + Sync {
    fn origin(&self) -> SnapshotOrigin;
    /// Replace the stored snapshot.
    fn save(&self, snapshot: &TimerSnapshot) -> Result<()>;
    /// The stored snapshot, if any. A blob that cannot be decoded is an error.
    fn load(&self) -> Result<Option<TimerSnapshot>>;
    fn clear(&self) -> Result<()>;
    /// The project new snapshots are attributed to. Most stores ignore it.
    fn set_project(&self, _project_id: Option<&str>) {}
}

// ── Memory ───────────────────────────────────────────────────────────

/// In-process store. Clones share the same slot.
#[derive(Debug, Clone)]
pub struct MemorySnapshotStore {
    origin: SnapshotOrigin,
    slot: Arc<Mutex<Option<TimerSnapshot>>>,
}

impl MemorySnapshotStore {
    pub fn new(origin: SnapshotOrigin) -> Self {
        Self {
            origin,
            slot: Arc::new(Mutex::new(None)),
        }
    }

    pub fn durable() -> Self {
        Self::new(SnapshotOrigin::Durable)
    }

    pub fn live_status() -> Self {
        Self::new(SnapshotOrigin::LiveStatus)
    }
}

impl SnapshotStore for MemorySnapshotStore {
    fn origin(&self) -> SnapshotOrigin {
        self.origin
    }

    fn save(&self, snapshot: &TimerSnapshot) -> Result<()> {
        *self.slot.lock().unwrap_or_else(|e| e.into_inner()) = Some(snapshot.clone());
        Ok(())
    }

    fn load(&self) -> Result<Option<TimerSnapshot>> {
        Ok(self.slot.lock().unwrap_or_else(|e| e.into_inner()).clone())
    }

    fn clear(&self) -> Result<()> {
        *self.slot.lock().unwrap_or_else(|e| e.into_inner()) = None;
        Ok(())
    }
}

// ── Durable key-value blob ───────────────────────────────────────────

/// The durable store: one JSON blob in the database's kv table.
#[derive(Debug, Clone)]
pub struct KvSnapshotStore {
    db: Arc<Database>,
    key: String,
}

impl KvSnapshotStore {
    pub fn new(db: Arc<Database>) -> Self {
        Self {
            db,
            key: SNAPSHOT_KEY.to_string(),
        }
    }
}

impl SnapshotStore for KvSnapshotStore {
    fn origin(&self) -> SnapshotOrigin {
        SnapshotOrigin::Durable
    }

    fn save(&self, snapshot: &TimerSnapshot) -> Result<()> {
        self.db.kv_set(&self.key, &snapshot.to_json()?)
    }

    fn load(&self) -> Result<Option<TimerSnapshot>> {
        match self.db.kv_get(&self.key)? {
            Some(json) => Ok(Some(TimerSnapshot::from_json(&json)?)),
            None => Ok(None),
        }
    }

    fn clear(&self) -> Result<()> {
        self.db.kv_delete(&self.key)
    }
}

// ── Live status ──────────────────────────────────────────────────────

/// Presents a [`LiveStatusHost`] as a snapshot store.
///
/// The host may hold several activities after a crash or a race with the OS.
/// Saving keeps the freshest one and ends the rest; loading reads the
/// freshest one.
pub struct LiveStatusMirror {
    host: Arc<dyn LiveStatusHost>,
    attributes: Mutex<LiveStatusAttributes>,
}

impl LiveStatusMirror {
    pub fn new(host: Arc<dyn LiveStatusHost>) -> Self {
        Self {
            host,
            attributes: Mutex::new(LiveStatusAttributes::default()),
        }
    }

    /// Attributes used the next time an activity has to be created.
    pub fn set_attributes(&self, attributes: LiveStatusAttributes) {
        *self.attributes.lock().unwrap_or_else(|e| e.into_inner()) = attributes;
    }

    fn attributes(&self) -> LiveStatusAttributes {
        self.attributes
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    fn freshest(activities: &[LiveActivity]) -> Option<&LiveActivity> {
        activities
            .iter()
            .max_by_key(|a| a.state.last_update_timestamp)
    }
}

impl SnapshotStore for LiveStatusMirror {
    fn origin(&self) -> SnapshotOrigin {
        SnapshotOrigin::LiveStatus
    }

    fn save(&self, snapshot: &TimerSnapshot) -> Result<()> {
        let activities = match self.host.activities() {
            Ok(activities) => activities,
            Err(e) => {
                warn!(error = %e, "live status unreadable; replacing it");
                Vec::new()
            }
        };

        let attributes = self.attributes();
        // Attributes are fixed once an activity exists, so an activity
        // showing stale ones is replaced rather than updated.
        let keep = Self::freshest(&activities).filter(|a| a.attributes == attributes);
        let Some(keep) = keep else {
            for stale in &activities {
                debug!(id = %stale.id, "ending stale live status");
                if let Err(e) = self.host.end(&stale.id) {
                    warn!(id = %stale.id, error = %e, "failed to end stale live status");
                }
            }
            let id = self.host.create(&attributes, snapshot)?;
            debug!(id = %id, "live status created");
            return Ok(());
        };

        for duplicate in activities.iter().filter(|a| a.id != keep.id) {
            debug!(id = %duplicate.id, "ending duplicate live status");
            if let Err(e) = self.host.end(&duplicate.id) {
                warn!(id = %duplicate.id, error = %e, "failed to end duplicate live status");
            }
        }
        self.host.update(&keep.id, snapshot)
    }

    fn set_project(&self, project_id: Option<&str>) {
        self.attributes
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .project_id = project_id.map(str::to_string);
    }

    fn load(&self) -> Result<Option<TimerSnapshot>> {
        let activities = self.host.activities()?;
        Ok(Self::freshest(&activities).map(|a| a.state.clone()))
    }

    fn clear(&self) -> Result<()> {
        let activities = self.host.activities()?;
        let mut first_error: Option<CoreError> = None;
        for activity in &activities {
            if let Err(e) = self.host.end(&activity.id) {
                warn!(id = %activity.id, error = %e, "failed to end live status");
                first_error.get_or_insert(e);
            }
        }
        match first_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}

// ── Fan-out ──────────────────────────────────────────────────────────

/// A snapshot read from one store.
#[derive(Debug, Clone, PartialEq)]
pub struct Candidate {
    pub origin: SnapshotOrigin,
    pub snapshot: TimerSnapshot,
}

/// Every mirror the engine writes, in rank order.
#[derive(Clone, Default)]
pub struct MirrorSet {
    stores: Vec<Arc<dyn SnapshotStore>>,
}

impl MirrorSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, store: Arc<dyn SnapshotStore>) -> Self {
        self.push(store);
        self
    }

    /// Add a store, keeping the set ordered by origin rank.
    pub fn push(&mut self, store: Arc<dyn SnapshotStore>) {
        self.stores.push(store);
        self.stores.sort_by_key(|s| s.origin());
    }

    pub fn is_empty(&self) -> bool {
        self.stores.is_empty()
    }

    /// Write `snapshot` to every store. Failures are logged and skipped.
    pub fn save_all(&self, snapshot: &TimerSnapshot) {
        for store in &self.stores {
            if let Err(e) = store.save(snapshot) {
                warn!(origin = ?store.origin(), error = %e, "failed to persist snapshot");
            }
        }
    }

    pub fn set_project(&self, project_id: Option<&str>) {
        for store in &self.stores {
            store.set_project(project_id);
        }
    }

    /// Clear every store. Failures are logged and skipped.
    pub fn clear_all(&self) {
        for store in &self.stores {
            if let Err(e) = store.clear() {
                warn!(origin = ?store.origin(), error = %e, "failed to clear snapshot");
            }
        }
    }

    /// One candidate per store that holds a usable snapshot, in rank order.
    /// A store holding an undecodable snapshot is cleared and skipped.
    pub fn candidates(&self) -> Vec<Candidate> {
        let mut out = Vec::new();
        for store in &self.stores {
            match store.load() {
                Ok(Some(snapshot)) => out.push(Candidate {
                    origin: store.origin(),
                    snapshot,
                }),
                Ok(None) => {}
                Err(e) => {
                    warn!(origin = ?store.origin(), error = %e, "discarding unreadable snapshot");
                    if let Err(e) = store.clear() {
                        warn!(origin = ?store.origin(), error = %e, "failed to discard snapshot");
                    }
                }
            }
        }
        out
    }
}
