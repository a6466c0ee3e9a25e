//! SQLite-based storage.
//!
//! Provides persistent storage for:
//! - Logged sessions (one row per finished, skipped or interrupted phase)
//! - Projects that sessions are attributed to
//! - Key-value store for application state (the timer snapshot blob and the
//!   selected project)

use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use serde::{Deserialize, Serialize};
use tracing::warn;
use uuid::Uuid;

use super::data_dir;
use crate::error::{DatabaseError, Result};
use crate::platform::{ProjectSource, StatsStore};
use crate::timer::SessionKind;

/// kv key holding the selected project id.
pub const CURRENT_PROJECT_KEY: &str = "current_project";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionRecord {
    pub id: i64,
    pub kind: SessionKind,
    /// Real minutes spent, not the configured duration.
    pub duration_min: u32,
    pub project_id: Option<String>,
    pub completed_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Project {
    pub id: String,
    pub name: String,
    pub emoji: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq, Eq)]
pub struct Stats {
    pub total_sessions: u64,
    pub work_sessions: u64,
    pub total_work_min: u64,
    pub total_break_min: u64,
    pub long_breaks: u64,
}

/// SQLite database for sessions, projects and the kv blob store.
pub struct Database {
    conn: Mutex<Connection>,
}

impl std::fmt::Debug for Database {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Database").finish_non_exhaustive()
    }
}

impl Database {
    /// Open the database at `<data dir>/pomotune.db`.
    ///
    /// Creates the database file and schema if they don't exist.
    pub fn open() -> Result<Self> {
        let path = data_dir()?.join("pomotune.db");
        Self::open_at(&path)
    }

    /// Open (or create) a database file at `path`.
    pub fn open_at(path: &Path) -> Result<Self> {
        let conn = Connection::open(path).map_err(|source| DatabaseError::OpenFailed {
            path: path.to_path_buf(),
            source,
        })?;
        let db = Self {
            conn: Mutex::new(conn),
        };
        db.migrate()?;
        Ok(db)
    }

    /// Open an in-memory database.
    pub fn open_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().map_err(DatabaseError::from)?;
        let db = Self {
            conn: Mutex::new(conn),
        };
        db.migrate()?;
        Ok(db)
    }

    fn conn(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn.lock().map_err(|_| DatabaseError::Poisoned.into())
    }

    fn migrate(&self) -> Result<()> {
        self.conn()?.execute_batch(
            "CREATE TABLE IF NOT EXISTS sessions (
                id           INTEGER PRIMARY KEY AUTOINCREMENT,
                kind         TEXT NOT NULL,
                duration_min INTEGER NOT NULL,
                project_id   TEXT,
                completed_at TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS projects (
                id         TEXT PRIMARY KEY,
                name       TEXT NOT NULL,
                emoji      TEXT,
                created_at TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS kv (
                key   TEXT PRIMARY KEY,
                value TEXT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_sessions_completed_at ON sessions(completed_at);
            CREATE INDEX IF NOT EXISTS idx_sessions_project_id ON sessions(project_id);",
        )?;
        Ok(())
    }

    // ── Sessions ─────────────────────────────────────────────────────

    /// Record a logged session.
    pub fn record_session(
        &self,
        kind: SessionKind,
        duration_min: u32,
        project_id: Option<&str>,
        completed_at: DateTime<Utc>,
    ) -> Result<i64> {
        let conn = self.conn()?;
        conn.execute(
            "INSERT INTO sessions (kind, duration_min, project_id, completed_at)
             VALUES (?1, ?2, ?3, ?4)",
            params![
                kind.as_str(),
                duration_min,
                project_id,
                completed_at.to_rfc3339()
            ],
        )?;
        Ok(conn.last_insert_rowid())
    }

    pub fn sessions_all(&self) -> Result<Vec<SessionRecord>> {
        self.query_sessions(
            "SELECT id, kind, duration_min, project_id, completed_at
             FROM sessions ORDER BY completed_at, id",
            None,
        )
    }

    pub fn sessions_for_project(&self, project_id: &str) -> Result<Vec<SessionRecord>> {
        self.query_sessions(
            "SELECT id, kind, duration_min, project_id, completed_at
             FROM sessions WHERE project_id = ?1 ORDER BY completed_at, id",
            Some(project_id),
        )
    }

    fn query_sessions(&self, sql: &str, project_id: Option<&str>) -> Result<Vec<SessionRecord>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(sql)?;
        let map_row = |row: &rusqlite::Row<'_>| {
            Ok((
                row.get::<_, i64>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, u32>(2)?,
                row.get::<_, Option<String>>(3)?,
                row.get::<_, String>(4)?,
            ))
        };
        let rows = match project_id {
            Some(id) => stmt.query_map(params![id], map_row)?.collect::<Vec<_>>(),
            None => stmt.query_map([], map_row)?.collect::<Vec<_>>(),
        };

        let mut records = Vec::with_capacity(rows.len());
        for row in rows {
            let (id, kind, duration_min, project_id, completed_at) = row?;
            let Some(kind) = SessionKind::parse(&kind) else {
                warn!(id, kind = %kind, "skipping session with unknown kind");
                continue;
            };
            let completed_at = DateTime::parse_from_rfc3339(&completed_at)
                .map(|at| at.with_timezone(&Utc))
                .map_err(|e| DatabaseError::QueryFailed(e.to_string()))?;
            records.push(SessionRecord {
                id,
                kind,
                duration_min,
                project_id,
                completed_at,
            });
        }
        Ok(records)
    }

    /// Totals for sessions completed at or after `since` (all time if `None`).
    pub fn stats_since(&self, since: Option<DateTime<Utc>>) -> Result<Stats> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT kind, COUNT(*), COALESCE(SUM(duration_min), 0)
             FROM sessions
             WHERE completed_at >= ?1
             GROUP BY kind",
        )?;
        let since = since
            .map(|at| at.to_rfc3339())
            .unwrap_or_else(|| String::from("0000"));
        let rows = stmt.query_map(params![since], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, u64>(1)?,
                row.get::<_, u64>(2)?,
            ))
        })?;

        let mut stats = Stats::default();
        for row in rows {
            let (kind, count, minutes) = row?;
            stats.total_sessions += count;
            match SessionKind::parse(&kind) {
                Some(SessionKind::Work) => {
                    stats.work_sessions += count;
                    stats.total_work_min += minutes;
                }
                Some(SessionKind::ShortBreak) => {
                    stats.total_break_min += minutes;
                }
                Some(SessionKind::LongBreak) => {
                    stats.long_breaks += count;
                    stats.total_break_min += minutes;
                }
                None => {}
            }
        }
        Ok(stats)
    }

    pub fn stats_today(&self) -> Result<Stats> {
        let midnight = Utc::now()
            .date_naive()
            .and_hms_opt(0, 0, 0)
            .map(|naive| naive.and_utc());
        self.stats_since(midnight)
    }

    pub fn stats_all(&self) -> Result<Stats> {
        self.stats_since(None)
    }

    // ── Projects ─────────────────────────────────────────────────────

    pub fn create_project(&self, name: &str, emoji: Option<&str>) -> Result<Project> {
        let project = Project {
            id: Uuid::new_v4().to_string(),
            name: name.to_string(),
            emoji: emoji.map(str::to_string),
            created_at: Utc::now(),
        };
        self.conn()?.execute(
            "INSERT INTO projects (id, name, emoji, created_at) VALUES (?1, ?2, ?3, ?4)",
            params![
                project.id,
                project.name,
                project.emoji,
                project.created_at.to_rfc3339()
            ],
        )?;
        Ok(project)
    }

    pub fn get_project(&self, id: &str) -> Result<Option<Project>> {
        let conn = self.conn()?;
        let row = conn
            .query_row(
                "SELECT id, name, emoji, created_at FROM projects WHERE id = ?1",
                params![id],
                |row| {
                    Ok((
                        row.get::<_, String>(0)?,
                        row.get::<_, String>(1)?,
                        row.get::<_, Option<String>>(2)?,
                        row.get::<_, String>(3)?,
                    ))
                },
            )
            .optional()?;
        row.map(project_from_row).transpose()
    }

    pub fn list_projects(&self) -> Result<Vec<Project>> {
        let conn = self.conn()?;
        let mut stmt =
            conn.prepare("SELECT id, name, emoji, created_at FROM projects ORDER BY created_at")?;
        let rows = stmt.query_map([], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, Option<String>>(2)?,
                row.get::<_, String>(3)?,
            ))
        })?;
        let mut projects = Vec::new();
        for row in rows {
            projects.push(project_from_row(row?)?);
        }
        Ok(projects)
    }

    /// Delete a project together with every session attributed to it.
    /// Returns the number of sessions removed.
    pub fn delete_project(&self, id: &str) -> Result<usize> {
        let mut conn = self.conn()?;
        let tx = conn.transaction()?;
        let sessions = tx.execute("DELETE FROM sessions WHERE project_id = ?1", params![id])?;
        let projects = tx.execute("DELETE FROM projects WHERE id = ?1", params![id])?;
        if projects == 0 {
            return Err(DatabaseError::NotFound {
                entity: "project",
                id: id.to_string(),
            }
            .into());
        }
        tx.execute(
            "DELETE FROM kv WHERE key = ?1 AND value = ?2",
            params![CURRENT_PROJECT_KEY, id],
        )?;
        tx.commit()?;
        Ok(sessions)
    }

    /// Select the project new sessions are attributed to.
    pub fn set_current_project(&self, id: Option<&str>) -> Result<()> {
        match id {
            Some(id) => {
                if self.get_project(id)?.is_none() {
                    return Err(DatabaseError::NotFound {
                        entity: "project",
                        id: id.to_string(),
                    }
                    .into());
                }
                self.kv_set(CURRENT_PROJECT_KEY, id)
            }
            None => self.kv_delete(CURRENT_PROJECT_KEY),
        }
    }

    pub fn current_project(&self) -> Result<Option<String>> {
        self.kv_get(CURRENT_PROJECT_KEY)
    }

    // ── Key-value ────────────────────────────────────────────────────

    /// Get a value from the kv store.
    pub fn kv_get(&self, key: &str) -> Result<Option<String>> {
        let conn = self.conn()?;
        let value = conn
            .query_row("SELECT value FROM kv WHERE key = ?1", params![key], |row| {
                row.get::<_, String>(0)
            })
            .optional()?;
        Ok(value)
    }

    /// Set a value in the kv store, replacing any previous value whole.
    pub fn kv_set(&self, key: &str, value: &str) -> Result<()> {
        self.conn()?.execute(
            "INSERT OR REPLACE INTO kv (key, value) VALUES (?1, ?2)",
            params![key, value],
        )?;
        Ok(())
    }

    pub fn kv_delete(&self, key: &str) -> Result<()> {
        self.conn()?
            .execute("DELETE FROM kv WHERE key = ?1", params![key])?;
        Ok(())
    }
}

fn project_from_row(
    (id, name, emoji, created_at): (String, String, Option<String>, String),
) -> Result<Project> {
    let created_at = DateTime::parse_from_rfc3339(&created_at)
        .map(|at| at.with_timezone(&Utc))
        .map_err(|e| DatabaseError::QueryFailed(e.to_string()))?;
    Ok(Project {
        id,
        name,
        emoji,
        created_at,
    })
}

impl StatsStore for Database {
    fn log_session(&self, kind: SessionKind, duration_minutes: u32, project_id: Option<&str>) {
        if let Err(e) = self.record_session(kind, duration_minutes, project_id, Utc::now()) {
            warn!(error = %e, kind = kind.as_str(), "failed to record session");
        }
    }
}

impl ProjectSource for Database {
    fn current_project_id(&self) -> Option<String> {
        match self.current_project() {
            Ok(id) => id,
            Err(e) => {
                warn!(error = %e, "failed to read current project");
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn record_and_query() {
        let db = Database::open_memory().unwrap();
        let now = Utc::now();
        db.record_session(SessionKind::Work, 25, None, now).unwrap();
        db.record_session(SessionKind::ShortBreak, 5, None, now)
            .unwrap();
        db.record_session(SessionKind::LongBreak, 15, None, now)
            .unwrap();

        let stats = db.stats_all().unwrap();
        assert_eq!(stats.total_sessions, 3);
        assert_eq!(stats.work_sessions, 1);
        assert_eq!(stats.total_work_min, 25);
        assert_eq!(stats.total_break_min, 20);
        assert_eq!(stats.long_breaks, 1);

        let sessions = db.sessions_all().unwrap();
        assert_eq!(sessions.len(), 3);
        assert_eq!(sessions[0].kind, SessionKind::Work);
    }

    #[test]
    fn stats_today_ignores_older_sessions() {
        let db = Database::open_memory().unwrap();
        db.record_session(SessionKind::Work, 25, None, Utc::now())
            .unwrap();
        db.record_session(
            SessionKind::Work,
            50,
            None,
            Utc::now() - chrono::Duration::days(3),
        )
        .unwrap();
        assert_eq!(db.stats_today().unwrap().total_work_min, 25);
        assert_eq!(db.stats_all().unwrap().total_work_min, 75);
    }

    #[test]
    fn kv_store() {
        let db = Database::open_memory().unwrap();
        assert!(db.kv_get("test").unwrap().is_none());
        db.kv_set("test", "hello").unwrap();
        assert_eq!(db.kv_get("test").unwrap().unwrap(), "hello");
        db.kv_delete("test").unwrap();
        assert!(db.kv_get("test").unwrap().is_none());
    }

    #[test]
    fn deleting_project_removes_its_sessions() {
        let db = Database::open_memory().unwrap();
        let writing = db.create_project("Writing", Some("✍️")).unwrap();
        let coding = db.create_project("Coding", None).unwrap();
        let now = Utc::now();
        db.record_session(SessionKind::Work, 25, Some(&writing.id), now)
            .unwrap();
        db.record_session(SessionKind::ShortBreak, 5, Some(&writing.id), now)
            .unwrap();
        db.record_session(SessionKind::Work, 25, Some(&coding.id), now)
            .unwrap();
        db.set_current_project(Some(&writing.id)).unwrap();

        assert_eq!(db.delete_project(&writing.id).unwrap(), 2);
        assert!(db.get_project(&writing.id).unwrap().is_none());
        assert_eq!(db.sessions_all().unwrap().len(), 1);
        assert_eq!(db.current_project().unwrap(), None);
        assert_eq!(db.list_projects().unwrap(), vec![coding]);
    }

    #[test]
    fn selecting_unknown_project_fails() {
        let db = Database::open_memory().unwrap();
        assert!(db.set_current_project(Some("nope")).is_err());
        assert!(db.delete_project("nope").is_err());
    }

    #[test]
    fn stats_store_impl_attributes_project() {
        let db = Database::open_memory().unwrap();
        let project = db.create_project("Reading", None).unwrap();
        db.set_current_project(Some(&project.id)).unwrap();
        let current = db.current_project_id();
        db.log_session(SessionKind::Work, 12, current.as_deref());

        let sessions = db.sessions_for_project(&project.id).unwrap();
        assert_eq!(sessions.len(), 1);
        assert_eq!(sessions[0].duration_min, 12);
    }
}
