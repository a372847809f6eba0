//! Snapshot persistence for sessions
//!
//! A [`SnapshotStore`] keeps the serialized form of each session keyed by its
//! session key. Two backends are provided: [`SqliteStorage`] (one table row
//! per session) and [`FileSnapshotStore`] (one JSON file per session).

use crate::config::{StorageBackend, StorageConfig};
use crate::context::{Session, SessionKey};
use crate::error::{ConvokeepError, Result};
use anyhow::Context;
use chrono::{DateTime, Utc};
use directories::ProjectDirs;
use rusqlite::{params, Connection, OptionalExtension};
use std::path::PathBuf;

pub mod file;
pub mod types;
pub use file::FileSnapshotStore;
pub use types::StoredSession;

/// Persistent home for session snapshots
pub trait SnapshotStore: Send + Sync {
    /// Writes the snapshot of `session`, replacing any previous one
    fn save(&self, session: &Session) -> Result<()>;

    /// Reads the snapshot stored for `key`
    fn load(&self, key: &SessionKey) -> Result<Option<String>>;

    /// Deletes the snapshot for `key`, returning whether one existed
    fn delete(&self, key: &SessionKey) -> Result<bool>;

    /// Lists stored sessions, most recently updated first
    fn list(&self) -> Result<Vec<StoredSession>>;
}

/// Opens the snapshot store selected by configuration
///
/// # Errors
///
/// Returns `ConvokeepError::Storage` if the backing database or directory
/// cannot be created
pub fn open_store(config: &StorageConfig) -> Result<Box<dyn SnapshotStore>> {
    match config.backend {
        StorageBackend::Sqlite => {
            let storage = match &config.path {
                Some(path) => SqliteStorage::new_with_path(path)?,
                None => SqliteStorage::new()?,
            };
            Ok(Box::new(storage))
        }
        StorageBackend::File => {
            let dir = match &config.path {
                Some(path) => PathBuf::from(path),
                None => data_dir()?.join("sessions"),
            };
            Ok(Box::new(FileSnapshotStore::new(dir)?))
        }
    }
}

/// Platform data directory for Convokeep
fn data_dir() -> Result<PathBuf> {
    let proj_dirs = ProjectDirs::from("com", "convokeep", "convokeep")
        .ok_or_else(|| ConvokeepError::Storage("Could not determine data directory".into()))?;
    Ok(proj_dirs.data_dir().to_path_buf())
}

fn parse_timestamp(raw: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|_| Utc::now())
}

/// SQLite snapshot store
pub struct SqliteStorage {
    db_path: PathBuf,
}

impl SqliteStorage {
    /// Create a new storage instance
    ///
    /// Uses `CONVOKEEP_STORAGE_PATH` when set, else `sessions.db` in the
    /// user's data directory.
    pub fn new() -> Result<Self> {
        if let Ok(override_path) = std::env::var("CONVOKEEP_STORAGE_PATH") {
            return Self::new_with_path(override_path);
        }

        let data_dir = data_dir()?;
        std::fs::create_dir_all(&data_dir)
            .context("Failed to create data directory")
            .map_err(|e| ConvokeepError::Storage(e.to_string()))?;

        Self::new_with_path(data_dir.join("sessions.db"))
    }

    /// Create a new storage instance that uses the specified database path.
    ///
    /// # Examples
    ///
    /// ```
    /// use convokeep::storage::SqliteStorage;
    ///
    /// let dir = tempfile::tempdir().unwrap();
    /// let storage = SqliteStorage::new_with_path(dir.path().join("sessions.db")).unwrap();
    /// ```
    pub fn new_with_path<P: Into<PathBuf>>(db_path: P) -> Result<Self> {
        let db_path = db_path.into();

        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent)
                .context("Failed to create parent directory for database")
                .map_err(|e| ConvokeepError::Storage(e.to_string()))?;
        }

        let storage = Self { db_path };
        storage.init()?;
        tracing::debug!(path = %storage.db_path.display(), "Opened SQLite snapshot store");
        Ok(storage)
    }

    /// Path of the database file
    pub fn db_path(&self) -> &std::path::Path {
        &self.db_path
    }

    fn connect(&self) -> Result<Connection> {
        Ok(Connection::open(&self.db_path)
            .context("Failed to open database")
            .map_err(|e| ConvokeepError::Storage(e.to_string()))?)
    }

    /// Initialize the database schema
    fn init(&self) -> Result<()> {
        let conn = self.connect()?;

        conn.execute(
            "CREATE TABLE IF NOT EXISTS sessions (
                id TEXT PRIMARY KEY,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL,
                turn_count INTEGER NOT NULL,
                snapshot JSON NOT NULL
            )",
            [],
        )
        .context("Failed to create tables")
        .map_err(|e| ConvokeepError::Storage(e.to_string()))?;

        Ok(())
    }
}

impl SnapshotStore for SqliteStorage {
    fn save(&self, session: &Session) -> Result<()> {
        let snapshot = session.serialize()?;
        let id = session.key().as_str();
        let now = Utc::now().to_rfc3339();
        let created_at = session.created_at().to_rfc3339();
        let turn_count = session.len() as i64;

        let mut conn = self.connect()?;
        let tx = conn
            .transaction()
            .context("Failed to start transaction")
            .map_err(|e| ConvokeepError::Storage(e.to_string()))?;

        // created_at of an existing row is kept
        tx.execute(
            "INSERT INTO sessions (id, created_at, updated_at, turn_count, snapshot)
            VALUES (?1, ?2, ?3, ?4, ?5)
            ON CONFLICT(id) DO UPDATE SET
                updated_at = excluded.updated_at,
                turn_count = excluded.turn_count,
                snapshot = excluded.snapshot",
            params![id, created_at, now, turn_count, snapshot],
        )
        .context("Failed to save session")
        .map_err(|e| ConvokeepError::Storage(e.to_string()))?;

        tx.commit()
            .context("Failed to commit transaction")
            .map_err(|e| ConvokeepError::Storage(e.to_string()))?;

        tracing::debug!(session = id, turn_count, "Saved session snapshot");
        Ok(())
    }

    fn load(&self, key: &SessionKey) -> Result<Option<String>> {
        let conn = self.connect()?;
        let snapshot = conn
            .query_row(
                "SELECT snapshot FROM sessions WHERE id = ?1",
                params![key.as_str()],
                |row| row.get::<_, String>(0),
            )
            .optional()
            .context("Failed to query session")
            .map_err(|e| ConvokeepError::Storage(e.to_string()))?;
        Ok(snapshot)
    }

    fn delete(&self, key: &SessionKey) -> Result<bool> {
        let conn = self.connect()?;
        let removed = conn
            .execute("DELETE FROM sessions WHERE id = ?1", params![key.as_str()])
            .context("Failed to delete session")
            .map_err(|e| ConvokeepError::Storage(e.to_string()))?;
        Ok(removed > 0)
    }

    fn list(&self) -> Result<Vec<StoredSession>> {
        let conn = self.connect()?;
        let mut stmt = conn
            .prepare(
                "SELECT id, created_at, updated_at, turn_count
                FROM sessions
                ORDER BY updated_at DESC",
            )
            .context("Failed to prepare statement")
            .map_err(|e| ConvokeepError::Storage(e.to_string()))?;

        let rows = stmt
            .query_map([], |row| {
                let id: String = row.get(0)?;
                let created_at: String = row.get(1)?;
                let updated_at: String = row.get(2)?;
                let turn_count: i64 = row.get(3)?;
                Ok(StoredSession {
                    id,
                    created_at: parse_timestamp(&created_at),
                    updated_at: parse_timestamp(&updated_at),
                    turn_count: usize::try_from(turn_count).unwrap_or(0),
                })
            })
            .context("Failed to query sessions")
            .map_err(|e| ConvokeepError::Storage(e.to_string()))?;

        Ok(rows.flatten().collect())
    }
}
