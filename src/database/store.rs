//! Persistent session store for TabVault.
//!
//! Key-value style record access over the SQLite schema: full sessions, the
//! lightweight metadata list, folders, settings, the bounded emergency ring,
//! per-session version history, usage statistics, and the durable crash
//! marker.
//!
//! The store enforces the two-view consistency rule: every write that
//! changes a session also updates its metadata row inside the same
//! transaction. Callers never write one without the other. Storage failures
//! propagate to the caller uncaught — retry policy lives at the messaging
//! boundary, not here.

use rusqlite::{params, Connection};
use std::time::{SystemTime, UNIX_EPOCH};

use crate::types::errors::StoreError;
use crate::types::folder::Folder;
use crate::types::session::{Session, SessionMetadata, SessionVersion};
use crate::types::settings::VaultSettings;
use crate::types::statistics::UsageStatistics;

const CRASH_MARKER_KEY: &str = "crash_detected_at";

/// Store backed by a borrowed SQLite connection, created on demand:
/// `let conn = db.connection(); let store = SessionStore::new(&conn);`
pub struct SessionStore<'a> {
    conn: &'a Connection,
}

impl<'a> SessionStore<'a> {
    /// Creates a new `SessionStore` using the provided database connection.
    pub fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }

    /// Returns the current UNIX timestamp in seconds.
    fn now() -> i64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_secs() as i64
    }

    fn db_err(e: rusqlite::Error) -> StoreError {
        StoreError::Database(e.to_string())
    }

    fn ser_err(e: serde_json::Error) -> StoreError {
        StoreError::Serialization(e.to_string())
    }

    // === Sessions ===

    /// Persists a session together with its metadata view in one
    /// transaction. A new id is prepended to the listing; an existing id is
    /// replaced in place (the upsert keeps the row's slot).
    pub fn save_session(
        &self,
        session: &Session,
        meta: &SessionMetadata,
    ) -> Result<(), StoreError> {
        let data = serde_json::to_string(session).map_err(Self::ser_err)?;
        let tags = serde_json::to_string(&meta.tags).map_err(Self::ser_err)?;
        let favicons = serde_json::to_string(&meta.favicon_preview).map_err(Self::ser_err)?;
        let domains = serde_json::to_string(&meta.domain_preview).map_err(Self::ser_err)?;

        let tx = self.conn.unchecked_transaction().map_err(Self::db_err)?;
        tx.execute(
            "INSERT INTO sessions (id, data, updated_at) VALUES (?1, ?2, ?3)
             ON CONFLICT(id) DO UPDATE SET data = ?2, updated_at = ?3",
            params![session.id, data, session.updated_at],
        )
        .map_err(Self::db_err)?;
        tx.execute(
            "INSERT INTO session_meta (id, name, description, tags, folder_id, tab_count,
                 created_at, updated_at, last_accessed_at, is_emergency, version,
                 favicon_preview, domain_preview)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)
             ON CONFLICT(id) DO UPDATE SET
                 name = ?2, description = ?3, tags = ?4, folder_id = ?5, tab_count = ?6,
                 created_at = ?7, updated_at = ?8, last_accessed_at = ?9,
                 is_emergency = ?10, version = ?11, favicon_preview = ?12,
                 domain_preview = ?13",
            params![
                meta.id,
                meta.name,
                meta.description,
                tags,
                meta.folder_id,
                meta.tab_count as i64,
                meta.created_at,
                meta.updated_at,
                meta.last_accessed_at,
                meta.is_emergency,
                meta.version,
                favicons,
                domains,
            ],
        )
        .map_err(Self::db_err)?;
        tx.commit().map_err(Self::db_err)
    }

    /// Fetches a full session record. `None` when the id is unknown.
    pub fn get_session(&self, id: &str) -> Result<Option<Session>, StoreError> {
        let result = self.conn.query_row(
            "SELECT data FROM sessions WHERE id = ?1",
            params![id],
            |row| row.get::<_, String>(0),
        );
        match result {
            Ok(data) => serde_json::from_str(&data).map(Some).map_err(Self::ser_err),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(Self::db_err(e)),
        }
    }

    /// Lists all session metadata, most recent first.
    pub fn get_all_metadata(&self) -> Result<Vec<SessionMetadata>, StoreError> {
        let mut stmt = self
            .conn
            .prepare(
                "SELECT id, name, description, tags, folder_id, tab_count, created_at,
                        updated_at, last_accessed_at, is_emergency, version,
                        favicon_preview, domain_preview
                 FROM session_meta ORDER BY created_at DESC, rowid DESC",
            )
            .map_err(Self::db_err)?;

        let rows = stmt
            .query_map([], Self::row_to_metadata)
            .map_err(Self::db_err)?;

        let mut result = Vec::new();
        for row in rows {
            result.push(row.map_err(Self::db_err)?);
        }
        Ok(result)
    }

    /// Removes a session and its metadata entry atomically. Returns whether
    /// the session existed.
    pub fn delete_session(&self, id: &str) -> Result<bool, StoreError> {
        let tx = self.conn.unchecked_transaction().map_err(Self::db_err)?;
        let affected = tx
            .execute("DELETE FROM sessions WHERE id = ?1", params![id])
            .map_err(Self::db_err)?;
        tx.execute("DELETE FROM session_meta WHERE id = ?1", params![id])
            .map_err(Self::db_err)?;
        tx.commit().map_err(Self::db_err)?;
        Ok(affected > 0)
    }

    fn row_to_metadata(row: &rusqlite::Row) -> rusqlite::Result<SessionMetadata> {
        let tags: String = row.get(3)?;
        let favicons: String = row.get(11)?;
        let domains: String = row.get(12)?;
        Ok(SessionMetadata {
            id: row.get(0)?,
            name: row.get(1)?,
            description: row.get(2)?,
            tags: serde_json::from_str(&tags).unwrap_or_default(),
            folder_id: row.get(4)?,
            tab_count: row.get::<_, i64>(5)? as usize,
            created_at: row.get(6)?,
            updated_at: row.get(7)?,
            last_accessed_at: row.get(8)?,
            is_emergency: row.get(9)?,
            version: row.get(10)?,
            favicon_preview: serde_json::from_str(&favicons).unwrap_or_default(),
            domain_preview: serde_json::from_str(&domains).unwrap_or_default(),
        })
    }

    // === Folders ===

    /// Inserts or replaces a folder.
    pub fn save_folder(&self, folder: &Folder) -> Result<(), StoreError> {
        self.conn
            .execute(
                "INSERT INTO folders (id, name, color, icon, parent_id, position,
                     created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
                 ON CONFLICT(id) DO UPDATE SET
                     name = ?2, color = ?3, icon = ?4, parent_id = ?5, position = ?6,
                     updated_at = ?8",
                params![
                    folder.id,
                    folder.name,
                    folder.color,
                    folder.icon,
                    folder.parent_id,
                    folder.position,
                    folder.created_at,
                    folder.updated_at,
                ],
            )
            .map_err(Self::db_err)?;
        Ok(())
    }

    /// Lists folders ordered by display position.
    pub fn get_folders(&self) -> Result<Vec<Folder>, StoreError> {
        let mut stmt = self
            .conn
            .prepare(
                "SELECT id, name, color, icon, parent_id, position, created_at, updated_at
                 FROM folders ORDER BY position, created_at",
            )
            .map_err(Self::db_err)?;

        let rows = stmt
            .query_map([], |row| {
                Ok(Folder {
                    id: row.get(0)?,
                    name: row.get(1)?,
                    color: row.get(2)?,
                    icon: row.get(3)?,
                    parent_id: row.get(4)?,
                    position: row.get(5)?,
                    created_at: row.get(6)?,
                    updated_at: row.get(7)?,
                })
            })
            .map_err(Self::db_err)?;

        let mut result = Vec::new();
        for row in rows {
            result.push(row.map_err(Self::db_err)?);
        }
        Ok(result)
    }

    /// Deletes a folder and its direct child folders (sessions referencing
    /// the folder keep their `folder_id`). Returns whether the folder
    /// existed.
    pub fn delete_folder(&self, id: &str) -> Result<bool, StoreError> {
        let tx = self.conn.unchecked_transaction().map_err(Self::db_err)?;
        tx.execute("DELETE FROM folders WHERE parent_id = ?1", params![id])
            .map_err(Self::db_err)?;
        let affected = tx
            .execute("DELETE FROM folders WHERE id = ?1", params![id])
            .map_err(Self::db_err)?;
        tx.commit().map_err(Self::db_err)?;
        Ok(affected > 0)
    }

    // === Settings ===

    /// Reads settings, merging the stored record over the defaults so that
    /// fields introduced after the record was written backfill transparently.
    pub fn get_settings(&self) -> Result<VaultSettings, StoreError> {
        let result = self.conn.query_row(
            "SELECT data FROM settings WHERE id = 'default'",
            [],
            |row| row.get::<_, String>(0),
        );
        let stored = match result {
            Ok(data) => data,
            Err(rusqlite::Error::QueryReturnedNoRows) => return Ok(VaultSettings::default()),
            Err(e) => return Err(Self::db_err(e)),
        };

        let stored: serde_json::Value =
            serde_json::from_str(&stored).map_err(Self::ser_err)?;
        let mut merged =
            serde_json::to_value(VaultSettings::default()).map_err(Self::ser_err)?;
        if let (Some(defaults), Some(overrides)) = (merged.as_object_mut(), stored.as_object())
        {
            for (key, value) in overrides {
                defaults.insert(key.clone(), value.clone());
            }
        }
        serde_json::from_value(merged).map_err(Self::ser_err)
    }

    /// Persists the settings record.
    pub fn save_settings(&self, settings: &VaultSettings) -> Result<(), StoreError> {
        let data = serde_json::to_string(settings).map_err(Self::ser_err)?;
        self.conn
            .execute(
                "INSERT INTO settings (id, data) VALUES ('default', ?1)
                 ON CONFLICT(id) DO UPDATE SET data = ?1",
                params![data],
            )
            .map_err(Self::db_err)?;
        Ok(())
    }

    // === Emergency ring buffer ===

    /// Appends an emergency session and trims the ring to `max` entries,
    /// evicting the oldest.
    pub fn push_emergency_session(
        &self,
        session: &Session,
        max: usize,
    ) -> Result<(), StoreError> {
        let data = serde_json::to_string(session).map_err(Self::ser_err)?;
        let tx = self.conn.unchecked_transaction().map_err(Self::db_err)?;
        tx.execute(
            "INSERT OR REPLACE INTO emergency_sessions (id, data, created_at)
             VALUES (?1, ?2, ?3)",
            params![session.id, data, session.created_at],
        )
        .map_err(Self::db_err)?;
        tx.execute(
            "DELETE FROM emergency_sessions WHERE id NOT IN (
                 SELECT id FROM emergency_sessions
                 ORDER BY created_at DESC, rowid DESC LIMIT ?1
             )",
            params![max as i64],
        )
        .map_err(Self::db_err)?;
        tx.commit().map_err(Self::db_err)
    }

    /// Lists emergency sessions, most recent first.
    pub fn get_emergency_sessions(&self) -> Result<Vec<Session>, StoreError> {
        let mut stmt = self
            .conn
            .prepare(
                "SELECT data FROM emergency_sessions ORDER BY created_at DESC, rowid DESC",
            )
            .map_err(Self::db_err)?;

        let rows = stmt
            .query_map([], |row| row.get::<_, String>(0))
            .map_err(Self::db_err)?;

        let mut result = Vec::new();
        for row in rows {
            let data = row.map_err(Self::db_err)?;
            result.push(serde_json::from_str(&data).map_err(Self::ser_err)?);
        }
        Ok(result)
    }

    /// Empties the emergency ring.
    pub fn clear_emergency_sessions(&self) -> Result<(), StoreError> {
        self.conn
            .execute("DELETE FROM emergency_sessions", [])
            .map_err(Self::db_err)?;
        Ok(())
    }

    // === Version history ===

    /// Prepends a version snapshot and trims the session's history to `max`
    /// entries (FIFO eviction — versions are write-once).
    pub fn push_version(&self, version: &SessionVersion, max: usize) -> Result<(), StoreError> {
        let tx = self.conn.unchecked_transaction().map_err(Self::db_err)?;
        tx.execute(
            "INSERT INTO session_versions (version_id, session_id, compressed, created_at)
             VALUES (?1, ?2, ?3, ?4)",
            params![
                version.version_id,
                version.session_id,
                version.compressed,
                version.created_at,
            ],
        )
        .map_err(Self::db_err)?;
        tx.execute(
            "DELETE FROM session_versions WHERE session_id = ?1 AND version_id NOT IN (
                 SELECT version_id FROM session_versions WHERE session_id = ?1
                 ORDER BY created_at DESC, rowid DESC LIMIT ?2
             )",
            params![version.session_id, max as i64],
        )
        .map_err(Self::db_err)?;
        tx.commit().map_err(Self::db_err)
    }

    /// Lists a session's versions, newest first.
    pub fn get_versions(&self, session_id: &str) -> Result<Vec<SessionVersion>, StoreError> {
        let mut stmt = self
            .conn
            .prepare(
                "SELECT version_id, session_id, compressed, created_at
                 FROM session_versions WHERE session_id = ?1
                 ORDER BY created_at DESC, rowid DESC",
            )
            .map_err(Self::db_err)?;

        let rows = stmt
            .query_map(params![session_id], |row| {
                Ok(SessionVersion {
                    version_id: row.get(0)?,
                    session_id: row.get(1)?,
                    compressed: row.get(2)?,
                    created_at: row.get(3)?,
                })
            })
            .map_err(Self::db_err)?;

        let mut result = Vec::new();
        for row in rows {
            result.push(row.map_err(Self::db_err)?);
        }
        Ok(result)
    }

    /// Removes the entire version history for a session. Returns whether any
    /// versions existed.
    pub fn delete_version_history(&self, session_id: &str) -> Result<bool, StoreError> {
        let affected = self
            .conn
            .execute(
                "DELETE FROM session_versions WHERE session_id = ?1",
                params![session_id],
            )
            .map_err(Self::db_err)?;
        Ok(affected > 0)
    }

    // === Statistics ===

    /// Reads the accumulator record; defaults when it has never been written.
    pub fn get_statistics(&self) -> Result<UsageStatistics, StoreError> {
        let result = self.conn.query_row(
            "SELECT sessions_saved, tabs_saved, sessions_restored, tabs_restored, last_used_at
             FROM statistics WHERE id = 'default'",
            [],
            |row| {
                Ok(UsageStatistics {
                    sessions_saved: row.get::<_, i64>(0)? as u64,
                    tabs_saved: row.get::<_, i64>(1)? as u64,
                    sessions_restored: row.get::<_, i64>(2)? as u64,
                    tabs_restored: row.get::<_, i64>(3)? as u64,
                    last_used_at: row.get(4)?,
                })
            },
        );
        match result {
            Ok(stats) => Ok(stats),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(UsageStatistics::default()),
            Err(e) => Err(Self::db_err(e)),
        }
    }

    /// Additively records a save: sessions and tabs saved counters.
    pub fn record_saved(&self, sessions: u64, tabs: u64) -> Result<(), StoreError> {
        self.bump_statistics(sessions, tabs, 0, 0)
    }

    /// Additively records a restore: sessions and tabs restored counters.
    pub fn record_restored(&self, sessions: u64, tabs: u64) -> Result<(), StoreError> {
        self.bump_statistics(0, 0, sessions, tabs)
    }

    fn bump_statistics(
        &self,
        sessions_saved: u64,
        tabs_saved: u64,
        sessions_restored: u64,
        tabs_restored: u64,
    ) -> Result<(), StoreError> {
        self.conn
            .execute(
                "INSERT INTO statistics (id, sessions_saved, tabs_saved, sessions_restored,
                     tabs_restored, last_used_at)
                 VALUES ('default', ?1, ?2, ?3, ?4, ?5)
                 ON CONFLICT(id) DO UPDATE SET
                     sessions_saved = sessions_saved + ?1,
                     tabs_saved = tabs_saved + ?2,
                     sessions_restored = sessions_restored + ?3,
                     tabs_restored = tabs_restored + ?4,
                     last_used_at = ?5",
                params![
                    sessions_saved as i64,
                    tabs_saved as i64,
                    sessions_restored as i64,
                    tabs_restored as i64,
                    Self::now(),
                ],
            )
            .map_err(Self::db_err)?;
        Ok(())
    }

    /// Resets all counters. The only non-additive statistics write.
    pub fn clear_statistics(&self) -> Result<(), StoreError> {
        self.conn
            .execute("DELETE FROM statistics WHERE id = 'default'", [])
            .map_err(Self::db_err)?;
        Ok(())
    }

    // === Crash marker ===

    /// Persists the durable crash marker with the detection timestamp.
    pub fn set_crash_marker(&self, detected_at: i64) -> Result<(), StoreError> {
        self.conn
            .execute(
                "INSERT INTO app_state (key, value) VALUES (?1, ?2)
                 ON CONFLICT(key) DO UPDATE SET value = ?2",
                params![CRASH_MARKER_KEY, detected_at.to_string()],
            )
            .map_err(Self::db_err)?;
        Ok(())
    }

    /// Reads the crash marker timestamp, if one is set.
    pub fn get_crash_marker(&self) -> Result<Option<i64>, StoreError> {
        let result = self.conn.query_row(
            "SELECT value FROM app_state WHERE key = ?1",
            params![CRASH_MARKER_KEY],
            |row| row.get::<_, String>(0),
        );
        match result {
            Ok(value) => Ok(value.parse().ok()),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(Self::db_err(e)),
        }
    }

    /// Clears the crash marker.
    pub fn clear_crash_marker(&self) -> Result<(), StoreError> {
        self.conn
            .execute(
                "DELETE FROM app_state WHERE key = ?1",
                params![CRASH_MARKER_KEY],
            )
            .map_err(Self::db_err)?;
        Ok(())
    }
}
