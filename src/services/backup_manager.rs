//! Backup/versioning manager for TabVault.
//!
//! Serializes whole session sets to the versioned exchange envelope and back,
//! and maintains the bounded per-session version history. Import is
//! fault-accumulating: a malformed envelope is rejected outright, but
//! individual bad folders/sessions/tabs only contribute to the error list
//! while the rest of the batch proceeds.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use serde::Deserialize;
use tracing::warn;
use uuid::Uuid;

use crate::database::{Database, SessionStore};
use crate::services::{compression, validation};
use crate::types::errors::{SessionError, StoreError};
use crate::types::export::{ExportEnvelope, ImportOptions, ImportReport, EXPORT_FORMAT_VERSION};
use crate::types::folder::Folder;
use crate::types::session::{Session, SessionVersion};
use crate::types::tab::{ScrollPosition, TabRecord, UNGROUPED_TAB_GROUP};

/// Lenient mirror of a session in an export file: every field optional so
/// foreign or older exports still parse, with validation applied afterwards.
#[derive(Debug, Deserialize)]
struct IncomingSession {
    #[serde(default)]
    id: String,
    #[serde(default)]
    name: String,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    tags: Vec<String>,
    #[serde(default)]
    folder_id: Option<String>,
    #[serde(default)]
    created_at: Option<i64>,
    #[serde(default)]
    updated_at: Option<i64>,
    #[serde(default)]
    version: Option<u32>,
    #[serde(default)]
    tabs: Vec<IncomingTab>,
}

#[derive(Debug, Deserialize)]
struct IncomingTab {
    #[serde(default)]
    id: String,
    #[serde(default)]
    url: String,
    #[serde(default)]
    title: String,
    #[serde(default)]
    favicon: Option<String>,
    #[serde(default)]
    pinned: bool,
    #[serde(default)]
    group_id: Option<i64>,
    #[serde(default)]
    group_color: Option<String>,
    #[serde(default)]
    group_title: Option<String>,
    #[serde(default)]
    index: Option<usize>,
    #[serde(default)]
    active: bool,
    #[serde(default)]
    muted: bool,
    #[serde(default)]
    scroll_position: Option<ScrollPosition>,
    #[serde(default)]
    form_data: Option<HashMap<String, String>>,
}

/// Backup manager backed by the SQLite store.
pub struct BackupManager {
    db: Arc<Database>,
}

impl BackupManager {
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }

    fn now() -> i64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_secs() as i64
    }

    fn now_millis() -> i64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_millis() as i64
    }

    // === Export ===

    /// Serializes sessions (all, or the given subset), folders, and
    /// optionally settings into the pretty-printed exchange envelope.
    /// Sessions are exported with their tab lists inflated so the file is
    /// portable without the codec.
    pub fn export_to_json(
        &self,
        ids: Option<&[String]>,
        include_settings: bool,
    ) -> Result<String, StoreError> {
        let conn = self.db.connection();
        let store = SessionStore::new(&conn);
        let wanted: Option<HashSet<&str>> =
            ids.map(|ids| ids.iter().map(String::as_str).collect());

        let mut sessions = Vec::new();
        for meta in store.get_all_metadata()? {
            if let Some(wanted) = &wanted {
                if !wanted.contains(meta.id.as_str()) {
                    continue;
                }
            }
            if let Some(mut session) = store.get_session(&meta.id)? {
                if session.is_compressed {
                    session.tabs = session
                        .compressed_tabs
                        .as_deref()
                        .map(compression::decompress_tabs)
                        .unwrap_or_default();
                }
                session.compressed_tabs = None;
                session.is_compressed = false;
                sessions.push(session);
            }
        }

        let envelope = ExportEnvelope {
            version: EXPORT_FORMAT_VERSION.to_string(),
            exported_at: Self::now_millis(),
            sessions,
            folders: store.get_folders()?,
            settings: if include_settings {
                Some(store.get_settings()?)
            } else {
                None
            },
        };

        serde_json::to_string_pretty(&envelope)
            .map_err(|e| StoreError::Serialization(e.to_string()))
    }

    // === Import ===

    /// Parses and imports an export file. A wrong envelope shape yields a
    /// failed report with a non-empty error list; per-item failures
    /// accumulate without aborting the batch. `success` is true iff at least
    /// one session imported.
    pub fn import_from_json(
        &self,
        text: &str,
        opts: &ImportOptions,
    ) -> Result<ImportReport, StoreError> {
        let mut report = ImportReport::default();

        let value: serde_json::Value = match serde_json::from_str(text) {
            Ok(value) => value,
            Err(e) => {
                report.errors.push(format!("Invalid export file: {}", e));
                return Ok(report);
            }
        };
        let sessions_value = match value.get("sessions").and_then(|s| s.as_array()) {
            Some(sessions) => sessions.clone(),
            None => {
                report
                    .errors
                    .push("Invalid export file format: missing sessions array".to_string());
                return Ok(report);
            }
        };

        let conn = self.db.connection();
        let store = SessionStore::new(&conn);

        // Folders first, building the id remap applied to sessions below.
        let mut folder_remap: HashMap<String, String> = HashMap::new();
        let existing_folders: HashSet<String> =
            store.get_folders()?.into_iter().map(|f| f.id).collect();
        if let Some(folders) = value.get("folders").and_then(|f| f.as_array()) {
            for folder_value in folders {
                let mut folder: Folder =
                    match serde_json::from_value(folder_value.clone()) {
                        Ok(folder) => folder,
                        Err(e) => {
                            report.errors.push(format!("Skipped folder: {}", e));
                            continue;
                        }
                    };
                folder.name = validation::sanitize_folder_name(&folder.name);
                if existing_folders.contains(&folder.id) && !opts.overwrite {
                    let fresh = Uuid::new_v4().to_string();
                    folder_remap.insert(folder.id.clone(), fresh.clone());
                    folder.id = fresh;
                }
                store.save_folder(&folder)?;
                report.imported_folders += 1;
            }
        }

        let existing_sessions: HashSet<String> = store
            .get_all_metadata()?
            .into_iter()
            .map(|m| m.id)
            .collect();

        for session_value in sessions_value {
            match self.import_one_session(
                &store,
                session_value,
                opts,
                &folder_remap,
                &existing_sessions,
            ) {
                Ok(()) => report.imported_sessions += 1,
                Err(message) => report.errors.push(message),
            }
        }

        if opts.import_settings {
            if let Some(settings_value) = value.get("settings") {
                match serde_json::from_value(settings_value.clone()) {
                    Ok(settings) => store.save_settings(&settings)?,
                    Err(e) => report.errors.push(format!("Skipped settings: {}", e)),
                }
            }
        }

        report.success = report.imported_sessions > 0;
        Ok(report)
    }

    /// Validates and persists one incoming session. The error string names
    /// the reason the session was rejected.
    fn import_one_session(
        &self,
        store: &SessionStore<'_>,
        session_value: serde_json::Value,
        opts: &ImportOptions,
        folder_remap: &HashMap<String, String>,
        existing_sessions: &HashSet<String>,
    ) -> Result<(), String> {
        let incoming: IncomingSession = serde_json::from_value(session_value)
            .map_err(|e| format!("Skipped session: {}", e))?;
        if incoming.id.is_empty() {
            return Err("Skipped session: missing id".to_string());
        }

        // Only tabs with a valid URL and a non-empty title survive; a
        // session left with none is rejected entirely.
        let mut tabs: Vec<TabRecord> = Vec::new();
        for tab in incoming.tabs {
            let url = match validation::sanitize_url(&tab.url) {
                Some(url) => url,
                None => continue,
            };
            if tab.title.trim().is_empty() {
                continue;
            }
            tabs.push(TabRecord {
                id: if tab.id.is_empty() {
                    Uuid::new_v4().to_string()
                } else {
                    tab.id
                },
                url,
                title: tab.title,
                favicon: tab.favicon,
                pinned: tab.pinned,
                group_id: tab.group_id.unwrap_or(UNGROUPED_TAB_GROUP),
                group_color: tab.group_color,
                group_title: tab.group_title,
                index: tab.index.unwrap_or(tabs.len()),
                active: tab.active,
                muted: tab.muted,
                scroll_position: tab.scroll_position,
                form_data: tab.form_data,
            });
        }
        if tabs.is_empty() {
            return Err(format!(
                "Skipped session {}: no valid tabs",
                incoming.id
            ));
        }

        let now = Self::now();
        let folder_id = incoming.folder_id.map(|id| {
            folder_remap.get(&id).cloned().unwrap_or(id)
        });
        let id = if existing_sessions.contains(&incoming.id) && !opts.overwrite {
            Uuid::new_v4().to_string()
        } else {
            incoming.id
        };

        let session = Session {
            id,
            name: validation::sanitize_session_name(&incoming.name),
            description: incoming
                .description
                .as_deref()
                .map(validation::sanitize_description)
                .filter(|d| !d.is_empty()),
            tags: validation::sanitize_tags(&incoming.tags, validation::DEFAULT_MAX_TAGS),
            folder_id,
            created_at: incoming.created_at.unwrap_or(now),
            updated_at: incoming.updated_at.unwrap_or(now),
            last_accessed_at: None,
            is_emergency: false,
            version: incoming.version.unwrap_or(1),
            tabs: tabs.clone(),
            compressed_tabs: None,
            is_compressed: false,
        };

        let meta = session.derive_metadata(&tabs);
        store
            .save_session(&session, &meta)
            .map_err(|e| format!("Failed to import session {}: {}", session.id, e))
    }

    // === Version history ===

    /// Snapshots the current session into its version history, trimming to
    /// the configured maximum (oldest evicted).
    pub fn create_version(&self, session_id: &str) -> Result<SessionVersion, SessionError> {
        let conn = self.db.connection();
        let store = SessionStore::new(&conn);
        let session = store
            .get_session(session_id)
            .map_err(|e| SessionError::Storage(e.to_string()))?
            .ok_or_else(|| SessionError::NotFound(session_id.to_string()))?;
        let settings = store
            .get_settings()
            .map_err(|e| SessionError::Storage(e.to_string()))?;

        let version = SessionVersion {
            version_id: Uuid::new_v4().to_string(),
            session_id: session_id.to_string(),
            created_at: Self::now(),
            compressed: compression::compress_session(&session)
                .map_err(|e| SessionError::Compression(e.to_string()))?,
        };
        store
            .push_version(&version, settings.max_versions_per_session)
            .map_err(|e| SessionError::Storage(e.to_string()))?;
        Ok(version)
    }

    /// Lists a session's versions, newest first.
    pub fn list_versions(&self, session_id: &str) -> Result<Vec<SessionVersion>, StoreError> {
        let conn = self.db.connection();
        SessionStore::new(&conn).get_versions(session_id)
    }

    /// Overwrites the live session with a stored snapshot, bumping
    /// `updated_at` and `version`. Fails when the version id is unknown or
    /// the snapshot cannot be decompressed.
    pub fn restore_version(
        &self,
        session_id: &str,
        version_id: &str,
    ) -> Result<Session, SessionError> {
        let conn = self.db.connection();
        let store = SessionStore::new(&conn);
        let versions = store
            .get_versions(session_id)
            .map_err(|e| SessionError::Storage(e.to_string()))?;
        let version = versions
            .into_iter()
            .find(|v| v.version_id == version_id)
            .ok_or_else(|| SessionError::VersionNotFound(version_id.to_string()))?;

        let mut restored = compression::decompress_session(&version.compressed)
            .ok_or_else(|| {
                warn!("version snapshot {} failed to decompress", version_id);
                SessionError::CorruptTabData(version_id.to_string())
            })?;
        restored.updated_at = Self::now();
        restored.version += 1;

        let tabs = if restored.is_compressed {
            restored
                .compressed_tabs
                .as_deref()
                .map(compression::decompress_tabs)
                .unwrap_or_default()
        } else {
            restored.tabs.clone()
        };
        let meta = restored.derive_metadata(&tabs);
        store
            .save_session(&restored, &meta)
            .map_err(|e| SessionError::Storage(e.to_string()))?;
        Ok(restored)
    }

    /// Removes a session's entire version history.
    pub fn delete_version_history(&self, session_id: &str) -> Result<bool, StoreError> {
        let conn = self.db.connection();
        SessionStore::new(&conn).delete_version_history(session_id)
    }
}
