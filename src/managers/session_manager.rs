//! Session Lifecycle Manager for TabVault.
//!
//! Orchestrates create/read/update/delete/duplicate/merge/split/restore of
//! sessions and the emergency-backup capture path, applying sanitization,
//! the compression policy, and statistics bookkeeping on the way through.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use chrono::Local;
use uuid::Uuid;

use crate::database::{Database, SessionStore};
use crate::managers::tab_engine::{RestoreOptions, RestoreOutcome, TabEngine};
use crate::managers::window_manager::WindowManager;
use crate::services::{compression, validation};
use crate::types::errors::{SessionError, StoreError};
use crate::types::session::{Session, SessionMetadata};
use crate::types::settings::VaultSettings;
use crate::types::tab::TabRecord;

/// Options for `create_session`.
#[derive(Debug, Clone, Default)]
pub struct CreateSessionOptions {
    /// Capture every window instead of just the focused one.
    pub all_windows: bool,
    pub description: Option<String>,
    pub tags: Vec<String>,
    pub folder_id: Option<String>,
}

/// Field patch for `update_session`. `None` fields are left untouched;
/// `folder_id` uses a nested option so the folder can be cleared.
#[derive(Debug, Clone, Default)]
pub struct SessionUpdate {
    pub name: Option<String>,
    pub description: Option<String>,
    pub tags: Option<Vec<String>>,
    pub folder_id: Option<Option<String>>,
}

/// Trait defining session lifecycle operations.
pub trait SessionManagerTrait {
    fn create_session(
        &self,
        windows: &WindowManager,
        name: &str,
        opts: &CreateSessionOptions,
    ) -> Result<Session, SessionError>;
    fn get_session(&self, id: &str) -> Result<Option<Session>, SessionError>;
    fn list_sessions(&self) -> Result<Vec<SessionMetadata>, SessionError>;
    fn update_session(
        &self,
        id: &str,
        updates: &SessionUpdate,
    ) -> Result<Option<Session>, SessionError>;
    fn delete_session(&self, id: &str) -> Result<bool, SessionError>;
    fn restore_session(
        &mut self,
        windows: &mut WindowManager,
        id: &str,
        tab_ids: Option<&[String]>,
        options: Option<RestoreOptions>,
    ) -> Result<RestoreOutcome, SessionError>;
    fn duplicate_session(
        &self,
        id: &str,
        new_name: Option<&str>,
    ) -> Result<Session, SessionError>;
    fn merge_sessions(&self, ids: &[String], new_name: &str) -> Result<Session, SessionError>;
    fn split_session(&self, id: &str) -> Result<Vec<Session>, SessionError>;
    fn create_emergency_session(
        &self,
        windows: &WindowManager,
    ) -> Result<Session, SessionError>;
}

/// Session manager backed by the SQLite store and the capture/restore engine.
pub struct SessionManager {
    db: Arc<Database>,
    engine: TabEngine,
}

impl SessionManager {
    pub fn new(db: Arc<Database>, engine: TabEngine) -> Self {
        Self { db, engine }
    }

    fn now() -> i64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_secs() as i64
    }

    fn store_err(e: StoreError) -> SessionError {
        SessionError::Storage(e.to_string())
    }

    /// One-shot fetch of a lazily restored tab's target URL; called from the
    /// tab-activated path.
    pub fn take_pending_lazy_url(&mut self, tab_id: &str) -> Option<String> {
        self.engine.get_pending_lazy_url(tab_id)
    }

    /// Applies the compression policy to a session body: the tab list either
    /// stays inline or moves into the compressed blob, never both.
    fn apply_compression(
        session: &mut Session,
        tabs: Vec<TabRecord>,
        settings: &VaultSettings,
    ) -> Result<(), SessionError> {
        if compression::should_compress(tabs.len(), settings.compression_threshold) {
            session.compressed_tabs = Some(
                compression::compress_tabs(&tabs)
                    .map_err(|e| SessionError::Compression(e.to_string()))?,
            );
            session.is_compressed = true;
            session.tabs = Vec::new();
        } else {
            session.tabs = tabs;
            session.compressed_tabs = None;
            session.is_compressed = false;
        }
        Ok(())
    }

    /// Persists a session, deriving its metadata from the authoritative
    /// (uncompressed) tab list.
    fn persist(
        store: &SessionStore<'_>,
        session: &Session,
        tabs: &[TabRecord],
    ) -> Result<(), SessionError> {
        let meta = session.derive_metadata(tabs);
        store.save_session(session, &meta).map_err(Self::store_err)
    }

    /// The authoritative tab list of a loaded session.
    fn authoritative_tabs(session: &Session) -> Vec<TabRecord> {
        if session.is_compressed {
            session
                .compressed_tabs
                .as_deref()
                .map(compression::decompress_tabs)
                .unwrap_or_default()
        } else {
            session.tabs.clone()
        }
    }

    /// Fresh session skeleton shared by the constructing operations.
    fn blank_session(name: String, now: i64) -> Session {
        Session {
            id: Uuid::new_v4().to_string(),
            name,
            description: None,
            tags: Vec::new(),
            folder_id: None,
            created_at: now,
            updated_at: now,
            last_accessed_at: None,
            is_emergency: false,
            version: 1,
            tabs: Vec::new(),
            compressed_tabs: None,
            is_compressed: false,
        }
    }
}

impl SessionManagerTrait for SessionManager {
    /// Captures the selected windows into a new named session and persists
    /// it. Fails when capture yields no valid tabs.
    fn create_session(
        &self,
        windows: &WindowManager,
        name: &str,
        opts: &CreateSessionOptions,
    ) -> Result<Session, SessionError> {
        let conn = self.db.connection();
        let store = SessionStore::new(&conn);
        let settings = store.get_settings().map_err(Self::store_err)?;

        let tabs = if opts.all_windows {
            self.engine.capture_all_tabs(windows, &settings)
        } else {
            self.engine.capture_current_window_tabs(windows, &settings)
        };
        if tabs.is_empty() {
            return Err(SessionError::NoValidTabs);
        }

        let mut session =
            Self::blank_session(validation::sanitize_session_name(name), Self::now());
        session.description = opts
            .description
            .as_deref()
            .map(validation::sanitize_description)
            .filter(|d| !d.is_empty());
        session.tags = validation::sanitize_tags(&opts.tags, settings.max_tags_per_session);
        session.folder_id = opts.folder_id.clone();

        let tab_count = tabs.len();
        Self::apply_compression(&mut session, tabs.clone(), &settings)?;
        Self::persist(&store, &session, &tabs)?;
        store
            .record_saved(1, tab_count as u64)
            .map_err(Self::store_err)?;

        // Hand the caller the authoritative tab list even when the stored
        // body is compressed.
        session.tabs = tabs;
        Ok(session)
    }

    /// Fetches a session with its tab list inflated. `None` when absent —
    /// "not found" is not an error for a read accessor.
    fn get_session(&self, id: &str) -> Result<Option<Session>, SessionError> {
        let conn = self.db.connection();
        let store = SessionStore::new(&conn);
        let session = match store.get_session(id).map_err(Self::store_err)? {
            Some(session) => session,
            None => return Ok(None),
        };
        let tabs = Self::authoritative_tabs(&session);
        let mut session = session;
        session.tabs = tabs;
        Ok(Some(session))
    }

    fn list_sessions(&self) -> Result<Vec<SessionMetadata>, SessionError> {
        let conn = self.db.connection();
        SessionStore::new(&conn)
            .get_all_metadata()
            .map_err(Self::store_err)
    }

    /// Applies a field patch. Returns `None` without writing when the id is
    /// unknown. Bumps `updated_at`, increments `version`, and re-evaluates
    /// the compression policy against current settings.
    fn update_session(
        &self,
        id: &str,
        updates: &SessionUpdate,
    ) -> Result<Option<Session>, SessionError> {
        let conn = self.db.connection();
        let store = SessionStore::new(&conn);
        let mut session = match store.get_session(id).map_err(Self::store_err)? {
            Some(session) => session,
            None => return Ok(None),
        };
        let settings = store.get_settings().map_err(Self::store_err)?;
        let tabs = Self::authoritative_tabs(&session);

        if let Some(name) = &updates.name {
            session.name = validation::sanitize_session_name(name);
        }
        if let Some(description) = &updates.description {
            let cleaned = validation::sanitize_description(description);
            session.description = if cleaned.is_empty() { None } else { Some(cleaned) };
        }
        if let Some(tags) = &updates.tags {
            session.tags = validation::sanitize_tags(tags, settings.max_tags_per_session);
        }
        if let Some(folder_id) = &updates.folder_id {
            session.folder_id = folder_id.clone();
        }
        session.updated_at = Self::now();
        session.version += 1;

        Self::apply_compression(&mut session, tabs.clone(), &settings)?;
        Self::persist(&store, &session, &tabs)?;

        session.tabs = tabs;
        Ok(Some(session))
    }

    /// Removes the session and its metadata entry atomically.
    fn delete_session(&self, id: &str) -> Result<bool, SessionError> {
        let conn = self.db.connection();
        SessionStore::new(&conn)
            .delete_session(id)
            .map_err(Self::store_err)
    }

    /// Restores a session's tabs into the live window model.
    fn restore_session(
        &mut self,
        windows: &mut WindowManager,
        id: &str,
        tab_ids: Option<&[String]>,
        options: Option<RestoreOptions>,
    ) -> Result<RestoreOutcome, SessionError> {
        let (mut session, settings, mut tabs) = {
            let conn = self.db.connection();
            let store = SessionStore::new(&conn);
            let settings = store.get_settings().map_err(Self::store_err)?;
            let session = store
                .get_session(id)
                .map_err(Self::store_err)?
                .ok_or_else(|| SessionError::NotFound(id.to_string()))?;
            let tabs = Self::authoritative_tabs(&session);
            (session, settings, tabs)
        };

        // A session with a compressed blob but no recoverable tabs is a
        // partial-write artifact, not a legitimately empty session.
        if tabs.is_empty() && session.compressed_tabs.is_some() {
            return Err(SessionError::CorruptTabData(id.to_string()));
        }

        if let Some(subset) = tab_ids {
            let wanted: HashSet<&str> = subset.iter().map(String::as_str).collect();
            tabs.retain(|t| wanted.contains(t.id.as_str()));
        }

        if settings.detect_duplicates {
            // Compare against a fresh capture of the current window, not
            // stale data.
            let open: HashSet<String> = self
                .engine
                .capture_current_window_tabs(windows, &settings)
                .into_iter()
                .map(|t| t.url)
                .collect();
            tabs.retain(|t| !open.contains(&t.url));
        }

        let options = options.unwrap_or_else(|| RestoreOptions::from_settings(&settings));
        let outcome = self
            .engine
            .restore_tabs(windows, &tabs, &options)
            .map_err(|e| SessionError::Window(e.to_string()))?;

        session.last_accessed_at = Some(Self::now());
        let all_tabs = Self::authoritative_tabs(&session);
        let conn = self.db.connection();
        let store = SessionStore::new(&conn);
        Self::persist(&store, &session, &all_tabs)?;
        store
            .record_restored(1, outcome.created_tab_ids.len() as u64)
            .map_err(Self::store_err)?;

        Ok(outcome)
    }

    /// Deep-copies a session under a new id with reset timestamps and
    /// version. The default name appends " (Copy)".
    fn duplicate_session(
        &self,
        id: &str,
        new_name: Option<&str>,
    ) -> Result<Session, SessionError> {
        let original = self
            .get_session(id)?
            .ok_or_else(|| SessionError::NotFound(id.to_string()))?;

        let conn = self.db.connection();
        let store = SessionStore::new(&conn);
        let settings = store.get_settings().map_err(Self::store_err)?;

        let name = match new_name {
            Some(name) => validation::sanitize_session_name(name),
            None => validation::sanitize_session_name(&format!("{} (Copy)", original.name)),
        };

        let tabs = original.tabs.clone();
        let mut copy = Self::blank_session(name, Self::now());
        copy.description = original.description.clone();
        copy.tags = original.tags.clone();
        copy.folder_id = original.folder_id.clone();

        Self::apply_compression(&mut copy, tabs.clone(), &settings)?;
        Self::persist(&store, &copy, &tabs)?;

        copy.tabs = tabs;
        Ok(copy)
    }

    /// Concatenates the source sessions' tabs in input order, deduplicating
    /// by URL (first occurrence wins) and assigning fresh tab ids.
    fn merge_sessions(&self, ids: &[String], new_name: &str) -> Result<Session, SessionError> {
        if ids.len() < 2 {
            return Err(SessionError::MergeRequiresTwo(ids.len()));
        }

        let mut merged_tabs: Vec<TabRecord> = Vec::new();
        let mut seen_urls: HashSet<String> = HashSet::new();
        let mut merged_tags: Vec<String> = Vec::new();

        for id in ids {
            let source = self
                .get_session(id)?
                .ok_or_else(|| SessionError::NotFound(id.to_string()))?;
            for tab in source.tabs {
                // First-encountered tab keeps its data; later URL duplicates
                // are dropped whole.
                if !seen_urls.insert(tab.url.clone()) {
                    continue;
                }
                let mut tab = tab;
                tab.id = Uuid::new_v4().to_string();
                tab.index = merged_tabs.len();
                merged_tabs.push(tab);
            }
            merged_tags.extend(source.tags);
        }

        let conn = self.db.connection();
        let store = SessionStore::new(&conn);
        let settings = store.get_settings().map_err(Self::store_err)?;

        let tabs = merged_tabs;
        let mut session =
            Self::blank_session(validation::sanitize_session_name(new_name), Self::now());
        session.tags = validation::sanitize_tags(&merged_tags, settings.max_tags_per_session);

        Self::apply_compression(&mut session, tabs.clone(), &settings)?;
        Self::persist(&store, &session, &tabs)?;

        session.tabs = tabs;
        Ok(session)
    }

    /// Partitions a session by domain: one output session per distinct
    /// domain, relative tab order preserved, names suffixed with the domain.
    fn split_session(&self, id: &str) -> Result<Vec<Session>, SessionError> {
        let original = self
            .get_session(id)?
            .ok_or_else(|| SessionError::NotFound(id.to_string()))?;

        let conn = self.db.connection();
        let store = SessionStore::new(&conn);
        let settings = store.get_settings().map_err(Self::store_err)?;

        // Partition preserving first-occurrence domain order.
        let mut order: Vec<String> = Vec::new();
        let mut by_domain: std::collections::HashMap<String, Vec<TabRecord>> =
            std::collections::HashMap::new();
        for tab in &original.tabs {
            let domain = validation::extract_domain(&tab.url);
            if !by_domain.contains_key(&domain) {
                order.push(domain.clone());
            }
            by_domain.entry(domain).or_default().push(tab.clone());
        }

        let now = Self::now();
        let mut result = Vec::new();
        for domain in order {
            let mut tabs = by_domain.remove(&domain).unwrap_or_default();
            for (index, tab) in tabs.iter_mut().enumerate() {
                tab.id = Uuid::new_v4().to_string();
                tab.index = index;
            }

            let mut session = Self::blank_session(
                validation::sanitize_session_name(&format!("{} - {}", original.name, domain)),
                now,
            );
            session.description = original.description.clone();
            session.tags = original.tags.clone();
            session.folder_id = original.folder_id.clone();

            Self::apply_compression(&mut session, tabs.clone(), &settings)?;
            Self::persist(&store, &session, &tabs)?;

            session.tabs = tabs;
            result.push(session);
        }
        Ok(result)
    }

    /// Captures every window into the bounded emergency ring. Emergency
    /// sessions are never compressed so crash recovery never depends on the
    /// codec.
    fn create_emergency_session(
        &self,
        windows: &WindowManager,
    ) -> Result<Session, SessionError> {
        let conn = self.db.connection();
        let store = SessionStore::new(&conn);
        let settings = store.get_settings().map_err(Self::store_err)?;

        let tabs = self.engine.capture_all_tabs(windows, &settings);
        if tabs.is_empty() {
            return Err(SessionError::NoTabsToBackup);
        }

        let mut session = Self::blank_session(
            format!(
                "Emergency Backup - {}",
                Local::now().format("%Y-%m-%d %H:%M:%S")
            ),
            Self::now(),
        );
        session.tags = vec!["emergency".to_string(), "auto-backup".to_string()];
        session.is_emergency = true;
        session.tabs = tabs;

        store
            .push_emergency_session(&session, settings.max_emergency_sessions)
            .map_err(Self::store_err)?;
        Ok(session)
    }
}
