//! App Core for TabVault.
//!
//! Central struct holding the managers and services, managing engine
//! lifecycle: startup crash check, emergency-backup scheduling, and the
//! clean-shutdown path.

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use tracing::warn;

use crate::database::{Database, SessionStore};
use crate::managers::session_manager::SessionManager;
use crate::managers::tab_engine::TabEngine;
use crate::managers::window_manager::WindowManager;
use crate::services::backup_manager::BackupManager;
use crate::services::crash_recovery::{CrashRecovery, CrashRecoveryTrait};
use crate::services::page_state::{PageStateProvider, UnavailablePageState};
use crate::services::search_index::SearchIndex;
use crate::types::errors::SessionError;

/// Central application struct holding all managers and services.
pub struct App {
    pub db: Arc<Database>,
    pub windows: WindowManager,
    pub session_manager: SessionManager,
    pub search_index: SearchIndex,
    pub backup_manager: BackupManager,
    pub crash_recovery: CrashRecovery,
}

impl App {
    /// Creates a new App over the database at `db_path`, with no page-state
    /// capability (scroll/form capture degrades to "no data").
    pub fn new(db_path: &str) -> Result<Self, Box<dyn std::error::Error>> {
        Self::with_page_state(db_path, Box::new(UnavailablePageState))
    }

    /// Creates a new App with an injected page-state provider.
    pub fn with_page_state(
        db_path: &str,
        page_state: Box<dyn PageStateProvider>,
    ) -> Result<Self, Box<dyn std::error::Error>> {
        let db = Arc::new(Database::open(db_path)?);
        let engine = TabEngine::new(page_state);
        let session_manager = SessionManager::new(db.clone(), engine);
        let search_index = SearchIndex::new(db.clone());
        let backup_manager = BackupManager::new(db.clone());
        let crash_recovery = CrashRecovery::new(db.clone(), running_flag_path(db_path));

        Ok(Self {
            db,
            windows: WindowManager::new(),
            session_manager,
            search_index,
            backup_manager,
            crash_recovery,
        })
    }

    /// Startup sequence: run the crash check and mark this run live.
    /// Returns whether a potential crash was detected.
    pub fn startup(&mut self) -> bool {
        match self.crash_recovery.initialize() {
            Ok(detected) => detected,
            Err(e) => {
                warn!("crash check failed: {}", e);
                false
            }
        }
    }

    /// The configured emergency-backup interval in minutes.
    pub fn backup_interval_minutes(&self) -> u64 {
        let conn = self.db.connection();
        SessionStore::new(&conn)
            .get_settings()
            .map(|s| s.emergency_backup_interval_minutes)
            .unwrap_or(0)
    }

    /// Shutdown sequence: one best-effort final emergency backup, then clear
    /// the running flag and stop the backup schedule.
    pub fn shutdown(&mut self) {
        use crate::managers::session_manager::SessionManagerTrait;
        let Self {
            windows,
            session_manager,
            crash_recovery,
            ..
        } = self;
        crash_recovery.shutdown(|| session_manager.create_emergency_session(windows));
    }
}

/// The liveness flag lives next to the database file.
fn running_flag_path(db_path: &str) -> PathBuf {
    let path = Path::new(db_path);
    match path.parent() {
        Some(parent) => parent.join("tabvault.running"),
        None => PathBuf::from("tabvault.running"),
    }
}

/// Wires the recurring emergency backup against a shared App handle: reads
/// the configured interval, clears any prior schedule, and registers the
/// capture closure (a zero interval disables the schedule).
pub fn schedule_emergency_backups(app: &Arc<Mutex<App>>) {
    use crate::managers::session_manager::SessionManagerTrait;

    let minutes = match app.lock() {
        Ok(a) => a.backup_interval_minutes(),
        Err(_) => return,
    };
    let handle = app.clone();
    if let Ok(mut a) = app.lock() {
        a.crash_recovery.schedule_backups_minutes(minutes, move || {
            let a = handle
                .lock()
                .map_err(|_| SessionError::Storage("app lock poisoned".to_string()))?;
            a.session_manager.create_emergency_session(&a.windows)
        });
    }
}
