//! Crash Recovery for TabVault.
//!
//! Tracks process liveness across restarts and drives the recurring
//! emergency-backup schedule. Liveness is a running-flag file: written on
//! startup, removed only by a clean shutdown, so finding it already present
//! means the previous run terminated without cleaning up. Detection
//! persists a durable, timestamped crash marker that survives until
//! explicitly acknowledged.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::database::{Database, SessionStore};
use crate::types::errors::{CrashError, SessionError};
use crate::types::session::Session;

/// Fixed delay before the first scheduled backup fires.
pub const BACKUP_START_DELAY: Duration = Duration::from_secs(10);

/// Lifecycle states of the recovery machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecoveryState {
    /// No run in progress and no unacknowledged crash.
    Clean,
    /// This run has set its flag and is live.
    Running,
    /// The prior run did not shut down cleanly; the durable marker is set.
    CrashDetected,
    /// The crash marker has been read and cleared.
    Acknowledged,
}

/// Trait defining crash recovery operations.
pub trait CrashRecoveryTrait {
    fn initialize(&mut self) -> Result<bool, CrashError>;
    fn was_crash_detected(&self) -> Result<bool, CrashError>;
    fn clear_crash_detection(&mut self) -> Result<(), CrashError>;
    fn state(&self) -> RecoveryState;
}

/// Crash recovery backed by the store (durable marker) and a flag file
/// (volatile running state).
pub struct CrashRecovery {
    db: Arc<Database>,
    running_flag: PathBuf,
    state: RecoveryState,
    backup_task: Option<JoinHandle<()>>,
}

impl CrashRecovery {
    /// `running_flag` is the path of the liveness flag file, conventionally
    /// next to the database.
    pub fn new(db: Arc<Database>, running_flag: PathBuf) -> Self {
        Self {
            db,
            running_flag,
            state: RecoveryState::Clean,
            backup_task: None,
        }
    }

    fn now() -> i64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_secs() as i64
    }

    /// Schedules the recurring emergency backup with the default initial
    /// delay. Any previously scheduled task is cleared first; a zero
    /// interval disables the schedule entirely.
    pub fn schedule_backups<F>(&mut self, interval: Duration, backup: F)
    where
        F: FnMut() -> Result<Session, SessionError> + Send + 'static,
    {
        self.schedule_backups_with_delay(interval, BACKUP_START_DELAY, backup);
    }

    /// Same as [`schedule_backups`](Self::schedule_backups) with an explicit
    /// first-fire delay.
    pub fn schedule_backups_with_delay<F>(
        &mut self,
        interval: Duration,
        first_delay: Duration,
        mut backup: F,
    ) where
        F: FnMut() -> Result<Session, SessionError> + Send + 'static,
    {
        if let Some(task) = self.backup_task.take() {
            task.abort();
        }
        if interval.is_zero() {
            return;
        }
        self.backup_task = Some(tokio::spawn(async move {
            tokio::time::sleep(first_delay).await;
            loop {
                // Exactly one backup per fire. A failed backup must never
                // take the scheduler down with it.
                Self::run_backup(&mut backup);
                tokio::time::sleep(interval).await;
            }
        }));
    }

    /// Convenience wrapper taking the configured minute interval.
    pub fn schedule_backups_minutes<F>(&mut self, minutes: u64, backup: F)
    where
        F: FnMut() -> Result<Session, SessionError> + Send + 'static,
    {
        self.schedule_backups(Duration::from_secs(minutes * 60), backup);
    }

    /// Runs one backup attempt, swallowing and logging failure.
    fn run_backup<F>(backup: &mut F) -> Option<Session>
    where
        F: FnMut() -> Result<Session, SessionError>,
    {
        match backup() {
            Ok(session) => {
                debug!("emergency backup saved: {}", session.id);
                Some(session)
            }
            Err(e) => {
                warn!("emergency backup failed: {}", e);
                None
            }
        }
    }

    /// True while a scheduled backup task is registered.
    pub fn is_backup_scheduled(&self) -> bool {
        self.backup_task.is_some()
    }

    /// Clean shutdown: one best-effort final backup, then clear the running
    /// flag and stop the schedule. Best-effort by nature — process
    /// termination is not always interceptable.
    pub fn shutdown<F>(&mut self, mut final_backup: F)
    where
        F: FnMut() -> Result<Session, SessionError>,
    {
        Self::run_backup(&mut final_backup);
        if let Some(task) = self.backup_task.take() {
            task.abort();
        }
        if let Err(e) = std::fs::remove_file(&self.running_flag) {
            if e.kind() != std::io::ErrorKind::NotFound {
                warn!("failed to clear running flag: {}", e);
            }
        }
        self.state = RecoveryState::Clean;
    }
}

impl CrashRecoveryTrait for CrashRecovery {
    /// Startup check. A running flag left behind means the prior run never
    /// reached its clean-shutdown path: persist the durable crash marker and
    /// report detection. Either way the flag is (re)written so this run is
    /// marked live. Returns whether a potential crash was detected.
    fn initialize(&mut self) -> Result<bool, CrashError> {
        let unclean = self.running_flag.exists();
        if unclean {
            let conn = self.db.connection();
            SessionStore::new(&conn)
                .set_crash_marker(Self::now())
                .map_err(|e| CrashError::Storage(e.to_string()))?;
            self.state = RecoveryState::CrashDetected;
        } else {
            self.state = RecoveryState::Running;
        }

        if let Some(parent) = self.running_flag.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).map_err(|e| CrashError::Io(e.to_string()))?;
            }
        }
        std::fs::write(&self.running_flag, b"running")
            .map_err(|e| CrashError::Io(e.to_string()))?;

        Ok(unclean)
    }

    /// Reads the durable crash marker.
    fn was_crash_detected(&self) -> Result<bool, CrashError> {
        let conn = self.db.connection();
        SessionStore::new(&conn)
            .get_crash_marker()
            .map(|marker| marker.is_some())
            .map_err(|e| CrashError::Storage(e.to_string()))
    }

    /// Acknowledges and clears the durable crash marker.
    fn clear_crash_detection(&mut self) -> Result<(), CrashError> {
        let conn = self.db.connection();
        SessionStore::new(&conn)
            .clear_crash_marker()
            .map_err(|e| CrashError::Storage(e.to_string()))?;
        self.state = RecoveryState::Acknowledged;
        Ok(())
    }

    fn state(&self) -> RecoveryState {
        self.state
    }
}
