//! Unit tests for the crash recovery state machine and backup scheduler.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tempfile::TempDir;

use tabvault::database::Database;
use tabvault::services::crash_recovery::{CrashRecovery, CrashRecoveryTrait, RecoveryState};
use tabvault::types::errors::SessionError;
use tabvault::types::session::Session;

fn setup() -> (CrashRecovery, TempDir) {
    let tmp = TempDir::new().unwrap();
    let db = Arc::new(Database::open_in_memory().unwrap());
    let flag = tmp.path().join("tabvault.running");
    (CrashRecovery::new(db, flag), tmp)
}

fn dummy_session() -> Session {
    Session {
        id: "backup".to_string(),
        name: "Emergency Backup".to_string(),
        description: None,
        tags: Vec::new(),
        folder_id: None,
        created_at: 0,
        updated_at: 0,
        last_accessed_at: None,
        is_emergency: true,
        version: 1,
        tabs: Vec::new(),
        compressed_tabs: None,
        is_compressed: false,
    }
}

// ─── State machine ───

#[test]
fn test_clean_first_start_detects_nothing() {
    let (mut recovery, tmp) = setup();
    assert_eq!(recovery.state(), RecoveryState::Clean);

    let detected = recovery.initialize().unwrap();
    assert!(!detected);
    assert_eq!(recovery.state(), RecoveryState::Running);
    assert!(!recovery.was_crash_detected().unwrap());
    // The running flag is now set for this run.
    assert!(tmp.path().join("tabvault.running").exists());
}

#[test]
fn test_leftover_flag_detects_crash() {
    let (mut recovery, tmp) = setup();
    // Simulate a prior run that never reached clean shutdown.
    std::fs::write(tmp.path().join("tabvault.running"), b"running").unwrap();

    let detected = recovery.initialize().unwrap();
    assert!(detected);
    assert_eq!(recovery.state(), RecoveryState::CrashDetected);
    assert!(recovery.was_crash_detected().unwrap());
}

#[test]
fn test_clear_crash_detection_acknowledges() {
    let (mut recovery, tmp) = setup();
    std::fs::write(tmp.path().join("tabvault.running"), b"running").unwrap();
    recovery.initialize().unwrap();

    recovery.clear_crash_detection().unwrap();
    assert_eq!(recovery.state(), RecoveryState::Acknowledged);
    assert!(!recovery.was_crash_detected().unwrap());
}

#[test]
fn test_shutdown_clears_flag_and_runs_final_backup() {
    let (mut recovery, tmp) = setup();
    recovery.initialize().unwrap();
    assert!(tmp.path().join("tabvault.running").exists());

    let ran = Arc::new(AtomicUsize::new(0));
    let counter = ran.clone();
    recovery.shutdown(move || {
        counter.fetch_add(1, Ordering::SeqCst);
        Ok(dummy_session())
    });

    assert_eq!(ran.load(Ordering::SeqCst), 1);
    assert!(!tmp.path().join("tabvault.running").exists());
    assert_eq!(recovery.state(), RecoveryState::Clean);
}

#[test]
fn test_clean_shutdown_then_restart_detects_nothing() {
    let (mut recovery, tmp) = setup();
    recovery.initialize().unwrap();
    recovery.shutdown(|| Ok(dummy_session()));

    // Next run over the same flag path starts clean.
    let db = Arc::new(Database::open_in_memory().unwrap());
    let mut next = CrashRecovery::new(db, tmp.path().join("tabvault.running"));
    assert!(!next.initialize().unwrap());
}

// ─── Scheduler ───

#[tokio::test]
async fn test_scheduled_backups_fire_repeatedly() {
    let (mut recovery, _tmp) = setup();
    let fired = Arc::new(AtomicUsize::new(0));
    let counter = fired.clone();

    recovery.schedule_backups_with_delay(
        Duration::from_millis(20),
        Duration::from_millis(5),
        move || {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(dummy_session())
        },
    );
    assert!(recovery.is_backup_scheduled());

    tokio::time::sleep(Duration::from_millis(120)).await;
    assert!(fired.load(Ordering::SeqCst) >= 2);
}

#[tokio::test]
async fn test_backup_failure_does_not_kill_scheduler() {
    let (mut recovery, _tmp) = setup();
    let fired = Arc::new(AtomicUsize::new(0));
    let counter = fired.clone();

    recovery.schedule_backups_with_delay(
        Duration::from_millis(15),
        Duration::from_millis(5),
        move || {
            counter.fetch_add(1, Ordering::SeqCst);
            Err(SessionError::NoTabsToBackup)
        },
    );

    tokio::time::sleep(Duration::from_millis(100)).await;
    // Failures are swallowed; the timer keeps firing.
    assert!(fired.load(Ordering::SeqCst) >= 2);
}

#[tokio::test]
async fn test_zero_interval_disables_schedule() {
    let (mut recovery, _tmp) = setup();
    let fired = Arc::new(AtomicUsize::new(0));
    let counter = fired.clone();

    recovery.schedule_backups_with_delay(Duration::ZERO, Duration::from_millis(1), move || {
        counter.fetch_add(1, Ordering::SeqCst);
        Ok(dummy_session())
    });
    assert!(!recovery.is_backup_scheduled());

    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(fired.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_reschedule_clears_previous_schedule() {
    let (mut recovery, _tmp) = setup();
    let first = Arc::new(AtomicUsize::new(0));
    let second = Arc::new(AtomicUsize::new(0));

    let counter = first.clone();
    recovery.schedule_backups_with_delay(
        Duration::from_millis(10),
        Duration::from_millis(5),
        move || {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(dummy_session())
        },
    );

    // Immediately replace the schedule before the first one ever fires.
    let counter = second.clone();
    recovery.schedule_backups_with_delay(
        Duration::from_millis(10),
        Duration::from_millis(5),
        move || {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(dummy_session())
        },
    );

    tokio::time::sleep(Duration::from_millis(80)).await;
    assert_eq!(first.load(Ordering::SeqCst), 0);
    assert!(second.load(Ordering::SeqCst) >= 2);
}

#[tokio::test]
async fn test_zero_reschedule_stops_running_schedule() {
    let (mut recovery, _tmp) = setup();
    let fired = Arc::new(AtomicUsize::new(0));
    let counter = fired.clone();

    recovery.schedule_backups_with_delay(
        Duration::from_millis(10),
        Duration::from_millis(5),
        move || {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(dummy_session())
        },
    );
    tokio::time::sleep(Duration::from_millis(40)).await;
    let before = fired.load(Ordering::SeqCst);
    assert!(before >= 1);

    recovery.schedule_backups_with_delay(Duration::ZERO, Duration::from_millis(1), || {
        Ok(dummy_session())
    });
    tokio::time::sleep(Duration::from_millis(60)).await;
    assert_eq!(fired.load(Ordering::SeqCst), before);
}
