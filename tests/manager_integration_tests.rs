//! Integration tests for ModManager
//!
//! These tests verify the full path caller → queue → worker harness → engine:
//! - Completed, cancelled and failed installs
//! - Queue and worker timeouts, and that the next operation still runs
//! - Progress and queue snapshot subscriptions

mod common;

use common::{FakeDownloader, FakeInstaller, Fixture};
use modops::models::{ErrorCode, ModOpError, OperationStatus, ProgressStep};
use modops::{InstallOutcome, ModManager};
use std::sync::Arc;
use std::time::Duration;
use tokio_test::{assert_err, assert_ok};

const URL: &str = "https://example.invalid/clouds.sporemod";

fn manager(fixture: &Fixture, installer: Arc<FakeInstaller>) -> ModManager {
    ModManager::with_engine(fixture.engine(FakeDownloader::new(b"pkg".to_vec()), installer))
}

#[tokio::test]
async fn test_install_completes_and_reports_progress() {
    let fixture = Fixture::new();
    let manager = manager(&fixture, fixture.registering_installer(r#"<mod unique="ColorfulClouds"></mod>"#));
    let mut progress = manager.subscribe_progress();
    let mut snapshots = manager.subscribe();

    let outcome = manager.install("ColorfulClouds", URL, "Colorful Clouds").await;
    assert_eq!(assert_ok!(outcome), InstallOutcome::Completed);
    assert!(manager.is_installed("ColorfulClouds").await);

    let mut steps = Vec::new();
    while let Ok(update) = progress.try_recv() {
        assert_eq!(update.mod_key, "ColorfulClouds");
        steps.push(update.progress.step);
    }
    assert_eq!(steps.first(), Some(&ProgressStep::Downloading));
    assert_eq!(steps.last(), Some(&ProgressStep::Done));

    let mut saw_running = false;
    let mut last = None;
    while let Ok(snapshot) = snapshots.try_recv() {
        saw_running |= snapshot
            .active
            .as_ref()
            .is_some_and(|op| op.status == OperationStatus::Running && op.mod_title == "Colorful Clouds");
        last = Some(snapshot);
    }
    assert!(saw_running);
    let settled = last.and_then(|s| s.last_settled).unwrap();
    assert_eq!(settled.status, OperationStatus::Done);
    assert!(manager.queue_state().is_idle());
}

#[tokio::test]
async fn test_installer_cancel_maps_to_cancelled_outcome() {
    let fixture = Fixture::new();
    let manager = manager(&fixture, FakeInstaller::new(-1, |_| {}));

    let outcome = manager.install("ColorfulClouds", URL, "").await;
    assert_eq!(assert_ok!(outcome), InstallOutcome::Cancelled);
}

#[tokio::test]
async fn test_cancel_queued_install() {
    let fixture = Fixture::new();
    let manager = manager(&fixture, FakeInstaller::hanging(Duration::from_millis(200)));

    let (first, running) = manager.submit_install("Slow", URL, "");
    let (second, queued) = manager.submit_install("Queued", URL, "");

    assert_eq!(manager.queue_state().queued_ids(), vec![second]);
    assert!(!manager.cancel_queued(first));
    assert!(manager.cancel_queued(second));

    assert!(matches!(queued.await, Err(ModOpError::OperationCancelled)));
    // Nothing registers "Slow", so the running install fails on verification
    let err = assert_err!(running.await);
    assert_eq!(err.code(), ErrorCode::InstallNotRegistered);
}

#[tokio::test]
async fn test_worker_timeout_fails_operation() {
    let mut fixture = Fixture::new();
    fixture.config.worker_timeout_ms = 100;
    let manager = manager(&fixture, FakeInstaller::hanging(Duration::from_secs(30)));

    let err = assert_err!(manager.install("Slow", URL, "").await);

    assert_eq!(err.code(), ErrorCode::ModOpTimeout);
    assert!(err.to_string().starts_with("MOD_WORKER_TIMEOUT: install(Slow) exceeded 100ms"));
}

#[tokio::test]
async fn test_queue_timeout_frees_slot_for_next_operation() {
    let mut fixture = Fixture::new();
    fixture.config.operation_timeout_ms = 100;
    let manager = manager(&fixture, FakeInstaller::hanging(Duration::from_secs(30)));

    let (_, slow) = manager.submit_install("Slow", URL, "");
    let (_, next) = manager.submit_uninstall("NotInstalled", "");

    let err = assert_err!(slow.await);
    assert_eq!(err.to_string(), "MOD_OP_TIMEOUT: install(Slow) exceeded 100ms");

    // Uninstalling an unknown mod succeeds once the slot is free
    assert_ok!(tokio::time::timeout(Duration::from_secs(5), next).await.unwrap());
}

#[tokio::test]
async fn test_install_error_is_surfaced() {
    let mut fixture = Fixture::new();
    fixture.config.game_data_dir = None;
    let manager = manager(&fixture, FakeInstaller::new(0, |_| {}));

    let err = assert_err!(manager.uninstall("ColorfulClouds", "").await);
    assert_eq!(err.code(), ErrorCode::InstallPathNotFound);

    let settled = manager.queue_state().last_settled.unwrap();
    assert_eq!(settled.status, OperationStatus::Failed);
    assert_eq!(settled.message, err.to_string());
}

#[tokio::test]
async fn test_is_installed_maps_failures_to_false() {
    let mut fixture = Fixture::new();
    fixture.config.game_data_dir = None;
    let manager = manager(&fixture, FakeInstaller::new(0, |_| {}));

    assert!(!manager.is_installed("60fps").await);
    assert!(!manager.is_installed("").await);
}
