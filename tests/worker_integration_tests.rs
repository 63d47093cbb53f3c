//! Integration tests for ExecutionHarness
//!
//! These tests verify:
//! - A worker that dies before reporting surfaces as a failure
//! - The queue keeps running after such a failure
//! - Worker diagnostics are forwarded only when enabled

mod common;

use common::{FakeDownloader, FakeInstaller, Fixture};
use modops::models::{ErrorCode, OperationStatus};
use modops::worker::WorkerRequest;
use modops::{ExecutionHarness, ModManager};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio_test::{assert_err, assert_ok};
use tracing_subscriber::layer::{Context, SubscriberExt};
use tracing_subscriber::Layer;

const URL: &str = "https://example.invalid/clouds.sporemod";

/// Records the target of every event
#[derive(Clone, Default)]
struct TargetRecorder(Arc<Mutex<Vec<String>>>);

impl TargetRecorder {
    fn count(&self, target: &str) -> usize {
        self.0.lock().unwrap().iter().filter(|t| t.as_str() == target).count()
    }
}

impl<S: tracing::Subscriber> Layer<S> for TargetRecorder {
    fn on_event(&self, event: &tracing::Event<'_>, _ctx: Context<'_, S>) {
        self.0.lock().unwrap().push(event.metadata().target().to_string());
    }
}

fn is_installed_request() -> WorkerRequest {
    WorkerRequest::IsInstalled {
        mod_key: "ColorfulClouds".to_string(),
    }
}

#[tokio::test]
async fn test_panicking_worker_fails_and_queue_moves_on() {
    let fixture = Fixture::new();
    let installer = FakeInstaller::new(0, |_| panic!("installer crashed"));
    let manager = ModManager::with_engine(fixture.engine(FakeDownloader::new(b"pkg".to_vec()), installer));

    let (_, crashed) = manager.submit_install("ColorfulClouds", URL, "");
    let (_, next) = manager.submit_uninstall("NotInstalled", "");

    let err = assert_err!(crashed.await);
    assert_eq!(err.code(), ErrorCode::ModWorkerExited);
    assert!(
        err.to_string().starts_with("Worker exited abnormally: panicked: installer crashed"),
        "unexpected message: {}",
        err
    );

    assert_ok!(tokio::time::timeout(Duration::from_secs(5), next).await.unwrap());
    let settled = manager.queue_state().last_settled.unwrap();
    assert_eq!(settled.status, OperationStatus::Done);
    assert!(manager.queue_state().is_idle());
}

#[tokio::test]
async fn test_worker_logs_stay_local_unless_forwarded() {
    let fixture = Fixture::new();
    let engine = fixture.engine(FakeDownloader::new(Vec::new()), FakeInstaller::new(0, |_| {}));
    let recorder = TargetRecorder::default();
    let _guard = tracing::subscriber::set_default(tracing_subscriber::registry().with(recorder.clone()));

    let quiet = ExecutionHarness::new(Arc::clone(&engine), Duration::from_secs(5), false);
    let installed = quiet.run(is_installed_request(), |_, _| {}).await;
    assert!(!assert_ok!(installed));
    assert_eq!(recorder.count("modops::worker"), 0);

    let chatty = ExecutionHarness::new(engine, Duration::from_secs(5), true);
    assert_ok!(chatty.run(is_installed_request(), |_, _| {}).await);
    assert!(recorder.count("modops::worker") >= 2, "received and done lines are forwarded");
}
