//! Caller-facing facade over the queue, the worker harness and the install engine.
//!
//! Install and uninstall are queued and run one at a time through
//! [`ExecutionHarness`]. Installed checks run directly against the engine. Progress
//! reaches callers two ways: queue snapshots via [`ModManager::subscribe`] and per-mod
//! step progress via [`ModManager::subscribe_progress`].

use crate::models::{
    ModAction, ModOpError, ModOpsConfig, ModProgress, OperationId, ProgressUpdate, QueueSnapshot,
};
use crate::queue::{OperationFuture, OperationQueue, ProgressSink};
use crate::services::InstallEngine;
use crate::worker::{ExecutionHarness, WorkerRequest};
use std::sync::Arc;
use tokio::sync::broadcast;

/// How an install ended when it did not fail
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InstallOutcome {
    Completed,
    /// Removed from the queue before starting, or closed in the installer UI
    Cancelled,
}

pub struct ModManager {
    engine: Arc<InstallEngine>,
    harness: ExecutionHarness,
    queue: OperationQueue,
    progress_tx: broadcast::Sender<ModProgress>,
}

impl ModManager {
    /// Manager using HTTP downloads and the real installer process
    pub fn new(config: ModOpsConfig) -> Self {
        Self::with_engine(Arc::new(InstallEngine::with_defaults(Arc::new(config))))
    }

    /// Manager around a prepared engine; timeouts and throttling come from its config
    pub fn with_engine(engine: Arc<InstallEngine>) -> Self {
        let config = engine.config();
        let harness = ExecutionHarness::new(
            Arc::clone(&engine),
            config.worker_timeout(),
            config.forward_worker_logs,
        );
        let queue = OperationQueue::from_config(config);
        let (progress_tx, _) = broadcast::channel(256);

        Self {
            engine,
            harness,
            queue,
            progress_tx,
        }
    }

    pub fn engine(&self) -> &Arc<InstallEngine> {
        &self.engine
    }

    /// Queue an install without waiting for it
    pub fn submit_install(
        &self,
        mod_key: &str,
        download_url: &str,
        mod_title: &str,
    ) -> (OperationId, OperationFuture<bool>) {
        let request = WorkerRequest::Install {
            mod_key: mod_key.trim().to_string(),
            download_url: download_url.trim().to_string(),
        };
        self.submit(request, mod_title, ModAction::Install)
    }

    /// Queue an uninstall without waiting for it
    pub fn submit_uninstall(&self, mod_key: &str, mod_title: &str) -> (OperationId, OperationFuture<bool>) {
        let request = WorkerRequest::Uninstall {
            mod_key: mod_key.trim().to_string(),
        };
        self.submit(request, mod_title, ModAction::Uninstall)
    }

    fn submit(
        &self,
        request: WorkerRequest,
        mod_title: &str,
        action: ModAction,
    ) -> (OperationId, OperationFuture<bool>) {
        let harness = self.harness.clone();
        let progress_tx = self.progress_tx.clone();
        let mod_key = request.mod_key().to_string();

        self.queue.enqueue(
            &mod_key,
            mod_title,
            action,
            move |sink: ProgressSink| async move {
                tracing::info!("Starting {} (operation #{})", request, sink.id());
                let relay = move |key: &str, progress: ProgressUpdate| {
                    sink.report(&progress);
                    let _ = progress_tx.send(ModProgress {
                        mod_key: key.to_string(),
                        progress,
                    });
                };
                harness.run(request, relay).await
            },
            None,
        )
    }

    /// Install a mod and wait for the queue to run it
    ///
    /// # Returns
    /// [`InstallOutcome::Cancelled`] when the operation was cancelled while queued or
    /// the user closed the installer; every other failure is an error
    pub async fn install(
        &self,
        mod_key: &str,
        download_url: &str,
        mod_title: &str,
    ) -> Result<InstallOutcome, ModOpError> {
        let (id, outcome) = self.submit_install(mod_key, download_url, mod_title);
        match outcome.await {
            Ok(_) => Ok(InstallOutcome::Completed),
            Err(e) if e.is_cancellation() => {
                tracing::info!("Install of {} (operation #{}) cancelled: {}", mod_key, id, e);
                Ok(InstallOutcome::Cancelled)
            }
            Err(e) => Err(e),
        }
    }

    /// Uninstall a mod and wait for the queue to run it
    pub async fn uninstall(&self, mod_key: &str, mod_title: &str) -> Result<(), ModOpError> {
        let (_, outcome) = self.submit_uninstall(mod_key, mod_title);
        outcome.await.map(|_| ())
    }

    /// Whether a mod is installed; failures count as not installed
    pub async fn is_installed(&self, mod_key: &str) -> bool {
        match self.engine.is_installed(mod_key.trim()).await {
            Ok(installed) => installed,
            Err(e) => {
                tracing::debug!("Installed check for {} failed: {}", mod_key, e);
                false
            }
        }
    }

    pub fn queue_state(&self) -> QueueSnapshot {
        self.queue.state()
    }

    pub fn cancel_queued(&self, id: OperationId) -> bool {
        self.queue.cancel_queued_by_id(id)
    }

    /// Queue snapshots on every admission, start, completion and (throttled) progress
    pub fn subscribe(&self) -> broadcast::Receiver<QueueSnapshot> {
        self.queue.subscribe()
    }

    /// Step-level progress for the running operation
    pub fn subscribe_progress(&self) -> broadcast::Receiver<ModProgress> {
        self.progress_tx.subscribe()
    }
}
