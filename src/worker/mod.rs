//! Execution harness: runs one engine call in its own task with a hard timeout.
//!
//! The worker task talks to the harness only through [`WorkerMessage`]s on an
//! unbounded channel:
//!
//! - `Progress`: step, percent and message key
//! - `Done`: result payload (`true` for install/uninstall, the answer for checks)
//! - `Error`: message plus an optional [`ErrorCode`]
//! - `Log`: diagnostics, sent only when log forwarding is enabled
//!
//! The harness settles exactly once, on whichever comes first: a terminal message,
//! the worker ending without one, or the timeout. On every path the worker task is
//! aborted and the channel closed when [`WorkerHandle`] drops.

use crate::models::{ErrorCode, ModOpError, ProgressStep, ProgressUpdate};
use crate::services::InstallEngine;
use crate::services::engine::messages;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

/// Default wall clock for one worker run (15 minutes)
pub const DEFAULT_WORKER_TIMEOUT: Duration = Duration::from_secs(15 * 60);

/// What the worker should do
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum WorkerRequest {
    Install { mod_key: String, download_url: String },
    Uninstall { mod_key: String },
    IsInstalled { mod_key: String },
}

impl WorkerRequest {
    pub fn mod_key(&self) -> &str {
        match self {
            WorkerRequest::Install { mod_key, .. }
            | WorkerRequest::Uninstall { mod_key }
            | WorkerRequest::IsInstalled { mod_key } => mod_key,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            WorkerRequest::Install { .. } => "install",
            WorkerRequest::Uninstall { .. } => "uninstall",
            WorkerRequest::IsInstalled { .. } => "isInstalled",
        }
    }
}

impl fmt::Display for WorkerRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}({})", self.kind(), self.mod_key())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WorkerLogLevel {
    Debug,
    Info,
    Warn,
    Error,
}

/// Messages from the worker task to the harness
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum WorkerMessage {
    Progress { mod_key: String, progress: ProgressUpdate },
    Done { result: bool },
    Error { message: String, code: Option<ErrorCode> },
    Log { level: WorkerLogLevel, message: String },
}

/// Aborts the worker task and closes the channel on drop
struct WorkerHandle {
    task: JoinHandle<()>,
    rx: mpsc::UnboundedReceiver<WorkerMessage>,
}

impl Drop for WorkerHandle {
    fn drop(&mut self) {
        self.rx.close();
        self.task.abort();
    }
}

/// Runs engine calls in isolated worker tasks
#[derive(Clone)]
pub struct ExecutionHarness {
    engine: Arc<InstallEngine>,
    timeout: Duration,
    forward_logs: bool,
}

impl ExecutionHarness {
    pub fn new(engine: Arc<InstallEngine>, timeout: Duration, forward_logs: bool) -> Self {
        Self {
            engine,
            timeout,
            forward_logs,
        }
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Run one request to completion, relaying progress as it arrives
    ///
    /// # Returns
    /// The worker's `done` payload, or the typed failure that settled the run
    pub async fn run<F>(&self, request: WorkerRequest, on_progress: F) -> Result<bool, ModOpError>
    where
        F: Fn(&str, ProgressUpdate) + Send + Sync,
    {
        let started = Instant::now();
        let label = request.to_string();
        tracing::debug!("Worker start: {} (timeout {:?})", label, self.timeout);

        let (tx, rx) = mpsc::unbounded_channel();
        let task = tokio::spawn(worker_main(
            Arc::clone(&self.engine),
            request,
            tx,
            self.forward_logs,
        ));
        let mut handle = WorkerHandle { task, rx };

        let deadline = tokio::time::sleep(self.timeout);
        tokio::pin!(deadline);

        let outcome = loop {
            tokio::select! {
                message = handle.rx.recv() => match message {
                    Some(WorkerMessage::Progress { mod_key, progress }) => {
                        on_progress(&mod_key, progress);
                    }
                    Some(WorkerMessage::Log { level, message }) => {
                        if self.forward_logs {
                            forward_log(&label, level, &message);
                        }
                    }
                    Some(WorkerMessage::Done { result }) => break Ok(result),
                    Some(WorkerMessage::Error { message, code }) => {
                        break Err(ModOpError::from_worker(code, message));
                    }
                    None => break Err(exit_error(&mut handle.task).await),
                },
                _ = &mut deadline => {
                    let elapsed = started.elapsed().as_millis();
                    tracing::error!("Worker timeout: {} after {}ms", label, elapsed);
                    break Err(ModOpError::OperationTimeout(format!(
                        "MOD_WORKER_TIMEOUT: {} exceeded {}ms (elapsed {}ms)",
                        label,
                        self.timeout.as_millis(),
                        elapsed
                    )));
                }
            }
        };
        drop(handle);

        match &outcome {
            Ok(result) => tracing::debug!(
                "Worker done: {} -> {} in {}ms",
                label,
                result,
                started.elapsed().as_millis()
            ),
            Err(e) => tracing::warn!("Worker failed: {} [{}] {}", label, e.code(), e),
        }
        outcome
    }
}

/// Turn a worker that closed its channel without a terminal message into an error
async fn exit_error(task: &mut JoinHandle<()>) -> ModOpError {
    match task.await {
        Err(e) if e.is_panic() => {
            let panic = e.into_panic();
            let detail = panic
                .downcast_ref::<&str>()
                .map(|s| s.to_string())
                .or_else(|| panic.downcast_ref::<String>().cloned())
                .unwrap_or_else(|| "unknown panic".to_string());
            ModOpError::WorkerTerminated(format!("panicked: {}", detail))
        }
        Err(e) => ModOpError::WorkerTerminated(e.to_string()),
        Ok(()) => ModOpError::WorkerTerminated("exited without a result".to_string()),
    }
}

fn forward_log(label: &str, level: WorkerLogLevel, message: &str) {
    match level {
        WorkerLogLevel::Debug => tracing::debug!(target: "modops::worker", "[{}] {}", label, message),
        WorkerLogLevel::Info => tracing::info!(target: "modops::worker", "[{}] {}", label, message),
        WorkerLogLevel::Warn => tracing::warn!(target: "modops::worker", "[{}] {}", label, message),
        WorkerLogLevel::Error => tracing::error!(target: "modops::worker", "[{}] {}", label, message),
    }
}

async fn worker_main(
    engine: Arc<InstallEngine>,
    request: WorkerRequest,
    tx: mpsc::UnboundedSender<WorkerMessage>,
    forward_logs: bool,
) {
    let mod_key = request.mod_key().to_string();
    let log = |level: WorkerLogLevel, message: String| {
        if forward_logs {
            let _ = tx.send(WorkerMessage::Log { level, message });
        }
    };
    let send_progress = |progress: ProgressUpdate| {
        let _ = tx.send(WorkerMessage::Progress {
            mod_key: mod_key.clone(),
            progress,
        });
    };

    log(WorkerLogLevel::Info, format!("received {}", request));

    let result = match &request {
        WorkerRequest::Install { download_url, .. } => {
            let saw_done = AtomicBool::new(false);
            let progress = |update: ProgressUpdate| {
                if update.step == ProgressStep::Done {
                    saw_done.store(true, Ordering::Relaxed);
                }
                send_progress(update);
            };
            let outcome = engine.install(&mod_key, download_url, &progress).await;
            if outcome.is_ok() && !saw_done.load(Ordering::Relaxed) {
                send_progress(ProgressUpdate::new(ProgressStep::Done, 100, messages::INSTALL_COMPLETE));
            }
            outcome.map(|()| true)
        }
        WorkerRequest::Uninstall { .. } => {
            send_progress(ProgressUpdate::new(ProgressStep::Uninstalling, 0, messages::UNINSTALLING));
            let outcome = engine.uninstall(&mod_key, &send_progress).await;
            if outcome.is_ok() {
                send_progress(ProgressUpdate::new(ProgressStep::Done, 100, messages::UNINSTALL_COMPLETE));
            }
            outcome.map(|()| true)
        }
        WorkerRequest::IsInstalled { .. } => engine.is_installed(&mod_key).await,
    };

    match result {
        Ok(result) => {
            log(WorkerLogLevel::Info, format!("{} done", request));
            let _ = tx.send(WorkerMessage::Done { result });
        }
        Err(e) => {
            log(WorkerLogLevel::Error, format!("{} failed: {}", request, e));
            let _ = tx.send(WorkerMessage::Error {
                message: e.to_string(),
                code: Some(e.code()),
            });
        }
    }
}
