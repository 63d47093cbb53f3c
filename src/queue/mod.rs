//! Single-slot FIFO queue for mutating mod operations.
//!
//! At most one operation runs at a time (see [`MAX_CONCURRENT_MOD_OPERATIONS`]).
//! Queued operations start strictly in enqueue order, and only [`OperationQueue`]'s
//! drain step promotes one to running. Each running operation is bounded by its own
//! timeout; on expiry its task is aborted, its future fails with
//! [`ModOpError::OperationTimeout`] and the next operation starts right away.
//!
//! Observers get [`QueueSnapshot`]s over a broadcast channel. Admission, start,
//! completion and cancellation are emitted immediately. Progress is throttled to one
//! snapshot per `emit_throttle`, so consumers should treat snapshots as latest state.
//!
//! [`MAX_CONCURRENT_MOD_OPERATIONS`]: crate::models::MAX_CONCURRENT_MOD_OPERATIONS

use crate::models::operation::unix_millis;
use crate::models::{
    DEFAULT_OPERATION_TIMEOUT, ModAction, ModOpError, ModOpsConfig, ModOperation, OperationId,
    OperationStatus, ProgressUpdate, QueueSnapshot,
};
use std::collections::VecDeque;
use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex, PoisonError, Weak};
use std::task::{Context, Poll};
use std::time::Duration;
use tokio::sync::{broadcast, oneshot};
use tokio::time::Instant;

/// Default spacing between throttled progress snapshots
pub const DEFAULT_EMIT_THROTTLE: Duration = Duration::from_millis(100);

/// Hands a finished operation's value to its caller
type DeliverFn = Box<dyn FnOnce() + Send>;
type JobFuture = Pin<Box<dyn Future<Output = (Result<(), String>, DeliverFn)> + Send>>;
type StartFn = Box<dyn FnOnce(ProgressSink) -> JobFuture + Send>;
type RejectFn = Box<dyn FnOnce(ModOpError) + Send>;

/// Settles a caller's future at most once, whichever path gets there first
type SettleCell<T> = Arc<Mutex<Option<oneshot::Sender<Result<T, ModOpError>>>>>;

fn settle<T>(cell: &SettleCell<T>, result: Result<T, ModOpError>) {
    let sender = cell.lock().unwrap_or_else(PoisonError::into_inner).take();
    if let Some(sender) = sender {
        let _ = sender.send(result);
    }
}

struct Job {
    op: ModOperation,
    start: StartFn,
    reject: RejectFn,
}

struct Active {
    op: ModOperation,
    reject: RejectFn,
}

enum Settled {
    Finished(Result<(), String>, DeliverFn),
    TimedOut,
    Aborted(String),
}

#[derive(Default)]
struct QueueState {
    next_id: OperationId,
    queued: VecDeque<Job>,
    active: Option<Active>,
    last_settled: Option<ModOperation>,
    last_emit: Option<Instant>,
    emit_pending: bool,
    emit_timer: bool,
}

impl QueueState {
    fn snapshot(&self) -> QueueSnapshot {
        QueueSnapshot {
            active: self.active.as_ref().map(|a| a.op.clone()),
            queued: self.queued.iter().map(|j| j.op.clone()).collect(),
            last_settled: self.last_settled.clone(),
        }
    }
}

struct QueueShared {
    state: Mutex<QueueState>,
    events: broadcast::Sender<QueueSnapshot>,
    default_timeout: Duration,
    emit_throttle: Duration,
}

impl QueueShared {
    fn lock(&self) -> std::sync::MutexGuard<'_, QueueState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn emit_now(&self, state: &mut QueueState) {
        state.emit_pending = false;
        state.last_emit = Some(Instant::now());
        // No subscribers is fine
        let _ = self.events.send(state.snapshot());
    }

    fn emit(self: &Arc<Self>, state: &mut QueueState, immediate: bool) {
        if immediate || self.emit_throttle.is_zero() {
            return self.emit_now(state);
        }

        let since = state.last_emit.map(|at| at.elapsed());
        match since {
            Some(since) if since < self.emit_throttle => {
                state.emit_pending = true;
                if !state.emit_timer {
                    state.emit_timer = true;
                    let wait = self.emit_throttle - since;
                    let shared = Arc::downgrade(self);
                    tokio::spawn(flush_after(shared, wait));
                }
            }
            _ => self.emit_now(state),
        }
    }

    /// Promote the head of the queue when the slot is free
    fn drain(self: &Arc<Self>) {
        let mut state = self.lock();
        if state.active.is_some() {
            return;
        }
        let Some(job) = state.queued.pop_front() else {
            return;
        };

        let mut op = job.op;
        op.status = OperationStatus::Running;
        op.started_at = Some(unix_millis());
        tracing::debug!(
            "Queue start: #{} {}({}) after {}ms queued",
            op.id,
            op.action,
            op.mod_key,
            op.queued_ms().unwrap_or_default()
        );

        let id = op.id;
        let timeout = op.timeout;
        let sink = ProgressSink {
            shared: Arc::downgrade(self),
            id,
        };
        let future = (job.start)(sink);
        state.active = Some(Active {
            op,
            reject: job.reject,
        });
        self.emit(&mut state, true);
        drop(state);

        let shared = Arc::clone(self);
        tokio::spawn(async move {
            let mut task = tokio::spawn(future);
            let settled = match tokio::time::timeout(timeout, &mut task).await {
                Ok(Ok((result, deliver))) => Settled::Finished(result, deliver),
                Ok(Err(e)) if e.is_panic() => Settled::Aborted("operation panicked".to_string()),
                Ok(Err(e)) => Settled::Aborted(e.to_string()),
                Err(_) => {
                    task.abort();
                    // The slot frees only once the job future has been dropped
                    let _ = task.await;
                    Settled::TimedOut
                }
            };
            shared.finish(id, settled);
        });
    }

    fn finish(self: &Arc<Self>, id: OperationId, settled: Settled) {
        let mut state = self.lock();
        if state.active.as_ref().map(|a| a.op.id) != Some(id) {
            return;
        }
        let Some(Active { mut op, reject }) = state.active.take() else {
            return;
        };

        let elapsed = op
            .started_at
            .map(|s| unix_millis().saturating_sub(s))
            .unwrap_or_default();

        let settle_caller: DeliverFn = match settled {
            Settled::Finished(Ok(()), deliver) => {
                op.status = OperationStatus::Done;
                tracing::debug!("Queue finish: #{} {}({}) ok in {}ms", op.id, op.action, op.mod_key, elapsed);
                deliver
            }
            Settled::Finished(Err(message), deliver) => {
                op.status = OperationStatus::Failed;
                op.message = message;
                tracing::debug!(
                    "Queue finish: #{} {}({}) failed in {}ms: {}",
                    op.id,
                    op.action,
                    op.mod_key,
                    elapsed,
                    op.message
                );
                deliver
            }
            Settled::TimedOut => {
                let message = format!(
                    "MOD_OP_TIMEOUT: {}({}) exceeded {}ms",
                    op.action,
                    op.mod_key,
                    op.timeout.as_millis()
                );
                tracing::error!("Queue timeout: #{} {}", op.id, message);
                op.status = OperationStatus::Failed;
                op.message = message.clone();
                Box::new(move || reject(ModOpError::OperationTimeout(message)))
            }
            Settled::Aborted(detail) => {
                tracing::error!("Queue abort: #{} {}({}) {}", op.id, op.action, op.mod_key, detail);
                op.status = OperationStatus::Failed;
                op.message = detail.clone();
                Box::new(move || reject(ModOpError::WorkerTerminated(detail)))
            }
        };

        state.last_settled = Some(op);
        self.emit(&mut state, true);
        drop(state);

        // Callers wake up to a queue that already shows the settled state
        settle_caller();
        self.drain();
    }

    fn report(self: &Arc<Self>, id: OperationId, update: &ProgressUpdate) {
        let mut state = self.lock();
        let Some(active) = state.active.as_mut().filter(|a| a.op.id == id) else {
            return;
        };
        active.op.percent = update.percent;
        active.op.message = update.message.clone();
        tracing::trace!("Queue progress: #{} {}% {}", id, update.percent, update.message);
        self.emit(&mut state, false);
    }
}

async fn flush_after(shared: Weak<QueueShared>, wait: Duration) {
    tokio::time::sleep(wait).await;
    let Some(shared) = shared.upgrade() else {
        return;
    };
    let mut state = shared.lock();
    state.emit_timer = false;
    if state.emit_pending {
        shared.emit_now(&mut state);
    }
}

/// Progress handle given to a running operation.
///
/// Reports after the operation has settled are ignored.
#[derive(Clone)]
pub struct ProgressSink {
    shared: Weak<QueueShared>,
    id: OperationId,
}

impl ProgressSink {
    pub fn id(&self) -> OperationId {
        self.id
    }

    pub fn report(&self, update: &ProgressUpdate) {
        if let Some(shared) = self.shared.upgrade() {
            shared.report(self.id, update);
        }
    }
}

/// Resolves when a queued operation completes, fails, times out or is cancelled
pub struct OperationFuture<T> {
    rx: oneshot::Receiver<Result<T, ModOpError>>,
}

impl<T> Future for OperationFuture<T> {
    type Output = Result<T, ModOpError>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        Pin::new(&mut self.rx)
            .poll(cx)
            .map(|r| r.unwrap_or(Err(ModOpError::OperationCancelled)))
    }
}

/// Owned single-concurrency operation queue.
///
/// Cloning shares the same queue. Must be used from within a tokio runtime.
#[derive(Clone)]
pub struct OperationQueue {
    shared: Arc<QueueShared>,
}

impl Default for OperationQueue {
    fn default() -> Self {
        Self::new(DEFAULT_OPERATION_TIMEOUT, DEFAULT_EMIT_THROTTLE)
    }
}

impl OperationQueue {
    pub fn new(default_timeout: Duration, emit_throttle: Duration) -> Self {
        let (events, _) = broadcast::channel(100);
        Self {
            shared: Arc::new(QueueShared {
                state: Mutex::new(QueueState {
                    next_id: 1,
                    ..QueueState::default()
                }),
                events,
                default_timeout,
                emit_throttle,
            }),
        }
    }

    pub fn from_config(config: &ModOpsConfig) -> Self {
        Self::new(config.operation_timeout(), config.emit_throttle())
    }

    /// Admit an operation and return immediately
    ///
    /// # Arguments
    /// * `run` - Started once the slot is free; receives a [`ProgressSink`]
    /// * `timeout` - Wall clock for the running phase; `None` uses the queue default
    ///
    /// # Returns
    /// The operation id and a future that settles with `run`'s result
    pub fn enqueue<T, F, Fut>(
        &self,
        mod_key: &str,
        mod_title: &str,
        action: ModAction,
        run: F,
        timeout: Option<Duration>,
    ) -> (OperationId, OperationFuture<T>)
    where
        T: Send + 'static,
        F: FnOnce(ProgressSink) -> Fut + Send + 'static,
        Fut: Future<Output = Result<T, ModOpError>> + Send + 'static,
    {
        let (tx, rx) = oneshot::channel();
        let cell: SettleCell<T> = Arc::new(Mutex::new(Some(tx)));

        let run_cell = Arc::clone(&cell);
        let start: StartFn = Box::new(move |sink| {
            Box::pin(async move {
                let result = run(sink).await;
                let outcome = result.as_ref().map(|_| ()).map_err(|e| e.to_string());
                let deliver: DeliverFn = Box::new(move || settle(&run_cell, result));
                (outcome, deliver)
            })
        });
        let reject: RejectFn = Box::new(move |error| settle(&cell, Err(error)));

        let mut state = self.shared.lock();
        let id = state.next_id;
        state.next_id += 1;

        let op = ModOperation::new(
            id,
            mod_key,
            mod_title,
            action,
            timeout.unwrap_or(self.shared.default_timeout),
        );
        tracing::debug!(
            "Queue enqueue: #{} {}({}), {} waiting",
            id,
            op.action,
            op.mod_key,
            state.queued.len()
        );
        state.queued.push_back(Job { op, start, reject });
        self.shared.emit(&mut state, true);
        drop(state);

        self.shared.drain();
        (id, OperationFuture { rx })
    }

    /// Remove a not-yet-started operation; its future fails with `MOD_OP_CANCELLED`
    ///
    /// # Returns
    /// `false` when no queued operation has this id (including the running one)
    pub fn cancel_queued_by_id(&self, id: OperationId) -> bool {
        let mut state = self.shared.lock();
        let Some(index) = state.queued.iter().position(|j| j.op.id == id) else {
            return false;
        };
        let Some(job) = state.queued.remove(index) else {
            return false;
        };

        let mut op = job.op;
        op.status = OperationStatus::Cancelled;
        tracing::debug!("Queue cancel: #{} {}({})", op.id, op.action, op.mod_key);
        state.last_settled = Some(op);
        self.shared.emit(&mut state, true);
        drop(state);

        (job.reject)(ModOpError::OperationCancelled);
        true
    }

    pub fn state(&self) -> QueueSnapshot {
        self.shared.lock().snapshot()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<QueueSnapshot> {
        self.shared.events.subscribe()
    }

    pub fn default_timeout(&self) -> Duration {
        self.shared.default_timeout
    }
}
