use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// Default wall-clock budget for one queued operation (10 minutes).
pub const DEFAULT_OPERATION_TIMEOUT: Duration = Duration::from_secs(10 * 60);

/// Maximum number of operations mutating the installation tree at once.
///
/// **IMPORTANT:** This is hardcoded to 1. The external installer, the manifest
/// file and the game folders have no finer-grained locking; correctness depends
/// on never running two operations concurrently.
pub const MAX_CONCURRENT_MOD_OPERATIONS: usize = 1;

pub type OperationId = u64;

/// Requested mutation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ModAction {
    Install,
    Uninstall,
}

impl fmt::Display for ModAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ModAction::Install => f.write_str("install"),
            ModAction::Uninstall => f.write_str("uninstall"),
        }
    }
}

/// Lifecycle of a queued operation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OperationStatus {
    Queued,
    Running,
    Done,
    Failed,
    Cancelled,
}

impl OperationStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            OperationStatus::Done | OperationStatus::Failed | OperationStatus::Cancelled
        )
    }
}

/// One requested mutation, as seen by queue observers.
///
/// Timestamps are milliseconds since the Unix epoch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModOperation {
    pub id: OperationId,
    pub mod_key: String,
    pub mod_title: String,
    pub action: ModAction,
    pub status: OperationStatus,
    pub created_at: u64,
    pub started_at: Option<u64>,
    pub percent: u8,
    pub message: String,
    #[serde(with = "duration_ms")]
    pub timeout: Duration,
}

impl ModOperation {
    pub fn new(
        id: OperationId,
        mod_key: &str,
        mod_title: &str,
        action: ModAction,
        timeout: Duration,
    ) -> Self {
        Self {
            id,
            mod_key: mod_key.trim().to_string(),
            mod_title: mod_title.trim().to_string(),
            action,
            status: OperationStatus::Queued,
            created_at: unix_millis(),
            started_at: None,
            percent: 0,
            message: String::new(),
            timeout,
        }
    }

    /// Milliseconds spent waiting in the queue, once started.
    pub fn queued_ms(&self) -> Option<u64> {
        self.started_at
            .map(|started| started.saturating_sub(self.created_at))
    }
}

/// Point-in-time view of the queue pushed to subscribers.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueueSnapshot {
    pub active: Option<ModOperation>,
    pub queued: Vec<ModOperation>,
    /// The most recently settled operation, carrying its terminal status.
    pub last_settled: Option<ModOperation>,
}

impl QueueSnapshot {
    pub fn is_idle(&self) -> bool {
        self.active.is_none() && self.queued.is_empty()
    }

    pub fn queued_ids(&self) -> Vec<OperationId> {
        self.queued.iter().map(|op| op.id).collect()
    }
}

/// Named phase of an install or uninstall
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProgressStep {
    Downloading,
    Extracting,
    Installing,
    Uninstalling,
    Done,
}

/// Progress report produced by the install engine.
///
/// `message` is a translation key for the presentation layer, not prose.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProgressUpdate {
    pub step: ProgressStep,
    pub percent: u8,
    pub message: String,
}

impl ProgressUpdate {
    pub fn new(step: ProgressStep, percent: u8, message: &str) -> Self {
        Self {
            step,
            percent: percent.min(100),
            message: message.to_string(),
        }
    }

    /// Percentage of `done` out of `total`, rounded; an empty batch counts as complete.
    pub fn fraction(step: ProgressStep, done: usize, total: usize, message: &str) -> Self {
        let percent = if total == 0 {
            100
        } else {
            ((done as f64 / total as f64) * 100.0).round() as u8
        };
        Self::new(step, percent, message)
    }
}

/// Progress for one mod, as broadcast to per-mod listeners.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModProgress {
    pub mod_key: String,
    pub progress: ProgressUpdate,
}

pub(crate) fn unix_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or_default()
}

mod duration_ms {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(value.as_millis() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_millis)
    }
}
