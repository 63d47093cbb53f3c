use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Stable error codes surfaced to callers.
///
/// The string form never changes between releases, so a UI can tell "nothing
/// happened" (cancelled, timed out while queued) apart from "partially applied".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    ModOpTimeout,
    ModOpCancelled,
    InstallCancelled,
    InstallNotRegistered,
    InstallPathNotFound,
    ToolingNotConfigured,
    ManifestMalformed,
    DownloadFailed,
    UnknownLegacyMod,
    ModWorkerExited,
    IoFailure,
}

impl ErrorCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCode::ModOpTimeout => "MOD_OP_TIMEOUT",
            ErrorCode::ModOpCancelled => "MOD_OP_CANCELLED",
            ErrorCode::InstallCancelled => "INSTALL_CANCELLED",
            ErrorCode::InstallNotRegistered => "INSTALL_NOT_REGISTERED",
            ErrorCode::InstallPathNotFound => "INSTALL_PATH_NOT_FOUND",
            ErrorCode::ToolingNotConfigured => "TOOLING_NOT_CONFIGURED",
            ErrorCode::ManifestMalformed => "MANIFEST_MALFORMED",
            ErrorCode::DownloadFailed => "DOWNLOAD_FAILED",
            ErrorCode::UnknownLegacyMod => "UNKNOWN_LEGACY_MOD",
            ErrorCode::ModWorkerExited => "MOD_WORKER_EXITED",
            ErrorCode::IoFailure => "IO_FAILURE",
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Errors that can occur while queueing or executing a mod operation
#[derive(Error, Debug)]
pub enum ModOpError {
    /// Queue- or worker-level wall clock exceeded. Always terminal; the slot is freed.
    #[error("{0}")]
    OperationTimeout(String),

    /// Operation was removed from the queue before it started.
    #[error("MOD_OP_CANCELLED")]
    OperationCancelled,

    /// The external installer reported that its UI was closed by the user.
    #[error("INSTALL_CANCELLED")]
    InstallerCancelledByUser,

    #[error("INSTALL_NOT_REGISTERED: {0}")]
    InstallNotRegistered(String),

    #[error("Game installation not found")]
    InstallationPathNotFound,

    #[error("Mod tooling not configured: {0}")]
    ToolingNotConfigured(String),

    /// Only ever produced internally; manifest reads recover to an empty document.
    #[error("Manifest malformed: {0}")]
    ManifestMalformed(String),

    #[error("Download failed: {0}")]
    DownloadFailed(String),

    #[error("Mod config not found: {0}")]
    UnknownLegacyMod(String),

    #[error("Worker exited abnormally: {0}")]
    WorkerTerminated(String),

    #[error("{0}")]
    Io(String),
}

impl ModOpError {
    pub fn code(&self) -> ErrorCode {
        match self {
            ModOpError::OperationTimeout(_) => ErrorCode::ModOpTimeout,
            ModOpError::OperationCancelled => ErrorCode::ModOpCancelled,
            ModOpError::InstallerCancelledByUser => ErrorCode::InstallCancelled,
            ModOpError::InstallNotRegistered(_) => ErrorCode::InstallNotRegistered,
            ModOpError::InstallationPathNotFound => ErrorCode::InstallPathNotFound,
            ModOpError::ToolingNotConfigured(_) => ErrorCode::ToolingNotConfigured,
            ModOpError::ManifestMalformed(_) => ErrorCode::ManifestMalformed,
            ModOpError::DownloadFailed(_) => ErrorCode::DownloadFailed,
            ModOpError::UnknownLegacyMod(_) => ErrorCode::UnknownLegacyMod,
            ModOpError::WorkerTerminated(_) => ErrorCode::ModWorkerExited,
            ModOpError::Io(_) => ErrorCode::IoFailure,
        }
    }

    /// Rebuild a typed error from a worker `error` message.
    ///
    /// Messages without a code become [`ModOpError::Io`], which carries the
    /// worker's text unchanged.
    pub fn from_worker(code: Option<ErrorCode>, message: String) -> Self {
        let detail = |prefix: &str| {
            message
                .strip_prefix(prefix)
                .map(|rest| rest.trim_start().to_string())
                .unwrap_or_else(|| message.clone())
        };

        match code {
            Some(ErrorCode::ModOpTimeout) => ModOpError::OperationTimeout(message),
            Some(ErrorCode::ModOpCancelled) => ModOpError::OperationCancelled,
            Some(ErrorCode::InstallCancelled) => ModOpError::InstallerCancelledByUser,
            Some(ErrorCode::InstallNotRegistered) => {
                ModOpError::InstallNotRegistered(detail("INSTALL_NOT_REGISTERED:"))
            }
            Some(ErrorCode::InstallPathNotFound) => ModOpError::InstallationPathNotFound,
            Some(ErrorCode::ToolingNotConfigured) => {
                ModOpError::ToolingNotConfigured(detail("Mod tooling not configured:"))
            }
            Some(ErrorCode::ManifestMalformed) => {
                ModOpError::ManifestMalformed(detail("Manifest malformed:"))
            }
            Some(ErrorCode::DownloadFailed) => {
                ModOpError::DownloadFailed(detail("Download failed:"))
            }
            Some(ErrorCode::UnknownLegacyMod) => {
                ModOpError::UnknownLegacyMod(detail("Mod config not found:"))
            }
            Some(ErrorCode::ModWorkerExited) => {
                ModOpError::WorkerTerminated(detail("Worker exited abnormally:"))
            }
            Some(ErrorCode::IoFailure) | None => ModOpError::Io(message),
        }
    }

    /// True for outcomes where nothing was applied to the installation tree.
    pub fn is_cancellation(&self) -> bool {
        matches!(
            self,
            ModOpError::OperationCancelled | ModOpError::InstallerCancelledByUser
        )
    }
}

impl From<anyhow::Error> for ModOpError {
    fn from(err: anyhow::Error) -> Self {
        ModOpError::Io(format!("{:#}", err))
    }
}

impl From<std::io::Error> for ModOpError {
    fn from(err: std::io::Error) -> Self {
        ModOpError::Io(err.to_string())
    }
}
