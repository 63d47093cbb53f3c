//! Data models for the mod operation engine.
//!
//! - [`ModOperation`] / [`QueueSnapshot`]: queue bookkeeping pushed to observers
//! - [`ProgressUpdate`] / [`ModProgress`]: step-level progress from the install engine
//! - [`ManifestDocument`]: the external installer's `InstalledMods.config`
//! - [`ArtifactRecord`]: files this crate observed an install create
//! - [`ModOpsConfig`]: settings loaded from `modops.yaml`
//! - [`ModOpError`] / [`ErrorCode`]: the caller-facing failure taxonomy
//! - [`MAX_CONCURRENT_MOD_OPERATIONS`]: concurrency cap (always 1)

pub mod artifact;
pub mod config;
pub mod error;
pub mod manifest;
pub mod operation;

pub use artifact::{ArtifactRecord, ArtifactStoreDocument};
pub use config::{LegacyModSpec, LegacyRoot, ModOpsConfig};
pub use error::{ErrorCode, ModOpError};
pub use manifest::{ManifestDocument, ManifestEntry, ManifestFile};
pub use operation::{
    DEFAULT_OPERATION_TIMEOUT, MAX_CONCURRENT_MOD_OPERATIONS, ModAction, ModOperation,
    ModProgress, OperationId, OperationStatus, ProgressStep, ProgressUpdate, QueueSnapshot,
};
