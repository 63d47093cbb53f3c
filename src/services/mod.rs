//! Services module - filesystem and process work behind every mod operation.
//!
//! # Components
//!
//! - [`InstallEngine`]: runs one install, uninstall or installed-check for either
//!   mod strategy (registered through the external installer, or legacy file patch)
//! - [`ManifestStore`]: TTL-cached, single-flight access to `InstalledMods.config`
//! - [`artifacts`]: directory snapshots and the per-mod artifact record store
//! - [`tokens`]: name normalization and the heuristic relatedness scorer
//! - [`download`]: the [`PackageDownloader`] seam, HTTP downloads and zip extraction
//! - [`installer_process`]: the [`InstallerRunner`] seam over the installer executable
//! - [`paths`]: tooling and game folder layout
//! - [`removal`]: best-effort deletion helpers
//!
//! The services hold no queue state. Serializing operations is the job of
//! [`crate::queue::OperationQueue`].

pub mod artifacts;
pub mod download;
pub mod engine;
pub mod installer_process;
pub mod manifest;
pub mod paths;
pub mod removal;
pub mod tokens;

pub use artifacts::{ArtifactSnapshot, ArtifactStore, DirectorySnapshot, PackageSnapshot};
pub use download::{HttpDownloader, PackageDownloader};
pub use engine::{InstallEngine, ProgressFn};
pub use installer_process::{InstallerRunner, ProcessRunner};
pub use manifest::{ManifestCacheStats, ManifestStore};
pub use paths::{GameLayout, KitLayout};
pub use tokens::{MatchVerdict, TokenSet, normalize_dll_token};
