//! Install/uninstall engine.
//!
//! Two strategies share one entry point:
//!
//! - **Registered mods** go through the external installer and its manifest. See
//!   [`registered`].
//! - **Legacy mods** (keys present in the `legacy_mods` catalog) overwrite named game
//!   files with backup/restore. See [`legacy`].
//!
//! The engine performs one operation per call and assumes nothing else mutates the
//! tooling or game folders meanwhile; the operation queue guarantees that.

mod legacy;
mod registered;

use crate::models::{ModOpError, ModOpsConfig, ProgressUpdate};
use crate::services::artifacts::ArtifactStore;
use crate::services::download::{HttpDownloader, PackageDownloader};
use crate::services::installer_process::{InstallerRunner, ProcessRunner};
use crate::services::manifest::ManifestStore;
use crate::services::paths::{self, GameLayout, KitLayout};
use camino::Utf8PathBuf;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

/// Progress callback handed to every engine operation
pub type ProgressFn<'a> = dyn Fn(ProgressUpdate) + Send + Sync + 'a;

pub(crate) mod messages {
    pub const DOWNLOADING: &str = "modprofiles-downloading";
    pub const DOWNLOAD_COMPLETE: &str = "modprofiles-download-complete";
    pub const EXTRACTING: &str = "modprofiles-extracting";
    pub const EXTRACTION_COMPLETE: &str = "modprofiles-extraction-complete";
    pub const INSTALLING: &str = "modprofiles-installing";
    pub const INSTALLATION_COMPLETE: &str = "modprofiles-installation-complete";
    pub const INSTALL_COMPLETE: &str = "modprofiles-install-complete";
    pub const UNINSTALLING: &str = "modprofiles-uninstalling";
    pub const UNINSTALL_COMPLETE: &str = "modprofiles-uninstall-complete";
}

pub struct InstallEngine {
    config: Arc<ModOpsConfig>,
    downloader: Arc<dyn PackageDownloader>,
    runner: Arc<dyn InstallerRunner>,
    /// One cache per manifest path, kept across operations
    manifests: Mutex<HashMap<Utf8PathBuf, Arc<ManifestStore>>>,
}

impl InstallEngine {
    pub fn new(
        config: Arc<ModOpsConfig>,
        downloader: Arc<dyn PackageDownloader>,
        runner: Arc<dyn InstallerRunner>,
    ) -> Self {
        Self {
            config,
            downloader,
            runner,
            manifests: Mutex::new(HashMap::new()),
        }
    }

    /// Engine using HTTP downloads and the real installer process
    pub fn with_defaults(config: Arc<ModOpsConfig>) -> Self {
        Self::new(config, Arc::new(HttpDownloader::new()), Arc::new(ProcessRunner))
    }

    pub fn config(&self) -> &ModOpsConfig {
        &self.config
    }

    /// Install one mod
    ///
    /// # Arguments
    /// * `mod_key` - Stable mod identifier
    /// * `download_url` - Package (registered) or zip (legacy) location; legacy mods
    ///   fall back to their catalog URL when empty
    /// * `progress` - Receives step-level progress
    pub async fn install(
        &self,
        mod_key: &str,
        download_url: &str,
        progress: &ProgressFn<'_>,
    ) -> Result<(), ModOpError> {
        match self.config.resolve_legacy(mod_key)? {
            Some(spec) => {
                let url = if download_url.trim().is_empty() {
                    spec.download_url.as_str()
                } else {
                    download_url
                };
                self.install_legacy(mod_key, spec, url, progress).await
            }
            None => self.install_registered(mod_key, download_url, progress).await,
        }
    }

    /// Uninstall one mod
    pub async fn uninstall(&self, mod_key: &str, progress: &ProgressFn<'_>) -> Result<(), ModOpError> {
        match self.config.resolve_legacy(mod_key)? {
            Some(spec) => self.uninstall_legacy(spec, progress).await,
            None => self.uninstall_registered(mod_key, progress).await,
        }
    }

    /// Whether a mod is currently installed.
    ///
    /// Registered mods are judged by manifest presence alone; legacy mods by their
    /// target files (and backups, when required).
    pub async fn is_installed(&self, mod_key: &str) -> Result<bool, ModOpError> {
        if mod_key.trim().is_empty() {
            return Ok(false);
        }
        match self.config.resolve_legacy(mod_key)? {
            Some(spec) => Ok(self.is_legacy_installed(spec).await),
            None => {
                let kit = self.kit()?;
                let doc = self.manifest_store(&kit).read().await;
                Ok(doc.find_flexible(mod_key).is_some())
            }
        }
    }

    pub(crate) fn kit(&self) -> Result<KitLayout, ModOpError> {
        KitLayout::resolve(&self.config)
    }

    pub(crate) fn game(&self) -> Result<GameLayout, ModOpError> {
        GameLayout::from_config(&self.config)
    }

    pub(crate) fn artifact_store(&self) -> Result<ArtifactStore, ModOpError> {
        paths::artifact_store_path(&self.config).map(ArtifactStore::new)
    }

    pub(crate) fn temp_dir(&self) -> Option<Utf8PathBuf> {
        self.config
            .temp_dir
            .as_deref()
            .filter(|d| !d.trim().is_empty())
            .map(Utf8PathBuf::from)
    }

    /// Cached manifest store for this tooling folder
    pub fn manifest_store(&self, kit: &KitLayout) -> Arc<ManifestStore> {
        let path = kit.manifest_path();
        let mut stores = self.manifests.lock().unwrap_or_else(PoisonError::into_inner);
        Arc::clone(stores.entry(path.clone()).or_insert_with(|| {
            Arc::new(ManifestStore::new(
                path,
                self.config.manifest_cache_ttl(),
                self.config.manifest_cache_log_every,
            ))
        }))
    }
}
