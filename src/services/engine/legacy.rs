//! Patch-style mods that overwrite named game files.
//!
//! Install renames each untouched original to `<name>.backup` (once) and copies the
//! patched file over it. Uninstall deletes the patched file and renames the backup
//! back, restoring the original bytes.

use super::{InstallEngine, ProgressFn, messages};
use crate::models::{LegacyModSpec, ModOpError, ProgressStep, ProgressUpdate};
use crate::services::download::{download_to_temp, extract_named_files};
use camino::{Utf8Path, Utf8PathBuf};
use std::fs;

const BACKUP_SUFFIX: &str = ".backup";

fn backup_path(dir: &Utf8Path, file: &str) -> Utf8PathBuf {
    dir.join(format!("{}{}", file, BACKUP_SUFFIX))
}

fn io_err(action: &str, path: &Utf8Path, e: std::io::Error) -> ModOpError {
    ModOpError::Io(format!("Failed to {} {}: {}", action, path, e))
}

/// Run filesystem work on the blocking pool
async fn blocking<T, F>(f: F) -> Result<T, ModOpError>
where
    T: Send + 'static,
    F: FnOnce() -> Result<T, ModOpError> + Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| ModOpError::Io(format!("File task failed: {}", e)))?
}

/// Back up the untouched original once, then copy the patched file over it
fn place_patched(
    patched: &Utf8Path,
    target: &Utf8Path,
    backup: &Utf8Path,
    requires_backup: bool,
) -> Result<(), ModOpError> {
    if requires_backup && target.exists() && !backup.exists() {
        fs::rename(target, backup).map_err(|e| io_err("back up", target, e))?;
        tracing::debug!("Backed up {} -> {}", target, backup);
    }
    fs::copy(patched, target).map_err(|e| io_err("write", target, e))?;
    tracing::debug!("Installed {}", target);
    Ok(())
}

fn restore_original(target: &Utf8Path, backup: &Utf8Path, requires_backup: bool) -> Result<(), ModOpError> {
    if target.exists() {
        fs::remove_file(target).map_err(|e| io_err("remove", target, e))?;
    }
    if requires_backup && backup.exists() {
        fs::rename(backup, target).map_err(|e| io_err("restore", backup, e))?;
        tracing::debug!("Restored {} from backup", target);
    }
    Ok(())
}

impl InstallEngine {
    pub(super) async fn install_legacy(
        &self,
        mod_key: &str,
        spec: &LegacyModSpec,
        download_url: &str,
        progress: &ProgressFn<'_>,
    ) -> Result<(), ModOpError> {
        let game = self.game()?;
        let target_dir = game.legacy_target_dir(spec);
        tracing::info!("Installing legacy mod {} into {}", mod_key, target_dir);

        let dir = target_dir.clone();
        blocking(move || fs::create_dir_all(&dir).map_err(|e| io_err("create", &dir, e))).await?;

        progress(ProgressUpdate::new(ProgressStep::Downloading, 0, messages::DOWNLOADING));
        let temp_dir = self.temp_dir();
        let archive = download_to_temp(
            self.downloader.clone(),
            download_url,
            mod_key,
            ".zip",
            temp_dir.as_deref(),
        )
        .await?;
        progress(ProgressUpdate::new(ProgressStep::Downloading, 100, messages::DOWNLOAD_COMPLETE));

        progress(ProgressUpdate::new(ProgressStep::Extracting, 0, messages::EXTRACTING));
        let scratch = match temp_dir.as_deref() {
            Some(dir) => tempfile::Builder::new().prefix("modops-").tempdir_in(dir),
            None => tempfile::Builder::new().prefix("modops-").tempdir(),
        }
        .map_err(|e| ModOpError::Io(format!("Failed to create scratch directory: {}", e)))?;

        let archive_path = Utf8PathBuf::try_from(archive.to_path_buf())
            .map_err(|e| ModOpError::Io(format!("Archive path is not UTF-8: {}", e)))?;
        let scratch_path = Utf8PathBuf::try_from(scratch.path().to_path_buf())
            .map_err(|e| ModOpError::Io(format!("Scratch path is not UTF-8: {}", e)))?;

        let files = spec.files.clone();
        let extract_to = scratch_path.clone();
        blocking(move || extract_named_files(&archive_path, &files, &extract_to)).await?;
        progress(ProgressUpdate::new(ProgressStep::Extracting, 100, messages::EXTRACTION_COMPLETE));

        progress(ProgressUpdate::new(ProgressStep::Installing, 0, messages::INSTALLING));
        let total = spec.files.len();
        for (i, file) in spec.files.iter().enumerate() {
            let target = target_dir.join(file);
            let backup = backup_path(&target_dir, file);
            let patched = scratch_path.join(file);
            let requires_backup = spec.requires_backup;
            blocking(move || place_patched(&patched, &target, &backup, requires_backup)).await?;

            progress(ProgressUpdate::fraction(ProgressStep::Installing, i + 1, total, messages::INSTALLING));
        }

        progress(ProgressUpdate::new(ProgressStep::Done, 100, messages::INSTALLATION_COMPLETE));
        tracing::info!("Installed legacy mod {}", mod_key);
        Ok(())
    }

    pub(super) async fn uninstall_legacy(
        &self,
        spec: &LegacyModSpec,
        progress: &ProgressFn<'_>,
    ) -> Result<(), ModOpError> {
        let game = self.game()?;
        let target_dir = game.legacy_target_dir(spec);
        tracing::info!("Restoring original files in {}", target_dir);

        progress(ProgressUpdate::new(ProgressStep::Uninstalling, 0, messages::UNINSTALLING));

        let total = spec.files.len();
        for (i, file) in spec.files.iter().enumerate() {
            let target = target_dir.join(file);
            let backup = backup_path(&target_dir, file);
            let requires_backup = spec.requires_backup;
            blocking(move || restore_original(&target, &backup, requires_backup)).await?;

            progress(ProgressUpdate::fraction(ProgressStep::Uninstalling, i + 1, total, messages::UNINSTALLING));
        }

        progress(ProgressUpdate::new(ProgressStep::Done, 100, messages::UNINSTALL_COMPLETE));
        Ok(())
    }

    /// Every target present, and its backup too when backups are required
    pub(super) async fn is_legacy_installed(&self, spec: &LegacyModSpec) -> bool {
        let Ok(game) = self.game() else {
            return false;
        };
        let target_dir = game.legacy_target_dir(spec);
        let files = spec.files.clone();
        let requires_backup = spec.requires_backup;

        blocking(move || {
            Ok(files.iter().all(|file| {
                target_dir.join(file).exists()
                    && (!requires_backup || backup_path(&target_dir, file).exists())
            }))
        })
        .await
        .unwrap_or(false)
    }
}
