//! Mods installed through the external installer and tracked in its manifest.
//!
//! Uninstall keeps two separate paths. When an artifact record exists, exactly the
//! recorded names are removed. Without one, a token heuristic sweeps the tooling and
//! package folders. Either way the manifest entry's declared files are removed and
//! the entry itself is dropped from the manifest.

use super::{InstallEngine, ProgressFn, messages};
use crate::models::{ArtifactRecord, ManifestEntry, ModOpError, ProgressStep, ProgressUpdate};
use crate::services::artifacts::{ArtifactSnapshot, DirectorySnapshot, PackageSnapshot, diff_artifacts};
use crate::services::download::download_to_temp;
use crate::services::installer_process::is_cancel_exit_code;
use crate::services::paths::{GameLayout, KitLayout, resolve_declared_file};
use crate::services::removal::{list_dir, remove_file_if_exists, remove_in_dir_ignore_case, remove_path_if_exists};
use crate::services::tokens::{
    TokenSet, entry_tokens, normalize_dll_token, shares_two_segments, token_contains_any,
};
use camino::{Utf8Path, Utf8PathBuf};
use std::time::Instant;

impl InstallEngine {
    pub(super) async fn install_registered(
        &self,
        mod_key: &str,
        download_url: &str,
        progress: &ProgressFn<'_>,
    ) -> Result<(), ModOpError> {
        let start = Instant::now();
        let kit = self.kit()?;
        tracing::info!("Installing {} via {}", mod_key, kit.base());

        progress(ProgressUpdate::new(ProgressStep::Downloading, 0, messages::DOWNLOADING));
        let temp_dir = self.temp_dir();
        let package = download_to_temp(
            self.downloader.clone(),
            download_url,
            mod_key,
            ".sporemod",
            temp_dir.as_deref(),
        )
        .await?;
        progress(ProgressUpdate::new(ProgressStep::Downloading, 100, messages::DOWNLOAD_COMPLETE));

        let package_path = Utf8PathBuf::try_from(package.to_path_buf())
            .map_err(|e| ModOpError::Io(format!("Package path is not UTF-8: {}", e)))?;

        // Package folders are optional here; a missing game path only skips their diff
        let game = self.game().ok();
        let before = ArtifactSnapshot::capture(&kit);
        let packages_before = game.as_ref().map(PackageSnapshot::capture);

        progress(ProgressUpdate::new(ProgressStep::Installing, 0, messages::INSTALLING));

        let store = self.manifest_store(&kit);
        store.ensure_valid().await?;
        let exe = kit.require_installer()?;

        let code = self.runner.run(&exe, &package_path).await?;
        tracing::info!("Installer for {} exited with code {}", mod_key, code);
        if is_cancel_exit_code(code) {
            tracing::warn!("Install of {} cancelled in the installer UI", mod_key);
            return Err(ModOpError::InstallerCancelledByUser);
        }

        tokio::time::sleep(self.config.settle_delay()).await;
        store.invalidate("installer exited");

        let doc = store.read().await;
        let Some(entry) = doc.entry_for(mod_key) else {
            tracing::error!(
                "{} not found in {} after install ({} entries)",
                mod_key,
                store.path(),
                doc.entries.len()
            );
            return Err(ModOpError::InstallNotRegistered(format!("exit code {}", code)));
        };
        tracing::debug!("Verified {} as manifest entry {:?}", mod_key, entry.unique().or(entry.name()));

        let after = ArtifactSnapshot::capture(&kit);
        let packages_after = game.as_ref().map(PackageSnapshot::capture);
        let record = diff_artifacts(&before, &after, packages_before.as_ref(), packages_after.as_ref());
        if !record.is_empty() {
            let total = record.total();
            match self.artifact_store().and_then(|s| s.put(mod_key, record)) {
                Ok(()) => tracing::info!("Tracked {} created artifacts for {}", total, mod_key),
                Err(e) => tracing::warn!("Could not record artifacts for {}: {}", mod_key, e),
            }
        }

        progress(ProgressUpdate::new(ProgressStep::Done, 100, messages::INSTALLATION_COMPLETE));
        tracing::info!("Installed {} in {:.2}s", mod_key, start.elapsed().as_secs_f32());
        Ok(())
    }

    pub(super) async fn uninstall_registered(
        &self,
        mod_key: &str,
        progress: &ProgressFn<'_>,
    ) -> Result<(), ModOpError> {
        let kit = self.kit()?;
        let game = self.game()?;
        tracing::info!("Uninstalling {}", mod_key);

        progress(ProgressUpdate::new(ProgressStep::Uninstalling, 0, messages::UNINSTALLING));

        let tracked = match self.artifact_store().and_then(|s| s.take(mod_key)) {
            Ok(record) => record,
            Err(e) => {
                tracing::warn!("Artifact store unavailable, falling back to heuristics: {}", e);
                None
            }
        };
        if let Some(record) = &tracked {
            let removed = remove_recorded(&kit, &game, record);
            tracing::info!("Removed {} of {} recorded artifacts for {}", removed, record.total(), mod_key);
        }

        let store = self.manifest_store(&kit);
        let doc = store.read().await;
        let index = doc.find_flexible(mod_key);
        let entry = index.map(|i| doc.entries[i].clone());

        if tracked.is_none() {
            let tokens = TokenSet::for_entry(entry.as_ref(), mod_key);
            let removed = heuristic_sweep(&kit, &game, &tokens);
            tracing::info!("Heuristic sweep removed {} items for {}", removed, mod_key);
        }

        let (Some(index), Some(entry)) = (index, entry) else {
            tracing::info!("{} has no manifest entry; nothing more to remove", mod_key);
            progress(ProgressUpdate::new(ProgressStep::Done, 100, messages::UNINSTALL_COMPLETE));
            return Ok(());
        };

        let mlibs_before = DirectorySnapshot::capture(&kit.mlibs(), Some(".dll"));
        let settings_before = DirectorySnapshot::capture(&kit.mod_settings(), None);

        let total = entry.files.len();
        for (i, file) in entry.files.iter().enumerate() {
            let target = resolve_declared_file(&kit, &game, file);
            remove_file_if_exists(&target);
            progress(ProgressUpdate::fraction(
                ProgressStep::Uninstalling,
                i + 1,
                total,
                messages::UNINSTALLING,
            ));
        }

        remove_related_libraries(&kit, &entry, mod_key, &mlibs_before);

        if let Some(folder) = entry.configurator().and_then(|c| kit.config_folder_from_hint(c)) {
            remove_path_if_exists(&folder);
        }

        remove_related_settings(&kit, &entry, mod_key, &settings_before);

        let mut updated = (*doc).clone();
        updated.remove(index);
        store.write(&updated).await?;
        tracing::info!("Removed {} from {}", mod_key, store.path());

        progress(ProgressUpdate::new(ProgressStep::Done, 100, messages::UNINSTALL_COMPLETE));
        Ok(())
    }
}

/// Remove exactly the names in an artifact record
fn remove_recorded(kit: &KitLayout, game: &GameLayout, record: &ArtifactRecord) -> usize {
    let groups: [(Utf8PathBuf, &[String]); 5] = [
        (kit.mlibs(), &record.created_dlls),
        (kit.mod_settings(), &record.created_settings),
        (kit.mod_configs(), &record.created_configs),
        (game.data(), &record.created_data_packages),
        (game.data_ep1(), &record.created_data_ep1_packages),
    ];

    groups
        .iter()
        .flat_map(|(dir, names)| names.iter().map(move |name| (dir, name)))
        .filter(|(dir, name)| {
            remove_in_dir_ignore_case(dir, name) || remove_path_if_exists(&dir.join(name))
        })
        .count()
}

/// Token-matched removal across library, settings, config and package folders
fn heuristic_sweep(kit: &KitLayout, game: &GameLayout, tokens: &TokenSet) -> usize {
    if tokens.is_empty() {
        return 0;
    }

    let sweep = |dir: &Utf8Path, extension: Option<&str>| -> usize {
        list_dir(dir)
            .into_iter()
            .filter(|name| extension.is_none_or(|ext| name.to_lowercase().ends_with(ext)))
            .filter(|name| tokens.matches(name))
            .filter(|name| {
                tracing::debug!("Heuristic match in {}: {}", dir, name);
                remove_path_if_exists(&dir.join(name))
            })
            .count()
    };

    sweep(&kit.mlibs(), Some(".dll"))
        + sweep(&kit.mod_settings(), None)
        + sweep(&kit.mod_configs(), None)
        + sweep(&game.data(), Some(".package"))
        + sweep(&game.data_ep1(), Some(".package"))
}

fn dll_names(dir: &Utf8Path) -> Vec<String> {
    list_dir(dir)
        .into_iter()
        .filter(|name| name.to_lowercase().ends_with(".dll"))
        .collect()
}

/// Library cleanup after the declared files are gone:
/// exact tokens of declared `.dll` names, then tokens containing an identity token,
/// then newly appeared libraries sharing two segments with an identity token
fn remove_related_libraries(
    kit: &KitLayout,
    entry: &ManifestEntry,
    mod_key: &str,
    before: &DirectorySnapshot,
) {
    let mlibs = kit.mlibs();

    let hinted: Vec<String> = entry
        .files
        .iter()
        .map(|f| f.file_name_lower())
        .filter(|name| name.ends_with(".dll"))
        .map(|name| normalize_dll_token(&name))
        .filter(|token| !token.is_empty())
        .collect();
    if !hinted.is_empty() {
        for dll in dll_names(&mlibs) {
            if hinted.contains(&normalize_dll_token(&dll)) {
                remove_file_if_exists(&mlibs.join(&dll));
            }
        }
    }

    let tokens = entry_tokens(Some(entry), mod_key);
    if tokens.is_empty() {
        return;
    }

    for dll in dll_names(&mlibs) {
        if token_contains_any(&dll, &tokens) {
            remove_file_if_exists(&mlibs.join(&dll));
        }
    }

    for dll in dll_names(&mlibs) {
        if !before.contains(&dll) && shares_two_segments(&dll, &tokens) {
            remove_file_if_exists(&mlibs.join(&dll));
        }
    }
}

/// Settings that appeared during uninstall, or else those matching an identity token
fn remove_related_settings(
    kit: &KitLayout,
    entry: &ManifestEntry,
    mod_key: &str,
    before: &DirectorySnapshot,
) {
    let settings = kit.mod_settings();
    let current = list_dir(&settings);
    let created: Vec<&String> = current.iter().filter(|n| !before.contains(n)).collect();

    let candidates: Vec<&String> = if created.is_empty() {
        let tokens = entry_tokens(Some(entry), mod_key);
        current
            .iter()
            .filter(|n| token_contains_any(n, &tokens))
            .collect()
    } else {
        created
    };

    for name in candidates {
        remove_path_if_exists(&settings.join(name));
    }
}
