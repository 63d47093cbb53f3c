//! Directory snapshots and the per-mod artifact store.
//!
//! The external installer never reports what it wrote, so an install snapshots the
//! tooling and game package folders before running it and diffs them afterwards.
//! Whatever appeared is recorded per mod key in `modapi-artifacts.json`, and a later
//! uninstall removes exactly those names.

use crate::models::operation::unix_millis;
use crate::models::{ArtifactRecord, ArtifactStoreDocument, ModOpError};
use crate::services::paths::{GameLayout, KitLayout};
use crate::services::removal::list_dir;
use anyhow::{Context, Result};
use camino::{Utf8Path, Utf8PathBuf};
use std::collections::BTreeSet;
use std::fs;

/// Lowercased entry names of one directory at one instant
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DirectorySnapshot {
    names: BTreeSet<String>,
}

impl DirectorySnapshot {
    /// Capture all entries, or only those ending in `extension` (e.g. `".dll"`)
    pub fn capture(dir: &Utf8Path, extension: Option<&str>) -> Self {
        let names = list_dir(dir)
            .into_iter()
            .map(|name| name.to_lowercase())
            .filter(|name| extension.is_none_or(|ext| name.ends_with(ext)))
            .collect();
        Self { names }
    }

    pub fn contains(&self, name: &str) -> bool {
        self.names.contains(&name.to_lowercase())
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.names.iter().map(String::as_str)
    }

    /// Names present now that were absent in `before`
    pub fn created_since(&self, before: &DirectorySnapshot) -> Vec<String> {
        self.names.difference(&before.names).cloned().collect()
    }
}

/// Tooling folders an install may write to
#[derive(Debug, Clone, Default)]
pub struct ArtifactSnapshot {
    pub mlibs: DirectorySnapshot,
    pub settings: DirectorySnapshot,
    pub configs: DirectorySnapshot,
}

impl ArtifactSnapshot {
    pub fn capture(kit: &KitLayout) -> Self {
        Self {
            mlibs: DirectorySnapshot::capture(&kit.mlibs(), Some(".dll")),
            settings: DirectorySnapshot::capture(&kit.mod_settings(), None),
            configs: DirectorySnapshot::capture(&kit.mod_configs(), None),
        }
    }
}

/// `.package` files in the game's `Data` and `DataEP1` folders
#[derive(Debug, Clone, Default)]
pub struct PackageSnapshot {
    pub data: DirectorySnapshot,
    pub data_ep1: DirectorySnapshot,
}

impl PackageSnapshot {
    pub fn capture(game: &GameLayout) -> Self {
        Self {
            data: DirectorySnapshot::capture(&game.data(), Some(".package")),
            data_ep1: DirectorySnapshot::capture(&game.data_ep1(), Some(".package")),
        }
    }
}

/// Build the record of everything that appeared between two pairs of snapshots
pub fn diff_artifacts(
    before: &ArtifactSnapshot,
    after: &ArtifactSnapshot,
    packages_before: Option<&PackageSnapshot>,
    packages_after: Option<&PackageSnapshot>,
) -> ArtifactRecord {
    let (created_data_packages, created_data_ep1_packages) = match (packages_before, packages_after) {
        (Some(b), Some(a)) => (a.data.created_since(&b.data), a.data_ep1.created_since(&b.data_ep1)),
        _ => (Vec::new(), Vec::new()),
    };

    ArtifactRecord {
        created_dlls: after.mlibs.created_since(&before.mlibs),
        created_settings: after.settings.created_since(&before.settings),
        created_configs: after.configs.created_since(&before.configs),
        created_data_packages,
        created_data_ep1_packages,
        updated_at: unix_millis(),
    }
}

/// JSON-backed store of artifact records keyed by mod key
#[derive(Debug, Clone)]
pub struct ArtifactStore {
    path: Utf8PathBuf,
}

impl ArtifactStore {
    pub fn new<P: Into<Utf8PathBuf>>(path: P) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Utf8Path {
        &self.path
    }

    /// Read the store; missing or corrupt files read as empty
    pub fn load(&self) -> ArtifactStoreDocument {
        let text = match fs::read_to_string(&self.path) {
            Ok(text) => text,
            Err(e) => {
                if e.kind() != std::io::ErrorKind::NotFound {
                    tracing::warn!("Failed to read artifact store {}: {}", self.path, e);
                }
                return ArtifactStoreDocument::default();
            }
        };

        serde_json::from_str(&text).unwrap_or_else(|e| {
            tracing::warn!("Ignoring corrupt artifact store {}: {}", self.path, e);
            ArtifactStoreDocument::default()
        })
    }

    fn save(&self, doc: &ArtifactStoreDocument) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create directory: {}", parent))?;
        }
        let json = serde_json::to_string_pretty(doc).context("Failed to serialize artifact store")?;
        fs::write(&self.path, json)
            .with_context(|| format!("Failed to write artifact store: {}", self.path))?;
        Ok(())
    }

    pub fn get(&self, mod_key: &str) -> Option<ArtifactRecord> {
        self.load().mods.get(mod_key).cloned()
    }

    /// Store a record, replacing any previous one for the key
    pub fn put(&self, mod_key: &str, record: ArtifactRecord) -> Result<(), ModOpError> {
        let mut doc = self.load();
        doc.mods.insert(mod_key.to_string(), record);
        self.save(&doc)?;
        tracing::debug!("Recorded artifacts for {} in {}", mod_key, self.path);
        Ok(())
    }

    /// Remove and return a record
    pub fn take(&self, mod_key: &str) -> Result<Option<ArtifactRecord>, ModOpError> {
        let mut doc = self.load();
        let record = doc.mods.shift_remove(mod_key);
        if record.is_some() {
            self.save(&doc)?;
        }
        Ok(record)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn utf8_dir(temp: &TempDir) -> Utf8PathBuf {
        Utf8PathBuf::try_from(temp.path().to_path_buf()).unwrap()
    }

    #[test]
    fn test_snapshot_filters_and_lowercases() {
        let temp = TempDir::new().unwrap();
        let dir = utf8_dir(&temp);
        fs::write(dir.join("Clouds.DLL"), b"").unwrap();
        fs::write(dir.join("readme.txt"), b"").unwrap();

        let dlls = DirectorySnapshot::capture(&dir, Some(".dll"));
        assert_eq!(dlls.iter().collect::<Vec<_>>(), vec!["clouds.dll"]);
        assert!(dlls.contains("CLOUDS.dll"));
        assert_eq!(DirectorySnapshot::capture(&dir, None).len(), 2);
    }

    #[test]
    fn test_diff_reports_only_new_names() {
        let temp = TempDir::new().unwrap();
        let kit = KitLayout::new(utf8_dir(&temp));
        fs::create_dir_all(kit.mlibs()).unwrap();
        fs::create_dir_all(kit.mod_configs()).unwrap();
        fs::write(kit.mlibs().join("Existing.dll"), b"").unwrap();

        let before = ArtifactSnapshot::capture(&kit);
        fs::write(kit.mlibs().join("Clouds.dll"), b"").unwrap();
        fs::create_dir_all(kit.mod_configs().join("Clouds")).unwrap();
        let after = ArtifactSnapshot::capture(&kit);

        let record = diff_artifacts(&before, &after, None, None);
        assert_eq!(record.created_dlls, vec!["clouds.dll"]);
        assert_eq!(record.created_configs, vec!["clouds"]);
        assert!(record.created_settings.is_empty());
        assert!(record.created_data_packages.is_empty());
    }

    #[test]
    fn test_store_put_get_take() {
        let temp = TempDir::new().unwrap();
        let store = ArtifactStore::new(utf8_dir(&temp).join("nested/modapi-artifacts.json"));
        assert!(store.get("clouds").is_none());

        let record = ArtifactRecord {
            created_dlls: vec!["clouds.dll".to_string()],
            ..ArtifactRecord::default()
        };
        store.put("clouds", record.clone()).unwrap();
        assert_eq!(store.get("clouds"), Some(record.clone()));

        assert_eq!(store.take("clouds").unwrap(), Some(record));
        assert!(store.get("clouds").is_none());
        assert_eq!(store.take("clouds").unwrap(), None);
    }

    #[test]
    fn test_corrupt_store_reads_empty() {
        let temp = TempDir::new().unwrap();
        let path = utf8_dir(&temp).join("modapi-artifacts.json");
        fs::write(&path, "{not json").unwrap();
        assert!(ArtifactStore::new(path).load().mods.is_empty());
    }
}
