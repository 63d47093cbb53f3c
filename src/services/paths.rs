//! Filesystem layout of the ModAPI tooling folder and the game installation.

use crate::models::{LegacyModSpec, LegacyRoot, ManifestFile, ModOpError, ModOpsConfig};
use camino::{Utf8Path, Utf8PathBuf};
use directories::{BaseDirs, ProjectDirs};
use std::fs;

/// Folder under the roaming config dir where the launcher keeps `path.info`
pub const LAUNCHER_DIR: &str = "Spore ModAPI Launcher";
pub const PATH_INFO_FILE: &str = "path.info";
pub const INSTALLER_EXE: &str = "Spore ModAPI Easy Installer.exe";
pub const MANIFEST_FILE: &str = "InstalledMods.config";
pub const ARTIFACT_STORE_FILE: &str = "modapi-artifacts.json";

const EP1_DIR: &str = "DataEP1";
const DATA_DIR: &str = "Data";

/// Join a possibly backslash-separated relative path onto a base
fn join_relative(base: &Utf8Path, rel: &str) -> Utf8PathBuf {
    let mut out = base.to_path_buf();
    for part in rel.split(['\\', '/']).filter(|p| !p.is_empty() && *p != ".") {
        out.push(part);
    }
    out
}

/// Per-user config dir of this crate (`modops.yaml`, logs)
pub fn default_config_dir() -> Option<Utf8PathBuf> {
    ProjectDirs::from("", "", "modops")
        .and_then(|dirs| Utf8PathBuf::try_from(dirs.config_dir().to_path_buf()).ok())
}

/// Per-user data dir of this crate (artifact store)
pub fn default_data_dir() -> Option<Utf8PathBuf> {
    ProjectDirs::from("", "", "modops")
        .and_then(|dirs| Utf8PathBuf::try_from(dirs.data_dir().to_path_buf()).ok())
}

/// `path.info` location: `<roaming config dir>/Spore ModAPI Launcher/path.info`
pub fn default_path_info() -> Option<Utf8PathBuf> {
    BaseDirs::new()
        .and_then(|dirs| Utf8PathBuf::try_from(dirs.config_dir().to_path_buf()).ok())
        .map(|dir| dir.join(LAUNCHER_DIR).join(PATH_INFO_FILE))
}

/// Read the tooling base folder from a launcher `path.info` file
pub fn read_path_info(path: &Utf8Path) -> Result<Utf8PathBuf, ModOpError> {
    if !path.exists() {
        return Err(ModOpError::ToolingNotConfigured(format!(
            "path.info not found at {}",
            path
        )));
    }

    let raw = fs::read_to_string(path)
        .map_err(|e| ModOpError::Io(format!("Failed to read {}: {}", path, e)))?;
    let base = raw.trim().trim_matches('"').trim();
    if base.is_empty() {
        return Err(ModOpError::ToolingNotConfigured(format!(
            "path.info is empty: {}",
            path
        )));
    }

    tracing::debug!("Tooling base from {}: {}", path, base);
    Ok(Utf8PathBuf::from(base))
}

/// Layout of the ModAPI tooling folder
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KitLayout {
    base: Utf8PathBuf,
}

impl KitLayout {
    pub fn new<P: Into<Utf8PathBuf>>(base: P) -> Self {
        Self { base: base.into() }
    }

    /// Resolve from `kit_dir`, else from the launcher's `path.info`
    pub fn resolve(config: &ModOpsConfig) -> Result<Self, ModOpError> {
        if let Some(dir) = config.kit_dir.as_deref().filter(|d| !d.trim().is_empty()) {
            return Ok(Self::new(dir.trim()));
        }

        let path_info = default_path_info().ok_or_else(|| {
            ModOpError::ToolingNotConfigured("no roaming config directory".to_string())
        })?;
        read_path_info(&path_info).map(Self::new)
    }

    pub fn base(&self) -> &Utf8Path {
        &self.base
    }

    /// Library folder holding `.dll` files
    pub fn mlibs(&self) -> Utf8PathBuf {
        self.base.join("mLibs")
    }

    pub fn mod_settings(&self) -> Utf8PathBuf {
        self.base.join("ModSettings")
    }

    pub fn mod_configs(&self) -> Utf8PathBuf {
        self.base.join("ModConfigs")
    }

    pub fn manifest_path(&self) -> Utf8PathBuf {
        self.base.join(MANIFEST_FILE)
    }

    pub fn installer_exe(&self) -> Utf8PathBuf {
        self.base.join(INSTALLER_EXE)
    }

    /// Installer executable, failing when it is not present
    pub fn require_installer(&self) -> Result<Utf8PathBuf, ModOpError> {
        let exe = self.installer_exe();
        if exe.is_file() {
            Ok(exe)
        } else {
            Err(ModOpError::ToolingNotConfigured(format!("{} not found at {}", INSTALLER_EXE, exe)))
        }
    }

    /// `ModConfigs/<folder>` named by a configurator hint such as
    /// `ModConfigs\Foo\config.xml`
    pub fn config_folder_from_hint(&self, configurator: &str) -> Option<Utf8PathBuf> {
        let parts: Vec<&str> = configurator.split(['\\', '/']).collect();
        let idx = parts
            .iter()
            .position(|p| p.eq_ignore_ascii_case("modconfigs"))?;
        let folder = parts.get(idx + 1).filter(|f| !f.trim().is_empty())?;
        Some(self.mod_configs().join(folder))
    }
}

/// Layout of the game installation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GameLayout {
    data_dir: Utf8PathBuf,
}

impl GameLayout {
    /// `data_dir` is the path recorded by the game's installer, often ending in `DataEP1`
    pub fn new<P: Into<Utf8PathBuf>>(data_dir: P) -> Self {
        Self {
            data_dir: data_dir.into(),
        }
    }

    pub fn from_config(config: &ModOpsConfig) -> Result<Self, ModOpError> {
        config
            .game_data_dir
            .as_deref()
            .map(str::trim)
            .filter(|d| !d.is_empty())
            .map(Self::new)
            .ok_or(ModOpError::InstallationPathNotFound)
    }

    pub fn data_dir(&self) -> &Utf8Path {
        &self.data_dir
    }

    /// The data dir with a trailing `DataEP1` removed
    pub fn install_root(&self) -> Utf8PathBuf {
        let raw = self.data_dir.as_str();
        let trimmed = raw.trim_end_matches(['\\', '/']);
        let cut = trimmed.len().saturating_sub(EP1_DIR.len());
        match trimmed.get(cut..) {
            Some(tail) if tail.eq_ignore_ascii_case(EP1_DIR) => {
                let root = &trimmed[..cut];
                if root.is_empty() {
                    Utf8PathBuf::from(".")
                } else {
                    Utf8PathBuf::from(root)
                }
            }
            _ => self.data_dir.clone(),
        }
    }

    /// Base game package folder
    pub fn data(&self) -> Utf8PathBuf {
        self.install_root().join(DATA_DIR)
    }

    /// Expansion package folder
    pub fn data_ep1(&self) -> Utf8PathBuf {
        self.install_root().join(EP1_DIR)
    }

    /// Folder a legacy mod's files are written to
    pub fn legacy_target_dir(&self, spec: &LegacyModSpec) -> Utf8PathBuf {
        let root = match spec.root {
            LegacyRoot::DataDir => self.data_dir.clone(),
            LegacyRoot::InstallRoot => self.install_root(),
        };
        join_relative(&root, &spec.dest_subfolder)
    }
}

/// Absolute location of a file declared in a manifest entry.
///
/// Tagged files go under `DataEP1` (`GalacticAdventures`/`ga`) or `Data`; untagged
/// paths with a directory resolve under the tooling base, bare `.dll` names under
/// `mLibs`, anything else under the tooling base.
pub fn resolve_declared_file(kit: &KitLayout, game: &GameLayout, file: &ManifestFile) -> Utf8PathBuf {
    let rel = file.path.trim().trim_start_matches('\\');

    match file.game().map(str::to_lowercase) {
        Some(tag) if tag == "galacticadventures" || tag == "ga" => {
            join_relative(&game.data_ep1(), rel)
        }
        Some(_) => join_relative(&game.data(), rel),
        None => {
            if rel.contains(['\\', '/']) {
                join_relative(kit.base(), rel)
            } else if rel.to_lowercase().ends_with(".dll") {
                join_relative(&kit.mlibs(), rel)
            } else {
                join_relative(kit.base(), rel)
            }
        }
    }
}

/// Artifact store location: `data_dir` from config, else the per-user data dir
pub fn artifact_store_path(config: &ModOpsConfig) -> Result<Utf8PathBuf, ModOpError> {
    config
        .data_dir
        .as_deref()
        .filter(|d| !d.trim().is_empty())
        .map(|d| Utf8PathBuf::from(d.trim()))
        .or_else(default_data_dir)
        .map(|dir| dir.join(ARTIFACT_STORE_FILE))
        .ok_or_else(|| ModOpError::Io("No per-user data directory available".to_string()))
}
