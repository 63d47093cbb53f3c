use super::error::ModOpError;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Settings from modops.yaml, overridable through `MODOPS_*` environment variables
///
/// Contains directory overrides, timeouts, cache tuning and the legacy patch catalog.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModOpsConfig {
    /// Game data directory as recorded by the game's installer (may end in `DataEP1`).
    pub game_data_dir: Option<String>,

    /// ModAPI tooling folder. Falls back to the launcher's `path.info` when unset.
    pub kit_dir: Option<String>,

    /// Where the artifact store lives. Falls back to the per-user data dir.
    pub data_dir: Option<String>,

    /// Scratch directory for downloads. Falls back to the OS temp dir.
    pub temp_dir: Option<String>,

    pub operation_timeout_ms: u64,
    pub worker_timeout_ms: u64,
    pub emit_throttle_ms: u64,
    pub manifest_cache_ttl_ms: u64,
    pub manifest_cache_log_every: u64,
    pub settle_delay_ms: u64,

    pub debug_mode: bool,
    pub forward_worker_logs: bool,

    pub legacy_mods: IndexMap<String, LegacyModSpec>,
}

impl Default for ModOpsConfig {
    fn default() -> Self {
        Self {
            game_data_dir: None,
            kit_dir: None,
            data_dir: None,
            temp_dir: None,
            operation_timeout_ms: 10 * 60 * 1000,
            worker_timeout_ms: 15 * 60 * 1000,
            emit_throttle_ms: 100,
            manifest_cache_ttl_ms: 750,
            manifest_cache_log_every: 0,
            settle_delay_ms: 350,
            debug_mode: false,
            forward_worker_logs: false,
            legacy_mods: default_legacy_mods(),
        }
    }
}

impl ModOpsConfig {
    pub fn operation_timeout(&self) -> Duration {
        Duration::from_millis(self.operation_timeout_ms)
    }

    pub fn worker_timeout(&self) -> Duration {
        Duration::from_millis(self.worker_timeout_ms)
    }

    pub fn emit_throttle(&self) -> Duration {
        Duration::from_millis(self.emit_throttle_ms)
    }

    pub fn manifest_cache_ttl(&self) -> Duration {
        Duration::from_millis(self.manifest_cache_ttl_ms)
    }

    pub fn settle_delay(&self) -> Duration {
        Duration::from_millis(self.settle_delay_ms)
    }

    /// Look up a legacy direct-file mod by key
    pub fn legacy_mod(&self, mod_key: &str) -> Option<&LegacyModSpec> {
        self.legacy_mods.get(mod_key)
    }

    /// Pick the install strategy for `mod_key`
    ///
    /// `Ok(None)` means a registered mod. Shipped legacy keys always take the legacy
    /// path, so a catalog that drops one is an error rather than a registered install.
    pub fn resolve_legacy(&self, mod_key: &str) -> Result<Option<&LegacyModSpec>, ModOpError> {
        match self.legacy_mod(mod_key) {
            Some(spec) => Ok(Some(spec)),
            None if BUILTIN_LEGACY_KEYS.contains(&mod_key) => {
                Err(ModOpError::UnknownLegacyMod(mod_key.to_string()))
            }
            None => Ok(None),
        }
    }
}

/// Legacy keys the shipped catalog defines
pub const BUILTIN_LEGACY_KEYS: [&str; 2] = ["60fps", "4gbpatch"];

/// Which directory a legacy mod's subfolder hangs off
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LegacyRoot {
    /// The data directory exactly as configured
    DataDir,
    /// The data directory with a trailing `DataEP1` stripped
    InstallRoot,
}

/// A patch-style mod installed by overwriting named game files
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LegacyModSpec {
    pub files: Vec<String>,
    pub dest_subfolder: String,
    #[serde(default = "default_legacy_root")]
    pub root: LegacyRoot,
    #[serde(default)]
    pub download_url: String,
    #[serde(default = "default_requires_backup")]
    pub requires_backup: bool,
}

fn default_legacy_root() -> LegacyRoot {
    LegacyRoot::DataDir
}

fn default_requires_backup() -> bool {
    true
}

/// The shipped legacy catalog
pub fn default_legacy_mods() -> IndexMap<String, LegacyModSpec> {
    let mut mods = IndexMap::new();
    mods.insert(
        "60fps".to_string(),
        LegacyModSpec {
            files: vec!["ConfigManager.txt".to_string(), "Properties.txt".to_string()],
            dest_subfolder: "Config".to_string(),
            root: LegacyRoot::DataDir,
            download_url: "https://pub-f564be9e0d7346339919d7f640464d71.r2.dev/60FPSPatch.zip"
                .to_string(),
            requires_backup: true,
        },
    );
    mods.insert(
        "4gbpatch".to_string(),
        LegacyModSpec {
            files: vec!["SporeApp.exe".to_string()],
            dest_subfolder: "SporebinEP1".to_string(),
            root: LegacyRoot::InstallRoot,
            download_url: "https://pub-f564be9e0d7346339919d7f640464d71.r2.dev/4GBPatch.zip"
                .to_string(),
            requires_backup: true,
        },
    );
    mods
}
