use crate::models::ModOpsConfig;
use crate::services::paths;
use anyhow::{Context, Result};
use camino::{Utf8Path, Utf8PathBuf};
use config::{Config, Environment, File, FileFormat};
use std::fs;

pub const CONFIG_FILE_NAME: &str = "modops.yaml";

/// Prefix for environment overrides, e.g. `MODOPS_OPERATION_TIMEOUT_MS=30000`
pub const ENV_PREFIX: &str = "MODOPS";

/// Configuration manager for `modops.yaml`.
///
/// Values are layered: built-in defaults, then the YAML file (optional), then
/// `MODOPS_*` environment variables.
#[derive(Debug, Clone)]
pub struct ConfigManager {
    config_dir: Utf8PathBuf,
    config_path: Utf8PathBuf,
}

impl ConfigManager {
    /// Create a new ConfigManager with the specified configuration directory.
    ///
    /// # Arguments
    /// * `config_dir` - Directory holding `modops.yaml`; created if missing
    pub fn new<P: AsRef<Utf8Path>>(config_dir: P) -> Result<Self> {
        let config_dir = config_dir.as_ref().to_path_buf();

        if !config_dir.exists() {
            fs::create_dir_all(&config_dir)
                .with_context(|| format!("Failed to create config directory: {}", config_dir))?;
        }

        Ok(Self {
            config_path: config_dir.join(CONFIG_FILE_NAME),
            config_dir,
        })
    }

    /// ConfigManager for the per-user config directory
    pub fn default_location() -> Result<Self> {
        let dir = paths::default_config_dir().context("No per-user config directory available")?;
        Self::new(dir)
    }

    /// Load the configuration with overrides from the process environment.
    ///
    /// # Returns
    /// The layered ModOpsConfig; defaults when neither file nor variables exist
    pub fn load(&self) -> Result<ModOpsConfig> {
        self.load_layers(Environment::with_prefix(ENV_PREFIX))
    }

    /// Load the configuration with overrides taken from `vars` instead of the
    /// process environment
    pub fn load_with_env<I>(&self, vars: I) -> Result<ModOpsConfig>
    where
        I: IntoIterator<Item = (String, String)>,
    {
        let source = vars.into_iter().collect();
        self.load_layers(Environment::with_prefix(ENV_PREFIX).source(Some(source)))
    }

    fn load_layers(&self, environment: Environment) -> Result<ModOpsConfig> {
        if !self.config_path.exists() {
            tracing::debug!("Config file not found at {}, using defaults", self.config_path);
        }

        let config: ModOpsConfig = Config::builder()
            .add_source(File::new(self.config_path.as_str(), FileFormat::Yaml).required(false))
            .add_source(environment.try_parsing(true))
            .build()
            .with_context(|| format!("Failed to read config: {}", self.config_path))?
            .try_deserialize()
            .with_context(|| format!("Failed to parse config: {}", self.config_path))?;

        tracing::info!("Loaded config from {}", self.config_path);
        Ok(config)
    }

    /// Save the configuration file.
    ///
    /// # Arguments
    /// * `config` - The ModOpsConfig to save
    pub fn save(&self, config: &ModOpsConfig) -> Result<()> {
        let yaml_string =
            serde_yaml_ng::to_string(config).context("Failed to serialize config to YAML")?;

        fs::write(&self.config_path, yaml_string)
            .with_context(|| format!("Failed to write config: {}", self.config_path))?;

        tracing::info!("Saved config to {}", self.config_path);
        Ok(())
    }

    /// Write the default configuration unless a file already exists
    ///
    /// # Returns
    /// `true` when a new file was written
    pub fn save_default_if_missing(&self) -> Result<bool> {
        if self.config_path.exists() {
            return Ok(false);
        }
        self.save(&ModOpsConfig::default())?;
        Ok(true)
    }

    pub fn config_dir(&self) -> &Utf8Path {
        &self.config_dir
    }

    pub fn config_path(&self) -> &Utf8Path {
        &self.config_path
    }
}
