use crate::models::WorkbenchConfig;
use anyhow::{Context, Result};
use camino::{Utf8Path, Utf8PathBuf};
use config::{Config, Environment, File, FileFormat};
use std::fs;

/// Settings file name inside the data directory
pub const SETTINGS_FILE: &str = "Scanbench Settings.yaml";

/// Prefix for environment overrides, e.g. `SCANBENCH_SCANNING__POLL_INTERVAL_MS=20`
pub const ENV_PREFIX: &str = "SCANBENCH";

/// Configuration manager for loading and saving the workbench settings.
///
/// Settings come from `Scanbench Settings.yaml` in the data directory,
/// overridden by `SCANBENCH_<SECTION>__<KEY>` environment variables.
/// A missing file is not an error; every value has a default.
#[derive(Debug, Clone)]
pub struct ConfigManager {
    config_dir: Utf8PathBuf,
    settings_path: Utf8PathBuf,
}

impl ConfigManager {
    /// Create a new ConfigManager with the specified configuration directory.
    ///
    /// # Arguments
    /// * `config_dir` - Directory containing the settings file (e.g., "Scanbench Data")
    pub fn new<P: AsRef<Utf8Path>>(config_dir: P) -> Result<Self> {
        let config_dir = config_dir.as_ref().to_path_buf();

        // Create config directory if it doesn't exist
        if !config_dir.exists() {
            fs::create_dir_all(&config_dir)
                .with_context(|| format!("Failed to create config directory: {}", config_dir))?;
        }

        Ok(Self {
            settings_path: config_dir.join(SETTINGS_FILE),
            config_dir,
        })
    }

    /// Load the workbench configuration.
    ///
    /// # Returns
    /// The file merged with environment overrides, or defaults if neither is present
    pub fn load_config(&self) -> Result<WorkbenchConfig> {
        if self.settings_path.exists() {
            tracing::info!("Loading settings from {}", self.settings_path);
        } else {
            tracing::warn!(
                "Settings file not found at {}, using defaults",
                self.settings_path
            );
        }

        let config: WorkbenchConfig = Config::builder()
            .add_source(File::new(self.settings_path.as_str(), FileFormat::Yaml).required(false))
            .add_source(
                Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .with_context(|| format!("Failed to read settings: {}", self.settings_path))?
            .try_deserialize()
            .with_context(|| format!("Failed to parse settings: {}", self.settings_path))?;

        tracing::debug!(
            "Settings: poll every {}ms, {} steps simulated",
            config.scanning.poll_interval_ms,
            config.simulation.steps
        );
        Ok(config)
    }

    /// Save the workbench configuration.
    ///
    /// # Arguments
    /// * `config` - The WorkbenchConfig to save
    pub fn save_config(&self, config: &WorkbenchConfig) -> Result<()> {
        let yaml_string =
            serde_yaml_ng::to_string(config).context("Failed to serialize settings to YAML")?;

        fs::write(&self.settings_path, yaml_string)
            .with_context(|| format!("Failed to write settings: {}", self.settings_path))?;

        tracing::info!("Saved settings to {}", self.settings_path);
        Ok(())
    }

    /// Get the configuration directory path.
    pub fn config_dir(&self) -> &Utf8Path {
        &self.config_dir
    }

    /// Get the settings file path.
    pub fn settings_path(&self) -> &Utf8Path {
        &self.settings_path
    }
}
