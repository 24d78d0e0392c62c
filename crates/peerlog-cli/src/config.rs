//! peerlog CLI Configuration Management
//!
//! The CLI reads one TOML file layered over built-in defaults. The file is taken
//! from `--config` when given, otherwise from `<config dir>/peerlog/peerlog.toml`
//! if it exists. The `collector` table is the same `CollectorConfig` the collector
//! runtime consumes, so one file serves both.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use peerlog_core::{CollectorConfig, FilterCriteria, LinkRole, TimestampOrdering};

use crate::error::{CliError, Result};

/// Directory under the platform config dir holding the config file
const CONFIG_DIR_NAME: &str = "peerlog";
const CONFIG_FILE_NAME: &str = "peerlog.toml";

// ----------------------------------------------------------------------------
// CLI Application Configuration
// ----------------------------------------------------------------------------

/// Complete configuration for the peerlog CLI
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CliAppConfig {
    /// Collector configuration (store, link, initial filter, channels)
    pub collector: CollectorConfig,

    /// How records are printed
    pub display: DisplayConfig,
}

/// Text output options for `view`
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DisplayConfig {
    /// Print the device column
    pub show_device: bool,

    /// Print the source column
    pub show_source: bool,

    /// Truncate messages longer than this many characters
    pub max_message_chars: Option<usize>,
}

impl Default for DisplayConfig {
    fn default() -> Self {
        Self {
            show_device: true,
            show_source: true,
            max_message_chars: None,
        }
    }
}

impl CliAppConfig {
    /// Load the configuration the CLI should run with
    ///
    /// An explicit path must exist. The default path is optional; without it the
    /// built-in defaults are used.
    pub fn load(explicit: Option<&str>) -> Result<Self> {
        if let Some(path) = explicit {
            info!("Loading configuration from: {}", path);
            return Self::load_from_file(path);
        }

        match Self::default_config_path() {
            Ok(path) if path.is_file() => {
                info!("Loading configuration from: {}", path.display());
                Self::load_from_file(path)
            }
            Ok(path) => {
                debug!("No configuration at {}, using defaults", path.display());
                Ok(Self::default())
            }
            Err(e) => {
                debug!("{}, using defaults", e);
                Ok(Self::default())
            }
        }
    }

    /// Load configuration from a specific file path
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            CliError::Config(format!("Failed to read {}: {}", path.display(), e))
        })?;
        let config: CliAppConfig = toml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Get the default configuration file path
    pub fn default_config_path() -> Result<PathBuf> {
        dirs::config_dir()
            .map(|dir| dir.join(CONFIG_DIR_NAME).join(CONFIG_FILE_NAME))
            .ok_or_else(|| CliError::Config("No configuration directory on this platform".into()))
    }

    /// Save configuration to a specific file
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        if let Some(parent) = path.as_ref().parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path.as_ref(), self.to_toml()?)?;
        Ok(())
    }

    pub fn to_toml(&self) -> Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Validate the configuration for consistency and correctness
    pub fn validate(&self) -> Result<()> {
        self.collector.validate().map_err(CliError::Config)?;
        if self.display.max_message_chars == Some(0) {
            return Err(CliError::Config(
                "display.max_message_chars must be greater than 0".into(),
            ));
        }
        Ok(())
    }

    /// Create example configuration file content
    pub fn example_config() -> Result<String> {
        let mut collector = CollectorConfig::new()
            .with_role(LinkRole::Acceptor)
            .with_filter(FilterCriteria::hide_internal());
        collector.store.ordering = TimestampOrdering::Chronological;

        let example = CliAppConfig {
            collector,
            display: DisplayConfig {
                max_message_chars: Some(200),
                ..DisplayConfig::default()
            },
        };

        Ok(format!(
            "# peerlog configuration\n\
             # Every key is optional; missing keys take their default value.\n\n{}",
            example.to_toml()?
        ))
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
