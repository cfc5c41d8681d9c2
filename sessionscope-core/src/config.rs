//! Configuration loading and management
//!
//! Configuration is loaded from `~/.config/sessionscope/config.toml`
//!
//! This module follows the XDG Base Directory Specification:
//! - Config: `$XDG_CONFIG_HOME/sessionscope/` (~/.config/sessionscope/)
//! - Data: `$XDG_DATA_HOME/sessionscope/` (~/.local/share/sessionscope/)
//! - State/Logs: `$XDG_STATE_HOME/sessionscope/` (~/.local/state/sessionscope/)

use crate::error::{Error, Result};
use crate::pricing::{ModelPricing, PricingTable};
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Returns a best-effort home directory path.
pub(crate) fn home_dir() -> PathBuf {
    std::env::var_os("HOME")
        .map(PathBuf::from)
        .or_else(dirs::home_dir)
        .unwrap_or_else(|| PathBuf::from("."))
}

/// Returns XDG_CONFIG_HOME or ~/.config
fn xdg_config_home() -> PathBuf {
    std::env::var("XDG_CONFIG_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| home_dir().join(".config"))
}

/// Returns XDG_DATA_HOME or ~/.local/share
fn xdg_data_home() -> PathBuf {
    std::env::var("XDG_DATA_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| home_dir().join(".local/share"))
}

/// Returns XDG_STATE_HOME or ~/.local/state
fn xdg_state_home() -> PathBuf {
    std::env::var("XDG_STATE_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| home_dir().join(".local/state"))
}

/// Expand a leading `~/` against the home directory.
fn expand_home(path: &Path) -> PathBuf {
    match path.strip_prefix("~") {
        Ok(rest) => home_dir().join(rest),
        Err(_) => path.to_path_buf(),
    }
}

/// Main configuration struct
#[derive(Debug, Deserialize, Default)]
pub struct Config {
    /// Source and output path overrides
    #[serde(default)]
    pub paths: PathsConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,

    /// Custom pricing entries
    #[serde(default)]
    pub pricing: PricingConfig,
}

/// Path overrides
#[derive(Debug, Deserialize, Default)]
pub struct PathsConfig {
    /// Assistant data root (default `~/.claude`)
    pub claude_root: Option<PathBuf>,
    /// Directory reports are written to
    pub output_dir: Option<PathBuf>,
    /// Template used to render the markdown report
    pub template: Option<PathBuf>,
}

/// Logging configuration
#[derive(Debug, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Maximum number of log files to keep
    #[serde(default = "default_max_log_files")]
    pub max_files: usize,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            max_files: default_max_log_files(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_max_log_files() -> usize {
    5
}

/// User-supplied pricing, consulted before the built-in table.
#[derive(Debug, Deserialize, Default)]
pub struct PricingConfig {
    /// Extra model entries, matched in the order given
    #[serde(default)]
    pub models: Vec<PricingEntry>,

    /// Replacement for the default tier
    pub default: Option<ModelPricing>,
}

/// One `[[pricing.models]]` entry
#[derive(Debug, Deserialize, Clone)]
pub struct PricingEntry {
    /// Substring matched against the model name
    pub pattern: String,
    #[serde(flatten)]
    pub pricing: ModelPricing,
}

impl PricingConfig {
    /// Build the pricing table: configured entries first, then built-ins.
    pub fn table(&self) -> PricingTable {
        let mut table = PricingTable::builtin();
        for entry in self.models.iter().rev() {
            table.prepend(&entry.pattern, entry.pricing);
        }
        if let Some(default) = self.default {
            table.set_default(default);
        }
        table
    }

    /// Reject entries that can never match or carry negative prices
    pub fn validate(&self) -> Result<()> {
        for entry in &self.models {
            if entry.pattern.trim().is_empty() {
                return Err(Error::Config(
                    "pricing.models entries need a non-empty pattern".to_string(),
                ));
            }
            if !entry.pricing.is_valid() {
                return Err(Error::Config(format!(
                    "pricing for '{}' must not be negative",
                    entry.pattern
                )));
            }
        }
        if let Some(default) = self.default {
            if !default.is_valid() {
                return Err(Error::Config(
                    "pricing.default must not be negative".to_string(),
                ));
            }
        }
        Ok(())
    }
}

impl Config {
    /// Load configuration from the default path
    pub fn load() -> Result<Self> {
        let config_path = Self::config_path();

        if !config_path.exists() {
            tracing::info!("No config file found at {:?}, using defaults", config_path);
            return Ok(Config::default());
        }

        Self::load_from(&config_path)
    }

    /// Load configuration from a specific path
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("failed to read config file {:?}: {}", path, e)))?;

        let config: Config = toml::from_str(&content)
            .map_err(|e| Error::Config(format!("failed to parse config: {}", e)))?;

        config.pricing.validate()?;

        Ok(config)
    }

    /// Returns the default config file path
    ///
    /// `$XDG_CONFIG_HOME/sessionscope/config.toml` (~/.config/sessionscope/config.toml)
    pub fn config_path() -> PathBuf {
        Self::config_dir().join("config.toml")
    }

    /// Returns the config directory path
    pub fn config_dir() -> PathBuf {
        xdg_config_home().join("sessionscope")
    }

    /// Returns the data directory path
    ///
    /// `$XDG_DATA_HOME/sessionscope/` (~/.local/share/sessionscope/)
    pub fn data_dir() -> PathBuf {
        xdg_data_home().join("sessionscope")
    }

    /// Returns the state directory path (for logs)
    ///
    /// `$XDG_STATE_HOME/sessionscope/` (~/.local/state/sessionscope/)
    pub fn state_dir() -> PathBuf {
        xdg_state_home().join("sessionscope")
    }

    /// Returns the log file path
    pub fn log_path() -> PathBuf {
        Self::state_dir().join("sessionscope.log")
    }

    /// Template looked up when none is configured or passed explicitly
    ///
    /// `$XDG_CONFIG_HOME/sessionscope/templates/session-report.md`
    pub fn default_template_path() -> PathBuf {
        Self::config_dir()
            .join("templates")
            .join("session-report.md")
    }

    /// Assistant data root, `~/.claude` unless overridden
    pub fn claude_root(&self) -> PathBuf {
        self.paths
            .claude_root
            .as_deref()
            .map(expand_home)
            .unwrap_or_else(|| home_dir().join(".claude"))
    }

    /// Report output directory
    ///
    /// `$XDG_DATA_HOME/sessionscope/reports` unless overridden
    pub fn output_dir(&self) -> PathBuf {
        self.paths
            .output_dir
            .as_deref()
            .map(expand_home)
            .unwrap_or_else(|| Self::data_dir().join("reports"))
    }

    /// Configured template path, if any
    pub fn template_path(&self) -> Option<PathBuf> {
        self.paths.template.as_deref().map(expand_home)
    }
}
