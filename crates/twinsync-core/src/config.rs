//! Configuration file parsing and merging
//!
//! This module handles:
//! - Config file discovery from multiple locations
//! - TOML parsing with serde
//! - Config merging with precedence rules
//! - Validation and conversion into engine settings

mod discovery;
mod merge;
mod types;
mod validation;

pub use discovery::{ConfigDiscovery, ConfigFiles, LOCAL_CONFIG_NAME, PROJECT_CONFIG_NAME};
pub use merge::ConfigMerger;
pub use types::{
    Config, CustomDirections, DeletionKind, DirectionChoice, FilterSettings, OnError, PairSettings, SyncSettings,
    SyncVariant, WarningSettings,
};
pub use validation::ConfigValidator;

use std::path::Path;

/// Configuration manager that coordinates discovery, parsing, merging, and validation
pub struct ConfigManager;

impl ConfigManager {
    /// Load and merge configuration from all sources
    ///
    /// # Errors
    ///
    /// Returns an error if an explicitly given file does not exist, or if
    /// config files are invalid or cannot be read.
    pub fn load(cli_config_path: Option<&Path>) -> anyhow::Result<Config> {
        if let Some(path) = cli_config_path
            && !path.is_file()
        {
            anyhow::bail!("Config file not found: {}", path.display());
        }

        let config_files = ConfigDiscovery::discover(cli_config_path);
        let merged = ConfigMerger::merge(&config_files)?;
        ConfigValidator::validate(&merged)?;

        Ok(merged)
    }

    /// Load only the given file, skipping discovery
    ///
    /// # Errors
    ///
    /// Same as [`ConfigManager::load`].
    pub fn load_file(path: &Path) -> anyhow::Result<Config> {
        let files = ConfigFiles {
            cli: Some(path.to_path_buf()),
            ..ConfigFiles::default()
        };
        let merged = ConfigMerger::merge(&files)?;
        ConfigValidator::validate(&merged)?;
        Ok(merged)
    }
}
