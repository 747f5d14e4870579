//! Configuration file discovery from multiple locations

use std::path::{Path, PathBuf};

/// Project-local file name, meant to stay out of version control
pub const LOCAL_CONFIG_NAME: &str = ".twinsync.local.toml";

/// Project file name
pub const PROJECT_CONFIG_NAME: &str = ".twinsync.toml";

/// Configuration file locations in order of precedence
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ConfigFiles {
    /// Config from CLI flag (highest precedence)
    pub cli: Option<PathBuf>,
    /// Project-local config (`.twinsync.local.toml`)
    pub local: Option<PathBuf>,
    /// Project config (`.twinsync.toml`)
    pub project: Option<PathBuf>,
    /// Global config in the user's config directory
    pub global: Option<PathBuf>,
}

impl ConfigFiles {
    /// Discovered files, lowest precedence first
    #[must_use]
    pub fn in_merge_order(&self) -> Vec<&Path> {
        [&self.global, &self.project, &self.local, &self.cli]
            .into_iter()
            .filter_map(|p| p.as_deref())
            .collect()
    }
}

/// Config file discovery
pub struct ConfigDiscovery;

impl ConfigDiscovery {
    /// Create a new config discovery instance
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    /// Discover all available configuration files, searching from the
    /// current directory
    pub fn discover(cli_path: Option<&Path>) -> ConfigFiles {
        let start = std::env::current_dir().ok();
        Self::discover_from(cli_path, start.as_deref())
    }

    /// Discover configuration files, searching upwards from `start`
    pub fn discover_from(cli_path: Option<&Path>, start: Option<&Path>) -> ConfigFiles {
        let cli = cli_path.filter(|p| p.is_file()).map(Path::to_path_buf);

        let local = start.and_then(|dir| Self::find_file(dir, LOCAL_CONFIG_NAME));
        let project = start.and_then(|dir| Self::find_file(dir, PROJECT_CONFIG_NAME));
        let global = Self::find_global_config();

        ConfigFiles {
            cli,
            local,
            project,
            global,
        }
    }

    /// Find a config file in `start` or its parent directories
    fn find_file(start: &Path, name: &str) -> Option<PathBuf> {
        start
            .ancestors()
            .map(|dir| dir.join(name))
            .find(|candidate| candidate.is_file())
    }

    /// Find the global config in the platform config directory
    fn find_global_config() -> Option<PathBuf> {
        let global_config = dirs::config_dir()?.join("twinsync").join("config.toml");
        global_config.is_file().then_some(global_config)
    }
}

impl Default for ConfigDiscovery {
    fn default() -> Self {
        Self::new()
    }
}
