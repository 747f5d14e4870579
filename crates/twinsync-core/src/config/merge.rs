//! Configuration merging with precedence rules
//!
//! # Merging Semantics
//!
//! - **Lists** (`pairs`, filter `include`/`exclude`): additive, all values
//!   from all files are combined
//! - **Scalars**: every scalar is optional; a file of higher precedence that
//!   sets it overrides the lower ones, an unset value keeps what was there
//! - **`[sync.custom]`**: replaced as a whole

use std::fs;
use std::path::Path;

use anyhow::Context;

use super::discovery::ConfigFiles;
use super::types::{Config, FilterSettings, WarningSettings};

/// Configuration merger
pub struct ConfigMerger;

impl ConfigMerger {
    /// Create a new config merger
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    /// Merge multiple config files with precedence rules
    ///
    /// Precedence order (highest to lowest):
    /// 1. CLI config
    /// 2. `.twinsync.local.toml`
    /// 3. `.twinsync.toml`
    /// 4. Global config
    ///
    /// # Errors
    ///
    /// Returns an error if config files cannot be read or parsed.
    pub fn merge(files: &ConfigFiles) -> anyhow::Result<Config> {
        let mut merged = Config::default();
        for path in files.in_merge_order() {
            Self::merge_into(&mut merged, path)?;
        }
        Ok(merged)
    }

    /// Load and merge a single config file into the existing config
    fn merge_into(base: &mut Config, path: &Path) -> anyhow::Result<()> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        tracing::debug!(path = %path.display(), "merging config file");
        Self::overlay(base, config);
        Ok(())
    }

    /// Apply `top` over `base`
    pub fn overlay(base: &mut Config, top: Config) {
        base.compare = top.compare.or(base.compare);
        base.time_tolerance = top.time_tolerance.or(base.time_tolerance);
        base.symlinks = top.symlinks.or(base.symlinks);

        let sync = top.sync;
        base.sync.variant = sync.variant.or(base.sync.variant);
        base.sync.deletion = sync.deletion.or(base.sync.deletion);
        base.sync.custom_deletion_dir = sync.custom_deletion_dir.or(base.sync.custom_deletion_dir.take());
        base.sync.verify_copied_files = sync.verify_copied_files.or(base.sync.verify_copied_files);
        base.sync.on_error = sync.on_error.or(base.sync.on_error);
        base.sync.custom = sync.custom.or(base.sync.custom);
        Self::overlay_warnings(&mut base.sync.warnings, sync.warnings);

        Self::overlay_filter(&mut base.filter, top.filter);
        base.pairs.extend(top.pairs);
    }

    fn overlay_warnings(base: &mut WarningSettings, top: WarningSettings) {
        base.significant_difference = top.significant_difference.or(base.significant_difference);
        base.not_enough_disk_space = top.not_enough_disk_space.or(base.not_enough_disk_space);
        base.unresolved_conflicts = top.unresolved_conflicts.or(base.unresolved_conflicts);
        base.recycler_missing = top.recycler_missing.or(base.recycler_missing);
    }

    fn overlay_filter(base: &mut FilterSettings, top: FilterSettings) {
        base.include.extend(top.include);
        base.exclude.extend(top.exclude);
        base.time_span_days = top.time_span_days.or(base.time_span_days);
        base.size_min = top.size_min.or(base.size_min);
        base.size_max = top.size_max.or(base.size_max);
    }
}

impl Default for ConfigMerger {
    fn default() -> Self {
        Self::new()
    }
}
