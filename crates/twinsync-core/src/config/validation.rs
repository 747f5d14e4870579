//! Configuration validation and error reporting

use super::types::{Config, DeletionKind, FilterSettings, SyncVariant};

/// Configuration validator
pub struct ConfigValidator;

impl ConfigValidator {
    /// Create a new config validator
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    /// Validate a configuration
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid.
    pub fn validate(config: &Config) -> anyhow::Result<()> {
        if let Some(tolerance) = config.time_tolerance
            && tolerance < 0
        {
            anyhow::bail!("time_tolerance cannot be negative");
        }

        if config.sync.variant == Some(SyncVariant::Custom) && config.sync.custom.is_none() {
            anyhow::bail!("Sync variant \"custom\" requires a [sync.custom] table");
        }

        if config.sync.deletion == Some(DeletionKind::CustomDirectory)
            && config
                .sync
                .custom_deletion_dir
                .as_ref()
                .is_none_or(|dir| dir.as_os_str().is_empty())
        {
            anyhow::bail!("Deletion \"custom-directory\" requires custom_deletion_dir");
        }

        Self::validate_filter(&config.filter, "filter")?;

        for (idx, pair) in config.pairs.iter().enumerate() {
            let label = format!("Folder pair #{}", idx + 1);
            if pair.left.as_os_str().is_empty() || pair.right.as_os_str().is_empty() {
                anyhow::bail!("{label} has an empty directory");
            }
            if pair.left == pair.right {
                anyhow::bail!("{label} uses the same directory on both sides");
            }
            Self::validate_filter(&pair.filter, &format!("{label} filter"))?;
        }

        Ok(())
    }

    fn validate_filter(filter: &FilterSettings, scope: &str) -> anyhow::Result<()> {
        for pattern in &filter.include {
            if pattern.trim().is_empty() {
                anyhow::bail!("{scope}: include pattern cannot be empty");
            }
        }
        for pattern in &filter.exclude {
            if pattern.trim().is_empty() {
                anyhow::bail!("{scope}: exclude pattern cannot be empty");
            }
        }
        if let (Some(min), Some(max)) = (filter.size_min, filter.size_max)
            && min > max
        {
            anyhow::bail!("{scope}: size_min ({min}) is larger than size_max ({max})");
        }
        Ok(())
    }
}

impl Default for ConfigValidator {
    fn default() -> Self {
        Self::new()
    }
}
