//! Common types and utilities for command execution

use std::path::Path;
use std::process::ExitCode;

use anyhow::Context;
use twinsync_core::comparison::CompareProcess;
use twinsync_core::config::{Config, ConfigManager, ConfigValidator, PairSettings};
use twinsync_core::direction::redetermine_all;
use twinsync_core::filter::apply_filtering;
use twinsync_core::hierarchy::FolderComparison;

use crate::cli::{Cli, PairArgs};
use crate::status_handler::BatchStatusHandler;

/// How a command ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// Everything went fine
    Success,
    /// Finished, but warnings were shown
    Warnings,
    /// Finished with ignored errors, or stopped by a fatal error
    Errors,
    /// Stopped by the user
    Aborted,
}

impl Outcome {
    /// Outcome of a finished run
    pub const fn from_counts(warnings: usize, errors: usize) -> Self {
        if errors > 0 {
            Self::Errors
        } else if warnings > 0 {
            Self::Warnings
        } else {
            Self::Success
        }
    }

    /// Process exit code
    pub fn exit_code(self) -> ExitCode {
        ExitCode::from(match self {
            Self::Success => 0,
            Self::Warnings => 1,
            Self::Errors => 2,
            Self::Aborted => 3,
        })
    }
}

/// Load the configuration the global flags ask for
///
/// Folder pairs given on the command line replace configured ones.
pub fn load_config(cli: &Cli, pair: Option<&PairArgs>) -> anyhow::Result<Config> {
    let mut config = if cli.no_config {
        Config::default()
    } else {
        ConfigManager::load(cli.config.as_deref()).context("Failed to load configuration")?
    };

    if let Some(PairArgs {
        left: Some(left),
        right: Some(right),
    }) = pair
    {
        config.pairs = vec![PairSettings::new(absolute(left)?, absolute(right)?)];
        ConfigValidator::validate(&config)?;
    }
    if let Some(mode) = cli.on_error {
        config.sync.on_error = Some(mode.into());
    }
    Ok(config)
}

fn absolute(path: &Path) -> anyhow::Result<std::path::PathBuf> {
    std::path::absolute(path).with_context(|| format!("Invalid path: {}", path.display()))
}

/// Compare all folder pairs, apply filters and decide directions
pub fn build_plan(config: &Config, handler: &mut BatchStatusHandler) -> anyhow::Result<FolderComparison> {
    let pairs = config.folder_pairs();
    if pairs.is_empty() {
        anyhow::bail!("No folder pairs configured. Pass LEFT and RIGHT or add [[pairs]] to a config file.");
    }

    let mut folder_cmp = CompareProcess::new(config.compare_options()).start_compare_process(&pairs, handler)?;

    let now = chrono::Utc::now().timestamp();
    apply_filtering(&mut folder_cmp, &config.global_filter(now)?, &config.pair_filters(now)?)?;
    redetermine_all(&mut folder_cmp, &config.pair_directions(), handler)?;

    Ok(folder_cmp)
}
