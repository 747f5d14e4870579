//! Configuration types and their conversion into engine settings

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::comparison::{CompareOptions, DEFAULT_TIME_TOLERANCE, FolderPair, SymlinkHandling};
use crate::direction::PairDirection;
use crate::filter::{FilterSet, NameFilter, SoftFilter};
use crate::hierarchy::{CategoryDirections, CompareVariant, DirectionConfig, SyncDirection};
use crate::sync::{DeletionPolicy, FolderPairSyncCfg, SyncOptions};

const SECONDS_PER_DAY: i64 = 24 * 60 * 60;

/// Direction preset
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SyncVariant {
    /// Infer directions from the sync database
    #[default]
    Automatic,
    /// Newer files win, one-sided items are copied
    TwoWay,
    /// Make the right side an exact copy of the left
    Mirror,
    /// Copy new and newer files to the right, never delete
    Update,
    /// Directions from `[sync.custom]`
    Custom,
}

/// Direction choice for one category in `[sync.custom]`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DirectionChoice {
    /// Right side overwrites left
    ToLeft,
    /// Left side overwrites right
    ToRight,
    /// Leave the item alone
    None,
}

impl From<DirectionChoice> for SyncDirection {
    fn from(choice: DirectionChoice) -> Self {
        match choice {
            DirectionChoice::ToLeft => Self::Left,
            DirectionChoice::ToRight => Self::Right,
            DirectionChoice::None => Self::None,
        }
    }
}

/// Per-category directions; unset categories use the two-way preset
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct CustomDirections {
    /// Items existing on the left only
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub left_only: Option<DirectionChoice>,
    /// Items existing on the right only
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub right_only: Option<DirectionChoice>,
    /// Left file is newer
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub left_newer: Option<DirectionChoice>,
    /// Right file is newer
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub right_newer: Option<DirectionChoice>,
    /// Files differ in content
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub different: Option<DirectionChoice>,
    /// Conflicts; `none` keeps them unresolved
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub conflict: Option<DirectionChoice>,
}

impl CustomDirections {
    /// Category table with unset entries taken from the two-way preset
    #[must_use]
    pub fn to_category_directions(&self) -> CategoryDirections {
        let base = CategoryDirections::two_way();
        let pick = |choice: Option<DirectionChoice>, fallback: SyncDirection| choice.map_or(fallback, Into::into);
        CategoryDirections {
            ex_left_side_only: pick(self.left_only, base.ex_left_side_only),
            ex_right_side_only: pick(self.right_only, base.ex_right_side_only),
            left_newer: pick(self.left_newer, base.left_newer),
            right_newer: pick(self.right_newer, base.right_newer),
            different: pick(self.different, base.different),
            conflict: pick(self.conflict, base.conflict),
        }
    }
}

/// What happens to deleted and overwritten items
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DeletionKind {
    /// Delete for good
    Permanent,
    /// Move to the user's trash
    #[default]
    RecycleBin,
    /// Move into a dated folder below `custom_deletion_dir`
    CustomDirectory,
}

/// Reaction to a failed file operation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum OnError {
    /// Ask whether to retry, ignore or abort
    #[default]
    Popup,
    /// Skip the item and continue
    Ignore,
    /// Stop the run
    Exit,
}

/// `[sync]` table
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SyncSettings {
    /// Direction preset
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub variant: Option<SyncVariant>,
    /// Deletion policy
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deletion: Option<DeletionKind>,
    /// Target folder of the `custom-directory` policy
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub custom_deletion_dir: Option<PathBuf>,
    /// Re-read every copied file and compare it with its source
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub verify_copied_files: Option<bool>,
    /// Reaction to failed file operations
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub on_error: Option<OnError>,
    /// Directions for the `custom` variant
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub custom: Option<CustomDirections>,
    /// Pre-flight warnings to show
    #[serde(default, skip_serializing_if = "WarningSettings::is_empty")]
    pub warnings: WarningSettings,
}

/// `[sync.warnings]` table; unset warnings are shown
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct WarningSettings {
    /// More than half of the items change
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub significant_difference: Option<bool>,
    /// A target volume lacks free space
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub not_enough_disk_space: Option<bool>,
    /// Conflicts will be left untouched
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unresolved_conflicts: Option<bool>,
    /// Deleted items cannot go to the recycle bin
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub recycler_missing: Option<bool>,
}

impl WarningSettings {
    /// Whether no warning is configured
    #[must_use]
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

/// `[filter]` table, globally or per pair
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct FilterSettings {
    /// Include globs; empty means everything
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub include: Vec<String>,
    /// Exclude globs
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub exclude: Vec<String>,
    /// Only items modified within this many days
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time_span_days: Option<u32>,
    /// Minimum file size in bytes
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size_min: Option<u64>,
    /// Maximum file size in bytes
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size_max: Option<u64>,
}

impl FilterSettings {
    /// Whether nothing is filtered
    #[must_use]
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    /// Build the engine filter; `now` anchors the time span
    ///
    /// # Errors
    ///
    /// Returns an error if a glob pattern is invalid.
    pub fn to_filter_set(&self, now: i64) -> anyhow::Result<FilterSet> {
        let name = NameFilter::new(&self.include, &self.exclude)?;
        let time_from = self
            .time_span_days
            .map_or(i64::MIN, |days| now.saturating_sub(i64::from(days) * SECONDS_PER_DAY));
        let soft = SoftFilter::new(time_from, self.size_min.unwrap_or(0), self.size_max.unwrap_or(u64::MAX));
        Ok(FilterSet { name, soft })
    }
}

/// One `[[pairs]]` entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PairSettings {
    /// Left base directory
    pub left: PathBuf,
    /// Right base directory
    pub right: PathBuf,
    /// Sync database location (default: inside the left base directory)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub database: Option<PathBuf>,
    /// Filter applied on top of the global one
    #[serde(default, skip_serializing_if = "FilterSettings::is_empty")]
    pub filter: FilterSettings,
}

impl PairSettings {
    /// Pair without database override or local filter
    #[must_use]
    pub fn new(left: impl Into<PathBuf>, right: impl Into<PathBuf>) -> Self {
        Self {
            left: left.into(),
            right: right.into(),
            database: None,
            filter: FilterSettings::default(),
        }
    }
}

/// Main configuration structure
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct Config {
    /// `time-size` or `content`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub compare: Option<CompareVariant>,

    /// Allowed modification time difference in seconds
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time_tolerance: Option<i64>,

    /// `exclude`, `direct` or `follow`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub symlinks: Option<SymlinkHandling>,

    /// Direction and deletion settings
    #[serde(default)]
    pub sync: SyncSettings,

    /// Global filter
    #[serde(default)]
    pub filter: FilterSettings,

    /// Folder pairs
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub pairs: Vec<PairSettings>,
}

impl Config {
    /// Comparison settings
    #[must_use]
    pub fn compare_options(&self) -> CompareOptions {
        let defaults = CompareOptions::default();
        CompareOptions {
            variant: self.compare.unwrap_or(defaults.variant),
            time_tolerance: self.time_tolerance.unwrap_or(DEFAULT_TIME_TOLERANCE),
            symlinks: self.symlinks.unwrap_or(defaults.symlinks),
            case_sensitive: defaults.case_sensitive,
        }
    }

    /// Direction settings shared by all pairs
    #[must_use]
    pub fn direction_config(&self) -> DirectionConfig {
        match self.sync.variant.unwrap_or_default() {
            SyncVariant::Automatic => DirectionConfig::Automatic,
            SyncVariant::TwoWay => DirectionConfig::ByCategory(CategoryDirections::two_way()),
            SyncVariant::Mirror => DirectionConfig::ByCategory(CategoryDirections::mirror()),
            SyncVariant::Update => DirectionConfig::ByCategory(CategoryDirections::update()),
            SyncVariant::Custom => DirectionConfig::ByCategory(
                self.sync.custom.unwrap_or_default().to_category_directions(),
            ),
        }
    }

    /// Configured folder pairs in order
    #[must_use]
    pub fn folder_pairs(&self) -> Vec<FolderPair> {
        self.pairs.iter().map(|p| FolderPair::new(&p.left, &p.right)).collect()
    }

    /// Direction settings per pair
    #[must_use]
    pub fn pair_directions(&self) -> Vec<PairDirection> {
        let config = self.direction_config();
        self.pairs
            .iter()
            .map(|p| PairDirection {
                config: config.clone(),
                database: p.database.clone(),
            })
            .collect()
    }

    /// Global filter
    ///
    /// # Errors
    ///
    /// Returns an error if a glob pattern is invalid.
    pub fn global_filter(&self, now: i64) -> anyhow::Result<FilterSet> {
        self.filter.to_filter_set(now)
    }

    /// Local filter per pair
    ///
    /// # Errors
    ///
    /// Returns an error if a glob pattern is invalid.
    pub fn pair_filters(&self, now: i64) -> anyhow::Result<Vec<FilterSet>> {
        self.pairs.iter().map(|p| p.filter.to_filter_set(now)).collect()
    }

    /// Deletion policy
    #[must_use]
    pub fn deletion_policy(&self) -> DeletionPolicy {
        match self.sync.deletion.unwrap_or_default() {
            DeletionKind::Permanent => DeletionPolicy::Permanent,
            DeletionKind::RecycleBin => DeletionPolicy::RecycleBin,
            DeletionKind::CustomDirectory => {
                DeletionPolicy::CustomDirectory(self.sync.custom_deletion_dir.clone().unwrap_or_default())
            }
        }
    }

    /// Execution settings per pair
    #[must_use]
    pub fn sync_configs(&self) -> Vec<FolderPairSyncCfg> {
        let automatic_mode = self.direction_config().is_automatic();
        let deletion = self.deletion_policy();
        let compare = self.compare_options();
        self.pairs
            .iter()
            .map(|p| FolderPairSyncCfg {
                automatic_mode,
                deletion: deletion.clone(),
                symlinks: compare.symlinks,
                verify_copied_files: self.sync.verify_copied_files.unwrap_or(false),
                database_path: p.database.clone(),
            })
            .collect()
    }

    /// Pre-flight warnings of the synchronization
    #[must_use]
    pub fn sync_options(&self) -> SyncOptions {
        let defaults = SyncOptions::default();
        let warnings = self.sync.warnings;
        SyncOptions {
            warn_significant_difference: warnings
                .significant_difference
                .unwrap_or(defaults.warn_significant_difference),
            warn_not_enough_disk_space: warnings
                .not_enough_disk_space
                .unwrap_or(defaults.warn_not_enough_disk_space),
            warn_unresolved_conflicts: warnings
                .unresolved_conflicts
                .unwrap_or(defaults.warn_unresolved_conflicts),
            warn_recycler_missing: warnings.recycler_missing.unwrap_or(defaults.warn_recycler_missing),
        }
    }

    /// Reaction to failed file operations
    #[must_use]
    pub fn on_error(&self) -> OnError {
        self.sync.on_error.unwrap_or_default()
    }
}
