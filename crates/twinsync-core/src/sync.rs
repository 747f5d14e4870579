//! Synchronization of compared folder pairs
//!
//! [`SyncProcess`] checks the plan of every folder pair before touching any
//! file (missing source directories, free space, conflicts, mass changes),
//! then executes the pairs one after another and stores the sync database
//! of pairs in automatic mode.

mod deletion;
mod executor;
mod recycler;
mod reporting;
mod statistics;

#[cfg(test)]
mod integration_tests;

pub use reporting::SyncReporter;
pub use statistics::{SyncStatistics, disk_space_needed, format_bytes};

use std::collections::HashMap;
use std::fmt::Write;
use std::path::{Path, PathBuf};

use deletion::DeletionHandler;
use executor::FolderPairSync;
use recycler::Trash;

use crate::async_task::probe_dir_available;
use crate::comparison::SymlinkHandling;
use crate::database::{default_database_path, save_last_synchronous_state};
use crate::error::{FileError, Result, SyncError};
use crate::hierarchy::{BaseDirMapping, FolderComparison, Side};
use crate::native;
use crate::status::{Phase, ProcessCallback, try_reporting_error};

/// What happens to deleted and overwritten items
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum DeletionPolicy {
    /// Delete for good
    Permanent,
    /// Move to the user's recycle bin
    #[default]
    RecycleBin,
    /// Move into a dated folder below the given directory
    CustomDirectory(PathBuf),
}

/// Execution settings of one folder pair
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct FolderPairSyncCfg {
    /// Directions were inferred from the sync database, which is updated afterwards
    pub automatic_mode: bool,
    /// Deletion handling
    pub deletion: DeletionPolicy,
    /// How symlinks are copied
    pub symlinks: SymlinkHandling,
    /// Re-read every copied file and compare it with its source
    pub verify_copied_files: bool,
    /// Database location; defaults to a file in the left base directory
    pub database_path: Option<PathBuf>,
}

/// Pre-flight warnings that are enabled
///
/// Each flag is cleared when the user suppresses the warning.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[allow(clippy::struct_excessive_bools)]
pub struct SyncOptions {
    /// More than half of the items change
    pub warn_significant_difference: bool,
    /// A target volume lacks free space
    pub warn_not_enough_disk_space: bool,
    /// Conflicts will be left untouched
    pub warn_unresolved_conflicts: bool,
    /// Deleted items cannot go to the recycle bin
    pub warn_recycler_missing: bool,
}

impl Default for SyncOptions {
    fn default() -> Self {
        Self {
            warn_significant_difference: true,
            warn_not_enough_disk_space: true,
            warn_unresolved_conflicts: true,
            warn_recycler_missing: true,
        }
    }
}

/// Synchronization result with statistics
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncResult {
    /// Items created
    pub created: usize,
    /// Items overwritten (or renamed to fix their case)
    pub overwritten: usize,
    /// Items deleted
    pub deleted: usize,
    /// Items renamed instead of copied
    pub renamed: usize,
    /// Conflicts left untouched
    pub conflicts: usize,
    /// Failures the user chose to ignore
    pub errors: Vec<String>,
}

impl SyncResult {
    /// Total operations performed
    #[must_use]
    pub const fn total_operations(&self) -> usize {
        self.created + self.overwritten + self.deleted + self.renamed
    }

    /// Whether sync was successful (no errors)
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.errors.is_empty()
    }

    fn merge(&mut self, other: Self) {
        self.created += other.created;
        self.overwritten += other.overwritten;
        self.deleted += other.deleted;
        self.renamed += other.renamed;
        self.conflicts += other.conflicts;
        self.errors.extend(other.errors);
    }
}

/// Runs the synchronization of all folder pairs
pub struct SyncProcess<'a, C: ProcessCallback + ?Sized> {
    options: SyncOptions,
    callback: &'a mut C,
}

impl<'a, C: ProcessCallback + ?Sized> SyncProcess<'a, C> {
    /// Create a process reporting to `callback`
    pub fn new(options: SyncOptions, callback: &'a mut C) -> Self {
        Self { options, callback }
    }

    /// Warning flags after the run; suppressed warnings are `false`
    #[must_use]
    pub const fn options(&self) -> SyncOptions {
        self.options
    }

    /// Synchronize every folder pair of `folder_cmp`
    ///
    /// `configs` holds one entry per folder pair. The model is updated to
    /// reflect every completed operation, also when the run is aborted.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::Fatal`] if a pre-flight check fails,
    /// [`SyncError::Abort`] if the user cancels, and
    /// [`SyncError::Internal`] if `configs` does not match `folder_cmp`.
    pub fn start_synchronization(
        &mut self,
        folder_cmp: &mut FolderComparison,
        configs: &[FolderPairSyncCfg],
    ) -> Result<SyncResult> {
        if folder_cmp.len() != configs.len() {
            return Err(SyncError::Internal(format!(
                "{} folder pairs but {} sync configurations",
                folder_cmp.len(),
                configs.len()
            )));
        }

        let total = SyncStatistics::new(folder_cmp);
        self.callback
            .init_new_phase(total.operation_count(), total.data_to_process, Phase::Synchronizing);

        let mut handlers = Vec::with_capacity(folder_cmp.len());
        let mut recyclers = HashMap::new();
        for (mapping, cfg) in folder_cmp.iter().zip(configs) {
            handlers.push(self.prepare_pair(mapping, cfg, &mut recyclers)?);
        }

        if total.conflicts > 0 && self.options.warn_unresolved_conflicts {
            let text = conflicts_warning(&total);
            self.callback
                .report_warning(&text, &mut self.options.warn_unresolved_conflicts);
        }
        self.callback.request_ui_refresh()?;

        let mut result = SyncResult {
            conflicts: total.conflicts,
            ..SyncResult::default()
        };
        for ((mapping, cfg), handlers) in folder_cmp.iter_mut().zip(configs).zip(handlers) {
            let Some(handlers) = handlers else {
                continue;
            };
            result.merge(self.synchronize_pair(mapping, cfg, handlers)?);
        }

        tracing::info!(
            created = result.created,
            overwritten = result.overwritten,
            deleted = result.deleted,
            renamed = result.renamed,
            errors = result.errors.len(),
            "synchronization finished"
        );
        Ok(result)
    }

    /// Pre-flight checks of one pair; `None` if the pair is skipped
    fn prepare_pair(
        &mut self,
        mapping: &BaseDirMapping,
        cfg: &FolderPairSyncCfg,
        recyclers: &mut HashMap<PathBuf, Option<Trash>>,
    ) -> Result<Option<(DeletionHandler, DeletionHandler)>> {
        let left = mapping.base(Side::Left);
        let right = mapping.base(Side::Right);
        if native::same_directory(left, right) {
            tracing::debug!(base = %left.display(), "skipping folder pair with identical directories");
            return Ok(None);
        }

        let stats = SyncStatistics::for_mapping(mapping);
        let removes_on = |side: Side| match side {
            Side::Left => stats.delete_left + stats.overwrite_left > 0,
            Side::Right => stats.delete_right + stats.overwrite_right > 0,
        };

        let handlers = (
            self.deletion_handler(mapping, Side::Left, &cfg.deletion, removes_on(Side::Left), recyclers)?,
            self.deletion_handler(mapping, Side::Right, &cfg.deletion, removes_on(Side::Right), recyclers)?,
        );

        // a vanished source directory makes everything look deleted
        if stats.create_count() + stats.overwrite_count() + stats.conflicts == 0 && stats.delete_count() > 0 {
            for side in [Side::Left, Side::Right] {
                let base = mapping.base(side);
                let callback = &mut *self.callback;
                if !probe_dir_available(base, || callback.request_ui_refresh())? {
                    return Err(SyncError::Fatal(format!(
                        "Source directory does not exist anymore:\n\"{}\"",
                        base.display()
                    )));
                }
            }
        }

        if self.options.warn_significant_difference && stats.significant_difference_detected() {
            let text = format!(
                "Significant difference detected:\n{} <-> \n{}\n\n\
                 More than 50% of the total number of files will be copied or deleted!",
                left.display(),
                right.display()
            );
            self.callback
                .report_warning(&text, &mut self.options.warn_significant_difference);
        }

        if self.options.warn_not_enough_disk_space {
            let needed = disk_space_needed(mapping, handlers.0.keeps_deleted_data(), handlers.1.keeps_deleted_data());
            for (side, needed) in [(Side::Left, needed.0), (Side::Right, needed.1)] {
                self.check_free_space(mapping.base(side), needed);
            }
        }

        Ok(Some(handlers))
    }

    fn deletion_handler(
        &mut self,
        mapping: &BaseDirMapping,
        side: Side,
        policy: &DeletionPolicy,
        removes_items: bool,
        recyclers: &mut HashMap<PathBuf, Option<Trash>>,
    ) -> Result<DeletionHandler> {
        match policy {
            DeletionPolicy::Permanent => Ok(DeletionHandler::permanent()),
            DeletionPolicy::CustomDirectory(dir) => {
                if dir.as_os_str().is_empty() {
                    if removes_items {
                        return Err(SyncError::Fatal(
                            "User-defined directory for deletion was not specified!".to_string(),
                        ));
                    }
                    return Ok(DeletionHandler::permanent());
                }
                Ok(DeletionHandler::custom_directory(dir.clone()))
            }
            DeletionPolicy::RecycleBin if !removes_items => Ok(DeletionHandler::permanent()),
            DeletionPolicy::RecycleBin => {
                let base = mapping.base(side);
                let trash = recyclers
                    .entry(base.to_path_buf())
                    .or_insert_with(|| Trash::for_base_dir(base))
                    .clone();
                if let Some(trash) = trash {
                    return Ok(DeletionHandler::recycler(trash));
                }
                if self.options.warn_recycler_missing {
                    let text = format!(
                        "Recycle Bin is not available for the following paths! \
                         Files will be deleted permanently instead:\n\"{}\"",
                        base.display()
                    );
                    self.callback.report_warning(&text, &mut self.options.warn_recycler_missing);
                }
                Ok(DeletionHandler::permanent())
            }
        }
    }

    fn check_free_space(&mut self, base: &Path, needed: i64) {
        if needed <= 0 {
            return;
        }
        let Some(existing) = base.ancestors().find(|p| p.exists()) else {
            return;
        };
        let Some(free) = native::free_disk_space(existing) else {
            return;
        };
        let needed = needed.unsigned_abs();
        if free < needed {
            let text = format!(
                "Not enough free disk space available in:\n\"{}\"\n\n\
                 Total required free disk space: {}\nFree disk space available: {}",
                base.display(),
                format_bytes(needed),
                format_bytes(free)
            );
            self.callback
                .report_warning(&text, &mut self.options.warn_not_enough_disk_space);
        }
    }

    fn synchronize_pair(
        &mut self,
        mapping: &mut BaseDirMapping,
        cfg: &FolderPairSyncCfg,
        handlers: (DeletionHandler, DeletionHandler),
    ) -> Result<SyncResult> {
        self.callback.report_info(&format!(
            "Processing folder pair:\n    {}\n    {}",
            mapping.base(Side::Left).display(),
            mapping.base(Side::Right).display()
        ));
        tracing::info!(
            left = %mapping.base(Side::Left).display(),
            right = %mapping.base(Side::Right).display(),
            "synchronizing folder pair"
        );

        let mut pair = FolderPairSync::new(mapping, handlers, cfg);
        let outcome = pair.run(self.callback);
        let result = pair.into_result();
        mapping.hierarchy_mut().remove_empty();

        match outcome {
            Ok(()) => {}
            Err(SyncError::Abort) if cfg.automatic_mode => {
                // keep what was already synchronized
                let path = database_path(mapping, cfg);
                if let Err(err) = save_last_synchronous_state(mapping, &path) {
                    tracing::warn!("{err}");
                }
                return Err(SyncError::Abort);
            }
            Err(err) => return Err(err),
        }

        if cfg.automatic_mode {
            let path = database_path(mapping, cfg);
            self.callback.report_info(&format!("Generating database \"{}\"", path.display()));
            let saved = try_reporting_error(self.callback, |_| {
                save_last_synchronous_state(mapping, &path).map_err(|err| SyncError::from(FileError::new(err.to_string())))
            })?;
            if saved.is_none() {
                let mut result = result;
                result.errors.push(format!("Cannot write database file \"{}\"", path.display()));
                return Ok(result);
            }
        }
        Ok(result)
    }
}

fn database_path(mapping: &BaseDirMapping, cfg: &FolderPairSyncCfg) -> PathBuf {
    cfg.database_path
        .clone()
        .unwrap_or_else(|| default_database_path(mapping))
}

fn conflicts_warning(stats: &SyncStatistics) -> String {
    let mut text = format!("Unresolved conflicts existing! ({})\n\n", stats.conflicts);
    for (path, reason) in &stats.first_conflicts {
        let _ = writeln!(text, "\"{}\": \t{reason}", path.display());
    }
    if stats.conflicts > stats.first_conflicts.len() {
        text.push_str("[...]\n");
    }
    text.push_str("\nYou can ignore conflicts and continue synchronization.");
    text
}
