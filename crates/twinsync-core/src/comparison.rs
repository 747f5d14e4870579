//! Tree comparison and item classification
//!
//! [`CompareProcess`] walks both base directories level by level, pairs items
//! by name and classifies each pair into a [`CompareResult`]. Content
//! comparison (when selected) runs as a separate phase after scanning so the
//! front end can show a byte-accurate progress.

mod listing;


use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

pub use listing::SymlinkHandling;
use listing::{RawEntry, list_directory};

use crate::async_task::probe_dir_available;
use crate::error::{Result, SyncError};
use crate::hierarchy::{
    BaseDirMapping, CompareResult, CompareVariant, FolderComparison, Hierarchy, ItemDescriptor, NodeId,
    NodeKind, Side,
};
use crate::native;
use crate::status::{Phase, ProcessCallback, try_reporting_error};

/// Default modification time tolerance (FAT stores times with 2 s precision)
pub const DEFAULT_TIME_TOLERANCE: i64 = 2;

const TXT_DIFFERENT_TYPES: &str = "Cannot compare items of different type";
const TXT_NAME_CASE: &str = "Items differ in name case only";

/// One configured (left, right) directory association
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FolderPair {
    /// Left base directory
    pub left: PathBuf,
    /// Right base directory
    pub right: PathBuf,
}

impl FolderPair {
    /// Create a folder pair
    #[must_use]
    pub fn new(left: impl Into<PathBuf>, right: impl Into<PathBuf>) -> Self {
        Self {
            left: left.into(),
            right: right.into(),
        }
    }
}

/// Comparison settings
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompareOptions {
    /// Equality test for files
    pub variant: CompareVariant,
    /// Allowed modification time difference in seconds
    pub time_tolerance: i64,
    /// Symlink treatment
    pub symlinks: SymlinkHandling,
    /// Whether names differing only in case are different items
    pub case_sensitive: bool,
}

impl Default for CompareOptions {
    fn default() -> Self {
        Self {
            variant: CompareVariant::ByTimeSize,
            time_tolerance: DEFAULT_TIME_TOLERANCE,
            symlinks: SymlinkHandling::Direct,
            case_sensitive: cfg!(not(windows)),
        }
    }
}

/// Whether two times are equal within `tolerance` seconds
#[must_use]
pub fn same_file_time(a: i64, b: i64, tolerance: i64) -> bool {
    a.abs_diff(b) <= tolerance.unsigned_abs()
}

/// Classify two existing files by size and modification time
#[must_use]
pub fn compare_by_time_size(left: &ItemDescriptor, right: &ItemDescriptor, tolerance: i64) -> CompareResult {
    if same_file_time(left.mtime, right.mtime, tolerance) {
        if left.size == right.size {
            CompareResult::Equal
        } else {
            CompareResult::Different
        }
    } else if left.mtime > right.mtime {
        CompareResult::LeftNewer
    } else {
        CompareResult::RightNewer
    }
}

/// Classify two existing symlinks: same target is equal, otherwise by time
#[must_use]
pub fn compare_symlinks(
    left: &ItemDescriptor,
    right: &ItemDescriptor,
    variant: CompareVariant,
    tolerance: i64,
) -> CompareResult {
    if left.link_target == right.link_target {
        return CompareResult::Equal;
    }
    match variant {
        CompareVariant::ByContent => CompareResult::Different,
        CompareVariant::ByTimeSize => {
            if same_file_time(left.mtime, right.mtime, tolerance) {
                CompareResult::Different
            } else if left.mtime > right.mtime {
                CompareResult::LeftNewer
            } else {
                CompareResult::RightNewer
            }
        }
    }
}

/// Builds a [`FolderComparison`] for a list of folder pairs
pub struct CompareProcess {
    options: CompareOptions,
}

impl CompareProcess {
    /// Create a comparison process
    #[must_use]
    pub const fn new(options: CompareOptions) -> Self {
        Self { options }
    }

    /// Compare every folder pair
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::Abort`] on cancellation and [`SyncError::Fatal`] if a
    /// base directory exists but cannot be read.
    pub fn start_compare_process<C>(&self, pairs: &[FolderPair], callback: &mut C) -> Result<FolderComparison>
    where
        C: ProcessCallback + ?Sized,
    {
        callback.init_new_phase(0, 0, Phase::Scanning);
        check_folder_pairs(pairs, callback);

        let mut folder_cmp = FolderComparison::with_capacity(pairs.len());
        let mut content_candidates = Vec::new();

        for (index, pair) in pairs.iter().enumerate() {
            tracing::info!(left = %pair.left.display(), right = %pair.right.display(), "comparing folder pair");
            callback.report_info(&format!(
                "Scanning \"{}\" <-> \"{}\"",
                pair.left.display(),
                pair.right.display()
            ));

            let left_exists = Self::check_base_dir(&pair.left, callback)?;
            let right_exists = Self::check_base_dir(&pair.right, callback)?;

            let mut mapping = BaseDirMapping::new(
                &pair.left,
                &pair.right,
                self.options.variant,
                self.options.time_tolerance,
            );

            let mut scan = LevelScanner {
                options: &self.options,
                hierarchy: mapping.hierarchy_mut(),
                content_candidates: Vec::new(),
            };
            scan.compare_level(
                left_exists.then_some(pair.left.as_path()),
                right_exists.then_some(pair.right.as_path()),
                None,
                callback,
            )?;
            content_candidates.extend(scan.content_candidates.into_iter().map(|id| (index, id)));

            folder_cmp.push(mapping);
        }

        if self.options.variant == CompareVariant::ByContent {
            Self::compare_content(&mut folder_cmp, &content_candidates, callback)?;
        }

        Ok(folder_cmp)
    }

    /// `Ok(true)` if the base exists, `Ok(false)` if it is missing
    fn check_base_dir<C>(base: &Path, callback: &mut C) -> Result<bool>
    where
        C: ProcessCallback + ?Sized,
    {
        if probe_dir_available(base, || callback.request_ui_refresh())? {
            return Ok(true);
        }

        if std::fs::symlink_metadata(base).is_ok() {
            return Err(SyncError::Fatal(format!(
                "Cannot read directory \"{}\"",
                base.display()
            )));
        }

        let mut active = true;
        callback.report_warning(
            &format!(
                "Directory \"{}\" does not exist. It will be created during synchronization.",
                base.display()
            ),
            &mut active,
        );
        Ok(false)
    }

    fn compare_content<C>(
        folder_cmp: &mut FolderComparison,
        candidates: &[(usize, NodeId)],
        callback: &mut C,
    ) -> Result<()>
    where
        C: ProcessCallback + ?Sized,
    {
        let total_bytes: u64 = candidates
            .iter()
            .map(|&(i, id)| folder_cmp[i].hierarchy().node(id).size(Side::Left) * 2)
            .sum();
        callback.init_new_phase(candidates.len(), total_bytes, Phase::Comparing);

        for &(index, id) in candidates {
            callback.request_ui_refresh()?;
            let mapping = &mut folder_cmp[index];
            let left = mapping.full_path(id, Side::Left);
            let right = mapping.full_path(id, Side::Right);

            let outcome = try_reporting_error(callback, |cb| {
                native::files_have_same_content(&left, &right, |bytes| {
                    cb.update_processed_data(0, i64::try_from(bytes * 2).unwrap_or(i64::MAX));
                    cb.request_ui_refresh()
                })
            })?;
            callback.update_processed_data(1, 0);

            let hierarchy = mapping.hierarchy_mut();
            match outcome {
                Some(true) => {
                    let node = hierarchy.node(id);
                    let (category, text) = equal_or_name_case(node.name_on(Side::Left), node.name_on(Side::Right));
                    hierarchy.set_category(id, category, text);
                }
                Some(false) => hierarchy.set_category(id, CompareResult::Different, ""),
                None => hierarchy.set_category(id, CompareResult::Conflict, "File content could not be compared"),
            }
        }
        Ok(())
    }
}

/// Warn about folder pairs that point at the same or at nested directories
fn check_folder_pairs<C>(pairs: &[FolderPair], callback: &mut C)
where
    C: ProcessCallback + ?Sized,
{
    let canonical = |p: &Path| dunce::canonicalize(p).unwrap_or_else(|_| p.to_path_buf());

    let mut identical = Vec::new();
    let mut dependent = Vec::new();
    for pair in pairs {
        let (left, right) = (canonical(&pair.left), canonical(&pair.right));
        let entry = format!("\"{}\" <-> \"{}\"", pair.left.display(), pair.right.display());
        if left == right {
            identical.push(entry);
        } else if left.starts_with(&right) || right.starts_with(&left) {
            dependent.push(entry);
        }
    }

    if !identical.is_empty() {
        let mut active = true;
        callback.report_warning(
            &format!(
                "The same folder is set as both source and target. These folder pairs will be skipped:\n{}",
                identical.join("\n")
            ),
            &mut active,
        );
    }
    if !dependent.is_empty() {
        let mut active = true;
        callback.report_warning(
            &format!(
                "One base directory of a folder pair is contained in the other one.\n\
                 The folder should be excluded from synchronization via filter.\n{}",
                dependent.join("\n")
            ),
            &mut active,
        );
    }
}

fn equal_or_name_case(left: &str, right: &str) -> (CompareResult, String) {
    if left == right {
        (CompareResult::Equal, String::new())
    } else {
        (
            CompareResult::DifferentMetadata,
            format!("{TXT_NAME_CASE}: \"{left}\" / \"{right}\""),
        )
    }
}

/// Groups items of one directory level by their matching key
type PairedLevel = BTreeMap<String, (Vec<RawEntry>, Vec<RawEntry>)>;

struct LevelScanner<'a> {
    options: &'a CompareOptions,
    hierarchy: &'a mut Hierarchy,
    content_candidates: Vec<NodeId>,
}

impl LevelScanner<'_> {
    fn key(&self, name: &str) -> String {
        if self.options.case_sensitive {
            name.to_string()
        } else {
            name.to_lowercase()
        }
    }

    fn compare_level<C>(
        &mut self,
        left_dir: Option<&Path>,
        right_dir: Option<&Path>,
        parent: Option<NodeId>,
        callback: &mut C,
    ) -> Result<()>
    where
        C: ProcessCallback + ?Sized,
    {
        callback.request_ui_refresh()?;

        let mut level = PairedLevel::new();
        if let Some(dir) = left_dir {
            for entry in list_directory(dir, self.options.symlinks, callback)? {
                level.entry(self.key(&entry.descriptor.name)).or_default().0.push(entry);
            }
        }
        if let Some(dir) = right_dir {
            for entry in list_directory(dir, self.options.symlinks, callback)? {
                level.entry(self.key(&entry.descriptor.name)).or_default().1.push(entry);
            }
        }

        for (lefts, rights) in level.into_values() {
            let mut lefts = lefts.into_iter();
            let mut rights = rights.into_iter();
            loop {
                match (lefts.next(), rights.next()) {
                    (None, None) => break,
                    (Some(l), Some(r)) if l.kind == r.kind => {
                        self.add_pair(l, r, left_dir, right_dir, parent, callback)?;
                    }
                    (Some(l), Some(r)) => {
                        let a = self.add_one_sided(l, Side::Left, left_dir, parent, callback)?;
                        let b = self.add_one_sided(r, Side::Right, right_dir, parent, callback)?;
                        self.hierarchy.set_category(a, CompareResult::Conflict, TXT_DIFFERENT_TYPES);
                        self.hierarchy.set_category(b, CompareResult::Conflict, TXT_DIFFERENT_TYPES);
                    }
                    (Some(l), None) => {
                        self.add_one_sided(l, Side::Left, left_dir, parent, callback)?;
                    }
                    (None, Some(r)) => {
                        self.add_one_sided(r, Side::Right, right_dir, parent, callback)?;
                    }
                }
            }
        }
        Ok(())
    }

    fn add_pair<C>(
        &mut self,
        left: RawEntry,
        right: RawEntry,
        left_dir: Option<&Path>,
        right_dir: Option<&Path>,
        parent: Option<NodeId>,
        callback: &mut C,
    ) -> Result<()>
    where
        C: ProcessCallback + ?Sized,
    {
        callback.update_processed_data(2, 0);
        let kind = left.kind;
        let (category, text) = match kind {
            NodeKind::Directory => equal_or_name_case(&left.descriptor.name, &right.descriptor.name),
            NodeKind::Symlink => {
                match compare_symlinks(&left.descriptor, &right.descriptor, self.options.variant, self.options.time_tolerance) {
                    CompareResult::Equal => equal_or_name_case(&left.descriptor.name, &right.descriptor.name),
                    other => (other, String::new()),
                }
            }
            NodeKind::File => match self.options.variant {
                CompareVariant::ByTimeSize => {
                    match compare_by_time_size(&left.descriptor, &right.descriptor, self.options.time_tolerance) {
                        CompareResult::Equal => equal_or_name_case(&left.descriptor.name, &right.descriptor.name),
                        other => (other, String::new()),
                    }
                }
                CompareVariant::ByContent => {
                    // refined in the content phase
                    if left.descriptor.size == right.descriptor.size {
                        (CompareResult::Equal, String::new())
                    } else {
                        (CompareResult::Different, String::new())
                    }
                }
            },
        };

        let child_left = left_dir.map(|d| d.join(&left.descriptor.name));
        let child_right = right_dir.map(|d| d.join(&right.descriptor.name));
        let same_size = left.descriptor.size == right.descriptor.size;

        let id = self.hierarchy.add(kind, parent, Some(left.descriptor), Some(right.descriptor));
        self.hierarchy.set_category(id, category, text);

        match kind {
            NodeKind::Directory => {
                self.compare_level(child_left.as_deref(), child_right.as_deref(), Some(id), callback)?;
            }
            NodeKind::File if self.options.variant == CompareVariant::ByContent && same_size => {
                self.content_candidates.push(id);
            }
            _ => {}
        }
        Ok(())
    }

    fn add_one_sided<C>(
        &mut self,
        entry: RawEntry,
        side: Side,
        dir: Option<&Path>,
        parent: Option<NodeId>,
        callback: &mut C,
    ) -> Result<NodeId>
    where
        C: ProcessCallback + ?Sized,
    {
        callback.update_processed_data(1, 0);
        let kind = entry.kind;
        let child = dir.map(|d| d.join(&entry.descriptor.name));
        let id = match side {
            Side::Left => self.hierarchy.add(kind, parent, Some(entry.descriptor), None),
            Side::Right => self.hierarchy.add(kind, parent, None, Some(entry.descriptor)),
        };

        if kind == NodeKind::Directory {
            let (l, r) = match side {
                Side::Left => (child.as_deref(), None),
                Side::Right => (None, child.as_deref()),
            };
            self.compare_level(l, r, Some(id), callback)?;
        }
        Ok(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn file(size: u64, mtime: i64) -> ItemDescriptor {
        ItemDescriptor::file("f", size, mtime)
    }

    #[test]
    fn test_tolerance_boundary_is_equal() {
        assert_eq!(compare_by_time_size(&file(10, 1000), &file(10, 1002), 2), CompareResult::Equal);
        assert_eq!(compare_by_time_size(&file(10, 1002), &file(10, 1000), 2), CompareResult::Equal);
    }

    #[test]
    fn test_tolerance_plus_one_is_newer() {
        assert_eq!(compare_by_time_size(&file(10, 1003), &file(10, 1000), 2), CompareResult::LeftNewer);
        assert_eq!(compare_by_time_size(&file(10, 1000), &file(10, 1003), 2), CompareResult::RightNewer);
    }

    #[test]
    fn test_same_time_different_size() {
        assert_eq!(compare_by_time_size(&file(10, 1000), &file(11, 1000), 2), CompareResult::Different);
    }

    #[test]
    fn test_symlink_same_target_equal() {
        let a = ItemDescriptor::symlink("l", 1, "t");
        let b = ItemDescriptor::symlink("l", 500, "t");
        assert_eq!(compare_symlinks(&a, &b, CompareVariant::ByTimeSize, 2), CompareResult::Equal);

        let c = ItemDescriptor::symlink("l", 500, "other");
        assert_eq!(compare_symlinks(&a, &c, CompareVariant::ByTimeSize, 2), CompareResult::RightNewer);
        assert_eq!(compare_symlinks(&a, &c, CompareVariant::ByContent, 2), CompareResult::Different);
    }

    #[test]
    fn test_name_case_difference() {
        let (category, text) = equal_or_name_case("Readme.md", "README.md");
        assert_eq!(category, CompareResult::DifferentMetadata);
        assert!(text.contains("README.md"));
    }

    #[test]
    fn test_same_file_time_negative_values() {
        assert!(same_file_time(-5, -3, 2));
        assert!(!same_file_time(-5, -2, 2));
    }
}
