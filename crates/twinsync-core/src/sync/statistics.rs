//! Operation counts and space estimates of a synchronization plan

use std::path::PathBuf;

use crate::hierarchy::{BaseDirMapping, FolderComparison, Hierarchy, NodeId, Side, SyncDirection, SyncOperation};

/// Number of conflicts quoted in warnings
const MAX_CONFLICT_SAMPLES: usize = 3;

/// Minimum number of changed rows for the significant difference warning
const SIGNIFICANT_ROWS: usize = 10;

/// Planned operations of one or more folder pairs
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncStatistics {
    /// Items created on the left
    pub create_left: usize,
    /// Items created on the right
    pub create_right: usize,
    /// Items overwritten on the left
    pub overwrite_left: usize,
    /// Items overwritten on the right
    pub overwrite_right: usize,
    /// Items deleted on the left
    pub delete_left: usize,
    /// Items deleted on the right
    pub delete_right: usize,
    /// Unresolved conflicts
    pub conflicts: usize,
    /// First few conflicts as (relative path, reason)
    pub first_conflicts: Vec<(PathBuf, String)>,
    /// All rows, including equal and inactive ones
    pub rows_total: usize,
    /// Bytes that will be copied
    pub data_to_process: u64,
}

impl SyncStatistics {
    /// Statistics over all folder pairs
    #[must_use]
    pub fn new(folder_cmp: &FolderComparison) -> Self {
        let mut stats = Self::default();
        for mapping in folder_cmp {
            stats.add_nodes(mapping.hierarchy(), mapping.hierarchy().ids());
        }
        stats
    }

    /// Statistics of a single folder pair
    #[must_use]
    pub fn for_mapping(mapping: &BaseDirMapping) -> Self {
        let mut stats = Self::default();
        stats.add_nodes(mapping.hierarchy(), mapping.hierarchy().ids());
        stats
    }

    /// Statistics of everything below `id`
    #[must_use]
    pub fn for_subtree(hierarchy: &Hierarchy, id: NodeId) -> Self {
        let mut stats = Self::default();
        stats.add_nodes(hierarchy, hierarchy.subtree(id));
        stats
    }

    fn add_nodes(&mut self, hierarchy: &Hierarchy, ids: Vec<NodeId>) {
        for id in ids {
            let node = hierarchy.node(id);
            self.rows_total += 1;
            match node.sync_operation() {
                SyncOperation::CreateNewLeft => {
                    self.create_left += 1;
                    self.data_to_process += node.size(Side::Right);
                }
                SyncOperation::CreateNewRight => {
                    self.create_right += 1;
                    self.data_to_process += node.size(Side::Left);
                }
                SyncOperation::OverwriteLeft => {
                    self.overwrite_left += 1;
                    self.data_to_process += node.size(Side::Right);
                }
                SyncOperation::OverwriteRight => {
                    self.overwrite_right += 1;
                    self.data_to_process += node.size(Side::Left);
                }
                SyncOperation::DeleteLeft => self.delete_left += 1,
                SyncOperation::DeleteRight => self.delete_right += 1,
                SyncOperation::UnresolvedConflict => {
                    self.conflicts += 1;
                    if self.first_conflicts.len() < MAX_CONFLICT_SAMPLES {
                        let reason = match node.direction() {
                            SyncDirection::Conflict(text) => text.clone(),
                            _ => node.category_description().to_string(),
                        };
                        self.first_conflicts.push((hierarchy.relative_path(id), reason));
                    }
                }
                SyncOperation::DoNothing | SyncOperation::Equal => {}
            }
        }
    }

    /// Items created on either side
    #[must_use]
    pub const fn create_count(&self) -> usize {
        self.create_left + self.create_right
    }

    /// Items overwritten on either side
    #[must_use]
    pub const fn overwrite_count(&self) -> usize {
        self.overwrite_left + self.overwrite_right
    }

    /// Items deleted on either side
    #[must_use]
    pub const fn delete_count(&self) -> usize {
        self.delete_left + self.delete_right
    }

    /// Items that will be touched on disk
    #[must_use]
    pub const fn operation_count(&self) -> usize {
        self.create_count() + self.overwrite_count() + self.delete_count()
    }

    /// Whether running a synchronization would do (or ask) anything
    ///
    /// Conflicts count: they need the user's attention.
    #[must_use]
    pub const fn synchronization_needed(&self) -> bool {
        self.operation_count() + self.conflicts != 0
    }

    /// Whether more than half of the rows change
    ///
    /// Copying into an empty side is not flagged.
    #[must_use]
    pub fn significant_difference_detected(&self) -> bool {
        let only_one_sided_creates = self.overwrite_count() == 0 && self.delete_count() == 0 && self.conflicts == 0;
        if only_one_sided_creates && (self.create_left == 0 || self.create_right == 0) {
            return false;
        }

        let changed = self.operation_count() + self.conflicts;
        changed >= SIGNIFICANT_ROWS && changed * 2 > self.rows_total
    }
}

fn signed(bytes: u64) -> i64 {
    i64::try_from(bytes).unwrap_or(i64::MAX)
}

/// Net bytes each side needs as (left, right)
///
/// Deleted data only frees space when it does not go to a recycle bin or
/// deletion folder on the same volume.
#[must_use]
pub fn disk_space_needed(mapping: &BaseDirMapping, left_uses_recycler: bool, right_uses_recycler: bool) -> (i64, i64) {
    let hierarchy = mapping.hierarchy();
    let (mut left, mut right) = (0i64, 0i64);

    for id in hierarchy.ids() {
        let node = hierarchy.node(id);
        let size_left = signed(node.size(Side::Left));
        let size_right = signed(node.size(Side::Right));
        match node.sync_operation() {
            SyncOperation::CreateNewLeft => left = left.saturating_add(size_right),
            SyncOperation::CreateNewRight => right = right.saturating_add(size_left),
            SyncOperation::DeleteLeft if !left_uses_recycler => left = left.saturating_sub(size_left),
            SyncOperation::DeleteRight if !right_uses_recycler => right = right.saturating_sub(size_right),
            SyncOperation::OverwriteLeft => {
                if !left_uses_recycler {
                    left = left.saturating_sub(size_left);
                }
                left = left.saturating_add(size_right);
            }
            SyncOperation::OverwriteRight => {
                if !right_uses_recycler {
                    right = right.saturating_sub(size_right);
                }
                right = right.saturating_add(size_left);
            }
            _ => {}
        }
    }
    (left, right)
}

/// Human readable byte count
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn format_bytes(bytes: u64) -> String {
    const UNITS: [&str; 5] = ["KB", "MB", "GB", "TB", "PB"];
    if bytes < 1024 {
        return format!("{bytes} bytes");
    }
    let mut value = bytes as f64 / 1024.0;
    let mut unit = 0;
    while value >= 1024.0 && unit + 1 < UNITS.len() {
        value /= 1024.0;
        unit += 1;
    }
    format!("{value:.1} {}", UNITS[unit])
}
