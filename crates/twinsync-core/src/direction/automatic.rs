//! Direction inference from the sync database
//!
//! An item side "changed" if it no longer matches what the database recorded
//! at the last successful run. Exactly one changed side propagates to the
//! other; anything else is a conflict.

use std::collections::HashMap;
use std::collections::hash_map::Entry;
use std::path::Path;

use super::{apply_explicit, moves, schedule_temp_item};
use crate::comparison::same_file_time;
use crate::database::{DirStatus, InSyncDir, InSyncFile, InSyncSymlink, InSyncType, load_last_synchronous_state};
use crate::error::DatabaseError;
use crate::hierarchy::{
    BaseDirMapping, CategoryDirections, CompareResult, CompareVariant, FileId, FileSystemObject, Hierarchy,
    NodeId, NodeKind, Side, SyncDirection,
};
use crate::status::ProcessCallback;

/// Tolerance when matching an item against its database record
pub(super) const DB_TIME_TOLERANCE: i64 = 2;

const TXT_BOTH_SIDES_CHANGED: &str = "Both sides have changed since last synchronization!";
const TXT_NO_SIDE_CHANGED: &str = "Cannot determine sync-direction: No change since last synchronization!";
const TXT_DB_NOT_IN_SYNC: &str = "The file was not processed by last synchronization!";
const TXT_DEFAULT_DIRECTIONS: &str =
    "Setting default synchronization directions: Old files will be overwritten with newer files.";

/// One-sided files by file id; `None` marks an id seen more than once
pub(super) type FileIdMap = HashMap<FileId, Option<NodeId>>;

pub(super) fn redetermine_auto<C>(mapping: &mut BaseDirMapping, database: &Path, callback: &mut C)
where
    C: ProcessCallback + ?Sized,
{
    if mapping.hierarchy().all_elements_equal() {
        return;
    }

    let last_sync_state = match load_last_synchronous_state(database) {
        Ok(db) => db,
        Err(DatabaseError::NotExisting(_)) => {
            tracing::info!(database = %database.display(), "no sync database yet, using two-way directions");
            apply_explicit(mapping.hierarchy_mut(), None, &CategoryDirections::two_way());
            return;
        }
        Err(err) => {
            tracing::warn!("{err}");
            let mut active = true;
            callback.report_warning(&format!("{err}\n\n{TXT_DEFAULT_DIRECTIONS}"), &mut active);
            apply_explicit(mapping.hierarchy_mut(), None, &CategoryDirections::two_way());
            return;
        }
    };

    let mut resolver = AutoResolver {
        variant: mapping.compare_variant(),
        tolerance: mapping.time_tolerance(),
        ex_left_only: FileIdMap::new(),
        ex_right_only: FileIdMap::new(),
    };
    let hierarchy = mapping.hierarchy_mut();
    hierarchy.clear_move_refs();
    resolver.recurse(hierarchy, None, Some(&last_sync_state));

    if !resolver.ex_left_only.is_empty() && !resolver.ex_right_only.is_empty() {
        moves::detect_renamed_files(
            hierarchy,
            &last_sync_state,
            &resolver.ex_left_only,
            &resolver.ex_right_only,
            resolver.variant,
            resolver.tolerance,
        );
    }
}

/// Whether a file record is still valid under the current compare settings
pub(super) fn file_still_in_sync(entry: &InSyncFile, variant: CompareVariant, tolerance: i64) -> bool {
    match variant {
        CompareVariant::ByTimeSize => {
            entry.in_sync_type == InSyncType::BinaryEqual
                || (same_file_time(entry.left.mtime, entry.right.mtime, tolerance)
                    && entry.left.size == entry.right.size)
        }
        CompareVariant::ByContent => entry.in_sync_type == InSyncType::BinaryEqual,
    }
}

fn symlink_still_in_sync(entry: &InSyncSymlink, variant: CompareVariant, tolerance: i64) -> bool {
    match variant {
        CompareVariant::ByTimeSize => {
            entry.in_sync_type == InSyncType::BinaryEqual
                || same_file_time(entry.left_mtime, entry.right_mtime, tolerance)
        }
        CompareVariant::ByContent => entry.in_sync_type == InSyncType::BinaryEqual,
    }
}

fn file_matches_db(node: &FileSystemObject, side: Side, db: Option<(&str, &InSyncFile)>) -> bool {
    let Some(current) = node.side(side) else {
        return db.is_none();
    };
    let Some((db_name, entry)) = db else {
        return false;
    };
    let recorded = match side {
        Side::Left => &entry.left,
        Side::Right => &entry.right,
    };
    current.name == db_name
        && same_file_time(current.mtime, recorded.mtime, DB_TIME_TOLERANCE)
        && current.size == recorded.size
}

fn symlink_matches_db(node: &FileSystemObject, side: Side, db: Option<(&str, &InSyncSymlink)>) -> bool {
    let Some(current) = node.side(side) else {
        return db.is_none();
    };
    let Some((db_name, entry)) = db else {
        return false;
    };
    let recorded = match side {
        Side::Left => entry.left_mtime,
        Side::Right => entry.right_mtime,
    };
    current.name == db_name && same_file_time(current.mtime, recorded, DB_TIME_TOLERANCE)
}

fn dir_matches_db(node: &FileSystemObject, side: Side, db: Option<(&str, &InSyncDir)>) -> bool {
    let usable = db.filter(|(_, dir)| dir.status != DirStatus::StrawMan);
    match (node.side(side), usable) {
        (None, usable) => usable.is_none(),
        (Some(_), None) => false,
        (Some(current), Some((db_name, _))) => current.name == db_name,
    }
}

/// Direction from the change status of both sides
///
/// `still_in_sync` is only consulted when exactly one side changed.
fn direction_from_changes(change_on_left: bool, change_on_right: bool, still_in_sync: bool) -> SyncDirection {
    match (change_on_left, change_on_right) {
        (true, false) | (false, true) if !still_in_sync => SyncDirection::Conflict(TXT_DB_NOT_IN_SYNC.to_string()),
        (true, false) => SyncDirection::Right,
        (false, true) => SyncDirection::Left,
        (true, true) => SyncDirection::Conflict(TXT_BOTH_SIDES_CHANGED.to_string()),
        (false, false) => SyncDirection::Conflict(TXT_NO_SIDE_CHANGED.to_string()),
    }
}

struct AutoResolver {
    variant: CompareVariant,
    tolerance: i64,
    ex_left_only: FileIdMap,
    ex_right_only: FileIdMap,
}

impl AutoResolver {
    fn recurse(&mut self, hierarchy: &mut Hierarchy, parent: Option<NodeId>, db: Option<&InSyncDir>) {
        let children = hierarchy.children(parent).to_vec();
        for id in children {
            match hierarchy.node(id).kind() {
                NodeKind::File => self.process_file(hierarchy, id, db),
                NodeKind::Symlink => self.process_symlink(hierarchy, id, db),
                NodeKind::Directory => self.process_dir(hierarchy, id, db),
            }
        }
    }

    fn remember_one_sided(&mut self, node: &FileSystemObject, id: NodeId) {
        let (map, side) = match node.category() {
            CompareResult::LeftOnly => (&mut self.ex_left_only, Side::Left),
            CompareResult::RightOnly => (&mut self.ex_right_only, Side::Right),
            _ => return,
        };
        if let Some(file_id) = node.file_id(side) {
            match map.entry(file_id) {
                Entry::Vacant(slot) => {
                    slot.insert(Some(id));
                }
                Entry::Occupied(mut slot) => {
                    slot.insert(None);
                }
            }
        }
    }

    fn process_file(&mut self, hierarchy: &mut Hierarchy, id: NodeId, db: Option<&InSyncDir>) {
        let node = hierarchy.node(id);
        if node.category() == CompareResult::Equal {
            hierarchy.set_direction(id, SyncDirection::None);
            return;
        }
        self.remember_one_sided(node, id);

        if schedule_temp_item(hierarchy, id) {
            return;
        }

        let node = hierarchy.node(id);
        let entry = db.and_then(|d| d.files.get_key_value(node.name()));
        let entry = entry.map(|(name, e)| (name.as_str(), e));

        let change_on_left = !file_matches_db(node, Side::Left, entry);
        let change_on_right = !file_matches_db(node, Side::Right, entry);
        let still_in_sync = entry.is_none_or(|(_, e)| file_still_in_sync(e, self.variant, self.tolerance));

        let direction = direction_from_changes(change_on_left, change_on_right, still_in_sync);
        hierarchy.set_direction(id, direction);
    }

    fn process_symlink(&self, hierarchy: &mut Hierarchy, id: NodeId, db: Option<&InSyncDir>) {
        let node = hierarchy.node(id);
        if node.category() == CompareResult::Equal {
            hierarchy.set_direction(id, SyncDirection::None);
            return;
        }
        if schedule_temp_item(hierarchy, id) {
            return;
        }

        let node = hierarchy.node(id);
        let entry = db.and_then(|d| d.symlinks.get_key_value(node.name()));
        let entry = entry.map(|(name, e)| (name.as_str(), e));

        let change_on_left = !symlink_matches_db(node, Side::Left, entry);
        let change_on_right = !symlink_matches_db(node, Side::Right, entry);
        let still_in_sync = entry.is_none_or(|(_, e)| symlink_still_in_sync(e, self.variant, self.tolerance));

        let direction = direction_from_changes(change_on_left, change_on_right, still_in_sync);
        hierarchy.set_direction(id, direction);
    }

    fn process_dir(&mut self, hierarchy: &mut Hierarchy, id: NodeId, db: Option<&InSyncDir>) {
        if schedule_temp_item(hierarchy, id) {
            return;
        }

        let node = hierarchy.node(id);
        let entry = db.and_then(|d| d.dirs.get_key_value(node.name()));
        let entry = entry.map(|(name, e)| (name.as_str(), e));

        let direction = if node.category() == CompareResult::Equal {
            SyncDirection::None
        } else {
            let change_on_left = !dir_matches_db(node, Side::Left, entry);
            let change_on_right = !dir_matches_db(node, Side::Right, entry);
            direction_from_changes(change_on_left, change_on_right, true)
        };
        hierarchy.set_direction(id, direction);

        self.recurse(hierarchy, Some(id), entry.map(|(_, sub)| sub));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::InSyncDescriptor;

    fn record(mtime: i64, size: u64) -> InSyncDescriptor {
        InSyncDescriptor {
            mtime,
            size,
            file_id: None,
        }
    }

    #[test]
    fn test_direction_from_changes() {
        assert_eq!(direction_from_changes(true, false, true), SyncDirection::Right);
        assert_eq!(direction_from_changes(false, true, true), SyncDirection::Left);
        assert_eq!(
            direction_from_changes(true, true, true),
            SyncDirection::Conflict(TXT_BOTH_SIDES_CHANGED.to_string())
        );
        assert_eq!(
            direction_from_changes(false, false, true),
            SyncDirection::Conflict(TXT_NO_SIDE_CHANGED.to_string())
        );
        assert_eq!(
            direction_from_changes(true, false, false),
            SyncDirection::Conflict(TXT_DB_NOT_IN_SYNC.to_string())
        );
    }

    #[test]
    fn test_still_in_sync_rules() {
        let attrs = InSyncFile {
            left: record(100, 5),
            right: record(102, 5),
            in_sync_type: InSyncType::AttributesEqual,
        };
        assert!(file_still_in_sync(&attrs, CompareVariant::ByTimeSize, 2));
        assert!(!file_still_in_sync(&attrs, CompareVariant::ByTimeSize, 1));
        assert!(!file_still_in_sync(&attrs, CompareVariant::ByContent, 2));

        let binary = InSyncFile {
            left: record(100, 5),
            right: record(900, 5),
            in_sync_type: InSyncType::BinaryEqual,
        };
        assert!(file_still_in_sync(&binary, CompareVariant::ByTimeSize, 2));
        assert!(file_still_in_sync(&binary, CompareVariant::ByContent, 2));
    }
}
