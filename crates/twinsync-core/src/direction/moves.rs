//! Rename detection
//!
//! A file renamed on one side shows up as a create of the new name plus a
//! delete of the old name. If the database record of the old name carries
//! file ids that match a left-only and a right-only item with unchanged size
//! and time, the two items are paired through their move references.
//!
//! File ids are not stable on every filesystem (FAT changes them on rename),
//! so a missed pair is expected there and simply falls back to create plus
//! delete.

use super::automatic::{DB_TIME_TOLERANCE, FileIdMap, file_still_in_sync};
use crate::comparison::same_file_time;
use crate::database::{InSyncDescriptor, InSyncDir, InSyncFile};
use crate::hierarchy::{CompareVariant, Hierarchy, NodeId, Side};

pub(super) fn detect_renamed_files(
    hierarchy: &mut Hierarchy,
    db: &InSyncDir,
    ex_left_only: &FileIdMap,
    ex_right_only: &FileIdMap,
    variant: CompareVariant,
    tolerance: i64,
) {
    for entry in db.files.values() {
        if let Some((left, right)) = find_move_pair(hierarchy, entry, ex_left_only, ex_right_only, variant, tolerance) {
            tracing::debug!(
                from = %hierarchy.relative_path(right).display(),
                to = %hierarchy.relative_path(left).display(),
                "detected renamed file"
            );
            hierarchy.set_move_pair(left, right);
        }
    }
    for sub in db.dirs.values() {
        detect_renamed_files(hierarchy, sub, ex_left_only, ex_right_only, variant, tolerance);
    }
}

fn same_size_and_date(hierarchy: &Hierarchy, id: NodeId, side: Side, recorded: &InSyncDescriptor) -> bool {
    let node = hierarchy.node(id);
    node.size(side) == recorded.size && same_file_time(node.mtime(side), recorded.mtime, DB_TIME_TOLERANCE)
}

fn find_move_pair(
    hierarchy: &Hierarchy,
    entry: &InSyncFile,
    ex_left_only: &FileIdMap,
    ex_right_only: &FileIdMap,
    variant: CompareVariant,
    tolerance: i64,
) -> Option<(NodeId, NodeId)> {
    let left_id = entry.left.file_id?;
    let right_id = entry.right.file_id?;
    if !file_still_in_sync(entry, variant, tolerance) {
        return None;
    }

    let left = (*ex_left_only.get(&left_id)?)?;
    if !same_size_and_date(hierarchy, left, Side::Left, &entry.left) {
        return None;
    }
    let right = (*ex_right_only.get(&right_id)?)?;
    if !same_size_and_date(hierarchy, right, Side::Right, &entry.right) {
        return None;
    }

    // a row never takes part in two move pairs
    let unpaired = hierarchy.node(left).move_ref().is_none() && hierarchy.node(right).move_ref().is_none();
    unpaired.then_some((left, right))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::{DirStatus, InSyncType};
    use crate::hierarchy::{FileId, ItemDescriptor};

    fn id(inode: u64) -> Option<FileId> {
        Some(FileId { device: 1, inode })
    }

    fn db_with(name: &str, left: Option<FileId>, right: Option<FileId>) -> InSyncDir {
        let mut db = InSyncDir::new(DirStatus::Normal);
        db.files.insert(
            name.to_string(),
            InSyncFile {
                left: InSyncDescriptor {
                    mtime: 1000,
                    size: 10,
                    file_id: left,
                },
                right: InSyncDescriptor {
                    mtime: 1000,
                    size: 10,
                    file_id: right,
                },
                in_sync_type: InSyncType::AttributesEqual,
            },
        );
        db
    }

    fn renamed_tree() -> (Hierarchy, NodeId, NodeId, FileIdMap, FileIdMap) {
        let mut h = Hierarchy::new();
        let new = h.add_file(
            None,
            Some(ItemDescriptor::file("new.txt", 10, 1000).with_file_id(id(5))),
            None,
        );
        let old = h.add_file(
            None,
            None,
            Some(ItemDescriptor::file("old.txt", 10, 1001).with_file_id(id(9))),
        );
        let left = FileIdMap::from([(FileId { device: 1, inode: 5 }, Some(new))]);
        let right = FileIdMap::from([(FileId { device: 1, inode: 9 }, Some(old))]);
        (h, new, old, left, right)
    }

    #[test]
    fn test_pair_detected() {
        let (mut h, new, old, left, right) = renamed_tree();
        let db = db_with("old.txt", id(5), id(9));

        detect_renamed_files(&mut h, &db, &left, &right, CompareVariant::ByTimeSize, 2);

        assert_eq!(h.node(new).move_ref(), Some(old));
        assert_eq!(h.node(old).move_ref(), Some(new));
    }

    #[test]
    fn test_missing_file_id_prevents_pairing() {
        let (mut h, new, _, left, right) = renamed_tree();
        let db = db_with("old.txt", id(5), None);

        detect_renamed_files(&mut h, &db, &left, &right, CompareVariant::ByTimeSize, 2);

        assert_eq!(h.node(new).move_ref(), None);
    }

    #[test]
    fn test_duplicate_id_prevents_pairing() {
        let (mut h, new, _, _, right) = renamed_tree();
        let left = FileIdMap::from([(FileId { device: 1, inode: 5 }, None)]);
        let db = db_with("old.txt", id(5), id(9));

        detect_renamed_files(&mut h, &db, &left, &right, CompareVariant::ByTimeSize, 2);

        assert_eq!(h.node(new).move_ref(), None);
    }

    #[test]
    fn test_changed_size_prevents_pairing() {
        let (mut h, new, _, left, right) = renamed_tree();
        let mut db = db_with("old.txt", id(5), id(9));
        if let Some(entry) = db.files.get_mut("old.txt") {
            entry.left.size = 11;
            entry.right.size = 11;
        }

        detect_renamed_files(&mut h, &db, &left, &right, CompareVariant::ByTimeSize, 2);

        assert_eq!(h.node(new).move_ref(), None);
    }
}
