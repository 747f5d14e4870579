//! Persisted state of the last successful synchronization
//!
//! Automatic mode compares the current state of both sides against this
//! snapshot to find out which side changed. The snapshot only holds items
//! that were in sync; an item that stayed unequal after a run keeps the entry
//! it had before.

mod codec;

use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

pub use codec::{FORMAT_VERSION, MAGIC};

use crate::SYNC_DB_FILE_NAME;
use crate::error::DatabaseError;
use crate::hierarchy::{
    BaseDirMapping, CompareResult, CompareVariant, FileId, Hierarchy, NodeId, NodeKind, Side,
};
use crate::native;

/// How strongly a recorded pair was known to be equal
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InSyncType {
    /// Content was compared byte for byte
    BinaryEqual,
    /// Only size and modification time matched
    AttributesEqual,
}

/// Attributes of one side of a recorded file
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InSyncDescriptor {
    /// Modification time, seconds since the epoch
    pub mtime: i64,
    /// Size in bytes
    pub size: u64,
    /// File id at the time of the last run
    pub file_id: Option<FileId>,
}

/// Recorded file pair
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InSyncFile {
    /// Left side attributes
    pub left: InSyncDescriptor,
    /// Right side attributes
    pub right: InSyncDescriptor,
    /// Equality strength
    pub in_sync_type: InSyncType,
}

/// Recorded symlink pair
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InSyncSymlink {
    /// Left modification time
    pub left_mtime: i64,
    /// Right modification time
    pub right_mtime: i64,
    /// Equality strength
    pub in_sync_type: InSyncType,
}

/// Whether a recorded directory existed on both sides
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DirStatus {
    /// Existed on both sides
    Normal,
    /// Placeholder that only carries entries of its children
    StrawMan,
}

/// Recorded directory level, keyed by case-sensitive short name
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InSyncDir {
    /// Directory status (the root is always `Normal`)
    pub status: DirStatus,
    /// Files of this level
    pub files: BTreeMap<String, InSyncFile>,
    /// Symlinks of this level
    pub symlinks: BTreeMap<String, InSyncSymlink>,
    /// Subdirectories
    pub dirs: BTreeMap<String, InSyncDir>,
}

impl InSyncDir {
    /// Empty directory record
    #[must_use]
    pub const fn new(status: DirStatus) -> Self {
        Self {
            status,
            files: BTreeMap::new(),
            symlinks: BTreeMap::new(),
            dirs: BTreeMap::new(),
        }
    }

    /// Whether the level holds no entries at all
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.files.is_empty() && self.symlinks.is_empty() && self.dirs.is_empty()
    }
}

impl Default for InSyncDir {
    fn default() -> Self {
        Self::new(DirStatus::Normal)
    }
}

/// Default database location of a folder pair
#[must_use]
pub fn default_database_path(mapping: &BaseDirMapping) -> PathBuf {
    mapping.base(Side::Left).join(SYNC_DB_FILE_NAME)
}

/// Load a database file
///
/// # Errors
///
/// [`DatabaseError::NotExisting`] if there is no file yet,
/// [`DatabaseError::Incompatible`] for any format problem and
/// [`DatabaseError::Io`] if the file cannot be read.
pub fn load_last_synchronous_state(path: &Path) -> Result<InSyncDir, DatabaseError> {
    let data = match fs::read(path) {
        Ok(data) => data,
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            return Err(DatabaseError::NotExisting(path.to_path_buf()));
        }
        Err(source) => {
            return Err(DatabaseError::Io {
                path: path.to_path_buf(),
                source,
            });
        }
    };

    codec::decode(&data).map_err(|reason| DatabaseError::Incompatible {
        path: path.to_path_buf(),
        reason,
    })
}

/// Record the current state of `mapping` into the database at `path`
///
/// Equal items replace their entry, unequal items keep the previous one.
/// The file is written next to its destination and renamed into place.
///
/// # Errors
///
/// Returns [`DatabaseError::Io`] if the file cannot be written.
pub fn save_last_synchronous_state(mapping: &BaseDirMapping, path: &Path) -> Result<(), DatabaseError> {
    let previous = match load_last_synchronous_state(path) {
        Ok(db) => Some(db),
        Err(DatabaseError::NotExisting(_)) => None,
        Err(err) => {
            tracing::warn!("discarding previous database: {err}");
            None
        }
    };

    let in_sync_type = match mapping.compare_variant() {
        CompareVariant::ByContent => InSyncType::BinaryEqual,
        CompareVariant::ByTimeSize => InSyncType::AttributesEqual,
    };
    let recorder = Recorder {
        hierarchy: mapping.hierarchy(),
        in_sync_type,
    };
    let root = recorder.record_level(None, previous.as_ref(), DirStatus::Normal);

    write_atomic(path, &codec::encode(&root)).map_err(|source| DatabaseError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    tracing::debug!(path = %path.display(), "sync database saved");
    Ok(())
}

fn write_atomic(path: &Path, data: &[u8]) -> io::Result<()> {
    let temp = native::temp_path_for(path);
    let result = fs::write(&temp, data).and_then(|()| fs::rename(&temp, path));
    if result.is_err() {
        let _ = fs::remove_file(&temp);
    }
    result
}

/// Builds a database level from the hierarchy and the previous database
struct Recorder<'a> {
    hierarchy: &'a Hierarchy,
    in_sync_type: InSyncType,
}

impl Recorder<'_> {
    fn record_level(&self, parent: Option<NodeId>, previous: Option<&InSyncDir>, status: DirStatus) -> InSyncDir {
        let mut out = InSyncDir::new(status);

        for &id in self.hierarchy.children(parent) {
            let node = self.hierarchy.node(id);
            let name = node.name();
            let in_sync = node.category() == CompareResult::Equal
                && !node.is_empty(Side::Left)
                && !node.is_empty(Side::Right);

            match node.kind() {
                NodeKind::File => {
                    if in_sync {
                        let describe = |side: Side| InSyncDescriptor {
                            mtime: node.mtime(side),
                            size: node.size(side),
                            file_id: node.file_id(side),
                        };
                        out.files.insert(
                            name.to_string(),
                            InSyncFile {
                                left: describe(Side::Left),
                                right: describe(Side::Right),
                                in_sync_type: self.in_sync_type,
                            },
                        );
                    } else if let Some(old) = previous.and_then(|p| p.files.get(name)) {
                        out.files.insert(name.to_string(), *old);
                    }
                }
                NodeKind::Symlink => {
                    if in_sync {
                        out.symlinks.insert(
                            name.to_string(),
                            InSyncSymlink {
                                left_mtime: node.mtime(Side::Left),
                                right_mtime: node.mtime(Side::Right),
                                in_sync_type: self.in_sync_type,
                            },
                        );
                    } else if let Some(old) = previous.and_then(|p| p.symlinks.get(name)) {
                        out.symlinks.insert(name.to_string(), *old);
                    }
                }
                NodeKind::Directory => {
                    let old_sub = previous.and_then(|p| p.dirs.get(name));
                    if in_sync {
                        let sub = self.record_level(Some(id), old_sub, DirStatus::Normal);
                        out.dirs.insert(name.to_string(), sub);
                    } else {
                        let sub = self.record_level(Some(id), old_sub, DirStatus::StrawMan);
                        if !sub.is_empty() {
                            out.dirs.insert(name.to_string(), sub);
                        }
                    }
                }
            }
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hierarchy::ItemDescriptor;
    use tempfile::TempDir;

    fn mapping() -> BaseDirMapping {
        BaseDirMapping::new("/l", "/r", CompareVariant::ByTimeSize, 2)
    }

    #[test]
    fn test_missing_file_is_not_existing() {
        let tmp = TempDir::new().unwrap();
        let result = load_last_synchronous_state(&tmp.path().join(SYNC_DB_FILE_NAME));
        assert!(matches!(result, Err(DatabaseError::NotExisting(_))));
    }

    #[test]
    fn test_garbage_file_is_incompatible() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join(SYNC_DB_FILE_NAME);
        fs::write(&path, b"definitely not a database file at all, but long enough").unwrap();

        let result = load_last_synchronous_state(&path);

        assert!(matches!(result, Err(DatabaseError::Incompatible { .. })));
    }

    #[test]
    fn test_save_records_equal_items() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join(SYNC_DB_FILE_NAME);
        let mut m = mapping();
        let h = m.hierarchy_mut();
        let dir = h.add_dir(None, Some(ItemDescriptor::dir("d")), Some(ItemDescriptor::dir("d")));
        h.add_file(
            Some(dir),
            Some(ItemDescriptor::file("f", 3, 100)),
            Some(ItemDescriptor::file("f", 3, 101)),
        );
        h.add_file(None, Some(ItemDescriptor::file("new", 1, 1)), None);
        h.add_symlink(
            None,
            Some(ItemDescriptor::symlink("l", 5, "t")),
            Some(ItemDescriptor::symlink("l", 6, "t")),
        );

        save_last_synchronous_state(&m, &path).unwrap();
        let db = load_last_synchronous_state(&path).unwrap();

        assert_eq!(db.status, DirStatus::Normal);
        assert!(!db.files.contains_key("new"));
        assert_eq!(db.symlinks["l"].right_mtime, 6);
        let sub = &db.dirs["d"];
        assert_eq!(sub.status, DirStatus::Normal);
        let f = sub.files["f"];
        assert_eq!((f.left.mtime, f.right.mtime, f.left.size), (100, 101, 3));
        assert_eq!(f.in_sync_type, InSyncType::AttributesEqual);
        assert!(!native::temp_path_for(&path).exists());
    }

    #[test]
    fn test_unequal_items_keep_previous_entry() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join(SYNC_DB_FILE_NAME);

        let mut first = mapping();
        let dir = first
            .hierarchy_mut()
            .add_dir(None, Some(ItemDescriptor::dir("d")), Some(ItemDescriptor::dir("d")));
        first.hierarchy_mut().add_file(
            Some(dir),
            Some(ItemDescriptor::file("f", 3, 100)),
            Some(ItemDescriptor::file("f", 3, 100)),
        );
        save_last_synchronous_state(&first, &path).unwrap();

        // second run: the directory vanished on the right, the file is left-only
        let mut second = mapping();
        let dir = second.hierarchy_mut().add_dir(None, Some(ItemDescriptor::dir("d")), None);
        second
            .hierarchy_mut()
            .add_file(Some(dir), Some(ItemDescriptor::file("f", 3, 100)), None);
        save_last_synchronous_state(&second, &path).unwrap();

        let db = load_last_synchronous_state(&path).unwrap();
        let sub = &db.dirs["d"];
        assert_eq!(sub.status, DirStatus::StrawMan);
        assert_eq!(sub.files["f"].left.mtime, 100);
    }

    #[test]
    fn test_one_sided_directory_without_history_is_dropped() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join(SYNC_DB_FILE_NAME);
        let mut m = mapping();
        let dir = m.hierarchy_mut().add_dir(None, Some(ItemDescriptor::dir("d")), None);
        m.hierarchy_mut()
            .add_file(Some(dir), Some(ItemDescriptor::file("f", 1, 1)), None);

        save_last_synchronous_state(&m, &path).unwrap();

        assert!(load_last_synchronous_state(&path).unwrap().is_empty());
    }

    #[test]
    fn test_by_content_records_binary_equal() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join(SYNC_DB_FILE_NAME);
        let mut m = BaseDirMapping::new("/l", "/r", CompareVariant::ByContent, 2);
        m.hierarchy_mut().add_file(
            None,
            Some(ItemDescriptor::file("f", 1, 1)),
            Some(ItemDescriptor::file("f", 1, 900)),
        );

        save_last_synchronous_state(&m, &path).unwrap();

        let db = load_last_synchronous_state(&path).unwrap();
        assert_eq!(db.files["f"].in_sync_type, InSyncType::BinaryEqual);
    }
}
