//! Single-level directory listing with symlink policy

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use walkdir::WalkDir;

use crate::SYNC_DB_FILE_NAME;
use crate::error::{FileError, Result};
use crate::hierarchy::{ItemDescriptor, NodeKind};
use crate::native;
use crate::status::{ProcessCallback, try_reporting_error};

/// How symbolic links are treated
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SymlinkHandling {
    /// Skip symlinks entirely
    Exclude,
    /// Synchronize the link itself
    #[default]
    Direct,
    /// Synchronize what the link points to
    Follow,
}

/// One item found in a directory
#[derive(Debug, Clone)]
pub(crate) struct RawEntry {
    pub kind: NodeKind,
    pub descriptor: ItemDescriptor,
}

/// List the direct children of `dir`
///
/// A failure to read the directory itself or one of its items is reported
/// through `callback`; ignored items are left out of the result.
pub(crate) fn list_directory<C>(
    dir: &Path,
    symlinks: SymlinkHandling,
    callback: &mut C,
) -> Result<Vec<RawEntry>>
where
    C: ProcessCallback + ?Sized,
{
    let Some(paths) = try_reporting_error(callback, |_| read_child_paths(dir))? else {
        return Ok(Vec::new());
    };

    let mut entries = Vec::with_capacity(paths.len());
    for path in paths {
        callback.request_ui_refresh()?;
        if let Some(Some(entry)) = try_reporting_error(callback, |_| classify(&path, symlinks))? {
            entries.push(entry);
        }
    }
    Ok(entries)
}

fn read_child_paths(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut paths = Vec::new();
    for entry in WalkDir::new(dir)
        .min_depth(1)
        .max_depth(1)
        .follow_links(false)
        .sort_by_file_name()
    {
        let entry = entry.map_err(|e| {
            let at = e.path().unwrap_or(dir).to_path_buf();
            FileError::io("Cannot read directory", &at, std::io::Error::other(e.to_string()))
        })?;
        if entry.file_name() == SYNC_DB_FILE_NAME {
            continue;
        }
        paths.push(entry.into_path());
    }
    Ok(paths)
}

fn classify(path: &Path, symlinks: SymlinkHandling) -> Result<Option<RawEntry>> {
    let name = path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_default()
        .into_string()
        .map_err(|raw| {
            FileError::new(format!(
                "File name is not valid Unicode: \"{}\"",
                PathBuf::from(raw).display()
            ))
        })?;

    let meta = fs::symlink_metadata(path).map_err(|e| FileError::io("Cannot read file attributes of", path, e))?;

    if meta.file_type().is_symlink() {
        return match symlinks {
            SymlinkHandling::Exclude => Ok(None),
            SymlinkHandling::Direct => {
                let target = fs::read_link(path).map_err(|e| FileError::io("Cannot resolve symbolic link", path, e))?;
                Ok(Some(RawEntry {
                    kind: NodeKind::Symlink,
                    descriptor: native::descriptor_from_metadata(name, &meta, Some(target)),
                }))
            }
            SymlinkHandling::Follow => {
                let target_meta =
                    fs::metadata(path).map_err(|e| FileError::io("Cannot resolve symbolic link", path, e))?;
                Ok(Some(plain_entry(name, &target_meta)))
            }
        };
    }

    if meta.is_dir() || meta.is_file() {
        Ok(Some(plain_entry(name, &meta)))
    } else {
        tracing::debug!("skipping special file {}", path.display());
        Ok(None)
    }
}

fn plain_entry(name: String, meta: &fs::Metadata) -> RawEntry {
    let kind = if meta.is_dir() { NodeKind::Directory } else { NodeKind::File };
    RawEntry {
        kind,
        descriptor: native::descriptor_from_metadata(name, meta, None),
    }
}
