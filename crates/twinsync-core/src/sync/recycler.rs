//! Move-to-trash following the freedesktop.org trash layout
//!
//! A trashed item is renamed into `<trash>/files/<name>` and described by
//! `<trash>/info/<name>.trashinfo`. Only trash directories on the same volume
//! as the deleted data are used, so trashing is always a rename: the user's
//! home trash if it shares the volume, otherwise `$topdir/.Trash/$uid` or
//! `$topdir/.Trash-$uid` at the top of the volume.
//!
//! Locating a trash never creates anything; the directories are made on the
//! first move.

use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use crate::error::{FileError, Result};
use crate::native;

/// Trash directory of the current user
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Trash {
    root: PathBuf,
    files: PathBuf,
    info: PathBuf,
}

impl Trash {
    /// Trash rooted at `root`
    pub(crate) fn at(root: &Path) -> Self {
        Self {
            root: root.to_path_buf(),
            files: root.join("files"),
            info: root.join("info"),
        }
    }

    /// The trash that can take items from `base_dir`, if any
    pub(crate) fn for_base_dir(base_dir: &Path) -> Option<Self> {
        let existing = base_dir.ancestors().find(|p| p.exists())?;
        let home_trash = dirs::data_dir().map(|dir| dir.join("Trash"));
        Self::locate(existing, home_trash.as_deref())
    }

    fn locate(existing_base: &Path, home_trash: Option<&Path>) -> Option<Self> {
        if let Some(home) = home_trash
            && let Some(home_existing) = home.ancestors().find(|p| p.exists())
            && native::same_device(home_existing, existing_base)
        {
            return Some(Self::at(home));
        }

        let root = volume_trash(&mount_root(existing_base)?);
        if root.is_none() {
            tracing::debug!(base = %existing_base.display(), "no trash directory on this volume");
        }
        root.map(|root| Self::at(&root))
    }

    fn ensure_layout(&self) -> Result<()> {
        if !self.root.exists() {
            native::create_directory_recursive(&self.root)?;
            restrict_to_owner(&self.root)?;
        }
        native::create_directory_recursive(&self.files)?;
        native::create_directory_recursive(&self.info)
    }

    /// Move `path` into the trash
    pub(crate) fn move_to_trash(&self, path: &Path) -> Result<()> {
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .ok_or_else(|| FileError::new(format!("Cannot move \"{}\" to the recycle bin", path.display())))?;
        let original = std::path::absolute(path).map_err(|e| FileError::io("Cannot resolve path", path, e))?;

        self.ensure_layout()?;
        let (stored_name, info_path) = self.write_info(&name, &original)?;

        if let Err(err) = native::rename_item(path, &self.files.join(&stored_name)) {
            if let Err(cleanup) = fs::remove_file(&info_path) {
                tracing::warn!(info = %info_path.display(), "cannot remove trash info: {cleanup}");
            }
            return Err(err);
        }
        tracing::debug!(path = %path.display(), name = %stored_name, "moved to trash");
        Ok(())
    }

    /// Reserve a free name by creating its info file
    fn write_info(&self, name: &str, original: &Path) -> Result<(String, PathBuf)> {
        let deletion_date = chrono::Local::now().format("%Y-%m-%dT%H:%M:%S");
        let content = format!(
            "[Trash Info]\nPath={}\nDeletionDate={deletion_date}\n",
            encode_path(original)
        );

        for attempt in 1u32.. {
            let candidate = if attempt == 1 {
                name.to_string()
            } else {
                format!("{name}.{attempt}")
            };
            if fs::symlink_metadata(self.files.join(&candidate)).is_ok() {
                continue;
            }

            let info_path = self.info.join(format!("{candidate}.trashinfo"));
            match OpenOptions::new().write(true).create_new(true).open(&info_path) {
                Ok(mut file) => {
                    file.write_all(content.as_bytes())
                        .map_err(|e| FileError::io("Cannot write file", &info_path, e))?;
                    return Ok((candidate, info_path));
                }
                Err(e) if e.kind() == io::ErrorKind::AlreadyExists => {}
                Err(e) => return Err(FileError::io("Cannot write file", &info_path, e).into()),
            }
        }
        Err(FileError::new(format!("Cannot move \"{}\" to the recycle bin", original.display())).into())
    }
}

/// Topmost ancestor of `path` on the same device
#[cfg(unix)]
fn mount_root(path: &Path) -> Option<PathBuf> {
    path.ancestors()
        .take_while(|p| native::same_device(p, path))
        .last()
        .map(Path::to_path_buf)
}

#[cfg(not(unix))]
fn mount_root(_path: &Path) -> Option<PathBuf> {
    None
}

/// Trash directory of the current user at the top of a volume
#[cfg(unix)]
fn volume_trash(topdir: &Path) -> Option<PathBuf> {
    topdir_trash(topdir, native::current_uid())
}

#[cfg(not(unix))]
fn volume_trash(_topdir: &Path) -> Option<PathBuf> {
    None
}

/// `$topdir/.Trash/$uid` if an administrator prepared `.Trash`, else `$topdir/.Trash-$uid`
#[cfg(unix)]
fn topdir_trash(topdir: &Path, uid: u32) -> Option<PathBuf> {
    use std::os::unix::fs::{MetadataExt, PermissionsExt};

    const STICKY: u32 = 0o1000;

    let shared = topdir.join(".Trash");
    // a symlinked or non-sticky .Trash must not be used
    if let Ok(meta) = fs::symlink_metadata(&shared)
        && meta.is_dir()
        && meta.permissions().mode() & STICKY != 0
    {
        return Some(shared.join(uid.to_string()));
    }

    let own = topdir.join(format!(".Trash-{uid}"));
    match fs::symlink_metadata(&own) {
        Ok(meta) => (meta.is_dir() && meta.uid() == uid).then_some(own),
        Err(_) => {
            let meta = fs::metadata(topdir).ok()?;
            let mode = meta.permissions().mode();
            let writable = (meta.uid() == uid && mode & 0o200 != 0) || mode & 0o002 != 0;
            writable.then_some(own)
        }
    }
}

#[cfg(unix)]
fn restrict_to_owner(dir: &Path) -> Result<()> {
    use std::os::unix::fs::PermissionsExt;

    fs::set_permissions(dir, fs::Permissions::from_mode(0o700))
        .map_err(|e| FileError::io("Cannot set permissions of", dir, e).into())
}

#[cfg(not(unix))]
fn restrict_to_owner(_dir: &Path) -> Result<()> {
    Ok(())
}

/// Percent-encode a path for the `Path=` key
fn encode_path(path: &Path) -> String {
    let raw = path.to_string_lossy();
    let mut out = String::with_capacity(raw.len());
    for byte in raw.bytes() {
        if byte.is_ascii_alphanumeric() || b"/-_.~".contains(&byte) {
            out.push(char::from(byte));
        } else {
            out.push_str(&format!("%{byte:02X}"));
        }
    }
    out
}
