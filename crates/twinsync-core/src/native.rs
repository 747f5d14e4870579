//! Filesystem primitives used by the comparator and synchronizer
//!
//! All functions report failures as [`FileError`] with the affected path in
//! the message. Long-running loops take an `on_chunk` hook that is called
//! once per buffer; returning an error from it (an abort) stops the loop.

#[cfg(unix)]
mod sys;

use std::fs::{self, File, Metadata};
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use walkdir::WalkDir;

use crate::TEMP_FILE_ENDING;
use crate::error::{FileError, Result};
use crate::hierarchy::{FileId, ItemDescriptor};

/// Buffer size for file copies
pub const COPY_BUFFER_SIZE: usize = 128 * 1024;

/// Buffer size for content comparison and verification
pub const COMPARE_BUFFER_SIZE: usize = 512 * 1024;

/// Seconds since the epoch (negative before 1970)
#[must_use]
pub fn to_unix_time(time: SystemTime) -> i64 {
    match time.duration_since(UNIX_EPOCH) {
        Ok(after) => i64::try_from(after.as_secs()).unwrap_or(i64::MAX),
        Err(before) => i64::try_from(before.duration().as_secs()).map_or(i64::MIN, |s| -s),
    }
}

/// Inverse of [`to_unix_time`]
#[must_use]
pub fn from_unix_time(secs: i64) -> SystemTime {
    if secs >= 0 {
        UNIX_EPOCH + Duration::from_secs(secs.unsigned_abs())
    } else {
        UNIX_EPOCH - Duration::from_secs(secs.unsigned_abs())
    }
}

/// Platform file id of `meta`
#[cfg(unix)]
#[must_use]
pub fn file_id(meta: &Metadata) -> Option<FileId> {
    use std::os::unix::fs::MetadataExt;
    Some(FileId {
        device: meta.dev(),
        inode: meta.ino(),
    })
}

/// Platform file id of `meta`
#[cfg(not(unix))]
#[must_use]
pub fn file_id(_meta: &Metadata) -> Option<FileId> {
    None
}

fn file_name_of(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default()
}

/// Build a descriptor from already fetched metadata
#[must_use]
pub fn descriptor_from_metadata(name: String, meta: &Metadata, link_target: Option<PathBuf>) -> ItemDescriptor {
    let mtime = meta.modified().map(to_unix_time).unwrap_or(0);
    let size = if meta.is_file() { meta.len() } else { 0 };
    ItemDescriptor {
        name,
        size,
        mtime,
        file_id: file_id(meta),
        link_target,
    }
}

/// Read the current attributes of `path`
///
/// With `follow_symlinks` unset, a symlink is described itself (lstat) and
/// its target path is recorded.
pub fn read_descriptor(path: &Path, follow_symlinks: bool) -> Result<ItemDescriptor> {
    let meta = if follow_symlinks {
        fs::metadata(path)
    } else {
        fs::symlink_metadata(path)
    }
    .map_err(|e| FileError::io("Cannot read file attributes of", path, e))?;

    let link_target = if meta.file_type().is_symlink() {
        Some(fs::read_link(path).map_err(|e| FileError::io("Cannot resolve symbolic link", path, e))?)
    } else {
        None
    };

    Ok(descriptor_from_metadata(file_name_of(path), &meta, link_target))
}

/// Path of the temporary file a copy to `target` is written to
#[must_use]
pub fn temp_path_for(target: &Path) -> PathBuf {
    let mut name = target.file_name().map(|n| n.to_os_string()).unwrap_or_default();
    name.push(TEMP_FILE_ENDING);
    target.with_file_name(name)
}

/// Copy a regular file
///
/// Data goes to a temporary file next to `target` which is renamed into place
/// once content, permissions and modification time are written. `on_chunk`
/// receives the size of every copied buffer. Returns the attributes of the
/// new file.
pub fn copy_file<F>(source: &Path, target: &Path, mut on_chunk: F) -> Result<ItemDescriptor>
where
    F: FnMut(u64) -> Result<()>,
{
    let source_meta =
        fs::metadata(source).map_err(|e| FileError::io("Cannot read file attributes of", source, e))?;
    let temp = temp_path_for(target);

    let result = (|| -> Result<()> {
        let mut input = File::open(source).map_err(|e| FileError::io("Cannot open file", source, e))?;
        let mut output = File::create(&temp).map_err(|e| FileError::io("Cannot write file", &temp, e))?;

        let mut buffer = vec![0u8; COPY_BUFFER_SIZE];
        loop {
            let read = input
                .read(&mut buffer)
                .map_err(|e| FileError::io("Cannot read file", source, e))?;
            if read == 0 {
                break;
            }
            output
                .write_all(&buffer[..read])
                .map_err(|e| FileError::io("Cannot write file", &temp, e))?;
            on_chunk(read as u64)?;
        }

        if let Ok(modified) = source_meta.modified() {
            output
                .set_modified(modified)
                .map_err(|e| FileError::io("Cannot write modification time of", &temp, e))?;
        }
        output
            .sync_all()
            .map_err(|e| FileError::io("Cannot write file", &temp, e))?;
        drop(output);

        fs::set_permissions(&temp, source_meta.permissions())
            .map_err(|e| FileError::io("Cannot write permissions of", &temp, e))?;
        fs::rename(&temp, target).map_err(|e| FileError::io("Cannot move file to", target, e))?;
        Ok(())
    })();

    if let Err(err) = result {
        // best effort: a leftover temp file is cleaned up by the next run
        let _ = fs::remove_file(&temp);
        return Err(err);
    }

    read_descriptor(target, false)
}

/// Compare two files byte by byte
///
/// `on_chunk` receives the number of bytes compared per buffer (per file).
pub fn files_have_same_content<F>(a: &Path, b: &Path, mut on_chunk: F) -> Result<bool>
where
    F: FnMut(u64) -> Result<()>,
{
    let mut file_a = File::open(a).map_err(|e| FileError::io("Cannot open file", a, e))?;
    let mut file_b = File::open(b).map_err(|e| FileError::io("Cannot open file", b, e))?;

    let mut buf_a = vec![0u8; COMPARE_BUFFER_SIZE];
    let mut buf_b = vec![0u8; COMPARE_BUFFER_SIZE];

    loop {
        let read_a = read_full(&mut file_a, &mut buf_a).map_err(|e| FileError::io("Cannot read file", a, e))?;
        let read_b = read_full(&mut file_b, &mut buf_b).map_err(|e| FileError::io("Cannot read file", b, e))?;

        if read_a != read_b || buf_a[..read_a] != buf_b[..read_b] {
            return Ok(false);
        }
        if read_a == 0 {
            return Ok(true);
        }
        on_chunk(read_a as u64)?;
    }
}

/// Fill `buf` as far as the file allows
fn read_full(file: &mut File, buf: &mut [u8]) -> io::Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        match file.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
            Err(e) => return Err(e),
        }
    }
    Ok(filled)
}

/// Re-read source and target after a copy and compare them
pub fn verify_file_copy<F>(source: &Path, target: &Path, on_chunk: F) -> Result<()>
where
    F: FnMut(u64) -> Result<()>,
{
    if files_have_same_content(source, target, on_chunk)? {
        Ok(())
    } else {
        Err(FileError::new(format!(
            "Data verification error: Source and target file have different content! \"{}\" -> \"{}\"",
            source.display(),
            target.display()
        ))
        .into())
    }
}

/// Recreate the symlink `source` at `target`
pub fn copy_symlink(source: &Path, target: &Path) -> Result<ItemDescriptor> {
    let link_target =
        fs::read_link(source).map_err(|e| FileError::io("Cannot resolve symbolic link", source, e))?;

    create_symlink(&link_target, target, source)?;
    read_descriptor(target, false)
}

#[cfg(unix)]
fn create_symlink(link_target: &Path, target: &Path, _source: &Path) -> Result<()> {
    std::os::unix::fs::symlink(link_target, target)
        .map_err(|e| FileError::io("Cannot create symbolic link", target, e).into())
}

#[cfg(windows)]
fn create_symlink(link_target: &Path, target: &Path, source: &Path) -> Result<()> {
    let is_dir = fs::metadata(source).is_ok_and(|m| m.is_dir());
    if is_dir {
        std::os::windows::fs::symlink_dir(link_target, target)
    } else {
        std::os::windows::fs::symlink_file(link_target, target)
    }
    .map_err(|e| FileError::io("Cannot create symbolic link", target, e).into())
}

/// Create a single directory; an existing directory is fine
pub fn create_directory(path: &Path) -> Result<()> {
    match fs::create_dir(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == io::ErrorKind::AlreadyExists && path.is_dir() => Ok(()),
        Err(e) => Err(FileError::io("Cannot create directory", path, e).into()),
    }
}

/// Create a directory and all missing parents
pub fn create_directory_recursive(path: &Path) -> Result<()> {
    fs::create_dir_all(path).map_err(|e| FileError::io("Cannot create directory", path, e).into())
}

/// Copy the modification time of directory `source` onto `target`
pub fn copy_directory_mtime(source: &Path, target: &Path) -> Result<()> {
    let modified = fs::metadata(source)
        .and_then(|m| m.modified())
        .map_err(|e| FileError::io("Cannot read file attributes of", source, e))?;
    set_mtime(target, modified)
}

/// Set the modification time of a file or directory
pub fn set_mtime(path: &Path, time: SystemTime) -> Result<()> {
    File::open(path)
        .and_then(|f| f.set_modified(time))
        .map_err(|e| FileError::io("Cannot write modification time of", path, e).into())
}

/// Delete a file or symlink; returns `false` if it did not exist
pub fn remove_file(path: &Path) -> Result<bool> {
    match fs::remove_file(path) {
        Ok(()) => Ok(true),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
        Err(e) => Err(FileError::io("Cannot delete file", path, e).into()),
    }
}

/// Delete a directory with all its content
///
/// `on_removed` is called for every deleted item below `path` with a flag
/// telling whether it was a directory.
pub fn remove_directory_recursive<F>(path: &Path, mut on_removed: F) -> Result<()>
where
    F: FnMut(&Path, bool) -> Result<()>,
{
    if fs::symlink_metadata(path).is_err() {
        return Ok(());
    }

    for entry in WalkDir::new(path).contents_first(true).follow_links(false) {
        let entry = entry.map_err(|e| {
            let at = e.path().unwrap_or(path).to_path_buf();
            FileError::io("Cannot read directory", &at, io::Error::other(e.to_string()))
        })?;
        let is_dir = entry.file_type().is_dir();
        if is_dir {
            fs::remove_dir(entry.path())
                .map_err(|e| FileError::io("Cannot delete directory", entry.path(), e))?;
        } else {
            fs::remove_file(entry.path())
                .map_err(|e| FileError::io("Cannot delete file", entry.path(), e))?;
        }
        if entry.depth() > 0 {
            on_removed(entry.path(), is_dir)?;
        }
    }
    Ok(())
}

/// Rename within one volume
pub fn rename_item(from: &Path, to: &Path) -> Result<()> {
    fs::rename(from, to).map_err(|e| {
        FileError::io(&format!("Cannot move \"{}\" to", from.display()), to, e).into()
    })
}

/// Move a file or directory, copying across volumes if needed
pub fn move_item(from: &Path, to: &Path) -> Result<()> {
    match fs::rename(from, to) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == io::ErrorKind::CrossesDevices => {
            copy_recursive(from, to)?;
            let meta = fs::symlink_metadata(from)
                .map_err(|e| FileError::io("Cannot read file attributes of", from, e))?;
            if meta.is_dir() {
                remove_directory_recursive(from, |_, _| Ok(()))
            } else {
                remove_file(from).map(|_| ())
            }
        }
        Err(e) => Err(FileError::io(&format!("Cannot move \"{}\" to", from.display()), to, e).into()),
    }
}

fn copy_recursive(from: &Path, to: &Path) -> Result<()> {
    for entry in WalkDir::new(from).follow_links(false) {
        let entry = entry.map_err(|e| {
            let at = e.path().unwrap_or(from).to_path_buf();
            FileError::io("Cannot read directory", &at, io::Error::other(e.to_string()))
        })?;
        let rel = entry.path().strip_prefix(from).unwrap_or(Path::new(""));
        let dest = to.join(rel);
        let file_type = entry.file_type();
        if file_type.is_dir() {
            create_directory_recursive(&dest)?;
        } else if file_type.is_symlink() {
            copy_symlink(entry.path(), &dest)?;
        } else {
            copy_file(entry.path(), &dest, |_| Ok(()))?;
        }
    }
    Ok(())
}

/// Whether two paths name the same directory once resolved
#[must_use]
pub fn same_directory(a: &Path, b: &Path) -> bool {
    if a == b {
        return true;
    }
    match (dunce::canonicalize(a), dunce::canonicalize(b)) {
        (Ok(a), Ok(b)) => a == b,
        _ => false,
    }
}

/// Whether two existing paths live on the same device
#[cfg(unix)]
#[must_use]
pub fn same_device(a: &Path, b: &Path) -> bool {
    use std::os::unix::fs::MetadataExt;
    match (fs::metadata(a), fs::metadata(b)) {
        (Ok(ma), Ok(mb)) => ma.dev() == mb.dev(),
        _ => false,
    }
}

/// Whether two existing paths live on the same device
#[cfg(not(unix))]
#[must_use]
pub fn same_device(_a: &Path, _b: &Path) -> bool {
    false
}

/// Bytes available to unprivileged users on the volume holding `path`
///
/// Walks up to the nearest existing ancestor. `None` if unknown.
#[cfg(unix)]
#[must_use]
pub fn free_disk_space(path: &Path) -> Option<u64> {
    let existing = path.ancestors().find(|p| p.exists())?;
    sys::statvfs_available(existing)
}

/// Numeric id of the user running the process
#[cfg(unix)]
#[must_use]
pub fn current_uid() -> u32 {
    sys::real_uid()
}

/// Bytes available on the volume holding `path`
#[cfg(not(unix))]
#[must_use]
pub fn free_disk_space(_path: &Path) -> Option<u64> {
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_unix_time_round_trip() {
        for secs in [0, 1, 1_700_000_000, -86_400] {
            assert_eq!(to_unix_time(from_unix_time(secs)), secs);
        }
    }

    #[test]
    fn test_copy_file_preserves_content_and_time() {
        let tmp = TempDir::new().unwrap();
        let source = tmp.path().join("source.txt");
        let target = tmp.path().join("target.txt");
        fs::write(&source, "hello world").unwrap();
        set_mtime(&source, from_unix_time(1_000_000)).unwrap();

        let mut copied = 0;
        let descriptor = copy_file(&source, &target, |n| {
            copied += n;
            Ok(())
        })
        .unwrap();

        assert_eq!(fs::read_to_string(&target).unwrap(), "hello world");
        assert_eq!(descriptor.size, 11);
        assert_eq!(descriptor.mtime, 1_000_000);
        assert_eq!(copied, 11);
        assert!(!temp_path_for(&target).exists());
    }

    #[test]
    fn test_copy_file_abort_removes_temp() {
        let tmp = TempDir::new().unwrap();
        let source = tmp.path().join("big.bin");
        let target = tmp.path().join("copy.bin");
        fs::write(&source, vec![7u8; COPY_BUFFER_SIZE * 3]).unwrap();

        let result = copy_file(&source, &target, |_| Err(crate::error::SyncError::Abort));

        assert!(matches!(result, Err(crate::error::SyncError::Abort)));
        assert!(!target.exists());
        assert!(!temp_path_for(&target).exists());
    }

    #[test]
    fn test_files_have_same_content() {
        let tmp = TempDir::new().unwrap();
        let a = tmp.path().join("a");
        let b = tmp.path().join("b");
        let c = tmp.path().join("c");
        fs::write(&a, "same").unwrap();
        fs::write(&b, "same").unwrap();
        fs::write(&c, "diff").unwrap();

        assert!(files_have_same_content(&a, &b, |_| Ok(())).unwrap());
        assert!(!files_have_same_content(&a, &c, |_| Ok(())).unwrap());
    }

    #[test]
    fn test_verify_file_copy_detects_mismatch() {
        let tmp = TempDir::new().unwrap();
        let a = tmp.path().join("a");
        let b = tmp.path().join("b");
        fs::write(&a, "one").unwrap();
        fs::write(&b, "two").unwrap();

        let err = verify_file_copy(&a, &b, |_| Ok(())).unwrap_err();
        assert!(err.to_string().contains("Data verification error"));
    }

    #[test]
    fn test_remove_directory_recursive_reports_items() {
        let tmp = TempDir::new().unwrap();
        let dir = tmp.path().join("dir");
        fs::create_dir_all(dir.join("sub")).unwrap();
        fs::write(dir.join("a.txt"), "a").unwrap();
        fs::write(dir.join("sub/b.txt"), "b").unwrap();

        let mut files = 0;
        let mut dirs = 0;
        remove_directory_recursive(&dir, |_, is_dir| {
            if is_dir {
                dirs += 1;
            } else {
                files += 1;
            }
            Ok(())
        })
        .unwrap();

        assert!(!dir.exists());
        assert_eq!(files, 2);
        assert_eq!(dirs, 1);
    }

    #[test]
    fn test_remove_file_missing_is_ok() {
        let tmp = TempDir::new().unwrap();
        assert!(!remove_file(&tmp.path().join("nope")).unwrap());
    }

    #[test]
    fn test_move_item_within_volume() {
        let tmp = TempDir::new().unwrap();
        let from = tmp.path().join("from.txt");
        let to = tmp.path().join("to.txt");
        fs::write(&from, "x").unwrap();

        move_item(&from, &to).unwrap();

        assert!(!from.exists());
        assert_eq!(fs::read_to_string(&to).unwrap(), "x");
    }

    #[cfg(unix)]
    #[test]
    fn test_copy_symlink() {
        let tmp = TempDir::new().unwrap();
        let link = tmp.path().join("link");
        std::os::unix::fs::symlink("some/target", &link).unwrap();

        let descriptor = copy_symlink(&link, &tmp.path().join("copy")).unwrap();

        assert_eq!(descriptor.link_target, Some(PathBuf::from("some/target")));
    }

    #[cfg(unix)]
    #[test]
    fn test_free_disk_space_known_on_unix() {
        let tmp = TempDir::new().unwrap();
        assert!(free_disk_space(&tmp.path().join("not/yet/created")).is_some());
    }
}
