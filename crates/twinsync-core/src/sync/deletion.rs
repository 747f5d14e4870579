//! Deletion policies applied to deleted and overwritten items

use std::fs;
use std::path::{Path, PathBuf};

use super::recycler::Trash;
use crate::error::Result;
use crate::native;
use crate::status::ProcessCallback;

/// Format of the per-run folder below a custom deletion directory
const SESSION_DIR_FORMAT: &str = "%Y-%m-%d %H-%M-%S";

#[derive(Debug)]
enum Policy {
    Permanent,
    Recycler(Trash),
    CustomDirectory {
        root: PathBuf,
        session: Option<PathBuf>,
    },
}

/// Removes items from one side of a folder pair
#[derive(Debug)]
pub(crate) struct DeletionHandler {
    policy: Policy,
}

impl DeletionHandler {
    pub(crate) const fn permanent() -> Self {
        Self {
            policy: Policy::Permanent,
        }
    }

    pub(crate) const fn recycler(trash: Trash) -> Self {
        Self {
            policy: Policy::Recycler(trash),
        }
    }

    /// Move items below `root`; the dated session folder is created on first use
    pub(crate) const fn custom_directory(root: PathBuf) -> Self {
        Self {
            policy: Policy::CustomDirectory { root, session: None },
        }
    }

    /// Whether deleted data stays on disk
    pub(crate) const fn keeps_deleted_data(&self) -> bool {
        !matches!(self.policy, Policy::Permanent)
    }

    /// Delete a file or symlink at `path`; `rel` is its path below the base directory
    pub(crate) fn remove_file<C>(&mut self, path: &Path, rel: &Path, callback: &mut C) -> Result<()>
    where
        C: ProcessCallback + ?Sized,
    {
        if fs::symlink_metadata(path).is_err() {
            return Ok(());
        }
        match &mut self.policy {
            Policy::Permanent => {
                callback.report_info(&format!("Deleting file \"{}\"", path.display()));
                native::remove_file(path).map(|_| ())
            }
            Policy::Recycler(trash) => {
                callback.report_info(&format!("Moving \"{}\" to the recycle bin", path.display()));
                trash.move_to_trash(path)
            }
            Policy::CustomDirectory { root, session } => {
                callback.report_info(&format!("Moving file \"{}\" to the deletion folder", path.display()));
                move_to_session(root, session, path, rel)
            }
        }
    }

    /// Delete the directory at `path` with everything below it
    pub(crate) fn remove_dir<C>(&mut self, path: &Path, rel: &Path, callback: &mut C) -> Result<()>
    where
        C: ProcessCallback + ?Sized,
    {
        if fs::symlink_metadata(path).is_err() {
            return Ok(());
        }
        match &mut self.policy {
            Policy::Permanent => {
                callback.report_info(&format!("Deleting folder \"{}\"", path.display()));
                native::remove_directory_recursive(path, |_, _| callback.request_ui_refresh())
            }
            Policy::Recycler(trash) => {
                callback.report_info(&format!("Moving \"{}\" to the recycle bin", path.display()));
                trash.move_to_trash(path)
            }
            Policy::CustomDirectory { root, session } => {
                callback.report_info(&format!("Moving folder \"{}\" to the deletion folder", path.display()));
                move_to_session(root, session, path, rel)
            }
        }
    }
}

fn move_to_session(root: &Path, session: &mut Option<PathBuf>, path: &Path, rel: &Path) -> Result<()> {
    let session_dir = match session {
        Some(dir) => dir.clone(),
        None => {
            let dir = session_directory(root, &chrono::Local::now().format(SESSION_DIR_FORMAT).to_string());
            native::create_directory_recursive(&dir)?;
            tracing::info!(dir = %dir.display(), "created deletion folder");
            *session = Some(dir.clone());
            dir
        }
    };

    let target = session_dir.join(rel);
    if let Some(parent) = target.parent() {
        native::create_directory_recursive(parent)?;
    }
    native::move_item(path, &target)
}

/// First free `<root>/<name>` or `<root>/<name>_N`
fn session_directory(root: &Path, name: &str) -> PathBuf {
    let first = root.join(name);
    if !first.exists() {
        return first;
    }
    (1u32..)
        .map(|n| root.join(format!("{name}_{n}")))
        .find(|candidate| !candidate.exists())
        .unwrap_or(first)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::status::CollectingCallback;
    use tempfile::TempDir;

    #[test]
    fn test_session_directory_suffix() {
        let tmp = TempDir::new().unwrap();
        let name = "2024-01-31 12-00-00";
        assert_eq!(session_directory(tmp.path(), name), tmp.path().join(name));

        fs::create_dir(tmp.path().join(name)).unwrap();
        fs::create_dir(tmp.path().join(format!("{name}_1"))).unwrap();
        assert_eq!(session_directory(tmp.path(), name), tmp.path().join(format!("{name}_2")));
    }

    #[test]
    fn test_permanent_remove() {
        let tmp = TempDir::new().unwrap();
        let file = tmp.path().join("f.txt");
        let dir = tmp.path().join("d");
        fs::write(&file, "x").unwrap();
        fs::create_dir_all(dir.join("inner")).unwrap();
        let mut callback = CollectingCallback::new();
        let mut handler = DeletionHandler::permanent();

        handler.remove_file(&file, Path::new("f.txt"), &mut callback).unwrap();
        handler.remove_dir(&dir, Path::new("d"), &mut callback).unwrap();

        assert!(!file.exists());
        assert!(!dir.exists());
        assert!(!handler.keeps_deleted_data());
        assert!(callback.infos.iter().any(|line| line.starts_with("Deleting file")));
    }

    #[test]
    fn test_missing_item_is_fine() {
        let tmp = TempDir::new().unwrap();
        let mut callback = CollectingCallback::new();
        let mut handler = DeletionHandler::custom_directory(tmp.path().join("deleted"));

        handler
            .remove_file(&tmp.path().join("nope"), Path::new("nope"), &mut callback)
            .unwrap();

        // nothing was moved, so no session folder either
        assert!(!tmp.path().join("deleted").exists());
    }

    #[test]
    fn test_custom_directory_keeps_relative_path() {
        let tmp = TempDir::new().unwrap();
        let base = tmp.path().join("base");
        fs::create_dir_all(base.join("a/b")).unwrap();
        fs::write(base.join("a/b/c.txt"), "data").unwrap();
        fs::write(base.join("top.txt"), "top").unwrap();
        let mut callback = CollectingCallback::new();
        let mut handler = DeletionHandler::custom_directory(tmp.path().join("deleted"));

        handler
            .remove_file(&base.join("a/b/c.txt"), Path::new("a/b/c.txt"), &mut callback)
            .unwrap();
        handler
            .remove_file(&base.join("top.txt"), Path::new("top.txt"), &mut callback)
            .unwrap();

        let sessions: Vec<_> = fs::read_dir(tmp.path().join("deleted")).unwrap().collect();
        assert_eq!(sessions.len(), 1);
        let session = sessions[0].as_ref().unwrap().path();
        assert_eq!(fs::read_to_string(session.join("a/b/c.txt")).unwrap(), "data");
        assert_eq!(fs::read_to_string(session.join("top.txt")).unwrap(), "top");
        assert!(!base.join("a/b/c.txt").exists());
        assert!(handler.keeps_deleted_data());
    }
}
