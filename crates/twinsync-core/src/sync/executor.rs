//! Execution of one folder pair's plan
//!
//! Runs in three passes over the tree: detected renames, then deletions
//! (to free space and clear names), then creates and overwrites. The model
//! is updated after every successful item so it always describes what is
//! on disk, even after an abort.

use std::path::Path;

use super::deletion::DeletionHandler;
use super::statistics::SyncStatistics;
use super::{FolderPairSyncCfg, SyncResult};
use crate::comparison::SymlinkHandling;
use crate::error::{FileError, Result, SyncError};
use crate::hierarchy::{
    BaseDirMapping, CompareResult, FileSystemObject, ItemDescriptor, NodeId, NodeKind, Side, SyncOperation,
};
use crate::native;
use crate::status::{ProcessCallback, try_reporting_error};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Pass {
    DeleteOnly,
    Remaining,
}

impl Pass {
    fn includes(self, node: &FileSystemObject) -> bool {
        if node.sync_operation().target_side().is_none() {
            return false;
        }
        match self {
            Self::DeleteOnly => deletes_only(node),
            Self::Remaining => !deletes_only(node),
        }
    }
}

/// Whether the item's operation only removes its target
fn deletes_only(node: &FileSystemObject) -> bool {
    match node.sync_operation() {
        SyncOperation::DeleteLeft | SyncOperation::DeleteRight => true,
        SyncOperation::OverwriteLeft => node.is_empty(Side::Right),
        SyncOperation::OverwriteRight => node.is_empty(Side::Left),
        _ => false,
    }
}

/// Side the item will be newly created on
fn created_on(node: &FileSystemObject) -> Option<Side> {
    let target = node.sync_operation().target_side()?;
    (node.is_empty(target) && !node.is_empty(target.opposite())).then_some(target)
}

fn signed(bytes: u64) -> i64 {
    i64::try_from(bytes).unwrap_or(i64::MAX)
}

pub(super) struct FolderPairSync<'a> {
    mapping: &'a mut BaseDirMapping,
    left_deletion: DeletionHandler,
    right_deletion: DeletionHandler,
    symlinks: SymlinkHandling,
    verify_copied_files: bool,
    result: SyncResult,
}

impl<'a> FolderPairSync<'a> {
    pub(super) fn new(
        mapping: &'a mut BaseDirMapping,
        (left_deletion, right_deletion): (DeletionHandler, DeletionHandler),
        cfg: &FolderPairSyncCfg,
    ) -> Self {
        Self {
            mapping,
            left_deletion,
            right_deletion,
            symlinks: cfg.symlinks,
            verify_copied_files: cfg.verify_copied_files,
            result: SyncResult::default(),
        }
    }

    /// Counters of what was done so far
    pub(super) fn into_result(self) -> SyncResult {
        self.result
    }

    pub(super) fn run<C>(&mut self, callback: &mut C) -> Result<()>
    where
        C: ProcessCallback + ?Sized,
    {
        for side in [Side::Left, Side::Right] {
            self.ensure_base_dir(side, callback)?;
        }
        self.execute_renames(callback)?;
        self.execute_level(None, Pass::DeleteOnly, callback)?;
        self.execute_level(None, Pass::Remaining, callback)
    }

    fn deletion_mut(&mut self, side: Side) -> &mut DeletionHandler {
        match side {
            Side::Left => &mut self.left_deletion,
            Side::Right => &mut self.right_deletion,
        }
    }

    /// Run one item operation with retry/ignore handling
    ///
    /// Returns `false` if the user chose to ignore a failure.
    fn run_item<C, F>(&mut self, callback: &mut C, mut op: F) -> Result<bool>
    where
        C: ProcessCallback + ?Sized,
        F: FnMut(&mut Self, &mut C) -> Result<()>,
    {
        let mut last_error = None;
        let outcome = try_reporting_error(callback, |cb| {
            let result = op(&mut *self, cb);
            if let Err(SyncError::File(err)) = &result {
                last_error = Some(err.message().to_string());
            }
            result
        })?;

        if outcome.is_none() {
            self.result.errors.extend(last_error);
            return Ok(false);
        }
        Ok(true)
    }

    /// Create a missing base directory that receives new items
    fn ensure_base_dir<C>(&mut self, side: Side, callback: &mut C) -> Result<()>
    where
        C: ProcessCallback + ?Sized,
    {
        let base = self.mapping.base(side).to_path_buf();
        if base.as_os_str().is_empty() || base.is_dir() {
            return Ok(());
        }
        let hierarchy = self.mapping.hierarchy();
        let receives_items = hierarchy.ids().into_iter().any(|id| {
            let node = hierarchy.node(id);
            node.sync_operation().target_side() == Some(side) && !deletes_only(node)
        });
        if !receives_items {
            return Ok(());
        }

        callback.report_info(&format!("Creating folder \"{}\"", base.display()));
        self.run_item(callback, |_, _| native::create_directory_recursive(&base))?;
        Ok(())
    }

    /// Realize detected renames as a rename on the target side
    ///
    /// A pair qualifies when one row creates an item on a side and its move
    /// partner deletes the old name on the same side. Anything that does not
    /// work out is left to the regular delete and copy passes.
    fn execute_renames<C>(&mut self, callback: &mut C) -> Result<()>
    where
        C: ProcessCallback + ?Sized,
    {
        let hierarchy = self.mapping.hierarchy();
        let candidates: Vec<(NodeId, NodeId, Side)> = hierarchy
            .ids()
            .into_iter()
            .filter_map(|id| {
                let node = hierarchy.node(id);
                let partner = node.move_ref()?;
                let (side, delete) = match node.sync_operation() {
                    SyncOperation::CreateNewLeft => (Side::Left, SyncOperation::DeleteLeft),
                    SyncOperation::CreateNewRight => (Side::Right, SyncOperation::DeleteRight),
                    _ => return None,
                };
                (hierarchy.node(partner).sync_operation() == delete).then_some((id, partner, side))
            })
            .collect();

        for (created, deleted, side) in candidates {
            let hierarchy = self.mapping.hierarchy();
            let parent_exists = hierarchy
                .node(created)
                .parent()
                .is_none_or(|parent| !hierarchy.node(parent).is_empty(side));
            if !parent_exists {
                continue;
            }

            callback.request_ui_refresh()?;
            let from = self.mapping.full_path(deleted, side);
            let to = self.mapping.full_path(created, side);
            callback.report_info(&format!("Renaming file \"{}\" to \"{}\"", from.display(), to.display()));

            match native::rename_item(&from, &to).and_then(|()| native::read_descriptor(&to, false)) {
                Ok(descriptor) => {
                    let size = signed(descriptor.size);
                    let hierarchy = self.mapping.hierarchy_mut();
                    hierarchy.synchronize_sides(created, side, descriptor);
                    hierarchy.remove_object(deleted, side);
                    self.result.renamed += 1;
                    callback.update_processed_data(2, size);
                }
                Err(err) => {
                    tracing::debug!(from = %from.display(), "rename not possible, copying instead: {err}");
                }
            }
        }
        Ok(())
    }

    fn execute_level<C>(&mut self, parent: Option<NodeId>, pass: Pass, callback: &mut C) -> Result<()>
    where
        C: ProcessCallback + ?Sized,
    {
        let hierarchy = self.mapping.hierarchy();
        let (dirs, items): (Vec<NodeId>, Vec<NodeId>) = hierarchy
            .children(parent)
            .iter()
            .copied()
            .partition(|&id| hierarchy.node(id).is_dir());

        for id in items {
            if pass.includes(self.mapping.hierarchy().node(id)) {
                self.run_item(callback, |this, cb| this.synchronize_file(id, cb))?;
            }
        }

        for id in dirs {
            let node = self.mapping.hierarchy().node(id);
            let created = created_on(node);
            let mut descend = true;
            if pass.includes(node) {
                descend = self.run_item(callback, |this, cb| this.synchronize_dir(id, cb))?;
            }

            let node = self.mapping.hierarchy().node(id);
            if !descend || (node.is_empty(Side::Left) && node.is_empty(Side::Right)) {
                continue;
            }
            self.execute_level(Some(id), pass, callback)?;

            // after the children, or copying them would touch the time again
            if pass == Pass::Remaining
                && let Some(target) = created
            {
                self.run_item(callback, |this, _| this.copy_directory_time(id, target))?;
            }
        }
        Ok(())
    }

    fn copy_directory_time(&self, id: NodeId, target: Side) -> Result<()> {
        let source = self.mapping.full_path(id, target.opposite());
        let target = self.mapping.full_path(id, target);
        native::copy_directory_mtime(&source, &target)
    }

    /// Fix a name that differs in case only
    fn rename_to_source_name(&mut self, id: NodeId, target: Side) -> Result<()> {
        let node = self.mapping.hierarchy().node(id);
        let source_name = node.name_on(target.opposite()).to_string();
        let from = self.mapping.full_path(id, target);
        let to = from.with_file_name(&source_name);
        if from != to {
            native::rename_item(&from, &to)?;
        }
        let descriptor = native::read_descriptor(&to, false)?;
        self.mapping.hierarchy_mut().synchronize_sides(id, target, descriptor);
        Ok(())
    }

    fn synchronize_file<C>(&mut self, id: NodeId, callback: &mut C) -> Result<()>
    where
        C: ProcessCallback + ?Sized,
    {
        let node = self.mapping.hierarchy().node(id);
        let Some(target) = node.sync_operation().target_side() else {
            return Ok(());
        };
        let source = target.opposite();
        let kind = node.kind();
        let has_source = !node.is_empty(source);
        let has_target = !node.is_empty(target);
        let only_name_differs = node.category() == CompareResult::DifferentMetadata && has_source && has_target;

        callback.request_ui_refresh()?;

        if only_name_differs {
            self.rename_to_source_name(id, target)?;
            self.result.overwritten += 1;
            callback.update_processed_data(1, 0);
            return Ok(());
        }

        if has_target {
            let path = self.mapping.full_path(id, target);
            let rel = self.mapping.hierarchy().relative_path_on(id, target);
            self.deletion_mut(target).remove_file(&path, &rel, callback)?;
            // the model follows the disk even if the copy below fails
            self.mapping.hierarchy_mut().remove_object(id, target);
        }

        if has_source {
            let from = self.mapping.full_path(id, source);
            let to = self.mapping.full_path(id, target);
            let descriptor = self.copy_item(kind, &from, &to, callback)?;
            self.mapping.hierarchy_mut().synchronize_sides(id, target, descriptor);
            if has_target {
                self.result.overwritten += 1;
            } else {
                self.result.created += 1;
            }
        } else {
            self.result.deleted += 1;
        }

        callback.update_processed_data(1, 0);
        Ok(())
    }

    fn copy_item<C>(&self, kind: NodeKind, from: &Path, to: &Path, callback: &mut C) -> Result<ItemDescriptor>
    where
        C: ProcessCallback + ?Sized,
    {
        if kind == NodeKind::Symlink && self.symlinks != SymlinkHandling::Follow {
            callback.report_info(&format!(
                "Copying symbolic link \"{}\" to \"{}\"",
                from.display(),
                to.display()
            ));
            return native::copy_symlink(from, to);
        }

        callback.report_info(&format!("Copying file \"{}\" to \"{}\"", from.display(), to.display()));
        tracing::debug!(from = %from.display(), to = %to.display(), "copying file");

        let mut transferred = 0i64;
        let copied = native::copy_file(from, to, |bytes| {
            let bytes = signed(bytes);
            transferred += bytes;
            callback.update_processed_data(0, bytes);
            callback.request_ui_refresh()
        });
        let descriptor = match copied {
            Ok(descriptor) => descriptor,
            Err(err) => {
                callback.update_processed_data(0, -transferred);
                return Err(err);
            }
        };

        if self.verify_copied_files {
            callback.report_info(&format!("Verifying file \"{}\"", to.display()));
            if let Err(err) = native::verify_file_copy(from, to, |_| callback.request_ui_refresh()) {
                if let Err(cleanup) = native::remove_file(to) {
                    tracing::warn!("{cleanup}");
                }
                callback.update_processed_data(0, -transferred);
                return Err(err);
            }
        }
        Ok(descriptor)
    }

    fn synchronize_dir<C>(&mut self, id: NodeId, callback: &mut C) -> Result<()>
    where
        C: ProcessCallback + ?Sized,
    {
        let node = self.mapping.hierarchy().node(id);
        let Some(target) = node.sync_operation().target_side() else {
            return Ok(());
        };
        let source = target.opposite();
        let has_source = !node.is_empty(source);
        let has_target = !node.is_empty(target);

        callback.request_ui_refresh()?;

        match (has_source, has_target) {
            (true, false) => {
                let from = self.mapping.full_path(id, source);
                let to = self.mapping.full_path(id, target);
                callback.report_info(&format!("Creating folder \"{}\"", to.display()));
                if !from.is_dir() {
                    return Err(FileError::new(format!(
                        "Source directory does not exist anymore:\n\"{}\"",
                        from.display()
                    ))
                    .into());
                }
                native::create_directory(&to)?;
                let descriptor = native::read_descriptor(&to, false)?;
                self.mapping.hierarchy_mut().synchronize_sides(id, target, descriptor);
                self.result.created += 1;
                callback.update_processed_data(1, 0);
            }
            (false, true) => {
                let path = self.mapping.full_path(id, target);
                let rel = self.mapping.hierarchy().relative_path_on(id, target);
                let implicit = SyncStatistics::for_subtree(self.mapping.hierarchy(), id);
                self.deletion_mut(target).remove_dir(&path, &rel, callback)?;
                self.mapping.hierarchy_mut().remove_object(id, target);
                self.result.deleted += 1;
                // everything below went with the directory
                let items = i64::try_from(implicit.operation_count()).unwrap_or(i64::MAX);
                callback.update_processed_data(items.saturating_add(1), signed(implicit.data_to_process));
            }
            (true, true) => {
                self.rename_to_source_name(id, target)?;
                self.result.overwritten += 1;
                callback.update_processed_data(1, 0);
            }
            (false, false) => {}
        }
        Ok(())
    }
}
