//! Sync direction resolution
//!
//! Explicit mode maps every comparison category to a fixed direction.
//! Automatic mode compares both sides against the sync database of the last
//! run, see [`automatic`].

mod automatic;
mod moves;


use std::path::PathBuf;

use crate::TEMP_FILE_ENDING;
use crate::database::default_database_path;
use crate::error::{Result, SyncError};
use crate::hierarchy::{
    BaseDirMapping, CategoryDirections, CompareResult, DirectionConfig, FileSystemObject, FolderComparison,
    Hierarchy, NodeId, Side, SyncDirection,
};
use crate::status::ProcessCallback;

/// Direction settings of one folder pair
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PairDirection {
    /// Explicit or automatic
    pub config: DirectionConfig,
    /// Sync database location, defaults to the left base directory
    pub database: Option<PathBuf>,
}

impl PairDirection {
    /// Settings with the default database location
    #[must_use]
    pub const fn new(config: DirectionConfig) -> Self {
        Self { config, database: None }
    }

    /// Database file used for `mapping`
    #[must_use]
    pub fn database_path(&self, mapping: &BaseDirMapping) -> PathBuf {
        self.database
            .clone()
            .unwrap_or_else(|| default_database_path(mapping))
    }
}

/// Assign a direction to every item of one folder pair
pub fn redetermine_sync_direction<C>(settings: &PairDirection, mapping: &mut BaseDirMapping, callback: &mut C)
where
    C: ProcessCallback + ?Sized,
{
    match &settings.config {
        DirectionConfig::Automatic => {
            let database = settings.database_path(mapping);
            automatic::redetermine_auto(mapping, &database, callback);
        }
        DirectionConfig::ByCategory(directions) => {
            apply_explicit(mapping.hierarchy_mut(), None, directions);
        }
    }
}

/// Assign directions to every folder pair
///
/// # Errors
///
/// Returns [`SyncError::Internal`] if the number of settings does not match
/// the number of folder pairs.
pub fn redetermine_all<C>(folder_cmp: &mut FolderComparison, settings: &[PairDirection], callback: &mut C) -> Result<()>
where
    C: ProcessCallback + ?Sized,
{
    if folder_cmp.is_empty() {
        return Ok(());
    }
    if folder_cmp.len() != settings.len() {
        return Err(SyncError::Internal(format!(
            "{} folder pairs compared but {} direction settings given",
            folder_cmp.len(),
            settings.len()
        )));
    }

    for (mapping, pair) in folder_cmp.iter_mut().zip(settings) {
        redetermine_sync_direction(pair, mapping, callback);
    }
    Ok(())
}

/// Exchange left and right and assign fresh directions
///
/// # Errors
///
/// Same as [`redetermine_all`].
pub fn swap_grids<C>(folder_cmp: &mut FolderComparison, settings: &[PairDirection], callback: &mut C) -> Result<()>
where
    C: ProcessCallback + ?Sized,
{
    crate::hierarchy::swap_sides(folder_cmp);
    redetermine_all(folder_cmp, settings, callback)
}

/// Set `direction` on `id` and everything below it, leaving equal items alone
pub fn set_sync_direction_rec(hierarchy: &mut Hierarchy, id: NodeId, direction: &SyncDirection) {
    let mut targets = vec![id];
    targets.extend(hierarchy.subtree(id));
    for target in targets {
        if hierarchy.node(target).category() != CompareResult::Equal {
            hierarchy.set_direction(target, direction.clone());
        }
    }
}

/// Side an abandoned temporary item should be deleted from
fn temp_item_side(node: &FileSystemObject) -> Option<Side> {
    match node.category() {
        CompareResult::LeftOnly if node.name_on(Side::Left).ends_with(TEMP_FILE_ENDING) => Some(Side::Left),
        CompareResult::RightOnly if node.name_on(Side::Right).ends_with(TEMP_FILE_ENDING) => Some(Side::Right),
        _ => None,
    }
}

/// Schedule a leftover temporary item for deletion
///
/// Returns `true` if the item was handled; directories are handled together
/// with their whole subtree.
fn schedule_temp_item(hierarchy: &mut Hierarchy, id: NodeId) -> bool {
    let node = hierarchy.node(id);
    let Some(side) = temp_item_side(node) else {
        return false;
    };
    let direction = SyncDirection::towards(side);
    if node.is_dir() {
        set_sync_direction_rec(hierarchy, id, &direction);
    } else {
        hierarchy.set_direction(id, direction);
    }
    true
}

fn apply_explicit(hierarchy: &mut Hierarchy, parent: Option<NodeId>, directions: &CategoryDirections) {
    let children = hierarchy.children(parent).to_vec();
    for id in children {
        if schedule_temp_item(hierarchy, id) {
            continue;
        }

        let node = hierarchy.node(id);
        let direction = match node.category() {
            CompareResult::LeftOnly => directions.ex_left_side_only.clone(),
            CompareResult::RightOnly => directions.ex_right_side_only.clone(),
            CompareResult::LeftNewer => directions.left_newer.clone(),
            CompareResult::RightNewer => directions.right_newer.clone(),
            CompareResult::Different => directions.different.clone(),
            CompareResult::Conflict | CompareResult::DifferentMetadata => match directions.conflict {
                SyncDirection::None => SyncDirection::Conflict(node.category_description().to_string()),
                ref other => other.clone(),
            },
            CompareResult::Equal => SyncDirection::None,
        };
        let is_dir = node.is_dir();

        hierarchy.set_direction(id, direction);
        if is_dir {
            apply_explicit(hierarchy, Some(id), directions);
        }
    }
}
