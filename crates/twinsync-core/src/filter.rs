//! Active/inactive marking of compared items
//!
//! Filters never remove items from the model. They only toggle the active
//! flag, which turns the item's sync operation into `DoNothing` (or `Equal`).

mod name;
mod soft;

use std::path::Path;

pub use name::{INCLUDE_ALL, NameFilter};
pub use soft::SoftFilter;

use crate::error::{Result, SyncError};
use crate::hierarchy::{BaseDirMapping, FolderComparison, Hierarchy, NodeId, NodeKind, Side};

/// How a filter result combines with the current active flag
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterStrategy {
    /// Replace the flag
    Set,
    /// Only active items are re-evaluated
    And,
    /// Only inactive items are re-evaluated
    Or,
}

impl FilterStrategy {
    fn apply(self, hierarchy: &mut Hierarchy, id: NodeId, passed: bool) {
        let active = hierarchy.node(id).is_active();
        match self {
            Self::Set => hierarchy.set_active(id, passed),
            Self::And if active => hierarchy.set_active(id, passed),
            Self::Or if !active => hierarchy.set_active(id, passed),
            Self::And | Self::Or => {}
        }
    }
}

/// Path based filter
pub trait HardFilter {
    /// Whether a file or symlink passes
    fn pass_file_filter(&self, rel_path: &Path) -> bool;

    /// `(passes, sub_items_might_match)` for a directory
    fn pass_dir_filter(&self, rel_path: &Path) -> (bool, bool);
}

impl HardFilter for NameFilter {
    fn pass_file_filter(&self, rel_path: &Path) -> bool {
        Self::pass_file_filter(self, rel_path)
    }

    fn pass_dir_filter(&self, rel_path: &Path) -> (bool, bool) {
        Self::pass_dir_filter(self, rel_path)
    }
}

/// Two filters that must both pass
#[derive(Debug, Clone, Copy)]
pub struct CombinedFilter<'a> {
    first: &'a NameFilter,
    second: &'a NameFilter,
}

impl<'a> CombinedFilter<'a> {
    /// Combine a global and a folder pair filter
    #[must_use]
    pub const fn new(first: &'a NameFilter, second: &'a NameFilter) -> Self {
        Self { first, second }
    }
}

impl HardFilter for CombinedFilter<'_> {
    fn pass_file_filter(&self, rel_path: &Path) -> bool {
        self.first.pass_file_filter(rel_path) && self.second.pass_file_filter(rel_path)
    }

    fn pass_dir_filter(&self, rel_path: &Path) -> (bool, bool) {
        let (a_pass, a_sub) = self.first.pass_dir_filter(rel_path);
        let (b_pass, b_sub) = self.second.pass_dir_filter(rel_path);
        (a_pass && b_pass, a_sub && b_sub)
    }
}

/// Name and soft filter of one scope (global or folder pair)
#[derive(Debug, Clone, Default)]
pub struct FilterSet {
    /// Include/exclude globs
    pub name: NameFilter,
    /// Time and size limits
    pub soft: SoftFilter,
}

/// Apply the global filter combined with each pair's local filter
///
/// The name filter replaces the active flag, the soft filter can only
/// deactivate afterwards.
///
/// # Errors
///
/// Returns [`SyncError::Internal`] if the number of filters does not match the
/// number of folder pairs.
pub fn apply_filtering(folder_cmp: &mut FolderComparison, global: &FilterSet, pairs: &[FilterSet]) -> Result<()> {
    if folder_cmp.is_empty() {
        return Ok(());
    }
    if folder_cmp.len() != pairs.len() {
        return Err(SyncError::Internal(format!(
            "{} folder pairs compared but {} filters given",
            folder_cmp.len(),
            pairs.len()
        )));
    }

    for (mapping, local) in folder_cmp.iter_mut().zip(pairs) {
        let combined = CombinedFilter::new(&global.name, &local.name);
        apply_hard_filter(mapping.hierarchy_mut(), None, &combined, FilterStrategy::Set);
        add_soft_filtering(mapping, &global.soft.combine(&local.soft));
    }
    Ok(())
}

/// Deactivate items matching `exclude` on top of the current state
///
/// # Errors
///
/// Returns an error if a pattern is invalid.
pub fn add_hard_filtering(mapping: &mut BaseDirMapping, exclude: &[String]) -> anyhow::Result<()> {
    let filter = NameFilter::new(&[], exclude)?;
    apply_hard_filter(mapping.hierarchy_mut(), None, &filter, FilterStrategy::And);
    Ok(())
}

/// Deactivate items failing `filter` on top of the current state
pub fn add_soft_filtering(mapping: &mut BaseDirMapping, filter: &SoftFilter) {
    if !filter.is_null() {
        apply_soft_filter(mapping.hierarchy_mut(), None, filter);
    }
}

/// Run a hard filter over the children of `parent`
///
/// Subtrees whose directory reports that no item below can match are
/// deactivated without evaluating them; [`FilterStrategy::Or`] leaves them
/// untouched instead.
pub fn apply_hard_filter<F>(hierarchy: &mut Hierarchy, parent: Option<NodeId>, filter: &F, strategy: FilterStrategy)
where
    F: HardFilter + ?Sized,
{
    let children = hierarchy.children(parent).to_vec();
    for id in children {
        let rel = hierarchy.relative_path(id);
        if hierarchy.node(id).is_dir() {
            let (passed, sub_items_might_match) = filter.pass_dir_filter(&rel);
            strategy.apply(hierarchy, id, passed);

            if !sub_items_might_match {
                if strategy != FilterStrategy::Or {
                    for sub in hierarchy.subtree(id) {
                        hierarchy.set_active(sub, false);
                    }
                }
                continue;
            }
            apply_hard_filter(hierarchy, Some(id), filter, strategy);
        } else {
            strategy.apply(hierarchy, id, filter.pass_file_filter(&rel));
        }
    }
}

fn apply_soft_filter(hierarchy: &mut Hierarchy, parent: Option<NodeId>, filter: &SoftFilter) {
    let children = hierarchy.children(parent).to_vec();
    for id in children {
        let node = hierarchy.node(id);
        let matches_side = |side: Side| filter.match_size(node.size(side)) && filter.match_time(node.mtime(side));
        let matches_time = |side: Side| filter.match_time(node.mtime(side));

        let passed = match (node.kind(), node.is_empty(Side::Left), node.is_empty(Side::Right)) {
            (NodeKind::Directory, ..) => filter.match_folder(),
            (NodeKind::File, true, _) => matches_side(Side::Right),
            (NodeKind::File, _, true) => matches_side(Side::Left),
            (NodeKind::File, false, false) => matches_side(Side::Right) || matches_side(Side::Left),
            (NodeKind::Symlink, true, _) => matches_time(Side::Right),
            (NodeKind::Symlink, _, true) => matches_time(Side::Left),
            (NodeKind::Symlink, false, false) => matches_time(Side::Right) || matches_time(Side::Left),
        };
        let is_dir = node.is_dir();

        FilterStrategy::And.apply(hierarchy, id, passed);
        if is_dir {
            apply_soft_filter(hierarchy, Some(id), filter);
        }
    }
}

/// Keep only files and symlinks modified within `time_from..=time_to`
///
/// Directories are deactivated.
pub fn apply_time_span_filter(folder_cmp: &mut FolderComparison, time_from: i64, time_to: i64) {
    let in_span = |t: i64| time_from <= t && t <= time_to;

    for mapping in folder_cmp.iter_mut() {
        let hierarchy = mapping.hierarchy_mut();
        for id in hierarchy.ids() {
            let node = hierarchy.node(id);
            let active = if node.is_dir() {
                false
            } else {
                [Side::Left, Side::Right]
                    .into_iter()
                    .any(|side| !node.is_empty(side) && in_span(node.mtime(side)))
            };
            hierarchy.set_active(id, active);
        }
    }
}

/// Include or exclude every item of the comparison
pub fn set_active_status(folder_cmp: &mut FolderComparison, active: bool) {
    for mapping in folder_cmp.iter_mut() {
        let hierarchy = mapping.hierarchy_mut();
        for id in hierarchy.ids() {
            hierarchy.set_active(id, active);
        }
    }
}

/// Include or exclude one item and everything below it
pub fn set_active_status_rec(hierarchy: &mut Hierarchy, id: NodeId, active: bool) {
    hierarchy.set_active(id, active);
    for sub in hierarchy.subtree(id) {
        hierarchy.set_active(sub, active);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hierarchy::{CompareVariant, ItemDescriptor};

    fn strings(items: &[&str]) -> Vec<String> {
        items.iter().map(ToString::to_string).collect()
    }

    /// src/{main.rs, target/}, target/{out.bin}, notes.tmp, link
    fn sample() -> (BaseDirMapping, Vec<NodeId>) {
        let mut mapping = BaseDirMapping::new("/l", "/r", CompareVariant::ByTimeSize, 2);
        let h = mapping.hierarchy_mut();
        let src = h.add_dir(None, Some(ItemDescriptor::dir("src")), Some(ItemDescriptor::dir("src")));
        let main = h.add_file(Some(src), Some(ItemDescriptor::file("main.rs", 100, 5_000)), None);
        let target = h.add_dir(None, Some(ItemDescriptor::dir("target")), None);
        let out = h.add_file(Some(target), Some(ItemDescriptor::file("out.bin", 9_000, 1_000)), None);
        let tmp = h.add_file(
            None,
            Some(ItemDescriptor::file("notes.tmp", 10, 1_000)),
            Some(ItemDescriptor::file("notes.tmp", 20_000, 9_000)),
        );
        let link = h.add_symlink(None, None, Some(ItemDescriptor::symlink("link", 2_000, "src")));
        (mapping, vec![src, main, target, out, tmp, link])
    }

    fn active_set(mapping: &BaseDirMapping) -> Vec<NodeId> {
        let h = mapping.hierarchy();
        h.ids().into_iter().filter(|&id| h.node(id).is_active()).collect()
    }

    #[test]
    fn test_apply_filtering_with_global_and_local() {
        let (mapping, ids) = sample();
        let mut cmp = vec![mapping];
        let global = FilterSet {
            name: NameFilter::new(&[], &strings(&["*.tmp"])).unwrap(),
            soft: SoftFilter::null(),
        };
        let local = FilterSet {
            name: NameFilter::new(&[], &strings(&["/target"])).unwrap(),
            soft: SoftFilter::null(),
        };

        apply_filtering(&mut cmp, &global, &[local]).unwrap();

        let h = cmp[0].hierarchy();
        assert!(h.node(ids[0]).is_active());
        assert!(h.node(ids[1]).is_active());
        assert!(!h.node(ids[2]).is_active());
        assert!(!h.node(ids[3]).is_active());
        assert!(!h.node(ids[4]).is_active());
        assert!(h.node(ids[5]).is_active());
    }

    #[test]
    fn test_apply_filtering_count_mismatch() {
        let (mapping, _) = sample();
        let mut cmp = vec![mapping];

        let result = apply_filtering(&mut cmp, &FilterSet::default(), &[]);

        assert!(matches!(result, Err(SyncError::Internal(_))));
    }

    #[test]
    fn test_set_strategy_reactivates() {
        let mut cmp = vec![sample().0];
        set_active_status(&mut cmp, false);
        assert!(active_set(&cmp[0]).is_empty());

        apply_hard_filter(cmp[0].hierarchy_mut(), None, &NameFilter::pass_all(), FilterStrategy::Set);

        assert_eq!(active_set(&cmp[0]).len(), cmp[0].hierarchy().len());
    }

    #[test]
    fn test_hard_exclude_never_grows_active_set() {
        let (mut mapping, ids) = sample();
        set_active_status_rec(mapping.hierarchy_mut(), ids[0], false);
        let before = active_set(&mapping);

        add_hard_filtering(&mut mapping, &strings(&["*.bin"])).unwrap();

        let after = active_set(&mapping);
        assert!(after.iter().all(|id| before.contains(id)));
        assert!(!after.contains(&ids[3]));
        assert!(!after.contains(&ids[1]));
    }

    #[test]
    fn test_soft_after_hard_never_reactivates() {
        let (mut mapping, _) = sample();
        add_hard_filtering(&mut mapping, &strings(&["*.tmp"])).unwrap();
        let before = active_set(&mapping);

        add_soft_filtering(&mut mapping, &SoftFilter::new(0, 0, u64::MAX - 1));

        let after = active_set(&mapping);
        assert!(after.iter().all(|id| before.contains(id)));
    }

    #[test]
    fn test_soft_filter_rules() {
        let (mut mapping, ids) = sample();

        add_soft_filtering(&mut mapping, &SoftFilter::new(1_500, 0, 15_000));

        let h = mapping.hierarchy();
        // directories only pass a null filter
        assert!(!h.node(ids[0]).is_active());
        // left-only, new enough and small enough
        assert!(h.node(ids[1]).is_active());
        // left-only, too old
        assert!(!h.node(ids[3]).is_active());
        // left matches size only, right matches time only
        assert!(!h.node(ids[4]).is_active());
        // symlinks check time only
        assert!(h.node(ids[5]).is_active());
    }

    #[test]
    fn test_null_soft_filter_is_skipped() {
        let (mut mapping, _) = sample();
        add_soft_filtering(&mut mapping, &SoftFilter::null());
        assert_eq!(active_set(&mapping).len(), mapping.hierarchy().len());
    }

    #[test]
    fn test_or_strategy_skips_unreachable_subtree() {
        let (mut mapping, ids) = sample();
        set_active_status_rec(mapping.hierarchy_mut(), ids[2], false);
        let filter = NameFilter::new(&[], &strings(&["/target"])).unwrap();

        apply_hard_filter(mapping.hierarchy_mut(), None, &filter, FilterStrategy::Or);

        let h = mapping.hierarchy();
        assert!(!h.node(ids[2]).is_active());
        assert!(!h.node(ids[3]).is_active());
        assert!(h.node(ids[1]).is_active());
    }

    #[test]
    fn test_time_span_filter() {
        let (mapping, ids) = sample();
        let mut cmp = vec![mapping];

        apply_time_span_filter(&mut cmp, 1_500, 5_000);

        let h = cmp[0].hierarchy();
        assert!(!h.node(ids[0]).is_active());
        assert!(h.node(ids[1]).is_active());
        assert!(!h.node(ids[3]).is_active());
        assert!(!h.node(ids[4]).is_active());
        assert!(h.node(ids[5]).is_active());
    }

    #[test]
    fn test_set_active_status_rec() {
        let (mut mapping, ids) = sample();

        set_active_status_rec(mapping.hierarchy_mut(), ids[0], false);

        let h = mapping.hierarchy();
        assert!(!h.node(ids[0]).is_active());
        assert!(!h.node(ids[1]).is_active());
        assert!(h.node(ids[2]).is_active());
    }
}
