//! In-memory model of a compared folder pair
//!
//! Every folder pair owns one [`Hierarchy`]: an arena of
//! [`FileSystemObject`]s addressed by [`NodeId`]. Nodes store their parent's
//! id instead of a back-pointer, so walking up to compute a relative path or
//! the top-level ancestor is an index chase.
//!
//! Nodes are never physically removed from the arena while a run is in
//! progress; [`Hierarchy::remove_empty`] unlinks items whose both sides are
//! gone and marks them dead so stale ids cannot resurface.

mod types;

use std::path::{Path, PathBuf};

pub use types::{
    CategoryDirections, CompareResult, CompareVariant, DirectionConfig, Side, SyncDirection,
    SyncOperation,
};

/// Index of a node inside its [`Hierarchy`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(usize);

impl NodeId {
    /// Raw arena index
    #[must_use]
    pub const fn index(self) -> usize {
        self.0
    }
}

/// Kind of item a node represents
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NodeKind {
    /// Regular file
    File,
    /// Symbolic link kept as a link
    Symlink,
    /// Directory
    Directory,
}

/// Platform file identity (device + inode)
///
/// Not stable on every filesystem; the device number keeps ids from two
/// volumes apart.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FileId {
    /// Device the file lives on
    pub device: u64,
    /// Inode number on that device
    pub inode: u64,
}

/// Attributes of an item on one side
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ItemDescriptor {
    /// Short name as found on disk
    pub name: String,
    /// Size in bytes (0 for directories)
    pub size: u64,
    /// Last write time, seconds since the epoch
    pub mtime: i64,
    /// Stable identity if the platform provides one
    pub file_id: Option<FileId>,
    /// Link target for symlinks
    pub link_target: Option<PathBuf>,
}

impl ItemDescriptor {
    /// Descriptor of a regular file
    #[must_use]
    pub fn file(name: impl Into<String>, size: u64, mtime: i64) -> Self {
        Self {
            name: name.into(),
            size,
            mtime,
            file_id: None,
            link_target: None,
        }
    }

    /// Descriptor of a directory
    #[must_use]
    pub fn dir(name: impl Into<String>) -> Self {
        Self::file(name, 0, 0)
    }

    /// Descriptor of a symlink
    #[must_use]
    pub fn symlink(name: impl Into<String>, mtime: i64, target: impl Into<PathBuf>) -> Self {
        Self {
            link_target: Some(target.into()),
            ..Self::file(name, 0, mtime)
        }
    }

    /// Attach a file id
    #[must_use]
    pub const fn with_file_id(mut self, file_id: Option<FileId>) -> Self {
        self.file_id = file_id;
        self
    }
}

/// One item pair of the comparison
#[derive(Debug, Clone)]
pub struct FileSystemObject {
    kind: NodeKind,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
    left: Option<ItemDescriptor>,
    right: Option<ItemDescriptor>,
    active: bool,
    category: CompareResult,
    category_description: String,
    direction: SyncDirection,
    move_ref: Option<NodeId>,
    removed: bool,
}

impl FileSystemObject {
    /// Item kind
    #[must_use]
    pub const fn kind(&self) -> NodeKind {
        self.kind
    }

    /// Parent directory node, `None` for top-level items
    #[must_use]
    pub const fn parent(&self) -> Option<NodeId> {
        self.parent
    }

    /// Child nodes (directories only)
    #[must_use]
    pub fn children(&self) -> &[NodeId] {
        &self.children
    }

    /// Attributes on `side`, `None` if the item does not exist there
    #[must_use]
    pub const fn side(&self, side: Side) -> Option<&ItemDescriptor> {
        match side {
            Side::Left => self.left.as_ref(),
            Side::Right => self.right.as_ref(),
        }
    }

    fn side_mut(&mut self, side: Side) -> &mut Option<ItemDescriptor> {
        match side {
            Side::Left => &mut self.left,
            Side::Right => &mut self.right,
        }
    }

    /// Whether the item is missing on `side`
    #[must_use]
    pub const fn is_empty(&self, side: Side) -> bool {
        self.side(side).is_none()
    }

    /// Short name, preferring the left side
    #[must_use]
    pub fn name(&self) -> &str {
        self.left
            .as_ref()
            .or(self.right.as_ref())
            .map_or("", |d| d.name.as_str())
    }

    /// Short name on `side`, falling back to the other side
    #[must_use]
    pub fn name_on(&self, side: Side) -> &str {
        self.side(side)
            .or_else(|| self.side(side.opposite()))
            .map_or("", |d| d.name.as_str())
    }

    /// File size on `side` (0 if empty)
    #[must_use]
    pub fn size(&self, side: Side) -> u64 {
        self.side(side).map_or(0, |d| d.size)
    }

    /// Modification time on `side` (0 if empty)
    #[must_use]
    pub fn mtime(&self, side: Side) -> i64 {
        self.side(side).map_or(0, |d| d.mtime)
    }

    /// File id on `side`
    #[must_use]
    pub fn file_id(&self, side: Side) -> Option<FileId> {
        self.side(side).and_then(|d| d.file_id)
    }

    /// Included in synchronization
    #[must_use]
    pub const fn is_active(&self) -> bool {
        self.active
    }

    /// Comparison category
    #[must_use]
    pub const fn category(&self) -> CompareResult {
        self.category
    }

    /// Human readable explanation for conflicts and metadata differences
    #[must_use]
    pub fn category_description(&self) -> &str {
        &self.category_description
    }

    /// Assigned sync direction
    #[must_use]
    pub const fn direction(&self) -> &SyncDirection {
        &self.direction
    }

    /// Rename partner detected in automatic mode
    #[must_use]
    pub const fn move_ref(&self) -> Option<NodeId> {
        self.move_ref
    }

    /// Whether this is a directory node
    #[must_use]
    pub fn is_dir(&self) -> bool {
        self.kind == NodeKind::Directory
    }

    /// Operation implied by the active flag, category and direction
    #[must_use]
    pub fn sync_operation(&self) -> SyncOperation {
        if !self.active {
            return if self.category == CompareResult::Equal {
                SyncOperation::Equal
            } else {
                SyncOperation::DoNothing
            };
        }

        let dir = match &self.direction {
            SyncDirection::Conflict(_) => return SyncOperation::UnresolvedConflict,
            dir => dir,
        };

        match self.category {
            CompareResult::Equal => SyncOperation::Equal,
            CompareResult::LeftOnly => match dir {
                SyncDirection::Left => SyncOperation::DeleteLeft,
                SyncDirection::Right => SyncOperation::CreateNewRight,
                _ => SyncOperation::DoNothing,
            },
            CompareResult::RightOnly => match dir {
                SyncDirection::Left => SyncOperation::CreateNewLeft,
                SyncDirection::Right => SyncOperation::DeleteRight,
                _ => SyncOperation::DoNothing,
            },
            CompareResult::LeftNewer
            | CompareResult::RightNewer
            | CompareResult::Different
            | CompareResult::Conflict
            | CompareResult::DifferentMetadata => match dir {
                SyncDirection::Left => SyncOperation::OverwriteLeft,
                SyncDirection::Right => SyncOperation::OverwriteRight,
                _ => SyncOperation::DoNothing,
            },
        }
    }
}

/// Arena holding every item of one folder pair
#[derive(Debug, Clone, Default)]
pub struct Hierarchy {
    nodes: Vec<FileSystemObject>,
    top: Vec<NodeId>,
}

impl Hierarchy {
    /// Create an empty hierarchy
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a node below `parent` (or at top level)
    ///
    /// The category starts as `LeftOnly`/`RightOnly` for one-sided items and
    /// `Equal` otherwise; the comparator refines it.
    pub fn add(
        &mut self,
        kind: NodeKind,
        parent: Option<NodeId>,
        left: Option<ItemDescriptor>,
        right: Option<ItemDescriptor>,
    ) -> NodeId {
        let id = NodeId(self.nodes.len());
        let category = match (&left, &right) {
            (Some(_), None) => CompareResult::LeftOnly,
            (None, Some(_)) => CompareResult::RightOnly,
            _ => CompareResult::Equal,
        };
        self.nodes.push(FileSystemObject {
            kind,
            parent,
            children: Vec::new(),
            left,
            right,
            active: true,
            category,
            category_description: String::new(),
            direction: SyncDirection::None,
            move_ref: None,
            removed: false,
        });
        match parent {
            Some(p) => self.nodes[p.0].children.push(id),
            None => self.top.push(id),
        }
        id
    }

    /// Add a file pair
    pub fn add_file(
        &mut self,
        parent: Option<NodeId>,
        left: Option<ItemDescriptor>,
        right: Option<ItemDescriptor>,
    ) -> NodeId {
        self.add(NodeKind::File, parent, left, right)
    }

    /// Add a symlink pair
    pub fn add_symlink(
        &mut self,
        parent: Option<NodeId>,
        left: Option<ItemDescriptor>,
        right: Option<ItemDescriptor>,
    ) -> NodeId {
        self.add(NodeKind::Symlink, parent, left, right)
    }

    /// Add a directory pair
    pub fn add_dir(
        &mut self,
        parent: Option<NodeId>,
        left: Option<ItemDescriptor>,
        right: Option<ItemDescriptor>,
    ) -> NodeId {
        self.add(NodeKind::Directory, parent, left, right)
    }

    /// Access a node
    ///
    /// # Panics
    ///
    /// Panics if `id` belongs to a different hierarchy.
    #[must_use]
    pub fn node(&self, id: NodeId) -> &FileSystemObject {
        &self.nodes[id.0]
    }

    pub(crate) fn node_mut(&mut self, id: NodeId) -> &mut FileSystemObject {
        &mut self.nodes[id.0]
    }

    /// Whether `id` is still part of the tree
    #[must_use]
    pub fn is_live(&self, id: NodeId) -> bool {
        self.nodes.get(id.0).is_some_and(|n| !n.removed)
    }

    /// Children of `parent`, or the top-level items for `None`
    #[must_use]
    pub fn children(&self, parent: Option<NodeId>) -> &[NodeId] {
        match parent {
            Some(p) => &self.nodes[p.0].children,
            None => &self.top,
        }
    }

    /// All live nodes in depth-first pre-order
    #[must_use]
    pub fn ids(&self) -> Vec<NodeId> {
        let mut out = Vec::with_capacity(self.nodes.len());
        self.collect_preorder(&self.top, &mut out);
        out
    }

    /// Descendants of `id` in depth-first pre-order (excluding `id`)
    #[must_use]
    pub fn subtree(&self, id: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        self.collect_preorder(&self.nodes[id.0].children, &mut out);
        out
    }

    fn collect_preorder(&self, level: &[NodeId], out: &mut Vec<NodeId>) {
        for &id in level {
            out.push(id);
            self.collect_preorder(&self.nodes[id.0].children, out);
        }
    }

    /// Number of live nodes
    #[must_use]
    pub fn len(&self) -> usize {
        self.nodes.iter().filter(|n| !n.removed).count()
    }

    /// Whether no live nodes exist
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Top-level ancestor of `id`
    #[must_use]
    pub fn root_of(&self, id: NodeId) -> NodeId {
        let mut current = id;
        while let Some(parent) = self.nodes[current.0].parent {
            current = parent;
        }
        current
    }

    /// Path relative to the base directory, using left names where present
    #[must_use]
    pub fn relative_path(&self, id: NodeId) -> PathBuf {
        self.relative_path_on(id, Side::Left)
    }

    /// Path relative to the base directory of `side`
    ///
    /// Ancestors missing on `side` contribute the other side's name, which is
    /// the name they will get once created.
    #[must_use]
    pub fn relative_path_on(&self, id: NodeId, side: Side) -> PathBuf {
        let mut names = Vec::new();
        let mut current = Some(id);
        while let Some(c) = current {
            let node = &self.nodes[c.0];
            names.push(node.name_on(side));
            current = node.parent;
        }
        names.iter().rev().collect()
    }

    /// Set the active flag of one node
    pub fn set_active(&mut self, id: NodeId, active: bool) {
        self.nodes[id.0].active = active;
    }

    /// Set the comparison category and its description
    pub fn set_category(&mut self, id: NodeId, category: CompareResult, description: impl Into<String>) {
        let node = &mut self.nodes[id.0];
        node.category = category;
        node.category_description = description.into();
    }

    /// Set the sync direction
    pub fn set_direction(&mut self, id: NodeId, direction: SyncDirection) {
        self.nodes[id.0].direction = direction;
    }

    /// Pair two nodes as rename partners
    pub fn set_move_pair(&mut self, a: NodeId, b: NodeId) {
        self.nodes[a.0].move_ref = Some(b);
        self.nodes[b.0].move_ref = Some(a);
    }

    /// Drop all rename pairings
    pub fn clear_move_refs(&mut self) {
        for node in &mut self.nodes {
            node.move_ref = None;
        }
    }

    /// Record a successful operation: `target` now mirrors the source side
    ///
    /// `descriptor` holds the attributes actually found on the target after
    /// the operation (they may differ from the source, e.g. a new file id).
    pub fn synchronize_sides(&mut self, id: NodeId, target: Side, descriptor: ItemDescriptor) {
        let node = &mut self.nodes[id.0];
        *node.side_mut(target) = Some(descriptor);
        node.category = CompareResult::Equal;
        node.category_description.clear();
        node.direction = SyncDirection::None;
        node.move_ref = None;
    }

    /// Mark the item as gone on `side`; directories clear their subtree too
    pub fn remove_object(&mut self, id: NodeId, side: Side) {
        let mut stack = vec![id];
        while let Some(current) = stack.pop() {
            let node = &mut self.nodes[current.0];
            *node.side_mut(side) = None;
            node.category = match (node.left.is_some(), node.right.is_some()) {
                (true, false) => CompareResult::LeftOnly,
                (false, true) => CompareResult::RightOnly,
                _ => node.category,
            };
            node.category_description.clear();
            if node.left.is_none() && node.right.is_none() {
                node.direction = SyncDirection::None;
            }
            stack.extend(node.children.iter().copied());
        }
    }

    /// Prune items that exist on neither side, cascading up through parents
    /// that become empty
    pub fn remove_empty(&mut self) {
        let top = std::mem::take(&mut self.top);
        self.top = self.prune_level(top);

        for i in 0..self.nodes.len() {
            if let Some(partner) = self.nodes[i].move_ref
                && self.nodes[partner.0].removed
            {
                self.nodes[i].move_ref = None;
            }
        }
    }

    fn prune_level(&mut self, level: Vec<NodeId>) -> Vec<NodeId> {
        let mut kept = Vec::with_capacity(level.len());
        for id in level {
            let children = std::mem::take(&mut self.nodes[id.0].children);
            let children = self.prune_level(children);
            let node = &mut self.nodes[id.0];
            node.children = children;
            if node.left.is_none() && node.right.is_none() {
                self.mark_removed(id);
            } else {
                kept.push(id);
            }
        }
        kept
    }

    fn mark_removed(&mut self, id: NodeId) {
        let mut stack = vec![id];
        while let Some(current) = stack.pop() {
            let node = &mut self.nodes[current.0];
            node.removed = true;
            stack.extend(node.children.drain(..));
        }
    }

    /// Exchange left and right for every node
    pub fn swap_sides(&mut self) {
        for node in &mut self.nodes {
            std::mem::swap(&mut node.left, &mut node.right);
            node.category = node.category.mirrored();
            node.direction = node.direction.mirrored();
        }
    }

    /// Whether every live item compares equal
    #[must_use]
    pub fn all_elements_equal(&self) -> bool {
        self.nodes
            .iter()
            .filter(|n| !n.removed)
            .all(|n| n.category == CompareResult::Equal)
    }
}

/// Comparison result of one folder pair
#[derive(Debug, Clone)]
pub struct BaseDirMapping {
    left_base: PathBuf,
    right_base: PathBuf,
    compare_variant: CompareVariant,
    time_tolerance: i64,
    hierarchy: Hierarchy,
}

impl BaseDirMapping {
    /// Create an empty mapping for a folder pair
    #[must_use]
    pub fn new(
        left_base: impl Into<PathBuf>,
        right_base: impl Into<PathBuf>,
        compare_variant: CompareVariant,
        time_tolerance: i64,
    ) -> Self {
        Self {
            left_base: left_base.into(),
            right_base: right_base.into(),
            compare_variant,
            time_tolerance,
            hierarchy: Hierarchy::new(),
        }
    }

    /// Base directory of `side`
    #[must_use]
    pub fn base(&self, side: Side) -> &Path {
        match side {
            Side::Left => &self.left_base,
            Side::Right => &self.right_base,
        }
    }

    /// Compare variant the mapping was built with
    #[must_use]
    pub const fn compare_variant(&self) -> CompareVariant {
        self.compare_variant
    }

    /// Allowed modification time difference in seconds
    #[must_use]
    pub const fn time_tolerance(&self) -> i64 {
        self.time_tolerance
    }

    /// The item tree
    #[must_use]
    pub const fn hierarchy(&self) -> &Hierarchy {
        &self.hierarchy
    }

    /// Mutable access to the item tree
    pub fn hierarchy_mut(&mut self) -> &mut Hierarchy {
        &mut self.hierarchy
    }

    /// Absolute path of `id` on `side`
    #[must_use]
    pub fn full_path(&self, id: NodeId, side: Side) -> PathBuf {
        self.base(side).join(self.hierarchy.relative_path_on(id, side))
    }

    /// Exchange left and right, including the base directories
    pub fn swap_sides(&mut self) {
        std::mem::swap(&mut self.left_base, &mut self.right_base);
        self.hierarchy.swap_sides();
    }
}

/// Ordered comparison results, one per configured folder pair
pub type FolderComparison = Vec<BaseDirMapping>;

/// Exchange left and right in every folder pair
pub fn swap_sides(folder_cmp: &mut FolderComparison) {
    for mapping in folder_cmp.iter_mut() {
        mapping.swap_sides();
    }
}

/// Whether every item of every folder pair compares equal
#[must_use]
pub fn all_elements_equal(folder_cmp: &FolderComparison) -> bool {
    folder_cmp.iter().all(|m| m.hierarchy().all_elements_equal())
}
