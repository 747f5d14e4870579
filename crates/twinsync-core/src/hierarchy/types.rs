//! Classification and direction enums attached to hierarchy items

use serde::{Deserialize, Serialize};

/// One side of a folder pair
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Side {
    /// Left base directory
    Left,
    /// Right base directory
    Right,
}

impl Side {
    /// The other side
    #[must_use]
    pub const fn opposite(self) -> Self {
        match self {
            Self::Left => Self::Right,
            Self::Right => Self::Left,
        }
    }
}

/// How two files are tested for equality
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CompareVariant {
    /// Same size and modification time within a tolerance
    #[default]
    #[serde(rename = "time-size")]
    ByTimeSize,
    /// Byte-for-byte comparison
    #[serde(rename = "content")]
    ByContent,
}

/// Result of comparing one item pair
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CompareResult {
    /// Exists on the left only
    LeftOnly,
    /// Exists on the right only
    RightOnly,
    /// Left copy is newer
    LeftNewer,
    /// Right copy is newer
    RightNewer,
    /// Content differs and no side can be preferred
    Different,
    /// Both sides are equal
    Equal,
    /// Cannot be categorized; see the item's category description
    Conflict,
    /// Equal content, different metadata (e.g. name case)
    DifferentMetadata,
}

impl CompareResult {
    /// Classification after exchanging left and right
    #[must_use]
    pub const fn mirrored(self) -> Self {
        match self {
            Self::LeftOnly => Self::RightOnly,
            Self::RightOnly => Self::LeftOnly,
            Self::LeftNewer => Self::RightNewer,
            Self::RightNewer => Self::LeftNewer,
            other => other,
        }
    }

    /// Short label for listings
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::LeftOnly => "left only",
            Self::RightOnly => "right only",
            Self::LeftNewer => "left newer",
            Self::RightNewer => "right newer",
            Self::Different => "different",
            Self::Equal => "equal",
            Self::Conflict => "conflict",
            Self::DifferentMetadata => "different metadata",
        }
    }
}

/// Direction an item is synchronized in
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum SyncDirection {
    /// Right overwrites left
    Left,
    /// Left overwrites right
    Right,
    /// Leave as is
    #[default]
    None,
    /// No direction could be determined; carries the reason
    Conflict(String),
}

impl SyncDirection {
    /// Direction after exchanging left and right
    #[must_use]
    pub fn mirrored(&self) -> Self {
        match self {
            Self::Left => Self::Right,
            Self::Right => Self::Left,
            other => other.clone(),
        }
    }

    /// Direction that writes onto `target`
    #[must_use]
    pub const fn towards(target: Side) -> Self {
        match target {
            Side::Left => Self::Left,
            Side::Right => Self::Right,
        }
    }
}

/// Operation that will be executed for one item
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SyncOperation {
    /// Copy right item to the left
    CreateNewLeft,
    /// Copy left item to the right
    CreateNewRight,
    /// Delete the left item
    DeleteLeft,
    /// Delete the right item
    DeleteRight,
    /// Replace the left item with the right one
    OverwriteLeft,
    /// Replace the right item with the left one
    OverwriteRight,
    /// Skip (inactive or no direction)
    DoNothing,
    /// Nothing to do, sides are equal
    Equal,
    /// Conflict waiting for a user decision
    UnresolvedConflict,
}

impl SyncOperation {
    /// Side that gets modified, if any
    #[must_use]
    pub const fn target_side(self) -> Option<Side> {
        match self {
            Self::CreateNewLeft | Self::DeleteLeft | Self::OverwriteLeft => Some(Side::Left),
            Self::CreateNewRight | Self::DeleteRight | Self::OverwriteRight => Some(Side::Right),
            Self::DoNothing | Self::Equal | Self::UnresolvedConflict => None,
        }
    }

    /// Whether this operation only removes data
    #[must_use]
    pub const fn is_deletion(self) -> bool {
        matches!(self, Self::DeleteLeft | Self::DeleteRight)
    }

    /// Short label for listings
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::CreateNewLeft => "<- create",
            Self::CreateNewRight => "create ->",
            Self::DeleteLeft => "<- delete",
            Self::DeleteRight => "delete ->",
            Self::OverwriteLeft => "<- overwrite",
            Self::OverwriteRight => "overwrite ->",
            Self::DoNothing => "skip",
            Self::Equal => "equal",
            Self::UnresolvedConflict => "conflict",
        }
    }
}

/// Explicit direction per comparison category
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CategoryDirections {
    /// Item exists on the left only
    pub ex_left_side_only: SyncDirection,
    /// Item exists on the right only
    pub ex_right_side_only: SyncDirection,
    /// Left is newer
    pub left_newer: SyncDirection,
    /// Right is newer
    pub right_newer: SyncDirection,
    /// Content differs
    pub different: SyncDirection,
    /// Conflict and metadata-only differences
    pub conflict: SyncDirection,
}

impl CategoryDirections {
    /// Propagate changes in both directions, newer wins
    #[must_use]
    pub const fn two_way() -> Self {
        Self {
            ex_left_side_only: SyncDirection::Right,
            ex_right_side_only: SyncDirection::Left,
            left_newer: SyncDirection::Right,
            right_newer: SyncDirection::Left,
            different: SyncDirection::None,
            conflict: SyncDirection::None,
        }
    }

    /// Make the right side an exact copy of the left
    #[must_use]
    pub const fn mirror() -> Self {
        Self {
            ex_left_side_only: SyncDirection::Right,
            ex_right_side_only: SyncDirection::Right,
            left_newer: SyncDirection::Right,
            right_newer: SyncDirection::Right,
            different: SyncDirection::Right,
            conflict: SyncDirection::Right,
        }
    }

    /// Copy new and updated items to the right, never delete
    #[must_use]
    pub const fn update() -> Self {
        Self {
            ex_left_side_only: SyncDirection::Right,
            ex_right_side_only: SyncDirection::None,
            left_newer: SyncDirection::Right,
            right_newer: SyncDirection::None,
            different: SyncDirection::Right,
            conflict: SyncDirection::None,
        }
    }
}

impl Default for CategoryDirections {
    fn default() -> Self {
        Self::two_way()
    }
}

/// How directions are assigned
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DirectionConfig {
    /// Infer from the sync database
    Automatic,
    /// Fixed mapping per category
    ByCategory(CategoryDirections),
}

impl DirectionConfig {
    /// Whether the sync database is consulted and written
    #[must_use]
    pub const fn is_automatic(&self) -> bool {
        matches!(self, Self::Automatic)
    }
}

impl Default for DirectionConfig {
    fn default() -> Self {
        Self::Automatic
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mirrored_is_involution() {
        let all = [
            CompareResult::LeftOnly,
            CompareResult::RightOnly,
            CompareResult::LeftNewer,
            CompareResult::RightNewer,
            CompareResult::Different,
            CompareResult::Equal,
            CompareResult::Conflict,
            CompareResult::DifferentMetadata,
        ];
        for result in all {
            assert_eq!(result.mirrored().mirrored(), result);
        }
        assert_eq!(CompareResult::LeftOnly.mirrored(), CompareResult::RightOnly);
    }

    #[test]
    fn test_direction_mirrored_keeps_conflict_text() {
        let conflict = SyncDirection::Conflict("why".to_string());
        assert_eq!(conflict.mirrored(), conflict);
        assert_eq!(SyncDirection::Left.mirrored(), SyncDirection::Right);
    }

    #[test]
    fn test_operation_target_side() {
        assert_eq!(SyncOperation::DeleteLeft.target_side(), Some(Side::Left));
        assert_eq!(SyncOperation::OverwriteRight.target_side(), Some(Side::Right));
        assert_eq!(SyncOperation::Equal.target_side(), None);
        assert!(SyncOperation::DeleteRight.is_deletion());
        assert!(!SyncOperation::CreateNewRight.is_deletion());
    }

    #[test]
    fn test_compare_variant_serde() {
        let json = serde_json::to_string(&CompareVariant::ByContent).unwrap();
        assert_eq!(json, r#""content""#);
        let parsed: CompareVariant = serde_json::from_str(r#""time-size""#).unwrap();
        assert_eq!(parsed, CompareVariant::ByTimeSize);
    }
}
