//! Time and size filtering

/// Filter on modification time and file size
///
/// Soft filters only ever deactivate items, so they can run directly after a
/// name filter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SoftFilter {
    time_from: i64,
    size_min: u64,
    size_max: u64,
}

impl SoftFilter {
    /// Create a filter; items must be at least as new as `time_from` and have a
    /// size within `size_min..=size_max`
    #[must_use]
    pub const fn new(time_from: i64, size_min: u64, size_max: u64) -> Self {
        Self {
            time_from,
            size_min,
            size_max,
        }
    }

    /// Filter that matches everything
    #[must_use]
    pub const fn null() -> Self {
        Self::new(i64::MIN, 0, u64::MAX)
    }

    /// Whether the filter matches everything
    #[must_use]
    pub const fn is_null(&self) -> bool {
        self.time_from == i64::MIN && self.size_min == 0 && self.size_max == u64::MAX
    }

    /// Whether a modification time passes
    #[must_use]
    pub const fn match_time(&self, mtime: i64) -> bool {
        mtime >= self.time_from
    }

    /// Whether a file size passes
    #[must_use]
    pub const fn match_size(&self, size: u64) -> bool {
        self.size_min <= size && size <= self.size_max
    }

    /// Directories only pass a null filter; an active time or size filter
    /// deactivates them so that empty folders are not created
    #[must_use]
    pub const fn match_folder(&self) -> bool {
        self.is_null()
    }

    /// Intersection of two filters
    #[must_use]
    pub fn combine(&self, other: &Self) -> Self {
        Self {
            time_from: self.time_from.max(other.time_from),
            size_min: self.size_min.max(other.size_min),
            size_max: self.size_max.min(other.size_max),
        }
    }
}

impl Default for SoftFilter {
    fn default() -> Self {
        Self::null()
    }
}
