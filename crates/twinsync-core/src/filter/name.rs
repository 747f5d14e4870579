//! Include/exclude name filtering using gitignore-style globs

use std::path::{Component, Path};

use anyhow::Context;
use ignore::gitignore::{Gitignore, GitignoreBuilder};

/// Include pattern that matches every item
pub const INCLUDE_ALL: &str = "*";

/// Glob based name filter
///
/// An item passes if an include pattern matches it or one of its parent
/// directories, and no exclude pattern matches it or a parent directory.
#[derive(Debug, Clone)]
pub struct NameFilter {
    include: Gitignore,
    exclude: Gitignore,
    include_patterns: Vec<String>,
    include_all: bool,
}

impl NameFilter {
    /// Build a filter from include and exclude patterns
    ///
    /// An empty include list behaves like [`INCLUDE_ALL`].
    ///
    /// # Errors
    ///
    /// Returns an error if a pattern is not a valid glob.
    pub fn new(include: &[String], exclude: &[String]) -> anyhow::Result<Self> {
        let include_patterns: Vec<String> = if include.is_empty() {
            vec![INCLUDE_ALL.to_string()]
        } else {
            include.iter().map(|p| p.trim().to_string()).collect()
        };

        let include_all = include_patterns.iter().any(|p| p == INCLUDE_ALL || p == "**");

        Ok(Self {
            include: build_matcher(&include_patterns, "include")?,
            exclude: build_matcher(exclude, "exclude")?,
            include_patterns,
            include_all,
        })
    }

    /// Filter that lets everything pass
    #[must_use]
    pub fn pass_all() -> Self {
        Self {
            include: Gitignore::empty(),
            exclude: Gitignore::empty(),
            include_patterns: vec![INCLUDE_ALL.to_string()],
            include_all: true,
        }
    }

    /// Whether the filter can never deactivate anything
    #[must_use]
    pub fn is_null(&self) -> bool {
        self.include_all && self.exclude.is_empty()
    }

    /// Whether a file or symlink at `rel_path` passes
    #[must_use]
    pub fn pass_file_filter(&self, rel_path: &Path) -> bool {
        self.is_included(rel_path, false) && !self.is_excluded(rel_path, false)
    }

    /// Check a directory
    ///
    /// Returns `(passes, sub_items_might_match)`. The second value is `false`
    /// when nothing below the directory can pass, so callers may skip the
    /// whole subtree.
    #[must_use]
    pub fn pass_dir_filter(&self, rel_path: &Path) -> (bool, bool) {
        if self.is_excluded(rel_path, true) {
            return (false, false);
        }
        if self.is_included(rel_path, true) {
            return (true, true);
        }
        (false, self.include_reaches_below(rel_path))
    }

    fn is_included(&self, rel_path: &Path, is_dir: bool) -> bool {
        self.include_all
            || self
                .include
                .matched_path_or_any_parents(rel_path, is_dir)
                .is_ignore()
    }

    fn is_excluded(&self, rel_path: &Path, is_dir: bool) -> bool {
        self.exclude
            .matched_path_or_any_parents(rel_path, is_dir)
            .is_ignore()
    }

    /// Conservative check whether an include pattern may match an item below `dir`
    fn include_reaches_below(&self, dir: &Path) -> bool {
        let dir_parts: Vec<&str> = dir
            .components()
            .filter_map(|c| match c {
                Component::Normal(s) => s.to_str(),
                _ => None,
            })
            .collect();

        self.include_patterns
            .iter()
            .any(|pattern| pattern_reaches_below(pattern, &dir_parts))
    }
}

impl Default for NameFilter {
    fn default() -> Self {
        Self::pass_all()
    }
}

fn build_matcher(patterns: &[String], what: &str) -> anyhow::Result<Gitignore> {
    let mut builder = GitignoreBuilder::new("");
    builder.case_insensitive(cfg!(windows))?;

    for pattern in patterns {
        let pattern = pattern.trim();
        if pattern.is_empty() {
            continue;
        }
        builder
            .add_line(None, pattern)
            .with_context(|| format!("Invalid {what} pattern: '{pattern}'"))?;
    }

    Ok(builder.build()?)
}

fn has_glob_chars(s: &str) -> bool {
    s.contains(['*', '?', '['])
}

/// Whether `pattern` might match a path strictly below `dir_parts`
fn pattern_reaches_below(pattern: &str, dir_parts: &[&str]) -> bool {
    let body = pattern.trim_end_matches('/');
    // unanchored patterns match at any depth
    if !body.contains('/') {
        return true;
    }

    let parts: Vec<&str> = body.trim_start_matches('/').split('/').collect();
    if parts.len() <= dir_parts.len() && !parts.contains(&"**") {
        return false;
    }

    for (pattern_part, dir_part) in parts.iter().zip(dir_parts) {
        if *pattern_part == "**" {
            return true;
        }
        if has_glob_chars(pattern_part) {
            continue;
        }
        let equal = if cfg!(windows) {
            pattern_part.eq_ignore_ascii_case(dir_part)
        } else {
            pattern_part == dir_part
        };
        if !equal {
            return false;
        }
    }
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn filter(include: &[&str], exclude: &[&str]) -> NameFilter {
        let include: Vec<String> = include.iter().map(ToString::to_string).collect();
        let exclude: Vec<String> = exclude.iter().map(ToString::to_string).collect();
        NameFilter::new(&include, &exclude).unwrap()
    }

    #[test]
    fn test_default_passes_everything() {
        let f = NameFilter::default();
        assert!(f.is_null());
        assert!(f.pass_file_filter(&PathBuf::from("any/file.txt")));
        assert_eq!(f.pass_dir_filter(&PathBuf::from("any")), (true, true));
    }

    #[test]
    fn test_exclude_pattern() {
        let f = filter(&[], &["*.tmp"]);

        assert!(!f.is_null());
        assert!(!f.pass_file_filter(&PathBuf::from("file.tmp")));
        assert!(!f.pass_file_filter(&PathBuf::from("deep/dir/file.tmp")));
        assert!(f.pass_file_filter(&PathBuf::from("file.txt")));
    }

    #[test]
    fn test_excluded_directory_hides_subtree() {
        let f = filter(&[], &["node_modules/"]);

        assert_eq!(f.pass_dir_filter(&PathBuf::from("node_modules")), (false, false));
        assert!(!f.pass_file_filter(&PathBuf::from("node_modules/pkg/index.js")));
        assert_eq!(f.pass_dir_filter(&PathBuf::from("src")), (true, true));
    }

    #[test]
    fn test_include_limits_items() {
        let f = filter(&["/docs"], &[]);

        assert!(f.pass_file_filter(&PathBuf::from("docs/readme.md")));
        assert!(!f.pass_file_filter(&PathBuf::from("src/main.rs")));
        assert_eq!(f.pass_dir_filter(&PathBuf::from("docs")), (true, true));
        assert_eq!(f.pass_dir_filter(&PathBuf::from("src")), (false, false));
    }

    #[test]
    fn test_anchored_include_reaches_below_parent() {
        let f = filter(&["/a/b/*.txt"], &[]);

        assert_eq!(f.pass_dir_filter(&PathBuf::from("a")), (false, true));
        assert_eq!(f.pass_dir_filter(&PathBuf::from("a/b")), (false, true));
        assert_eq!(f.pass_dir_filter(&PathBuf::from("c")), (false, false));
        assert!(f.pass_file_filter(&PathBuf::from("a/b/x.txt")));
        assert!(!f.pass_file_filter(&PathBuf::from("a/x.txt")));
    }

    #[test]
    fn test_unanchored_include_might_match_anywhere() {
        let f = filter(&["*.rs"], &[]);

        assert_eq!(f.pass_dir_filter(&PathBuf::from("src")), (false, true));
        assert!(f.pass_file_filter(&PathBuf::from("src/lib.rs")));
        assert!(!f.pass_file_filter(&PathBuf::from("src/lib.c")));
    }

    #[test]
    fn test_invalid_pattern_is_error() {
        let result = NameFilter::new(&["[".to_string()], &[]);
        assert!(result.is_err());
    }
}
