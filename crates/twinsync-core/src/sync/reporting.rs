//! Sync plan and result reporting

use std::fmt::Write;

use super::SyncResult;
use super::statistics::{SyncStatistics, format_bytes};

/// Sync operation reporter
pub struct SyncReporter;

impl SyncReporter {
    /// Describe what a synchronization would do
    #[must_use]
    pub fn generate_preview(stats: &SyncStatistics) -> String {
        let mut output = String::new();

        output.push_str("\n=== Sync Preview ===\n");
        let _ = writeln!(output, "Create:    {} left, {} right", stats.create_left, stats.create_right);
        let _ = writeln!(output, "Overwrite: {} left, {} right", stats.overwrite_left, stats.overwrite_right);
        let _ = writeln!(output, "Delete:    {} left, {} right", stats.delete_left, stats.delete_right);
        let _ = writeln!(output, "Conflicts: {}", stats.conflicts);
        for (path, reason) in &stats.first_conflicts {
            let _ = writeln!(output, "  - {}: {reason}", path.display());
        }
        let _ = writeln!(output, "\nData to copy: {}", format_bytes(stats.data_to_process));

        if !stats.synchronization_needed() {
            output.push_str("Status: ✓ Already in sync\n");
        }

        output
    }

    /// Generate a summary report
    #[must_use]
    pub fn generate_summary(result: &SyncResult) -> String {
        let mut output = String::new();

        output.push_str("\n=== Sync Summary ===\n");
        let _ = writeln!(output, "Created:     {}", result.created);
        let _ = writeln!(output, "Overwritten: {}", result.overwritten);
        let _ = writeln!(output, "Deleted:     {}", result.deleted);
        if result.renamed > 0 {
            let _ = writeln!(output, "Renamed:     {}", result.renamed);
        }
        let _ = writeln!(output, "Conflicts:   {}", result.conflicts);

        if !result.errors.is_empty() {
            let _ = writeln!(output, "\nErrors ({}):", result.errors.len());
            for error in &result.errors {
                let _ = writeln!(output, "  - {error}");
            }
        }

        let _ = writeln!(output, "\nTotal operations: {}", result.total_operations());

        if result.is_success() {
            output.push_str("Status: ✓ Success\n");
        } else {
            output.push_str("Status: ✗ Completed with errors\n");
        }

        output
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_summary_success() {
        let result = SyncResult {
            created: 2,
            deleted: 1,
            ..SyncResult::default()
        };

        let summary = SyncReporter::generate_summary(&result);

        assert!(summary.contains("=== Sync Summary ==="));
        assert!(summary.contains("Created:     2"));
        assert!(summary.contains("Total operations: 3"));
        assert!(summary.contains("✓ Success"));
        assert!(!summary.contains("Renamed"));
    }

    #[test]
    fn test_summary_with_errors() {
        let result = SyncResult {
            errors: vec!["Cannot open file \"x\"".to_string()],
            ..SyncResult::default()
        };

        let summary = SyncReporter::generate_summary(&result);

        assert!(summary.contains("Errors (1):"));
        assert!(summary.contains("  - Cannot open file \"x\""));
        assert!(summary.contains("✗ Completed with errors"));
    }

    #[test]
    fn test_preview() {
        let stats = SyncStatistics {
            create_right: 3,
            delete_left: 1,
            data_to_process: 2048,
            rows_total: 4,
            ..SyncStatistics::default()
        };

        let preview = SyncReporter::generate_preview(&stats);

        assert!(preview.contains("Create:    0 left, 3 right"));
        assert!(preview.contains("Delete:    1 left, 0 right"));
        assert!(preview.contains("Data to copy: 2.0 KB"));
        assert!(!preview.contains("Already in sync"));
        assert!(SyncReporter::generate_preview(&SyncStatistics::default()).contains("Already in sync"));
    }
}
