use std::fmt::Write;

use twinsync_core::hierarchy::{FolderComparison, Side, SyncOperation};
use twinsync_core::status::AbortFlag;
use twinsync_core::sync::{SyncReporter, SyncStatistics};

use super::common::{Outcome, build_plan, load_config};
use crate::cli::{Cli, PairArgs};
use crate::status_handler::BatchStatusHandler;

pub struct Compare;

impl Compare {
    pub fn execute(cli: &Cli, pair: &PairArgs, abort: AbortFlag) -> anyhow::Result<Outcome> {
        let config = load_config(cli, Some(pair))?;
        let mut handler = BatchStatusHandler::new(config.on_error(), abort);

        let folder_cmp = build_plan(&config, &mut handler)?;

        print!("{}", Self::render(&folder_cmp, cli.verbose > 0));
        println!("{}", SyncReporter::generate_preview(&SyncStatistics::new(&folder_cmp)));

        Ok(Outcome::from_counts(handler.warnings(), handler.errors()))
    }

    /// One line per item; equal items only when `show_equal` is set
    pub fn render(folder_cmp: &FolderComparison, show_equal: bool) -> String {
        let mut output = String::new();
        for mapping in folder_cmp {
            let _ = writeln!(
                output,
                "{} <-> {}",
                mapping.base(Side::Left).display(),
                mapping.base(Side::Right).display()
            );

            let hierarchy = mapping.hierarchy();
            for id in hierarchy.ids() {
                let node = hierarchy.node(id);
                let operation = node.sync_operation();
                if operation == SyncOperation::Equal && !show_equal {
                    continue;
                }
                let _ = write!(
                    output,
                    "  {:<14} {:<20} {}",
                    operation.label(),
                    node.category().label(),
                    hierarchy.relative_path(id).display()
                );
                if !node.category_description().is_empty() {
                    let _ = write!(output, "  ({})", node.category_description().replace('\n', " "));
                }
                output.push('\n');
            }
        }
        output
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use twinsync_core::hierarchy::{BaseDirMapping, CompareResult, CompareVariant, ItemDescriptor, SyncDirection};

    #[test]
    fn test_render_skips_equal_items() {
        let mut mapping = BaseDirMapping::new("/l", "/r", CompareVariant::ByTimeSize, 2);
        let h = mapping.hierarchy_mut();
        let new = h.add_file(None, Some(ItemDescriptor::file("new.txt", 1, 1)), None);
        h.set_direction(new, SyncDirection::Right);
        let same = h.add_file(
            None,
            Some(ItemDescriptor::file("same.txt", 1, 1)),
            Some(ItemDescriptor::file("same.txt", 1, 1)),
        );
        h.set_category(same, CompareResult::Equal, "");
        let cmp = vec![mapping];

        let short = Compare::render(&cmp, false);
        assert!(short.contains("create ->"));
        assert!(short.contains("new.txt"));
        assert!(!short.contains("same.txt"));

        assert!(Compare::render(&cmp, true).contains("same.txt"));
    }
}
