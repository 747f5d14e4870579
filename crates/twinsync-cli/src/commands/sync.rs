use std::time::Duration;

use anyhow::Context;
use dialoguer::Confirm;
use twinsync_core::async_task::wait_for_missing_dirs;
use twinsync_core::error::SyncError;
use twinsync_core::status::{AbortFlag, ProcessCallback};
use twinsync_core::sync::{SyncProcess, SyncReporter, SyncStatistics};

use super::common::{Outcome, build_plan, load_config};
use crate::cli::{Cli, PairArgs};
use crate::status_handler::BatchStatusHandler;

/// Interval between checks for a missing directory
const MISSING_DIR_CHECK_INTERVAL: Duration = Duration::from_secs(5);

pub struct Synchronize;

impl Synchronize {
    #[allow(clippy::fn_params_excessive_bools)]
    pub fn execute(
        cli: &Cli,
        pair: &PairArgs,
        dry_run: bool,
        wait_missing: bool,
        yes: bool,
        abort: AbortFlag,
    ) -> anyhow::Result<Outcome> {
        let config = load_config(cli, Some(pair))?;
        let mut handler = BatchStatusHandler::new(config.on_error(), abort);

        if wait_missing {
            let dirs: Vec<_> = config
                .folder_pairs()
                .into_iter()
                .flat_map(|p| [p.left, p.right])
                .collect();
            wait_for_missing_dirs(&dirs, MISSING_DIR_CHECK_INTERVAL, |_| handler.request_ui_refresh())?;
        }

        let mut folder_cmp = build_plan(&config, &mut handler)?;
        let stats = SyncStatistics::new(&folder_cmp);

        if dry_run {
            println!("{}", SyncReporter::generate_preview(&stats));
            return Ok(Outcome::from_counts(handler.warnings(), handler.errors()));
        }

        if !yes && handler.is_interactive() && stats.synchronization_needed() {
            println!("{}", SyncReporter::generate_preview(&stats));
            let start = Confirm::new()
                .with_prompt("Start synchronization?")
                .default(true)
                .interact()
                .context("Failed to show prompt")?;
            if !start {
                return Ok(Outcome::Aborted);
            }
        }

        let result = SyncProcess::new(config.sync_options(), &mut handler)
            .start_synchronization(&mut folder_cmp, &config.sync_configs());

        match result {
            Ok(result) => {
                println!("{}", SyncReporter::generate_summary(&result));
                let errors = handler.errors().max(result.errors.len());
                Ok(Outcome::from_counts(handler.warnings(), errors))
            }
            Err(SyncError::Abort) => {
                eprintln!("\nSynchronization aborted after {} items.", handler.items_done());
                if handler.stopped_on_error() {
                    return Ok(Outcome::Errors);
                }
                Ok(Outcome::Aborted)
            }
            Err(err) => Err(err).context("Synchronization failed"),
        }
    }
}
