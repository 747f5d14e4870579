mod cli;
mod commands;
mod status_handler;

use std::process::ExitCode;

use clap::Parser;
use cli::{Cli, Commands};
use commands::Outcome;
use tracing_subscriber::EnvFilter;
use twinsync_core::error::SyncError;
use twinsync_core::status::AbortFlag;

fn init_logging(verbose: u8) {
    let default_level = match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn run(cli: &Cli, abort: AbortFlag) -> anyhow::Result<Outcome> {
    match &cli.command {
        Commands::Compare { pair } => commands::Compare::execute(cli, pair, abort),
        Commands::Sync {
            pair,
            dry_run,
            wait_missing,
            yes,
        } => commands::Synchronize::execute(cli, pair, *dry_run, *wait_missing, *yes, abort),
        Commands::Config => commands::Config::execute(cli),
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let abort = AbortFlag::new();
    let handler_flag = abort.clone();
    if let Err(err) = ctrlc::set_handler(move || {
        eprintln!("\nAbort requested, finishing current item...");
        handler_flag.request();
    }) {
        tracing::warn!("cannot install Ctrl+C handler: {err}");
    }

    let outcome = match run(&cli, abort) {
        Ok(outcome) => outcome,
        Err(err) if err.downcast_ref::<SyncError>().is_some_and(SyncError::is_abort) => {
            eprintln!("Operation aborted by user");
            Outcome::Aborted
        }
        Err(err) => {
            eprintln!("Error: {err:#}");
            Outcome::Errors
        }
    };
    outcome.exit_code()
}
