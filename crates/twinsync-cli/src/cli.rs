use clap::{ArgAction, Args, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;
use twinsync_core::config::OnError;

/// Two-way folder synchronization
///
/// Compares folder pairs, decides a direction for every difference and
/// applies it. Folder pairs and options come from config files or the command line.
#[derive(Parser, Debug)]
#[command(name = "twinsync")]
#[command(about, long_about = None, version)]
pub struct Cli {
    /// Increase log output (-v info, -vv debug)
    #[arg(short, long, global = true, action = ArgAction::Count)]
    pub verbose: u8,

    /// Use specific config file
    #[arg(long, global = true, value_name = "PATH", conflicts_with = "no_config")]
    pub config: Option<PathBuf>,

    /// Ignore all config files
    #[arg(long, global = true, conflicts_with = "config")]
    pub no_config: bool,

    /// Reaction to failed file operations (overrides the config)
    #[arg(long, global = true, value_enum, value_name = "MODE")]
    pub on_error: Option<ErrorMode>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Compare folder pairs and show what synchronization would do
    Compare {
        #[command(flatten)]
        pair: PairArgs,
    },

    /// Compare and synchronize folder pairs
    Sync {
        #[command(flatten)]
        pair: PairArgs,

        /// Show the plan without changing anything
        #[arg(long)]
        dry_run: bool,

        /// Wait for missing base directories (e.g. network shares) before comparing
        #[arg(long)]
        wait_missing: bool,

        /// Do not ask for confirmation before synchronizing
        #[arg(short, long)]
        yes: bool,
    },

    /// Print the merged configuration
    Config,
}

/// Folder pair given on the command line, replacing configured pairs
#[derive(Args, Debug, Default)]
pub struct PairArgs {
    /// Left base directory
    #[arg(requires = "right", value_name = "LEFT")]
    pub left: Option<PathBuf>,

    /// Right base directory
    #[arg(requires = "left", value_name = "RIGHT")]
    pub right: Option<PathBuf>,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum ErrorMode {
    /// Ask whether to retry, ignore or abort (ignores when not on a terminal)
    Popup,
    /// Log the error and continue with the next item
    Ignore,
    /// Stop at the first error
    Exit,
}

impl From<ErrorMode> for OnError {
    fn from(mode: ErrorMode) -> Self {
        match mode {
            ErrorMode::Popup => Self::Popup,
            ErrorMode::Ignore => Self::Ignore,
            ErrorMode::Exit => Self::Exit,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_sync() {
        let cli = Cli::parse_from(["twinsync", "-vv", "sync", "/a", "/b", "--dry-run", "--on-error", "exit"]);
        assert_eq!(cli.verbose, 2);
        assert!(matches!(cli.on_error, Some(ErrorMode::Exit)));
        match cli.command {
            Commands::Sync { pair, dry_run, yes, .. } => {
                assert_eq!(pair.left, Some(PathBuf::from("/a")));
                assert_eq!(pair.right, Some(PathBuf::from("/b")));
                assert!(dry_run);
                assert!(!yes);
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn test_single_directory_is_rejected() {
        assert!(Cli::try_parse_from(["twinsync", "compare", "/a"]).is_err());
    }
}
