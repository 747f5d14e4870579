use anyhow::Context;

use super::common::{Outcome, load_config};
use crate::cli::Cli;

pub struct Config;

impl Config {
    pub fn execute(cli: &Cli) -> anyhow::Result<Outcome> {
        let config = load_config(cli, None)?;
        let text = toml::to_string_pretty(&config).context("Failed to serialize configuration")?;

        if text.trim().is_empty() {
            println!("# no configuration found, using defaults");
        } else {
            print!("{text}");
        }
        Ok(Outcome::Success)
    }
}
