//! Configuration file commands.

use anyhow::{Context, Result};
use colored::Colorize;

use crate::cli::{ConfigAction, ConfigCommand};
use crate::config::Config;

pub fn execute(cmd: ConfigCommand, config: &Config) -> Result<()> {
    match cmd.action {
        ConfigAction::Path => {
            println!("{}", Config::config_path().display());
            Ok(())
        }
        ConfigAction::Show => {
            let mut shown = config.clone();
            if shown.agent.api_key.is_some() {
                shown.agent.api_key = Some("********".to_string());
            }
            print!(
                "{}",
                toml::to_string_pretty(&shown).context("Failed to serialize config")?
            );
            Ok(())
        }
        ConfigAction::Init { force } => {
            let path = Config::config_path();
            Config::init_file(&path, force)?;
            config.ensure_dirs()?;
            println!("{} {}", "✓ Wrote".green(), path.display());
            Ok(())
        }
    }
}
