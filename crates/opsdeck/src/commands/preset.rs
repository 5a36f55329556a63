//! Preset commands.

use anyhow::Result;
use colored::Colorize;

use crate::app::App;
use crate::cli::{PresetAction, PresetCommand};
use crate::config::Config;

pub async fn execute(cmd: PresetCommand, config: &Config) -> Result<()> {
    let app = App::open(config)?;
    match cmd.action {
        PresetAction::List { json } => list(&app, json),
        PresetAction::Save { command } => save(&app, &command.join(" ")),
        PresetAction::Delete { id } => delete(&app, &id),
    }
}

fn list(app: &App, json: bool) -> Result<()> {
    let presets = app.agent.presets();

    if json {
        println!("{}", serde_json::to_string_pretty(&presets)?);
        return Ok(());
    }

    println!("{}", "Presets".cyan().bold());
    println!("{}", "─".repeat(50));
    if presets.is_empty() {
        println!("{}", "No presets saved".dimmed());
        return Ok(());
    }
    for preset in &presets {
        println!("  {}  {}", preset.id.dimmed(), preset.label.bold());
        println!("      {}", preset.command);
    }
    Ok(())
}

fn save(app: &App, command: &str) -> Result<()> {
    match app.agent.save_preset(command) {
        Some(preset) => {
            println!("{} {}", "✓ Saved preset".green(), preset.label.bold());
            println!("  ID: {}", preset.id);
            Ok(())
        }
        None => anyhow::bail!("Preset command is empty"),
    }
}

fn delete(app: &App, id: &str) -> Result<()> {
    if app.agent.delete_preset(id) {
        println!("{}", format!("✓ Deleted preset {}", id).green());
        Ok(())
    } else {
        anyhow::bail!("Preset not found: {}", id)
    }
}
