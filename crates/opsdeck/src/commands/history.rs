//! Conversation history commands.

use anyhow::Result;
use colored::Colorize;
use dialoguer::Confirm;
use opsdeck_core::types::AgentMessage;

use crate::app::App;
use crate::cli::{HistoryAction, HistoryCommand};
use crate::config::Config;
use crate::output::message_block;

pub async fn execute(cmd: HistoryCommand, config: &Config) -> Result<()> {
    let app = App::open(config)?;
    match cmd.action {
        HistoryAction::Show { limit, json } => show(&app, limit, json),
        HistoryAction::Clear { force } => clear(&app, force),
    }
}

fn tail(history: &[AgentMessage], limit: Option<usize>) -> &[AgentMessage] {
    match limit {
        Some(n) => &history[history.len().saturating_sub(n)..],
        None => history,
    }
}

fn show(app: &App, limit: Option<usize>, json: bool) -> Result<()> {
    let history = app.agent.history();
    let shown = tail(&history, limit);

    if json {
        println!("{}", serde_json::to_string_pretty(shown)?);
        return Ok(());
    }

    println!("{}", "Conversation".cyan().bold());
    println!("{}", "─".repeat(50));
    if shown.is_empty() {
        println!("{}", "No messages".dimmed());
        return Ok(());
    }
    for message in shown {
        println!("{}\n", message_block(message));
    }
    if shown.len() < history.len() {
        println!(
            "{}",
            format!("({} earlier messages hidden)", history.len() - shown.len()).dimmed()
        );
    }
    Ok(())
}

fn clear(app: &App, force: bool) -> Result<()> {
    let count = app.agent.history().len();
    if count == 0 {
        println!("{}", "History is already empty".dimmed());
        return Ok(());
    }

    if !force {
        let confirmed = Confirm::new()
            .with_prompt(format!("Delete {} messages?", count))
            .default(false)
            .interact()?;
        if !confirmed {
            println!("Aborted");
            return Ok(());
        }
    }

    app.agent.clear_history()?;
    println!("{}", format!("✓ Deleted {} messages", count).green());
    Ok(())
}
