//! Interactive operator console.
//!
//! Reads lines with a dialoguer prompt. `/`-prefixed input and plain text go
//! to the agent; `:`-prefixed input is handled by the console itself:
//!
//! - `:logs` prints the event log
//! - `:top` prints current telemetry
//! - `:presets` lists presets, `:save <text>` saves one
//! - `:run <n>` submits preset n, `:drop <n>` deletes it
//! - `:task workflow|synthesis` starts a load task in the background
//! - `:quit` leaves
//!
//! Ctrl-C at the prompt also leaves. While a reply streams it cancels the reply.

use anyhow::{Context, Result};
use colored::Colorize;
use dialoguer::Input;
use opsdeck_core::tasks::{ProgressTask, TaskKind};
use opsdeck_core::types::Preset;
use std::future::Future;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use super::ask::{report, submit_streaming};
use crate::app::App;
use crate::config::Config;
use crate::output::{LogCursor, log_line, telemetry_line};

/// Console-level input, parsed before anything reaches the agent.
#[derive(Debug, Clone, PartialEq)]
enum ConsoleInput {
    Empty,
    Quit,
    Logs,
    Top,
    Presets,
    SavePreset(String),
    RunPreset(usize),
    DropPreset(usize),
    StartTask(TaskKind),
    Invalid(String),
    Submit(String),
}

impl ConsoleInput {
    fn parse(line: &str) -> Self {
        let line = line.trim();
        if line.is_empty() {
            return ConsoleInput::Empty;
        }
        let Some(rest) = line.strip_prefix(':') else {
            return ConsoleInput::Submit(line.to_string());
        };

        let (head, arg) = match rest.split_once(char::is_whitespace) {
            Some((head, arg)) => (head, arg.trim()),
            None => (rest, ""),
        };

        let index = |arg: &str| arg.parse::<usize>().ok().filter(|n| *n > 0);

        match (head, arg) {
            ("quit" | "q" | "exit", "") => ConsoleInput::Quit,
            ("logs", "") => ConsoleInput::Logs,
            ("top", "") => ConsoleInput::Top,
            ("presets", "") => ConsoleInput::Presets,
            ("save", text) if !text.is_empty() => ConsoleInput::SavePreset(text.to_string()),
            ("run", n) => match index(n) {
                Some(n) => ConsoleInput::RunPreset(n),
                None => ConsoleInput::Invalid(format!(":run expects a preset number, got '{}'", n)),
            },
            ("drop", n) => match index(n) {
                Some(n) => ConsoleInput::DropPreset(n),
                None => {
                    ConsoleInput::Invalid(format!(":drop expects a preset number, got '{}'", n))
                }
            },
            ("task", "workflow") => ConsoleInput::StartTask(TaskKind::Workflow),
            ("task", "synthesis") => ConsoleInput::StartTask(TaskKind::Synthesis),
            _ => ConsoleInput::Invalid(format!("Unknown console command ':{}'", rest)),
        }
    }
}

pub async fn execute(config: &Config) -> Result<()> {
    let app = App::open(config)?;
    app.start_telemetry();

    print_banner(&app);
    let mut cursor = LogCursor::default();
    let tasks = CancellationToken::new();
    let mut interrupted = false;

    loop {
        for entry in cursor.fresh(&app.hub.logs()) {
            println!("{}", log_line(entry));
        }
        println!("{}", telemetry_line(&app.hub.state(), app.load.get()).dimmed());

        let prompt = async {
            let line = tokio::task::spawn_blocking(|| {
                Input::<String>::new()
                    .with_prompt("opsdeck")
                    .allow_empty(true)
                    .interact_text()
            })
            .await??;
            Ok::<_, anyhow::Error>(line)
        };
        let Some(line) = until_interrupted(prompt, tokio::signal::ctrl_c()).await? else {
            interrupted = true;
            break;
        };

        match ConsoleInput::parse(&line) {
            ConsoleInput::Empty => {}
            ConsoleInput::Quit => break,
            ConsoleInput::Logs => {
                for entry in app.hub.logs() {
                    println!("{}", log_line(&entry));
                }
            }
            ConsoleInput::Top => {
                let state = app.hub.state();
                println!("{}", telemetry_line(&state, app.load.get()));
                let services: Vec<&str> =
                    state.active_services.iter().map(String::as_str).collect();
                println!("  services: {}", services.join(", "));
            }
            ConsoleInput::Presets => print_presets(&app.agent.presets()),
            ConsoleInput::SavePreset(text) => match app.agent.save_preset(&text) {
                Some(preset) => println!("{} {}", "✓ Saved preset".green(), preset.label),
                None => println!("{}", "Nothing to save".yellow()),
            },
            ConsoleInput::RunPreset(n) => match app.agent.presets().get(n - 1) {
                Some(preset) => {
                    println!("{} {}", "▶".cyan(), preset.command);
                    submit(&app, &preset.command).await;
                }
                None => println!("{}", format!("No preset #{}", n).yellow()),
            },
            ConsoleInput::DropPreset(n) => {
                let removed = app
                    .agent
                    .presets()
                    .get(n - 1)
                    .map(|p| app.agent.delete_preset(&p.id))
                    .unwrap_or(false);
                if removed {
                    println!("{}", format!("✓ Deleted preset #{}", n).green());
                } else {
                    println!("{}", format!("No preset #{}", n).yellow());
                }
            }
            ConsoleInput::StartTask(kind) => start_task(&app, config, kind, tasks.child_token()),
            ConsoleInput::Invalid(reason) => println!("{}", reason.yellow()),
            ConsoleInput::Submit(text) => submit(&app, &text).await,
        }
    }

    tasks.cancel();
    app.simulator.stop();
    if interrupted {
        println!();
    }
    println!("{}", "Bye.".dimmed());

    if interrupted {
        // The prompt thread is still blocked on stdin and would hold up runtime shutdown.
        std::process::exit(130);
    }
    Ok(())
}

/// Wait for `line` unless `interrupt` fires first. `None` means interrupted.
async fn until_interrupted<T>(
    line: impl Future<Output = Result<T>>,
    interrupt: impl Future<Output = std::io::Result<()>>,
) -> Result<Option<T>> {
    tokio::select! {
        line = line => line.map(Some),
        signal = interrupt => {
            signal.context("Failed to listen for Ctrl-C")?;
            Ok(None)
        }
    }
}

async fn submit(app: &App, text: &str) {
    match submit_streaming(app, text).await {
        Ok(outcome) => report(&outcome),
        Err(e) => println!("{} {:#}", "✗".red(), e),
    }
}

fn start_task(app: &App, config: &Config, kind: TaskKind, cancel: CancellationToken) {
    let task = Arc::new(
        ProgressTask::new(kind, app.hub.clone(), app.load.clone())
            .with_load(config.task_load(kind)),
    );
    println!("{} {}", "▶ Started".cyan(), kind.label());

    tokio::spawn(async move {
        match task.run(cancel).await {
            Ok(state) => info!(kind = ?kind, state = ?state, "Background task finished"),
            Err(e) => warn!(kind = ?kind, error = %e, "Background task failed"),
        }
    });
}

fn print_banner(app: &App) {
    println!("{}", "opsdeck console".cyan().bold());
    println!("{}", "─".repeat(50));
    println!(
        "  {} messages in history, {} presets",
        app.agent.history().len(),
        app.agent.presets().len()
    );
    println!("  /help for directives, :quit or Ctrl-C to leave, Ctrl-C during a reply cancels it");
    println!();
}

fn print_presets(presets: &[Preset]) {
    if presets.is_empty() {
        println!("{}", "No presets saved".dimmed());
        return;
    }
    for (i, preset) in presets.iter().enumerate() {
        println!("  {:>2}. {}  {}", i + 1, preset.label.bold(), preset.command.dimmed());
    }
}
