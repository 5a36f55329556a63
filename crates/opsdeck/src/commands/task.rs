//! Load task command.
//!
//! Runs a workflow or 3D synthesis task with a progress bar while the
//! simulator reacts to the raised load. Ctrl-C cancels the task.

use anyhow::{Context, Result};
use colored::Colorize;
use indicatif::{ProgressBar, ProgressStyle};
use opsdeck_core::tasks::{ProgressTask, TaskKind, TaskState};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

use crate::app::App;
use crate::config::Config;
use crate::output::{log_line, telemetry_line};

pub async fn execute(kind: TaskKind, config: &Config) -> Result<()> {
    let app = App::open(config)?;
    app.start_telemetry();
    let before = app.hub.state();

    let task = Arc::new(
        ProgressTask::new(kind, app.hub.clone(), app.load.clone())
            .with_load(config.task_load(kind)),
    );
    let mut rx = task.subscribe();
    let cancel = CancellationToken::new();

    let bar = ProgressBar::new(100);
    bar.set_style(
        ProgressStyle::with_template("{prefix:.cyan.bold} [{bar:40.cyan/blue}] {pos:>3}% {msg}")
            .context("Invalid progress template")?
            .progress_chars("=> "),
    );
    bar.set_prefix(kind.label());

    let runner = task.clone();
    let token = cancel.clone();
    let handle = tokio::spawn(async move { runner.run(token).await });

    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    loop {
        tokio::select! {
            changed = rx.changed() => {
                if changed.is_err() {
                    break;
                }
                let state = rx.borrow_and_update().clone();
                bar.set_position(state.progress() as u64);
                bar.set_message(telemetry_line(&app.hub.state(), app.load.get()));
                if !state.is_running() && state != TaskState::Idle {
                    break;
                }
            }
            _ = &mut ctrl_c, if !cancel.is_cancelled() => cancel.cancel(),
        }
    }

    let outcome = handle.await.context("Task panicked")??;
    match &outcome {
        TaskState::Completed => bar.finish_with_message("done".green().to_string()),
        TaskState::Failed(reason) => bar.abandon_with_message(reason.yellow().to_string()),
        TaskState::Idle | TaskState::Running(_) => bar.finish_and_clear(),
    }

    for entry in app.hub.logs() {
        println!("{}", log_line(&entry));
    }
    println!("before: {}", telemetry_line(&before, config.telemetry.idle_load));
    println!("after:  {}", telemetry_line(&app.hub.state(), app.load.get()));

    app.simulator.stop();
    Ok(())
}
