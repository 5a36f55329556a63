//! One-shot submission.
//!
//! The reply is printed while it streams. Ctrl-C cancels an in-flight reply
//! and keeps the partial text in the history.

use anyhow::{Context, Result};
use colored::Colorize;
use opsdeck_core::SubmitOutcome;
use opsdeck_core::agent::{Directive, KNOWN_DIRECTIVES};
use tracing::debug;

use crate::app::App;
use crate::config::Config;
use crate::output::ReplyPrinter;

pub async fn execute(text: &str, config: &Config) -> Result<()> {
    let app = App::open(config)?;
    app.start_telemetry();

    let outcome = submit_streaming(&app, text).await?;
    report(&outcome);

    app.simulator.stop();
    Ok(())
}

/// Submit `text` and print history changes until the submission resolves.
pub(crate) async fn submit_streaming(app: &App, text: &str) -> Result<SubmitOutcome> {
    let mut rx = app.agent.subscribe();
    let mut printer = ReplyPrinter::stdout(app.agent.history().len());

    let submit = app.agent.submit(text);
    tokio::pin!(submit);
    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);
    let mut interrupted = false;

    let outcome = loop {
        tokio::select! {
            outcome = &mut submit => break outcome.context("Submission rejected")?,
            changed = rx.changed() => {
                if changed.is_ok() {
                    let history = rx.borrow_and_update().clone();
                    printer.render(&history)?;
                }
            }
            _ = &mut ctrl_c, if !interrupted => {
                interrupted = true;
                debug!("Interrupt received, cancelling reply");
                app.agent.cancel();
            }
        }
    };

    printer.render(&app.agent.history())?;
    printer.finish()?;
    Ok(outcome)
}

/// Print a hint for outcomes that need one.
pub(crate) fn report(outcome: &SubmitOutcome) {
    match outcome {
        SubmitOutcome::Acknowledged(Directive::Help) => {
            println!("{}", "Directives:".bold());
            for directive in KNOWN_DIRECTIVES {
                println!("  {}", directive.cyan());
            }
        }
        SubmitOutcome::Cleared => println!("{}", "✓ History cleared".green()),
        SubmitOutcome::MissingCredential => {
            println!(
                "{}",
                "Set OPSDECK_API_KEY or [agent].api_key in config.toml".yellow()
            );
        }
        SubmitOutcome::Cancelled => println!("{}", "⚠ Reply cancelled".yellow()),
        SubmitOutcome::Acknowledged(_)
        | SubmitOutcome::UnknownDirective
        | SubmitOutcome::Replied
        | SubmitOutcome::Failed => {}
    }
}
