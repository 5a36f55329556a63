//! opsdeck - Operator console CLI
//!
//! Simulated workstation telemetry, a streamed assistant with local
//! directives, and load-generating tasks.

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

mod app;
mod cli;
mod commands;
mod config;
mod output;

use cli::{Cli, Commands};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(EnvFilter::from_default_env().add_directive("opsdeck=info".parse()?))
        .init();

    let cli = Cli::parse();

    // Load configuration
    let config = config::Config::load()?;

    // Execute command
    match cli.command {
        Commands::Console => commands::console::execute(&config).await,
        Commands::Ask { text } => commands::ask::execute(&text.join(" "), &config).await,
        Commands::Telemetry {
            ticks,
            load,
            seed,
            json,
        } => commands::telemetry::execute(ticks, load, seed, json, &config).await,
        Commands::Task { kind } => commands::task::execute(kind.into(), &config).await,
        Commands::History(cmd) => commands::history::execute(cmd, &config).await,
        Commands::Preset(cmd) => commands::preset::execute(cmd, &config).await,
        Commands::Config(cmd) => commands::config::execute(cmd, &config),
        Commands::Version => {
            println!("opsdeck {}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
    }
}
