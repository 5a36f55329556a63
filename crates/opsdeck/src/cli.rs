//! CLI argument definitions using clap derive macros.

use clap::{Args, Parser, Subcommand, ValueEnum};
use opsdeck_core::tasks::TaskKind;

/// Operator console for a simulated AI workstation
///
/// Live telemetry, a streamed assistant and load-generating tasks.
#[derive(Parser, Debug)]
#[command(name = "opsdeck")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Interactive console (telemetry + assistant)
    Console,

    /// Send one message or directive and print the reply
    Ask {
        /// Message text, or a /directive
        #[arg(required = true, num_args = 1..)]
        text: Vec<String>,
    },

    /// Run the telemetry simulator and print each tick
    Telemetry {
        /// Number of ticks to print
        #[arg(short, long, default_value = "10")]
        ticks: u32,

        /// Load factor to hold while sampling
        #[arg(short, long)]
        load: Option<f64>,

        /// Seed for reproducible output
        #[arg(short, long)]
        seed: Option<u64>,

        /// Output as JSON lines
        #[arg(short, long)]
        json: bool,
    },

    /// Run a load-generating task
    Task {
        /// Task to run
        #[arg(value_enum)]
        kind: TaskArg,
    },

    /// Conversation history
    History(HistoryCommand),

    /// Saved command presets
    Preset(PresetCommand),

    /// Configuration file management
    Config(ConfigCommand),

    /// Show version
    Version,
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum TaskArg {
    /// Workflow execution
    Workflow,
    /// 3D synthesis
    Synthesis,
}

impl From<TaskArg> for TaskKind {
    fn from(arg: TaskArg) -> Self {
        match arg {
            TaskArg::Workflow => TaskKind::Workflow,
            TaskArg::Synthesis => TaskKind::Synthesis,
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// History Commands
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Args, Debug)]
pub struct HistoryCommand {
    #[command(subcommand)]
    pub action: HistoryAction,
}

#[derive(Subcommand, Debug)]
pub enum HistoryAction {
    /// Print the conversation history
    Show {
        /// Only the last N messages
        #[arg(short, long)]
        limit: Option<usize>,

        /// Output as JSON
        #[arg(short, long)]
        json: bool,
    },

    /// Delete the conversation history
    Clear {
        /// Skip confirmation
        #[arg(short, long)]
        force: bool,
    },
}

// ─────────────────────────────────────────────────────────────────────────────
// Preset Commands
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Args, Debug)]
pub struct PresetCommand {
    #[command(subcommand)]
    pub action: PresetAction,
}

#[derive(Subcommand, Debug)]
pub enum PresetAction {
    /// List saved presets
    List {
        /// Output as JSON
        #[arg(short, long)]
        json: bool,
    },

    /// Save a command as a preset
    Save {
        /// Command text to save
        #[arg(required = true, num_args = 1..)]
        command: Vec<String>,
    },

    /// Delete a preset by id
    Delete {
        /// Preset ID
        id: String,
    },
}

// ─────────────────────────────────────────────────────────────────────────────
// Config Commands
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Args, Debug)]
pub struct ConfigCommand {
    #[command(subcommand)]
    pub action: ConfigAction,
}

#[derive(Subcommand, Debug)]
pub enum ConfigAction {
    /// Print the config file path
    Path,

    /// Print the effective configuration
    Show,

    /// Write the effective configuration to the config file
    Init {
        /// Overwrite an existing file
        #[arg(short, long)]
        force: bool,
    },
}
