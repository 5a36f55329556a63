//! Configuration management for opsdeck.
//!
//! Configuration is loaded from multiple sources with precedence:
//! 1. Environment variables (OPSDECK_*)
//! 2. Config file (<data_dir>/config.toml)
//! 3. Default values

use anyhow::{Context, Result};
use directories::ProjectDirs;
use opsdeck_core::AgentConfig;
use opsdeck_core::agent::{DEFAULT_BASE_URL, DEFAULT_MODEL};
use opsdeck_core::tasks::TaskKind;
use opsdeck_core::telemetry::{DEFAULT_TICK, IDLE_LOAD};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Main configuration structure
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// Telemetry simulation settings
    #[serde(default)]
    pub telemetry: TelemetryConfig,

    /// Assistant settings
    #[serde(default)]
    pub agent: AgentSettings,

    /// Load task settings
    #[serde(default)]
    pub tasks: TasksConfig,

    /// Paths
    #[serde(default)]
    pub paths: PathsConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TelemetryConfig {
    /// Simulator tick period in milliseconds
    #[serde(default = "default_tick_ms")]
    pub tick_ms: u64,

    /// Load factor while no task is running
    #[serde(default = "default_idle_load")]
    pub idle_load: f64,

    /// Total VRAM in GB
    #[serde(default = "default_vram_total")]
    pub vram_total: f64,

    /// Total system RAM in GB
    #[serde(default = "default_ram_total")]
    pub ram_total: f64,

    /// Start with the simulation running
    #[serde(default = "default_true")]
    pub simulate: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentSettings {
    /// API key for the conversation service
    pub api_key: Option<String>,

    /// Base URL of the conversation service
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Model name
    #[serde(default = "default_model")]
    pub model: String,

    /// Delay before a local directive is handled, in milliseconds
    #[serde(default = "default_command_delay_ms")]
    pub command_delay_ms: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TasksConfig {
    /// Load factor while a workflow runs
    #[serde(default = "default_workflow_load")]
    pub workflow_load: f64,

    /// Load factor while a 3D synthesis runs
    #[serde(default = "default_synthesis_load")]
    pub synthesis_load: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PathsConfig {
    /// Base directory for opsdeck data
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,

    /// SQLite database holding history and presets
    #[serde(default = "default_database_path")]
    pub database_path: PathBuf,
}

// Default value functions
fn default_tick_ms() -> u64 {
    DEFAULT_TICK.as_millis() as u64
}

fn default_idle_load() -> f64 {
    IDLE_LOAD
}

fn default_vram_total() -> f64 {
    24.0
}

fn default_ram_total() -> f64 {
    64.0
}

fn default_true() -> bool {
    true
}

fn default_base_url() -> String {
    DEFAULT_BASE_URL.to_string()
}

fn default_model() -> String {
    DEFAULT_MODEL.to_string()
}

fn default_command_delay_ms() -> u64 {
    600
}

fn default_workflow_load() -> f64 {
    TaskKind::Workflow.default_profile().load
}

fn default_synthesis_load() -> f64 {
    TaskKind::Synthesis.default_profile().load
}

fn default_data_dir() -> PathBuf {
    if let Some(proj_dirs) = ProjectDirs::from("dev", "opsdeck", "opsdeck") {
        proj_dirs.data_dir().to_path_buf()
    } else {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".opsdeck")
    }
}

fn default_database_path() -> PathBuf {
    default_data_dir().join("opsdeck.db")
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            tick_ms: default_tick_ms(),
            idle_load: default_idle_load(),
            vram_total: default_vram_total(),
            ram_total: default_ram_total(),
            simulate: default_true(),
        }
    }
}

impl Default for AgentSettings {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: default_base_url(),
            model: default_model(),
            command_delay_ms: default_command_delay_ms(),
        }
    }
}

impl Default for TasksConfig {
    fn default() -> Self {
        Self {
            workflow_load: default_workflow_load(),
            synthesis_load: default_synthesis_load(),
        }
    }
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            database_path: default_database_path(),
        }
    }
}

impl Config {
    /// Load configuration from file and environment.
    pub fn load() -> Result<Self> {
        let mut config = Self::load_from(&Self::config_path())?;
        config.apply_env(|key| std::env::var(key).ok());
        Ok(config)
    }

    /// Load configuration from `path`, falling back to defaults if it does not exist.
    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Config::default());
        }

        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        toml::from_str(&content).context("Failed to parse config file")
    }

    /// Apply OPSDECK_* overrides from `lookup`.
    fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(key) = lookup("OPSDECK_API_KEY").filter(|k| !k.trim().is_empty()) {
            self.agent.api_key = Some(key);
        }
        if let Some(dir) = lookup("OPSDECK_DATA_DIR").filter(|d| !d.is_empty()) {
            let dir = PathBuf::from(dir);
            // Keep a customized database path, move the default one along.
            if self.paths.database_path == default_database_path() {
                self.paths.database_path = dir.join("opsdeck.db");
            }
            self.paths.data_dir = dir;
        }
    }

    /// Save configuration to `path`.
    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).context("Failed to create config directory")?;
        }

        let content = toml::to_string_pretty(self).context("Failed to serialize config")?;
        std::fs::write(path, content).context("Failed to write config file")?;

        Ok(())
    }

    /// Write the configuration read from `path` (or defaults) back to `path`.
    ///
    /// OPSDECK_* overrides are not applied, so an API key passed through the
    /// environment never lands in the file.
    pub fn init_file(path: &Path, force: bool) -> Result<Self> {
        if path.exists() && !force {
            anyhow::bail!(
                "Config file already exists at {} (use --force to overwrite)",
                path.display()
            );
        }
        let config = Self::load_from(path)?;
        config.save_to(path)?;
        Ok(config)
    }

    /// Get the config file path.
    pub fn config_path() -> PathBuf {
        if let Ok(path) = std::env::var("OPSDECK_CONFIG") {
            PathBuf::from(path)
        } else if let Ok(dir) = std::env::var("OPSDECK_DATA_DIR") {
            PathBuf::from(dir).join("config.toml")
        } else {
            default_data_dir().join("config.toml")
        }
    }

    /// Ensure all required directories exist.
    pub fn ensure_dirs(&self) -> Result<()> {
        std::fs::create_dir_all(&self.paths.data_dir)
            .context("Failed to create data directory")?;
        if let Some(parent) = self.paths.database_path.parent() {
            std::fs::create_dir_all(parent).context("Failed to create database directory")?;
        }
        Ok(())
    }

    pub fn tick(&self) -> Duration {
        Duration::from_millis(self.telemetry.tick_ms.max(1))
    }

    pub fn agent_config(&self) -> AgentConfig {
        AgentConfig {
            command_delay: Duration::from_millis(self.agent.command_delay_ms),
        }
    }

    /// Elevated load for a task kind.
    pub fn task_load(&self, kind: TaskKind) -> f64 {
        match kind {
            TaskKind::Workflow => self.tasks.workflow_load,
            TaskKind::Synthesis => self.tasks.synthesis_load,
        }
    }
}
