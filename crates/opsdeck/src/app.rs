//! Wiring of the core services from configuration.
//!
//! Every command builds one [`App`]: the SQLite store holding history and
//! presets, the telemetry hub with its simulator, and the orchestrator that
//! talks to the conversation service.

use anyhow::{Context, Result};
use opsdeck_core::agent::{GenerativeClient, SystemActions};
use opsdeck_core::{
    AgentOrchestrator, KeyValueStore, LoadFactor, SqliteStore, TelemetryHub, TelemetrySimulator,
    TelemetryState,
};
use std::sync::Arc;
use tracing::debug;

use crate::config::Config;

pub struct App {
    pub hub: Arc<TelemetryHub>,
    pub load: LoadFactor,
    pub simulator: Arc<TelemetrySimulator>,
    pub agent: AgentOrchestrator,
}

impl App {
    /// Open the store and build every service. Nothing is started.
    pub fn open(config: &Config) -> Result<Self> {
        config.ensure_dirs()?;
        let store = SqliteStore::open_path(&config.paths.database_path).with_context(|| {
            format!(
                "Failed to open database {}",
                config.paths.database_path.display()
            )
        })?;
        debug!(path = %config.paths.database_path.display(), "Opened store");

        Self::with_store(config, Arc::new(store))
    }

    /// Build the services on top of an already opened store.
    pub fn with_store(config: &Config, store: Arc<dyn KeyValueStore>) -> Result<Self> {
        let mut state =
            TelemetryState::with_totals(config.telemetry.vram_total, config.telemetry.ram_total);
        state.is_simulated = config.telemetry.simulate;
        let hub = Arc::new(TelemetryHub::new(state));

        let load = LoadFactor::new(config.telemetry.idle_load);
        let simulator = Arc::new(TelemetrySimulator::new(
            hub.clone(),
            load.clone(),
            config.tick(),
        ));

        let client = GenerativeClient::new(
            config.agent.base_url.clone(),
            config.agent.model.clone(),
            config.agent.api_key.clone(),
        )
        .context("Failed to create conversation client")?;

        let agent = AgentOrchestrator::new(
            store,
            hub.clone(),
            Arc::new(client),
            Arc::new(SystemActions::new(simulator.clone())),
            config.agent_config(),
        );

        Ok(Self {
            hub,
            load,
            simulator,
            agent,
        })
    }

    /// Start the simulator if the configuration asks for it.
    pub fn start_telemetry(&self) {
        self.simulator.apply_state();
    }
}
