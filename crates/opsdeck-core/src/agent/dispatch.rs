//! One-way notification fired after a directive is acknowledged.

use super::command::Directive;
use crate::telemetry::TelemetrySimulator;
use crate::types::LogKind;
use std::sync::Arc;
use tracing::{debug, info};

/// Receiver of acknowledged directives. Never called for `/clear` or
/// unrecognized input.
pub trait CommandDispatch: Send + Sync {
    fn dispatch(&self, directive: &Directive, raw: &str);
}

/// System-action handlers that act on the simulated machine.
pub struct SystemActions {
    simulator: Arc<TelemetrySimulator>,
}

impl SystemActions {
    pub fn new(simulator: Arc<TelemetrySimulator>) -> Self {
        Self { simulator }
    }

    fn report_status(&self) {
        let state = self.simulator.hub().state();
        let services: Vec<&str> = state.active_services.iter().map(String::as_str).collect();
        self.simulator.hub().add_log(
            format!(
                "VRAM {:.1}/{:.1} GB | GPU {:.1}°C | RAM {:.1}/{:.1} GB | load {:.2} | services: {}",
                state.vram_usage,
                state.vram_total,
                state.gpu_temp,
                state.ram_usage,
                state.ram_total,
                self.simulator.load().get(),
                if services.is_empty() {
                    "none".to_string()
                } else {
                    services.join(", ")
                },
            ),
            LogKind::Info,
        );
    }
}

impl CommandDispatch for SystemActions {
    fn dispatch(&self, directive: &Directive, raw: &str) {
        info!(directive = directive.name(), raw, "Dispatching directive");
        match directive {
            Directive::Purge => {
                self.simulator.hub().purge_cache();
            }
            Directive::Status => self.report_status(),
            Directive::Simulate(enabled) => self.simulator.set_simulated(*enabled),
            Directive::Help | Directive::Clear | Directive::Unrecognized(_) => {
                debug!(raw, "No system action for directive");
            }
        }
    }
}
