//! Simulated hardware telemetry.
//!
//! ## Architecture
//!
//! ```text
//! ┌────────────────────────────────────────────────────────────────┐
//! │                        TelemetryHub                            │
//! │  ┌──────────────────┐   ┌──────────────────┐                   │
//! │  │ TelemetryState   │   │ LogBuffer (30)   │ ── watch ──→ UI   │
//! │  └──────────────────┘   └──────────────────┘                   │
//! │           ↑                       ↑                            │
//! │   TelemetrySimulator      add_log (any subsystem)              │
//! │           ↑                                                    │
//! │      LoadFactor ←── task producers (workflow, synthesis)       │
//! └────────────────────────────────────────────────────────────────┘
//! ```

mod load;
mod log;
mod simulator;

pub use load::{IDLE_LOAD, LoadFactor, LoadGuard};
pub use log::{LOG_CAPACITY, LogBuffer};
pub use simulator::{DEFAULT_TICK, MIN_TICK, TelemetrySimulator, drift};

use crate::types::{LogEntry, LogKind, MessageSnapshot};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::sync::{PoisonError, RwLock};
use tokio::sync::watch;
use tracing::info;

/// Lower bound for VRAM usage (GB).
pub const VRAM_FLOOR: f64 = 1.5;
/// Headroom kept below total VRAM (GB).
pub const VRAM_HEADROOM: f64 = 0.2;
/// GPU temperature bounds (°C).
pub const TEMP_MIN: f64 = 35.0;
pub const TEMP_MAX: f64 = 88.0;
/// Lower bound for RAM usage (GB).
pub const RAM_FLOOR: f64 = 4.0;
/// VRAM released by a cache purge (GB).
pub const PURGE_RELEASE: f64 = 4.0;

/// Clamp without panicking when the bounds cross.
pub(crate) fn clamp(value: f64, min: f64, max: f64) -> f64 {
    value.min(max).max(min)
}

/// Snapshot of the simulated machine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TelemetryState {
    pub vram_usage: f64,
    pub vram_total: f64,
    pub gpu_temp: f64,
    pub ram_usage: f64,
    pub ram_total: f64,
    pub active_services: BTreeSet<String>,
    pub logs: LogBuffer,
    pub is_simulated: bool,
}

impl Default for TelemetryState {
    fn default() -> Self {
        Self::with_totals(24.0, 64.0)
    }
}

impl TelemetryState {
    /// Default state for a machine with the given VRAM and RAM totals.
    pub fn with_totals(vram_total: f64, ram_total: f64) -> Self {
        let mut state = Self {
            vram_usage: 4.2,
            vram_total,
            gpu_temp: 42.0,
            ram_usage: 12.4,
            ram_total,
            active_services: ["inference-gateway", "vector-index"]
                .into_iter()
                .map(String::from)
                .collect(),
            logs: LogBuffer::new(),
            is_simulated: true,
        };
        state.clamp_all();
        state
    }

    pub fn vram_max(&self) -> f64 {
        self.vram_total - VRAM_HEADROOM
    }

    /// Force every metric back inside its bounds.
    pub fn clamp_all(&mut self) {
        self.vram_usage = clamp(self.vram_usage, VRAM_FLOOR, self.vram_max());
        self.gpu_temp = clamp(self.gpu_temp, TEMP_MIN, TEMP_MAX);
        self.ram_usage = clamp(self.ram_usage, RAM_FLOOR, self.ram_total);
    }

    pub fn snapshot(&self) -> MessageSnapshot {
        MessageSnapshot::new(self.vram_usage, self.gpu_temp)
    }
}

/// Shared owner of [`TelemetryState`] that notifies subscribers on change.
///
/// Critical sections are short and never span an await, so each mutation is
/// atomic with respect to simulator ticks and agent reads.
pub struct TelemetryHub {
    state: RwLock<TelemetryState>,
    changes: watch::Sender<u64>,
}

impl Default for TelemetryHub {
    fn default() -> Self {
        Self::new(TelemetryState::default())
    }
}

impl TelemetryHub {
    pub fn new(state: TelemetryState) -> Self {
        let (changes, _) = watch::channel(0);
        Self {
            state: RwLock::new(state),
            changes,
        }
    }

    /// Copy of the current state.
    pub fn state(&self) -> TelemetryState {
        self.state
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// VRAM usage and GPU temperature, formatted to one decimal.
    pub fn snapshot(&self) -> MessageSnapshot {
        self.state
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .snapshot()
    }

    pub fn is_simulated(&self) -> bool {
        self.state
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .is_simulated
    }

    /// Subscribe to change notifications. The value is a revision counter.
    pub fn subscribe(&self) -> watch::Receiver<u64> {
        self.changes.subscribe()
    }

    /// Apply a mutation, re-clamp, and notify subscribers.
    pub fn update<R>(&self, f: impl FnOnce(&mut TelemetryState) -> R) -> R {
        let result = {
            let mut state = self.state.write().unwrap_or_else(PoisonError::into_inner);
            let result = f(&mut state);
            state.clamp_all();
            result
        };
        self.changes.send_modify(|rev| *rev += 1);
        result
    }

    /// Append a log entry.
    pub fn add_log(&self, message: impl Into<String>, kind: LogKind) {
        let entry = LogEntry::new(message, kind);
        self.update(|state| state.logs.push(entry));
    }

    pub fn logs(&self) -> Vec<LogEntry> {
        self.state
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .logs
            .to_vec()
    }

    /// Release cached VRAM. Returns the new usage.
    pub fn purge_cache(&self) -> f64 {
        let usage = self.update(|state| {
            state.vram_usage -= PURGE_RELEASE;
            state.clamp_all();
            state.vram_usage
        });
        info!(vram_usage = usage, "VRAM cache purged");
        self.add_log(format!("VRAM cache purged ({:.1} GB in use)", usage), LogKind::Warn);
        usage
    }

    /// Mark a service as running or stopped.
    pub fn set_service(&self, name: &str, active: bool) {
        let changed = self.update(|state| {
            if active {
                state.active_services.insert(name.to_string())
            } else {
                state.active_services.remove(name)
            }
        });
        if changed {
            let verb = if active { "started" } else { "stopped" };
            self.add_log(format!("Service {} {}", name, verb), LogKind::Net);
        }
    }
}
