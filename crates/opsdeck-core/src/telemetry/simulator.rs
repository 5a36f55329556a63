//! Periodic random-walk simulator.
//!
//! Every tick draws a fresh uniform sample per metric and nudges it:
//!
//! - `vram_usage += (U - 0.45) × load`, clamped to `[1.5, vram_total - 0.2]`
//! - `gpu_temp  += (U - 0.4) × load × 2`, clamped to `[35, 88]`
//! - `ram_usage += (U - 0.5) × 0.2`, clamped to `[4, ram_total]`
//!
//! The offsets are part of the observable behavior and must not be tuned.

use super::{
    LoadFactor, RAM_FLOOR, TEMP_MAX, TEMP_MIN, TelemetryHub, TelemetryState, VRAM_FLOOR, clamp,
};
use crate::types::LogKind;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use tokio::task::AbortHandle;
use tokio::time::{Duration, Instant, MissedTickBehavior, interval_at};
use tracing::{info, trace};

/// Default interval between ticks.
pub const DEFAULT_TICK: Duration = Duration::from_millis(1500);

/// Shortest accepted tick period. `interval_at` rejects zero.
pub const MIN_TICK: Duration = Duration::from_millis(1);

/// Apply one random-walk step to `state`.
pub fn drift<R: Rng>(state: &mut TelemetryState, load: f64, rng: &mut R) {
    let u: f64 = rng.gen_range(0.0..1.0);
    state.vram_usage = clamp(
        state.vram_usage + (u - 0.45) * load,
        VRAM_FLOOR,
        state.vram_max(),
    );

    let u: f64 = rng.gen_range(0.0..1.0);
    state.gpu_temp = clamp(state.gpu_temp + (u - 0.4) * load * 2.0, TEMP_MIN, TEMP_MAX);

    let u: f64 = rng.gen_range(0.0..1.0);
    state.ram_usage = clamp(state.ram_usage + (u - 0.5) * 0.2, RAM_FLOOR, state.ram_total);
}

/// Drives [`drift`] on a fixed cadence while the hub is in simulated mode.
pub struct TelemetrySimulator {
    hub: Arc<TelemetryHub>,
    load: LoadFactor,
    period: Duration,
    /// Ticks are aligned to `anchor + k × period` across stop/start cycles.
    anchor: Instant,
    ticks: Arc<AtomicU64>,
    task: Mutex<Option<AbortHandle>>,
}

impl TelemetrySimulator {
    /// Create a stopped simulator. Periods below [`MIN_TICK`] are raised to it.
    pub fn new(hub: Arc<TelemetryHub>, load: LoadFactor, period: Duration) -> Self {
        Self {
            hub,
            load,
            period: period.max(MIN_TICK),
            anchor: Instant::now(),
            ticks: Arc::new(AtomicU64::new(0)),
            task: Mutex::new(None),
        }
    }

    pub fn with_defaults(hub: Arc<TelemetryHub>, load: LoadFactor) -> Self {
        Self::new(hub, load, DEFAULT_TICK)
    }

    pub fn hub(&self) -> &Arc<TelemetryHub> {
        &self.hub
    }

    pub fn load(&self) -> &LoadFactor {
        &self.load
    }

    /// Number of periodic ticks applied so far.
    pub fn ticks(&self) -> u64 {
        self.ticks.load(Ordering::Relaxed)
    }

    pub fn is_running(&self) -> bool {
        self.task
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .is_some()
    }

    /// Start or stop according to the hub's `is_simulated` flag.
    ///
    /// Must be called from within a tokio runtime.
    pub fn apply_state(&self) {
        if self.hub.is_simulated() {
            self.start();
        } else {
            self.stop();
        }
    }

    /// Toggle simulation.
    pub fn set_simulated(&self, enabled: bool) {
        if enabled {
            self.start();
        } else {
            self.stop();
        }
    }

    /// Start ticking on the original cadence. No-op if already running.
    ///
    /// Must be called from within a tokio runtime.
    pub fn start(&self) {
        let mut task = self.task.lock().unwrap_or_else(PoisonError::into_inner);
        if task.is_some() {
            return;
        }

        self.hub.update(|state| state.is_simulated = true);

        let first = self.next_tick_after(Instant::now());
        let hub = Arc::clone(&self.hub);
        let load = self.load.clone();
        let ticks = Arc::clone(&self.ticks);
        let period = self.period;

        let handle = tokio::spawn(async move {
            let mut ticker = interval_at(first, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            let mut rng = StdRng::from_entropy();

            loop {
                ticker.tick().await;
                let factor = load.get();
                let applied = hub.update(|state| {
                    if state.is_simulated {
                        drift(state, factor, &mut rng);
                    }
                    state.is_simulated
                });
                if applied {
                    ticks.fetch_add(1, Ordering::Relaxed);
                    trace!(load = factor, "Telemetry tick");
                }
            }
        });

        *task = Some(handle.abort_handle());
        drop(task);

        info!(period_ms = self.period.as_millis() as u64, "Telemetry simulation started");
        self.hub.add_log("Telemetry simulation online", LogKind::Info);
    }

    /// Cancel the pending tick and mark the hub as not simulated.
    pub fn stop(&self) {
        let handle = self
            .task
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();

        let was_simulated = self.hub.update(|state| {
            let was = state.is_simulated;
            state.is_simulated = false;
            was
        });

        if let Some(handle) = handle {
            handle.abort();
            info!("Telemetry simulation stopped");
        }
        if was_simulated {
            self.hub.add_log("Telemetry simulation paused", LogKind::Warn);
        }
    }

    /// Apply a single tick immediately using the current load factor.
    pub fn step<R: Rng>(&self, rng: &mut R) {
        let factor = self.load.get();
        self.hub.update(|state| drift(state, factor, rng));
    }

    fn next_tick_after(&self, now: Instant) -> Instant {
        let period = self.period.as_nanos().max(1);
        let into = now.saturating_duration_since(self.anchor).as_nanos() % period;
        now + Duration::from_nanos((period - into) as u64)
    }
}

impl Drop for TelemetrySimulator {
    fn drop(&mut self) {
        if let Some(handle) = self
            .task
            .get_mut()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
        {
            handle.abort();
        }
    }
}
