//! Shared load factor biasing the telemetry random walk.
//!
//! `set` is last-writer-wins with no validation. Task producers should prefer
//! [`LoadFactor::acquire`], whose guard only restores the idle value if no
//! other writer has touched the factor since.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tracing::debug;

/// Load factor of an idle system.
pub const IDLE_LOAD: f64 = 0.1;

#[derive(Debug)]
struct Slot {
    value: f64,
    generation: u64,
}

/// Cloneable handle to the shared load factor.
#[derive(Debug, Clone)]
pub struct LoadFactor {
    slot: Arc<Mutex<Slot>>,
    idle: f64,
}

impl Default for LoadFactor {
    fn default() -> Self {
        Self::new(IDLE_LOAD)
    }
}

impl LoadFactor {
    /// Create a controller starting at `idle`.
    pub fn new(idle: f64) -> Self {
        Self {
            slot: Arc::new(Mutex::new(Slot {
                value: idle,
                generation: 0,
            })),
            idle,
        }
    }

    // A panic while holding the slot cannot leave it half-written.
    fn lock(&self) -> MutexGuard<'_, Slot> {
        self.slot.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn get(&self) -> f64 {
        self.lock().value
    }

    pub fn idle(&self) -> f64 {
        self.idle
    }

    /// Overwrite the factor unconditionally.
    pub fn set(&self, value: f64) {
        let mut slot = self.lock();
        slot.value = value;
        slot.generation += 1;
        debug!(load = value, "Load factor set");
    }

    /// Raise the factor for the lifetime of the returned guard.
    pub fn acquire(&self, value: f64) -> LoadGuard {
        let mut slot = self.lock();
        slot.value = value;
        slot.generation += 1;
        debug!(load = value, generation = slot.generation, "Load factor acquired");
        LoadGuard {
            factor: self.clone(),
            generation: slot.generation,
            released: false,
        }
    }
}

/// Token held by the producer that last raised the load factor.
#[derive(Debug)]
pub struct LoadGuard {
    factor: LoadFactor,
    generation: u64,
    released: bool,
}

impl LoadGuard {
    /// Restore idle load. Returns false if a later writer owns the factor.
    pub fn release(mut self) -> bool {
        self.restore()
    }

    fn restore(&mut self) -> bool {
        if self.released {
            return false;
        }
        self.released = true;

        let mut slot = self.factor.lock();
        if slot.generation != self.generation {
            debug!(
                generation = self.generation,
                current = slot.generation,
                "Load guard superseded, leaving factor untouched"
            );
            return false;
        }
        slot.value = self.factor.idle;
        slot.generation += 1;
        true
    }
}

impl Drop for LoadGuard {
    fn drop(&mut self) {
        self.restore();
    }
}
