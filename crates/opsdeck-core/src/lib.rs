//! opsdeck-core - Core library for opsdeck
//!
//! This crate provides the engine behind the opsdeck operator console:
//!
//! - **telemetry**: Simulated hardware metrics, event log and load factor
//! - **agent**: Directive handling and streamed conversation replies
//! - **store**: Key/value persistence for history and presets
//! - **tasks**: Progress tasks that raise the load factor while running

pub mod agent;
pub mod error;
pub mod store;
pub mod tasks;
pub mod telemetry;
pub mod types;

// Re-export commonly used types
pub use agent::{AgentConfig, AgentOrchestrator, AgentPhase, SubmitOutcome};
pub use error::{Error, Result};
pub use store::{KeyValueStore, MemoryStore, PersistentStore};
#[cfg(feature = "db")]
pub use store::SqliteStore;
pub use telemetry::{LoadFactor, TelemetryHub, TelemetrySimulator, TelemetryState};
