//! Command implementations for opsdeck CLI.
//!
//! Each submodule implements the logic for a command group.

pub mod ask;
pub mod config;
pub mod console;
pub mod history;
pub mod preset;
pub mod task;
pub mod telemetry;
