//! Shared types for opsdeck-core.
//!
//! These types are persisted by the store and published to observers.

use serde::{Deserialize, Serialize};

// ─────────────────────────────────────────────────────────────────────────────
// Event Log
// ─────────────────────────────────────────────────────────────────────────────

/// Category of a log entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogKind {
    Info,
    Warn,
    Error,
    Net,
}

/// A single entry in the bounded event log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogEntry {
    pub id: String,
    /// Local wall-clock time, `HH:MM:SS`.
    pub timestamp: String,
    pub message: String,
    #[serde(rename = "type")]
    pub kind: LogKind,
}

impl LogEntry {
    /// Create an entry stamped with the current local time.
    pub fn new(message: impl Into<String>, kind: LogKind) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            timestamp: chrono::Local::now().format("%H:%M:%S").to_string(),
            message: message.into(),
            kind,
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Agent Conversation
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

/// Telemetry captured when a user message is sent, formatted to one decimal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageSnapshot {
    pub vram: String,
    pub temp: String,
}

impl MessageSnapshot {
    pub fn new(vram: f64, temp: f64) -> Self {
        Self {
            vram: format!("{:.1}", vram),
            temp: format!("{:.1}", temp),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentMessage {
    pub id: i64,
    pub role: Role,
    pub text: String,
    /// Unix timestamp in milliseconds.
    pub timestamp: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub snapshot: Option<MessageSnapshot>,
}

// ─────────────────────────────────────────────────────────────────────────────
// Presets
// ─────────────────────────────────────────────────────────────────────────────

/// Number of characters of the command kept in a preset label.
pub const PRESET_LABEL_CHARS: usize = 12;

/// A saved, replayable command.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Preset {
    pub id: String,
    pub label: String,
    pub command: String,
}

impl Preset {
    /// Create a preset whose label is the truncated command plus an ellipsis.
    pub fn new(command: impl Into<String>) -> Self {
        let command = command.into();
        let head: String = command.chars().take(PRESET_LABEL_CHARS).collect();
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            label: format!("{}...", head),
            command,
        }
    }
}
