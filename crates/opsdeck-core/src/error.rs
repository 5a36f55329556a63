//! Error types for opsdeck-core.

use thiserror::Error;

/// Result type alias using opsdeck-core Error
pub type Result<T> = std::result::Result<T, Error>;

/// Core error types for opsdeck operations
#[derive(Error, Debug)]
pub enum Error {
    // Persistence errors
    #[cfg(feature = "db")]
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Store lock poisoned")]
    LockPoisoned,

    // Agent errors
    #[error("Input is empty")]
    EmptyInput,

    #[error("Agent is busy with a previous request")]
    Busy,

    #[error("No API credential configured for the conversation service")]
    MissingCredential,

    // Remote service errors
    #[cfg(feature = "client")]
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Remote service returned {status}: {body}")]
    RemoteStatus { status: u16, body: String },

    #[error("Remote stream error: {0}")]
    Remote(String),

    // IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    // Serialization errors
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    // Generic errors
    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Create an error from a non-success remote response
    pub fn remote_status(status: u16, body: impl Into<String>) -> Self {
        Self::RemoteStatus {
            status,
            body: body.into(),
        }
    }
}
