//! Operator agent.
//!
//! ```text
//! ┌───────────────────────────────────────────────────────────┐
//! │                    AgentOrchestrator                      │
//! │                                                           │
//! │   input ──→ "/..." ──→ Directive ──→ CommandDispatch      │
//! │     │                                                     │
//! │     └────→ text ───→ ConversationService ──→ ChunkStream  │
//! │                                                           │
//! │   history / presets ──→ PersistentStore                   │
//! └───────────────────────────────────────────────────────────┘
//! ```

mod command;
mod dispatch;
mod orchestrator;
mod remote;

pub use command::{Directive, KNOWN_DIRECTIVES};
pub use dispatch::{CommandDispatch, SystemActions};
pub use orchestrator::{
    AgentConfig, AgentOrchestrator, AgentPhase, CONNECTION_ERROR, CREDENTIAL_ERROR, PERSONA,
    SubmitOutcome, system_instruction,
};
#[cfg(feature = "client")]
pub use remote::GenerativeClient;
pub use remote::{ChunkStream, ConversationService, DEFAULT_BASE_URL, DEFAULT_MODEL, SseDecoder};
