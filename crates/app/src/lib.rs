#![deny(unsafe_code)]

/// Conversation state engine for a messaging client.
///
/// The engine owns an in-memory thread list and per-thread message collections, simulates
/// inbound traffic and typing, and walks outgoing messages through delivery. Consumers
/// observe it through broadcast events and latest-value watch channels.
pub mod chat;
/// Engine settings and their persistence.
pub mod settings;

pub use chat::{ChatEngine, EngineHandle, StoreEvent};
pub use settings::{EngineSettings, SettingsStore};
