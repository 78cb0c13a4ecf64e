/// Store change notifications and the engine's own timer payloads.
pub mod events;
/// Single-owner state machine over threads, messages, and timers.
pub mod engine;
pub mod notify;
/// Tokio actor that owns an engine and drives its timers on real time.
pub mod runtime;
pub mod scheduler;
pub mod seed;
pub mod simulation;

pub use engine::ChatEngine;
pub use events::{StoreEvent, TimerEvent};
pub use notify::{ChangeHub, MessagesReceiver, ThreadsReceiver, into_stream};
pub use runtime::{EngineHandle, RuntimeError, spawn};
pub use scheduler::{TimerQueue, TimerToken};
pub use simulation::SimulationState;
