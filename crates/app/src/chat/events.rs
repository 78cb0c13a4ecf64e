use std::sync::Arc;

use threadline_storage::{MessageId, MessageRecord, ThreadId, ThreadRecord};

/// Change notifications published after each applied store mutation, in mutation order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreEvent {
    /// The thread list changed; carries the full list in display order.
    ThreadsChanged { threads: Arc<[ThreadRecord]> },
    /// One thread's messages changed; carries the sorted collection.
    MessagesChanged {
        thread_id: ThreadId,
        messages: Arc<[MessageRecord]>,
    },
    /// A message was appended and the conversation should bring it into view.
    ScrollToMessage {
        thread_id: ThreadId,
        message_id: MessageId,
    },
    /// The thread and its messages were archived or deleted.
    ThreadRemoved { thread_id: ThreadId },
}

impl StoreEvent {
    /// Thread the event is about, when it concerns a single thread.
    pub fn thread_id(&self) -> Option<&ThreadId> {
        match self {
            Self::ThreadsChanged { .. } => None,
            Self::MessagesChanged { thread_id, .. }
            | Self::ScrollToMessage { thread_id, .. }
            | Self::ThreadRemoved { thread_id } => Some(thread_id),
        }
    }
}

/// Timer payloads the engine schedules for itself.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum TimerEvent {
    /// Advance an outgoing message one delivery step.
    DeliveryStep {
        thread_id: ThreadId,
        message_id: MessageId,
    },
    /// Generate one synthetic inbound message and re-arm.
    InboundTick,
    /// Start a typing episode on a freshly picked thread.
    TypingStart,
    /// End the typing episode on `thread_id` and re-arm.
    TypingStop { thread_id: ThreadId },
}

impl TimerEvent {
    pub fn is_simulation(&self) -> bool {
        !matches!(self, Self::DeliveryStep { .. })
    }
}
