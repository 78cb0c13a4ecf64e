use std::collections::HashMap;
use std::sync::Arc;

use futures::Stream;
use threadline_storage::{MessageId, MessageRecord, ThreadId, ThreadRecord};
use tokio::sync::broadcast::error::RecvError;
use tokio::sync::{broadcast, watch};

use super::events::StoreEvent;

pub type ThreadsReceiver = watch::Receiver<Arc<[ThreadRecord]>>;
pub type MessagesReceiver = watch::Receiver<Arc<[MessageRecord]>>;

/// Publish side of the projection layer.
///
/// The broadcast stream carries every change in order; the watch channels hold only the
/// latest snapshot for consumers that just re-render.
#[derive(Debug)]
pub struct ChangeHub {
    events: broadcast::Sender<StoreEvent>,
    threads: watch::Sender<Arc<[ThreadRecord]>>,
    messages: HashMap<ThreadId, watch::Sender<Arc<[MessageRecord]>>>,
}

impl ChangeHub {
    pub fn new(event_buffer: usize, threads: &[ThreadRecord]) -> Self {
        let (events, _) = broadcast::channel(event_buffer.max(1));
        let (threads, _) = watch::channel(Arc::from(threads));
        Self {
            events,
            threads,
            messages: HashMap::new(),
        }
    }

    pub fn subscribe_events(&self) -> broadcast::Receiver<StoreEvent> {
        self.events.subscribe()
    }

    pub fn subscribe_threads(&self) -> ThreadsReceiver {
        self.threads.subscribe()
    }

    /// Subscribes to one thread's messages, seeding the channel with `current`.
    pub fn subscribe_messages(
        &mut self,
        thread_id: &ThreadId,
        current: &[MessageRecord],
    ) -> MessagesReceiver {
        self.messages
            .entry(thread_id.clone())
            .or_insert_with(|| watch::channel(Arc::from(current)).0)
            .subscribe()
    }

    /// Receiver whose sender is already gone: empty value, no updates.
    pub fn closed_messages() -> MessagesReceiver {
        watch::channel(Arc::from(Vec::new())).1
    }

    pub fn publish_threads(&self, threads: &[ThreadRecord]) {
        let threads: Arc<[ThreadRecord]> = Arc::from(threads);
        self.threads.send_replace(threads.clone());
        self.emit(StoreEvent::ThreadsChanged { threads });
    }

    pub fn publish_messages(&self, thread_id: &ThreadId, messages: &[MessageRecord]) {
        let messages: Arc<[MessageRecord]> = Arc::from(messages);
        if let Some(sender) = self.messages.get(thread_id) {
            sender.send_replace(messages.clone());
        }
        self.emit(StoreEvent::MessagesChanged {
            thread_id: thread_id.clone(),
            messages,
        });
    }

    pub fn publish_scroll(&self, thread_id: &ThreadId, message_id: &MessageId) {
        self.emit(StoreEvent::ScrollToMessage {
            thread_id: thread_id.clone(),
            message_id: message_id.clone(),
        });
    }

    /// Announces removal and closes the thread's message channel after a final empty value.
    pub fn publish_thread_removed(&mut self, thread_id: &ThreadId) {
        if let Some(sender) = self.messages.remove(thread_id) {
            sender.send_replace(Arc::from(Vec::new()));
        }
        self.emit(StoreEvent::ThreadRemoved {
            thread_id: thread_id.clone(),
        });
    }

    fn emit(&self, event: StoreEvent) {
        // No live receivers is normal before the first subscription.
        if self.events.send(event).is_err() {
            tracing::trace!("store event dropped without subscribers");
        }
    }
}

/// Adapts an event receiver into a stream. Lagged gaps are logged and skipped; the
/// stream ends once the engine is gone.
pub fn into_stream(receiver: broadcast::Receiver<StoreEvent>) -> impl Stream<Item = StoreEvent> {
    futures::stream::unfold(receiver, |mut receiver| async move {
        loop {
            match receiver.recv().await {
                Ok(event) => return Some((event, receiver)),
                Err(RecvError::Lagged(skipped)) => {
                    tracing::warn!(skipped, "store event subscriber lagged");
                }
                Err(RecvError::Closed) => return None,
            }
        }
    })
}
