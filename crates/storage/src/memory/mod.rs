mod conversations;
mod threads;

use snafu::ensure;

use self::conversations::Conversations;
use self::threads::ThreadList;
use super::error::{ConflictSnafu, StorageResult, ThreadNotFoundSnafu};
use super::ids::{MessageId, ThreadId};
use super::types::{MessageRecord, ThreadRecord};
use super::{MessageStore, ThreadStore};

/// In-memory backend holding the thread list and every thread's messages.
///
/// Owned by a single actor; every method takes `&self`/`&mut self` and never blocks.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    threads: ThreadList,
    conversations: Conversations,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a store from seeded threads and their message histories.
    pub fn from_seed(
        seed: impl IntoIterator<Item = (ThreadRecord, Vec<MessageRecord>)>,
    ) -> StorageResult<Self> {
        let mut store = Self::new();
        for (thread, messages) in seed {
            let thread_id = thread.id.clone();
            store.insert_thread(thread)?;
            for message in messages {
                store.append_message(&thread_id, message)?;
            }
        }
        Ok(store)
    }

    pub fn thread_count(&self) -> usize {
        self.threads.len()
    }

    pub fn is_empty(&self) -> bool {
        self.threads.len() == 0
    }

    /// Borrowing iterator over threads in display order.
    pub fn threads(&self) -> impl Iterator<Item = &ThreadRecord> {
        self.threads.iter()
    }

    /// Borrowing view of one thread's sorted messages.
    pub fn messages(&self, thread_id: &ThreadId) -> &[MessageRecord] {
        self.conversations.messages(thread_id)
    }

    /// Largest sort key stored in any thread, used to continue key allocation.
    pub fn max_sort_key(&self) -> u64 {
        self.conversations.max_sort_key()
    }
}

impl ThreadStore for MemoryStore {
    fn list_threads(&self) -> Vec<ThreadRecord> {
        self.threads.iter().cloned().collect()
    }

    fn get_thread(&self, thread_id: &ThreadId) -> Option<ThreadRecord> {
        self.threads.get(thread_id).cloned()
    }

    fn insert_thread(&mut self, thread: ThreadRecord) -> StorageResult<()> {
        ensure!(
            !self.threads.contains(&thread.id),
            ConflictSnafu {
                stage: "thread-insert-duplicate",
                entity: "thread",
                id: thread.id.to_string(),
                details: "thread already exists".to_string(),
            }
        );

        tracing::debug!(thread_id = %thread.id, "inserted thread");
        self.threads.push(thread);
        Ok(())
    }

    fn replace_thread(&mut self, thread: ThreadRecord) -> bool {
        self.threads.replace(thread)
    }

    fn remove_thread(&mut self, thread_id: &ThreadId) -> Option<ThreadRecord> {
        let removed = self.threads.remove(thread_id)?;
        let discarded = self.conversations.discard(thread_id);
        tracing::debug!(%thread_id, discarded, "removed thread and its messages");
        Some(removed)
    }
}

impl MessageStore for MemoryStore {
    fn messages_for_thread(&self, thread_id: &ThreadId) -> Vec<MessageRecord> {
        self.conversations.messages(thread_id).to_vec()
    }

    fn get_message(&self, thread_id: &ThreadId, message_id: &MessageId) -> Option<MessageRecord> {
        self.conversations.get(thread_id, message_id).cloned()
    }

    fn last_message(&self, thread_id: &ThreadId) -> Option<MessageRecord> {
        self.conversations.messages(thread_id).last().cloned()
    }

    fn append_message(
        &mut self,
        thread_id: &ThreadId,
        message: MessageRecord,
    ) -> StorageResult<()> {
        ensure!(
            self.threads.contains(thread_id),
            ThreadNotFoundSnafu {
                stage: "conversation-append-unknown-thread",
                id: thread_id.to_string(),
            }
        );
        self.conversations.append(thread_id, message)
    }

    fn update_message(&mut self, thread_id: &ThreadId, message: MessageRecord) -> bool {
        self.conversations.update(thread_id, message)
    }

    fn remove_message(&mut self, thread_id: &ThreadId, message_id: &MessageId) -> bool {
        self.conversations.remove(thread_id, message_id)
    }
}
