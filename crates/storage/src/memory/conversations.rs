use std::collections::HashMap;

use snafu::ensure;

use crate::error::{ConflictSnafu, StorageResult};
use crate::ids::{MessageId, ThreadId};
use crate::types::MessageRecord;

/// Per-thread message collections kept sorted by `sort_key`.
#[derive(Debug, Clone, Default)]
pub(crate) struct Conversations {
    by_thread: HashMap<ThreadId, Vec<MessageRecord>>,
}

impl Conversations {
    pub(crate) fn messages(&self, thread_id: &ThreadId) -> &[MessageRecord] {
        self.by_thread
            .get(thread_id)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    pub(crate) fn get(&self, thread_id: &ThreadId, message_id: &MessageId) -> Option<&MessageRecord> {
        self.messages(thread_id)
            .iter()
            .find(|message| &message.id == message_id)
    }

    pub(crate) fn append(
        &mut self,
        thread_id: &ThreadId,
        message: MessageRecord,
    ) -> StorageResult<()> {
        let collection = self.by_thread.entry(thread_id.clone()).or_default();
        ensure!(
            !collection.iter().any(|existing| existing.id == message.id),
            ConflictSnafu {
                stage: "conversation-append-duplicate",
                entity: "message",
                id: message.id.to_string(),
                details: format!("already present in thread '{thread_id}'"),
            }
        );

        collection.push(message);
        // Stable sort: equal keys keep insertion order.
        collection.sort_by_key(|message| message.sort_key);
        Ok(())
    }

    pub(crate) fn update(&mut self, thread_id: &ThreadId, message: MessageRecord) -> bool {
        let Some(slot) = self
            .by_thread
            .get_mut(thread_id)
            .and_then(|collection| collection.iter_mut().find(|existing| existing.id == message.id))
        else {
            return false;
        };
        // The stored ordering key wins so an update can never reorder the collection.
        let replacement = MessageRecord {
            sort_key: slot.sort_key,
            ..message
        };
        if *slot == replacement {
            return false;
        }

        *slot = replacement;
        true
    }

    pub(crate) fn remove(&mut self, thread_id: &ThreadId, message_id: &MessageId) -> bool {
        let Some(collection) = self.by_thread.get_mut(thread_id) else {
            return false;
        };
        let before = collection.len();
        collection.retain(|message| &message.id != message_id);
        collection.len() != before
    }

    pub(crate) fn max_sort_key(&self) -> u64 {
        self.by_thread
            .values()
            .filter_map(|collection| collection.last())
            .map(|message| message.sort_key)
            .max()
            .unwrap_or(0)
    }

    pub(crate) fn discard(&mut self, thread_id: &ThreadId) -> usize {
        self.by_thread
            .remove(thread_id)
            .map_or(0, |collection| collection.len())
    }
}
