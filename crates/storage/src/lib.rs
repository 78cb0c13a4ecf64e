pub mod delivery;
pub mod error;
pub mod grouping;
pub mod ids;
pub mod memory;
pub mod reactions;
pub mod types;

use chrono::{DateTime, Utc};

pub use delivery::{DeliveryEvent, DeliveryRejection, DeliveryTransitionResult};
pub use error::{StorageError, StorageResult};
pub use grouping::{DateGroup, group_by_date, group_by_date_in};
pub use ids::{MessageId, ParticipantId, ReactionId, ThreadId};
pub use memory::MemoryStore;
pub use reactions::ReactionLedger;
pub use types::{
    DeliveryStatus, MessageRecord, MessageStatus, PHOTO_SNIPPET_TEXT, Reaction, Snippet,
    ThreadRecord,
};

/// Read-only view of one message, independent of the backend that produced it.
pub trait Message {
    fn id(&self) -> &MessageId;
    fn sort_key(&self) -> u64;
    fn timestamp(&self) -> DateTime<Utc>;
    fn body_text(&self) -> Option<&str>;
    fn has_image(&self) -> bool;
    fn is_outgoing(&self) -> bool;
    /// Only meaningful for outgoing messages.
    fn delivery_status(&self) -> Option<&DeliveryStatus>;
    fn author_id(&self) -> &ParticipantId;
    fn author_display_name(&self) -> Option<&str>;
    fn reactions(&self) -> &[Reaction];
    fn is_system_message(&self) -> bool;
}

/// Read-only view of one conversation and its list-level projection.
pub trait Thread {
    fn id(&self) -> &ThreadId;
    fn display_name(&self) -> &str;
    fn is_group(&self) -> bool;
    fn is_pinned(&self) -> bool;
    fn is_muted(&self) -> bool;
    fn has_unread_messages(&self) -> bool;
    fn unread_count(&self) -> u32;
    fn last_message_date(&self) -> Option<DateTime<Utc>>;
    fn last_message_snippet(&self) -> Option<&Snippet>;
    fn last_message_status(&self) -> Option<MessageStatus>;
    fn is_typing(&self) -> bool;
    fn is_blocked(&self) -> bool;
    fn has_pending_request(&self) -> bool;
    fn is_note_to_self(&self) -> bool;
    fn member_count(&self) -> u32;
    fn participant_names(&self) -> &[String];
}

pub trait ThreadStore {
    fn list_threads(&self) -> Vec<ThreadRecord>;
    fn get_thread(&self, thread_id: &ThreadId) -> Option<ThreadRecord>;
    fn insert_thread(&mut self, thread: ThreadRecord) -> StorageResult<()>;
    /// Replaces the record with the same id in place. Returns `false` when the
    /// thread is unknown or the replacement equals the stored value.
    fn replace_thread(&mut self, thread: ThreadRecord) -> bool;
    /// Removes the thread together with its message collection.
    fn remove_thread(&mut self, thread_id: &ThreadId) -> Option<ThreadRecord>;

    fn archive_thread(&mut self, thread_id: &ThreadId) -> bool {
        self.remove_thread(thread_id).is_some()
    }

    fn delete_thread(&mut self, thread_id: &ThreadId) -> bool {
        self.remove_thread(thread_id).is_some()
    }

    /// Applies a copy-on-write edit to one thread.
    fn update_thread(
        &mut self,
        thread_id: &ThreadId,
        edit: impl FnOnce(&mut ThreadRecord),
    ) -> bool
    where
        Self: Sized,
    {
        let Some(mut replacement) = self.get_thread(thread_id) else {
            return false;
        };
        edit(&mut replacement);
        self.replace_thread(replacement)
    }

    fn toggle_mute(&mut self, thread_id: &ThreadId) -> bool
    where
        Self: Sized,
    {
        self.update_thread(thread_id, |thread| thread.is_muted = !thread.is_muted)
    }

    fn toggle_pin(&mut self, thread_id: &ThreadId) -> bool
    where
        Self: Sized,
    {
        self.update_thread(thread_id, |thread| thread.is_pinned = !thread.is_pinned)
    }

    fn toggle_read(&mut self, thread_id: &ThreadId) -> bool
    where
        Self: Sized,
    {
        self.update_thread(thread_id, |thread| {
            thread.has_unread_messages = !thread.has_unread_messages;
            thread.unread_count = u32::from(thread.has_unread_messages);
        })
    }

    fn mark_as_read(&mut self, thread_id: &ThreadId) -> bool
    where
        Self: Sized,
    {
        let already_read = self
            .get_thread(thread_id)
            .is_none_or(|thread| !thread.has_unread_messages);
        if already_read {
            return false;
        }

        self.update_thread(thread_id, |thread| {
            thread.has_unread_messages = false;
            thread.unread_count = 0;
        })
    }
}

pub trait MessageStore {
    /// Messages of one thread in display order. Unknown threads yield an empty list.
    fn messages_for_thread(&self, thread_id: &ThreadId) -> Vec<MessageRecord>;
    fn get_message(&self, thread_id: &ThreadId, message_id: &MessageId) -> Option<MessageRecord>;
    fn last_message(&self, thread_id: &ThreadId) -> Option<MessageRecord>;
    fn append_message(&mut self, thread_id: &ThreadId, message: MessageRecord)
    -> StorageResult<()>;
    /// Replaces the message with the same id. Returns `false` when absent or unchanged.
    fn update_message(&mut self, thread_id: &ThreadId, message: MessageRecord) -> bool;
    fn remove_message(&mut self, thread_id: &ThreadId, message_id: &MessageId) -> bool;
}

impl Message for MessageRecord {
    fn id(&self) -> &MessageId {
        &self.id
    }

    fn sort_key(&self) -> u64 {
        self.sort_key
    }

    fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    fn body_text(&self) -> Option<&str> {
        self.body_text.as_deref()
    }

    fn has_image(&self) -> bool {
        self.has_image
    }

    fn is_outgoing(&self) -> bool {
        self.is_outgoing
    }

    fn delivery_status(&self) -> Option<&DeliveryStatus> {
        if self.is_outgoing {
            self.delivery_status.as_ref()
        } else {
            None
        }
    }

    fn author_id(&self) -> &ParticipantId {
        &self.author_id
    }

    fn author_display_name(&self) -> Option<&str> {
        self.author_display_name.as_deref()
    }

    fn reactions(&self) -> &[Reaction] {
        &self.reactions
    }

    fn is_system_message(&self) -> bool {
        self.is_system_message
    }
}

impl Thread for ThreadRecord {
    fn id(&self) -> &ThreadId {
        &self.id
    }

    fn display_name(&self) -> &str {
        &self.display_name
    }

    fn is_group(&self) -> bool {
        self.is_group
    }

    fn is_pinned(&self) -> bool {
        self.is_pinned
    }

    fn is_muted(&self) -> bool {
        self.is_muted
    }

    fn has_unread_messages(&self) -> bool {
        self.has_unread_messages
    }

    fn unread_count(&self) -> u32 {
        self.unread_count
    }

    fn last_message_date(&self) -> Option<DateTime<Utc>> {
        self.last_message_date
    }

    fn last_message_snippet(&self) -> Option<&Snippet> {
        self.last_message_snippet.as_ref()
    }

    fn last_message_status(&self) -> Option<MessageStatus> {
        self.last_message_status
    }

    fn is_typing(&self) -> bool {
        self.is_typing
    }

    fn is_blocked(&self) -> bool {
        self.is_blocked
    }

    fn has_pending_request(&self) -> bool {
        self.has_pending_request
    }

    fn is_note_to_self(&self) -> bool {
        self.is_note_to_self
    }

    fn member_count(&self) -> u32 {
        self.member_count
    }

    fn participant_names(&self) -> &[String] {
        &self.participant_names
    }
}

/// Builds the list preview for `thread` after `message` became its latest message.
///
/// Blocked and pending-request threads keep their status snippet regardless of content.
pub fn project_snippet(thread: &impl Thread, message: &impl Message) -> Snippet {
    if thread.is_blocked() {
        return Snippet::Blocked;
    }
    if thread.has_pending_request() {
        return Snippet::PendingRequest {
            inviter_name: message.author_display_name().map(str::to_string),
        };
    }

    let text = message
        .body_text()
        .filter(|text| !text.trim().is_empty())
        .map(str::to_string)
        .unwrap_or_else(|| {
            if message.has_image() {
                PHOTO_SNIPPET_TEXT.to_string()
            } else {
                String::new()
            }
        });

    if thread.is_group() && !message.is_outgoing() {
        let sender_name = message
            .author_display_name()
            .map(str::to_string)
            .unwrap_or_else(|| message.author_id().to_string());
        Snippet::GroupMessage { text, sender_name }
    } else {
        Snippet::DirectMessage { text }
    }
}

/// Thread-list status for a latest message; incoming messages carry none.
pub fn project_status(message: &impl Message) -> Option<MessageStatus> {
    message.delivery_status().map(MessageStatus::from)
}
