use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::ids::{MessageId, ParticipantId, ReactionId, ThreadId};

/// Snippet text used for image-only messages.
pub const PHOTO_SNIPPET_TEXT: &str = "Photo";

/// Delivery lifecycle of one outgoing message.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "state", content = "reason", rename_all = "snake_case")]
pub enum DeliveryStatus {
    Sending,
    Delivered,
    Read,
    Failed(String),
}

impl DeliveryStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Read | Self::Failed(_))
    }
}

/// Coarse, display-oriented status shown next to a thread's last message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageStatus {
    Uploading,
    Sending,
    Sent,
    Skipped,
    Delivered,
    Read,
    Viewed,
    Failed,
    Pending,
}

impl From<&DeliveryStatus> for MessageStatus {
    fn from(value: &DeliveryStatus) -> Self {
        match value {
            DeliveryStatus::Sending => Self::Sending,
            DeliveryStatus::Delivered => Self::Delivered,
            DeliveryStatus::Read => Self::Read,
            DeliveryStatus::Failed(_) => Self::Failed,
        }
    }
}

/// Preview shown for a thread in the list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Snippet {
    Blocked,
    PendingRequest { inviter_name: Option<String> },
    Draft { text: String },
    VoiceDraft,
    DirectMessage { text: String },
    GroupMessage { text: String, sender_name: String },
    None,
}

impl Snippet {
    /// Returns the user-visible preview text, if the variant carries one.
    pub fn text(&self) -> Option<&str> {
        match self {
            Self::Draft { text }
            | Self::DirectMessage { text }
            | Self::GroupMessage { text, .. } => Some(text),
            Self::Blocked | Self::PendingRequest { .. } | Self::VoiceDraft | Self::None => None,
        }
    }

    pub fn is_draft(&self) -> bool {
        matches!(self, Self::Draft { .. } | Self::VoiceDraft)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reaction {
    pub id: ReactionId,
    pub emoji: String,
    pub reactor_id: ParticipantId,
    pub reactor_display_name: Option<String>,
}

impl Reaction {
    pub fn new(
        emoji: impl Into<String>,
        reactor_id: ParticipantId,
        reactor_display_name: Option<String>,
    ) -> Self {
        Self {
            id: ReactionId::new_v7(),
            emoji: emoji.into(),
            reactor_id,
            reactor_display_name,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageRecord {
    pub id: MessageId,
    pub sort_key: u64,
    pub timestamp: DateTime<Utc>,
    pub body_text: Option<String>,
    pub has_image: bool,
    pub is_outgoing: bool,
    pub delivery_status: Option<DeliveryStatus>,
    pub author_id: ParticipantId,
    pub author_display_name: Option<String>,
    pub reactions: Vec<Reaction>,
    pub is_system_message: bool,
}

impl MessageRecord {
    /// Creates an inbound text message authored by someone else.
    pub fn incoming(
        sort_key: u64,
        timestamp: DateTime<Utc>,
        author_id: ParticipantId,
        author_display_name: Option<String>,
        body_text: impl Into<String>,
    ) -> Self {
        Self {
            id: MessageId::new_v7(),
            sort_key,
            timestamp,
            body_text: Some(body_text.into()),
            has_image: false,
            is_outgoing: false,
            delivery_status: None,
            author_id,
            author_display_name,
            reactions: Vec::new(),
            is_system_message: false,
        }
    }

    /// Creates an outgoing message in the `Sending` state.
    pub fn outgoing(
        sort_key: u64,
        timestamp: DateTime<Utc>,
        author_id: ParticipantId,
        body_text: impl Into<String>,
    ) -> Self {
        Self {
            id: MessageId::new_v7(),
            sort_key,
            timestamp,
            body_text: Some(body_text.into()),
            has_image: false,
            is_outgoing: true,
            delivery_status: Some(DeliveryStatus::Sending),
            author_id,
            author_display_name: None,
            reactions: Vec::new(),
            is_system_message: false,
        }
    }

    pub fn with_id(mut self, id: MessageId) -> Self {
        self.id = id;
        self
    }

    pub fn with_image(mut self) -> Self {
        self.has_image = true;
        self
    }

    pub fn with_delivery_status(mut self, status: DeliveryStatus) -> Self {
        self.delivery_status = Some(status);
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ThreadRecord {
    pub id: ThreadId,
    pub display_name: String,
    pub is_group: bool,
    pub is_pinned: bool,
    pub is_muted: bool,
    pub has_unread_messages: bool,
    pub unread_count: u32,
    pub last_message_date: Option<DateTime<Utc>>,
    pub last_message_snippet: Option<Snippet>,
    pub last_message_status: Option<MessageStatus>,
    pub is_typing: bool,
    pub is_blocked: bool,
    pub has_pending_request: bool,
    pub is_note_to_self: bool,
    pub member_count: u32,
    pub participant_names: Vec<String>,
}

impl ThreadRecord {
    /// Creates a one-to-one thread with no history.
    pub fn direct(id: ThreadId, display_name: impl Into<String>) -> Self {
        Self {
            id,
            display_name: display_name.into(),
            is_group: false,
            is_pinned: false,
            is_muted: false,
            has_unread_messages: false,
            unread_count: 0,
            last_message_date: None,
            last_message_snippet: None,
            last_message_status: None,
            is_typing: false,
            is_blocked: false,
            has_pending_request: false,
            is_note_to_self: false,
            member_count: 2,
            participant_names: Vec::new(),
        }
    }

    /// Creates a group thread. `member_count` includes the local user.
    pub fn group(
        id: ThreadId,
        display_name: impl Into<String>,
        participant_names: Vec<String>,
    ) -> Self {
        let member_count = u32::try_from(participant_names.len())
            .unwrap_or(u32::MAX)
            .saturating_add(1);
        Self {
            is_group: true,
            member_count,
            participant_names,
            ..Self::direct(id, display_name)
        }
    }

    pub fn note_to_self(id: ThreadId, display_name: impl Into<String>) -> Self {
        Self {
            is_note_to_self: true,
            member_count: 1,
            ..Self::direct(id, display_name)
        }
    }
}
