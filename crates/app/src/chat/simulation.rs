use std::time::Duration;

use chrono::{DateTime, Utc};
use rand::Rng;
use rand::seq::SliceRandom;
use threadline_storage::{MessageRecord, ParticipantId, ThreadId, ThreadRecord};

use crate::settings::{EngineSettings, UnitRange};

/// Floor for sampled simulation delays so re-arming chains always move time forward.
pub const MIN_SIMULATION_DELAY: Duration = Duration::from_millis(1);

pub const INBOUND_PHRASES: &[&str] = &[
    "Are we still on for tonight?",
    "Just landed, will call you in a bit",
    "Can you send me the notes from today?",
    "haha that's amazing",
    "On my way!",
    "Did you see the game last night?",
    "Running 10 minutes late, sorry",
    "Thanks again for your help",
    "What time works for you tomorrow?",
    "Sounds good to me",
    "I'll pick up coffee on the way",
    "Let me check and get back to you",
];

/// Bookkeeping for the two repeating generators.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SimulationState {
    pub running: bool,
    /// Thread flagged by the current or most recent typing episode.
    pub typing_thread: Option<ThreadId>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboundAuthor {
    pub id: ParticipantId,
    pub display_name: String,
}

/// Samples a delay uniformly from `range` and converts it to wall-clock time.
pub fn sample_delay(rng: &mut impl Rng, settings: &EngineSettings, range: UnitRange) -> Duration {
    let units = if range.max > range.min {
        rng.gen_range(range.min..=range.max)
    } else {
        range.min
    };
    settings.units(units).max(MIN_SIMULATION_DELAY)
}

/// Uniformly picks a thread that may receive inbound traffic.
pub fn pick_inbound_target<'a, R: Rng>(
    rng: &mut R,
    threads: impl Iterator<Item = &'a ThreadRecord>,
) -> Option<&'a ThreadRecord> {
    let eligible = threads
        .filter(|thread| !thread.is_note_to_self)
        .collect::<Vec<_>>();
    eligible.choose(rng).copied()
}

/// Uniformly picks a thread for the next typing episode.
pub fn pick_typing_candidate<'a, R: Rng>(
    rng: &mut R,
    threads: impl Iterator<Item = &'a ThreadRecord>,
) -> Option<&'a ThreadRecord> {
    let eligible = threads
        .filter(|thread| !thread.is_note_to_self && !thread.is_typing)
        .collect::<Vec<_>>();
    eligible.choose(rng).copied()
}

/// Picks who "sent" an inbound message: the counterpart of a direct thread, or a random
/// non-self member of a group.
pub fn pick_author<R: Rng>(
    rng: &mut R,
    thread: &ThreadRecord,
    self_display_name: &str,
) -> Option<InboundAuthor> {
    if !thread.is_group {
        return Some(InboundAuthor {
            id: ParticipantId::new(thread.id.as_str()),
            display_name: thread.display_name.clone(),
        });
    }

    let members = thread
        .participant_names
        .iter()
        .filter(|name| !name.trim().is_empty() && name.as_str() != self_display_name)
        .collect::<Vec<_>>();
    let name = members.choose(rng)?;
    Some(InboundAuthor {
        id: participant_id_for(name),
        display_name: (*name).clone(),
    })
}

/// Builds one synthetic inbound message.
pub fn synthesize_message<R: Rng>(
    rng: &mut R,
    author: InboundAuthor,
    sort_key: u64,
    timestamp: DateTime<Utc>,
    image_message_ratio: f64,
) -> MessageRecord {
    if rng.gen_bool(image_message_ratio.clamp(0.0, 1.0)) {
        let mut message = MessageRecord::incoming(
            sort_key,
            timestamp,
            author.id,
            Some(author.display_name),
            "",
        )
        .with_image();
        message.body_text = None;
        return message;
    }

    let body = INBOUND_PHRASES
        .choose(rng)
        .copied()
        .unwrap_or("Hey!");
    MessageRecord::incoming(sort_key, timestamp, author.id, Some(author.display_name), body)
}

/// Stable participant id derived from a display name.
pub fn participant_id_for(display_name: &str) -> ParticipantId {
    let slug = display_name
        .trim()
        .to_lowercase()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join("-");
    ParticipantId::new(slug)
}
