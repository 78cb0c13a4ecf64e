use super::MessageStore;
use super::ids::{MessageId, ParticipantId, ReactionId, ThreadId};
use super::types::Reaction;

/// Per-message reaction multiset, written back through the message update path.
pub trait ReactionLedger {
    /// Adds `emoji` from `reactor_id` unless that pair is already present.
    ///
    /// Returns the stored reaction when one was added.
    fn add_reaction(
        &mut self,
        thread_id: &ThreadId,
        message_id: &MessageId,
        emoji: &str,
        reactor_id: &ParticipantId,
        reactor_display_name: Option<&str>,
    ) -> Option<Reaction>;

    /// Removes the reaction with `reaction_id`. Returns `false` when nothing matched.
    fn remove_reaction(
        &mut self,
        thread_id: &ThreadId,
        message_id: &MessageId,
        reaction_id: &ReactionId,
    ) -> bool;
}

impl<S: MessageStore> ReactionLedger for S {
    fn add_reaction(
        &mut self,
        thread_id: &ThreadId,
        message_id: &MessageId,
        emoji: &str,
        reactor_id: &ParticipantId,
        reactor_display_name: Option<&str>,
    ) -> Option<Reaction> {
        let mut message = self.get_message(thread_id, message_id)?;
        let duplicate = message
            .reactions
            .iter()
            .any(|reaction| reaction.emoji == emoji && &reaction.reactor_id == reactor_id);
        if duplicate {
            return None;
        }

        let reaction = Reaction::new(
            emoji,
            reactor_id.clone(),
            reactor_display_name.map(str::to_string),
        );
        message.reactions.push(reaction.clone());
        self.update_message(thread_id, message).then_some(reaction)
    }

    fn remove_reaction(
        &mut self,
        thread_id: &ThreadId,
        message_id: &MessageId,
        reaction_id: &ReactionId,
    ) -> bool {
        let Some(mut message) = self.get_message(thread_id, message_id) else {
            return false;
        };
        let before = message.reactions.len();
        message.reactions.retain(|reaction| &reaction.id != reaction_id);
        if message.reactions.len() == before {
            return false;
        }

        self.update_message(thread_id, message)
    }
}
