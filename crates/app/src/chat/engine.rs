use std::time::Duration;

use chrono::{DateTime, TimeDelta, Utc};
use rand::SeedableRng;
use rand::rngs::StdRng;
use threadline_storage::{
    DateGroup, DeliveryEvent, DeliveryStatus, MemoryStore, MessageId, MessageRecord,
    MessageStore, ParticipantId, Reaction, ReactionId, ReactionLedger, Snippet, StorageResult,
    ThreadId, ThreadRecord, ThreadStore, group_by_date, project_snippet, project_status,
};
use tokio::sync::broadcast;
use tracing::{debug, info, warn};

use super::events::{StoreEvent, TimerEvent};
use super::notify::{ChangeHub, MessagesReceiver, ThreadsReceiver};
use super::scheduler::TimerQueue;
use super::seed::demo_threads;
use super::simulation::{
    SimulationState, pick_author, pick_inbound_target, pick_typing_candidate, sample_delay,
    synthesize_message,
};
use crate::settings::EngineSettings;

/// Single-owner conversation state machine.
///
/// Every mutation runs to completion on `&mut self`, so the store, the timers, and the
/// published projections never disagree. Time is virtual: it only moves through
/// [`ChatEngine::run_until`] or [`ChatEngine::advance`].
#[derive(Debug)]
pub struct ChatEngine {
    settings: EngineSettings,
    store: MemoryStore,
    hub: ChangeHub,
    timers: TimerQueue<TimerEvent>,
    rng: StdRng,
    epoch: DateTime<Utc>,
    next_sort_key: u64,
    self_id: ParticipantId,
    simulation: SimulationState,
}

impl ChatEngine {
    pub fn new(settings: EngineSettings) -> Self {
        Self::with_store(settings, MemoryStore::new())
    }

    pub fn with_store(settings: EngineSettings, store: MemoryStore) -> Self {
        let settings = settings.normalized();
        let rng = match settings.rng_seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        let hub = ChangeHub::new(settings.event_buffer, &store.list_threads());
        let self_id = ParticipantId::new(settings.self_id.as_str());
        let next_sort_key = store.max_sort_key().saturating_add(1);

        Self {
            settings,
            store,
            hub,
            timers: TimerQueue::new(),
            rng,
            epoch: Utc::now(),
            next_sort_key,
            self_id,
            simulation: SimulationState::default(),
        }
    }

    /// Pins the wall-clock instant that virtual time zero maps to.
    pub fn starting_at(mut self, epoch: DateTime<Utc>) -> Self {
        self.epoch = epoch;
        self
    }

    pub fn settings(&self) -> &EngineSettings {
        &self.settings
    }

    pub fn self_id(&self) -> &ParticipantId {
        &self.self_id
    }

    pub fn store(&self) -> &MemoryStore {
        &self.store
    }

    /// Virtual time elapsed since the engine was created.
    pub fn now(&self) -> Duration {
        self.timers.now()
    }

    /// Timestamp stamped on messages created right now.
    pub fn wall_clock(&self) -> DateTime<Utc> {
        TimeDelta::from_std(self.timers.now())
            .ok()
            .and_then(|elapsed| self.epoch.checked_add_signed(elapsed))
            .unwrap_or(self.epoch)
    }

    pub fn simulation_running(&self) -> bool {
        self.simulation.running
    }

    pub fn pending_timers(&self) -> usize {
        self.timers.len()
    }

    pub fn threads(&self) -> Vec<ThreadRecord> {
        self.store.list_threads()
    }

    pub fn thread(&self, thread_id: &ThreadId) -> Option<ThreadRecord> {
        self.store.get_thread(thread_id)
    }

    pub fn messages_for_thread(&self, thread_id: &ThreadId) -> Vec<MessageRecord> {
        self.store.messages_for_thread(thread_id)
    }

    /// Messages of one thread split into local calendar-day runs.
    pub fn grouped_messages(&self, thread_id: &ThreadId) -> Vec<DateGroup<MessageRecord>> {
        group_by_date(self.store.messages(thread_id))
    }

    pub fn subscribe_events(&self) -> broadcast::Receiver<StoreEvent> {
        self.hub.subscribe_events()
    }

    pub fn subscribe_threads(&self) -> ThreadsReceiver {
        self.hub.subscribe_threads()
    }

    /// Unknown threads get an already closed, empty channel.
    pub fn subscribe_messages(&mut self, thread_id: &ThreadId) -> MessagesReceiver {
        if self.store.get_thread(thread_id).is_none() {
            return ChangeHub::closed_messages();
        }
        self.hub
            .subscribe_messages(thread_id, self.store.messages(thread_id))
    }

    /// Loads the demo thread list. Returns how many threads were added.
    pub fn seed_demo(&mut self) -> StorageResult<usize> {
        let now = self.wall_clock();
        let seed = demo_threads(&mut self.rng, now, &self.self_id);

        let mut added = 0;
        for (thread, messages) in seed {
            let thread_id = thread.id.clone();
            self.store.insert_thread(thread)?;
            for message in messages {
                self.store.append_message(&thread_id, message)?;
            }
            added += 1;
        }

        self.next_sort_key = self
            .next_sort_key
            .max(self.store.max_sort_key().saturating_add(1));
        self.publish_threads();
        info!(threads = added, "demo data seeded");
        Ok(added)
    }

    pub fn insert_thread(&mut self, thread: ThreadRecord) -> StorageResult<()> {
        let thread_id = thread.id.clone();
        self.store.insert_thread(thread)?;
        debug!(thread_id = %thread_id, "thread inserted");
        self.publish_threads();
        Ok(())
    }

    pub fn archive_thread(&mut self, thread_id: &ThreadId) -> bool {
        let removed = self.store.archive_thread(thread_id);
        self.thread_removed(thread_id, removed, "archive")
    }

    pub fn delete_thread(&mut self, thread_id: &ThreadId) -> bool {
        let removed = self.store.delete_thread(thread_id);
        self.thread_removed(thread_id, removed, "delete")
    }

    pub fn toggle_mute(&mut self, thread_id: &ThreadId) -> bool {
        let changed = self.store.toggle_mute(thread_id);
        self.thread_changed(thread_id, changed, "toggle_mute")
    }

    pub fn toggle_pin(&mut self, thread_id: &ThreadId) -> bool {
        let changed = self.store.toggle_pin(thread_id);
        self.thread_changed(thread_id, changed, "toggle_pin")
    }

    pub fn toggle_read(&mut self, thread_id: &ThreadId) -> bool {
        let changed = self.store.toggle_read(thread_id);
        self.thread_changed(thread_id, changed, "toggle_read")
    }

    pub fn mark_as_read(&mut self, thread_id: &ThreadId) -> bool {
        let changed = self.store.mark_as_read(thread_id);
        self.thread_changed(thread_id, changed, "mark_as_read")
    }

    /// Sets or clears the composer draft shown as the thread's snippet.
    ///
    /// Blank text clears the draft, which restores the last-message projection.
    pub fn set_draft(&mut self, thread_id: &ThreadId, text: Option<String>) -> bool {
        let Some(thread) = self.store.get_thread(thread_id) else {
            return false;
        };

        let snippet = match text.filter(|text| !text.trim().is_empty()) {
            Some(text) => Some(Snippet::Draft { text }),
            None => self.resting_snippet(&thread),
        };
        let changed = self.store.update_thread(thread_id, |thread| {
            thread.last_message_snippet = snippet;
        });
        self.thread_changed(thread_id, changed, "set_draft")
    }

    /// Appends a message and asks views to scroll to it.
    pub fn append_message(
        &mut self,
        thread_id: &ThreadId,
        message: MessageRecord,
    ) -> StorageResult<()> {
        let message_id = message.id.clone();
        let sort_key = message.sort_key;
        self.store.append_message(thread_id, message)?;
        self.next_sort_key = self.next_sort_key.max(sort_key.saturating_add(1));

        debug!(thread_id = %thread_id, message_id = %message_id, sort_key, "message appended");
        self.publish_messages(thread_id);
        self.hub.publish_scroll(thread_id, &message_id);
        Ok(())
    }

    pub fn update_message(&mut self, thread_id: &ThreadId, message: MessageRecord) -> bool {
        let changed = self.store.update_message(thread_id, message);
        if changed {
            self.publish_messages(thread_id);
        }
        changed
    }

    pub fn remove_message(&mut self, thread_id: &ThreadId, message_id: &MessageId) -> bool {
        let removed = self.store.remove_message(thread_id, message_id);
        if removed {
            debug!(thread_id = %thread_id, message_id = %message_id, "message removed");
            self.publish_messages(thread_id);
        }
        removed
    }

    pub fn add_reaction(
        &mut self,
        thread_id: &ThreadId,
        message_id: &MessageId,
        emoji: &str,
        reactor_id: &ParticipantId,
        reactor_display_name: Option<&str>,
    ) -> Option<Reaction> {
        let reaction = self.store.add_reaction(
            thread_id,
            message_id,
            emoji,
            reactor_id,
            reactor_display_name,
        )?;
        self.publish_messages(thread_id);
        Some(reaction)
    }

    pub fn remove_reaction(
        &mut self,
        thread_id: &ThreadId,
        message_id: &MessageId,
        reaction_id: &ReactionId,
    ) -> bool {
        let removed = self
            .store
            .remove_reaction(thread_id, message_id, reaction_id);
        if removed {
            self.publish_messages(thread_id);
        }
        removed
    }

    /// Sends a message as the local user and schedules its delivery steps.
    ///
    /// Returns `None` when the thread is unknown.
    pub fn send_message(
        &mut self,
        thread_id: &ThreadId,
        text: impl Into<String>,
    ) -> Option<MessageId> {
        if self.store.get_thread(thread_id).is_none() {
            debug!(thread_id = %thread_id, "send to unknown thread ignored");
            return None;
        }

        let message = MessageRecord::outgoing(
            self.next_sort_key,
            self.wall_clock(),
            self.self_id.clone(),
            text,
        );
        let message_id = message.id.clone();
        if let Err(error) = self.append_message(thread_id, message.clone()) {
            warn!(thread_id = %thread_id, %error, "outgoing message rejected");
            return None;
        }

        // Sending replaces any draft with the sent message.
        self.store.update_thread(thread_id, |thread| {
            let snippet = project_snippet(&*thread, &message);
            thread.last_message_snippet = Some(snippet);
            thread.last_message_date = Some(message.timestamp);
            thread.last_message_status = project_status(&message);
        });
        self.publish_threads();

        self.timers.schedule(
            self.settings.delivered_after(),
            TimerEvent::DeliveryStep {
                thread_id: thread_id.clone(),
                message_id: message_id.clone(),
            },
        );
        debug!(thread_id = %thread_id, message_id = %message_id, "message sent");
        Some(message_id)
    }

    /// Marks an outgoing message as failed and drops its pending delivery steps.
    pub fn fail_delivery(
        &mut self,
        thread_id: &ThreadId,
        message_id: &MessageId,
        reason: impl Into<String>,
    ) -> bool {
        let Some(mut message) = self.store.get_message(thread_id, message_id) else {
            return false;
        };
        let Some(current) = message
            .delivery_status
            .clone()
            .filter(|_| message.is_outgoing)
        else {
            return false;
        };

        match current.apply(DeliveryEvent::Fail(reason.into())) {
            Ok(next) => {
                self.timers.cancel_where(|event| {
                    matches!(
                        event,
                        TimerEvent::DeliveryStep { thread_id: pending_thread, message_id: pending_message }
                            if pending_thread == thread_id && pending_message == message_id
                    )
                });
                message.delivery_status = Some(next);
                self.write_delivery(thread_id, message)
            }
            Err(rejection) => {
                warn!(message_id = %message_id, ?rejection, "delivery failure rejected");
                false
            }
        }
    }

    /// Starts both generators. Returns `false` when already running.
    pub fn start_simulation(&mut self) -> bool {
        if self.simulation.running {
            return false;
        }
        self.simulation.running = true;

        let inbound = sample_delay(
            &mut self.rng,
            &self.settings,
            self.settings.inbound_interval_units,
        );
        self.timers.schedule(inbound, TimerEvent::InboundTick);

        // A typing flag left behind by an earlier stop is finished off before new episodes.
        let still_typing = self
            .simulation
            .typing_thread
            .as_ref()
            .and_then(|thread_id| self.store.get_thread(thread_id))
            .filter(|thread| thread.is_typing);
        match still_typing {
            Some(thread) => {
                let duration = sample_delay(
                    &mut self.rng,
                    &self.settings,
                    self.settings.typing_duration_units,
                );
                self.timers.schedule(
                    duration,
                    TimerEvent::TypingStop {
                        thread_id: thread.id,
                    },
                );
            }
            None => {
                self.simulation.typing_thread = None;
                self.schedule_typing_start();
            }
        }

        info!(at = ?self.timers.now(), "simulation started");
        true
    }

    /// Cancels the generator timers. Delivery steps keep running and typing flags are left
    /// as they are.
    pub fn stop_simulation(&mut self) -> bool {
        if !self.simulation.running {
            return false;
        }
        self.simulation.running = false;
        let cancelled = self.timers.cancel_where(TimerEvent::is_simulation);
        info!(cancelled, "simulation stopped");
        true
    }

    /// Deadline of the next pending timer in virtual time.
    pub fn next_deadline(&mut self) -> Option<Duration> {
        self.timers.next_deadline()
    }

    /// Fires every timer due at or before `target`, then moves the clock to `target`.
    ///
    /// Returns the number of timers fired.
    pub fn run_until(&mut self, target: Duration) -> usize {
        let mut fired = 0;
        while let Some((_, event)) = self.timers.pop_due(target) {
            self.handle_timer(event);
            fired += 1;
        }
        self.timers.advance_clock_to(target);
        fired
    }

    pub fn advance(&mut self, by: Duration) -> usize {
        self.run_until(self.timers.now().saturating_add(by))
    }

    fn handle_timer(&mut self, event: TimerEvent) {
        if event.is_simulation() && !self.simulation.running {
            return;
        }
        debug!(?event, at = ?self.timers.now(), "timer fired");

        match event {
            TimerEvent::DeliveryStep {
                thread_id,
                message_id,
            } => self.advance_delivery(&thread_id, &message_id),
            TimerEvent::InboundTick => {
                self.deliver_inbound();
                let delay = sample_delay(
                    &mut self.rng,
                    &self.settings,
                    self.settings.inbound_interval_units,
                );
                self.timers.schedule(delay, TimerEvent::InboundTick);
            }
            TimerEvent::TypingStart => self.start_typing(),
            TimerEvent::TypingStop { thread_id } => self.stop_typing(&thread_id),
        }
    }

    fn advance_delivery(&mut self, thread_id: &ThreadId, message_id: &MessageId) {
        let Some(mut message) = self.store.get_message(thread_id, message_id) else {
            debug!(message_id = %message_id, "delivery step for a removed message ignored");
            return;
        };
        let Some(current) = message.delivery_status.clone() else {
            return;
        };

        let event = match current {
            DeliveryStatus::Sending => DeliveryEvent::Delivered,
            _ => DeliveryEvent::Read,
        };
        match current.apply(event) {
            Ok(next) => {
                let read_follows = next == DeliveryStatus::Delivered;
                message.delivery_status = Some(next);
                self.write_delivery(thread_id, message);
                if read_follows {
                    self.timers.schedule(
                        self.settings.read_after(),
                        TimerEvent::DeliveryStep {
                            thread_id: thread_id.clone(),
                            message_id: message_id.clone(),
                        },
                    );
                }
            }
            Err(rejection) => {
                warn!(message_id = %message_id, ?rejection, "delivery transition rejected");
            }
        }
    }

    /// Stores a delivery transition and refreshes the thread status if the message is
    /// still the latest one.
    fn write_delivery(&mut self, thread_id: &ThreadId, message: MessageRecord) -> bool {
        let status = project_status(&message);
        let message_id = message.id.clone();
        if !self.store.update_message(thread_id, message) {
            return false;
        }
        debug!(message_id = %message_id, ?status, "delivery status updated");
        self.publish_messages(thread_id);

        let is_latest = self
            .store
            .messages(thread_id)
            .last()
            .is_some_and(|last| last.id == message_id);
        if is_latest
            && self
                .store
                .update_thread(thread_id, |thread| thread.last_message_status = status)
        {
            self.publish_threads();
        }
        true
    }

    fn deliver_inbound(&mut self) -> Option<MessageId> {
        let thread = pick_inbound_target(&mut self.rng, self.store.threads())?.clone();
        let author = pick_author(
            &mut self.rng,
            &thread,
            &self.settings.self_display_name,
        )?;
        let timestamp = self.wall_clock();
        let message = synthesize_message(
            &mut self.rng,
            author,
            self.next_sort_key,
            timestamp,
            self.settings.image_message_ratio,
        );
        let message_id = message.id.clone();
        if let Err(error) = self.append_message(&thread.id, message.clone()) {
            warn!(thread_id = %thread.id, %error, "inbound message rejected");
            return None;
        }

        let snippet = project_snippet(&thread, &message);
        self.store.update_thread(&thread.id, |thread| {
            thread.has_unread_messages = true;
            thread.unread_count = thread.unread_count.saturating_add(1);
            thread.last_message_snippet = Some(snippet);
            thread.last_message_date = Some(message.timestamp);
            thread.last_message_status = None;
        });
        self.publish_threads();
        debug!(thread_id = %thread.id, message_id = %message_id, "inbound message delivered");
        Some(message_id)
    }

    fn start_typing(&mut self) {
        let candidate = pick_typing_candidate(&mut self.rng, self.store.threads())
            .map(|thread| thread.id.clone());
        let Some(thread_id) = candidate else {
            self.schedule_typing_start();
            return;
        };

        if self
            .store
            .update_thread(&thread_id, |thread| thread.is_typing = true)
        {
            self.publish_threads();
        }
        let duration = sample_delay(
            &mut self.rng,
            &self.settings,
            self.settings.typing_duration_units,
        );
        debug!(thread_id = %thread_id, ?duration, "typing started");
        self.simulation.typing_thread = Some(thread_id.clone());
        self.timers
            .schedule(duration, TimerEvent::TypingStop { thread_id });
    }

    fn stop_typing(&mut self, thread_id: &ThreadId) {
        if self
            .store
            .update_thread(thread_id, |thread| thread.is_typing = false)
        {
            self.publish_threads();
        }
        if self.simulation.typing_thread.as_ref() == Some(thread_id) {
            self.simulation.typing_thread = None;
        }
        self.schedule_typing_start();
    }

    fn schedule_typing_start(&mut self) {
        let delay = sample_delay(
            &mut self.rng,
            &self.settings,
            self.settings.typing_rearm_units,
        );
        self.timers.schedule(delay, TimerEvent::TypingStart);
    }

    /// Snippet a thread falls back to when no draft is set.
    fn resting_snippet(&self, thread: &ThreadRecord) -> Option<Snippet> {
        match self.store.messages(&thread.id).last() {
            Some(last) => Some(project_snippet(thread, last)),
            None if thread.is_blocked => Some(Snippet::Blocked),
            None if thread.has_pending_request => Some(Snippet::PendingRequest {
                inviter_name: None,
            }),
            None => None,
        }
    }

    fn thread_changed(&self, thread_id: &ThreadId, changed: bool, action: &'static str) -> bool {
        if changed {
            debug!(thread_id = %thread_id, action, "thread updated");
            self.publish_threads();
        }
        changed
    }

    fn thread_removed(&mut self, thread_id: &ThreadId, removed: bool, action: &'static str) -> bool {
        if removed {
            debug!(thread_id = %thread_id, action, "thread removed");
            self.hub.publish_thread_removed(thread_id);
            self.publish_threads();
        }
        removed
    }

    fn publish_threads(&self) {
        self.hub.publish_threads(&self.store.list_threads());
    }

    fn publish_messages(&self, thread_id: &ThreadId) {
        self.hub
            .publish_messages(thread_id, self.store.messages(thread_id));
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;
    use tokio::sync::broadcast::error::TryRecvError;

    use super::*;

    const SECOND: Duration = Duration::from_secs(1);

    fn epoch() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 14, 9, 0, 0).unwrap()
    }

    fn kim() -> ThreadId {
        ThreadId::from("kim")
    }

    fn engine_with(threads: Vec<(ThreadRecord, Vec<MessageRecord>)>) -> ChatEngine {
        let store = MemoryStore::from_seed(threads).unwrap();
        ChatEngine::with_store(EngineSettings::default().with_seed(7), store).starting_at(epoch())
    }

    fn chat_with_kim() -> ChatEngine {
        let greeting = MessageRecord::incoming(
            1,
            epoch() - TimeDelta::hours(1),
            ParticipantId::from("kim"),
            Some("Kim".to_string()),
            "hi",
        );
        engine_with(vec![(ThreadRecord::direct(kim(), "Kim"), vec![greeting])])
    }

    fn drain(events: &mut broadcast::Receiver<StoreEvent>) -> Vec<StoreEvent> {
        let mut drained = Vec::new();
        while let Ok(event) = events.try_recv() {
            drained.push(event);
        }
        drained
    }

    fn typing_count(engine: &ChatEngine) -> usize {
        engine
            .threads()
            .iter()
            .filter(|thread| thread.is_typing)
            .count()
    }

    #[test]
    fn sent_message_walks_sending_delivered_read() {
        let mut engine = chat_with_kim();
        let message_id = engine.send_message(&kim(), "Hello").unwrap();

        let sent = engine.messages_for_thread(&kim()).pop().unwrap();
        assert_eq!(sent.id, message_id);
        assert_eq!(sent.body_text.as_deref(), Some("Hello"));
        assert_eq!(sent.delivery_status, Some(DeliveryStatus::Sending));
        assert_eq!(sent.sort_key, 2);
        assert_eq!(sent.timestamp, epoch());
        assert_eq!(
            engine.thread(&kim()).unwrap().last_message_status,
            Some(threadline_storage::MessageStatus::Sending)
        );

        engine.advance(Duration::from_millis(999));
        assert_eq!(
            engine.store().messages(&kim())[1].delivery_status,
            Some(DeliveryStatus::Sending)
        );

        engine.advance(Duration::from_millis(1));
        assert_eq!(
            engine.store().messages(&kim())[1].delivery_status,
            Some(DeliveryStatus::Delivered)
        );

        engine.advance(2 * SECOND);
        let read = engine.messages_for_thread(&kim()).pop().unwrap();
        assert_eq!(read.delivery_status, Some(DeliveryStatus::Read));
        assert_eq!(read.id, sent.id);
        assert_eq!(read.sort_key, sent.sort_key);
        assert_eq!(read.timestamp, sent.timestamp);
        assert_eq!(
            engine.thread(&kim()).unwrap().last_message_status,
            Some(threadline_storage::MessageStatus::Read)
        );
        assert_eq!(engine.pending_timers(), 0);
    }

    #[test]
    fn send_to_unknown_thread_does_nothing() {
        let mut engine = chat_with_kim();
        let mut events = engine.subscribe_events();

        assert!(engine.send_message(&ThreadId::from("ghost"), "Hello").is_none());
        assert!(engine.messages_for_thread(&ThreadId::from("ghost")).is_empty());
        assert_eq!(engine.pending_timers(), 0);
        assert_eq!(events.try_recv(), Err(TryRecvError::Empty));
    }

    #[test]
    fn send_publishes_messages_scroll_then_threads() {
        let mut engine = chat_with_kim();
        let mut events = engine.subscribe_events();
        let message_id = engine.send_message(&kim(), "Hello").unwrap();

        let events = drain(&mut events);
        assert_eq!(events.len(), 3);
        assert!(matches!(&events[0], StoreEvent::MessagesChanged { messages, .. } if messages.len() == 2));
        assert_eq!(
            events[1],
            StoreEvent::ScrollToMessage {
                thread_id: kim(),
                message_id,
            }
        );
        assert!(matches!(&events[2], StoreEvent::ThreadsChanged { .. }));
    }

    #[test]
    fn sending_clears_a_draft() {
        let mut engine = chat_with_kim();
        assert!(engine.set_draft(&kim(), Some("half a tho".to_string())));
        assert_eq!(
            engine.thread(&kim()).unwrap().last_message_snippet,
            Some(Snippet::Draft {
                text: "half a tho".to_string()
            })
        );

        engine.send_message(&kim(), "Hello").unwrap();
        assert_eq!(
            engine.thread(&kim()).unwrap().last_message_snippet,
            Some(Snippet::DirectMessage {
                text: "Hello".to_string()
            })
        );
    }

    #[test]
    fn clearing_a_draft_restores_the_last_message() {
        let mut engine = chat_with_kim();
        engine.set_draft(&kim(), Some("later".to_string()));

        assert!(engine.set_draft(&kim(), Some("   ".to_string())));
        assert_eq!(
            engine.thread(&kim()).unwrap().last_message_snippet,
            Some(Snippet::DirectMessage {
                text: "hi".to_string()
            })
        );
        assert!(!engine.set_draft(&kim(), None));
    }

    #[test]
    fn delivery_of_a_removed_thread_is_ignored() {
        let mut engine = chat_with_kim();
        engine.send_message(&kim(), "Hello").unwrap();
        assert!(engine.delete_thread(&kim()));

        let mut events = engine.subscribe_events();
        assert_eq!(engine.advance(10 * SECOND), 1);
        assert_eq!(events.try_recv(), Err(TryRecvError::Empty));
        assert!(engine.messages_for_thread(&kim()).is_empty());
    }

    #[test]
    fn failed_delivery_is_terminal() {
        let mut engine = chat_with_kim();
        let message_id = engine.send_message(&kim(), "Hello").unwrap();

        assert!(engine.fail_delivery(&kim(), &message_id, "offline"));
        assert_eq!(engine.pending_timers(), 0);
        engine.advance(10 * SECOND);

        let message = engine.store().get_message(&kim(), &message_id).unwrap();
        assert_eq!(
            message.delivery_status,
            Some(DeliveryStatus::Failed("offline".to_string()))
        );
        assert_eq!(
            engine.thread(&kim()).unwrap().last_message_status,
            Some(threadline_storage::MessageStatus::Failed)
        );
        assert!(!engine.fail_delivery(&kim(), &message_id, "again"));
    }

    #[test]
    fn incoming_messages_cannot_fail() {
        let mut engine = chat_with_kim();
        let incoming = engine.messages_for_thread(&kim())[0].id.clone();
        assert!(!engine.fail_delivery(&kim(), &incoming, "nope"));
    }

    #[test]
    fn archive_removes_thread_and_messages() {
        let mut engine = chat_with_kim();
        let mut events = engine.subscribe_events();

        assert!(engine.archive_thread(&kim()));
        assert!(engine.thread(&kim()).is_none());
        assert!(engine.messages_for_thread(&kim()).is_empty());
        assert!(engine.grouped_messages(&kim()).is_empty());

        let events = drain(&mut events);
        assert_eq!(events[0], StoreEvent::ThreadRemoved { thread_id: kim() });
        assert!(matches!(&events[1], StoreEvent::ThreadsChanged { threads } if threads.is_empty()));
        assert!(!engine.archive_thread(&kim()));
    }

    #[test]
    fn mark_as_read_on_read_thread_publishes_nothing() {
        let mut engine = chat_with_kim();
        let mut events = engine.subscribe_events();

        assert!(!engine.mark_as_read(&kim()));
        assert_eq!(events.try_recv(), Err(TryRecvError::Empty));

        assert!(engine.toggle_read(&kim()));
        let thread = engine.thread(&kim()).unwrap();
        assert!(thread.has_unread_messages);
        assert_eq!(thread.unread_count, 1);

        assert!(engine.mark_as_read(&kim()));
        assert_eq!(drain(&mut events).len(), 2);
        assert_eq!(engine.thread(&kim()).unwrap().unread_count, 0);
    }

    #[test]
    fn thread_watch_follows_toggles() {
        let mut engine = chat_with_kim();
        let mut threads = engine.subscribe_threads();
        assert_eq!(threads.borrow_and_update().len(), 1);

        engine.toggle_mute(&kim());
        engine.toggle_pin(&kim());
        assert!(threads.has_changed().unwrap());
        let latest = threads.borrow_and_update();
        assert!(latest[0].is_muted);
        assert!(latest[0].is_pinned);
    }

    #[test]
    fn reactions_publish_only_when_they_change_something() {
        let mut engine = chat_with_kim();
        let message_id = engine.messages_for_thread(&kim())[0].id.clone();
        let me = engine.self_id().clone();
        let mut messages = engine.subscribe_messages(&kim());

        let reaction = engine
            .add_reaction(&kim(), &message_id, "👍", &me, Some("You"))
            .unwrap();
        assert!(engine
            .add_reaction(&kim(), &message_id, "👍", &me, Some("You"))
            .is_none());
        assert_eq!(messages.borrow_and_update()[0].reactions.len(), 1);

        assert!(!engine.remove_reaction(&kim(), &message_id, &ReactionId::from("unknown")));
        assert!(!messages.has_changed().unwrap());
        assert!(engine.remove_reaction(&kim(), &message_id, &reaction.id));
        assert!(messages.borrow_and_update()[0].reactions.is_empty());
    }

    #[test]
    fn simulation_on_empty_store_is_silent() {
        let mut engine = ChatEngine::new(EngineSettings::default().with_seed(3));
        let mut events = engine.subscribe_events();

        assert!(engine.start_simulation());
        let fired = engine.advance(120 * SECOND);
        assert!(fired > 0);
        assert_eq!(events.try_recv(), Err(TryRecvError::Empty));
        assert!(engine.threads().is_empty());
    }

    #[test]
    fn start_and_stop_are_idempotent() {
        let mut engine = chat_with_kim();
        assert!(engine.start_simulation());
        assert!(!engine.start_simulation());
        assert_eq!(engine.pending_timers(), 2);

        assert!(engine.stop_simulation());
        assert!(!engine.stop_simulation());
        assert_eq!(engine.pending_timers(), 0);
    }

    #[test]
    fn inbound_messages_mark_unread_and_skip_note_to_self() {
        let note = ThreadId::from("self");
        let mut engine = engine_with(vec![
            (ThreadRecord::note_to_self(note.clone(), "Note to Self"), vec![]),
            (ThreadRecord::direct(kim(), "Kim"), vec![]),
        ]);
        engine.start_simulation();
        engine.advance(16 * SECOND);

        let thread = engine.thread(&kim()).unwrap();
        let messages = engine.messages_for_thread(&kim());
        assert!(!messages.is_empty());
        assert!(thread.has_unread_messages);
        assert_eq!(thread.unread_count as usize, messages.len());
        assert_eq!(thread.last_message_status, None);
        assert_eq!(thread.last_message_date, messages.last().map(|message| message.timestamp));
        assert!(messages.iter().all(|message| !message.is_outgoing));

        let note_thread = engine.thread(&note).unwrap();
        assert!(engine.messages_for_thread(&note).is_empty());
        assert!(!note_thread.has_unread_messages);
        assert!(!note_thread.is_typing);
    }

    #[test]
    fn group_inbound_is_authored_by_a_member() {
        let crew = ThreadId::from("crew");
        let mut engine = engine_with(vec![(
            ThreadRecord::group(
                crew.clone(),
                "Crew",
                vec!["You".to_string(), "Ada".to_string()],
            ),
            vec![],
        )]);
        engine.start_simulation();
        engine.advance(60 * SECOND);

        let messages = engine.messages_for_thread(&crew);
        assert!(!messages.is_empty());
        assert!(messages
            .iter()
            .all(|message| message.author_display_name.as_deref() == Some("Ada")));
        assert!(matches!(
            engine.thread(&crew).unwrap().last_message_snippet,
            Some(Snippet::GroupMessage { ref sender_name, .. }) if sender_name == "Ada"
        ));
    }

    #[test]
    fn at_most_one_thread_types_at_a_time() {
        let threads = ["a", "b", "c", "d"]
            .into_iter()
            .map(|id| (ThreadRecord::direct(ThreadId::from(id), id.to_uppercase()), vec![]))
            .collect();
        let mut engine = engine_with(threads);
        engine.start_simulation();

        let mut saw_typing = false;
        for _ in 0..800 {
            engine.advance(Duration::from_millis(250));
            let typing = typing_count(&engine);
            assert!(typing <= 1);
            saw_typing |= typing == 1;
        }
        assert!(saw_typing);
    }

    #[test]
    fn stop_during_typing_freezes_everything() {
        let mut engine = chat_with_kim();
        engine.start_simulation();

        let mut steps = 0;
        while typing_count(&engine) == 0 {
            engine.advance(Duration::from_millis(100));
            steps += 1;
            assert!(steps < 200, "typing never started");
        }

        assert!(engine.stop_simulation());
        let messages_before = engine.messages_for_thread(&kim());
        let mut events = engine.subscribe_events();
        assert_eq!(engine.advance(300 * SECOND), 0);

        assert!(engine.thread(&kim()).unwrap().is_typing);
        assert_eq!(engine.messages_for_thread(&kim()), messages_before);
        assert_eq!(events.try_recv(), Err(TryRecvError::Empty));
    }

    #[test]
    fn restart_finishes_a_leftover_typing_episode() {
        let mut engine = chat_with_kim();
        engine.start_simulation();
        while typing_count(&engine) == 0 {
            engine.advance(Duration::from_millis(100));
        }
        engine.stop_simulation();

        engine.start_simulation();
        engine.advance(4 * SECOND);
        assert!(!engine.thread(&kim()).unwrap().is_typing);
    }

    #[test]
    fn delivery_survives_stop_and_restart() {
        let mut engine = chat_with_kim();
        engine.start_simulation();
        let message_id = engine.send_message(&kim(), "Hello").unwrap();
        engine.stop_simulation();
        assert_eq!(engine.pending_timers(), 1);

        engine.start_simulation();
        engine.advance(600 * SECOND);
        let message = engine.store().get_message(&kim(), &message_id).unwrap();
        assert_eq!(message.delivery_status, Some(DeliveryStatus::Read));
    }

    #[test]
    fn delivery_completes_while_stopped() {
        let mut engine = chat_with_kim();
        engine.start_simulation();
        let message_id = engine.send_message(&kim(), "Hello").unwrap();
        engine.stop_simulation();

        let mut events = engine.subscribe_events();
        assert_eq!(engine.advance(10 * SECOND), 2);
        let message = engine.store().get_message(&kim(), &message_id).unwrap();
        assert_eq!(message.delivery_status, Some(DeliveryStatus::Read));
        assert!(drain(&mut events)
            .iter()
            .all(|event| event.thread_id().is_none_or(|thread_id| *thread_id == kim())));
        assert_eq!(engine.pending_timers(), 0);
    }

    #[test]
    fn append_after_archive_is_rejected_silently() {
        let mut engine = chat_with_kim();
        assert!(engine.archive_thread(&kim()));
        let mut events = engine.subscribe_events();

        let late = MessageRecord::incoming(
            5,
            epoch(),
            ParticipantId::from("kim"),
            Some("Kim".to_string()),
            "still there?",
        );
        assert!(engine.append_message(&kim(), late).is_err());
        assert!(engine.messages_for_thread(&kim()).is_empty());
        assert!(engine.thread(&kim()).is_none());
        assert_eq!(events.try_recv(), Err(TryRecvError::Empty));
    }

    #[test]
    fn message_subscription_to_unknown_thread_is_closed() {
        let mut engine = chat_with_kim();
        let receiver = engine.subscribe_messages(&ThreadId::from("ghost"));
        assert!(receiver.borrow().is_empty());
        assert!(receiver.has_changed().is_err());

        let live = engine.subscribe_messages(&kim());
        assert_eq!(live.borrow().len(), 1);
        assert!(live.has_changed().is_ok());
    }

    #[test]
    fn engine_is_debug_printable() {
        let engine = chat_with_kim();
        assert!(format!("{engine:?}").contains("ChatEngine"));
    }

    #[test]
    fn demo_seed_continues_sort_keys() {
        let mut engine = ChatEngine::new(EngineSettings::default().with_seed(1)).starting_at(epoch());
        let added = engine.seed_demo().unwrap();
        assert_eq!(added, engine.threads().len());

        let max_seeded = engine.store().max_sort_key();
        let target = engine.threads()[1].id.clone();
        let message_id = engine.send_message(&target, "Hello").unwrap();
        let sent = engine.store().get_message(&target, &message_id).unwrap();
        assert_eq!(sent.sort_key, max_seeded + 1);
        assert!(engine.seed_demo().is_err());
    }
}
