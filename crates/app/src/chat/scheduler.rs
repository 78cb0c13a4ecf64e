use std::cmp::Reverse;
use std::collections::{BinaryHeap, HashMap};
use std::time::Duration;

/// Handle returned for every scheduled timer; used to cancel it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TimerToken(u64);

impl TimerToken {
    pub const fn raw(self) -> u64 {
        self.0
    }
}

/// Delay queue over a virtual monotonic clock.
///
/// Time only moves when [`TimerQueue::pop_due`] hands out an event, and it moves to that
/// event's deadline, so callbacks always observe the instant they were scheduled for.
/// Equal deadlines fire in scheduling order.
#[derive(Debug)]
pub struct TimerQueue<E> {
    now: Duration,
    next_token: u64,
    heap: BinaryHeap<Reverse<(Duration, TimerToken)>>,
    pending: HashMap<TimerToken, E>,
}

impl<E> Default for TimerQueue<E> {
    fn default() -> Self {
        Self {
            now: Duration::ZERO,
            next_token: 0,
            heap: BinaryHeap::new(),
            pending: HashMap::new(),
        }
    }
}

impl<E> TimerQueue<E> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn now(&self) -> Duration {
        self.now
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    pub fn is_pending(&self, token: TimerToken) -> bool {
        self.pending.contains_key(&token)
    }

    pub fn schedule(&mut self, delay: Duration, event: E) -> TimerToken {
        let token = TimerToken(self.next_token);
        self.next_token += 1;
        self.heap.push(Reverse((self.now + delay, token)));
        self.pending.insert(token, event);
        token
    }

    /// Cancels one timer. Returns the event if it had not fired yet.
    pub fn cancel(&mut self, token: TimerToken) -> Option<E> {
        // The heap entry stays behind and is skipped once it surfaces.
        self.pending.remove(&token)
    }

    /// Cancels every pending timer matching `predicate`, returning how many were dropped.
    pub fn cancel_where(&mut self, mut predicate: impl FnMut(&E) -> bool) -> usize {
        let before = self.pending.len();
        self.pending.retain(|_, event| !predicate(event));
        before - self.pending.len()
    }

    pub fn cancel_all(&mut self) -> usize {
        let cancelled = self.pending.len();
        self.pending.clear();
        self.heap.clear();
        cancelled
    }

    /// Deadline of the earliest live timer.
    pub fn next_deadline(&mut self) -> Option<Duration> {
        self.discard_cancelled_head();
        self.heap.peek().map(|Reverse((deadline, _))| *deadline)
    }

    /// Pops the earliest timer due at or before `until`, advancing the clock to its deadline.
    pub fn pop_due(&mut self, until: Duration) -> Option<(TimerToken, E)> {
        self.discard_cancelled_head();
        let Reverse((deadline, token)) = *self.heap.peek()?;
        if deadline > until {
            return None;
        }

        self.heap.pop();
        let event = self.pending.remove(&token)?;
        self.now = self.now.max(deadline);
        Some((token, event))
    }

    /// Moves the clock forward without firing anything.
    pub fn advance_clock_to(&mut self, until: Duration) {
        self.now = self.now.max(until);
    }

    fn discard_cancelled_head(&mut self) {
        while let Some(Reverse((_, token))) = self.heap.peek() {
            if self.pending.contains_key(token) {
                break;
            }
            self.heap.pop();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn secs(value: u64) -> Duration {
        Duration::from_secs(value)
    }

    #[test]
    fn pops_in_deadline_then_fifo_order() {
        let mut queue = TimerQueue::new();
        queue.schedule(secs(5), "late");
        queue.schedule(secs(1), "first");
        queue.schedule(secs(1), "second");

        assert_eq!(queue.pop_due(secs(10)).map(|(_, event)| event), Some("first"));
        assert_eq!(queue.now(), secs(1));
        assert_eq!(queue.pop_due(secs(10)).map(|(_, event)| event), Some("second"));
        assert_eq!(queue.pop_due(secs(10)).map(|(_, event)| event), Some("late"));
        assert_eq!(queue.now(), secs(5));
        assert!(queue.pop_due(secs(10)).is_none());
    }

    #[test]
    fn nothing_fires_before_its_deadline() {
        let mut queue = TimerQueue::new();
        queue.schedule(secs(3), ());

        assert!(queue.pop_due(secs(2)).is_none());
        assert_eq!(queue.next_deadline(), Some(secs(3)));
        assert_eq!(queue.now(), Duration::ZERO);
    }

    #[test]
    fn cancelled_timers_never_fire() {
        let mut queue = TimerQueue::new();
        let doomed = queue.schedule(secs(1), "doomed");
        queue.schedule(secs(2), "kept");

        assert_eq!(queue.cancel(doomed), Some("doomed"));
        assert_eq!(queue.cancel(doomed), None);
        assert_eq!(queue.next_deadline(), Some(secs(2)));
        assert_eq!(queue.pop_due(secs(5)).map(|(_, event)| event), Some("kept"));
    }

    #[test]
    fn delays_are_relative_to_the_current_clock() {
        let mut queue = TimerQueue::new();
        queue.advance_clock_to(secs(10));
        queue.schedule(secs(2), "relative");

        assert_eq!(queue.next_deadline(), Some(secs(12)));
    }

    #[test]
    fn cancel_where_filters_by_event() {
        let mut queue = TimerQueue::new();
        queue.schedule(secs(1), 1);
        queue.schedule(secs(1), 2);
        queue.schedule(secs(1), 3);

        assert_eq!(queue.cancel_where(|event| event % 2 == 1), 2);
        assert_eq!(queue.len(), 1);
        assert_eq!(queue.cancel_all(), 1);
        assert!(queue.is_empty());
        assert_eq!(queue.next_deadline(), None);
    }
}
