use std::collections::HashMap;

use crate::ids::ThreadId;
use crate::types::ThreadRecord;

/// Ordered thread list with an id -> position index.
///
/// Display order is insertion order; replacements never move a thread.
#[derive(Debug, Clone, Default)]
pub(crate) struct ThreadList {
    ordered: Vec<ThreadRecord>,
    positions: HashMap<ThreadId, usize>,
}

impl ThreadList {
    pub(crate) fn len(&self) -> usize {
        self.ordered.len()
    }

    pub(crate) fn contains(&self, thread_id: &ThreadId) -> bool {
        self.positions.contains_key(thread_id)
    }

    pub(crate) fn get(&self, thread_id: &ThreadId) -> Option<&ThreadRecord> {
        self.positions
            .get(thread_id)
            .and_then(|position| self.ordered.get(*position))
    }

    pub(crate) fn iter(&self) -> impl Iterator<Item = &ThreadRecord> {
        self.ordered.iter()
    }

    pub(crate) fn push(&mut self, thread: ThreadRecord) {
        self.positions.insert(thread.id.clone(), self.ordered.len());
        self.ordered.push(thread);
    }

    pub(crate) fn replace(&mut self, thread: ThreadRecord) -> bool {
        let Some(position) = self.positions.get(&thread.id).copied() else {
            return false;
        };
        let Some(slot) = self.ordered.get_mut(position) else {
            return false;
        };
        if *slot == thread {
            return false;
        }

        *slot = thread;
        true
    }

    pub(crate) fn remove(&mut self, thread_id: &ThreadId) -> Option<ThreadRecord> {
        let position = self.positions.remove(thread_id)?;
        let removed = self.ordered.remove(position);

        // Everything after the removed slot shifted left by one.
        for thread in &self.ordered[position..] {
            if let Some(index) = self.positions.get_mut(&thread.id) {
                *index -= 1;
            }
        }

        Some(removed)
    }
}
