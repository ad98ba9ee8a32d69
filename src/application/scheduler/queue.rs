//! Ordered pending queue keyed by `(priority, arrival)`.

use std::collections::{BTreeMap, HashMap};

use crate::domain::{Priority, RequestId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
struct Slot {
    priority: Priority,
    seq: u64,
}

/// Pending entries in admission order with O(log n) removal by id.
pub(super) struct PendingQueue<T> {
    entries: BTreeMap<Slot, (RequestId, T)>,
    index: HashMap<RequestId, Slot>,
    next_seq: u64,
}

impl<T> PendingQueue<T> {
    pub(super) fn new() -> Self {
        Self {
            entries: BTreeMap::new(),
            index: HashMap::new(),
            next_seq: 0,
        }
    }

    /// Append behind every entry of the same priority.
    ///
    /// Returns the previous value if `id` was already queued.
    pub(super) fn push(&mut self, id: RequestId, priority: Priority, value: T) -> Option<T> {
        let previous = self.remove(id);
        let slot = Slot {
            priority,
            seq: self.next_seq,
        };
        self.next_seq += 1;
        self.entries.insert(slot, (id, value));
        self.index.insert(id, slot);
        previous
    }

    /// Remove the most urgent, oldest entry.
    pub(super) fn pop(&mut self) -> Option<(RequestId, T)> {
        let (_, (id, value)) = self.entries.pop_first()?;
        self.index.remove(&id);
        Some((id, value))
    }

    pub(super) fn remove(&mut self, id: RequestId) -> Option<T> {
        let slot = self.index.remove(&id)?;
        self.entries.remove(&slot).map(|(_, value)| value)
    }

    pub(super) fn drain(&mut self) -> Vec<(RequestId, T)> {
        self.index.clear();
        std::mem::take(&mut self.entries).into_values().collect()
    }

    pub(super) fn len(&self) -> usize {
        self.entries.len()
    }

    #[cfg(test)]
    pub(super) fn order(&self) -> Vec<RequestId> {
        self.entries.values().map(|(id, _)| *id).collect()
    }
}
