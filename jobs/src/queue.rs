use std::collections::VecDeque;

use stonecut_core::compute::Priority;

/// Waiting jobs ordered by priority, FIFO among equal priorities.
pub(crate) struct JobQueue<T> {
    items: VecDeque<(Priority, T)>,
}

impl<T> JobQueue<T> {
    pub(crate) fn new() -> Self {
        Self {
            items: VecDeque::new(),
        }
    }

    pub(crate) fn len(&self) -> usize {
        self.items.len()
    }

    /// Inserts behind every queued item of equal or higher urgency.
    pub(crate) fn push(&mut self, priority: Priority, item: T) {
        let at = self.items.partition_point(|(queued, _)| *queued <= priority);
        self.items.insert(at, (priority, item));
    }

    /// Puts an item back at the head of its priority band.
    pub(crate) fn push_front(&mut self, priority: Priority, item: T) {
        let at = self.items.partition_point(|(queued, _)| *queued < priority);
        self.items.insert(at, (priority, item));
    }

    pub(crate) fn pop(&mut self) -> Option<(Priority, T)> {
        self.items.pop_front()
    }

    /// Removes every item matching `remove`, returning them in queue order.
    pub(crate) fn drain_where(&mut self, mut remove: impl FnMut(&T) -> bool) -> Vec<T> {
        let mut removed = Vec::new();
        let mut kept = VecDeque::with_capacity(self.items.len());
        for (priority, item) in self.items.drain(..) {
            if remove(&item) {
                removed.push(item);
            } else {
                kept.push_back((priority, item));
            }
        }
        self.items = kept;
        removed
    }

    pub(crate) fn drain(&mut self) -> Vec<T> {
        self.items.drain(..).map(|(_, item)| item).collect()
    }
}
