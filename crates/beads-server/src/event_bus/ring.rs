use super::hub::HubEvent;

/// Fixed-capacity circular history of the most recently broadcast events.
///
/// Not synchronized on its own; the Hub keeps it behind a lock separate from
/// the subscriber registry.
#[derive(Debug)]
pub struct EventRing {
    slots: Vec<HubEvent>,
    capacity: usize,
    /// Next slot to overwrite once the ring is full
    cursor: usize,
}

impl EventRing {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            slots: Vec::with_capacity(capacity),
            capacity,
            cursor: 0,
        }
    }

    /// Append an event, evicting the oldest one when full.
    pub fn append(&mut self, event: HubEvent) {
        if self.slots.len() < self.capacity {
            self.slots.push(event);
        } else {
            self.slots[self.cursor] = event;
        }
        self.cursor = (self.cursor + 1) % self.capacity;
    }

    /// Every retained event with a sequence strictly greater than `last_id`,
    /// oldest first.
    ///
    /// A `last_id` that has already been evicted is not an error: the caller
    /// simply gets everything still retained.
    pub fn since(&self, last_id: u64) -> Vec<HubEvent> {
        self.iter()
            .filter(|event| event.sequence > last_id)
            .cloned()
            .collect()
    }

    /// Retained events, oldest first.
    pub fn iter(&self) -> impl Iterator<Item = &HubEvent> {
        let start = if self.slots.len() < self.capacity {
            0
        } else {
            self.cursor
        };
        let (newer, older) = self.slots.split_at(start);
        older.iter().chain(newer.iter())
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn oldest_sequence(&self) -> Option<u64> {
        self.iter().next().map(|event| event.sequence)
    }
}
