//! Bounded Ring Buffers
//!
//! Fixed-capacity, insertion-ordered stores used for the message and exception
//! panels. Both evict the oldest entry on overflow; they differ in which end
//! new entries enter:
//!
//! - [`RingOrder::Fifo`]: appended at the back, iterated oldest to newest
//!   (the message panel, "last N seen")
//! - [`RingOrder::NewestFirst`]: pushed at the front, iterated newest to
//!   oldest (the exception panel)

use std::collections::VecDeque;

/// Which end of the ring receives new entries
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RingOrder {
    /// New entries at the back, eviction from the front
    Fifo,
    /// New entries at the front, eviction from the back
    NewestFirst,
}

/// A bounded buffer that never holds more than `capacity` entries
#[derive(Clone, Debug)]
pub struct Ring<T> {
    entries: VecDeque<T>,
    capacity: usize,
    order: RingOrder,
}

impl<T> Ring<T> {
    /// Create an empty ring
    #[must_use]
    pub fn new(capacity: usize, order: RingOrder) -> Self {
        Self {
            entries: VecDeque::with_capacity(capacity),
            capacity,
            order,
        }
    }

    /// Ring iterated oldest to newest
    #[must_use]
    pub fn fifo(capacity: usize) -> Self {
        Self::new(capacity, RingOrder::Fifo)
    }

    /// Ring iterated newest to oldest
    #[must_use]
    pub fn newest_first(capacity: usize) -> Self {
        Self::new(capacity, RingOrder::NewestFirst)
    }

    /// Insert an entry, evicting the oldest when full
    pub fn push(&mut self, entry: T) {
        if self.capacity == 0 {
            return;
        }
        match self.order {
            RingOrder::Fifo => self.entries.push_back(entry),
            RingOrder::NewestFirst => self.entries.push_front(entry),
        }
        self.evict_overflow();
    }

    /// Change capacity without discarding entries that still fit
    ///
    /// Shrinking evicts oldest entries first; growing only makes room.
    pub fn resize(&mut self, capacity: usize) {
        self.capacity = capacity;
        self.evict_overflow();
    }

    /// Entries in display order
    pub fn iter(&self) -> impl Iterator<Item = &T> {
        self.entries.iter()
    }

    /// Number of entries held
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the ring holds nothing
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Maximum number of entries
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    fn evict_overflow(&mut self) {
        while self.entries.len() > self.capacity {
            match self.order {
                RingOrder::Fifo => self.entries.pop_front(),
                RingOrder::NewestFirst => self.entries.pop_back(),
            };
        }
    }
}
