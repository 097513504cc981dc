use std::collections::VecDeque;

use aisle_core::Location;

pub const HISTORY_CAPACITY: usize = 20;

/// A visited location; `None` is the catalog root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HistoryEntry {
    pub location: Option<Location>,
}

impl HistoryEntry {
    pub fn root() -> Self {
        Self { location: None }
    }

    pub fn at(location: Location) -> Self {
        Self {
            location: Some(location),
        }
    }
}

/// Bounded navigation history, oldest entry first.
///
/// Adjacent duplicates are never stored, and once full the oldest entry is
/// evicted before anything else happens, even when the new entry then turns
/// out to be a duplicate of the head.
#[derive(Debug, Clone)]
pub struct HistoryStack {
    entries: VecDeque<HistoryEntry>,
    capacity: usize,
}

impl HistoryStack {
    pub fn new() -> Self {
        Self::with_capacity(HISTORY_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            entries: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    pub fn append(&mut self, entry: HistoryEntry) {
        if self.entries.len() >= self.capacity {
            self.entries.pop_front();
        }
        if self.entries.back() != Some(&entry) {
            self.entries.push_back(entry);
        }
    }

    /// Drops the head and returns the entry beneath it. With one entry or
    /// none, returns the root without touching the stack.
    pub fn back(&mut self) -> HistoryEntry {
        if self.entries.len() <= 1 {
            return HistoryEntry::root();
        }
        self.entries.pop_back();
        self.peek()
    }

    pub fn peek(&self) -> HistoryEntry {
        self.entries
            .back()
            .cloned()
            .unwrap_or_else(HistoryEntry::root)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &HistoryEntry> {
        self.entries.iter()
    }
}

impl Default for HistoryStack {
    fn default() -> Self {
        Self::new()
    }
}
