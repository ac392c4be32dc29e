//! Rolling weight history.
//!
//! Entries are appended in arrival order and only dropped lazily, when a
//! read purges everything that has left the window.

use std::collections::VecDeque;
use std::time::Duration;

use tokio::time::Instant;

/// One unit of spent budget.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WeightEntry {
    pub timestamp: Instant,
    pub weight: u32,
}

/// Insertion-ordered weight history for one window length.
#[derive(Debug)]
pub(crate) struct WeightHistory {
    entries: VecDeque<WeightEntry>,
    window: Duration,
}

impl WeightHistory {
    pub(crate) fn new(window: Duration) -> Self {
        Self {
            entries: VecDeque::new(),
            window,
        }
    }

    pub(crate) fn record(&mut self, timestamp: Instant, weight: u32) {
        self.entries.push_back(WeightEntry { timestamp, weight });
    }

    /// Drop entries with `timestamp <= now - window`.
    pub(crate) fn purge(&mut self, now: Instant) -> usize {
        let Some(cutoff) = now.checked_sub(self.window) else {
            return 0;
        };
        let before = self.entries.len();
        self.entries.retain(|e| e.timestamp > cutoff);
        before - self.entries.len()
    }

    /// Purge, then sum what is left in the window.
    pub(crate) fn current_weight(&mut self, now: Instant) -> u64 {
        self.purge(now);
        self.entries.iter().map(|e| u64::from(e.weight)).sum()
    }

    /// Earliest instant at which at least `deficit` weight has aged out.
    ///
    /// Walks the live entries oldest first and stops at the first entry whose
    /// expiry covers the deficit. When the deficit exceeds everything in the
    /// window, returns the expiry of the newest entry. `None` when empty.
    pub(crate) fn release_instant(&mut self, deficit: u64, now: Instant) -> Option<Instant> {
        self.purge(now);

        let mut sorted: Vec<WeightEntry> = self.entries.iter().copied().collect();
        sorted.sort_by_key(|e| e.timestamp);

        let mut freed = 0u64;
        for entry in &sorted {
            freed += u64::from(entry.weight);
            if freed >= deficit {
                return Some(entry.timestamp + self.window);
            }
        }

        sorted.last().map(|e| e.timestamp + self.window)
    }

    pub(crate) fn len(&self) -> usize {
        self.entries.len()
    }
}
