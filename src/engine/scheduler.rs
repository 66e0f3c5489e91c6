//! Due-time scheduler with deterministic ordering.
//!
//! Implements a priority queue that ensures:
//! - Entries are processed in due-time order
//! - Ties are broken by component priority (higher runs first)
//! - Remaining ties are broken by insertion order (sequence number)

use std::cmp::Reverse;
use std::collections::BinaryHeap;

use serde::{Deserialize, Serialize};

use crate::engine::SimTime;

/// A scheduled component advance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScheduledEntry {
    /// Due time of the advance.
    pub due: SimTime,
    /// Component priority; higher runs first on equal due times.
    pub priority: i32,
    /// Sequence number for FIFO tie-breaking.
    pub seq: u64,
    /// Name of the component to advance.
    pub component: String,
}

impl PartialOrd for ScheduledEntry {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for ScheduledEntry {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        // Due time ascending, then priority descending, then sequence
        // ascending. Total order, so equal-priority equal-time entries
        // come out in insertion order.
        self.due
            .cmp(&other.due)
            .then_with(|| other.priority.cmp(&self.priority))
            .then_with(|| self.seq.cmp(&other.seq))
    }
}

/// Priority-ordered queue of pending component advances.
#[derive(Debug, Default)]
pub struct EventScheduler {
    /// Min-heap ordered by (due, -priority, seq).
    queue: BinaryHeap<Reverse<ScheduledEntry>>,
    /// Monotonic sequence counter for tie-breaking.
    sequence: u64,
}

impl EventScheduler {
    /// Create a new scheduler.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Schedule a component advance at the given due time.
    pub fn schedule(&mut self, due: SimTime, priority: i32, component: impl Into<String>) {
        let seq = self.sequence;
        self.sequence += 1;

        self.queue.push(Reverse(ScheduledEntry {
            due,
            priority,
            seq,
            component: component.into(),
        }));
    }

    /// Pop the earliest scheduled entry.
    pub fn pop(&mut self) -> Option<ScheduledEntry> {
        self.queue.pop().map(|Reverse(entry)| entry)
    }

    /// Put a popped entry back, preserving its original sequence number.
    pub fn requeue(&mut self, entry: ScheduledEntry) {
        self.queue.push(Reverse(entry));
    }

    /// Due time of the earliest entry without removing it.
    #[must_use]
    pub fn peek_due(&self) -> Option<SimTime> {
        self.queue.peek().map(|Reverse(entry)| entry.due)
    }

    /// Number of pending entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.queue.len()
    }

    /// True when no entries are pending.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    /// Drop all pending entries and reset the sequence counter.
    pub fn clear(&mut self) {
        self.queue.clear();
        self.sequence = 0;
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_pop_in_time_order() {
        let mut s = EventScheduler::new();
        s.schedule(SimTime::from_secs(2.0), 0, "b");
        s.schedule(SimTime::from_secs(1.0), 0, "a");
        s.schedule(SimTime::from_secs(3.0), 0, "c");

        assert_eq!(s.pop().unwrap().component, "a");
        assert_eq!(s.pop().unwrap().component, "b");
        assert_eq!(s.pop().unwrap().component, "c");
        assert!(s.pop().is_none());
    }

    #[test]
    fn test_equal_time_higher_priority_first() {
        let mut s = EventScheduler::new();
        s.schedule(SimTime::from_secs(1.0), 1, "low");
        s.schedule(SimTime::from_secs(1.0), 5, "high");

        assert_eq!(s.pop().unwrap().component, "high");
        assert_eq!(s.pop().unwrap().component, "low");
    }

    #[test]
    fn test_equal_time_equal_priority_fifo() {
        let mut s = EventScheduler::new();
        s.schedule(SimTime::from_secs(1.0), 0, "first");
        s.schedule(SimTime::from_secs(1.0), 0, "second");
        s.schedule(SimTime::from_secs(1.0), 0, "third");

        assert_eq!(s.pop().unwrap().component, "first");
        assert_eq!(s.pop().unwrap().component, "second");
        assert_eq!(s.pop().unwrap().component, "third");
    }

    #[test]
    fn test_requeue_preserves_order() {
        let mut s = EventScheduler::new();
        s.schedule(SimTime::from_secs(1.0), 0, "a");
        s.schedule(SimTime::from_secs(1.0), 0, "b");

        let first = s.pop().unwrap();
        s.requeue(first);
        // "a" kept its original sequence number, so it still leads.
        assert_eq!(s.pop().unwrap().component, "a");
    }

    #[test]
    fn test_peek_due() {
        let mut s = EventScheduler::new();
        assert!(s.peek_due().is_none());
        s.schedule(SimTime::from_secs(2.5), 0, "a");
        assert_eq!(s.peek_due(), Some(SimTime::from_secs(2.5)));
        assert_eq!(s.len(), 1);
    }

    #[test]
    fn test_clear() {
        let mut s = EventScheduler::new();
        s.schedule(SimTime::from_secs(1.0), 0, "a");
        s.clear();
        assert!(s.is_empty());
    }
}
