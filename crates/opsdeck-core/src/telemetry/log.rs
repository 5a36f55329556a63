//! Bounded, append-only event log.

use crate::types::LogEntry;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

/// Maximum number of entries retained.
pub const LOG_CAPACITY: usize = 30;

/// Ordered log that keeps only the most recent [`LOG_CAPACITY`] entries.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LogBuffer {
    entries: VecDeque<LogEntry>,
}

impl LogBuffer {
    pub fn new() -> Self {
        Self {
            entries: VecDeque::with_capacity(LOG_CAPACITY + 1),
        }
    }

    /// Append an entry, dropping the oldest ones once over capacity.
    pub fn push(&mut self, entry: LogEntry) {
        self.entries.push_back(entry);
        while self.entries.len() > LOG_CAPACITY {
            self.entries.pop_front();
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entries oldest first.
    pub fn iter(&self) -> impl Iterator<Item = &LogEntry> {
        self.entries.iter()
    }

    pub fn latest(&self) -> Option<&LogEntry> {
        self.entries.back()
    }

    pub fn to_vec(&self) -> Vec<LogEntry> {
        self.entries.iter().cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::LogKind;

    #[test]
    fn test_push_within_capacity() {
        let mut log = LogBuffer::new();
        log.push(LogEntry::new("a", LogKind::Info));
        log.push(LogEntry::new("b", LogKind::Warn));

        assert_eq!(log.len(), 2);
        assert_eq!(log.latest().unwrap().message, "b");
    }

    #[test]
    fn test_overflow_drops_oldest_in_order() {
        let mut log = LogBuffer::new();
        for i in 0..31 {
            log.push(LogEntry::new(format!("entry-{}", i), LogKind::Info));
        }

        assert_eq!(log.len(), LOG_CAPACITY);
        assert!(log.iter().all(|e| e.message != "entry-0"));

        let messages: Vec<_> = log.iter().map(|e| e.message.clone()).collect();
        let expected: Vec<_> = (1..31).map(|i| format!("entry-{}", i)).collect();
        assert_eq!(messages, expected);
    }

    #[test]
    fn test_length_never_exceeds_capacity() {
        let mut log = LogBuffer::new();
        for i in 0..100 {
            log.push(LogEntry::new(i.to_string(), LogKind::Net));
            assert!(log.len() <= LOG_CAPACITY);
        }
        assert_eq!(log.latest().unwrap().message, "99");
    }
}
