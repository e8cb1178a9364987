//! Where `Debug.Log` records end up.
//!
//! Records are kept in a bounded ring so tests and tools can inspect what
//! scripts logged, and each one is mirrored to `tracing` under the
//! `keel::script` target at the matching level.

use std::collections::VecDeque;

use keel_bridge::LogSeverity;

/// One script log record.
#[derive(Debug, Clone, PartialEq)]
pub struct LogRecord {
    pub severity: LogSeverity,
    pub message: String,
}

/// Bounded ring of [`LogRecord`]s. The oldest record is dropped when full.
#[derive(Debug)]
pub struct LogSink {
    records: VecDeque<LogRecord>,
    capacity: usize,
    dropped: u64,
}

impl LogSink {
    /// A capacity of zero keeps nothing but still mirrors to `tracing`.
    pub fn new(capacity: usize) -> Self {
        Self {
            records: VecDeque::with_capacity(capacity.min(4096)),
            capacity,
            dropped: 0,
        }
    }

    pub fn push(&mut self, severity: LogSeverity, message: String) {
        match severity {
            LogSeverity::Info => tracing::info!(target: "keel::script", "{message}"),
            LogSeverity::Warning => tracing::warn!(target: "keel::script", "{message}"),
            LogSeverity::Error => tracing::error!(target: "keel::script", "{message}"),
        }
        if self.capacity == 0 {
            self.dropped += 1;
            return;
        }
        if self.records.len() == self.capacity {
            self.records.pop_front();
            self.dropped += 1;
        }
        self.records.push_back(LogRecord { severity, message });
    }

    /// Retained records, oldest first.
    pub fn records(&self) -> impl Iterator<Item = &LogRecord> {
        self.records.iter()
    }

    pub fn last(&self) -> Option<&LogRecord> {
        self.records.back()
    }

    /// Remove and return every retained record.
    pub fn drain(&mut self) -> Vec<LogRecord> {
        self.records.drain(..).collect()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Records evicted or never retained because the ring was full.
    pub fn dropped(&self) -> u64 {
        self.dropped
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keeps_newest_records() {
        let mut sink = LogSink::new(2);
        sink.push(LogSeverity::Info, "one".into());
        sink.push(LogSeverity::Warning, "two".into());
        sink.push(LogSeverity::Error, "three".into());

        let messages: Vec<&str> = sink.records().map(|r| r.message.as_str()).collect();
        assert_eq!(messages, ["two", "three"]);
        assert_eq!(sink.dropped(), 1);
        assert_eq!(sink.last().unwrap().severity, LogSeverity::Error);
    }

    #[test]
    fn drain_empties_the_ring() {
        let mut sink = LogSink::new(8);
        sink.push(LogSeverity::Info, "a".into());
        assert_eq!(sink.drain().len(), 1);
        assert!(sink.is_empty());
    }

    #[test]
    fn zero_capacity_retains_nothing() {
        let mut sink = LogSink::new(0);
        sink.push(LogSeverity::Info, "a".into());
        assert!(sink.is_empty());
        assert_eq!(sink.dropped(), 1);
    }
}
