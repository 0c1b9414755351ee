//! Analytics sink that keeps every entry for later assertions.

#![allow(clippy::missing_panics_doc)]

use fetchkit_core::environment::{AnalyticsSink, LogEntry, Severity};
use std::sync::{Arc, Mutex, PoisonError};

/// Captures analytics entries in memory.
///
/// Clones share the same buffer, so a test can hand one clone to the
/// pipeline and inspect another.
///
/// # Example
///
/// ```
/// use fetchkit_testing::RecordingSink;
/// use fetchkit_runtime::Analytics;
/// use fetchkit_core::environment::Severity;
/// use std::sync::Arc;
///
/// let sink = RecordingSink::new();
/// let analytics = Analytics::new().with_sink(Arc::new(sink.clone()));
/// analytics.log("hello", Severity::Info);
/// assert_eq!(sink.messages(), vec!["hello".to_string()]);
/// ```
#[derive(Debug, Clone, Default)]
pub struct RecordingSink {
    entries: Arc<Mutex<Vec<LogEntry>>>,
}

impl RecordingSink {
    /// Create an empty sink
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Every recorded entry, oldest first
    #[must_use]
    pub fn entries(&self) -> Vec<LogEntry> {
        self.lock().clone()
    }

    /// Messages of every recorded entry, oldest first
    #[must_use]
    pub fn messages(&self) -> Vec<String> {
        self.lock().iter().map(|entry| entry.message.clone()).collect()
    }

    /// Messages recorded at `severity`
    #[must_use]
    pub fn messages_at(&self, severity: Severity) -> Vec<String> {
        self.lock()
            .iter()
            .filter(|entry| entry.severity == severity)
            .map(|entry| entry.message.clone())
            .collect()
    }

    /// Whether any message contains `needle`
    #[must_use]
    pub fn contains(&self, needle: &str) -> bool {
        self.lock().iter().any(|entry| entry.message.contains(needle))
    }

    /// Number of recorded entries
    #[must_use]
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    /// Whether nothing was recorded
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Drop all recorded entries
    pub fn clear(&self) {
        self.lock().clear();
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<LogEntry>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl AnalyticsSink for RecordingSink {
    fn record(&self, entry: &LogEntry) {
        self.lock().push(entry.clone());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fetchkit_core::environment::CallSite;

    #[test]
    fn test_filters_by_severity() {
        let sink = RecordingSink::new();
        for (message, severity) in [("a", Severity::Debug), ("b", Severity::Error)] {
            sink.record(&LogEntry {
                message: message.to_string(),
                severity,
                call_site: CallSite::caller(),
            });
        }

        assert_eq!(sink.len(), 2);
        assert_eq!(sink.messages_at(Severity::Error), vec!["b".to_string()]);
        assert!(sink.contains("a"));

        sink.clear();
        assert!(sink.is_empty());
    }
}
