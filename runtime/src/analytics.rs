//! Analytics fan-out.
//!
//! [`Analytics`] is the pipeline's single logging port. Every entry is first
//! emitted as a `tracing` event and then handed to each registered
//! [`AnalyticsSink`]. Recording is fire-and-forget: nothing is returned and
//! nothing is awaited.

use fetchkit_core::environment::{AnalyticsSink, CallSite, LogEntry, Severity};
use std::fmt;
use std::sync::Arc;

/// Fan-out to analytics sinks, cheap to clone.
#[derive(Clone, Default)]
pub struct Analytics {
    sinks: Arc<Vec<Arc<dyn AnalyticsSink>>>,
}

impl fmt::Debug for Analytics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Analytics")
            .field("sinks", &self.sinks.len())
            .finish()
    }
}

impl Analytics {
    /// Analytics that only emits `tracing` events.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Analytics forwarding to the given sinks.
    #[must_use]
    pub fn with_sinks(sinks: Vec<Arc<dyn AnalyticsSink>>) -> Self {
        Self {
            sinks: Arc::new(sinks),
        }
    }

    /// Add a sink, keeping the existing ones.
    #[must_use]
    pub fn with_sink(&self, sink: Arc<dyn AnalyticsSink>) -> Self {
        let mut sinks = self.sinks.as_ref().clone();
        sinks.push(sink);
        Self::with_sinks(sinks)
    }

    /// Number of registered sinks.
    #[must_use]
    pub fn sink_count(&self) -> usize {
        self.sinks.len()
    }

    /// Record a message attributed to the caller's source location.
    #[track_caller]
    pub fn log(&self, message: impl Into<String>, severity: Severity) {
        self.record(&LogEntry {
            message: message.into(),
            severity,
            call_site: CallSite::caller(),
        });
    }

    /// Record a prepared entry.
    pub fn record(&self, entry: &LogEntry) {
        let file = entry.call_site.file;
        let line = entry.call_site.line;
        match entry.severity {
            Severity::Debug => tracing::debug!(file, line, "{}", entry.message),
            Severity::Info => tracing::info!(file, line, "{}", entry.message),
            Severity::Warning => tracing::warn!(file, line, "{}", entry.message),
            Severity::Error => tracing::error!(file, line, "{}", entry.message),
        }

        for sink in self.sinks.iter() {
            sink.record(entry);
        }
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use super::*;
    use std::sync::Mutex;

    #[derive(Default)]
    struct CollectingSink {
        entries: Mutex<Vec<LogEntry>>,
    }

    impl AnalyticsSink for CollectingSink {
        fn record(&self, entry: &LogEntry) {
            self.entries.lock().unwrap().push(entry.clone());
        }
    }

    #[test]
    fn test_log_reaches_every_sink() {
        let first = Arc::new(CollectingSink::default());
        let second = Arc::new(CollectingSink::default());
        let analytics = Analytics::new()
            .with_sink(first.clone())
            .with_sink(second.clone());
        assert_eq!(analytics.sink_count(), 2);

        analytics.log("curl -X GET 'https://example.com'", Severity::Debug);

        for sink in [&first, &second] {
            let entries = sink.entries.lock().unwrap();
            assert_eq!(entries.len(), 1);
            assert_eq!(entries[0].severity, Severity::Debug);
            assert!(entries[0].call_site.file.ends_with("analytics.rs"));
        }
    }

    #[test]
    fn test_without_sinks_is_noop() {
        let analytics = Analytics::new();
        analytics.log("nothing listens", Severity::Error);
        assert_eq!(analytics.sink_count(), 0);
    }
}
