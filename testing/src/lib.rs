//! # Fetchkit Testing
//!
//! Testing utilities and helpers for the fetchkit request pipeline.
//!
//! This crate provides:
//! - [`MockClient`]: a scripted transport classifying canned responses the
//!   same way the HTTP transport does
//! - Deterministic clocks ([`FixedClock`], [`ManualClock`])
//! - [`RecordingSink`]: an analytics sink capturing log entries
//! - [`init_test_tracing`]: tracing output for tests
//!
//! ## Example
//!
//! ```ignore
//! use fetchkit_testing::{MockClient, MockResponse};
//! use fetchkit_runtime::Repository;
//!
//! #[tokio::test]
//! async fn test_profile_flow() {
//!     let client = MockClient::new();
//!     client.push_response(MockResponse::json(200, &serde_json::json!({"id": "1"})));
//!
//!     let repository = Repository::<ProfileRequest, _>::new(client.clone());
//!     let outcome = repository.request_default(false).await;
//!
//!     assert!(outcome.is_success());
//!     assert_eq!(client.call_count(), 1);
//! }
//! ```

use chrono::{DateTime, Utc};
use fetchkit_core::environment::Clock;

/// Scripted transport
pub mod mock_client;

/// Analytics sink capturing entries
pub mod recording_sink;

/// Mock implementations of environment traits.
pub mod mocks {
    use super::{Clock, DateTime, Utc};
    use std::sync::{Mutex, PoisonError};
    use std::time::Duration;

    /// Fixed clock for deterministic tests
    ///
    /// Always returns the same time, making tests reproducible.
    ///
    /// # Example
    ///
    /// ```
    /// use fetchkit_testing::mocks::FixedClock;
    /// use fetchkit_core::environment::Clock;
    /// use chrono::Utc;
    ///
    /// let clock = FixedClock::new(Utc::now());
    /// assert_eq!(clock.now(), clock.now());
    /// ```
    #[derive(Debug, Clone)]
    pub struct FixedClock {
        time: DateTime<Utc>,
    }

    impl FixedClock {
        /// Create a new fixed clock with the given time
        #[must_use]
        pub const fn new(time: DateTime<Utc>) -> Self {
            Self { time }
        }
    }

    impl Clock for FixedClock {
        fn now(&self) -> DateTime<Utc> {
            self.time
        }
    }

    /// Clock that only moves when told to.
    ///
    /// Used to step response-cache entries past their TTL.
    #[derive(Debug)]
    pub struct ManualClock {
        time: Mutex<DateTime<Utc>>,
    }

    impl ManualClock {
        /// Create a clock starting at `time`
        #[must_use]
        pub const fn new(time: DateTime<Utc>) -> Self {
            Self {
                time: Mutex::new(time),
            }
        }

        /// Move the clock forward by `by`. Durations beyond chrono's range
        /// are ignored.
        pub fn advance(&self, by: Duration) {
            if let Ok(delta) = chrono::Duration::from_std(by) {
                let mut time = self.time.lock().unwrap_or_else(PoisonError::into_inner);
                *time += delta;
            }
        }

        /// Jump to `time`
        pub fn set(&self, time: DateTime<Utc>) {
            *self.time.lock().unwrap_or_else(PoisonError::into_inner) = time;
        }
    }

    impl Clock for ManualClock {
        fn now(&self) -> DateTime<Utc> {
            *self.time.lock().unwrap_or_else(PoisonError::into_inner)
        }
    }

    /// Create a default fixed clock for tests (2025-01-01 00:00:00 UTC)
    ///
    /// # Panics
    ///
    /// This function will panic if the hardcoded timestamp fails to parse,
    /// which should never happen in practice.
    #[must_use]
    #[allow(clippy::expect_used)]
    pub fn test_clock() -> FixedClock {
        FixedClock::new(
            DateTime::parse_from_rfc3339("2025-01-01T00:00:00Z")
                .expect("hardcoded timestamp should always parse")
                .with_timezone(&Utc),
        )
    }
}

/// Install a `fmt` subscriber writing through the test harness.
///
/// Filtered by `RUST_LOG`, defaulting to `warn`. Safe to call from every
/// test; only the first call installs anything.
pub fn init_test_tracing() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_test_writer()
        .try_init();
}

// Re-export commonly used items
pub use mock_client::{MockClient, MockResponse};
pub use mocks::{FixedClock, ManualClock, test_clock};
pub use recording_sink::RecordingSink;

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_fixed_clock() {
        let clock = test_clock();
        let time1 = clock.now();
        let time2 = clock.now();
        assert_eq!(time1, time2);
    }

    #[test]
    fn test_manual_clock_advances() {
        let start = test_clock().now();
        let clock = ManualClock::new(start);
        clock.advance(Duration::from_secs(90));
        assert_eq!((clock.now() - start).num_seconds(), 90);

        clock.set(start);
        assert_eq!(clock.now(), start);
    }

    #[test]
    fn test_init_tracing_twice() {
        init_test_tracing();
        init_test_tracing();
    }
}
