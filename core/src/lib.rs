//! # Fetchkit Core
//!
//! Core traits and types for the fetchkit request pipeline.
//!
//! This crate defines the vocabulary shared by every layer of the pipeline,
//! without performing any I/O itself.
//!
//! ## Core Concepts
//!
//! - **Request**: a descriptor of one kind of call ([`request::Request`])
//! - **Client**: the transport that executes descriptors ([`client::Client`])
//! - **Outcome**: the typed result of a call plus exchange metadata
//!   ([`outcome::TransportOutcome`])
//! - **Errors**: transport-level [`error::ApiError`] and application-level
//!   [`error::AppError`]
//! - **Mapper / Entity**: turn responses into cached feature state
//!   ([`mapper::Mapper`], [`mapper::OutputCache`])
//! - **Environment**: injected collaborators ([`environment::Clock`],
//!   [`environment::AnalyticsSink`])
//!
//! ## Data Flow
//!
//! ```text
//! parameters + path ──► Request ──► Client ──► TransportOutcome
//!                                                  │
//!                                                  ▼
//!                              Mapper ──► OutputCache (per feature)
//! ```

pub mod error;
pub mod loading;
pub mod mapper;
pub mod outcome;
pub mod request;

// Re-export commonly used types
pub use error::{ApiError, AppError};
pub use loading::LoadingState;
pub use mapper::{EmptyMapper, Entity, MappedOutput, Mapper, OutputCache};
pub use outcome::{ResponseMetadata, TransportOutcome};
pub use request::{
    BuiltRequest, EmptyParameters, EmptyPathComponent, EmptyResponse, HttpMethod, QueryItem,
    Request,
};

/// Environment module - Dependency injection traits
///
/// Collaborators the pipeline talks to but does not own. Production code
/// passes real implementations; tests pass the fixed ones from
/// `fetchkit-testing`.
pub mod environment {
    use chrono::{DateTime, Utc};
    use std::fmt;
    use std::panic::Location;

    /// Clock trait - abstracts time operations for testability
    ///
    /// # Examples
    ///
    /// ```ignore
    /// // Production - uses system clock
    /// struct SystemClock;
    /// impl Clock for SystemClock {
    ///     fn now(&self) -> DateTime<Utc> {
    ///         Utc::now()
    ///     }
    /// }
    /// ```
    pub trait Clock: Send + Sync {
        /// Get the current time
        fn now(&self) -> DateTime<Utc>;
    }

    /// Clock backed by the system time.
    #[derive(Debug, Clone, Copy, Default)]
    pub struct SystemClock;

    impl Clock for SystemClock {
        fn now(&self) -> DateTime<Utc> {
            Utc::now()
        }
    }

    /// Severity of an analytics log entry.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
    pub enum Severity {
        /// Diagnostic detail (curl lines, cache hits)
        Debug,
        /// Normal progress
        Info,
        /// Classified failure
        Warning,
        /// Transport-level error
        Error,
    }

    impl fmt::Display for Severity {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            match self {
                Self::Debug => write!(f, "debug"),
                Self::Info => write!(f, "info"),
                Self::Warning => write!(f, "warning"),
                Self::Error => write!(f, "error"),
            }
        }
    }

    /// Source location that produced a log entry.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct CallSite {
        /// Source file
        pub file: &'static str,
        /// Line number
        pub line: u32,
    }

    impl CallSite {
        /// Location of the caller of the enclosing `#[track_caller]` function.
        #[must_use]
        #[track_caller]
        pub fn caller() -> Self {
            Self::from(Location::caller())
        }
    }

    impl From<&'static Location<'static>> for CallSite {
        fn from(location: &'static Location<'static>) -> Self {
            Self {
                file: location.file(),
                line: location.line(),
            }
        }
    }

    impl fmt::Display for CallSite {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            let file = self.file.rsplit(['/', '\\']).next().unwrap_or(self.file);
            write!(f, "{file} L:{}", self.line)
        }
    }

    /// One `(message, severity, call site)` record.
    #[derive(Debug, Clone, PartialEq, Eq)]
    pub struct LogEntry {
        /// Log text
        pub message: String,
        /// Severity
        pub severity: Severity,
        /// Where the entry was produced
        pub call_site: CallSite,
    }

    /// Analytics / log collaborator.
    ///
    /// Implementations must return quickly and must not fail; the pipeline
    /// never waits on or inspects the result of a record.
    pub trait AnalyticsSink: Send + Sync {
        /// Record one entry.
        fn record(&self, entry: &LogEntry);
    }
}

/// Client module - the transport abstraction
pub mod client {
    use crate::outcome::TransportOutcome;
    use crate::request::Request;
    use std::future::Future;

    /// Executes request descriptors.
    ///
    /// An implementation classifies every failure into exactly one
    /// [`ApiError`](crate::error::ApiError) and never retries.
    pub trait Client: Send + Sync + 'static {
        /// Execute `request`, serving its fixture instead when
        /// `use_test_data` is set.
        fn execute<R: Request>(
            &self,
            request: &R,
            use_test_data: bool,
        ) -> impl Future<Output = TransportOutcome<R::Response>> + Send;
    }
}

pub use client::Client;

#[cfg(test)]
mod tests {
    use super::environment::{CallSite, Severity};

    #[test]
    fn test_call_site_display_strips_directories() {
        let site = CallSite {
            file: "runtime/src/transport.rs",
            line: 42,
        };
        assert_eq!(site.to_string(), "transport.rs L:42");
    }

    #[test]
    fn test_call_site_caller_points_here() {
        let site = CallSite::caller();
        assert!(site.file.ends_with("lib.rs"));
        assert!(site.line > 0);
    }

    #[test]
    fn test_severity_ordering() {
        assert!(Severity::Error > Severity::Warning);
        assert!(Severity::Debug < Severity::Info);
        assert_eq!(Severity::Warning.to_string(), "warning");
    }
}
