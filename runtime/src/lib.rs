//! # Fetchkit Runtime
//!
//! Runtime implementation of the fetchkit request pipeline.
//!
//! This crate executes the descriptors defined in `fetchkit-core` and keeps
//! per-feature state built from their responses.
//!
//! ## Core Components
//!
//! - **`HttpClient`**: transport over `reqwest`, with test data, fault
//!   injection and a response cache
//! - **`Repository`**: facade running one descriptor type through a client
//! - **`Usecase`**: per-feature state (input, output cache, cursor, last id)
//! - **`UsecaseRegistry`**: one usecase per type signature, plus the session
//!   invalidation broadcast they all listen to
//!
//! ## Example
//!
//! ```ignore
//! use fetchkit_runtime::{ClientConfig, Repository, UsecaseRegistry};
//!
//! let registry = UsecaseRegistry::new(ClientConfig::from_env()?);
//! let client = registry.http_client();
//!
//! let notes = registry.usecase_with::<_, NotesMapper, NotesInput, Note, _>(|| {
//!     Repository::<NotesRequest, _>::new(client.clone())
//! });
//! let page = notes.request(NotesParameters::first_page(), EmptyPathComponent).await?;
//! ```

/// Analytics fan-out to tracing and registered sinks
pub mod analytics;

/// Response cache with TTL
pub mod cache;

/// Environment-based configuration
pub mod config;

/// JSON decoding of response bodies
pub mod decode;

/// Prometheus metrics for observability
pub mod metrics;

/// Lookup-or-create registry of usecases
pub mod registry;

/// Repository facade over a transport
pub mod repository;

/// Session invalidation broadcast
pub mod session;

/// Fixture loading for test data
pub mod test_data;

/// HTTP transport
pub mod transport;

/// Stateful per-feature usecase
pub mod usecase;

pub use analytics::Analytics;
pub use cache::ResponseCache;
pub use config::{ClientConfig, ConfigError};
pub use registry::{TypeSignature, UsecaseRegistry};
pub use repository::{Repo, Repository};
pub use session::{SessionInvalidated, SessionSignal, SessionSubscription};
pub use test_data::TestDataLoader;
pub use transport::HttpClient;
pub use usecase::{Usecase, UsecaseSnapshot};
