//! Scripted transport for tests.
//!
//! [`MockClient`] answers calls from a queue of canned responses instead of
//! the network. Everything before the network step behaves exactly as in
//! [`HttpClient`](fetchkit_runtime::HttpClient): fixtures, build failures,
//! fault injection and forced status codes. Canned responses are classified
//! by the same rules as real ones.

#![allow(clippy::missing_panics_doc)]

use fetchkit_core::client::Client;
use fetchkit_core::error::ApiError;
use fetchkit_core::outcome::TransportOutcome;
use fetchkit_core::request::{BuiltRequest, Request};
use fetchkit_runtime::test_data::TestDataLoader;
use fetchkit_runtime::transport::{classify, forced_status, preflight};
use serde::Serialize;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

/// One canned answer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MockResponse {
    /// An HTTP response, classified by status
    Http {
        /// Status code
        status_code: u16,
        /// Response headers
        headers: Vec<(String, String)>,
        /// Raw body
        body: Vec<u8>,
    },
    /// A failure without a response (offline, timeout, ...)
    Failure(ApiError),
}

impl MockResponse {
    /// Response with a raw body
    #[must_use]
    pub fn new(status_code: u16, body: impl Into<Vec<u8>>) -> Self {
        Self::Http {
            status_code,
            headers: Vec::new(),
            body: body.into(),
        }
    }

    /// Response with `value` serialized as the JSON body
    #[must_use]
    pub fn json<T: Serialize + ?Sized>(status_code: u16, value: &T) -> Self {
        let body = serde_json::to_vec(value).unwrap_or_default();
        Self::new(status_code, body).with_header("Content-Type", "application/json")
    }

    /// Failure without a response
    #[must_use]
    pub const fn failure(error: ApiError) -> Self {
        Self::Failure(error)
    }

    /// Add a response header. No effect on failures.
    #[must_use]
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        if let Self::Http { headers, .. } = &mut self {
            headers.push((name.into(), value.into()));
        }
        self
    }
}

#[derive(Debug, Default)]
struct MockState {
    script: VecDeque<MockResponse>,
    calls: Vec<BuiltRequest>,
}

/// Transport answering from a script.
///
/// Clones share the script and the call log. A call that reaches the network
/// step with an empty script fails with [`ApiError::Unknown`].
#[derive(Debug, Clone, Default)]
pub struct MockClient {
    state: Arc<Mutex<MockState>>,
    fixtures: TestDataLoader,
    latency: Option<Duration>,
}

impl MockClient {
    /// Create a client with an empty script
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Resolve fixtures with `fixtures` instead of the working directory
    #[must_use]
    pub fn with_fixtures(mut self, fixtures: TestDataLoader) -> Self {
        self.fixtures = fixtures;
        self
    }

    /// Delay every network answer by `latency`
    #[must_use]
    pub const fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    /// Queue an answer
    pub fn push_response(&self, response: MockResponse) -> &Self {
        self.lock().script.push_back(response);
        self
    }

    /// Queue a failure without a response
    pub fn push_failure(&self, error: ApiError) -> &Self {
        self.push_response(MockResponse::failure(error))
    }

    /// Answers not consumed yet
    #[must_use]
    pub fn remaining(&self) -> usize {
        self.lock().script.len()
    }

    /// Calls that reached the network step, oldest first
    #[must_use]
    pub fn calls(&self) -> Vec<BuiltRequest> {
        self.lock().calls.clone()
    }

    /// Number of calls that reached the network step
    #[must_use]
    pub fn call_count(&self) -> usize {
        self.lock().calls.len()
    }

    fn lock(&self) -> MutexGuard<'_, MockState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Client for MockClient {
    async fn execute<R: Request>(
        &self,
        request: &R,
        use_test_data: bool,
    ) -> TransportOutcome<R::Response> {
        if use_test_data {
            let result = self.fixtures.load(request.test_data_path()).await;
            return TransportOutcome {
                result,
                metadata: None,
            };
        }

        let built = match preflight(request) {
            Ok(built) => built,
            Err(error) => return TransportOutcome::failure(error),
        };
        if let Some(outcome) = forced_status(request) {
            return outcome;
        }

        let answer = {
            let mut state = self.lock();
            state.calls.push(built);
            state.script.pop_front()
        };

        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }

        match answer {
            Some(MockResponse::Http {
                status_code,
                headers,
                body,
            }) => classify(request, status_code, headers, &body),
            Some(MockResponse::Failure(error)) => TransportOutcome::failure(error),
            None => {
                tracing::warn!(
                    request = std::any::type_name::<R>(),
                    "MockClient script exhausted"
                );
                TransportOutcome::failure(ApiError::Unknown)
            }
        }
    }
}
