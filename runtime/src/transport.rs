//! HTTP transport.
//!
//! [`HttpClient`] executes a [`Request`] descriptor and classifies whatever
//! happens into exactly one [`ApiError`]. Each call walks a fixed sequence and
//! stops at the first step that produces an outcome:
//!
//! ```text
//! use_test_data? ──yes──► fixture (TestDataLoader)
//!       │no
//!       ▼
//!   build() ──err──► InvalidRequest
//!       │
//!       ▼
//! forced auth / bad request / timeout ──► 401 / 400 / Timeout   (no I/O)
//!       │
//!       ▼
//! forced status ──► synthetic response, classified              (no I/O)
//!       │
//!       ▼
//! cache opt-in + live entry ──► decoded cached body              (no I/O)
//!       │
//!       ▼
//!   network ──► Timeout | Offline | Unknown | decode | ResponseError
//! ```
//!
//! Nothing is retried.

use crate::analytics::Analytics;
use crate::cache::ResponseCache;
use crate::config::ClientConfig;
use crate::decode::decode;
use crate::metrics::TransportMetrics;
use crate::session::SessionSignal;
use crate::test_data::TestDataLoader;
use fetchkit_core::client::Client;
use fetchkit_core::environment::Severity;
use fetchkit_core::error::ApiError;
use fetchkit_core::outcome::{ResponseMetadata, TransportOutcome};
use fetchkit_core::request::{BuiltRequest, HttpMethod, Request, SUCCESS_RANGE};
use std::any::type_name;
use std::future::Future;
use std::time::Instant;

/// Body of the synthetic response produced by a forced status code.
pub const FORCED_STATUS_BODY: &str = r#"{"messages":["Authentication token could not be verified."]}"#;

/// Fault-injection outcome for `request`, if one of its failing switches is
/// set. Checked in order: auth (401), bad request (400), timeout.
pub fn injected_fault<R: Request>(request: &R) -> Option<ApiError> {
    if request.fake_auth_error() {
        return Some(ApiError::ResponseError {
            status_code: 401,
            message: None,
        });
    }
    if request.fake_bad_request_error() {
        return Some(ApiError::ResponseError {
            status_code: 400,
            message: request.error_message(400),
        });
    }
    if request.fake_timeout_error() {
        return Some(ApiError::Timeout);
    }
    None
}

/// Build `request` and apply the fault-injection switches that fail without
/// any I/O.
///
/// # Errors
///
/// - [`ApiError::InvalidRequest`] if the call cannot be built
/// - the [`injected_fault`] of the request, if any
pub fn preflight<R: Request>(request: &R) -> Result<BuiltRequest, ApiError> {
    let built = request.build()?;
    injected_fault(request).map_or(Ok(built), Err)
}

/// Classify a received response.
///
/// Statuses in `200..=299` decode the body; any other status becomes a
/// `ResponseError` carrying the descriptor's message for it. Metadata is
/// always attached.
pub fn classify<R, I, K, V>(
    request: &R,
    status_code: u16,
    headers: I,
    body: &[u8],
) -> TransportOutcome<R::Response>
where
    R: Request,
    I: IntoIterator<Item = (K, V)>,
    K: AsRef<str>,
    V: Into<String>,
{
    let metadata = ResponseMetadata::new(status_code, headers);
    let result = if SUCCESS_RANGE.contains(&status_code) {
        decode(body)
    } else {
        Err(ApiError::ResponseError {
            status_code,
            message: request.error_message(status_code),
        })
    };

    TransportOutcome {
        result,
        metadata: Some(metadata),
    }
}

/// Classify the synthetic response of a forced status code, if one is set.
pub fn forced_status<R: Request>(request: &R) -> Option<TransportOutcome<R::Response>> {
    request.fake_status_code().map(|status_code| {
        classify(
            request,
            status_code,
            [("Content-Type", "application/json")],
            FORCED_STATUS_BODY.as_bytes(),
        )
    })
}

/// Map a `reqwest` failure without a status to the transport taxonomy.
fn classify_transport_error(error: &reqwest::Error) -> ApiError {
    if error.is_timeout() {
        ApiError::Timeout
    } else if error.is_connect() {
        ApiError::Offline
    } else {
        ApiError::Unknown
    }
}

fn wire_method(method: HttpMethod) -> reqwest::Method {
    match method {
        HttpMethod::Options => reqwest::Method::OPTIONS,
        HttpMethod::Get => reqwest::Method::GET,
        HttpMethod::Head => reqwest::Method::HEAD,
        HttpMethod::Post => reqwest::Method::POST,
        HttpMethod::Put => reqwest::Method::PUT,
        HttpMethod::Patch => reqwest::Method::PATCH,
        HttpMethod::Delete => reqwest::Method::DELETE,
        HttpMethod::Trace => reqwest::Method::TRACE,
        HttpMethod::Connect => reqwest::Method::CONNECT,
    }
}

/// `reqwest`-backed transport with response cache and fixture support.
///
/// Cheap to clone; clones share the connection pool and the cache.
#[derive(Debug, Clone)]
pub struct HttpClient {
    http: reqwest::Client,
    cache: ResponseCache,
    fixtures: TestDataLoader,
    analytics: Analytics,
}

impl HttpClient {
    /// Create a client from configuration.
    #[must_use]
    pub fn new(config: &ClientConfig) -> Self {
        let http = reqwest::Client::builder()
            .user_agent(config.user_agent.as_str())
            .build()
            .unwrap_or_else(|e| {
                tracing::warn!(error = %e, "Falling back to default HTTP client");
                reqwest::Client::new()
            });

        Self {
            http,
            cache: ResponseCache::new(config.cache_ttl()),
            fixtures: TestDataLoader::new(config.test_data_dir.clone()),
            analytics: Analytics::new(),
        }
    }

    /// Replace the analytics collaborator.
    #[must_use]
    pub fn with_analytics(mut self, analytics: Analytics) -> Self {
        self.analytics = analytics;
        self
    }

    /// Replace the response cache.
    #[must_use]
    pub fn with_cache(mut self, cache: ResponseCache) -> Self {
        self.cache = cache;
        self
    }

    /// Clear the response cache whenever `signal` reports an invalidated
    /// session.
    #[must_use]
    pub fn with_session(mut self, signal: &SessionSignal) -> Self {
        self.cache = self.cache.with_session(signal);
        self
    }

    /// Replace the underlying `reqwest` client.
    #[must_use]
    pub fn with_http(mut self, http: reqwest::Client) -> Self {
        self.http = http;
        self
    }

    /// The response cache shared by this client's clones.
    #[must_use]
    pub const fn cache(&self) -> &ResponseCache {
        &self.cache
    }

    /// The analytics collaborator.
    #[must_use]
    pub const fn analytics(&self) -> &Analytics {
        &self.analytics
    }

    /// Execute `request`, abandoning the network step if `cancel` completes
    /// first.
    ///
    /// A cancelled call resolves to [`ApiError::Unknown`]; the in-flight
    /// request is dropped.
    pub async fn execute_cancellable<R, F>(
        &self,
        request: &R,
        use_test_data: bool,
        cancel: F,
    ) -> TransportOutcome<R::Response>
    where
        R: Request,
        F: Future<Output = ()> + Send,
    {
        let outcome = self.run(request, use_test_data, cancel).await;
        TransportMetrics::record_outcome(&outcome.result);
        if let Err(error) = &outcome.result {
            tracing::warn!(request = type_name::<R>(), error = %error, "Request failed");
        }
        outcome
    }

    async fn run<R, F>(
        &self,
        request: &R,
        use_test_data: bool,
        cancel: F,
    ) -> TransportOutcome<R::Response>
    where
        R: Request,
        F: Future<Output = ()> + Send,
    {
        if use_test_data {
            let result = self.fixtures.load(request.test_data_path()).await;
            return TransportOutcome {
                result,
                metadata: None,
            };
        }

        let built = match request.build() {
            Ok(built) => built,
            Err(error) => return TransportOutcome::failure(error),
        };
        self.analytics.log(built.curl(), Severity::Debug);

        if let Some(error) = injected_fault(request) {
            return TransportOutcome::failure(error);
        }
        if let Some(outcome) = forced_status(request) {
            return outcome;
        }

        let key = request.wants_cache().then(|| built.key());
        if let Some(body) = key.as_ref().and_then(|key| self.cache.get(key)) {
            tracing::debug!(request = type_name::<R>(), "Serving response from cache");
            TransportMetrics::record_cache_hit();
            return TransportOutcome {
                result: decode(&body),
                metadata: None,
            };
        }

        let started = Instant::now();
        let outcome = tokio::select! {
            outcome = self.send(request, built) => outcome,
            () = cancel => {
                tracing::debug!(request = type_name::<R>(), "Request cancelled");
                return TransportOutcome::failure(ApiError::Unknown);
            }
        };
        TransportMetrics::record_duration(started.elapsed());

        match outcome {
            Ok((outcome, body)) => {
                if let (Some(key), true) = (key, outcome.is_success()) {
                    self.cache.store(key, body);
                }
                outcome
            }
            Err(error) => TransportOutcome::failure(error),
        }
    }

    /// Perform the network exchange. Returns the classified outcome plus the
    /// raw body for caching.
    async fn send<R: Request>(
        &self,
        request: &R,
        built: BuiltRequest,
    ) -> Result<(TransportOutcome<R::Response>, Vec<u8>), ApiError> {
        let mut builder = self
            .http
            .request(wire_method(built.method), built.url)
            .timeout(built.timeout);
        for (name, value) in &built.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }
        if let Some(body) = built.body {
            builder = builder.body(body);
        }

        let response = builder.send().await.map_err(|e| self.transport_error(&e))?;

        let status_code = response.status().as_u16();
        let headers: Vec<(String, String)> = response
            .headers()
            .iter()
            .filter_map(|(name, value)| {
                value
                    .to_str()
                    .ok()
                    .map(|value| (name.as_str().to_string(), value.to_string()))
            })
            .collect();
        let body = response
            .bytes()
            .await
            .map_err(|e| self.transport_error(&e))?
            .to_vec();

        let outcome = classify(request, status_code, headers, &body);
        Ok((outcome, body))
    }

    fn transport_error(&self, error: &reqwest::Error) -> ApiError {
        self.analytics.log(error.to_string(), Severity::Error);
        classify_transport_error(error)
    }
}

impl Default for HttpClient {
    fn default() -> Self {
        Self::new(&ClientConfig::default())
    }
}

impl Client for HttpClient {
    async fn execute<R: Request>(
        &self,
        request: &R,
        use_test_data: bool,
    ) -> TransportOutcome<R::Response> {
        self.execute_cancellable(request, use_test_data, std::future::pending())
            .await
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use super::*;
    use fetchkit_core::request::{EmptyParameters, EmptyPathComponent};
    use serde::Deserialize;

    #[derive(Debug, Deserialize, PartialEq)]
    struct Profile {
        id: String,
    }

    #[derive(Default)]
    struct Switches {
        auth: bool,
        bad_request: bool,
        timeout: bool,
        status: Option<u16>,
    }

    struct ProfileRequest {
        parameters: EmptyParameters,
        switches: Switches,
    }

    impl ProfileRequest {
        fn with(switches: Switches) -> Self {
            Self {
                parameters: EmptyParameters::new(),
                switches,
            }
        }
    }

    impl Request for ProfileRequest {
        type Response = Profile;
        type Parameters = EmptyParameters;
        type PathComponent = EmptyPathComponent;

        fn new(parameters: EmptyParameters, _path: EmptyPathComponent) -> Self {
            Self {
                parameters,
                switches: Switches::default(),
            }
        }

        fn parameters(&self) -> &EmptyParameters {
            &self.parameters
        }

        fn base_url(&self) -> String {
            "https://api.example.com".to_string()
        }

        fn path(&self) -> String {
            "/profile".to_string()
        }

        fn method(&self) -> HttpMethod {
            HttpMethod::Get
        }

        fn error_message(&self, status_code: u16) -> Option<String> {
            match status_code {
                400 => Some("Please check your input".to_string()),
                404 => Some("Profile not found".to_string()),
                _ => None,
            }
        }

        fn fake_auth_error(&self) -> bool {
            self.switches.auth
        }

        fn fake_bad_request_error(&self) -> bool {
            self.switches.bad_request
        }

        fn fake_timeout_error(&self) -> bool {
            self.switches.timeout
        }

        fn fake_status_code(&self) -> Option<u16> {
            self.switches.status
        }
    }

    #[test]
    fn test_preflight_priority() {
        let all = ProfileRequest::with(Switches {
            auth: true,
            bad_request: true,
            timeout: true,
            status: None,
        });
        assert_eq!(
            preflight(&all).unwrap_err(),
            ApiError::ResponseError {
                status_code: 401,
                message: None
            }
        );

        let bad_and_timeout = ProfileRequest::with(Switches {
            bad_request: true,
            timeout: true,
            ..Switches::default()
        });
        assert_eq!(
            preflight(&bad_and_timeout).unwrap_err(),
            ApiError::ResponseError {
                status_code: 400,
                message: Some("Please check your input".to_string())
            }
        );

        let timeout = ProfileRequest::with(Switches {
            timeout: true,
            ..Switches::default()
        });
        assert_eq!(preflight(&timeout).unwrap_err(), ApiError::Timeout);

        assert!(preflight(&ProfileRequest::with(Switches::default())).is_ok());
    }

    #[test]
    fn test_classify_success_and_failure() {
        let request = ProfileRequest::with(Switches::default());

        let ok = classify(&request, 200, [("X-Cursor", "next")], br#"{"id":"1"}"#);
        assert_eq!(ok.result, Ok(Profile { id: "1".to_string() }));
        assert_eq!(ok.header("x-cursor"), Some("next"));

        let not_found = classify(&request, 404, Vec::<(String, String)>::new(), b"");
        assert_eq!(
            not_found.result,
            Err(ApiError::ResponseError {
                status_code: 404,
                message: Some("Profile not found".to_string())
            })
        );
        assert_eq!(not_found.metadata.unwrap().status_code, 404);

        let garbled = classify(&request, 204, Vec::<(String, String)>::new(), b"");
        assert!(matches!(garbled.result, Err(ApiError::DecodeError(_))));
    }

    #[test]
    fn test_forced_status_is_classified() {
        let request = ProfileRequest::with(Switches {
            status: Some(403),
            ..Switches::default()
        });
        let outcome = forced_status(&request).unwrap();
        assert!(outcome.result.unwrap_err().is_auth_failure());
        assert_eq!(outcome.metadata.unwrap().status_code, 403);

        assert!(forced_status(&ProfileRequest::with(Switches::default())).is_none());
    }

    #[tokio::test]
    async fn test_forced_timeout_skips_network() {
        let client = HttpClient::default();
        let request = ProfileRequest::with(Switches {
            timeout: true,
            ..Switches::default()
        });
        let outcome = client.execute(&request, false).await;
        assert_eq!(outcome.result, Err(ApiError::Timeout));
        assert!(outcome.metadata.is_none());
    }

    #[tokio::test]
    async fn test_test_data_without_locator() {
        let client = HttpClient::default();
        let request = ProfileRequest::with(Switches::default());
        let outcome = client.execute(&request, true).await;
        assert_eq!(outcome.result, Err(ApiError::MissingTestData));
    }

    #[test]
    fn test_wire_method_names_match() {
        for method in [HttpMethod::Get, HttpMethod::Post, HttpMethod::Patch, HttpMethod::Trace] {
            assert_eq!(wire_method(method).as_str(), method.as_str());
        }
    }
}
