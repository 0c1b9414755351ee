//! Request descriptors.
//!
//! A [`Request`] is an immutable value describing one logical call: where it
//! goes, how its parameters become a query string and a body, how long it may
//! take, and which escape hatches (local substitute, cache, fault injection,
//! test data) are consulted before any network I/O.
//!
//! Descriptor construction is pure. Hooks such as [`Request::on_success`] are
//! invoked by the repository layer, never by the descriptor itself.
//!
//! # Example
//!
//! ```
//! use fetchkit_core::request::{EmptyPathComponent, HttpMethod, Request};
//! use serde::{Deserialize, Serialize};
//!
//! #[derive(Serialize)]
//! struct SearchParameters {
//!     query: String,
//!     page: u32,
//! }
//!
//! #[derive(Deserialize)]
//! struct SearchResponse {
//!     ids: Vec<String>,
//! }
//!
//! struct SearchRequest {
//!     parameters: SearchParameters,
//! }
//!
//! impl Request for SearchRequest {
//!     type Response = SearchResponse;
//!     type Parameters = SearchParameters;
//!     type PathComponent = EmptyPathComponent;
//!
//!     fn new(parameters: SearchParameters, _path: EmptyPathComponent) -> Self {
//!         Self { parameters }
//!     }
//!
//!     fn parameters(&self) -> &SearchParameters {
//!         &self.parameters
//!     }
//!
//!     fn base_url(&self) -> String {
//!         "https://api.example.com".to_string()
//!     }
//!
//!     fn path(&self) -> String {
//!         "/search".to_string()
//!     }
//!
//!     fn method(&self) -> HttpMethod {
//!         HttpMethod::Get
//!     }
//! }
//!
//! let request = SearchRequest::new(
//!     SearchParameters { query: "rust".to_string(), page: 2 },
//!     EmptyPathComponent,
//! );
//! let built = request.build().unwrap();
//! assert_eq!(built.url.as_str(), "https://api.example.com/search?query=rust&page=2");
//! ```

use crate::error::ApiError;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use std::future::Future;
use std::ops::RangeInclusive;
use std::path::PathBuf;
use std::time::Duration;
use url::Url;

/// Timeout applied when a descriptor does not override [`Request::timeout`].
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// Status codes treated as success.
pub const SUCCESS_RANGE: RangeInclusive<u16> = 200..=299;

/// Parameters for calls that take none. Encodes as `{}`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EmptyParameters {}

impl EmptyParameters {
    /// Create empty parameters.
    #[must_use]
    pub const fn new() -> Self {
        Self {}
    }
}

/// Response type for calls whose body is irrelevant.
///
/// Always decodes successfully, whatever the body contains.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EmptyResponse {}

/// Path component for calls whose path is fixed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct EmptyPathComponent;

/// HTTP method of a call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum HttpMethod {
    /// `OPTIONS`
    Options,
    /// `GET`
    Get,
    /// `HEAD`
    Head,
    /// `POST`
    Post,
    /// `PUT`
    Put,
    /// `PATCH`
    Patch,
    /// `DELETE`
    Delete,
    /// `TRACE`
    Trace,
    /// `CONNECT`
    Connect,
}

impl HttpMethod {
    /// Wire name of the method.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Options => "OPTIONS",
            Self::Get => "GET",
            Self::Head => "HEAD",
            Self::Post => "POST",
            Self::Put => "PUT",
            Self::Patch => "PATCH",
            Self::Delete => "DELETE",
            Self::Trace => "TRACE",
            Self::Connect => "CONNECT",
        }
    }

    /// Whether a body is sent with this method.
    #[must_use]
    pub const fn allows_body(self) -> bool {
        !matches!(self, Self::Get | Self::Head | Self::Options | Self::Trace)
    }
}

impl fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One `name=value` pair of a query string.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct QueryItem {
    /// Key
    pub name: String,
    /// Rendered value
    pub value: String,
}

impl QueryItem {
    /// Create a query item.
    #[must_use]
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }
}

/// Derive query items from parameters.
///
/// Parameters are encoded to JSON. An object yields one item per field; an
/// array of objects yields the fields of every object. Anything else yields no
/// items. Fields encoded as `null` are left out. Strings render unquoted,
/// nested arrays and objects render as compact JSON.
///
/// Items are sorted by key in descending order. The sort is stable, so
/// repeated keys from an array keep their relative order.
#[must_use]
pub fn query_items<P: Serialize + ?Sized>(parameters: &P) -> Vec<QueryItem> {
    let mut items: Vec<QueryItem> = match serde_json::to_value(parameters) {
        Ok(Value::Object(fields)) => flatten(fields),
        Ok(Value::Array(values)) => values
            .into_iter()
            .filter_map(|value| match value {
                Value::Object(fields) => Some(fields),
                _ => None,
            })
            .flat_map(flatten)
            .collect(),
        _ => Vec::new(),
    };

    items.sort_by(|first, second| second.name.cmp(&first.name));
    items
}

fn flatten(fields: Map<String, Value>) -> Vec<QueryItem> {
    fields
        .into_iter()
        .filter(|(_, value)| !value.is_null())
        .map(|(name, value)| QueryItem {
            name,
            value: render(value),
        })
        .collect()
}

fn render(value: Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(text) => text,
        Value::Bool(flag) => flag.to_string(),
        Value::Number(number) => number.to_string(),
        nested @ (Value::Array(_) | Value::Object(_)) => nested.to_string(),
    }
}

/// Encode parameters as a JSON body. `None` if encoding fails.
#[must_use]
pub fn encode_body<P: Serialize + ?Sized>(parameters: &P) -> Option<Vec<u8>> {
    serde_json::to_vec(parameters).ok()
}

/// Descriptor of one kind of call.
///
/// Only the constructor, parameter access, address and method are required;
/// everything else has the defaults of a plain JSON call.
pub trait Request: Send + Sync + Sized + 'static {
    /// Decoded response type
    type Response: DeserializeOwned + Send + 'static;

    /// Parameters encoded into the query and the body
    type Parameters: Serialize + Send + Sync + 'static;

    /// Extra data used to build the path (ids and such)
    type PathComponent: Send + 'static;

    /// Create the descriptor for one invocation.
    fn new(parameters: Self::Parameters, path_component: Self::PathComponent) -> Self;

    /// Parameters of this invocation.
    fn parameters(&self) -> &Self::Parameters;

    /// Scheme, host and optional port, e.g. `https://api.example.com`.
    fn base_url(&self) -> String;

    /// Path appended to [`Request::base_url`].
    fn path(&self) -> String;

    /// HTTP method.
    fn method(&self) -> HttpMethod;

    /// Header fields.
    fn headers(&self) -> Vec<(String, String)> {
        Vec::new()
    }

    /// Query items, by default derived from the parameters.
    fn query_items(&self) -> Vec<QueryItem> {
        query_items(self.parameters())
    }

    /// Body, by default the parameters encoded as JSON.
    fn body(&self) -> Option<Vec<u8>> {
        encode_body(self.parameters())
    }

    /// Whether a cached response for the same call may be served.
    fn wants_cache(&self) -> bool {
        false
    }

    /// Time allowed for the network call.
    fn timeout(&self) -> Duration {
        DEFAULT_TIMEOUT
    }

    /// Local substitute for the network call.
    ///
    /// When this yields `Some`, the repository returns it and the transport is
    /// never invoked.
    fn local_data(&self) -> impl Future<Output = Option<Self::Response>> + Send {
        async { None }
    }

    /// Called by the repository after a successful call.
    fn on_success(&self, _response: &Self::Response) {}

    /// Called by the repository after a failed call.
    fn on_failure(&self, _error: &ApiError) {}

    /// User-facing message for a failing status code.
    fn error_message(&self, _status_code: u16) -> Option<String> {
        None
    }

    /// Fail with `401` before any I/O.
    fn fake_auth_error(&self) -> bool {
        false
    }

    /// Fail with `400` before any I/O.
    fn fake_bad_request_error(&self) -> bool {
        false
    }

    /// Fail with a timeout before any I/O.
    fn fake_timeout_error(&self) -> bool {
        false
    }

    /// Answer with this status code instead of calling the server.
    fn fake_status_code(&self) -> Option<u16> {
        None
    }

    /// Location of the fixture served when test data is requested.
    fn test_data_path(&self) -> Option<PathBuf> {
        None
    }

    /// Materialize the concrete call.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError::InvalidRequest`] if no absolute URL can be formed.
    fn build(&self) -> Result<BuiltRequest, ApiError> {
        BuiltRequest::from_request(self)
    }
}

/// A fully specified call, ready to be sent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuiltRequest {
    /// HTTP method
    pub method: HttpMethod,
    /// Absolute URL including the derived query
    pub url: Url,
    /// Header fields in declaration order
    pub headers: Vec<(String, String)>,
    /// Body, present only for methods that carry one
    pub body: Option<Vec<u8>>,
    /// Time allowed for the call
    pub timeout: Duration,
}

impl BuiltRequest {
    /// Build the call described by `request`.
    ///
    /// Any query on the base URL is replaced by the derived query items; no
    /// `?` is emitted when there are none.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError::InvalidRequest`] if the base URL and path do not
    /// form an absolute URL with a host.
    pub fn from_request<R: Request>(request: &R) -> Result<Self, ApiError> {
        let raw = format!("{}{}", request.base_url(), request.path());
        let mut url = Url::parse(&raw).map_err(|_| ApiError::InvalidRequest)?;
        if url.cannot_be_a_base() || url.host_str().is_none() {
            return Err(ApiError::InvalidRequest);
        }

        url.set_query(None);
        url.set_fragment(None);

        let items = request.query_items();
        if !items.is_empty() {
            url.query_pairs_mut().extend_pairs(
                items
                    .iter()
                    .map(|item| (item.name.as_str(), item.value.as_str())),
            );
        }

        let method = request.method();
        let body = if method.allows_body() {
            request.body()
        } else {
            None
        };

        Ok(Self {
            method,
            url,
            headers: request.headers(),
            body,
            timeout: request.timeout(),
        })
    }

    /// Identity of this call for response caching.
    #[must_use]
    pub fn key(&self) -> RequestKey {
        RequestKey {
            method: self.method,
            url: self.url.to_string(),
            body: self.body.clone(),
        }
    }

    /// Replayable `curl` command for this call.
    #[must_use]
    pub fn curl(&self) -> String {
        let mut command = format!("curl -X {} '{}'", self.method, quote(self.url.as_str()));
        for (name, value) in &self.headers {
            command.push_str(&format!(" -H '{}: {}'", quote(name), quote(value)));
        }
        if let Some(body) = &self.body {
            command.push_str(&format!(" -d '{}'", quote(&String::from_utf8_lossy(body))));
        }
        command
    }
}

fn quote(text: &str) -> String {
    text.replace('\'', r"'\''")
}

/// Cache identity of a [`BuiltRequest`]: method, URL and body.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RequestKey {
    method: HttpMethod,
    url: String,
    body: Option<Vec<u8>>,
}
