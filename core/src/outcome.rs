//! Result of executing one request through a transport.

use crate::error::ApiError;
use std::collections::HashMap;

/// Status code and headers of an HTTP exchange.
///
/// Header names are stored lowercased; lookups are case-insensitive.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResponseMetadata {
    /// HTTP status code
    pub status_code: u16,
    headers: HashMap<String, String>,
}

impl ResponseMetadata {
    /// Create metadata from a status code and header pairs.
    #[must_use]
    pub fn new<I, K, V>(status_code: u16, headers: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: Into<String>,
    {
        Self {
            status_code,
            headers: headers
                .into_iter()
                .map(|(name, value)| (name.as_ref().to_ascii_lowercase(), value.into()))
                .collect(),
        }
    }

    /// Value of a header, matched case-insensitively.
    #[must_use]
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .get(&name.to_ascii_lowercase())
            .map(String::as_str)
    }

    /// All headers, keyed by lowercased name.
    #[must_use]
    pub const fn headers(&self) -> &HashMap<String, String> {
        &self.headers
    }
}

/// Typed outcome of one call plus the metadata of the exchange, if one took
/// place.
///
/// Metadata is absent for outcomes that never reached a server: test data,
/// local substitutes, cache hits, fault injection and pre-flight failures.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportOutcome<T> {
    /// Decoded response or the classified failure
    pub result: Result<T, ApiError>,
    /// Status and headers of the exchange
    pub metadata: Option<ResponseMetadata>,
}

impl<T> TransportOutcome<T> {
    /// Successful outcome without metadata.
    #[must_use]
    pub const fn success(value: T) -> Self {
        Self {
            result: Ok(value),
            metadata: None,
        }
    }

    /// Failed outcome without metadata.
    #[must_use]
    pub const fn failure(error: ApiError) -> Self {
        Self {
            result: Err(error),
            metadata: None,
        }
    }

    /// Attach exchange metadata.
    #[must_use]
    pub fn with_metadata(mut self, metadata: ResponseMetadata) -> Self {
        self.metadata = Some(metadata);
        self
    }

    /// Whether the call succeeded.
    #[must_use]
    pub const fn is_success(&self) -> bool {
        self.result.is_ok()
    }

    /// The failure, if any.
    #[must_use]
    pub const fn error(&self) -> Option<&ApiError> {
        match &self.result {
            Ok(_) => None,
            Err(error) => Some(error),
        }
    }

    /// Header of the exchange, if metadata is present.
    #[must_use]
    pub fn header(&self, name: &str) -> Option<&str> {
        self.metadata.as_ref().and_then(|metadata| metadata.header(name))
    }

    /// Transform the success value, keeping failure and metadata.
    pub fn map<U, F>(self, f: F) -> TransportOutcome<U>
    where
        F: FnOnce(T) -> U,
    {
        TransportOutcome {
            result: self.result.map(f),
            metadata: self.metadata,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_header_lookup_is_case_insensitive() {
        let metadata = ResponseMetadata::new(200, [("X-Cursor", "abc"), ("Content-Type", "json")]);
        assert_eq!(metadata.header("x-cursor"), Some("abc"));
        assert_eq!(metadata.header("X-CURSOR"), Some("abc"));
        assert_eq!(metadata.header("missing"), None);
        assert_eq!(metadata.headers().len(), 2);
    }

    #[test]
    fn test_outcome_accessors() {
        let outcome = TransportOutcome::success(1)
            .with_metadata(ResponseMetadata::new(200, [("X-Cursor", "next")]));
        assert!(outcome.is_success());
        assert_eq!(outcome.header("x-cursor"), Some("next"));
        assert_eq!(outcome.error(), None);

        let mapped = outcome.map(|value| value + 1);
        assert_eq!(mapped.result, Ok(2));
        assert!(mapped.metadata.is_some());

        let failed: TransportOutcome<i32> = TransportOutcome::failure(ApiError::Offline);
        assert!(!failed.is_success());
        assert_eq!(failed.error(), Some(&ApiError::Offline));
        assert_eq!(failed.header("x-cursor"), None);
    }
}
