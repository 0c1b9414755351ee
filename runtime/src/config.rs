//! Client configuration.
//!
//! Environment-based configuration with validation and sensible defaults.
//!
//! # Environment Variables
//!
//! | Variable | Field | Default |
//! |----------|-------|---------|
//! | `FETCHKIT_CACHE_TTL_SECS` | `cache_ttl_secs` (`0` or `none` disables expiry) | `300` |
//! | `FETCHKIT_CURSOR_HEADER` | `cursor_header` | `X-Cursor` |
//! | `FETCHKIT_TEST_DATA_DIR` | `test_data_dir` | unset |
//! | `FETCHKIT_SESSION_CAPACITY` | `session_channel_capacity` | `16` |
//! | `FETCHKIT_USER_AGENT` | `user_agent` | `fetchkit/<version>` |
//!
//! # Example
//!
//! ```no_run
//! use fetchkit_runtime::config::ClientConfig;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let config = ClientConfig::from_env()?;
//! println!("Cursor header: {}", config.cursor_header);
//! # Ok(())
//! # }
//! ```

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Default response cache TTL in seconds.
pub const DEFAULT_CACHE_TTL_SECS: u64 = 300;

/// Default pagination header.
pub const DEFAULT_CURSOR_HEADER: &str = "X-Cursor";

/// Default session broadcast capacity.
pub const DEFAULT_SESSION_CAPACITY: usize = 16;

/// Configuration error
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// An environment variable could not be parsed
    #[error("Invalid value for {var}: {value}")]
    InvalidValue {
        /// Variable name
        var: String,
        /// Offending value
        value: String,
    },

    /// Configuration validation failed
    #[error("Configuration validation failed: {0}")]
    ValidationError(String),
}

/// Configuration shared by the transport and the usecase layer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Lifetime of response cache entries; `None` or `0` keeps them until cleared
    pub cache_ttl_secs: Option<u64>,
    /// Response header carrying the pagination cursor
    pub cursor_header: String,
    /// Root for relative test-data locators
    pub test_data_dir: Option<PathBuf>,
    /// Capacity of the session invalidation channel
    pub session_channel_capacity: usize,
    /// `User-Agent` sent with every call
    pub user_agent: String,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            cache_ttl_secs: Some(DEFAULT_CACHE_TTL_SECS),
            cursor_header: DEFAULT_CURSOR_HEADER.to_string(),
            test_data_dir: None,
            session_channel_capacity: DEFAULT_SESSION_CAPACITY,
            user_agent: concat!("fetchkit/", env!("CARGO_PKG_VERSION")).to_string(),
        }
    }
}

impl ClientConfig {
    /// Load configuration from `FETCHKIT_*` environment variables, falling
    /// back to defaults for unset ones.
    ///
    /// # Errors
    ///
    /// Returns error if a variable cannot be parsed or the result is invalid
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    /// Load configuration through an arbitrary variable lookup.
    ///
    /// # Errors
    ///
    /// Returns error if a value cannot be parsed or the result is invalid
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(value) = lookup("FETCHKIT_CACHE_TTL_SECS") {
            config.cache_ttl_secs = parse_ttl(&value)?;
        }
        if let Some(value) = lookup("FETCHKIT_CURSOR_HEADER") {
            config.cursor_header = value;
        }
        if let Some(value) = lookup("FETCHKIT_TEST_DATA_DIR") {
            config.test_data_dir = Some(PathBuf::from(value));
        }
        if let Some(value) = lookup("FETCHKIT_SESSION_CAPACITY") {
            config.session_channel_capacity =
                value.trim().parse().map_err(|_| ConfigError::InvalidValue {
                    var: "FETCHKIT_SESSION_CAPACITY".to_string(),
                    value: value.clone(),
                })?;
        }
        if let Some(value) = lookup("FETCHKIT_USER_AGENT") {
            config.user_agent = value;
        }

        config.validate()?;
        Ok(config)
    }

    /// Validate configuration
    ///
    /// # Errors
    ///
    /// Returns error if configuration is invalid
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.cursor_header.trim().is_empty() {
            return Err(ConfigError::ValidationError(
                "cursor_header cannot be empty".to_string(),
            ));
        }
        if self.session_channel_capacity == 0 {
            return Err(ConfigError::ValidationError(
                "session_channel_capacity must be > 0".to_string(),
            ));
        }
        if self.user_agent.trim().is_empty() {
            return Err(ConfigError::ValidationError(
                "user_agent cannot be empty".to_string(),
            ));
        }
        Ok(())
    }

    /// Cache TTL as a `Duration`. A zero TTL disables expiry, whichever
    /// source it came from.
    #[must_use]
    pub fn cache_ttl(&self) -> Option<Duration> {
        self.cache_ttl_secs
            .filter(|secs| *secs > 0)
            .map(Duration::from_secs)
    }

    /// Set the cache TTL; `None` or a zero duration disables expiry.
    ///
    /// Sub-second remainders round up to the next whole second.
    #[must_use]
    pub fn with_cache_ttl(mut self, ttl: Option<Duration>) -> Self {
        self.cache_ttl_secs = ttl.and_then(|ttl| {
            let secs = ttl.as_secs() + u64::from(ttl.subsec_nanos() > 0);
            (secs > 0).then_some(secs)
        });
        self
    }

    /// Set the pagination header.
    #[must_use]
    pub fn with_cursor_header(mut self, header: impl Into<String>) -> Self {
        self.cursor_header = header.into();
        self
    }

    /// Set the root for relative test-data locators.
    #[must_use]
    pub fn with_test_data_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.test_data_dir = Some(dir.into());
        self
    }
}

fn parse_ttl(value: &str) -> Result<Option<u64>, ConfigError> {
    let trimmed = value.trim();
    if trimmed.eq_ignore_ascii_case("none") || trimmed == "0" {
        return Ok(None);
    }
    trimmed
        .parse()
        .map(Some)
        .map_err(|_| ConfigError::InvalidValue {
            var: "FETCHKIT_CACHE_TTL_SECS".to_string(),
            value: value.to_string(),
        })
}
