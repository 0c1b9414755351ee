//! Error taxonomy for the request pipeline.
//!
//! Errors come in two tiers:
//!
//! - [`ApiError`]: transport-level kinds, classified exactly once by a
//!   [`Client`](crate::client::Client) implementation.
//! - [`AppError`]: application-level kinds, produced only by the usecase layer
//!   when it turns an [`ApiError`] into something a user can act on.
//!
//! # Example
//!
//! ```
//! use fetchkit_core::error::{ApiError, AppError};
//!
//! let error = ApiError::ResponseError { status_code: 404, message: None };
//! assert_eq!(error.status_code(), Some(404));
//! assert!(!error.is_auth_failure());
//!
//! let app = AppError::normal("Not found");
//! assert_eq!(app.message(), Some("Not found"));
//! ```

use thiserror::Error;

/// Transport-level failure of a single call.
///
/// Exactly one kind is attached to each failed
/// [`TransportOutcome`](crate::outcome::TransportOutcome).
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ApiError {
    /// The call failed without a status code or a recognizable cause.
    #[error("Unknown error")]
    Unknown,

    /// Test data was requested but the descriptor names no fixture.
    #[error("Missing test data path")]
    MissingTestData,

    /// The descriptor could not be turned into a concrete call.
    #[error("Invalid request")]
    InvalidRequest,

    /// The call did not complete within its timeout.
    #[error("The request timed out")]
    Timeout,

    /// The network is unreachable.
    #[error("The network connection appears to be offline")]
    Offline,

    /// The response body could not be decoded into the expected type.
    #[error("Decode error: {0}")]
    DecodeError(String),

    /// The server answered with a status outside the success range.
    #[error("Response error (status {status_code})")]
    ResponseError {
        /// Literal HTTP status code
        status_code: u16,
        /// Message from the descriptor's per-status lookup, if any
        message: Option<String>,
    },
}

impl ApiError {
    /// Status code carried by a [`ApiError::ResponseError`].
    #[must_use]
    pub const fn status_code(&self) -> Option<u16> {
        match self {
            Self::ResponseError { status_code, .. } => Some(*status_code),
            _ => None,
        }
    }

    /// Whether this error means the session is no longer valid (401 or 403).
    #[must_use]
    pub const fn is_auth_failure(&self) -> bool {
        matches!(
            self,
            Self::ResponseError {
                status_code: 401 | 403,
                ..
            }
        )
    }

    /// Human-readable message for user-facing errors.
    ///
    /// Prefers the descriptor-supplied message of a response error and falls
    /// back to the error's own description.
    #[must_use]
    pub fn user_message(&self) -> String {
        match self {
            Self::ResponseError {
                message: Some(message),
                ..
            } => message.clone(),
            other => other.to_string(),
        }
    }
}

/// Application-level error surfaced to callers of a usecase.
///
/// [`AppError::None`] is deliberately silent: it stands for failures the end
/// user cannot act on and carries no displayable text.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AppError {
    /// A recoverable failure with a message to show.
    #[error("{message}")]
    Normal {
        /// Optional heading
        title: String,
        /// Text to show to the user
        message: String,
    },

    /// The session expired; all cached feature state has been invalidated.
    #[error("{message}")]
    Auth {
        /// Optional heading
        title: String,
        /// Text to show to the user
        message: String,
    },

    /// Caller-side input validation failed before any call was made.
    #[error("{message}")]
    Validation {
        /// Optional heading
        title: String,
        /// Text to show to the user
        message: String,
    },

    /// A failure with nothing to show.
    #[error("Silent failure")]
    None,
}

impl AppError {
    /// Create a [`AppError::Normal`] with an empty title.
    #[must_use]
    pub fn normal(message: impl Into<String>) -> Self {
        Self::Normal {
            title: String::new(),
            message: message.into(),
        }
    }

    /// Create a [`AppError::Auth`] with an empty title.
    #[must_use]
    pub fn auth(message: impl Into<String>) -> Self {
        Self::Auth {
            title: String::new(),
            message: message.into(),
        }
    }

    /// Create a [`AppError::Validation`] with an empty title.
    #[must_use]
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            title: String::new(),
            message: message.into(),
        }
    }

    /// User-visible message, `None` for silent failures.
    #[must_use]
    pub fn message(&self) -> Option<&str> {
        match self {
            Self::Normal { message, .. }
            | Self::Auth { message, .. }
            | Self::Validation { message, .. } => Some(message),
            Self::None => None,
        }
    }

    /// Whether this error was caused by an authentication failure.
    #[must_use]
    pub const fn is_auth(&self) -> bool {
        matches!(self, Self::Auth { .. })
    }
}
