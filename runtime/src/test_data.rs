//! Offline fixtures served in place of network calls.

use crate::decode::{decode, empty_response};
use fetchkit_core::error::ApiError;
use serde::de::DeserializeOwned;
use std::path::{Path, PathBuf};

/// Reads pre-recorded responses from JSON fixture files.
///
/// Relative locators are resolved against the configured root directory.
#[derive(Debug, Clone, Default)]
pub struct TestDataLoader {
    root: Option<PathBuf>,
}

impl TestDataLoader {
    /// Create a loader resolving relative locators against `root`.
    #[must_use]
    pub const fn new(root: Option<PathBuf>) -> Self {
        Self { root }
    }

    /// Absolute path for a locator.
    #[must_use]
    pub fn resolve(&self, locator: &Path) -> PathBuf {
        match &self.root {
            Some(root) if locator.is_relative() => root.join(locator),
            _ => locator.to_path_buf(),
        }
    }

    /// Load the fixture at `locator` as `T`.
    ///
    /// [`EmptyResponse`](fetchkit_core::request::EmptyResponse) succeeds
    /// without reading anything.
    ///
    /// # Errors
    ///
    /// - [`ApiError::MissingTestData`] if `locator` is `None`
    /// - [`ApiError::DecodeError`] if the file cannot be read or decoded
    pub async fn load<T: DeserializeOwned + 'static>(
        &self,
        locator: Option<PathBuf>,
    ) -> Result<T, ApiError> {
        if let Some(empty) = empty_response::<T>() {
            return Ok(empty);
        }

        let locator = locator.ok_or(ApiError::MissingTestData)?;
        let path = self.resolve(&locator);
        let body = tokio::fs::read(&path)
            .await
            .map_err(|e| ApiError::DecodeError(format!("{}: {e}", path.display())))?;

        decode(&body)
    }
}
