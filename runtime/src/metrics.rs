//! Prometheus metrics for the request pipeline.
//!
//! Instruments recorded by the runtime:
//! - `fetchkit_requests_total{outcome}`: every transport outcome, labelled
//!   `success` or with the failure kind
//! - `fetchkit_request_duration_seconds`: wall time of network calls
//! - `fetchkit_cache_hits_total`: calls answered from the response cache
//! - `fetchkit_session_invalidations_total`: session invalidation broadcasts
//!
//! Recording is a no-op until a recorder is installed, for example by
//! [`MetricsRecorder::install`]. The recorder serves no endpoint; callers
//! expose [`MetricsRecorder::render`] however they like.
//!
//! # Example
//!
//! ```rust,no_run
//! use fetchkit_runtime::metrics::MetricsRecorder;
//!
//! # fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let mut recorder = MetricsRecorder::new();
//! recorder.install()?;
//! let scrape = recorder.render().unwrap_or_default();
//! # Ok(())
//! # }
//! ```

use fetchkit_core::error::ApiError;
use metrics::{counter, describe_counter, describe_histogram, histogram};
use metrics_exporter_prometheus::{Matcher, PrometheusBuilder, PrometheusHandle};
use std::time::Duration;
use thiserror::Error;

/// Errors from metrics operations.
#[derive(Error, Debug)]
pub enum MetricsError {
    /// Failed to build metrics exporter
    #[error("Failed to build metrics exporter: {0}")]
    Build(String),
    /// Failed to install metrics exporter
    #[error("Failed to install metrics exporter: {0}")]
    Install(String),
}

/// Prometheus recorder for the pipeline's metrics.
#[derive(Default)]
pub struct MetricsRecorder {
    handle: Option<PrometheusHandle>,
}

impl MetricsRecorder {
    /// Create a recorder that is not installed yet.
    #[must_use]
    pub const fn new() -> Self {
        Self { handle: None }
    }

    /// Register metric descriptions and install the Prometheus recorder.
    ///
    /// A recorder installed earlier (another instance, a test) is left in
    /// place and reported with a warning.
    ///
    /// # Errors
    ///
    /// Returns error if the exporter cannot be built or installed.
    pub fn install(&mut self) -> Result<(), MetricsError> {
        register_metrics();

        let builder = PrometheusBuilder::new()
            .set_buckets_for_metric(
                Matcher::Suffix("duration_seconds".to_string()),
                &[
                    0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0,
                ],
            )
            .map_err(|e| MetricsError::Build(e.to_string()))?;

        match builder.install_recorder() {
            Ok(handle) => {
                self.handle = Some(handle);
                tracing::info!("Metrics recorder installed");
                Ok(())
            }
            Err(e) => {
                let err_msg = e.to_string();
                if err_msg.contains("already initialized") {
                    tracing::warn!("Metrics recorder already initialized, skipping re-initialization");
                    Ok(())
                } else {
                    Err(MetricsError::Install(err_msg))
                }
            }
        }
    }

    /// Handle of the installed recorder.
    #[must_use]
    pub const fn handle(&self) -> Option<&PrometheusHandle> {
        self.handle.as_ref()
    }

    /// Render current metrics in Prometheus text format.
    ///
    /// Returns `None` if this instance did not install the recorder.
    #[must_use]
    pub fn render(&self) -> Option<String> {
        self.handle.as_ref().map(PrometheusHandle::render)
    }
}

fn register_metrics() {
    describe_counter!(
        "fetchkit_requests_total",
        "Total number of transport outcomes, labelled by outcome"
    );
    describe_histogram!(
        "fetchkit_request_duration_seconds",
        "Time taken by network calls"
    );
    describe_counter!(
        "fetchkit_cache_hits_total",
        "Total number of calls answered from the response cache"
    );
    describe_counter!(
        "fetchkit_session_invalidations_total",
        "Total number of session invalidation broadcasts"
    );
}

/// Transport metrics recorder.
pub struct TransportMetrics;

impl TransportMetrics {
    /// Record the outcome of one call.
    pub fn record_outcome<T>(result: &Result<T, ApiError>) {
        counter!("fetchkit_requests_total", "outcome" => outcome_label(result)).increment(1);
    }

    /// Record the wall time of a network call.
    pub fn record_duration(duration: Duration) {
        histogram!("fetchkit_request_duration_seconds").record(duration.as_secs_f64());
    }

    /// Record a response served from the cache.
    pub fn record_cache_hit() {
        counter!("fetchkit_cache_hits_total").increment(1);
    }
}

/// Label value for the `outcome` dimension.
#[must_use]
pub const fn outcome_label<T>(result: &Result<T, ApiError>) -> &'static str {
    match result {
        Ok(_) => "success",
        Err(ApiError::Unknown) => "unknown",
        Err(ApiError::MissingTestData) => "missing_test_data",
        Err(ApiError::InvalidRequest) => "invalid_request",
        Err(ApiError::Timeout) => "timeout",
        Err(ApiError::Offline) => "offline",
        Err(ApiError::DecodeError(_)) => "decode_error",
        Err(ApiError::ResponseError { .. }) => "response_error",
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use super::*;

    #[test]
    fn test_outcome_labels() {
        assert_eq!(outcome_label::<()>(&Ok(())), "success");
        assert_eq!(outcome_label::<()>(&Err(ApiError::Timeout)), "timeout");
        assert_eq!(
            outcome_label::<()>(&Err(ApiError::ResponseError {
                status_code: 500,
                message: None,
            })),
            "response_error"
        );
    }

    #[test]
    fn test_recorder_not_installed_renders_nothing() {
        let recorder = MetricsRecorder::default();
        assert!(recorder.handle().is_none());
        assert!(recorder.render().is_none());
    }

    #[test]
    fn test_recorder_render() {
        let mut recorder = MetricsRecorder::new();
        recorder.install().unwrap();

        TransportMetrics::record_outcome::<()>(&Err(ApiError::Offline));
        TransportMetrics::record_cache_hit();
        TransportMetrics::record_duration(Duration::from_millis(20));

        // Another test may have installed the recorder first.
        if let Some(rendered) = recorder.render() {
            assert!(rendered.contains("fetchkit_requests_total"));
            assert!(rendered.contains("fetchkit_cache_hits_total"));
        }
    }
}
