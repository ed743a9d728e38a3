//! Error types for telemetry operations.

use std::string::FromUtf8Error;

use thiserror::Error;
use tracing_subscriber::util::TryInitError;

/// Result alias for telemetry operations.
pub type Result<T> = std::result::Result<T, TelemetryError>;

/// Errors raised while setting up logging or metrics.
#[derive(Debug, Error)]
pub enum TelemetryError {
    /// A global tracing subscriber is already installed.
    #[error("failed to install tracing subscriber")]
    SubscriberInstall {
        /// Underlying tracing subscriber error.
        source: TryInitError,
    },
    /// A collector could not be built or registered.
    #[error("metric setup failed")]
    Metric {
        /// Setup step (`metrics.build` or `metrics.register`).
        operation: &'static str,
        /// Metric name.
        name: &'static str,
        /// Underlying Prometheus error.
        source: prometheus::Error,
    },
    /// The registry could not be encoded in the text exposition format.
    #[error("failed to render metrics")]
    Render {
        /// Underlying Prometheus error.
        source: prometheus::Error,
    },
    /// Rendered metrics were not valid UTF-8.
    #[error("rendered metrics were not utf-8")]
    RenderUtf8 {
        /// Underlying conversion error.
        source: FromUtf8Error,
    },
}

impl TelemetryError {
    pub(crate) const fn metric(
        operation: &'static str,
        name: &'static str,
        source: prometheus::Error,
    ) -> Self {
        Self::Metric {
            operation,
            name,
            source,
        }
    }
}
