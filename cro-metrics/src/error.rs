//! Metrics error types.

use thiserror::Error;

/// Errors returned by the registry and rule builder.
#[derive(Debug, Error)]
pub enum MetricsError {
    /// A family already exists with a different label key set.
    #[error("metric {name} registered with labels {expected:?}, got {actual:?}")]
    InconsistentLabels {
        name: String,
        expected: Vec<String>,
        actual: Vec<String>,
    },

    /// Metric name does not match `[a-zA-Z_:][a-zA-Z0-9_:]*`.
    #[error("invalid metric name: {0}")]
    InvalidMetricName(String),

    /// Label name does not match `[a-zA-Z_][a-zA-Z0-9_]*`.
    #[error("invalid label name {label} on metric {name}")]
    InvalidLabelName { name: String, label: String },

    /// Registration or lookup rejected by the prometheus registry.
    #[error("prometheus: {0}")]
    Prometheus(#[from] prometheus::Error),

    /// Rendered exposition was not valid UTF-8.
    #[error("encoding metrics: {0}")]
    Encoding(String),

    /// Rule object is missing a required field.
    #[error("invalid rule: {0}")]
    InvalidRule(String),
}

/// Result type for metrics operations.
pub type Result<T> = std::result::Result<T, MetricsError>;
