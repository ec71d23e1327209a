//! Provider error types.

use std::time::Duration;

use thiserror::Error;

use crate::types::StatusMessage;

/// Error code ElastiCache returns when a replication group does not exist.
pub const REPLICATION_GROUP_NOT_FOUND_FAULT: &str = "ReplicationGroupNotFoundFault";
/// Error code ElastiCache returns when a replication group id is taken.
pub const REPLICATION_GROUP_ALREADY_EXISTS_FAULT: &str = "ReplicationGroupAlreadyExistsFault";
/// Error code for operations on a group in the wrong state.
pub const INVALID_REPLICATION_GROUP_STATE_FAULT: &str = "InvalidReplicationGroupState";
/// Generic object-store codes.
pub const NOT_FOUND: &str = "NotFound";
pub const ALREADY_EXISTS: &str = "AlreadyExists";

/// Failure reported by a remote or object-store API.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{code}: {message}")]
pub struct ApiError {
    pub code: String,
    pub message: String,
}

impl ApiError {
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
        }
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(NOT_FOUND, message)
    }

    pub fn already_exists(message: impl Into<String>) -> Self {
        Self::new(ALREADY_EXISTS, message)
    }

    pub fn is_not_found(&self) -> bool {
        self.code == NOT_FOUND
    }

    pub fn is_already_exists(&self) -> bool {
        self.code == ALREADY_EXISTS
    }

    pub fn is_replication_group_not_found(&self) -> bool {
        self.code == REPLICATION_GROUP_NOT_FOUND_FAULT
    }
}

/// Strategy lookup or decoding failure.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// No strategy document for the resource type.
    #[error("no strategy configured for resource type {0}")]
    MissingResourceType(String),

    /// The resource type document has no entry for the tier.
    #[error("no {resource_type} strategy found for tier {tier}")]
    MissingTier { resource_type: String, tier: String },

    /// A strategy document or blob failed to decode.
    #[error("failed to unmarshal {what}: {source}")]
    Decode {
        what: String,
        #[source]
        source: serde_json::Error,
    },
}

/// Errors raised while converging a Redis resource.
#[derive(Debug, Error)]
pub enum ProviderError {
    /// Strategy or parameter blob missing or malformed. Recurs until config is fixed.
    #[error("config resolution failed: {0}")]
    ConfigResolution(#[from] ConfigError),

    /// Discovery did not succeed within the retry window.
    #[error("{op} did not succeed after {attempts} attempts in {elapsed:?}")]
    RemoteUnavailable {
        op: String,
        attempts: u32,
        elapsed: Duration,
        #[source]
        last: Option<ApiError>,
    },

    /// A create/modify/delete/tag/describe call failed.
    #[error("{op}: {source}")]
    RemoteMutation {
        op: String,
        #[source]
        source: ApiError,
    },

    /// A local lookup (cluster identity, credentials, alert rule) failed.
    #[error("{op}: {source}")]
    LocalLookup {
        op: String,
        #[source]
        source: ApiError,
    },

    /// Persisting the desired resource failed.
    #[error("{op}: {source}")]
    LocalPersistence {
        op: String,
        #[source]
        source: ApiError,
    },

    #[error("metrics: {0}")]
    Metrics(#[from] cro_metrics::MetricsError),

    /// The caller cancelled the tick.
    #[error("cancelled before {0}")]
    Cancelled(String),
}

impl ProviderError {
    pub fn remote(op: impl Into<String>, source: ApiError) -> Self {
        Self::RemoteMutation {
            op: op.into(),
            source,
        }
    }

    pub fn lookup(op: impl Into<String>, source: ApiError) -> Self {
        Self::LocalLookup {
            op: op.into(),
            source,
        }
    }

    pub fn persistence(op: impl Into<String>, source: ApiError) -> Self {
        Self::LocalPersistence {
            op: op.into(),
            source,
        }
    }

    /// Whether requeueing can clear the error without a configuration change.
    pub fn is_retryable(&self) -> bool {
        !matches!(self, ProviderError::ConfigResolution(_))
    }
}

/// A failed tick: the status to persist plus the cause.
#[derive(Debug, Error)]
#[error("{status}: {source}")]
pub struct ReconcileError {
    pub status: StatusMessage,
    #[source]
    pub source: ProviderError,
}

impl ReconcileError {
    pub fn new(status: impl Into<StatusMessage>, source: impl Into<ProviderError>) -> Self {
        Self {
            status: status.into(),
            source: source.into(),
        }
    }

    pub fn is_retryable(&self) -> bool {
        self.source.is_retryable()
    }

    /// Replace the status with `prefix: <status>`, keeping the cause.
    pub fn wrap_status(self, prefix: &str) -> Self {
        Self {
            status: self.status.wrap(prefix),
            source: self.source,
        }
    }
}
