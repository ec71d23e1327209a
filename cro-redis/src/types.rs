//! Desired-state types for Redis resources.
//!
//! A [`Redis`] is owned by the caller. The provider only mutates its status
//! and its finalizer list.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Label on the resource carrying the product name used for tagging.
pub const PRODUCT_NAME_LABEL: &str = "productName";

/// Object metadata (the subset of Kubernetes ObjectMeta the provider reads).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ObjectMeta {
    pub name: String,
    pub namespace: String,
    #[serde(default)]
    pub labels: BTreeMap<String, String>,
    #[serde(default)]
    pub finalizers: Vec<String>,
    /// Set once deletion has been requested upstream.
    #[serde(default)]
    pub deletion_timestamp: Option<String>,
}

impl ObjectMeta {
    pub fn has_finalizer(&self, finalizer: &str) -> bool {
        self.finalizers.iter().any(|f| f == finalizer)
    }

    /// Add `finalizer` if missing. Returns true if the list changed.
    pub fn add_finalizer(&mut self, finalizer: &str) -> bool {
        if self.has_finalizer(finalizer) {
            return false;
        }
        self.finalizers.push(finalizer.to_string());
        true
    }

    /// Remove every occurrence of `finalizer`. Returns true if the list changed.
    pub fn remove_finalizer(&mut self, finalizer: &str) -> bool {
        let before = self.finalizers.len();
        self.finalizers.retain(|f| f != finalizer);
        before != self.finalizers.len()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RedisSpec {
    /// Resource type label, e.g. `managed` or `workshop`.
    #[serde(rename = "type")]
    pub resource_type: String,
    /// Strategy tier, e.g. `production`.
    pub tier: String,
}

/// Lifecycle phase reported on the resource status.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum StatusPhase {
    #[default]
    #[serde(rename = "")]
    Unknown,
    #[serde(rename = "in progress")]
    InProgress,
    #[serde(rename = "complete")]
    Complete,
    #[serde(rename = "failed")]
    Failed,
    #[serde(rename = "deleted")]
    Deleted,
}

impl fmt::Display for StatusPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            StatusPhase::Unknown => "",
            StatusPhase::InProgress => "in progress",
            StatusPhase::Complete => "complete",
            StatusPhase::Failed => "failed",
            StatusPhase::Deleted => "deleted",
        };
        f.write_str(s)
    }
}

/// Human-readable progress message persisted on the resource status.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StatusMessage(String);

impl StatusMessage {
    pub fn empty() -> Self {
        Self(String::new())
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Prefix the message, keeping the original text after `prefix`.
    pub fn wrap(&self, prefix: &str) -> Self {
        Self(format!("{}: {}", prefix, self.0))
    }
}

impl fmt::Display for StatusMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for StatusMessage {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for StatusMessage {
    fn from(s: String) -> Self {
        Self(s)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RedisStatus {
    pub phase: StatusPhase,
    pub message: StatusMessage,
    /// Provider that last reconciled the resource.
    #[serde(default)]
    pub provider: String,
}

/// A request for a managed Redis instance.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Redis {
    pub metadata: ObjectMeta,
    pub spec: RedisSpec,
    #[serde(default)]
    pub status: RedisStatus,
}

impl Redis {
    pub fn new(namespace: &str, name: &str, resource_type: &str, tier: &str) -> Self {
        Self {
            metadata: ObjectMeta {
                name: name.to_string(),
                namespace: namespace.to_string(),
                ..Default::default()
            },
            spec: RedisSpec {
                resource_type: resource_type.to_string(),
                tier: tier.to_string(),
            },
            status: RedisStatus::default(),
        }
    }

    pub fn name(&self) -> &str {
        &self.metadata.name
    }

    pub fn namespace(&self) -> &str {
        &self.metadata.namespace
    }

    /// Product label, if present and non-empty.
    pub fn product_name(&self) -> Option<&str> {
        self.metadata
            .labels
            .get(PRODUCT_NAME_LABEL)
            .map(String::as_str)
            .filter(|p| !p.is_empty())
    }
}

/// Connection details of a provisioned instance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RedisDeploymentDetails {
    pub uri: String,
    pub port: i64,
}

/// Result of a successful provision.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RedisCluster {
    pub deployment_details: RedisDeploymentDetails,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_finalizer_add_and_remove() {
        let mut meta = ObjectMeta::default();
        assert!(meta.add_finalizer("f"));
        assert!(!meta.add_finalizer("f"));
        assert_eq!(meta.finalizers, vec!["f".to_string()]);
        assert!(meta.remove_finalizer("f"));
        assert!(!meta.remove_finalizer("f"));
        assert!(meta.finalizers.is_empty());
    }

    #[test]
    fn test_product_name_ignores_empty_label() {
        let mut r = Redis::new("ns", "cache", "managed", "production");
        assert_eq!(r.product_name(), None);
        r.metadata
            .labels
            .insert(PRODUCT_NAME_LABEL.to_string(), String::new());
        assert_eq!(r.product_name(), None);
        r.metadata
            .labels
            .insert(PRODUCT_NAME_LABEL.to_string(), "sso".to_string());
        assert_eq!(r.product_name(), Some("sso"));
    }

    #[test]
    fn test_status_phase_serializes_like_operator() {
        assert_eq!(
            serde_json::to_string(&StatusPhase::InProgress).unwrap(),
            "\"in progress\""
        );
        assert_eq!(serde_json::to_string(&StatusPhase::Unknown).unwrap(), "\"\"");
    }
}
