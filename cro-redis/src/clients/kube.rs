//! Cluster-side collaborators: the desired resource store and alert rules.

use async_trait::async_trait;
use cro_metrics::PrometheusRule;

use crate::error::ApiError;
use crate::types::Redis;

/// Access to the cluster the provider runs in.
#[async_trait]
pub trait ResourceClient: Send + Sync {
    /// Infrastructure identifier of the cluster, used in names, tags and metric labels.
    async fn cluster_id(&self) -> Result<String, ApiError>;

    /// Persist the resource (metadata and status).
    async fn update_redis(&self, redis: &Redis) -> Result<(), ApiError>;
}

/// PrometheusRule object store.
#[async_trait]
pub trait RuleApi: Send + Sync {
    /// Create the rule. Fails with an `AlreadyExists` error if present.
    async fn create(&self, rule: &PrometheusRule) -> Result<(), ApiError>;

    /// Fetch a rule. Fails with a `NotFound` error if absent.
    async fn get(&self, namespace: &str, name: &str) -> Result<PrometheusRule, ApiError>;

    async fn delete(&self, namespace: &str, name: &str) -> Result<(), ApiError>;
}
