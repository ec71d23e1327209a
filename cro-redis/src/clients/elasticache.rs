//! ElastiCache API surface used by the provider.
//!
//! Request types decode from the strategy blobs, so they keep the AWS field
//! names (PascalCase) and reject unknown fields.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::ApiError;

/// Status string ElastiCache reports for ready groups, node groups and clusters.
pub const STATUS_AVAILABLE: &str = "available";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Tag {
    pub key: String,
    pub value: String,
}

impl Tag {
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
        }
    }
}

/// Parameters of `CreateReplicationGroup`. Unset fields are `None`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", deny_unknown_fields)]
pub struct CreateReplicationGroupInput {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub replication_group_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub replication_group_description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cache_node_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub engine: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub engine_version: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub num_cache_clusters: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub automatic_failover_enabled: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub snapshot_retention_limit: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub snapshot_window: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub preferred_maintenance_window: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cache_parameter_group_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cache_subnet_group_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub security_group_ids: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub port: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub at_rest_encryption_enabled: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transit_encryption_enabled: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kms_key_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tags: Option<Vec<Tag>>,
}

/// Parameters of `ModifyReplicationGroup`. Only changed fields are set.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ModifyReplicationGroupInput {
    pub replication_group_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cache_node_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub snapshot_retention_limit: Option<i64>,
}

/// Parameters of `DeleteReplicationGroup`.
///
/// `final_snapshot_identifier`: absent means no final snapshot, an empty
/// string asks for a generated name, anything else is used as given.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", deny_unknown_fields)]
pub struct DeleteReplicationGroupInput {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub replication_group_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub retain_primary_cluster: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub final_snapshot_identifier: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoint {
    pub address: String,
    pub port: i64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeGroupMember {
    pub cache_cluster_id: String,
    pub cache_node_id: String,
    pub preferred_availability_zone: String,
    pub current_role: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeGroup {
    pub node_group_id: String,
    pub status: String,
    pub primary_endpoint: Option<Endpoint>,
    pub node_group_members: Vec<NodeGroupMember>,
}

/// Observed replication group.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReplicationGroup {
    pub replication_group_id: String,
    pub description: String,
    pub status: String,
    pub cache_node_type: Option<String>,
    pub snapshot_retention_limit: Option<i64>,
    pub node_groups: Vec<NodeGroup>,
}

impl ReplicationGroup {
    pub fn is_available(&self) -> bool {
        self.status == STATUS_AVAILABLE
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheCluster {
    pub cache_cluster_id: String,
    pub cache_cluster_status: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Snapshot {
    pub snapshot_name: String,
    pub cache_cluster_id: Option<String>,
    pub replication_group_id: Option<String>,
}

/// A pending ElastiCache service update (maintenance).
#[derive(Debug, Clone, PartialEq)]
pub struct ServiceUpdate {
    pub service_update_name: String,
    pub engine: String,
    pub estimated_update_time: String,
    pub service_update_description: String,
    pub auto_update_after_recommended_apply_by_date: bool,
    pub service_update_end_date: DateTime<Utc>,
    pub service_update_recommended_apply_by_date: DateTime<Utc>,
    pub service_update_release_date: DateTime<Utc>,
    pub service_update_severity: String,
    pub service_update_status: String,
    pub service_update_type: String,
}

/// ElastiCache operations the provider issues.
#[async_trait]
pub trait CacheApi: Send + Sync {
    /// List replication groups (single page).
    async fn describe_replication_groups(&self) -> Result<Vec<ReplicationGroup>, ApiError>;

    async fn create_replication_group(
        &self,
        input: &CreateReplicationGroupInput,
    ) -> Result<ReplicationGroup, ApiError>;

    async fn modify_replication_group(
        &self,
        input: &ModifyReplicationGroupInput,
    ) -> Result<ReplicationGroup, ApiError>;

    async fn delete_replication_group(
        &self,
        input: &DeleteReplicationGroupInput,
    ) -> Result<(), ApiError>;

    /// Describe one cache cluster (a node of a replication group).
    async fn describe_cache_clusters(
        &self,
        cache_cluster_id: &str,
    ) -> Result<Vec<CacheCluster>, ApiError>;

    /// Upsert tags on the resource with the given ARN.
    async fn add_tags_to_resource(&self, arn: &str, tags: &[Tag]) -> Result<(), ApiError>;

    /// Snapshots taken from one cache cluster.
    async fn describe_snapshots(&self, cache_cluster_id: &str) -> Result<Vec<Snapshot>, ApiError>;

    async fn describe_service_updates(&self) -> Result<Vec<ServiceUpdate>, ApiError>;
}
