//! Ownership tags on cache nodes and their snapshots.
//!
//! Tags are re-sent in full on every tick. `AddTagsToResource` upserts by key.

use tracing::info;

use super::remote_call;
use crate::clients::{CacheApi, IdentityApi, NodeGroupMember, STATUS_AVAILABLE, Tag};
use crate::context::Context;
use crate::error::{ApiError, ProviderError, ReconcileError};
use crate::types::Redis;

/// Outcome of tagging a single node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TagOutcome {
    /// Node and all of its snapshots carry the tag set.
    Tagged { snapshots: usize },
    /// The node is not available yet; nothing was tagged.
    Skipped { cache_cluster_id: String, status: String },
}

/// The mandatory tag set plus `product-name` when the resource has a product label.
pub fn build_cache_tags(prefix: &str, cluster_id: &str, r: &Redis) -> Vec<Tag> {
    let mut tags = vec![
        Tag::new(format!("{}clusterID", prefix), cluster_id),
        Tag::new(format!("{}resource-type", prefix), &r.spec.resource_type),
        Tag::new(format!("{}resource-name", prefix), r.name()),
    ];
    if let Some(product) = r.product_name() {
        tags.push(Tag::new(format!("{}product-name", prefix), product));
    }
    tags
}

/// Region of an availability zone, e.g. `eu-west-1a` → `eu-west-1`.
pub fn region_from_availability_zone(zone: &str) -> Option<&str> {
    let mut chars = zone.chars();
    chars.next_back()?;
    let region = chars.as_str();
    (!region.is_empty()).then_some(region)
}

pub fn cluster_arn(region: &str, account: &str, cache_cluster_id: &str) -> String {
    format!(
        "arn:aws:elasticache:{}:{}:cluster:{}",
        region, account, cache_cluster_id
    )
}

pub fn snapshot_arn(region: &str, account: &str, snapshot_name: &str) -> String {
    format!(
        "arn:aws:elasticache:{}:{}:snapshot:{}",
        region, account, snapshot_name
    )
}

/// Tag one node and every snapshot taken from it.
///
/// Node availability is re-checked with a describe call because a node can
/// lag behind its replication group.
pub async fn tag_elasticache_node(
    ctx: &Context,
    cache: &dyn CacheApi,
    identity: &dyn IdentityApi,
    member: &NodeGroupMember,
    tags: &[Tag],
) -> Result<TagOutcome, ReconcileError> {
    let node_id = &member.cache_cluster_id;

    let clusters = remote_call(
        ctx,
        "describe cache clusters",
        "failed to get cache cluster output",
        cache.describe_cache_clusters(node_id),
    )
    .await?;
    let status = clusters
        .first()
        .map(|c| c.cache_cluster_status.clone())
        .unwrap_or_default();
    if status != STATUS_AVAILABLE {
        info!("{} status is {}, skipping adding tags", node_id, status);
        return Ok(TagOutcome::Skipped {
            cache_cluster_id: node_id.clone(),
            status,
        });
    }

    let caller = remote_call(
        ctx,
        "get caller identity",
        "failed to get account identity",
        identity.get_caller_identity(),
    )
    .await?;

    let region = region_from_availability_zone(&member.preferred_availability_zone)
        .ok_or_else(|| {
            ReconcileError::new(
                format!("cache node {} has no availability zone", node_id),
                ProviderError::remote(
                    "resolve node region",
                    ApiError::new("InvalidAvailabilityZone", node_id.clone()),
                ),
            )
        })?;

    let arn = cluster_arn(region, &caller.account, node_id);
    remote_call(
        ctx,
        "add tags to resource",
        "failed to add tags to aws elasticache",
        cache.add_tags_to_resource(&arn, tags),
    )
    .await?;

    let snapshots = remote_call(
        ctx,
        "describe snapshots",
        "failed to describe aws elasticache snapshots",
        cache.describe_snapshots(node_id),
    )
    .await?;

    for snapshot in &snapshots {
        info!("Adding operator tags to snapshot: {}", snapshot.snapshot_name);
        let arn = snapshot_arn(region, &caller.account, &snapshot.snapshot_name);
        remote_call(
            ctx,
            "add tags to resource",
            "failed to add tags to aws elasticache snapshot",
            cache.add_tags_to_resource(&arn, tags),
        )
        .await?;
    }

    info!("Successfully created or updated tags on elasticache node {}", node_id);
    Ok(TagOutcome::Tagged {
        snapshots: snapshots.len(),
    })
}
