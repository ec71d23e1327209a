//! Clients for the systems the provider talks to.
//!
//! - ElastiCache: replication groups, cache clusters, snapshots, tags, service updates
//! - STS: account identity for building ARNs
//! - The cluster: desired resource persistence and PrometheusRule objects

pub mod elasticache;
pub mod kube;
pub mod sts;

use std::sync::Arc;

pub use elasticache::{
    CacheApi, CacheCluster, CreateReplicationGroupInput, DeleteReplicationGroupInput, Endpoint,
    ModifyReplicationGroupInput, NodeGroup, NodeGroupMember, ReplicationGroup, STATUS_AVAILABLE,
    ServiceUpdate, Snapshot, Tag,
};
pub use kube::{ResourceClient, RuleApi};
pub use sts::{CallerIdentity, IdentityApi};

use crate::config::Credentials;

/// Builds region-scoped AWS clients from provider credentials.
pub trait ServiceFactory: Send + Sync {
    fn cache_services(
        &self,
        region: &str,
        credentials: &Credentials,
    ) -> (Arc<dyn CacheApi>, Arc<dyn IdentityApi>);
}
