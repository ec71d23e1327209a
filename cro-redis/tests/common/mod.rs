//! Test helpers for provider integration tests.

#![allow(dead_code)]

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use cro_metrics::MetricsRegistry;
use cro_redis::clients::ReplicationGroup;
use cro_redis::naming::{DEFAULT_AWS_IDENTIFIER_LENGTH, build_infra_name};
use cro_redis::reconciler::strategy::REDIS_RESOURCE_TYPE;
use cro_redis::sim::{SIM_REGION, SimulatedCloud, SimulatedKube, replication_group};
use cro_redis::{
    AwsRedisProvider, ConfigMapConfigManager, Context, ProviderConfig, Redis, RedisMonitoring,
    RedisProvider, RetryPolicy, StaticCredentialManager,
};
use serde_json::{Value, json};

pub const CLUSTER_ID: &str = "test-cluster";
pub const NAMESPACE: &str = "cro-test";
pub const NAME: &str = "cache";
pub const TIER: &str = "production";

/// A provider wired to in-memory backends.
pub struct Harness {
    pub cloud: SimulatedCloud,
    pub kube: Arc<SimulatedKube>,
    pub registry: Arc<MetricsRegistry>,
    pub provider: AwsRedisProvider,
}

impl Harness {
    /// Empty create and delete strategies for the production tier.
    pub fn new() -> Self {
        Self::with_strategies(json!({}), json!({}))
    }

    pub fn with_strategies(create: Value, delete: Value) -> Self {
        let tiers = json!({
            TIER: {"region": "", "createStrategy": create, "deleteStrategy": delete}
        });
        Self::with_document(tiers)
    }

    /// `tiers` is the redis entry of the strategy config map.
    pub fn with_document(tiers: Value) -> Self {
        Self::build(SimulatedCloud::new(), tiers)
    }

    pub fn with_cloud(cloud: SimulatedCloud) -> Self {
        let tiers = json!({
            TIER: {"region": "", "createStrategy": {}, "deleteStrategy": {}}
        });
        Self::build(cloud, tiers)
    }

    fn build(cloud: SimulatedCloud, tiers: Value) -> Self {
        let mut data = BTreeMap::new();
        data.insert(REDIS_RESOURCE_TYPE.to_string(), tiers.to_string());

        let config = ProviderConfig {
            retry: RetryPolicy::new(Duration::from_millis(5), Duration::from_millis(50)),
            ..Default::default()
        };
        let kube = Arc::new(SimulatedKube::new(CLUSTER_ID));
        let registry = Arc::new(MetricsRegistry::new());
        let provider = AwsRedisProvider::new(
            config,
            kube.clone(),
            Arc::new(StaticCredentialManager::new("AKIATEST", "secret")),
            Arc::new(ConfigMapConfigManager::new(data)),
            Arc::new(cloud.clone()),
            RedisMonitoring::new(registry.clone(), kube.clone()),
        );

        Self {
            cloud,
            kube,
            registry,
            provider,
        }
    }

    pub fn redis(&self) -> Redis {
        Redis::new(NAMESPACE, NAME, "managed", TIER)
    }

    /// Replication group id the provider derives for [`Harness::redis`].
    pub fn group_id(&self) -> String {
        build_infra_name(
            CLUSTER_ID,
            &self.redis().metadata,
            DEFAULT_AWS_IDENTIFIER_LENGTH,
        )
    }

    /// Seed a group matching the default create request.
    pub fn seed_group(&self, status: &str, members: usize) -> ReplicationGroup {
        self.seed_group_with(status, members, "cache.t2.micro", 30)
    }

    pub fn seed_group_with(
        &self,
        status: &str,
        members: usize,
        node_type: &str,
        retention: i64,
    ) -> ReplicationGroup {
        let mut group = replication_group(&self.group_id(), status, members, SIM_REGION);
        group.cache_node_type = Some(node_type.to_string());
        group.snapshot_retention_limit = Some(retention);
        self.cloud.insert_group(group.clone());
        group
    }

    /// Tick the create path until complete or `max_ticks` is reached.
    /// Returns the number of ticks taken.
    pub async fn provision(&self, redis: &mut Redis, max_ticks: u32) -> Option<u32> {
        let ctx = Context::background();
        for tick in 1..=max_ticks {
            let outcome = self.provider.create_redis(&ctx, redis).await.ok()?;
            if outcome.is_complete() {
                return Some(tick);
            }
        }
        None
    }

    /// Tick the delete path until the status comes back empty.
    pub async fn decommission(&self, redis: &mut Redis, max_ticks: u32) -> Option<u32> {
        let ctx = Context::background();
        for tick in 1..=max_ticks {
            let status = self.provider.delete_redis(&ctx, redis).await.ok()?;
            if status.is_empty() {
                return Some(tick);
            }
        }
        None
    }
}
