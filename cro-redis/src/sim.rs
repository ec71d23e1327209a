//! In-memory cloud and cluster backends.
//!
//! [`SimulatedCloud`] behaves like a single-account ElastiCache endpoint:
//! replication groups move `creating → available`, `modifying → available`
//! and `deleting → gone` as they are listed. [`SimulatedKube`] holds persisted
//! resources and PrometheusRule objects. Both count calls and accept injected
//! failures.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use cro_metrics::PrometheusRule;
use tracing::debug;

use crate::clients::{
    CacheApi, CacheCluster, CallerIdentity, CreateReplicationGroupInput,
    DeleteReplicationGroupInput, Endpoint, IdentityApi, ModifyReplicationGroupInput, NodeGroup,
    NodeGroupMember, ReplicationGroup, ResourceClient, RuleApi, STATUS_AVAILABLE, ServiceFactory,
    ServiceUpdate, Snapshot, Tag,
};
use crate::config::Credentials;
use crate::error::{
    ALREADY_EXISTS, ApiError, INVALID_REPLICATION_GROUP_STATE_FAULT, NOT_FOUND,
    REPLICATION_GROUP_ALREADY_EXISTS_FAULT, REPLICATION_GROUP_NOT_FOUND_FAULT,
};
use crate::types::Redis;

pub const SIM_ACCOUNT_ID: &str = "123456789012";
pub const SIM_REGION: &str = "eu-west-1";
const DEFAULT_PORT: i64 = 6379;

/// Operations of the simulated AWS APIs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum CloudOp {
    DescribeReplicationGroups,
    CreateReplicationGroup,
    ModifyReplicationGroup,
    DeleteReplicationGroup,
    DescribeCacheClusters,
    AddTagsToResource,
    DescribeSnapshots,
    DescribeServiceUpdates,
    GetCallerIdentity,
}

/// Operations of the simulated cluster.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum KubeOp {
    ClusterId,
    UpdateRedis,
    CreateRule,
    GetRule,
    DeleteRule,
}

/// An injected failure, optionally limited to a number of calls.
#[derive(Debug, Clone)]
struct Failure {
    error: ApiError,
    remaining: Option<u32>,
}

/// Failure table and call counters shared by both backends.
#[derive(Debug)]
struct Faults<Op: Ord> {
    failures: BTreeMap<Op, Failure>,
    calls: BTreeMap<Op, u32>,
}

impl<Op: Ord + Copy> Default for Faults<Op> {
    fn default() -> Self {
        Self {
            failures: BTreeMap::new(),
            calls: BTreeMap::new(),
        }
    }
}

impl<Op: Ord + Copy> Faults<Op> {
    /// Count a call and return the injected failure for it, if any.
    fn enter(&mut self, op: Op) -> Result<(), ApiError> {
        *self.calls.entry(op).or_default() += 1;
        let Some(failure) = self.failures.get_mut(&op) else {
            return Ok(());
        };
        let error = failure.error.clone();
        let exhausted = match &mut failure.remaining {
            None => false,
            Some(n) => {
                *n = n.saturating_sub(1);
                *n == 0
            }
        };
        if exhausted {
            self.failures.remove(&op);
        }
        Err(error)
    }

    fn count(&self, op: Op) -> u32 {
        self.calls.get(&op).copied().unwrap_or(0)
    }
}

#[derive(Debug)]
struct SimGroup {
    group: ReplicationGroup,
    /// Lists left before the current transitional status settles.
    pending_lists: u32,
    pending_modify: Option<ModifyReplicationGroupInput>,
}

#[derive(Debug, Default)]
struct CloudState {
    groups: BTreeMap<String, SimGroup>,
    node_status: BTreeMap<String, String>,
    snapshots: Vec<Snapshot>,
    service_updates: Vec<ServiceUpdate>,
    faults: Faults<CloudOp>,
    settle_after: u32,
    region: Option<String>,
    created: Vec<CreateReplicationGroupInput>,
    modified: Vec<ModifyReplicationGroupInput>,
    deleted: Vec<DeleteReplicationGroupInput>,
    tagged: Vec<(String, Vec<Tag>)>,
}

impl CloudState {
    fn advance(&mut self) {
        let mut gone = Vec::new();
        for (id, sim) in self.groups.iter_mut() {
            if sim.group.status == STATUS_AVAILABLE {
                continue;
            }
            if sim.pending_lists > 0 {
                sim.pending_lists -= 1;
                continue;
            }
            match sim.group.status.as_str() {
                "deleting" => gone.push(id.clone()),
                "modifying" => {
                    if let Some(update) = sim.pending_modify.take() {
                        if update.cache_node_type.is_some() {
                            sim.group.cache_node_type = update.cache_node_type;
                        }
                        if update.snapshot_retention_limit.is_some() {
                            sim.group.snapshot_retention_limit = update.snapshot_retention_limit;
                        }
                    }
                    set_group_status(&mut sim.group, STATUS_AVAILABLE);
                }
                "creating" => set_group_status(&mut sim.group, STATUS_AVAILABLE),
                _ => {}
            }
        }
        for id in gone {
            debug!("Simulated replication group {} deleted", id);
            self.groups.remove(&id);
        }
    }

    fn owning_group(&self, cache_cluster_id: &str) -> Option<&ReplicationGroup> {
        self.groups.values().map(|s| &s.group).find(|g| {
            g.node_groups.iter().any(|ng| {
                ng.node_group_members
                    .iter()
                    .any(|m| m.cache_cluster_id == cache_cluster_id)
            })
        })
    }
}

fn set_group_status(group: &mut ReplicationGroup, status: &str) {
    group.status = status.to_string();
    for node_group in &mut group.node_groups {
        node_group.status = status.to_string();
    }
}

/// A replication group with one node group of `members` nodes in `region`.
pub fn replication_group(
    id: &str,
    status: &str,
    members: usize,
    region: &str,
) -> ReplicationGroup {
    let node_group_members = (1..=members)
        .map(|i| {
            let role = if i == 1 { "primary" } else { "replica" };
            NodeGroupMember {
                cache_cluster_id: format!("{}-{:03}", id, i),
                cache_node_id: "0001".to_string(),
                preferred_availability_zone: format!("{}a", region),
                current_role: Some(role.to_string()),
            }
        })
        .collect();
    ReplicationGroup {
        replication_group_id: id.to_string(),
        description: String::new(),
        status: status.to_string(),
        cache_node_type: None,
        snapshot_retention_limit: None,
        node_groups: vec![NodeGroup {
            node_group_id: "0001".to_string(),
            status: status.to_string(),
            primary_endpoint: Some(Endpoint {
                address: format!("{}.sim.cache.amazonaws.com", id),
                port: DEFAULT_PORT,
            }),
            node_group_members,
        }],
    }
}

/// Shared in-memory ElastiCache and STS.
#[derive(Debug, Clone, Default)]
pub struct SimulatedCloud {
    state: Arc<Mutex<CloudState>>,
}

impl SimulatedCloud {
    /// Transitional states settle on the second list after the mutation.
    pub fn new() -> Self {
        Self::with_settle_after(1)
    }

    /// Transitional states settle after `lists` further list calls.
    pub fn with_settle_after(lists: u32) -> Self {
        let cloud = Self::default();
        cloud.state().settle_after = lists;
        cloud
    }

    fn state(&self) -> MutexGuard<'_, CloudState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Seed an existing replication group. Seeded groups keep their status
    /// until they are modified or deleted.
    pub fn insert_group(&self, group: ReplicationGroup) {
        self.state().groups.insert(
            group.replication_group_id.clone(),
            SimGroup {
                group,
                pending_lists: u32::MAX,
                pending_modify: None,
            },
        );
    }

    pub fn group(&self, id: &str) -> Option<ReplicationGroup> {
        self.state().groups.get(id).map(|s| s.group.clone())
    }

    pub fn group_ids(&self) -> Vec<String> {
        self.state().groups.keys().cloned().collect()
    }

    /// Override the status a single cache node reports.
    pub fn set_node_status(&self, cache_cluster_id: &str, status: &str) {
        self.state()
            .node_status
            .insert(cache_cluster_id.to_string(), status.to_string());
    }

    pub fn add_snapshot(&self, snapshot_name: &str, cache_cluster_id: &str) {
        self.state().snapshots.push(Snapshot {
            snapshot_name: snapshot_name.to_string(),
            cache_cluster_id: Some(cache_cluster_id.to_string()),
            replication_group_id: None,
        });
    }

    pub fn add_service_update(&self, update: ServiceUpdate) {
        self.state().service_updates.push(update);
    }

    /// Fail every call to `op` with `error` until cleared.
    pub fn fail(&self, op: CloudOp, error: ApiError) {
        self.state().faults.failures.insert(
            op,
            Failure {
                error,
                remaining: None,
            },
        );
    }

    /// Fail the next `times` calls to `op`.
    pub fn fail_times(&self, op: CloudOp, error: ApiError, times: u32) {
        if times == 0 {
            return;
        }
        self.state().faults.failures.insert(
            op,
            Failure {
                error,
                remaining: Some(times),
            },
        );
    }

    pub fn clear_failure(&self, op: CloudOp) {
        self.state().faults.failures.remove(&op);
    }

    pub fn calls(&self, op: CloudOp) -> u32 {
        self.state().faults.count(op)
    }

    /// Total create, modify, delete and tag calls.
    pub fn mutation_calls(&self) -> u32 {
        [
            CloudOp::CreateReplicationGroup,
            CloudOp::ModifyReplicationGroup,
            CloudOp::DeleteReplicationGroup,
            CloudOp::AddTagsToResource,
        ]
        .into_iter()
        .map(|op| self.calls(op))
        .sum()
    }

    pub fn created(&self) -> Vec<CreateReplicationGroupInput> {
        self.state().created.clone()
    }

    pub fn modified(&self) -> Vec<ModifyReplicationGroupInput> {
        self.state().modified.clone()
    }

    pub fn deleted(&self) -> Vec<DeleteReplicationGroupInput> {
        self.state().deleted.clone()
    }

    /// `(arn, tags)` of every successful tag call, in order.
    pub fn tagged(&self) -> Vec<(String, Vec<Tag>)> {
        self.state().tagged.clone()
    }

    /// Region of the most recently built client pair.
    pub fn region(&self) -> Option<String> {
        self.state().region.clone()
    }
}

#[async_trait]
impl CacheApi for SimulatedCloud {
    async fn describe_replication_groups(&self) -> Result<Vec<ReplicationGroup>, ApiError> {
        let mut state = self.state();
        state.faults.enter(CloudOp::DescribeReplicationGroups)?;
        state.advance();
        Ok(state.groups.values().map(|s| s.group.clone()).collect())
    }

    async fn create_replication_group(
        &self,
        input: &CreateReplicationGroupInput,
    ) -> Result<ReplicationGroup, ApiError> {
        let mut state = self.state();
        state.faults.enter(CloudOp::CreateReplicationGroup)?;

        let id = input.replication_group_id.clone().unwrap_or_default();
        if id.is_empty() {
            return Err(ApiError::new(
                "InvalidParameterValue",
                "ReplicationGroupId is required",
            ));
        }
        if state.groups.contains_key(&id) {
            return Err(ApiError::new(
                REPLICATION_GROUP_ALREADY_EXISTS_FAULT,
                format!("replication group {} already exists", id),
            ));
        }

        let region = state.region.clone().unwrap_or_else(|| SIM_REGION.to_string());
        let members = usize::try_from(input.num_cache_clusters.unwrap_or(1)).unwrap_or(1);
        let mut group = replication_group(&id, "creating", members.max(1), &region);
        group.description = input.replication_group_description.clone().unwrap_or_default();
        group.cache_node_type = input.cache_node_type.clone();
        group.snapshot_retention_limit = input.snapshot_retention_limit;
        if let (Some(port), Some(ng)) = (input.port, group.node_groups.first_mut()) {
            if let Some(endpoint) = &mut ng.primary_endpoint {
                endpoint.port = port;
            }
        }

        let pending_lists = state.settle_after;
        state.groups.insert(
            id,
            SimGroup {
                group: group.clone(),
                pending_lists,
                pending_modify: None,
            },
        );
        state.created.push(input.clone());
        Ok(group)
    }

    async fn modify_replication_group(
        &self,
        input: &ModifyReplicationGroupInput,
    ) -> Result<ReplicationGroup, ApiError> {
        let mut state = self.state();
        state.faults.enter(CloudOp::ModifyReplicationGroup)?;

        let pending_lists = state.settle_after;
        let Some(sim) = state.groups.get_mut(&input.replication_group_id) else {
            return Err(ApiError::new(
                REPLICATION_GROUP_NOT_FOUND_FAULT,
                format!("replication group {} not found", input.replication_group_id),
            ));
        };
        if sim.group.status != STATUS_AVAILABLE {
            return Err(ApiError::new(
                INVALID_REPLICATION_GROUP_STATE_FAULT,
                format!("replication group is {}", sim.group.status),
            ));
        }
        set_group_status(&mut sim.group, "modifying");
        sim.pending_lists = pending_lists;
        sim.pending_modify = Some(input.clone());
        let group = sim.group.clone();

        state.modified.push(input.clone());
        Ok(group)
    }

    async fn delete_replication_group(
        &self,
        input: &DeleteReplicationGroupInput,
    ) -> Result<(), ApiError> {
        let mut state = self.state();
        state.faults.enter(CloudOp::DeleteReplicationGroup)?;

        let id = input.replication_group_id.clone().unwrap_or_default();
        let pending_lists = state.settle_after;
        let Some(sim) = state.groups.get_mut(&id) else {
            return Err(ApiError::new(
                REPLICATION_GROUP_NOT_FOUND_FAULT,
                format!("replication group {} not found", id),
            ));
        };
        if sim.group.status == "deleting" {
            return Err(ApiError::new(
                INVALID_REPLICATION_GROUP_STATE_FAULT,
                "replication group is already being deleted",
            ));
        }
        set_group_status(&mut sim.group, "deleting");
        sim.pending_lists = pending_lists;

        if let Some(name) = input.final_snapshot_identifier.clone() {
            state.snapshots.push(Snapshot {
                snapshot_name: name,
                cache_cluster_id: None,
                replication_group_id: Some(id),
            });
        }
        state.deleted.push(input.clone());
        Ok(())
    }

    async fn describe_cache_clusters(
        &self,
        cache_cluster_id: &str,
    ) -> Result<Vec<CacheCluster>, ApiError> {
        let mut state = self.state();
        state.faults.enter(CloudOp::DescribeCacheClusters)?;

        let status = match state.node_status.get(cache_cluster_id) {
            Some(status) => status.clone(),
            None => state
                .owning_group(cache_cluster_id)
                .map(|g| g.status.clone())
                .ok_or_else(|| {
                    ApiError::new(
                        "CacheClusterNotFound",
                        format!("cache cluster {} not found", cache_cluster_id),
                    )
                })?,
        };
        Ok(vec![CacheCluster {
            cache_cluster_id: cache_cluster_id.to_string(),
            cache_cluster_status: status,
        }])
    }

    async fn add_tags_to_resource(&self, arn: &str, tags: &[Tag]) -> Result<(), ApiError> {
        let mut state = self.state();
        state.faults.enter(CloudOp::AddTagsToResource)?;
        state.tagged.push((arn.to_string(), tags.to_vec()));
        Ok(())
    }

    async fn describe_snapshots(&self, cache_cluster_id: &str) -> Result<Vec<Snapshot>, ApiError> {
        let mut state = self.state();
        state.faults.enter(CloudOp::DescribeSnapshots)?;
        Ok(state
            .snapshots
            .iter()
            .filter(|s| s.cache_cluster_id.as_deref() == Some(cache_cluster_id))
            .cloned()
            .collect())
    }

    async fn describe_service_updates(&self) -> Result<Vec<ServiceUpdate>, ApiError> {
        let mut state = self.state();
        state.faults.enter(CloudOp::DescribeServiceUpdates)?;
        Ok(state.service_updates.clone())
    }
}

#[async_trait]
impl IdentityApi for SimulatedCloud {
    async fn get_caller_identity(&self) -> Result<CallerIdentity, ApiError> {
        self.state().faults.enter(CloudOp::GetCallerIdentity)?;
        Ok(CallerIdentity {
            account: SIM_ACCOUNT_ID.to_string(),
            arn: format!("arn:aws:iam::{}:user/cloud-resources", SIM_ACCOUNT_ID),
            user_id: "AIDASIMULATED".to_string(),
        })
    }
}

impl ServiceFactory for SimulatedCloud {
    fn cache_services(
        &self,
        region: &str,
        credentials: &Credentials,
    ) -> (Arc<dyn CacheApi>, Arc<dyn IdentityApi>) {
        debug!(
            "Building simulated clients for {} with key {}",
            region, credentials.access_key_id
        );
        self.state().region = Some(region.to_string());
        (Arc::new(self.clone()), Arc::new(self.clone()))
    }
}

#[derive(Debug, Default)]
struct KubeState {
    cluster_id: String,
    resources: BTreeMap<(String, String), Redis>,
    rules: BTreeMap<(String, String), PrometheusRule>,
    faults: Faults<KubeOp>,
}

/// In-memory cluster: persisted resources and PrometheusRule objects.
#[derive(Debug, Clone, Default)]
pub struct SimulatedKube {
    state: Arc<Mutex<KubeState>>,
}

impl SimulatedKube {
    pub fn new(cluster_id: &str) -> Self {
        let kube = Self::default();
        kube.state().cluster_id = cluster_id.to_string();
        kube
    }

    fn state(&self) -> MutexGuard<'_, KubeState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Last persisted copy of a resource.
    pub fn stored(&self, namespace: &str, name: &str) -> Option<Redis> {
        self.state()
            .resources
            .get(&(namespace.to_string(), name.to_string()))
            .cloned()
    }

    pub fn rule(&self, namespace: &str, name: &str) -> Option<PrometheusRule> {
        self.state()
            .rules
            .get(&(namespace.to_string(), name.to_string()))
            .cloned()
    }

    pub fn rule_count(&self) -> usize {
        self.state().rules.len()
    }

    pub fn fail(&self, op: KubeOp, error: ApiError) {
        self.state().faults.failures.insert(
            op,
            Failure {
                error,
                remaining: None,
            },
        );
    }

    pub fn clear_failure(&self, op: KubeOp) {
        self.state().faults.failures.remove(&op);
    }

    pub fn calls(&self, op: KubeOp) -> u32 {
        self.state().faults.count(op)
    }
}

#[async_trait]
impl ResourceClient for SimulatedKube {
    async fn cluster_id(&self) -> Result<String, ApiError> {
        let mut state = self.state();
        state.faults.enter(KubeOp::ClusterId)?;
        Ok(state.cluster_id.clone())
    }

    async fn update_redis(&self, redis: &Redis) -> Result<(), ApiError> {
        let mut state = self.state();
        state.faults.enter(KubeOp::UpdateRedis)?;
        state.resources.insert(
            (redis.namespace().to_string(), redis.name().to_string()),
            redis.clone(),
        );
        Ok(())
    }
}

#[async_trait]
impl RuleApi for SimulatedKube {
    async fn create(&self, rule: &PrometheusRule) -> Result<(), ApiError> {
        let mut state = self.state();
        state.faults.enter(KubeOp::CreateRule)?;
        let key = (rule.metadata.namespace.clone(), rule.metadata.name.clone());
        if state.rules.contains_key(&key) {
            return Err(ApiError::new(
                ALREADY_EXISTS,
                format!("prometheusrule {} already exists", key.1),
            ));
        }
        state.rules.insert(key, rule.clone());
        Ok(())
    }

    async fn get(&self, namespace: &str, name: &str) -> Result<PrometheusRule, ApiError> {
        let mut state = self.state();
        state.faults.enter(KubeOp::GetRule)?;
        state
            .rules
            .get(&(namespace.to_string(), name.to_string()))
            .cloned()
            .ok_or_else(|| ApiError::new(NOT_FOUND, format!("prometheusrule {} not found", name)))
    }

    async fn delete(&self, namespace: &str, name: &str) -> Result<(), ApiError> {
        let mut state = self.state();
        state.faults.enter(KubeOp::DeleteRule)?;
        state
            .rules
            .remove(&(namespace.to_string(), name.to_string()))
            .map(|_| ())
            .ok_or_else(|| ApiError::new(NOT_FOUND, format!("prometheusrule {} not found", name)))
    }
}
