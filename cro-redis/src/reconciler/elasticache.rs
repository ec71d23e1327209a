//! AWS ElastiCache Redis provider.
//!
//! Create path, per tick:
//! - absent: ensure the alert rule, issue create
//! - present but not available: refresh metrics, report progress
//! - available with drift: issue one modify
//! - available, first node group not ready: wait
//! - otherwise: tag nodes and snapshots, return the endpoint
//!
//! Delete path, per tick:
//! - absent: remove the finalizer
//! - present but not available: refresh metrics, report progress
//! - available: delete the alert rule, then the replication group

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use tracing::{debug, info, warn};

use super::builder::{build_create_config, build_delete_config};
use super::drift::build_update_strategy;
use super::observability::{AlertDeletion, RedisMonitoring};
use super::scanner::{find_replication_group, list_replication_groups};
use super::strategy::{ResolvedStrategy, resolve_strategy};
use super::tagging::{TagOutcome, build_cache_tags, tag_elasticache_node};
use super::{ProvisionOutcome, RedisProvider, checked_call, remote_call};
use crate::clients::{
    CacheApi, CreateReplicationGroupInput, DeleteReplicationGroupInput, IdentityApi,
    ReplicationGroup, ResourceClient, STATUS_AVAILABLE, ServiceFactory,
};
use crate::config::{ConfigManager, CredentialManager, ProviderConfig};
use crate::context::Context;
use crate::error::{ProviderError, ReconcileError};
use crate::naming::{build_infra_name, build_timestamped_infra_name};
use crate::types::{Redis, RedisCluster, RedisDeploymentDetails, StatusMessage, StatusPhase};

pub const PROVIDER_NAME: &str = "aws-elasticache";
/// Deployment strategy served by this provider.
pub const AWS_DEPLOYMENT_STRATEGY: &str = "aws";

/// Region-scoped clients plus the identifiers of one tick.
struct TickState {
    cache: Arc<dyn CacheApi>,
    identity: Arc<dyn IdentityApi>,
    cluster_id: String,
    groups: Vec<ReplicationGroup>,
    create: CreateReplicationGroupInput,
}

impl TickState {
    fn replication_group_id(&self) -> &str {
        self.create.replication_group_id.as_deref().unwrap_or_default()
    }

    fn found(&self) -> Option<&ReplicationGroup> {
        find_replication_group(&self.groups, self.replication_group_id())
    }
}

/// Provisions Redis on ElastiCache replication groups.
pub struct AwsRedisProvider {
    config: ProviderConfig,
    client: Arc<dyn ResourceClient>,
    credentials: Arc<dyn CredentialManager>,
    config_manager: Arc<dyn ConfigManager>,
    services: Arc<dyn ServiceFactory>,
    monitoring: RedisMonitoring,
}

impl AwsRedisProvider {
    pub fn new(
        config: ProviderConfig,
        client: Arc<dyn ResourceClient>,
        credentials: Arc<dyn CredentialManager>,
        config_manager: Arc<dyn ConfigManager>,
        services: Arc<dyn ServiceFactory>,
        monitoring: RedisMonitoring,
    ) -> Self {
        Self {
            config,
            client,
            credentials,
            config_manager,
            services,
            monitoring,
        }
    }

    /// The finalizer is only added to `r` once the update is persisted, so a
    /// failed persist is retried on the next tick.
    async fn ensure_finalizer(&self, ctx: &Context, r: &mut Redis) -> Result<(), ReconcileError> {
        let mut updated = r.clone();
        if !updated.metadata.add_finalizer(&self.config.finalizer) {
            return Ok(());
        }
        debug!("Adding finalizer to {}/{}", r.namespace(), r.name());
        checked_call(
            ctx,
            "update redis",
            "failed to set finalizer",
            |op, e| ProviderError::persistence(op, e),
            self.client.update_redis(&updated),
        )
        .await?;
        *r = updated;
        Ok(())
    }

    /// Persists first, then removes the finalizer from `r`.
    async fn release_finalizer(&self, ctx: &Context, r: &mut Redis) -> Result<(), ReconcileError> {
        let mut updated = r.clone();
        if !updated.metadata.remove_finalizer(&self.config.finalizer) {
            return Ok(());
        }
        checked_call(
            ctx,
            "update redis",
            "failed to update instance as part of finalizer reconcile",
            |op, e| ProviderError::persistence(op, e),
            self.client.update_redis(&updated),
        )
        .await?;
        *r = updated;
        Ok(())
    }

    async fn delete_alert(&self, ctx: &Context, r: &Redis, id: &str) -> Result<(), ReconcileError> {
        let deletion = self
            .monitoring
            .delete_availability_alert(ctx, r.namespace(), id)
            .await
            .map_err(|e| ReconcileError::new("failed to delete elasticache alert", e))?;
        match deletion {
            AlertDeletion::Deleted => info!("Removed availability alert for {}", id),
            AlertDeletion::AlreadyAbsent => debug!("No availability alert left for {}", id),
        }
        Ok(())
    }

    /// Everything both paths need before looking at remote state: strategy,
    /// credentials, clients, cluster identity and the current listing.
    async fn prepare(
        &self,
        ctx: &Context,
        r: &Redis,
        config_status: String,
        credentials_status: &str,
    ) -> Result<(TickState, ResolvedStrategy), ReconcileError> {
        let resolved = resolve_strategy(
            ctx,
            self.config_manager.as_ref(),
            &r.spec.tier,
            &self.config.default_region,
        )
        .await
        .map_err(|e| ReconcileError::new(config_status, e))?;

        let credentials = checked_call(
            ctx,
            "reconcile provider credentials",
            credentials_status,
            |op, e| ProviderError::lookup(op, e),
            self.credentials
                .reconcile_provider_credentials(ctx, r.namespace()),
        )
        .await?;
        let (cache, identity) = self
            .services
            .cache_services(&resolved.strategy.region, &credentials);

        let cluster_id = checked_call(
            ctx,
            "get cluster id",
            "failed to retrieve cluster identifier",
            |op, e| ProviderError::lookup(op, e),
            self.client.cluster_id(),
        )
        .await?;

        let groups = list_replication_groups(ctx, cache.as_ref(), &self.config.retry)
            .await
            .map_err(|e| ReconcileError::new("error getting replication groups", e))?;

        let cache_name = build_infra_name(&cluster_id, &r.metadata, self.config.identifier_length);
        let create = build_create_config(resolved.create.clone(), &cache_name);

        let state = TickState {
            cache,
            identity,
            cluster_id,
            groups,
            create,
        };
        Ok((state, resolved))
    }

    async fn refresh_metrics(
        &self,
        ctx: &Context,
        r: &Redis,
        state: &TickState,
        found: &ReplicationGroup,
    ) -> Result<(), ReconcileError> {
        self.monitoring
            .set_service_maintenance_metrics(ctx, state.cache.as_ref(), &state.cluster_id)
            .await
            .map_err(|e| {
                ReconcileError::new("error creating the elasticache service maintenance metrics", e)
            })?;
        self.expose_metrics(r, state, found)
    }

    fn expose_metrics(
        &self,
        r: &Redis,
        state: &TickState,
        found: &ReplicationGroup,
    ) -> Result<(), ReconcileError> {
        self.monitoring
            .expose_redis_metrics(r, found, &state.cluster_id)
            .map_err(|e| ReconcileError::new("failed to set metric", e))
    }

    async fn ensure_alert(
        &self,
        ctx: &Context,
        r: &Redis,
        state: &TickState,
    ) -> Result<(), ReconcileError> {
        self.monitoring
            .create_availability_alert(ctx, r, state.replication_group_id(), &state.cluster_id)
            .await
            .map_err(|e| ReconcileError::new("error creating the elasticache PrometheusRule", e))
    }

    async fn create_elasticache_cluster(
        &self,
        ctx: &Context,
        r: &mut Redis,
    ) -> Result<ProvisionOutcome, ReconcileError> {
        self.ensure_finalizer(ctx, r).await?;

        let (state, _) = self
            .prepare(
                ctx,
                r,
                format!("failed to retrieve aws elasticache cluster config {}", r.name()),
                "failed to reconcile elasticache credentials",
            )
            .await?;
        let id = state.replication_group_id().to_string();

        let Some(found) = state.found() else {
            self.ensure_alert(ctx, r, &state).await?;
            info!("Creating elasticache replication group {}", id);
            remote_call(
                ctx,
                "create replication group",
                "error creating elasticache cluster",
                state.cache.create_replication_group(&state.create),
            )
            .await?;
            return Ok(ProvisionOutcome::in_progress("started elasticache provision"));
        };

        self.refresh_metrics(ctx, r, &state, found).await?;
        self.ensure_alert(ctx, r, &state).await?;

        if !found.is_available() {
            info!("Replication group {} is {}", id, found.status);
            return Ok(ProvisionOutcome::in_progress(format!(
                "createReplicationGroup() in progress, current aws elasticache status is {}",
                found.status
            )));
        }

        info!("Found existing elasticache replication group {}", id);
        if let Some(update) = build_update_strategy(&state.create, found) {
            info!("Modifying replication group {}: {:?}", id, update);
            remote_call(
                ctx,
                "modify replication group",
                "failed to modify elasticache cluster",
                state.cache.modify_replication_group(&update),
            )
            .await?;
            return Ok(ProvisionOutcome::in_progress(format!(
                "changes detected, modifyReplicationGroup() in progress, current aws elasticache status is {}",
                found.status
            )));
        }

        let node_group = match found.node_groups.first() {
            Some(group) if group.status == STATUS_AVAILABLE => group,
            other => {
                let status = other.map(|g| g.status.as_str()).unwrap_or("unknown");
                return Ok(ProvisionOutcome::in_progress(format!(
                    "cache node status not available, current status: {}",
                    status
                )));
            }
        };

        info!("Creating or updating tags on elasticache nodes and snapshots");
        let tags = build_cache_tags(&self.config.tag_prefix, &state.cluster_id, r);
        for member in &node_group.node_group_members {
            let outcome = tag_elasticache_node(
                ctx,
                state.cache.as_ref(),
                state.identity.as_ref(),
                member,
                &tags,
            )
            .await
            .map_err(|e| e.wrap_status("failed to add tags to elasticache"))?;

            match outcome {
                TagOutcome::Tagged { snapshots } => debug!(
                    "Tagged cache node {} and {} snapshots",
                    member.cache_cluster_id, snapshots
                ),
                TagOutcome::Skipped {
                    cache_cluster_id,
                    status,
                } => {
                    return Ok(ProvisionOutcome::in_progress(format!(
                        "{} status is {}, skipping adding tags",
                        cache_cluster_id, status
                    )));
                }
            }
        }

        let Some(endpoint) = &node_group.primary_endpoint else {
            return Ok(ProvisionOutcome::in_progress(format!(
                "primary endpoint not yet assigned, current aws elasticache status is {}",
                found.status
            )));
        };

        Ok(ProvisionOutcome {
            cluster: Some(RedisCluster {
                deployment_details: RedisDeploymentDetails {
                    uri: endpoint.address.clone(),
                    port: endpoint.port,
                },
            }),
            status: format!(
                "successfully created and tagged, aws elasticache status is {}",
                found.status
            )
            .into(),
        })
    }

    async fn delete_elasticache_cluster(
        &self,
        ctx: &Context,
        r: &mut Redis,
    ) -> Result<StatusMessage, ReconcileError> {
        let (state, resolved) = self
            .prepare(
                ctx,
                r,
                format!("failed to retrieve aws elasticache config for instance {}", r.name()),
                "failed to reconcile aws provider credentials",
            )
            .await?;
        let delete = self.delete_config(r, &state, resolved.delete);
        let id = state.replication_group_id().to_string();

        let Some(found) = state.found() else {
            // A failed create can leave the rule behind with no group.
            self.delete_alert(ctx, r, &id).await?;
            info!("Replication group {} is gone, removing finalizer", id);
            self.release_finalizer(ctx, r).await?;
            return Ok(StatusMessage::empty());
        };

        self.expose_metrics(r, &state, found)?;

        if !found.is_available() {
            return Ok(format!(
                "delete detected, deleteReplicationGroup() in progress, current aws elasticache status is {}",
                found.status
            )
            .into());
        }

        self.delete_alert(ctx, r, &id).await?;

        info!("Deleting elasticache replication group {}", id);
        let deleted = ctx
            .run(
                "delete replication group",
                state.cache.delete_replication_group(&delete),
            )
            .await
            .map_err(|e| ReconcileError::new("failed to delete elasticache cluster", e))?;
        match deleted {
            Ok(()) => {}
            Err(e) if e.is_replication_group_not_found() => {
                warn!("Replication group {} already removed remotely", id);
            }
            Err(e) => {
                return Err(ReconcileError::new(
                    "failed to delete elasticache cluster",
                    ProviderError::remote("delete replication group", e),
                ));
            }
        }

        Ok("delete detected, deleteReplicationGroup started".into())
    }

    fn delete_config(
        &self,
        r: &Redis,
        state: &TickState,
        partial: DeleteReplicationGroupInput,
    ) -> DeleteReplicationGroupInput {
        let cache_name = build_infra_name(
            &state.cluster_id,
            &r.metadata,
            self.config.identifier_length,
        );
        let snapshot_name = build_timestamped_infra_name(
            &state.cluster_id,
            &r.metadata,
            self.config.identifier_length,
            Utc::now(),
        );
        build_delete_config(partial, &state.create, &cache_name, &snapshot_name)
    }
}

fn record_status(r: &mut Redis, phase: StatusPhase, message: StatusMessage) {
    r.status.phase = phase;
    r.status.message = message;
    r.status.provider = PROVIDER_NAME.to_string();
}

#[async_trait]
impl RedisProvider for AwsRedisProvider {
    fn name(&self) -> &'static str {
        PROVIDER_NAME
    }

    fn supports_strategy(&self, strategy: &str) -> bool {
        strategy == AWS_DEPLOYMENT_STRATEGY
    }

    fn reconcile_time(&self, r: &Redis) -> Duration {
        if r.status.phase != StatusPhase::Complete {
            return self.config.in_progress_reconcile_time;
        }
        self.config.reconcile_time
    }

    async fn create_redis(
        &self,
        ctx: &Context,
        r: &mut Redis,
    ) -> Result<ProvisionOutcome, ReconcileError> {
        info!("Reconciling redis {}/{}", r.namespace(), r.name());
        let result = self.create_elasticache_cluster(ctx, r).await;
        match &result {
            Ok(outcome) if outcome.is_complete() => {
                record_status(r, StatusPhase::Complete, outcome.status.clone())
            }
            Ok(outcome) => record_status(r, StatusPhase::InProgress, outcome.status.clone()),
            Err(e) => {
                warn!("Reconciling redis {}/{} failed: {}", r.namespace(), r.name(), e);
                record_status(r, StatusPhase::Failed, e.status.clone())
            }
        }
        result
    }

    async fn delete_redis(
        &self,
        ctx: &Context,
        r: &mut Redis,
    ) -> Result<StatusMessage, ReconcileError> {
        info!("Finalizing redis {}/{}", r.namespace(), r.name());
        let result = self.delete_elasticache_cluster(ctx, r).await;
        match &result {
            Ok(status) if status.is_empty() => {
                record_status(r, StatusPhase::Deleted, status.clone())
            }
            Ok(status) => record_status(r, StatusPhase::InProgress, status.clone()),
            Err(e) => {
                warn!("Deleting redis {}/{} failed: {}", r.namespace(), r.name(), e);
                record_status(r, StatusPhase::Failed, e.status.clone())
            }
        }
        result
    }
}
