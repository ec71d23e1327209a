//! Metrics and the availability alert rule for replication groups.

use std::sync::Arc;

use cro_metrics::{Labels, MetricsSink, create_prometheus_rule};
use tracing::info;

use crate::clients::{CacheApi, ReplicationGroup, RuleApi, ServiceUpdate};
use crate::context::Context;
use crate::error::ProviderError;
use crate::types::Redis;

pub const REDIS_MAINTENANCE_METRIC: &str = "cro_aws_elasticache_service_maintenance";
pub const REDIS_INFO_METRIC: &str = "cro_aws_elasticache_info";
pub const REDIS_AVAILABLE_METRIC: &str = "cro_aws_elasticache_available";

/// Name of the PrometheusRule watching a replication group.
pub fn alert_rule_name(instance_id: &str) -> String {
    format!("cro-aws-elasticache-{}", instance_id)
}

/// Fires while the availability gauge of the instance is not 1.
pub fn availability_expression(
    namespace: &str,
    instance_id: &str,
    cluster_id: &str,
    resource_name: &str,
) -> String {
    format!(
        "absent({}{{namespace='{}',instanceID='{}',clusterID='{}',resourceID='{}'}} == 1)",
        REDIS_AVAILABLE_METRIC, namespace, instance_id, cluster_id, resource_name
    )
}

/// Labels shared by the availability and info gauges.
pub fn generic_metric_labels(r: &Redis, group: &ReplicationGroup, cluster_id: &str) -> Labels {
    let mut labels = Labels::new();
    labels.insert("clusterID".to_string(), cluster_id.to_string());
    labels.insert("resourceID".to_string(), r.name().to_string());
    labels.insert("namespace".to_string(), r.namespace().to_string());
    labels.insert(
        "instanceID".to_string(),
        group.replication_group_id.clone(),
    );
    labels
}

/// Generic labels plus the live status.
pub fn info_metric_labels(r: &Redis, group: &ReplicationGroup, cluster_id: &str) -> Labels {
    let mut labels = generic_metric_labels(r, group, cluster_id);
    labels.insert("status".to_string(), group.status.clone());
    labels
}

pub fn maintenance_metric_labels(update: &ServiceUpdate, cluster_id: &str) -> Labels {
    let pairs = [
        ("clusterID", cluster_id.to_string()),
        (
            "AutoUpdateAfterRecommendedApplyByDate",
            update.auto_update_after_recommended_apply_by_date.to_string(),
        ),
        ("Engine", update.engine.clone()),
        ("EstimatedUpdateTime", update.estimated_update_time.clone()),
        (
            "ServiceUpdateDescription",
            update.service_update_description.clone(),
        ),
        (
            "ServiceUpdateEndDate",
            update.service_update_end_date.timestamp().to_string(),
        ),
        ("ServiceUpdateName", update.service_update_name.clone()),
        (
            "ServiceUpdateRecommendedApplyByDate",
            update
                .service_update_recommended_apply_by_date
                .timestamp()
                .to_string(),
        ),
        (
            "ServiceUpdateReleaseDate",
            update.service_update_release_date.timestamp().to_string(),
        ),
        ("ServiceUpdateSeverity", update.service_update_severity.clone()),
        ("ServiceUpdateStatus", update.service_update_status.clone()),
        ("ServiceUpdateType", update.service_update_type.clone()),
    ];
    pairs
        .into_iter()
        .map(|(k, v)| (k.to_string(), v))
        .collect()
}

/// Whether deleting the alert rule removed something.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AlertDeletion {
    Deleted,
    AlreadyAbsent,
}

/// Emits gauges and manages the availability alert rule.
#[derive(Clone)]
pub struct RedisMonitoring {
    metrics: Arc<dyn MetricsSink>,
    rules: Arc<dyn RuleApi>,
}

impl RedisMonitoring {
    pub fn new(metrics: Arc<dyn MetricsSink>, rules: Arc<dyn RuleApi>) -> Self {
        Self { metrics, rules }
    }

    /// Refresh the info gauge (current time, labelled with status) and the
    /// availability gauge (1 when available, else 0).
    pub fn expose_redis_metrics(
        &self,
        r: &Redis,
        group: &ReplicationGroup,
        cluster_id: &str,
    ) -> Result<(), ProviderError> {
        info!("Setting redis information metric for {}", group.replication_group_id);
        let info_labels = info_metric_labels(r, group, cluster_id);
        let generic_labels = generic_metric_labels(r, group, cluster_id);

        self.metrics
            .set_metric_current_time(REDIS_INFO_METRIC, &info_labels)?;

        let available = if group.is_available() { 1.0 } else { 0.0 };
        self.metrics
            .set_metric(REDIS_AVAILABLE_METRIC, &generic_labels, available)?;
        Ok(())
    }

    /// One maintenance series per pending service update, valued at its
    /// recommended-apply-by epoch. Returns the number of updates reported.
    pub async fn set_service_maintenance_metrics(
        &self,
        ctx: &Context,
        cache: &dyn CacheApi,
        cluster_id: &str,
    ) -> Result<usize, ProviderError> {
        info!("Checking for pending redis service updates");
        let updates = ctx
            .run("describe service updates", cache.describe_service_updates())
            .await?
            .map_err(|e| ProviderError::remote("elasticache serviceupdates error", e))?;

        info!("There are {} elasticache service updates available", updates.len());
        for update in &updates {
            let labels = maintenance_metric_labels(update, cluster_id);
            let epoch = update.service_update_recommended_apply_by_date.timestamp() as f64;
            self.metrics
                .set_metric(REDIS_MAINTENANCE_METRIC, &labels, epoch)?;
        }
        Ok(updates.len())
    }

    /// Create the availability alert for `instance_id` unless it already exists.
    pub async fn create_availability_alert(
        &self,
        ctx: &Context,
        r: &Redis,
        instance_id: &str,
        cluster_id: &str,
    ) -> Result<(), ProviderError> {
        let rule_name = alert_rule_name(instance_id);
        let expression = availability_expression(r.namespace(), instance_id, cluster_id, r.name());
        let rule = create_prometheus_rule(r.namespace(), &rule_name, &expression)?;

        match ctx.run("create prometheus rule", self.rules.create(&rule)).await? {
            Ok(()) => info!("PrometheusRule {} created", rule_name),
            Err(e) if e.is_already_exists() => {
                info!("PrometheusRule {} already exists", rule_name)
            }
            Err(e) => {
                return Err(ProviderError::remote(
                    format!("exception calling create for {}", rule_name),
                    e,
                ));
            }
        }
        Ok(())
    }

    /// Delete the availability alert for `instance_id`. A rule that is already
    /// gone counts as deleted.
    pub async fn delete_availability_alert(
        &self,
        ctx: &Context,
        namespace: &str,
        instance_id: &str,
    ) -> Result<AlertDeletion, ProviderError> {
        let rule_name = alert_rule_name(instance_id);

        match ctx
            .run("get prometheus rule", self.rules.get(namespace, &rule_name))
            .await?
        {
            Ok(_) => {}
            Err(e) if e.is_not_found() => {
                info!("PrometheusRule {} not found, nothing to delete", rule_name);
                return Ok(AlertDeletion::AlreadyAbsent);
            }
            Err(e) => {
                return Err(ProviderError::remote(
                    format!("exception calling get for {}", rule_name),
                    e,
                ));
            }
        }

        match ctx
            .run("delete prometheus rule", self.rules.delete(namespace, &rule_name))
            .await?
        {
            Ok(()) => {
                info!("PrometheusRule {} deleted", rule_name);
                Ok(AlertDeletion::Deleted)
            }
            Err(e) if e.is_not_found() => Ok(AlertDeletion::AlreadyAbsent),
            Err(e) => Err(ProviderError::remote(
                format!("exception calling delete for {}", rule_name),
                e,
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn group(status: &str) -> ReplicationGroup {
        ReplicationGroup {
            replication_group_id: "rg-1".to_string(),
            description: String::new(),
            status: status.to_string(),
            cache_node_type: None,
            snapshot_retention_limit: None,
            node_groups: vec![],
        }
    }

    #[test]
    fn test_alert_naming_and_expression() {
        assert_eq!(alert_rule_name("rg-1"), "cro-aws-elasticache-rg-1");
        assert_eq!(
            availability_expression("ns", "rg-1", "c1", "cache"),
            "absent(cro_aws_elasticache_available{namespace='ns',instanceID='rg-1',clusterID='c1',resourceID='cache'} == 1)"
        );
    }

    #[test]
    fn test_metric_labels() {
        let r = Redis::new("ns", "cache", "managed", "production");
        let generic = generic_metric_labels(&r, &group("creating"), "c1");
        assert_eq!(generic.len(), 4);
        assert_eq!(generic["instanceID"], "rg-1");
        assert_eq!(generic["resourceID"], "cache");

        let info = info_metric_labels(&r, &group("creating"), "c1");
        assert_eq!(info["status"], "creating");
    }

    #[test]
    fn test_maintenance_labels_use_epochs() {
        let date = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let update = ServiceUpdate {
            service_update_name: "elasticache-20240101-001".to_string(),
            engine: "redis".to_string(),
            estimated_update_time: "30 minutes".to_string(),
            service_update_description: "patch".to_string(),
            auto_update_after_recommended_apply_by_date: true,
            service_update_end_date: date,
            service_update_recommended_apply_by_date: date,
            service_update_release_date: date,
            service_update_severity: "important".to_string(),
            service_update_status: "available".to_string(),
            service_update_type: "security-update".to_string(),
        };
        let labels = maintenance_metric_labels(&update, "c1");

        assert_eq!(labels.len(), 12);
        assert_eq!(labels["AutoUpdateAfterRecommendedApplyByDate"], "true");
        assert_eq!(labels["ServiceUpdateRecommendedApplyByDate"], "1704067200");
    }
}
