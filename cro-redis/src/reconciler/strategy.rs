//! Strategy resolution: tier name → region plus decoded create/delete requests.

use serde::de::DeserializeOwned;

use crate::clients::{CreateReplicationGroupInput, DeleteReplicationGroupInput};
use crate::config::{ConfigManager, StrategyConfig};
use crate::context::Context;
use crate::error::ConfigError;

/// Resource type key of Redis strategies.
pub const REDIS_RESOURCE_TYPE: &str = "redis";

/// A strategy with its blobs decoded into request shapes.
#[derive(Debug, Clone)]
pub struct ResolvedStrategy {
    pub strategy: StrategyConfig,
    pub create: CreateReplicationGroupInput,
    pub delete: DeleteReplicationGroupInput,
}

/// Read the tier's strategy, default its region, and decode both blobs.
pub async fn resolve_strategy(
    ctx: &Context,
    config_manager: &dyn ConfigManager,
    tier: &str,
    default_region: &str,
) -> Result<ResolvedStrategy, ConfigError> {
    let mut strategy = config_manager
        .read_storage_strategy(ctx, REDIS_RESOURCE_TYPE, tier)
        .await?;
    if strategy.region.is_empty() {
        strategy.region = default_region.to_string();
    }

    let create = decode_blob(&strategy.create_strategy, "aws elasticache create strategy")?;
    let delete = decode_blob(&strategy.delete_strategy, "aws elasticache delete strategy")?;

    Ok(ResolvedStrategy {
        strategy,
        create,
        delete,
    })
}

/// A missing blob (`null`) decodes to an empty request.
fn decode_blob<T>(blob: &serde_json::Value, what: &str) -> Result<T, ConfigError>
where
    T: DeserializeOwned + Default,
{
    if blob.is_null() {
        return Ok(T::default());
    }
    serde_json::from_value(blob.clone()).map_err(|source| ConfigError::Decode {
        what: what.to_string(),
        source,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ConfigMapConfigManager;

    fn manager(doc: &str) -> ConfigMapConfigManager {
        ConfigMapConfigManager::from_document(doc).unwrap()
    }

    #[tokio::test]
    async fn test_defaults_region_and_decodes_blobs() {
        let m = manager(
            r#"{"redis": {"production": {
                "createStrategy": {"SnapshotRetentionLimit": 7},
                "deleteStrategy": {"FinalSnapshotIdentifier": ""}
            }}}"#,
        );
        let resolved = resolve_strategy(&Context::background(), &m, "production", "eu-west-1")
            .await
            .unwrap();

        assert_eq!(resolved.strategy.region, "eu-west-1");
        assert_eq!(resolved.create.snapshot_retention_limit, Some(7));
        assert_eq!(resolved.delete.final_snapshot_identifier.as_deref(), Some(""));
    }

    #[tokio::test]
    async fn test_missing_blobs_decode_to_empty_requests() {
        let m = manager(r#"{"redis": {"production": {"region": "us-west-2"}}}"#);
        let resolved = resolve_strategy(&Context::background(), &m, "production", "eu-west-1")
            .await
            .unwrap();

        assert_eq!(resolved.strategy.region, "us-west-2");
        assert_eq!(resolved.create, CreateReplicationGroupInput::default());
        assert_eq!(resolved.delete, DeleteReplicationGroupInput::default());
    }

    #[tokio::test]
    async fn test_malformed_blob_is_config_error() {
        let m = manager(
            r#"{"redis": {"production": {"createStrategy": {"NumCacheClusters": "two"}}}}"#,
        );
        let err = resolve_strategy(&Context::background(), &m, "production", "eu-west-1")
            .await
            .unwrap_err();
        assert!(matches!(err, ConfigError::Decode { .. }));
    }

    #[tokio::test]
    async fn test_unknown_tier_is_config_error() {
        let m = manager(r#"{"redis": {}}"#);
        let err = resolve_strategy(&Context::background(), &m, "production", "eu-west-1")
            .await
            .unwrap_err();
        assert!(matches!(err, ConfigError::MissingTier { .. }));
    }
}
