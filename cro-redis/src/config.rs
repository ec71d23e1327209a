//! Provider configuration, strategy lookup and credentials.

use std::collections::BTreeMap;
use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::context::Context;
use crate::error::{ApiError, ConfigError};
use crate::naming::DEFAULT_AWS_IDENTIFIER_LENGTH;
use crate::retry::RetryPolicy;

/// Region used when a strategy leaves it empty.
pub const DEFAULT_REGION: &str = "eu-west-1";
/// Finalizer the provider places on resources it manages.
pub const DEFAULT_FINALIZER: &str = "cloud-resources-operator.integreatly.org/finalizers";
/// Prefix of every tag key the provider writes.
pub const DEFAULT_TAG_PREFIX: &str = "integreatly.org/";

/// Static provider settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProviderConfig {
    pub default_region: String,
    pub finalizer: String,
    pub identifier_length: usize,
    pub tag_prefix: String,
    /// Discovery retry policy.
    pub retry: RetryPolicy,
    /// Requeue interval while a resource is not complete.
    pub in_progress_reconcile_time: Duration,
    /// Requeue interval once complete.
    pub reconcile_time: Duration,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            default_region: DEFAULT_REGION.to_string(),
            finalizer: DEFAULT_FINALIZER.to_string(),
            identifier_length: DEFAULT_AWS_IDENTIFIER_LENGTH,
            tag_prefix: DEFAULT_TAG_PREFIX.to_string(),
            retry: RetryPolicy::default(),
            in_progress_reconcile_time: Duration::from_secs(60),
            reconcile_time: Duration::from_secs(5 * 60),
        }
    }
}

impl ProviderConfig {
    /// Override the steady-state requeue interval.
    pub fn with_forced_reconcile_time(mut self, reconcile_time: Duration) -> Self {
        self.reconcile_time = reconcile_time;
        self
    }
}

/// A tier's region plus its raw create/delete parameter blobs.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct StrategyConfig {
    pub region: String,
    pub create_strategy: serde_json::Value,
    pub delete_strategy: serde_json::Value,
}

/// Source of strategies.
#[async_trait]
pub trait ConfigManager: Send + Sync {
    async fn read_storage_strategy(
        &self,
        ctx: &Context,
        resource_type: &str,
        tier: &str,
    ) -> Result<StrategyConfig, ConfigError>;
}

/// Strategies held in a config map: resource type → JSON document of tier → strategy.
#[derive(Debug, Clone, Default)]
pub struct ConfigMapConfigManager {
    data: BTreeMap<String, String>,
}

impl ConfigMapConfigManager {
    pub fn new(data: BTreeMap<String, String>) -> Self {
        Self { data }
    }

    /// Parse a JSON document whose top-level keys are resource types. Values may
    /// be the tier map itself or a string holding it, as stored in a config map.
    pub fn from_document(document: &str) -> Result<Self, ConfigError> {
        let raw: BTreeMap<String, serde_json::Value> =
            serde_json::from_str(document).map_err(|source| ConfigError::Decode {
                what: "strategy document".to_string(),
                source,
            })?;
        let data = raw
            .into_iter()
            .map(|(k, v)| match v {
                serde_json::Value::String(s) => (k, s),
                other => (k, other.to_string()),
            })
            .collect();
        Ok(Self { data })
    }
}

#[async_trait]
impl ConfigManager for ConfigMapConfigManager {
    async fn read_storage_strategy(
        &self,
        _ctx: &Context,
        resource_type: &str,
        tier: &str,
    ) -> Result<StrategyConfig, ConfigError> {
        let raw = self
            .data
            .get(resource_type)
            .ok_or_else(|| ConfigError::MissingResourceType(resource_type.to_string()))?;
        let mut tiers: BTreeMap<String, StrategyConfig> =
            serde_json::from_str(raw).map_err(|source| ConfigError::Decode {
                what: format!("{} strategies", resource_type),
                source,
            })?;
        debug!("Read {} strategy for tier {}", resource_type, tier);
        tiers.remove(tier).ok_or_else(|| ConfigError::MissingTier {
            resource_type: resource_type.to_string(),
            tier: tier.to_string(),
        })
    }
}

/// AWS credentials issued for the provider (not for end users).
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub access_key_id: String,
    pub secret_access_key: String,
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("access_key_id", &self.access_key_id)
            .field("secret_access_key", &"<redacted>")
            .finish()
    }
}

/// Issues provider credentials for a namespace.
#[async_trait]
pub trait CredentialManager: Send + Sync {
    async fn reconcile_provider_credentials(
        &self,
        ctx: &Context,
        namespace: &str,
    ) -> Result<Credentials, ApiError>;
}

/// Returns the same credentials for every namespace.
#[derive(Debug, Clone)]
pub struct StaticCredentialManager {
    credentials: Credentials,
}

impl StaticCredentialManager {
    pub fn new(access_key_id: &str, secret_access_key: &str) -> Self {
        Self {
            credentials: Credentials {
                access_key_id: access_key_id.to_string(),
                secret_access_key: secret_access_key.to_string(),
            },
        }
    }
}

#[async_trait]
impl CredentialManager for StaticCredentialManager {
    async fn reconcile_provider_credentials(
        &self,
        _ctx: &Context,
        _namespace: &str,
    ) -> Result<Credentials, ApiError> {
        Ok(self.credentials.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const DOCUMENT: &str = r#"{
        "redis": {
            "production": {
                "region": "us-east-1",
                "createStrategy": {"CacheNodeType": "cache.m5.large"},
                "deleteStrategy": {}
            },
            "development": {"createStrategy": {}, "deleteStrategy": {}}
        },
        "postgres": "{\"production\": {}}"
    }"#;

    #[tokio::test]
    async fn test_reads_strategy_for_tier() {
        let manager = ConfigMapConfigManager::from_document(DOCUMENT).unwrap();
        let strategy = manager
            .read_storage_strategy(&Context::background(), "redis", "production")
            .await
            .unwrap();

        assert_eq!(strategy.region, "us-east-1");
        assert_eq!(strategy.create_strategy["CacheNodeType"], "cache.m5.large");
    }

    #[tokio::test]
    async fn test_region_left_empty_when_unset() {
        let manager = ConfigMapConfigManager::from_document(DOCUMENT).unwrap();
        let strategy = manager
            .read_storage_strategy(&Context::background(), "redis", "development")
            .await
            .unwrap();
        assert_eq!(strategy.region, "");
    }

    #[tokio::test]
    async fn test_string_values_are_accepted() {
        let manager = ConfigMapConfigManager::from_document(DOCUMENT).unwrap();
        assert!(
            manager
                .read_storage_strategy(&Context::background(), "postgres", "production")
                .await
                .is_ok()
        );
    }

    #[tokio::test]
    async fn test_missing_tier_and_type() {
        let manager = ConfigMapConfigManager::from_document(DOCUMENT).unwrap();
        let ctx = Context::background();

        assert!(matches!(
            manager.read_storage_strategy(&ctx, "redis", "gold").await,
            Err(ConfigError::MissingTier { .. })
        ));
        assert!(matches!(
            manager.read_storage_strategy(&ctx, "blobstorage", "production").await,
            Err(ConfigError::MissingResourceType(_))
        ));
    }

    #[tokio::test]
    async fn test_malformed_tier_document() {
        let mut data = BTreeMap::new();
        data.insert("redis".to_string(), "not json".to_string());
        let manager = ConfigMapConfigManager::new(data);

        assert!(matches!(
            manager
                .read_storage_strategy(&Context::background(), "redis", "production")
                .await,
            Err(ConfigError::Decode { .. })
        ));
    }

    #[test]
    fn test_credentials_debug_redacts_secret() {
        let creds = Credentials {
            access_key_id: "AKIA".to_string(),
            secret_access_key: "hunter2".to_string(),
        };
        let out = format!("{:?}", creds);
        assert!(out.contains("AKIA"));
        assert!(!out.contains("hunter2"));
    }
}
