pub mod clients;
pub mod config;
pub mod context;
pub mod error;
pub mod naming;
pub mod reconciler;
pub mod retry;
pub mod sim;
pub mod types;

pub use config::{
    ConfigManager, ConfigMapConfigManager, CredentialManager, Credentials, ProviderConfig,
    StaticCredentialManager, StrategyConfig,
};
pub use context::{CancelHandle, Context};
pub use error::{ApiError, ConfigError, ProviderError, ReconcileError};
pub use reconciler::{AwsRedisProvider, ProvisionOutcome, RedisProvider};
pub use reconciler::observability::RedisMonitoring;
pub use retry::RetryPolicy;
pub use types::{Redis, RedisCluster, StatusMessage, StatusPhase};
