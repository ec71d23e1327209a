//! Convergence of Redis resources onto ElastiCache replication groups.
//!
//! Each tick recomputes every decision from freshly observed remote state, so
//! re-entry after a crash or a failed call is always safe.

pub mod builder;
pub mod drift;
pub mod elasticache;
pub mod observability;
pub mod scanner;
pub mod strategy;
pub mod tagging;

use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;

use crate::context::Context;
use crate::error::{ApiError, ProviderError, ReconcileError};
use crate::types::{Redis, RedisCluster, StatusMessage};

pub use elasticache::AwsRedisProvider;

/// Result of one create tick.
#[derive(Debug, Clone, PartialEq)]
pub struct ProvisionOutcome {
    /// Connection details, set only once provisioning is complete.
    pub cluster: Option<RedisCluster>,
    pub status: StatusMessage,
}

impl ProvisionOutcome {
    pub fn in_progress(status: impl Into<StatusMessage>) -> Self {
        Self {
            cluster: None,
            status: status.into(),
        }
    }

    pub fn is_complete(&self) -> bool {
        self.cluster.is_some()
    }
}

/// A provider that can provision and decommission Redis instances.
#[async_trait]
pub trait RedisProvider: Send + Sync {
    fn name(&self) -> &'static str;

    /// Whether the provider handles the given deployment strategy.
    fn supports_strategy(&self, strategy: &str) -> bool;

    /// How long the caller should wait before the next tick for `r`.
    fn reconcile_time(&self, r: &Redis) -> Duration;

    /// Drive `r` one step towards a provisioned instance.
    async fn create_redis(
        &self,
        ctx: &Context,
        r: &mut Redis,
    ) -> Result<ProvisionOutcome, ReconcileError>;

    /// Drive `r` one step towards removal. An empty status means the remote
    /// resource is gone and the finalizer has been removed.
    async fn delete_redis(&self, ctx: &Context, r: &mut Redis)
    -> Result<StatusMessage, ReconcileError>;
}

/// Run a remote call under `ctx`, failing with `status` if it errors or is cancelled.
pub(crate) async fn remote_call<T, F>(
    ctx: &Context,
    op: &str,
    status: &str,
    fut: F,
) -> Result<T, ReconcileError>
where
    F: Future<Output = Result<T, ApiError>>,
{
    checked_call(ctx, op, status, |op, e| ProviderError::remote(op, e), fut).await
}

/// Like [`remote_call`] with a caller-chosen error class.
pub(crate) async fn checked_call<T, F, W>(
    ctx: &Context,
    op: &str,
    status: &str,
    wrap: W,
    fut: F,
) -> Result<T, ReconcileError>
where
    F: Future<Output = Result<T, ApiError>>,
    W: FnOnce(&str, ApiError) -> ProviderError,
{
    match ctx.run(op, fut).await {
        Ok(Ok(value)) => Ok(value),
        Ok(Err(e)) => Err(ReconcileError::new(status, wrap(op, e))),
        Err(cancelled) => Err(ReconcileError::new(status, cancelled)),
    }
}
