//! Remote state discovery.
//!
//! Listing is retried on every failure: freshly issued credentials can take a
//! while to propagate through IAM, and the first calls after issuance fail.

use tracing::{info, warn};

use crate::clients::{CacheApi, ReplicationGroup};
use crate::context::Context;
use crate::error::{ApiError, ProviderError};
use crate::retry::{RetryError, RetryPolicy};

const LIST_OP: &str = "describe replication groups";

/// List all replication groups, retrying under `policy`.
pub async fn list_replication_groups(
    ctx: &Context,
    cache: &dyn CacheApi,
    policy: &RetryPolicy,
) -> Result<Vec<ReplicationGroup>, ProviderError> {
    let result = policy
        .retry(ctx, |_: &ApiError| true, || cache.describe_replication_groups())
        .await;

    match result {
        Ok(groups) => {
            info!("Found {} replication groups", groups.len());
            Ok(groups)
        }
        Err(RetryError::Exhausted {
            attempts,
            elapsed,
            last,
        }) => {
            warn!("Giving up listing replication groups after {} attempts", attempts);
            Err(ProviderError::RemoteUnavailable {
                op: LIST_OP.to_string(),
                attempts,
                elapsed,
                last,
            })
        }
        Err(RetryError::Fatal(e)) => Err(ProviderError::remote(LIST_OP, e)),
        Err(RetryError::Cancelled) => Err(ProviderError::Cancelled(LIST_OP.to_string())),
    }
}

/// The group with the given identifier, if listed.
pub fn find_replication_group<'a>(
    groups: &'a [ReplicationGroup],
    replication_group_id: &str,
) -> Option<&'a ReplicationGroup> {
    groups
        .iter()
        .find(|g| g.replication_group_id == replication_group_id)
}
