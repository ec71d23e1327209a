//! Account identity lookup (STS).

use async_trait::async_trait;

use crate::error::ApiError;

/// Result of `GetCallerIdentity`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallerIdentity {
    pub account: String,
    pub arn: String,
    pub user_id: String,
}

#[async_trait]
pub trait IdentityApi: Send + Sync {
    async fn get_caller_identity(&self) -> Result<CallerIdentity, ApiError>;
}
