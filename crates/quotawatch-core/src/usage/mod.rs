//! Storage usage lookups
//!
//! Computing usage is the host's job; QuotaWatch only asks for the current
//! quota and fill ratio of one user at a time.

mod http;

pub use http::HttpUsageSource;

use async_trait::async_trait;

use crate::error::Result;
use crate::models::UsageReading;

/// Source of per-user storage usage
#[async_trait]
pub trait UsageSource: Send + Sync {
    /// Current usage for `user_id`
    ///
    /// Returns `Error::NotFound` when the user's storage cannot be resolved.
    async fn relative_usage(&self, user_id: &str) -> Result<UsageReading>;
}
