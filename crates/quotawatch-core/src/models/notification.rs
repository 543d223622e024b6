//! Quota notification models

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::Tier;

/// Object type every quota notification is filed under
pub const QUOTA_OBJECT_TYPE: &str = "quota";

/// Identifier handed back by a notification sink
pub type NotificationId = Uuid;

/// A quota notification to be created for a user
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuotaNotice {
    /// Recipient
    pub user_id: String,
    /// Tier that triggered the notice
    pub tier: Tier,
    /// Whole percentage of the quota in use
    pub percentage: u8,
    /// When the check that produced this notice ran
    pub issued_at: DateTime<Utc>,
}

impl QuotaNotice {
    /// Build a notice, rounding `percentage` to a whole number
    pub fn new(user_id: impl Into<String>, tier: Tier, percentage: f64, issued_at: DateTime<Utc>) -> Self {
        Self {
            user_id: user_id.into(),
            tier,
            percentage: percentage.round().clamp(0.0, 100.0) as u8,
            issued_at,
        }
    }
}

/// Key under which a user's quota notification is deduplicated
pub fn dedup_key(app_id: &str, user_id: &str) -> String {
    format!("{app_id}:{QUOTA_OBJECT_TYPE}:{user_id}")
}
