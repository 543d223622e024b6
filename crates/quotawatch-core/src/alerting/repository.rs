//! Persistence of per-tier alert timestamps

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use deadpool_redis::Pool;
use redis::AsyncCommands;
use tracing::{debug, warn};

use crate::db::RedisPool;
use crate::error::{Error, Result};
use crate::models::Tier;

/// Per-user, per-tier storage of the last time a quota alert was raised
///
/// Each call is expected to be atomic on its own; the evaluator does not
/// assume atomicity across calls.
#[async_trait]
pub trait AlertStateStore: Send + Sync {
    /// Last alert time recorded for `tier`, if any
    async fn last_alert(&self, user_id: &str, tier: Tier) -> Result<Option<DateTime<Utc>>>;

    /// Record `at` as the last alert time for `tier`
    async fn set_last_alert(&self, user_id: &str, tier: Tier, at: DateTime<Utc>) -> Result<()>;

    /// Forget the last alert time for `tier`
    async fn clear_last_alert(&self, user_id: &str, tier: Tier) -> Result<()>;
}

/// Alert state kept in Redis as RFC 3339 strings
#[derive(Clone)]
pub struct RedisAlertStateStore {
    pool: Pool,
    key_prefix: String,
}

impl RedisAlertStateStore {
    /// Create a new store on top of an existing pool
    pub fn new(pool: &RedisPool, key_prefix: impl Into<String>) -> Self {
        Self {
            pool: pool.pool().clone(),
            key_prefix: key_prefix.into(),
        }
    }

    fn key(&self, user_id: &str, tier: Tier) -> String {
        state_key(&self.key_prefix, user_id, tier)
    }

    async fn conn(&self) -> Result<deadpool_redis::Connection> {
        self.pool.get().await.map_err(|e| Error::Redis(e.to_string()))
    }
}

#[async_trait]
impl AlertStateStore for RedisAlertStateStore {
    async fn last_alert(&self, user_id: &str, tier: Tier) -> Result<Option<DateTime<Utc>>> {
        let key = self.key(user_id, tier);
        let mut conn = self.conn().await?;
        let value: Option<String> = conn.get(&key).await?;

        Ok(value.and_then(|raw| {
            let parsed = parse_timestamp(&raw);
            if parsed.is_none() {
                warn!(key = %key, value = %raw, "Ignoring unparseable alert timestamp");
            }
            parsed
        }))
    }

    async fn set_last_alert(&self, user_id: &str, tier: Tier, at: DateTime<Utc>) -> Result<()> {
        let key = self.key(user_id, tier);
        let mut conn = self.conn().await?;
        let _: () = conn.set(&key, at.to_rfc3339()).await?;
        debug!(key = %key, at = %at, "Stored alert timestamp");
        Ok(())
    }

    async fn clear_last_alert(&self, user_id: &str, tier: Tier) -> Result<()> {
        let key = self.key(user_id, tier);
        let mut conn = self.conn().await?;
        let _: () = conn.del(&key).await?;
        debug!(key = %key, "Cleared alert timestamp");
        Ok(())
    }
}

/// Redis key holding the last alert time for one user and tier
pub fn state_key(prefix: &str, user_id: &str, tier: Tier) -> String {
    format!("{prefix}:alert:{user_id}:{tier}")
}

fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_state_key() {
        assert_eq!(state_key("quotawatch", "alice", Tier::Warning), "quotawatch:alert:alice:warning");
    }

    #[test]
    fn test_timestamp_roundtrip_through_text() {
        let at = Utc.with_ymd_and_hms(2024, 3, 9, 12, 30, 0).unwrap();
        assert_eq!(parse_timestamp(&at.to_rfc3339()), Some(at));
    }

    #[test]
    fn test_offset_timestamps_are_normalized() {
        let parsed = parse_timestamp("2024-03-09T14:30:00+02:00").unwrap();
        assert_eq!(parsed, Utc.with_ymd_and_hms(2024, 3, 9, 12, 30, 0).unwrap());
    }

    #[test]
    fn test_garbage_timestamp_is_ignored() {
        assert_eq!(parse_timestamp("last tuesday"), None);
    }
}
