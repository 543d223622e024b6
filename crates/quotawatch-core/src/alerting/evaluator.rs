//! Quota threshold and cooldown evaluation

use chrono::{DateTime, Days, Utc};
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::config::{AlertingConfig, Config, NotificationSinkKind, UsageSourceKind};
use crate::db::{Database, PostgresNotificationSink, PostgresUsageSource};
use crate::error::{Error, Result};
use crate::models::{QuotaNotice, Tier, UsageReading};
use crate::usage::{HttpUsageSource, UsageSource};

use super::notifier::{NotificationSink, WebhookNotificationSink};
use super::repository::{AlertStateStore, RedisAlertStateStore};

/// What a single check ended up doing
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Decision {
    /// A fresh notification was created
    Notified,
    /// A tier matched but its cooldown has not elapsed
    CoolingDown,
    /// A tier matched but the sink rejected the notification
    NotifyRejected,
    /// Usage is below every tier; notifications resolved and state cleared
    Cleared,
}

/// Result of checking one user
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CheckOutcome {
    /// User that was checked
    pub user_id: String,
    /// Usage percentage after exemptions were applied
    pub percentage: f64,
    /// Highest tier exceeded, if any
    pub tier: Option<Tier>,
    /// Action taken
    pub decision: Decision,
    /// Instant the check ran at
    pub checked_at: DateTime<Utc>,
}

/// Decides whether a user's storage usage warrants a notification
///
/// Per-user state lives entirely in the [`AlertStateStore`]: the set of tiers
/// with a recorded last-alert time. Checks for the same user must not run
/// concurrently; checks for different users are independent.
pub struct QuotaAlertEvaluator {
    usage: Arc<dyn UsageSource>,
    state: Arc<dyn AlertStateStore>,
    notifier: Arc<dyn NotificationSink>,
    cooldown_days: u64,
    min_quota_bytes: u64,
}

impl QuotaAlertEvaluator {
    /// Create an evaluator from its collaborators
    pub fn new(
        usage: Arc<dyn UsageSource>,
        state: Arc<dyn AlertStateStore>,
        notifier: Arc<dyn NotificationSink>,
        config: &AlertingConfig,
    ) -> Self {
        Self {
            usage,
            state,
            notifier,
            cooldown_days: config.cooldown_days,
            min_quota_bytes: config.min_quota_bytes,
        }
    }

    /// Wire up the adapters selected in `config`
    pub fn from_config(config: &Config, db: &Database) -> Result<Self> {
        let usage: Arc<dyn UsageSource> = match config.usage.source {
            UsageSourceKind::Http => Arc::new(HttpUsageSource::new(&config.usage.http)?),
            UsageSourceKind::Postgres => Arc::new(PostgresUsageSource::new(
                db.require_postgres("usage.source = \"postgres\"")?,
            )),
        };

        let notifier: Arc<dyn NotificationSink> = match config.notifier.sink {
            NotificationSinkKind::Webhook => Arc::new(WebhookNotificationSink::new(
                &config.notifier.webhook,
                config.alerting.app_id.clone(),
            )?),
            NotificationSinkKind::Postgres => Arc::new(PostgresNotificationSink::new(
                db.require_postgres("notifier.sink = \"postgres\"")?,
                config.alerting.app_id.clone(),
            )),
        };

        let state = Arc::new(RedisAlertStateStore::new(&db.redis, config.redis.key_prefix.clone()));

        Ok(Self::new(usage, state, notifier, &config.alerting))
    }

    /// Check a user's usage now
    pub async fn check(&self, user_id: &str) -> Result<CheckOutcome> {
        self.check_at(user_id, Utc::now()).await
    }

    /// Check a user's usage as of `now`
    ///
    /// Not-found usage and rejected notifications are absorbed; any other
    /// collaborator error is returned unchanged and leaves the remaining
    /// steps undone.
    pub async fn check_at(&self, user_id: &str, now: DateTime<Utc>) -> Result<CheckOutcome> {
        if user_id.trim().is_empty() {
            return Err(Error::validation("user id must not be empty"));
        }

        let percentage = self.usage_percentage(user_id).await?;
        let tier = Tier::for_percentage(percentage);

        debug!(user_id = %user_id, percentage, tier = ?tier, "Evaluated quota usage");

        let decision = match tier {
            Some(tier) => {
                let decision = if self.should_issue_warning(user_id, tier, now).await? {
                    if self.issue_warning(user_id, tier, percentage, now).await? {
                        Decision::Notified
                    } else {
                        Decision::NotifyRejected
                    }
                } else {
                    debug!(user_id = %user_id, tier = %tier, "Quota notification cooling down");
                    Decision::CoolingDown
                };

                for lower in tier.and_below() {
                    self.state.set_last_alert(user_id, lower, now).await?;
                }
                for higher in tier.above() {
                    self.state.clear_last_alert(user_id, higher).await?;
                }

                decision
            }
            None => {
                self.resolve_notifications(user_id, now).await?;
                for t in Tier::ALL {
                    self.state.clear_last_alert(user_id, t).await?;
                }
                Decision::Cleared
            }
        };

        Ok(CheckOutcome {
            user_id: user_id.to_string(),
            percentage,
            tier,
            decision,
            checked_at: now,
        })
    }

    /// Whether the cooldown for `tier` has elapsed (or never started)
    pub async fn should_issue_warning(
        &self,
        user_id: &str,
        tier: Tier,
        now: DateTime<Utc>,
    ) -> Result<bool> {
        let Some(last) = self.state.last_alert(user_id, tier).await? else {
            return Ok(true);
        };

        Ok(last
            .checked_add_days(Days::new(self.cooldown_days))
            .is_some_and(|expires| expires < now))
    }

    /// Stored last-alert time for every tier, lowest first
    pub async fn alert_state(&self, user_id: &str) -> Result<Vec<(Tier, Option<DateTime<Utc>>)>> {
        let mut state = Vec::with_capacity(Tier::ALL.len());
        for tier in Tier::ALL {
            state.push((tier, self.state.last_alert(user_id, tier).await?));
        }
        Ok(state)
    }

    /// Resolve open notifications and forget every tier for a user
    pub async fn reset(&self, user_id: &str) -> Result<()> {
        self.resolve_notifications(user_id, Utc::now()).await?;
        for tier in Tier::ALL {
            self.state.clear_last_alert(user_id, tier).await?;
        }
        info!(user_id = %user_id, "Quota alert state reset");
        Ok(())
    }

    /// Usage percentage with not-found and exempt quotas mapped to zero
    async fn usage_percentage(&self, user_id: &str) -> Result<f64> {
        match self.usage.relative_usage(user_id).await {
            Ok(reading) => Ok(reading.alerting_percentage(self.min_quota_bytes)),
            Err(e) if e.is_not_found() => {
                debug!(user_id = %user_id, "No storage found for user, treating usage as zero");
                Ok(UsageReading::zero().alerting_percentage(self.min_quota_bytes))
            }
            Err(e) => Err(e),
        }
    }

    /// Replace any open notification with a fresh one; false if rejected
    async fn issue_warning(
        &self,
        user_id: &str,
        tier: Tier,
        percentage: f64,
        now: DateTime<Utc>,
    ) -> Result<bool> {
        self.resolve_notifications(user_id, now).await?;

        let notice = QuotaNotice::new(user_id, tier, percentage, now);
        match self.notifier.notify(&notice).await {
            Ok(id) => {
                info!(
                    user_id = %user_id,
                    tier = %tier,
                    percentage = notice.percentage,
                    notification_id = %id,
                    "Quota notification issued"
                );
                Ok(true)
            }
            Err(e) if e.is_invalid_argument() => {
                warn!(user_id = %user_id, tier = %tier, error = %e, "Quota notification rejected");
                Ok(false)
            }
            Err(e) => Err(e),
        }
    }

    async fn resolve_notifications(&self, user_id: &str, at: DateTime<Utc>) -> Result<()> {
        match self.notifier.resolve_all(user_id, at).await {
            Err(e) if e.is_invalid_argument() => {
                warn!(user_id = %user_id, error = %e, "Resolving quota notifications rejected");
                Ok(())
            }
            other => other,
        }
    }
}
