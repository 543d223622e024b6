//! Alerting system for QuotaWatch
//!
//! Maps storage usage to severity tiers, applies the per-tier cooldown, and
//! keeps at most one open quota notification per user.

mod evaluator;
mod notifier;
mod repository;

pub use evaluator::{CheckOutcome, Decision, QuotaAlertEvaluator};
pub use notifier::{validate_notice, validate_user_id, NotificationSink, WebhookNotificationSink};
pub use repository::{state_key, AlertStateStore, RedisAlertStateStore};
