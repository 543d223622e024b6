//! Notification delivery for quota alerts

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::{Client, StatusCode};
use serde::Serialize;
use tracing::info;
use uuid::Uuid;

use crate::config::WebhookConfig;
use crate::error::{Error, Result};
use crate::models::{dedup_key, NotificationId, QuotaNotice, Tier};

/// Destination for quota notifications
///
/// A sink holds at most one open notification per user: the evaluator always
/// calls [`resolve_all`](Self::resolve_all) before [`notify`](Self::notify).
#[async_trait]
pub trait NotificationSink: Send + Sync {
    /// Create a notification; malformed notices yield `Error::InvalidArgument`
    async fn notify(&self, notice: &QuotaNotice) -> Result<NotificationId>;

    /// Mark every open quota notification for the user as resolved at `at`
    async fn resolve_all(&self, user_id: &str, at: DateTime<Utc>) -> Result<()>;
}

/// Reject notices no sink can deliver
pub fn validate_notice(notice: &QuotaNotice) -> Result<()> {
    validate_user_id(&notice.user_id)?;
    if notice.percentage > 100 {
        return Err(Error::invalid_argument(format!(
            "percentage {} is out of range",
            notice.percentage
        )));
    }
    Ok(())
}

/// Reject empty or whitespace-only user ids
pub fn validate_user_id(user_id: &str) -> Result<()> {
    if user_id.trim().is_empty() {
        return Err(Error::invalid_argument("user id must not be empty"));
    }
    Ok(())
}

/// Sends trigger/resolve events to an HTTP endpoint
pub struct WebhookNotificationSink {
    client: Client,
    url: String,
    app_id: String,
}

impl WebhookNotificationSink {
    /// Create a new webhook sink
    pub fn new(config: &WebhookConfig, app_id: impl Into<String>) -> Result<Self> {
        let client = Client::builder().timeout(config.timeout).build()?;

        Ok(Self {
            client,
            url: config.url.clone(),
            app_id: app_id.into(),
        })
    }

    async fn post(&self, payload: &WebhookPayload<'_>) -> Result<()> {
        let response = self.client.post(&self.url).json(payload).send().await?;

        let status = response.status();
        if status.is_success() {
            return Ok(());
        }

        let body = response.text().await.unwrap_or_default();
        if status == StatusCode::BAD_REQUEST || status == StatusCode::UNPROCESSABLE_ENTITY {
            return Err(Error::invalid_argument(format!(
                "webhook rejected {} event ({status}): {body}",
                payload.event_action
            )));
        }

        Err(Error::Http(format!("Webhook returned {status}: {body}")))
    }
}

#[async_trait]
impl NotificationSink for WebhookNotificationSink {
    async fn notify(&self, notice: &QuotaNotice) -> Result<NotificationId> {
        validate_notice(notice)?;

        let id = Uuid::new_v4();
        let payload = WebhookPayload {
            event_action: "trigger",
            notification_id: Some(id),
            dedup_key: dedup_key(&self.app_id, &notice.user_id),
            app_id: &self.app_id,
            user_id: &notice.user_id,
            tier: Some(notice.tier),
            percentage: Some(notice.percentage),
            timestamp: notice.issued_at,
        };

        self.post(&payload).await?;

        info!(
            user_id = %notice.user_id,
            tier = %notice.tier,
            percentage = notice.percentage,
            notification_id = %id,
            "Quota webhook notification sent"
        );
        Ok(id)
    }

    async fn resolve_all(&self, user_id: &str, at: DateTime<Utc>) -> Result<()> {
        validate_user_id(user_id)?;

        let payload = WebhookPayload {
            event_action: "resolve",
            notification_id: None,
            dedup_key: dedup_key(&self.app_id, user_id),
            app_id: &self.app_id,
            user_id,
            tier: None,
            percentage: None,
            timestamp: at,
        };

        self.post(&payload).await?;

        info!(user_id = %user_id, "Quota webhook notifications resolved");
        Ok(())
    }
}

#[derive(Debug, Serialize)]
struct WebhookPayload<'a> {
    event_action: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    notification_id: Option<Uuid>,
    dedup_key: String,
    app_id: &'a str,
    user_id: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    tier: Option<Tier>,
    #[serde(skip_serializing_if = "Option::is_none")]
    percentage: Option<u8>,
    timestamp: DateTime<Utc>,
}
