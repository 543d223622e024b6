//! PostgreSQL connection, usage lookups and notification storage

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::{PgPool, PgPoolOptions};
use sqlx::Row;
use tracing::{debug, info};
use uuid::Uuid;

use crate::alerting::{validate_notice, validate_user_id, NotificationSink};
use crate::config::DatabaseConfig;
use crate::error::{Error, Result};
use crate::models::{NotificationId, Quota, QuotaNotice, UsageReading, QUOTA_OBJECT_TYPE};
use crate::usage::UsageSource;

/// PostgreSQL connection pool
#[derive(Clone)]
pub struct PostgresPool {
    pool: PgPool,
}

impl PostgresPool {
    /// Create a new PostgreSQL connection pool
    pub async fn new(config: &DatabaseConfig) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .min_connections(config.min_connections)
            .connect(&config.url)
            .await?;

        Ok(Self { pool })
    }

    /// Run migrations
    pub async fn migrate(&self) -> Result<()> {
        sqlx::migrate!("../../migrations")
            .run(&self.pool)
            .await
            .map_err(|e| Error::Database(format!("Migration failed: {}", e)))?;
        Ok(())
    }

    /// Health check
    pub async fn health_check(&self) -> Result<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }

    /// Get the underlying pool
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

/// Usage read from the host's `storage_usage` table
#[derive(Clone)]
pub struct PostgresUsageSource {
    pool: PgPool,
}

impl PostgresUsageSource {
    /// Create a new usage source
    pub fn new(pool: &PostgresPool) -> Self {
        Self {
            pool: pool.pool.clone(),
        }
    }
}

#[async_trait]
impl UsageSource for PostgresUsageSource {
    async fn relative_usage(&self, user_id: &str) -> Result<UsageReading> {
        let row = sqlx::query(
            r#"
            SELECT quota_bytes, used_bytes FROM storage_usage WHERE user_id = $1
            "#,
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| Error::not_found("storage", user_id))?;

        let quota = Quota::from_raw(row.try_get::<Option<i64>, _>("quota_bytes")?);
        let used = row.try_get::<i64, _>("used_bytes")?.max(0) as u64;

        Ok(UsageReading::from_bytes(quota, used))
    }
}

/// Quota notifications kept in the `quota_notifications` table
#[derive(Clone)]
pub struct PostgresNotificationSink {
    pool: PgPool,
    app_id: String,
}

impl PostgresNotificationSink {
    /// Create a new sink filing notifications under `app_id`
    pub fn new(pool: &PostgresPool, app_id: impl Into<String>) -> Self {
        Self {
            pool: pool.pool.clone(),
            app_id: app_id.into(),
        }
    }
}

#[async_trait]
impl NotificationSink for PostgresNotificationSink {
    async fn notify(&self, notice: &QuotaNotice) -> Result<NotificationId> {
        validate_notice(notice)?;

        let id = Uuid::new_v4();
        sqlx::query(
            r#"
            INSERT INTO quota_notifications (
                id, app_id, object_type, user_id, tier, percentage, created_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7)
            "#,
        )
        .bind(id)
        .bind(&self.app_id)
        .bind(QUOTA_OBJECT_TYPE)
        .bind(&notice.user_id)
        .bind(notice.tier.as_str())
        .bind(i16::from(notice.percentage))
        .bind(notice.issued_at)
        .execute(&self.pool)
        .await?;

        info!(
            user_id = %notice.user_id,
            tier = %notice.tier,
            percentage = notice.percentage,
            notification_id = %id,
            "Quota notification stored"
        );
        Ok(id)
    }

    async fn resolve_all(&self, user_id: &str, at: DateTime<Utc>) -> Result<()> {
        validate_user_id(user_id)?;

        let result = sqlx::query(
            r#"
            UPDATE quota_notifications SET resolved_at = $4
            WHERE app_id = $1 AND object_type = $2 AND user_id = $3 AND resolved_at IS NULL
            "#,
        )
        .bind(&self.app_id)
        .bind(QUOTA_OBJECT_TYPE)
        .bind(user_id)
        .bind(at)
        .execute(&self.pool)
        .await?;

        debug!(user_id = %user_id, resolved = result.rows_affected(), "Resolved quota notifications");
        Ok(())
    }
}
