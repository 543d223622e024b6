//! Postgres adapter tests against a live database
//!
//! Run with `QUOTAWATCH_TEST_DATABASE_URL=postgres://... cargo test -- --ignored`.

use chrono::{TimeZone, Utc};
use uuid::Uuid;

use quotawatch::alerting::NotificationSink;
use quotawatch::config::DatabaseConfig;
use quotawatch::db::{PostgresNotificationSink, PostgresPool, PostgresUsageSource};
use quotawatch::models::{Quota, QuotaNotice, Tier};
use quotawatch::usage::UsageSource;

async fn pool() -> PostgresPool {
    let url = std::env::var("QUOTAWATCH_TEST_DATABASE_URL")
        .expect("QUOTAWATCH_TEST_DATABASE_URL must be set");
    let pool = PostgresPool::new(&DatabaseConfig {
        url,
        ..DatabaseConfig::default()
    })
    .await
    .unwrap();
    pool.migrate().await.unwrap();
    pool
}

fn unique_user(name: &str) -> String {
    format!("{name}-{}", Uuid::new_v4())
}

async fn open_count(pool: &PostgresPool, app_id: &str, user_id: &str) -> i64 {
    sqlx::query_scalar(
        "SELECT COUNT(*) FROM quota_notifications WHERE app_id = $1 AND user_id = $2 AND resolved_at IS NULL",
    )
    .bind(app_id)
    .bind(user_id)
    .fetch_one(pool.pool())
    .await
    .unwrap()
}

#[tokio::test]
#[ignore = "needs a live PostgreSQL"]
async fn test_usage_row_is_read_and_missing_row_is_not_found() {
    let pool = pool().await;
    let user = unique_user("alice");
    sqlx::query("INSERT INTO storage_usage (user_id, quota_bytes, used_bytes) VALUES ($1, $2, $3)")
        .bind(&user)
        .bind(1_000_i64)
        .bind(970_i64)
        .execute(pool.pool())
        .await
        .unwrap();

    let source = PostgresUsageSource::new(&pool);
    let reading = source.relative_usage(&user).await.unwrap();
    assert_eq!(reading.quota, Quota::Bytes(1_000));
    assert!((reading.relative - 0.97).abs() < 1e-9);

    let err = source.relative_usage(&unique_user("ghost")).await.unwrap_err();
    assert!(err.is_not_found());
}

#[tokio::test]
#[ignore = "needs a live PostgreSQL"]
async fn test_null_quota_is_unlimited() {
    let pool = pool().await;
    let user = unique_user("open");
    sqlx::query("INSERT INTO storage_usage (user_id, quota_bytes, used_bytes) VALUES ($1, NULL, 10)")
        .bind(&user)
        .execute(pool.pool())
        .await
        .unwrap();

    let reading = PostgresUsageSource::new(&pool).relative_usage(&user).await.unwrap();
    assert_eq!(reading.quota, Quota::Unlimited);
}

#[tokio::test]
#[ignore = "needs a live PostgreSQL"]
async fn test_resolve_all_only_touches_one_user_and_app() {
    let pool = pool().await;
    let app_id = format!("files-{}", Uuid::new_v4());
    let sink = PostgresNotificationSink::new(&pool, app_id.clone());
    let other_app = PostgresNotificationSink::new(&pool, format!("other-{}", Uuid::new_v4()));
    let bob = unique_user("bob");
    let cat = unique_user("cat");
    let at = Utc.with_ymd_and_hms(2024, 3, 1, 9, 0, 0).unwrap();

    sink.notify(&QuotaNotice::new(&bob, Tier::Warning, 85.0, at)).await.unwrap();
    sink.notify(&QuotaNotice::new(&cat, Tier::Alert, 97.0, at)).await.unwrap();
    other_app.notify(&QuotaNotice::new(&bob, Tier::Info, 60.0, at)).await.unwrap();

    sink.resolve_all(&bob, at).await.unwrap();

    assert_eq!(open_count(&pool, &app_id, &bob).await, 0);
    assert_eq!(open_count(&pool, &app_id, &cat).await, 1);

    let resolved_at: Option<chrono::DateTime<Utc>> = sqlx::query_scalar(
        "SELECT resolved_at FROM quota_notifications WHERE app_id = $1 AND user_id = $2",
    )
    .bind(&app_id)
    .bind(&bob)
    .fetch_one(pool.pool())
    .await
    .unwrap();
    assert_eq!(resolved_at, Some(at));
}

#[tokio::test]
#[ignore = "needs a live PostgreSQL"]
async fn test_empty_user_is_rejected_before_sql() {
    let pool = pool().await;
    let sink = PostgresNotificationSink::new(&pool, "files");

    let err = sink.resolve_all(" ", Utc::now()).await.unwrap_err();
    assert!(err.is_invalid_argument());
}
