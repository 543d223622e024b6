//! Database layer for QuotaWatch
//!
//! Redis holds alert state; PostgreSQL is optional and only connected when a
//! Postgres-backed usage source or notification sink is configured.

mod postgres;
mod redis;

pub use postgres::{PostgresNotificationSink, PostgresPool, PostgresUsageSource};
pub use self::redis::RedisPool;

use crate::config::Config;
use crate::error::{Error, Result};

/// Database connections bundle
#[derive(Clone)]
pub struct Database {
    /// PostgreSQL connection pool, when any adapter needs it
    pub postgres: Option<PostgresPool>,
    /// Redis connection pool
    pub redis: RedisPool,
}

impl Database {
    /// Create a new database connection bundle
    pub async fn new(config: &Config) -> Result<Self> {
        let postgres = if config.requires_postgres() {
            Some(PostgresPool::new(&config.database).await?)
        } else {
            None
        };
        let redis = RedisPool::new(&config.redis)?;

        Ok(Self { postgres, redis })
    }

    /// Connect to PostgreSQL regardless of adapter selection
    pub async fn connect_postgres(config: &Config) -> Result<PostgresPool> {
        PostgresPool::new(&config.database).await
    }

    /// The Postgres pool, or a config error naming who needed it
    pub fn require_postgres(&self, needed_by: &str) -> Result<&PostgresPool> {
        self.postgres
            .as_ref()
            .ok_or_else(|| Error::config(format!("{needed_by} requires a PostgreSQL connection")))
    }

    /// Check database health
    pub async fn health_check(&self) -> Result<()> {
        if let Some(postgres) = &self.postgres {
            postgres.health_check().await?;
        }
        self.redis.health_check().await?;
        Ok(())
    }
}
