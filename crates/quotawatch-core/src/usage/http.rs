//! Usage lookups against the host's HTTP API

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use tracing::debug;

use crate::config::HttpUsageConfig;
use crate::error::{Error, Result};
use crate::models::{Quota, UsageReading};

use super::UsageSource;

/// Reads `GET {base_url}/users/{user_id}/quota`
pub struct HttpUsageSource {
    client: Client,
    base_url: url::Url,
}

impl HttpUsageSource {
    /// Create a new HTTP usage source
    pub fn new(config: &HttpUsageConfig) -> Result<Self> {
        let client = Client::builder().timeout(config.timeout).build()?;
        let base_url = url::Url::parse(&config.base_url)
            .map_err(|e| Error::config(format!("invalid usage base URL: {e}")))?;
        if base_url.cannot_be_a_base() {
            return Err(Error::config("usage base URL cannot carry a path"));
        }

        Ok(Self { client, base_url })
    }
}

/// Response body of the quota endpoint
#[derive(Debug, Deserialize)]
struct QuotaResponse {
    /// Quota in bytes; absent, null or negative means unlimited
    #[serde(default)]
    quota_bytes: Option<i64>,
    relative: f64,
}

#[async_trait]
impl UsageSource for HttpUsageSource {
    async fn relative_usage(&self, user_id: &str) -> Result<UsageReading> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|()| Error::config("usage base URL cannot carry a path"))?
            .pop_if_empty()
            .extend(["users", user_id, "quota"]);

        let response = self.client.get(url).send().await?;

        match response.status() {
            StatusCode::NOT_FOUND => return Err(Error::not_found("storage", user_id)),
            status if !status.is_success() => {
                let body = response.text().await.unwrap_or_default();
                return Err(Error::Http(format!("Usage API returned {status}: {body}")));
            }
            _ => {}
        }

        let body: QuotaResponse = response.json().await?;
        let reading = UsageReading::new(Quota::from_raw(body.quota_bytes), body.relative);

        debug!(user_id = %user_id, quota = ?reading.quota, relative = reading.relative, "Fetched usage");
        Ok(reading)
    }
}
