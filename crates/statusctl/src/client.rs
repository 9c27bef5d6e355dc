//! HTTP client for the statusd query surface.

use anyhow::{anyhow, Context, Result};
use serde::de::DeserializeOwned;
use status_common::{HealthResponse, ServiceDetailResponse, StatusResponse, TopCriticalResponse};
use std::time::Duration;

pub struct StatusdClient {
    http: reqwest::Client,
    base: String,
}

impl StatusdClient {
    pub fn new(base: &str) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .context("failed to build HTTP client")?;
        Ok(Self {
            http,
            base: base.trim_end_matches('/').to_string(),
        })
    }

    async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<(T, serde_json::Value)> {
        let url = format!("{}{}", self.base, path);
        let response = self.http.get(&url).send().await.map_err(|e| {
            anyhow!(
                "Cannot reach statusd at {}: {}\n\
                 Is the daemon running? Set --url or $STATUSCTL_URL.",
                self.base,
                e
            )
        })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(anyhow!("statusd returned HTTP {}: {}", status, body));
        }

        let raw: serde_json::Value = response.json().await.context("invalid JSON from statusd")?;
        let typed = serde_json::from_value(raw.clone()).context("unexpected payload from statusd")?;
        Ok((typed, raw))
    }

    pub async fn status(&self) -> Result<(StatusResponse, serde_json::Value)> {
        self.get("/status").await
    }

    pub async fn service(&self, id: &str) -> Result<(ServiceDetailResponse, serde_json::Value)> {
        self.get(&format!("/status/{}", id)).await
    }

    pub async fn top(&self, limit: usize) -> Result<(TopCriticalResponse, serde_json::Value)> {
        self.get(&format!("/status/top?limit={}", limit)).await
    }

    pub async fn health(&self) -> Result<(HealthResponse, serde_json::Value)> {
        self.get("/health").await
    }

    pub async fn flush(&self) -> Result<serde_json::Value> {
        let url = format!("{}/admin/cache/flush", self.base);
        let response = self
            .http
            .post(&url)
            .send()
            .await
            .with_context(|| format!("Cannot reach statusd at {}", self.base))?;
        if !response.status().is_success() {
            return Err(anyhow!("flush failed: HTTP {}", response.status()));
        }
        response.json().await.context("invalid JSON from statusd")
    }
}
