//! Critical-outage alerts.
//!
//! Sends one webhook POST per refresh cycle that crosses the alert
//! threshold. Delivery problems are returned to the caller, which logs them
//! and carries on.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use status_common::{AggregateReport, StatusError};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tracing::info;

/// Body of an alert POST.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlertPayload {
    pub level: String,
    pub timestamp: DateTime<Utc>,
    pub data: AggregateReport,
}

impl AlertPayload {
    pub fn critical(report: &AggregateReport) -> Self {
        Self {
            level: "CRITICAL".to_string(),
            timestamp: Utc::now(),
            data: report.clone(),
        }
    }
}

#[async_trait]
pub trait AlertSink: Send + Sync {
    async fn send(&self, alert: &AlertPayload) -> Result<(), StatusError>;
}

/// POSTs alerts as JSON to a fixed URL.
pub struct WebhookNotifier {
    client: reqwest::Client,
    url: String,
}

impl WebhookNotifier {
    pub fn new(url: &str, timeout: Duration) -> Result<Self, StatusError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| StatusError::Config(format!("failed to build webhook client: {}", e)))?;
        Ok(Self {
            client,
            url: url.to_string(),
        })
    }
}

#[async_trait]
impl AlertSink for WebhookNotifier {
    async fn send(&self, alert: &AlertPayload) -> Result<(), StatusError> {
        let response = self
            .client
            .post(&self.url)
            .json(alert)
            .send()
            .await
            .map_err(|e| StatusError::WebhookDeliveryFailed(e.to_string()))?;

        if !response.status().is_success() {
            return Err(StatusError::WebhookDeliveryFailed(format!(
                "HTTP {} from webhook",
                response.status()
            )));
        }
        info!(
            down = alert.data.down_count(),
            "Critical alert delivered"
        );
        Ok(())
    }
}

/// Keeps alerts in memory, for tests.
#[derive(Clone, Default)]
pub struct RecordingNotifier {
    sent: Arc<Mutex<Vec<AlertPayload>>>,
}

impl RecordingNotifier {
    pub fn alerts(&self) -> Vec<AlertPayload> {
        self.sent.lock().unwrap_or_else(|p| p.into_inner()).clone()
    }
}

#[async_trait]
impl AlertSink for RecordingNotifier {
    async fn send(&self, alert: &AlertPayload) -> Result<(), StatusError> {
        self.sent.lock().unwrap_or_else(|p| p.into_inner()).push(alert.clone());
        Ok(())
    }
}
