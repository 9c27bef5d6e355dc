//! Tier 2: generative-model estimate.
//!
//! The model is asked for a strict JSON verdict about one service. Its
//! answer is only trusted when it names a conclusive state; anything else
//! becomes `unknown` or `error` so the next tier gets a chance.

use super::StatusTier;
use crate::cache::TtlCache;
use crate::config::ModelConfig;
use async_trait::async_trait;
use serde::Deserialize;
use status_common::{ServiceDescriptor, ServiceStatus, Severity, StatusError, StatusSource};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tracing::{debug, warn};

/// Text-in, text-out access to a generative model.
#[async_trait]
pub trait ModelBackend: Send + Sync {
    async fn generate(&self, prompt: &str) -> Result<String, StatusError>;
}

/// Gemini `generateContent` REST backend.
pub struct GeminiBackend {
    client: reqwest::Client,
    endpoint: String,
    model: String,
    api_key: String,
}

impl GeminiBackend {
    pub fn new(
        endpoint: &str,
        model: &str,
        api_key: &str,
        timeout: Duration,
    ) -> Result<Self, StatusError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| StatusError::Config(format!("failed to build model client: {}", e)))?;
        Ok(Self {
            client,
            endpoint: endpoint.trim_end_matches('/').to_string(),
            model: model.to_string(),
            api_key: api_key.to_string(),
        })
    }
}

#[async_trait]
impl ModelBackend for GeminiBackend {
    async fn generate(&self, prompt: &str) -> Result<String, StatusError> {
        let url = format!(
            "{}/v1beta/models/{}:generateContent",
            self.endpoint, self.model
        );
        let body = serde_json::json!({
            "contents": [{ "parts": [{ "text": prompt }] }]
        });

        let response = self
            .client
            .post(&url)
            .query(&[("key", self.api_key.as_str())])
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    StatusError::SourceUnavailable("model request timed out".to_string())
                } else {
                    StatusError::SourceUnavailable(format!("model request failed: {}", e))
                }
            })?;

        if !response.status().is_success() {
            return Err(StatusError::SourceUnavailable(format!(
                "HTTP {} from model endpoint",
                response.status()
            )));
        }

        let reply: serde_json::Value = response
            .json()
            .await
            .map_err(|e| StatusError::ModelResponseMalformed(format!("reply is not JSON: {}", e)))?;

        reply
            .pointer("/candidates/0/content/parts/0/text")
            .and_then(|v| v.as_str())
            .map(str::to_string)
            .ok_or_else(|| {
                StatusError::ModelResponseMalformed("reply has no candidate text".to_string())
            })
    }
}

/// Backend replaying canned replies, for tests.
#[derive(Clone, Default)]
pub struct FakeModelBackend {
    replies: Arc<Mutex<Vec<Result<String, StatusError>>>>,
    calls: Arc<AtomicUsize>,
    prompts: Arc<Mutex<Vec<String>>>,
}

impl FakeModelBackend {
    /// Always answer with `reply`.
    pub fn replying(reply: &str) -> Self {
        let fake = Self::default();
        fake.push(Ok(reply.to_string()));
        fake
    }

    /// Always fail with `err`.
    pub fn failing(err: StatusError) -> Self {
        let fake = Self::default();
        fake.push(Err(err));
        fake
    }

    /// Queue a reply. The last queued reply repeats once the queue drains.
    pub fn push(&self, reply: Result<String, StatusError>) {
        self.replies.lock().unwrap_or_else(|p| p.into_inner()).push(reply);
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().unwrap_or_else(|p| p.into_inner()).clone()
    }
}

#[async_trait]
impl ModelBackend for FakeModelBackend {
    async fn generate(&self, prompt: &str) -> Result<String, StatusError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.prompts.lock().unwrap_or_else(|p| p.into_inner()).push(prompt.to_string());
        let mut replies = self.replies.lock().unwrap_or_else(|p| p.into_inner());
        match replies.len() {
            0 => Err(StatusError::SourceUnavailable("no scripted reply".to_string())),
            1 => replies[0].clone(),
            _ => replies.remove(0),
        }
    }
}

#[derive(Debug, Deserialize)]
struct Verdict {
    #[serde(rename = "hasIssues", default)]
    has_issues: Option<bool>,
    status: String,
    #[serde(default)]
    message: Option<String>,
}

/// How long a model verdict is reused unless configured otherwise
pub const DEFAULT_MODEL_CACHE_TTL: Duration = Duration::from_secs(300);

/// The model-backed tier. Built disabled when no credential exists.
pub struct ModelTier {
    backend: Option<Arc<dyn ModelBackend>>,
    ttl: Duration,
    verdicts: TtlCache<String, ServiceStatus>,
}

/// Outermost `{ ... }` span of the reply; models like to wrap JSON in prose
/// or code fences.
fn json_payload(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let end = text.rfind('}')?;
    (end > start).then(|| &text[start..=end])
}

impl ModelTier {
    pub fn new(backend: Arc<dyn ModelBackend>) -> Self {
        Self {
            backend: Some(backend),
            ttl: DEFAULT_MODEL_CACHE_TTL,
            verdicts: TtlCache::new(),
        }
    }

    pub fn disabled() -> Self {
        Self {
            backend: None,
            ttl: DEFAULT_MODEL_CACHE_TTL,
            verdicts: TtlCache::new(),
        }
    }

    /// Every answer, conclusive or not, is reused for `ttl`.
    pub fn with_cache_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }

    pub fn flush(&self) {
        self.verdicts.clear();
    }

    /// Gemini-backed tier, or a disabled one when no API key is configured.
    pub fn from_config(config: &ModelConfig) -> Result<Self, StatusError> {
        match config.api_key.as_deref().filter(|k| !k.trim().is_empty()) {
            Some(key) => {
                let backend = GeminiBackend::new(
                    &config.endpoint,
                    &config.model,
                    key,
                    Duration::from_secs(config.timeout_secs),
                )?;
                Ok(Self::new(Arc::new(backend))
                    .with_cache_ttl(Duration::from_secs(config.cache_ttl_secs)))
            }
            None => {
                warn!("{}", StatusError::ModelConfigMissing);
                Ok(Self::disabled())
            }
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.backend.is_some()
    }

    fn prompt(service: &ServiceDescriptor) -> String {
        format!(
            "You are a service-health monitor. Based on what you know about recent \
             incidents, estimate the current operational status of the online service \
             \"{name}\" (id: {id}).\n\
             Answer ONLY with a JSON object of exactly this shape, no other text:\n\
             {{\"hasIssues\": true|false, \"status\": \"stable\"|\"degraded\"|\"down\"|\"unknown\", \
             \"message\": \"one short sentence\"}}\n\
             Use \"unknown\" if you have no reliable information.",
            name = service.display_name,
            id = service.id,
        )
    }

    /// Turn the model's free text into a record.
    fn parse_reply(&self, service_id: &str, text: &str) -> Result<ServiceStatus, StatusError> {
        let payload = json_payload(text).ok_or_else(|| {
            StatusError::ModelResponseMalformed("no JSON object in reply".to_string())
        })?;
        let verdict: Verdict = serde_json::from_str(payload)
            .map_err(|e| StatusError::ModelResponseMalformed(e.to_string()))?;

        let severity = match verdict.status.trim().to_lowercase().as_str() {
            "stable" => Severity::Stable,
            "degraded" | "unstable" => Severity::Degraded,
            "down" => Severity::Down,
            "unknown" => Severity::Unknown,
            other => {
                return Err(StatusError::ModelResponseMalformed(format!(
                    "unexpected status '{}'",
                    other
                )))
            }
        };

        if let Some(flag) = verdict.has_issues {
            if flag != severity.has_issues() {
                debug!(
                    service = service_id,
                    flag,
                    %severity,
                    "Model hasIssues disagrees with status; status wins"
                );
            }
        }

        let message = verdict
            .message
            .filter(|m| !m.trim().is_empty())
            .unwrap_or_else(|| format!("Model estimate: {}", severity));
        Ok(ServiceStatus::new(service_id, severity, message, StatusSource::Ai))
    }
}

#[async_trait]
impl StatusTier for ModelTier {
    fn source(&self) -> StatusSource {
        StatusSource::Ai
    }

    fn flush(&self) {
        ModelTier::flush(self);
    }

    async fn check(&self, service: &ServiceDescriptor) -> ServiceStatus {
        let Some(backend) = &self.backend else {
            return ServiceStatus::error(
                service.id.clone(),
                StatusError::ModelConfigMissing.to_string(),
                StatusSource::Ai,
            );
        };

        if let Some(hit) = self.verdicts.get(&service.id) {
            debug!(service = %service.id, "Model verdict cache hit");
            return hit;
        }

        let result = match backend.generate(&Self::prompt(service)).await {
            Ok(text) => self.parse_reply(&service.id, &text),
            Err(e) => Err(e),
        };

        let status = match result {
            Ok(status) => status,
            Err(e @ StatusError::SourceUnavailable(_)) => {
                warn!(service = %service.id, error = %e, "Model tier unavailable");
                ServiceStatus::unknown(service.id.clone(), e.to_string(), StatusSource::Ai)
            }
            Err(e) => {
                warn!(service = %service.id, error = %e, "Model tier failed");
                ServiceStatus::error(service.id.clone(), e.to_string(), StatusSource::Ai)
            }
        };
        self.verdicts.set(service.id.clone(), status.clone(), self.ttl);
        status
    }
}
