//! Scripted tier for deterministic tests.
//!
//! ```rust,ignore
//! let log = TierCallLog::default();
//! let scraper = FakeTier::new(StatusSource::Scraper, log.clone())
//!     .answer("examplepay", Severity::Unknown);
//! ```

use super::StatusTier;
use async_trait::async_trait;
use status_common::{ServiceDescriptor, ServiceStatus, Severity, StatusSource};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Shared, ordered record of tier invocations across several fakes.
#[derive(Debug, Clone, Default)]
pub struct TierCallLog {
    calls: Arc<Mutex<Vec<(StatusSource, String)>>>,
}

impl TierCallLog {
    fn record(&self, source: StatusSource, service_id: &str) {
        self.calls
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .push((source, service_id.to_string()));
    }

    /// All calls in invocation order.
    pub fn calls(&self) -> Vec<(StatusSource, String)> {
        self.calls.lock().unwrap_or_else(|p| p.into_inner()).clone()
    }

    /// Sources invoked for one service, in order.
    pub fn sources_for(&self, service_id: &str) -> Vec<StatusSource> {
        self.calls
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .iter()
            .filter(|(_, id)| id == service_id)
            .map(|(source, _)| *source)
            .collect()
    }

    pub fn count(&self, source: StatusSource) -> usize {
        self.calls
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .iter()
            .filter(|(s, _)| *s == source)
            .count()
    }

    pub fn clear(&self) {
        self.calls.lock().unwrap_or_else(|p| p.into_inner()).clear();
    }
}

/// Tier answering from a per-service script, `unknown` by default.
pub struct FakeTier {
    source: StatusSource,
    answers: HashMap<String, (Severity, Option<u64>)>,
    default: Severity,
    delay: Option<Duration>,
    log: TierCallLog,
}

impl FakeTier {
    pub fn new(source: StatusSource, log: TierCallLog) -> Self {
        Self {
            source,
            answers: HashMap::new(),
            default: Severity::Unknown,
            delay: None,
            log,
        }
    }

    pub fn answer(mut self, service_id: &str, severity: Severity) -> Self {
        self.answers.insert(service_id.to_string(), (severity, None));
        self
    }

    pub fn answer_with_volume(mut self, service_id: &str, severity: Severity, volume: u64) -> Self {
        self.answers
            .insert(service_id.to_string(), (severity, Some(volume)));
        self
    }

    pub fn default_answer(mut self, severity: Severity) -> Self {
        self.default = severity;
        self
    }

    /// Sleep before answering, to exercise budgets and concurrency.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }
}

#[async_trait]
impl StatusTier for FakeTier {
    fn source(&self) -> StatusSource {
        self.source
    }

    async fn check(&self, service: &ServiceDescriptor) -> ServiceStatus {
        self.log.record(self.source, &service.id);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        let (severity, volume) = self
            .answers
            .get(&service.id)
            .copied()
            .unwrap_or((self.default, None));
        ServiceStatus::new(
            service.id.clone(),
            severity,
            format!("fake {} answer", self.source),
            self.source,
        )
        .with_report_volume(volume)
    }
}
