//! Status orchestrator.
//!
//! Owns the status cache and the ordered tier list. For one service it asks
//! each tier in turn and keeps the first conclusive answer; for many
//! services it fans out with a concurrency cap and folds the records into an
//! [`AggregateReport`].

use crate::cache::TtlCache;
use crate::config::Config;
use crate::sources::{AggregatorScraper, DetailPageScraper, ModelTier, StatusTier};
use futures::stream::{self, StreamExt};
use status_common::{
    AggregateReport, Catalogue, ServiceDescriptor, ServiceDetail, ServiceStatus, StatusError,
    StatusSource, TopCriticalResponse,
};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

pub struct Orchestrator {
    catalogue: Catalogue,
    tiers: Vec<Arc<dyn StatusTier>>,
    detail: Option<Arc<DetailPageScraper>>,
    cache: TtlCache<String, ServiceStatus>,
    status_ttl: Duration,
    concurrency: usize,
}

impl Orchestrator {
    /// `tiers` are consulted in the given order.
    pub fn new(
        catalogue: Catalogue,
        tiers: Vec<Arc<dyn StatusTier>>,
        status_ttl: Duration,
        concurrency: usize,
    ) -> Self {
        Self {
            catalogue,
            tiers,
            detail: None,
            cache: TtlCache::new(),
            status_ttl,
            concurrency: concurrency.max(1),
        }
    }

    /// Source for the extended detail of `GET /status/{id}`.
    pub fn with_detail(mut self, detail: Arc<DetailPageScraper>) -> Self {
        self.detail = Some(detail);
        self
    }

    /// Production wiring: scraper, model, detail page.
    pub fn from_config(config: &Config) -> Result<Self, StatusError> {
        let scraper: Arc<dyn StatusTier> =
            Arc::new(AggregatorScraper::from_config(&config.sources)?);
        let model: Arc<dyn StatusTier> = Arc::new(ModelTier::from_config(&config.model)?);
        let secondary = Arc::new(DetailPageScraper::from_config(&config.sources)?);

        let tiers = vec![scraper, model, secondary.clone() as Arc<dyn StatusTier>];
        Ok(Self::new(
            config.catalogue()?,
            tiers,
            config.status_ttl(),
            config.cache.concurrency,
        )
        .with_detail(secondary))
    }

    pub fn catalogue(&self) -> &Catalogue {
        &self.catalogue
    }

    /// Cached record, if still fresh.
    pub fn cached(&self, service_id: &str) -> Option<ServiceStatus> {
        self.cache.get(service_id)
    }

    pub async fn get_status(&self, service_id: &str) -> Result<ServiceStatus, StatusError> {
        let service = self
            .catalogue
            .get(service_id)
            .ok_or_else(|| StatusError::ServiceNotFound(service_id.to_string()))?;
        Ok(self.resolve(service).await)
    }

    async fn resolve(&self, service: &ServiceDescriptor) -> ServiceStatus {
        if let Some(hit) = self.cache.get(&service.id) {
            debug!(service = %service.id, "Status cache hit");
            return hit;
        }

        let mut outcomes = Vec::with_capacity(self.tiers.len());
        for tier in &self.tiers {
            let status = tier.check(service).await;
            if status.is_conclusive() {
                debug!(
                    service = %service.id,
                    source = %status.source,
                    severity = %status.severity,
                    "Accepted tier answer"
                );
                self.cache.set(service.id.clone(), status.clone(), self.status_ttl);
                return status;
            }
            debug!(
                service = %service.id,
                source = %tier.source(),
                severity = %status.severity,
                "Tier inconclusive, falling back"
            );
            outcomes.push(format!(
                "{}: {} ({})",
                tier.source(),
                status.severity,
                status.message
            ));
        }

        warn!(service = %service.id, "No tier could determine status");
        let message = if outcomes.is_empty() {
            "No status tiers configured".to_string()
        } else {
            format!("Status could not be determined. {}", outcomes.join("; "))
        };
        ServiceStatus::unknown(service.id.clone(), message, StatusSource::None)
    }

    /// Records for `service_ids`, in the given order. Ids outside the
    /// catalogue yield an `unknown` record instead of failing the batch.
    pub async fn get_aggregate(&self, service_ids: &[String]) -> AggregateReport {
        let details: Vec<ServiceStatus> = stream::iter(service_ids.to_vec())
            .map(|id| async move {
                match self.catalogue.get(&id) {
                    Some(service) => self.resolve(service).await,
                    None => ServiceStatus::unknown(
                        id.clone(),
                        StatusError::ServiceNotFound(id).to_string(),
                        StatusSource::None,
                    ),
                }
            })
            .buffered(self.concurrency)
            .collect()
            .await;

        AggregateReport::from_statuses(details)
    }

    /// Report built from the cache alone; services without a fresh record
    /// are `unknown` with `reason` as message. Never calls a tier.
    pub fn snapshot(&self, reason: &str) -> AggregateReport {
        let details = self
            .catalogue
            .iter()
            .map(|service| {
                self.cache.get(&service.id).unwrap_or_else(|| {
                    ServiceStatus::unknown(service.id.clone(), reason, StatusSource::None)
                })
            })
            .collect();
        AggregateReport::from_statuses(details)
    }

    /// Aggregate over the whole catalogue.
    pub async fn refresh_catalogue(&self) -> AggregateReport {
        let report = self.get_aggregate(&self.catalogue.ids()).await;
        info!(
            checked = report.total_checked,
            problems = report.problem_count,
            unverified = report.unknown_or_error_count,
            "Catalogue refreshed"
        );
        report
    }

    /// Most critical problems across the catalogue.
    pub async fn top_critical(&self, limit: usize) -> TopCriticalResponse {
        let report = self.refresh_catalogue().await;
        TopCriticalResponse::from_report(&report, limit)
    }

    /// Timeline and incidents for one service; `None` when the detail
    /// source is missing or cannot supply them.
    pub async fn detail(&self, service_id: &str) -> Result<Option<ServiceDetail>, StatusError> {
        let service = self
            .catalogue
            .get(service_id)
            .ok_or_else(|| StatusError::ServiceNotFound(service_id.to_string()))?;
        let Some(source) = &self.detail else {
            return Ok(None);
        };
        match source.detail(service).await {
            Ok(detail) => Ok(Some(detail)),
            Err(e) => {
                debug!(service = %service_id, error = %e, "Detail unavailable");
                Ok(None)
            }
        }
    }

    /// Evict stale records without touching fresh ones.
    pub fn purge_expired(&self) -> usize {
        self.cache.purge_expired()
    }

    /// Drop every cached record, including tier-local caches.
    pub fn flush(&self) {
        self.cache.clear();
        for tier in &self.tiers {
            tier.flush();
        }
        info!("Status caches flushed");
    }
}
