//! Tier 1: the outage aggregator's homepage.
//!
//! One homepage fetch yields the indicator state of every listed service,
//! so the parsed listing is cached and shared by all per-service checks for
//! the scraper TTL. Concurrent misses wait on a single in-flight fetch.

use super::StatusTier;
use crate::cache::TtlCache;
use crate::config::SourcesConfig;
use crate::extractor::{HomepageExtractor, ListingEntry, ListingExtractor};
use crate::http::{browser_client, get_text_with_retry, RetryPolicy};
use async_trait::async_trait;
use status_common::{ServiceDescriptor, ServiceStatus, Severity, StatusError, StatusSource};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{debug, warn};

type Listing = Result<Arc<Vec<ListingEntry>>, StatusError>;

pub struct AggregatorScraper {
    client: reqwest::Client,
    base_url: String,
    retry: RetryPolicy,
    ttl: Duration,
    extractor: Box<dyn ListingExtractor>,
    results: TtlCache<String, ServiceStatus>,
    listing: TtlCache<&'static str, Listing>,
    fetch_lock: Mutex<()>,
}

const LISTING_KEY: &str = "homepage";

impl AggregatorScraper {
    pub fn new(client: reqwest::Client, base_url: &str, retry: RetryPolicy, ttl: Duration) -> Self {
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            retry,
            ttl,
            extractor: Box::new(HomepageExtractor::default()),
            results: TtlCache::new(),
            listing: TtlCache::new(),
            fetch_lock: Mutex::new(()),
        }
    }

    pub fn from_config(config: &SourcesConfig) -> Result<Self, StatusError> {
        let client = browser_client(
            Duration::from_secs(config.scraper_timeout_secs),
            &config.accept_language,
        )?;
        Ok(Self::new(
            client,
            &config.aggregator_base_url,
            RetryPolicy::new(
                config.retry_attempts,
                Duration::from_millis(config.retry_base_delay_ms),
            ),
            Duration::from_secs(config.scraper_cache_ttl_secs),
        ))
    }

    /// Swap the markup parser.
    pub fn with_extractor(mut self, extractor: Box<dyn ListingExtractor>) -> Self {
        self.extractor = extractor;
        self
    }

    /// Drop cached homepage and per-service results.
    pub fn flush(&self) {
        self.results.clear();
        self.listing.clear();
    }

    async fn fetch_listing(&self) -> Listing {
        if let Some(listing) = self.listing.get(LISTING_KEY) {
            return listing;
        }

        let _guard = self.fetch_lock.lock().await;
        // Another task may have filled the cache while we waited.
        if let Some(listing) = self.listing.get(LISTING_KEY) {
            return listing;
        }

        let url = format!("{}/", self.base_url);
        debug!(%url, "Fetching aggregator homepage");
        let listing = match get_text_with_retry(&self.client, &url, self.retry).await {
            Ok(html) => self.extractor.extract_listing(&html).map(Arc::new),
            Err(e) => Err(e),
        };
        if let Err(e) = &listing {
            warn!(error = %e, "Aggregator homepage unusable");
        }
        self.listing.set(LISTING_KEY, listing.clone(), self.ttl);
        listing
    }

    fn classify(service: &ServiceDescriptor, listing: &[ListingEntry]) -> ServiceStatus {
        let slug = service.slug().to_lowercase();
        let id = service.id.to_lowercase();
        let entry = listing.iter().find(|e| e.slug == slug || e.slug == id);

        let Some(entry) = entry else {
            return ServiceStatus::new(
                service.id.clone(),
                Severity::Stable,
                "Not listed among services with user reports",
                StatusSource::Scraper,
            );
        };

        let reports = entry
            .reports
            .map(|n| format!(" ({} reports in 24h)", n))
            .unwrap_or_default();
        let message = match entry.severity {
            Severity::Down => format!("Outage indicated on aggregator{}", reports),
            Severity::Degraded => format!("Problems indicated on aggregator{}", reports),
            _ => format!("No problem indicator on aggregator{}", reports),
        };
        ServiceStatus::new(service.id.clone(), entry.severity, message, StatusSource::Scraper)
            .with_report_volume(entry.reports)
    }
}

#[async_trait]
impl StatusTier for AggregatorScraper {
    fn source(&self) -> StatusSource {
        StatusSource::Scraper
    }

    fn flush(&self) {
        AggregatorScraper::flush(self);
    }

    async fn check(&self, service: &ServiceDescriptor) -> ServiceStatus {
        if let Some(cached) = self.results.get(&service.id) {
            return cached;
        }

        let status = match self.fetch_listing().await {
            Ok(listing) => Self::classify(service, &listing),
            Err(e) => ServiceStatus::unknown(
                service.id.clone(),
                format!("Aggregator unavailable: {}", e),
                StatusSource::Scraper,
            ),
        };

        // Unknown results are kept too: a blocked site should not be hit
        // again for every service until the TTL runs out.
        self.results.set(service.id.clone(), status.clone(), self.ttl);
        status
    }
}
