//! Tier 3: the aggregator's per-service detail page.
//!
//! Reads the recent report timeline and compares the latest point against
//! the baseline formed by the earlier ones. Also the source of the extended
//! [`ServiceDetail`] shown by the single-service endpoint.

use super::StatusTier;
use crate::cache::TtlCache;
use crate::config::{default_calm_phrases, SourcesConfig};
use crate::extractor::{DetailExtractor, DetailPage, DetailPageExtractor};
use crate::http::{browser_client, get_text_with_retry, RetryPolicy};
use async_trait::async_trait;
use chrono::Utc;
use regex::{Regex, RegexBuilder};
use status_common::{
    ServiceDescriptor, ServiceDetail, ServiceStatus, Severity, StatusError, StatusSource,
};
use std::time::Duration;
use tracing::{debug, warn};

/// Latest report count must exceed this before a spike counts
pub const SPIKE_MIN_REPORTS: u64 = 50;
/// Latest / baseline ratio for `degraded`
pub const SPIKE_DEGRADED_RATIO: f64 = 1.5;
/// Latest / baseline ratio for `down`
pub const SPIKE_DOWN_RATIO: f64 = 3.0;

pub struct DetailPageScraper {
    client: reqwest::Client,
    base_url: String,
    detail_path: String,
    retry: RetryPolicy,
    ttl: Duration,
    extractor: Box<dyn DetailExtractor>,
    problem_words: Option<Regex>,
    calm_words: Option<Regex>,
    pages: TtlCache<String, Result<DetailPage, StatusError>>,
}

impl DetailPageScraper {
    pub fn new(
        client: reqwest::Client,
        base_url: &str,
        detail_path: &str,
        retry: RetryPolicy,
        ttl: Duration,
        problem_keywords: &[String],
    ) -> Result<Self, StatusError> {
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            detail_path: detail_path.to_string(),
            retry,
            ttl,
            extractor: Box::new(DetailPageExtractor::default()),
            problem_words: keyword_regex(problem_keywords)?,
            calm_words: keyword_regex(&default_calm_phrases())?,
            pages: TtlCache::new(),
        })
    }

    /// Headline phrases that positively state there is no problem.
    pub fn with_calm_phrases(mut self, phrases: &[String]) -> Result<Self, StatusError> {
        self.calm_words = keyword_regex(phrases)?;
        Ok(self)
    }

    pub fn from_config(config: &SourcesConfig) -> Result<Self, StatusError> {
        let client = browser_client(
            Duration::from_secs(config.scraper_timeout_secs),
            &config.accept_language,
        )?;
        Self::new(
            client,
            &config.aggregator_base_url,
            &config.detail_path,
            RetryPolicy::new(
                config.retry_attempts,
                Duration::from_millis(config.retry_base_delay_ms),
            ),
            Duration::from_secs(config.scraper_cache_ttl_secs),
            &config.problem_keywords,
        )?
        .with_calm_phrases(&config.calm_phrases)
    }

    pub fn with_extractor(mut self, extractor: Box<dyn DetailExtractor>) -> Self {
        self.extractor = extractor;
        self
    }

    pub fn flush(&self) {
        self.pages.clear();
    }

    fn page_url(&self, service: &ServiceDescriptor) -> String {
        let path = self.detail_path.replace("{slug}", service.slug());
        if path.starts_with('/') {
            format!("{}{}", self.base_url, path)
        } else {
            format!("{}/{}", self.base_url, path)
        }
    }

    async fn page(&self, service: &ServiceDescriptor) -> Result<DetailPage, StatusError> {
        if let Some(page) = self.pages.get(&service.id) {
            return page;
        }

        let url = self.page_url(service);
        debug!(service = %service.id, %url, "Fetching detail page");
        let page = match get_text_with_retry(&self.client, &url, self.retry).await {
            Ok(html) => self.extractor.extract_detail(&html),
            Err(e) => Err(e),
        };
        if let Err(e) = &page {
            warn!(service = %service.id, error = %e, "Detail page unusable");
        }
        self.pages.set(service.id.clone(), page.clone(), self.ttl);
        page
    }

    /// Timeline and incidents for one service.
    pub async fn detail(&self, service: &ServiceDescriptor) -> Result<ServiceDetail, StatusError> {
        let page = self.page(service).await?;
        Ok(ServiceDetail {
            service_id: service.id.clone(),
            timeline: page.timeline,
            incidents: page.incidents,
            fetched_at: Utc::now(),
        })
    }

    fn classify(&self, service_id: &str, page: &DetailPage) -> ServiceStatus {
        if let Some((&latest, history)) = page.timeline.split_last() {
            return classify_timeline(service_id, latest, history);
        }

        let Some(headline) = &page.headline else {
            return ServiceStatus::unknown(
                service_id,
                "Detail page has no timeline or headline",
                StatusSource::SecondaryScraper,
            );
        };

        // Calm phrases first: "no problems" also contains a problem stem.
        if matches_any(&self.calm_words, headline) {
            ServiceStatus::new(
                service_id,
                Severity::Stable,
                format!("Detail page shows no problems: {}", headline),
                StatusSource::SecondaryScraper,
            )
        } else if matches_any(&self.problem_words, headline) {
            ServiceStatus::new(
                service_id,
                Severity::Degraded,
                format!("Detail page reports problems: {}", headline),
                StatusSource::SecondaryScraper,
            )
        } else {
            ServiceStatus::unknown(
                service_id,
                format!("Detail page headline not recognised: {}", headline),
                StatusSource::SecondaryScraper,
            )
        }
    }
}

fn matches_any(words: &Option<Regex>, text: &str) -> bool {
    words.as_ref().map(|w| w.is_match(text)).unwrap_or(false)
}

/// Case-insensitive alternation of word stems: each keyword must start at a
/// word boundary, so "problem" also matches "problems" and "problemas".
fn keyword_regex(keywords: &[String]) -> Result<Option<Regex>, StatusError> {
    let words: Vec<String> = keywords
        .iter()
        .map(|k| k.trim())
        .filter(|k| !k.is_empty())
        .map(regex::escape)
        .collect();
    if words.is_empty() {
        return Ok(None);
    }
    RegexBuilder::new(&format!(r"\b(?:{})", words.join("|")))
        .case_insensitive(true)
        .build()
        .map(Some)
        .map_err(|e| StatusError::Config(format!("invalid problem keywords: {}", e)))
}

/// Spike rule over report counts, oldest first.
fn classify_timeline(service_id: &str, latest: u64, history: &[u64]) -> ServiceStatus {
    let baseline = if history.is_empty() {
        0.0
    } else {
        history.iter().sum::<u64>() as f64 / history.len() as f64
    };

    // The aggregator serves flat zeroes when it refuses to answer.
    if latest == 0 && baseline == 0.0 {
        return ServiceStatus::unknown(
            service_id,
            "Report timeline is empty (likely blocked)",
            StatusSource::SecondaryScraper,
        );
    }

    let ratio = if baseline > 0.0 {
        latest as f64 / baseline
    } else {
        f64::INFINITY
    };

    let severity = if latest <= SPIKE_MIN_REPORTS {
        Severity::Stable
    } else if history.is_empty() {
        // A single point has no baseline to call an outage against.
        Severity::Degraded
    } else if ratio > SPIKE_DOWN_RATIO {
        Severity::Down
    } else if ratio > SPIKE_DEGRADED_RATIO {
        Severity::Degraded
    } else {
        Severity::Stable
    };

    let message = match severity {
        Severity::Stable => format!(
            "{} recent reports, in line with baseline {:.0}",
            latest, baseline
        ),
        _ => format!(
            "Report spike: {} recent reports against baseline {:.0}",
            latest, baseline
        ),
    };
    ServiceStatus::new(service_id, severity, message, StatusSource::SecondaryScraper)
        .with_report_volume(Some(latest))
}

#[async_trait]
impl StatusTier for DetailPageScraper {
    fn source(&self) -> StatusSource {
        StatusSource::SecondaryScraper
    }

    fn flush(&self) {
        DetailPageScraper::flush(self);
    }

    async fn check(&self, service: &ServiceDescriptor) -> ServiceStatus {
        match self.page(service).await {
            Ok(page) => self.classify(&service.id, &page),
            Err(e) => ServiceStatus::unknown(
                service.id.clone(),
                format!("Detail page unavailable: {}", e),
                StatusSource::SecondaryScraper,
            ),
        }
    }
}
