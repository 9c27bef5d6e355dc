//! Status tiers.
//!
//! A tier answers "what is the status of this service right now" with a
//! [`ServiceStatus`]. Tiers never return errors: a failure is reported as an
//! `unknown`/`error` record so the orchestrator can move to the next tier.
//!
//! Production tiers, in priority order:
//! - [`scraper::AggregatorScraper`] - homepage of the outage aggregator
//! - [`model::ModelTier`] - generative-model estimate
//! - [`secondary::DetailPageScraper`] - per-service detail page
//!
//! Tests use [`fake::FakeTier`] with scripted answers.

pub mod fake;
pub mod model;
pub mod scraper;
pub mod secondary;

use async_trait::async_trait;
use status_common::{ServiceDescriptor, ServiceStatus, StatusSource};

#[async_trait]
pub trait StatusTier: Send + Sync {
    /// Value written into the `source` field of records from this tier
    fn source(&self) -> StatusSource;

    /// Check one service. Must not return `stable` without a positive signal.
    async fn check(&self, service: &ServiceDescriptor) -> ServiceStatus;

    /// Drop any tier-local cache.
    fn flush(&self) {}
}

pub use fake::{FakeTier, TierCallLog};
pub use model::{GeminiBackend, ModelBackend, ModelTier};
pub use scraper::AggregatorScraper;
pub use secondary::DetailPageScraper;
