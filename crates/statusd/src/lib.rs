//! statusd - service-health aggregator daemon
//!
//! Answers "is service X having problems right now" from a chain of
//! sources (aggregator homepage, generative model, per-service detail
//! page), caches the answers and refreshes the whole catalogue on a
//! schedule.

pub mod cache;
pub mod config;
pub mod extractor;
pub mod http;
pub mod notifier;
pub mod orchestrator;
pub mod routes;
pub mod scheduler;
pub mod server;
pub mod sources;

pub use config::Config;
pub use orchestrator::Orchestrator;
pub use scheduler::{RefreshCycle, Scheduler, TickHandler};
pub use server::AppState;
