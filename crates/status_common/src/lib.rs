//! Shared types for statusd and statusctl.
//!
//! Everything that crosses the HTTP boundary lives here so the daemon and
//! the CLI agree on one wire format.

pub mod api;
pub mod catalogue;
pub mod error;
pub mod report;
pub mod status;

pub use api::{HealthResponse, ServiceDetailResponse, StatusResponse, TopCriticalResponse};
pub use catalogue::{Catalogue, ServiceDescriptor};
pub use error::StatusError;
pub use report::AggregateReport;
pub use status::{Incident, ServiceDetail, ServiceStatus, Severity, StatusSource};

/// Crate version, reported by `/health`.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
