//! Wire payloads of the query surface.

use crate::report::AggregateReport;
use crate::status::{ServiceDetail, ServiceStatus};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// `GET /status`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusResponse {
    pub updated_at: DateTime<Utc>,
    pub summary: String,
    pub total_checked: usize,
    pub problems: usize,
    pub unknown_or_error: usize,
    /// Problem records in ranking order
    pub problem_details: Vec<ServiceStatus>,
    pub details: Vec<ServiceStatus>,
}

impl From<AggregateReport> for StatusResponse {
    fn from(report: AggregateReport) -> Self {
        Self {
            updated_at: report.timestamp,
            summary: report.summary(),
            total_checked: report.total_checked,
            problems: report.problem_count,
            unknown_or_error: report.unknown_or_error_count,
            problem_details: report.problems,
            details: report.details,
        }
    }
}

/// `GET /status/{service_id}`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceDetailResponse {
    pub status: ServiceStatus,
    pub detail: Option<ServiceDetail>,
}

/// `GET /status/top`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TopCriticalResponse {
    pub timestamp: DateTime<Utc>,
    pub total_issues: usize,
    pub down: usize,
    pub degraded: usize,
    pub top_critical: Vec<ServiceStatus>,
}

impl TopCriticalResponse {
    pub fn from_report(report: &AggregateReport, limit: usize) -> Self {
        Self {
            timestamp: report.timestamp,
            total_issues: report.problem_count,
            down: report.down_count(),
            degraded: report.degraded_count(),
            top_critical: report.top_problems(limit),
        }
    }
}

/// `GET /health`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub uptime_seconds: u64,
    pub scheduler_running: bool,
    pub tracked_services: usize,
}
