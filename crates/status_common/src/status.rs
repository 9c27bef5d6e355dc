//! Status records - the unit of truth for one service at one point in time.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Normalised outcome of a status check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Stable,
    Degraded,
    Down,
    Unknown,
    Error,
}

impl Severity {
    pub const ALL: [Severity; 5] = [
        Severity::Stable,
        Severity::Degraded,
        Severity::Down,
        Severity::Unknown,
        Severity::Error,
    ];

    /// True only for a positive outage signal.
    pub fn has_issues(self) -> bool {
        matches!(self, Severity::Degraded | Severity::Down)
    }

    /// Stable, degraded and down are answers; unknown and error are not.
    pub fn is_conclusive(self) -> bool {
        matches!(self, Severity::Stable | Severity::Degraded | Severity::Down)
    }

    pub fn is_unknown_or_error(self) -> bool {
        matches!(self, Severity::Unknown | Severity::Error)
    }

    /// Ordering weight for ranking problem lists, most severe first.
    pub fn rank(self) -> u8 {
        match self {
            Severity::Down => 4,
            Severity::Degraded => 3,
            Severity::Error => 2,
            Severity::Unknown => 1,
            Severity::Stable => 0,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Severity::Stable => "stable",
            Severity::Degraded => "degraded",
            Severity::Down => "down",
            Severity::Unknown => "unknown",
            Severity::Error => "error",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Which tier produced a record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum StatusSource {
    #[serde(rename = "scraper")]
    Scraper,
    #[serde(rename = "ai")]
    Ai,
    #[serde(rename = "secondary-scraper")]
    SecondaryScraper,
    #[serde(rename = "none")]
    None,
}

impl StatusSource {
    pub fn as_str(self) -> &'static str {
        match self {
            StatusSource::Scraper => "scraper",
            StatusSource::Ai => "ai",
            StatusSource::SecondaryScraper => "secondary-scraper",
            StatusSource::None => "none",
        }
    }
}

impl fmt::Display for StatusSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Status of one service as observed by one source.
///
/// Build records through [`ServiceStatus::new`] so `has_issues` always
/// follows from `severity`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServiceStatus {
    pub service_id: String,
    pub has_issues: bool,
    pub severity: Severity,
    pub message: String,
    pub source: StatusSource,
    pub observed_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub report_volume: Option<u64>,
}

impl ServiceStatus {
    pub fn new(
        service_id: impl Into<String>,
        severity: Severity,
        message: impl Into<String>,
        source: StatusSource,
    ) -> Self {
        Self {
            service_id: service_id.into(),
            has_issues: severity.has_issues(),
            severity,
            message: message.into(),
            source,
            observed_at: Utc::now(),
            report_volume: None,
        }
    }

    pub fn unknown(
        service_id: impl Into<String>,
        message: impl Into<String>,
        source: StatusSource,
    ) -> Self {
        Self::new(service_id, Severity::Unknown, message, source)
    }

    pub fn error(
        service_id: impl Into<String>,
        message: impl Into<String>,
        source: StatusSource,
    ) -> Self {
        Self::new(service_id, Severity::Error, message, source)
    }

    pub fn with_report_volume(mut self, volume: Option<u64>) -> Self {
        self.report_volume = volume;
        self
    }

    pub fn is_conclusive(&self) -> bool {
        self.severity.is_conclusive()
    }
}

/// One incident note scraped from a service's detail page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Incident {
    pub title: String,
    pub time: String,
    pub description: String,
}

/// Extended detail the detail-page tier can supply for one service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServiceDetail {
    pub service_id: String,
    /// Recent report counts, oldest first.
    pub timeline: Vec<u64>,
    pub incidents: Vec<Incident>,
    pub fetched_at: DateTime<Utc>,
}
