//! Catalogue-wide aggregate derived from per-service statuses.

use crate::status::{ServiceStatus, Severity};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AggregateReport {
    pub timestamp: DateTime<Utc>,
    pub total_checked: usize,
    pub problem_count: usize,
    pub unknown_or_error_count: usize,
    /// Degraded/down records, most severe first, then by report volume
    pub problems: Vec<ServiceStatus>,
    /// Every record in the order it was requested
    pub details: Vec<ServiceStatus>,
}

impl AggregateReport {
    pub fn from_statuses(details: Vec<ServiceStatus>) -> Self {
        let mut problems: Vec<ServiceStatus> = details
            .iter()
            .filter(|s| s.severity.has_issues())
            .cloned()
            .collect();
        problems.sort_by(problem_order);

        let unknown_or_error_count = details
            .iter()
            .filter(|s| s.severity.is_unknown_or_error())
            .count();

        Self {
            timestamp: Utc::now(),
            total_checked: details.len(),
            problem_count: problems.len(),
            unknown_or_error_count,
            problems,
            details,
        }
    }

    pub fn down_count(&self) -> usize {
        self.problems
            .iter()
            .filter(|s| s.severity == Severity::Down)
            .count()
    }

    pub fn degraded_count(&self) -> usize {
        self.problem_count - self.down_count()
    }

    /// Records that could not be verified by any tier.
    pub fn unverified(&self) -> impl Iterator<Item = &ServiceStatus> {
        self.details
            .iter()
            .filter(|s| s.severity.is_unknown_or_error())
    }

    /// One-line human summary. Never claims "all stable" while some
    /// services could not be verified.
    pub fn summary(&self) -> String {
        match (self.problem_count, self.unknown_or_error_count) {
            (0, 0) => format!(
                "All {} checked services are stable.",
                self.total_checked
            ),
            (0, unverified) => format!(
                "No issues detected on {} of {} services; {} could not be verified.",
                self.total_checked - unverified,
                self.total_checked,
                unverified
            ),
            (problems, 0) => format!(
                "{} service(s) with issues detected ({} down, {} degraded).",
                problems,
                self.down_count(),
                self.degraded_count()
            ),
            (problems, unverified) => format!(
                "{} service(s) with issues detected ({} down, {} degraded); {} could not be verified.",
                problems,
                self.down_count(),
                self.degraded_count(),
                unverified
            ),
        }
    }

    /// The first `limit` problems.
    pub fn top_problems(&self, limit: usize) -> Vec<ServiceStatus> {
        self.problems.iter().take(limit).cloned().collect()
    }
}

fn problem_order(a: &ServiceStatus, b: &ServiceStatus) -> Ordering {
    b.severity
        .rank()
        .cmp(&a.severity.rank())
        .then_with(|| b.report_volume.unwrap_or(0).cmp(&a.report_volume.unwrap_or(0)))
}
