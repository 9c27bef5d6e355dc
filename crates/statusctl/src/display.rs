//! Terminal rendering of statusd payloads.

use owo_colors::OwoColorize;
use status_common::{
    HealthResponse, ServiceDetailResponse, ServiceStatus, Severity, StatusResponse,
    TopCriticalResponse,
};

const SEPARATOR: &str = "------------------------------------------------------------";

/// Fixed-width severity tag, coloured by state.
pub fn severity_tag(severity: Severity) -> String {
    let tag = format!("[{:<8}]", severity.as_str().to_uppercase());
    match severity {
        Severity::Stable => tag.green().to_string(),
        Severity::Degraded => tag.yellow().to_string(),
        Severity::Down => tag.red().bold().to_string(),
        // Unverified states must never look like stable ones
        Severity::Unknown => tag.magenta().to_string(),
        Severity::Error => tag.bright_magenta().bold().to_string(),
    }
}

fn status_line(status: &ServiceStatus) -> String {
    let volume = status
        .report_volume
        .map(|v| format!(" {} reports", v))
        .unwrap_or_default();
    format!(
        "{} {:<12} {:<18}{} {}",
        severity_tag(status.severity),
        status.service_id,
        status.source.as_str().dimmed(),
        volume,
        status.message.dimmed()
    )
}

pub fn print_status(resp: &StatusResponse) {
    println!("{}", resp.summary.bold());
    println!(
        "{}",
        format!("Updated {}", resp.updated_at.format("%Y-%m-%d %H:%M:%S UTC")).dimmed()
    );
    println!("{}", SEPARATOR.dimmed());
    for status in &resp.details {
        println!("{}", status_line(status));
    }
}

pub fn print_service(resp: &ServiceDetailResponse) {
    println!("{}", status_line(&resp.status));
    let Some(detail) = &resp.detail else {
        return;
    };
    if !detail.timeline.is_empty() {
        let points: Vec<String> = detail.timeline.iter().map(|p| p.to_string()).collect();
        println!("  Reports: {}", points.join(" "));
    }
    for incident in &detail.incidents {
        println!(
            "  * {} {} {}",
            incident.time.dimmed(),
            incident.title.bold(),
            incident.description
        );
    }
}

pub fn print_top(resp: &TopCriticalResponse) {
    println!(
        "{} issues ({} down, {} degraded)",
        resp.total_issues.to_string().bold(),
        resp.down,
        resp.degraded
    );
    println!("{}", SEPARATOR.dimmed());
    if resp.top_critical.is_empty() {
        println!("{}", "No services with confirmed problems".green());
    }
    for (rank, status) in resp.top_critical.iter().enumerate() {
        println!("{:>2}. {}", rank + 1, status_line(status));
    }
}

pub fn print_health(resp: &HealthResponse) {
    println!("statusd v{} {}", resp.version, resp.status.green());
    println!("  Uptime:    {}s", resp.uptime_seconds);
    println!(
        "  Scheduler: {}",
        if resp.scheduler_running {
            "running".green().to_string()
        } else {
            "stopped".yellow().to_string()
        }
    );
    println!("  Services:  {}", resp.tracked_services);
}
