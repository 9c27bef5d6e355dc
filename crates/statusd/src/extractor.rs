//! Markup extractors for the aggregator site.
//!
//! Each scraper tier parses pages through one of these traits, so a change
//! in the site's markup means swapping an extractor, not touching the
//! orchestrator or the fetch logic.

use scraper::{ElementRef, Html, Selector};
use status_common::{Incident, Severity, StatusError};

/// Maximum incidents kept from a detail page
pub const MAX_INCIDENTS: usize = 5;

/// One service block on the aggregator homepage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListingEntry {
    pub slug: String,
    pub name: String,
    /// Stable, Degraded or Down, read from the indicator markers
    pub severity: Severity,
    pub reports: Option<u64>,
}

/// Everything a per-service detail page yields.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DetailPage {
    pub headline: Option<String>,
    /// Report counts, oldest first
    pub timeline: Vec<u64>,
    pub incidents: Vec<Incident>,
}

/// Parses the homepage listing of all services.
pub trait ListingExtractor: Send + Sync {
    fn extract_listing(&self, html: &str) -> Result<Vec<ListingEntry>, StatusError>;
}

/// Parses one service's detail page.
pub trait DetailExtractor: Send + Sync {
    fn extract_detail(&self, html: &str) -> Result<DetailPage, StatusError>;
}

fn selector(css: &str) -> Result<Selector, StatusError> {
    Selector::parse(css)
        .map_err(|e| StatusError::Config(format!("bad selector '{}': {:?}", css, e)))
}

fn element_text(el: ElementRef<'_>) -> String {
    el.text()
        .collect::<Vec<_>>()
        .join(" ")
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

/// Homepage extractor using the aggregator's company-card markup:
/// a `.company-index` block per service with a link to its page, an `h5`
/// name, a `data-day` report count and an `svg.warning`/`svg.danger`
/// indicator when users are reporting problems.
#[derive(Debug, Clone)]
pub struct HomepageExtractor {
    pub block: String,
    pub link: String,
    pub name: String,
    pub danger: String,
    pub warning: String,
    pub reports_attr: String,
}

impl Default for HomepageExtractor {
    fn default() -> Self {
        Self {
            block: ".company-index".to_string(),
            link: "a[href]".to_string(),
            name: "h5".to_string(),
            danger: "svg.danger".to_string(),
            warning: "svg.warning".to_string(),
            reports_attr: "data-day".to_string(),
        }
    }
}

impl ListingExtractor for HomepageExtractor {
    fn extract_listing(&self, html: &str) -> Result<Vec<ListingEntry>, StatusError> {
        let document = Html::parse_document(html);
        let block_sel = selector(&self.block)?;
        let link_sel = selector(&self.link)?;
        let name_sel = selector(&self.name)?;
        let danger_sel = selector(&self.danger)?;
        let warning_sel = selector(&self.warning)?;

        let blocks: Vec<ElementRef<'_>> = document.select(&block_sel).collect();
        if blocks.is_empty() {
            return Err(StatusError::SourceUnparseable(
                "no service listing on page (likely an anti-bot interstitial)".to_string(),
            ));
        }

        let mut entries = Vec::with_capacity(blocks.len());
        for block in blocks {
            let Some(slug) = block
                .select(&link_sel)
                .next()
                .and_then(|a| a.value().attr("href"))
                .and_then(slug_from_href)
            else {
                continue;
            };

            let name = block
                .select(&name_sel)
                .next()
                .map(element_text)
                .filter(|n| !n.is_empty())
                .unwrap_or_else(|| slug.clone());

            let severity = if block.select(&danger_sel).next().is_some() {
                Severity::Down
            } else if block.select(&warning_sel).next().is_some() {
                Severity::Degraded
            } else {
                Severity::Stable
            };

            let reports = block
                .value()
                .attr(&self.reports_attr)
                .and_then(|v| v.trim().parse::<u64>().ok());

            entries.push(ListingEntry {
                slug,
                name,
                severity,
                reports,
            });
        }

        if entries.is_empty() {
            return Err(StatusError::SourceUnparseable(
                "service blocks without links".to_string(),
            ));
        }
        Ok(entries)
    }
}

fn child_text(el: ElementRef<'_>, sel: &Selector) -> String {
    el.select(sel).next().map(element_text).unwrap_or_default()
}

/// Last non-empty path segment of a link, lowercased.
fn slug_from_href(href: &str) -> Option<String> {
    let path = href.split(['?', '#']).next().unwrap_or(href);
    path.split('/')
        .filter(|s| !s.is_empty())
        .last()
        .map(|s| s.to_lowercase())
}

/// Detail-page extractor: `.chart-point[data-value]` timeline,
/// `.incident-item` notes and the `.entry-title` headline.
#[derive(Debug, Clone)]
pub struct DetailPageExtractor {
    pub headline: String,
    pub chart_point: String,
    pub chart_value_attr: String,
    pub incident: String,
    pub incident_title: String,
    pub incident_time: String,
    pub incident_description: String,
}

impl Default for DetailPageExtractor {
    fn default() -> Self {
        Self {
            headline: ".entry-title".to_string(),
            chart_point: ".chart-point".to_string(),
            chart_value_attr: "data-value".to_string(),
            incident: ".incident-item".to_string(),
            incident_title: ".incident-title".to_string(),
            incident_time: ".incident-time".to_string(),
            incident_description: ".incident-desc".to_string(),
        }
    }
}

impl DetailExtractor for DetailPageExtractor {
    fn extract_detail(&self, html: &str) -> Result<DetailPage, StatusError> {
        let document = Html::parse_document(html);
        let headline_sel = selector(&self.headline)?;
        let point_sel = selector(&self.chart_point)?;
        let incident_sel = selector(&self.incident)?;
        let title_sel = selector(&self.incident_title)?;
        let time_sel = selector(&self.incident_time)?;
        let desc_sel = selector(&self.incident_description)?;

        let headline = document
            .select(&headline_sel)
            .next()
            .map(element_text)
            .filter(|t| !t.is_empty());

        let timeline: Vec<u64> = document
            .select(&point_sel)
            .filter_map(|p| p.value().attr(&self.chart_value_attr))
            .filter_map(|v| v.trim().parse::<u64>().ok())
            .collect();

        let incidents: Vec<Incident> = document
            .select(&incident_sel)
            .map(|el| Incident {
                title: child_text(el, &title_sel),
                time: child_text(el, &time_sel),
                description: child_text(el, &desc_sel),
            })
            .filter(|i| !i.title.is_empty() || !i.description.is_empty())
            .take(MAX_INCIDENTS)
            .collect();

        if headline.is_none() && timeline.is_empty() && incidents.is_empty() {
            return Err(StatusError::SourceUnparseable(
                "detail page has no headline, chart or incidents".to_string(),
            ));
        }

        Ok(DetailPage {
            headline,
            timeline,
            incidents,
        })
    }
}
