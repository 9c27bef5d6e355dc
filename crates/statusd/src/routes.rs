//! API routes for statusd
//!
//! Every handler runs under the request budget. When the budget runs out
//! the caller still gets a 200 with `unknown` records rather than an error.
//! The lookup itself runs on its own task and keeps going, so its results
//! still land in the cache for the next caller.

use crate::server::AppState;
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use status_common::{
    HealthResponse, ServiceDetailResponse, ServiceStatus, StatusError, StatusResponse,
    StatusSource, TopCriticalResponse, VERSION,
};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

type AppStateArc = Arc<AppState>;

const BUDGET_EXHAUSTED: &str = "Request budget exhausted before status could be determined";

/// Default length of the top-critical listing
pub const DEFAULT_TOP_LIMIT: usize = 10;

/// Run `work` on its own task and wait at most `budget` for it. `None`
/// when the budget ran out or the task died; the task is left running.
async fn within_budget<F, T>(budget: Duration, work: F) -> Option<T>
where
    F: Future<Output = T> + Send + 'static,
    T: Send + 'static,
{
    match tokio::time::timeout(budget, tokio::spawn(work)).await {
        Ok(Ok(value)) => Some(value),
        Ok(Err(e)) => {
            warn!(error = %e, "Status task failed");
            None
        }
        Err(_) => None,
    }
}

// ============================================================================
// Status Routes
// ============================================================================

pub fn status_routes() -> Router<AppStateArc> {
    Router::new()
        .route("/status", get(all_statuses))
        .route("/status/top", get(top_critical))
        .route("/status/:service_id", get(one_status))
}

async fn all_statuses(State(state): State<AppStateArc>) -> Json<StatusResponse> {
    let orchestrator = Arc::clone(&state.orchestrator);
    let work = async move { orchestrator.refresh_catalogue().await };
    let report = match within_budget(state.request_budget, work).await {
        Some(report) => report,
        None => {
            warn!(budget = ?state.request_budget, "Aggregate exceeded request budget");
            state.orchestrator.snapshot(BUDGET_EXHAUSTED)
        }
    };
    Json(StatusResponse::from(report))
}

async fn one_status(
    State(state): State<AppStateArc>,
    Path(service_id): Path<String>,
) -> Result<Json<ServiceDetailResponse>, (StatusCode, String)> {
    let orchestrator = Arc::clone(&state.orchestrator);
    let id = service_id.clone();
    let work = async move {
        let status = orchestrator.get_status(&id).await?;
        let detail = orchestrator.detail(&id).await?;
        Ok::<_, StatusError>(ServiceDetailResponse { status, detail })
    };

    match within_budget(state.request_budget, work).await {
        Some(Ok(response)) => Ok(Json(response)),
        Some(Err(e @ StatusError::ServiceNotFound(_))) => {
            Err((StatusCode::NOT_FOUND, e.to_string()))
        }
        Some(Err(e)) => {
            warn!(service = %service_id, error = %e, "Status lookup failed");
            Ok(Json(ServiceDetailResponse {
                status: ServiceStatus::unknown(service_id, e.to_string(), StatusSource::None),
                detail: None,
            }))
        }
        None => {
            warn!(service = %service_id, "Status lookup exceeded request budget");
            let status = state.orchestrator.cached(&service_id).unwrap_or_else(|| {
                ServiceStatus::unknown(service_id.clone(), BUDGET_EXHAUSTED, StatusSource::None)
            });
            Ok(Json(ServiceDetailResponse {
                status,
                detail: None,
            }))
        }
    }
}

#[derive(Debug, Deserialize)]
struct TopQuery {
    limit: Option<usize>,
}

async fn top_critical(
    State(state): State<AppStateArc>,
    Query(query): Query<TopQuery>,
) -> Json<TopCriticalResponse> {
    let limit = query.limit.unwrap_or(DEFAULT_TOP_LIMIT);
    let orchestrator = Arc::clone(&state.orchestrator);
    let work = async move { orchestrator.top_critical(limit).await };
    match within_budget(state.request_budget, work).await {
        Some(top) => Json(top),
        None => {
            warn!("Top-critical listing exceeded request budget");
            let report = state.orchestrator.snapshot(BUDGET_EXHAUSTED);
            Json(TopCriticalResponse::from_report(&report, limit))
        }
    }
}

// ============================================================================
// Health Routes
// ============================================================================

pub fn health_routes() -> Router<AppStateArc> {
    Router::new().route("/health", get(health))
}

async fn health(State(state): State<AppStateArc>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: VERSION.to_string(),
        uptime_seconds: state.start_time.elapsed().as_secs(),
        scheduler_running: state
            .scheduler
            .as_ref()
            .map(|s| s.is_running())
            .unwrap_or(false),
        tracked_services: state.orchestrator.catalogue().len(),
    })
}

// ============================================================================
// Admin Routes
// ============================================================================

pub fn admin_routes() -> Router<AppStateArc> {
    Router::new().route("/admin/cache/flush", post(flush_cache))
}

#[derive(Debug, Serialize, Deserialize)]
pub struct FlushResponse {
    pub flushed: bool,
}

async fn flush_cache(State(state): State<AppStateArc>) -> Json<FlushResponse> {
    info!("Cache flush requested");
    state.orchestrator.flush();
    Json(FlushResponse { flushed: true })
}
