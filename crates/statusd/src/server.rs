//! HTTP server for statusd

use crate::orchestrator::Orchestrator;
use crate::routes;
use crate::scheduler::Scheduler;
use anyhow::{Context, Result};
use axum::Router;
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tower_http::trace::TraceLayer;
use tracing::info;

/// Application state shared across handlers
pub struct AppState {
    pub orchestrator: Arc<Orchestrator>,
    pub scheduler: Option<Arc<Scheduler>>,
    pub start_time: Instant,
    /// Upper bound on the work one request may trigger
    pub request_budget: Duration,
}

impl AppState {
    pub fn new(orchestrator: Arc<Orchestrator>, request_budget: Duration) -> Self {
        Self {
            orchestrator,
            scheduler: None,
            start_time: Instant::now(),
            request_budget,
        }
    }

    pub fn with_scheduler(mut self, scheduler: Arc<Scheduler>) -> Self {
        self.scheduler = Some(scheduler);
        self
    }
}

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .merge(routes::status_routes())
        .merge(routes::health_routes())
        .merge(routes::admin_routes())
        .with_state(state)
        .layer(TraceLayer::new_for_http())
}

/// Serve until `shutdown` resolves.
pub async fn run<F>(state: AppState, bind: &str, shutdown: F) -> Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let app = router(Arc::new(state));

    let listener = tokio::net::TcpListener::bind(bind)
        .await
        .with_context(|| format!("failed to bind {}", bind))?;
    info!("Listening on http://{}", bind);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await
        .context("server error")?;
    Ok(())
}
