//! Periodic catalogue refresh.
//!
//! The [`Scheduler`] owns at most one recurring job. Starting it again
//! replaces the running job; stopping cancels the trigger but lets a tick
//! that is already running finish.

use crate::config::SchedulerConfig;
use crate::notifier::{AlertPayload, AlertSink, WebhookNotifier};
use crate::orchestrator::Orchestrator;
use async_trait::async_trait;
use status_common::{AggregateReport, StatusError};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Work performed on every tick.
#[async_trait]
pub trait TickHandler: Send + Sync {
    async fn on_tick(&self);
}

/// Refreshes the whole catalogue and raises an alert when too many
/// services are down.
pub struct RefreshCycle {
    orchestrator: Arc<Orchestrator>,
    notifier: Option<Arc<dyn AlertSink>>,
    critical_threshold: usize,
}

impl RefreshCycle {
    pub fn new(orchestrator: Arc<Orchestrator>, critical_threshold: usize) -> Self {
        Self {
            orchestrator,
            notifier: None,
            critical_threshold,
        }
    }

    pub fn with_notifier(mut self, notifier: Arc<dyn AlertSink>) -> Self {
        self.notifier = Some(notifier);
        self
    }

    pub fn from_config(
        orchestrator: Arc<Orchestrator>,
        config: &SchedulerConfig,
    ) -> Result<Self, StatusError> {
        let cycle = Self::new(orchestrator, config.critical_threshold);
        match config.webhook_url.as_deref().filter(|u| !u.trim().is_empty()) {
            Some(url) => {
                let notifier =
                    WebhookNotifier::new(url, Duration::from_secs(config.webhook_timeout_secs))?;
                Ok(cycle.with_notifier(Arc::new(notifier)))
            }
            None => Ok(cycle),
        }
    }

    /// One refresh; returns the report it computed.
    pub async fn run(&self) -> AggregateReport {
        let purged = self.orchestrator.purge_expired();
        if purged > 0 {
            debug!(purged, "Evicted expired status records");
        }

        let report = self.orchestrator.refresh_catalogue().await;
        let down = report.down_count();

        if down > self.critical_threshold {
            warn!(
                down,
                threshold = self.critical_threshold,
                "Critical outage threshold exceeded"
            );
            if let Some(notifier) = &self.notifier {
                if let Err(e) = notifier.send(&AlertPayload::critical(&report)).await {
                    warn!(error = %e, "Alert not delivered");
                }
            }
        }
        report
    }
}

#[async_trait]
impl TickHandler for RefreshCycle {
    async fn on_tick(&self) {
        self.run().await;
    }
}

struct RunningJob {
    id: u64,
    token: CancellationToken,
    handle: JoinHandle<()>,
}

pub struct Scheduler {
    handler: Arc<dyn TickHandler>,
    job: Mutex<Option<RunningJob>>,
    next_id: AtomicU64,
}

impl Scheduler {
    pub fn new(handler: Arc<dyn TickHandler>) -> Self {
        Self {
            handler,
            job: Mutex::new(None),
            next_id: AtomicU64::new(1),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Option<RunningJob>> {
        self.job.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Begin ticking every `interval`, first tick immediately. A job that is
    /// already running is stopped first. Returns the new job id.
    pub fn start(&self, interval: Duration) -> u64 {
        let period = interval.max(Duration::from_millis(1));
        let mut job = self.lock();

        if let Some(previous) = job.take() {
            let replaced = StatusError::SchedulerAlreadyRunning(previous.id);
            warn!(error = %replaced, "Replacing running job");
            previous.token.cancel();
        }

        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let token = CancellationToken::new();
        let handler = Arc::clone(&self.handler);
        let cancelled = token.clone();

        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            loop {
                tokio::select! {
                    biased;
                    _ = cancelled.cancelled() => break,
                    _ = ticker.tick() => {
                        debug!(job = id, "Scheduler tick");
                        handler.on_tick().await;
                    }
                }
            }
            debug!(job = id, "Scheduler job ended");
        });

        info!(job = id, interval_secs = period.as_secs_f64(), "Scheduler started");
        *job = Some(RunningJob { id, token, handle });
        id
    }

    /// Cancel the running job. Returns false when nothing was running.
    pub fn stop(&self) -> bool {
        match self.lock().take() {
            Some(job) => {
                job.token.cancel();
                info!(job = job.id, "Scheduler stopped");
                true
            }
            None => false,
        }
    }

    pub fn is_running(&self) -> bool {
        self.lock()
            .as_ref()
            .map(|job| !job.handle.is_finished())
            .unwrap_or(false)
    }

    pub fn current_job(&self) -> Option<u64> {
        self.lock().as_ref().map(|job| job.id)
    }
}

impl Drop for Scheduler {
    fn drop(&mut self) {
        if let Some(job) = self.lock().take() {
            job.token.cancel();
        }
    }
}
