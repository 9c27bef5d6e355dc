//! Scheduler tests
//!
//! Single-job guarantee, idle stop, and the alerting refresh cycle.

use async_trait::async_trait;
use httpmock::{Method::POST, MockServer};
use status_common::{Catalogue, ServiceDescriptor, Severity, StatusSource};
use statusd::notifier::{RecordingNotifier, WebhookNotifier};
use statusd::orchestrator::Orchestrator;
use statusd::sources::{FakeTier, StatusTier, TierCallLog};
use statusd::{RefreshCycle, Scheduler, TickHandler};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

#[derive(Default)]
struct CountingHandler {
    ticks: AtomicUsize,
}

#[async_trait]
impl TickHandler for CountingHandler {
    async fn on_tick(&self) {
        self.ticks.fetch_add(1, Ordering::SeqCst);
    }
}

impl CountingHandler {
    fn ticks(&self) -> usize {
        self.ticks.load(Ordering::SeqCst)
    }
}

/// Five services, three of them down.
fn outage_orchestrator(log: &TierCallLog) -> Arc<Orchestrator> {
    let catalogue = Catalogue::new(
        ["a", "b", "c", "d", "e"]
            .iter()
            .map(|id| ServiceDescriptor::new(id, id))
            .collect(),
    )
    .unwrap();
    let scraper = FakeTier::new(StatusSource::Scraper, log.clone())
        .default_answer(Severity::Stable)
        .answer("a", Severity::Down)
        .answer("c", Severity::Down)
        .answer("e", Severity::Down);
    let tiers: Vec<Arc<dyn StatusTier>> = vec![Arc::new(scraper)];
    Arc::new(Orchestrator::new(catalogue, tiers, Duration::from_secs(300), 3))
}

// ============================================================================
// Lifecycle
// ============================================================================

#[tokio::test(start_paused = true)]
async fn starting_twice_leaves_exactly_one_job() {
    let handler = Arc::new(CountingHandler::default());
    let scheduler = Scheduler::new(handler.clone());

    scheduler.start(Duration::from_secs(1));
    let second = scheduler.start(Duration::from_secs(1));
    assert_eq!(scheduler.current_job(), Some(second));

    tokio::time::sleep(Duration::from_millis(5500)).await;
    let before = handler.ticks();
    tokio::time::sleep(Duration::from_secs(10)).await;

    // One job ticking once a second adds exactly ten ticks
    assert_eq!(handler.ticks() - before, 10);
    assert!(scheduler.is_running());
}

#[tokio::test]
async fn stop_when_idle_is_a_noop() {
    let scheduler = Scheduler::new(Arc::new(CountingHandler::default()));
    assert!(!scheduler.stop());
    assert!(!scheduler.stop());
    assert_eq!(scheduler.current_job(), None);
}

#[tokio::test(start_paused = true)]
async fn stop_halts_further_ticks() {
    let handler = Arc::new(CountingHandler::default());
    let scheduler = Scheduler::new(handler.clone());

    scheduler.start(Duration::from_secs(1));
    tokio::time::sleep(Duration::from_millis(2500)).await;
    assert!(scheduler.stop());

    let stopped_at = handler.ticks();
    tokio::time::sleep(Duration::from_secs(5)).await;
    assert_eq!(handler.ticks(), stopped_at);
    assert!(!scheduler.is_running());
}

#[tokio::test(start_paused = true)]
async fn stop_lets_the_running_tick_finish() {
    let log = TierCallLog::default();
    let catalogue = Catalogue::new(vec![ServiceDescriptor::new("a", "A")]).unwrap();
    let slow = FakeTier::new(StatusSource::Scraper, log.clone())
        .default_answer(Severity::Stable)
        .with_delay(Duration::from_secs(5));
    let tiers: Vec<Arc<dyn StatusTier>> = vec![Arc::new(slow)];
    let orchestrator = Arc::new(Orchestrator::new(catalogue, tiers, Duration::from_secs(300), 1));
    let scheduler = Scheduler::new(Arc::new(RefreshCycle::new(orchestrator.clone(), 0)));

    scheduler.start(Duration::from_secs(60));
    tokio::time::sleep(Duration::from_secs(1)).await;
    assert_eq!(log.count(StatusSource::Scraper), 1);
    assert!(orchestrator.cached("a").is_none());

    assert!(scheduler.stop());
    tokio::time::sleep(Duration::from_secs(10)).await;

    assert!(orchestrator.cached("a").is_some());
    tokio::time::sleep(Duration::from_secs(120)).await;
    assert_eq!(log.count(StatusSource::Scraper), 1);
}

// ============================================================================
// Refresh cycle and alerting
// ============================================================================

#[tokio::test]
async fn webhook_failure_still_completes_tick_and_fills_cache() {
    let server = MockServer::start_async().await;
    let hook = server.mock(|when, then| {
        when.method(POST)
            .path("/alerts")
            .body_contains("\"level\":\"CRITICAL\"");
        then.status(500);
    });

    let log = TierCallLog::default();
    let orchestrator = outage_orchestrator(&log);
    let notifier =
        WebhookNotifier::new(&server.url("/alerts"), Duration::from_secs(2)).unwrap();
    let cycle = RefreshCycle::new(orchestrator.clone(), 2).with_notifier(Arc::new(notifier));

    let report = cycle.run().await;

    assert_eq!(report.down_count(), 3);
    hook.assert_hits(1);
    for id in ["a", "b", "c", "d", "e"] {
        assert!(orchestrator.cached(id).is_some(), "{id} not cached");
    }
}

#[tokio::test]
async fn no_alert_at_or_below_threshold() {
    let log = TierCallLog::default();
    let orchestrator = outage_orchestrator(&log);
    let notifier = RecordingNotifier::default();
    let cycle = RefreshCycle::new(orchestrator, 3).with_notifier(Arc::new(notifier.clone()));

    cycle.run().await;
    assert!(notifier.alerts().is_empty());
}

#[tokio::test]
async fn default_threshold_alerts_on_first_down() {
    let log = TierCallLog::default();
    let orchestrator = outage_orchestrator(&log);
    let notifier = RecordingNotifier::default();
    let cycle = RefreshCycle::new(orchestrator, 0).with_notifier(Arc::new(notifier.clone()));

    cycle.run().await;
    let alerts = notifier.alerts();
    assert_eq!(alerts.len(), 1);
    assert_eq!(alerts[0].level, "CRITICAL");
    assert_eq!(alerts[0].data.problem_count, 3);
}

#[tokio::test(start_paused = true)]
async fn scheduled_first_tick_warms_the_cache() {
    let log = TierCallLog::default();
    let orchestrator = outage_orchestrator(&log);
    let notifier = RecordingNotifier::default();
    let cycle =
        RefreshCycle::new(orchestrator.clone(), 2).with_notifier(Arc::new(notifier.clone()));
    let scheduler = Scheduler::new(Arc::new(cycle));

    scheduler.start(Duration::from_secs(300));
    tokio::time::sleep(Duration::from_millis(100)).await;

    assert!(orchestrator.cached("b").is_some());
    assert_eq!(notifier.alerts().len(), 1);
    assert_eq!(log.count(StatusSource::Scraper), 5);
    scheduler.stop();
}
