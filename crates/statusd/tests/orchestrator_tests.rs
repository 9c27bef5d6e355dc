//! Orchestrator tests
//!
//! Fallback ordering, caching and aggregation across the tier chain, with
//! scripted tiers and, where the transport matters, real tiers pointed at
//! an httpmock server.

use httpmock::{Method::GET, MockServer};
use status_common::{Catalogue, ServiceDescriptor, Severity, StatusSource};
use statusd::http::{browser_client, RetryPolicy};
use statusd::orchestrator::Orchestrator;
use statusd::sources::model::FakeModelBackend;
use statusd::sources::{
    AggregatorScraper, DetailPageScraper, FakeTier, ModelTier, StatusTier, TierCallLog,
};
use std::sync::Arc;
use std::time::Duration;

fn catalogue(ids: &[&str]) -> Catalogue {
    Catalogue::new(ids.iter().map(|id| ServiceDescriptor::new(id, id)).collect()).unwrap()
}

fn fake_chain(scraper: FakeTier, ai: FakeTier, secondary: FakeTier) -> Vec<Arc<dyn StatusTier>> {
    vec![Arc::new(scraper), Arc::new(ai), Arc::new(secondary)]
}

fn tiers(log: &TierCallLog) -> (FakeTier, FakeTier, FakeTier) {
    (
        FakeTier::new(StatusSource::Scraper, log.clone()),
        FakeTier::new(StatusSource::Ai, log.clone()),
        FakeTier::new(StatusSource::SecondaryScraper, log.clone()),
    )
}

// ============================================================================
// Fallback ordering
// ============================================================================

#[tokio::test]
async fn conclusive_first_tier_stops_the_chain() {
    let log = TierCallLog::default();
    let (scraper, ai, secondary) = tiers(&log);
    let chain = fake_chain(
        scraper.answer("examplepay", Severity::Stable),
        ai.default_answer(Severity::Down),
        secondary.default_answer(Severity::Down),
    );
    let orch = Orchestrator::new(catalogue(&["examplepay"]), chain, Duration::from_secs(300), 4);

    let status = orch.get_status("examplepay").await.unwrap();
    assert_eq!(status.severity, Severity::Stable);
    assert_eq!(status.source, StatusSource::Scraper);
    assert_eq!(log.sources_for("examplepay"), vec![StatusSource::Scraper]);
}

#[tokio::test]
async fn tiers_are_tried_in_order_until_conclusive() {
    let log = TierCallLog::default();
    let (scraper, ai, secondary) = tiers(&log);
    let chain = fake_chain(
        scraper,
        ai.answer("examplepay", Severity::Error),
        secondary.answer("examplepay", Severity::Degraded),
    );
    let orch = Orchestrator::new(catalogue(&["examplepay"]), chain, Duration::from_secs(300), 4);

    let status = orch.get_status("examplepay").await.unwrap();
    assert_eq!(status.severity, Severity::Degraded);
    assert_eq!(status.source, StatusSource::SecondaryScraper);
    assert_eq!(
        log.sources_for("examplepay"),
        vec![
            StatusSource::Scraper,
            StatusSource::Ai,
            StatusSource::SecondaryScraper
        ]
    );
}

#[tokio::test]
async fn accepted_answer_is_not_downgraded_by_later_tiers() {
    let log = TierCallLog::default();
    let (scraper, ai, secondary) = tiers(&log);
    let chain = fake_chain(
        scraper,
        ai.answer("examplepay", Severity::Down),
        secondary.answer("examplepay", Severity::Stable),
    );
    let orch = Orchestrator::new(catalogue(&["examplepay"]), chain, Duration::from_secs(300), 4);

    let status = orch.get_status("examplepay").await.unwrap();
    assert_eq!(status.severity, Severity::Down);
    assert_eq!(log.count(StatusSource::SecondaryScraper), 0);
}

#[tokio::test]
async fn conclusive_model_answer_skips_secondary() {
    let log = TierCallLog::default();
    let (scraper, ai, secondary) = tiers(&log);
    let chain = fake_chain(
        scraper,
        ai.answer("examplepay", Severity::Stable),
        secondary.default_answer(Severity::Down),
    );
    let orch = Orchestrator::new(catalogue(&["examplepay"]), chain, Duration::from_secs(300), 4);

    let status = orch.get_status("examplepay").await.unwrap();
    assert_eq!(status.severity, Severity::Stable);
    assert_eq!(status.source, StatusSource::Ai);
    assert_eq!(
        log.sources_for("examplepay"),
        vec![StatusSource::Scraper, StatusSource::Ai]
    );
}

#[tokio::test]
async fn scraper_down_is_kept_over_later_stable() {
    let log = TierCallLog::default();
    let (scraper, ai, secondary) = tiers(&log);
    let chain = fake_chain(
        scraper.answer("examplepay", Severity::Down),
        ai.default_answer(Severity::Stable),
        secondary.default_answer(Severity::Stable),
    );
    let orch = Orchestrator::new(catalogue(&["examplepay"]), chain, Duration::from_secs(300), 4);

    let status = orch.get_status("examplepay").await.unwrap();
    assert_eq!(status.severity, Severity::Down);
    assert_eq!(status.source, StatusSource::Scraper);
    assert_eq!(orch.cached("examplepay").unwrap().severity, Severity::Down);
    assert_eq!(log.count(StatusSource::Ai), 0);
    assert_eq!(log.count(StatusSource::SecondaryScraper), 0);
}

// ============================================================================
// Caching
// ============================================================================

#[tokio::test]
async fn repeated_calls_within_ttl_are_identical() {
    let log = TierCallLog::default();
    let (scraper, ai, secondary) = tiers(&log);
    let chain = fake_chain(scraper.default_answer(Severity::Degraded), ai, secondary);
    let orch = Orchestrator::new(catalogue(&["examplepay"]), chain, Duration::from_secs(300), 4);

    let first = orch.get_status("examplepay").await.unwrap();
    let second = orch.get_status("examplepay").await.unwrap();
    assert_eq!(first, second);
    assert_eq!(first.observed_at, second.observed_at);
    assert_eq!(log.count(StatusSource::Scraper), 1);
}

#[tokio::test(start_paused = true)]
async fn expired_record_triggers_a_new_check() {
    let log = TierCallLog::default();
    let (scraper, ai, secondary) = tiers(&log);
    let chain = fake_chain(scraper.default_answer(Severity::Stable), ai, secondary);
    let orch = Orchestrator::new(catalogue(&["examplepay"]), chain, Duration::from_secs(60), 4);

    orch.get_status("examplepay").await.unwrap();
    tokio::time::advance(Duration::from_secs(61)).await;
    assert!(orch.cached("examplepay").is_none());

    orch.get_status("examplepay").await.unwrap();
    assert_eq!(log.count(StatusSource::Scraper), 2);
}

// ============================================================================
// Scenario A: scraper times out, model answers
// ============================================================================

#[tokio::test]
async fn scraper_timeout_falls_back_to_model() {
    let server = MockServer::start_async().await;
    let homepage = server.mock(|when, then| {
        when.method(GET).path("/");
        then.status(200).delay(Duration::from_secs(2)).body("<html></html>");
    });

    let client = browser_client(Duration::from_millis(100), "en").unwrap();
    let scraper = AggregatorScraper::new(
        client,
        &server.base_url(),
        RetryPolicy::new(3, Duration::from_millis(5)),
        Duration::from_secs(120),
    );
    let backend = FakeModelBackend::replying(
        r#"{"hasIssues": true, "status": "down", "message": "Payments failing worldwide"}"#,
    );
    let model = ModelTier::new(Arc::new(backend.clone()));

    let log = TierCallLog::default();
    let secondary = FakeTier::new(StatusSource::SecondaryScraper, log.clone())
        .default_answer(Severity::Stable);

    let chain: Vec<Arc<dyn StatusTier>> =
        vec![Arc::new(scraper), Arc::new(model), Arc::new(secondary)];
    let orch = Orchestrator::new(catalogue(&["examplepay"]), chain, Duration::from_secs(300), 4);

    let status = orch.get_status("examplepay").await.unwrap();
    assert_eq!(status.severity, Severity::Down);
    assert!(status.has_issues);
    assert_eq!(status.source, StatusSource::Ai);

    homepage.assert_hits(3);
    assert_eq!(backend.call_count(), 1);
    assert!(log.calls().is_empty());
}

// ============================================================================
// Scenario B: nobody knows
// ============================================================================

#[tokio::test]
async fn all_unknown_is_unknown_none_and_uncached() {
    let log = TierCallLog::default();
    let (scraper, ai, secondary) = tiers(&log);
    let chain = fake_chain(scraper, ai, secondary);
    let orch = Orchestrator::new(catalogue(&["smallservice"]), chain, Duration::from_secs(300), 4);

    let status = orch.get_status("smallservice").await.unwrap();
    assert_eq!(status.severity, Severity::Unknown);
    assert_eq!(status.source, StatusSource::None);
    assert!(!status.has_issues);
    assert!(status.message.contains("scraper"));
    assert!(status.message.contains("secondary-scraper"));
    assert!(orch.cached("smallservice").is_none());

    orch.get_status("smallservice").await.unwrap();
    assert_eq!(log.calls().len(), 6);
}

// ============================================================================
// Scenario C: aggregate ranking
// ============================================================================

#[tokio::test]
async fn aggregate_of_seven_ranks_problems() {
    let ids = ["s1", "s2", "s3", "s4", "s5", "s6", "s7"];
    let log = TierCallLog::default();
    let (scraper, ai, secondary) = tiers(&log);
    let scraper = scraper
        .default_answer(Severity::Stable)
        .answer_with_volume("s2", Severity::Degraded, 5000)
        .answer_with_volume("s5", Severity::Down, 300)
        .answer_with_volume("s7", Severity::Down, 900)
        .with_delay(Duration::from_millis(5));
    let chain = fake_chain(scraper, ai, secondary);
    let orch = Orchestrator::new(catalogue(&ids), chain, Duration::from_secs(300), 3);

    let report = orch.refresh_catalogue().await;
    assert_eq!(report.total_checked, 7);
    assert_eq!(report.problem_count, 3);

    let ranked: Vec<(&str, Severity)> = report
        .problems
        .iter()
        .map(|s| (s.service_id.as_str(), s.severity))
        .collect();
    assert_eq!(
        ranked,
        vec![
            ("s7", Severity::Down),
            ("s5", Severity::Down),
            ("s2", Severity::Degraded)
        ]
    );

    let order: Vec<&str> = report.details.iter().map(|s| s.service_id.as_str()).collect();
    assert_eq!(order, ids.to_vec());
}

#[tokio::test]
async fn aggregate_summary_never_claims_all_stable_with_unknowns() {
    let log = TierCallLog::default();
    let (scraper, ai, secondary) = tiers(&log);
    let chain = fake_chain(
        scraper.answer("a", Severity::Stable),
        ai,
        secondary,
    );
    let orch = Orchestrator::new(catalogue(&["a", "b"]), chain, Duration::from_secs(300), 2);

    let report = orch.refresh_catalogue().await;
    assert_eq!(report.problem_count, 0);
    assert_eq!(report.unknown_or_error_count, 1);
    assert!(!report.summary().starts_with("All"));
}

// ============================================================================
// No stable on failure
// ============================================================================

#[tokio::test]
async fn failing_real_tiers_never_report_stable() {
    let server = MockServer::start_async().await;
    server.mock(|when, then| {
        when.method(GET).path("/");
        then.status(200).body("<html><title>Attention Required!</title></html>");
    });
    server.mock(|when, then| {
        when.method(GET).path("/status/examplepay/");
        then.status(503);
    });

    let policy = RetryPolicy::new(1, Duration::ZERO);
    let scraper = AggregatorScraper::new(
        browser_client(Duration::from_secs(2), "en").unwrap(),
        &server.base_url(),
        policy,
        Duration::from_secs(120),
    );
    let secondary = DetailPageScraper::new(
        browser_client(Duration::from_secs(2), "en").unwrap(),
        &server.base_url(),
        "/status/{slug}/",
        policy,
        Duration::from_secs(120),
        &["problem".to_string()],
    )
    .unwrap();
    let service = ServiceDescriptor::new("examplepay", "ExamplePay");

    let scraper_status = scraper.check(&service).await;
    let model_status = ModelTier::disabled().check(&service).await;
    let secondary_status = secondary.check(&service).await;
    for status in [&scraper_status, &model_status, &secondary_status] {
        assert_ne!(status.severity, Severity::Stable, "{:?}", status.source);
        assert!(!status.has_issues);
    }
    assert_eq!(model_status.severity, Severity::Error);

    let chain: Vec<Arc<dyn StatusTier>> = vec![
        Arc::new(scraper),
        Arc::new(ModelTier::disabled()),
        Arc::new(secondary),
    ];
    let orch = Orchestrator::new(catalogue(&["examplepay"]), chain, Duration::from_secs(300), 2);
    let status = orch.get_status("examplepay").await.unwrap();
    assert_eq!(status.severity, Severity::Unknown);
    assert_eq!(status.source, StatusSource::None);
}
