//! Integration tests for ResilientClient
//!
//! **Coverage:**
//! - Session caching and re-authentication after a rejected session
//! - Breaker opening, fast-failing and recovering through HALF_OPEN
//! - Paginated fetch with progress, targets and page failures
//! - Reference-data cache: hits, background refresh, expiry, invalidation
//! - Health probe outside the breaker

#![allow(dead_code)]

#[path = "support.rs"]
mod support;

use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use support::{stage_row, ScriptedSourceApi};
use vectorsync_common::resilience::{CircuitState, MockClock};
use vectorsync_domain::{
    BreakerConfig, CacheSettings, FetchProgress, RecordFilter, ReferenceKey, VectorSyncError,
};
use vectorsync_infra::ResilientClient;

fn client(api: &Arc<ScriptedSourceApi>, clock: &MockClock) -> ResilientClient<MockClock> {
    let breaker = BreakerConfig { failure_threshold: 2, reset_timeout_secs: 30 };
    ResilientClient::with_clock(
        Arc::clone(api) as Arc<dyn vectorsync_core::SourceSystemApi>,
        &support::source_config(),
        &CacheSettings::default(),
        &breaker,
        clock.clone(),
    )
    .expect("valid client")
}

// ============================================================================
// Session
// ============================================================================

#[tokio::test]
async fn session_is_authenticated_once_and_reused() {
    let api = Arc::new(ScriptedSourceApi::with_records(5));
    let client = client(&api, &MockClock::new());

    assert_eq!(client.count(&RecordFilter::All).await.expect("count"), 5);
    client.fetch_page(&RecordFilter::All, 0, 5).await.expect("page");
    client.fetch_by_id(3).await.expect("record");

    assert_eq!(api.auth_calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn rejected_session_forces_reauthentication() {
    let api = Arc::new(ScriptedSourceApi::with_records(5));
    let client = client(&api, &MockClock::new());
    client.authenticate().await.expect("session");

    api.fail_next([VectorSyncError::Authentication("session expired".into())]);
    let err = client.count(&RecordFilter::All).await.expect_err("rejected");
    assert!(err.is_authentication());

    client.count(&RecordFilter::All).await.expect("recovers");
    assert_eq!(api.auth_calls.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn reset_session_drops_cached_id() {
    let api = Arc::new(ScriptedSourceApi::with_records(1));
    let client = client(&api, &MockClock::new());
    client.authenticate().await.expect("session");

    client.reset_session();
    client.count(&RecordFilter::All).await.expect("count");
    assert_eq!(api.auth_calls.load(Ordering::SeqCst), 2);
}

// ============================================================================
// Breaker
// ============================================================================

#[tokio::test]
async fn breaker_opens_then_fast_fails_then_recovers() {
    let api = Arc::new(ScriptedSourceApi::with_records(3));
    let clock = MockClock::new();
    let client = client(&api, &clock);

    api.fail_next([
        VectorSyncError::Network("connection reset".into()),
        VectorSyncError::Network("connection reset".into()),
    ]);
    for _ in 0..2 {
        let err = client.count(&RecordFilter::All).await.expect_err("remote failure");
        assert!(matches!(err, VectorSyncError::Network(_)), "original error passes through");
    }
    assert_eq!(client.breaker_metrics().state, CircuitState::Open);

    let calls_before = api.count_calls.load(Ordering::SeqCst);
    let err = client.count(&RecordFilter::All).await.expect_err("fast fail");
    assert!(matches!(err, VectorSyncError::CircuitOpen { retry_after_secs: 30 }));
    assert_eq!(api.count_calls.load(Ordering::SeqCst), calls_before, "remote not called");

    clock.advance(Duration::from_secs(30));
    assert_eq!(client.count(&RecordFilter::All).await.expect("probe succeeds"), 3);
    assert_eq!(client.breaker_metrics().state, CircuitState::Closed);
}

#[tokio::test]
async fn health_check_bypasses_breaker() {
    let api = Arc::new(ScriptedSourceApi::with_records(1));
    let client = client(&api, &MockClock::new());

    api.set_unreachable(true);
    for _ in 0..3 {
        assert!(!client.health_check().await.expect("probe"));
    }
    assert_eq!(client.breaker_metrics().state, CircuitState::Closed);

    api.set_unreachable(false);
    assert!(client.health_check().await.expect("probe"));
}

// ============================================================================
// Pagination
// ============================================================================

#[tokio::test]
async fn fetch_all_pages_and_reports_progress() {
    let api = Arc::new(ScriptedSourceApi::with_records(250));
    let client = client(&api, &MockClock::new());
    let seen = Mutex::new(Vec::new());
    let on_progress = |p: FetchProgress| seen.lock().push(p);

    let records = client
        .fetch_all(&RecordFilter::All, None, 100, Some(&on_progress))
        .await
        .expect("all records");

    assert_eq!(records.len(), 250);
    assert_eq!(records[249].id, 250);
    let fetched: Vec<usize> = seen.lock().iter().map(|p| p.fetched).collect();
    assert_eq!(fetched, [100, 200, 250]);
    assert!(seen.lock().iter().all(|p| p.total == 250));
}

#[tokio::test]
async fn fetch_all_stops_at_target() {
    let api = Arc::new(ScriptedSourceApi::with_records(250));
    let client = client(&api, &MockClock::new());

    let records = client.fetch_all(&RecordFilter::All, Some(150), 100, None).await.expect("records");

    assert_eq!(records.len(), 150);
    let limits: Vec<usize> = api.reads.lock().iter().map(|(_, _, limit)| *limit).collect();
    assert_eq!(limits, [100, 50]);
}

#[tokio::test]
async fn fetch_all_aborts_on_failed_page() {
    let api = Arc::new(ScriptedSourceApi::with_records(250));
    let client = client(&api, &MockClock::new());
    api.fail_page_at(100);

    let err = client.fetch_all(&RecordFilter::All, None, 100, None).await.expect_err("page failed");
    assert!(matches!(err, VectorSyncError::Network(msg) if msg.contains("100")));
}

#[tokio::test]
async fn fetch_by_id_includes_archived_and_reports_missing() {
    let api = Arc::new(ScriptedSourceApi::with_records(0));
    api.set_rows(vec![support::record_row(42, false)]);
    let client = client(&api, &MockClock::new());

    let record = client.fetch_by_id(42).await.expect("fetched").expect("present");
    assert!(!record.active);
    assert!(client.fetch_by_id(43).await.expect("fetched").is_none());
}

// ============================================================================
// Reference cache
// ============================================================================

#[tokio::test]
async fn stages_are_served_from_cache() {
    let api = Arc::new(ScriptedSourceApi::with_records(0));
    let client = client(&api, &MockClock::new());

    let first = client.stages().await.expect("stages");
    let second = client.stages().await.expect("stages");

    assert_eq!(first, second);
    assert_eq!(first.len(), 2);
    assert_eq!(api.reads_of("crm.stage"), 1);
    assert_eq!(client.cache_stats().hits, 1);
}

#[tokio::test]
async fn stale_stages_refresh_in_background() {
    let api = Arc::new(ScriptedSourceApi::with_records(0));
    let clock = MockClock::new();
    let client = client(&api, &clock);
    client.stages().await.expect("initial load");

    // Default stage TTL is 30 minutes with refresh at 80%.
    api.set_stages(vec![stage_row(1, "New"), stage_row(2, "Won"), stage_row(3, "Lost")]);
    clock.advance(Duration::from_secs(25 * 60));

    let stale = client.stages().await.expect("stale value");
    assert_eq!(stale.len(), 2, "stale value served immediately");

    client.wait_for_refreshes().await;
    assert_eq!(client.stages().await.expect("refreshed").len(), 3);
    assert_eq!(api.reads_of("crm.stage"), 2);
}

#[tokio::test]
async fn expired_stages_reload_inline() {
    let api = Arc::new(ScriptedSourceApi::with_records(0));
    let clock = MockClock::new();
    let client = client(&api, &clock);
    client.stages().await.expect("initial load");

    api.set_stages(vec![stage_row(9, "Only")]);
    clock.advance(Duration::from_secs(31 * 60));

    let reloaded = client.stages().await.expect("reloaded");
    assert_eq!(reloaded.len(), 1);
    assert_eq!(reloaded[0].name, "Only");
}

#[tokio::test]
async fn invalidate_forces_reload() {
    let api = Arc::new(ScriptedSourceApi::with_records(0));
    let client = client(&api, &MockClock::new());
    client.stages().await.expect("stages");
    client.tags().await.expect("tags");

    client.invalidate(Some(&[ReferenceKey::Stages]));
    client.stages().await.expect("stages");
    client.tags().await.expect("tags");
    assert_eq!(api.reads_of("crm.stage"), 2);
    assert_eq!(api.reads_of("crm.tag"), 1);

    client.invalidate(None);
    client.tags().await.expect("tags");
    assert_eq!(api.reads_of("crm.tag"), 2);
}
