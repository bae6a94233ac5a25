//! End-to-end sync through the real adapters
//!
//! Source rows flow through `ResilientClient`, a deterministic embedder and
//! `VectorGateway` into the in-memory store.

#![allow(dead_code)]

#[path = "support.rs"]
mod support;

use std::sync::Arc;

use support::{record_row, LengthEmbedder, ScriptedSourceApi};
use vectorsync_common::resilience::MockClock;
use vectorsync_core::{SourceSystemApi, SyncOrchestrator};
use vectorsync_domain::{
    BreakerConfig, CacheSettings, SingleSyncOutcome, SyncConfig, VectorStoreConfig, VectorSyncError,
};
use vectorsync_infra::{InMemoryVectorStore, ResilientClient, VectorGateway};

struct Pipeline {
    api: Arc<ScriptedSourceApi>,
    store: Arc<InMemoryVectorStore>,
    orchestrator: SyncOrchestrator,
}

fn pipeline(records: i64, batch_size: usize) -> Pipeline {
    let clock = MockClock::new();
    let api = Arc::new(ScriptedSourceApi::with_records(records));
    let breaker = BreakerConfig::default();
    let client = ResilientClient::with_clock(
        Arc::clone(&api) as Arc<dyn SourceSystemApi>,
        &support::source_config(),
        &CacheSettings::default(),
        &breaker,
        clock.clone(),
    )
    .expect("client");

    let store = Arc::new(InMemoryVectorStore::new());
    let config = VectorStoreConfig { collection: "leads".into(), ..VectorStoreConfig::default() };
    let gateway =
        VectorGateway::with_clock(store.clone(), &config, &breaker, clock).expect("gateway");

    let orchestrator = SyncOrchestrator::new(
        Arc::new(client),
        Arc::new(LengthEmbedder { dimensions: 4 }),
        Arc::new(gateway),
        SyncConfig { batch_size, ..SyncConfig::default() },
    );
    Pipeline { api, store, orchestrator }
}

#[tokio::test]
async fn full_sync_indexes_every_record() {
    let p = pipeline(120, 50);

    let result = p.orchestrator.full_sync(None).await;

    assert!(result.success, "errors: {:?}", result.errors);
    assert_eq!(result.records_synced, 120);
    assert_eq!(result.sync_version, 1);
    assert_eq!(p.store.len("leads"), 120);
    assert_eq!(p.api.auth_calls.load(std::sync::atomic::Ordering::SeqCst), 1);
}

#[tokio::test]
async fn failed_page_is_counted_and_sync_continues() {
    let p = pipeline(120, 50);
    p.api.fail_page_at(50);

    let result = p.orchestrator.full_sync(None).await;

    assert!(!result.success);
    assert_eq!(result.records_synced, 70);
    assert_eq!(result.records_failed, 50);
    assert_eq!(result.errors.len(), 1);
    assert_eq!(p.store.len("leads"), 70);
}

#[tokio::test]
async fn incremental_sync_removes_archived_records() {
    let p = pipeline(3, 2);
    assert_eq!(p.orchestrator.full_sync(None).await.records_synced, 3);

    p.api.set_rows(vec![record_row(1, true), record_row(2, false), record_row(3, true)]);
    let result = p.orchestrator.incremental_sync(None, None).await;

    assert!(result.success, "errors: {:?}", result.errors);
    assert_eq!(result.records_synced, 2);
    assert_eq!(result.records_deleted, 1);
    assert_eq!(result.sync_version, 2);
    assert_eq!(p.store.len("leads"), 2);
}

#[tokio::test]
async fn single_record_sync_upserts_then_deletes_archived() {
    let p = pipeline(3, 10);
    p.orchestrator.full_sync(None).await;

    let outcome = p.orchestrator.sync_record(2).await.expect("synced");
    assert!(matches!(outcome, SingleSyncOutcome::Upserted { .. }));

    p.api.set_rows(vec![record_row(1, true), record_row(2, false), record_row(3, true)]);
    let outcome = p.orchestrator.sync_record(2).await.expect("synced");
    assert!(matches!(outcome, SingleSyncOutcome::Deleted { .. }));
    assert_eq!(p.store.len("leads"), 2);
}

#[tokio::test]
async fn source_outage_aborts_before_any_batch() {
    let p = pipeline(10, 5);
    p.api.fail_next([VectorSyncError::Network("down".into())]);

    let result = p.orchestrator.full_sync(None).await;

    assert!(!result.success);
    assert_eq!(result.records_synced, 0);
    assert!(result.errors[0].contains("could not count records"));
    assert_eq!(p.orchestrator.state().sync_version, 0);
}
