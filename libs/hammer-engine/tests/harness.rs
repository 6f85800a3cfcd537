use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use hammer_engine::{EngineError, Harness, HarnessState, RunConfig, StopReason};
use hammer_store_memory::{Availability, MemoryStore};

fn short_run(duration: Duration) -> RunConfig {
    RunConfig {
        duration,
        ..RunConfig::default()
    }
}

#[tokio::test(start_paused = true)]
async fn every_write_lands_in_the_store() {
    let store = MemoryStore::new();
    let harness = Harness::new(
        short_run(Duration::from_secs(10)),
        Arc::new(store.clone()),
        CancellationToken::new(),
    );

    let summary = harness.run().await.unwrap();

    assert_eq!(summary.reason, StopReason::Elapsed);
    assert_eq!(summary.writes, store.record_count() as u64);
    assert!(summary.writes > 0);
    assert!(summary.reads > 0);
    assert_eq!(summary.error_total, 0);
    assert_eq!(summary.tasks_aborted, 0);
    assert_eq!(store.open_connections(), 0);

    let writers: std::collections::HashSet<_> =
        store.records().into_iter().map(|r| r.writer_id).collect();
    assert_eq!(writers.len(), 3);
    assert!(writers.contains("writer_0") && writers.contains("writer_2"));
}

#[tokio::test(start_paused = true)]
async fn counters_never_decrease_during_a_run() {
    let store = MemoryStore::new();
    let mut harness = Harness::new(
        short_run(Duration::from_secs(5)),
        Arc::new(store.clone()),
        CancellationToken::new(),
    );
    harness.prepare_schema().await.unwrap();
    harness.start().unwrap();

    let counters = harness.counters().clone();
    let observer = tokio::spawn(async move {
        let mut seen = Vec::new();
        for _ in 0..40 {
            seen.push(counters.snapshot());
            tokio::time::sleep(Duration::from_millis(100)).await;
        }
        seen
    });

    harness.wait().await.unwrap();
    harness.drain().await.unwrap();

    let seen = observer.await.unwrap();
    for pair in seen.windows(2) {
        assert!(pair[1].writes >= pair[0].writes);
        assert!(pair[1].reads >= pair[0].reads);
    }
    assert!(seen.last().unwrap().writes > seen.first().unwrap().writes);
}

#[tokio::test(start_paused = true)]
async fn schema_failure_spawns_nothing() {
    let store = MemoryStore::new();
    store.fail_next_queries(1);
    let harness = Harness::new(RunConfig::default(), Arc::new(store.clone()), CancellationToken::new());

    let err = harness.run().await.unwrap_err();
    assert!(matches!(err, EngineError::Schema(_)));
    assert_eq!(store.opened_total(), 1);
    assert_eq!(store.record_count(), 0);
}

#[tokio::test(start_paused = true)]
async fn interrupt_drains_promptly_and_closes_connections() {
    let store = MemoryStore::new();
    let token = CancellationToken::new();
    let harness = Harness::new(
        short_run(Duration::from_secs(300)),
        Arc::new(store.clone()),
        token.clone(),
    );

    let run = tokio::spawn(harness.run());
    tokio::time::sleep(Duration::from_millis(2500)).await;
    let interrupted_at = tokio::time::Instant::now();
    token.cancel();

    let summary = run.await.unwrap().unwrap();
    assert_eq!(summary.reason, StopReason::Interrupted);
    assert!(interrupted_at.elapsed() < Duration::from_secs(1));
    assert_eq!(summary.tasks_joined, 7);
    assert_eq!(summary.tasks_aborted, 0);
    assert!(summary.last_sample.is_some());
    assert_eq!(store.open_connections(), 0);
}

#[tokio::test(start_paused = true)]
async fn outage_is_logged_and_the_run_survives_it() {
    let store = MemoryStore::new();
    let mut harness = Harness::new(
        short_run(Duration::from_secs(8)),
        Arc::new(store.clone()),
        CancellationToken::new(),
    );
    harness.prepare_schema().await.unwrap();
    harness.start().unwrap();

    let outage = {
        let store = store.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(2)).await;
            store.set_availability(Availability::Down);
            tokio::time::sleep(Duration::from_secs(3)).await;
            store.set_availability(Availability::Up);
        })
    };

    harness.wait().await.unwrap();
    outage.await.unwrap();
    let summary = harness.drain().await.unwrap();

    assert!(summary.error_total > 0);
    assert!(!summary.recent_errors.is_empty());
    assert!(summary.recent_errors.len() <= 3);
    assert!(
        summary
            .recent_errors
            .iter()
            .all(|e| e.starts_with("Writer writer_") || e.starts_with("Reader reader_"))
    );
    assert_eq!(summary.writes, store.record_count() as u64);
    assert_eq!(store.open_connections(), 0);
    assert_eq!(harness.state(), HarnessState::Stopped);
}

#[tokio::test(start_paused = true)]
async fn small_error_log_keeps_counting() {
    let store = MemoryStore::new();
    let config = RunConfig {
        error_log_capacity: 4,
        ..short_run(Duration::from_secs(5))
    };
    let mut harness = Harness::new(config, Arc::new(store.clone()), CancellationToken::new());
    harness.prepare_schema().await.unwrap();
    store.set_availability(Availability::Down);
    harness.start().unwrap();
    harness.wait().await.unwrap();
    let summary = harness.drain().await.unwrap();

    // Six tasks failing once per second for five seconds.
    assert!(summary.error_total >= 24, "{}", summary.error_total);
    assert_eq!(harness.counters().errors().len(), 4);
    assert_eq!(summary.recent_errors.len(), 3);
    assert_eq!(summary.writes, 0);
}
