use std::sync::Arc;
use std::time::Duration;

use hammer_api::{ErrorKind, User};
use hammer_engine::{CommandDisruptor, EngineError, FailoverConfig, FailoverScenario};
use hammer_store_memory::{Availability, MemoryStore};

fn scenario(store: &MemoryStore, mode: Availability, heal_after: Option<Duration>) -> FailoverScenario {
    FailoverScenario::new(
        Arc::new(store.clone()),
        Arc::new(store.disruptor(mode, heal_after)),
        FailoverConfig::default(),
    )
}

#[tokio::test]
async fn write_accepted_after_failover() {
    let store = MemoryStore::new();
    let report = scenario(&store, Availability::Down, Some(Duration::ZERO))
        .run()
        .await
        .unwrap();

    assert_eq!(report.seeded, vec![User::new(1, "Alice"), User::new(2, "Bob")]);
    assert_eq!(
        report.after,
        vec![User::new(1, "Alice"), User::new(2, "Bob"), User::new(3, "Charlie")]
    );
    assert_eq!(store.users().len(), 3);
}

#[tokio::test]
async fn read_only_standby_rejects_the_probe() {
    let store = MemoryStore::new();
    let err = scenario(&store, Availability::ReadOnly, None).run().await.unwrap_err();

    match err {
        EngineError::Probe(e) => {
            assert_eq!(e.kind, ErrorKind::Query);
            assert!(e.message.contains("read-only"), "{}", e.message);
        }
        other => panic!("unexpected error: {other}"),
    }
    assert_eq!(store.users(), vec![User::new(1, "Alice"), User::new(2, "Bob")]);
}

#[tokio::test]
async fn slow_failover_is_not_retried() {
    let store = MemoryStore::new();
    let err = scenario(&store, Availability::Down, Some(Duration::from_millis(50)))
        .run()
        .await
        .unwrap_err();

    assert!(matches!(err, EngineError::Probe(ref e) if e.is_connection()));
    // Only the seed session was established; the refused open is not counted.
    assert_eq!(store.opened_total(), 1);
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(store.availability(), Availability::Up);
    assert_eq!(store.users().len(), 2);
}

#[tokio::test]
async fn command_disruptor_drives_the_scenario() {
    let store = MemoryStore::new();
    let disruptor = CommandDisruptor::new(vec!["true".into()]).unwrap();
    let report = FailoverScenario::new(Arc::new(store.clone()), Arc::new(disruptor), FailoverConfig::default())
        .run()
        .await
        .unwrap();
    assert_eq!(report.after.len(), 3);
}

#[tokio::test]
async fn failing_command_is_a_disruption_error() {
    let store = MemoryStore::new();
    let disruptor = CommandDisruptor::new(vec!["false".into()]).unwrap();
    let err = FailoverScenario::new(Arc::new(store.clone()), Arc::new(disruptor), FailoverConfig::default())
        .run()
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::Disruption(_)));
    assert_eq!(store.users().len(), 2);
}
