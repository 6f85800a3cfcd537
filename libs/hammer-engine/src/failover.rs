use std::sync::Arc;
use std::time::Duration;

use tokio::time::Instant;

use hammer_api::{ConnectionFactory, Disruptor, StoreError, User};

use crate::config::FailoverConfig;
use crate::error::EngineError;

/// Rows written before the disruption.
fn seed_users() -> Vec<User> {
    vec![User::new(1, "Alice"), User::new(2, "Bob")]
}

/// Row written right after the disruption.
fn probe_user() -> User {
    User::new(3, "Charlie")
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FailoverReport {
    /// `users` as read back before the disruption.
    pub seeded: Vec<User>,
    /// `users` as read back after the probe write.
    pub after: Vec<User>,
    pub disruption_latency: Duration,
    /// Time from the end of the disruption until the probe row was read back.
    pub probe_latency: Duration,
}

/// Seed a table, kill the primary, and try one write straight away.
///
/// The probe is a single attempt: whether the store accepts a
/// write immediately after the disruption is the thing being observed.
pub struct FailoverScenario {
    factory: Arc<dyn ConnectionFactory>,
    disruptor: Arc<dyn Disruptor>,
    config: FailoverConfig,
}

impl FailoverScenario {
    pub fn new(
        factory: Arc<dyn ConnectionFactory>,
        disruptor: Arc<dyn Disruptor>,
        config: FailoverConfig,
    ) -> Self {
        Self { factory, disruptor, config }
    }

    pub async fn run(&self) -> Result<FailoverReport, EngineError> {
        tracing::info!(
            store = %self.factory.describe(),
            disruptor = %self.disruptor.describe(),
            reset_users = self.config.reset_users,
            "failover scenario starting"
        );

        let seeded = self.seed().await?;
        print_users("Initial data:", &seeded);

        let started = Instant::now();
        self.disruptor.disrupt().await?;
        let disruption_latency = started.elapsed();
        tracing::info!(latency_ms = disruption_latency.as_millis() as u64, "disruption done");

        let started = Instant::now();
        let after = self.probe().await.map_err(|e| {
            tracing::error!(error = %e, "store unavailable after disruption");
            EngineError::Probe(e)
        })?;
        let probe_latency = started.elapsed();
        print_users("Data after failover:", &after);
        tracing::info!(
            rows = after.len(),
            latency_ms = probe_latency.as_millis() as u64,
            "probe write accepted"
        );

        Ok(FailoverReport {
            seeded,
            after,
            disruption_latency,
            probe_latency,
        })
    }

    /// Pre-disruption phase. The connection is dropped before returning so no
    /// session survives into the disruption.
    async fn seed(&self) -> Result<Vec<User>, StoreError> {
        let mut conn = self.factory.open().await?;
        conn.create_users_table().await?;
        if self.config.reset_users {
            conn.clear_users().await?;
        }
        conn.insert_users(&seed_users()).await?;
        conn.list_users().await
    }

    async fn probe(&self) -> Result<Vec<User>, StoreError> {
        let mut conn = self.factory.open().await?;
        conn.insert_users(&[probe_user()]).await?;
        conn.list_users().await
    }
}

fn print_users(title: &str, users: &[User]) {
    println!("{title}");
    for u in users {
        println!("({}, '{}')", u.id, u.name);
    }
}

#[cfg(test)]
mod tests {
    use hammer_api::ErrorKind;
    use hammer_store_memory::{Availability, MemoryStore};

    use super::*;

    fn scenario(store: &MemoryStore, mode: Availability, heal: Option<Duration>) -> FailoverScenario {
        FailoverScenario::new(
            Arc::new(store.clone()),
            Arc::new(store.disruptor(mode, heal)),
            FailoverConfig::default(),
        )
    }

    #[tokio::test]
    async fn healthy_failover_sees_three_rows() {
        let store = MemoryStore::new();
        let report = scenario(&store, Availability::Down, Some(Duration::ZERO))
            .run()
            .await
            .unwrap();

        assert_eq!(report.seeded, seed_users());
        let names: Vec<_> = report.after.iter().map(|u| u.name.as_str()).collect();
        assert_eq!(names, ["Alice", "Bob", "Charlie"]);
        assert_eq!(store.disruptions(), 1);
        assert_eq!(store.open_connections(), 0);
    }

    #[tokio::test]
    async fn unavailable_store_surfaces_probe_error() {
        let store = MemoryStore::new();
        let err = scenario(&store, Availability::Down, None).run().await.unwrap_err();
        match err {
            EngineError::Probe(e) => assert_eq!(e.kind, ErrorKind::Refused),
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(store.users().len(), 2);
    }

    #[tokio::test]
    async fn reset_makes_reruns_deterministic() {
        let store = MemoryStore::new();
        let s = scenario(&store, Availability::Down, Some(Duration::ZERO));
        s.run().await.unwrap();
        let report = s.run().await.unwrap();
        assert_eq!(report.seeded.len(), 2);
        assert_eq!(report.after.len(), 3);
    }

    #[tokio::test]
    async fn keeping_users_accumulates_rows() {
        let store = MemoryStore::new();
        let s = FailoverScenario::new(
            Arc::new(store.clone()),
            Arc::new(store.disruptor(Availability::Down, Some(Duration::ZERO))),
            FailoverConfig { reset_users: false },
        );
        s.run().await.unwrap();
        let report = s.run().await.unwrap();
        assert_eq!(report.seeded.len(), 5);
        assert_eq!(report.after.len(), 6);
    }

    #[tokio::test]
    async fn seed_failure_is_not_a_probe_error() {
        let store = MemoryStore::new();
        store.fail_next_connects(1);
        let err = scenario(&store, Availability::Down, None).run().await.unwrap_err();
        assert!(matches!(err, EngineError::Store(_)));
        assert_eq!(store.disruptions(), 0);
    }

    #[tokio::test]
    async fn failed_disruption_stops_the_scenario() {
        let store = MemoryStore::new();
        let err = scenario(&store, Availability::Up, None).run().await.unwrap_err();
        assert!(matches!(err, EngineError::Disruption(_)));
        assert_eq!(store.users().len(), 2);
    }
}
