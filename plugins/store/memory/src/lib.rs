//! In-process store with fault injection.
//!
//! Behaves like a single-node relational store holding `test_records` and
//! `users`, and lets callers refuse connections, fail statements, delay the
//! handshake or flip the node read-only. Used for dry runs of the harness and
//! for exercising failure handling without a real cluster.

use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use hammer_api::config::DEFAULT_CONNECT_TIMEOUT;
use hammer_api::{
    BoxFuture, Connection, ConnectionFactory, DisruptError, Disruptor, NewRecord, Record,
    StoreError, User,
};

// ═══════════════════════════════════════════════════════════════
//  Availability
// ═══════════════════════════════════════════════════════════════

/// Node state as seen by clients.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Availability {
    /// Accepts connections, reads and writes.
    Up,
    /// Refuses new connections; live sessions fail on next use.
    Down,
    /// Accepts connections and reads, rejects writes (standby after primary loss).
    ReadOnly,
}

// ═══════════════════════════════════════════════════════════════
//  MemoryStore
// ═══════════════════════════════════════════════════════════════

#[derive(Default)]
struct Tables {
    /// `None` until `create_records_table`.
    records: Option<Vec<Record>>,
    next_id: i64,
    /// `None` until `create_users_table`.
    users: Option<Vec<User>>,
}

struct Inner {
    tables: Mutex<Tables>,
    availability: Mutex<Availability>,
    connect_delay: Mutex<Option<Duration>>,
    connect_timeout: Duration,
    connect_failures: AtomicUsize,
    query_failures: AtomicUsize,
    open: AtomicUsize,
    opened_total: AtomicU64,
    disruptions: AtomicU64,
}

/// Shared handle to one in-memory node. Clones see the same data.
#[derive(Clone)]
pub struct MemoryStore {
    inner: Arc<Inner>,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    match m.lock() {
        Ok(g) => g,
        Err(poisoned) => {
            tracing::warn!("memory store lock was poisoned, recovering");
            poisoned.into_inner()
        }
    }
}

/// Decrement `n` if positive. Returns true when a unit was consumed.
fn take_one(n: &AtomicUsize) -> bool {
    n.fetch_update(Ordering::SeqCst, Ordering::SeqCst, |v| v.checked_sub(1))
        .is_ok()
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::with_connect_timeout(DEFAULT_CONNECT_TIMEOUT)
    }

    pub fn with_connect_timeout(connect_timeout: Duration) -> Self {
        Self {
            inner: Arc::new(Inner {
                tables: Mutex::new(Tables { next_id: 1, ..Tables::default() }),
                availability: Mutex::new(Availability::Up),
                connect_delay: Mutex::new(None),
                connect_timeout,
                connect_failures: AtomicUsize::new(0),
                query_failures: AtomicUsize::new(0),
                open: AtomicUsize::new(0),
                opened_total: AtomicU64::new(0),
                disruptions: AtomicU64::new(0),
            }),
        }
    }

    // --- Fault injection ---

    /// Refuse the next `n` connection attempts.
    pub fn fail_next_connects(&self, n: usize) {
        self.inner.connect_failures.store(n, Ordering::SeqCst);
    }

    /// Fail the next `n` statements with a query error.
    pub fn fail_next_queries(&self, n: usize) {
        self.inner.query_failures.store(n, Ordering::SeqCst);
    }

    /// Delay every handshake. A delay longer than the connect timeout
    /// makes `open` fail with a timeout.
    pub fn set_connect_delay(&self, delay: Option<Duration>) {
        *lock(&self.inner.connect_delay) = delay;
    }

    pub fn set_availability(&self, availability: Availability) {
        *lock(&self.inner.availability) = availability;
        tracing::debug!(?availability, "memory store availability changed");
    }

    pub fn availability(&self) -> Availability {
        *lock(&self.inner.availability)
    }

    /// A disruptor acting on this node. `heal_after = Some(d)` restores
    /// `Up` after `d` (immediately for a zero duration); `None` leaves the
    /// node disrupted until `set_availability(Up)`.
    pub fn disruptor(&self, mode: Availability, heal_after: Option<Duration>) -> MemoryDisruptor {
        MemoryDisruptor {
            store: self.clone(),
            mode,
            heal_after,
        }
    }

    // --- Inspection ---

    /// Snapshot of `test_records` in insertion order.
    pub fn records(&self) -> Vec<Record> {
        lock(&self.inner.tables).records.clone().unwrap_or_default()
    }

    pub fn record_count(&self) -> usize {
        lock(&self.inner.tables).records.as_ref().map_or(0, Vec::len)
    }

    /// Snapshot of `users` in insertion order.
    pub fn users(&self) -> Vec<User> {
        lock(&self.inner.tables).users.clone().unwrap_or_default()
    }

    /// Sessions currently held by clients.
    pub fn open_connections(&self) -> usize {
        self.inner.open.load(Ordering::SeqCst)
    }

    /// Sessions ever established.
    pub fn opened_total(&self) -> u64 {
        self.inner.opened_total.load(Ordering::SeqCst)
    }

    pub fn disruptions(&self) -> u64 {
        self.inner.disruptions.load(Ordering::SeqCst)
    }
}

impl ConnectionFactory for MemoryStore {
    fn open(&self) -> BoxFuture<'_, Result<Box<dyn Connection>, StoreError>> {
        Box::pin(async move {
            let delay = *lock(&self.inner.connect_delay);
            if let Some(delay) = delay {
                let timeout = self.inner.connect_timeout;
                if tokio::time::timeout(timeout, tokio::time::sleep(delay))
                    .await
                    .is_err()
                {
                    return Err(StoreError::timeout(format!(
                        "connect timed out after {:.1}s",
                        timeout.as_secs_f64()
                    )));
                }
            }

            if self.availability() == Availability::Down {
                return Err(StoreError::refused("connection refused: node is down"));
            }
            if take_one(&self.inner.connect_failures) {
                return Err(StoreError::refused("connection refused (injected)"));
            }

            self.inner.open.fetch_add(1, Ordering::SeqCst);
            self.inner.opened_total.fetch_add(1, Ordering::SeqCst);
            Ok(Box::new(MemoryConnection { inner: self.inner.clone() }) as Box<dyn Connection>)
        })
    }

    fn describe(&self) -> String {
        "memory".into()
    }
}

// ═══════════════════════════════════════════════════════════════
//  MemoryConnection
// ═══════════════════════════════════════════════════════════════

struct MemoryConnection {
    inner: Arc<Inner>,
}

impl Drop for MemoryConnection {
    fn drop(&mut self) {
        self.inner.open.fetch_sub(1, Ordering::SeqCst);
    }
}

impl MemoryConnection {
    /// Checks common to every statement.
    fn precheck(&self, write: bool) -> Result<(), StoreError> {
        match *lock(&self.inner.availability) {
            Availability::Down => {
                return Err(StoreError::connection("server closed the connection unexpectedly"));
            }
            Availability::ReadOnly if write => {
                return Err(StoreError::query("cannot execute statement in a read-only transaction"));
            }
            _ => {}
        }
        if take_one(&self.inner.query_failures) {
            return Err(StoreError::query("statement failed (injected)"));
        }
        Ok(())
    }

    fn tables(&self) -> MutexGuard<'_, Tables> {
        lock(&self.inner.tables)
    }
}

fn missing(table: &str) -> StoreError {
    StoreError::query(format!("relation \"{table}\" does not exist"))
}

impl Connection for MemoryConnection {
    fn create_records_table(&mut self) -> BoxFuture<'_, Result<(), StoreError>> {
        Box::pin(async move {
            self.precheck(true)?;
            self.tables().records.get_or_insert_with(Vec::new);
            Ok(())
        })
    }

    fn insert_record<'a>(&'a mut self, record: &'a NewRecord) -> BoxFuture<'a, Result<(), StoreError>> {
        Box::pin(async move {
            self.precheck(true)?;
            let mut tables = self.tables();
            let id = tables.next_id;
            let rows = tables.records.as_mut().ok_or_else(|| missing("test_records"))?;
            rows.push(Record {
                id,
                data: record.data.clone(),
                timestamp: Some(record.timestamp),
                writer_id: record.writer_id.clone(),
            });
            tables.next_id += 1;
            Ok(())
        })
    }

    fn recent_records(&mut self, limit: usize) -> BoxFuture<'_, Result<Vec<Record>, StoreError>> {
        Box::pin(async move {
            self.precheck(false)?;
            let tables = self.tables();
            let rows = tables.records.as_ref().ok_or_else(|| missing("test_records"))?;
            Ok(rows.iter().rev().take(limit).cloned().collect())
        })
    }

    fn create_users_table(&mut self) -> BoxFuture<'_, Result<(), StoreError>> {
        Box::pin(async move {
            self.precheck(true)?;
            self.tables().users.get_or_insert_with(Vec::new);
            Ok(())
        })
    }

    fn clear_users(&mut self) -> BoxFuture<'_, Result<(), StoreError>> {
        Box::pin(async move {
            self.precheck(true)?;
            self.tables()
                .users
                .as_mut()
                .ok_or_else(|| missing("users"))?
                .clear();
            Ok(())
        })
    }

    fn insert_users<'a>(&'a mut self, users: &'a [User]) -> BoxFuture<'a, Result<(), StoreError>> {
        Box::pin(async move {
            self.precheck(true)?;
            self.tables()
                .users
                .as_mut()
                .ok_or_else(|| missing("users"))?
                .extend_from_slice(users);
            Ok(())
        })
    }

    fn list_users(&mut self) -> BoxFuture<'_, Result<Vec<User>, StoreError>> {
        Box::pin(async move {
            self.precheck(false)?;
            let tables = self.tables();
            let mut users = tables.users.clone().ok_or_else(|| missing("users"))?;
            users.sort_by_key(|u| u.id);
            Ok(users)
        })
    }
}

// ═══════════════════════════════════════════════════════════════
//  MemoryDisruptor
// ═══════════════════════════════════════════════════════════════

/// Simulated primary failure on a `MemoryStore`.
pub struct MemoryDisruptor {
    store: MemoryStore,
    mode: Availability,
    heal_after: Option<Duration>,
}

impl Disruptor for MemoryDisruptor {
    fn disrupt(&self) -> BoxFuture<'_, Result<(), DisruptError>> {
        Box::pin(async move {
            if self.mode == Availability::Up {
                return Err(DisruptError::new(self.describe(), "disruption mode must not be Up"));
            }
            self.store.inner.disruptions.fetch_add(1, Ordering::SeqCst);
            self.store.set_availability(self.mode);

            match self.heal_after {
                Some(d) if d.is_zero() => self.store.set_availability(Availability::Up),
                Some(d) => {
                    let store = self.store.clone();
                    tokio::spawn(async move {
                        tokio::time::sleep(d).await;
                        store.set_availability(Availability::Up);
                    });
                }
                None => {}
            }
            Ok(())
        })
    }

    fn describe(&self) -> String {
        format!("memory node ({:?})", self.mode)
    }
}
