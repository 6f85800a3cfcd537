use std::future::Future;
use std::pin::Pin;

use crate::error::StoreError;
use crate::record::{NewRecord, Record, User};

pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Source of sessions to the target store.
///
/// The engine doesn't know concrete backends; for the engine a store is
/// just this trait. Implementations must bound `open` by the configured
/// connect timeout so a stalled network never blocks a task forever.
pub trait ConnectionFactory: Send + Sync {
    /// Open a session (simple mode) or check one out of the pool (pooled mode).
    fn open(&self) -> BoxFuture<'_, Result<Box<dyn Connection>, StoreError>>;

    /// Short backend description for logs, e.g. `postgres (pooled, 5)`.
    fn describe(&self) -> String;
}

/// One session. Dropping it closes the session or returns it to the pool.
///
/// Every write method commits before returning `Ok`.
pub trait Connection: Send {
    /// Idempotent `create table if absent` for `test_records`.
    fn create_records_table(&mut self) -> BoxFuture<'_, Result<(), StoreError>>;

    /// Insert one record and commit.
    fn insert_record<'a>(&'a mut self, record: &'a NewRecord) -> BoxFuture<'a, Result<(), StoreError>>;

    /// Most recent `limit` records, highest id first.
    fn recent_records(&mut self, limit: usize) -> BoxFuture<'_, Result<Vec<Record>, StoreError>>;

    /// Idempotent `create table if absent` for `users`.
    fn create_users_table(&mut self) -> BoxFuture<'_, Result<(), StoreError>>;

    /// Delete every row of `users`.
    fn clear_users(&mut self) -> BoxFuture<'_, Result<(), StoreError>>;

    /// Insert all users in one transaction and commit.
    fn insert_users<'a>(&'a mut self, users: &'a [User]) -> BoxFuture<'a, Result<(), StoreError>>;

    /// All users, ascending by id.
    fn list_users(&mut self) -> BoxFuture<'_, Result<Vec<User>, StoreError>>;
}
