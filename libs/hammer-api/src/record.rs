use std::time::SystemTime;

/// A row of `test_records`. Never mutated after insertion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Record {
    /// Assigned by the store.
    pub id: i64,
    pub data: String,
    pub timestamp: Option<SystemTime>,
    pub writer_id: String,
}

/// Insert payload for `test_records`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewRecord {
    pub data: String,
    pub timestamp: SystemTime,
    pub writer_id: String,
}

/// A row of the failover scenario's `users` table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct User {
    pub id: i32,
    pub name: String,
}

impl User {
    pub fn new(id: i32, name: impl Into<String>) -> Self {
        Self { id, name: name.into() }
    }
}
