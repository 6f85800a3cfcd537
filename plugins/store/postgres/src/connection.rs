use std::time::SystemTime;

use tokio_postgres::{Client, Row};

use hammer_api::{BoxFuture, Connection, NewRecord, Record, StoreError, User};

use crate::error::classify_query;

const CREATE_RECORDS: &str = r#"
    CREATE TABLE IF NOT EXISTS test_records (
        id SERIAL PRIMARY KEY,
        data VARCHAR(255),
        "timestamp" TIMESTAMP,
        writer_id VARCHAR(50)
    )
"#;

const INSERT_RECORD: &str =
    r#"INSERT INTO test_records (data, "timestamp", writer_id) VALUES ($1, $2, $3)"#;

const RECENT_RECORDS: &str =
    r#"SELECT id, data, "timestamp", writer_id FROM test_records ORDER BY id DESC LIMIT $1"#;

const CREATE_USERS: &str = "CREATE TABLE IF NOT EXISTS users (id INT, name VARCHAR(50))";

const INSERT_USER: &str = "INSERT INTO users (id, name) VALUES ($1, $2)";

const LIST_USERS: &str = "SELECT id, name FROM users ORDER BY id";

pub(crate) enum PgClient {
    Direct(Client),
    Pooled(deadpool_postgres::Object),
}

/// A session: owned (simple mode) or checked out of the pool.
/// Dropping it closes the socket or hands the session back.
pub(crate) struct PgConnection {
    client: PgClient,
}

impl PgConnection {
    pub(crate) fn new(client: PgClient) -> Self {
        Self { client }
    }

    fn client(&mut self) -> &mut Client {
        match &mut self.client {
            PgClient::Direct(c) => c,
            PgClient::Pooled(o) => {
                let client: &mut Client = o;
                client
            }
        }
    }
}

fn record_from_row(row: &Row) -> Result<Record, StoreError> {
    let id: i32 = row.try_get("id").map_err(classify_query)?;
    let data: Option<String> = row.try_get("data").map_err(classify_query)?;
    let timestamp: Option<SystemTime> = row.try_get("timestamp").map_err(classify_query)?;
    let writer_id: Option<String> = row.try_get("writer_id").map_err(classify_query)?;
    Ok(Record {
        id: i64::from(id),
        data: data.unwrap_or_default(),
        timestamp,
        writer_id: writer_id.unwrap_or_default(),
    })
}

fn user_from_row(row: &Row) -> Result<User, StoreError> {
    let id: Option<i32> = row.try_get("id").map_err(classify_query)?;
    let name: Option<String> = row.try_get("name").map_err(classify_query)?;
    Ok(User {
        id: id.unwrap_or_default(),
        name: name.unwrap_or_default(),
    })
}

impl Connection for PgConnection {
    fn create_records_table(&mut self) -> BoxFuture<'_, Result<(), StoreError>> {
        Box::pin(async move {
            self.client()
                .batch_execute(CREATE_RECORDS)
                .await
                .map_err(classify_query)
        })
    }

    fn insert_record<'a>(&'a mut self, record: &'a NewRecord) -> BoxFuture<'a, Result<(), StoreError>> {
        Box::pin(async move {
            let tx = self.client().transaction().await.map_err(classify_query)?;
            tx.execute(INSERT_RECORD, &[&record.data, &record.timestamp, &record.writer_id])
                .await
                .map_err(classify_query)?;
            tx.commit().await.map_err(classify_query)
        })
    }

    fn recent_records(&mut self, limit: usize) -> BoxFuture<'_, Result<Vec<Record>, StoreError>> {
        Box::pin(async move {
            let limit = i64::try_from(limit).unwrap_or(i64::MAX);
            let rows = self
                .client()
                .query(RECENT_RECORDS, &[&limit])
                .await
                .map_err(classify_query)?;
            rows.iter().map(record_from_row).collect()
        })
    }

    fn create_users_table(&mut self) -> BoxFuture<'_, Result<(), StoreError>> {
        Box::pin(async move {
            self.client()
                .batch_execute(CREATE_USERS)
                .await
                .map_err(classify_query)
        })
    }

    fn clear_users(&mut self) -> BoxFuture<'_, Result<(), StoreError>> {
        Box::pin(async move {
            self.client()
                .execute("DELETE FROM users", &[])
                .await
                .map(|_| ())
                .map_err(classify_query)
        })
    }

    fn insert_users<'a>(&'a mut self, users: &'a [User]) -> BoxFuture<'a, Result<(), StoreError>> {
        Box::pin(async move {
            let tx = self.client().transaction().await.map_err(classify_query)?;
            for user in users {
                tx.execute(INSERT_USER, &[&user.id, &user.name])
                    .await
                    .map_err(classify_query)?;
            }
            tx.commit().await.map_err(classify_query)
        })
    }

    fn list_users(&mut self) -> BoxFuture<'_, Result<Vec<User>, StoreError>> {
        Box::pin(async move {
            let rows = self
                .client()
                .query(LIST_USERS, &[])
                .await
                .map_err(classify_query)?;
            rows.iter().map(user_from_row).collect()
        })
    }
}
