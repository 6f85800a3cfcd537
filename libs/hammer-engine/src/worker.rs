use std::sync::Arc;
use std::time::{Duration, SystemTime};

use rand::distributions::Alphanumeric;
use rand::Rng;
use tokio_util::sync::CancellationToken;

use hammer_api::{ConnectionFactory, NewRecord, StoreError};

use crate::config::WorkloadConfig;
use crate::counters::Counters;

/// Everything a writer or reader task shares with the rest of the run.
#[derive(Clone)]
pub struct WorkerContext {
    pub factory: Arc<dyn ConnectionFactory>,
    pub counters: Arc<Counters>,
    pub workload: WorkloadConfig,
    pub token: CancellationToken,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Writer,
    Reader,
}

impl Role {
    fn label(self) -> &'static str {
        match self {
            Role::Writer => "Writer",
            Role::Reader => "Reader",
        }
    }
}

/// Sleep for `d` unless the stop signal fires first.
///
/// Returns `false` when cancelled.
pub(crate) async fn pause(token: &CancellationToken, d: Duration) -> bool {
    tokio::select! {
        _ = token.cancelled() => false,
        _ = tokio::time::sleep(d) => true,
    }
}

pub(crate) fn random_payload(len: usize) -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(len)
        .map(char::from)
        .collect()
}

fn report(ctx: &WorkerContext, role: Role, id: &str, error: &StoreError) {
    tracing::warn!(task = %id, role = role.label(), error = %error, "iteration failed");
    ctx.counters
        .record_error(format!("{} {id} error: {error}", role.label()));
}

// ---------------------------------------------------------------------------
// Writer
// ---------------------------------------------------------------------------

/// Insert synthetic records until the stop signal.
///
/// Each iteration uses its own connection, so nothing stays open between
/// iterations or after an error. Errors are logged and backed off, never
/// fatal.
pub async fn writer_task(id: String, ctx: WorkerContext) {
    tracing::debug!(task = %id, "writer started");
    while !ctx.token.is_cancelled() {
        let delay = match write_once(&id, &ctx).await {
            Ok(()) => ctx.workload.write_pace,
            Err(e) => {
                report(&ctx, Role::Writer, &id, &e);
                ctx.workload.error_backoff
            }
        };
        if !pause(&ctx.token, delay).await {
            break;
        }
    }
    tracing::debug!(task = %id, "writer stopped");
}

async fn write_once(id: &str, ctx: &WorkerContext) -> Result<(), StoreError> {
    let mut conn = ctx.factory.open().await?;
    let record = NewRecord {
        data: random_payload(ctx.workload.payload_len),
        timestamp: SystemTime::now(),
        writer_id: id.to_string(),
    };
    conn.insert_record(&record).await?;
    ctx.counters.record_write();
    Ok(())
}

// ---------------------------------------------------------------------------
// Reader
// ---------------------------------------------------------------------------

/// Read the newest records until the stop signal.
///
/// An empty table is not an error, but it is not counted as a read either.
pub async fn reader_task(id: String, ctx: WorkerContext) {
    tracing::debug!(task = %id, "reader started");
    while !ctx.token.is_cancelled() {
        let delay = match read_once(&ctx).await {
            Ok(()) => ctx.workload.read_pace,
            Err(e) => {
                report(&ctx, Role::Reader, &id, &e);
                ctx.workload.error_backoff
            }
        };
        if !pause(&ctx.token, delay).await {
            break;
        }
    }
    tracing::debug!(task = %id, "reader stopped");
}

async fn read_once(ctx: &WorkerContext) -> Result<(), StoreError> {
    let mut conn = ctx.factory.open().await?;
    let records = conn.recent_records(ctx.workload.read_limit).await?;
    if !records.is_empty() {
        ctx.counters.record_read();
    }
    Ok(())
}
