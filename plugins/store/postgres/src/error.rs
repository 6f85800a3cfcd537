use std::io;

use deadpool_postgres::PoolError;
use tokio_postgres::error::SqlState;

use hammer_api::StoreError;

/// Driver error text; server errors carry their SQLSTATE.
fn detail(e: &tokio_postgres::Error) -> String {
    match e.as_db_error() {
        Some(db) => format!("{} ({})", db.message(), db.code().code()),
        None => match std::error::Error::source(e) {
            Some(cause) => format!("{e}: {cause}"),
            None => e.to_string(),
        },
    }
}

fn io_source(e: &tokio_postgres::Error) -> Option<&io::Error> {
    std::error::Error::source(e).and_then(|s| s.downcast_ref::<io::Error>())
}

/// Classify a handshake failure.
pub(crate) fn classify_connect(e: &tokio_postgres::Error) -> StoreError {
    if let Some(db) = e.as_db_error() {
        let code = db.code();
        if *code == SqlState::INVALID_PASSWORD
            || *code == SqlState::INVALID_AUTHORIZATION_SPECIFICATION
        {
            return StoreError::auth(detail(e));
        }
        return StoreError::connection(detail(e));
    }
    match io_source(e).map(io::Error::kind) {
        Some(io::ErrorKind::ConnectionRefused) => StoreError::refused(detail(e)),
        Some(io::ErrorKind::TimedOut) => StoreError::timeout(detail(e)),
        _ => StoreError::connection(detail(e)),
    }
}

/// Classify a statement or commit failure on a live session.
pub(crate) fn classify_query(e: tokio_postgres::Error) -> StoreError {
    if e.is_closed() || io_source(&e).is_some() {
        StoreError::connection(detail(&e))
    } else {
        StoreError::query(detail(&e))
    }
}

pub(crate) fn classify_pool(e: PoolError) -> StoreError {
    match e {
        PoolError::Timeout(kind) => StoreError::timeout(format!("pool {kind:?} timeout")),
        PoolError::Backend(e) => classify_connect(&e),
        other => StoreError::connection(format!("pool: {other}")),
    }
}
