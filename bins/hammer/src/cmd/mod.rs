pub mod failover;
pub mod run;

use std::sync::Arc;

use hammer_api::{ConnectConfig, ConnectionFactory};
use hammer_store_memory::MemoryStore;
use hammer_store_postgres::PgConnectionFactory;

use crate::config::StoreKind;
use crate::error::CliError;

/// Memory stores are returned alongside the factory so callers can build a
/// disruptor for the same node.
pub(crate) fn open_factory(
    store: StoreKind,
    connect: &ConnectConfig,
) -> Result<(Arc<dyn ConnectionFactory>, Option<MemoryStore>), CliError> {
    match store {
        StoreKind::Postgres => Ok((Arc::new(PgConnectionFactory::new(connect)?), None)),
        StoreKind::Memory => {
            let mem = MemoryStore::with_connect_timeout(connect.connect_timeout);
            Ok((Arc::new(mem.clone()), Some(mem)))
        }
    }
}
