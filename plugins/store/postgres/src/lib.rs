//! PostgreSQL store backend.
//!
//! Simple mode opens a fresh session per `open` (one handshake per
//! operation); pooled mode checks sessions out of a fixed-capacity
//! `deadpool-postgres` pool. Both bound the handshake by the configured
//! connect timeout.

mod connection;
mod error;

use deadpool_postgres::{Pool, PoolConfig, Runtime};
use tokio_postgres::NoTls;

use hammer_api::{BoxFuture, ConnectConfig, Connection, ConnectionFactory, StoreError};

use connection::{PgClient, PgConnection};

const APPLICATION_NAME: &str = "hammer";

enum Mode {
    Simple(tokio_postgres::Config),
    Pooled(Pool),
}

pub struct PgConnectionFactory {
    mode: Mode,
    config: ConnectConfig,
}

impl std::fmt::Debug for PgConnectionFactory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PgConnectionFactory")
            .field("config", &self.config)
            .finish()
    }
}

impl PgConnectionFactory {
    /// Build a factory. Never touches the network; the first `open` does.
    pub fn new(config: &ConnectConfig) -> Result<Self, StoreError> {
        let mode = match config.pool_size {
            None => Mode::Simple(pg_config(config)),
            Some(size) => Mode::Pooled(build_pool(config, size)?),
        };
        Ok(Self {
            mode,
            config: config.clone(),
        })
    }

    async fn open_simple(&self, pg: &tokio_postgres::Config) -> Result<Box<dyn Connection>, StoreError> {
        let timeout = self.config.connect_timeout;
        let (client, connection) = tokio::time::timeout(timeout, pg.connect(NoTls))
            .await
            .map_err(|_| {
                StoreError::timeout(format!(
                    "connect to {} timed out after {:.1}s",
                    self.config.target(),
                    timeout.as_secs_f64()
                ))
            })?
            .map_err(|e| error::classify_connect(&e).with_context(self.config.target()))?;

        // The connection object drives the socket; it resolves when the
        // client is dropped or the server goes away.
        tokio::spawn(async move {
            if let Err(e) = connection.await {
                tracing::debug!(error = %e, "postgres session ended with error");
            }
        });

        Ok(Box::new(PgConnection::new(PgClient::Direct(client))))
    }

    async fn open_pooled(&self, pool: &Pool) -> Result<Box<dyn Connection>, StoreError> {
        let object = pool
            .get()
            .await
            .map_err(|e| error::classify_pool(e).with_context(self.config.target()))?;
        Ok(Box::new(PgConnection::new(PgClient::Pooled(object))))
    }
}

impl ConnectionFactory for PgConnectionFactory {
    fn open(&self) -> BoxFuture<'_, Result<Box<dyn Connection>, StoreError>> {
        Box::pin(async move {
            match &self.mode {
                Mode::Simple(pg) => self.open_simple(pg).await,
                Mode::Pooled(pool) => self.open_pooled(pool).await,
            }
        })
    }

    fn describe(&self) -> String {
        match &self.mode {
            Mode::Simple(_) => format!("postgres {} (simple)", self.config.target()),
            Mode::Pooled(pool) => format!(
                "postgres {} (pooled, {})",
                self.config.target(),
                pool.status().max_size
            ),
        }
    }
}

/// Translate the connect config into driver settings.
fn pg_config(config: &ConnectConfig) -> tokio_postgres::Config {
    let mut pg = tokio_postgres::Config::new();
    pg.host(&config.host)
        .port(config.port)
        .user(&config.credentials.user)
        .password(&config.credentials.password)
        .dbname(&config.database)
        .connect_timeout(config.connect_timeout)
        .application_name(APPLICATION_NAME);
    pg
}

fn build_pool(config: &ConnectConfig, size: usize) -> Result<Pool, StoreError> {
    let mut cfg = deadpool_postgres::Config::new();
    cfg.host = Some(config.host.clone());
    cfg.port = Some(config.port);
    cfg.user = Some(config.credentials.user.clone());
    cfg.password = Some(config.credentials.password.clone());
    cfg.dbname = Some(config.database.clone());
    cfg.connect_timeout = Some(config.connect_timeout);
    cfg.application_name = Some(APPLICATION_NAME.into());

    let mut pool_cfg = PoolConfig::new(size);
    pool_cfg.timeouts.wait = Some(config.connect_timeout);
    pool_cfg.timeouts.create = Some(config.connect_timeout);
    pool_cfg.timeouts.recycle = Some(config.connect_timeout);
    cfg.pool = Some(pool_cfg);

    cfg.create_pool(Some(Runtime::Tokio1), NoTls)
        .map_err(|e| StoreError::connection(format!("create pool: {e}")))
}
