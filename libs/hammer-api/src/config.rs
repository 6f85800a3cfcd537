use std::fmt;
use std::time::Duration;

/// Default pool capacity when pooled mode is requested without a size.
pub const DEFAULT_POOL_SIZE: usize = 5;

/// Default upper bound for establishing a session.
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Login for the target store.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub user: String,
    pub password: String,
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("user", &self.user)
            .field("password", &"***")
            .finish()
    }
}

/// Everything a store backend needs to open a session. Immutable for a run.
///
/// `pool_size = None` selects simple mode (one fresh session per `open`),
/// `Some(n)` selects pooled mode with capacity `n`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectConfig {
    pub host: String,
    pub port: u16,
    pub credentials: Credentials,
    pub database: String,
    pub pool_size: Option<usize>,
    pub connect_timeout: Duration,
}

impl ConnectConfig {
    pub fn is_pooled(&self) -> bool {
        self.pool_size.is_some()
    }

    /// `host:port/database`, for logs.
    pub fn target(&self) -> String {
        format!("{}:{}/{}", self.host, self.port, self.database)
    }
}

impl Default for ConnectConfig {
    fn default() -> Self {
        Self {
            host: "localhost".into(),
            port: 5432,
            credentials: Credentials {
                user: "postgres".into(),
                password: "password".into(),
            },
            database: "dev_db".into(),
            pool_size: None,
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
        }
    }
}
