use std::time::Duration;

use serde::Deserialize;

use hammer_api::ConnectConfig;

use crate::counters::DEFAULT_ERROR_LOG_CAPACITY;

/// Upper bound on writers plus readers in one run.
pub const MAX_TASKS: usize = 10_000;
use crate::error::EngineError;

// ---------------------------------------------------------------------------
// File configuration (TOML). Every field optional: CLI/env fill the gaps.
// ---------------------------------------------------------------------------

/// Root of `hammer.toml`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct FileConfig {
    #[serde(default)]
    pub target: TargetSection,
    #[serde(default)]
    pub run: RunSection,
    #[serde(default)]
    pub workload: WorkloadSection,
    #[serde(default)]
    pub failover: FailoverSection,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct TargetSection {
    /// `postgres` or `memory`.
    pub store: Option<String>,
    pub host: Option<String>,
    pub port: Option<u16>,
    pub user: Option<String>,
    pub password: Option<String>,
    pub database: Option<String>,
    /// Enables pooled mode with the default capacity.
    pub pooled: Option<bool>,
    /// Enables pooled mode with this capacity.
    pub pool_size: Option<usize>,
    pub connect_timeout_secs: Option<u64>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RunSection {
    pub duration_secs: Option<u64>,
    pub writers: Option<usize>,
    pub readers: Option<usize>,
    pub sample_interval_secs: Option<u64>,
    pub error_log_capacity: Option<usize>,
    pub shutdown_grace_secs: Option<u64>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct WorkloadSection {
    pub payload_len: Option<usize>,
    pub write_pace_ms: Option<u64>,
    pub read_pace_ms: Option<u64>,
    pub read_limit: Option<usize>,
    pub error_backoff_ms: Option<u64>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct FailoverSection {
    /// Program and arguments that kill the primary node.
    pub disrupt_command: Option<Vec<String>>,
    pub reset_users: Option<bool>,
}

impl FileConfig {
    /// Load configuration from a TOML file.
    pub fn load(path: &str) -> Result<Self, EngineError> {
        let content =
            std::fs::read_to_string(path).map_err(|e| EngineError::Config(format!("{path}: {e}")))?;
        Self::parse(&content).map_err(|e| match e {
            EngineError::Config(msg) => EngineError::Config(format!("{path}: {msg}")),
            other => other,
        })
    }

    /// Parse configuration from a TOML string.
    pub fn parse(toml_str: &str) -> Result<Self, EngineError> {
        toml::from_str(toml_str).map_err(|e| EngineError::Config(e.to_string()))
    }
}

// ---------------------------------------------------------------------------
// Effective configuration
// ---------------------------------------------------------------------------

/// Per-iteration timing and shape of the synthetic workload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkloadConfig {
    /// Length of the random alphanumeric payload.
    pub payload_len: usize,
    /// Pause after a successful write.
    pub write_pace: Duration,
    /// Pause after a successful read.
    pub read_pace: Duration,
    /// Rows fetched by each read.
    pub read_limit: usize,
    /// Pause after any failed iteration.
    pub error_backoff: Duration,
}

impl Default for WorkloadConfig {
    fn default() -> Self {
        Self {
            payload_len: 20,
            write_pace: Duration::from_millis(100),
            read_pace: Duration::from_millis(200),
            read_limit: 10,
            error_backoff: Duration::from_secs(1),
        }
    }
}

impl WorkloadConfig {
    /// Apply `[workload]` overrides.
    pub fn merged(mut self, section: &WorkloadSection) -> Self {
        if let Some(v) = section.payload_len {
            self.payload_len = v;
        }
        if let Some(v) = section.write_pace_ms {
            self.write_pace = Duration::from_millis(v);
        }
        if let Some(v) = section.read_pace_ms {
            self.read_pace = Duration::from_millis(v);
        }
        if let Some(v) = section.read_limit {
            self.read_limit = v;
        }
        if let Some(v) = section.error_backoff_ms {
            self.error_backoff = Duration::from_millis(v);
        }
        self
    }
}

/// Settings for one load run. Immutable once the harness owns it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunConfig {
    pub connect: ConnectConfig,
    pub writers: usize,
    pub readers: usize,
    pub sample_interval: Duration,
    pub duration: Duration,
    pub workload: WorkloadConfig,
    pub error_log_capacity: usize,
    /// How long draining waits for tasks before aborting them.
    pub shutdown_grace: Duration,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            connect: ConnectConfig::default(),
            writers: 3,
            readers: 3,
            sample_interval: Duration::from_secs(2),
            duration: Duration::from_secs(300),
            workload: WorkloadConfig::default(),
            error_log_capacity: DEFAULT_ERROR_LOG_CAPACITY,
            shutdown_grace: Duration::from_secs(15),
        }
    }
}

impl RunConfig {
    pub fn validate(&self) -> Result<(), EngineError> {
        if self.writers == 0 && self.readers == 0 {
            return Err(EngineError::Config(
                "at least one writer or reader is required".into(),
            ));
        }
        match self.writers.checked_add(self.readers) {
            Some(n) if n <= MAX_TASKS => {}
            _ => {
                return Err(EngineError::Config(format!(
                    "too many tasks: {} writers + {} readers (max {MAX_TASKS})",
                    self.writers, self.readers
                )));
            }
        }
        if self.sample_interval.is_zero() {
            return Err(EngineError::Config("sample interval must be positive".into()));
        }
        if self.error_log_capacity == 0 {
            return Err(EngineError::Config("error log capacity must be positive".into()));
        }
        if self.connect.pool_size == Some(0) {
            return Err(EngineError::Config("pool size must be positive".into()));
        }
        if self.workload.read_limit == 0 {
            return Err(EngineError::Config("read limit must be positive".into()));
        }
        Ok(())
    }
}

/// Settings for the failover probe.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FailoverConfig {
    /// Empty the `users` table before seeding, so reruns see exactly the seed rows.
    pub reset_users: bool,
}

impl Default for FailoverConfig {
    fn default() -> Self {
        Self { reset_users: true }
    }
}
