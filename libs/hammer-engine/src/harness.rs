use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use hammer_api::ConnectionFactory;

use crate::config::{MAX_TASKS, RunConfig};
use crate::counters::Counters;
use crate::error::EngineError;
use crate::monitor::{MonitorSample, RECENT_ERRORS_SHOWN, monitor_task};
use crate::worker::{WorkerContext, reader_task, writer_task};

/// Lifecycle of one run.
///
/// `Idle -> SchemaReady -> Running -> Draining -> Stopped`. A failed schema
/// setup goes straight to `Stopped`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HarnessState {
    Idle,
    SchemaReady,
    Running,
    Draining,
    Stopped,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    /// The configured run duration elapsed.
    Elapsed,
    /// The stop token was cancelled from outside (operator interrupt).
    Interrupted,
}

/// What is left of a run once every task has exited. Not persisted.
#[derive(Debug, Clone)]
pub struct RunSummary {
    pub reason: StopReason,
    pub elapsed: Duration,
    pub writes: u64,
    pub reads: u64,
    pub error_total: u64,
    pub recent_errors: Vec<String>,
    /// Tasks that exited on their own after the stop signal.
    pub tasks_joined: usize,
    /// Tasks still running after the grace period.
    pub tasks_aborted: usize,
    pub last_sample: Option<MonitorSample>,
}

/// Per-task join handle.
struct TaskSlot {
    name: String,
    handle: JoinHandle<()>,
}

struct Spawned {
    workers: Vec<TaskSlot>,
    monitor: JoinHandle<Option<MonitorSample>>,
    started: Instant,
}

/// Owns a run: schema setup, task fan-out, run timer, shutdown and join.
pub struct Harness {
    config: RunConfig,
    factory: Arc<dyn ConnectionFactory>,
    counters: Arc<Counters>,
    token: CancellationToken,
    state: HarnessState,
    spawned: Option<Spawned>,
    reason: Option<StopReason>,
}

impl std::fmt::Debug for Harness {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Harness")
            .field("state", &self.state)
            .field("config", &self.config)
            .finish()
    }
}

impl Harness {
    /// `token` is the run's stop signal; cancelling it from outside
    /// interrupts the run.
    pub fn new(config: RunConfig, factory: Arc<dyn ConnectionFactory>, token: CancellationToken) -> Self {
        let counters = Arc::new(Counters::new(config.error_log_capacity));
        Self {
            config,
            factory,
            counters,
            token,
            state: HarnessState::Idle,
            spawned: None,
            reason: None,
        }
    }

    pub fn state(&self) -> HarnessState {
        self.state
    }

    pub fn counters(&self) -> &Arc<Counters> {
        &self.counters
    }

    fn expect(&self, operation: &'static str, state: HarnessState) -> Result<(), EngineError> {
        if self.state != state {
            return Err(EngineError::InvalidState { operation, state: self.state });
        }
        Ok(())
    }

    fn transition(&mut self, to: HarnessState) {
        tracing::info!(from = ?self.state, to = ?to, "harness state");
        self.state = to;
    }

    /// `Idle -> SchemaReady`: create `test_records` if absent. No retry; a
    /// failure stops the harness.
    pub async fn prepare_schema(&mut self) -> Result<(), EngineError> {
        self.expect("prepare_schema", HarnessState::Idle)?;

        let result = async {
            let mut conn = self.factory.open().await?;
            conn.create_records_table()
                .await
                .map_err(|e| e.with_context("create test_records"))
        }
        .await;

        match result {
            Ok(()) => {
                tracing::info!(store = %self.factory.describe(), "schema ready");
                self.transition(HarnessState::SchemaReady);
                Ok(())
            }
            Err(e) => {
                tracing::error!(store = %self.factory.describe(), error = %e, "schema setup failed");
                self.transition(HarnessState::Stopped);
                Err(EngineError::Schema(e))
            }
        }
    }

    /// `SchemaReady -> Running`: spawn writers, readers and the monitor.
    pub fn start(&mut self) -> Result<(), EngineError> {
        self.expect("start", HarnessState::SchemaReady)?;

        let tasks = match self.config.writers.checked_add(self.config.readers) {
            Some(0) => return Err(EngineError::Spawn("no writer or reader tasks configured".into())),
            Some(n) if n <= MAX_TASKS => n,
            _ => return Err(EngineError::Spawn(format!("more than {MAX_TASKS} tasks requested"))),
        };
        tokio::runtime::Handle::try_current().map_err(|e| EngineError::Spawn(e.to_string()))?;

        let ctx = WorkerContext {
            factory: self.factory.clone(),
            counters: self.counters.clone(),
            workload: self.config.workload.clone(),
            token: self.token.clone(),
        };

        let mut workers = Vec::with_capacity(tasks);
        for i in 0..self.config.writers {
            let name = format!("writer_{i}");
            let handle = tokio::spawn(writer_task(name.clone(), ctx.clone()));
            workers.push(TaskSlot { name, handle });
        }
        for i in 0..self.config.readers {
            let name = format!("reader_{i}");
            let handle = tokio::spawn(reader_task(name.clone(), ctx.clone()));
            workers.push(TaskSlot { name, handle });
        }
        let monitor = tokio::spawn(monitor_task(
            self.counters.clone(),
            self.config.sample_interval,
            self.token.clone(),
        ));

        tracing::info!(
            writers = self.config.writers,
            readers = self.config.readers,
            sample_interval_s = self.config.sample_interval.as_secs_f64(),
            "tasks spawned"
        );

        self.spawned = Some(Spawned {
            workers,
            monitor,
            started: Instant::now(),
        });
        self.transition(HarnessState::Running);
        Ok(())
    }

    /// `Running -> Draining`: wait for the run duration or an external
    /// cancel, then raise the stop signal.
    pub async fn wait(&mut self) -> Result<StopReason, EngineError> {
        self.expect("wait", HarnessState::Running)?;

        let reason = tokio::select! {
            _ = tokio::time::sleep(self.config.duration) => StopReason::Elapsed,
            _ = self.token.cancelled() => StopReason::Interrupted,
        };
        tracing::info!(?reason, "stopping run");

        self.token.cancel();
        self.reason = Some(reason);
        self.transition(HarnessState::Draining);
        Ok(reason)
    }

    /// `Draining -> Stopped`: join every task. Tasks that do not exit within
    /// the grace period are aborted.
    pub async fn drain(&mut self) -> Result<RunSummary, EngineError> {
        self.expect("drain", HarnessState::Draining)?;
        let spawned = self.spawned.take().ok_or(EngineError::InvalidState {
            operation: "drain",
            state: self.state,
        })?;

        let deadline = Instant::now() + self.config.shutdown_grace;
        let mut joined = 0;
        let mut aborted = 0;

        for mut slot in spawned.workers {
            match tokio::time::timeout_at(deadline, &mut slot.handle).await {
                Ok(Ok(())) => joined += 1,
                Ok(Err(e)) => {
                    tracing::error!(task = %slot.name, error = %e, "task failed");
                    joined += 1;
                }
                Err(_) => {
                    tracing::warn!(task = %slot.name, "task ignored stop signal, aborting");
                    slot.handle.abort();
                    let _ = slot.handle.await;
                    aborted += 1;
                }
            }
        }

        let mut monitor = spawned.monitor;
        let last_sample = match tokio::time::timeout_at(deadline, &mut monitor).await {
            Ok(Ok(sample)) => {
                joined += 1;
                sample
            }
            Ok(Err(e)) => {
                tracing::error!(task = "monitor", error = %e, "task failed");
                joined += 1;
                None
            }
            Err(_) => {
                tracing::warn!(task = "monitor", "task ignored stop signal, aborting");
                monitor.abort();
                let _ = monitor.await;
                aborted += 1;
                None
            }
        };

        let snap = self.counters.snapshot();
        let summary = RunSummary {
            reason: self.reason.unwrap_or(StopReason::Interrupted),
            elapsed: spawned.started.elapsed(),
            writes: snap.writes,
            reads: snap.reads,
            error_total: snap.error_total,
            recent_errors: self.counters.recent_errors(RECENT_ERRORS_SHOWN),
            tasks_joined: joined,
            tasks_aborted: aborted,
            last_sample,
        };
        tracing::info!(
            writes = summary.writes,
            reads = summary.reads,
            errors = summary.error_total,
            joined = summary.tasks_joined,
            aborted = summary.tasks_aborted,
            "run complete"
        );

        self.transition(HarnessState::Stopped);
        Ok(summary)
    }

    /// Whole lifecycle: schema, spawn, wait, drain.
    pub async fn run(mut self) -> Result<RunSummary, EngineError> {
        self.prepare_schema().await?;
        self.start()?;
        self.wait().await?;
        self.drain().await
    }
}
