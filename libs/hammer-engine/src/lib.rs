pub mod config;
pub mod counters;
pub mod disrupt;
pub mod error;
pub mod failover;
pub mod harness;
pub mod monitor;
pub mod worker;

pub use config::{FailoverConfig, FileConfig, RunConfig, WorkloadConfig};
pub use counters::{Counters, CountersSnapshot};
pub use disrupt::CommandDisruptor;
pub use error::EngineError;
pub use failover::{FailoverReport, FailoverScenario};
pub use harness::{Harness, HarnessState, RunSummary, StopReason};
pub use monitor::{MonitorSample, RateSampler};
