use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::counters::Counters;
use crate::worker::pause;

/// Error-log entries shown per report.
pub const RECENT_ERRORS_SHOWN: usize = 3;

/// Per-second rates derived from two consecutive samples.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Rates {
    pub writes_per_sec: f64,
    pub reads_per_sec: f64,
}

/// Turns cumulative counts into rates against its own baseline.
///
/// Pure: the caller supplies the time of each sample, so the arithmetic is
/// independent of any clock.
#[derive(Debug, Clone, Default)]
pub struct RateSampler {
    last_writes: u64,
    last_reads: u64,
    last_at: Duration,
}

impl RateSampler {
    pub fn new() -> Self {
        Self::default()
    }

    /// `at` is the time since the run started. The baseline moves to this sample.
    pub fn sample(&mut self, at: Duration, writes: u64, reads: u64) -> Rates {
        let span = at.saturating_sub(self.last_at).as_secs_f64();
        let per_sec = |delta: u64| if span > 0.0 { delta as f64 / span } else { 0.0 };
        let rates = Rates {
            writes_per_sec: per_sec(writes.saturating_sub(self.last_writes)),
            reads_per_sec: per_sec(reads.saturating_sub(self.last_reads)),
        };
        self.last_writes = writes;
        self.last_reads = reads;
        self.last_at = at;
        rates
    }
}

/// One monitor report.
#[derive(Debug, Clone, PartialEq)]
pub struct MonitorSample {
    pub elapsed: Duration,
    pub rates: Rates,
    pub total_writes: u64,
    pub total_reads: u64,
    pub recent_errors: Vec<String>,
}

impl fmt::Display for MonitorSample {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Elapsed: {:.1}s", self.elapsed.as_secs_f64())?;
        writeln!(f, "Writes/sec: {:.1}", self.rates.writes_per_sec)?;
        writeln!(f, "Reads/sec: {:.1}", self.rates.reads_per_sec)?;
        writeln!(f, "Total writes: {}", self.total_writes)?;
        write!(f, "Total reads: {}", self.total_reads)?;
        if !self.recent_errors.is_empty() {
            write!(f, "\n\nRecent errors:")?;
            for e in &self.recent_errors {
                write!(f, "\n{e}")?;
            }
        }
        Ok(())
    }
}

/// Print a report every `interval` until the stop signal.
///
/// Only reads the counters. Returns the last sample taken, if any.
pub async fn monitor_task(
    counters: Arc<Counters>,
    interval: Duration,
    token: CancellationToken,
) -> Option<MonitorSample> {
    let start = Instant::now();
    let mut sampler = RateSampler::new();
    let mut last = None;

    while pause(&token, interval).await {
        let snap = counters.snapshot();
        let elapsed = start.elapsed();
        let sample = MonitorSample {
            elapsed,
            rates: sampler.sample(elapsed, snap.writes, snap.reads),
            total_writes: snap.writes,
            total_reads: snap.reads,
            recent_errors: counters.recent_errors(RECENT_ERRORS_SHOWN),
        };
        println!("\n{sample}");
        tracing::debug!(
            writes = snap.writes,
            reads = snap.reads,
            errors = snap.error_total,
            "monitor sample"
        );
        last = Some(sample);
    }

    last
}
