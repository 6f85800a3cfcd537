use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard};

pub const DEFAULT_ERROR_LOG_CAPACITY: usize = 100;

/// Shared state of one run: throughput counters and a bounded error log.
///
/// Owned by the harness and handed to every task as `Arc<Counters>`.
/// Counts only ever grow. The log keeps the most recent `capacity` entries
/// (oldest evicted first); `error_total` keeps counting past evictions.
#[derive(Debug)]
pub struct Counters {
    writes: AtomicU64,
    reads: AtomicU64,
    error_total: AtomicU64,
    errors: Mutex<VecDeque<String>>,
    capacity: usize,
}

/// Point-in-time copy of the counts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CountersSnapshot {
    pub writes: u64,
    pub reads: u64,
    pub error_total: u64,
}

impl Default for Counters {
    fn default() -> Self {
        Self::new(DEFAULT_ERROR_LOG_CAPACITY)
    }
}

impl Counters {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            writes: AtomicU64::new(0),
            reads: AtomicU64::new(0),
            error_total: AtomicU64::new(0),
            errors: Mutex::new(VecDeque::with_capacity(capacity.min(1024))),
            capacity,
        }
    }

    fn log(&self) -> MutexGuard<'_, VecDeque<String>> {
        match self.errors.lock() {
            Ok(g) => g,
            Err(poisoned) => {
                tracing::warn!("error log lock was poisoned, recovering");
                poisoned.into_inner()
            }
        }
    }

    pub fn record_write(&self) {
        self.writes.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_read(&self) {
        self.reads.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_error(&self, message: String) {
        let mut log = self.log();
        while log.len() >= self.capacity {
            log.pop_front();
        }
        log.push_back(message);
        self.error_total.fetch_add(1, Ordering::Relaxed);
    }

    pub fn writes(&self) -> u64 {
        self.writes.load(Ordering::Relaxed)
    }

    pub fn reads(&self) -> u64 {
        self.reads.load(Ordering::Relaxed)
    }

    /// Every error ever recorded, including evicted ones.
    pub fn error_total(&self) -> u64 {
        self.error_total.load(Ordering::Relaxed)
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Retained log, oldest first.
    pub fn errors(&self) -> Vec<String> {
        self.log().iter().cloned().collect()
    }

    /// The last `n` retained entries, oldest first.
    pub fn recent_errors(&self, n: usize) -> Vec<String> {
        let log = self.log();
        let skip = log.len().saturating_sub(n);
        log.iter().skip(skip).cloned().collect()
    }

    pub fn snapshot(&self) -> CountersSnapshot {
        CountersSnapshot {
            writes: self.writes(),
            reads: self.reads(),
            error_total: self.error_total(),
        }
    }
}
