//! Internal poll statistics
//!
//! Counters about the poller's own operation. Fetches are fire-and-forget, so
//! these are the only place where backlog (fetches still in flight from older
//! cycles) and late completions after shutdown become visible.

use std::sync::atomic::{AtomicI64, AtomicU64, Ordering};

use serde::Serialize;

/// Thread-safe counter using atomic operations
#[derive(Debug, Default)]
pub struct Counter {
    value: AtomicU64,
}

impl Counter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn inc(&self) {
        self.value.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_by(&self, n: u64) {
        self.value.fetch_add(n, Ordering::Relaxed);
    }

    pub fn get(&self) -> u64 {
        self.value.load(Ordering::Relaxed)
    }
}

/// Thread-safe up/down gauge
#[derive(Debug, Default)]
pub struct Gauge {
    value: AtomicI64,
}

impl Gauge {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn inc(&self) {
        self.value.fetch_add(1, Ordering::Relaxed);
    }

    pub fn dec(&self) {
        self.value.fetch_sub(1, Ordering::Relaxed);
    }

    pub fn get(&self) -> i64 {
        self.value.load(Ordering::Relaxed)
    }
}

/// Poller statistics, shared between the scheduler and its fetch tasks
#[derive(Debug, Default)]
pub struct PollStats {
    /// Cycles started
    pub cycles: Counter,
    /// Fetches issued across all cycles
    pub fetches_issued: Counter,
    /// Fetches that ended in a transport or HTTP error
    pub fetch_failures: Counter,
    /// Samples handed to the sink
    pub samples_emitted: Counter,
    /// Completions discarded because shutdown had begun
    pub late_completions: Counter,
    /// Fetches issued but not yet completed
    pub in_flight: Gauge,
}

/// Point-in-time copy of [`PollStats`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct StatsSnapshot {
    pub cycles: u64,
    pub fetches_issued: u64,
    pub fetch_failures: u64,
    pub samples_emitted: u64,
    pub late_completions: u64,
    pub in_flight: i64,
}

impl PollStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            cycles: self.cycles.get(),
            fetches_issued: self.fetches_issued.get(),
            fetch_failures: self.fetch_failures.get(),
            samples_emitted: self.samples_emitted.get(),
            late_completions: self.late_completions.get(),
            in_flight: self.in_flight.get(),
        }
    }
}
