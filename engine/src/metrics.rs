//! Process metrics shared by every command of a morphline.
//!
//! Metric names are `"<scope>.<metric>"`, e.g. `addValues.numRecords` or
//! `morphline.processTime`. Handles are `Arc`s so a command resolves its
//! counters once at build time and increments them lock-free afterwards.

use serde::Serialize;
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::Duration;

pub const NUM_RECORDS: &str = "numRecords";
pub const NUM_FAILURES: &str = "numFailures";
pub const PROCESS_TIME: &str = "processTime";

/// Monotonic counter.
#[derive(Debug, Default)]
pub struct Counter(AtomicU64);

impl Counter {
    pub fn inc(&self) {
        self.add(1);
    }

    pub fn add(&self, n: u64) {
        self.0.fetch_add(n, Ordering::Relaxed);
    }

    pub fn get(&self) -> u64 {
        self.0.load(Ordering::Relaxed)
    }
}

/// Call count plus accumulated duration.
#[derive(Debug, Default)]
pub struct Timer {
    count: AtomicU64,
    total_nanos: AtomicU64,
}

impl Timer {
    pub fn record(&self, elapsed: Duration) {
        self.count.fetch_add(1, Ordering::Relaxed);
        let nanos = u64::try_from(elapsed.as_nanos()).unwrap_or(u64::MAX);
        self.total_nanos.fetch_add(nanos, Ordering::Relaxed);
    }

    pub fn count(&self) -> u64 {
        self.count.load(Ordering::Relaxed)
    }

    pub fn total(&self) -> Duration {
        Duration::from_nanos(self.total_nanos.load(Ordering::Relaxed))
    }
}

/// Point-in-time copy of every metric.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct MetricsSnapshot {
    pub counters: BTreeMap<String, u64>,
    pub timers: BTreeMap<String, TimerSnapshot>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct TimerSnapshot {
    pub count: u64,
    pub total_nanos: u64,
}

/// Thread-safe metric registry.
#[derive(Debug, Default)]
pub struct MetricsRegistry {
    counters: RwLock<HashMap<String, Arc<Counter>>>,
    timers: RwLock<HashMap<String, Arc<Timer>>>,
}

fn read<T>(lock: &RwLock<T>) -> RwLockReadGuard<'_, T> {
    match lock.read() {
        Ok(guard) => guard,
        Err(poisoned) => {
            tracing::warn!("metrics lock was poisoned, recovering");
            poisoned.into_inner()
        }
    }
}

fn write<T>(lock: &RwLock<T>) -> RwLockWriteGuard<'_, T> {
    match lock.write() {
        Ok(guard) => guard,
        Err(poisoned) => {
            tracing::warn!("metrics lock was poisoned, recovering");
            poisoned.into_inner()
        }
    }
}

impl MetricsRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// `"<scope>.<metric>"`.
    pub fn name(scope: &str, metric: &str) -> String {
        format!("{}.{}", scope, metric)
    }

    /// Get or create a counter.
    pub fn counter(&self, name: &str) -> Arc<Counter> {
        if let Some(c) = read(&self.counters).get(name) {
            return Arc::clone(c);
        }
        Arc::clone(write(&self.counters).entry(name.to_string()).or_default())
    }

    /// Get or create a timer.
    pub fn timer(&self, name: &str) -> Arc<Timer> {
        if let Some(t) = read(&self.timers).get(name) {
            return Arc::clone(t);
        }
        Arc::clone(write(&self.timers).entry(name.to_string()).or_default())
    }

    /// Current value of a counter, `0` if it was never created.
    pub fn counter_value(&self, name: &str) -> u64 {
        read(&self.counters).get(name).map(|c| c.get()).unwrap_or(0)
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        let counters = read(&self.counters)
            .iter()
            .map(|(k, c)| (k.clone(), c.get()))
            .collect();
        let timers = read(&self.timers)
            .iter()
            .map(|(k, t)| {
                (
                    k.clone(),
                    TimerSnapshot {
                        count: t.count(),
                        total_nanos: u64::try_from(t.total().as_nanos()).unwrap_or(u64::MAX),
                    },
                )
            })
            .collect();
        MetricsSnapshot { counters, timers }
    }
}

/// Per-command handles, resolved once at build time.
#[derive(Debug, Clone)]
pub struct CommandMeter {
    num_records: Arc<Counter>,
}

impl CommandMeter {
    pub fn new(metrics: &MetricsRegistry, scope: &str) -> Self {
        Self {
            num_records: metrics.counter(&MetricsRegistry::name(scope, NUM_RECORDS)),
        }
    }

    pub fn mark_record(&self) {
        self.num_records.inc();
    }
}
