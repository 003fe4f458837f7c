//! Draw and scheduler counters

use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

/// Point-in-time copy of [`DrawMetrics`]
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct MetricsSnapshot {
    pub manual_draws: u64,
    pub scheduled_draws: u64,
    pub rules_completed: u64,
    pub scheduler_starts: u64,
    pub scheduler_stops: u64,
    pub scheduler_faults: u64,
    pub uptime_ms: u64,
}

impl MetricsSnapshot {
    pub fn total_draws(&self) -> u64 {
        self.manual_draws + self.scheduled_draws
    }
}

pub struct DrawMetrics {
    start_time: Instant,
    manual_draws: AtomicU64,
    scheduled_draws: AtomicU64,
    rules_completed: AtomicU64,
    scheduler_starts: AtomicU64,
    scheduler_stops: AtomicU64,
    scheduler_faults: AtomicU64,
}

impl DrawMetrics {
    pub fn new() -> Self {
        Self {
            start_time: Instant::now(),
            manual_draws: AtomicU64::new(0),
            scheduled_draws: AtomicU64::new(0),
            rules_completed: AtomicU64::new(0),
            scheduler_starts: AtomicU64::new(0),
            scheduler_stops: AtomicU64::new(0),
            scheduler_faults: AtomicU64::new(0),
        }
    }

    pub fn record_draw(&self, scheduled: bool) {
        if scheduled {
            self.scheduled_draws.fetch_add(1, Ordering::Relaxed);
        } else {
            self.manual_draws.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub fn record_rules_completed(&self, count: u64) {
        self.rules_completed.fetch_add(count, Ordering::Relaxed);
    }

    pub fn record_scheduler_start(&self) {
        self.scheduler_starts.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_scheduler_stop(&self) {
        self.scheduler_stops.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_scheduler_fault(&self) {
        self.scheduler_faults.fetch_add(1, Ordering::Relaxed);
    }

    pub fn total_runtime(&self) -> Duration {
        self.start_time.elapsed()
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            manual_draws: self.manual_draws.load(Ordering::Relaxed),
            scheduled_draws: self.scheduled_draws.load(Ordering::Relaxed),
            rules_completed: self.rules_completed.load(Ordering::Relaxed),
            scheduler_starts: self.scheduler_starts.load(Ordering::Relaxed),
            scheduler_stops: self.scheduler_stops.load(Ordering::Relaxed),
            scheduler_faults: self.scheduler_faults.load(Ordering::Relaxed),
            uptime_ms: self.total_runtime().as_millis() as u64,
        }
    }
}

impl Default for DrawMetrics {
    fn default() -> Self {
        Self::new()
    }
}
