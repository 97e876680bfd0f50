// ghost-kuhul: Scheduler metrics

use parking_lot::Mutex;
use serde::Serialize;

/// Snapshot of scheduler counters.
#[derive(Debug, Clone, Serialize, Default, PartialEq)]
pub struct MetricsSnapshot {
    pub total: u64,
    pub successful: u64,
    pub failed: u64,
    pub avg_latency_ms: f64,
}

/// Running counters, one mutex per update.
#[derive(Default)]
pub struct SchedulerMetrics {
    inner: Mutex<MetricsSnapshot>,
}

impl SchedulerMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record one completed job. The latency sample feeds an online mean
    /// over successful jobs only.
    pub fn record(&self, success: bool, latency_ms: u64) {
        let mut metrics = self.inner.lock();
        metrics.total += 1;
        if success {
            metrics.successful += 1;
            let n = metrics.successful as f64;
            metrics.avg_latency_ms += (latency_ms as f64 - metrics.avg_latency_ms) / n;
        } else {
            metrics.failed += 1;
        }
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        self.inner.lock().clone()
    }
}
