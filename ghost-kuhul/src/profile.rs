// ghost-kuhul: Device profile and load probes

use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

/// Declared hardware profile of the host.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeviceProfile {
    pub hostname: String,
    pub cores: usize,
    pub dedicated_gpu: bool,
    pub integrated_gpu: bool,
}

impl DeviceProfile {
    /// Detect the local machine. GPU flags default to absent; the host
    /// config may override them.
    pub fn detect() -> Self {
        let hostname = hostname::get()
            .ok()
            .and_then(|h| h.into_string().ok())
            .unwrap_or_else(|| "unknown".to_string());
        Self {
            hostname,
            cores: num_cpus::get(),
            dedicated_gpu: false,
            integrated_gpu: false,
        }
    }

    pub fn with_gpus(mut self, dedicated: bool, integrated: bool) -> Self {
        self.dedicated_gpu = dedicated;
        self.integrated_gpu = integrated;
        self
    }
}

/// Source of current load readings. Injectable so routing decisions are
/// deterministic under test. The scheduler notifies job start and end so
/// self-tracking probes can derive load from their own activity.
pub trait LoadProbe: Send + Sync {
    fn cpu_load(&self) -> f64;
    fn gpu_load(&self) -> f64;
    fn job_started(&self) {}
    fn job_finished(&self) {}
}

/// Fixed readings, for tests and static configuration.
#[derive(Debug, Clone)]
pub struct FixedLoadProbe {
    pub cpu: f64,
    pub gpu: f64,
}

impl LoadProbe for FixedLoadProbe {
    fn cpu_load(&self) -> f64 {
        self.cpu
    }

    fn gpu_load(&self) -> f64 {
        self.gpu
    }
}

/// Derives cpu load from the scheduler's own active-job count relative to
/// core count.
pub struct TrackingLoadProbe {
    active: Arc<AtomicUsize>,
    cores: usize,
}

impl TrackingLoadProbe {
    pub fn new(cores: usize) -> Self {
        Self {
            active: Arc::new(AtomicUsize::new(0)),
            cores: cores.max(1),
        }
    }

    pub fn active_jobs(&self) -> usize {
        self.active.load(Ordering::SeqCst)
    }
}

impl LoadProbe for TrackingLoadProbe {
    fn cpu_load(&self) -> f64 {
        self.active.load(Ordering::SeqCst) as f64 / self.cores as f64
    }

    fn gpu_load(&self) -> f64 {
        0.0
    }

    fn job_started(&self) {
        self.active.fetch_add(1, Ordering::SeqCst);
    }

    fn job_finished(&self) {
        self.active.fetch_sub(1, Ordering::SeqCst);
    }
}
