//! Kuhul device scheduler
//!
//! Routes inference jobs across cpu, gpu and queued tiers under policy
//! rules, retries queued jobs with a delay hint, degrades to fallback
//! shards on engine failure, and keeps running metrics.

pub mod config;
pub mod error;
pub mod metrics;
pub mod profile;
pub mod scheduler;

pub use config::{PolicyConfig, SchedulerConfig, ShardConfig};
pub use error::{KuhulError, KuhulResult};
pub use metrics::{MetricsSnapshot, SchedulerMetrics};
pub use profile::{DeviceProfile, FixedLoadProbe, LoadProbe, TrackingLoadProbe};
pub use scheduler::{
    Decision, Device, EngineInvoker, ExecutionRecord, HttpEngineInvoker, Job, JobHints, Scheduler,
};
