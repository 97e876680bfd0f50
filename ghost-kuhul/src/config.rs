// ghost-kuhul: Shard and policy configuration

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;

/// One configured execution target for inference jobs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShardConfig {
    /// Engine tag, e.g. "cpu-gguf" or "remote-http".
    pub engine: String,
    #[serde(default)]
    pub backend: Option<String>,
    #[serde(default)]
    pub endpoint: Option<String>,
    #[serde(default)]
    pub args: Map<String, Value>,
    /// Shard tried next on engine failure.
    #[serde(default)]
    pub fallback: Option<String>,
}

impl ShardConfig {
    /// Engines runnable without a GPU.
    pub fn is_cpu_compatible(&self) -> bool {
        self.engine.starts_with("cpu") || self.engine == "remote-http"
    }

    pub fn is_remote(&self) -> bool {
        self.engine == "remote-http"
    }
}

/// Routing policy thresholds, both in [0, 1].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PolicyConfig {
    pub cpu_threshold_load: f64,
    pub prefer_gpu_for_priority: f64,
}

impl Default for PolicyConfig {
    fn default() -> Self {
        Self {
            cpu_threshold_load: 0.75,
            prefer_gpu_for_priority: 0.7,
        }
    }
}

/// Scheduler configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulerConfig {
    #[serde(default)]
    pub shards: BTreeMap<String, ShardConfig>,
    #[serde(default)]
    pub policies: BTreeMap<String, PolicyConfig>,
    /// Policy applied when the job names none.
    #[serde(default = "default_policy_name")]
    pub default_policy: String,
    /// Delay hint for queued jobs.
    #[serde(default = "default_queue_delay_ms")]
    pub queue_delay_ms: u64,
    /// Queued re-entries before schedule-exhausted.
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    /// Deadline for one engine call.
    #[serde(default = "default_engine_deadline_ms")]
    pub engine_deadline_ms: u64,
    /// Integrated-GPU load ceiling for rule 3.
    #[serde(default = "default_integrated_gpu_ceiling")]
    pub integrated_gpu_load_ceiling: f64,
}

fn default_policy_name() -> String {
    "balanced".to_string()
}

fn default_queue_delay_ms() -> u64 {
    500
}

fn default_max_retries() -> u32 {
    8
}

fn default_engine_deadline_ms() -> u64 {
    30_000
}

fn default_integrated_gpu_ceiling() -> f64 {
    0.8
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        let mut policies = BTreeMap::new();
        policies.insert(default_policy_name(), PolicyConfig::default());
        Self {
            shards: BTreeMap::new(),
            policies,
            default_policy: default_policy_name(),
            queue_delay_ms: default_queue_delay_ms(),
            max_retries: default_max_retries(),
            engine_deadline_ms: default_engine_deadline_ms(),
            integrated_gpu_load_ceiling: default_integrated_gpu_ceiling(),
        }
    }
}

impl SchedulerConfig {
    pub fn policy(&self, name: Option<&str>) -> PolicyConfig {
        let key = name.unwrap_or(&self.default_policy);
        self.policies.get(key).cloned().unwrap_or_default()
    }
}
