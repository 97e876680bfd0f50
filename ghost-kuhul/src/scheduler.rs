// ghost-kuhul: Policy routing and job execution

use crate::config::{SchedulerConfig, ShardConfig};
use crate::error::{KuhulError, KuhulResult};
use crate::metrics::{MetricsSnapshot, SchedulerMetrics};
use crate::profile::{DeviceProfile, LoadProbe};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// An inference job admitted to the scheduler.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Job {
    pub fingerprint: String,
    /// Priority in [0, 1].
    pub priority: f64,
    /// Requested shard id.
    pub shard: String,
    #[serde(default)]
    pub hints: JobHints,
    /// Payload forwarded to the engine.
    #[serde(default)]
    pub payload: Value,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct JobHints {
    #[serde(default)]
    pub quant: Option<String>,
    #[serde(default)]
    pub max_tokens: Option<u32>,
    #[serde(default)]
    pub temperature: Option<f64>,
}

/// Decided execution tier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Device {
    Cpu,
    DedicatedGpu,
    IntegratedGpu,
    Queued,
}

impl fmt::Display for Device {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Device::Cpu => "cpu",
            Device::DedicatedGpu => "dedicated-gpu",
            Device::IntegratedGpu => "integrated-gpu",
            Device::Queued => "queued",
        };
        f.write_str(s)
    }
}

/// Scheduling decision for one routing pass.
#[derive(Debug, Clone, Serialize)]
pub struct Decision {
    pub device: Device,
    pub engine: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub endpoint: Option<String>,
    pub args: Map<String, Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub delay_ms: Option<u64>,
}

/// Result of running a job to completion.
#[derive(Debug, Clone, Serialize)]
pub struct ExecutionRecord {
    pub device: Device,
    pub engine: String,
    pub shard: String,
    pub latency_ms: u64,
    pub attempts: u32,
    pub result: Value,
}

/// Invokes the engine a decision resolved to.
#[async_trait]
pub trait EngineInvoker: Send + Sync {
    async fn invoke(&self, shard: &ShardConfig, job: &Job, deadline: Duration)
        -> KuhulResult<Value>;
}

/// Default invoker: POSTs to remote-http shards; local engines produce a
/// completion marker unless the host installs a real invoker.
pub struct HttpEngineInvoker {
    client: reqwest::Client,
}

impl HttpEngineInvoker {
    pub fn new() -> Self {
        Self {
            client: reqwest::Client::new(),
        }
    }
}

impl Default for HttpEngineInvoker {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl EngineInvoker for HttpEngineInvoker {
    async fn invoke(
        &self,
        shard: &ShardConfig,
        job: &Job,
        deadline: Duration,
    ) -> KuhulResult<Value> {
        if shard.is_remote() {
            let endpoint = shard
                .endpoint
                .as_deref()
                .ok_or_else(|| KuhulError::EngineError("remote shard has no endpoint".into()))?;
            let response = self
                .client
                .post(endpoint)
                .timeout(deadline)
                .json(&json!({
                    "fingerprint": job.fingerprint,
                    "payload": job.payload,
                    "hints": job.hints,
                }))
                .send()
                .await
                .map_err(|e| {
                    if e.is_timeout() {
                        KuhulError::DeadlineExceeded(format!("engine at {}", endpoint))
                    } else {
                        KuhulError::EngineError(e.to_string())
                    }
                })?;
            if !response.status().is_success() {
                return Err(KuhulError::EngineError(format!(
                    "engine at {} returned {}",
                    endpoint,
                    response.status()
                )));
            }
            return response
                .json::<Value>()
                .await
                .map_err(|e| KuhulError::EngineError(e.to_string()));
        }

        // Local engine without an installed invoker: acknowledge with a
        // marker the caller can distinguish from model output.
        Ok(json!({
            "engine": shard.engine,
            "fingerprint": job.fingerprint,
            "completed": true,
        }))
    }
}

/// The scheduler.
pub struct Scheduler {
    config: SchedulerConfig,
    profile: DeviceProfile,
    probe: Arc<dyn LoadProbe>,
    invoker: Arc<dyn EngineInvoker>,
    metrics: SchedulerMetrics,
}

impl Scheduler {
    pub fn new(
        config: SchedulerConfig,
        profile: DeviceProfile,
        probe: Arc<dyn LoadProbe>,
        invoker: Arc<dyn EngineInvoker>,
    ) -> Self {
        Self {
            config,
            profile,
            probe,
            invoker,
            metrics: SchedulerMetrics::new(),
        }
    }

    pub fn profile(&self) -> &DeviceProfile {
        &self.profile
    }

    pub fn config(&self) -> &SchedulerConfig {
        &self.config
    }

    pub fn current_load(&self) -> (f64, f64) {
        (self.probe.cpu_load(), self.probe.gpu_load())
    }

    pub fn metrics(&self) -> MetricsSnapshot {
        self.metrics.snapshot()
    }

    /// One routing pass: policy rules in order, first match wins.
    pub fn schedule(&self, job: &Job, policy_name: Option<&str>) -> KuhulResult<Decision> {
        let shard = self
            .config
            .shards
            .get(&job.shard)
            .ok_or_else(|| KuhulError::ShardNotFound(job.shard.clone()))?;
        let policy = self.config.policy(policy_name);
        let cpu_load = self.probe.cpu_load();
        let gpu_load = self.probe.gpu_load();

        let device = if shard.is_cpu_compatible() && cpu_load < policy.cpu_threshold_load {
            Device::Cpu
        } else if self.profile.dedicated_gpu && job.priority > policy.prefer_gpu_for_priority {
            Device::DedicatedGpu
        } else if self.profile.integrated_gpu
            && gpu_load < self.config.integrated_gpu_load_ceiling
        {
            Device::IntegratedGpu
        } else {
            Device::Queued
        };

        debug!(
            fingerprint = %job.fingerprint,
            shard = %job.shard,
            device = %device,
            cpu_load,
            "routing decision"
        );

        Ok(Decision {
            device,
            engine: shard.engine.clone(),
            endpoint: shard.endpoint.clone(),
            args: shard.args.clone(),
            delay_ms: (device == Device::Queued).then_some(self.config.queue_delay_ms),
        })
    }

    /// Schedule and execute to completion: queued decisions sleep the
    /// delay hint and re-enter; engine failures degrade to the shard's
    /// fallback with reduced priority. A caller deadline shortens the
    /// per-engine deadline.
    pub async fn run(&self, job: Job, policy_name: Option<&str>) -> KuhulResult<ExecutionRecord> {
        self.run_with_deadline(job, policy_name, None).await
    }

    pub async fn run_with_deadline(
        &self,
        job: Job,
        policy_name: Option<&str>,
        caller_deadline: Option<Duration>,
    ) -> KuhulResult<ExecutionRecord> {
        let started = Instant::now();
        let mut job = job;
        let mut retries = 0u32;
        let mut attempts = 0u32;
        let mut seen_shards: HashSet<String> = HashSet::new();
        seen_shards.insert(job.shard.clone());

        loop {
            let decision = self.schedule(&job, policy_name)?;

            if decision.device == Device::Queued {
                retries += 1;
                if retries > self.config.max_retries {
                    self.metrics.record(false, elapsed_ms(started));
                    return Err(KuhulError::ScheduleExhausted { retries: retries - 1 });
                }
                let delay = decision.delay_ms.unwrap_or(self.config.queue_delay_ms);
                debug!(fingerprint = %job.fingerprint, retry = retries, delay, "job queued");
                tokio::time::sleep(Duration::from_millis(delay)).await;
                continue;
            }

            attempts += 1;
            let shard = self
                .config
                .shards
                .get(&job.shard)
                .ok_or_else(|| KuhulError::ShardNotFound(job.shard.clone()))?;
            let policy_deadline = Duration::from_millis(self.config.engine_deadline_ms);
            let deadline = match caller_deadline {
                Some(caller) => caller.min(policy_deadline),
                None => policy_deadline,
            };

            self.probe.job_started();
            let outcome = self.invoker.invoke(shard, &job, deadline).await;
            self.probe.job_finished();

            match outcome {
                Ok(result) => {
                    let latency_ms = elapsed_ms(started);
                    self.metrics.record(true, latency_ms);
                    info!(
                        fingerprint = %job.fingerprint,
                        device = %decision.device,
                        engine = %decision.engine,
                        latency_ms,
                        "job completed"
                    );
                    return Ok(ExecutionRecord {
                        device: decision.device,
                        engine: decision.engine,
                        shard: job.shard,
                        latency_ms,
                        attempts,
                        result,
                    });
                }
                Err(e) => {
                    let fallback = shard.fallback.clone();
                    match fallback {
                        Some(next) if !seen_shards.contains(&next) => {
                            warn!(
                                fingerprint = %job.fingerprint,
                                shard = %job.shard,
                                fallback = %next,
                                error = %e,
                                "engine failed, degrading to fallback shard"
                            );
                            seen_shards.insert(next.clone());
                            job.shard = next;
                            job.priority *= 0.8;
                        }
                        _ => {
                            self.metrics.record(false, elapsed_ms(started));
                            return Err(e);
                        }
                    }
                }
            }
        }
    }
}

fn elapsed_ms(started: Instant) -> u64 {
    started.elapsed().as_millis() as u64
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PolicyConfig;
    use crate::profile::FixedLoadProbe;
    use std::collections::BTreeMap;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn shard(engine: &str, fallback: Option<&str>) -> ShardConfig {
        ShardConfig {
            engine: engine.to_string(),
            backend: None,
            endpoint: None,
            args: Map::new(),
            fallback: fallback.map(String::from),
        }
    }

    fn config_with(shards: Vec<(&str, ShardConfig)>) -> SchedulerConfig {
        let mut config = SchedulerConfig {
            queue_delay_ms: 1,
            ..Default::default()
        };
        config.policies.insert(
            "balanced".into(),
            PolicyConfig {
                cpu_threshold_load: 0.75,
                prefer_gpu_for_priority: 0.7,
            },
        );
        config.shards = shards
            .into_iter()
            .map(|(id, s)| (id.to_string(), s))
            .collect::<BTreeMap<_, _>>();
        config
    }

    fn job(shard: &str, priority: f64) -> Job {
        Job {
            fingerprint: "fp-1".into(),
            priority,
            shard: shard.into(),
            hints: JobHints::default(),
            payload: json!({"prompt": "hi"}),
        }
    }

    fn profile(dedicated: bool, integrated: bool) -> DeviceProfile {
        DeviceProfile {
            hostname: "test".into(),
            cores: 4,
            dedicated_gpu: dedicated,
            integrated_gpu: integrated,
        }
    }

    struct FailingInvoker {
        calls: AtomicU32,
        fail_times: u32,
    }

    #[async_trait]
    impl EngineInvoker for FailingInvoker {
        async fn invoke(&self, shard: &ShardConfig, _: &Job, _: Duration) -> KuhulResult<Value> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst);
            if n < self.fail_times {
                Err(KuhulError::EngineError("boom".into()))
            } else {
                Ok(json!({"engine": shard.engine, "ok": true}))
            }
        }
    }

    #[tokio::test]
    async fn test_routes_to_cpu_under_threshold() {
        let scheduler = Scheduler::new(
            config_with(vec![("micro", shard("cpu-gguf", None))]),
            profile(false, false),
            Arc::new(FixedLoadProbe { cpu: 0.5, gpu: 0.0 }),
            Arc::new(HttpEngineInvoker::new()),
        );
        let decision = scheduler.schedule(&job("micro", 0.5), None).unwrap();
        assert_eq!(decision.device, Device::Cpu);
        assert_eq!(decision.engine, "cpu-gguf");
        assert!(decision.delay_ms.is_none());
    }

    #[tokio::test]
    async fn test_queues_when_loaded_without_gpu() {
        let scheduler = Scheduler::new(
            config_with(vec![("micro", shard("cpu-gguf", None))]),
            profile(false, false),
            Arc::new(FixedLoadProbe { cpu: 0.9, gpu: 0.0 }),
            Arc::new(HttpEngineInvoker::new()),
        );
        let decision = scheduler.schedule(&job("micro", 0.5), None).unwrap();
        assert_eq!(decision.device, Device::Queued);
        assert_eq!(decision.delay_ms, Some(1));
    }

    #[tokio::test]
    async fn test_dedicated_gpu_for_high_priority() {
        let scheduler = Scheduler::new(
            config_with(vec![("micro", shard("cpu-gguf", None))]),
            profile(true, false),
            Arc::new(FixedLoadProbe { cpu: 0.9, gpu: 0.0 }),
            Arc::new(HttpEngineInvoker::new()),
        );
        let decision = scheduler.schedule(&job("micro", 0.9), None).unwrap();
        assert_eq!(decision.device, Device::DedicatedGpu);
    }

    #[tokio::test]
    async fn test_integrated_gpu_when_below_ceiling() {
        let scheduler = Scheduler::new(
            config_with(vec![("micro", shard("gpu-metal", None))]),
            profile(false, true),
            Arc::new(FixedLoadProbe { cpu: 0.9, gpu: 0.4 }),
            Arc::new(HttpEngineInvoker::new()),
        );
        let decision = scheduler.schedule(&job("micro", 0.5), None).unwrap();
        assert_eq!(decision.device, Device::IntegratedGpu);
    }

    #[tokio::test]
    async fn test_unknown_shard() {
        let scheduler = Scheduler::new(
            config_with(vec![]),
            profile(false, false),
            Arc::new(FixedLoadProbe { cpu: 0.0, gpu: 0.0 }),
            Arc::new(HttpEngineInvoker::new()),
        );
        let err = scheduler.schedule(&job("missing", 0.5), None).unwrap_err();
        assert!(matches!(err, KuhulError::ShardNotFound(_)));
    }

    #[tokio::test]
    async fn test_schedule_exhausted_under_sustained_load() {
        let scheduler = Scheduler::new(
            config_with(vec![("micro", shard("cpu-gguf", None))]),
            profile(false, false),
            Arc::new(FixedLoadProbe { cpu: 0.9, gpu: 0.0 }),
            Arc::new(HttpEngineInvoker::new()),
        );
        let err = scheduler.run(job("micro", 0.5), None).await.unwrap_err();
        assert!(matches!(err, KuhulError::ScheduleExhausted { retries: 8 }));
        assert_eq!(scheduler.metrics().failed, 1);
    }

    #[tokio::test]
    async fn test_run_completes_and_records_metrics() {
        let scheduler = Scheduler::new(
            config_with(vec![("micro", shard("cpu-gguf", None))]),
            profile(false, false),
            Arc::new(FixedLoadProbe { cpu: 0.1, gpu: 0.0 }),
            Arc::new(HttpEngineInvoker::new()),
        );
        let record = scheduler.run(job("micro", 0.5), None).await.unwrap();
        assert_eq!(record.device, Device::Cpu);
        assert_eq!(record.attempts, 1);
        assert_eq!(record.result["completed"], json!(true));
        let metrics = scheduler.metrics();
        assert_eq!(metrics.total, 1);
        assert_eq!(metrics.successful, 1);
    }

    #[tokio::test]
    async fn test_fallback_shard_on_engine_failure() {
        let scheduler = Scheduler::new(
            config_with(vec![
                ("primary", shard("cpu-gguf", Some("backup"))),
                ("backup", shard("cpu-gguf", None)),
            ]),
            profile(false, false),
            Arc::new(FixedLoadProbe { cpu: 0.1, gpu: 0.0 }),
            Arc::new(FailingInvoker {
                calls: AtomicU32::new(0),
                fail_times: 1,
            }),
        );
        let record = scheduler.run(job("primary", 0.5), None).await.unwrap();
        assert_eq!(record.shard, "backup");
        assert_eq!(record.attempts, 2);
    }

    #[tokio::test]
    async fn test_fallback_cycle_stops_at_seen_shard() {
        let scheduler = Scheduler::new(
            config_with(vec![
                ("a", shard("cpu-gguf", Some("b"))),
                ("b", shard("cpu-gguf", Some("a"))),
            ]),
            profile(false, false),
            Arc::new(FixedLoadProbe { cpu: 0.1, gpu: 0.0 }),
            Arc::new(FailingInvoker {
                calls: AtomicU32::new(0),
                fail_times: 10,
            }),
        );
        let err = scheduler.run(job("a", 0.5), None).await.unwrap_err();
        assert!(matches!(err, KuhulError::EngineError(_)));
    }

    #[tokio::test]
    async fn test_remote_engine_against_http_double() {
        use wiremock::matchers::{method, path};
        use wiremock::{Mock, MockServer, ResponseTemplate};

        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/infer"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"text": "out"})))
            .mount(&server)
            .await;

        let mut remote = shard("remote-http", None);
        remote.endpoint = Some(format!("{}/infer", server.uri()));
        let scheduler = Scheduler::new(
            config_with(vec![("remote", remote)]),
            profile(false, false),
            Arc::new(FixedLoadProbe { cpu: 0.1, gpu: 0.0 }),
            Arc::new(HttpEngineInvoker::new()),
        );
        let record = scheduler.run(job("remote", 0.5), None).await.unwrap();
        assert_eq!(record.result["text"], json!("out"));
        assert_eq!(record.engine, "remote-http");
    }
}
