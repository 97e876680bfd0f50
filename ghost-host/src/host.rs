// ghost-host: The Host value
//
// One Host is constructed at boot and shared behind an Arc. Handlers
// receive it explicitly; there is no global mutable state.

use crate::micronaut::BrainCache;
use crate::router::{BackendConfig, BackendRouter};
use crate::store::KvStore;
use ghost_glyph::GlyphVm;
use ghost_kuhul::{
    DeviceProfile, EngineInvoker, FixedLoadProbe, HttpEngineInvoker, LoadProbe, Scheduler,
    SchedulerConfig, TrackingLoadProbe,
};
use ghost_registry::{RegistryConfig, TapeRegistry};
use ghost_tribunal::{HttpJudgeClient, Judge, JudgeClient, JudgeStatus, Tribunal, TribunalConfig};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// One configured swarm agent. Agents double as tribunal judges.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentConfig {
    pub url: String,
    #[serde(default)]
    pub skills: Vec<String>,
    #[serde(default = "default_agent_priority")]
    pub priority: u32,
    #[serde(default)]
    pub status: JudgeStatus,
}

fn default_agent_priority() -> u32 {
    5
}

/// Swarm routing section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SwarmRouterConfig {
    #[serde(default = "default_strategy")]
    pub strategy: String,
    /// Agent used when no keyword class matches.
    #[serde(default)]
    pub fallback: Option<String>,
    #[serde(default = "default_swarm_timeout_ms")]
    pub timeout_ms: u64,
    #[serde(default = "default_swarm_retry")]
    pub retry: u32,
    /// Keyword-class assignments.
    #[serde(default)]
    pub build_agent: Option<String>,
    #[serde(default)]
    pub eval_agent: Option<String>,
    #[serde(default)]
    pub reason_agent: Option<String>,
}

fn default_strategy() -> String {
    "skill-match".to_string()
}

fn default_swarm_timeout_ms() -> u64 {
    30_000
}

fn default_swarm_retry() -> u32 {
    1
}

impl Default for SwarmRouterConfig {
    fn default() -> Self {
        Self {
            strategy: default_strategy(),
            fallback: None,
            timeout_ms: default_swarm_timeout_ms(),
            retry: default_swarm_retry(),
            build_agent: None,
            eval_agent: None,
            reason_agent: None,
        }
    }
}

/// Swarm configuration: the agent slate plus routing rules.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct SwarmConfig {
    #[serde(default)]
    pub agents: BTreeMap<String, AgentConfig>,
    #[serde(default)]
    pub router: SwarmRouterConfig,
}

impl SwarmConfig {
    pub fn judge(&self, id: &str) -> Option<Judge> {
        self.agents.get(id).map(|agent| Judge {
            id: id.to_string(),
            url: agent.url.clone(),
            skills: agent.skills.clone(),
            priority: agent.priority,
            status: agent.status,
        })
    }

    pub fn judges(&self) -> Vec<Judge> {
        self.agents
            .keys()
            .filter_map(|id| self.judge(id))
            .collect()
    }

    /// Keyword routing for swarm tasks. First matching class wins;
    /// unmatched tasks fall back to the configured fallback agent.
    pub fn route_task(&self, task: &str) -> Option<String> {
        let lowered = task.to_lowercase();
        let classes: [(&[&str], &Option<String>); 3] = [
            (&["build", "deploy", "git"], &self.router.build_agent),
            (&["eval", "judge", "code"], &self.router.eval_agent),
            (&["reason", "analyze", "longform"], &self.router.reason_agent),
        ];
        for (keywords, agent) in classes {
            if keywords.iter().any(|k| lowered.contains(k)) {
                if let Some(agent) = agent {
                    return Some(agent.clone());
                }
            }
        }
        self.router.fallback.clone()
    }
}

/// The host: every shared resource handlers may touch, with its owner.
pub struct Host {
    pub registry: TapeRegistry,
    pub store: KvStore,
    pub scheduler: Scheduler,
    pub tribunal: Tribunal,
    pub brain: BrainCache,
    /// Process-lifetime VM behind the kuhul_glyph handler.
    pub glyph: Mutex<GlyphVm>,
    pub router: BackendRouter,
    pub swarm: SwarmConfig,
    /// Named external services reachable through /proxy-external.
    pub external: BTreeMap<String, String>,
    pub sandbox_root: PathBuf,
    pub proxy_deadline: Duration,
    pub client: reqwest::Client,
    started: Instant,
}

impl Host {
    pub fn builder() -> HostBuilder {
        HostBuilder::default()
    }

    pub fn uptime(&self) -> Duration {
        self.started.elapsed()
    }
}

/// Boot-time assembly of a Host.
pub struct HostBuilder {
    tape_root: PathBuf,
    sandbox_root: PathBuf,
    brains_dir: PathBuf,
    mount_on_discover: bool,
    tape_drain_deadline: Duration,
    scheduler_config: SchedulerConfig,
    device_profile: Option<DeviceProfile>,
    load_probe: Option<Arc<dyn LoadProbe>>,
    engine_invoker: Option<Arc<dyn EngineInvoker>>,
    tribunal_config: TribunalConfig,
    judge_client: Option<Arc<dyn JudgeClient>>,
    backends: Vec<BackendConfig>,
    swarm: SwarmConfig,
    external: BTreeMap<String, String>,
    proxy_deadline: Duration,
}

impl Default for HostBuilder {
    fn default() -> Self {
        Self {
            tape_root: PathBuf::from("tapes"),
            sandbox_root: PathBuf::from("sandbox"),
            brains_dir: PathBuf::from("brains"),
            mount_on_discover: true,
            tape_drain_deadline: Duration::from_secs(5),
            scheduler_config: SchedulerConfig::default(),
            device_profile: None,
            load_probe: None,
            engine_invoker: None,
            tribunal_config: TribunalConfig::default(),
            judge_client: None,
            backends: Vec::new(),
            swarm: SwarmConfig::default(),
            external: BTreeMap::new(),
            proxy_deadline: Duration::from_secs(30),
        }
    }
}

impl HostBuilder {
    pub fn tape_root(mut self, path: impl Into<PathBuf>) -> Self {
        self.tape_root = path.into();
        self
    }

    pub fn sandbox_root(mut self, path: impl Into<PathBuf>) -> Self {
        self.sandbox_root = path.into();
        self
    }

    pub fn brains_dir(mut self, path: impl Into<PathBuf>) -> Self {
        self.brains_dir = path.into();
        self
    }

    pub fn mount_on_discover(mut self, mount: bool) -> Self {
        self.mount_on_discover = mount;
        self
    }

    pub fn tape_drain_deadline(mut self, deadline: Duration) -> Self {
        self.tape_drain_deadline = deadline;
        self
    }

    pub fn scheduler_config(mut self, config: SchedulerConfig) -> Self {
        self.scheduler_config = config;
        self
    }

    pub fn device_profile(mut self, profile: DeviceProfile) -> Self {
        self.device_profile = Some(profile);
        self
    }

    pub fn load_probe(mut self, probe: Arc<dyn LoadProbe>) -> Self {
        self.load_probe = Some(probe);
        self
    }

    pub fn fixed_load(self, cpu: f64, gpu: f64) -> Self {
        self.load_probe(Arc::new(FixedLoadProbe { cpu, gpu }))
    }

    pub fn engine_invoker(mut self, invoker: Arc<dyn EngineInvoker>) -> Self {
        self.engine_invoker = Some(invoker);
        self
    }

    pub fn tribunal_config(mut self, config: TribunalConfig) -> Self {
        self.tribunal_config = config;
        self
    }

    pub fn judge_client(mut self, client: Arc<dyn JudgeClient>) -> Self {
        self.judge_client = Some(client);
        self
    }

    pub fn backends(mut self, backends: Vec<BackendConfig>) -> Self {
        self.backends = backends;
        self
    }

    pub fn swarm(mut self, swarm: SwarmConfig) -> Self {
        self.swarm = swarm;
        self
    }

    pub fn external(mut self, external: BTreeMap<String, String>) -> Self {
        self.external = external;
        self
    }

    pub fn proxy_deadline(mut self, deadline: Duration) -> Self {
        self.proxy_deadline = deadline;
        self
    }

    pub fn build(self) -> Arc<Host> {
        let profile = self
            .device_profile
            .unwrap_or_else(DeviceProfile::detect);
        let probe = self
            .load_probe
            .unwrap_or_else(|| Arc::new(TrackingLoadProbe::new(profile.cores)));
        let invoker = self
            .engine_invoker
            .unwrap_or_else(|| Arc::new(HttpEngineInvoker::new()));
        let judge_client = self
            .judge_client
            .unwrap_or_else(|| Arc::new(HttpJudgeClient::new()));

        Arc::new(Host {
            registry: TapeRegistry::new(RegistryConfig {
                tape_root: self.tape_root,
                mount_on_discover: self.mount_on_discover,
                drain_deadline: self.tape_drain_deadline,
            }),
            store: KvStore::new(),
            scheduler: Scheduler::new(self.scheduler_config, profile, probe, invoker),
            tribunal: Tribunal::new(self.tribunal_config, judge_client),
            brain: BrainCache::new(self.brains_dir),
            glyph: Mutex::new(GlyphVm::new()),
            router: BackendRouter::new(self.backends),
            swarm: self.swarm,
            external: self.external,
            sandbox_root: self.sandbox_root,
            proxy_deadline: self.proxy_deadline,
            client: reqwest::Client::new(),
            started: Instant::now(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_route_task_keyword_classes() {
        let swarm: SwarmConfig = serde_json::from_str(
            r#"{
                "agents": {
                    "forge": {"url": "http://localhost:1"},
                    "critic": {"url": "http://localhost:2"},
                    "sage": {"url": "http://localhost:3"}
                },
                "router": {
                    "build_agent": "forge",
                    "eval_agent": "critic",
                    "reason_agent": "sage",
                    "fallback": "sage"
                }
            }"#,
        )
        .unwrap();

        assert_eq!(swarm.route_task("deploy the new tape"), Some("forge".into()));
        assert_eq!(swarm.route_task("judge this diff"), Some("critic".into()));
        assert_eq!(swarm.route_task("analyze the logs"), Some("sage".into()));
        assert_eq!(swarm.route_task("something else"), Some("sage".into()));
    }

    #[test]
    fn test_route_task_without_fallback() {
        let swarm = SwarmConfig::default();
        assert_eq!(swarm.route_task("build it"), None);
    }

    #[test]
    fn test_judges_from_agents() {
        let swarm: SwarmConfig = serde_json::from_str(
            r#"{"agents": {"a": {"url": "http://localhost:1", "skills": ["eval"]}}}"#,
        )
        .unwrap();
        let judges = swarm.judges();
        assert_eq!(judges.len(), 1);
        assert_eq!(judges[0].id, "a");
        assert!(judges[0].is_online());
    }

    #[tokio::test]
    async fn test_builder_defaults() {
        let host = Host::builder().build();
        assert!(host.registry.is_empty());
        assert!(host.store.is_empty());
        assert_eq!(host.scheduler.metrics().total, 0);
    }
}
