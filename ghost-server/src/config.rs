// ghost-server: Configuration loading
//
// Loading hierarchy: env > file > defaults. A parse or validation
// failure at boot is fatal (exit code 1).

use ghost_host::{BackendConfig, SwarmConfig};
use ghost_kuhul::SchedulerConfig;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Configuration error types
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("config io error: {0}")]
    Io(String),

    #[error("config parse error: {0}")]
    Parse(String),

    #[error("config validation error: {0}")]
    Validation(String),
}

/// Server section.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerSection {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    /// How long shutdown waits for inflight requests.
    #[serde(default = "default_drain_deadline_ms")]
    pub drain_deadline_ms: u64,
}

fn default_host() -> String {
    "localhost".to_string()
}

fn default_port() -> u16 {
    3000
}

fn default_drain_deadline_ms() -> u64 {
    10_000
}

impl Default for ServerSection {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            drain_deadline_ms: default_drain_deadline_ms(),
        }
    }
}

/// Tapes section.
#[derive(Debug, Clone, Deserialize)]
pub struct TapesSection {
    #[serde(default = "default_tape_root")]
    pub root: PathBuf,
    /// "mounted" (default) or "unmounted".
    #[serde(default = "default_initial_state")]
    pub initial_state: String,
    #[serde(default = "default_tape_drain_ms")]
    pub drain_deadline_ms: u64,
}

fn default_tape_root() -> PathBuf {
    PathBuf::from("tapes")
}

fn default_initial_state() -> String {
    "mounted".to_string()
}

fn default_tape_drain_ms() -> u64 {
    5_000
}

impl Default for TapesSection {
    fn default() -> Self {
        Self {
            root: default_tape_root(),
            initial_state: default_initial_state(),
            drain_deadline_ms: default_tape_drain_ms(),
        }
    }
}

/// Sandbox section.
#[derive(Debug, Clone, Deserialize)]
pub struct SandboxSection {
    #[serde(default = "default_sandbox_root")]
    pub root: PathBuf,
}

fn default_sandbox_root() -> PathBuf {
    PathBuf::from("sandbox")
}

impl Default for SandboxSection {
    fn default() -> Self {
        Self {
            root: default_sandbox_root(),
        }
    }
}

/// Brains section.
#[derive(Debug, Clone, Deserialize)]
pub struct BrainsSection {
    #[serde(default = "default_brains_dir")]
    pub dir: PathBuf,
}

fn default_brains_dir() -> PathBuf {
    PathBuf::from("brains")
}

impl Default for BrainsSection {
    fn default() -> Self {
        Self {
            dir: default_brains_dir(),
        }
    }
}

/// Limits section.
#[derive(Debug, Clone, Deserialize)]
pub struct LimitsSection {
    #[serde(default = "default_proxy_deadline_ms")]
    pub proxy_deadline_ms: u64,
    #[serde(default = "default_tribunal_judge_ms")]
    pub tribunal_judge_deadline_ms: u64,
    #[serde(default = "default_tribunal_global_ms")]
    pub tribunal_global_deadline_ms: u64,
}

fn default_proxy_deadline_ms() -> u64 {
    30_000
}

fn default_tribunal_judge_ms() -> u64 {
    20_000
}

fn default_tribunal_global_ms() -> u64 {
    30_000
}

impl Default for LimitsSection {
    fn default() -> Self {
        Self {
            proxy_deadline_ms: default_proxy_deadline_ms(),
            tribunal_judge_deadline_ms: default_tribunal_judge_ms(),
            tribunal_global_deadline_ms: default_tribunal_global_ms(),
        }
    }
}

/// The full server configuration.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct ServerConfig {
    #[serde(default)]
    pub server: ServerSection,
    #[serde(default)]
    pub tapes: TapesSection,
    #[serde(default)]
    pub sandbox: SandboxSection,
    #[serde(default)]
    pub brains: BrainsSection,
    #[serde(default)]
    pub limits: LimitsSection,
    /// Remote handler servers in priority order.
    #[serde(default)]
    pub backends: Vec<BackendConfig>,
    /// Named external services for /proxy-external.
    #[serde(default)]
    pub external: BTreeMap<String, String>,
    #[serde(default)]
    pub swarm: SwarmConfig,
    #[serde(default)]
    pub scheduler: SchedulerConfig,
}

impl ServerConfig {
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }
}

/// Load configuration from an optional TOML file, then apply environment
/// overrides (`HOST`, `PORT`), then validate.
pub fn load_config(path: Option<&Path>) -> Result<ServerConfig, ConfigError> {
    let mut config = match path {
        Some(path) => {
            let content = std::fs::read_to_string(path)
                .map_err(|e| ConfigError::Io(format!("{}: {}", path.display(), e)))?;
            toml::from_str(&content).map_err(|e| ConfigError::Parse(e.to_string()))?
        }
        None => ServerConfig::default(),
    };

    apply_env_overrides(&mut config)?;
    validate_config(&config)?;
    Ok(config)
}

fn apply_env_overrides(config: &mut ServerConfig) -> Result<(), ConfigError> {
    if let Ok(host) = std::env::var("HOST") {
        if !host.is_empty() {
            config.server.host = host;
        }
    }
    if let Ok(port) = std::env::var("PORT") {
        config.server.port = port
            .parse()
            .map_err(|_| ConfigError::Validation(format!("invalid PORT: {}", port)))?;
    }
    Ok(())
}

fn validate_config(config: &ServerConfig) -> Result<(), ConfigError> {
    match config.tapes.initial_state.as_str() {
        "mounted" | "unmounted" => {}
        other => {
            return Err(ConfigError::Validation(format!(
                "tapes.initial_state must be mounted or unmounted, got '{}'",
                other
            )))
        }
    }
    for backend in &config.backends {
        if !backend.url.starts_with("http://") && !backend.url.starts_with("https://") {
            return Err(ConfigError::Validation(format!(
                "backend '{}' url must be http(s): {}",
                backend.name, backend.url
            )));
        }
    }
    for (name, url) in &config.external {
        if !url.starts_with("http://") && !url.starts_with("https://") {
            return Err(ConfigError::Validation(format!(
                "external service '{}' url must be http(s): {}",
                name, url
            )));
        }
    }
    Ok(())
}
