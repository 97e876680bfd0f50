// ghost-host: Backend router with graceful degradation
//
// Remote handler servers are probed in descending priority; any
// transport failure, timeout or non-2xx moves on to the next. The
// in-process handler set is the always-available terminator, so
// backend-unreachable cannot cross the envelope boundary.

use crate::handlers;
use crate::host::Host;
use ghost_protocol::{CallContext, Envelope, Reply};
use parking_lot::Mutex;
use serde::Deserialize;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

/// Name of the in-process terminator backend.
pub const LOCAL_BACKEND: &str = "local";

/// How long a failed remote is skipped before being probed again.
const NEGATIVE_CACHE: Duration = Duration::from_secs(1);

/// One remote handler server.
#[derive(Debug, Clone, Deserialize)]
pub struct BackendConfig {
    pub name: String,
    pub url: String,
    pub priority: u32,
    #[serde(default = "default_backend_timeout_ms")]
    pub timeout_ms: u64,
}

fn default_backend_timeout_ms() -> u64 {
    5_000
}

/// The router. Holds the remote list sorted by descending priority and a
/// short negative cache of dead backends.
pub struct BackendRouter {
    remotes: Vec<BackendConfig>,
    client: reqwest::Client,
    dead_until: Mutex<HashMap<String, Instant>>,
}

impl BackendRouter {
    pub fn new(mut remotes: Vec<BackendConfig>) -> Self {
        remotes.sort_by(|a, b| b.priority.cmp(&a.priority));
        Self {
            remotes,
            client: reqwest::Client::new(),
            dead_until: Mutex::new(HashMap::new()),
        }
    }

    pub fn backend_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.remotes.iter().map(|b| b.name.clone()).collect();
        names.push(LOCAL_BACKEND.to_string());
        names
    }

    /// Route one call. Failover never changes semantics: the reply the
    /// caller sees is the reply the chosen backend produced, tagged with
    /// that backend's name.
    pub async fn call(
        &self,
        host: &Arc<Host>,
        program_type: &str,
        input: Value,
        ctx: &CallContext,
    ) -> Reply {
        let started = Instant::now();

        for backend in &self.remotes {
            if self.is_dead(&backend.name) {
                debug!(backend = %backend.name, "skipping dead backend");
                continue;
            }
            match self
                .call_remote(backend, program_type, input.clone(), ctx)
                .await
            {
                Ok(mut reply) => {
                    reply.backend = backend.name.clone();
                    return reply.with_elapsed(started.elapsed().as_millis() as u64);
                }
                Err(reason) => {
                    warn!(backend = %backend.name, reason = %reason, "backend failed, trying next");
                    self.mark_dead(&backend.name);
                }
            }
        }

        // Local terminator. Handler-level errors are returned as-is.
        let reply = match handlers::dispatch(host, program_type, input, ctx).await {
            Ok(result) => Reply::success(result, LOCAL_BACKEND),
            Err(e) => Reply::failure(e.kind(), e.to_string(), LOCAL_BACKEND),
        };
        reply.with_elapsed(started.elapsed().as_millis() as u64)
    }

    async fn call_remote(
        &self,
        backend: &BackendConfig,
        program_type: &str,
        input: Value,
        ctx: &CallContext,
    ) -> Result<Reply, String> {
        let envelope = Envelope::new(program_type, input).with_context(ctx.to_map());
        let deadline = ctx.effective_deadline(Duration::from_millis(backend.timeout_ms));

        let response = self
            .client
            .post(&backend.url)
            .timeout(deadline)
            .json(&envelope)
            .send()
            .await
            .map_err(|e| e.to_string())?;

        if !response.status().is_success() {
            return Err(format!("status {}", response.status()));
        }
        response
            .json::<Reply>()
            .await
            .map_err(|e| format!("undecodable reply: {}", e))
    }

    fn is_dead(&self, name: &str) -> bool {
        self.dead_until
            .lock()
            .get(name)
            .is_some_and(|until| Instant::now() < *until)
    }

    fn mark_dead(&self, name: &str) {
        self.dead_until
            .lock()
            .insert(name.to_string(), Instant::now() + NEGATIVE_CACHE);
    }
}
