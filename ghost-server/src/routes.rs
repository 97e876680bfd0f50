// ghost-server: HTTP surface
//
// One execution route (POST /run) carrying the request envelope, plus
// the fixed protocol routes. Every failure leaving this layer is a JSON
// envelope with a kind from the closed error set; no stack traces cross.

use crate::config::ServerConfig;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::Json;
use axum::routing::{get, post};
use axum::Router;
use ghost_host::{handlers, proxy, Host};
use ghost_protocol::{CallContext, Envelope, ErrorKind, Reply};
use ghost_tribunal::TribunalConfig;
use serde_json::{json, Value};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tower_http::cors::CorsLayer;
use tracing::info;

/// Shared state behind the router.
#[derive(Clone)]
pub struct ServerState {
    pub host: Arc<Host>,
    requests: Arc<AtomicU64>,
    failures: Arc<AtomicU64>,
}

impl ServerState {
    pub fn new(host: Arc<Host>) -> Self {
        Self {
            host,
            requests: Arc::new(AtomicU64::new(0)),
            failures: Arc::new(AtomicU64::new(0)),
        }
    }
}

/// Assemble a Host from server configuration.
pub fn build_host(config: &ServerConfig) -> Arc<Host> {
    Host::builder()
        .tape_root(config.tapes.root.clone())
        .mount_on_discover(config.tapes.initial_state == "mounted")
        .tape_drain_deadline(Duration::from_millis(config.tapes.drain_deadline_ms))
        .sandbox_root(config.sandbox.root.clone())
        .brains_dir(config.brains.dir.clone())
        .backends(config.backends.clone())
        .external(config.external.clone())
        .swarm(config.swarm.clone())
        .scheduler_config(config.scheduler.clone())
        .tribunal_config(TribunalConfig {
            judge_deadline: Duration::from_millis(config.limits.tribunal_judge_deadline_ms),
            global_deadline: Duration::from_millis(config.limits.tribunal_global_deadline_ms),
        })
        .proxy_deadline(Duration::from_millis(config.limits.proxy_deadline_ms))
        .build()
}

/// Build the axum router. CORS is permissive and explicitly not a
/// security boundary.
pub fn router(state: ServerState) -> Router {
    Router::new()
        .route("/run", post(run))
        .route("/health", get(health))
        .route("/tapes", get(tapes_list))
        .route("/tapes/:id", get(tapes_get))
        .route("/tapes/:id/mount", post(tapes_mount))
        .route("/tapes/:id/unmount", post(tapes_unmount))
        .route("/tapes/:id/reload", post(tapes_reload))
        .route("/proxy/:id", post(proxy_tape))
        .route("/proxy-external/:service", post(proxy_external))
        .route("/swarm/route", post(swarm_route))
        .route("/metrics", get(metrics))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// POST /run - the single execution route. Parse failures surface as a
/// bad-request envelope, never as a bare HTTP rejection.
async fn run(State(state): State<ServerState>, body: String) -> Json<Reply> {
    let started = Instant::now();
    state.requests.fetch_add(1, Ordering::Relaxed);

    let envelope: Envelope = match serde_json::from_str(&body) {
        Ok(envelope) => envelope,
        Err(e) => {
            state.failures.fetch_add(1, Ordering::Relaxed);
            return Json(Reply::failure(
                ErrorKind::BadRequest,
                format!("bad envelope: {}", e),
                "local",
            ));
        }
    };

    let ctx = CallContext::from_map(envelope.context.as_ref());
    let reply = state
        .host
        .router
        .call(
            &state.host,
            &envelope.program.program_type,
            envelope.program.input,
            &ctx,
        )
        .await;

    if !reply.ok {
        state.failures.fetch_add(1, Ordering::Relaxed);
    }
    info!(
        correlation = %ctx.correlation_id,
        handler = %envelope.program.program_type,
        backend = %reply.backend,
        ok = reply.ok,
        error = reply.error.map(|k| k.as_str()).unwrap_or("-"),
        elapsed_ms = started.elapsed().as_millis() as u64,
        "run"
    );
    Json(reply)
}

/// GET /health
async fn health(State(state): State<ServerState>) -> Json<Value> {
    Json(json!({
        "ok": true,
        "handlers": handlers::HANDLER_NAMES.len(),
        "uptime_s": state.host.uptime().as_secs(),
    }))
}

/// GET /tapes
async fn tapes_list(State(state): State<ServerState>) -> Result<Json<Value>, ErrorReply> {
    let ctx = CallContext::new();
    let result = handlers::dispatch(&state.host, "ghost_list", json!({}), &ctx).await?;
    Ok(Json(result))
}

/// GET /tapes/:id
async fn tapes_get(
    State(state): State<ServerState>,
    Path(id): Path<String>,
) -> Result<Json<Value>, ErrorReply> {
    let ctx = CallContext::new();
    let result = handlers::dispatch(&state.host, "ghost_get", json!({ "id": id }), &ctx).await?;
    Ok(Json(result))
}

/// POST /tapes/:id/mount
async fn tapes_mount(
    State(state): State<ServerState>,
    Path(id): Path<String>,
) -> Result<Json<Value>, ErrorReply> {
    let entry = state.host.registry.mount(&id).await.map_err(host_err)?;
    Ok(Json(json!({ "id": id, "status": entry.state.to_string() })))
}

/// POST /tapes/:id/unmount
async fn tapes_unmount(
    State(state): State<ServerState>,
    Path(id): Path<String>,
) -> Result<Json<Value>, ErrorReply> {
    let entry = state.host.registry.unmount(&id).await.map_err(host_err)?;
    Ok(Json(json!({ "id": id, "status": entry.state.to_string() })))
}

/// POST /tapes/:id/reload
async fn tapes_reload(
    State(state): State<ServerState>,
    Path(id): Path<String>,
) -> Result<Json<Value>, ErrorReply> {
    let entry = state
        .host
        .registry
        .reload(&id, &handlers::is_handler)
        .await
        .map_err(host_err)?;
    Ok(Json(json!({
        "id": id,
        "status": entry.state.to_string(),
        "version": entry.descriptor.version_string(),
        "generation": entry.generation,
    })))
}

/// POST /proxy/:id - inter-tape proxy entry.
async fn proxy_tape(
    State(state): State<ServerState>,
    Path(id): Path<String>,
    body: Json<Value>,
) -> Result<Json<Value>, ErrorReply> {
    let ctx = CallContext::from_map(body.0.get("context").and_then(Value::as_object));
    let request = proxy::TapeRequest {
        path: body
            .0
            .get("path")
            .and_then(Value::as_str)
            .unwrap_or("")
            .to_string(),
        method: body
            .0
            .get("method")
            .and_then(Value::as_str)
            .unwrap_or("POST")
            .to_string(),
        payload: body.0.get("payload").cloned().unwrap_or(Value::Null),
    };
    let result = proxy::call_tape(&state.host, &id, request, &ctx).await?;
    Ok(Json(result))
}

/// POST /proxy-external/:service - named remote service from config.
async fn proxy_external(
    State(state): State<ServerState>,
    Path(service): Path<String>,
    body: Json<Value>,
) -> Result<Json<Value>, ErrorReply> {
    let url = state.host.external.get(&service).cloned().ok_or_else(|| {
        ErrorReply::new(
            ErrorKind::BadRequest,
            format!("unknown external service: {}", service),
        )
    })?;
    let response = state
        .host
        .client
        .post(&url)
        .timeout(state.host.proxy_deadline)
        .json(&body.0)
        .send()
        .await
        .map_err(|e| {
            ErrorReply::new(ErrorKind::BackendError, format!("{}: {}", service, e))
        })?;
    if !response.status().is_success() {
        return Err(ErrorReply::new(
            ErrorKind::BackendError,
            format!("{} returned {}", service, response.status()),
        ));
    }
    let value = response.json::<Value>().await.map_err(|e| {
        ErrorReply::new(ErrorKind::BackendError, format!("{}: {}", service, e))
    })?;
    Ok(Json(value))
}

/// POST /swarm/route - keyword-routed agent dispatch.
async fn swarm_route(
    State(state): State<ServerState>,
    body: Json<Value>,
) -> Result<Json<Value>, ErrorReply> {
    let ctx = CallContext::new();
    let result = handlers::dispatch(&state.host, "agents_swarm", body.0, &ctx).await?;
    Ok(Json(result))
}

/// GET /metrics
async fn metrics(State(state): State<ServerState>) -> Json<Value> {
    let (sessions, unanimous) = state.host.tribunal.session_counts();
    Json(json!({
        "requests": state.requests.load(Ordering::Relaxed),
        "failures": state.failures.load(Ordering::Relaxed),
        "uptime_s": state.host.uptime().as_secs(),
        "tapes": state.host.registry.len(),
        "scheduler": state.host.scheduler.metrics(),
        "tribunal": {
            "sessions": sessions,
            "unanimous": unanimous,
            "disagreements": state.host.tribunal.disagreements().len(),
        },
        "store_keys": state.host.store.len(),
    }))
}

/// JSON error reply carrying an envelope-shaped body and a mapped HTTP
/// status for the fixed protocol routes.
pub struct ErrorReply {
    kind: ErrorKind,
    message: String,
}

impl ErrorReply {
    fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }
}

impl From<ghost_host::HostError> for ErrorReply {
    fn from(e: ghost_host::HostError) -> Self {
        Self::new(e.kind(), e.to_string())
    }
}

fn host_err(e: ghost_registry::RegistryError) -> ErrorReply {
    ErrorReply::new(e.kind(), e.to_string())
}

impl axum::response::IntoResponse for ErrorReply {
    fn into_response(self) -> axum::response::Response {
        let status = match self.kind {
            ErrorKind::TapeNotFound | ErrorKind::PathNotFound => StatusCode::NOT_FOUND,
            ErrorKind::TapeBusy => StatusCode::CONFLICT,
            ErrorKind::TapePermissionDenied => StatusCode::FORBIDDEN,
            ErrorKind::BadRequest | ErrorKind::ManifestParse | ErrorKind::ManifestInvalidField => {
                StatusCode::BAD_REQUEST
            }
            ErrorKind::DeadlineExceeded => StatusCode::GATEWAY_TIMEOUT,
            ErrorKind::BackendError => StatusCode::BAD_GATEWAY,
            _ => StatusCode::UNPROCESSABLE_ENTITY,
        };
        let body = Json(json!({
            "ok": false,
            "error": self.kind,
            "message": self.message,
        }));
        (status, body).into_response()
    }
}
