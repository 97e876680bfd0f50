// ghost-host: tape host protocol handlers

use crate::error::HostResult;
use crate::handlers::{is_handler, optional_str, require_str, HANDLER_NAMES};
use crate::host::Host;
use crate::proxy::{call_tape, TapeRequest};
use ghost_protocol::CallContext;
use ghost_registry::{ApiEndpoint, MountState, TapeEntry};
use serde_json::{json, Value};
use std::sync::Arc;

fn tape_view(entry: &TapeEntry) -> Value {
    let descriptor = &entry.descriptor;
    json!({
        "id": descriptor.id,
        "name": descriptor.name,
        "version": descriptor.version_string(),
        "entry": descriptor.entry,
        "api": descriptor.api.as_ref().map(|api| match api {
            ApiEndpoint::LocalHandler(name) => json!({"kind": "local-handler", "value": name}),
            ApiEndpoint::RemoteHttp(url) => json!({"kind": "remote-http", "value": url}),
        }),
        "capabilities": descriptor.capabilities,
        "permissions": descriptor.permissions,
        "agents": descriptor.agents,
        "meta": descriptor.meta,
        "status": entry.state.to_string(),
        "generation": entry.generation,
        "inflight": entry.inflight(),
        "last_access": entry.last_access.to_rfc3339(),
    })
}

pub async fn list(host: &Arc<Host>, _input: Value, _ctx: &CallContext) -> HostResult<Value> {
    let tapes: Vec<Value> = host.registry.list().iter().map(tape_view).collect();
    Ok(json!({ "total": tapes.len(), "tapes": tapes }))
}

pub async fn get(host: &Arc<Host>, input: Value, _ctx: &CallContext) -> HostResult<Value> {
    let id = require_str(&input, "id")?;
    let entry = host.registry.get(id)?;
    Ok(tape_view(&entry))
}

/// Mount (if needed) and hand back what a client needs to open the tape.
pub async fn launch(host: &Arc<Host>, input: Value, _ctx: &CallContext) -> HostResult<Value> {
    let id = require_str(&input, "id")?;
    let entry = host.registry.mount(id).await?;
    Ok(json!({
        "id": id,
        "status": entry.state.to_string(),
        "entry": entry.descriptor.entry,
        "generation": entry.generation,
    }))
}

/// Inter-tape call: forward a payload to another tape's api endpoint.
pub async fn route(host: &Arc<Host>, input: Value, ctx: &CallContext) -> HostResult<Value> {
    let tape = require_str(&input, "tape")?;
    let request = TapeRequest {
        path: optional_str(&input, "path").unwrap_or("").to_string(),
        method: optional_str(&input, "method").unwrap_or("POST").to_string(),
        payload: input.get("payload").cloned().unwrap_or(Value::Null),
    };
    call_tape(host, tape, request, ctx).await
}

/// Rescan the tape root. Already-known tapes are refreshed in place,
/// tapes whose directory vanished are unmounted and dropped, and
/// failures are reported, never fatal.
pub async fn discover(host: &Arc<Host>, _input: Value, _ctx: &CallContext) -> HostResult<Value> {
    let report = host.registry.scan(&is_handler)?;

    let mut removed = Vec::new();
    for entry in host.registry.list() {
        if !entry.descriptor.root.is_dir() {
            let id = entry.descriptor.id.clone();
            host.registry.unmount(&id).await?;
            host.registry.remove(&id)?;
            removed.push(id);
        }
    }

    Ok(json!({
        "discovered": report.discovered,
        "removed": removed,
        "failures": report.failures,
        "total": host.registry.len(),
    }))
}

pub async fn swarm(host: &Arc<Host>, _input: Value, _ctx: &CallContext) -> HostResult<Value> {
    let agents: Vec<Value> = host
        .swarm
        .agents
        .iter()
        .map(|(id, agent)| {
            json!({
                "id": id,
                "url": agent.url,
                "skills": agent.skills,
                "priority": agent.priority,
                "status": agent.status,
            })
        })
        .collect();
    Ok(json!({ "agents": agents, "router": host.swarm.router }))
}

pub async fn status(host: &Arc<Host>, _input: Value, _ctx: &CallContext) -> HostResult<Value> {
    let entries = host.registry.list();
    let mounted = entries
        .iter()
        .filter(|e| e.state == MountState::Mounted)
        .count();
    let (sessions, unanimous) = host.tribunal.session_counts();
    Ok(json!({
        "tapes": entries.len(),
        "mounted": mounted,
        "handlers": HANDLER_NAMES.len(),
        "backends": host.router.backend_names(),
        "agents": host.swarm.agents.len(),
        "uptime_s": host.uptime().as_secs(),
        "scheduler": host.scheduler.metrics(),
        "tribunal_sessions": sessions,
        "tribunal_unanimous": unanimous,
    }))
}
