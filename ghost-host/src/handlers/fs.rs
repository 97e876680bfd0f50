// ghost-host: sandboxed filesystem handlers
//
// Every path in every handler resolves through the sandbox guard; none
// bypasses it.

use crate::error::{HostError, HostResult};
use crate::handlers::require_str;
use crate::host::Host;
use crate::sandbox::safe_path;
use ghost_protocol::CallContext;
use serde_json::{json, Value};
use std::path::Path;
use std::sync::Arc;

pub async fn read(host: &Arc<Host>, input: Value, _ctx: &CallContext) -> HostResult<Value> {
    let raw = require_str(&input, "path")?;
    let path = safe_path(&host.sandbox_root, raw)?;
    let content = read_file(&path, raw)?;
    Ok(json!({ "path": raw, "content": content, "size": content.len() }))
}

pub async fn write(host: &Arc<Host>, input: Value, _ctx: &CallContext) -> HostResult<Value> {
    let raw = require_str(&input, "path")?;
    let content = require_str(&input, "content")?;
    let path = safe_path(&host.sandbox_root, raw)?;
    ensure_parent(&path)?;
    std::fs::write(&path, content)
        .map_err(|e| HostError::Backend(format!("write {}: {}", raw, e)))?;
    Ok(json!({ "path": raw, "written": content.len() }))
}

pub async fn list(host: &Arc<Host>, input: Value, _ctx: &CallContext) -> HostResult<Value> {
    let raw = input
        .get("path")
        .and_then(Value::as_str)
        .unwrap_or(".");
    let path = safe_path(&host.sandbox_root, raw)?;
    if !path.is_dir() {
        return Err(HostError::PathNotFound(raw.to_string()));
    }
    let mut entries = Vec::new();
    let read_dir = std::fs::read_dir(&path)
        .map_err(|e| HostError::Backend(format!("list {}: {}", raw, e)))?;
    for entry in read_dir.flatten() {
        let meta = entry.metadata().ok();
        entries.push(json!({
            "name": entry.file_name().to_string_lossy(),
            "dir": meta.as_ref().map(|m| m.is_dir()).unwrap_or(false),
            "size": meta.as_ref().map(|m| m.len()).unwrap_or(0),
        }));
    }
    entries.sort_by(|a, b| a["name"].as_str().cmp(&b["name"].as_str()));
    Ok(json!({ "path": raw, "entries": entries }))
}

pub async fn exists(host: &Arc<Host>, input: Value, _ctx: &CallContext) -> HostResult<Value> {
    let raw = require_str(&input, "path")?;
    let path = safe_path(&host.sandbox_root, raw)?;
    Ok(json!({ "path": raw, "exists": path.exists() }))
}

pub async fn delete(host: &Arc<Host>, input: Value, _ctx: &CallContext) -> HostResult<Value> {
    let raw = require_str(&input, "path")?;
    let path = safe_path(&host.sandbox_root, raw)?;
    if !path.exists() {
        return Err(HostError::PathNotFound(raw.to_string()));
    }
    let outcome = if path.is_dir() {
        std::fs::remove_dir_all(&path)
    } else {
        std::fs::remove_file(&path)
    };
    outcome.map_err(|e| HostError::Backend(format!("delete {}: {}", raw, e)))?;
    Ok(json!({ "path": raw, "deleted": true }))
}

pub async fn copy(host: &Arc<Host>, input: Value, _ctx: &CallContext) -> HostResult<Value> {
    let from_raw = require_str(&input, "from")?;
    let to_raw = require_str(&input, "to")?;
    let from = safe_path(&host.sandbox_root, from_raw)?;
    let to = safe_path(&host.sandbox_root, to_raw)?;
    if !from.is_file() {
        return Err(HostError::PathNotFound(from_raw.to_string()));
    }
    ensure_parent(&to)?;
    let copied = std::fs::copy(&from, &to)
        .map_err(|e| HostError::Backend(format!("copy {} -> {}: {}", from_raw, to_raw, e)))?;
    Ok(json!({ "from": from_raw, "to": to_raw, "copied": copied }))
}

pub async fn json_read(host: &Arc<Host>, input: Value, _ctx: &CallContext) -> HostResult<Value> {
    let raw = require_str(&input, "path")?;
    let path = safe_path(&host.sandbox_root, raw)?;
    let content = read_file(&path, raw)?;
    let data: Value = serde_json::from_str(&content)
        .map_err(|e| HostError::BadRequest(format!("{} is not JSON: {}", raw, e)))?;
    Ok(json!({ "path": raw, "data": data }))
}

pub async fn json_write(host: &Arc<Host>, input: Value, _ctx: &CallContext) -> HostResult<Value> {
    let raw = require_str(&input, "path")?;
    let data = input
        .get("data")
        .cloned()
        .ok_or_else(|| HostError::BadRequest("missing required field 'data'".into()))?;
    let path = safe_path(&host.sandbox_root, raw)?;
    ensure_parent(&path)?;
    let rendered = serde_json::to_string_pretty(&data)
        .map_err(|e| HostError::Backend(format!("encode {}: {}", raw, e)))?;
    std::fs::write(&path, rendered.as_bytes())
        .map_err(|e| HostError::Backend(format!("write {}: {}", raw, e)))?;
    Ok(json!({ "path": raw, "written": rendered.len() }))
}

fn read_file(path: &Path, raw: &str) -> HostResult<String> {
    if !path.is_file() {
        return Err(HostError::PathNotFound(raw.to_string()));
    }
    std::fs::read_to_string(path)
        .map_err(|e| HostError::Backend(format!("read {}: {}", raw, e)))
}

fn ensure_parent(path: &Path) -> HostResult<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .map_err(|e| HostError::Backend(format!("mkdir {}: {}", parent.display(), e)))?;
    }
    Ok(())
}
