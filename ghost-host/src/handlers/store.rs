// ghost-host: key-value store handler

use crate::error::{HostError, HostResult};
use crate::handlers::require_str;
use crate::host::Host;
use ghost_protocol::CallContext;
use serde_json::{json, Value};
use std::sync::Arc;

/// `store` handler: action ∈ {set, get, delete, list, clear} against the
/// shared process-wide map.
pub async fn store(host: &Arc<Host>, input: Value, _ctx: &CallContext) -> HostResult<Value> {
    let action = require_str(&input, "action")?;
    match action {
        "set" => {
            let key = require_str(&input, "key")?;
            let value = input
                .get("value")
                .cloned()
                .ok_or_else(|| HostError::BadRequest("missing required field 'value'".into()))?;
            host.store.set(key, value.clone());
            Ok(json!({ "key": key, "value": value }))
        }
        "get" => {
            let key = require_str(&input, "key")?;
            let stored = host
                .store
                .get(key)
                .ok_or_else(|| HostError::BadRequest(format!("key not found: {}", key)))?;
            Ok(json!({
                "key": key,
                "value": stored.value,
                "written_at": stored.written_at.to_rfc3339(),
            }))
        }
        "delete" => {
            let key = require_str(&input, "key")?;
            let deleted = host.store.delete(key);
            Ok(json!({ "key": key, "deleted": deleted }))
        }
        "list" => Ok(json!({ "keys": host.store.keys() })),
        "clear" => Ok(json!({ "cleared": host.store.clear() })),
        other => Err(HostError::BadRequest(format!(
            "unknown store action: {}",
            other
        ))),
    }
}
