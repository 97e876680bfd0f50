// ghost-host: Inter-tape proxy
//
// Forwards a request to a tape's declared API endpoint: local handler
// names go through the backend router, remote URLs through HTTP. A hop
// counter in the call context bounds proxy chains; cycles are not
// detected beyond it.

use crate::error::{HostError, HostResult};
use crate::host::Host;
use ghost_protocol::CallContext;
use ghost_registry::{ApiEndpoint, NetworkPermission};
use reqwest::Method;
use serde_json::Value;
use std::sync::Arc;
use tracing::debug;

/// A proxied request addressed to a tape.
#[derive(Debug, Clone)]
pub struct TapeRequest {
    pub path: String,
    pub method: String,
    pub payload: Value,
}

impl TapeRequest {
    pub fn post(payload: Value) -> Self {
        Self {
            path: String::new(),
            method: "POST".to_string(),
            payload,
        }
    }
}

/// Proxy a request to `tape_id`. Returns whatever the tape's endpoint
/// returned, JSON-decoded.
pub async fn call_tape(
    host: &Arc<Host>,
    tape_id: &str,
    request: TapeRequest,
    ctx: &CallContext,
) -> HostResult<Value> {
    let next_ctx = ctx.next_hop().ok_or(HostError::HopLimitExceeded)?;

    let entry = host.registry.get(tape_id)?;
    if entry.descriptor.permissions.network == NetworkPermission::None {
        return Err(HostError::TapePermissionDenied(format!(
            "tape '{}' declares network: none",
            tape_id
        )));
    }

    // Held for the duration of the forwarded call so unmount drains us.
    let _guard = host.registry.begin_request(tape_id)?;

    let endpoint = entry.descriptor.api.clone().ok_or_else(|| {
        HostError::BadRequest(format!("tape '{}' declares no api endpoint", tape_id))
    })?;

    debug!(
        tape = tape_id,
        hops_left = next_ctx.hops,
        correlation = %next_ctx.correlation_id,
        "proxying to tape"
    );

    match endpoint {
        ApiEndpoint::LocalHandler(handler) => {
            let reply = host
                .router
                .call(host, &handler, request.payload, &next_ctx)
                .await;
            serde_json::to_value(reply)
                .map_err(|e| HostError::Backend(format!("unencodable reply: {}", e)))
        }
        ApiEndpoint::RemoteHttp(url) => {
            let target = join_url(&url, &request.path);
            let method = Method::from_bytes(request.method.as_bytes())
                .unwrap_or(Method::POST);
            let deadline = next_ctx.effective_deadline(host.proxy_deadline);

            let response = host
                .client
                .request(method, &target)
                .timeout(deadline)
                .json(&request.payload)
                .send()
                .await
                .map_err(|e| HostError::Backend(format!("tape '{}': {}", tape_id, e)))?;

            let status = response.status();
            if !status.is_success() {
                return Err(HostError::Backend(format!(
                    "tape '{}' endpoint returned {}",
                    tape_id, status
                )));
            }
            let text = response
                .text()
                .await
                .map_err(|e| HostError::Backend(format!("tape '{}': {}", tape_id, e)))?;
            Ok(serde_json::from_str(&text).unwrap_or(Value::String(text)))
        }
    }
}

fn join_url(base: &str, path: &str) -> String {
    if path.is_empty() {
        return base.to_string();
    }
    format!(
        "{}/{}",
        base.trim_end_matches('/'),
        path.trim_start_matches('/')
    )
}
