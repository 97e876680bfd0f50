// ghost-host: core handlers - ping, info, echo, eval_expr

use crate::error::HostResult;
use crate::handlers::{require_str, HANDLER_NAMES};
use crate::host::Host;
use chrono::Utc;
use ghost_glyph::GlyphValue;
use ghost_protocol::CallContext;
use serde_json::{json, Value};
use std::sync::Arc;

pub async fn ping(_host: &Arc<Host>, _input: Value, _ctx: &CallContext) -> HostResult<Value> {
    Ok(json!({
        "status": "ok",
        "timestamp": Utc::now().to_rfc3339(),
    }))
}

pub async fn info(host: &Arc<Host>, _input: Value, _ctx: &CallContext) -> HostResult<Value> {
    let profile = host.scheduler.profile();
    Ok(json!({
        "runtime": "ghost-host",
        "version": env!("CARGO_PKG_VERSION"),
        "hostname": profile.hostname,
        "cores": profile.cores,
        "uptime_s": host.uptime().as_secs(),
        "handlers": HANDLER_NAMES.len(),
        "memory_rss_kb": memory_rss_kb(),
    }))
}

pub async fn echo(_host: &Arc<Host>, input: Value, _ctx: &CallContext) -> HostResult<Value> {
    Ok(input)
}

/// Restricted expression evaluation. Names resolve from the math
/// constants, the optional input context map, and caller context extras;
/// nothing else.
pub async fn eval_expr(_host: &Arc<Host>, input: Value, ctx: &CallContext) -> HostResult<Value> {
    let expr = require_str(&input, "expr")?;
    let local = input.get("context").and_then(Value::as_object).cloned();
    let resolve = |name: &str| -> Option<GlyphValue> {
        local
            .as_ref()
            .and_then(|map| map.get(name))
            .or_else(|| ctx.extra.get(name))
            .map(GlyphValue::from_json)
    };
    let value = ghost_glyph::eval_expr(expr, &resolve)?;
    Ok(json!({ "value": value.to_json() }))
}

#[cfg(target_os = "linux")]
fn memory_rss_kb() -> Option<u64> {
    let status = std::fs::read_to_string("/proc/self/status").ok()?;
    status.lines().find_map(|line| {
        line.strip_prefix("VmRSS:")?
            .trim()
            .split_whitespace()
            .next()?
            .parse()
            .ok()
    })
}

#[cfg(not(target_os = "linux"))]
fn memory_rss_kb() -> Option<u64> {
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    fn host() -> Arc<Host> {
        Host::builder().build()
    }

    #[tokio::test]
    async fn test_ping_round_trip() {
        let result = ping(&host(), json!({}), &CallContext::new()).await.unwrap();
        assert_eq!(result["status"], "ok");
        assert!(result["timestamp"].is_string());
    }

    #[tokio::test]
    async fn test_info_reports_runtime() {
        let result = info(&host(), json!({}), &CallContext::new()).await.unwrap();
        assert_eq!(result["runtime"], "ghost-host");
        assert_eq!(result["handlers"], json!(HANDLER_NAMES.len()));
    }

    #[tokio::test]
    async fn test_echo_returns_payload() {
        let payload = json!({"deep": {"nested": [1, 2]}});
        let result = echo(&host(), payload.clone(), &CallContext::new())
            .await
            .unwrap();
        assert_eq!(result, payload);
    }

    #[tokio::test]
    async fn test_eval_expr_with_context() {
        let result = eval_expr(
            &host(),
            json!({"expr": "limit * 2 + 1", "context": {"limit": 10}}),
            &CallContext::new(),
        )
        .await
        .unwrap();
        assert_eq!(result["value"], json!(21));
    }

    #[tokio::test]
    async fn test_eval_expr_rejects_unknown_names() {
        let err = eval_expr(
            &host(),
            json!({"expr": "system + 1"}),
            &CallContext::new(),
        )
        .await
        .unwrap_err();
        assert_eq!(
            err.kind(),
            ghost_protocol::ErrorKind::ExpressionRejected
        );
    }
}
