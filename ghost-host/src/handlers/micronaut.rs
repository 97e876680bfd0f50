// ghost-host: micronaut model handlers
//
// A missing brain model is a normal condition: every handler answers
// with a marker result instead of failing, so tape logic can degrade.

use crate::error::HostResult;
use crate::handlers::require_str;
use crate::host::Host;
use ghost_protocol::CallContext;
use serde_json::{json, Value};
use std::sync::Arc;

/// Marker model name reported when no brain is on disk.
const ABSENT: &str = "absent";

pub async fn status(host: &Arc<Host>, _input: Value, _ctx: &CallContext) -> HostResult<Value> {
    match host.brain.get() {
        Some(brain) => Ok(json!({
            "model": brain.name,
            "loaded": true,
            "intents": brain.intents.len(),
            "ngrams": brain.ngrams.len(),
        })),
        None => Ok(json!({
            "model": ABSENT,
            "loaded": false,
            "path": host.brain.path().display().to_string(),
        })),
    }
}

pub async fn infer(host: &Arc<Host>, input: Value, _ctx: &CallContext) -> HostResult<Value> {
    let prompt = require_str(&input, "prompt")?;
    let max_tokens = input
        .get("max_tokens")
        .and_then(Value::as_u64)
        .unwrap_or(16) as usize;

    let Some(brain) = host.brain.get() else {
        return Ok(json!({ "model": ABSENT, "completion": Value::Null }));
    };
    let tokens = brain.complete(prompt, max_tokens);
    Ok(json!({
        "model": brain.name,
        "completion": tokens.join(" "),
        "tokens": tokens.len(),
    }))
}

pub async fn intent(host: &Arc<Host>, input: Value, _ctx: &CallContext) -> HostResult<Value> {
    let text = require_str(&input, "text")?;
    let Some(brain) = host.brain.get() else {
        return Ok(json!({ "model": ABSENT, "intent": Value::Null, "score": 0.0 }));
    };
    match brain.classify_intent(text) {
        Some((intent, score)) => Ok(json!({
            "model": brain.name,
            "intent": intent,
            "score": score,
        })),
        None => Ok(json!({
            "model": brain.name,
            "intent": Value::Null,
            "score": 0.0,
        })),
    }
}

pub async fn complete(host: &Arc<Host>, input: Value, _ctx: &CallContext) -> HostResult<Value> {
    let prefix = require_str(&input, "prefix")?;
    let limit = input.get("limit").and_then(Value::as_u64).unwrap_or(5) as usize;
    let Some(brain) = host.brain.get() else {
        return Ok(json!({ "model": ABSENT, "suggestions": [] }));
    };
    let suggestions = brain.complete(prefix, limit);
    Ok(json!({ "model": brain.name, "suggestions": suggestions }))
}

pub async fn chat(host: &Arc<Host>, input: Value, _ctx: &CallContext) -> HostResult<Value> {
    let message = require_str(&input, "message")?;
    let Some(brain) = host.brain.get() else {
        return Ok(json!({ "model": ABSENT, "reply": Value::Null }));
    };
    let classified = brain.classify_intent(message);
    let reply = classified
        .as_ref()
        .and_then(|(intent, _)| brain.respond(intent))
        .map(|r| Value::String(r.to_string()))
        .unwrap_or(Value::Null);
    Ok(json!({
        "model": brain.name,
        "intent": classified.as_ref().map(|(i, _)| i.clone()),
        "reply": reply,
    }))
}

/// Training runs in external tooling; the handler only acknowledges what
/// it was handed so callers can hand samples off and move on.
pub async fn train(host: &Arc<Host>, input: Value, _ctx: &CallContext) -> HostResult<Value> {
    let samples = input
        .get("samples")
        .and_then(Value::as_array)
        .map(|s| s.len())
        .unwrap_or(0);
    let model = host
        .brain
        .get()
        .map(|b| b.name.clone())
        .unwrap_or_else(|| ABSENT.to_string());
    Ok(json!({
        "model": model,
        "received": samples,
        "trained": false,
        "note": "training is delegated to external tooling",
    }))
}
