// ghost-host: scheduler and glyph handlers

use crate::error::{HostError, HostResult};
use crate::handlers::optional_str;
use crate::host::Host;
use ghost_glyph::{run_structured, Step};
use ghost_protocol::CallContext;
use ghost_kuhul::{Job, JobHints};
use serde_json::{json, Value};
use std::sync::Arc;
use uuid::Uuid;

fn job_from_input(input: &Value) -> HostResult<Job> {
    let shard = optional_str(input, "shard")
        .ok_or_else(|| HostError::BadRequest("missing required field 'shard'".into()))?;
    let priority = input
        .get("priority")
        .and_then(Value::as_f64)
        .unwrap_or(0.5)
        .clamp(0.0, 1.0);
    let fingerprint = optional_str(input, "fingerprint")
        .map(String::from)
        .unwrap_or_else(|| Uuid::new_v4().to_string());
    let hints: JobHints = input
        .get("hints")
        .cloned()
        .map(serde_json::from_value)
        .transpose()
        .map_err(|e| HostError::BadRequest(format!("bad hints: {}", e)))?
        .unwrap_or_default();

    Ok(Job {
        fingerprint,
        priority,
        shard: shard.to_string(),
        hints,
        payload: input.get("payload").cloned().unwrap_or(Value::Null),
    })
}

pub async fn profile(host: &Arc<Host>, _input: Value, _ctx: &CallContext) -> HostResult<Value> {
    let (cpu_load, gpu_load) = host.scheduler.current_load();
    Ok(json!({
        "profile": host.scheduler.profile(),
        "cpu_load": cpu_load,
        "gpu_load": gpu_load,
        "shards": host.scheduler.config().shards.keys().collect::<Vec<_>>(),
        "policies": host.scheduler.config().policies.keys().collect::<Vec<_>>(),
    }))
}

/// Routing decision only, no execution.
pub async fn route(host: &Arc<Host>, input: Value, _ctx: &CallContext) -> HostResult<Value> {
    let job = job_from_input(&input)?;
    let decision = host.scheduler.schedule(&job, optional_str(&input, "policy"))?;
    serde_json::to_value(&decision)
        .map_err(|e| HostError::Backend(format!("unencodable decision: {}", e)))
}

/// Schedule and execute the job. The caller's deadline, when present,
/// shortens the engine deadline.
pub async fn schedule(host: &Arc<Host>, input: Value, ctx: &CallContext) -> HostResult<Value> {
    let job = job_from_input(&input)?;
    let record = host
        .scheduler
        .run_with_deadline(job, optional_str(&input, "policy"), ctx.deadline)
        .await?;
    serde_json::to_value(&record)
        .map_err(|e| HostError::Backend(format!("unencodable record: {}", e)))
}

pub async fn status(host: &Arc<Host>, _input: Value, _ctx: &CallContext) -> HostResult<Value> {
    Ok(json!({ "metrics": host.scheduler.metrics() }))
}

/// Run a glyph program on the process-lifetime VM. Accepts either a
/// bracketed-token `program` string or structured `steps`; `reset: true`
/// clears stack and variables first (function bodies survive).
pub async fn glyph(host: &Arc<Host>, input: Value, _ctx: &CallContext) -> HostResult<Value> {
    let mut vm = host.glyph.lock();
    if input.get("reset").and_then(Value::as_bool).unwrap_or(false) {
        vm.reset();
    }

    let top = if let Some(program) = optional_str(&input, "program") {
        vm.execute(program)?
    } else if let Some(raw_steps) = input.get("steps") {
        let steps: Vec<Step> = serde_json::from_value(raw_steps.clone())
            .map_err(|e| HostError::BadRequest(format!("bad steps: {}", e)))?;
        run_structured(&mut vm, &steps)?
    } else {
        return Err(HostError::BadRequest(
            "expected 'program' tokens or 'steps' records".into(),
        ));
    };

    let variables: serde_json::Map<String, Value> = vm
        .variables()
        .iter()
        .map(|(k, v)| (k.clone(), v.to_json()))
        .collect();

    Ok(json!({
        "result": top.map(|v| v.to_json()).unwrap_or(Value::Null),
        "stack_depth": vm.stack_len(),
        "variables": variables,
        "functions": vm.function_names(),
    }))
}
