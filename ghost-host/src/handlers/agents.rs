// ghost-host: agent and tribunal handlers

use crate::error::{HostError, HostResult};
use crate::handlers::require_str;
use crate::host::Host;
use ghost_protocol::CallContext;
use ghost_tribunal::{Judge, Task};
use serde_json::{json, Map, Value};
use std::sync::Arc;
use std::time::Duration;

pub async fn list(host: &Arc<Host>, _input: Value, _ctx: &CallContext) -> HostResult<Value> {
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
    Ok(json!({ "total": agents.len(), "agents": agents }))
}

/// Call one named agent with a payload over HTTP.
pub async fn call(host: &Arc<Host>, input: Value, ctx: &CallContext) -> HostResult<Value> {
    let id = require_str(&input, "agent")?;
    let judge = host
        .swarm
        .judge(id)
        .ok_or_else(|| HostError::BadRequest(format!("unknown agent: {}", id)))?;
    if !judge.is_online() {
        return Err(HostError::Backend(format!("agent '{}' is offline", id)));
    }
    let payload = input.get("payload").cloned().unwrap_or(Value::Null);
    let result = post_agent(host, &judge, payload, ctx).await?;
    Ok(json!({ "agent": id, "result": result }))
}

/// Convene the tribunal over a task.
pub async fn tribunal(host: &Arc<Host>, input: Value, ctx: &CallContext) -> HostResult<Value> {
    let task_value = input
        .get("task")
        .cloned()
        .ok_or_else(|| HostError::BadRequest("missing required field 'task'".into()))?;
    let task: Task = serde_json::from_value(task_value)
        .map_err(|e| HostError::BadRequest(format!("bad task: {}", e)))?;

    // An explicit judge slate narrows the configured agents.
    let judges: Vec<Judge> = match input.get("judges").and_then(Value::as_array) {
        Some(ids) => ids
            .iter()
            .filter_map(Value::as_str)
            .filter_map(|id| host.swarm.judge(id))
            .collect(),
        None => host.swarm.judges(),
    };

    let caller_deadline = input
        .get("timeout_ms")
        .and_then(Value::as_u64)
        .map(Duration::from_millis)
        .or(ctx.deadline);

    let session = host.tribunal.evaluate(&task, &judges, caller_deadline).await?;
    serde_json::to_value(&session)
        .map_err(|e| HostError::Backend(format!("unencodable session: {}", e)))
}

/// Route a freeform task to the best agent by keyword class and call it.
pub async fn swarm(host: &Arc<Host>, input: Value, ctx: &CallContext) -> HostResult<Value> {
    let task = require_str(&input, "task")?;
    let agent_id = host
        .swarm
        .route_task(task)
        .ok_or_else(|| HostError::BadRequest("no agent matches task and no fallback configured".into()))?;
    let judge = host
        .swarm
        .judge(&agent_id)
        .ok_or_else(|| HostError::BadRequest(format!("routed to unknown agent: {}", agent_id)))?;

    let mut payload = Map::new();
    payload.insert("task".into(), Value::String(task.to_string()));
    if let Some(extra) = input.get("payload") {
        payload.insert("payload".into(), extra.clone());
    }
    let result = post_agent(host, &judge, Value::Object(payload), ctx).await?;
    Ok(json!({ "agent": agent_id, "result": result }))
}

async fn post_agent(
    host: &Arc<Host>,
    judge: &Judge,
    payload: Value,
    ctx: &CallContext,
) -> HostResult<Value> {
    let deadline =
        ctx.effective_deadline(Duration::from_millis(host.swarm.router.timeout_ms));
    let response = host
        .client
        .post(&judge.url)
        .timeout(deadline)
        .json(&payload)
        .send()
        .await
        .map_err(|e| HostError::Backend(format!("agent '{}': {}", judge.id, e)))?;
    if !response.status().is_success() {
        return Err(HostError::Backend(format!(
            "agent '{}' returned {}",
            judge.id,
            response.status()
        )));
    }
    response
        .json::<Value>()
        .await
        .map_err(|e| HostError::Backend(format!("agent '{}': {}", judge.id, e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::SwarmConfig;
    use wiremock::matchers::method;
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn swarm_with(url: &str) -> SwarmConfig {
        serde_json::from_value(json!({
            "agents": {
                "critic": {"url": url, "skills": ["eval"]}
            },
            "router": {"eval_agent": "critic", "fallback": "critic"}
        }))
        .unwrap()
    }

    #[tokio::test]
    async fn test_list_agents() {
        let host = Host::builder()
            .swarm(swarm_with("http://localhost:9"))
            .build();
        let result = list(&host, json!({}), &CallContext::new()).await.unwrap();
        assert_eq!(result["total"], json!(1));
        assert_eq!(result["agents"][0]["id"], json!("critic"));
    }

    #[tokio::test]
    async fn test_call_agent_round_trip() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"graded": "A"})))
            .mount(&server)
            .await;

        let host = Host::builder().swarm(swarm_with(&server.uri())).build();
        let result = call(
            &host,
            json!({"agent": "critic", "payload": {"code": "fn main() {}"}}),
            &CallContext::new(),
        )
        .await
        .unwrap();
        assert_eq!(result["agent"], json!("critic"));
        assert_eq!(result["result"]["graded"], json!("A"));
    }

    #[tokio::test]
    async fn test_call_unknown_agent() {
        let host = Host::builder().build();
        let err = call(&host, json!({"agent": "ghosty"}), &CallContext::new())
            .await
            .unwrap_err();
        assert!(matches!(err, HostError::BadRequest(_)));
    }

    #[tokio::test]
    async fn test_swarm_routes_by_keyword() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"ok": 1})))
            .mount(&server)
            .await;

        let host = Host::builder().swarm(swarm_with(&server.uri())).build();
        let result = swarm(
            &host,
            json!({"task": "judge this code"}),
            &CallContext::new(),
        )
        .await
        .unwrap();
        assert_eq!(result["agent"], json!("critic"));
    }

    #[tokio::test]
    async fn test_tribunal_with_no_agents() {
        let host = Host::builder().build();
        let err = tribunal(
            &host,
            json!({"task": {"type": "code-review", "content": "diff"}}),
            &CallContext::new(),
        )
        .await
        .unwrap_err();
        assert_eq!(err.kind(), ghost_protocol::ErrorKind::NoJudgesOnline);
    }

    #[tokio::test]
    async fn test_tribunal_sessions_through_handler() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "verdict": "approve",
                "confidence": 0.8,
                "reasoning": "fine"
            })))
            .mount(&server)
            .await;

        let host = Host::builder().swarm(swarm_with(&server.uri())).build();
        let session = tribunal(
            &host,
            json!({"task": {"type": "code-review", "content": "diff"}, "timeout_ms": 2000}),
            &CallContext::new(),
        )
        .await
        .unwrap();
        assert_eq!(session["consensus"]["verdict"], json!("approve"));
        assert_eq!(session["consensus"]["agreement_rate"], json!(1.0));
    }
}
