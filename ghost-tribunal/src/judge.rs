// ghost-tribunal: Judge slate and judge transport

use crate::error::{TribunalError, TribunalResult};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::time::Duration;

/// Declared status of a judge in the swarm config.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum JudgeStatus {
    #[default]
    Online,
    Offline,
}

/// One judge: typically a remote model server exposing an evaluation
/// endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Judge {
    pub id: String,
    pub url: String,
    #[serde(default)]
    pub skills: Vec<String>,
    #[serde(default = "default_priority")]
    pub priority: u32,
    #[serde(default)]
    pub status: JudgeStatus,
}

fn default_priority() -> u32 {
    5
}

impl Judge {
    pub fn is_online(&self) -> bool {
        self.status == JudgeStatus::Online
    }
}

/// Raw reply a judge produces for a prompt. Missing fields fall back to
/// neutral defaults rather than failing the vote.
#[derive(Debug, Clone, Deserialize)]
pub struct JudgeReply {
    #[serde(default = "default_verdict")]
    pub verdict: String,
    #[serde(default = "default_confidence")]
    pub confidence: f64,
    #[serde(default)]
    pub reasoning: String,
}

fn default_verdict() -> String {
    "unknown".to_string()
}

fn default_confidence() -> f64 {
    0.5
}

/// Transport to a judge. Injectable so sessions are testable without a
/// model server.
#[async_trait]
pub trait JudgeClient: Send + Sync {
    async fn solicit(
        &self,
        judge: &Judge,
        prompt: &str,
        task: &Value,
        deadline: Duration,
    ) -> TribunalResult<JudgeReply>;
}

/// HTTP judge transport: POSTs the prompt and task to the judge's URL.
pub struct HttpJudgeClient {
    client: reqwest::Client,
}

impl HttpJudgeClient {
    pub fn new() -> Self {
        Self {
            client: reqwest::Client::new(),
        }
    }
}

impl Default for HttpJudgeClient {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl JudgeClient for HttpJudgeClient {
    async fn solicit(
        &self,
        judge: &Judge,
        prompt: &str,
        task: &Value,
        deadline: Duration,
    ) -> TribunalResult<JudgeReply> {
        let response = self
            .client
            .post(&judge.url)
            .timeout(deadline)
            .json(&json!({ "prompt": prompt, "task": task }))
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    TribunalError::DeadlineExceeded(judge.id.clone())
                } else {
                    TribunalError::Transport(format!("{}: {}", judge.id, e))
                }
            })?;

        if !response.status().is_success() {
            return Err(TribunalError::Transport(format!(
                "{} returned {}",
                judge.id,
                response.status()
            )));
        }

        response
            .json::<JudgeReply>()
            .await
            .map_err(|e| TribunalError::Transport(format!("{}: {}", judge.id, e)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{body_partial_json, method};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[test]
    fn test_judge_defaults() {
        let judge: Judge =
            serde_json::from_str(r#"{"id":"a","url":"http://localhost:1"}"#).unwrap();
        assert!(judge.is_online());
        assert_eq!(judge.priority, 5);
    }

    #[test]
    fn test_reply_missing_fields_default() {
        let reply: JudgeReply = serde_json::from_str("{}").unwrap();
        assert_eq!(reply.verdict, "unknown");
        assert_eq!(reply.confidence, 0.5);
    }

    #[tokio::test]
    async fn test_http_client_posts_prompt_and_task() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(body_partial_json(json!({"prompt": "judge this"})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "verdict": "approve",
                "confidence": 0.9,
                "reasoning": "clean"
            })))
            .mount(&server)
            .await;

        let judge = Judge {
            id: "a".into(),
            url: server.uri(),
            skills: vec![],
            priority: 5,
            status: JudgeStatus::Online,
        };
        let client = HttpJudgeClient::new();
        let reply = client
            .solicit(&judge, "judge this", &json!({"type": "code-review"}), Duration::from_secs(2))
            .await
            .unwrap();
        assert_eq!(reply.verdict, "approve");
        assert_eq!(reply.confidence, 0.9);
    }

    #[tokio::test]
    async fn test_http_client_non_2xx_is_transport_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let judge = Judge {
            id: "a".into(),
            url: server.uri(),
            skills: vec![],
            priority: 5,
            status: JudgeStatus::Online,
        };
        let err = HttpJudgeClient::new()
            .solicit(&judge, "p", &json!({}), Duration::from_secs(2))
            .await
            .unwrap_err();
        assert!(matches!(err, TribunalError::Transport(_)));
    }
}
