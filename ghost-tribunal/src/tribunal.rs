// ghost-tribunal: Parallel vote collection and verdict assembly

use crate::disagreement::{DisagreementLog, DisagreementRecord};
use crate::error::{TribunalError, TribunalResult};
use crate::judge::{Judge, JudgeClient};
use crate::session::{compute_consensus, Consensus, Session, Task, Vote};
use crate::template::render_prompt;
use futures::future::join_all;
use serde_json::Value;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{info, warn};
use uuid::Uuid;

/// Verdict reported when no judge produced a usable vote.
pub const NO_QUORUM_VERDICT: &str = "no-quorum";

/// Tribunal configuration.
#[derive(Debug, Clone)]
pub struct TribunalConfig {
    /// Deadline for one judge call.
    pub judge_deadline: Duration,
    /// Global deadline for the whole session.
    pub global_deadline: Duration,
}

impl Default for TribunalConfig {
    fn default() -> Self {
        Self {
            judge_deadline: Duration::from_secs(20),
            global_deadline: Duration::from_secs(30),
        }
    }
}

/// The tribunal: dispatches a task to every judge in the slate in
/// parallel, joins before returning, and records disagreements.
pub struct Tribunal {
    config: TribunalConfig,
    client: Arc<dyn JudgeClient>,
    disagreements: DisagreementLog,
    sessions_total: AtomicU64,
    sessions_unanimous: AtomicU64,
}

impl Tribunal {
    pub fn new(config: TribunalConfig, client: Arc<dyn JudgeClient>) -> Self {
        Self {
            config,
            client,
            disagreements: DisagreementLog::new(),
            sessions_total: AtomicU64::new(0),
            sessions_unanimous: AtomicU64::new(0),
        }
    }

    /// Evaluate a task against a judge slate. The caller deadline, when
    /// present, shortens the configured global deadline.
    pub async fn evaluate(
        &self,
        task: &Task,
        judges: &[Judge],
        caller_deadline: Option<Duration>,
    ) -> TribunalResult<Session> {
        let slate: Vec<&Judge> = judges.iter().filter(|j| j.is_online()).collect();
        if slate.is_empty() {
            return Err(TribunalError::NoJudgesOnline);
        }

        let global = match caller_deadline {
            Some(caller) => caller.min(self.config.global_deadline),
            None => self.config.global_deadline,
        };
        let per_judge = self.config.judge_deadline.min(global);

        let prompt = render_prompt(task);
        let task_json = serde_json::to_value(task).unwrap_or(Value::Null);

        let dispatches = slate.iter().map(|judge| {
            let client = self.client.clone();
            let prompt = prompt.clone();
            let task_json = task_json.clone();
            async move {
                let started = Instant::now();
                // Late results past the per-judge deadline are dropped by
                // the timeout wrapper; the judge is recorded as an error
                // vote.
                let outcome =
                    tokio::time::timeout(per_judge, client.solicit(judge, &prompt, &task_json, per_judge))
                        .await;
                let latency_ms = started.elapsed().as_millis() as u64;
                match outcome {
                    Ok(Ok(reply)) => Vote {
                        judge: judge.id.clone(),
                        verdict: reply.verdict,
                        confidence: reply.confidence.clamp(0.0, 1.0),
                        reasoning: reply.reasoning,
                        latency_ms,
                        error: None,
                    },
                    Ok(Err(e)) => {
                        warn!(judge = %judge.id, error = %e, "judge errored");
                        error_vote(&judge.id, latency_ms, e.to_string())
                    }
                    Err(_) => {
                        warn!(judge = %judge.id, "judge deadline elapsed");
                        error_vote(&judge.id, latency_ms, "deadline exceeded".to_string())
                    }
                }
            }
        });

        let votes: Vec<Vote> = join_all(dispatches).await;
        self.sessions_total.fetch_add(1, Ordering::SeqCst);

        let consensus = compute_consensus(&votes).unwrap_or(Consensus {
            verdict: NO_QUORUM_VERDICT.to_string(),
            confidence: 0.0,
            agreement_rate: 0.0,
        });

        let valid_count = votes.iter().filter(|v| !v.is_error()).count();
        let unanimous = valid_count > 0 && consensus.agreement_rate == 1.0;
        if unanimous {
            self.sessions_unanimous.fetch_add(1, Ordering::SeqCst);
        }

        let escalation = if valid_count == 0 {
            "human-review-required".to_string()
        } else if !unanimous {
            let severity = self.disagreements.record(
                &task.task_type,
                &task.content,
                &votes,
                &consensus,
            );
            escalation_advice(
                &task.task_type,
                consensus.agreement_rate,
                severity == crate::disagreement::Severity::High,
            )
        } else {
            escalation_advice(&task.task_type, consensus.agreement_rate, false)
        };

        let session = Session {
            id: Uuid::new_v4().to_string(),
            task_type: task.task_type.clone(),
            judges: slate.iter().map(|j| j.id.clone()).collect(),
            votes,
            consensus,
            unanimous,
            escalation,
        };

        info!(
            session = %session.id,
            verdict = %session.consensus.verdict,
            agreement = session.consensus.agreement_rate,
            judges = session.judges.len(),
            "tribunal session complete"
        );
        Ok(session)
    }

    pub fn disagreements(&self) -> Vec<DisagreementRecord> {
        self.disagreements.list()
    }

    pub fn session_counts(&self) -> (u64, u64) {
        (
            self.sessions_total.load(Ordering::SeqCst),
            self.sessions_unanimous.load(Ordering::SeqCst),
        )
    }
}

fn error_vote(judge: &str, latency_ms: u64, error: String) -> Vote {
    Vote {
        judge: judge.to_string(),
        verdict: "error".to_string(),
        confidence: 0.0,
        reasoning: String::new(),
        latency_ms,
        error: Some(error),
    }
}

fn escalation_advice(task_type: &str, agreement_rate: f64, high_severity: bool) -> String {
    if high_severity && agreement_rate < 1.0 {
        return "human-review-required".to_string();
    }
    if task_type == "security-audit" && agreement_rate < 0.75 {
        return "human-review-recommended".to_string();
    }
    "log-and-proceed".to_string()
}
