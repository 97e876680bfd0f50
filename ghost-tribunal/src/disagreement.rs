// ghost-tribunal: Disagreement ring buffer

use crate::session::{confidence_spread, Consensus, Vote};
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::Serialize;
use sha2::{Digest, Sha256};
use std::collections::VecDeque;

/// Capacity of the disagreement history.
pub const RING_CAPACITY: usize = 100;

/// Severity of a disagreement, derived from agreement rate and
/// confidence spread.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Low,
    Medium,
    High,
}

impl Severity {
    /// (1 - agreement) * 0.6 + spread * 0.4, thresholds 0.7 / 0.4.
    pub fn derive(agreement_rate: f64, spread: f64) -> Self {
        let score = (1.0 - agreement_rate) * 0.6 + spread * 0.4;
        if score >= 0.7 {
            Severity::High
        } else if score >= 0.4 {
            Severity::Medium
        } else {
            Severity::Low
        }
    }
}

/// One recorded disagreement. Task content is stored hashed.
#[derive(Debug, Clone, Serialize)]
pub struct DisagreementRecord {
    pub task_type: String,
    pub content_hash: String,
    pub votes: Vec<RecordedVote>,
    pub consensus_verdict: String,
    pub consensus_confidence: f64,
    pub agreement_rate: f64,
    pub severity: Severity,
    pub recorded_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
pub struct RecordedVote {
    pub judge: String,
    pub verdict: String,
    pub confidence: f64,
}

/// Bounded history of disagreements; append under one mutex, listing
/// shallow-copies before returning.
pub struct DisagreementLog {
    records: Mutex<VecDeque<DisagreementRecord>>,
    capacity: usize,
}

impl DisagreementLog {
    pub fn new() -> Self {
        Self::with_capacity(RING_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            records: Mutex::new(VecDeque::with_capacity(capacity)),
            capacity,
        }
    }

    /// Record a non-unanimous session.
    pub fn record(
        &self,
        task_type: &str,
        content: &str,
        votes: &[Vote],
        consensus: &Consensus,
    ) -> Severity {
        let spread = confidence_spread(votes);
        let severity = Severity::derive(consensus.agreement_rate, spread);
        let record = DisagreementRecord {
            task_type: task_type.to_string(),
            content_hash: hash_content(content),
            votes: votes
                .iter()
                .filter(|v| !v.is_error())
                .map(|v| RecordedVote {
                    judge: v.judge.clone(),
                    verdict: v.verdict.clone(),
                    confidence: v.confidence,
                })
                .collect(),
            consensus_verdict: consensus.verdict.clone(),
            consensus_confidence: consensus.confidence,
            agreement_rate: consensus.agreement_rate,
            severity,
            recorded_at: Utc::now(),
        };

        let mut records = self.records.lock();
        if records.len() >= self.capacity {
            records.pop_front();
        }
        records.push_back(record);
        severity
    }

    pub fn list(&self) -> Vec<DisagreementRecord> {
        self.records.lock().iter().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.records.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for DisagreementLog {
    fn default() -> Self {
        Self::new()
    }
}

fn hash_content(content: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(content.as_bytes());
    format!("{:x}", hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vote(judge: &str, verdict: &str, confidence: f64) -> Vote {
        Vote {
            judge: judge.into(),
            verdict: verdict.into(),
            confidence,
            reasoning: String::new(),
            latency_ms: 1,
            error: None,
        }
    }

    fn consensus(rate: f64) -> Consensus {
        Consensus {
            verdict: "approve".into(),
            confidence: 0.8,
            agreement_rate: rate,
        }
    }

    #[test]
    fn test_severity_thresholds() {
        assert_eq!(Severity::derive(1.0, 0.0), Severity::Low);
        assert_eq!(Severity::derive(0.3, 0.1), Severity::Medium);
        assert_eq!(Severity::derive(0.0, 0.3), Severity::High);
    }

    #[test]
    fn test_ring_buffer_bounded() {
        let log = DisagreementLog::with_capacity(3);
        for i in 0..5 {
            log.record(
                "code-review",
                &format!("content-{}", i),
                &[vote("a", "approve", 0.9), vote("b", "reject", 0.4)],
                &consensus(0.5),
            );
        }
        let records = log.list();
        assert_eq!(records.len(), 3);
        // Oldest entries were evicted.
        assert_eq!(records[0].content_hash, hash_content("content-2"));
    }

    #[test]
    fn test_content_is_hashed_not_stored() {
        let log = DisagreementLog::new();
        log.record(
            "security-audit",
            "secret payload",
            &[vote("a", "approve", 0.9), vote("b", "reject", 0.4)],
            &consensus(0.5),
        );
        let records = log.list();
        assert_ne!(records[0].content_hash, "secret payload");
        assert_eq!(records[0].content_hash.len(), 64);
    }
}
