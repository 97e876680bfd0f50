// ghost-tribunal: Sessions, votes and consensus math

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Task put before a tribunal.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Task {
    /// Task type selecting the prompt template, e.g. "code-review".
    #[serde(rename = "type")]
    pub task_type: String,
    pub content: String,
    #[serde(default)]
    pub context: serde_json::Map<String, serde_json::Value>,
}

/// One judge's vote. A judge that errored or timed out is recorded with
/// verdict "error" and excluded from consensus.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Vote {
    pub judge: String,
    pub verdict: String,
    pub confidence: f64,
    pub reasoning: String,
    pub latency_ms: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl Vote {
    pub fn is_error(&self) -> bool {
        self.error.is_some()
    }
}

/// Aggregate outcome of a session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Consensus {
    pub verdict: String,
    /// avg(confidence) * 0.6 + agreement_rate * 0.4, clamped to [0, 1].
    pub confidence: f64,
    /// majority count / total non-error votes.
    pub agreement_rate: f64,
}

/// A completed tribunal session.
#[derive(Debug, Clone, Serialize)]
pub struct Session {
    pub id: String,
    pub task_type: String,
    pub judges: Vec<String>,
    pub votes: Vec<Vote>,
    pub consensus: Consensus,
    pub unanimous: bool,
    pub escalation: String,
}

/// Compute the consensus over non-error votes. Returns `None` when no
/// vote survived (the caller reports no-quorum).
pub fn compute_consensus(votes: &[Vote]) -> Option<Consensus> {
    let valid: Vec<&Vote> = votes.iter().filter(|v| !v.is_error()).collect();
    if valid.is_empty() {
        return None;
    }

    let mut counts: HashMap<&str, usize> = HashMap::new();
    for vote in &valid {
        *counts.entry(vote.verdict.as_str()).or_insert(0) += 1;
    }
    // Mode over verdicts; ties break on verdict name for determinism.
    let (winner, majority) = counts
        .into_iter()
        .max_by(|a, b| a.1.cmp(&b.1).then_with(|| b.0.cmp(a.0)))?;

    let agreement_rate = majority as f64 / valid.len() as f64;
    let avg_confidence =
        valid.iter().map(|v| v.confidence).sum::<f64>() / valid.len() as f64;
    let confidence = (avg_confidence * 0.6 + agreement_rate * 0.4).clamp(0.0, 1.0);

    Some(Consensus {
        verdict: winner.to_string(),
        confidence,
        agreement_rate,
    })
}

/// Population standard deviation of the non-error confidences.
pub fn confidence_spread(votes: &[Vote]) -> f64 {
    let valid: Vec<f64> = votes
        .iter()
        .filter(|v| !v.is_error())
        .map(|v| v.confidence)
        .collect();
    if valid.len() < 2 {
        return 0.0;
    }
    let mean = valid.iter().sum::<f64>() / valid.len() as f64;
    let variance =
        valid.iter().map(|c| (c - mean).powi(2)).sum::<f64>() / valid.len() as f64;
    variance.sqrt()
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

    fn error_vote(judge: &str) -> Vote {
        Vote {
            judge: judge.into(),
            verdict: "error".into(),
            confidence: 0.0,
            reasoning: String::new(),
            latency_ms: 1,
            error: Some("timeout".into()),
        }
    }

    #[test]
    fn test_unanimous_consensus_blend() {
        let votes = vec![
            vote("a", "approve", 0.8),
            vote("b", "approve", 0.9),
            vote("c", "approve", 0.85),
        ];
        let consensus = compute_consensus(&votes).unwrap();
        assert_eq!(consensus.verdict, "approve");
        assert_eq!(consensus.agreement_rate, 1.0);
        // avg 0.85 * 0.6 + 1.0 * 0.4 = 0.91
        assert!((consensus.confidence - 0.91).abs() < 1e-9);
    }

    #[test]
    fn test_majority_wins_and_rate_is_fraction() {
        let votes = vec![
            vote("a", "approve", 0.9),
            vote("b", "approve", 0.8),
            vote("c", "reject", 0.7),
        ];
        let consensus = compute_consensus(&votes).unwrap();
        assert_eq!(consensus.verdict, "approve");
        assert!((consensus.agreement_rate - 2.0 / 3.0).abs() < 1e-9);
        // majority count must be recoverable: rate * total is integral
        let majority = consensus.agreement_rate * 3.0;
        assert!((majority - majority.round()).abs() < 1e-9);
    }

    #[test]
    fn test_error_votes_excluded() {
        let votes = vec![vote("a", "approve", 0.9), error_vote("b")];
        let consensus = compute_consensus(&votes).unwrap();
        assert_eq!(consensus.verdict, "approve");
        assert_eq!(consensus.agreement_rate, 1.0);
    }

    #[test]
    fn test_all_errors_is_no_consensus() {
        let votes = vec![error_vote("a"), error_vote("b")];
        assert!(compute_consensus(&votes).is_none());
    }

    #[test]
    fn test_confidence_spread() {
        let votes = vec![vote("a", "x", 0.5), vote("b", "x", 0.9)];
        assert!((confidence_spread(&votes) - 0.2).abs() < 1e-9);
        assert_eq!(confidence_spread(&votes[..1]), 0.0);
    }
}
