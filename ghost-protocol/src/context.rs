// ghost-protocol: Per-call context carried alongside the envelope

use serde_json::{Map, Value};
use std::time::Duration;
use uuid::Uuid;

/// Default inter-tape hop budget.
pub const DEFAULT_HOP_LIMIT: u32 = 8;

/// Call context decoded from the envelope's optional `context` map.
///
/// Carries the inter-tape hop budget, an optional caller deadline that
/// downstream calls shorten theirs to, and a correlation id for log lines.
#[derive(Debug, Clone)]
pub struct CallContext {
    pub hops: u32,
    pub deadline: Option<Duration>,
    pub correlation_id: String,
    /// Remaining caller-supplied context entries, passed through to
    /// handlers untouched.
    pub extra: Map<String, Value>,
}

impl CallContext {
    pub fn new() -> Self {
        Self {
            hops: DEFAULT_HOP_LIMIT,
            deadline: None,
            correlation_id: Uuid::new_v4().to_string(),
            extra: Map::new(),
        }
    }

    /// Decode from an envelope context map. Unknown keys are preserved in
    /// `extra`; a missing map yields defaults.
    pub fn from_map(map: Option<&Map<String, Value>>) -> Self {
        let mut ctx = Self::new();
        let Some(map) = map else { return ctx };

        for (key, value) in map {
            match key.as_str() {
                "hops" => {
                    if let Some(n) = value.as_u64() {
                        ctx.hops = n.min(u32::MAX as u64) as u32;
                    }
                }
                "deadline_ms" => {
                    if let Some(ms) = value.as_u64() {
                        ctx.deadline = Some(Duration::from_millis(ms));
                    }
                }
                "correlation_id" => {
                    if let Some(id) = value.as_str() {
                        ctx.correlation_id = id.to_string();
                    }
                }
                _ => {
                    ctx.extra.insert(key.clone(), value.clone());
                }
            }
        }
        ctx
    }

    /// Encode back into an envelope context map for forwarding.
    pub fn to_map(&self) -> Map<String, Value> {
        let mut map = self.extra.clone();
        map.insert("hops".into(), Value::from(self.hops));
        if let Some(deadline) = self.deadline {
            map.insert("deadline_ms".into(), Value::from(deadline.as_millis() as u64));
        }
        map.insert(
            "correlation_id".into(),
            Value::from(self.correlation_id.clone()),
        );
        map
    }

    /// Derive the context for one proxy hop deeper. Returns `None` when
    /// the hop budget is exhausted.
    pub fn next_hop(&self) -> Option<Self> {
        if self.hops == 0 {
            return None;
        }
        let mut next = self.clone();
        next.hops -= 1;
        Some(next)
    }

    /// Effective deadline for a downstream call with its own policy cap.
    pub fn effective_deadline(&self, policy: Duration) -> Duration {
        match self.deadline {
            Some(caller) => caller.min(policy),
            None => policy,
        }
    }
}

impl Default for CallContext {
    fn default() -> Self {
        Self::new()
    }
}
