// ghost-host: Micronaut brain cache and lightweight inference
//
// The brain is a small JSON model (intents, responses, n-gram
// continuations) produced by external training tooling. It is loaded
// lazily, once, and read-only afterwards. A missing model is a normal
// condition, never a failure.

use parking_lot::Mutex;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, warn};

/// Brain file name inside the configured brains directory.
pub const BRAIN_FILE: &str = "brain.json";

/// Parsed brain model.
#[derive(Debug, Clone, Deserialize)]
pub struct Brain {
    pub name: String,
    /// intent -> trigger keywords
    #[serde(default)]
    pub intents: BTreeMap<String, Vec<String>>,
    /// intent -> canned responses
    #[serde(default)]
    pub responses: BTreeMap<String, Vec<String>>,
    /// token -> likely continuations
    #[serde(default)]
    pub ngrams: BTreeMap<String, Vec<String>>,
}

impl Brain {
    /// Score every intent by keyword overlap; best match with its score.
    pub fn classify_intent(&self, text: &str) -> Option<(String, f64)> {
        let lowered = text.to_lowercase();
        let words: Vec<&str> = lowered.split_whitespace().collect();
        if words.is_empty() {
            return None;
        }
        let mut best: Option<(String, f64)> = None;
        for (intent, keywords) in &self.intents {
            let hits = keywords
                .iter()
                .filter(|k| {
                    let k = k.to_lowercase();
                    words.iter().any(|w| *w == k) || lowered.contains(&k)
                })
                .count();
            if hits == 0 {
                continue;
            }
            let score = hits as f64 / keywords.len().max(1) as f64;
            if best.as_ref().map_or(true, |(_, s)| score > *s) {
                best = Some((intent.clone(), score));
            }
        }
        best
    }

    /// Greedy n-gram walk from the last prompt token.
    pub fn complete(&self, prompt: &str, max_tokens: usize) -> Vec<String> {
        let mut out = Vec::new();
        let mut cursor = match prompt.split_whitespace().last() {
            Some(last) => last.to_lowercase(),
            None => return out,
        };
        for _ in 0..max_tokens {
            let Some(candidates) = self.ngrams.get(&cursor) else { break };
            let Some(next) = candidates.first() else { break };
            out.push(next.clone());
            cursor = next.to_lowercase();
        }
        out
    }

    /// First canned response for an intent.
    pub fn respond(&self, intent: &str) -> Option<&str> {
        self.responses
            .get(intent)
            .and_then(|list| list.first())
            .map(String::as_str)
    }
}

enum CacheSlot {
    Unloaded,
    Loaded(Arc<Brain>),
    Absent,
}

/// One-shot lazy brain cache. The load happens at most once under the
/// mutex; afterwards reads are lock-then-clone of an Arc.
pub struct BrainCache {
    path: PathBuf,
    slot: Mutex<CacheSlot>,
}

impl BrainCache {
    /// `brains_dir` is scanned for `brain.json` on first use.
    pub fn new(brains_dir: impl Into<PathBuf>) -> Self {
        Self {
            path: brains_dir.into(),
            slot: Mutex::new(CacheSlot::Unloaded),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// The brain, loading it on first call. `None` means no model on
    /// disk, which callers surface as a marker result.
    pub fn get(&self) -> Option<Arc<Brain>> {
        let mut slot = self.slot.lock();
        match &*slot {
            CacheSlot::Loaded(brain) => Some(brain.clone()),
            CacheSlot::Absent => None,
            CacheSlot::Unloaded => {
                let loaded = self.load();
                match loaded {
                    Some(brain) => {
                        let brain = Arc::new(brain);
                        *slot = CacheSlot::Loaded(brain.clone());
                        Some(brain)
                    }
                    None => {
                        *slot = CacheSlot::Absent;
                        None
                    }
                }
            }
        }
    }

    fn load(&self) -> Option<Brain> {
        let file = self.path.join(BRAIN_FILE);
        if !file.is_file() {
            info!(path = %file.display(), "no brain model on disk");
            return None;
        }
        match std::fs::read_to_string(&file) {
            Ok(raw) => match serde_json::from_str::<Brain>(&raw) {
                Ok(brain) => {
                    info!(model = %brain.name, "brain model loaded");
                    Some(brain)
                }
                Err(e) => {
                    warn!(path = %file.display(), error = %e, "brain model unreadable");
                    None
                }
            },
            Err(e) => {
                warn!(path = %file.display(), error = %e, "brain model unreadable");
                None
            }
        }
    }
}
