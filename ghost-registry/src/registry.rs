// ghost-registry: Authoritative tape set and mount lifecycle

use crate::error::{RegistryError, RegistryResult};
use crate::manifest::{load_manifest, TapeDescriptor};
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

/// Mount state of a registry entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MountState {
    Unmounted,
    Mounting,
    Mounted,
    Unmounting,
    Failed,
}

impl fmt::Display for MountState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            MountState::Unmounted => "unmounted",
            MountState::Mounting => "mounting",
            MountState::Mounted => "mounted",
            MountState::Unmounting => "unmounting",
            MountState::Failed => "failed",
        };
        f.write_str(s)
    }
}

/// Registry configuration.
#[derive(Debug, Clone)]
pub struct RegistryConfig {
    /// Tape root directory scanned for tapes.
    pub tape_root: PathBuf,
    /// State newly discovered tapes start in.
    pub mount_on_discover: bool,
    /// How long unmount waits for inflight requests before forcing.
    pub drain_deadline: Duration,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            tape_root: PathBuf::from("tapes"),
            mount_on_discover: true,
            drain_deadline: Duration::from_secs(5),
        }
    }
}

/// One registry entry: descriptor plus mount state.
#[derive(Debug, Clone)]
pub struct TapeEntry {
    pub descriptor: Arc<TapeDescriptor>,
    pub state: MountState,
    /// Failure text when state is `Failed`.
    pub failure: Option<String>,
    /// Incremented on every mount.
    pub generation: u64,
    pub last_access: DateTime<Utc>,
    inflight: Arc<AtomicU64>,
}

impl TapeEntry {
    pub fn inflight(&self) -> u64 {
        self.inflight.load(Ordering::SeqCst)
    }
}

/// One scan failure, recorded without aborting the scan.
#[derive(Debug, Clone, Serialize)]
pub struct ScanFailure {
    pub directory: String,
    pub error: String,
    pub kind: String,
}

/// Result of a scan pass.
#[derive(Debug, Clone, Serialize, Default)]
pub struct ScanReport {
    pub discovered: Vec<String>,
    pub failures: Vec<ScanFailure>,
}

struct Entries {
    by_id: HashMap<String, TapeEntry>,
    /// Insertion order, for reproducible listing.
    order: Vec<String>,
}

/// The authoritative set of known tapes.
///
/// Mutations take the write lock briefly to flip state; readers take the
/// shared lock. Inflight-request counting is atomic per entry so unmount
/// can wait for zero without holding any lock.
pub struct TapeRegistry {
    config: RegistryConfig,
    entries: RwLock<Entries>,
}

impl TapeRegistry {
    pub fn new(config: RegistryConfig) -> Self {
        Self {
            config,
            entries: RwLock::new(Entries {
                by_id: HashMap::new(),
                order: Vec::new(),
            }),
        }
    }

    pub fn tape_root(&self) -> &Path {
        &self.config.tape_root
    }

    /// Scan immediate subdirectories of the tape root and register every
    /// valid manifest. Failures are recorded, never fatal.
    pub fn scan(&self, is_handler: &(dyn Fn(&str) -> bool + Send + Sync)) -> RegistryResult<ScanReport> {
        let mut report = ScanReport::default();
        let root = &self.config.tape_root;
        let read_dir = std::fs::read_dir(root)?;

        let mut dirs: Vec<PathBuf> = read_dir
            .filter_map(|entry| entry.ok())
            .map(|entry| entry.path())
            .filter(|path| path.is_dir())
            .collect();
        dirs.sort();

        for dir in dirs {
            match load_manifest(&dir, is_handler) {
                Ok(descriptor) => {
                    let id = descriptor.id.clone();
                    match self.register(descriptor) {
                        Ok(()) => report.discovered.push(id),
                        Err(e) => report.failures.push(ScanFailure {
                            directory: dir.display().to_string(),
                            kind: e.kind().as_str().to_string(),
                            error: e.to_string(),
                        }),
                    }
                }
                Err(e) => {
                    warn!(directory = %dir.display(), error = %e, "tape rejected at scan");
                    report.failures.push(ScanFailure {
                        directory: dir.display().to_string(),
                        kind: e.kind().as_str().to_string(),
                        error: e.to_string(),
                    });
                }
            }
        }
        info!(
            discovered = report.discovered.len(),
            failed = report.failures.len(),
            "tape scan complete"
        );
        Ok(report)
    }

    /// Register a validated descriptor. Re-registering the same tape
    /// directory is a no-op; a second tape claiming an existing id is
    /// rejected.
    pub fn register(&self, descriptor: TapeDescriptor) -> RegistryResult<()> {
        let mut entries = self.entries.write();
        if let Some(existing) = entries.by_id.get(&descriptor.id) {
            if existing.descriptor.root == descriptor.root {
                return Ok(());
            }
            return Err(RegistryError::AlreadyRegistered(descriptor.id));
        }
        let id = descriptor.id.clone();
        let state = if self.config.mount_on_discover {
            MountState::Mounted
        } else {
            MountState::Unmounted
        };
        let generation = u64::from(state == MountState::Mounted);
        entries.by_id.insert(
            id.clone(),
            TapeEntry {
                descriptor: Arc::new(descriptor),
                state,
                failure: None,
                generation,
                last_access: Utc::now(),
                inflight: Arc::new(AtomicU64::new(0)),
            },
        );
        entries.order.push(id);
        Ok(())
    }

    /// Lookup by identifier.
    pub fn get(&self, id: &str) -> RegistryResult<TapeEntry> {
        self.entries
            .read()
            .by_id
            .get(id)
            .cloned()
            .ok_or_else(|| RegistryError::TapeNotFound(id.to_string()))
    }

    /// List entries in insertion order.
    pub fn list(&self) -> Vec<TapeEntry> {
        let entries = self.entries.read();
        entries
            .order
            .iter()
            .filter_map(|id| entries.by_id.get(id).cloned())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.entries.read().order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Mount a tape. Idempotent once mounted. Runs the mount hook
    /// (UI entry existence check); a hook failure leaves the entry in
    /// `Failed`, recoverable by calling mount again.
    pub async fn mount(&self, id: &str) -> RegistryResult<TapeEntry> {
        let descriptor = {
            let mut entries = self.entries.write();
            let entry = entries
                .by_id
                .get_mut(id)
                .ok_or_else(|| RegistryError::TapeNotFound(id.to_string()))?;
            match entry.state {
                MountState::Mounted => return Ok(entry.clone()),
                MountState::Unmounted | MountState::Failed => {}
                MountState::Mounting | MountState::Unmounting => {
                    return Err(RegistryError::TapeBusy {
                        id: id.to_string(),
                        inflight: entry.inflight(),
                    })
                }
            }
            entry.state = MountState::Mounting;
            entry.failure = None;
            entry.generation += 1;
            entry.descriptor.clone()
        };

        let hook = run_mount_hooks(&descriptor);
        let mut entries = self.entries.write();
        let entry = entries
            .by_id
            .get_mut(id)
            .ok_or_else(|| RegistryError::TapeNotFound(id.to_string()))?;
        match hook {
            Ok(()) => {
                entry.state = MountState::Mounted;
                entry.last_access = Utc::now();
                info!(tape = id, generation = entry.generation, "tape mounted");
                Ok(entry.clone())
            }
            Err(e) => {
                entry.state = MountState::Failed;
                entry.failure = Some(e.to_string());
                warn!(tape = id, error = %e, "mount hook failed");
                Err(e)
            }
        }
    }

    /// Unmount a tape: stop accepting new requests, wait for inflight to
    /// reach zero within the drain deadline, then force completion.
    pub async fn unmount(&self, id: &str) -> RegistryResult<TapeEntry> {
        let inflight = {
            let mut entries = self.entries.write();
            let entry = entries
                .by_id
                .get_mut(id)
                .ok_or_else(|| RegistryError::TapeNotFound(id.to_string()))?;
            match entry.state {
                MountState::Unmounted => return Ok(entry.clone()),
                MountState::Mounted | MountState::Failed => {}
                MountState::Mounting | MountState::Unmounting => {
                    return Err(RegistryError::TapeBusy {
                        id: id.to_string(),
                        inflight: entry.inflight(),
                    })
                }
            }
            entry.state = MountState::Unmounting;
            entry.inflight.clone()
        };

        if !self.wait_for_drain(&inflight).await {
            warn!(
                tape = id,
                inflight = inflight.load(Ordering::SeqCst),
                "drain deadline elapsed, forcing unmount"
            );
        }

        let mut entries = self.entries.write();
        let entry = entries
            .by_id
            .get_mut(id)
            .ok_or_else(|| RegistryError::TapeNotFound(id.to_string()))?;
        entry.state = MountState::Unmounted;
        info!(tape = id, "tape unmounted");
        Ok(entry.clone())
    }

    /// Reload: drain, re-read the manifest, and mount the fresh
    /// descriptor. The inflight counter object survives the reload.
    pub async fn reload(
        &self,
        id: &str,
        is_handler: &(dyn Fn(&str) -> bool + Send + Sync),
    ) -> RegistryResult<TapeEntry> {
        let (root, inflight) = {
            let mut entries = self.entries.write();
            let entry = entries
                .by_id
                .get_mut(id)
                .ok_or_else(|| RegistryError::TapeNotFound(id.to_string()))?;
            if entry.state != MountState::Mounted {
                return Err(RegistryError::TapeBusy {
                    id: id.to_string(),
                    inflight: entry.inflight(),
                });
            }
            entry.state = MountState::Mounting;
            entry.generation += 1;
            (entry.descriptor.root.clone(), entry.inflight.clone())
        };

        self.wait_for_drain(&inflight).await;

        let reloaded = load_manifest(&root, is_handler);
        let mut entries = self.entries.write();
        let entry = entries
            .by_id
            .get_mut(id)
            .ok_or_else(|| RegistryError::TapeNotFound(id.to_string()))?;
        match reloaded {
            Ok(descriptor) if descriptor.id == id => {
                entry.descriptor = Arc::new(descriptor);
                entry.state = MountState::Mounted;
                entry.last_access = Utc::now();
                info!(tape = id, generation = entry.generation, "tape reloaded");
                Ok(entry.clone())
            }
            Ok(descriptor) => {
                entry.state = MountState::Failed;
                let err = RegistryError::invalid_field(
                    "id",
                    format!("reload changed id from '{}' to '{}'", id, descriptor.id),
                );
                entry.failure = Some(err.to_string());
                Err(err)
            }
            Err(e) => {
                entry.state = MountState::Failed;
                entry.failure = Some(e.to_string());
                Err(e)
            }
        }
    }

    /// Remove an unmounted tape from the registry entirely.
    pub fn remove(&self, id: &str) -> RegistryResult<()> {
        let mut entries = self.entries.write();
        let entry = entries
            .by_id
            .get(id)
            .ok_or_else(|| RegistryError::TapeNotFound(id.to_string()))?;
        if entry.state != MountState::Unmounted {
            return Err(RegistryError::TapeBusy {
                id: id.to_string(),
                inflight: entry.inflight(),
            });
        }
        entries.by_id.remove(id);
        entries.order.retain(|existing| existing != id);
        Ok(())
    }

    /// Begin a proxied request against a mounted tape. The returned guard
    /// holds the inflight count until dropped.
    pub fn begin_request(&self, id: &str) -> RegistryResult<InflightGuard> {
        let mut entries = self.entries.write();
        let entry = entries
            .by_id
            .get_mut(id)
            .ok_or_else(|| RegistryError::TapeNotFound(id.to_string()))?;
        if entry.state != MountState::Mounted {
            return Err(RegistryError::TapeBusy {
                id: id.to_string(),
                inflight: entry.inflight(),
            });
        }
        entry.last_access = Utc::now();
        entry.inflight.fetch_add(1, Ordering::SeqCst);
        Ok(InflightGuard {
            counter: entry.inflight.clone(),
        })
    }

    async fn wait_for_drain(&self, inflight: &Arc<AtomicU64>) -> bool {
        let deadline = tokio::time::Instant::now() + self.config.drain_deadline;
        while inflight.load(Ordering::SeqCst) > 0 {
            if tokio::time::Instant::now() >= deadline {
                return false;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        true
    }
}

/// RAII guard for one proxied request; decrements on drop.
pub struct InflightGuard {
    counter: Arc<AtomicU64>,
}

impl Drop for InflightGuard {
    fn drop(&mut self) {
        self.counter.fetch_sub(1, Ordering::SeqCst);
    }
}

fn run_mount_hooks(descriptor: &TapeDescriptor) -> RegistryResult<()> {
    let entry = descriptor.entry_path();
    if !entry.exists() {
        return Err(RegistryError::invalid_field(
            "entry",
            format!("UI entry missing on disk: {}", entry.display()),
        ));
    }
    Ok(())
}
