// ghost-registry: Advisory ghost.json snapshot
//
// Written next to the tape root for external tooling. Never read back;
// the registry is rebuilt from the filesystem on every boot.

use crate::error::RegistryResult;
use crate::manifest::ApiEndpoint;
use crate::registry::TapeRegistry;
use chrono::Utc;
use serde::Serialize;
use serde_json::json;
use std::collections::BTreeMap;
use std::path::Path;
use tracing::info;

/// Snapshot format version.
const SNAPSHOT_VERSION: u32 = 1;

#[derive(Debug, Serialize)]
struct SnapshotTape {
    path: String,
    entry: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    api: Option<String>,
    status: String,
}

/// Serialise the registry to `ghost.json` at `path`.
pub fn write_snapshot(
    registry: &TapeRegistry,
    path: &Path,
    host: &str,
    external: &BTreeMap<String, String>,
) -> RegistryResult<()> {
    let tapes: BTreeMap<String, SnapshotTape> = registry
        .list()
        .into_iter()
        .map(|entry| {
            let descriptor = &entry.descriptor;
            let api = descriptor.api.as_ref().map(|endpoint| match endpoint {
                ApiEndpoint::LocalHandler(name) => name.clone(),
                ApiEndpoint::RemoteHttp(url) => url.clone(),
            });
            (
                descriptor.id.clone(),
                SnapshotTape {
                    path: descriptor.root.display().to_string(),
                    entry: descriptor.entry.clone(),
                    api,
                    status: entry.state.to_string(),
                },
            )
        })
        .collect();

    let snapshot = json!({
        "version": SNAPSHOT_VERSION,
        "generated": Utc::now().to_rfc3339(),
        "tapes": tapes,
        "host": host,
        "external": external,
    });

    let rendered = serde_json::to_string_pretty(&snapshot)
        .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
    std::fs::write(path, rendered.as_bytes())?;
    info!(path = %path.display(), tapes = registry.len(), "registry snapshot written");
    Ok(())
}
