// ghost-registry: Manifest loading and descriptor validation

use crate::error::{RegistryError, RegistryResult};
use serde::{Deserialize, Serialize};
use std::path::{Component, Path, PathBuf};

/// Manifest file name at a tape's root.
pub const MANIFEST_FILE: &str = "tape.json";

/// Declared capability of a tape.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Capability {
    Ui,
    Api,
    Agents,
    Dataset,
}

/// Filesystem permission declared by a tape.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum FsPermission {
    #[default]
    None,
    ReadOnly,
    ReadWrite,
}

/// Network permission declared by a tape.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum NetworkPermission {
    #[default]
    None,
    Loopback,
    Any,
}

/// Declared permission set. Field names are part of the manifest contract.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct Permissions {
    #[serde(default)]
    pub fs: FsPermission,
    #[serde(default)]
    pub network: NetworkPermission,
    #[serde(default)]
    pub shell: bool,
}

/// Declared agent entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TapeAgent {
    pub id: String,
    #[serde(default)]
    pub skills: Vec<String>,
}

/// Optional descriptive metadata.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct TapeMeta {
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
}

/// Classified API endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "kebab-case")]
pub enum ApiEndpoint {
    /// Name of a registered in-process handler.
    LocalHandler(String),
    /// Absolute HTTP(S) URL.
    RemoteHttp(String),
}

/// Raw manifest as read from disk. Unknown fields are ignored for forward
/// compatibility.
#[derive(Debug, Clone, Deserialize)]
struct RawManifest {
    id: String,
    name: String,
    version: String,
    entry: String,
    #[serde(default)]
    api: Option<String>,
    #[serde(default)]
    agents: Vec<TapeAgent>,
    #[serde(default)]
    capabilities: Vec<Capability>,
    #[serde(default)]
    permissions: Permissions,
    #[serde(default)]
    meta: TapeMeta,
}

/// Validated, immutable tape descriptor.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TapeDescriptor {
    pub id: String,
    pub name: String,
    pub version: (u32, u32, u32),
    pub root: PathBuf,
    /// UI entry, relative to `root`, verified to resolve inside it.
    pub entry: String,
    pub api: Option<ApiEndpoint>,
    pub agents: Vec<TapeAgent>,
    pub capabilities: Vec<Capability>,
    pub permissions: Permissions,
    pub meta: TapeMeta,
}

impl TapeDescriptor {
    pub fn version_string(&self) -> String {
        format!("{}.{}.{}", self.version.0, self.version.1, self.version.2)
    }

    /// Absolute path of the UI entry.
    pub fn entry_path(&self) -> PathBuf {
        self.root.join(&self.entry)
    }
}

/// Load and validate the manifest at `dir`. `is_handler` decides whether
/// an api value names a registered in-process handler.
pub fn load_manifest(
    dir: &Path,
    is_handler: &(dyn Fn(&str) -> bool + Send + Sync),
) -> RegistryResult<TapeDescriptor> {
    let path = dir.join(MANIFEST_FILE);
    if !path.is_file() {
        return Err(RegistryError::ManifestMissing(path.display().to_string()));
    }
    let content = std::fs::read_to_string(&path)?;
    let raw: RawManifest = serde_json::from_str(&content)
        .map_err(|e| RegistryError::ManifestParse(e.to_string()))?;

    validate_identifier(&raw.id)?;
    let version = parse_version(&raw.version)?;
    validate_entry(&raw.entry)?;
    let api = match &raw.api {
        None => None,
        Some(value) => Some(classify_endpoint(value, is_handler)?),
    };

    Ok(TapeDescriptor {
        id: raw.id,
        name: raw.name,
        version,
        root: dir.to_path_buf(),
        entry: raw.entry,
        api,
        agents: raw.agents,
        capabilities: raw.capabilities,
        permissions: raw.permissions,
        meta: raw.meta,
    })
}

fn validate_identifier(id: &str) -> RegistryResult<()> {
    let valid = !id.is_empty()
        && id
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-');
    if !valid {
        return Err(RegistryError::invalid_field(
            "id",
            format!("'{}' is not lowercase-alphanumeric-with-dash", id),
        ));
    }
    Ok(())
}

fn parse_version(raw: &str) -> RegistryResult<(u32, u32, u32)> {
    let parts: Vec<&str> = raw.split('.').collect();
    if parts.len() != 3 {
        return Err(RegistryError::invalid_field(
            "version",
            format!("'{}' is not MAJOR.MINOR.PATCH", raw),
        ));
    }
    let mut nums = [0u32; 3];
    for (slot, part) in nums.iter_mut().zip(&parts) {
        *slot = part.parse::<u32>().map_err(|_| {
            RegistryError::invalid_field("version", format!("'{}' is not MAJOR.MINOR.PATCH", raw))
        })?;
    }
    Ok((nums[0], nums[1], nums[2]))
}

/// The UI entry must resolve inside the tape root after lexical
/// normalisation. Absolute paths and `..` escapes are rejected.
fn validate_entry(entry: &str) -> RegistryResult<()> {
    let candidate = Path::new(entry);
    if candidate.is_absolute() {
        return Err(RegistryError::EntryEscape(entry.to_string()));
    }
    let mut depth: i32 = 0;
    for component in candidate.components() {
        match component {
            Component::ParentDir => {
                depth -= 1;
                if depth < 0 {
                    return Err(RegistryError::EntryEscape(entry.to_string()));
                }
            }
            Component::Normal(_) => depth += 1,
            Component::CurDir => {}
            Component::RootDir | Component::Prefix(_) => {
                return Err(RegistryError::EntryEscape(entry.to_string()));
            }
        }
    }
    Ok(())
}

fn classify_endpoint(
    value: &str,
    is_handler: &(dyn Fn(&str) -> bool + Send + Sync),
) -> RegistryResult<ApiEndpoint> {
    if value.starts_with("http://") || value.starts_with("https://") {
        return Ok(ApiEndpoint::RemoteHttp(value.to_string()));
    }
    if is_handler(value) {
        return Ok(ApiEndpoint::LocalHandler(value.to_string()));
    }
    Err(RegistryError::invalid_field(
        "api",
        format!("'{}' is neither a registered handler nor an absolute URL", value),
    ))
}
