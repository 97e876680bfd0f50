//! Tape registry
//!
//! Filesystem discovery of self-describing tapes, manifest validation into
//! immutable descriptors, and the mount/unmount lifecycle. The registry is
//! a rebuildable index of the tape filesystem; it is never persisted
//! (the optional `ghost.json` snapshot is advisory output only).

pub mod error;
pub mod manifest;
pub mod registry;
pub mod snapshot;

pub use error::{RegistryError, RegistryResult};
pub use manifest::{
    load_manifest, ApiEndpoint, Capability, FsPermission, NetworkPermission, Permissions,
    TapeAgent, TapeDescriptor, TapeMeta,
};
pub use registry::{
    InflightGuard, MountState, RegistryConfig, ScanFailure, ScanReport, TapeEntry, TapeRegistry,
};
pub use snapshot::write_snapshot;
