//! GHOST host
//!
//! The in-process handler set and everything it needs: the Host value
//! owning registry, store, scheduler and tribunal; the backend router
//! with graceful degradation; the inter-tape proxy; and the sandbox
//! guard every filesystem handler funnels through.

pub mod error;
pub mod handlers;
pub mod host;
pub mod micronaut;
pub mod proxy;
pub mod router;
pub mod sandbox;
pub mod scxq2;
pub mod store;

pub use error::{HostError, HostResult};
pub use host::{AgentConfig, Host, HostBuilder, SwarmConfig, SwarmRouterConfig};
pub use router::{BackendConfig, BackendRouter};
pub use store::KvStore;
