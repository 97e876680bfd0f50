// ghost-host: The handler set
//
// Every handler is addressed by name through the request envelope. The
// set is a closed table built here at boot; nothing registers itself by
// side effect, so the server is deterministic and the table testable.

pub mod agents;
pub mod codec;
pub mod core;
pub mod fs;
pub mod ghost;
pub mod kuhul;
pub mod micronaut;
pub mod store;

use crate::error::{HostError, HostResult};
use crate::host::Host;
use ghost_protocol::CallContext;
use serde_json::Value;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

/// Every registered handler name, grouped as in the protocol docs.
pub const HANDLER_NAMES: &[&str] = &[
    // core
    "ping",
    "info",
    "echo",
    "eval_expr",
    // key-value store
    "store",
    // sandboxed filesystem
    "fs_read",
    "fs_write",
    "fs_list",
    "fs_exists",
    "fs_delete",
    "fs_copy",
    "fs_json_read",
    "fs_json_write",
    // codec
    "scxq2_encode",
    "scxq2_decode",
    "scxq2_stats",
    // tape host protocol
    "ghost_list",
    "ghost_get",
    "ghost_launch",
    "ghost_route",
    "ghost_discover",
    "ghost_swarm",
    "ghost_status",
    // agents
    "agents_list",
    "agents_call",
    "agents_tribunal",
    "agents_swarm",
    // scheduler
    "kuhul_profile",
    "kuhul_route",
    "kuhul_schedule",
    "kuhul_status",
    "kuhul_glyph",
    // micronaut
    "micronaut_infer",
    "micronaut_intent",
    "micronaut_complete",
    "micronaut_chat",
    "micronaut_train",
    "micronaut_status",
];

/// Whether `name` addresses a registered handler. Also the predicate the
/// manifest loader uses to classify api endpoints.
pub fn is_handler(name: &str) -> bool {
    HANDLER_NAMES.contains(&name)
}

/// Dispatch one call to its handler. Handlers never panic across this
/// boundary; every failure is a typed HostError.
///
/// The future is boxed because dispatch is re-entered through the
/// inter-tape proxy (ghost_route -> proxy -> router -> dispatch).
pub fn dispatch<'a>(
    host: &'a Arc<Host>,
    name: &'a str,
    input: Value,
    ctx: &'a CallContext,
) -> Pin<Box<dyn Future<Output = HostResult<Value>> + Send + 'a>> {
    Box::pin(dispatch_inner(host, name, input, ctx))
}

async fn dispatch_inner(
    host: &Arc<Host>,
    name: &str,
    input: Value,
    ctx: &CallContext,
) -> HostResult<Value> {
    match name {
        "ping" => core::ping(host, input, ctx).await,
        "info" => core::info(host, input, ctx).await,
        "echo" => core::echo(host, input, ctx).await,
        "eval_expr" => core::eval_expr(host, input, ctx).await,
        "store" => store::store(host, input, ctx).await,
        "fs_read" => fs::read(host, input, ctx).await,
        "fs_write" => fs::write(host, input, ctx).await,
        "fs_list" => fs::list(host, input, ctx).await,
        "fs_exists" => fs::exists(host, input, ctx).await,
        "fs_delete" => fs::delete(host, input, ctx).await,
        "fs_copy" => fs::copy(host, input, ctx).await,
        "fs_json_read" => fs::json_read(host, input, ctx).await,
        "fs_json_write" => fs::json_write(host, input, ctx).await,
        "scxq2_encode" => codec::encode(host, input, ctx).await,
        "scxq2_decode" => codec::decode(host, input, ctx).await,
        "scxq2_stats" => codec::stats(host, input, ctx).await,
        "ghost_list" => ghost::list(host, input, ctx).await,
        "ghost_get" => ghost::get(host, input, ctx).await,
        "ghost_launch" => ghost::launch(host, input, ctx).await,
        "ghost_route" => ghost::route(host, input, ctx).await,
        "ghost_discover" => ghost::discover(host, input, ctx).await,
        "ghost_swarm" => ghost::swarm(host, input, ctx).await,
        "ghost_status" => ghost::status(host, input, ctx).await,
        "agents_list" => agents::list(host, input, ctx).await,
        "agents_call" => agents::call(host, input, ctx).await,
        "agents_tribunal" => agents::tribunal(host, input, ctx).await,
        "agents_swarm" => agents::swarm(host, input, ctx).await,
        "kuhul_profile" => kuhul::profile(host, input, ctx).await,
        "kuhul_route" => kuhul::route(host, input, ctx).await,
        "kuhul_schedule" => kuhul::schedule(host, input, ctx).await,
        "kuhul_status" => kuhul::status(host, input, ctx).await,
        "kuhul_glyph" => kuhul::glyph(host, input, ctx).await,
        "micronaut_infer" => micronaut::infer(host, input, ctx).await,
        "micronaut_intent" => micronaut::intent(host, input, ctx).await,
        "micronaut_complete" => micronaut::complete(host, input, ctx).await,
        "micronaut_chat" => micronaut::chat(host, input, ctx).await,
        "micronaut_train" => micronaut::train(host, input, ctx).await,
        "micronaut_status" => micronaut::status(host, input, ctx).await,
        other => Err(HostError::HandlerUnknown(other.to_string())),
    }
}

/// Fetch a required string field from a handler input map.
pub(crate) fn require_str<'a>(input: &'a Value, field: &str) -> HostResult<&'a str> {
    input
        .get(field)
        .and_then(Value::as_str)
        .ok_or_else(|| HostError::BadRequest(format!("missing required field '{}'", field)))
}

/// Fetch an optional string field.
pub(crate) fn optional_str<'a>(input: &'a Value, field: &str) -> Option<&'a str> {
    input.get(field).and_then(Value::as_str)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_table_is_closed_and_deduplicated() {
        let mut names = HANDLER_NAMES.to_vec();
        names.sort_unstable();
        names.dedup();
        assert_eq!(names.len(), HANDLER_NAMES.len());
        assert!(is_handler("ping"));
        assert!(is_handler("kuhul_glyph"));
        assert!(!is_handler("rm_rf"));
    }

    #[tokio::test]
    async fn test_unknown_handler() {
        let host = Host::builder().build();
        let err = dispatch(&host, "nope", json!({}), &CallContext::new())
            .await
            .unwrap_err();
        assert!(matches!(err, HostError::HandlerUnknown(_)));
    }
}
