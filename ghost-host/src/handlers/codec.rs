// ghost-host: SCXQ2 codec handlers

use crate::error::{HostError, HostResult};
use crate::host::Host;
use crate::scxq2;
use ghost_protocol::CallContext;
use serde_json::{json, Value};
use std::sync::Arc;

/// The payload may be any JSON value; non-strings are canonicalised to
/// their JSON text before encoding.
fn payload_text(input: &Value, field: &str) -> HostResult<String> {
    match input.get(field) {
        Some(Value::String(s)) => Ok(s.clone()),
        Some(other) => serde_json::to_string(other)
            .map_err(|e| HostError::BadRequest(format!("unencodable '{}': {}", field, e))),
        None => Err(HostError::BadRequest(format!(
            "missing required field '{}'",
            field
        ))),
    }
}

pub async fn encode(_host: &Arc<Host>, input: Value, _ctx: &CallContext) -> HostResult<Value> {
    let data = payload_text(&input, "data")?;
    let encoded = scxq2::encode(&data);
    let ratio = if data.is_empty() {
        1.0
    } else {
        encoded.len() as f64 / data.len() as f64
    };
    Ok(json!({
        "encoded": encoded,
        "original_size": data.len(),
        "encoded_size": encoded.len(),
        "ratio": ratio,
    }))
}

pub async fn decode(_host: &Arc<Host>, input: Value, _ctx: &CallContext) -> HostResult<Value> {
    let encoded = payload_text(&input, "data")?;
    let decoded = scxq2::decode(&encoded)?;
    Ok(json!({
        "decoded": decoded,
        "size": decoded.len(),
    }))
}

pub async fn stats(_host: &Arc<Host>, input: Value, _ctx: &CallContext) -> HostResult<Value> {
    let data = payload_text(&input, "data")?;
    let report = scxq2::stats(&data);
    Ok(json!({
        "original_size": report.original_size,
        "encoded_size": report.encoded_size,
        "ratio": report.ratio,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn host() -> Arc<Host> {
        Host::builder().build()
    }

    #[tokio::test]
    async fn test_encode_decode_round_trip() {
        let host = host();
        let ctx = CallContext::new();
        let original = "round trip payload with repetition repetition repetition";

        let encoded = encode(&host, json!({"data": original}), &ctx).await.unwrap();
        let decoded = decode(
            &host,
            json!({"data": encoded["encoded"]}),
            &ctx,
        )
        .await
        .unwrap();
        assert_eq!(decoded["decoded"], json!(original));
        assert_eq!(encoded["original_size"], json!(original.len()));
    }

    #[tokio::test]
    async fn test_non_string_payload_canonicalised() {
        let host = host();
        let ctx = CallContext::new();
        let encoded = encode(&host, json!({"data": {"k": 1}}), &ctx).await.unwrap();
        let decoded = decode(&host, json!({"data": encoded["encoded"]}), &ctx)
            .await
            .unwrap();
        assert_eq!(decoded["decoded"], json!("{\"k\":1}"));
    }

    #[tokio::test]
    async fn test_stats_without_payload_echo() {
        let host = host();
        let report = stats(&host, json!({"data": "aaaaaaaaaa"}), &CallContext::new())
            .await
            .unwrap();
        assert!(report.get("encoded").is_none());
        assert_eq!(report["original_size"], json!(10));
    }

    #[tokio::test]
    async fn test_decode_garbage_is_bad_request() {
        let err = decode(&host(), json!({"data": "%%%"}), &CallContext::new())
            .await
            .unwrap_err();
        assert!(matches!(err, HostError::BadRequest(_)));
    }
}
