// ghost-protocol: Request and result envelopes

use crate::error::ErrorKind;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Program selector inside a request envelope.
///
/// `type` names a registered handler; `input` is the opaque payload handed
/// to it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Program {
    #[serde(rename = "type")]
    pub program_type: String,
    #[serde(default)]
    pub input: Value,
}

/// Uniform request envelope for all handler calls.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Envelope {
    pub program: Program,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context: Option<Map<String, Value>>,
}

impl Envelope {
    pub fn new(program_type: impl Into<String>, input: Value) -> Self {
        Self {
            program: Program {
                program_type: program_type.into(),
                input,
            },
            context: None,
        }
    }

    pub fn with_context(mut self, context: Map<String, Value>) -> Self {
        self.context = Some(context);
        self
    }
}

/// Result envelope returned for every call.
///
/// Exactly one backend tag is present; on failure `error` holds the wire
/// kind and `message` a short prose description.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Reply {
    pub ok: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorKind>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    pub backend: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub elapsed_ms: Option<u64>,
}

impl Reply {
    pub fn success(result: Value, backend: impl Into<String>) -> Self {
        Self {
            ok: true,
            result: Some(result),
            error: None,
            message: None,
            backend: backend.into(),
            elapsed_ms: None,
        }
    }

    pub fn failure(kind: ErrorKind, message: impl Into<String>, backend: impl Into<String>) -> Self {
        Self {
            ok: false,
            result: None,
            error: Some(kind),
            message: Some(message.into()),
            backend: backend.into(),
            elapsed_ms: None,
        }
    }

    pub fn with_elapsed(mut self, elapsed_ms: u64) -> Self {
        self.elapsed_ms = Some(elapsed_ms);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_envelope_wire_field_names() {
        let envelope = Envelope::new("ping", json!({}));
        let wire = serde_json::to_value(&envelope).unwrap();
        assert_eq!(wire["program"]["type"], "ping");
        assert!(wire["program"]["input"].is_object());
        assert!(wire.get("context").is_none());
    }

    #[test]
    fn test_envelope_decode_with_context() {
        let raw = r#"{"program":{"type":"echo","input":{"x":1}},"context":{"hops":3}}"#;
        let envelope: Envelope = serde_json::from_str(raw).unwrap();
        assert_eq!(envelope.program.program_type, "echo");
        assert_eq!(envelope.context.unwrap()["hops"], json!(3));
    }

    #[test]
    fn test_reply_success_shape() {
        let reply = Reply::success(json!({"status": "ok"}), "local").with_elapsed(2);
        let wire = serde_json::to_value(&reply).unwrap();
        assert_eq!(wire["ok"], json!(true));
        assert_eq!(wire["backend"], "local");
        assert_eq!(wire["elapsed_ms"], json!(2));
        assert!(wire.get("error").is_none());
    }

    #[test]
    fn test_reply_failure_shape() {
        let reply = Reply::failure(ErrorKind::PathEscape, "outside sandbox", "local");
        let wire = serde_json::to_value(&reply).unwrap();
        assert_eq!(wire["ok"], json!(false));
        assert_eq!(wire["error"], "path-escape");
        assert_eq!(wire["message"], "outside sandbox");
        assert!(wire.get("result").is_none());
    }
}
