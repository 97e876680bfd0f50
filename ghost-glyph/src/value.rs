// ghost-glyph: Typed stack values

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

/// A typed value on the glyph stack.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum GlyphValue {
    Null,
    Bool(bool),
    Number(f64),
    Str(String),
}

impl GlyphValue {
    /// Parse a push-literal: quoted string, `true`/`false`, `null`, a
    /// number, or a bareword (kept as a string).
    pub fn parse_literal(raw: &str) -> Self {
        let raw = raw.trim();
        if raw.len() >= 2 && raw.starts_with('"') && raw.ends_with('"') {
            return GlyphValue::Str(raw[1..raw.len() - 1].to_string());
        }
        match raw {
            "true" => return GlyphValue::Bool(true),
            "false" => return GlyphValue::Bool(false),
            "null" => return GlyphValue::Null,
            _ => {}
        }
        if let Ok(n) = raw.parse::<f64>() {
            return GlyphValue::Number(n);
        }
        GlyphValue::Str(raw.to_string())
    }

    /// Numeric view under natural promotion: numbers as-is, booleans as
    /// 0/1, numeric strings parsed. Non-numeric strings and null have no
    /// numeric view.
    pub fn as_number(&self) -> Option<f64> {
        match self {
            GlyphValue::Number(n) => Some(*n),
            GlyphValue::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
            GlyphValue::Str(s) => s.trim().parse::<f64>().ok(),
            GlyphValue::Null => None,
        }
    }

    /// Truthiness: false, 0, empty string and null are falsy.
    pub fn is_truthy(&self) -> bool {
        match self {
            GlyphValue::Null => false,
            GlyphValue::Bool(b) => *b,
            GlyphValue::Number(n) => *n != 0.0,
            GlyphValue::Str(s) => !s.is_empty(),
        }
    }

    pub fn to_json(&self) -> Value {
        match self {
            GlyphValue::Null => Value::Null,
            GlyphValue::Bool(b) => Value::from(*b),
            GlyphValue::Number(n) => {
                // Integral results render without a fraction on the wire.
                if n.fract() == 0.0 && n.is_finite() && n.abs() < i64::MAX as f64 {
                    Value::from(*n as i64)
                } else {
                    Value::from(*n)
                }
            }
            GlyphValue::Str(s) => Value::from(s.clone()),
        }
    }

    pub fn from_json(value: &Value) -> Self {
        match value {
            Value::Null => GlyphValue::Null,
            Value::Bool(b) => GlyphValue::Bool(*b),
            Value::Number(n) => GlyphValue::Number(n.as_f64().unwrap_or(0.0)),
            Value::String(s) => GlyphValue::Str(s.clone()),
            other => GlyphValue::Str(other.to_string()),
        }
    }
}

impl fmt::Display for GlyphValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GlyphValue::Null => write!(f, "null"),
            GlyphValue::Bool(b) => write!(f, "{}", b),
            GlyphValue::Number(n) => {
                if n.fract() == 0.0 && n.is_finite() {
                    write!(f, "{}", *n as i64)
                } else {
                    write!(f, "{}", n)
                }
            }
            GlyphValue::Str(s) => write!(f, "{}", s),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_literals() {
        assert_eq!(GlyphValue::parse_literal("42"), GlyphValue::Number(42.0));
        assert_eq!(GlyphValue::parse_literal("-1.5"), GlyphValue::Number(-1.5));
        assert_eq!(GlyphValue::parse_literal("true"), GlyphValue::Bool(true));
        assert_eq!(GlyphValue::parse_literal("null"), GlyphValue::Null);
        assert_eq!(
            GlyphValue::parse_literal("\"hi there\""),
            GlyphValue::Str("hi there".into())
        );
        assert_eq!(
            GlyphValue::parse_literal("bareword"),
            GlyphValue::Str("bareword".into())
        );
    }

    #[test]
    fn test_numeric_promotion() {
        assert_eq!(GlyphValue::Bool(true).as_number(), Some(1.0));
        assert_eq!(GlyphValue::Str("3.5".into()).as_number(), Some(3.5));
        assert_eq!(GlyphValue::Str("abc".into()).as_number(), None);
        assert_eq!(GlyphValue::Null.as_number(), None);
    }

    #[test]
    fn test_truthiness() {
        assert!(!GlyphValue::Null.is_truthy());
        assert!(!GlyphValue::Number(0.0).is_truthy());
        assert!(!GlyphValue::Str("".into()).is_truthy());
        assert!(GlyphValue::Str("x".into()).is_truthy());
    }

    #[test]
    fn test_integral_json_rendering() {
        assert_eq!(GlyphValue::Number(5.0).to_json(), serde_json::json!(5));
        assert_eq!(GlyphValue::Number(5.5).to_json(), serde_json::json!(5.5));
    }
}
