// ghost-glyph: Bracketed-token front end

use crate::error::{GlyphError, GlyphResult};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Recognised opcodes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Opcode {
    FnBegin,
    Push,
    Store,
    Load,
    Op,
    FnEnd,
}

impl Opcode {
    fn parse(raw: &str) -> Option<Self> {
        match raw {
            "fn-begin" => Some(Opcode::FnBegin),
            "push" => Some(Opcode::Push),
            "store" => Some(Opcode::Store),
            "load" => Some(Opcode::Load),
            "op" => Some(Opcode::Op),
            "fn-end" => Some(Opcode::FnEnd),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Opcode::FnBegin => "fn-begin",
            Opcode::Push => "push",
            Opcode::Store => "store",
            Opcode::Load => "load",
            Opcode::Op => "op",
            Opcode::FnEnd => "fn-end",
        }
    }
}

/// One `[opcode arg]` token.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Token {
    pub opcode: Opcode,
    pub arg: String,
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.arg.is_empty() {
            write!(f, "[{}]", self.opcode.as_str())
        } else {
            write!(f, "[{} {}]", self.opcode.as_str(), self.arg)
        }
    }
}

/// Parse a program text of bracketed tokens. Whitespace between tokens is
/// tolerated; anything outside brackets or an unrecognised opcode fails
/// with unknown-operation.
pub fn parse_program(source: &str) -> GlyphResult<Vec<Token>> {
    let mut tokens = Vec::new();
    let mut rest = source.trim();

    while !rest.is_empty() {
        if !rest.starts_with('[') {
            return Err(GlyphError::UnknownOperation(format!(
                "expected '[' at: {}",
                truncate(rest)
            )));
        }
        let end = rest.find(']').ok_or_else(|| {
            GlyphError::UnknownOperation(format!("unterminated token at: {}", truncate(rest)))
        })?;
        let body = &rest[1..end];
        let (op_raw, arg) = match body.find(char::is_whitespace) {
            Some(split) => (&body[..split], body[split..].trim()),
            None => (body, ""),
        };
        let opcode = Opcode::parse(op_raw)
            .ok_or_else(|| GlyphError::UnknownOperation(op_raw.to_string()))?;
        tokens.push(Token {
            opcode,
            arg: arg.to_string(),
        });
        rest = rest[end + 1..].trim_start();
    }

    Ok(tokens)
}

fn truncate(s: &str) -> String {
    s.chars().take(24).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_simple_program() {
        let tokens = parse_program("[push 2][push 3][op add]").unwrap();
        assert_eq!(tokens.len(), 3);
        assert_eq!(tokens[0].opcode, Opcode::Push);
        assert_eq!(tokens[0].arg, "2");
        assert_eq!(tokens[2].opcode, Opcode::Op);
        assert_eq!(tokens[2].arg, "add");
    }

    #[test]
    fn test_parse_tolerates_whitespace() {
        let tokens = parse_program("  [push 1]\n  [store x]  ").unwrap();
        assert_eq!(tokens.len(), 2);
        assert_eq!(tokens[1].arg, "x");
    }

    #[test]
    fn test_parse_quoted_string_arg() {
        let tokens = parse_program("[push \"hello world\"]").unwrap();
        assert_eq!(tokens[0].arg, "\"hello world\"");
    }

    #[test]
    fn test_unknown_opcode_rejected() {
        let err = parse_program("[jump 3]").unwrap_err();
        assert!(matches!(err, GlyphError::UnknownOperation(_)));
    }

    #[test]
    fn test_unterminated_token_rejected() {
        assert!(parse_program("[push 1").is_err());
    }
}
