// ghost-glyph: Restricted expression evaluator
//
// Grammar: numbers, quoted strings, true/false/null, + - * / %,
// comparisons, && || !, parentheses, and named references resolved only
// through the caller-supplied resolver (math constants, task context).
// Anything else is rejected; no code is ever loaded or called.

use crate::error::{GlyphError, GlyphResult};
use crate::value::GlyphValue;

/// Resolver for named references. Returning `None` rejects the name.
pub type Resolver<'a> = &'a dyn Fn(&str) -> Option<GlyphValue>;

/// Built-in math constants, always resolvable.
pub fn math_constant(name: &str) -> Option<GlyphValue> {
    match name {
        "pi" => Some(GlyphValue::Number(std::f64::consts::PI)),
        "e" => Some(GlyphValue::Number(std::f64::consts::E)),
        "tau" => Some(GlyphValue::Number(std::f64::consts::TAU)),
        _ => None,
    }
}

/// Evaluate a restricted expression. `resolve` supplies named references
/// beyond the math constants; unknown names fail with expression-rejected.
pub fn eval_expr(source: &str, resolve: Resolver<'_>) -> GlyphResult<GlyphValue> {
    let tokens = lex(source)?;
    let mut parser = Parser {
        tokens,
        pos: 0,
        resolve,
    };
    let value = parser.parse_or()?;
    if parser.pos != parser.tokens.len() {
        return Err(GlyphError::ExpressionRejected(format!(
            "trailing input after expression: {:?}",
            parser.tokens[parser.pos]
        )));
    }
    Ok(value)
}

#[derive(Debug, Clone, PartialEq)]
enum Tok {
    Number(f64),
    Str(String),
    Ident(String),
    Op(&'static str),
    LParen,
    RParen,
}

fn lex(source: &str) -> GlyphResult<Vec<Tok>> {
    let mut tokens = Vec::new();
    let chars: Vec<char> = source.chars().collect();
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        match c {
            c if c.is_whitespace() => i += 1,
            '(' => {
                tokens.push(Tok::LParen);
                i += 1;
            }
            ')' => {
                tokens.push(Tok::RParen);
                i += 1;
            }
            '+' | '-' | '*' | '/' | '%' => {
                tokens.push(Tok::Op(match c {
                    '+' => "+",
                    '-' => "-",
                    '*' => "*",
                    '/' => "/",
                    _ => "%",
                }));
                i += 1;
            }
            '=' | '!' | '<' | '>' | '&' | '|' => {
                let next = chars.get(i + 1).copied();
                let (op, len): (&'static str, usize) = match (c, next) {
                    ('=', Some('=')) => ("==", 2),
                    ('!', Some('=')) => ("!=", 2),
                    ('<', Some('=')) => ("<=", 2),
                    ('>', Some('=')) => (">=", 2),
                    ('&', Some('&')) => ("&&", 2),
                    ('|', Some('|')) => ("||", 2),
                    ('<', _) => ("<", 1),
                    ('>', _) => (">", 1),
                    ('!', _) => ("!", 1),
                    _ => {
                        return Err(GlyphError::ExpressionRejected(format!(
                            "unexpected character '{}'",
                            c
                        )))
                    }
                };
                tokens.push(Tok::Op(op));
                i += len;
            }
            '"' | '\'' => {
                let quote = c;
                let start = i + 1;
                let mut j = start;
                while j < chars.len() && chars[j] != quote {
                    j += 1;
                }
                if j >= chars.len() {
                    return Err(GlyphError::ExpressionRejected(
                        "unterminated string literal".into(),
                    ));
                }
                tokens.push(Tok::Str(chars[start..j].iter().collect()));
                i = j + 1;
            }
            c if c.is_ascii_digit() || c == '.' => {
                let start = i;
                while i < chars.len() && (chars[i].is_ascii_digit() || chars[i] == '.') {
                    i += 1;
                }
                let raw: String = chars[start..i].iter().collect();
                let n = raw.parse::<f64>().map_err(|_| {
                    GlyphError::ExpressionRejected(format!("bad number literal '{}'", raw))
                })?;
                tokens.push(Tok::Number(n));
            }
            c if c.is_ascii_alphabetic() || c == '_' => {
                let start = i;
                while i < chars.len() && (chars[i].is_ascii_alphanumeric() || chars[i] == '_') {
                    i += 1;
                }
                tokens.push(Tok::Ident(chars[start..i].iter().collect()));
            }
            other => {
                return Err(GlyphError::ExpressionRejected(format!(
                    "unexpected character '{}'",
                    other
                )))
            }
        }
    }
    Ok(tokens)
}

struct Parser<'a> {
    tokens: Vec<Tok>,
    pos: usize,
    resolve: Resolver<'a>,
}

impl<'a> Parser<'a> {
    fn peek(&self) -> Option<&Tok> {
        self.tokens.get(self.pos)
    }

    fn eat_op(&mut self, ops: &[&'static str]) -> Option<&'static str> {
        let op = match self.peek() {
            Some(Tok::Op(op)) => *op,
            _ => return None,
        };
        if ops.contains(&op) {
            self.pos += 1;
            return Some(op);
        }
        None
    }

    fn parse_or(&mut self) -> GlyphResult<GlyphValue> {
        let mut left = self.parse_and()?;
        while self.eat_op(&["||"]).is_some() {
            let right = self.parse_and()?;
            left = GlyphValue::Bool(left.is_truthy() || right.is_truthy());
        }
        Ok(left)
    }

    fn parse_and(&mut self) -> GlyphResult<GlyphValue> {
        let mut left = self.parse_compare()?;
        while self.eat_op(&["&&"]).is_some() {
            let right = self.parse_compare()?;
            left = GlyphValue::Bool(left.is_truthy() && right.is_truthy());
        }
        Ok(left)
    }

    fn parse_compare(&mut self) -> GlyphResult<GlyphValue> {
        let left = self.parse_additive()?;
        if let Some(op) = self.eat_op(&["==", "!=", "<=", ">=", "<", ">"]) {
            let right = self.parse_additive()?;
            return Ok(GlyphValue::Bool(compare(&left, &right, op)));
        }
        Ok(left)
    }

    fn parse_additive(&mut self) -> GlyphResult<GlyphValue> {
        let mut left = self.parse_multiplicative()?;
        while let Some(op) = self.eat_op(&["+", "-"]) {
            let right = self.parse_multiplicative()?;
            left = arith(&left, &right, op)?;
        }
        Ok(left)
    }

    fn parse_multiplicative(&mut self) -> GlyphResult<GlyphValue> {
        let mut left = self.parse_unary()?;
        while let Some(op) = self.eat_op(&["*", "/", "%"]) {
            let right = self.parse_unary()?;
            left = arith(&left, &right, op)?;
        }
        Ok(left)
    }

    fn parse_unary(&mut self) -> GlyphResult<GlyphValue> {
        if self.eat_op(&["!"]).is_some() {
            let value = self.parse_unary()?;
            return Ok(GlyphValue::Bool(!value.is_truthy()));
        }
        if self.eat_op(&["-"]).is_some() {
            let value = self.parse_unary()?;
            let n = value.as_number().ok_or_else(|| {
                GlyphError::ExpressionRejected("negation of non-number".into())
            })?;
            return Ok(GlyphValue::Number(-n));
        }
        self.parse_primary()
    }

    fn parse_primary(&mut self) -> GlyphResult<GlyphValue> {
        let tok = self
            .peek()
            .cloned()
            .ok_or_else(|| GlyphError::ExpressionRejected("unexpected end of expression".into()))?;
        match tok {
            Tok::Number(n) => {
                self.pos += 1;
                Ok(GlyphValue::Number(n))
            }
            Tok::Str(s) => {
                self.pos += 1;
                Ok(GlyphValue::Str(s))
            }
            Tok::LParen => {
                self.pos += 1;
                let value = self.parse_or()?;
                match self.peek() {
                    Some(Tok::RParen) => {
                        self.pos += 1;
                        Ok(value)
                    }
                    _ => Err(GlyphError::ExpressionRejected("expected ')'".into())),
                }
            }
            Tok::Ident(name) => {
                self.pos += 1;
                // A name followed by '(' would be a call; calls are not
                // part of the grammar.
                if matches!(self.peek(), Some(Tok::LParen)) {
                    return Err(GlyphError::ExpressionRejected(format!(
                        "call syntax not allowed: {}",
                        name
                    )));
                }
                match name.as_str() {
                    "true" => return Ok(GlyphValue::Bool(true)),
                    "false" => return Ok(GlyphValue::Bool(false)),
                    "null" => return Ok(GlyphValue::Null),
                    _ => {}
                }
                math_constant(&name)
                    .or_else(|| (self.resolve)(&name))
                    .ok_or_else(|| {
                        GlyphError::ExpressionRejected(format!("unknown name: {}", name))
                    })
            }
            Tok::RParen | Tok::Op(_) => Err(GlyphError::ExpressionRejected(format!(
                "unexpected token {:?}",
                tok
            ))),
        }
    }
}

fn arith(a: &GlyphValue, b: &GlyphValue, op: &str) -> GlyphResult<GlyphValue> {
    if op == "+" {
        if let (GlyphValue::Str(_), _) | (_, GlyphValue::Str(_)) = (a, b) {
            if a.as_number().zip(b.as_number()).is_none() {
                return Ok(GlyphValue::Str(format!("{}{}", a, b)));
            }
        }
    }
    let (x, y) = a
        .as_number()
        .zip(b.as_number())
        .ok_or_else(|| GlyphError::ExpressionRejected(format!("'{}' on non-numbers", op)))?;
    let out = match op {
        "+" => x + y,
        "-" => x - y,
        "*" => x * y,
        "/" => {
            if y == 0.0 {
                return Err(GlyphError::DivisionByZero);
            }
            x / y
        }
        "%" => {
            if y == 0.0 {
                return Err(GlyphError::DivisionByZero);
            }
            x % y
        }
        _ => unreachable!(),
    };
    Ok(GlyphValue::Number(out))
}

fn compare(a: &GlyphValue, b: &GlyphValue, op: &str) -> bool {
    let ordering = match (a.as_number(), b.as_number()) {
        (Some(x), Some(y)) => x.partial_cmp(&y),
        _ => Some(a.to_string().cmp(&b.to_string())),
    };
    let Some(ordering) = ordering else { return false };
    match op {
        "==" => ordering.is_eq(),
        "!=" => ordering.is_ne(),
        "<" => ordering.is_lt(),
        "<=" => ordering.is_le(),
        ">" => ordering.is_gt(),
        ">=" => ordering.is_ge(),
        _ => false,
    }
}
