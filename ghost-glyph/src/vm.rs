// ghost-glyph: Stack-machine evaluator shared by both front ends

use crate::error::{GlyphError, GlyphResult};
use crate::token::{parse_program, Opcode, Token};
use crate::value::GlyphValue;
use std::collections::HashMap;
use tracing::info;

/// Default cap on value-stack depth.
pub const DEFAULT_STACK_DEPTH: usize = 10_000;

/// The glyph VM.
///
/// Holds the value stack, the variable bindings, the recorded function
/// bodies, and the current-function slot used while recording. Reset
/// clears stack, variables and the current-function slot but preserves
/// recorded bodies.
#[derive(Debug)]
pub struct GlyphVm {
    stack: Vec<GlyphValue>,
    variables: HashMap<String, GlyphValue>,
    functions: HashMap<String, Vec<Token>>,
    current_function: Option<String>,
    max_depth: usize,
}

impl GlyphVm {
    pub fn new() -> Self {
        Self::with_depth(DEFAULT_STACK_DEPTH)
    }

    pub fn with_depth(max_depth: usize) -> Self {
        Self {
            stack: Vec::new(),
            variables: HashMap::new(),
            functions: HashMap::new(),
            current_function: None,
            max_depth,
        }
    }

    /// Execute program text and return the top of stack, if any.
    pub fn execute(&mut self, source: &str) -> GlyphResult<Option<GlyphValue>> {
        let tokens = parse_program(source)?;
        self.run_tokens(&tokens)?;
        Ok(self.stack.last().cloned())
    }

    /// Execute already-parsed tokens.
    pub fn run_tokens(&mut self, tokens: &[Token]) -> GlyphResult<()> {
        for token in tokens {
            self.step(token)?;
        }
        Ok(())
    }

    fn step(&mut self, token: &Token) -> GlyphResult<()> {
        // Tokens between fn-begin and fn-end are recorded under the
        // function name and executed as they stream past.
        if let Some(name) = self.current_function.clone() {
            if token.opcode != Opcode::FnEnd && token.opcode != Opcode::FnBegin {
                if let Some(body) = self.functions.get_mut(&name) {
                    body.push(token.clone());
                }
            }
        }

        match token.opcode {
            Opcode::FnBegin => {
                let name = token.arg.clone();
                self.functions.insert(name.clone(), Vec::new());
                self.current_function = Some(name);
            }
            Opcode::FnEnd => {
                self.current_function = None;
            }
            Opcode::Push => {
                self.push(GlyphValue::parse_literal(&token.arg))?;
            }
            Opcode::Store => {
                let value = self.pop("store")?;
                self.variables.insert(token.arg.clone(), value);
            }
            Opcode::Load => {
                let value = self
                    .variables
                    .get(&token.arg)
                    .cloned()
                    .ok_or_else(|| GlyphError::UndefinedVariable(token.arg.clone()))?;
                self.push(value)?;
            }
            Opcode::Op => {
                self.apply_op(&token.arg)?;
            }
        }
        Ok(())
    }

    fn apply_op(&mut self, kind: &str) -> GlyphResult<()> {
        match kind {
            "add" | "sub" | "mul" | "div" => self.binary_arith(kind),
            "gt" | "lt" | "gte" | "lte" => self.binary_compare(kind),
            "eq" | "neq" => {
                let b = self.pop(kind)?;
                let a = self.pop(kind)?;
                let equal = values_equal(&a, &b);
                self.push(GlyphValue::Bool(if kind == "eq" { equal } else { !equal }))
            }
            "and" | "or" => {
                let b = self.pop(kind)?;
                let a = self.pop(kind)?;
                let out = if kind == "and" {
                    a.is_truthy() && b.is_truthy()
                } else {
                    a.is_truthy() || b.is_truthy()
                };
                self.push(GlyphValue::Bool(out))
            }
            "not" => {
                let a = self.pop(kind)?;
                self.push(GlyphValue::Bool(!a.is_truthy()))
            }
            "print" => {
                let a = self.pop(kind)?;
                info!(target: "glyph", "{}", a);
                Ok(())
            }
            "rand" => self.push(GlyphValue::Number(fastrand::f64())),
            other => Err(GlyphError::UnknownOperation(other.to_string())),
        }
    }

    fn binary_arith(&mut self, kind: &str) -> GlyphResult<()> {
        let b = self.pop(kind)?;
        let a = self.pop(kind)?;

        // String concatenation for add when either side is a non-numeric
        // string; numeric promotion otherwise.
        if kind == "add" {
            let numeric = a.as_number().zip(b.as_number());
            if numeric.is_none() {
                return self.push(GlyphValue::Str(format!("{}{}", a, b)));
            }
        }

        let (x, y) = match (a.as_number(), b.as_number()) {
            (Some(x), Some(y)) => (x, y),
            _ => {
                return Err(GlyphError::UnknownOperation(format!(
                    "{} on non-numeric operands",
                    kind
                )))
            }
        };

        let out = match kind {
            "add" => x + y,
            "sub" => x - y,
            "mul" => x * y,
            "div" => {
                if y == 0.0 {
                    return Err(GlyphError::DivisionByZero);
                }
                x / y
            }
            _ => unreachable!(),
        };
        self.push(GlyphValue::Number(out))
    }

    fn binary_compare(&mut self, kind: &str) -> GlyphResult<()> {
        let b = self.pop(kind)?;
        let a = self.pop(kind)?;

        let ordering = match (a.as_number(), b.as_number()) {
            (Some(x), Some(y)) => x.partial_cmp(&y),
            _ => Some(a.to_string().cmp(&b.to_string())),
        };
        let Some(ordering) = ordering else {
            return self.push(GlyphValue::Bool(false));
        };

        let out = match kind {
            "gt" => ordering.is_gt(),
            "lt" => ordering.is_lt(),
            "gte" => ordering.is_ge(),
            "lte" => ordering.is_le(),
            _ => unreachable!(),
        };
        self.push(GlyphValue::Bool(out))
    }

    fn push(&mut self, value: GlyphValue) -> GlyphResult<()> {
        if self.stack.len() >= self.max_depth {
            return Err(GlyphError::StackOverflow(self.max_depth));
        }
        self.stack.push(value);
        Ok(())
    }

    fn pop(&mut self, op: &str) -> GlyphResult<GlyphValue> {
        self.stack
            .pop()
            .ok_or_else(|| GlyphError::StackUnderflow(format!("{} on empty stack", op)))
    }

    /// Clear stack, variables and the current-function slot. Recorded
    /// function bodies survive.
    pub fn reset(&mut self) {
        self.stack.clear();
        self.variables.clear();
        self.current_function = None;
    }

    pub fn top(&self) -> Option<&GlyphValue> {
        self.stack.last()
    }

    pub fn stack_len(&self) -> usize {
        self.stack.len()
    }

    pub fn variable(&self, name: &str) -> Option<&GlyphValue> {
        self.variables.get(name)
    }

    pub fn set_variable(&mut self, name: impl Into<String>, value: GlyphValue) {
        self.variables.insert(name.into(), value);
    }

    pub fn variables(&self) -> &HashMap<String, GlyphValue> {
        &self.variables
    }

    pub fn function_names(&self) -> Vec<&str> {
        self.functions.keys().map(String::as_str).collect()
    }

    pub fn has_function(&self, name: &str) -> bool {
        self.functions.contains_key(name)
    }
}

impl Default for GlyphVm {
    fn default() -> Self {
        Self::new()
    }
}

fn values_equal(a: &GlyphValue, b: &GlyphValue) -> bool {
    match (a.as_number(), b.as_number()) {
        (Some(x), Some(y)) => x == y,
        _ => a.to_string() == b.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_arithmetic_in_function_body() {
        let mut vm = GlyphVm::new();
        vm.execute("[fn-begin main][push 2][push 3][op add][store x][fn-end]")
            .unwrap();
        let top = vm.execute("[load x]").unwrap();
        assert_eq!(top, Some(GlyphValue::Number(5.0)));
        assert_eq!(vm.variable("x"), Some(&GlyphValue::Number(5.0)));
        assert!(vm.has_function("main"));
    }

    #[test]
    fn test_stack_underflow() {
        let mut vm = GlyphVm::new();
        let err = vm.execute("[op add]").unwrap_err();
        assert!(matches!(err, GlyphError::StackUnderflow(_)));
    }

    #[test]
    fn test_undefined_variable() {
        let mut vm = GlyphVm::new();
        let err = vm.execute("[load nope]").unwrap_err();
        assert!(matches!(err, GlyphError::UndefinedVariable(_)));
    }

    #[test]
    fn test_store_on_empty_stack_underflows() {
        let mut vm = GlyphVm::new();
        let err = vm.execute("[store x]").unwrap_err();
        assert!(matches!(err, GlyphError::StackUnderflow(_)));
    }

    #[test]
    fn test_division_by_zero() {
        let mut vm = GlyphVm::new();
        let err = vm.execute("[push 1][push 0][op div]").unwrap_err();
        assert!(matches!(err, GlyphError::DivisionByZero));
    }

    #[test]
    fn test_string_concatenation() {
        let mut vm = GlyphVm::new();
        let top = vm
            .execute("[push \"tape-\"][push \"alpha\"][op add]")
            .unwrap();
        assert_eq!(top, Some(GlyphValue::Str("tape-alpha".into())));
    }

    #[test]
    fn test_comparisons_and_logic() {
        let mut vm = GlyphVm::new();
        let top = vm.execute("[push 3][push 2][op gt]").unwrap();
        assert_eq!(top, Some(GlyphValue::Bool(true)));

        vm.reset();
        let top = vm
            .execute("[push true][push false][op or][op not]")
            .unwrap();
        assert_eq!(top, Some(GlyphValue::Bool(false)));
    }

    #[test]
    fn test_eq_across_types_uses_value_equality() {
        let mut vm = GlyphVm::new();
        let top = vm.execute("[push 1][push \"1\"][op eq]").unwrap();
        assert_eq!(top, Some(GlyphValue::Bool(true)));
    }

    #[test]
    fn test_rand_pushes_unit_interval() {
        let mut vm = GlyphVm::new();
        let top = vm.execute("[op rand]").unwrap().unwrap();
        match top {
            GlyphValue::Number(n) => assert!((0.0..1.0).contains(&n)),
            other => panic!("expected number, got {:?}", other),
        }
    }

    #[test]
    fn test_reset_preserves_functions() {
        let mut vm = GlyphVm::new();
        vm.execute("[fn-begin f][push 1][fn-end][push 9][store v]")
            .unwrap();
        vm.reset();
        assert_eq!(vm.stack_len(), 0);
        assert!(vm.variable("v").is_none());
        assert!(vm.has_function("f"));
    }

    #[test]
    fn test_depth_cap() {
        let mut vm = GlyphVm::with_depth(4);
        let err = vm
            .execute("[push 1][push 1][push 1][push 1][push 1]")
            .unwrap_err();
        assert!(matches!(err, GlyphError::StackOverflow(4)));
    }
}
