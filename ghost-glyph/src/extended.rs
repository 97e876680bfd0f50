// ghost-glyph: Structured control-flow front end
//
// Consumes structured records rather than tokens: @if/@while/@for plus
// set/print/glyph steps, with ${name} substitution inside string
// operands. Shares the GlyphVm evaluator with the token front end;
// local scope shadows VM variables.

use crate::error::{GlyphError, GlyphResult};
use crate::expr::eval_expr;
use crate::value::GlyphValue;
use crate::vm::GlyphVm;
use serde::Deserialize;
use serde_json::Value;
use std::collections::HashMap;
use tracing::info;

/// Hard cap on @while / @for iterations.
pub const LOOP_LIMIT: usize = 10_000;

/// One structured step.
#[derive(Debug, Clone, Deserialize)]
pub enum Step {
    #[serde(rename = "@if")]
    If {
        cond: String,
        #[serde(default)]
        then: Vec<Step>,
        #[serde(default, rename = "else")]
        otherwise: Vec<Step>,
    },
    #[serde(rename = "@while")]
    While {
        cond: String,
        #[serde(rename = "do")]
        body: Vec<Step>,
    },
    #[serde(rename = "@for")]
    For {
        var: String,
        from: f64,
        to: f64,
        #[serde(default)]
        step: Option<f64>,
        #[serde(rename = "do")]
        body: Vec<Step>,
    },
    #[serde(rename = "set")]
    Set { var: String, value: Value },
    #[serde(rename = "print")]
    Print(String),
    #[serde(rename = "glyph")]
    Glyph(String),
}

/// Execute structured steps against a VM. Returns the VM's top of stack
/// after the last step.
pub fn run_structured(vm: &mut GlyphVm, steps: &[Step]) -> GlyphResult<Option<GlyphValue>> {
    let mut locals: HashMap<String, GlyphValue> = HashMap::new();
    run_block(vm, steps, &mut locals)?;
    Ok(vm.top().cloned())
}

fn run_block(
    vm: &mut GlyphVm,
    steps: &[Step],
    locals: &mut HashMap<String, GlyphValue>,
) -> GlyphResult<()> {
    for step in steps {
        run_step(vm, step, locals)?;
    }
    Ok(())
}

fn run_step(
    vm: &mut GlyphVm,
    step: &Step,
    locals: &mut HashMap<String, GlyphValue>,
) -> GlyphResult<()> {
    match step {
        Step::If {
            cond,
            then,
            otherwise,
        } => {
            if eval_cond(vm, cond, locals)? {
                run_block(vm, then, locals)
            } else {
                run_block(vm, otherwise, locals)
            }
        }
        Step::While { cond, body } => {
            let mut iterations = 0usize;
            while eval_cond(vm, cond, locals)? {
                iterations += 1;
                if iterations > LOOP_LIMIT {
                    return Err(GlyphError::LoopLimit(LOOP_LIMIT));
                }
                run_block(vm, body, locals)?;
            }
            Ok(())
        }
        Step::For {
            var,
            from,
            to,
            step,
            body,
        } => {
            let stride = step.unwrap_or(1.0);
            if stride == 0.0 {
                return Err(GlyphError::LoopLimit(LOOP_LIMIT));
            }
            let mut current = *from;
            let mut iterations = 0usize;
            let ascending = stride > 0.0;
            while (ascending && current <= *to) || (!ascending && current >= *to) {
                iterations += 1;
                if iterations > LOOP_LIMIT {
                    return Err(GlyphError::LoopLimit(LOOP_LIMIT));
                }
                locals.insert(var.clone(), GlyphValue::Number(current));
                run_block(vm, body, locals)?;
                current += stride;
            }
            Ok(())
        }
        Step::Set { var, value } => {
            let resolved = match value {
                Value::String(raw) => {
                    let substituted = substitute(raw, vm, locals);
                    GlyphValue::parse_literal(&substituted)
                }
                other => GlyphValue::from_json(other),
            };
            locals.insert(var.clone(), resolved);
            Ok(())
        }
        Step::Print(raw) => {
            let line = substitute(raw, vm, locals);
            info!(target: "glyph", "{}", line);
            Ok(())
        }
        Step::Glyph(source) => {
            // Locals reach the token program through ${name} substitution;
            // stores inside the program land in VM state.
            let substituted = substitute(source, vm, locals);
            vm.execute(&substituted)?;
            Ok(())
        }
    }
}

fn eval_cond(
    vm: &GlyphVm,
    cond: &str,
    locals: &HashMap<String, GlyphValue>,
) -> GlyphResult<bool> {
    let substituted = substitute_expr(cond, vm, locals);
    let resolve = |name: &str| {
        locals
            .get(name)
            .or_else(|| vm.variable(name))
            .cloned()
    };
    Ok(eval_expr(&substituted, &resolve)?.is_truthy())
}

fn lookup(name: &str, vm: &GlyphVm, locals: &HashMap<String, GlyphValue>) -> Option<GlyphValue> {
    locals.get(name).or_else(|| vm.variable(name)).cloned()
}

/// Replace `${name}` with the value's display form (print/set operands).
fn substitute(raw: &str, vm: &GlyphVm, locals: &HashMap<String, GlyphValue>) -> String {
    substitute_with(raw, |value| value.to_string(), vm, locals)
}

/// Replace `${name}` with an expression-literal form (strings re-quoted)
/// so substituted conditions still parse.
fn substitute_expr(raw: &str, vm: &GlyphVm, locals: &HashMap<String, GlyphValue>) -> String {
    substitute_with(
        raw,
        |value| match value {
            GlyphValue::Str(s) => format!("'{}'", s),
            other => other.to_string(),
        },
        vm,
        locals,
    )
}

fn substitute_with(
    raw: &str,
    render: impl Fn(&GlyphValue) -> String,
    vm: &GlyphVm,
    locals: &HashMap<String, GlyphValue>,
) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut rest = raw;
    while let Some(start) = rest.find("${") {
        out.push_str(&rest[..start]);
        match rest[start + 2..].find('}') {
            Some(end) => {
                let name = &rest[start + 2..start + 2 + end];
                match lookup(name, vm, locals) {
                    Some(value) => out.push_str(&render(&value)),
                    None => {
                        out.push_str(&rest[start..start + end + 3]);
                    }
                }
                rest = &rest[start + end + 3..];
            }
            None => {
                out.push_str(&rest[start..]);
                rest = "";
            }
        }
    }
    out.push_str(rest);
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn steps(raw: serde_json::Value) -> Vec<Step> {
        serde_json::from_value(raw).unwrap()
    }

    #[test]
    fn test_if_takes_then_branch() {
        let mut vm = GlyphVm::new();
        let program = steps(json!([
            {"set": {"var": "x", "value": 5}},
            {"@if": {"cond": "x > 3", "then": [{"glyph": "[push 1][store hit]"}],
                     "else": [{"glyph": "[push 0][store hit]"}]}}
        ]));
        run_structured(&mut vm, &program).unwrap();
        assert_eq!(vm.variable("hit"), Some(&GlyphValue::Number(1.0)));
    }

    #[test]
    fn test_while_advances_on_vm_variable() {
        let mut vm = GlyphVm::new();
        let program = steps(json!([
            {"glyph": "[push 0][store i]"},
            {"@while": {"cond": "i < 3", "do": [
                {"glyph": "[load i][push 1][op add][store i]"}
            ]}}
        ]));
        run_structured(&mut vm, &program).unwrap();
        assert_eq!(vm.variable("i"), Some(&GlyphValue::Number(3.0)));
    }

    #[test]
    fn test_while_true_hits_loop_limit() {
        let mut vm = GlyphVm::new();
        let program = steps(json!([
            {"@while": {"cond": "true", "do": [{"set": {"var": "x", "value": 1}}]}}
        ]));
        let err = run_structured(&mut vm, &program).unwrap_err();
        assert!(matches!(err, GlyphError::LoopLimit(LOOP_LIMIT)));
    }

    #[test]
    fn test_for_accumulates() {
        let mut vm = GlyphVm::new();
        vm.execute("[push 0][store sum]").unwrap();
        let program = steps(json!([
            {"@for": {"var": "i", "from": 1, "to": 4, "do": [
                {"glyph": "[load sum][push ${i}][op add][store sum]"}
            ]}}
        ]));
        run_structured(&mut vm, &program).unwrap();
        assert_eq!(vm.variable("sum"), Some(&GlyphValue::Number(10.0)));
    }

    #[test]
    fn test_substitution_in_print_and_locals_shadow() {
        let mut vm = GlyphVm::new();
        vm.execute("[push \"vm\"][store who]").unwrap();
        let program = steps(json!([
            {"set": {"var": "who", "value": "\"local\""}},
            {"@if": {"cond": "who == 'local'", "then": [{"glyph": "[push 1][store shadowed]"}]}}
        ]));
        run_structured(&mut vm, &program).unwrap();
        assert_eq!(vm.variable("shadowed"), Some(&GlyphValue::Number(1.0)));
    }

    #[test]
    fn test_string_cond_substitution_requotes() {
        let mut vm = GlyphVm::new();
        let program = steps(json!([
            {"set": {"var": "mode", "value": "\"fast\""}},
            {"@if": {"cond": "${mode} == 'fast'", "then": [{"glyph": "[push 1][store ok]"}]}}
        ]));
        run_structured(&mut vm, &program).unwrap();
        assert_eq!(vm.variable("ok"), Some(&GlyphValue::Number(1.0)));
    }
}
