//! Predicates: forward the record if it matches, otherwise return `false`.

use super::{field_exprs, FieldExpr};
use crate::command::{Command, Downstream};
use crate::compiler::Compiler;
use crate::config::ConfigNode;
use crate::error::{CompileResult, RuntimeResult};
use crate::metrics::CommandMeter;
use crate::record::{Record, Value};
use crate::registry::{BuildScope, CommandBuilder};

fn expected(exprs: &[FieldExpr], record: &Record) -> Vec<Value> {
    exprs.iter().flat_map(|e| e.evaluate(record)).collect()
}

/// Every listed field holds exactly the given values, in order.
///
/// Comparison is type-strict: the string `"true"` does not equal `true`.
pub struct Equals {
    entries: Vec<(String, Vec<FieldExpr>)>,
    meter: CommandMeter,
}

impl Command for Equals {
    fn name(&self) -> &str {
        "equals"
    }

    fn process(&mut self, record: Record, child: &mut dyn Downstream) -> RuntimeResult<bool> {
        self.meter.mark_record();
        for (field, exprs) in &self.entries {
            if record.get(field) != expected(exprs, &record).as_slice() {
                tracing::trace!(field = %field, "equals did not match");
                return Ok(false);
            }
        }
        child.forward(record)
    }
}

pub struct EqualsBuilder;

impl CommandBuilder for EqualsBuilder {
    fn names(&self) -> &'static [&'static str] {
        &["equals"]
    }

    fn build(&self, config: &ConfigNode, scope: &BuildScope, compiler: &mut Compiler) -> CompileResult<Box<dyn Command>> {
        Ok(Box::new(Equals {
            entries: field_exprs(config),
            meter: CommandMeter::new(compiler.context().metrics(), scope.command()),
        }))
    }
}

/// Every given value appears among the field's values.
pub struct Contains {
    entries: Vec<(String, Vec<FieldExpr>)>,
    meter: CommandMeter,
}

impl Command for Contains {
    fn name(&self) -> &str {
        "contains"
    }

    fn process(&mut self, record: Record, child: &mut dyn Downstream) -> RuntimeResult<bool> {
        self.meter.mark_record();
        for (field, exprs) in &self.entries {
            let present = record.get(field);
            if !expected(exprs, &record).iter().all(|v| present.contains(v)) {
                return Ok(false);
            }
        }
        child.forward(record)
    }
}

pub struct ContainsBuilder;

impl CommandBuilder for ContainsBuilder {
    fn names(&self) -> &'static [&'static str] {
        &["contains"]
    }

    fn build(&self, config: &ConfigNode, scope: &BuildScope, compiler: &mut Compiler) -> CompileResult<Box<dyn Command>> {
        Ok(Box::new(Contains {
            entries: field_exprs(config),
            meter: CommandMeter::new(compiler.context().metrics(), scope.command()),
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stdlib::test_support::{record, run};
    use serde_json::json;

    #[test]
    fn test_equals_match_and_mismatch() {
        let input = record(&[("first_name", "Nadja")]);
        let (ok, out) = run(json!([{"equals": {"first_name": "Nadja"}}]), input.clone()).unwrap();
        assert!(ok);
        assert_eq!(out, vec![input.clone()]);

        let (ok, out) = run(json!([{"equals": {"first_name": "Other"}}]), input).unwrap();
        assert!(!ok);
        assert!(out.is_empty());
    }

    #[test]
    fn test_equals_is_type_strict() {
        let input = record(&[("isTooYoung", "true")]);
        let (ok, _) = run(json!([{"equals": {"isTooYoung": true}}]), input.clone()).unwrap();
        assert!(!ok);
        let (ok, _) = run(json!([{"equals": {"isTooYoung": "true"}}]), input).unwrap();
        assert!(ok);
    }

    #[test]
    fn test_equals_requires_full_value_list() {
        let mut input = Record::new();
        input.put("tags", "a");
        input.put("tags", "b");
        let (ok, _) = run(json!([{"equals": {"tags": ["a"]}}]), input.clone()).unwrap();
        assert!(!ok);
        let (ok, _) = run(json!([{"equals": {"tags": ["a", "b"]}}]), input).unwrap();
        assert!(ok);
    }

    #[test]
    fn test_equals_empty_list_matches_absent_field() {
        let (ok, _) = run(json!([{"equals": {"missing": []}}]), Record::new()).unwrap();
        assert!(ok);
    }

    #[test]
    fn test_contains() {
        let mut input = Record::new();
        input.put("tags", "a");
        input.put("tags", "b");
        input.put("tags", "c");
        let (ok, _) = run(json!([{"contains": {"tags": ["c", "a"]}}]), input.clone()).unwrap();
        assert!(ok);
        let (ok, _) = run(json!([{"contains": {"tags": "z"}}]), input).unwrap();
        assert!(!ok);
    }
}
