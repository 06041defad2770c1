//! `forEach`: run a sub-chain once per value of a field.

use crate::command::{notify_chain, run_chain, Command, Downstream, Notification};
use crate::compiler::Compiler;
use crate::config::ConfigNode;
use crate::error::{CompileError, CompileResult, RuntimeResult};
use crate::metrics::CommandMeter;
use crate::record::{Record, Value};
use crate::registry::{BuildScope, CommandBuilder};

const NAME: &str = "forEach";

/// How per-value results combine into the command's result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum IterationPolicy {
    /// Attempt every value; succeed if at least one did. No values → `false`.
    #[default]
    Any,
    /// Stop at the first failing value; succeed if all did. No values → `true`.
    All,
}

impl IterationPolicy {
    fn parse(s: &str) -> Option<Self> {
        match s {
            "any" => Some(IterationPolicy::Any),
            "all" => Some(IterationPolicy::All),
            _ => None,
        }
    }
}

pub struct ForEach {
    field: String,
    as_field: String,
    index_field: Option<String>,
    policy: IterationPolicy,
    commands: Vec<Box<dyn Command>>,
    meter: CommandMeter,
}

impl ForEach {
    fn derive(&self, record: &Record, index: usize, value: Value) -> Record {
        let mut derived = record.copy();
        derived.replace_values(&self.as_field, value);
        if let Some(index_field) = &self.index_field {
            derived.replace_values(index_field, index as i64);
        }
        derived
    }
}

impl Command for ForEach {
    fn name(&self) -> &str {
        NAME
    }

    fn process(&mut self, record: Record, child: &mut dyn Downstream) -> RuntimeResult<bool> {
        self.meter.mark_record();
        let values: Vec<Value> = record.get(&self.field).to_vec();

        match self.policy {
            IterationPolicy::Any => {
                let mut any = false;
                for (index, value) in values.into_iter().enumerate() {
                    let derived = self.derive(&record, index, value);
                    if run_chain(&mut self.commands, derived, child)? {
                        any = true;
                    }
                }
                Ok(any)
            }
            IterationPolicy::All => {
                for (index, value) in values.into_iter().enumerate() {
                    let derived = self.derive(&record, index, value);
                    if !run_chain(&mut self.commands, derived, child)? {
                        return Ok(false);
                    }
                }
                Ok(true)
            }
        }
    }

    fn notify(&mut self, notification: Notification) -> RuntimeResult<()> {
        notify_chain(&mut self.commands, notification)
    }
}

pub struct ForEachBuilder;

impl CommandBuilder for ForEachBuilder {
    fn names(&self) -> &'static [&'static str] {
        &[NAME]
    }

    fn build(&self, config: &ConfigNode, scope: &BuildScope, compiler: &mut Compiler) -> CompileResult<Box<dyn Command>> {
        config.validate_keys(&["field", "as", "indexField", "policy", "commands"])?;

        let field = config.get_string("field")?;
        let as_field = config.get_string_or("as", &field)?;
        let policy_name = config.get_string_or("policy", "any")?;
        let policy = IterationPolicy::parse(&policy_name).ok_or_else(|| {
            CompileError::invalid(NAME, format!("Unknown policy: {} (expected any or all)", policy_name))
        })?;

        Ok(Box::new(ForEach {
            field,
            as_field,
            index_field: config.get_opt_string("indexField")?,
            policy,
            commands: compiler.build_list(config, "commands", scope)?,
            meter: CommandMeter::new(compiler.context().metrics(), scope.command()),
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command::Collector;
    use crate::compiler::compile;
    use crate::context::MorphlineContext;
    use serde_json::json;
    use std::sync::Arc;

    fn run(options: serde_json::Value, record: Record) -> (bool, Vec<Record>) {
        let doc = json!({"commands": [{"forEach": options}]});
        let collector = Collector::new();
        let mut m = compile(&doc, None, Box::new(collector.clone()), Arc::new(MorphlineContext::new())).unwrap();
        let ok = m.process(record).unwrap();
        (ok, collector.records())
    }

    fn foo_xy() -> Record {
        let mut record = Record::new();
        record.put("foo", "x");
        record.put("foo", "y");
        record.put("other", 1);
        record
    }

    #[test]
    fn test_one_record_per_value() {
        let (ok, out) = run(json!({"field": "foo"}), foo_xy());
        assert!(ok);
        assert_eq!(out.len(), 2);
        assert_eq!(out[0].get("foo"), &[Value::from("x")]);
        assert_eq!(out[1].get("foo"), &[Value::from("y")]);
        assert!(out.iter().all(|r| r.first_value("other") == Some(&Value::Int(1))));
    }

    #[test]
    fn test_as_and_index_fields() {
        let (_, out) = run(json!({"field": "foo", "as": "item", "indexField": "i"}), foo_xy());
        assert_eq!(out[1].get("item"), &[Value::from("y")]);
        assert_eq!(out[1].get("i"), &[Value::Int(1)]);
        assert_eq!(out[1].get("foo").len(), 2);
    }

    #[test]
    fn test_any_policy_attempts_every_value() {
        let options = json!({
            "field": "foo",
            "commands": [{"equals": {"foo": "x"}}]
        });
        let (ok, out) = run(options, foo_xy());
        assert!(ok);
        assert_eq!(out.len(), 1);
    }

    #[test]
    fn test_all_policy_stops_at_first_failure() {
        let options = json!({
            "field": "foo",
            "policy": "all",
            "commands": [{"equals": {"foo": "y"}}]
        });
        let (ok, out) = run(options, foo_xy());
        assert!(!ok);
        assert!(out.is_empty());
    }

    #[test]
    fn test_zero_values() {
        let (ok, out) = run(json!({"field": "missing"}), foo_xy());
        assert!(!ok);
        assert!(out.is_empty());

        let (ok, _) = run(json!({"field": "missing", "policy": "all"}), foo_xy());
        assert!(ok);
    }

    #[test]
    fn test_unknown_policy() {
        let doc = json!({"commands": [{"forEach": {"field": "f", "policy": "some"}}]});
        let err = compile(&doc, None, Box::new(Collector::new()), Arc::new(MorphlineContext::new()))
            .err()
            .unwrap();
        assert!(err.to_string().starts_with("Unknown policy"));
    }
}
