//! `if`: route a record through `then` or `else` depending on a predicate chain.

use crate::command::{notify_chain, run_chain, Command, Discard, Downstream, Notification};
use crate::compiler::Compiler;
use crate::config::ConfigNode;
use crate::error::{CompileResult, RuntimeResult};
use crate::metrics::CommandMeter;
use crate::record::Record;
use crate::registry::{BuildScope, CommandBuilder};

/// Conditional.
///
/// The conditions run on a copy of the record and their output is
/// discarded, so they may mutate freely. The original record then goes
/// through the selected branch; an empty branch passes it straight on.
pub struct IfThenElse {
    conditions: Vec<Box<dyn Command>>,
    then_branch: Vec<Box<dyn Command>>,
    else_branch: Vec<Box<dyn Command>>,
    meter: CommandMeter,
}

impl Command for IfThenElse {
    fn name(&self) -> &str {
        "if"
    }

    fn process(&mut self, record: Record, child: &mut dyn Downstream) -> RuntimeResult<bool> {
        self.meter.mark_record();
        let matched = run_chain(&mut self.conditions, record.copy(), &mut Discard)?;
        tracing::trace!(matched, "if conditions evaluated");

        let branch = if matched {
            &mut self.then_branch
        } else {
            &mut self.else_branch
        };
        run_chain(branch, record, child)
    }

    fn notify(&mut self, notification: Notification) -> RuntimeResult<()> {
        notify_chain(&mut self.conditions, notification)?;
        notify_chain(&mut self.then_branch, notification)?;
        notify_chain(&mut self.else_branch, notification)
    }
}

pub struct IfThenElseBuilder;

impl CommandBuilder for IfThenElseBuilder {
    fn names(&self) -> &'static [&'static str] {
        &["if"]
    }

    fn build(&self, config: &ConfigNode, scope: &BuildScope, compiler: &mut Compiler) -> CompileResult<Box<dyn Command>> {
        config.validate_keys(&["conditions", "then", "else"])?;

        let conditions = compiler.build_commands(&config.get_list("conditions")?, scope)?;
        let then_branch = compiler.build_list(config, "then", scope)?;
        let else_branch = compiler.build_list(config, "else", scope)?;

        Ok(Box::new(IfThenElse {
            conditions,
            then_branch,
            else_branch,
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
    use crate::record::Value;
    use serde_json::json;
    use std::sync::Arc;

    fn run(doc: serde_json::Value, record: Record) -> (bool, Collector) {
        let collector = Collector::new();
        let mut m = compile(&doc, None, Box::new(collector.clone()), Arc::new(MorphlineContext::new())).unwrap();
        let ok = m.process(record).unwrap();
        (ok, collector)
    }

    fn basic_record() -> Record {
        let mut record = Record::new();
        record.put("first_name", "Nadja");
        record
    }

    #[test]
    fn test_then_branch() {
        let doc = json!({"commands": [{"if": {
            "conditions": [{"equals": {"first_name": "Nadja"}}],
            "then": [{"setValues": {"state": "then1"}}],
            "else": [{"setValues": {"state": "else1"}}]
        }}]});
        let (ok, collector) = run(doc, basic_record());
        assert!(ok);
        assert_eq!(collector.first_record().unwrap().first_value("state"), Some(&Value::from("then1")));
    }

    #[test]
    fn test_else_branch() {
        let doc = json!({"commands": [{"if": {
            "conditions": [{"equals": {"first_name": "Someone"}}],
            "then": [{"setValues": {"state": "then1"}}],
            "else": [{"setValues": {"state": "else1"}}]
        }}]});
        let (ok, collector) = run(doc, basic_record());
        assert!(ok);
        assert_eq!(collector.first_record().unwrap().first_value("state"), Some(&Value::from("else1")));
    }

    #[test]
    fn test_conditions_do_not_leak_mutations() {
        let doc = json!({"commands": [{"if": {
            "conditions": [{"addValues": {"touched": "yes"}}]
        }}]});
        let (ok, collector) = run(doc, basic_record());
        assert!(ok);
        assert_eq!(collector.records(), vec![basic_record()]);
    }

    #[test]
    fn test_missing_else_passes_through() {
        let doc = json!({"commands": [{"if": {
            "conditions": [{"equals": {"first_name": "Other"}}],
            "then": [{"dropRecord": {}}]
        }}]});
        let (ok, collector) = run(doc, basic_record());
        assert!(ok);
        assert_eq!(collector.len(), 1);
    }

    #[test]
    fn test_conditions_are_required() {
        let doc = json!({"commands": [{"if": {"then": []}}]});
        let result = compile(&doc, None, Box::new(Collector::new()), Arc::new(MorphlineContext::new()));
        assert!(result.is_err());
    }
}
