//! `not`: invert a predicate chain.

use crate::command::{notify_chain, run_chain, Command, Discard, Downstream, Notification};
use crate::compiler::Compiler;
use crate::config::ConfigNode;
use crate::error::{CompileResult, RuntimeResult};
use crate::metrics::CommandMeter;
use crate::record::Record;
use crate::registry::{BuildScope, CommandBuilder};

/// Runs its chain on a copy of the record and returns the opposite result.
/// Nothing is ever forwarded to the child.
pub struct Not {
    commands: Vec<Box<dyn Command>>,
    meter: CommandMeter,
}

impl Command for Not {
    fn name(&self) -> &str {
        "not"
    }

    fn process(&mut self, record: Record, _child: &mut dyn Downstream) -> RuntimeResult<bool> {
        self.meter.mark_record();
        Ok(!run_chain(&mut self.commands, record, &mut Discard)?)
    }

    fn notify(&mut self, notification: Notification) -> RuntimeResult<()> {
        notify_chain(&mut self.commands, notification)
    }
}

pub struct NotBuilder;

impl CommandBuilder for NotBuilder {
    fn names(&self) -> &'static [&'static str] {
        &["not"]
    }

    fn build(&self, config: &ConfigNode, scope: &BuildScope, compiler: &mut Compiler) -> CompileResult<Box<dyn Command>> {
        config.validate_keys(&["commands"])?;
        Ok(Box::new(Not {
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

    fn run(inner: serde_json::Value) -> (bool, Collector) {
        let doc = json!({"commands": [{"not": {"commands": inner}}]});
        let collector = Collector::new();
        let mut m = compile(&doc, None, Box::new(collector.clone()), Arc::new(MorphlineContext::new())).unwrap();
        let mut record = Record::new();
        record.put("first_name", "Nadja");
        (m.process(record).unwrap(), collector)
    }

    #[test]
    fn test_not_with_true() {
        let (ok, collector) = run(json!([{"setValues": {"state": "touched"}}]));
        assert!(!ok);
        assert!(collector.is_empty());
    }

    #[test]
    fn test_not_with_false() {
        let (ok, collector) = run(json!([{"equals": {"first_name": "nobody"}}]));
        assert!(ok);
        assert!(collector.is_empty());
    }

    #[test]
    fn test_not_single_command_object() {
        let (ok, _) = run(json!({"equals": {"first_name": "Nadja"}}));
        assert!(!ok);
    }
}
