//! `pipe`: an ordered chain of commands.

use crate::command::{notify_chain, run_chain, Command, Downstream, Notification};
use crate::compiler::Compiler;
use crate::config::ConfigNode;
use crate::error::{CompileResult, RuntimeResult};
use crate::metrics::{CommandMeter, MetricsRegistry};
use crate::record::Record;
use crate::registry::{BuildScope, CommandBuilder};

/// Runs its commands in order; with no commands it is the identity.
pub struct Pipe {
    name: String,
    commands: Vec<Box<dyn Command>>,
    meter: Option<CommandMeter>,
}

impl Pipe {
    /// A pipe counting records under `"<name>.numRecords"`.
    pub fn new(name: &str, commands: Vec<Box<dyn Command>>, metrics: &MetricsRegistry) -> Self {
        Self {
            name: name.to_string(),
            commands,
            meter: Some(CommandMeter::new(metrics, name)),
        }
    }

    /// A pipe without its own counter; the root of a morphline is metered
    /// by [`Morphline`](crate::morphline::Morphline) itself.
    pub fn unmetered(name: &str, commands: Vec<Box<dyn Command>>) -> Self {
        Self {
            name: name.to_string(),
            commands,
            meter: None,
        }
    }

    pub fn len(&self) -> usize {
        self.commands.len()
    }

    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }
}

impl Command for Pipe {
    fn name(&self) -> &str {
        &self.name
    }

    fn process(&mut self, record: Record, child: &mut dyn Downstream) -> RuntimeResult<bool> {
        if let Some(meter) = &self.meter {
            meter.mark_record();
        }
        run_chain(&mut self.commands, record, child)
    }

    fn notify(&mut self, notification: Notification) -> RuntimeResult<()> {
        notify_chain(&mut self.commands, notification)
    }
}

pub struct PipeBuilder;

impl CommandBuilder for PipeBuilder {
    fn names(&self) -> &'static [&'static str] {
        &["pipe"]
    }

    fn build(&self, config: &ConfigNode, scope: &BuildScope, compiler: &mut Compiler) -> CompileResult<Box<dyn Command>> {
        config.validate_keys(&["id", "importCommands", "commands"])?;
        let name = config.get_string_or("id", scope.command())?;

        let commands = match config.get_opt_string_list("importCommands")? {
            Some(imports) => compiler.nested(imports).build_list(config, "commands", scope)?,
            None => compiler.build_list(config, "commands", scope)?,
        };

        Ok(Box::new(Pipe::new(&name, commands, compiler.context().metrics())))
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

    #[test]
    fn test_empty_pipe_is_identity() {
        let metrics = MetricsRegistry::new();
        let mut pipe = Pipe::new("p", Vec::new(), &metrics);
        let mut sink = Collector::new();
        let mut record = Record::new();
        record.put("first_name", "Nadja");

        assert!(pipe.process(record.clone(), &mut sink).unwrap());
        assert_eq!(sink.records(), vec![record]);
        assert_eq!(metrics.counter_value("p.numRecords"), 1);
    }

    #[test]
    fn test_nested_pipe_with_own_imports() {
        let doc = json!({"commands": [
            {"pipe": {
                "id": "inner",
                "importCommands": ["morphline.stdlib.fields"],
                "commands": [{"addValues": {"a": "b"}}]
            }},
            {"addValues": {"c": "d"}}
        ]});
        let collector = Collector::new();
        let mut m = compile(&doc, None, Box::new(collector.clone()), Arc::new(MorphlineContext::new())).unwrap();
        assert!(m.process(Record::new()).unwrap());

        let out = collector.first_record().unwrap();
        assert_eq!(out.first_value("a"), Some(&Value::from("b")));
        assert_eq!(out.first_value("c"), Some(&Value::from("d")));
        assert_eq!(m.context().metrics().counter_value("inner.numRecords"), 1);
    }

    #[test]
    fn test_nested_pipe_imports_restrict_visibility() {
        let doc = json!({"commands": [
            {"pipe": {"importCommands": ["morphline.stdlib.fields"], "commands": [{"grok": {}}]}}
        ]});
        let result = compile(&doc, None, Box::new(Collector::new()), Arc::new(MorphlineContext::new()));
        assert!(result.is_err());
    }
}
