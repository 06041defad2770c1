//! `translate`: map field values through a dictionary.

use std::collections::HashMap;

use crate::command::{Command, Downstream};
use crate::compiler::Compiler;
use crate::config::ConfigNode;
use crate::error::{CompileResult, RuntimeResult};
use crate::metrics::CommandMeter;
use crate::record::{Record, Value};
use crate::registry::{BuildScope, CommandBuilder};

/// Replaces every value of `field` with its dictionary entry.
///
/// Lookups use the text form of the value, so `0` and `"0"` hit the same
/// entry. A value with no entry is replaced by `fallback` when configured;
/// otherwise the record is rejected.
pub struct Translate {
    field: String,
    dictionary: HashMap<String, Value>,
    fallback: Option<Value>,
    meter: CommandMeter,
}

impl Command for Translate {
    fn name(&self) -> &str {
        "translate"
    }

    fn process(&mut self, mut record: Record, child: &mut dyn Downstream) -> RuntimeResult<bool> {
        self.meter.mark_record();
        let mut translated = Vec::with_capacity(record.get(&self.field).len());
        for value in record.get(&self.field) {
            match self.dictionary.get(&value.to_text()).or(self.fallback.as_ref()) {
                Some(v) => translated.push(v.clone()),
                None => {
                    tracing::debug!(field = %self.field, value = %value, "no translation");
                    return Ok(false);
                }
            }
        }
        record.set_values(&self.field, translated);
        child.forward(record)
    }
}

pub struct TranslateBuilder;

impl CommandBuilder for TranslateBuilder {
    fn names(&self) -> &'static [&'static str] {
        &["translate"]
    }

    fn build(&self, config: &ConfigNode, scope: &BuildScope, compiler: &mut Compiler) -> CompileResult<Box<dyn Command>> {
        config.validate_keys(&["field", "dictionary", "fallback"])?;

        let dictionary = config
            .get_node("dictionary")?
            .entries()
            .into_iter()
            .map(|(key, node)| (key, Value::from_json(node.value())))
            .collect();
        let fallback = config
            .as_object()
            .and_then(|o| o.get("fallback"))
            .filter(|v| !v.is_null())
            .map(Value::from_json);

        Ok(Box::new(Translate {
            field: config.get_string("field")?,
            dictionary,
            fallback,
            meter: CommandMeter::new(compiler.context().metrics(), scope.command()),
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stdlib::test_support::{record, run};
    use serde_json::json;

    fn severity(fallback: bool) -> serde_json::Value {
        let mut options = json!({
            "field": "level",
            "dictionary": {"0": "Emergency", "1": "Alert", "2": "Critical"}
        });
        if fallback {
            options["fallback"] = json!("unknown");
        }
        json!([{"translate": options}])
    }

    #[test]
    fn test_numeric_and_text_keys_match() {
        let mut input = Record::new();
        input.put("level", 0);
        input.put("level", "1");
        let (ok, out) = run(severity(false), input).unwrap();
        assert!(ok);
        assert_eq!(out[0].get("level"), &[Value::from("Emergency"), Value::from("Alert")]);
    }

    #[test]
    fn test_fallback() {
        let mut input = Record::new();
        input.put("level", 999);
        let (ok, out) = run(severity(true), input).unwrap();
        assert!(ok);
        assert_eq!(out[0].get("level"), &[Value::from("unknown")]);
    }

    #[test]
    fn test_missing_key_without_fallback_rejects() {
        let (ok, out) = run(severity(false), record(&[("level", "999")])).unwrap();
        assert!(!ok);
        assert!(out.is_empty());
    }
}
