//! `decodeBase64`: replace base64 text with the decoded bytes.

use base64::{engine::general_purpose::STANDARD, Engine};

use crate::command::{Command, Downstream};
use crate::compiler::Compiler;
use crate::config::ConfigNode;
use crate::error::{CompileResult, RuntimeError, RuntimeResult};
use crate::metrics::CommandMeter;
use crate::record::{Record, Value};
use crate::registry::{BuildScope, CommandBuilder};

const NAME: &str = "decodeBase64";

pub struct DecodeBase64 {
    field: String,
    meter: CommandMeter,
}

impl Command for DecodeBase64 {
    fn name(&self) -> &str {
        NAME
    }

    fn process(&mut self, mut record: Record, child: &mut dyn Downstream) -> RuntimeResult<bool> {
        self.meter.mark_record();
        let decoded = record
            .get(&self.field)
            .iter()
            .map(|value| {
                STANDARD
                    .decode(value.to_text().trim())
                    .map(Value::Bytes)
                    .map_err(|e| RuntimeError::new(NAME, format!("Invalid base64 in field '{}': {}", self.field, e)))
            })
            .collect::<RuntimeResult<Vec<_>>>()?;
        record.set_values(&self.field, decoded);
        child.forward(record)
    }
}

pub struct DecodeBase64Builder;

impl CommandBuilder for DecodeBase64Builder {
    fn names(&self) -> &'static [&'static str] {
        &[NAME]
    }

    fn build(&self, config: &ConfigNode, scope: &BuildScope, compiler: &mut Compiler) -> CompileResult<Box<dyn Command>> {
        config.validate_keys(&["field"])?;
        Ok(Box::new(DecodeBase64 {
            field: config.get_string("field")?,
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
    fn test_decode() {
        let (ok, out) = run(
            json!([{"decodeBase64": {"field": "data"}}]),
            record(&[("data", "aGVsbG8="), ("data", " d29ybGQ= ")]),
        )
        .unwrap();
        assert!(ok);
        assert_eq!(
            out[0].get("data"),
            &[Value::Bytes(b"hello".to_vec()), Value::Bytes(b"world".to_vec())]
        );
    }

    #[test]
    fn test_malformed_input_is_a_fault() {
        let err = run(json!([{"decodeBase64": {"field": "data"}}]), record(&[("data", "not base64!")])).unwrap_err();
        assert_eq!(err.command, "decodeBase64");
    }
}
