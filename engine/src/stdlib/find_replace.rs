//! `findReplace`: literal or regex substitution in field values.

use regex::Regex;

use super::grok;
use crate::command::{Command, Downstream};
use crate::compiler::Compiler;
use crate::config::ConfigNode;
use crate::error::{CompileError, CompileResult, RuntimeResult};
use crate::metrics::CommandMeter;
use crate::record::{Record, Value};
use crate::registry::{BuildScope, CommandBuilder};

enum Matcher {
    Literal(String),
    /// Replacement may reference groups as `$1` or `${name}`.
    Pattern(Regex),
}

pub struct FindReplace {
    field: String,
    matcher: Matcher,
    replacement: String,
    replace_first: bool,
    meter: CommandMeter,
}

impl FindReplace {
    fn apply(&self, text: &str) -> String {
        match (&self.matcher, self.replace_first) {
            (Matcher::Literal(p), true) => text.replacen(p.as_str(), &self.replacement, 1),
            (Matcher::Literal(p), false) => text.replace(p.as_str(), &self.replacement),
            (Matcher::Pattern(re), true) => re.replace(text, self.replacement.as_str()).into_owned(),
            (Matcher::Pattern(re), false) => re.replace_all(text, self.replacement.as_str()).into_owned(),
        }
    }
}

impl Command for FindReplace {
    fn name(&self) -> &str {
        "findReplace"
    }

    fn process(&mut self, mut record: Record, child: &mut dyn Downstream) -> RuntimeResult<bool> {
        self.meter.mark_record();
        let replaced: Vec<Value> = record
            .get(&self.field)
            .iter()
            .map(|v| match v {
                Value::String(s) => Value::String(self.apply(s)),
                other => other.clone(),
            })
            .collect();
        record.set_values(&self.field, replaced);
        child.forward(record)
    }
}

pub struct FindReplaceBuilder;

impl CommandBuilder for FindReplaceBuilder {
    fn names(&self) -> &'static [&'static str] {
        &["findReplace"]
    }

    fn build(&self, config: &ConfigNode, scope: &BuildScope, compiler: &mut Compiler) -> CompileResult<Box<dyn Command>> {
        config.validate_keys(&[
            "field",
            "pattern",
            "isRegex",
            "replacement",
            "replaceFirst",
            "dictionaryFiles",
            "dictionaryString",
        ])?;

        let pattern = config.get_string("pattern")?;
        let matcher = if config.get_bool_or("isRegex", false)? {
            let dictionary = grok::dictionary_from_config(config, "findReplace")?;
            let expanded = grok::expand_regex("findReplace", &pattern, &dictionary)?;
            Matcher::Pattern(
                Regex::new(&expanded)
                    .map_err(|e| CompileError::invalid("findReplace", format!("Invalid regex {}: {}", pattern, e)))?,
            )
        } else if pattern.is_empty() {
            return Err(CompileError::invalid("findReplace", "pattern must not be empty"));
        } else {
            Matcher::Literal(pattern)
        };

        Ok(Box::new(FindReplace {
            field: config.get_string("field")?,
            matcher,
            replacement: config.get_string("replacement")?,
            replace_first: config.get_bool_or("replaceFirst", false)?,
            meter: CommandMeter::new(compiler.context().metrics(), scope.command()),
        }))
    }
}
