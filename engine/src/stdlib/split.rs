//! `split` and `splitKeyValue`.

use regex::Regex;

use super::grok;
use crate::command::{Command, Downstream};
use crate::compiler::Compiler;
use crate::config::ConfigNode;
use crate::error::{CompileError, CompileResult, RuntimeResult};
use crate::metrics::CommandMeter;
use crate::record::{Record, Value};
use crate::registry::{BuildScope, CommandBuilder};

#[derive(Debug, Clone)]
enum Separator {
    Literal(String),
    Pattern(Regex),
}

/// Splitting rules shared by both commands.
#[derive(Debug, Clone)]
struct Splitter {
    separator: Separator,
    trim: bool,
    add_empty_strings: bool,
    /// Maximum number of pieces; the last piece keeps the remainder.
    limit: Option<usize>,
}

impl Splitter {
    fn from_config(config: &ConfigNode, command: &str, default_separator: Option<&str>) -> CompileResult<Self> {
        let raw = match default_separator {
            Some(default) => config.get_string_or("separator", default)?,
            None => config.get_string("separator")?,
        };
        if raw.is_empty() {
            return Err(CompileError::invalid(command, "separator must not be empty"));
        }
        let separator = if config.get_bool_or("isRegex", false)? {
            let dictionary = grok::dictionary_from_config(config, command)?;
            let expanded = grok::expand_regex(command, &raw, &dictionary)?;
            Separator::Pattern(
                Regex::new(&expanded)
                    .map_err(|e| CompileError::invalid(command, format!("Invalid regex {}: {}", raw, e)))?,
            )
        } else {
            Separator::Literal(raw)
        };
        Ok(Self {
            separator,
            trim: config.get_bool_or("trim", true)?,
            add_empty_strings: config.get_bool_or("addEmptyStrings", false)?,
            limit: None,
        })
    }

    fn raw_pieces<'a>(&self, text: &'a str) -> Vec<&'a str> {
        let limit = self.limit.unwrap_or(usize::MAX);
        match &self.separator {
            Separator::Literal(sep) => text.splitn(limit, sep.as_str()).collect(),
            Separator::Pattern(re) => re.splitn(text, limit).collect(),
        }
    }

    fn split<'a>(&self, text: &'a str) -> Vec<&'a str> {
        self.raw_pieces(text)
            .into_iter()
            .map(|p| if self.trim { p.trim() } else { p })
            .filter(|p| self.add_empty_strings || !p.is_empty())
            .collect()
    }

    /// Split into `(key, value)` at the first separator.
    fn split_pair<'a>(&self, text: &'a str) -> Option<(&'a str, &'a str)> {
        let (key, value) = match &self.separator {
            Separator::Literal(sep) => text.split_once(sep.as_str())?,
            Separator::Pattern(re) => {
                let m = re.find(text)?;
                (&text[..m.start()], &text[m.end()..])
            }
        };
        if self.trim {
            Some((key.trim(), value.trim()))
        } else {
            Some((key, value))
        }
    }
}

#[derive(Debug, Clone)]
enum SplitOutput {
    /// Every piece is appended to one field.
    Field(String),
    /// Piece `i` goes to field `i`; empty names drop the piece.
    Columns(Vec<String>),
}

/// Splits each value of `inputField` into pieces.
pub struct Split {
    input_field: String,
    output: SplitOutput,
    splitter: Splitter,
    meter: CommandMeter,
}

impl Command for Split {
    fn name(&self) -> &str {
        "split"
    }

    fn process(&mut self, mut record: Record, child: &mut dyn Downstream) -> RuntimeResult<bool> {
        self.meter.mark_record();
        let inputs: Vec<String> = record.get(&self.input_field).iter().map(Value::to_text).collect();

        for text in &inputs {
            let pieces = self.splitter.split(text);
            match &self.output {
                SplitOutput::Field(name) => record.put_all(name, pieces),
                SplitOutput::Columns(names) => {
                    for (name, piece) in names.iter().zip(pieces) {
                        if !name.is_empty() {
                            record.put(name, piece);
                        }
                    }
                }
            }
        }
        child.forward(record)
    }
}

pub struct SplitBuilder;

impl CommandBuilder for SplitBuilder {
    fn names(&self) -> &'static [&'static str] {
        &["split"]
    }

    fn build(&self, config: &ConfigNode, scope: &BuildScope, compiler: &mut Compiler) -> CompileResult<Box<dyn Command>> {
        config.validate_keys(&[
            "inputField",
            "outputField",
            "outputFields",
            "separator",
            "isRegex",
            "trim",
            "addEmptyStrings",
            "limit",
            "dictionaryFiles",
            "dictionaryString",
        ])?;

        let output = match (config.get_opt_string("outputField")?, config.get_opt_string_list("outputFields")?) {
            (Some(field), None) => SplitOutput::Field(field),
            (None, Some(columns)) => SplitOutput::Columns(columns),
            _ => {
                return Err(CompileError::invalid(
                    "split",
                    "Exactly one of outputField or outputFields must be given",
                ))
            }
        };

        let mut splitter = Splitter::from_config(config, "split", None)?;
        splitter.limit = match config.get_opt_i64("limit")? {
            None => None,
            Some(n) if n < 0 => None,
            Some(0) => return Err(CompileError::invalid("split", "limit must be positive")),
            Some(n) => Some(n as usize),
        };

        Ok(Box::new(Split {
            input_field: config.get_string("inputField")?,
            output,
            splitter,
            meter: CommandMeter::new(compiler.context().metrics(), scope.command()),
        }))
    }
}

/// Splits `key=value` values into fields named `<prefix><key>`.
pub struct SplitKeyValue {
    input_field: String,
    prefix: String,
    splitter: Splitter,
    meter: CommandMeter,
}

impl Command for SplitKeyValue {
    fn name(&self) -> &str {
        "splitKeyValue"
    }

    fn process(&mut self, mut record: Record, child: &mut dyn Downstream) -> RuntimeResult<bool> {
        self.meter.mark_record();
        let inputs: Vec<String> = record.get(&self.input_field).iter().map(Value::to_text).collect();

        for text in &inputs {
            let Some((key, value)) = self.splitter.split_pair(text) else {
                continue;
            };
            if key.is_empty() || (value.is_empty() && !self.splitter.add_empty_strings) {
                continue;
            }
            record.put(format!("{}{}", self.prefix, key), value);
        }
        child.forward(record)
    }
}

pub struct SplitKeyValueBuilder;

impl CommandBuilder for SplitKeyValueBuilder {
    fn names(&self) -> &'static [&'static str] {
        &["splitKeyValue"]
    }

    fn build(&self, config: &ConfigNode, scope: &BuildScope, compiler: &mut Compiler) -> CompileResult<Box<dyn Command>> {
        config.validate_keys(&[
            "inputField",
            "outputFieldPrefix",
            "separator",
            "isRegex",
            "trim",
            "addEmptyStrings",
            "dictionaryFiles",
            "dictionaryString",
        ])?;
        Ok(Box::new(SplitKeyValue {
            input_field: config.get_string("inputField")?,
            prefix: config.get_string_or("outputFieldPrefix", "")?,
            splitter: Splitter::from_config(config, "splitKeyValue", Some("="))?,
            meter: CommandMeter::new(compiler.context().metrics(), scope.command()),
        }))
    }
}
