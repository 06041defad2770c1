//! Field manipulation commands.

use std::net::ToSocketAddrs;

use chrono::Utc;
use uuid::Uuid;

use super::{charset_option, field_exprs, FieldExpr};
use crate::command::{Command, Downstream};
use crate::compiler::Compiler;
use crate::config::ConfigNode;
use crate::error::{CompileError, CompileResult, RuntimeResult};
use crate::metrics::CommandMeter;
use crate::record::{fields, Record, Value};
use crate::registry::{BuildScope, CommandBuilder};

// =============================================================================
// addValues / addValuesIfAbsent / setValues
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum AddMode {
    Append,
    AppendIfAbsent,
    Replace,
}

/// Writes configured values (or `@{field}` copies) into fields.
pub struct AddValues {
    name: &'static str,
    mode: AddMode,
    entries: Vec<(String, Vec<FieldExpr>)>,
    meter: CommandMeter,
}

impl Command for AddValues {
    fn name(&self) -> &str {
        self.name
    }

    fn process(&mut self, mut record: Record, child: &mut dyn Downstream) -> RuntimeResult<bool> {
        self.meter.mark_record();

        // resolve references against the incoming record before writing
        let resolved: Vec<(&str, Vec<Value>)> = self
            .entries
            .iter()
            .map(|(field, exprs)| {
                let values = exprs.iter().flat_map(|e| e.evaluate(&record)).collect();
                (field.as_str(), values)
            })
            .collect();

        for (field, values) in resolved {
            match self.mode {
                AddMode::Append => record.put_all(field, values),
                AddMode::AppendIfAbsent => {
                    for value in values {
                        if !record.get(field).contains(&value) {
                            record.put(field, value);
                        }
                    }
                }
                AddMode::Replace => record.set_values(field, values),
            }
        }
        child.forward(record)
    }
}

pub struct AddValuesBuilder;

impl CommandBuilder for AddValuesBuilder {
    fn names(&self) -> &'static [&'static str] {
        &["addValues", "addValuesIfAbsent", "setValues"]
    }

    fn build(&self, config: &ConfigNode, scope: &BuildScope, compiler: &mut Compiler) -> CompileResult<Box<dyn Command>> {
        let (name, mode) = match scope.command() {
            "addValuesIfAbsent" => ("addValuesIfAbsent", AddMode::AppendIfAbsent),
            "setValues" => ("setValues", AddMode::Replace),
            _ => ("addValues", AddMode::Append),
        };
        Ok(Box::new(AddValues {
            name,
            mode,
            entries: field_exprs(config),
            meter: CommandMeter::new(compiler.context().metrics(), scope.command()),
        }))
    }
}

// =============================================================================
// addCurrentTime
// =============================================================================

/// Sets a field to the current time in epoch milliseconds.
pub struct AddCurrentTime {
    field: String,
    preserve_existing: bool,
    meter: CommandMeter,
}

impl Command for AddCurrentTime {
    fn name(&self) -> &str {
        "addCurrentTime"
    }

    fn process(&mut self, mut record: Record, child: &mut dyn Downstream) -> RuntimeResult<bool> {
        self.meter.mark_record();
        if !(self.preserve_existing && record.contains_key(&self.field)) {
            record.replace_values(&self.field, Utc::now().timestamp_millis());
        }
        child.forward(record)
    }
}

pub struct AddCurrentTimeBuilder;

impl CommandBuilder for AddCurrentTimeBuilder {
    fn names(&self) -> &'static [&'static str] {
        &["addCurrentTime"]
    }

    fn build(&self, config: &ConfigNode, scope: &BuildScope, compiler: &mut Compiler) -> CompileResult<Box<dyn Command>> {
        config.validate_keys(&["field", "preserveExisting"])?;
        Ok(Box::new(AddCurrentTime {
            field: config.get_string_or("field", fields::TIMESTAMP)?,
            preserve_existing: config.get_bool_or("preserveExisting", true)?,
            meter: CommandMeter::new(compiler.context().metrics(), scope.command()),
        }))
    }
}

// =============================================================================
// addLocalHost
// =============================================================================

/// Name of this machine, if it is valid UTF-8.
pub fn local_host_name() -> Option<String> {
    gethostname::gethostname().into_string().ok().filter(|name| !name.is_empty())
}

/// First address the local host name resolves to.
pub fn local_host_address() -> Option<String> {
    let name = local_host_name()?;
    (name.as_str(), 0)
        .to_socket_addrs()
        .ok()?
        .next()
        .map(|addr| addr.ip().to_string())
}

/// Sets a field to the local host's IP address or name, resolved once at build time.
pub struct AddLocalHost {
    field: String,
    host: Option<String>,
    preserve_existing: bool,
    meter: CommandMeter,
}

impl Command for AddLocalHost {
    fn name(&self) -> &str {
        "addLocalHost"
    }

    fn process(&mut self, mut record: Record, child: &mut dyn Downstream) -> RuntimeResult<bool> {
        self.meter.mark_record();
        if let Some(host) = &self.host {
            if !(self.preserve_existing && record.contains_key(&self.field)) {
                record.replace_values(&self.field, host.as_str());
            }
        }
        child.forward(record)
    }
}

pub struct AddLocalHostBuilder;

impl CommandBuilder for AddLocalHostBuilder {
    fn names(&self) -> &'static [&'static str] {
        &["addLocalHost"]
    }

    fn build(&self, config: &ConfigNode, scope: &BuildScope, compiler: &mut Compiler) -> CompileResult<Box<dyn Command>> {
        config.validate_keys(&["field", "preserveExisting", "useIP"])?;
        let use_ip = config.get_bool_or("useIP", true)?;
        let host = if use_ip { local_host_address() } else { local_host_name() };
        if host.is_none() {
            tracing::warn!(use_ip, "cannot resolve local host, addLocalHost will leave records unchanged");
        }
        Ok(Box::new(AddLocalHost {
            field: config.get_string_or("field", fields::HOST)?,
            host,
            preserve_existing: config.get_bool_or("preserveExisting", true)?,
            meter: CommandMeter::new(compiler.context().metrics(), scope.command()),
        }))
    }
}

// =============================================================================
// generateUUID
// =============================================================================

pub struct GenerateUuid {
    field: String,
    preserve_existing: bool,
    meter: CommandMeter,
}

impl Command for GenerateUuid {
    fn name(&self) -> &str {
        "generateUUID"
    }

    fn process(&mut self, mut record: Record, child: &mut dyn Downstream) -> RuntimeResult<bool> {
        self.meter.mark_record();
        if !(self.preserve_existing && record.contains_key(&self.field)) {
            record.replace_values(&self.field, Uuid::new_v4().to_string());
        }
        child.forward(record)
    }
}

pub struct GenerateUuidBuilder;

impl CommandBuilder for GenerateUuidBuilder {
    fn names(&self) -> &'static [&'static str] {
        &["generateUUID"]
    }

    fn build(&self, config: &ConfigNode, scope: &BuildScope, compiler: &mut Compiler) -> CompileResult<Box<dyn Command>> {
        config.validate_keys(&["field", "preserveExisting"])?;
        Ok(Box::new(GenerateUuid {
            field: config.get_string_or("field", fields::ID)?,
            preserve_existing: config.get_bool_or("preserveExisting", true)?,
            meter: CommandMeter::new(compiler.context().metrics(), scope.command()),
        }))
    }
}

// =============================================================================
// dropRecord
// =============================================================================

/// Consumes every record.
pub struct DropRecord {
    meter: CommandMeter,
}

impl Command for DropRecord {
    fn name(&self) -> &str {
        "dropRecord"
    }

    fn process(&mut self, _record: Record, _child: &mut dyn Downstream) -> RuntimeResult<bool> {
        self.meter.mark_record();
        Ok(true)
    }
}

pub struct DropRecordBuilder;

impl CommandBuilder for DropRecordBuilder {
    fn names(&self) -> &'static [&'static str] {
        &["dropRecord"]
    }

    fn build(&self, config: &ConfigNode, scope: &BuildScope, compiler: &mut Compiler) -> CompileResult<Box<dyn Command>> {
        config.validate_keys(&[])?;
        Ok(Box::new(DropRecord {
            meter: CommandMeter::new(compiler.context().metrics(), scope.command()),
        }))
    }
}

// =============================================================================
// toString / toByteArray
// =============================================================================

pub struct ToText {
    field: String,
    trim: bool,
    meter: CommandMeter,
}

impl Command for ToText {
    fn name(&self) -> &str {
        "toString"
    }

    fn process(&mut self, mut record: Record, child: &mut dyn Downstream) -> RuntimeResult<bool> {
        self.meter.mark_record();
        let values = record
            .remove_all(&self.field)
            .into_iter()
            .map(|v| {
                let text = v.to_text();
                Value::String(if self.trim { text.trim().to_string() } else { text })
            })
            .collect();
        record.set_values(&self.field, values);
        child.forward(record)
    }
}

pub struct ToStringBuilder;

impl CommandBuilder for ToStringBuilder {
    fn names(&self) -> &'static [&'static str] {
        &["toString"]
    }

    fn build(&self, config: &ConfigNode, scope: &BuildScope, compiler: &mut Compiler) -> CompileResult<Box<dyn Command>> {
        config.validate_keys(&["field", "trim"])?;
        Ok(Box::new(ToText {
            field: config.get_string("field")?,
            trim: config.get_bool_or("trim", false)?,
            meter: CommandMeter::new(compiler.context().metrics(), scope.command()),
        }))
    }
}

pub struct ToByteArray {
    field: String,
    encoding: &'static encoding_rs::Encoding,
    meter: CommandMeter,
}

impl Command for ToByteArray {
    fn name(&self) -> &str {
        "toByteArray"
    }

    fn process(&mut self, mut record: Record, child: &mut dyn Downstream) -> RuntimeResult<bool> {
        self.meter.mark_record();
        let values = record
            .remove_all(&self.field)
            .into_iter()
            .map(|v| match v {
                Value::Bytes(b) => Value::Bytes(b),
                other => {
                    let text = other.to_text();
                    let (bytes, _, _) = self.encoding.encode(&text);
                    Value::Bytes(bytes.into_owned())
                }
            })
            .collect();
        record.set_values(&self.field, values);
        child.forward(record)
    }
}

pub struct ToByteArrayBuilder;

impl CommandBuilder for ToByteArrayBuilder {
    fn names(&self) -> &'static [&'static str] {
        &["toByteArray"]
    }

    fn build(&self, config: &ConfigNode, scope: &BuildScope, compiler: &mut Compiler) -> CompileResult<Box<dyn Command>> {
        config.validate_keys(&["field", "charset"])?;
        Ok(Box::new(ToByteArray {
            field: config.get_string("field")?,
            encoding: charset_option(config, "toByteArray")?.unwrap_or(encoding_rs::UTF_8),
            meter: CommandMeter::new(compiler.context().metrics(), scope.command()),
        }))
    }
}

// =============================================================================
// logTrace / logDebug / logInfo / logWarn / logError
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LogLevel {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
}

/// Emits a formatted line through `tracing`, then forwards the record unchanged.
pub struct Log {
    name: &'static str,
    level: LogLevel,
    format: String,
    args: Vec<FieldExpr>,
    meter: CommandMeter,
}

fn render_arg(arg: &FieldExpr, record: &Record) -> String {
    match arg {
        FieldExpr::Reference(name) if name.is_empty() => record.to_json().to_string(),
        other => {
            let values = other.evaluate(record);
            match values.as_slice() {
                [single] => single.to_text(),
                many => format!(
                    "[{}]",
                    many.iter().map(Value::to_text).collect::<Vec<_>>().join(", ")
                ),
            }
        }
    }
}

/// Substitute `{}` placeholders in order; extra placeholders stay as-is.
fn render(format: &str, args: &[String]) -> String {
    let mut out = String::with_capacity(format.len());
    let mut rest = format;
    let mut args = args.iter();
    while let Some(pos) = rest.find("{}") {
        out.push_str(&rest[..pos]);
        match args.next() {
            Some(arg) => out.push_str(arg),
            None => out.push_str("{}"),
        }
        rest = &rest[pos + 2..];
    }
    out.push_str(rest);
    out
}

impl Command for Log {
    fn name(&self) -> &str {
        self.name
    }

    fn process(&mut self, record: Record, child: &mut dyn Downstream) -> RuntimeResult<bool> {
        self.meter.mark_record();
        let args: Vec<String> = self.args.iter().map(|a| render_arg(a, &record)).collect();
        let line = render(&self.format, &args);
        match self.level {
            LogLevel::Trace => tracing::trace!(target: "morphline::log", "{}", line),
            LogLevel::Debug => tracing::debug!(target: "morphline::log", "{}", line),
            LogLevel::Info => tracing::info!(target: "morphline::log", "{}", line),
            LogLevel::Warn => tracing::warn!(target: "morphline::log", "{}", line),
            LogLevel::Error => tracing::error!(target: "morphline::log", "{}", line),
        }
        child.forward(record)
    }
}

pub struct LogBuilder;

impl CommandBuilder for LogBuilder {
    fn names(&self) -> &'static [&'static str] {
        &["logTrace", "logDebug", "logInfo", "logWarn", "logError"]
    }

    fn build(&self, config: &ConfigNode, scope: &BuildScope, compiler: &mut Compiler) -> CompileResult<Box<dyn Command>> {
        config.validate_keys(&["format", "args"])?;
        let (name, level) = match scope.command() {
            "logTrace" => ("logTrace", LogLevel::Trace),
            "logDebug" => ("logDebug", LogLevel::Debug),
            "logInfo" => ("logInfo", LogLevel::Info),
            "logWarn" => ("logWarn", LogLevel::Warn),
            "logError" => ("logError", LogLevel::Error),
            other => return Err(CompileError::invalid(other, "not a log command")),
        };
        let args = config
            .get_string_list_or("args", &[])?
            .into_iter()
            .map(|a| FieldExpr::parse(Value::String(a)))
            .collect();
        Ok(Box::new(Log {
            name,
            level,
            format: config.get_string("format")?,
            args,
            meter: CommandMeter::new(compiler.context().metrics(), scope.command()),
        }))
    }
}
