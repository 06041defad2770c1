//! URI decomposition: `extractURIComponents`, `extractURIComponent`,
//! `extractURIQueryParameters`.
//!
//! Values are split with the reference regex from RFC 3986 appendix B.
//! Values that are not URIs (whitespace, control characters, malformed
//! scheme) are skipped.

use std::borrow::Cow;

use once_cell::sync::Lazy;
use regex::Regex;

use crate::command::{Command, Downstream};
use crate::compiler::Compiler;
use crate::config::ConfigNode;
use crate::error::{CompileError, CompileResult, RuntimeResult};
use crate::metrics::CommandMeter;
use crate::record::{Record, Value};
use crate::registry::{BuildScope, CommandBuilder};

static URI_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(([^:/?#]+):)?(//([^/?#]*))?([^?#]*)(\?([^#]*))?(#(.*))?").expect("Invalid embedded URI regex")
});

static SCHEME_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z][A-Za-z0-9+.\-]*$").expect("Invalid embedded scheme regex"));

/// Component names, in output order.
pub const COMPONENTS: [&str; 9] = [
    "scheme",
    "authority",
    "path",
    "query",
    "fragment",
    "host",
    "port",
    "schemeSpecificPart",
    "userInfo",
];

fn decode(raw: &str) -> String {
    match urlencoding::decode(raw) {
        Ok(text) => text.into_owned(),
        Err(_) => raw.to_string(),
    }
}

/// `application/x-www-form-urlencoded` decoding: `+` is a space.
fn decode_form(raw: &str) -> String {
    let spaced: Cow<str> = if raw.contains('+') {
        Cow::Owned(raw.replace('+', " "))
    } else {
        Cow::Borrowed(raw)
    };
    decode(&spaced)
}

/// Raw (still percent-encoded) pieces of a URI.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UriParts<'a> {
    pub scheme: Option<&'a str>,
    pub authority: Option<&'a str>,
    pub user_info: Option<&'a str>,
    pub host: Option<&'a str>,
    pub port: Option<u16>,
    pub path: &'a str,
    pub query: Option<&'a str>,
    pub fragment: Option<&'a str>,
    pub scheme_specific_part: &'a str,
}

impl<'a> UriParts<'a> {
    pub fn parse(text: &'a str) -> Option<Self> {
        if text.is_empty() || text.chars().any(|c| c.is_whitespace() || c.is_control()) {
            return None;
        }
        let caps = URI_REGEX.captures(text)?;
        let scheme = caps.get(2).map(|m| m.as_str());
        if scheme.is_some_and(|s| !SCHEME_REGEX.is_match(s)) {
            return None;
        }

        let authority = caps.get(4).map(|m| m.as_str());
        let (user_info, host, port) = match authority {
            Some(a) => split_authority(a)?,
            None => (None, None, None),
        };

        let ssp_start = caps.get(1).map_or(0, |m| m.end());
        let ssp_end = caps.get(8).map_or(text.len(), |m| m.start());

        Some(Self {
            scheme,
            authority,
            user_info,
            host,
            port,
            path: caps.get(5).map_or("", |m| m.as_str()),
            query: caps.get(7).map(|m| m.as_str()),
            fragment: caps.get(9).map(|m| m.as_str()),
            scheme_specific_part: &text[ssp_start..ssp_end],
        })
    }

    /// Decoded value of the named component, if present and non-empty.
    pub fn component(&self, name: &str) -> Option<String> {
        let value = match name {
            "scheme" => self.scheme.map(str::to_string),
            "authority" => self.authority.map(decode),
            "path" => Some(decode(self.path)),
            "query" => self.query.map(decode),
            "fragment" => self.fragment.map(decode),
            "host" => self.host.map(str::to_string),
            "port" => self.port.map(|p| p.to_string()),
            "schemeSpecificPart" => Some(decode(self.scheme_specific_part)),
            "userInfo" => self.user_info.map(decode),
            _ => None,
        };
        value.filter(|v| !v.is_empty())
    }
}

type AuthorityParts<'a> = (Option<&'a str>, Option<&'a str>, Option<u16>);

fn split_authority(authority: &str) -> Option<AuthorityParts<'_>> {
    let (user_info, host_port) = match authority.rsplit_once('@') {
        Some((user, rest)) => (Some(user), rest),
        None => (None, authority),
    };

    let (host, port) = if host_port.starts_with('[') {
        let end = host_port.find(']')?;
        let host = &host_port[..=end];
        match &host_port[end + 1..] {
            "" => (host, None),
            rest => (host, Some(rest.strip_prefix(':')?)),
        }
    } else {
        match host_port.rsplit_once(':') {
            Some((host, port)) => (host, Some(port)),
            None => (host_port, None),
        }
    };

    let port = match port {
        None | Some("") => None,
        Some(p) => Some(p.parse::<u16>().ok()?),
    };
    let host = (!host.is_empty()).then_some(host);
    Some((user_info, host, port))
}

fn input_texts(record: &Record, field: &str) -> Vec<String> {
    record.get(field).iter().map(Value::to_text).collect()
}

// =============================================================================
// extractURIComponents
// =============================================================================

/// Writes every present component to `<prefix><component>`.
pub struct ExtractUriComponents {
    input_field: String,
    prefix: String,
    meter: CommandMeter,
}

impl Command for ExtractUriComponents {
    fn name(&self) -> &str {
        "extractURIComponents"
    }

    fn process(&mut self, mut record: Record, child: &mut dyn Downstream) -> RuntimeResult<bool> {
        self.meter.mark_record();
        for text in input_texts(&record, &self.input_field) {
            let Some(parts) = UriParts::parse(&text) else {
                tracing::debug!(value = %text, "skipping unparseable URI");
                continue;
            };
            for name in COMPONENTS {
                if let Some(value) = parts.component(name) {
                    record.put(format!("{}{}", self.prefix, name), value);
                }
            }
        }
        child.forward(record)
    }
}

pub struct ExtractUriComponentsBuilder;

impl CommandBuilder for ExtractUriComponentsBuilder {
    fn names(&self) -> &'static [&'static str] {
        &["extractURIComponents"]
    }

    fn build(&self, config: &ConfigNode, scope: &BuildScope, compiler: &mut Compiler) -> CompileResult<Box<dyn Command>> {
        config.validate_keys(&["inputField", "outputFieldPrefix"])?;
        Ok(Box::new(ExtractUriComponents {
            input_field: config.get_string("inputField")?,
            prefix: config.get_string_or("outputFieldPrefix", "")?,
            meter: CommandMeter::new(compiler.context().metrics(), scope.command()),
        }))
    }
}

// =============================================================================
// extractURIComponent
// =============================================================================

pub struct ExtractUriComponent {
    input_field: String,
    output_field: String,
    component: &'static str,
    meter: CommandMeter,
}

impl Command for ExtractUriComponent {
    fn name(&self) -> &str {
        "extractURIComponent"
    }

    fn process(&mut self, mut record: Record, child: &mut dyn Downstream) -> RuntimeResult<bool> {
        self.meter.mark_record();
        for text in input_texts(&record, &self.input_field) {
            if let Some(value) = UriParts::parse(&text).and_then(|p| p.component(self.component)) {
                record.put(&self.output_field, value);
            }
        }
        child.forward(record)
    }
}

pub struct ExtractUriComponentBuilder;

impl CommandBuilder for ExtractUriComponentBuilder {
    fn names(&self) -> &'static [&'static str] {
        &["extractURIComponent"]
    }

    fn build(&self, config: &ConfigNode, scope: &BuildScope, compiler: &mut Compiler) -> CompileResult<Box<dyn Command>> {
        config.validate_keys(&["inputField", "outputField", "component"])?;
        let requested = config.get_string("component")?;
        let component = COMPONENTS.into_iter().find(|c| *c == requested.as_str()).ok_or_else(|| {
            CompileError::invalid(
                "extractURIComponent",
                format!("Unknown URI component: {} (expected one of {})", requested, COMPONENTS.join(", ")),
            )
        })?;
        Ok(Box::new(ExtractUriComponent {
            input_field: config.get_string("inputField")?,
            output_field: config.get_string("outputField")?,
            component,
            meter: CommandMeter::new(compiler.context().metrics(), scope.command()),
        }))
    }
}

// =============================================================================
// extractURIQueryParameters
// =============================================================================

/// Copies the decoded values of one query parameter into `outputField`.
pub struct ExtractUriQueryParameters {
    parameter: String,
    input_field: String,
    output_field: String,
    max_parameters: usize,
    meter: CommandMeter,
}

impl Command for ExtractUriQueryParameters {
    fn name(&self) -> &str {
        "extractURIQueryParameters"
    }

    fn process(&mut self, mut record: Record, child: &mut dyn Downstream) -> RuntimeResult<bool> {
        self.meter.mark_record();
        let mut found = 0;

        'values: for text in input_texts(&record, &self.input_field) {
            let Some(query) = UriParts::parse(&text).and_then(|p| p.query) else {
                continue;
            };
            for pair in query.split('&').filter(|p| !p.is_empty()) {
                if found >= self.max_parameters {
                    break 'values;
                }
                let (name, value) = pair.split_once('=').unwrap_or((pair, ""));
                if decode_form(name) == self.parameter {
                    record.put(&self.output_field, decode_form(value));
                    found += 1;
                }
            }
        }
        child.forward(record)
    }
}

pub struct ExtractUriQueryParametersBuilder;

impl CommandBuilder for ExtractUriQueryParametersBuilder {
    fn names(&self) -> &'static [&'static str] {
        &["extractURIQueryParameters"]
    }

    fn build(&self, config: &ConfigNode, scope: &BuildScope, compiler: &mut Compiler) -> CompileResult<Box<dyn Command>> {
        config.validate_keys(&["parameter", "inputField", "outputField", "maxParameters"])?;
        let max_parameters = match config.get_opt_i64("maxParameters")? {
            Some(n) if n >= 0 => n as usize,
            _ => usize::MAX,
        };
        Ok(Box::new(ExtractUriQueryParameters {
            parameter: config.get_string("parameter")?,
            input_field: config.get_string("inputField")?,
            output_field: config.get_string("outputField")?,
            max_parameters,
            meter: CommandMeter::new(compiler.context().metrics(), scope.command()),
        }))
    }
}
