//! `grok`: extract structured fields from text with named regex patterns.
//!
//! A grok expression is a regex in which `%{NAME}` references a pattern
//! from the dictionary and `%{NAME:field}` additionally captures the match
//! into `field`. A third part converts the capture:
//! `%{INT:port:int}`. References expand recursively.
//!
//! ```text
//! "<%{POSINT:pri}>%{SYSLOGTIMESTAMP:ts} %{GREEDYDATA:msg}"
//!                 │ expand
//!                 ▼
//! "<(?P<g0>\b(?:[1-9][0-9]*)\b)>(?P<g1>...) (?P<g2>.*)"   g0 → pri, g1 → ts, g2 → msg
//! ```

use once_cell::sync::Lazy;
use regex::{Captures, Regex};
use std::collections::HashMap;
use std::path::Path;

use crate::command::{Command, Downstream};
use crate::compiler::Compiler;
use crate::config::ConfigNode;
use crate::error::{CompileError, CompileResult, RuntimeResult};
use crate::metrics::CommandMeter;
use crate::record::{Record, Value};
use crate::registry::{BuildScope, CommandBuilder};

const NAME: &str = "grok";

/// Maximum nesting of `%{...}` references.
const MAX_DEPTH: usize = 64;

/// Patterns available to every grok command.
pub const BUILTIN_DICTIONARY: &str = r#"
# basic atoms
USERNAME [a-zA-Z0-9._-]+
USER %{USERNAME}
INT (?:[+-]?(?:[0-9]+))
BASE10NUM [+-]?(?:[0-9]+(?:\.[0-9]+)?|\.[0-9]+)
NUMBER (?:%{BASE10NUM})
BASE16NUM (?:0[xX])?[0-9A-Fa-f]+
POSINT \b(?:[1-9][0-9]*)\b
NONNEGINT \b(?:[0-9]+)\b
WORD \b\w+\b
NOTSPACE \S+
SPACE \s*
DATA .*?
GREEDYDATA .*
QUOTEDSTRING "(?:[^"\\]|\\.)*"|'(?:[^'\\]|\\.)*'
UUID [A-Fa-f0-9]{8}-(?:[A-Fa-f0-9]{4}-){3}[A-Fa-f0-9]{12}

# networking
IPV4 (?:(?:25[0-5]|2[0-4][0-9]|[01]?[0-9]{1,2})\.){3}(?:25[0-5]|2[0-4][0-9]|[01]?[0-9]{1,2})
IPV6 (?:[0-9A-Fa-f]{0,4}:){2,7}[0-9A-Fa-f]{0,4}
IP (?:%{IPV6}|%{IPV4})
HOSTNAME \b(?:[0-9A-Za-z][0-9A-Za-z-]{0,62})(?:\.(?:[0-9A-Za-z][0-9A-Za-z-]{0,62}))*(?:\.?|\b)
HOST %{HOSTNAME}
IPORHOST (?:%{IP}|%{HOSTNAME})
HOSTPORT %{IPORHOST}:%{POSINT}

# paths and uris
UNIXPATH (?:/[\w_%!$@:.,~-]*)+
PATH %{UNIXPATH}
URIPROTO [A-Za-z]+(?:\+[A-Za-z+]+)?
URIHOST %{IPORHOST}(?::%{POSINT})?
URIPATH (?:/[A-Za-z0-9$.+!*'(){},~:;=@#%_\-]*)+
URIPARAM \?[A-Za-z0-9$.+!*'|(){},~@#%&/=:;_?\-\[\]]*
URIPATHPARAM %{URIPATH}(?:%{URIPARAM})?
URI %{URIPROTO}://(?:%{USER}(?::[^@]*)?@)?(?:%{URIHOST})?(?:%{URIPATHPARAM})?

# dates and times
MONTH \b(?:Jan(?:uary)?|Feb(?:ruary)?|Mar(?:ch)?|Apr(?:il)?|May|June?|July?|Aug(?:ust)?|Sep(?:tember)?|Oct(?:ober)?|Nov(?:ember)?|Dec(?:ember)?)\b
MONTHNUM (?:0?[1-9]|1[0-2])
MONTHDAY (?:(?:0[1-9])|(?:[12][0-9])|(?:3[01])|[1-9])
DAY (?:Mon(?:day)?|Tue(?:sday)?|Wed(?:nesday)?|Thu(?:rsday)?|Fri(?:day)?|Sat(?:urday)?|Sun(?:day)?)
YEAR (?:\d\d){1,2}
HOUR (?:2[0123]|[01]?[0-9])
MINUTE (?:[0-5][0-9])
SECOND (?:(?:[0-5]?[0-9]|60)(?:[:.,][0-9]+)?)
TIME %{HOUR}:%{MINUTE}(?::%{SECOND})?
DATE_US %{MONTHNUM}[/-]%{MONTHDAY}[/-]%{YEAR}
DATE_EU %{MONTHDAY}[./-]%{MONTHNUM}[./-]%{YEAR}
ISO8601_TIMEZONE (?:Z|[+-]%{HOUR}(?::?%{MINUTE}))
TIMESTAMP_ISO8601 %{YEAR}-%{MONTHNUM}-%{MONTHDAY}[T ]%{HOUR}:?%{MINUTE}(?::?%{SECOND})?%{ISO8601_TIMEZONE}?
DATE %{DATE_US}|%{DATE_EU}
DATESTAMP %{DATE}[- ]%{TIME}
HTTPDATE %{MONTHDAY}/%{MONTH}/%{YEAR}:%{TIME} %{INT}

# syslog
SYSLOGTIMESTAMP %{MONTH} +%{MONTHDAY} %{TIME}
PROG [\w._/%-]+
SYSLOGPROG %{PROG:program}(?:\[%{POSINT:pid}\])?
SYSLOGHOST %{IPORHOST}
SYSLOGFACILITY <%{NONNEGINT:facility}.%{NONNEGINT:priority}>
SYSLOGBASE %{SYSLOGTIMESTAMP:timestamp} (?:%{SYSLOGFACILITY} )?%{SYSLOGHOST:logsource} %{SYSLOGPROG}:
LOGLEVEL (?:[Aa]lert|ALERT|[Tt]race|TRACE|[Dd]ebug|DEBUG|[Nn]otice|NOTICE|[Ii]nfo|INFO|[Ww]arn?(?:ing)?|WARN?(?:ING)?|[Ee]rr?(?:or)?|ERR?(?:OR)?|[Cc]rit?(?:ical)?|CRIT?(?:ICAL)?|[Ff]atal|FATAL|[Ss]evere|SEVERE|EMERG(?:ENCY)?|[Ee]merg(?:ency)?)
"#;

static BUILTIN: Lazy<HashMap<String, String>> = Lazy::new(|| {
    parse_dictionary(BUILTIN_DICTIONARY)
        .map(|entries| entries.into_iter().collect())
        .expect("built-in grok dictionary is valid")
});

static REFERENCE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"%\{(\w+)(?::([\w.@\[\]-]+))?(?::(int|long|float|double|string|boolean))?\}")
        .expect("grok reference regex is valid")
});

// =============================================================================
// Dictionary and expansion
// =============================================================================

/// Parse `NAME regex` lines. Blank lines and `#` comments are skipped.
pub fn parse_dictionary(text: &str) -> Result<Vec<(String, String)>, String> {
    let mut entries = Vec::new();
    for (lineno, line) in text.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        match line.split_once(char::is_whitespace) {
            Some((name, pattern)) if !pattern.trim().is_empty() => {
                entries.push((name.to_string(), pattern.trim().to_string()));
            }
            _ => return Err(format!("Invalid grok dictionary line {}: {}", lineno + 1, line)),
        }
    }
    Ok(entries)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Conversion {
    Text,
    Int,
    Float,
    Bool,
}

impl Conversion {
    fn parse(spec: Option<&str>) -> Self {
        match spec {
            Some("int") | Some("long") => Conversion::Int,
            Some("float") | Some("double") => Conversion::Float,
            Some("boolean") => Conversion::Bool,
            _ => Conversion::Text,
        }
    }

    fn apply(self, text: &str) -> Value {
        match self {
            Conversion::Text => Value::from(text),
            Conversion::Int => text.parse::<i64>().map(Value::Int).unwrap_or_else(|_| Value::from(text)),
            Conversion::Float => text.parse::<f64>().map(Value::Float).unwrap_or_else(|_| Value::from(text)),
            Conversion::Bool => text.parse::<bool>().map(Value::Bool).unwrap_or_else(|_| Value::from(text)),
        }
    }
}

/// How `%{NAME:field}` captures are named in the generated regex.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum GroupNaming {
    /// `g0`, `g1`, ... mapped back to fields after matching; allows any field name.
    Generated,
    /// The field itself, so replacements can refer to `${field}`.
    Field,
}

struct Expander<'a> {
    command: &'a str,
    dictionary: &'a HashMap<String, String>,
    naming: GroupNaming,
    captures: Vec<(String, Conversion)>,
}

impl Expander<'_> {
    fn group_name(&self, field: &str) -> CompileResult<String> {
        match self.naming {
            GroupNaming::Generated => Ok(format!("g{}", self.captures.len())),
            GroupNaming::Field => {
                let valid = field.chars().next().map_or(false, |c| c.is_ascii_alphabetic() || c == '_')
                    && field.chars().all(|c| c.is_ascii_alphanumeric() || c == '_');
                if !valid {
                    return Err(CompileError::invalid(
                        self.command,
                        format!("Invalid capture name in grok reference: {}", field),
                    ));
                }
                Ok(field.to_string())
            }
        }
    }

    fn expand(&mut self, pattern: &str, depth: usize) -> CompileResult<String> {
        if depth > MAX_DEPTH {
            return Err(CompileError::invalid(
                self.command,
                format!("Grok pattern nesting too deep: {}", pattern),
            ));
        }

        let dictionary = self.dictionary;
        let mut out = String::with_capacity(pattern.len());
        let mut last = 0;
        for caps in REFERENCE_RE.captures_iter(pattern) {
            let whole = caps.get(0).map(|m| m.range()).unwrap_or(0..0);
            out.push_str(&pattern[last..whole.start]);
            last = whole.end;

            let name = &caps[1];
            let body = dictionary
                .get(name)
                .ok_or_else(|| CompileError::invalid(self.command, format!("Unknown grok pattern: {}", name)))?;
            let expanded = self.expand(body, depth + 1)?;

            match caps.get(2) {
                Some(field) => {
                    let group = self.group_name(field.as_str())?;
                    self.captures
                        .push((field.as_str().to_string(), Conversion::parse(caps.get(3).map(|m| m.as_str()))));
                    out.push_str(&format!("(?P<{}>{})", group, expanded));
                }
                None => out.push_str(&format!("(?:{})", expanded)),
            }
        }
        out.push_str(&pattern[last..]);
        Ok(out)
    }
}

/// One compiled grok expression.
struct GrokRegex {
    regex: Regex,
    /// generated group name → (field, conversion)
    groups: HashMap<String, (String, Conversion)>,
}

impl GrokRegex {
    fn compile(pattern: &str, dictionary: &HashMap<String, String>, find_substrings: bool) -> CompileResult<Self> {
        let mut expander = Expander {
            command: NAME,
            dictionary,
            naming: GroupNaming::Generated,
            captures: Vec::new(),
        };
        let expanded = expander.expand(pattern, 0)?;
        let source = if find_substrings {
            expanded
        } else {
            format!("^(?:{})$", expanded)
        };
        let regex = Regex::new(&source)
            .map_err(|e| CompileError::invalid(NAME, format!("Invalid grok expression {}: {}", pattern, e)))?;
        let groups = expander
            .captures
            .into_iter()
            .enumerate()
            .map(|(i, capture)| (format!("g{}", i), capture))
            .collect();
        Ok(Self { regex, groups })
    }

    fn extract(&self, caps: &Captures<'_>, add_empty_strings: bool, out: &mut Vec<(String, Value)>) {
        for name in self.regex.capture_names().flatten() {
            let Some(m) = caps.name(name) else { continue };
            if m.as_str().is_empty() && !add_empty_strings {
                continue;
            }
            match self.groups.get(name) {
                Some((field, conversion)) => out.push((field.clone(), conversion.apply(m.as_str()))),
                None => out.push((name.to_string(), Value::from(m.as_str()))),
            }
        }
    }
}

// =============================================================================
// Command
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Extract {
    /// Add captures to the record.
    Yes,
    /// Only test for a match.
    No,
    /// Add captures to the record being processed.
    InPlace,
}

/// How many values of a field must match an expression.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Required {
    AtLeastOnce,
    Once,
    All,
}

struct Expression {
    field: String,
    regexes: Vec<GrokRegex>,
}

pub struct Grok {
    expressions: Vec<Expression>,
    extract: Extract,
    required: Required,
    find_substrings: bool,
    add_empty_strings: bool,
    meter: CommandMeter,
}

impl Grok {
    /// Try the expression's regexes in order against one value; the first
    /// that matches contributes its captures.
    fn match_value(&self, expression: &Expression, text: &str, out: &mut Vec<(String, Value)>) -> bool {
        for grok in &expression.regexes {
            if self.find_substrings {
                let mut found = false;
                for caps in grok.regex.captures_iter(text) {
                    found = true;
                    grok.extract(&caps, self.add_empty_strings, out);
                }
                if found {
                    return true;
                }
            } else if let Some(caps) = grok.regex.captures(text) {
                grok.extract(&caps, self.add_empty_strings, out);
                return true;
            }
        }
        false
    }
}

impl Command for Grok {
    fn name(&self) -> &str {
        NAME
    }

    fn process(&mut self, mut record: Record, child: &mut dyn Downstream) -> RuntimeResult<bool> {
        self.meter.mark_record();
        let mut extracted = Vec::new();

        for expression in &self.expressions {
            let texts: Vec<String> = record.get(&expression.field).iter().map(Value::to_text).collect();
            let mut matched = 0usize;
            for text in &texts {
                if self.match_value(expression, text, &mut extracted) {
                    matched += 1;
                    if self.required == Required::Once {
                        break;
                    }
                } else if self.required == Required::All {
                    tracing::trace!(field = %expression.field, "grok value did not match");
                    return Ok(false);
                }
            }
            if matched == 0 && self.required != Required::All {
                tracing::trace!(field = %expression.field, "grok found no match");
                return Ok(false);
            }
        }

        match self.extract {
            Extract::No => {}
            Extract::Yes | Extract::InPlace => {
                for (field, value) in extracted {
                    record.put(field, value);
                }
            }
        }
        child.forward(record)
    }
}

pub struct GrokBuilder;

fn load_dictionary_file(command: &str, path: &Path, into: &mut HashMap<String, String>) -> CompileResult<()> {
    let io_err =
        |e: std::io::Error| CompileError::invalid(command, format!("Cannot read grok dictionary {}: {}", path.display(), e));

    if path.is_dir() {
        let mut files: Vec<_> = std::fs::read_dir(path)
            .map_err(io_err)?
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|p| p.is_file())
            .collect();
        files.sort();
        for file in files {
            load_dictionary_file(command, &file, into)?;
        }
        return Ok(());
    }

    let text = std::fs::read_to_string(path).map_err(io_err)?;
    let entries = parse_dictionary(&text).map_err(|msg| CompileError::invalid(command, msg))?;
    into.extend(entries);
    Ok(())
}

/// Built-in patterns extended with the command's `dictionaryFiles` and
/// `dictionaryString` options, later definitions winning.
pub fn dictionary_from_config(config: &ConfigNode, command: &str) -> CompileResult<HashMap<String, String>> {
    let mut dictionary = BUILTIN.clone();
    for file in config.get_string_list_or("dictionaryFiles", &[])? {
        load_dictionary_file(command, Path::new(&file), &mut dictionary)?;
    }
    if let Some(text) = config.get_opt_string("dictionaryString")? {
        let entries = parse_dictionary(&text).map_err(|msg| CompileError::invalid(command, msg))?;
        dictionary.extend(entries);
    }
    Ok(dictionary)
}

/// Expand `%{NAME}` references of a plain regex. `%{NAME:field}` becomes the
/// named group `field`; conversions are ignored.
pub fn expand_regex(command: &str, pattern: &str, dictionary: &HashMap<String, String>) -> CompileResult<String> {
    let mut expander = Expander {
        command,
        dictionary,
        naming: GroupNaming::Field,
        captures: Vec::new(),
    };
    expander.expand(pattern, 0)
}

impl CommandBuilder for GrokBuilder {
    fn names(&self) -> &'static [&'static str] {
        &[NAME]
    }

    fn build(&self, config: &ConfigNode, scope: &BuildScope, compiler: &mut Compiler) -> CompileResult<Box<dyn Command>> {
        config.validate_keys(&[
            "dictionaryFiles",
            "dictionaryString",
            "expressions",
            "extract",
            "numRequiredMatches",
            "findSubstrings",
            "addEmptyStrings",
        ])?;

        let dictionary = dictionary_from_config(config, NAME)?;

        let extract = match config.get_string_or("extract", "true")?.as_str() {
            "true" => Extract::Yes,
            "false" => Extract::No,
            "inplace" => Extract::InPlace,
            other => return Err(CompileError::invalid(NAME, format!("Unknown extract mode: {}", other))),
        };
        let required = match config.get_string_or("numRequiredMatches", "atLeastOnce")?.as_str() {
            "atLeastOnce" => Required::AtLeastOnce,
            "once" => Required::Once,
            "all" => Required::All,
            other => {
                return Err(CompileError::invalid(
                    NAME,
                    format!("Unknown numRequiredMatches: {}", other),
                ))
            }
        };
        let find_substrings = config.get_bool_or("findSubstrings", false)?;

        let mut expressions = Vec::new();
        if let Some(node) = config.get_opt_node("expressions")? {
            for (field, patterns) in node.entries() {
                let regexes = patterns
                    .scalars()
                    .iter()
                    .filter_map(|p| p.as_str().map(str::to_string))
                    .map(|p| GrokRegex::compile(&p, &dictionary, find_substrings))
                    .collect::<CompileResult<Vec<_>>>()?;
                expressions.push(Expression { field, regexes });
            }
        }

        tracing::debug!(expressions = expressions.len(), dictionary = dictionary.len(), "compiled grok");

        Ok(Box::new(Grok {
            expressions,
            extract,
            required,
            find_substrings,
            add_empty_strings: config.get_bool_or("addEmptyStrings", false)?,
            meter: CommandMeter::new(compiler.context().metrics(), scope.command()),
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stdlib::test_support::{compile_error, record, run};
    use serde_json::json;

    const SYSLOG: &str = r"<%{POSINT:syslog_pri}>%{SYSLOGTIMESTAMP:syslog_timestamp} %{SYSLOGHOST:syslog_hostname} %{DATA:syslog_program}(?:\[%{POSINT:syslog_pid}\])?: %{GREEDYDATA:syslog_message}";

    #[test]
    fn test_builtin_dictionary_parses() {
        let entries = parse_dictionary(BUILTIN_DICTIONARY).unwrap();
        assert!(entries.len() > 40);
        assert_eq!(BUILTIN.len(), entries.len());
        for (name, _) in &entries {
            GrokRegex::compile(&format!("%{{{}}}", name), &BUILTIN, true)
                .unwrap_or_else(|e| panic!("{} does not compile: {}", name, e));
        }
    }

    #[test]
    fn test_syslog_line() {
        let (ok, out) = run(
            json!([{"grok": {"expressions": {"message": SYSLOG}}}]),
            record(&[("message", "<164>Feb  4 10:46:14 syslog sshd[607]: Server listening on 0.0.0.0 port 22.")]),
        )
        .unwrap();
        assert!(ok);
        let r = &out[0];
        assert_eq!(r.get("syslog_pri"), &[Value::from("164")]);
        assert_eq!(r.get("syslog_timestamp"), &[Value::from("Feb  4 10:46:14")]);
        assert_eq!(r.get("syslog_hostname"), &[Value::from("syslog")]);
        assert_eq!(r.get("syslog_program"), &[Value::from("sshd")]);
        assert_eq!(r.get("syslog_pid"), &[Value::from("607")]);
        assert_eq!(r.get("syslog_message"), &[Value::from("Server listening on 0.0.0.0 port 22.")]);
    }

    #[test]
    fn test_no_match_filters_record() {
        let (ok, out) = run(
            json!([{"grok": {"expressions": {"message": SYSLOG}}}]),
            record(&[("message", "not syslog at all")]),
        )
        .unwrap();
        assert!(!ok);
        assert!(out.is_empty());
    }

    #[test]
    fn test_custom_dictionary_and_conversion() {
        let (_, out) = run(
            json!([{"grok": {
                "dictionaryString": "PAIR %{WORD:key}=%{INT:value:int}",
                "expressions": {"message": "%{PAIR}"}
            }}]),
            record(&[("message", "port=8080")]),
        )
        .unwrap();
        assert_eq!(out[0].get("key"), &[Value::from("port")]);
        assert_eq!(out[0].get("value"), &[Value::Int(8080)]);
    }

    #[test]
    fn test_find_substrings_collects_every_match() {
        let (_, out) = run(
            json!([{"grok": {
                "expressions": {"message": "%{INT:num}"},
                "findSubstrings": true
            }}]),
            record(&[("message", "a 1 b 22 c 333")]),
        )
        .unwrap();
        assert_eq!(out[0].get("num"), &[Value::from("1"), Value::from("22"), Value::from("333")]);
    }

    #[test]
    fn test_extract_false_only_filters() {
        let input = record(&[("message", "42")]);
        let (ok, out) = run(
            json!([{"grok": {"expressions": {"message": "%{INT:num}"}, "extract": false}}]),
            input.clone(),
        )
        .unwrap();
        assert!(ok);
        assert_eq!(out, vec![input]);
    }

    #[test]
    fn test_num_required_matches_all() {
        let mut input = Record::new();
        input.put("message", "1");
        input.put("message", "x");
        let (ok, _) = run(
            json!([{"grok": {"expressions": {"message": "%{INT:num}"}, "numRequiredMatches": "all"}}]),
            input.clone(),
        )
        .unwrap();
        assert!(!ok);

        let (ok, out) = run(
            json!([{"grok": {"expressions": {"message": "%{INT:num}"}}}]),
            input,
        )
        .unwrap();
        assert!(ok);
        assert_eq!(out[0].get("num"), &[Value::from("1")]);
    }

    #[test]
    fn test_raw_named_groups_and_empty_strings() {
        let (_, out) = run(
            json!([{"grok": {"expressions": {"message": "(?P<a>x*)-(?P<b>y)"}}}]),
            record(&[("message", "-y")]),
        )
        .unwrap();
        assert!(!out[0].contains_key("a"));
        assert_eq!(out[0].get("b"), &[Value::from("y")]);

        let (_, out) = run(
            json!([{"grok": {"expressions": {"message": "(?P<a>x*)-(?P<b>y)"}, "addEmptyStrings": true}}]),
            record(&[("message", "-y")]),
        )
        .unwrap();
        assert_eq!(out[0].get("a"), &[Value::from("")]);
    }

    #[test]
    fn test_dictionary_files() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("extra"), "# comment\nGREETING (?:hello|hi)\n").unwrap();
        let (ok, out) = run(
            json!([{"grok": {
                "dictionaryFiles": [dir.path().to_string_lossy()],
                "expressions": {"message": "%{GREETING:greeting} %{WORD:name}"}
            }}]),
            record(&[("message", "hi bob")]),
        )
        .unwrap();
        assert!(ok);
        assert_eq!(out[0].get("greeting"), &[Value::from("hi")]);
    }

    #[test]
    fn test_expand_regex_names_groups_after_fields() {
        let dictionary = BUILTIN.clone();
        let expanded = expand_regex("findReplace", "%{WORD:word}-%{INT}", &dictionary).unwrap();
        let re = Regex::new(&expanded).unwrap();
        let caps = re.captures("abc-42").unwrap();
        assert_eq!(&caps["word"], "abc");
        assert!(expand_regex("split", "%{WORD:not.valid}", &dictionary).is_err());
    }

    #[test]
    fn test_unknown_pattern_is_compile_error() {
        let err = compile_error(json!([{"grok": {"expressions": {"message": "%{NOPE:x}"}}}]));
        assert!(err.to_string().starts_with("Unknown grok pattern: NOPE"));
    }

    #[test]
    fn test_recursive_pattern_is_compile_error() {
        let err = compile_error(json!([{"grok": {
            "dictionaryString": "LOOP %{LOOP}",
            "expressions": {"message": "%{LOOP}"}
        }}]));
        assert!(err.to_string().contains("too deep"));
    }
}
