//! Readers: turn an attachment body into one or more records.
//!
//! The body is the first `_attachment_body` value. Bytes are decoded with,
//! in order of preference, the `charset` option, the record's
//! `_attachment_charset`, or the encoding `chardet` detects. Emitted records
//! carry every non-attachment field of the input.

use encoding_rs::{Encoding, UTF_8};
use regex::Regex;

use super::charset_option;
use crate::command::{Command, Downstream};
use crate::compiler::Compiler;
use crate::config::ConfigNode;
use crate::error::{CompileError, CompileResult, RuntimeError, RuntimeResult};
use crate::metrics::CommandMeter;
use crate::record::{fields, Record, Value};
use crate::registry::{BuildScope, CommandBuilder};

// =============================================================================
// Body decoding
// =============================================================================

/// Guess the encoding of raw bytes, falling back to UTF-8.
pub fn detect_encoding(bytes: &[u8]) -> &'static Encoding {
    let (charset, confidence, _language) = chardet::detect(bytes);
    let label = chardet::charset2encoding(&charset);
    tracing::trace!(charset = %charset, confidence, "detected attachment charset");
    Encoding::for_label(label.as_bytes()).unwrap_or(UTF_8)
}

/// Decode the attachment body of `record`, or `None` if it has none.
fn read_body(record: &Record, configured: Option<&'static Encoding>) -> Option<String> {
    let body = record.first_value(fields::ATTACHMENT_BODY)?;
    let bytes = match body {
        Value::Bytes(bytes) => bytes,
        other => return Some(other.to_text()),
    };

    let encoding = configured
        .or_else(|| {
            record
                .first_value(fields::ATTACHMENT_CHARSET)
                .and_then(|c| Encoding::for_label(c.to_text().trim().as_bytes()))
        })
        .unwrap_or_else(|| detect_encoding(bytes));
    let (text, _, _) = encoding.decode(bytes);
    Some(text.into_owned())
}

/// Copy of `record` without attachment fields.
fn without_attachments(record: &Record) -> Record {
    let mut out = Record::new();
    for (name, values) in record.iter().filter(|(name, _)| !fields::is_attachment(name)) {
        out.put_all(name, values.iter().cloned());
    }
    out
}

fn missing_body(command: &str) -> RuntimeResult<bool> {
    tracing::debug!(command, "record has no attachment body");
    Ok(false)
}

/// Forward one record per produced message; stops at the first rejection.
fn emit_messages<I>(base: &Record, messages: I, child: &mut dyn Downstream) -> RuntimeResult<bool>
where
    I: IntoIterator<Item = String>,
{
    for message in messages {
        let mut out = base.copy();
        out.put(fields::MESSAGE, message);
        if !child.forward(out)? {
            return Ok(false);
        }
    }
    Ok(true)
}

/// Lines of `text` after `ignoreFirstLine`, empty-line and comment filtering.
fn filtered_lines<'a>(text: &'a str, ignore_first_line: bool, comment_prefix: &'a str) -> impl Iterator<Item = &'a str> {
    text.lines()
        .skip(usize::from(ignore_first_line))
        .filter(move |line| !line.is_empty())
        .filter(move |line| comment_prefix.is_empty() || !line.starts_with(comment_prefix))
}

// =============================================================================
// readClob
// =============================================================================

/// The whole body becomes `message`.
pub struct ReadClob {
    charset: Option<&'static Encoding>,
    meter: CommandMeter,
}

impl Command for ReadClob {
    fn name(&self) -> &str {
        "readClob"
    }

    fn process(&mut self, record: Record, child: &mut dyn Downstream) -> RuntimeResult<bool> {
        self.meter.mark_record();
        let Some(text) = read_body(&record, self.charset) else {
            return missing_body(self.name());
        };
        emit_messages(&without_attachments(&record), [text], child)
    }
}

pub struct ReadClobBuilder;

impl CommandBuilder for ReadClobBuilder {
    fn names(&self) -> &'static [&'static str] {
        &["readClob"]
    }

    fn build(&self, config: &ConfigNode, scope: &BuildScope, compiler: &mut Compiler) -> CompileResult<Box<dyn Command>> {
        config.validate_keys(&["charset"])?;
        Ok(Box::new(ReadClob {
            charset: charset_option(config, "readClob")?,
            meter: CommandMeter::new(compiler.context().metrics(), scope.command()),
        }))
    }
}

// =============================================================================
// readLine
// =============================================================================

/// One record per line.
pub struct ReadLine {
    charset: Option<&'static Encoding>,
    ignore_first_line: bool,
    comment_prefix: String,
    meter: CommandMeter,
}

impl Command for ReadLine {
    fn name(&self) -> &str {
        "readLine"
    }

    fn process(&mut self, record: Record, child: &mut dyn Downstream) -> RuntimeResult<bool> {
        self.meter.mark_record();
        let Some(text) = read_body(&record, self.charset) else {
            return missing_body(self.name());
        };
        let lines = filtered_lines(&text, self.ignore_first_line, &self.comment_prefix).map(str::to_string);
        emit_messages(&without_attachments(&record), lines, child)
    }
}

pub struct ReadLineBuilder;

impl CommandBuilder for ReadLineBuilder {
    fn names(&self) -> &'static [&'static str] {
        &["readLine"]
    }

    fn build(&self, config: &ConfigNode, scope: &BuildScope, compiler: &mut Compiler) -> CompileResult<Box<dyn Command>> {
        config.validate_keys(&["charset", "ignoreFirstLine", "commentPrefix"])?;
        Ok(Box::new(ReadLine {
            charset: charset_option(config, "readLine")?,
            ignore_first_line: config.get_bool_or("ignoreFirstLine", false)?,
            comment_prefix: config.get_string_or("commentPrefix", "")?,
            meter: CommandMeter::new(compiler.context().metrics(), scope.command()),
        }))
    }
}

// =============================================================================
// readMultiLine
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Join {
    /// A matching line continues the previous record.
    Previous,
    /// A matching line is continued by the next one.
    Next,
}

/// Groups continuation lines (stack traces and the like) into one message.
pub struct ReadMultiLine {
    regex: Regex,
    negate: bool,
    what: Join,
    charset: Option<&'static Encoding>,
    meter: CommandMeter,
}

impl ReadMultiLine {
    fn group(&self, text: &str) -> Vec<String> {
        let mut messages = Vec::new();
        let mut buffer: Option<String> = None;

        for line in text.lines() {
            let is_match = self.regex.is_match(line) != self.negate;
            match self.what {
                Join::Previous => {
                    if is_match {
                        match buffer.as_mut() {
                            Some(b) => {
                                b.push('\n');
                                b.push_str(line);
                            }
                            None => buffer = Some(line.to_string()),
                        }
                    } else {
                        if let Some(done) = buffer.take() {
                            messages.push(done);
                        }
                        buffer = Some(line.to_string());
                    }
                }
                Join::Next => {
                    let mut current = buffer.take().map(|b| b + "\n" + line).unwrap_or_else(|| line.to_string());
                    if is_match {
                        buffer = Some(std::mem::take(&mut current));
                    } else {
                        messages.push(current);
                    }
                }
            }
        }
        if let Some(rest) = buffer {
            messages.push(rest);
        }
        messages
    }
}

impl Command for ReadMultiLine {
    fn name(&self) -> &str {
        "readMultiLine"
    }

    fn process(&mut self, record: Record, child: &mut dyn Downstream) -> RuntimeResult<bool> {
        self.meter.mark_record();
        let Some(text) = read_body(&record, self.charset) else {
            return missing_body(self.name());
        };
        emit_messages(&without_attachments(&record), self.group(&text), child)
    }
}

pub struct ReadMultiLineBuilder;

impl CommandBuilder for ReadMultiLineBuilder {
    fn names(&self) -> &'static [&'static str] {
        &["readMultiLine"]
    }

    fn build(&self, config: &ConfigNode, scope: &BuildScope, compiler: &mut Compiler) -> CompileResult<Box<dyn Command>> {
        config.validate_keys(&["regex", "negate", "what", "charset"])?;
        let pattern = config.get_string("regex")?;
        let regex = Regex::new(&pattern)
            .map_err(|e| CompileError::invalid("readMultiLine", format!("Invalid regex {}: {}", pattern, e)))?;
        let what = match config.get_string_or("what", "previous")?.as_str() {
            "previous" => Join::Previous,
            "next" => Join::Next,
            other => {
                return Err(CompileError::invalid(
                    "readMultiLine",
                    format!("Unknown value for what: {} (expected previous or next)", other),
                ))
            }
        };
        Ok(Box::new(ReadMultiLine {
            regex,
            negate: config.get_bool_or("negate", false)?,
            what,
            charset: charset_option(config, "readMultiLine")?,
            meter: CommandMeter::new(compiler.context().metrics(), scope.command()),
        }))
    }
}

// =============================================================================
// readCSV
// =============================================================================

/// One record per CSV row; cells land in the configured column fields.
pub struct ReadCsv {
    separator: u8,
    columns: Vec<String>,
    ignore_first_line: bool,
    trim: bool,
    quote: Option<u8>,
    comment: Option<u8>,
    charset: Option<&'static Encoding>,
    meter: CommandMeter,
}

impl ReadCsv {
    fn column_name(&self, index: usize) -> String {
        match self.columns.get(index) {
            Some(name) => name.clone(),
            None => format!("column{}", index),
        }
    }

    fn rows(&self, text: &str) -> RuntimeResult<Vec<Vec<String>>> {
        let mut builder = csv::ReaderBuilder::new();
        builder
            .has_headers(self.ignore_first_line)
            .delimiter(self.separator)
            .comment(self.comment)
            .flexible(true);
        match self.quote {
            Some(q) => builder.quote(q),
            None => builder.quoting(false),
        };
        if self.trim {
            builder.trim(csv::Trim::All);
        }

        let mut reader = builder.from_reader(text.as_bytes());
        reader
            .records()
            .map(|row| {
                row.map(|r| r.iter().map(str::to_string).collect())
                    .map_err(|e| RuntimeError::new("readCSV", format!("Malformed CSV: {}", e)))
            })
            .collect()
    }
}

impl Command for ReadCsv {
    fn name(&self) -> &str {
        "readCSV"
    }

    fn process(&mut self, record: Record, child: &mut dyn Downstream) -> RuntimeResult<bool> {
        self.meter.mark_record();
        let Some(text) = read_body(&record, self.charset) else {
            return missing_body(self.name());
        };
        let base = without_attachments(&record);

        for row in self.rows(&text)? {
            let mut out = base.copy();
            for (index, cell) in row.into_iter().enumerate() {
                let name = self.column_name(index);
                if !name.is_empty() {
                    out.put(name, cell);
                }
            }
            if !child.forward(out)? {
                return Ok(false);
            }
        }
        Ok(true)
    }
}

pub struct ReadCsvBuilder;

fn single_byte(command: &str, key: &str, value: &str) -> CompileResult<u8> {
    let value = match value {
        "\\t" => "\t",
        other => other,
    };
    match value.as_bytes() {
        [b] => Ok(*b),
        _ => Err(CompileError::invalid(
            command,
            format!("{} must be a single ASCII character, got '{}'", key, value),
        )),
    }
}

impl CommandBuilder for ReadCsvBuilder {
    fn names(&self) -> &'static [&'static str] {
        &["readCSV"]
    }

    fn build(&self, config: &ConfigNode, scope: &BuildScope, compiler: &mut Compiler) -> CompileResult<Box<dyn Command>> {
        config.validate_keys(&[
            "separator",
            "columns",
            "ignoreFirstLine",
            "trim",
            "quoteChar",
            "commentPrefix",
            "charset",
        ])?;

        let quote = match config.get_string_or("quoteChar", "\"")?.as_str() {
            "" => None,
            q => Some(single_byte("readCSV", "quoteChar", q)?),
        };
        // Only recognized at the start of a row, never inside a quoted cell.
        let comment = match config.get_string_or("commentPrefix", "")?.as_str() {
            "" => None,
            c => Some(single_byte("readCSV", "commentPrefix", c)?),
        };

        Ok(Box::new(ReadCsv {
            separator: single_byte("readCSV", "separator", &config.get_string_or("separator", ",")?)?,
            columns: config.get_string_list_or("columns", &[])?,
            ignore_first_line: config.get_bool_or("ignoreFirstLine", false)?,
            trim: config.get_bool_or("trim", true)?,
            quote,
            comment,
            charset: charset_option(config, "readCSV")?,
            meter: CommandMeter::new(compiler.context().metrics(), scope.command()),
        }))
    }
}

// =============================================================================
// separateAttachments
// =============================================================================

/// One record per attachment body, with the matching mime type, charset and name.
pub struct SeparateAttachments {
    meter: CommandMeter,
}

impl Command for SeparateAttachments {
    fn name(&self) -> &str {
        "separateAttachments"
    }

    fn process(&mut self, record: Record, child: &mut dyn Downstream) -> RuntimeResult<bool> {
        self.meter.mark_record();
        let base = without_attachments(&record);

        for (index, body) in record.get(fields::ATTACHMENT_BODY).iter().enumerate() {
            let mut out = base.copy();
            out.put(fields::ATTACHMENT_BODY, body.clone());
            for name in &fields::ATTACHMENT_FIELDS[1..] {
                if let Some(value) = record.get(name).get(index) {
                    out.put(name, value.clone());
                }
            }
            if !child.forward(out)? {
                return Ok(false);
            }
        }
        Ok(true)
    }
}

pub struct SeparateAttachmentsBuilder;

impl CommandBuilder for SeparateAttachmentsBuilder {
    fn names(&self) -> &'static [&'static str] {
        &["separateAttachments"]
    }

    fn build(&self, config: &ConfigNode, scope: &BuildScope, compiler: &mut Compiler) -> CompileResult<Box<dyn Command>> {
        config.validate_keys(&[])?;
        Ok(Box::new(SeparateAttachments {
            meter: CommandMeter::new(compiler.context().metrics(), scope.command()),
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stdlib::test_support::{compile_error, run};
    use serde_json::json;

    fn attachment(body: &[u8]) -> Record {
        let mut record = Record::new();
        record.put(fields::ATTACHMENT_BODY, body.to_vec());
        record
    }

    fn messages(out: &[Record]) -> Vec<String> {
        out.iter()
            .map(|r| r.first_value(fields::MESSAGE).map(Value::to_text).unwrap_or_default())
            .collect()
    }

    #[test]
    fn test_read_clob() {
        let (ok, out) = run(json!([{"readClob": {}}]), attachment(b"foo")).unwrap();
        assert!(ok);
        let mut expected = Record::new();
        expected.put(fields::MESSAGE, "foo");
        assert_eq!(out, vec![expected]);
    }

    #[test]
    fn test_read_clob_charset_option() {
        let (_, out) = run(json!([{"readClob": {"charset": "ISO-8859-1"}}]), attachment(&[b'h', 0xE9])).unwrap();
        assert_eq!(messages(&out), vec!["hé"]);
    }

    #[test]
    fn test_read_clob_record_charset() {
        let mut input = attachment(&[b'h', 0xE9]);
        input.put(fields::ATTACHMENT_CHARSET, "windows-1252");
        let (_, out) = run(json!([{"readClob": {}}]), input).unwrap();
        assert_eq!(messages(&out), vec!["hé"]);
    }

    #[test]
    fn test_missing_body_is_rejected() {
        let (ok, out) = run(json!([{"readClob": {}}]), Record::new()).unwrap();
        assert!(!ok);
        assert!(out.is_empty());
    }

    #[test]
    fn test_read_line() {
        let mut input = attachment(b"header\n# comment\nfirst\n\nsecond\n");
        input.put("source", "file.txt");
        let (ok, out) = run(
            json!([{"readLine": {"ignoreFirstLine": true, "commentPrefix": "#"}}]),
            input,
        )
        .unwrap();
        assert!(ok);
        assert_eq!(messages(&out), vec!["first", "second"]);
        assert!(out.iter().all(|r| r.first_value("source") == Some(&Value::from("file.txt"))));
        assert!(out.iter().all(|r| !r.contains_key(fields::ATTACHMENT_BODY)));
    }

    #[test]
    fn test_read_multi_line_previous() {
        let body = b"Exception in thread main\n\tat a.b(C.java:1)\n\tat d.e(F.java:2)\nnext event\n";
        let (_, out) = run(
            json!([{"readMultiLine": {"regex": "^\\s", "what": "previous"}}]),
            attachment(body),
        )
        .unwrap();
        assert_eq!(
            messages(&out),
            vec!["Exception in thread main\n\tat a.b(C.java:1)\n\tat d.e(F.java:2)", "next event"]
        );
    }

    #[test]
    fn test_read_multi_line_next() {
        let body = b"part one \\\npart two\nsingle\n";
        let (_, out) = run(
            json!([{"readMultiLine": {"regex": "\\\\$", "what": "next"}}]),
            attachment(body),
        )
        .unwrap();
        assert_eq!(messages(&out), vec!["part one \\\npart two", "single"]);
    }

    #[test]
    fn test_read_csv() {
        let body = b"# comment\nNadja, 8 ,\"a,b\"\nBob,,\nShort\n";
        let (ok, out) = run(
            json!([{"readCSV": {"columns": ["name", "", "tags"], "commentPrefix": "#"}}]),
            attachment(body),
        )
        .unwrap();
        assert!(ok);
        assert_eq!(out.len(), 3);
        assert_eq!(out[0].get("name"), &[Value::from("Nadja")]);
        assert!(!out[0].contains_key("column1"));
        assert_eq!(out[0].get("tags"), &[Value::from("a,b")]);
        assert_eq!(out[1].get("tags"), &[Value::from("")]);
        assert!(!out[2].contains_key("tags"));
    }

    #[test]
    fn test_read_csv_quoted_cell_spanning_comment_like_line() {
        let body = b"# header comment\nNadja,\"first line\n# not a comment\"\n#x,y\nBob,2\n";
        let (ok, out) = run(
            json!([{"readCSV": {"columns": ["name", "note"], "commentPrefix": "#"}}]),
            attachment(body),
        )
        .unwrap();
        assert!(ok);
        assert_eq!(out.len(), 2);
        assert_eq!(out[0].get("note"), &[Value::from("first line\n# not a comment")]);
        assert_eq!(out[1].get("name"), &[Value::from("Bob")]);
    }

    #[test]
    fn test_read_csv_comment_prefix_must_be_single_char() {
        let err = compile_error(json!([{"readCSV": {"commentPrefix": "//"}}]));
        assert!(err.to_string().contains("commentPrefix"));
    }

    #[test]
    fn test_read_csv_defaults_and_header() {
        let body = b"a\tb\n1\t2\t3\n";
        let (_, out) = run(
            json!([{"readCSV": {"separator": "\\t", "ignoreFirstLine": true, "quoteChar": ""}}]),
            attachment(body),
        )
        .unwrap();
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].get("column0"), &[Value::from("1")]);
        assert_eq!(out[0].get("column2"), &[Value::from("3")]);
    }

    #[test]
    fn test_read_csv_bad_separator() {
        let err = compile_error(json!([{"readCSV": {"separator": ";;"}}]));
        assert!(err.to_string().contains("separator"));
    }

    #[test]
    fn test_separate_attachments() {
        let mut input = Record::new();
        for body in ["a_foo", "a_bar", "a_baz"] {
            input.put(fields::ATTACHMENT_BODY, body);
        }
        input.put(fields::ATTACHMENT_MIME_TYPE, "m_foo");
        input.put(fields::ATTACHMENT_MIME_TYPE, "m_bar");
        input.put(fields::ATTACHMENT_CHARSET, "c_foo");
        input.put(fields::ATTACHMENT_NAME, "n_foo");
        input.put("first_name", "Nadja");

        let (ok, out) = run(json!([{"separateAttachments": {}}]), input).unwrap();
        assert!(ok);
        assert_eq!(out.len(), 3);

        let expected: Vec<Record> = vec![
            vec![
                ("first_name", "Nadja"),
                (fields::ATTACHMENT_BODY, "a_foo"),
                (fields::ATTACHMENT_MIME_TYPE, "m_foo"),
                (fields::ATTACHMENT_CHARSET, "c_foo"),
                (fields::ATTACHMENT_NAME, "n_foo"),
            ],
            vec![
                ("first_name", "Nadja"),
                (fields::ATTACHMENT_BODY, "a_bar"),
                (fields::ATTACHMENT_MIME_TYPE, "m_bar"),
            ],
            vec![("first_name", "Nadja"), (fields::ATTACHMENT_BODY, "a_baz")],
        ]
        .into_iter()
        .map(|pairs| pairs.into_iter().collect())
        .collect();
        assert_eq!(out, expected);
    }

    #[test]
    fn test_detect_encoding_defaults_to_utf8_for_plain_text() {
        let encoding = detect_encoding("plain ascii text".as_bytes());
        let (text, _, _) = encoding.decode(b"plain ascii text");
        assert_eq!(text, "plain ascii text");
    }
}
