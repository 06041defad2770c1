//! `convertTimestamp`: reformat timestamps between formats and timezones.
//!
//! Timezones are IANA names (`America/Los_Angeles`, daylight saving aware)
//! or fixed offsets (`+02:00`, `UTC-0530`). The unix formats read and write
//! decimal strings.

use chrono::format::{Item, StrftimeItems};
use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime, TimeZone, Utc};
use chrono_tz::Tz;

use crate::command::{Command, Downstream};
use crate::compiler::Compiler;
use crate::config::ConfigNode;
use crate::error::{CompileError, CompileResult, RuntimeResult};
use crate::metrics::CommandMeter;
use crate::record::{fields, Record, Value};
use crate::registry::{BuildScope, CommandBuilder};

const NAME: &str = "convertTimestamp";

pub const UNIX_TIME_IN_MILLIS: &str = "unixTimeInMillis";
pub const UNIX_TIME_IN_SECONDS: &str = "unixTimeInSeconds";

/// Formats tried, in order, when `inputFormats` is not configured.
pub const DEFAULT_INPUT_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.fZ",
    "%Y-%m-%dT%H:%M:%SZ",
    "%Y-%m-%dT%H:%M:%S%.f%:z",
    "%Y-%m-%dT%H:%M:%S%:z",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%d",
];

pub const DEFAULT_OUTPUT_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.3fZ";

#[derive(Debug, Clone, PartialEq, Eq)]
enum TimeFormat {
    UnixMillis,
    UnixSeconds,
    Pattern(String),
}

impl TimeFormat {
    fn parse(spec: &str) -> CompileResult<Self> {
        match spec {
            UNIX_TIME_IN_MILLIS => Ok(TimeFormat::UnixMillis),
            UNIX_TIME_IN_SECONDS => Ok(TimeFormat::UnixSeconds),
            pattern => {
                if StrftimeItems::new(pattern).any(|item| matches!(item, Item::Error)) {
                    return Err(CompileError::invalid(NAME, format!("Invalid time format: {}", pattern)));
                }
                Ok(TimeFormat::Pattern(pattern.to_string()))
            }
        }
    }
}

/// A configured input or output timezone.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Zone {
    Fixed(FixedOffset),
    Named(Tz),
}

impl Zone {
    /// IANA name first, then `UTC`/`Z`/`GMT` or a fixed offset.
    pub fn parse(spec: &str) -> Option<Self> {
        let spec = spec.trim();
        if let Some(offset) = parse_offset(spec) {
            return Some(Zone::Fixed(offset));
        }
        spec.parse::<Tz>().ok().map(Zone::Named)
    }

    /// Interpret a local wall-clock time in this zone. Ambiguous times
    /// (DST fall-back) resolve to the earlier instant.
    fn localize(&self, naive: &NaiveDateTime) -> Option<DateTime<Utc>> {
        match self {
            Zone::Fixed(offset) => offset.from_local_datetime(naive).earliest().map(|dt| dt.with_timezone(&Utc)),
            Zone::Named(tz) => tz.from_local_datetime(naive).earliest().map(|dt| dt.with_timezone(&Utc)),
        }
    }

    fn format(&self, instant: DateTime<Utc>, pattern: &str) -> String {
        match self {
            Zone::Fixed(offset) => instant.with_timezone(offset).format(pattern).to_string(),
            Zone::Named(tz) => instant.with_timezone(tz).format(pattern).to_string(),
        }
    }
}

/// Parse `UTC`, `Z`, `GMT` or a fixed offset such as `+02:00`, `-0530`, `+01`.
pub fn parse_offset(spec: &str) -> Option<FixedOffset> {
    let s = spec.trim();
    if matches!(s, "UTC" | "Z" | "GMT" | "utc") {
        return FixedOffset::east_opt(0);
    }
    let s = s.strip_prefix("UTC").or_else(|| s.strip_prefix("GMT")).unwrap_or(s);

    let (sign, digits) = match s.as_bytes().first()? {
        b'+' => (1, &s[1..]),
        b'-' => (-1, &s[1..]),
        _ => return None,
    };
    let digits: String = digits.chars().filter(|c| *c != ':').collect();
    if !digits.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }
    let (hours, minutes) = match digits.len() {
        1 | 2 => (digits.parse::<i32>().ok()?, 0),
        4 => (digits[..2].parse::<i32>().ok()?, digits[2..].parse::<i32>().ok()?),
        _ => return None,
    };
    if hours > 23 || minutes > 59 {
        return None;
    }
    FixedOffset::east_opt(sign * (hours * 3600 + minutes * 60))
}

pub struct ConvertTimestamp {
    field: String,
    input_formats: Vec<TimeFormat>,
    input_timezone: Zone,
    output_format: TimeFormat,
    output_timezone: Zone,
    meter: CommandMeter,
}

impl ConvertTimestamp {
    fn parse_value(&self, value: &Value) -> Option<DateTime<Utc>> {
        let text = value.to_text();
        let text = text.trim();
        for format in &self.input_formats {
            let parsed = match format {
                TimeFormat::UnixMillis => value.as_i64().and_then(|ms| Utc.timestamp_millis_opt(ms).single()),
                TimeFormat::UnixSeconds => value.as_i64().and_then(|s| Utc.timestamp_opt(s, 0).single()),
                TimeFormat::Pattern(pattern) => self.parse_pattern(text, pattern),
            };
            if parsed.is_some() {
                return parsed;
            }
        }
        None
    }

    fn parse_pattern(&self, text: &str, pattern: &str) -> Option<DateTime<Utc>> {
        if let Ok(dt) = DateTime::parse_from_str(text, pattern) {
            return Some(dt.with_timezone(&Utc));
        }
        let naive = NaiveDateTime::parse_from_str(text, pattern)
            .ok()
            .or_else(|| {
                NaiveDate::parse_from_str(text, pattern)
                    .ok()
                    .and_then(|d| d.and_hms_opt(0, 0, 0))
            })?;
        self.input_timezone.localize(&naive)
    }

    fn render(&self, instant: DateTime<Utc>) -> Value {
        match &self.output_format {
            TimeFormat::UnixMillis => Value::String(instant.timestamp_millis().to_string()),
            TimeFormat::UnixSeconds => Value::String(instant.timestamp().to_string()),
            TimeFormat::Pattern(pattern) => Value::String(self.output_timezone.format(instant, pattern)),
        }
    }
}

impl Command for ConvertTimestamp {
    fn name(&self) -> &str {
        NAME
    }

    fn process(&mut self, mut record: Record, child: &mut dyn Downstream) -> RuntimeResult<bool> {
        self.meter.mark_record();
        let mut converted = Vec::with_capacity(record.get(&self.field).len());
        for value in record.get(&self.field) {
            match self.parse_value(value) {
                Some(instant) => converted.push(self.render(instant)),
                None => {
                    tracing::debug!(field = %self.field, value = %value, "cannot parse timestamp");
                    return Ok(false);
                }
            }
        }
        record.set_values(&self.field, converted);
        child.forward(record)
    }
}

pub struct ConvertTimestampBuilder;

impl CommandBuilder for ConvertTimestampBuilder {
    fn names(&self) -> &'static [&'static str] {
        &[NAME]
    }

    fn build(&self, config: &ConfigNode, scope: &BuildScope, compiler: &mut Compiler) -> CompileResult<Box<dyn Command>> {
        config.validate_keys(&["field", "inputFormats", "inputTimezone", "outputFormat", "outputTimezone"])?;

        let timezone = |key: &str| -> CompileResult<Zone> {
            let spec = config.get_string_or(key, "UTC")?;
            Zone::parse(&spec).ok_or_else(|| CompileError::invalid(NAME, format!("Unknown timezone: {}", spec)))
        };

        let input_formats = config
            .get_string_list_or("inputFormats", DEFAULT_INPUT_FORMATS)?
            .iter()
            .map(|f| TimeFormat::parse(f))
            .collect::<CompileResult<Vec<_>>>()?;

        Ok(Box::new(ConvertTimestamp {
            field: config.get_string_or("field", fields::TIMESTAMP)?,
            input_formats,
            input_timezone: timezone("inputTimezone")?,
            output_format: TimeFormat::parse(&config.get_string_or("outputFormat", DEFAULT_OUTPUT_FORMAT)?)?,
            output_timezone: timezone("outputTimezone")?,
            meter: CommandMeter::new(compiler.context().metrics(), scope.command()),
        }))
    }
}
