//! Entry encoders.
//!
//! Two styles share one [`EncoderConfig`]:
//!
//! - [`JsonEncoder`] writes one self-contained JSON object per line.
//! - [`ConsoleEncoder`] writes tab-separated text for humans, with the
//!   fields appended as a JSON object.
//!
//! Encoders are pure; they never see the sink threshold.

use std::fmt::Write as _;

use chrono::format::{Item, StrftimeItems};
use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::entry::{Entry, Field, FieldValue};
use crate::error::{ConstructionError, EncodingError};

/// Turns an entry and its fields into one encoded record.
pub trait Encoder: Send + Sync {
    fn encode(&self, entry: &Entry, fields: &[Field]) -> Result<Vec<u8>, EncodingError>;
}

/// Which encoder a sink uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EncoderStyle {
    Console,
    Json,
}

impl EncoderStyle {
    pub fn build(self, config: EncoderConfig) -> Box<dyn Encoder> {
        match self {
            EncoderStyle::Console => Box::new(ConsoleEncoder::new(config)),
            EncoderStyle::Json => Box::new(JsonEncoder::new(config)),
        }
    }
}

/// strftime layout that has been checked for invalid directives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimeLayout(String);

impl TimeLayout {
    pub fn parse(layout: &str) -> Result<Self, ConstructionError> {
        if layout.is_empty() || StrftimeItems::new(layout).any(|item| matches!(item, Item::Error)) {
            return Err(ConstructionError::InvalidTimeFormat(layout.to_string()));
        }
        Ok(Self(layout.to_string()))
    }

    /// Layout known to be valid at compile time.
    pub(crate) fn from_static(layout: &'static str) -> Self {
        Self(layout.to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// How timestamps are rendered. All renderings are in UTC.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TimeEncoding {
    /// Floating-point seconds since the Unix epoch (JSON number)
    EpochSeconds,
    /// Integer milliseconds since the Unix epoch (JSON number)
    EpochMillis,
    /// RFC 3339 with millisecond precision
    Rfc3339,
    /// `2006-01-02T15:04:05.000+0000` style
    Iso8601,
    Layout(TimeLayout),
}

impl TimeEncoding {
    fn render(&self, time: &DateTime<Utc>) -> Result<Value, EncodingError> {
        Ok(match self {
            TimeEncoding::EpochSeconds => {
                let secs = time.timestamp() as f64 + f64::from(time.timestamp_subsec_nanos()) / 1e9;
                serde_json::Number::from_f64(secs)
                    .map(Value::Number)
                    .unwrap_or(Value::Null)
            }
            TimeEncoding::EpochMillis => Value::from(time.timestamp_millis()),
            TimeEncoding::Rfc3339 => Value::String(time.to_rfc3339_opts(SecondsFormat::Millis, true)),
            TimeEncoding::Iso8601 => format_layout(time, "%Y-%m-%dT%H:%M:%S%.3f%z")?,
            TimeEncoding::Layout(layout) => format_layout(time, layout.as_str())?,
        })
    }
}

fn format_layout(time: &DateTime<Utc>, layout: &str) -> Result<Value, EncodingError> {
    let mut out = String::new();
    write!(out, "{}", time.format(layout))
        .map_err(|_| EncodingError::Malformed(format!("bad time layout {:?}", layout)))?;
    Ok(Value::String(out))
}

/// How levels are rendered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LevelEncoding {
    Lowercase,
    Capital,
    CapitalColor,
}

/// Key names and renderers shared by both encoder styles.
///
/// An empty key drops that element from the output.
#[derive(Debug, Clone)]
pub struct EncoderConfig {
    pub time_key: String,
    pub level_key: String,
    pub name_key: String,
    pub caller_key: String,
    pub message_key: String,
    pub stacktrace_key: String,
    pub time: TimeEncoding,
    pub level: LevelEncoding,
    pub console_separator: String,
    pub line_ending: String,
}

impl EncoderConfig {
    /// Machine-oriented defaults: `ts`, `level`, `msg`, epoch seconds.
    pub fn production() -> Self {
        Self {
            time_key: "ts".into(),
            level_key: "level".into(),
            name_key: "logger".into(),
            caller_key: "caller".into(),
            message_key: "msg".into(),
            stacktrace_key: "stacktrace".into(),
            time: TimeEncoding::EpochSeconds,
            level: LevelEncoding::Lowercase,
            console_separator: "\t".into(),
            line_ending: "\n".into(),
        }
    }

    /// Human-oriented defaults: single-letter keys, ISO-8601 time, capital levels.
    pub fn development() -> Self {
        Self {
            time_key: "T".into(),
            level_key: "L".into(),
            name_key: "N".into(),
            caller_key: "C".into(),
            message_key: "M".into(),
            stacktrace_key: "S".into(),
            time: TimeEncoding::Iso8601,
            level: LevelEncoding::Capital,
            console_separator: "\t".into(),
            line_ending: "\n".into(),
        }
    }

    pub fn with_time(mut self, time: TimeEncoding) -> Self {
        self.time = time;
        self
    }

    pub fn with_level(mut self, level: LevelEncoding) -> Self {
        self.level = level;
        self
    }

    fn level_str(&self, entry: &Entry) -> String {
        match self.level {
            LevelEncoding::Lowercase => entry.level.as_str().to_string(),
            LevelEncoding::Capital => entry.level.capital().to_string(),
            LevelEncoding::CapitalColor => entry.level.capital_color(),
        }
    }
}

impl Default for EncoderConfig {
    fn default() -> Self {
        Self::production()
    }
}

fn field_value(field: &Field) -> Result<Value, EncodingError> {
    match &field.value {
        FieldValue::Invalid(reason) => Err(EncodingError::Field {
            key: field.key.clone(),
            reason: reason.clone(),
        }),
        other => other.to_json().ok_or_else(|| EncodingError::Field {
            key: field.key.clone(),
            reason: "no JSON rendering".into(),
        }),
    }
}

/// Appends `"key":value` pairs to a JSON object under construction,
/// keeping insertion order.
struct ObjectWriter {
    buf: Vec<u8>,
    first: bool,
}

impl ObjectWriter {
    fn new() -> Self {
        Self {
            buf: vec![b'{'],
            first: true,
        }
    }

    fn pair(&mut self, key: &str, value: &Value) -> Result<(), EncodingError> {
        if !self.first {
            self.buf.push(b',');
        }
        self.first = false;
        serde_json::to_writer(&mut self.buf, key)
            .map_err(|e| EncodingError::Malformed(e.to_string()))?;
        self.buf.push(b':');
        serde_json::to_writer(&mut self.buf, value)
            .map_err(|e| EncodingError::Malformed(e.to_string()))
    }

    fn pair_if(&mut self, key: &str, value: impl FnOnce() -> Value) -> Result<(), EncodingError> {
        if key.is_empty() {
            return Ok(());
        }
        self.pair(key, &value())
    }

    fn finish(mut self) -> Vec<u8> {
        self.buf.push(b'}');
        self.buf
    }
}

fn fields_object(fields: &[Field]) -> Result<Vec<u8>, EncodingError> {
    let mut obj = ObjectWriter::new();
    for field in fields {
        obj.pair(&field.key, &field_value(field)?)?;
    }
    Ok(obj.finish())
}

/// Structured encoder: one JSON object per line.
///
/// Key order is level, time, logger name, caller, message, fields in
/// insertion order, stacktrace.
#[derive(Debug, Clone, Default)]
pub struct JsonEncoder {
    config: EncoderConfig,
}

impl JsonEncoder {
    pub fn new(config: EncoderConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &EncoderConfig {
        &self.config
    }
}

impl Encoder for JsonEncoder {
    fn encode(&self, entry: &Entry, fields: &[Field]) -> Result<Vec<u8>, EncodingError> {
        let cfg = &self.config;
        let mut obj = ObjectWriter::new();

        obj.pair_if(&cfg.level_key, || Value::String(cfg.level_str(entry)))?;
        if !cfg.time_key.is_empty() {
            obj.pair(&cfg.time_key, &cfg.time.render(&entry.time)?)?;
        }
        if let Some(name) = &entry.logger_name {
            obj.pair_if(&cfg.name_key, || Value::String(name.clone()))?;
        }
        if let Some(caller) = &entry.caller {
            obj.pair_if(&cfg.caller_key, || Value::String(caller.trimmed()))?;
        }
        obj.pair_if(&cfg.message_key, || Value::String(entry.message.clone()))?;
        for field in fields {
            obj.pair(&field.key, &field_value(field)?)?;
        }
        if let Some(stack) = &entry.stacktrace {
            obj.pair_if(&cfg.stacktrace_key, || Value::String(stack.clone()))?;
        }

        let mut line = obj.finish();
        line.extend_from_slice(cfg.line_ending.as_bytes());
        Ok(line)
    }
}

/// Human-readable encoder.
///
/// `time<TAB>LEVEL<TAB>name<TAB>caller<TAB>message<TAB>{fields}`, with the
/// stacktrace on the following line.
#[derive(Debug, Clone)]
pub struct ConsoleEncoder {
    config: EncoderConfig,
}

impl ConsoleEncoder {
    pub fn new(config: EncoderConfig) -> Self {
        Self { config }
    }
}

impl Default for ConsoleEncoder {
    fn default() -> Self {
        Self::new(EncoderConfig::development())
    }
}

impl Encoder for ConsoleEncoder {
    fn encode(&self, entry: &Entry, fields: &[Field]) -> Result<Vec<u8>, EncodingError> {
        let cfg = &self.config;
        let mut parts: Vec<String> = Vec::with_capacity(6);

        if !cfg.time_key.is_empty() {
            match cfg.time.render(&entry.time)? {
                Value::String(s) => parts.push(s),
                other => parts.push(other.to_string()),
            }
        }
        if !cfg.level_key.is_empty() {
            parts.push(cfg.level_str(entry));
        }
        if let Some(name) = entry.logger_name.as_ref().filter(|_| !cfg.name_key.is_empty()) {
            parts.push(name.clone());
        }
        if let Some(caller) = entry.caller.as_ref().filter(|_| !cfg.caller_key.is_empty()) {
            parts.push(caller.trimmed());
        }
        if !cfg.message_key.is_empty() {
            parts.push(entry.message.clone());
        }

        let mut line = parts.join(&cfg.console_separator).into_bytes();
        if !fields.is_empty() {
            line.extend_from_slice(cfg.console_separator.as_bytes());
            line.extend_from_slice(&fields_object(fields)?);
        }
        if let Some(stack) = entry.stacktrace.as_ref().filter(|_| !cfg.stacktrace_key.is_empty()) {
            line.push(b'\n');
            line.extend_from_slice(stack.as_bytes());
        }
        line.extend_from_slice(cfg.line_ending.as_bytes());
        Ok(line)
    }
}
