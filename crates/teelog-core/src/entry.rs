//! Entry and field types.
//!
//! An [`Entry`] is created once per log call and borrowed by every sink;
//! nothing retains it after the dispatcher returns.

use std::fmt;
use std::panic::Location;

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;

use crate::level::Level;

/// Call-site location attached when caller annotation is enabled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Caller {
    pub file: &'static str,
    pub line: u32,
}

impl Caller {
    pub fn new(file: &'static str, line: u32) -> Self {
        Self { file, line }
    }

    /// Location of the function that called into the `#[track_caller]` chain.
    #[track_caller]
    pub fn here() -> Self {
        Location::caller().into()
    }

    /// `dir/file.rs:line`, keeping only the last directory component.
    pub fn trimmed(&self) -> String {
        let mut parts = self.file.rsplitn(3, ['/', '\\']);
        let file = parts.next().unwrap_or(self.file);
        match parts.next() {
            Some(dir) => format!("{}/{}:{}", dir, file, self.line),
            None => format!("{}:{}", file, self.line),
        }
    }
}

impl From<&'static Location<'static>> for Caller {
    fn from(loc: &'static Location<'static>) -> Self {
        Self::new(loc.file(), loc.line())
    }
}

impl fmt::Display for Caller {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.file, self.line)
    }
}

/// One log event.
#[derive(Debug, Clone)]
pub struct Entry {
    pub time: DateTime<Utc>,
    pub level: Level,
    pub message: String,
    /// Dot-joined logger name, if the logger was named
    pub logger_name: Option<String>,
    pub caller: Option<Caller>,
    pub stacktrace: Option<String>,
}

impl Entry {
    /// Create an entry stamped with the current time.
    pub fn new(level: Level, message: impl Into<String>) -> Self {
        Self {
            time: Utc::now(),
            level,
            message: message.into(),
            logger_name: None,
            caller: None,
            stacktrace: None,
        }
    }

    pub fn at(mut self, time: DateTime<Utc>) -> Self {
        self.time = time;
        self
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.logger_name = Some(name.into());
        self
    }

    pub fn with_caller(mut self, caller: Caller) -> Self {
        self.caller = Some(caller);
        self
    }

    pub fn with_stacktrace(mut self, stacktrace: impl Into<String>) -> Self {
        self.stacktrace = Some(stacktrace.into());
        self
    }
}

/// Typed field value.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    Bool(bool),
    I64(i64),
    U64(u64),
    F64(f64),
    Str(String),
    /// Nested structure
    Json(Value),
    /// Value whose serialization failed; the encoder reports it
    Invalid(String),
}

impl FieldValue {
    /// JSON rendering. Non-finite floats become strings.
    pub(crate) fn to_json(&self) -> Option<Value> {
        Some(match self {
            FieldValue::Bool(b) => Value::Bool(*b),
            FieldValue::I64(n) => Value::from(*n),
            FieldValue::U64(n) => Value::from(*n),
            FieldValue::F64(f) => match serde_json::Number::from_f64(*f) {
                Some(n) => Value::Number(n),
                None if f.is_nan() => Value::String("NaN".into()),
                None if *f > 0.0 => Value::String("+Inf".into()),
                None => Value::String("-Inf".into()),
            },
            FieldValue::Str(s) => Value::String(s.clone()),
            FieldValue::Json(v) => v.clone(),
            FieldValue::Invalid(_) => return None,
        })
    }
}

/// Key/value pair attached to an entry. Order is preserved by the encoders.
#[derive(Debug, Clone, PartialEq)]
pub struct Field {
    pub key: String,
    pub value: FieldValue,
}

impl Field {
    pub fn new(key: impl Into<String>, value: FieldValue) -> Self {
        Self {
            key: key.into(),
            value,
        }
    }

    pub fn str(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self::new(key, FieldValue::Str(value.into()))
    }

    pub fn bool(key: impl Into<String>, value: bool) -> Self {
        Self::new(key, FieldValue::Bool(value))
    }

    pub fn i64(key: impl Into<String>, value: i64) -> Self {
        Self::new(key, FieldValue::I64(value))
    }

    pub fn u64(key: impl Into<String>, value: u64) -> Self {
        Self::new(key, FieldValue::U64(value))
    }

    pub fn f64(key: impl Into<String>, value: f64) -> Self {
        Self::new(key, FieldValue::F64(value))
    }

    /// `error` field holding the error's display string.
    pub fn error(err: &dyn std::error::Error) -> Self {
        Self::str("error", err.to_string())
    }

    /// Serialize any value into a nested field.
    ///
    /// Serialization happens here; a failure is carried along and surfaces
    /// as an `EncodingError` only in sinks that actually encode the entry.
    pub fn any<T: Serialize + ?Sized>(key: impl Into<String>, value: &T) -> Self {
        let value = match serde_json::to_value(value) {
            Ok(v) => FieldValue::Json(v),
            Err(e) => FieldValue::Invalid(e.to_string()),
        };
        Self::new(key, value)
    }
}
