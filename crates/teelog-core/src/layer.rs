//! `tracing` bridge.
//!
//! Installing a [`TeeLayer`] routes every `tracing` event through a
//! [`Logger`], so code that already uses `tracing::info!` and friends gets
//! the console, rotating file and hook sinks for free.
//!
//! ```ignore
//! use teelog_core::{layer::TeeLayer, Logger};
//! use tracing_subscriber::prelude::*;
//!
//! let logger = Logger::builder().level("info").file("./logs/app.log").build()?;
//! tracing_subscriber::registry().with(TeeLayer::new(logger)).init();
//!
//! tracing::warn!(peer = "love", "connection slow");
//! ```

use std::fmt::Write as FmtWrite;

use tracing::field::{Field as TracingField, Visit};
use tracing::{Event, Subscriber};
use tracing_subscriber::layer::Context;
use tracing_subscriber::registry::LookupSpan;
use tracing_subscriber::Layer;

use crate::entry::{Caller, Entry, Field};
use crate::level::Level;
use crate::logger::Logger;

/// A tracing Layer that offers events to a [`Logger`].
pub struct TeeLayer {
    logger: Logger,
    with_spans: bool,
}

impl TeeLayer {
    pub fn new(logger: Logger) -> Self {
        Self {
            logger,
            with_spans: true,
        }
    }

    /// Do not attach the enclosing span names as a `span` field.
    pub fn without_spans(mut self) -> Self {
        self.with_spans = false;
        self
    }

    pub fn logger(&self) -> &Logger {
        &self.logger
    }
}

/// TRACE has no counterpart and maps to Debug.
pub fn level_from_tracing(level: &tracing::Level) -> Level {
    match *level {
        tracing::Level::ERROR => Level::Error,
        tracing::Level::WARN => Level::Warn,
        tracing::Level::INFO => Level::Info,
        _ => Level::Debug,
    }
}

impl<S> Layer<S> for TeeLayer
where
    S: Subscriber + for<'a> LookupSpan<'a>,
{
    fn on_event(&self, event: &Event<'_>, ctx: Context<'_, S>) {
        let metadata = event.metadata();
        let level = level_from_tracing(metadata.level());
        if !self.logger.check(level) {
            return;
        }

        let mut visitor = FieldVisitor::default();
        event.record(&mut visitor);

        let mut entry = Entry::new(level, visitor.message.unwrap_or_default())
            .with_name(metadata.target());
        if self.logger.records_caller() {
            if let (Some(file), Some(line)) = (metadata.file(), metadata.line()) {
                entry = entry.with_caller(Caller::new(file, line));
            }
        }

        if self.with_spans {
            if let Some(scope) = ctx.event_scope(event) {
                let spans: Vec<&str> = scope.from_root().map(|span| span.name()).collect();
                if !spans.is_empty() {
                    visitor.fields.push(Field::str("span", spans.join(" > ")));
                }
            }
        }

        self.logger.write_entry(&entry, &visitor.fields);
    }
}

/// Collects event fields in the order they were recorded.
#[derive(Default)]
struct FieldVisitor {
    message: Option<String>,
    fields: Vec<Field>,
}

impl Visit for FieldVisitor {
    fn record_debug(&mut self, field: &TracingField, value: &dyn std::fmt::Debug) {
        let mut buf = String::new();
        let _ = write!(&mut buf, "{:?}", value);
        if field.name() == "message" {
            self.message = Some(buf);
        } else {
            self.fields.push(Field::str(field.name(), buf));
        }
    }

    fn record_str(&mut self, field: &TracingField, value: &str) {
        if field.name() == "message" {
            self.message = Some(value.to_string());
        } else {
            self.fields.push(Field::str(field.name(), value));
        }
    }

    fn record_i64(&mut self, field: &TracingField, value: i64) {
        self.fields.push(Field::i64(field.name(), value));
    }

    fn record_u64(&mut self, field: &TracingField, value: u64) {
        self.fields.push(Field::u64(field.name(), value));
    }

    fn record_bool(&mut self, field: &TracingField, value: bool) {
        self.fields.push(Field::bool(field.name(), value));
    }

    fn record_f64(&mut self, field: &TracingField, value: f64) {
        self.fields.push(Field::f64(field.name(), value));
    }

    fn record_error(&mut self, field: &TracingField, value: &(dyn std::error::Error + 'static)) {
        self.fields.push(Field::str(field.name(), value.to_string()));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::writer::MemoryWriter;
    use std::sync::Arc;
    use tracing_subscriber::prelude::*;

    #[test]
    fn test_layer_captures_events() {
        let out = Arc::new(MemoryWriter::memory());
        let logger = Logger::builder()
            .level("info")
            .caller(true)
            .color(false)
            .console_writer(Arc::clone(&out))
            .build()
            .unwrap();

        let subscriber = tracing_subscriber::registry().with(TeeLayer::new(logger));
        tracing::subscriber::with_default(subscriber, || {
            tracing::debug!("too quiet");
            tracing::info!("Test message");
            let span = tracing::info_span!("sync");
            let _enter = span.enter();
            tracing::warn!(count = 42, ok = false, "Warning with field");
        });

        let content = out.contents();
        let lines: Vec<_> = content.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].contains("INFO"));
        assert!(lines[0].contains("Test message"));
        assert!(lines[0].contains("layer.rs:"));
        assert!(lines[1].contains("Warning with field"));
        assert!(lines[1].contains("{\"count\":42,\"ok\":false,\"span\":\"sync\"}"));
    }

    #[test]
    fn test_level_mapping() {
        assert_eq!(level_from_tracing(&tracing::Level::TRACE), Level::Debug);
        assert_eq!(level_from_tracing(&tracing::Level::DEBUG), Level::Debug);
        assert_eq!(level_from_tracing(&tracing::Level::INFO), Level::Info);
        assert_eq!(level_from_tracing(&tracing::Level::WARN), Level::Warn);
        assert_eq!(level_from_tracing(&tracing::Level::ERROR), Level::Error);
    }
}
