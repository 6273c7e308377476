//! The application-facing logger.

use std::backtrace::Backtrace;
use std::fmt;
use std::sync::Arc;

use crate::config::LoggerBuilder;
use crate::diagnostics::{ErrorReporter, ErrorStats};
use crate::entry::{Caller, Entry, Field};
use crate::error::SinkError;
use crate::level::Level;
use crate::tee::Tee;

/// Per-logger annotations decided at build time.
#[derive(Debug, Clone, Default)]
pub(crate) struct LoggerSettings {
    pub caller: bool,
    pub stacktrace: Option<Level>,
}

struct Core {
    tee: Tee,
    reporter: ErrorReporter,
    settings: LoggerSettings,
}

/// Cheap-to-clone handle onto a built pipeline.
///
/// Log methods never fail from the caller's point of view; sink failures
/// go to the error reporter configured on the builder.
#[derive(Clone)]
pub struct Logger {
    core: Arc<Core>,
    name: Option<Arc<str>>,
    context: Arc<[Field]>,
}

impl Logger {
    pub fn builder() -> LoggerBuilder {
        LoggerBuilder::new()
    }

    pub(crate) fn from_parts(tee: Tee, reporter: ErrorReporter, settings: LoggerSettings) -> Self {
        Self {
            core: Arc::new(Core {
                tee,
                reporter,
                settings,
            }),
            name: None,
            context: Arc::from(Vec::new()),
        }
    }

    /// Whether any sink would record an entry at `level`. Use it to skip
    /// building expensive fields.
    pub fn check(&self, level: Level) -> bool {
        self.core.tee.check(level)
    }

    pub fn sink_count(&self) -> usize {
        self.core.tee.len()
    }

    pub(crate) fn records_caller(&self) -> bool {
        self.core.settings.caller
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    /// Child logger whose entries carry `fields` ahead of per-call fields.
    pub fn with(&self, fields: &[Field]) -> Logger {
        let mut context = self.context.to_vec();
        context.extend_from_slice(fields);
        Logger {
            core: Arc::clone(&self.core),
            name: self.name.clone(),
            context: context.into(),
        }
    }

    /// Child logger with `name` appended to this logger's name.
    pub fn named(&self, name: &str) -> Logger {
        let name: Arc<str> = match &self.name {
            Some(parent) => format!("{}.{}", parent, name).into(),
            None => name.into(),
        };
        Logger {
            core: Arc::clone(&self.core),
            name: Some(name),
            context: Arc::clone(&self.context),
        }
    }

    #[track_caller]
    pub fn log(&self, level: Level, message: &str, fields: &[Field]) {
        if !self.check(level) {
            return;
        }
        let settings = &self.core.settings;
        let mut entry = Entry::new(level, message);
        if let Some(name) = &self.name {
            entry = entry.with_name(&**name);
        }
        if settings.caller {
            entry = entry.with_caller(Caller::here());
        }
        if settings.stacktrace.is_some_and(|min| level.enabled_at(min)) {
            entry = entry.with_stacktrace(Backtrace::force_capture().to_string());
        }
        self.write_entry(&entry, fields);
    }

    /// Dispatch an already-built entry. The logger's context fields are
    /// prepended; name, caller and stacktrace are taken from `entry` as is.
    pub fn write_entry(&self, entry: &Entry, fields: &[Field]) {
        let report = if self.context.is_empty() {
            self.core.tee.offer(entry, fields)
        } else {
            let mut all = Vec::with_capacity(self.context.len() + fields.len());
            all.extend_from_slice(&self.context);
            all.extend_from_slice(fields);
            self.core.tee.offer(entry, &all)
        };
        self.core.reporter.record(report);
    }

    #[track_caller]
    pub fn debug(&self, message: &str, fields: &[Field]) {
        self.log(Level::Debug, message, fields);
    }

    #[track_caller]
    pub fn info(&self, message: &str, fields: &[Field]) {
        self.log(Level::Info, message, fields);
    }

    #[track_caller]
    pub fn warn(&self, message: &str, fields: &[Field]) {
        self.log(Level::Warn, message, fields);
    }

    #[track_caller]
    pub fn error(&self, message: &str, fields: &[Field]) {
        self.log(Level::Error, message, fields);
    }

    /// Log, then panic with `message`.
    #[track_caller]
    pub fn panic(&self, message: &str, fields: &[Field]) -> ! {
        self.log(Level::Panic, message, fields);
        let _ = self.sync();
        panic!("{}", message);
    }

    /// Log, flush every sink, then exit the process with status 1.
    #[track_caller]
    pub fn fatal(&self, message: &str, fields: &[Field]) -> ! {
        self.log(Level::Fatal, message, fields);
        let _ = self.sync();
        std::process::exit(1);
    }

    /// Flush every sink, returning the first failure. A failure is also
    /// passed to the error reporter.
    pub fn sync(&self) -> Result<(), SinkError> {
        self.core.tee.sync().map_err(|err| {
            self.core.reporter.record_sync_failure(&err);
            err
        })
    }

    pub fn error_stats(&self) -> ErrorStats {
        self.core.reporter.stats()
    }
}

impl fmt::Debug for Logger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Logger")
            .field("name", &self.name)
            .field("sinks", &self.core.tee.len())
            .field("context", &self.context.len())
            .finish()
    }
}
