//! Pipeline configuration.
//!
//! [`LoggerConfig`] is the plain, serializable options record. Every
//! [`LoggerBuilder`] method overwrites one field of it, later calls winning;
//! nothing is validated until [`LoggerBuilder::build`], which either returns
//! a complete [`Logger`] or a [`ConstructionError`].
//!
//! ```ignore
//! use teelog_core::Logger;
//!
//! let logger = Logger::builder()
//!     .level("info")
//!     .file("./logs/app.log")
//!     .max_size(10 * 1024 * 1024)
//!     .max_backups(5)
//!     .compress(true)
//!     .build()?;
//!
//! logger.info("service started", &[]);
//! ```

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::diagnostics::{ErrorHandler, ErrorReporter};
use crate::encoder::{
    ConsoleEncoder, EncoderConfig, EncoderStyle, LevelEncoding, TimeEncoding, TimeLayout,
};
use crate::error::{BuildResult, ConstructionError};
use crate::hook::{ForwardContext, HookSink, LogForwarder, QueuedForwarder};
use crate::level::Level;
use crate::logger::{Logger, LoggerSettings};
use crate::rotate::{RotatingFile, RotationPolicy};
use crate::sink::{IoSink, Sink};
use crate::tee::Tee;
use crate::writer::{ConsoleWriter, LogWriter};

/// Hook section of the options record.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct HookConfig {
    /// Minimum level forwarded; defaults to the global level
    pub level: Option<String>,
    /// Name passed to the forwarder in its context
    pub name: Option<String>,
    /// Delivery deadline per line; a queued line past it is discarded
    pub timeout_ms: Option<u64>,
    /// Forward through a bounded queue of this many lines
    pub queue: Option<usize>,
}

/// Raw options. Values are checked only when the logger is built.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LoggerConfig {
    pub level: Option<String>,
    pub time_format: Option<String>,
    pub pretty: Option<bool>,
    pub caller: Option<bool>,
    /// Capture a backtrace for entries at or above this level
    pub stacktrace: Option<String>,
    pub color: Option<bool>,
    pub file: Option<PathBuf>,
    pub rotate_at_startup: Option<bool>,
    /// Bytes
    pub max_size: Option<i64>,
    pub max_backups: Option<i64>,
    /// Days
    pub max_age: Option<i64>,
    pub local_time: Option<bool>,
    pub compress: Option<bool>,
    pub hook: Option<HookConfig>,
}

impl LoggerConfig {
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    /// File rotation rules, rejecting negative limits.
    pub fn rotation_policy(&self) -> BuildResult<RotationPolicy> {
        let mut policy = RotationPolicy::from_limits(
            self.max_size.unwrap_or(0),
            self.max_backups.unwrap_or(0),
            self.max_age.unwrap_or(0),
        )?;
        policy.compress = self.compress.unwrap_or(false);
        policy.local_time = self.local_time.unwrap_or(false);
        policy.rotate_on_startup = self.rotate_at_startup.unwrap_or(false);
        Ok(policy)
    }
}

/// Fluent builder over [`LoggerConfig`].
#[derive(Default)]
pub struct LoggerBuilder {
    config: LoggerConfig,
    console_writer: Option<Box<dyn LogWriter>>,
    forwarder: Option<Arc<dyn LogForwarder>>,
    error_handler: Option<ErrorHandler>,
}

impl LoggerBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_config(config: LoggerConfig) -> Self {
        Self {
            config,
            ..Self::default()
        }
    }

    pub fn config(&self) -> &LoggerConfig {
        &self.config
    }

    /// Global minimum level (`debug`, `info`, `warn`, `error`, `panic`, `fatal`).
    pub fn level(mut self, level: impl Into<String>) -> Self {
        self.config.level = Some(level.into());
        self
    }

    /// strftime layout used by both the console and file encoders.
    pub fn time_format(mut self, layout: impl Into<String>) -> Self {
        self.config.time_format = Some(layout.into());
        self
    }

    /// Human-readable instead of JSON lines in the file.
    pub fn pretty(mut self, on: bool) -> Self {
        self.config.pretty = Some(on);
        self
    }

    /// Annotate entries with the call site.
    pub fn caller(mut self, on: bool) -> Self {
        self.config.caller = Some(on);
        self
    }

    pub fn stacktrace(mut self, level: impl Into<String>) -> Self {
        self.config.stacktrace = Some(level.into());
        self
    }

    /// Colourize console level names (default on).
    pub fn color(mut self, on: bool) -> Self {
        self.config.color = Some(on);
        self
    }

    /// Enable the file sink. An empty path disables it.
    pub fn file(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.file = Some(path.into());
        self
    }

    pub fn rotate_at_startup(mut self, on: bool) -> Self {
        self.config.rotate_at_startup = Some(on);
        self
    }

    /// Maximum file size in bytes before rotation; 0 disables size rotation.
    pub fn max_size(mut self, bytes: i64) -> Self {
        self.config.max_size = Some(bytes);
        self
    }

    pub fn max_backups(mut self, count: i64) -> Self {
        self.config.max_backups = Some(count);
        self
    }

    /// Maximum backup age in days.
    pub fn max_age(mut self, days: i64) -> Self {
        self.config.max_age = Some(days);
        self
    }

    pub fn local_time(mut self, on: bool) -> Self {
        self.config.local_time = Some(on);
        self
    }

    pub fn compress(mut self, on: bool) -> Self {
        self.config.compress = Some(on);
        self
    }

    /// Replace stdout as the console sink's destination.
    pub fn console_writer(mut self, writer: impl LogWriter + 'static) -> Self {
        self.console_writer = Some(Box::new(writer));
        self
    }

    /// Add a hook sink forwarding through `forwarder`.
    pub fn forwarder(mut self, forwarder: Arc<dyn LogForwarder>) -> Self {
        self.forwarder = Some(forwarder);
        self
    }

    /// Request a hook sink with the given settings.
    pub fn hook(mut self, hook: HookConfig) -> Self {
        self.config.hook = Some(hook);
        self
    }

    pub fn hook_level(mut self, level: impl Into<String>) -> Self {
        self.config.hook.get_or_insert_with(HookConfig::default).level = Some(level.into());
        self
    }

    /// Where per-entry sink failures are reported (default: stderr).
    pub fn error_handler(mut self, handler: ErrorHandler) -> Self {
        self.error_handler = Some(handler);
        self
    }

    /// Validate every option, then assemble the sinks.
    ///
    /// The only I/O performed is the optional startup rotation, and it runs
    /// after all validation has passed.
    pub fn build(self) -> BuildResult<Logger> {
        let cfg = &self.config;

        let level = parse_level(cfg.level.as_deref())?.unwrap_or(Level::Debug);
        let stacktrace = parse_level(cfg.stacktrace.as_deref())?;
        let time = cfg
            .time_format
            .as_deref()
            .map(TimeLayout::parse)
            .transpose()?
            .map(TimeEncoding::Layout);

        let policy = cfg.rotation_policy()?;

        let hook = match (&cfg.hook, self.forwarder) {
            (None, None) => None,
            (_, None) => return Err(ConstructionError::MissingForwarder),
            (hook_cfg, Some(forwarder)) => {
                let hook_cfg = hook_cfg.clone().unwrap_or_default();
                let hook_level = parse_level(hook_cfg.level.as_deref())?.unwrap_or(level);
                Some((hook_cfg, hook_level, forwarder))
            }
        };

        // Validation done; assemble.
        let mut sinks: Vec<Arc<dyn Sink>> = Vec::with_capacity(3);

        let mut console_cfg = EncoderConfig::development();
        if cfg.color.unwrap_or(true) {
            console_cfg.level = LevelEncoding::CapitalColor;
        }
        if let Some(time) = &time {
            console_cfg.time = time.clone();
        }
        let console_writer = self
            .console_writer
            .unwrap_or_else(|| Box::new(ConsoleWriter::stdout()));
        sinks.push(Arc::new(IoSink::new(
            Box::new(ConsoleEncoder::new(console_cfg)),
            console_writer,
            level,
        )));

        if let Some(path) = cfg.file.as_ref().filter(|p| !p.as_os_str().is_empty()) {
            let mut file_cfg = EncoderConfig::production();
            if let Some(time) = &time {
                file_cfg.time = time.clone();
            }
            let encoder = if cfg.pretty.unwrap_or(false) {
                EncoderStyle::Console.build(file_cfg.with_level(LevelEncoding::Capital))
            } else {
                EncoderStyle::Json.build(file_cfg)
            };
            let file = RotatingFile::open(path.clone(), policy)?;
            sinks.push(Arc::new(IoSink::new(encoder, Box::new(file), level)));
        }

        if let Some((hook_cfg, hook_level, forwarder)) = hook {
            let forwarder: Arc<dyn LogForwarder> = match hook_cfg.queue {
                Some(capacity) => Arc::new(QueuedForwarder::new(forwarder, capacity)?),
                None => forwarder,
            };
            let context = ForwardContext {
                hook: hook_cfg.name.unwrap_or_else(|| ForwardContext::default().hook),
                timeout: hook_cfg.timeout_ms.map(Duration::from_millis),
            };
            sinks.push(Arc::new(HookSink::new(forwarder, hook_level).with_context(context)));
        }

        let reporter = match self.error_handler {
            Some(handler) => ErrorReporter::with_handler(handler),
            None => ErrorReporter::stderr(),
        };

        Ok(Logger::from_parts(
            Tee::new(sinks),
            reporter,
            LoggerSettings {
                caller: cfg.caller.unwrap_or(false),
                stacktrace,
            },
        ))
    }
}

fn parse_level(level: Option<&str>) -> BuildResult<Option<Level>> {
    level.map(str::parse).transpose()
}
