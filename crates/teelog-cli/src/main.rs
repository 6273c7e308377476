//! Teelog CLI
//!
//! Thin wrapper around teelog-core for command-line usage.
//!
//! ## Usage
//!
//! ```bash
//! # Log one entry to the console and a rotating file
//! teelog --file ./logs/app.log emit "service started" -f version=0.1.0
//!
//! # Log each stdin line, keeping at most 5 compressed backups of 1 MiB
//! tail -f build.out | teelog --file ./logs/build.log --max-size 1048576 \
//!     --max-backups 5 --compress pipe --severity info
//!
//! # Force a rollover
//! teelog --file ./logs/app.log rotate
//!
//! # Show the effective options as JSON
//! teelog --config teelog.json --level warn config
//! ```

use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use clap::{Args, Parser, Subcommand};
use serde_json::Value;
use teelog_core::{
    Field, ForwardContext, ForwardError, Level, LogForwarder, Logger, LoggerBuilder,
    LoggerConfig, RotatingFile,
};
use tokio::io::AsyncBufReadExt;

/// Teelog - structured logging to console, rotating files and hooks
#[derive(Parser)]
#[command(name = "teelog")]
#[command(version = "0.1.0")]
#[command(about = "Teelog - structured logging to console, rotating files and hooks")]
struct Cli {
    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(flatten)]
    options: LogOptions,

    #[command(subcommand)]
    command: Commands,
}

/// Logger options. Flags override values read from `--config`.
#[derive(Args, Debug, Default)]
struct LogOptions {
    /// JSON options file
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Minimum level written by every sink
    #[arg(long, global = true)]
    level: Option<String>,

    /// strftime layout for timestamps
    #[arg(long, global = true)]
    time_format: Option<String>,

    /// Write the file in console layout instead of JSON
    #[arg(long, global = true)]
    pretty: bool,

    /// Annotate entries with file:line
    #[arg(long, global = true)]
    caller: bool,

    /// Disable ANSI colors on the console
    #[arg(long, global = true)]
    no_color: bool,

    /// Log file path
    #[arg(long, global = true)]
    file: Option<PathBuf>,

    /// Rotate the log file once at startup
    #[arg(long, global = true)]
    rotate_at_startup: bool,

    /// Rotate before the file exceeds this many bytes
    #[arg(long, global = true, allow_negative_numbers = true)]
    max_size: Option<i64>,

    /// Keep at most this many backups
    #[arg(long, global = true, allow_negative_numbers = true)]
    max_backups: Option<i64>,

    /// Remove backups older than this many days
    #[arg(long, global = true, allow_negative_numbers = true)]
    max_age: Option<i64>,

    /// Report backup times in local time
    #[arg(long, global = true)]
    local_time: bool,

    /// zstd-compress backups
    #[arg(long, global = true)]
    compress: bool,

    /// Forward canonical lines to stderr through the hook sink
    #[arg(long, global = true)]
    forward_stderr: bool,

    /// Minimum level forwarded by the hook
    #[arg(long, global = true)]
    hook_level: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// Log a single entry
    Emit {
        /// Entry message
        message: String,

        /// Entry level
        #[arg(short, long, default_value = "info")]
        severity: String,

        /// Structured field as key=value (JSON values are kept typed)
        #[arg(short = 'f', long = "field")]
        fields: Vec<String>,

        /// Logger name
        #[arg(short, long)]
        name: Option<String>,
    },

    /// Log each line read from stdin
    Pipe {
        /// Entry level for every line
        #[arg(short, long, default_value = "info")]
        severity: String,

        /// Logger name
        #[arg(short, long)]
        name: Option<String>,
    },

    /// Force a rollover of the log file
    Rotate,

    /// Print the effective options as JSON
    Config,
}

/// Hook transport that writes canonical lines to stderr.
struct StderrForwarder;

impl LogForwarder for StderrForwarder {
    fn send_log(
        &self,
        ctx: &ForwardContext,
        _time: DateTime<Utc>,
        level: &str,
        line: &[u8],
    ) -> Result<(), ForwardError> {
        let mut err = std::io::stderr().lock();
        write!(err, "[{} {}] ", ctx.hook, level)
            .and_then(|_| err.write_all(line))
            .map_err(|e| ForwardError::Transport(e.to_string()))
    }

    fn flush(&self) -> Result<(), ForwardError> {
        std::io::stderr()
            .flush()
            .map_err(|e| ForwardError::Transport(e.to_string()))
    }
}

fn setup_logging(verbosity: u8) {
    let filter = match verbosity {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };

    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(filter)),
        )
        .init();
}

/// Merge the options file with command-line flags.
fn load_config(opts: &LogOptions) -> Result<LoggerConfig> {
    let mut config = match &opts.config {
        Some(path) => {
            let text = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read config {}", path.display()))?;
            LoggerConfig::from_json(&text)
                .with_context(|| format!("Invalid config {}", path.display()))?
        }
        None => LoggerConfig::default(),
    };

    if let Some(level) = &opts.level {
        config.level = Some(level.clone());
    }
    if let Some(layout) = &opts.time_format {
        config.time_format = Some(layout.clone());
    }
    if let Some(file) = &opts.file {
        config.file = Some(file.clone());
    }
    if let Some(bytes) = opts.max_size {
        config.max_size = Some(bytes);
    }
    if let Some(count) = opts.max_backups {
        config.max_backups = Some(count);
    }
    if let Some(days) = opts.max_age {
        config.max_age = Some(days);
    }
    for (flag, slot) in [
        (opts.pretty, &mut config.pretty),
        (opts.caller, &mut config.caller),
        (opts.rotate_at_startup, &mut config.rotate_at_startup),
        (opts.local_time, &mut config.local_time),
        (opts.compress, &mut config.compress),
    ] {
        if flag {
            *slot = Some(true);
        }
    }
    if opts.no_color {
        config.color = Some(false);
    }
    if opts.forward_stderr || opts.hook_level.is_some() {
        let mut hook = config.hook.take().unwrap_or_default();
        if let Some(level) = &opts.hook_level {
            hook.level = Some(level.clone());
        }
        config.hook = Some(hook);
    }

    Ok(config)
}

fn build_logger(config: LoggerConfig) -> Result<Logger> {
    let mut builder = LoggerBuilder::from_config(config);
    if builder.config().hook.is_some() {
        builder = builder.forwarder(Arc::new(StderrForwarder));
    }
    let logger = builder.build().context("Failed to build logger")?;
    tracing::debug!(sinks = logger.sink_count(), "Logger ready");
    Ok(logger)
}

/// Parse `key=value`; the value is kept as JSON when it parses as JSON.
fn parse_field(raw: &str) -> Result<Field> {
    let (key, value) = raw
        .split_once('=')
        .with_context(|| format!("Field must be key=value, got {:?}", raw))?;
    if key.is_empty() {
        anyhow::bail!("Field key is empty in {:?}", raw);
    }
    Ok(match serde_json::from_str::<Value>(value) {
        Ok(Value::Bool(b)) => Field::bool(key, b),
        Ok(Value::Number(n)) if n.is_u64() => Field::u64(key, n.as_u64().unwrap_or_default()),
        Ok(Value::Number(n)) if n.is_i64() => Field::i64(key, n.as_i64().unwrap_or_default()),
        Ok(Value::Number(n)) => Field::f64(key, n.as_f64().unwrap_or_default()),
        Ok(Value::String(s)) => Field::str(key, s),
        Ok(json @ (Value::Array(_) | Value::Object(_))) => Field::any(key, &json),
        _ => Field::str(key, value),
    })
}

fn named(logger: Logger, name: Option<&str>) -> Logger {
    match name {
        Some(name) => logger.named(name),
        None => logger,
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    setup_logging(cli.verbose);

    let config = load_config(&cli.options)?;

    match cli.command {
        Commands::Emit {
            message,
            severity,
            fields,
            name,
        } => {
            let level: Level = severity.parse()?;
            let fields = fields
                .iter()
                .map(|raw| parse_field(raw))
                .collect::<Result<Vec<_>>>()?;
            let logger = named(build_logger(config)?, name.as_deref());
            logger.log(level, &message, &fields);
            logger.sync()?;
        }

        Commands::Pipe { severity, name } => {
            let level: Level = severity.parse()?;
            let logger = named(build_logger(config)?, name.as_deref());

            let stdin = tokio::io::stdin();
            let mut lines = tokio::io::BufReader::new(stdin).lines();
            let mut count = 0u64;
            while let Some(line) = lines.next_line().await? {
                if line.is_empty() {
                    continue;
                }
                logger.log(level, &line, &[]);
                count += 1;
            }
            logger.sync()?;
            tracing::info!(count, "Stdin drained");
        }

        Commands::Rotate => {
            let path = config
                .file
                .clone()
                .filter(|p| !p.as_os_str().is_empty())
                .context("rotate needs a log file (--file)")?;
            let mut policy = config.rotation_policy()?;
            policy.rotate_on_startup = false;

            let file = RotatingFile::open(&path, policy)
                .with_context(|| format!("Failed to open {}", path.display()))?;
            file.rotate()
                .with_context(|| format!("Failed to rotate {}", path.display()))?;

            let backups = file.backups()?;
            println!("Rotated {}", path.display());
            println!("Backups: {}", backups.len());
            for backup in backups {
                println!(
                    "  {}  {}",
                    backup.path.display(),
                    backup.modified.format("%Y-%m-%d %H:%M:%S %:z")
                );
            }
        }

        Commands::Config => {
            // Surface construction errors without touching the filesystem
            LoggerBuilder::from_config(config.clone())
                .forwarder(Arc::new(StderrForwarder))
                .file("")
                .build()?;
            println!("{}", serde_json::to_string_pretty(&config)?);
        }
    }

    Ok(())
}
