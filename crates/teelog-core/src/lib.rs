//! Teelog Core Library
//!
//! Structured logging that fans each entry out to several destinations.
//!
//! ## Overview
//!
//! A [`Logger`] owns a [`Tee`] of sinks. Every sink pairs an encoder with a
//! destination and has its own level threshold:
//!
//! - **Console**: human-readable, optionally colored, on stdout
//! - **File**: JSON lines (or console layout when `pretty`) in a size-rotated
//!   file with count/age retention and optional zstd compression
//! - **Hook**: a canonical JSON line handed to an external forwarder
//!
//! An entry is encoded only for the sinks whose threshold admits it, and a
//! failing sink never prevents delivery to the others.
//!
//! ## Quick Start
//!
//! ```ignore
//! use teelog_core::{Field, Logger};
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let logger = Logger::builder()
//!         .level("info")
//!         .file("./logs/app.log")
//!         .max_size(10 * 1024 * 1024)
//!         .max_backups(5)
//!         .compress(true)
//!         .build()?;
//!
//!     logger.info("started", &[Field::str("version", "0.1.0")]);
//!     logger.named("sync").warn("peer slow", &[Field::u64("rtt_ms", 840)]);
//!
//!     logger.sync()?;
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod diagnostics;
pub mod encoder;
pub mod entry;
pub mod error;
pub mod hook;
pub mod layer;
pub mod level;
pub mod logger;
pub mod rotate;
pub mod sink;
pub mod tee;
pub mod writer;

// Re-exports
pub use config::{HookConfig, LoggerBuilder, LoggerConfig};
pub use diagnostics::{ErrorHandler, ErrorReporter, ErrorStats};
pub use encoder::{
    ConsoleEncoder, Encoder, EncoderConfig, EncoderStyle, JsonEncoder, LevelEncoding,
    TimeEncoding, TimeLayout,
};
pub use entry::{Caller, Entry, Field, FieldValue};
pub use error::{
    BuildResult, ConstructionError, EncodingError, ForwardError, SinkError, SinkResult,
};
pub use hook::{ForwardContext, HookSink, LogForwarder, QueuedForwarder};
pub use layer::TeeLayer;
pub use level::Level;
pub use logger::Logger;
pub use rotate::{Backup, RotatingFile, RotationPolicy};
pub use sink::{IoSink, Sink};
pub use tee::{DispatchReport, Tee};
pub use writer::{ConsoleWriter, LockedWriter, LogWriter, MemoryWriter};
