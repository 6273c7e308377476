//! Internal diagnostic channel for per-entry failures.
//!
//! Log calls never return sink errors. Whatever the dispatcher collected
//! ends up here: counted, remembered, and passed to a handler.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;

use crate::error::SinkError;
use crate::tee::DispatchReport;

/// Callback invoked with the first error of each failed dispatch and with
/// every failed flush.
pub type ErrorHandler = Arc<dyn Fn(&SinkError) + Send + Sync>;

/// Point-in-time copy of the counters.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ErrorStats {
    /// Entries for which at least one sink failed
    pub failed_entries: u64,
    /// Individual sink failures
    pub sink_failures: u64,
    /// Flushes that returned an error
    pub sync_failures: u64,
    pub last_error: Option<String>,
}

/// Collects dispatch and flush failures.
pub struct ErrorReporter {
    handler: ErrorHandler,
    failed_entries: AtomicU64,
    sink_failures: AtomicU64,
    sync_failures: AtomicU64,
    last_error: Mutex<Option<String>>,
}

impl ErrorReporter {
    /// Report failures as one line each on stderr.
    pub fn stderr() -> Self {
        Self::with_handler(Arc::new(|err: &SinkError| {
            eprintln!("teelog: sink failed: {}", err);
        }))
    }

    pub fn with_handler(handler: ErrorHandler) -> Self {
        Self {
            handler,
            failed_entries: AtomicU64::new(0),
            sink_failures: AtomicU64::new(0),
            sync_failures: AtomicU64::new(0),
            last_error: Mutex::new(None),
        }
    }

    pub fn record(&self, report: DispatchReport) {
        if report.failed == 0 {
            return;
        }
        self.failed_entries.fetch_add(1, Ordering::Relaxed);
        self.sink_failures
            .fetch_add(report.failed as u64, Ordering::Relaxed);
        if let Some(err) = report.first_error {
            self.handle(&err);
        }
    }

    /// Record a failed flush of the sinks.
    pub fn record_sync_failure(&self, err: &SinkError) {
        self.sync_failures.fetch_add(1, Ordering::Relaxed);
        self.handle(err);
    }

    fn handle(&self, err: &SinkError) {
        *self.last_error.lock() = Some(err.to_string());
        (self.handler)(err);
    }

    pub fn stats(&self) -> ErrorStats {
        ErrorStats {
            failed_entries: self.failed_entries.load(Ordering::Relaxed),
            sink_failures: self.sink_failures.load(Ordering::Relaxed),
            sync_failures: self.sync_failures.load(Ordering::Relaxed),
            last_error: self.last_error.lock().clone(),
        }
    }
}

impl Default for ErrorReporter {
    fn default() -> Self {
        Self::stderr()
    }
}
