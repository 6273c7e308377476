//! Destination writers.
//!
//! A [`LogWriter`] receives whole encoded records and must write each one
//! atomically with respect to other threads. Every implementation here
//! serializes writes behind its own mutex.

use std::io::{self, Write};
use std::sync::Arc;

use parking_lot::Mutex;

/// Thread-safe sink for encoded records.
pub trait LogWriter: Send + Sync {
    /// Write one complete record.
    fn write_record(&self, record: &[u8]) -> io::Result<()>;

    /// Flush buffered data to the underlying device.
    fn sync(&self) -> io::Result<()>;
}

impl<T: LogWriter + ?Sized> LogWriter for Arc<T> {
    fn write_record(&self, record: &[u8]) -> io::Result<()> {
        (**self).write_record(record)
    }

    fn sync(&self) -> io::Result<()> {
        (**self).sync()
    }
}

/// Writes records to stdout, flushing after each record.
pub struct ConsoleWriter {
    lock: Mutex<()>,
}

impl ConsoleWriter {
    pub fn stdout() -> Self {
        Self {
            lock: Mutex::new(()),
        }
    }
}

impl LogWriter for ConsoleWriter {
    fn write_record(&self, record: &[u8]) -> io::Result<()> {
        let _guard = self.lock.lock();
        let mut out = io::stdout().lock();
        out.write_all(record)?;
        out.flush()
    }

    fn sync(&self) -> io::Result<()> {
        io::stdout().flush()
    }
}

/// Adapts any `io::Write` into a [`LogWriter`] by wrapping it in a mutex.
pub struct LockedWriter<W: Write + Send> {
    inner: Mutex<W>,
}

impl<W: Write + Send> LockedWriter<W> {
    pub fn new(inner: W) -> Self {
        Self {
            inner: Mutex::new(inner),
        }
    }

    /// Run `f` with exclusive access to the wrapped writer.
    pub fn with_inner<R>(&self, f: impl FnOnce(&mut W) -> R) -> R {
        f(&mut self.inner.lock())
    }
}

impl<W: Write + Send> LogWriter for LockedWriter<W> {
    fn write_record(&self, record: &[u8]) -> io::Result<()> {
        self.inner.lock().write_all(record)
    }

    fn sync(&self) -> io::Result<()> {
        self.inner.lock().flush()
    }
}

/// In-memory writer, handy for capturing output.
pub type MemoryWriter = LockedWriter<Vec<u8>>;

impl MemoryWriter {
    pub fn memory() -> Self {
        Self::new(Vec::new())
    }

    pub fn contents(&self) -> String {
        self.with_inner(|buf| String::from_utf8_lossy(buf).into_owned())
    }
}
