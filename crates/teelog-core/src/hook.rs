//! Forwarding entries to an external transport.
//!
//! A [`HookSink`] encodes every accepted entry into the canonical JSON
//! line, reads `ts`/`msg`/`level` back out of those bytes, and hands the
//! line to a [`LogForwarder`]. The forwarder receives exactly the bytes
//! the canonical encoder produced, so a change to the canonical layout is
//! reflected in what the transport sees.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{mpsc as std_mpsc, Arc};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use serde::de::{self, IgnoredAny, MapAccess, Visitor};
use serde::{Deserialize, Deserializer};
use tokio::sync::mpsc;

use crate::encoder::{Encoder, EncoderConfig, JsonEncoder, TimeEncoding, TimeLayout};
use crate::entry::{Entry, Field};
use crate::error::{EncodingError, ForwardError, SinkResult};
use crate::level::Level;
use crate::sink::Sink;

/// Timestamp layout of the canonical line, e.g. `21.01.2026 14:30:45.123456`.
pub const CANONICAL_TIME_LAYOUT: &str = "%d.%m.%Y %H:%M:%S%.6f";

const FLUSH_POLL: Duration = Duration::from_millis(1);

/// Fixed per-hook context passed along with every line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ForwardContext {
    /// Name of the hook, for transports that multiplex several
    pub hook: String,
    /// Delivery deadline for one line. [`QueuedForwarder`] drops lines that
    /// waited in its queue longer than this; transports may also apply it to
    /// their own I/O.
    pub timeout: Option<Duration>,
}

impl Default for ForwardContext {
    fn default() -> Self {
        Self {
            hook: "hook".into(),
            timeout: None,
        }
    }
}

/// External transport for canonical log lines.
pub trait LogForwarder: Send + Sync {
    /// Deliver one complete, self-contained JSON log line.
    fn send_log(
        &self,
        ctx: &ForwardContext,
        time: DateTime<Utc>,
        level: &str,
        line: &[u8],
    ) -> Result<(), ForwardError>;

    /// Block until previously accepted lines are delivered.
    fn flush(&self) -> Result<(), ForwardError> {
        Ok(())
    }
}

impl<T: LogForwarder + ?Sized> LogForwarder for Arc<T> {
    fn send_log(
        &self,
        ctx: &ForwardContext,
        time: DateTime<Utc>,
        level: &str,
        line: &[u8],
    ) -> Result<(), ForwardError> {
        (**self).send_log(ctx, time, level, line)
    }

    fn flush(&self) -> Result<(), ForwardError> {
        (**self).flush()
    }
}

/// Encoder configuration of the canonical line.
pub fn canonical_config() -> EncoderConfig {
    let layout = TimeLayout::from_static(CANONICAL_TIME_LAYOUT);
    let mut cfg = EncoderConfig::production().with_time(TimeEncoding::Layout(layout));
    cfg.caller_key = "caller".into();
    cfg.stacktrace_key = "stack".into();
    cfg
}

/// Header fields read back from a canonical line.
///
/// Only the first occurrence of each member counts. The encoder writes its
/// own `level`, `ts` and `msg` ahead of any caller field, so a field that
/// reuses one of those keys never shadows the entry's values.
#[derive(Debug)]
pub struct CanonicalHeader {
    pub ts: String,
    pub msg: String,
    pub level: String,
}

impl CanonicalHeader {
    pub fn decode(line: &[u8]) -> Result<Self, EncodingError> {
        serde_json::from_slice(line).map_err(|e| EncodingError::Malformed(e.to_string()))
    }
}

impl<'de> Deserialize<'de> for CanonicalHeader {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        deserializer.deserialize_map(HeaderVisitor)
    }
}

struct HeaderVisitor;

impl<'de> Visitor<'de> for HeaderVisitor {
    type Value = CanonicalHeader;

    fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str("a canonical log line object")
    }

    fn visit_map<A>(self, mut map: A) -> Result<Self::Value, A::Error>
    where
        A: MapAccess<'de>,
    {
        let (mut ts, mut msg, mut level) = (None, None, None);
        while let Some(key) = map.next_key::<String>()? {
            let slot = match key.as_str() {
                "ts" => &mut ts,
                "msg" => &mut msg,
                "level" => &mut level,
                _ => {
                    map.next_value::<IgnoredAny>()?;
                    continue;
                }
            };
            if slot.is_some() {
                map.next_value::<IgnoredAny>()?;
            } else {
                *slot = Some(map.next_value::<String>()?);
            }
        }
        Ok(CanonicalHeader {
            ts: ts.ok_or_else(|| de::Error::missing_field("ts"))?,
            msg: msg.ok_or_else(|| de::Error::missing_field("msg"))?,
            level: level.ok_or_else(|| de::Error::missing_field("level"))?,
        })
    }
}

/// Sink that forwards canonical lines to an external transport.
pub struct HookSink {
    forwarder: Arc<dyn LogForwarder>,
    threshold: Level,
    encoder: JsonEncoder,
    context: ForwardContext,
}

impl HookSink {
    pub fn new(forwarder: Arc<dyn LogForwarder>, threshold: Level) -> Self {
        Self {
            forwarder,
            threshold,
            encoder: JsonEncoder::new(canonical_config()),
            context: ForwardContext::default(),
        }
    }

    pub fn with_context(mut self, context: ForwardContext) -> Self {
        self.context = context;
        self
    }

    pub fn context(&self) -> &ForwardContext {
        &self.context
    }
}

impl Sink for HookSink {
    #[inline]
    fn check(&self, level: Level) -> bool {
        level.enabled_at(self.threshold)
    }

    fn write(&self, entry: &Entry, fields: &[Field]) -> SinkResult<()> {
        let line = self.encoder.encode(entry, fields)?;
        let header = CanonicalHeader::decode(&line)?;
        self.forwarder
            .send_log(&self.context, entry.time, &header.level, &line)?;
        Ok(())
    }

    fn sync(&self) -> SinkResult<()> {
        self.forwarder.flush()?;
        Ok(())
    }
}

enum Job {
    Line {
        ctx: ForwardContext,
        time: DateTime<Utc>,
        level: String,
        line: Vec<u8>,
        queued_at: Instant,
    },
    Flush(std_mpsc::Sender<()>),
}

/// Delivery counters of a [`QueuedForwarder`].
#[derive(Debug, Default)]
pub struct QueueStats {
    pub delivered: AtomicU64,
    pub failed: AtomicU64,
    /// Refused because the queue was full
    pub dropped: AtomicU64,
    /// Discarded by the worker after waiting past the context's timeout
    pub expired: AtomicU64,
}

/// Decouples log calls from a slow transport.
///
/// Lines go into a bounded queue drained by one worker thread. `send_log`
/// never blocks: when the queue is full the line is dropped and
/// [`ForwardError::Backpressure`] is returned. Transport failures inside
/// the worker are only counted, since the log call has already returned.
/// A line whose [`ForwardContext::timeout`] ran out while it was queued is
/// discarded instead of delivered late.
pub struct QueuedForwarder {
    tx: Option<mpsc::Sender<Job>>,
    worker: Option<JoinHandle<()>>,
    stats: Arc<QueueStats>,
}

impl QueuedForwarder {
    pub fn new<F>(inner: F, capacity: usize) -> std::io::Result<Self>
    where
        F: LogForwarder + 'static,
    {
        let (tx, mut rx) = mpsc::channel::<Job>(capacity.max(1));
        let stats = Arc::new(QueueStats::default());
        let worker_stats = Arc::clone(&stats);

        let worker = thread::Builder::new()
            .name("teelog-forward".into())
            .spawn(move || {
                while let Some(job) = rx.blocking_recv() {
                    match job {
                        Job::Line { ctx, queued_at, .. }
                            if ctx.timeout.is_some_and(|t| queued_at.elapsed() > t) =>
                        {
                            worker_stats.expired.fetch_add(1, Ordering::Relaxed);
                        }
                        Job::Line {
                            ctx,
                            time,
                            level,
                            line,
                            ..
                        } => match inner.send_log(&ctx, time, &level, &line) {
                            Ok(()) => {
                                worker_stats.delivered.fetch_add(1, Ordering::Relaxed);
                            }
                            Err(_) => {
                                worker_stats.failed.fetch_add(1, Ordering::Relaxed);
                            }
                        },
                        Job::Flush(done) => {
                            let _ = inner.flush();
                            let _ = done.send(());
                        }
                    }
                }
            })?;

        Ok(Self {
            tx: Some(tx),
            worker: Some(worker),
            stats,
        })
    }

    pub fn stats(&self) -> &QueueStats {
        &self.stats
    }
}

impl LogForwarder for QueuedForwarder {
    fn send_log(
        &self,
        ctx: &ForwardContext,
        time: DateTime<Utc>,
        level: &str,
        line: &[u8],
    ) -> Result<(), ForwardError> {
        let tx = self.tx.as_ref().ok_or(ForwardError::Closed)?;
        let job = Job::Line {
            ctx: ctx.clone(),
            time,
            level: level.to_string(),
            line: line.to_vec(),
            queued_at: Instant::now(),
        };
        tx.try_send(job).map_err(|e| match e {
            mpsc::error::TrySendError::Full(_) => {
                self.stats.dropped.fetch_add(1, Ordering::Relaxed);
                ForwardError::Backpressure
            }
            mpsc::error::TrySendError::Closed(_) => ForwardError::Closed,
        })
    }

    fn flush(&self) -> Result<(), ForwardError> {
        let tx = self.tx.as_ref().ok_or(ForwardError::Closed)?;
        let (done_tx, done_rx) = std_mpsc::channel();
        let mut job = Job::Flush(done_tx);
        // Polls instead of blocking_send so that flushing from inside an
        // async runtime does not panic
        loop {
            match tx.try_send(job) {
                Ok(()) => break,
                Err(mpsc::error::TrySendError::Full(back)) => {
                    job = back;
                    thread::sleep(FLUSH_POLL);
                }
                Err(mpsc::error::TrySendError::Closed(_)) => return Err(ForwardError::Closed),
            }
        }
        done_rx.recv().map_err(|_| ForwardError::Closed)
    }
}

impl Drop for QueuedForwarder {
    fn drop(&mut self) {
        // Closing the channel lets the worker drain and exit
        self.tx.take();
        if let Some(worker) = self.worker.take() {
            let _ = worker.join();
        }
    }
}
