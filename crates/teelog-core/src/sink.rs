//! Sinks: threshold-gated consumers of entries.
//!
//! The dispatcher always calls [`Sink::check`] before [`Sink::write`], so a
//! sink only pays for encoding entries it will actually emit.

use crate::encoder::Encoder;
use crate::entry::{Entry, Field};
use crate::error::SinkResult;
use crate::level::Level;
use crate::writer::LogWriter;

/// Common capability shared by local sinks and hooks.
pub trait Sink: Send + Sync {
    /// Whether entries at `level` should be written. Must be cheap.
    fn check(&self, level: Level) -> bool;

    /// Encode and emit one entry that passed [`check`](Sink::check).
    fn write(&self, entry: &Entry, fields: &[Field]) -> SinkResult<()>;

    /// Flush anything buffered.
    fn sync(&self) -> SinkResult<()> {
        Ok(())
    }
}

/// Encoder + destination writer + minimum level.
pub struct IoSink {
    encoder: Box<dyn Encoder>,
    writer: Box<dyn LogWriter>,
    threshold: Level,
}

impl IoSink {
    pub fn new(encoder: Box<dyn Encoder>, writer: Box<dyn LogWriter>, threshold: Level) -> Self {
        Self {
            encoder,
            writer,
            threshold,
        }
    }

    pub fn threshold(&self) -> Level {
        self.threshold
    }
}

impl Sink for IoSink {
    #[inline]
    fn check(&self, level: Level) -> bool {
        level.enabled_at(self.threshold)
    }

    fn write(&self, entry: &Entry, fields: &[Field]) -> SinkResult<()> {
        let record = self.encoder.encode(entry, fields)?;
        self.writer.write_record(&record)?;
        Ok(())
    }

    fn sync(&self) -> SinkResult<()> {
        self.writer.sync()?;
        Ok(())
    }
}
