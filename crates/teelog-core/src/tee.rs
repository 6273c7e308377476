//! Fan-out dispatcher.

use std::sync::Arc;

use crate::entry::{Entry, Field};
use crate::error::SinkError;
use crate::level::Level;
use crate::sink::Sink;

/// Outcome of offering one entry to every sink.
#[derive(Debug, Default)]
pub struct DispatchReport {
    /// Sinks whose threshold the entry passed
    pub attempted: usize,
    /// Sinks that failed
    pub failed: usize,
    /// First failure, in registration order
    pub first_error: Option<SinkError>,
}

impl DispatchReport {
    pub fn is_ok(&self) -> bool {
        self.failed == 0
    }
}

/// Ordered, fixed set of sinks that all observe the same entries.
///
/// A sink failure never stops the remaining sinks from being offered the
/// entry.
#[derive(Clone)]
pub struct Tee {
    sinks: Arc<[Arc<dyn Sink>]>,
    floor: Level,
}

impl Tee {
    pub fn new(sinks: Vec<Arc<dyn Sink>>) -> Self {
        Self {
            sinks: sinks.into(),
            floor: Level::Debug,
        }
    }

    /// Coarse pre-filter applied before any sink is consulted.
    pub fn with_floor(mut self, floor: Level) -> Self {
        self.floor = floor;
        self
    }

    pub fn len(&self) -> usize {
        self.sinks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sinks.is_empty()
    }

    /// Whether any sink would accept an entry at `level`.
    pub fn check(&self, level: Level) -> bool {
        level.enabled_at(self.floor) && self.sinks.iter().any(|s| s.check(level))
    }

    /// Offer the entry to every sink in registration order.
    pub fn offer(&self, entry: &Entry, fields: &[Field]) -> DispatchReport {
        let mut report = DispatchReport::default();
        if !entry.level.enabled_at(self.floor) {
            return report;
        }
        for sink in self.sinks.iter() {
            if !sink.check(entry.level) {
                continue;
            }
            report.attempted += 1;
            if let Err(e) = sink.write(entry, fields) {
                report.failed += 1;
                report.first_error.get_or_insert(e);
            }
        }
        report
    }

    /// Flush every sink; returns the first error.
    pub fn sync(&self) -> Result<(), SinkError> {
        let mut first = None;
        for sink in self.sinks.iter() {
            if let Err(e) = sink.sync() {
                first.get_or_insert(e);
            }
        }
        match first {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ForwardError;
    use parking_lot::Mutex;

    /// Records which entries it saw; optionally fails every write.
    struct Probe {
        name: &'static str,
        threshold: Level,
        fail: bool,
        log: Arc<Mutex<Vec<String>>>,
    }

    impl Sink for Probe {
        fn check(&self, level: Level) -> bool {
            level >= self.threshold
        }

        fn write(&self, entry: &Entry, _fields: &[Field]) -> Result<(), SinkError> {
            self.log.lock().push(format!("{}:{}", self.name, entry.message));
            if self.fail {
                return Err(ForwardError::Transport(self.name.into()).into());
            }
            Ok(())
        }
    }

    fn probe(name: &'static str, threshold: Level, fail: bool, log: &Arc<Mutex<Vec<String>>>) -> Arc<dyn Sink> {
        Arc::new(Probe {
            name,
            threshold,
            fail,
            log: Arc::clone(log),
        })
    }

    #[test]
    fn test_registration_order_and_thresholds() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let tee = Tee::new(vec![
            probe("a", Level::Debug, false, &log),
            probe("b", Level::Error, false, &log),
            probe("c", Level::Info, false, &log),
        ]);

        let report = tee.offer(&Entry::new(Level::Info, "hello"), &[]);
        assert_eq!(report.attempted, 2);
        assert!(report.is_ok());
        assert_eq!(*log.lock(), vec!["a:hello", "c:hello"]);
    }

    #[test]
    fn test_failure_does_not_stop_fanout() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let tee = Tee::new(vec![
            probe("first", Level::Debug, true, &log),
            probe("second", Level::Debug, true, &log),
            probe("third", Level::Debug, false, &log),
        ]);

        let report = tee.offer(&Entry::new(Level::Warn, "w"), &[]);
        assert_eq!(report.attempted, 3);
        assert_eq!(report.failed, 2);
        match report.first_error {
            Some(SinkError::Forwarding(ForwardError::Transport(name))) => assert_eq!(name, "first"),
            other => panic!("unexpected first error: {:?}", other),
        }
        assert_eq!(log.lock().len(), 3);
    }

    #[test]
    fn test_nothing_enabled_is_noop() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let tee = Tee::new(vec![probe("a", Level::Error, false, &log)]);

        assert!(!tee.check(Level::Info));
        let report = tee.offer(&Entry::new(Level::Info, "quiet"), &[]);
        assert_eq!(report.attempted, 0);
        assert!(log.lock().is_empty());
    }

    #[test]
    fn test_floor_prefilters() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let tee = Tee::new(vec![probe("a", Level::Debug, false, &log)]).with_floor(Level::Warn);

        assert!(!tee.check(Level::Info));
        assert!(tee.check(Level::Warn));
        tee.offer(&Entry::new(Level::Info, "dropped"), &[]);
        tee.offer(&Entry::new(Level::Error, "kept"), &[]);
        assert_eq!(*log.lock(), vec!["a:kept"]);
    }
}
