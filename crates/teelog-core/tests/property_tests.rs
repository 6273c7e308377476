//! Property-based tests for levels, encoders and rotation
//!
//! Uses proptest to verify invariants that must hold for any input.

use std::fs;
use std::sync::Arc;

use chrono::{DateTime, TimeZone, Utc};
use parking_lot::Mutex;
use proptest::prelude::*;
use serde_json::Value;
use tempfile::TempDir;
use teelog_core::hook::{canonical_config, CanonicalHeader};
use teelog_core::{
    Encoder, EncoderConfig, Entry, Field, ForwardContext, ForwardError, HookSink, JsonEncoder,
    Level, LogForwarder, RotatingFile, RotationPolicy, Sink, TimeEncoding,
};

// ============================================================================
// Strategy Generators
// ============================================================================

fn level_strategy() -> impl Strategy<Value = Level> {
    prop::sample::select(Level::ALL.to_vec())
}

/// Arbitrary message text, including quotes, control characters and unicode
fn message_strategy() -> impl Strategy<Value = String> {
    prop::string::string_regex("(?s).{0,200}").expect("valid regex")
}

fn key_strategy() -> impl Strategy<Value = String> {
    prop::string::string_regex("[a-z_][a-z0-9_]{0,15}").expect("valid regex")
}

#[derive(Debug, Clone)]
enum Scalar {
    Str(String),
    Bool(bool),
    I64(i64),
    U64(u64),
}

fn scalar_strategy() -> impl Strategy<Value = Scalar> {
    prop_oneof![
        message_strategy().prop_map(Scalar::Str),
        any::<bool>().prop_map(Scalar::Bool),
        any::<i64>().prop_map(Scalar::I64),
        any::<u64>().prop_map(Scalar::U64),
    ]
}

/// Fields with distinct keys, so the decoded object maps one-to-one
fn fields_strategy() -> impl Strategy<Value = Vec<(String, Scalar)>> {
    prop::collection::btree_map(key_strategy(), scalar_strategy(), 0..8)
        .prop_map(|m| m.into_iter().collect())
}

fn to_field(key: &str, value: &Scalar) -> Field {
    match value {
        Scalar::Str(s) => Field::str(key, s.clone()),
        Scalar::Bool(b) => Field::bool(key, *b),
        Scalar::I64(n) => Field::i64(key, *n),
        Scalar::U64(n) => Field::u64(key, *n),
    }
}

fn to_json(value: &Scalar) -> Value {
    match value {
        Scalar::Str(s) => Value::from(s.clone()),
        Scalar::Bool(b) => Value::from(*b),
        Scalar::I64(n) => Value::from(*n),
        Scalar::U64(n) => Value::from(*n),
    }
}

/// Keys the encoder itself writes; generated fields must not collide
fn is_reserved(key: &str) -> bool {
    matches!(key, "level" | "ts" | "logger" | "caller" | "msg" | "stacktrace")
}

/// Field keys biased towards the canonical header members
fn header_key_strategy() -> impl Strategy<Value = String> {
    prop_oneof![
        Just("level".to_string()),
        Just("msg".to_string()),
        Just("ts".to_string()),
        key_strategy(),
    ]
}

/// Records the level and line of every forwarded entry.
#[derive(Default)]
struct Recorder {
    calls: Mutex<Vec<(DateTime<Utc>, String, Vec<u8>)>>,
}

impl LogForwarder for Recorder {
    fn send_log(
        &self,
        _ctx: &ForwardContext,
        time: DateTime<Utc>,
        level: &str,
        line: &[u8],
    ) -> Result<(), ForwardError> {
        self.calls.lock().push((time, level.to_string(), line.to_vec()));
        Ok(())
    }
}

// ============================================================================
// Property Tests
// ============================================================================

proptest! {
    /// Parsing the rendered name returns the same level.
    #[test]
    fn prop_level_name_round_trip(level in level_strategy()) {
        prop_assert_eq!(level.as_str().parse::<Level>().unwrap(), level);
        prop_assert_eq!(level.capital().parse::<Level>().unwrap(), level);
    }

    /// Threshold admission agrees with the total order.
    #[test]
    fn prop_threshold_matches_order(a in level_strategy(), b in level_strategy()) {
        prop_assert_eq!(a.enabled_at(b), a >= b);
    }

    /// Decoding a structured line yields the entry's level, message and
    /// fields with their values.
    #[test]
    fn prop_json_line_round_trip(
        level in level_strategy(),
        message in message_strategy(),
        fields in fields_strategy(),
    ) {
        let fields: Vec<_> = fields.into_iter().filter(|(k, _)| !is_reserved(k)).collect();
        let entry = Entry::new(level, message.clone());
        let encoded: Vec<Field> = fields.iter().map(|(k, v)| to_field(k, v)).collect();

        let line = JsonEncoder::default().encode(&entry, &encoded).unwrap();
        prop_assert_eq!(line.last(), Some(&b'\n'));
        prop_assert_eq!(line.iter().filter(|&&b| b == b'\n').count(), 1);

        let decoded: Value = serde_json::from_slice(&line).unwrap();
        prop_assert_eq!(decoded["level"].as_str(), Some(level.as_str()));
        prop_assert_eq!(decoded["msg"].as_str(), Some(message.as_str()));
        for (key, value) in &fields {
            prop_assert_eq!(&decoded[key.as_str()], &to_json(value));
        }
        prop_assert_eq!(decoded.as_object().unwrap().len(), 3 + fields.len());
    }

    /// The canonical hook line always decodes back to its header.
    #[test]
    fn prop_canonical_header_round_trip(
        level in level_strategy(),
        message in message_strategy(),
        micros in 0i64..4_000_000_000_000_000,
    ) {
        let time = Utc.timestamp_micros(micros).unwrap();
        let entry = Entry::new(level, message.clone()).at(time);
        let line = JsonEncoder::new(canonical_config()).encode(&entry, &[]).unwrap();

        let header = CanonicalHeader::decode(&line).unwrap();
        prop_assert_eq!(header.level, level.as_str());
        prop_assert_eq!(header.msg, message);
        prop_assert_eq!(header.ts, time.format("%d.%m.%Y %H:%M:%S%.6f").to_string());
    }

    /// Fields reusing the header keys neither block forwarding nor change
    /// the level, time or message the hook reports.
    #[test]
    fn prop_hook_forwards_despite_header_keys(
        level in level_strategy(),
        message in message_strategy(),
        fields in prop::collection::vec((header_key_strategy(), scalar_strategy()), 0..6),
    ) {
        let recorder = Arc::new(Recorder::default());
        let hook = HookSink::new(recorder.clone(), Level::Debug);
        let entry = Entry::new(level, message.clone());
        let encoded: Vec<Field> = fields.iter().map(|(k, v)| to_field(k, v)).collect();

        hook.write(&entry, &encoded).unwrap();

        let calls = recorder.calls.lock();
        prop_assert_eq!(calls.len(), 1);
        let (time, forwarded_level, line) = &calls[0];
        prop_assert_eq!(*time, entry.time);
        prop_assert_eq!(forwarded_level.as_str(), level.as_str());
        let header = CanonicalHeader::decode(line).unwrap();
        prop_assert_eq!(header.msg, message);
        prop_assert_eq!(header.level, level.as_str());
    }

    /// Encoding time never affects anything but the time member.
    #[test]
    fn prop_time_encoding_is_isolated(message in message_strategy()) {
        let entry = Entry::new(Level::Info, message);
        let a: Value = serde_json::from_slice(
            &JsonEncoder::new(EncoderConfig::production()).encode(&entry, &[]).unwrap(),
        ).unwrap();
        let b: Value = serde_json::from_slice(
            &JsonEncoder::new(EncoderConfig::production().with_time(TimeEncoding::Rfc3339))
                .encode(&entry, &[])
                .unwrap(),
        ).unwrap();
        prop_assert_eq!(&a["msg"], &b["msg"]);
        prop_assert_eq!(&a["level"], &b["level"]);
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(24))]

    /// No file ever grows past the limit when every record fits, and no
    /// byte is lost across rotations.
    #[test]
    fn prop_rotation_respects_limit(
        sizes in prop::collection::vec(1usize..64, 1..60),
        max_size in 64u64..256,
    ) {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("prop.log");
        let policy = RotationPolicy { max_size, ..RotationPolicy::default() };
        let file = RotatingFile::open(&path, policy).unwrap();

        let mut total = 0u64;
        for (i, size) in sizes.iter().enumerate() {
            let mut record = vec![b'a' + (i % 26) as u8; *size - 1];
            record.push(b'\n');
            file.write(&record).unwrap();
            total += *size as u64;
        }

        let mut on_disk = 0u64;
        for entry in fs::read_dir(dir.path()).unwrap() {
            let len = entry.unwrap().metadata().unwrap().len();
            prop_assert!(len <= max_size);
            on_disk += len;
        }
        prop_assert_eq!(on_disk, total);
    }
}
