//! Benchmarks for the logging hot path
//!
//! Run with: cargo bench -p teelog-core
//!
//! These benchmarks establish performance baselines for:
//! - Disabled-level checks (must stay near free)
//! - Encoding with both encoder styles
//! - Fan-out to console, file and hook sinks

use std::sync::Arc;

use chrono::{DateTime, Utc};
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use tempfile::TempDir;
use teelog_core::{
    ConsoleEncoder, Encoder, Entry, Field, ForwardContext, ForwardError, JsonEncoder, Level,
    LogForwarder, Logger, LockedWriter,
};

/// Forwarder that discards everything.
struct NullForwarder;

impl LogForwarder for NullForwarder {
    fn send_log(
        &self,
        _ctx: &ForwardContext,
        _time: DateTime<Utc>,
        _level: &str,
        line: &[u8],
    ) -> Result<(), ForwardError> {
        black_box(line);
        Ok(())
    }
}

fn sample_fields() -> Vec<Field> {
    vec![
        Field::str("peer_id", "k51qzi5uqu5dlvj2baxnqndepeb86cbk3ng7n3i46uzyxzyqj2xjonzllnv0v8"),
        Field::u64("bytes", 16_384),
        Field::f64("latency_ms", 12.75),
        Field::bool("retry", false),
    ]
}

// ============================================================================
// Level Check Benchmarks
// ============================================================================

fn bench_disabled_level(c: &mut Criterion) {
    let logger = Logger::builder()
        .level("error")
        .console_writer(LockedWriter::new(std::io::sink()))
        .build()
        .unwrap();
    let fields = sample_fields();

    c.bench_function("disabled_level_log", |b| {
        b.iter(|| logger.info(black_box("never encoded"), black_box(&fields)))
    });
}

// ============================================================================
// Encoder Benchmarks
// ============================================================================

fn bench_encoders(c: &mut Criterion) {
    let mut group = c.benchmark_group("encode");
    let entry = Entry::new(Level::Info, "Connected to peer").with_name("sync.gossip");

    for count in [0usize, 4, 16] {
        let fields: Vec<Field> = sample_fields().into_iter().cycle().take(count).collect();
        let json = JsonEncoder::default();
        let console = ConsoleEncoder::default();

        group.bench_with_input(BenchmarkId::new("json", count), &fields, |b, fields| {
            b.iter(|| black_box(json.encode(&entry, fields).unwrap()))
        });
        group.bench_with_input(BenchmarkId::new("console", count), &fields, |b, fields| {
            b.iter(|| black_box(console.encode(&entry, fields).unwrap()))
        });
    }

    group.finish();
}

// ============================================================================
// Fan-out Benchmarks
// ============================================================================

fn bench_fan_out(c: &mut Criterion) {
    let dir = TempDir::new().unwrap();
    let logger = Logger::builder()
        .level("debug")
        .file(dir.path().join("bench.log"))
        .max_size(8 * 1024 * 1024)
        .max_backups(2)
        .console_writer(LockedWriter::new(std::io::sink()))
        .forwarder(Arc::new(NullForwarder))
        .build()
        .unwrap();
    let fields = sample_fields();

    let mut group = c.benchmark_group("fan_out");
    group.throughput(Throughput::Elements(1));
    group.bench_function("three_sinks", |b| {
        b.iter(|| logger.info(black_box("Connected to peer"), black_box(&fields)))
    });
    group.finish();
}

criterion_group!(benches, bench_disabled_level, bench_encoders, bench_fan_out);
criterion_main!(benches);
