//! Criterion benchmarks for crashstore-core.
//!
//! ## Benchmark groups
//!
//! 1. **frame_decoding** — single body line decode + signature derivation.
//! 2. **header** — header section parsing.
//! 3. **ingest_stream** — whole-dump ingestion at various frame counts.
//! 4. **store** — saving finished reports into an in-memory database.
//!
//! ## Running
//!
//! ```sh
//! cargo bench --manifest-path crates/crashstore-core/Cargo.toml
//! # Run only the ingestion group:
//! cargo bench --manifest-path crates/crashstore-core/Cargo.toml -- ingest_stream
//! ```

use std::io::Cursor;

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};

use crashstore_core::config::{IngestOptions, StoreConfig};
use crashstore_core::ingest::dump::DumpText;
use crashstore_core::ingest::frame::decode_frame_line;
use crashstore_core::ingest::header::read_header;
use crashstore_core::ingest::pipeline::ingest_stream;
use crashstore_core::store::database::SqliteStore;
use crashstore_core::store::ReportStore;

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

const HEADER: &str = "OS|Linux|5.10.0-21-amd64\nCPU|x86_64|GenuineIntel family 6 model 158\n\
                      Module|libxul.so|1.0\nCrash|SIGSEGV|0x0|0\n\n";

/// Build a synthetic dump with `frames` frames on thread 0.
fn synthetic_dump(frames: usize) -> String {
    let mut dump = String::from(HEADER);
    for n in 0..frames {
        match n % 3 {
            0 => dump.push_str(&format!("0|{n}|libxul.so|nsFoo::Bar{n}|nsFoo.cpp|{n}|0x{n:x}\n")),
            1 => dump.push_str(&format!("0|{n}|libxul.so||nsFoo.cpp|{n}|0x{n:x}\n")),
            _ => dump.push_str(&format!("0|{n}|libc.so.6||||0x{n:x}\n")),
        }
    }
    dump
}

// ---------------------------------------------------------------------------
// Groups
// ---------------------------------------------------------------------------

fn bench_frame_decoding(c: &mut Criterion) {
    let mut group = c.benchmark_group("frame_decoding");
    let lines = [
        ("function", "0|0|libxul.so|nsFoo::Bar|nsFoo.cpp|120|0x1a2b"),
        ("source_line", "0|1|libxul.so||nsFoo.cpp|120|0x1a2b"),
        ("module_offset", "0|2|libc.so.6||||0x1a2b"),
        ("short", "0|3"),
    ];
    for (name, line) in lines {
        group.bench_with_input(BenchmarkId::from_parameter(name), line, |b, line| {
            b.iter(|| decode_frame_line(black_box(line)).map(|f| f.signature()))
        });
    }
    group.finish();
}

fn bench_header(c: &mut Criterion) {
    c.bench_function("header/read_header", |b| {
        b.iter(|| {
            let mut dump = DumpText::new();
            let mut reader = Cursor::new(black_box(HEADER).as_bytes());
            read_header(&mut reader, &mut dump).unwrap()
        })
    });
}

fn bench_ingest_stream(c: &mut Criterion) {
    let mut group = c.benchmark_group("ingest_stream");
    let options = IngestOptions::default();
    for frames in [10usize, 100, 1000] {
        let dump = synthetic_dump(frames);
        group.bench_with_input(BenchmarkId::from_parameter(frames), &dump, |b, dump| {
            b.iter(|| {
                let mut reader = Cursor::new(dump.as_bytes());
                ingest_stream("bench", &mut reader, &options).unwrap()
            })
        });
    }
    group.finish();
}

fn bench_store(c: &mut Criterion) {
    let report = ingest_stream(
        "template",
        &mut Cursor::new(synthetic_dump(50).as_bytes()),
        &IngestOptions::default(),
    )
    .unwrap();
    let store = SqliteStore::open(&StoreConfig::in_memory()).unwrap();
    let mut counter = 0u64;
    c.bench_function("store/save_50_frames", |b| {
        b.iter(|| {
            counter += 1;
            let mut report = report.clone();
            report.uuid = format!("bench-{counter}");
            store.save(black_box(&report)).unwrap()
        })
    });
}

criterion_group!(
    benches,
    bench_frame_decoding,
    bench_header,
    bench_ingest_stream,
    bench_store
);
criterion_main!(benches);
