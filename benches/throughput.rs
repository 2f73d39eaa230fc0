//! Throughput Benchmark for BlitzDB
//!
//! This benchmark measures the storage engine, line framing, and the full
//! tokenize-and-dispatch path under various workloads.

use blitzdb::commands::{CommandHandler, CommandRegistry};
use blitzdb::connection::{AuthTracker, ConnectionRegistry};
use blitzdb::protocol::{tokenize, LineParser};
use blitzdb::storage::{SetCondition, StorageEngine};
use bytes::{Bytes, BytesMut};
use criterion::{black_box, criterion_group, criterion_main, Criterion, Throughput};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Benchmark SET operations
fn bench_set(c: &mut Criterion) {
    let engine = Arc::new(StorageEngine::new());

    let mut group = c.benchmark_group("set");
    group.throughput(Throughput::Elements(1));

    group.bench_function("set_small", |b| {
        let mut i = 0u64;
        b.iter(|| {
            let key = Bytes::from(format!("key:{}", i));
            engine.set(key, Bytes::from("small_value"));
            i += 1;
        });
    });

    group.bench_function("set_medium", |b| {
        let mut i = 0u64;
        let value = Bytes::from("x".repeat(1024)); // 1KB value
        b.iter(|| {
            let key = Bytes::from(format!("key:{}", i));
            engine.set(key, value.clone());
            i += 1;
        });
    });

    group.bench_function("set_nx_with_expiry", |b| {
        let mut i = 0u64;
        b.iter(|| {
            let key = Bytes::from(format!("nx:{}", i % 10_000));
            let deadline = Instant::now() + Duration::from_secs(3600);
            black_box(engine.set_with(
                key,
                Bytes::from("value"),
                SetCondition::IfAbsent,
                Some(deadline),
            ));
            i += 1;
        });
    });

    group.finish();
}

/// Benchmark GET operations
fn bench_get(c: &mut Criterion) {
    let engine = Arc::new(StorageEngine::new());

    // Pre-populate with data
    for i in 0..100_000 {
        let key = Bytes::from(format!("key:{}", i));
        let value = Bytes::from(format!("value:{}", i));
        engine.set(key, value);
    }

    let mut group = c.benchmark_group("get");
    group.throughput(Throughput::Elements(1));

    group.bench_function("get_existing", |b| {
        let mut i = 0u64;
        b.iter(|| {
            let key = Bytes::from(format!("key:{}", i % 100_000));
            black_box(engine.get(&key));
            i += 1;
        });
    });

    group.bench_function("get_missing", |b| {
        let mut i = 0u64;
        b.iter(|| {
            let key = Bytes::from(format!("missing:{}", i));
            black_box(engine.get(&key));
            i += 1;
        });
    });

    group.finish();
}

/// Benchmark mixed workload (80% reads, 20% writes)
fn bench_mixed(c: &mut Criterion) {
    let engine = Arc::new(StorageEngine::new());

    for i in 0..10_000 {
        let key = Bytes::from(format!("key:{}", i));
        let value = Bytes::from(format!("value:{}", i));
        engine.set(key, value);
    }

    let mut group = c.benchmark_group("mixed");
    group.throughput(Throughput::Elements(1));

    group.bench_function("80_read_20_write", |b| {
        let mut i = 0u64;
        b.iter(|| {
            if i % 5 == 0 {
                let key = Bytes::from(format!("new:{}", i));
                engine.set(key, Bytes::from("value"));
            } else {
                let key = Bytes::from(format!("key:{}", i % 10_000));
                black_box(engine.get(&key));
            }
            i += 1;
        });
    });

    group.finish();
}

/// Benchmark concurrent access to the single store lock
fn bench_concurrent(c: &mut Criterion) {
    use std::thread;

    let mut group = c.benchmark_group("concurrent");
    group.measurement_time(Duration::from_secs(10));

    group.bench_function("4_threads_mixed", |b| {
        b.iter(|| {
            let engine = Arc::new(StorageEngine::new());
            let handles: Vec<_> = (0..4)
                .map(|t| {
                    let engine = Arc::clone(&engine);
                    thread::spawn(move || {
                        for i in 0..10_000 {
                            let key = Bytes::from(format!("key:{}:{}", t, i));
                            engine.set(key.clone(), Bytes::from("value"));
                            engine.get(&key);
                        }
                    })
                })
                .collect();

            for handle in handles {
                handle.join().unwrap();
            }

            black_box(engine.len());
        });
    });

    group.finish();
}

/// Benchmark line framing over a pipelined buffer
fn bench_parse(c: &mut Criterion) {
    let pipeline: Vec<u8> = (0..100)
        .flat_map(|i| format!("SET key:{} value:{}\r\n", i, i).into_bytes())
        .collect();
    let parser = LineParser::default();

    let mut group = c.benchmark_group("parse");
    group.throughput(Throughput::Elements(100));

    group.bench_function("split_and_tokenize_100_lines", |b| {
        b.iter(|| {
            let mut buf = BytesMut::from(&pipeline[..]);
            while let Ok(Some(line)) = parser.parse(&mut buf) {
                black_box(tokenize(&line));
            }
        });
    });

    group.finish();
}

/// Benchmark the full dispatch path: tokenize, validate, execute, encode
fn bench_dispatch(c: &mut Criterion) {
    let storage = Arc::new(StorageEngine::new());
    let handler = CommandHandler::new(
        Arc::clone(&storage),
        Arc::new(CommandRegistry::new()),
        Arc::new(AuthTracker::new(None)),
    );
    let connections = ConnectionRegistry::new();
    let (session, _shutdown) = connections.register("127.0.0.1:6379".parse().unwrap());
    let conn = session.id();

    storage.set(Bytes::from("hot"), Bytes::from("value"));

    let mut group = c.benchmark_group("dispatch");
    group.throughput(Throughput::Elements(1));

    group.bench_function("get", |b| {
        let line = Bytes::from("GET hot");
        b.iter(|| {
            let response = handler.execute(conn, &tokenize(&line));
            black_box(response.reply.serialize());
        });
    });

    group.bench_function("set_px", |b| {
        let mut i = 0u64;
        b.iter(|| {
            let line = Bytes::from(format!("SET key:{} value PX 60000", i % 10_000));
            let response = handler.execute(conn, &tokenize(&line));
            black_box(response.reply.serialize());
            i += 1;
        });
    });

    group.bench_function("unknown_command", |b| {
        let line = Bytes::from("FROB a b c");
        b.iter(|| {
            let response = handler.execute(conn, &tokenize(&line));
            black_box(response.reply.serialize());
        });
    });

    group.finish();
}

criterion_group!(
    benches,
    bench_set,
    bench_get,
    bench_mixed,
    bench_concurrent,
    bench_parse,
    bench_dispatch,
);

criterion_main!(benches);
