//! Codec and round-trip benchmark suite.
//!
//! Benchmarks value marshalling and loopback invocation:
//! - Record counts: 10, 100, 1000
//! - Binary payload sizes: 1 KiB, 64 KiB
//!
//! Run with: cargo bench --bench codec
//! Results saved to: target/criterion/

use std::hint::black_box;
use std::time::Duration;

use chrono::{TimeZone, Utc};
use criterion::{BenchmarkId, Criterion, Throughput, criterion_group, criterion_main};
use tokio::runtime::Runtime;
use webview_bridge::host::DEFAULT_BIND_IP;
use webview_bridge::{Bridge, Codec, CommandRouter, HostServer, HostValue};

// ============================================================================
// Benchmark Parameters
// ============================================================================

const RECORD_COUNTS: &[usize] = &[10, 100, 1000];
const BLOB_SIZES: &[usize] = &[1024, 64 * 1024];

// ============================================================================
// Fixtures
// ============================================================================

fn records(count: usize) -> HostValue {
    let created = Utc
        .with_ymd_and_hms(2024, 1, 1, 0, 0, 0)
        .single()
        .expect("valid timestamp");

    HostValue::seq((0..count).map(|i| {
        HostValue::map([
            ("name", HostValue::from(format!("record-{i}"))),
            ("index", HostValue::from(i as u64)),
            ("created", HostValue::from(created)),
            ("blob", HostValue::from(vec![1u8, 2, 3])),
        ])
    }))
}

// ============================================================================
// Benchmark: Encode / Decode
// ============================================================================

fn bench_records(c: &mut Criterion) {
    let codec = Codec::new();
    let mut group = c.benchmark_group("records");

    for &count in RECORD_COUNTS {
        let value = records(count);
        let wire = codec.encode(&value);
        group.throughput(Throughput::Elements(count as u64));

        group.bench_with_input(BenchmarkId::new("encode", count), &value, |b, value| {
            b.iter(|| codec.encode(black_box(value)));
        });

        group.bench_with_input(BenchmarkId::new("decode", count), &wire, |b, wire| {
            b.iter(|| codec.decode(black_box(wire)));
        });
    }

    group.finish();
}

fn bench_binary(c: &mut Criterion) {
    let codec = Codec::new();
    let mut group = c.benchmark_group("binary");

    for &size in BLOB_SIZES {
        let value = HostValue::from(vec![0xA5u8; size]);
        group.throughput(Throughput::Bytes(size as u64));

        group.bench_with_input(BenchmarkId::new("encode", size), &value, |b, value| {
            b.iter(|| codec.encode(black_box(value)));
        });

        let media = codec.encode(&HostValue::media("image/png", vec![0x5Au8; size]));
        group.bench_with_input(BenchmarkId::new("media_decode", size), &media, |b, media| {
            b.iter(|| codec.decode(black_box(media)));
        });
    }

    group.finish();
}

// ============================================================================
// Benchmark: Loopback Invocation
// ============================================================================

fn bench_invoke(c: &mut Criterion) {
    let rt = Runtime::new().expect("runtime");

    let (server, bridge) = rt.block_on(async {
        let router = CommandRouter::new().with_fn("echo", |payload| async move { Ok(payload) });
        let server = HostServer::bind(DEFAULT_BIND_IP, 0, router)
            .await
            .expect("bind");

        let bridge = Bridge::builder()
            .endpoint(server.ws_url())
            .build()
            .expect("bridge");
        bridge.connect();
        bridge
            .wait_connected(Duration::from_secs(5))
            .await
            .expect("connected");

        (server, bridge)
    });

    let mut group = c.benchmark_group("invoke");

    for &count in &RECORD_COUNTS[..2] {
        let payload = records(count);
        group.bench_with_input(BenchmarkId::new("echo", count), &payload, |b, payload| {
            b.to_async(&rt)
                .iter(|| async { bridge.call("echo", payload.clone()).await.expect("echo") });
        });
    }

    group.finish();

    bridge.close(None, None);
    server.shutdown();
}

criterion_group!(benches, bench_records, bench_binary, bench_invoke);
criterion_main!(benches);
