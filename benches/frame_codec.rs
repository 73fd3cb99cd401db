//! Benchmarks for the packet codec and sample decoder
//!
//! Covers the per-delivery hot path:
//! - Frame encode and checksum validation
//! - Coalesced-frame scanning on every delivery
//! - Realtime and history payload decoding
//!
//! Platform: Cross-platform (synthetic frames, CI-safe)

use criterion::{BenchmarkId, Criterion, Throughput, criterion_group, criterion_main};
use std::hint::black_box;
use uricsense::protocol::codec::coalesced_frame_len;
use uricsense::protocol::decoder::Timebase;
use uricsense::protocol::{decode, decode_history_batch, decode_realtime_sample, encode};
use uricsense::test_utils::{at, realtime_payload, serve_history};

const START: i64 = 1_700_000_000;

fn bench_encode_decode(c: &mut Criterion) {
    let mut group = c.benchmark_group("frame_codec");

    for payload_len in [0usize, 8, 24, 161] {
        let payload = vec![0x5Au8; payload_len];
        let frame = encode(0x84, &payload);
        group.throughput(Throughput::Bytes(frame.len() as u64));

        group.bench_with_input(BenchmarkId::new("encode", payload_len), &payload, |b, payload| {
            b.iter(|| black_box(encode(black_box(0x84), black_box(payload))))
        });

        group.bench_with_input(BenchmarkId::new("decode", payload_len), &frame, |b, frame| {
            b.iter(|| black_box(decode(black_box(frame))).is_ok())
        });

        group.bench_with_input(BenchmarkId::new("coalesced_scan", payload_len), &frame, |b, frame| {
            b.iter(|| black_box(coalesced_frame_len(black_box(frame))))
        });
    }

    group.finish();
}

fn bench_payload_decoding(c: &mut Criterion) {
    let timebase = Timebase::new(at(START));
    let now = at(START + 10_000_000);

    let realtime = realtime_payload(5, 300, 4000, false);
    c.bench_function("decode_realtime_sample", |b| {
        b.iter(|| black_box(decode_realtime_sample(black_box(&realtime), &timebase, now)))
    });

    let mut group = c.benchmark_group("decode_history_batch");
    for count in [1u16, 20, 255] {
        let payload = serve_history(1, count, u32::from(count));
        group.throughput(Throughput::Elements(u64::from(count)));
        group.bench_with_input(BenchmarkId::from_parameter(count), &payload, |b, payload| {
            b.iter(|| black_box(decode_history_batch(black_box(payload), &timebase, now)))
        });
    }
    group.finish();
}

criterion_group!(benches, bench_encode_decode, bench_payload_decoding);
criterion_main!(benches);
