//! Benchmarks for the session state machine
//!
//! Measures a complete handshake, backfill and streaming arm against a
//! simulated device, driven synchronously through the device facade.
//!
//! Platform: Cross-platform (in-memory store and simulated device, CI-safe)

use criterion::{BenchmarkId, Criterion, Throughput, criterion_group, criterion_main};
use std::hint::black_box;
use uricsense::test_utils::{SimulatedDevice, at};
use uricsense::{DeviceSession, ManualClock, MemoryStore, Outbox, SessionConfig, SessionPhase};

const START: u32 = 1_700_000_000;

/// Run one session to streaming; returns the number of frames exchanged.
fn run_to_streaming(gap: u32) -> usize {
    let mut device = SimulatedDevice::new(gap, START);
    let clock = ManualClock::new(at(i64::from(START) + 10_000_000));
    let mut session =
        DeviceSession::new(Outbox::new(), MemoryStore::new(), clock, SessionConfig::default())
            .unwrap();

    session.on_connection_established();
    let mut exchanged = 0;
    while let Some(frame) = session.sink_mut().pop() {
        exchanged += 1;
        if let Some(response) = device.respond(&frame) {
            session.on_bytes_received(&response);
        }
    }
    assert_eq!(session.phase(), SessionPhase::Streaming);
    exchanged
}

fn bench_backfill(c: &mut Criterion) {
    let mut group = c.benchmark_group("session_backfill");
    group.sample_size(20);

    for gap in [0u32, 45, 1_000, 10_000] {
        group.throughput(Throughput::Elements(u64::from(gap.max(1))));
        group.bench_with_input(BenchmarkId::from_parameter(gap), &gap, |b, &gap| {
            b.iter(|| black_box(run_to_streaming(black_box(gap))))
        });
    }

    group.finish();
}

fn bench_streaming_reading(c: &mut Criterion) {
    let mut device = SimulatedDevice::new(0, START);
    let clock = ManualClock::new(at(i64::from(START) + 10_000_000));
    let mut session =
        DeviceSession::new(Outbox::new(), MemoryStore::new(), clock, SessionConfig::default())
            .unwrap();
    session.on_connection_established();
    while let Some(frame) = session.sink_mut().pop() {
        if let Some(response) = device.respond(&frame) {
            session.on_bytes_received(&response);
        }
    }

    c.bench_function("realtime_reading", |b| {
        b.iter(|| {
            let frame = device.next_reading(false);
            session.on_bytes_received(black_box(&frame));
        })
    });
}

criterion_group!(benches, bench_backfill, bench_streaming_reading);
criterion_main!(benches);
