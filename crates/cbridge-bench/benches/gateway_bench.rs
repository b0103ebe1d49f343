//! Gateway dispatch overhead.
//!
//! Compares direct foreign calls with the same calls routed through the
//! gateway's phase tracking, metrics and registry bookkeeping.

use criterion::{Criterion, criterion_group, criterion_main};
use cbridge_membrane::{BoundaryConfig, BoundaryContext, Gateway};

fn gateway() -> Gateway {
    Gateway::open(&BoundaryContext::new(BoundaryConfig::default()), cbridge_abi::surface())
}

fn bench_add_direct(c: &mut Criterion) {
    c.bench_function("add_direct", |b| {
        b.iter(|| {
            // SAFETY: pure numeric primitive.
            criterion::black_box(unsafe {
                cbridge_abi::math_abi::c_add(criterion::black_box(1.5), 2.5)
            });
        });
    });
}

fn bench_add_gateway(c: &mut Criterion) {
    let gw = gateway();
    c.bench_function("add_gateway", |b| {
        b.iter(|| {
            criterion::black_box(gw.add(criterion::black_box(1.5), 2.5).expect("add"));
        });
    });
}

fn bench_allocate_release(c: &mut Criterion) {
    let gw = gateway();
    c.bench_function("allocate_release_256", |b| {
        b.iter(|| {
            let mut buf = gw.allocate(256).expect("alloc");
            buf.release().expect("release");
        });
    });
}

fn bench_record_lifecycle(c: &mut Criterion) {
    let gw = gateway();
    c.bench_function("use_record", |b| {
        b.iter(|| {
            criterion::black_box(gw.use_record().expect("use_record"));
        });
    });
}

fn bench_compress_round_trip(c: &mut Criterion) {
    let gw = gateway();
    let data = b"aaaaaaaabbbbbbbbccccccccdddddddd".repeat(32);
    c.bench_function("compress_round_trip_1k", |b| {
        b.iter(|| {
            let mut packed = gw.compress(&data).expect("compress").expect("non-empty");
            let unpacked = gw
                .decompress(packed.as_slice().expect("live"))
                .expect("decompress");
            packed.release().expect("release");
            criterion::black_box(unpacked);
        });
    });
}

criterion_group!(
    benches,
    bench_add_direct,
    bench_add_gateway,
    bench_allocate_release,
    bench_record_lifecycle,
    bench_compress_round_trip
);
criterion_main!(benches);
