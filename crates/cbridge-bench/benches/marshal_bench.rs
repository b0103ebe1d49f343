//! Record marshalling throughput.

use criterion::{Criterion, criterion_group, criterion_main};
use cbridge_membrane::{DataRecord, Marshaller, OverflowPolicy, PersonRecord, Point};

fn sample() -> DataRecord {
    DataRecord {
        id: 17,
        name: "benchmark-record".to_string(),
        value: 2.75,
        processed: true,
    }
}

fn bench_to_foreign(c: &mut Criterion) {
    let m = Marshaller::default();
    let record = sample();
    c.bench_function("data_record_to_foreign", |b| {
        b.iter(|| {
            criterion::black_box(m.to_foreign(criterion::black_box(&record)).expect("marshal"));
        });
    });
}

fn bench_from_foreign(c: &mut Criterion) {
    let m = Marshaller::default();
    let bytes = m.to_foreign(&sample()).expect("marshal").bytes;
    c.bench_function("data_record_from_foreign", |b| {
        b.iter(|| {
            let record: DataRecord = m
                .from_foreign(criterion::black_box(bytes.as_bytes()))
                .expect("unmarshal");
            criterion::black_box(record);
        });
    });
}

fn bench_truncate_long_name(c: &mut Criterion) {
    let m = Marshaller::new(OverflowPolicy::Truncate);
    let record = DataRecord {
        name: "x".repeat(1024),
        ..sample()
    };
    c.bench_function("data_record_truncate_1k_name", |b| {
        b.iter(|| {
            criterion::black_box(m.to_foreign(&record).expect("marshal"));
        });
    });
}

fn bench_person_round_trip(c: &mut Criterion) {
    let m = Marshaller::default();
    let person = PersonRecord {
        name: "Grace".to_string(),
        age: 85,
        location: Point { x: 12, y: -7 },
    };
    c.bench_function("person_round_trip", |b| {
        b.iter(|| {
            let out = m.to_foreign(&person).expect("marshal");
            let back: PersonRecord = m.from_foreign(out.bytes.as_bytes()).expect("unmarshal");
            criterion::black_box(back);
        });
    });
}

criterion_group!(
    benches,
    bench_to_foreign,
    bench_from_foreign,
    bench_truncate_long_name,
    bench_person_round_trip
);
criterion_main!(benches);
