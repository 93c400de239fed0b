// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
#![allow(missing_docs)]
//! Benchmark: frame encode/decode throughput over lists of sample people.
//!
//! Each configuration encodes `n` people into one frame and decodes it back.
//! Throughput "bytes" is the encoded frame length, so the numbers compare
//! across modes even though compatible frames carry schemas.
use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use echo_dry_tests::{sample_person, EngineTestBuilder, Person};
use std::rc::Rc;
use std::time::Duration;

const SIZES: &[usize] = &[1, 16, 256, 4_096];

fn people(n: usize) -> Vec<Person> {
    (0..n)
        .map(|i| {
            let mut person = sample_person();
            person.age = i32::try_from(i).unwrap_or(i32::MAX);
            person
        })
        .collect()
}

fn builders() -> [(&'static str, EngineTestBuilder); 3] {
    [
        (
            "consistent",
            EngineTestBuilder::new().check_struct_version(true).with_models(),
        ),
        ("compatible", EngineTestBuilder::new().compatible(true).with_models()),
        (
            "compatible_tracked",
            EngineTestBuilder::new()
                .compatible(true)
                .track_ref(true)
                .with_models(),
        ),
    ]
}

fn bench_encode(c: &mut Criterion) {
    let mut group = c.benchmark_group("encode_people");
    group
        .warm_up_time(Duration::from_secs(2))
        .measurement_time(Duration::from_secs(6));
    for (label, builder) in builders() {
        let Ok(mut engine) = builder.build() else {
            continue;
        };
        for &n in SIZES {
            let input = people(n);
            let Ok(frame) = engine.serialize(&input) else {
                continue;
            };
            group.throughput(Throughput::Bytes(frame.len() as u64));
            let mut out = Vec::with_capacity(frame.len());
            group.bench_with_input(BenchmarkId::new(label, n), &input, |b, input| {
                b.iter(|| {
                    out.clear();
                    let result = engine.serialize_into(criterion::black_box(input), &mut out);
                    criterion::black_box(result.is_ok());
                });
            });
        }
    }
    group.finish();
}

fn bench_decode(c: &mut Criterion) {
    let mut group = c.benchmark_group("decode_people");
    group
        .warm_up_time(Duration::from_secs(2))
        .measurement_time(Duration::from_secs(6));
    for (label, builder) in builders() {
        let Ok(mut engine) = builder.build() else {
            continue;
        };
        for &n in SIZES {
            let Ok(frame) = engine.serialize(&people(n)) else {
                continue;
            };
            group.throughput(Throughput::Bytes(frame.len() as u64));
            group.bench_with_input(BenchmarkId::new(label, n), &frame, |b, frame| {
                b.iter(|| {
                    let back = engine.deserialize::<Vec<Person>>(criterion::black_box(frame));
                    criterion::black_box(back.map(|people| people.len()).ok());
                });
            });
        }
    }
    group.finish();
}

fn bench_shared_refs(c: &mut Criterion) {
    let mut group = c.benchmark_group("shared_refs");
    let Ok(mut engine) = EngineTestBuilder::new().track_ref(true).with_models().build() else {
        return;
    };
    for &n in SIZES {
        // every slot points at the same person
        let person = Rc::new(sample_person());
        let crowd: Vec<Rc<Person>> = (0..n).map(|_| Rc::clone(&person)).collect();
        group.throughput(Throughput::Elements(n as u64));
        group.bench_with_input(BenchmarkId::from_parameter(n), &crowd, |b, crowd| {
            b.iter(|| {
                let frame = engine.serialize(criterion::black_box(crowd));
                criterion::black_box(frame.map(|f| f.len()).ok());
            });
        });
    }
    group.finish();
}

criterion_group!(benches, bench_encode, bench_decode, bench_shared_refs);
criterion_main!(benches);
