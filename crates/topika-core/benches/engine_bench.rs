//! # Engine Benchmarks
//!
//! Performance benchmarks for topika-core engine operations.
//!
//! Run with: `cargo bench -p topika-core`

use criterion::{BenchmarkId, Criterion, criterion_group, criterion_main};
use std::hint::black_box;
use topika_core::{
    ConstructId, ConstructOps, IdentityOps, IndexOps, Locator, MergeOps, TopicMap,
    topic_map_from_bytes, topic_map_to_bytes,
};

/// Create a map with N topics, each carrying one subject identifier and
/// one name typed by a shared name type.
fn create_flat_map(size: usize) -> (TopicMap, ConstructId) {
    let mut map = TopicMap::new();
    let ntype = map.create_topic();
    for i in 0..size {
        let topic = map.create_topic();
        map.add_subject_identifier(topic, Locator::new(format!("http://ex/topic/{i}")))
            .expect("identifier");
        map.create_name(topic, ntype, &format!("topic {i}"), &[])
            .expect("name");
    }
    (map, ntype)
}

/// Create a map with a linear supertype chain of N topics.
fn create_chain_map(size: usize) -> (TopicMap, ConstructId) {
    let mut map = TopicMap::new();
    let mut prev = map.create_topic();
    let leaf = prev;
    for _ in 1..size {
        let next = map.create_topic();
        map.add_supertype(prev, next).expect("supertype");
        prev = next;
    }
    (map, leaf)
}

// =============================================================================
// BENCHMARKS
// =============================================================================

fn bench_topic_creation(c: &mut Criterion) {
    let mut group = c.benchmark_group("topic_creation");

    for size in [100, 1000, 10000].iter() {
        group.bench_with_input(BenchmarkId::from_parameter(size), size, |b, &size| {
            b.iter(|| {
                let (map, _) = create_flat_map(size);
                black_box(map)
            });
        });
    }

    group.finish();
}

fn bench_identifier_lookup(c: &mut Criterion) {
    let mut group = c.benchmark_group("identifier_lookup");

    for size in [100, 1000, 10000].iter() {
        let (map, _) = create_flat_map(*size);
        let needle = Locator::new(format!("http://ex/topic/{}", size / 2));

        group.bench_with_input(BenchmarkId::from_parameter(size), size, |b, _| {
            b.iter(|| black_box(map.topic_by_subject_identifier(&needle)));
        });
    }

    group.finish();
}

fn bench_merge(c: &mut Criterion) {
    let mut group = c.benchmark_group("merge");

    for size in [10, 100, 500].iter() {
        group.bench_with_input(BenchmarkId::from_parameter(size), size, |b, &size| {
            b.iter(|| {
                let mut map = TopicMap::new();
                map.set_auto_merge(false);
                let ntype = map.create_topic();
                let survivor = map.create_topic();
                for i in 0..size {
                    let other = map.create_topic();
                    map.add_subject_identifier(
                        other,
                        Locator::new(format!("http://ex/dup/{i}")),
                    )
                    .expect("identifier");
                    map.create_name(other, ntype, &format!("alias {i}"), &[])
                        .expect("name");
                    map.merge_in(survivor, other).expect("merge");
                }
                black_box(map)
            });
        });
    }

    group.finish();
}

fn bench_supertype_closure(c: &mut Criterion) {
    let mut group = c.benchmark_group("supertype_closure");

    for size in [10, 100, 1000].iter() {
        let (map, leaf) = create_chain_map(*size);

        group.bench_with_input(BenchmarkId::from_parameter(size), size, |b, _| {
            b.iter(|| black_box(map.supertypes_closure_of(leaf)));
        });
    }

    group.finish();
}

fn bench_snapshot_roundtrip(c: &mut Criterion) {
    let mut group = c.benchmark_group("snapshot_roundtrip");

    for size in [100, 1000].iter() {
        let (map, _) = create_flat_map(*size);

        group.bench_with_input(BenchmarkId::new("serialize", size), size, |b, _| {
            b.iter(|| black_box(topic_map_to_bytes(&map).expect("serialize")));
        });

        let bytes = topic_map_to_bytes(&map).expect("serialize");
        group.bench_with_input(BenchmarkId::new("deserialize", size), size, |b, _| {
            b.iter(|| black_box(topic_map_from_bytes(&bytes).expect("deserialize")));
        });
    }

    group.finish();
}

criterion_group!(
    benches,
    bench_topic_creation,
    bench_identifier_lookup,
    bench_merge,
    bench_supertype_closure,
    bench_snapshot_roundtrip
);
criterion_main!(benches);
