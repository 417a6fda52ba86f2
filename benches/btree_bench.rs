//! B+-tree index benchmarks: bulk insert, range scan and delete.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use tempfile::{tempdir, TempDir};

use bptree_index::{Attribute, IndexConfig, IndexFileHandle, IndexManager, Key, Rid};

fn setup() -> (TempDir, IndexManager, IndexFileHandle) {
    let dir = tempdir().unwrap();
    let path = dir.path().join("bench.idx");
    let manager = IndexManager::new(IndexConfig::default().with_sync_writes(false)).unwrap();
    manager.create_file(&path).unwrap();
    let handle = manager.open_file(&path).unwrap();
    (dir, manager, handle)
}

fn filled(count: i32) -> (TempDir, IndexManager, IndexFileHandle) {
    let (dir, manager, mut handle) = setup();
    let attr = Attribute::int("id");
    for k in 0..count {
        manager
            .insert_entry(&mut handle, &attr, &Key::Int(k), Rid::new(k as u32, 0))
            .unwrap();
    }
    (dir, manager, handle)
}

fn bench_insert(c: &mut Criterion) {
    let mut group = c.benchmark_group("btree_insert");
    let attr = Attribute::int("id");

    for count in [1_000, 10_000] {
        group.throughput(Throughput::Elements(count as u64));
        group.bench_with_input(BenchmarkId::new("sequential", count), &count, |b, &count| {
            b.iter_with_setup(setup, |(dir, manager, mut handle)| {
                for k in 0..count {
                    manager
                        .insert_entry(&mut handle, &attr, &Key::Int(k), Rid::new(0, 0))
                        .unwrap();
                }
                (dir, handle)
            });
        });
        group.bench_with_input(BenchmarkId::new("strided", count), &count, |b, &count| {
            b.iter_with_setup(setup, |(dir, manager, mut handle)| {
                for i in 0..count {
                    let k = (i * 7919) % count;
                    manager
                        .insert_entry(&mut handle, &attr, &Key::Int(k), Rid::new(0, 0))
                        .unwrap();
                }
                (dir, handle)
            });
        });
    }
    group.finish();
}

fn bench_scan(c: &mut Criterion) {
    let mut group = c.benchmark_group("btree_scan");
    let attr = Attribute::int("id");
    let count = 10_000;
    let (_dir, manager, handle) = filled(count);

    group.throughput(Throughput::Elements(count as u64));
    group.bench_function("full", |b| {
        b.iter(|| {
            let cursor = manager.scan(&handle, &attr, None, None, true, true).unwrap();
            black_box(cursor.count())
        });
    });

    let (low, high) = (Key::Int(4_000), Key::Int(4_100));
    group.throughput(Throughput::Elements(100));
    group.bench_function("range_100", |b| {
        b.iter(|| {
            let cursor = manager
                .scan(&handle, &attr, Some(&low), Some(&high), true, false)
                .unwrap();
            black_box(cursor.count())
        });
    });
    group.finish();
}

fn bench_delete(c: &mut Criterion) {
    let mut group = c.benchmark_group("btree_delete");
    let attr = Attribute::int("id");
    let count = 5_000;

    group.throughput(Throughput::Elements(count as u64));
    group.bench_function("all", |b| {
        b.iter_with_setup(
            || filled(count),
            |(dir, manager, mut handle)| {
                for k in 0..count {
                    manager
                        .delete_entry(&mut handle, &attr, &Key::Int(k), Rid::new(k as u32, 0))
                        .unwrap();
                }
                (dir, handle)
            },
        );
    });
    group.finish();
}

criterion_group!(benches, bench_insert, bench_scan, bench_delete);
criterion_main!(benches);
