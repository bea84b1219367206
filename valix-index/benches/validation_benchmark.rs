use criterion::{BatchSize, Criterion, criterion_group, criterion_main};
use std::hint::black_box;

use valix_index::{DependencyIndex, DependencyKind};
use valix_types::Value;

const PAIR_COUNT: i64 = 10_000;

fn benchmark_od_inserts(c: &mut Criterion) {
    let pairs: Vec<(Vec<Value>, Vec<Value>)> = (0..PAIR_COUNT)
        .map(|i| (vec![Value::Int64(i)], vec![Value::Int64(i * 10)]))
        .collect();

    c.bench_function("od insert 10k ordered pairs", |b| {
        b.iter_batched(
            DependencyIndex::empty,
            |mut index| {
                for (lhs, rhs) in &pairs {
                    index.insert_entry(lhs, rhs, DependencyKind::Od);
                }
                black_box(index.violation_count())
            },
            BatchSize::SmallInput,
        );
    });
}

fn benchmark_fd_duplicate_heavy(c: &mut Criterion) {
    // 100 distinct LHS keys, heavy duplication, occasional violations.
    let pairs: Vec<(Vec<Value>, Vec<Value>)> = (0..PAIR_COUNT)
        .map(|i| (vec![Value::Int64(i % 100)], vec![Value::Int64(i % 300)]))
        .collect();

    c.bench_function("fd insert 10k duplicate-heavy pairs", |b| {
        b.iter_batched(
            DependencyIndex::empty,
            |mut index| {
                for (lhs, rhs) in &pairs {
                    index.insert_entry(lhs, rhs, DependencyKind::Fd);
                }
                black_box(index.violation_count())
            },
            BatchSize::SmallInput,
        );
    });
}

criterion_group!(benches, benchmark_od_inserts, benchmark_fd_duplicate_heavy);
criterion_main!(benches);
