//! Compilation, generation and shrinking throughput

use criterion::{BenchmarkId, Criterion, black_box, criterion_group, criterion_main};
use regen::{Flags, ParallelConfig, Pattern, generate_batch};

const PATTERNS: &[(&str, &str)] = &[
    ("literal", "hello world"),
    (
        "uuid",
        "[0-9a-f]{8}-[0-9a-f]{4}-[0-5][0-9a-f]{3}-[089ab][0-9a-f]{3}-[0-9a-f]{12}",
    ),
    ("email", "[a-z0-9._%+-]+@[a-z0-9.-]+\\.[a-z]{2,6}"),
    ("negated", "[^\\s]{8,32}"),
    ("backref", "(?<q>['\"])[^'\"]*\\k<q>"),
];

fn compile(source: &str) -> Pattern {
    Pattern::compile(source, Flags::NONE).unwrap()
}

/// Benchmark pattern compilation
fn bench_compile(c: &mut Criterion) {
    let mut group = c.benchmark_group("compile");
    for &(name, source) in PATTERNS {
        group.bench_with_input(BenchmarkId::from_parameter(name), source, |b, source| {
            b.iter(|| Pattern::compile(black_box(source), Flags::NONE))
        });
    }
    group.finish();
}

/// Benchmark generation at several length targets
fn bench_generate(c: &mut Criterion) {
    let mut group = c.benchmark_group("generate_sized");
    for &(name, source) in PATTERNS {
        let pattern = compile(source);
        for target in [16, 256] {
            group.bench_with_input(BenchmarkId::new(name, target), &target, |b, &target| {
                let mut seed = 0i64;
                b.iter(|| {
                    seed = seed.wrapping_add(1);
                    pattern.generate_sized(black_box(seed), target)
                })
            });
        }
    }
    group.finish();
}

fn bench_shrink(c: &mut Criterion) {
    let pattern = compile("[a-zA-Z0-9]{4,}");
    let failing = pattern.generate_sized(99, 500).unwrap();
    c.bench_function("shrink/alphanumeric", |b| {
        b.iter(|| pattern.shrink(99, black_box(&failing)).count())
    });
}

/// Compare sequential and parallel batches
fn bench_batch(c: &mut Criterion) {
    let pattern = compile("[a-z]+@[a-z]+\\.(com|org|net)");
    let seeds: Vec<i64> = (0..4096).collect();
    let mut group = c.benchmark_group("batch");
    group.bench_function("sequential", |b| {
        let config = ParallelConfig::sequential();
        b.iter(|| generate_batch(&pattern, black_box(&seeds), Some(64), &config))
    });
    group.bench_function("parallel", |b| {
        let config = ParallelConfig::default();
        b.iter(|| generate_batch(&pattern, black_box(&seeds), Some(64), &config))
    });
    group.finish();
}

criterion_group!(benches, bench_compile, bench_generate, bench_shrink, bench_batch);
criterion_main!(benches);
