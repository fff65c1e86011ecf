//! Benchmarks for per-row value resolution, the hot path of a run.
//!
//! Measures values-per-second for `resolve_column` with cached generators,
//! and the cost of the unique modifier as the seen-set grows.

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use std::sync::Arc;

use anonkit_core::config::ColumnSpec;
use anonkit_core::formatter::{resolve_column, ColumnFormatter};
use anonkit_core::generate::builtin::FormatterRegistry;
use anonkit_core::generate::cache::GeneratorCache;
use anonkit_core::generate::locale::Locale;
use anonkit_core::generate::provider::ProviderRegistry;
use anonkit_core::generate::value::Value;

fn cache(locale: Locale) -> GeneratorCache {
    GeneratorCache::new(locale, Some(42), Arc::new(ProviderRegistry::with_defaults().unwrap()))
}

fn bench_formatters(c: &mut Criterion) {
    let mut group = c.benchmark_group("resolve/formatter");
    let rows = 10_000u64;
    group.throughput(Throughput::Elements(rows));

    let specs = [
        ("firstName", ColumnSpec::new(ColumnFormatter::method("firstName", vec![]))),
        ("safeEmail", ColumnSpec::new(ColumnFormatter::method("safeEmail", vec![]))),
        ("streetAddress", ColumnSpec::new(ColumnFormatter::method("streetAddress", vec![]))),
        (
            "numberBetween",
            ColumnSpec::new(ColumnFormatter::method(
                "numberBetween",
                vec![Value::Int(1), Value::Int(1_000_000)],
            )),
        ),
        (
            "dateTimeBetween",
            ColumnSpec::new(ColumnFormatter::method(
                "dateTimeBetween",
                vec![Value::from("-30 years"), Value::from("now")],
            )),
        ),
        ("fixed", ColumnSpec::new(ColumnFormatter::fixed(""))),
    ];

    for (name, spec) in &specs {
        group.bench_with_input(BenchmarkId::from_parameter(name), spec, |b, spec| {
            let mut cache = cache(Locale::EnUs);
            b.iter(|| {
                for _ in 0..rows {
                    resolve_column("bench", "col", spec, &mut cache).unwrap();
                }
            });
        });
    }
    group.finish();
}

fn bench_unique(c: &mut Criterion) {
    let mut group = c.benchmark_group("resolve/unique");
    for rows in [1_000u64, 10_000] {
        group.throughput(Throughput::Elements(rows));
        group.bench_with_input(BenchmarkId::new("safeEmail", rows), &rows, |b, &rows| {
            let mut spec = ColumnSpec::new(ColumnFormatter::method("safeEmail", vec![]));
            spec.unique = true;
            b.iter(|| {
                // Fresh cache per iteration so the seen-set starts empty.
                let mut cache = cache(Locale::EnUs);
                for _ in 0..rows {
                    resolve_column("bench", "email", &spec, &mut cache).unwrap();
                }
            });
        });
    }
    group.finish();
}

fn bench_registry_build(c: &mut Criterion) {
    let mut group = c.benchmark_group("resolve/registry");
    for locale in [Locale::EnUs, Locale::JaJp] {
        group.bench_with_input(BenchmarkId::from_parameter(locale), &locale, |b, &locale| {
            b.iter(|| FormatterRegistry::new(locale));
        });
    }
    group.finish();
}

criterion_group!(benches, bench_formatters, bench_unique, bench_registry_build);
criterion_main!(benches);
