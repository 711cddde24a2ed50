use criterion::{BenchmarkId, Criterion, black_box, criterion_group, criterion_main};

use docid_core::{IdJsonConverter, IdRegistry, JsonConverter, StronglyTypedId, TypeKey};
use std::sync::Arc;

docid_core::strongly_typed_id! {
    struct BenchId(String);
}

fn registry() -> Arc<IdRegistry> {
    Arc::new(IdRegistry::builder().id::<BenchId>().build())
}

/// Cold lookup (factory creation) vs. warm lookup (cache hit).
fn bench_factory_lookup(c: &mut Criterion) {
    let mut group = c.benchmark_group("factory_lookup");

    group.bench_function("cold", |b| {
        b.iter(|| {
            let registry = registry();
            black_box(registry.factory::<String>(TypeKey::of::<BenchId>()).unwrap());
        });
    });

    let warm = registry();
    warm.factory::<String>(TypeKey::of::<BenchId>()).unwrap();
    group.bench_function("warm", |b| {
        b.iter(|| black_box(warm.factory::<String>(TypeKey::of::<BenchId>()).unwrap()));
    });

    group.finish();
}

/// Erased converter vs. direct serde on the same id.
fn bench_json_conversion(c: &mut Criterion) {
    let mut group = c.benchmark_group("json_conversion");
    let converter = IdJsonConverter::new(registry());

    for len in [8usize, 26, 64] {
        let id = BenchId::from_value("x".repeat(len));

        group.bench_with_input(BenchmarkId::new("converter_write", len), &id, |b, id| {
            b.iter(|| {
                black_box(
                    converter
                        .write_json(Some(id), TypeKey::of::<BenchId>())
                        .unwrap(),
                )
            });
        });

        group.bench_with_input(BenchmarkId::new("serde_write", len), &id, |b, id| {
            b.iter(|| black_box(serde_json::to_value(id).unwrap()));
        });

        let token = serde_json::to_value(&id).unwrap();
        group.bench_with_input(BenchmarkId::new("converter_read", len), &token, |b, token| {
            b.iter(|| {
                black_box(
                    converter
                        .read_json(token, TypeKey::of::<BenchId>())
                        .unwrap(),
                )
            });
        });
    }

    group.finish();
}

criterion_group!(benches, bench_factory_lookup, bench_json_conversion);
criterion_main!(benches);
