//! Route resolution benchmarks for tubevault-core.

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use std::sync::Arc;
use tubevault_core::{HistoryMode, MemoryHistory, QueryPatch, RouteRegistry, Router};

fn bench_resolve(c: &mut Criterion) {
    let registry = RouteRegistry::tubevault();

    let mut group = c.benchmark_group("resolve");
    group.bench_function("root", |b| {
        b.iter(|| registry.resolve(black_box("/"), black_box("")))
    });
    group.bench_function("watch_with_query", |b| {
        b.iter(|| registry.resolve(black_box("/watch/abc123"), black_box("?t=120&tab=chapters")))
    });
    group.bench_function("unknown", |b| {
        b.iter(|| registry.resolve(black_box("/bogus/xyz"), black_box("")))
    });
    group.finish();
}

fn bench_navigate(c: &mut Criterion) {
    let router = Router::new(Arc::new(MemoryHistory::default()));

    c.bench_function("navigate_replace", |b| {
        b.iter(|| {
            router.navigate(
                black_box("/library?sort=title"),
                QueryPatch::new().set("type", "short"),
                HistoryMode::Replace,
            )
        })
    });
}

criterion_group!(benches, bench_resolve, bench_navigate);
criterion_main!(benches);
