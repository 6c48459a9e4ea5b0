//! # Consistency Layer Benchmarks
//!
//! | Path | Target |
//! |------|--------|
//! | Topic pattern match | < 1µs |
//! | Cache key glob match | < 1µs |
//! | Cache hit through `get_or_load` | < 10µs |
//! | Prefix invalidation of 1k list keys | < 5ms |

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use shared_bus::RoutingPattern;
use shared_cache::{
    glob_match, CacheStore, InMemoryCacheStore, InvalidationCoordinator, InvalidationScope,
    ReadThroughCache,
};
use std::sync::Arc;
use std::time::Duration;

fn bench_routing(c: &mut Criterion) {
    let mut group = c.benchmark_group("routing");
    let patterns = ["post.deleted", "post.*", "#", "post.#.archived"];
    for pattern in patterns {
        let compiled = RoutingPattern::new(pattern);
        group.bench_with_input(BenchmarkId::new("matches", pattern), &compiled, |b, p| {
            b.iter(|| black_box(p.matches(black_box("post.deleted"))))
        });
    }
    group.finish();
}

fn bench_glob(c: &mut Criterion) {
    c.bench_function("cache/glob_posts_prefix", |b| {
        b.iter(|| black_box(glob_match(black_box("posts:*"), black_box("posts:12:100"))))
    });
}

fn bench_cache(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().expect("tokio runtime");
    let store = Arc::new(InMemoryCacheStore::new());
    let cache = ReadThroughCache::new(store.clone());
    rt.block_on(async {
        store
            .set_ex("post:p1", r#"{"id":"p1"}"#.to_string(), Duration::from_secs(3600))
            .await
            .expect("seed");
    });

    c.bench_function("cache/get_or_load_hit", |b| {
        b.to_async(&rt).iter(|| async {
            let cached = cache
                .get_or_load("post:p1", Duration::from_secs(3600), || async {
                    Ok::<_, shared_cache::CacheError>(serde_json::Value::Null)
                })
                .await
                .expect("hit");
            black_box(cached)
        })
    });

    let coordinator = InvalidationCoordinator::new(store.clone());
    let scope = InvalidationScope::new().pattern("posts:*");
    c.bench_function("cache/invalidate_1k_lists", |b| {
        b.to_async(&rt).iter(|| async {
            for page in 0..1000 {
                store
                    .set_ex(&format!("posts:{page}:10"), "[]".to_string(), Duration::from_secs(300))
                    .await
                    .expect("seed");
            }
            black_box(coordinator.invalidate(&scope).await)
        })
    });
}

criterion_group!(benches, bench_routing, bench_glob, bench_cache);
criterion_main!(benches);
