use std::sync::Arc;

use criterion::{BatchSize, Criterion, Throughput, criterion_group, criterion_main};
use rand::Rng;
use synckit::cache::LfuCache;

fn bench_lfu_insert_get(c: &mut Criterion) {
    let mut group = c.benchmark_group("lfu");
    let ops_per_iter = 1024u64 * 2;
    group.throughput(Throughput::Elements(ops_per_iter));
    group.bench_function("insert_get", |b| {
        b.iter_batched(
            || {
                let cache = LfuCache::new(1024);
                for i in 0..1024u64 {
                    cache.put(i, i);
                }
                cache
            },
            |cache| {
                for i in 0..1024u64 {
                    cache.put(std::hint::black_box(i + 10_000), i);
                    let _ = std::hint::black_box(cache.get(&std::hint::black_box(i)));
                }
            },
            BatchSize::SmallInput,
        )
    });
    group.finish();
}

fn bench_lfu_skewed_gets(c: &mut Criterion) {
    let mut group = c.benchmark_group("lfu");
    let ops_per_iter = 4096u64;
    group.throughput(Throughput::Elements(ops_per_iter));
    group.bench_function("skewed_gets", |b| {
        b.iter_batched(
            || {
                let cache = LfuCache::new(512);
                for i in 0..512u64 {
                    cache.put_arc(i, Arc::new(i));
                }
                let mut rng = rand::rng();
                // a small hot set plus a uniform cold tail
                let keys: Vec<u64> = (0..ops_per_iter)
                    .map(|_| {
                        if rng.random_range(0..10) < 8 {
                            rng.random_range(0..32)
                        } else {
                            rng.random_range(0..1024)
                        }
                    })
                    .collect();
                (cache, keys)
            },
            |(cache, keys)| {
                for key in &keys {
                    let _ = std::hint::black_box(cache.get(key));
                }
            },
            BatchSize::SmallInput,
        )
    });
    group.finish();
}

fn bench_lfu_eviction_pressure(c: &mut Criterion) {
    let mut group = c.benchmark_group("lfu");
    let ops_per_iter = 2048u64;
    group.throughput(Throughput::Elements(ops_per_iter));
    group.bench_function("eviction_pressure", |b| {
        b.iter_batched(
            || LfuCache::new(256),
            |cache| {
                for i in 0..ops_per_iter {
                    cache.put(std::hint::black_box(i), i);
                }
            },
            BatchSize::SmallInput,
        )
    });
    group.finish();
}

criterion_group!(
    benches,
    bench_lfu_insert_get,
    bench_lfu_skewed_gets,
    bench_lfu_eviction_pressure
);
criterion_main!(benches);
