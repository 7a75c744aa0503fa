use criterion::{black_box, criterion_group, criterion_main, Criterion, Throughput};
use peercache::{BoxError, ByteView, Group, HashRing, LruCache};

fn load(key: &str) -> Result<Vec<u8>, BoxError> {
    Ok(vec![b'x'; 1024 + key.len()])
}

fn bench_cached_get(c: &mut Criterion) {
    let mut group = c.benchmark_group("cached_get");
    group.sample_size(50);
    group.throughput(Throughput::Elements(1));

    group.bench_function("get_1kb_cached", |b| {
        let cache = Group::new("bench", 1 << 20, load);
        let keys: Vec<String> = (0..100).map(|i| format!("key-{i}")).collect();

        // Warm the cache
        for key in &keys {
            cache.get(key).unwrap();
        }

        let mut counter = 0;
        b.iter(|| {
            black_box(cache.get(&keys[counter % 100]).unwrap());
            counter += 1;
        });
    });

    group.finish();
}

fn bench_cache_miss(c: &mut Criterion) {
    let mut group = c.benchmark_group("cache_miss");
    group.sample_size(50);
    group.throughput(Throughput::Elements(1));

    group.bench_function("get_1kb_miss", |b| {
        // Room for ~10 values
        let cache = Group::new("bench", 10 * 1040, load);
        let keys: Vec<String> = (0..100).map(|i| format!("key-{i}")).collect();

        let mut counter = 0;
        b.iter(|| {
            // Cycling through more keys than fit guarantees misses
            black_box(cache.get(&keys[counter % 100]).unwrap());
            counter += 1;
        });
    });

    group.finish();
}

fn bench_lru_add(c: &mut Criterion) {
    let mut group = c.benchmark_group("lru");
    group.throughput(Throughput::Elements(1));

    group.bench_function("add_with_eviction", |b| {
        let mut lru = LruCache::new(64 << 10);
        let value = ByteView::from(vec![b'x'; 256]);

        let mut counter = 0u64;
        b.iter(|| {
            lru.add(format!("key-{counter}"), value.clone());
            counter += 1;
        });
    });

    group.finish();
}

fn bench_ring_get(c: &mut Criterion) {
    let mut group = c.benchmark_group("ring");
    group.throughput(Throughput::Elements(1));

    group.bench_function("get_8_nodes", |b| {
        let mut ring = HashRing::new(50);
        let nodes: Vec<String> = (0..8).map(|i| format!("http://10.0.0.{i}:8001")).collect();
        ring.add(&nodes);

        let mut counter = 0u64;
        b.iter(|| {
            black_box(ring.get(&format!("key-{counter}")));
            counter += 1;
        });
    });

    group.finish();
}

criterion_group!(
    benches,
    bench_cached_get,
    bench_cache_miss,
    bench_lru_add,
    bench_ring_get
);
criterion_main!(benches);
