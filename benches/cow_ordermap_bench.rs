use cow_ordermap::CowOrderMap;
use criterion::{black_box, criterion_group, criterion_main, BatchSize, Criterion};

fn lcg(mut s: u64) -> impl Iterator<Item = u64> {
    std::iter::from_fn(move || {
        s = s.wrapping_mul(6364136223846793005).wrapping_add(1);
        Some(s)
    })
}

fn key(n: u64) -> String {
    format!("k{:016x}", n)
}

fn populated(n: usize) -> CowOrderMap<String, u64> {
    let mut m = CowOrderMap::new();
    for (i, x) in lcg(1).take(n).enumerate() {
        m.insert(key(x), i as u64);
    }
    m
}

fn bench_insert(c: &mut Criterion) {
    c.bench_function("cow_ordermap_insert_10k", |b| {
        b.iter_batched(
            CowOrderMap::<String, u64>::new,
            |mut m| {
                for (i, x) in lcg(1).take(10_000).enumerate() {
                    m.insert(key(x), i as u64);
                }
                black_box(m)
            },
            BatchSize::SmallInput,
        )
    });
}

fn bench_touch_reinsert(c: &mut Criterion) {
    c.bench_function("cow_ordermap_touch_10k", |b| {
        b.iter_batched(
            || populated(10_000),
            |mut m| {
                // Every insert is a touch of a present, non-last key.
                for x in lcg(1).take(10_000) {
                    m.insert(key(x), 0);
                }
                black_box(m)
            },
            BatchSize::SmallInput,
        )
    });
}

fn bench_clone_then_first_write(c: &mut Criterion) {
    c.bench_function("cow_ordermap_cow_first_write_10k", |b| {
        let m = populated(10_000);
        b.iter_batched(
            || m.clone(), // O(1) alias
            |mut copy| {
                // First write pays the deep clone.
                copy.insert(key(u64::MAX), 0);
                black_box(copy)
            },
            BatchSize::SmallInput,
        )
    });
}

fn bench_get_hit(c: &mut Criterion) {
    let m = populated(10_000);
    let keys: Vec<String> = lcg(1).take(10_000).map(key).collect();
    c.bench_function("cow_ordermap_get_hit", |b| {
        let mut i = 0usize;
        b.iter(|| {
            let k = &keys[i % keys.len()];
            i = i.wrapping_add(1);
            black_box(m.get(k.as_str()))
        })
    });
}

criterion_group!(
    benches,
    bench_insert,
    bench_touch_reinsert,
    bench_clone_then_first_write,
    bench_get_hit
);
criterion_main!(benches);
