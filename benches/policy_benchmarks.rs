use criterion::{black_box, criterion_group, criterion_main, Criterion};
use webcache_rs::policy;
use webcache_rs::{Cache, Request};

/// Synthetic zipf-ish trace: a hot head of ids with a long random-ish tail.
fn synthetic_trace(len: usize) -> Vec<Request> {
    (0..len)
        .map(|i| {
            let i = i as u64;
            let id = if i % 10 < 7 { i % 64 } else { (i * 2654435761) % 4096 };
            Request::new(id, 1 + (id * 37) % 4096)
        })
        .collect()
}

fn bench_policies(c: &mut Criterion) {
    let trace = synthetic_trace(100_000);
    let mut group = c.benchmark_group("replay_100k");

    for name in ["LRU", "FIFO", "S4LRU", "SLRU", "TinyLFU", "W_TinyLFU", "AdaptSize"] {
        group.bench_function(name, |b| {
            b.iter(|| {
                let mut cache = policy::create(name).unwrap();
                cache.set_size(256 * 1024);
                let mut hits = 0u64;
                for req in &trace {
                    if cache.lookup(req) {
                        hits += 1;
                    } else {
                        cache.admit(req);
                    }
                }
                black_box(hits)
            })
        });
    }
    group.finish();
}

criterion_group!(benches, bench_policies);
criterion_main!(benches);
