use criterion::{black_box, criterion_group, criterion_main, BatchSize, BenchmarkId, Criterion};
use hazard_sort::{ConcurrentStack, HazardRegistry, IdlePolicy, Sorter, SorterConfig};
use std::thread;

fn scrambled(len: usize) -> Vec<u64> {
    let mut state = 0x2545_F491_4F6C_DD1D_u64;
    (0..len)
        .map(|_| {
            state ^= state << 13;
            state ^= state >> 7;
            state ^= state << 17;
            state
        })
        .collect()
}

fn bench_sort(c: &mut Criterion) {
    let mut group = c.benchmark_group("sort");

    for len in [1_000usize, 10_000, 50_000] {
        let input = scrambled(len);

        for idle in [IdlePolicy::Yield, IdlePolicy::Snooze] {
            let sorter = Sorter::new(SorterConfig::default().with_idle(idle));
            group.bench_with_input(
                BenchmarkId::new(format!("hazard_sort_{idle:?}"), len),
                &input,
                |b, input| {
                    b.iter_batched(
                        || input.clone(),
                        |data| black_box(sorter.sort(data).unwrap()),
                        BatchSize::LargeInput,
                    )
                },
            );
        }

        let helpers_only = Sorter::new(SorterConfig::default().with_max_workers(0));
        group.bench_with_input(BenchmarkId::new("hazard_sort_no_workers", len), &input, |b, input| {
            b.iter_batched(
                || input.clone(),
                |data| black_box(helpers_only.sort(data).unwrap()),
                BatchSize::LargeInput,
            )
        });

        group.bench_with_input(BenchmarkId::new("std_sort_unstable", len), &input, |b, input| {
            b.iter_batched(
                || input.clone(),
                |mut data| {
                    data.sort_unstable();
                    black_box(data)
                },
                BatchSize::LargeInput,
            )
        });

        #[cfg(feature = "parallel")]
        group.bench_with_input(BenchmarkId::new("rayon_par_sort_unstable", len), &input, |b, input| {
            use rayon::slice::ParallelSliceMut;
            b.iter_batched(
                || input.clone(),
                |mut data| {
                    data.par_sort_unstable();
                    black_box(data)
                },
                BatchSize::LargeInput,
            )
        });
    }

    group.finish();
}

fn bench_stack(c: &mut Criterion) {
    let mut group = c.benchmark_group("concurrent_stack");
    const ITEMS: usize = 10_000;

    group.bench_function("push_pop_single_thread", |b| {
        let stack = ConcurrentStack::new(HazardRegistry::with_capacity(1));
        b.iter(|| {
            for i in 0..ITEMS {
                stack.push(i);
            }
            while let Some(v) = stack.pop().unwrap() {
                black_box(v);
            }
        });
        stack.registry().release_current_thread();
    });

    group.bench_function("push_pop_four_threads", |b| {
        let stack = ConcurrentStack::new(HazardRegistry::with_capacity(4));
        b.iter(|| {
            let stack = &stack;
            thread::scope(|s| {
                for _ in 0..4 {
                    s.spawn(move || {
                        for i in 0..ITEMS / 4 {
                            stack.push(i);
                            black_box(stack.pop().unwrap());
                        }
                        stack.registry().release_current_thread();
                    });
                }
            });
        });
    });

    group.finish();
}

criterion_group!(benches, bench_sort, bench_stack);
criterion_main!(benches);
