use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use mean_pool::{Config, WorkerPool};


// Benchmark 1: submit + drain на stop()
fn bench_submit_overhead(c: &mut Criterion) {
    let mut group = c.benchmark_group("submit_overhead");

    for size in [100, 1000, 10000] {
        group.throughput(Throughput::Elements(size as u64));

        group.bench_with_input(
            BenchmarkId::new("submit_then_stop", size),
            &size,
            |b, &size| {
                b.iter(|| {
                    let pool = WorkerPool::with_config(Config::cpu_bound()).unwrap();
                    for i in 0..size {
                        pool.submit(move || black_box(i as f64));
                    }
                    pool.stop();
                    black_box(pool.average())
                });
            },
        );

        // Пул создается один раз, ждем только простоя
        group.bench_with_input(
            BenchmarkId::new("submit_then_wait_idle", size),
            &size,
            |b, &size| {
                let pool = WorkerPool::with_config(Config::cpu_bound()).unwrap();
                b.iter(|| {
                    for i in 0..size {
                        pool.submit(move || black_box(i as f64));
                    }
                    pool.wait_idle();
                    black_box(pool.average())
                });
            },
        );

        // std::thread baseline
        group.bench_with_input(
            BenchmarkId::new("thread_spawn", size),
            &size,
            |b, &size| {
                b.iter(|| {
                    let handles: Vec<_> = (0..size)
                        .map(|i| std::thread::spawn(move || black_box(i as f64)))
                        .collect();
                    let sum: f64 = handles.into_iter().map(|h| h.join().unwrap()).sum();
                    black_box(sum)
                });
            },
        );
    }

    group.finish();
}

// Benchmark 2: масштабирование по числу воркеров
fn bench_thread_scaling(c: &mut Criterion) {
    let mut group = c.benchmark_group("thread_scaling");
    group.sample_size(20);

    const TASKS: usize = 10_000;
    group.throughput(Throughput::Elements(TASKS as u64));

    for workers in [1, 2, 4, 8] {
        group.bench_with_input(
            BenchmarkId::new("workers", workers),
            &workers,
            |b, &workers| {
                let pool = WorkerPool::new(workers).unwrap();
                b.iter(|| {
                    for i in 0..TASKS {
                        pool.submit(move || {
                            // немного CPU-работы на задачу
                            let mut acc = i as f64;
                            for _ in 0..100 {
                                acc = (acc * 1.000_001).sqrt() + 1.0;
                            }
                            black_box(acc)
                        });
                    }
                    pool.wait_idle();
                });
            },
        );
    }

    group.finish();
}

// Benchmark 3: чтение среднего под нагрузкой
fn bench_average_under_load(c: &mut Criterion) {
    let mut group = c.benchmark_group("average_under_load");

    group.bench_function("average_idle", |b| {
        let pool = WorkerPool::new(4).unwrap();
        b.iter(|| black_box(pool.average()));
    });

    group.bench_function("average_with_backlog", |b| {
        let pool = WorkerPool::new(4).unwrap();
        for i in 0..100_000u32 {
            pool.submit(move || f64::from(i));
        }
        b.iter(|| black_box(pool.average()));
    });

    group.finish();
}

criterion_group!(
    benches,
    bench_submit_overhead,
    bench_thread_scaling,
    bench_average_under_load,
);

criterion_main!(benches);
