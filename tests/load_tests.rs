#[cfg(test)]
mod tests {
    use mean_pool::pool::{Config, WorkerPool};
    use std::{
        sync::atomic::{AtomicUsize, Ordering},
        time::Instant,
    };

    fn measure<F, T>(name: &str, f: F) -> T
    where
        F: FnOnce() -> T,
    {
        let start = Instant::now();
        let result = f();
        println!("✓ {}: {:?}", name, start.elapsed());
        result
    }

    #[test]
    fn load_test_1_concurrent_submitters() {
        println!("\n=== LOAD TEST 1: 10k задач из 8 потоков в 4 воркера ===");
        let pool = WorkerPool::new(4).unwrap();

        measure("8 x 1250 submits", || {
            crossbeam::scope(|s| {
                for _ in 0..8 {
                    s.spawn(|_| {
                        for _ in 0..1_250 {
                            pool.submit(|| 1.0);
                        }
                    });
                }
            })
            .unwrap();
            pool.stop();
        });

        let metrics = pool.metrics();
        assert_eq!(metrics.completed_tasks, 10_000);
        assert_eq!(pool.average(), 1.0);
        assert_eq!(metrics.rejected_tasks, 0);
        assert_eq!(metrics.panicked_tasks, 0);
    }

    #[test]
    fn load_test_2_large_sequence() {
        println!("\n=== LOAD TEST 2: 0..=100_000 ===");
        let pool = WorkerPool::with_config(Config::cpu_bound()).unwrap();

        measure("100k submits", || {
            for i in 0..=100_000u32 {
                pool.submit(move || f64::from(i));
            }
            pool.stop();
        });

        assert_eq!(pool.aggregate().completed, 100_001);
        assert!((pool.average() - 50_000.0).abs() < 1e-6);
    }

    #[test]
    fn load_test_3_average_reads_while_running() {
        println!("\n=== LOAD TEST 3: чтение среднего во время работы ===");
        let pool = WorkerPool::new(4).unwrap();

        crossbeam::scope(|s| {
            s.spawn(|_| {
                for i in 0..20_000u32 {
                    pool.submit(move || f64::from(i % 10));
                }
            });

            s.spawn(|_| {
                let mut last_completed = 0;
                for _ in 0..2_000 {
                    let metrics = pool.metrics();
                    let average = metrics.average();
                    // Согласованный снимок: среднее всегда внутри диапазона результатов
                    assert!((0.0..=9.0).contains(&average), "average = {}", average);
                    assert!(metrics.completed_tasks >= last_completed);
                    last_completed = metrics.completed_tasks;
                }
            });
        })
        .unwrap();

        pool.stop();
        assert_eq!(pool.aggregate().completed, 20_000);
        assert!((pool.average() - 4.5).abs() < 1e-9);
    }

    #[test]
    fn load_test_4_stop_races_with_submitters() {
        println!("\n=== LOAD TEST 4: stop() во время отправки ===");
        let pool = WorkerPool::new(4).unwrap();
        let accepted = AtomicUsize::new(0);
        let executed = std::sync::Arc::new(AtomicUsize::new(0));

        crossbeam::scope(|s| {
            for _ in 0..4 {
                s.spawn(|_| {
                    for _ in 0..5_000 {
                        let executed = executed.clone();
                        let result = pool.try_submit(move || {
                            executed.fetch_add(1, Ordering::SeqCst);
                            1.0
                        });
                        if result.is_ok() {
                            accepted.fetch_add(1, Ordering::SeqCst);
                        }
                    }
                });
            }

            s.spawn(|_| {
                std::thread::sleep(std::time::Duration::from_millis(1));
                pool.stop();
            });
        })
        .unwrap();

        pool.stop();

        // Принятые задачи выполнены все, отклоненные ни разу
        let accepted = accepted.load(Ordering::SeqCst);
        let metrics = pool.metrics();
        assert_eq!(executed.load(Ordering::SeqCst), accepted);
        assert_eq!(metrics.completed_tasks as usize, accepted);
        assert_eq!(metrics.rejected_tasks, (20_000 - accepted) as u64);
        println!("  принято: {}, отклонено: {}", accepted, metrics.rejected_tasks);
    }
}
