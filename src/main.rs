use mean_pool::{Config, WorkerPool};
use std::time::Instant;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};


fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "mean_pool=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let mut config = Config::from_env()?;
    if std::env::var_os("MEAN_POOL_THREADS").is_none() {
        config = config.with_threads(4);
    }
    let pool = WorkerPool::with_config(config)?;

    let now = Instant::now();
    for i in 0..=1_000_000u32 {
        pool.submit(move || f64::from(i));
    }

    // Первое значение зависит от того, сколько задач уже успели выполниться
    println!("Average: {}", pool.average());
    pool.stop();
    println!("Average: {}", pool.average());
    println!("elapsed: {:?}", now.elapsed());

    Ok(())
}
