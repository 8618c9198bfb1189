use super::{
    errors::{PoolError, PoolResult},
    handle::{
        Task,
        JoinHandle,
        WorkerHandle,
        WorkerState,
        WorkerStatus,
    },
    model::{
        Aggregate,
        PoolMetrics,
    },
};
use std::{
    collections::VecDeque,
    panic::{self, AssertUnwindSafe},
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc, Condvar, Mutex, MutexGuard, PoisonError,
    },
    thread,
};
use crossbeam::sync::WaitGroup;
use tokio::{
    sync::oneshot,
    time::Duration,
};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, trace, warn};


const DEFAULT_THREAD_NAME_PREFIX: &str = "mean-pool-worker";

const ENV_THREADS: &str = "MEAN_POOL_THREADS";
const ENV_THREAD_NAME: &str = "MEAN_POOL_THREAD_NAME";
const ENV_STACK_SIZE: &str = "MEAN_POOL_STACK_SIZE";

/// Конфигурация пула потоков
#[derive(Debug, Clone)]
pub struct Config {
    pub num_threads: usize,
    pub thread_name_prefix: String,
    pub stack_size: Option<usize>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            num_threads: num_cpus::get(),
            thread_name_prefix: DEFAULT_THREAD_NAME_PREFIX.to_string(),
            stack_size: None,
        }
    }
}

impl Config {
    pub fn cpu_bound() -> Self {
        Self::default()
    }

    pub fn io_bound() -> Self {
        Self {
            num_threads: num_cpus::get() * 2, // задачи, которые в основном ждут
            ..Default::default()
        }
    }

    pub fn with_threads(mut self, num_threads: usize) -> Self {
        self.num_threads = num_threads;
        self
    }

    pub fn with_thread_name_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.thread_name_prefix = prefix.into();
        self
    }

    pub fn with_stack_size(mut self, size: usize) -> Self {
        self.stack_size = Some(size);
        self
    }

    /// Читает `MEAN_POOL_THREADS`, `MEAN_POOL_THREAD_NAME`, `MEAN_POOL_STACK_SIZE`
    pub fn from_env() -> PoolResult<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> PoolResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(raw) = lookup(ENV_THREADS) {
            config.num_threads = parse_usize(ENV_THREADS, &raw)?;
        }
        if let Some(prefix) = lookup(ENV_THREAD_NAME) {
            config.thread_name_prefix = prefix;
        }
        if let Some(raw) = lookup(ENV_STACK_SIZE) {
            config.stack_size = Some(parse_usize(ENV_STACK_SIZE, &raw)?);
        }

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> PoolResult<()> {
        if self.num_threads == 0 {
            return Err(PoolError::InvalidWorkerCount);
        }
        if self.thread_name_prefix.is_empty() {
            return Err(PoolError::Config("thread name prefix must not be empty".into()));
        }
        if self.thread_name_prefix.contains('\0') {
            return Err(PoolError::Config("thread name prefix must not contain NUL".into()));
        }
        Ok(())
    }
}

fn parse_usize(key: &str, raw: &str) -> PoolResult<usize> {
    raw.trim()
        .parse()
        .map_err(|err| PoolError::Config(format!("{}={:?}: {}", key, raw, err)))
}


#[inline(always)]
fn unlikely(b: bool) -> bool {
    #[cold]
    fn cold() {}
    if b { cold() }
    b
}

// Все, что меняется под одним локом: очередь, агрегат и флаг остановки
struct State {
    queue: VecDeque<Task>,
    aggregate: Aggregate,
    executing: usize,
    panicked: u64,
    stopping: bool,
}

impl State {
    #[inline]
    fn is_idle(&self) -> bool {
        self.queue.is_empty() && self.executing == 0
    }
}

struct Shared {
    state: Mutex<State>,
    // есть работа или запрошена остановка
    available: Condvar,
    // очередь пуста и ни одна задача не выполняется
    idle: Condvar,
    rejected: AtomicU64,
}

impl Shared {
    fn new() -> Self {
        Self {
            state: Mutex::new(State {
                queue: VecDeque::new(),
                aggregate: Aggregate::default(),
                executing: 0,
                panicked: 0,
                stopping: false,
            }),
            available: Condvar::new(),
            idle: Condvar::new(),
            rejected: AtomicU64::new(0),
        }
    }

    // Задачи никогда не выполняются под локом, поэтому отравление игнорируем
    #[inline]
    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}


/// Пул с фиксированным числом потоков, считающий среднее по результатам задач.
///
/// Задачи берутся из общей FIFO очереди. `stop()` дорабатывает уже поставленные
/// задачи, отклоняет новые и джойнит все потоки. `Drop` вызывает `stop()`.
pub struct WorkerPool {
    shared: Arc<Shared>,
    statuses: Vec<Arc<WorkerStatus>>,
    thread_ids: Vec<thread::ThreadId>,
    handles: Mutex<Vec<WorkerHandle>>,
    config: Config,
}

impl WorkerPool {
    pub fn new(num_threads: usize) -> PoolResult<Self> {
        let config = Config {
            num_threads,
            ..Default::default()
        };
        Self::with_config(config)
    }

    pub fn with_config(config: Config) -> PoolResult<Self> {
        config.validate()?;

        let num_threads = config.num_threads;
        let shared = Arc::new(Shared::new());
        let started = WaitGroup::new();

        let mut statuses = Vec::with_capacity(num_threads);
        let mut thread_ids = Vec::with_capacity(num_threads);
        let mut handles = Vec::with_capacity(num_threads);

        for index in 0..num_threads {
            let status = Arc::new(WorkerStatus::new());
            let mut builder = thread::Builder::new()
                .name(format!("{}-{}", config.thread_name_prefix, index));
            if let Some(size) = config.stack_size {
                builder = builder.stack_size(size);
            }

            let worker_shared = Arc::clone(&shared);
            let worker_status = Arc::clone(&status);
            let worker_started = started.clone();

            let spawned = builder.spawn(move || {
                drop(worker_started);
                worker_loop(index, &worker_shared, &worker_status);
            });

            match spawned {
                Ok(join_handle) => {
                    statuses.push(status);
                    thread_ids.push(join_handle.thread().id());
                    handles.push(WorkerHandle::new(index, join_handle));
                }
                Err(err) => {
                    error!(worker = index, error = %err, "failed to spawn worker thread");
                    // Уже запущенные воркеры останавливаются через Drop
                    drop(Self {
                        shared,
                        statuses,
                        thread_ids,
                        handles: Mutex::new(handles),
                        config,
                    });
                    return Err(PoolError::Spawn(err.to_string()));
                }
            }
        }

        // Все воркеры вошли в цикл ожидания
        started.wait();
        info!(workers = num_threads, "worker pool started");

        Ok(Self {
            shared,
            statuses,
            thread_ids,
            handles: Mutex::new(handles),
            config,
        })
    }

    #[inline(always)]
    fn push_task(&self, task: Task) -> PoolResult<()> {
        {
            let mut state = self.shared.lock();
            if unlikely(state.stopping) {
                drop(state);
                self.shared.rejected.fetch_add(1, Ordering::Relaxed);
                debug!("task rejected: pool is stopping");
                return Err(PoolError::Stopped);
            }
            state.queue.push_back(task);
        }
        self.shared.available.notify_one();
        Ok(())
    }

    /// Ставит задачу в очередь. После `stop()` задача молча отбрасывается
    /// и учитывается в `rejected_tasks`.
    pub fn submit<F>(&self, task: F)
    where
        F: FnOnce() -> f64 + Send + 'static,
    {
        let _ = self.push_task(Box::new(task));
    }

    pub fn try_submit<F>(&self, task: F) -> PoolResult<()>
    where
        F: FnOnce() -> f64 + Send + 'static,
    {
        self.push_task(Box::new(task))
    }

    pub fn submit_with_handle<F>(&self, task: F) -> PoolResult<JoinHandle>
    where
        F: FnOnce() -> f64 + Send + 'static,
    {
        let (tx, rx) = oneshot::channel();
        self.push_task(Box::new(move || {
            let value = task();
            let _ = tx.send(value);
            value
        }))?;
        Ok(JoinHandle::new(rx))
    }

    #[inline]
    pub fn average(&self) -> f64 {
        self.shared.lock().aggregate.average()
    }

    #[inline]
    pub fn aggregate(&self) -> Aggregate {
        self.shared.lock().aggregate
    }

    pub fn metrics(&self) -> PoolMetrics {
        let state = self.shared.lock();
        PoolMetrics {
            workers: self.statuses.len(),
            live_workers: self.live_workers(),
            queued_tasks: state.queue.len(),
            executing_tasks: state.executing,
            completed_tasks: state.aggregate.completed,
            panicked_tasks: state.panicked,
            rejected_tasks: self.shared.rejected.load(Ordering::Relaxed),
            result_sum: state.aggregate.sum,
        }
    }

    pub fn workers(&self) -> usize {
        self.statuses.len()
    }

    pub fn live_workers(&self) -> usize {
        self.statuses
            .iter()
            .filter(|status| status.load() != WorkerState::Terminated)
            .count()
    }

    pub fn worker_states(&self) -> Vec<WorkerState> {
        self.statuses.iter().map(|status| status.load()).collect()
    }

    pub fn is_stopped(&self) -> bool {
        self.shared.lock().stopping
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Ждет, пока очередь опустеет и все задачи завершатся.
    /// Нельзя вызывать из задачи этого же пула.
    pub fn wait_idle(&self) {
        let guard = self.shared.lock();
        let _state = self
            .shared
            .idle
            .wait_while(guard, |state| !state.is_idle())
            .unwrap_or_else(PoisonError::into_inner);
    }

    pub fn wait_idle_timeout(&self, timeout: Duration) -> bool {
        let guard = self.shared.lock();
        let (_state, result) = self
            .shared
            .idle
            .wait_timeout_while(guard, timeout, |state| !state.is_idle())
            .unwrap_or_else(PoisonError::into_inner);
        !result.timed_out()
    }

    /// Останавливает пул: новые задачи отклоняются, очередь дорабатывается,
    /// все потоки джойнятся. Повторный вызов ждет первого и ничего не делает.
    /// Вызов из задачи этого же пула только ставит флаг: джойнит владелец пула.
    pub fn stop(&self) {
        self.request_stop();

        if unlikely(self.is_worker_thread()) {
            warn!("stop() called from a pool task, workers are joined by the pool owner");
            return;
        }
        self.join_workers();
    }

    fn request_stop(&self) {
        let first_call = {
            let mut state = self.shared.lock();
            !std::mem::replace(&mut state.stopping, true)
        };
        if first_call {
            debug!("stop requested, waking all workers");
            self.shared.available.notify_all();
        }
    }

    #[inline]
    fn is_worker_thread(&self) -> bool {
        self.thread_ids.contains(&thread::current().id())
    }

    // Собственный поток не джойнится: он завершится сам после текущей задачи
    fn join_workers(&self) {
        let current = thread::current().id();
        let mut handles = self.handles.lock().unwrap_or_else(PoisonError::into_inner);
        if handles.is_empty() {
            return;
        }

        for handle in handles.drain(..) {
            let index = handle.index;
            if unlikely(handle.thread_id() == current) {
                debug!(worker = index, "pool dropped on its own worker, thread left to exit");
                continue;
            }
            if let Err(err) = handle.join() {
                error!(worker = index, error = %err, "worker thread join failed");
            }
        }

        let aggregate = self.aggregate();
        info!(
            completed = aggregate.completed,
            average = aggregate.average(),
            rejected = self.shared.rejected.load(Ordering::Relaxed),
            "worker pool stopped"
        );
    }

    /// `stop()` на blocking-пуле tokio
    pub async fn stop_async(self: &Arc<Self>) -> PoolResult<()> {
        let pool = Arc::clone(self);
        tokio::task::spawn_blocking(move || pool.stop())
            .await
            .map_err(|err| PoolError::JoinFailed(err.to_string()))
    }

    /// Мониторинг метрик с callback
    /// ВАЖНО: Вызовите token.cancel() для остановки мониторинга и освобождения памяти
    pub fn start_monitoring<F>(self: &Arc<Self>, interval: Duration, callback: F) -> CancellationToken
    where
        F: Fn(PoolMetrics) + Send + 'static,
    {
        let pool = Arc::clone(self);
        let token = CancellationToken::new();
        let token_clone = token.clone();

        tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = tokio::time::sleep(interval) => {
                        callback(pool.metrics());
                    }
                    _ = token_clone.cancelled() => {
                        drop(pool);
                        break;
                    }
                }
            }
        });

        token
    }

    /// Остановить мониторинг и дропнуть все ссылки
    pub fn stop_monitoring(token: CancellationToken) {
        token.cancel();
    }
}

// Последний владелец может оказаться задачей пула: других владельцев уже нет,
// поэтому джойнить остальные воркеры отсюда безопасно
impl Drop for WorkerPool {
    fn drop(&mut self) {
        self.request_stop();
        self.join_workers();
    }
}


fn worker_loop(index: usize, shared: &Shared, status: &WorkerStatus) {
    debug!(worker = index, "worker started");

    loop {
        let task = {
            let guard = shared.lock();
            let mut state = shared
                .available
                .wait_while(guard, |state| state.queue.is_empty() && !state.stopping)
                .unwrap_or_else(PoisonError::into_inner);

            // Пока очередь не пуста, работаем даже после остановки
            match state.queue.pop_front() {
                Some(task) => {
                    state.executing += 1;
                    task
                }
                None => break,
            }
        };

        status.store(WorkerState::Executing);
        let outcome = panic::catch_unwind(AssertUnwindSafe(task));

        {
            let mut state = shared.lock();
            state.executing -= 1;
            match outcome {
                Ok(value) => state.aggregate.record(value),
                Err(_) => state.panicked += 1,
            }
            if state.is_idle() {
                shared.idle.notify_all();
            }
        }

        match outcome {
            Ok(value) => trace!(worker = index, value, "task completed"),
            Err(_) => warn!(worker = index, "task panicked, result discarded"),
        }
        status.store(WorkerState::Waiting);
    }

    status.store(WorkerState::Terminated);
    debug!(worker = index, "worker terminated");
}
