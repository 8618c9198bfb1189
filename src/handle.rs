use super::errors::{PoolError, PoolResult};
use std::{
    future::Future,
    pin::Pin,
    sync::atomic::{AtomicU8, Ordering},
    task::{Context, Poll},
    thread,
};
use futures::stream::{FuturesUnordered, StreamExt};
use tokio::{
    sync::oneshot,
    time::Duration,
};


pub type Task = Box<dyn FnOnce() -> f64 + Send + 'static>;

/// Состояние воркера. Из `Terminated` возврата нет.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerState {
    Waiting,
    Executing,
    Terminated,
}

/// Атомарная ячейка с состоянием воркера, читается без лока пула
#[derive(Debug)]
pub(crate) struct WorkerStatus(AtomicU8);

impl WorkerStatus {
    const WAITING: u8 = 0;
    const EXECUTING: u8 = 1;
    const TERMINATED: u8 = 2;

    pub(crate) fn new() -> Self {
        Self(AtomicU8::new(Self::WAITING))
    }

    #[inline]
    pub(crate) fn load(&self) -> WorkerState {
        match self.0.load(Ordering::Acquire) {
            Self::WAITING => WorkerState::Waiting,
            Self::EXECUTING => WorkerState::Executing,
            _ => WorkerState::Terminated,
        }
    }

    #[inline]
    pub(crate) fn store(&self, state: WorkerState) {
        let raw = match state {
            WorkerState::Waiting => Self::WAITING,
            WorkerState::Executing => Self::EXECUTING,
            WorkerState::Terminated => Self::TERMINATED,
        };
        self.0.store(raw, Ordering::Release);
    }
}


/// Поток воркера, принадлежит пулу и джойнится ровно один раз
pub(crate) struct WorkerHandle {
    pub(crate) index: usize,
    thread: thread::JoinHandle<()>,
}

impl WorkerHandle {
    pub(crate) fn new(index: usize, thread: thread::JoinHandle<()>) -> Self {
        Self { index, thread }
    }

    #[inline]
    pub(crate) fn thread_id(&self) -> thread::ThreadId {
        self.thread.thread().id()
    }

    pub(crate) fn join(self) -> PoolResult<()> {
        self.thread
            .join()
            .map_err(|panic_info| PoolError::JoinFailed(format!("{:?}", panic_info)))
    }
}


/// Handle на результат отдельной задачи.
/// Результат при этом все равно попадает в агрегат пула.
#[derive(Debug)]
pub struct JoinHandle {
    receiver: oneshot::Receiver<f64>,
}

impl JoinHandle {

    pub(crate) fn new(receiver: oneshot::Receiver<f64>) -> Self {
        Self { receiver }
    }

    /// Синхронное ожидание. Нельзя вызывать внутри async-контекста tokio.
    pub fn blocking_wait(self) -> PoolResult<f64> {
        self.receiver
            .blocking_recv()
            .map_err(|_| PoolError::ChannelClosed)
    }

    /// Таймаут только на ожидание: сама задача продолжает выполняться
    pub async fn await_timeout(self, timeout: Duration) -> PoolResult<f64> {
        match tokio::time::timeout(timeout, self.receiver).await {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(_)) => Err(PoolError::ChannelClosed),
            Err(_) => Err(PoolError::Timeout),
        }
    }
}

impl Future for JoinHandle {
    type Output = PoolResult<f64>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let this = self.get_mut();
        match Pin::new(&mut this.receiver).poll(cx) {
            Poll::Ready(res) => Poll::Ready(res.map_err(|_| PoolError::ChannelClosed)),
            Poll::Pending => Poll::Pending,
        }
    }
}

/// Ожидание набора handles, результаты в порядке завершения
pub async fn join_all(handles: Vec<JoinHandle>) -> Vec<PoolResult<f64>> {
    if handles.is_empty() {
        return Vec::new();
    }

    let len = handles.len();
    let mut futures = FuturesUnordered::from_iter(handles);
    let mut results = Vec::with_capacity(len);

    while let Some(result) = futures.next().await {
        results.push(result);
    }

    results
}
