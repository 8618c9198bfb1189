use thiserror::Error;

pub type PoolResult<T> = Result<T, PoolError>;

#[derive(Debug, Error, PartialEq, Eq, Clone)]
pub enum PoolError {
    #[error("worker count must be positive")]
    InvalidWorkerCount,

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("failed to spawn worker thread: {0}")]
    Spawn(String),

    /// Задача отклонена: пул уже останавливается
    #[error("pool is stopped, task rejected")]
    Stopped,

    #[error("result channel closed before the task produced a value")]
    ChannelClosed,

    #[error("timed out waiting for task result")]
    Timeout,

    #[error("join failed: {0}")]
    JoinFailed(String),
}
