//! Пул потоков фиксированного размера со средним по результатам задач
//! 
//! # Features
//! - Общая FIFO очередь, мьютекс и condvar с проверкой предиката
//! - Согласованный агрегат (количество + сумма) под одним локом
//! - Остановка с дообработкой очереди, идемпотентный `stop()`
//! - Handles на результат отдельной задачи (sync и async ожидание)
//! - Метрики и мониторинг
//! - Конфигурация через `Config` и переменные окружения

pub mod errors;
pub mod handle;
pub mod model;
pub mod pool;

pub use errors::{PoolError, PoolResult};
pub use handle::{join_all, JoinHandle, WorkerState};
pub use model::{Aggregate, PoolMetrics};
pub use pool::{Config, WorkerPool};
