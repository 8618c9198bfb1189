/// Агрегат завершенных задач: количество и сумма результатов.
/// Обновляется только воркерами под общим локом пула, поэтому пара всегда согласована.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Aggregate {
    pub completed: u64,
    pub sum: f64,
}

impl Aggregate {
    #[inline]
    pub(crate) fn record(&mut self, value: f64) {
        self.completed += 1;
        self.sum += value;
    }

    /// Среднее арифметическое; `0.0` пока нет ни одной завершенной задачи
    #[inline]
    pub fn average(&self) -> f64 {
        if self.completed == 0 {
            return 0.0;
        }
        self.sum / self.completed as f64
    }
}


#[derive(Debug, Clone)]
pub struct PoolMetrics {
    pub workers: usize,
    pub live_workers: usize,
    pub queued_tasks: usize,
    pub executing_tasks: usize,
    pub completed_tasks: u64,
    pub panicked_tasks: u64,
    pub rejected_tasks: u64,
    pub result_sum: f64,
}

impl PoolMetrics {
    pub fn average(&self) -> f64 {
        Aggregate {
            completed: self.completed_tasks,
            sum: self.result_sum,
        }
        .average()
    }

    pub fn utilization(&self) -> f64 {
        if self.live_workers == 0 {
            return 0.0;
        }
        self.executing_tasks as f64 / self.live_workers as f64
    }

    pub fn success_rate(&self) -> f64 {
        let total = self.completed_tasks + self.panicked_tasks;
        if total == 0 {
            return 1.0;
        }
        self.completed_tasks as f64 / total as f64
    }
}
