/// Worker-set sizing policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PoolMode {
    /// Static worker count, fixed at start.
    #[default]
    Fixed,
    /// Grows under load up to a ceiling, shrinks back to the initial
    /// count after sustained idleness.
    Cached,
}

/// Point-in-time counters sampled from a pool.
#[derive(Debug, Clone)]
pub struct PoolMetrics {
    pub current_threads: usize,
    pub idle_threads: usize,
    pub queued_tasks: usize,
    pub submitted_tasks: usize,
    pub completed_tasks: usize,
    pub failed_tasks: usize,
    pub rejected_tasks: usize,
}

impl PoolMetrics {
    /// Fraction of workers currently executing a task.
    pub fn utilization(&self) -> f64 {
        if self.current_threads == 0 {
            return 0.0;
        }
        (self.current_threads - self.idle_threads) as f64 / self.current_threads as f64
    }

    pub fn success_rate(&self) -> f64 {
        let finished = self.completed_tasks + self.failed_tasks;
        if finished == 0 {
            return 1.0;
        }
        self.completed_tasks as f64 / finished as f64
    }
}
