/// Point-in-time snapshot of the pool's counters.
///
/// The counters are independent atomics updated outside the queue lock, so a
/// snapshot is eventually consistent: there are real windows (between a
/// worker leaving the wait state and entering the working state, and vice
/// versa) where `waiting + working != workers`. Treat the values as an
/// approximation for monitoring, never as a hard accounting identity.
#[derive(Debug, Clone, Copy)]
pub struct PoolStatus {
    /// Workers currently parked on the wake signal.
    pub waiting: usize,
    /// Workers currently inside the handler.
    pub working: usize,
    /// Live worker threads.
    pub workers: usize,
    /// Items the handler finished successfully.
    pub completed: usize,
    /// Items that panicked, or returned `false` in the fire-and-forget pool.
    pub failed: usize,
}

impl PoolStatus {
    /// Fraction of live workers currently executing.
    pub fn utilization(&self) -> f64 {
        if self.workers == 0 {
            return 0.0;
        }
        self.working as f64 / self.workers as f64
    }

    pub fn success_rate(&self) -> f64 {
        let total = self.completed + self.failed;
        if total == 0 {
            return 1.0;
        }
        self.completed as f64 / total as f64
    }

    pub fn executed(&self) -> usize {
        self.completed + self.failed
    }
}
