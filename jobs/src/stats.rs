use std::collections::VecDeque;
use std::time::Duration;

/// Snapshot of pool activity.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PoolStats {
    pub total_workers: usize,
    pub busy_workers: usize,
    pub idle_workers: usize,
    /// Jobs waiting for a worker.
    pub queue_length: usize,
    /// Jobs a worker ran to completion, including ones cancelled in flight.
    pub total_processed: u64,
    /// Jobs that faulted or timed out.
    pub total_failed: u64,
    pub total_timed_out: u64,
    pub total_cancelled: u64,
    pub workers_recreated: u64,
    /// Mean execution time over the most recent completions.
    pub average_execution_time: Duration,
}

/// Running counters kept by the supervisor.
pub(crate) struct StatsRecorder {
    window: VecDeque<Duration>,
    window_size: usize,
    pub(crate) processed: u64,
    pub(crate) failed: u64,
    pub(crate) timed_out: u64,
    pub(crate) cancelled: u64,
    pub(crate) recreated: u64,
}

impl StatsRecorder {
    pub(crate) fn new(window_size: usize) -> Self {
        Self {
            window: VecDeque::with_capacity(window_size),
            window_size: window_size.max(1),
            processed: 0,
            failed: 0,
            timed_out: 0,
            cancelled: 0,
            recreated: 0,
        }
    }

    pub(crate) fn record_completion(&mut self, elapsed: Duration) {
        self.processed += 1;
        if self.window.len() == self.window_size {
            self.window.pop_front();
        }
        self.window.push_back(elapsed);
    }

    pub(crate) fn average(&self) -> Duration {
        if self.window.is_empty() {
            return Duration::ZERO;
        }
        self.window.iter().sum::<Duration>() / self.window.len() as u32
    }

    pub(crate) fn fill(&self, stats: &mut PoolStats) {
        stats.total_processed = self.processed;
        stats.total_failed = self.failed;
        stats.total_timed_out = self.timed_out;
        stats.total_cancelled = self.cancelled;
        stats.workers_recreated = self.recreated;
        stats.average_execution_time = self.average();
    }
}
