use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::mpsc::{self, RecvTimeoutError};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use stonecut_core::compute::{CancellationToken, Priority};
use stonecut_core::mesh::{MeshBuffers, build_slab};
use stonecut_core::slab::SlabParams;

use crate::config::PoolConfig;
use crate::error::{JobError, PoolError};
use crate::handle::{JobHandle, JobId, JobSlot};
use crate::queue::JobQueue;
use crate::stats::{PoolStats, StatsRecorder};
use crate::worker::{Handler, PoolEvent, Worker};

/// Per-submission options.
#[derive(Debug, Clone, Default)]
pub struct JobOptions {
    pub priority: Priority,
    /// Overrides [`PoolConfig::default_timeout_ms`].
    pub timeout: Option<Duration>,
    pub cancellation: Option<CancellationToken>,
}

impl JobOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_priority(mut self, priority: Priority) -> Self {
        self.priority = priority;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancellation = Some(token);
        self
    }
}

struct QueuedJob<I, O> {
    id: JobId,
    input: I,
    timeout: Duration,
    token: Option<CancellationToken>,
    slot: Arc<JobSlot<O>>,
}

impl<I, O> QueuedJob<I, O> {
    fn is_cancelled(&self) -> bool {
        self.token.as_ref().is_some_and(CancellationToken::is_cancelled)
    }
}

struct RunningJob<O> {
    id: JobId,
    timeout: Duration,
    started: Instant,
    slot: Arc<JobSlot<O>>,
}

impl<O> RunningJob<O> {
    fn deadline(&self) -> Instant {
        self.started + self.timeout
    }
}

struct WorkerEntry<I, O> {
    worker: Worker<I>,
    running: Option<RunningJob<O>>,
}

/// Everything the supervisor and the submitting threads share.
struct PoolState<I, O> {
    config: PoolConfig,
    handler: Handler<I, O>,
    events: mpsc::Sender<PoolEvent<O>>,
    queue: JobQueue<QueuedJob<I, O>>,
    workers: Vec<WorkerEntry<I, O>>,
    stats: StatsRecorder,
    next_worker_id: u64,
    shutting_down: bool,
}

impl<I, O> PoolState<I, O> {
    fn snapshot(&self) -> PoolStats {
        let busy = self.workers.iter().filter(|e| e.running.is_some()).count();
        let mut stats = PoolStats {
            total_workers: self.workers.len(),
            busy_workers: busy,
            idle_workers: self.workers.len() - busy,
            queue_length: self.queue.len(),
            ..Default::default()
        };
        self.stats.fill(&mut stats);
        stats
    }

    fn next_deadline(&self) -> Option<Instant> {
        self.workers
            .iter()
            .filter_map(|e| e.running.as_ref().map(RunningJob::deadline))
            .min()
    }

    fn position(&self, worker: u64) -> Option<usize> {
        self.workers.iter().position(|e| e.worker.id == worker)
    }

    /// Fails every waiting and running job with [`JobError::Shutdown`].
    /// Running jobs stay recorded so their workers are known to be busy.
    fn reject_all(&mut self) {
        for job in self.queue.drain() {
            job.slot.resolve(Err(JobError::Shutdown));
        }
        for job in self.workers.iter().filter_map(|e| e.running.as_ref()) {
            job.slot.resolve(Err(JobError::Shutdown));
        }
    }

    /// Drops queued jobs whose token fired. Their handles already resolved.
    fn purge_cancelled(&mut self) {
        let purged = self.queue.drain_where(QueuedJob::is_cancelled);
        for job in &purged {
            job.slot.resolve(Err(JobError::Cancelled { id: job.id }));
            log::debug!("Dropped cancelled job {} from the queue", job.id);
        }
        self.stats.cancelled += purged.len() as u64;
    }
}

impl<I: Send + 'static, O: Send + 'static> PoolState<I, O> {
    fn spawn_worker(&mut self) -> std::io::Result<()> {
        let id = self.next_worker_id;
        let worker = Worker::spawn(id, Arc::clone(&self.handler), self.events.clone())?;
        self.next_worker_id += 1;
        self.workers.push(WorkerEntry {
            worker,
            running: None,
        });
        Ok(())
    }

    /// Spawns workers until the configured count is live again.
    fn top_up(&mut self) {
        while self.workers.len() < self.config.worker_count {
            if let Err(err) = self.spawn_worker() {
                log::error!("Failed to spawn replacement worker: {err}");
                return;
            }
            self.stats.recreated += 1;
        }
    }

    /// Hands queued jobs to idle workers in priority order.
    fn dispatch(&mut self) {
        loop {
            let Some(index) = self.workers.iter().position(|e| e.running.is_none()) else {
                return;
            };
            let Some((priority, job)) = self.queue.pop() else {
                return;
            };
            if job.is_cancelled() {
                job.slot.resolve(Err(JobError::Cancelled { id: job.id }));
                self.stats.cancelled += 1;
                continue;
            }

            let entry = &mut self.workers[index];
            match entry.worker.send(job.id, job.input) {
                Ok(()) => {
                    log::trace!("Job {} -> worker {}", job.id, entry.worker.id);
                    entry.running = Some(RunningJob {
                        id: job.id,
                        timeout: job.timeout,
                        started: Instant::now(),
                        slot: job.slot,
                    });
                }
                Err(input) => {
                    log::warn!("Worker {} is gone, replacing it", entry.worker.id);
                    self.queue.push_front(priority, QueuedJob { input, ..job });
                    self.workers.swap_remove(index).worker.retire();
                    self.top_up();
                    return;
                }
            }
        }
    }

    fn on_completed(&mut self, worker: u64, job: JobId, output: O, elapsed: Duration) {
        let Some(index) = self.position(worker) else {
            log::debug!("Ignoring late result of job {job} from retired worker {worker}");
            return;
        };
        let entry = &mut self.workers[index];
        let Some(running) = entry.running.take_if(|r| r.id == job) else {
            log::warn!("Worker {worker} reported job {job} it was not running");
            return;
        };
        self.stats.record_completion(elapsed);
        if !running.slot.resolve(Ok(output)) {
            log::debug!("Job {job} finished after it was cancelled");
            self.stats.cancelled += 1;
        }
    }

    fn on_faulted(&mut self, worker: u64, job: JobId, message: String) {
        let Some(index) = self.position(worker) else {
            log::debug!("Ignoring fault of job {job} from retired worker {worker}");
            return;
        };
        log::warn!("Worker {worker} faulted on job {job}: {message}");
        let entry = self.workers.swap_remove(index);
        if let Some(running) = entry.running {
            running
                .slot
                .resolve(Err(JobError::WorkerFault { id: job, message }));
        }
        self.stats.failed += 1;
        // The thread exits right after reporting a fault.
        entry.worker.join();
        self.top_up();
    }

    /// Rejects jobs past their deadline and replaces their workers.
    fn expire_timeouts(&mut self, now: Instant) {
        let mut index = 0;
        while index < self.workers.len() {
            let expired = self.workers[index]
                .running
                .as_ref()
                .is_some_and(|job| job.deadline() <= now);
            if !expired {
                index += 1;
                continue;
            }
            let entry = self.workers.swap_remove(index);
            if let Some(job) = entry.running {
                log::warn!(
                    "Job {} timed out after {:?} on worker {}",
                    job.id,
                    job.timeout,
                    entry.worker.id
                );
                job.slot.resolve(Err(JobError::TimedOut {
                    id: job.id,
                    timeout: job.timeout,
                }));
            }
            self.stats.failed += 1;
            self.stats.timed_out += 1;
            entry.worker.retire();
        }
        self.top_up();
    }

    /// Replaces workers that are stuck or have died, then restores the
    /// configured worker count.
    fn health_check(&mut self, now: Instant) {
        let threshold = self.config.stuck_threshold();
        let mut index = 0;
        while index < self.workers.len() {
            let entry = &self.workers[index];
            let stuck = entry
                .running
                .as_ref()
                .is_some_and(|job| now.duration_since(job.started) >= threshold);
            let dead = entry.running.is_none() && entry.worker.is_dead();
            if !stuck && !dead {
                index += 1;
                continue;
            }
            let entry = self.workers.swap_remove(index);
            if let Some(job) = entry.running {
                log::warn!("Worker {} unresponsive on job {}", entry.worker.id, job.id);
                job.slot.resolve(Err(JobError::WorkerFault {
                    id: job.id,
                    message: "worker unresponsive".to_string(),
                }));
                self.stats.failed += 1;
            } else {
                log::warn!("Worker {} died while idle", entry.worker.id);
            }
            entry.worker.retire();
        }
        self.top_up();
    }
}

fn supervise<I, O>(shared: Arc<Mutex<PoolState<I, O>>>, inbox: mpsc::Receiver<PoolEvent<O>>)
where
    I: Send + 'static,
    O: Send + 'static,
{
    let interval = shared.lock().config.health_check_interval();
    let mut next_health_check = Instant::now() + interval;

    loop {
        let wake_at = shared
            .lock()
            .next_deadline()
            .map_or(next_health_check, |deadline| deadline.min(next_health_check));
        let event = inbox.recv_timeout(wake_at.saturating_duration_since(Instant::now()));

        let mut state = shared.lock();
        match event {
            Ok(PoolEvent::Completed {
                worker,
                job,
                output,
                elapsed,
            }) => state.on_completed(worker, job, output, elapsed),
            Ok(PoolEvent::Faulted {
                worker,
                job,
                message,
            }) => state.on_faulted(worker, job, message),
            Ok(PoolEvent::Wake) | Err(RecvTimeoutError::Timeout) => {}
            Ok(PoolEvent::Shutdown) | Err(RecvTimeoutError::Disconnected) => break,
        }
        if state.shutting_down {
            break;
        }

        let now = Instant::now();
        state.expire_timeouts(now);
        if now >= next_health_check {
            state.health_check(now);
            next_health_check = now + interval;
        }
        state.purge_cancelled();
        state.dispatch();
    }
    log::debug!("Pool supervisor exiting");
}

/// Fixed-size pool of worker threads fed from a priority queue.
///
/// A supervisor thread owns dispatch bookkeeping: it enforces per-job
/// timeouts, replaces workers that panic, time out or stop responding, and
/// keeps the live worker count at [`PoolConfig::worker_count`]. Jobs and
/// results cross thread boundaries by value only.
///
/// Dropping the pool shuts it down.
pub struct WorkerPool<I, O> {
    shared: Arc<Mutex<PoolState<I, O>>>,
    events: mpsc::Sender<PoolEvent<O>>,
    supervisor: Option<JoinHandle<()>>,
    next_job: AtomicU64,
}

/// Pool that turns [`SlabParams`] into mesh buffers.
pub type MeshWorkerPool = WorkerPool<SlabParams, MeshBuffers>;

impl MeshWorkerPool {
    pub fn mesh_builder(config: PoolConfig) -> Result<Self, PoolError> {
        Self::new(config, |params: SlabParams| build_slab(&params))
    }
}

impl<I: Send + 'static, O: Send + 'static> WorkerPool<I, O> {
    /// Starts `config.worker_count` workers running `handler`.
    pub fn new<F>(config: PoolConfig, handler: F) -> Result<Self, PoolError>
    where
        F: Fn(I) -> O + Send + Sync + 'static,
    {
        let config = config.validated();
        let (events, inbox) = mpsc::channel();
        let mut state = PoolState {
            stats: StatsRecorder::new(config.stats_window),
            config,
            handler: Arc::new(handler),
            events: events.clone(),
            queue: JobQueue::new(),
            workers: Vec::new(),
            next_worker_id: 0,
            shutting_down: false,
        };
        for _ in 0..state.config.worker_count {
            state.spawn_worker()?;
        }
        log::info!("Worker pool started with {} workers", state.workers.len());

        let shared = Arc::new(Mutex::new(state));
        let supervisor = std::thread::Builder::new()
            .name("stonecut-pool-supervisor".to_string())
            .spawn({
                let shared = Arc::clone(&shared);
                move || supervise(shared, inbox)
            })?;

        Ok(Self {
            shared,
            events,
            supervisor: Some(supervisor),
            next_job: AtomicU64::new(1),
        })
    }

    /// Queues `input` and returns a handle to its result.
    ///
    /// Fails synchronously when the queue is full, the token is already
    /// cancelled, or the pool has shut down.
    pub fn execute(&self, input: I, options: JobOptions) -> Result<JobHandle<O>, JobError> {
        let id = JobId(self.next_job.fetch_add(1, Ordering::Relaxed));
        if options.cancellation.as_ref().is_some_and(CancellationToken::is_cancelled) {
            log::debug!("Job {id} cancelled before submission");
            return Err(JobError::Cancelled { id });
        }

        let slot = Arc::new(JobSlot::new());
        {
            let mut state = self.shared.lock();
            if state.shutting_down {
                return Err(JobError::Shutdown);
            }
            state.purge_cancelled();
            let capacity = state.config.max_queue_size;
            if state.queue.len() >= capacity {
                log::warn!("Rejecting job {id}: queue full ({capacity})");
                return Err(JobError::QueueFull { capacity });
            }
            let timeout = options.timeout.unwrap_or(state.config.default_timeout());
            state.queue.push(
                options.priority,
                QueuedJob {
                    id,
                    input,
                    timeout,
                    token: options.cancellation.clone(),
                    slot: Arc::clone(&slot),
                },
            );
            state.dispatch();
        }

        if let Some(token) = options.cancellation {
            let weak = Arc::downgrade(&slot);
            let events = self.events.clone();
            token.on_cancel(move || {
                if let Some(slot) = weak.upgrade()
                    && slot.resolve(Err(JobError::Cancelled { id }))
                {
                    log::debug!("Job {id} cancelled");
                }
                let _ = events.send(PoolEvent::Wake);
            });
        }
        // The supervisor recomputes its next deadline.
        let _ = self.events.send(PoolEvent::Wake);

        Ok(JobHandle::new(id, slot))
    }

    /// Submits each input with the same options. One result per input, in
    /// order; a rejected submission does not stop the rest.
    pub fn execute_batch(
        &self,
        inputs: impl IntoIterator<Item = I>,
        options: JobOptions,
    ) -> Vec<Result<JobHandle<O>, JobError>> {
        inputs
            .into_iter()
            .map(|input| self.execute(input, options.clone()))
            .collect()
    }
}

impl<I, O> WorkerPool<I, O> {
    pub fn stats(&self) -> PoolStats {
        self.shared.lock().snapshot()
    }

    pub fn config(&self) -> PoolConfig {
        self.shared.lock().config.clone()
    }

    pub fn is_shut_down(&self) -> bool {
        self.supervisor.is_none()
    }

    /// Stops the supervisor, fails queued and running jobs with
    /// [`JobError::Shutdown`], and joins idle workers. Busy workers are
    /// detached. Idempotent.
    pub fn shutdown(&mut self) {
        let Some(supervisor) = self.supervisor.take() else {
            return;
        };
        self.shared.lock().shutting_down = true;
        let _ = self.events.send(PoolEvent::Shutdown);
        if supervisor.join().is_err() {
            log::error!("Pool supervisor panicked");
        }

        let workers: Vec<_> = {
            let mut state = self.shared.lock();
            state.reject_all();
            state.workers.drain(..).collect()
        };
        for entry in workers {
            if entry.running.is_some() {
                entry.worker.retire();
            } else {
                entry.worker.join();
            }
        }
        log::info!("Worker pool shut down");
    }
}

impl<I, O> Drop for WorkerPool<I, O> {
    fn drop(&mut self) {
        self.shutdown();
    }
}
