use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll, Waker};
use std::time::Duration;

use parking_lot::{Condvar, Mutex};

use crate::error::JobError;

/// Identifier of a submitted job, unique within its pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct JobId(pub u64);

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

struct SlotState<O> {
    result: Option<Result<O, JobError>>,
    taken: bool,
    waker: Option<Waker>,
}

/// Single-assignment result cell shared by a [`JobHandle`], the pool, and
/// the job's cancellation callback. The first resolution wins.
pub(crate) struct JobSlot<O> {
    state: Mutex<SlotState<O>>,
    ready: Condvar,
}

impl<O> JobSlot<O> {
    pub(crate) fn new() -> Self {
        Self {
            state: Mutex::new(SlotState {
                result: None,
                taken: false,
                waker: None,
            }),
            ready: Condvar::new(),
        }
    }

    /// Stores `result` unless the slot is already resolved.
    ///
    /// Returns `false` when an earlier resolution won.
    pub(crate) fn resolve(&self, result: Result<O, JobError>) -> bool {
        let waker = {
            let mut state = self.state.lock();
            if state.result.is_some() || state.taken {
                return false;
            }
            state.result = Some(result);
            state.waker.take()
        };
        self.ready.notify_all();
        if let Some(waker) = waker {
            waker.wake();
        }
        true
    }

    pub(crate) fn is_resolved(&self) -> bool {
        let state = self.state.lock();
        state.result.is_some() || state.taken
    }
}

/// Handle to the eventual result of a submitted job.
///
/// Resolves exactly once, with the output, a timeout, a cancellation, a
/// worker fault, or a shutdown. Poll it once per frame with
/// [`try_result()`](Self::try_result), block with [`wait()`](Self::wait),
/// or `.await` it.
pub struct JobHandle<O> {
    id: JobId,
    slot: Arc<JobSlot<O>>,
}

impl<O> JobHandle<O> {
    pub(crate) fn new(id: JobId, slot: Arc<JobSlot<O>>) -> Self {
        Self { id, slot }
    }

    pub fn id(&self) -> JobId {
        self.id
    }

    /// Whether the job has resolved (including a result already taken).
    pub fn is_finished(&self) -> bool {
        self.slot.is_resolved()
    }

    /// Takes the result if the job has resolved.
    ///
    /// Returns `None` while pending. After a `Some` the handle is spent and
    /// later calls return `Some(Err(JobError::AlreadyTaken))`.
    pub fn try_result(&mut self) -> Option<Result<O, JobError>> {
        let mut state = self.slot.state.lock();
        take(&mut state, self.id)
    }

    /// Blocks until the job resolves.
    pub fn wait(self) -> Result<O, JobError> {
        let mut state = self.slot.state.lock();
        loop {
            if let Some(result) = take(&mut state, self.id) {
                return result;
            }
            self.slot.ready.wait(&mut state);
        }
    }

    /// Blocks for at most `timeout`. `None` if the job is still pending.
    pub fn wait_timeout(&mut self, timeout: Duration) -> Option<Result<O, JobError>> {
        let mut state = self.slot.state.lock();
        if let Some(result) = take(&mut state, self.id) {
            return Some(result);
        }
        self.slot.ready.wait_for(&mut state, timeout);
        take(&mut state, self.id)
    }
}

fn take<O>(state: &mut SlotState<O>, id: JobId) -> Option<Result<O, JobError>> {
    if let Some(result) = state.result.take() {
        state.taken = true;
        return Some(result);
    }
    if state.taken {
        return Some(Err(JobError::AlreadyTaken { id }));
    }
    None
}

impl<O> Future for JobHandle<O> {
    type Output = Result<O, JobError>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let mut state = self.slot.state.lock();
        match take(&mut state, self.id) {
            Some(result) => Poll::Ready(result),
            None => {
                state.waker = Some(cx.waker().clone());
                Poll::Pending
            }
        }
    }
}

impl<O> fmt::Debug for JobHandle<O> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("JobHandle")
            .field("id", &self.id)
            .field("finished", &self.is_finished())
            .finish()
    }
}
