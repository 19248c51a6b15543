//! Job scheduler error types.

use std::time::Duration;

use crate::handle::JobId;

/// Why a job did not produce a result.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum JobError {
    /// The job ran past its timeout. Its worker was replaced.
    #[error("job {id} timed out after {timeout:?}")]
    TimedOut { id: JobId, timeout: Duration },
    /// The queue was full at submission.
    #[error("job queue is full ({capacity} waiting)")]
    QueueFull { capacity: usize },
    /// The submitter cancelled the job.
    #[error("job {id} was cancelled")]
    Cancelled { id: JobId },
    /// The worker panicked or stopped responding.
    #[error("worker failed while running job {id}: {message}")]
    WorkerFault { id: JobId, message: String },
    /// The pool shut down before the job finished.
    #[error("worker pool is shut down")]
    Shutdown,
    /// The result was already taken from this handle.
    #[error("result of job {id} was already taken")]
    AlreadyTaken { id: JobId },
}

impl JobError {
    /// `true` for errors the submitter caused or asked for.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled { .. })
    }
}

/// Errors raised while building a pool.
#[derive(Debug, thiserror::Error)]
pub enum PoolError {
    #[error("failed to spawn pool thread: {0}")]
    Spawn(#[from] std::io::Error),
}
