use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::sync::mpsc;
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use crate::handle::JobId;

/// Function a worker applies to each job input.
pub(crate) type Handler<I, O> = Arc<dyn Fn(I) -> O + Send + Sync>;

/// Messages flowing into the supervisor.
///
/// Worker results and submitter wake-ups share one channel so the
/// supervisor's `recv_timeout` wakes on either.
pub(crate) enum PoolEvent<O> {
    Completed {
        worker: u64,
        job: JobId,
        output: O,
        elapsed: Duration,
    },
    Faulted {
        worker: u64,
        job: JobId,
        message: String,
    },
    /// Something changed the queue or dispatched a job; recompute deadlines.
    Wake,
    Shutdown,
}

/// A live worker thread as seen by the supervisor.
///
/// `id` doubles as the generation: a replacement always gets a fresh id,
/// so late results from a retired worker are recognisable.
pub(crate) struct Worker<I> {
    pub(crate) id: u64,
    sender: Option<mpsc::Sender<(JobId, I)>>,
    thread: Option<JoinHandle<()>>,
}

impl<I: Send + 'static> Worker<I> {
    pub(crate) fn spawn<O: Send + 'static>(
        id: u64,
        handler: Handler<I, O>,
        events: mpsc::Sender<PoolEvent<O>>,
    ) -> std::io::Result<Self> {
        let (sender, inbox) = mpsc::channel::<(JobId, I)>();
        let thread = std::thread::Builder::new()
            .name(format!("stonecut-worker-{id}"))
            .spawn(move || run_worker(id, &inbox, handler.as_ref(), &events))?;
        log::debug!("Spawned worker {id}");
        Ok(Self {
            id,
            sender: Some(sender),
            thread: Some(thread),
        })
    }
}

impl<I> Worker<I> {
    /// Hands a job to the worker. Gives the input back if the thread is gone.
    pub(crate) fn send(&self, job: JobId, input: I) -> Result<(), I> {
        match &self.sender {
            Some(sender) => sender.send((job, input)).map_err(|err| err.0.1),
            None => Err(input),
        }
    }

    /// `true` when the thread has exited on its own.
    pub(crate) fn is_dead(&self) -> bool {
        self.thread.as_ref().is_none_or(|thread| thread.is_finished())
    }

    /// Closes the inbox so the thread exits after its current job, and
    /// detaches it. Any late result is ignored by the supervisor.
    pub(crate) fn retire(mut self) {
        self.sender = None;
        self.thread = None;
        log::debug!("Retired worker {}", self.id);
    }

    /// Closes the inbox and waits for the thread to exit.
    pub(crate) fn join(mut self) {
        self.sender = None;
        if let Some(thread) = self.thread.take()
            && thread.join().is_err()
        {
            log::warn!("Worker {} exited with a panic", self.id);
        }
    }
}

fn run_worker<I, O>(
    id: u64,
    inbox: &mpsc::Receiver<(JobId, I)>,
    handler: &(dyn Fn(I) -> O + Send + Sync),
    events: &mpsc::Sender<PoolEvent<O>>,
) {
    while let Ok((job, input)) = inbox.recv() {
        let started = Instant::now();
        let outcome = panic::catch_unwind(AssertUnwindSafe(|| handler(input)));
        let elapsed = started.elapsed();
        let (event, faulted) = match outcome {
            Ok(output) => (
                PoolEvent::Completed {
                    worker: id,
                    job,
                    output,
                    elapsed,
                },
                false,
            ),
            Err(payload) => (
                PoolEvent::Faulted {
                    worker: id,
                    job,
                    message: panic_message(payload.as_ref()),
                },
                true,
            ),
        };
        // A worker that panicked is not reused: the supervisor replaces it.
        if events.send(event).is_err() || faulted {
            break;
        }
    }
    log::trace!("Worker {id} exiting");
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "worker panicked".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn doubling() -> Handler<u32, u32> {
        Arc::new(|x: u32| {
            if x == 0 {
                panic!("zero input");
            }
            x * 2
        })
    }

    #[test]
    fn runs_job_and_reports() {
        let (events, inbox) = mpsc::channel();
        let worker = Worker::spawn(1, doubling(), events).unwrap();
        worker.send(JobId(5), 21).unwrap();

        match inbox.recv_timeout(Duration::from_secs(5)).unwrap() {
            PoolEvent::Completed {
                worker: 1,
                job: JobId(5),
                output,
                ..
            } => assert_eq!(output, 42),
            _ => panic!("expected completion"),
        }
        worker.join();
    }

    #[test]
    fn panic_becomes_fault_and_thread_exits() {
        let (events, inbox) = mpsc::channel();
        let worker = Worker::spawn(2, doubling(), events).unwrap();
        worker.send(JobId(1), 0).unwrap();

        match inbox.recv_timeout(Duration::from_secs(5)).unwrap() {
            PoolEvent::Faulted { worker: 2, message, .. } => assert_eq!(message, "zero input"),
            _ => panic!("expected fault"),
        }
        let deadline = Instant::now() + Duration::from_secs(5);
        while !worker.is_dead() && Instant::now() < deadline {
            std::thread::sleep(Duration::from_millis(1));
        }
        assert!(worker.is_dead());
        assert_eq!(worker.send(JobId(2), 3), Err(3));
    }

    #[test]
    fn panic_message_variants() {
        let owned: Box<dyn Any + Send> = Box::new(String::from("owned"));
        assert_eq!(panic_message(owned.as_ref()), "owned");
        let other: Box<dyn Any + Send> = Box::new(17u8);
        assert_eq!(panic_message(other.as_ref()), "worker panicked");
    }
}
