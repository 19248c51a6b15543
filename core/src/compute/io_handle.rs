use std::future::Future;
use std::pin::Pin;
use std::sync::mpsc;
use std::task::{Context, Poll};
use std::time::Duration;

/// Handle to a value produced on another thread.
///
/// Returned by texture loaders: the decode runs on a tokio runtime and the
/// result is delivered through a channel, so the frame loop can poll it
/// with [`try_recv()`](IoHandle::try_recv) or `.await` it with a noop waker.
pub struct IoHandle<T> {
    receiver: mpsc::Receiver<T>,
}

impl<T> IoHandle<T> {
    /// Creates a new IO handle wrapping the given receiver.
    pub fn new(receiver: mpsc::Receiver<T>) -> Self {
        Self { receiver }
    }

    /// A handle that is already resolved with `value`.
    pub fn ready(value: T) -> Self {
        let (sender, receiver) = mpsc::channel();
        // The receiver is alive, so the send cannot fail.
        let _ = sender.send(value);
        Self { receiver }
    }

    /// Attempts to retrieve the result without blocking.
    ///
    /// Returns `Some(T)` once the producer has sent, `None` otherwise.
    /// The value is consumed; later calls return `None`.
    pub fn try_recv(&self) -> Option<T> {
        self.receiver.try_recv().ok()
    }

    /// Blocks until the producer sends. `None` if it was dropped first.
    pub fn recv(self) -> Option<T> {
        self.receiver.recv().ok()
    }

    /// Blocks for at most `timeout`.
    pub fn recv_timeout(&self, timeout: Duration) -> Option<T> {
        self.receiver.recv_timeout(timeout).ok()
    }
}

impl<T> Future for IoHandle<T> {
    type Output = Option<T>;

    /// `Ready(Some)` once sent, `Ready(None)` if the producer was dropped.
    ///
    /// Never registers the waker: callers poll once per frame.
    fn poll(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<Option<T>> {
        match self.receiver.try_recv() {
            Ok(val) => Poll::Ready(Some(val)),
            Err(mpsc::TryRecvError::Empty) => Poll::Pending,
            Err(mpsc::TryRecvError::Disconnected) => Poll::Ready(None),
        }
    }
}
