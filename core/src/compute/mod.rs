//! Primitives shared by the job scheduler and the resource cache.
//!
//! - [`Priority`] - Job priority, lower value runs sooner
//! - [`CancellationToken`] - Shared cancellation flag with wake-up callbacks
//! - [`IoHandle`] - Channel-based future for results produced on another thread
//! - [`noop_waker`] - Waker for manual polling loops

mod cancellation;
mod io_handle;
mod priority;

pub use cancellation::{CancellationToken, Cancelled};
pub use io_handle::IoHandle;
pub use priority::Priority;

use std::task::{RawWaker, RawWakerVTable, Waker};

/// A waker that does nothing.
///
/// Frame loops poll [`IoHandle`]s and job handles once per tick instead of
/// being woken, so they pass this to `Future::poll`.
pub fn noop_waker() -> Waker {
    fn noop(_: *const ()) {}
    fn clone(p: *const ()) -> RawWaker {
        RawWaker::new(p, &VTABLE)
    }
    static VTABLE: RawWakerVTable = RawWakerVTable::new(clone, noop, noop, noop);
    // SAFETY: every vtable entry ignores the data pointer.
    unsafe { Waker::from_raw(RawWaker::new(std::ptr::null(), &VTABLE)) }
}
