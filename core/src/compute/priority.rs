/// Priority of a queued job.
///
/// Lower numbers run sooner; jobs of equal priority run in submission order.
///
/// # Ordering
///
/// `Ord` follows the number, so a sorted queue has the most urgent job
/// first. Use [`Priority::is_more_urgent_than`] when reading intent matters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Priority(pub u32);

impl Priority {
    /// The user is waiting on this result right now (the active preview).
    pub const INTERACTIVE: Priority = Priority(0);
    /// Default for ordinary requests.
    pub const NORMAL: Priority = Priority(10);
    /// Prefetch and thumbnails.
    pub const BACKGROUND: Priority = Priority(100);

    pub fn value(self) -> u32 {
        self.0
    }

    pub fn is_more_urgent_than(self, other: Priority) -> bool {
        self.0 < other.0
    }
}

impl Default for Priority {
    fn default() -> Self {
        Self::NORMAL
    }
}

impl From<u32> for Priority {
    fn from(value: u32) -> Self {
        Self(value)
    }
}
