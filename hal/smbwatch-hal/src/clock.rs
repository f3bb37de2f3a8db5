//! Monotonic time source

/// Monotonic millisecond clock
///
/// Wraps after ~49 days; consumers compare with `wrapping_sub`.
pub trait Clock {
    /// Milliseconds since boot
    fn now_ms(&self) -> u32;
}
