//! Bus lock with bounded acquisition and an activity stamp
//!
//! The lock wraps whatever owns the bus (normally a [`super::BusPort`]),
//! so the only way to issue a transaction is through a [`BusGuard`].
//! Dropping the guard releases the lock on every exit path and records
//! the release time, which the publisher uses to find quiet moments.

use core::ops::{Deref, DerefMut};

use embassy_sync::blocking_mutex::raw::RawMutex;
use embassy_sync::mutex::{Mutex, MutexGuard};
use embedded_hal_async::delay::DelayNs;
use portable_atomic::{AtomicBool, AtomicU32, Ordering};
use smbwatch_hal::Clock;

/// Time of the most recent bus ownership change
pub struct ActivityStamp {
    last_ms: AtomicU32,
    seen: AtomicBool,
    held: AtomicBool,
}

impl ActivityStamp {
    pub const fn new() -> Self {
        Self {
            last_ms: AtomicU32::new(0),
            seen: AtomicBool::new(false),
            held: AtomicBool::new(false),
        }
    }

    fn mark(&self, now_ms: u32, held: bool) {
        self.last_ms.store(now_ms, Ordering::Release);
        self.seen.store(true, Ordering::Release);
        self.held.store(held, Ordering::Release);
    }

    /// Last acquire or release, `None` before the first one
    pub fn last_ms(&self) -> Option<u32> {
        if self.seen.load(Ordering::Acquire) {
            Some(self.last_ms.load(Ordering::Acquire))
        } else {
            None
        }
    }

    /// Nobody holds the bus and nobody has for at least `quiet_ms`
    pub fn is_quiet(&self, now_ms: u32, quiet_ms: u32) -> bool {
        if self.held.load(Ordering::Acquire) {
            return false;
        }
        match self.last_ms() {
            Some(last) => now_ms.wrapping_sub(last) >= quiet_ms,
            None => true,
        }
    }
}

impl Default for ActivityStamp {
    fn default() -> Self {
        Self::new()
    }
}

/// Exclusive access to the shared bus
pub struct BusLock<M: RawMutex, P, T> {
    port: Mutex<M, P>,
    timer: T,
    poll_ms: u32,
    stamp: ActivityStamp,
}

impl<M, P, T> BusLock<M, P, T>
where
    M: RawMutex,
    T: Clock + DelayNs + Clone,
{
    /// `poll_ms` is the retry spacing used by [`BusLock::acquire`]
    pub const fn new(port: P, timer: T, poll_ms: u32) -> Self {
        Self {
            port: Mutex::new(port),
            timer,
            poll_ms,
            stamp: ActivityStamp::new(),
        }
    }

    /// Take the lock if it is free right now
    pub fn try_acquire(&self) -> Option<BusGuard<'_, M, P, T>> {
        let inner = self.port.try_lock().ok()?;
        self.stamp.mark(self.timer.now_ms(), true);
        Some(BusGuard { inner, lock: self })
    }

    /// Retry every `poll_ms` until the lock is taken or `timeout_ms` passes
    ///
    /// A zero timeout makes exactly one attempt.
    pub async fn acquire(&self, timeout_ms: u32) -> Option<BusGuard<'_, M, P, T>> {
        let start = self.timer.now_ms();
        let mut delay = self.timer.clone();
        loop {
            if let Some(guard) = self.try_acquire() {
                return Some(guard);
            }
            if self.timer.now_ms().wrapping_sub(start) >= timeout_ms {
                return None;
            }
            delay.delay_ms(self.poll_ms.max(1)).await;
        }
    }

    /// Last time the bus changed hands
    pub fn last_activity_ms(&self) -> Option<u32> {
        self.stamp.last_ms()
    }

    /// Bus free and untouched for at least `quiet_ms`
    pub fn is_quiet(&self, quiet_ms: u32) -> bool {
        self.stamp.is_quiet(self.timer.now_ms(), quiet_ms)
    }
}

/// Scoped bus ownership; releases on drop
pub struct BusGuard<'a, M: RawMutex, P, T: Clock> {
    inner: MutexGuard<'a, M, P>,
    lock: &'a BusLock<M, P, T>,
}

impl<M: RawMutex, P, T: Clock> Deref for BusGuard<'_, M, P, T> {
    type Target = P;

    fn deref(&self) -> &P {
        &self.inner
    }
}

impl<M: RawMutex, P, T: Clock> DerefMut for BusGuard<'_, M, P, T> {
    fn deref_mut(&mut self) -> &mut P {
        &mut self.inner
    }
}

impl<M: RawMutex, P, T: Clock> Drop for BusGuard<'_, M, P, T> {
    fn drop(&mut self) {
        self.lock.stamp.mark(self.lock.timer.now_ms(), false);
    }
}
