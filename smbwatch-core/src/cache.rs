//! Single-writer snapshot cells
//!
//! Each producer owns the only [`Writer`] for its cell; the publisher and
//! anything else read copies through [`Shared::get`]. Readers may see a
//! value one tick old but never a half-written one.

use core::cell::RefCell;

use embassy_sync::blocking_mutex::raw::RawMutex;
use embassy_sync::blocking_mutex::Mutex;
use portable_atomic::{AtomicBool, AtomicU32, Ordering};

/// Snapshot shared between one producer and any number of readers
pub struct Shared<M: RawMutex, T> {
    value: Mutex<M, RefCell<T>>,
    version: AtomicU32,
    writer_taken: AtomicBool,
}

impl<M: RawMutex, T: Clone> Shared<M, T> {
    pub const fn new(initial: T) -> Self {
        Self {
            value: Mutex::new(RefCell::new(initial)),
            version: AtomicU32::new(0),
            writer_taken: AtomicBool::new(false),
        }
    }

    /// Claim the write handle; `None` once it has been handed out
    pub fn writer(&self) -> Option<Writer<'_, M, T>> {
        if self.writer_taken.swap(true, Ordering::AcqRel) {
            None
        } else {
            Some(Writer { cell: self })
        }
    }

    /// Copy of the latest published value
    pub fn get(&self) -> T {
        self.value.lock(|v| v.borrow().clone())
    }

    /// Bumped on every publish
    pub fn version(&self) -> u32 {
        self.version.load(Ordering::Acquire)
    }
}

/// Exclusive write handle for a [`Shared`] cell
pub struct Writer<'a, M: RawMutex, T> {
    cell: &'a Shared<M, T>,
}

impl<M: RawMutex, T: Clone> Writer<'_, M, T> {
    pub fn publish(&mut self, value: T) {
        self.cell.value.lock(|v| *v.borrow_mut() = value);
        self.cell.version.fetch_add(1, Ordering::AcqRel);
    }

    /// Edit in place; one version bump
    pub fn update(&mut self, f: impl FnOnce(&mut T)) {
        self.cell.value.lock(|v| f(&mut v.borrow_mut()));
        self.cell.version.fetch_add(1, Ordering::AcqRel);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use embassy_sync::blocking_mutex::raw::NoopRawMutex;

    #[test]
    fn test_single_writer() {
        let cell: Shared<NoopRawMutex, u32> = Shared::new(0);
        let first = cell.writer();
        assert!(first.is_some());
        assert!(cell.writer().is_none());
    }

    #[test]
    fn test_publish_and_version() {
        let cell: Shared<NoopRawMutex, (u8, u8)> = Shared::new((0, 0));
        let mut w = cell.writer().unwrap();
        assert_eq!(cell.version(), 0);

        w.publish((1, 2));
        assert_eq!(cell.get(), (1, 2));
        assert_eq!(cell.version(), 1);

        w.update(|v| v.1 = 9);
        assert_eq!(cell.get(), (1, 9));
        assert_eq!(cell.version(), 2);
    }
}
