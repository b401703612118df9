// Portions of the project have been copied from parking_lot and is copyrighted by Amanieu d'Antra under the MIT license (located in: '3rd-party-licenses/parking_lot')
use core::sync::atomic::{AtomicUsize, Ordering};

use crate::{
    error::{self, ErrorCode, ErrorSlot, Result},
    sys::ThreadId,
};
use super::{
    lock_imp::RawMutex,
    raw_fair_mutex::RawFairMutex,
};

/// A raw mutex type that wraps another raw mutex to provide reentrancy.
///
/// The first lock by a thread goes through the inner mutex, every following lock by the same thread only bumps the hold count.
/// The inner mutex is released once the hold count drops back to 0, so a thread needs exactly as many unlocks as it did locks.
///
/// Although this has the same methods as the [`RawMutex`] trait, it does not implement it, and should not be used in the same way,
/// since this mutex can successfully acquire a lock multiple times in the same thread.
pub struct RawReentrantMutex<R = RawFairMutex> {
    mutex      : R,
    /// Only ever written by the thread owning `mutex`.
    hold_count : AtomicUsize,
    last_error : ErrorSlot,
}

impl<R: RawMutex> RawReentrantMutex<R> {
    /// Initial value for an unlocked mutex
    pub const INIT : Self = Self::new();

    /// Create a new `RawReentrantMutex`
    pub const fn new() -> Self {
        Self {
            mutex: R::INIT,
            hold_count: AtomicUsize::new(0),
            last_error: ErrorSlot::new(),
        }
    }

    fn record<T>(&self, res: Result<T>) -> Result<T> {
        error::track(self.last_error.record(res))
    }

    #[inline]
    fn lock_internal<F: FnOnce() -> Result<()>>(&self, thread: ThreadId, lock: F) -> Result<()> {
        if self.mutex.is_owned_by(thread) {
            let count = self.hold_count.load(Ordering::Relaxed).checked_add(1).ok_or(ErrorCode::Overflow)?;
            self.hold_count.store(count, Ordering::Relaxed);
        } else {
            lock()?;
            debug_assert_eq!(self.hold_count.load(Ordering::Relaxed), 0);
            self.hold_count.store(1, Ordering::Relaxed);
        }
        Ok(())
    }

    /// Acquires this mutex, blocking if it's held by another thread.
    ///
    /// Fails with [`ErrorCode::Overflow`] if `thread` already holds the mutex `usize::MAX` times.
    #[inline]
    pub fn lock(&self, thread: ThreadId) -> Result<()> {
        let res = self.lock_internal(thread, || self.mutex.lock(thread));
        self.record(res)
    }

    /// Attempts to acquire this mutex without blocking.
    ///
    /// Succeeds immediately when `thread` already holds the mutex, fails with [`ErrorCode::AlreadyLocked`] when another thread does.
    #[inline]
    pub fn try_lock(&self, thread: ThreadId) -> Result<()> {
        let res = self.lock_internal(thread, || self.mutex.try_lock(thread));
        self.record(res)
    }

    /// Unlocks this mutex.
    /// The inner mutex is only unlocked once every lock by `thread` has been matched by an unlock.
    ///
    /// Fails with [`ErrorCode::NotOwner`] if `thread` doesn't hold the mutex, which includes unlocking more often than locking.
    #[inline]
    pub fn unlock(&self, thread: ThreadId) -> Result<()> {
        let res = self.unlock_internal(thread);
        self.record(res)
    }

    fn unlock_internal(&self, thread: ThreadId) -> Result<()> {
        if !self.mutex.is_owned_by(thread) {
            return Err(ErrorCode::NotOwner);
        }

        let count = self.hold_count.load(Ordering::Relaxed);
        debug_assert_ne!(count, 0);
        let count = count.saturating_sub(1);
        self.hold_count.store(count, Ordering::Relaxed);
        if count == 0 {
            self.mutex.unlock(thread)?;
        }
        Ok(())
    }

    /// Get the number of times the owning thread currently holds the lock, 0 when unheld.
    ///
    /// Only meaningful when called from the owning thread.
    #[inline]
    pub fn hold_count(&self) -> usize {
        if self.mutex.is_locked() {
            self.hold_count.load(Ordering::Relaxed)
        } else {
            0
        }
    }

    /// Get the thread currently holding the mutex, if any
    #[inline]
    pub fn owner(&self) -> Option<ThreadId> {
        self.mutex.owner()
    }

    /// Checks whether the mutex is currently locked
    #[inline]
    pub fn is_locked(&self) -> bool {
        self.mutex.is_locked()
    }

    /// Checks whether the mutex is currently held by `thread`.
    #[inline]
    pub fn is_owned_by(&self, thread: ThreadId) -> bool {
        self.mutex.is_owned_by(thread)
    }

    /// Get the error of the last operation performed on this mutex, by any thread
    pub fn last_error(&self) -> Option<ErrorCode> {
        self.last_error.get()
    }
}

impl<R: RawMutex> Default for RawReentrantMutex<R> {
    fn default() -> Self {
        Self::new()
    }
}

static_assertions::assert_impl_all!(RawReentrantMutex: Send, Sync);

#[cfg(test)]
mod tests {
    use std::{sync::{Arc, Barrier, atomic::AtomicBool}, thread, time::Duration};

    use crate::sys::get_thread_id;
    use super::*;

    #[test]
    fn nested_lock() {
        let mutex : RawReentrantMutex = RawReentrantMutex::new();
        let thread = get_thread_id();

        for i in 1..=3 {
            assert_eq!(mutex.lock(thread), Ok(()));
            assert_eq!(mutex.hold_count(), i);
        }
        assert_eq!(mutex.try_lock(thread), Ok(()));
        assert_eq!(mutex.hold_count(), 4);

        for i in (0..4).rev() {
            assert!(mutex.is_owned_by(thread));
            assert_eq!(mutex.unlock(thread), Ok(()));
            assert_eq!(mutex.hold_count(), i);
        }
        assert!(!mutex.is_locked());
        assert_eq!(mutex.owner(), None);
    }

    #[test]
    fn unlock_more_than_locked() {
        let mutex : RawReentrantMutex = RawReentrantMutex::new();
        let thread = get_thread_id();

        mutex.lock(thread).unwrap();
        mutex.lock(thread).unwrap();
        assert_eq!(mutex.unlock(thread), Ok(()));
        assert_eq!(mutex.unlock(thread), Ok(()));
        assert_eq!(mutex.unlock(thread), Err(ErrorCode::NotOwner));
        assert_eq!(mutex.last_error(), Some(ErrorCode::NotOwner));
        assert_eq!(error::last_error(), Some(ErrorCode::NotOwner));
        assert_eq!(mutex.hold_count(), 0);

        // The mutex is still usable afterwards
        assert_eq!(mutex.lock(thread), Ok(()));
        assert_eq!(mutex.hold_count(), 1);
        assert_eq!(mutex.unlock(thread), Ok(()));
    }

    #[test]
    fn other_thread_needs_every_unlock() {
        let mutex = Arc::new(RawReentrantMutex::<RawFairMutex>::new());
        let acquired = Arc::new(AtomicBool::new(false));
        let checked = Arc::new(Barrier::new(2));
        let main = get_thread_id();

        const DEPTH : usize = 3;
        for _ in 0..DEPTH {
            mutex.lock(main).unwrap();
        }

        let handle = {
            let mutex = mutex.clone();
            let acquired = acquired.clone();
            let checked = checked.clone();
            thread::spawn(move || {
                let thread = get_thread_id();
                assert_eq!(mutex.try_lock(thread), Err(ErrorCode::AlreadyLocked));
                assert_eq!(mutex.unlock(thread), Err(ErrorCode::NotOwner));
                checked.wait();
                mutex.lock(thread).unwrap();
                acquired.store(true, Ordering::SeqCst);
                mutex.unlock(thread).unwrap();
            })
        };

        checked.wait();
        for _ in 0..DEPTH - 1 {
            thread::sleep(Duration::from_millis(10));
            mutex.unlock(main).unwrap();
            assert!(!acquired.load(Ordering::SeqCst));
            assert!(mutex.is_owned_by(main));
        }
        mutex.unlock(main).unwrap();
        handle.join().unwrap();
        assert!(acquired.load(Ordering::SeqCst));
        assert!(!mutex.is_locked());
    }

    #[test]
    fn hold_count_overflow() {
        let mutex : RawReentrantMutex = RawReentrantMutex::new();
        let thread = get_thread_id();

        mutex.lock(thread).unwrap();
        mutex.hold_count.store(usize::MAX, Ordering::Relaxed);
        assert_eq!(mutex.lock(thread), Err(ErrorCode::Overflow));
        assert_eq!(mutex.hold_count(), usize::MAX);

        mutex.hold_count.store(1, Ordering::Relaxed);
        assert_eq!(mutex.unlock(thread), Ok(()));
        assert!(!mutex.is_locked());
    }
}
