// Portions of the project have been copied from parking_lot and is copyrighted by Amanieu d'Antra under the MIT license (located in: '3rd-party-licenses/parking_lot')
use core::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use parking_lot_core::{FilterOp, ParkToken, DEFAULT_UNPARK_TOKEN};

use crate::{
    error::{self, ErrorCode, ErrorSlot, Result},
    sys::ThreadId,
};
use super::{
    lock_imp::{self, GuardNoSend},
    spin_wait::SpinWait,
};

/// Raw fair mutex, implemented as a ticket lock.
///
/// Every thread that wants the lock draws a ticket, and the lock is handed to tickets strictly in the order they were drawn.
/// No thread can starve another by quickly re-acquiring the lock after releasing it, as it has to draw a new ticket and queue behind every waiter.
///
/// Waiters spin for a short while, after which they are parked in the parking lot, using their ticket as park token.
/// An unlock only wakes the thread holding the next ticket.
///
/// The mutex is not reentrant: locking it from the thread that already holds it fails with [`ErrorCode::AlreadyLocked`], instead of deadlocking.
pub struct RawFairMutex {
    /// Ticket that will be handed to the next thread trying to lock the mutex.
    next_ticket : AtomicUsize,
    /// Ticket currently allowed to hold the lock, equal to `next_ticket` when the mutex is not held.
    now_serving : AtomicUsize,
    /// Raw id of the owning thread, 0 when unheld.
    owner       : AtomicU64,
    locked      : AtomicBool,
    last_error  : ErrorSlot,
}

impl RawFairMutex {
    /// Create a new unlocked mutex
    pub const fn new() -> Self {
        Self {
            next_ticket: AtomicUsize::new(0),
            now_serving: AtomicUsize::new(0),
            owner: AtomicU64::new(0),
            locked: AtomicBool::new(false),
            last_error: ErrorSlot::new(),
        }
    }

    /// Get the error of the last operation performed on this mutex, by any thread
    pub fn last_error(&self) -> Option<ErrorCode> {
        self.last_error.get()
    }

    /// Get the number of threads that hold or are waiting on the mutex
    pub fn queue_len(&self) -> usize {
        let next = self.next_ticket.load(Ordering::Relaxed);
        let serving = self.now_serving.load(Ordering::Relaxed);
        next.wrapping_sub(serving)
    }

    fn record<T>(&self, res: Result<T>) -> Result<T> {
        error::track(self.last_error.record(res))
    }

    // Address used as the parking lot key
    #[inline]
    fn key(&self) -> usize {
        &self.now_serving as *const _ as usize
    }

    #[inline]
    fn is_owner(&self, thread: ThreadId) -> bool {
        self.owner.load(Ordering::Relaxed) == thread.as_u64()
    }

    #[inline]
    fn set_acquired(&self, thread: ThreadId) {
        self.owner.store(thread.as_u64(), Ordering::Relaxed);
        self.locked.store(true, Ordering::Relaxed);
    }

    fn lock_inner(&self, thread: ThreadId) -> Result<()> {
        if self.is_owner(thread) {
            return Err(ErrorCode::AlreadyLocked);
        }

        let ticket = self.next_ticket.fetch_add(1, Ordering::SeqCst);
        self.wait_for_turn(ticket);
        self.set_acquired(thread);
        Ok(())
    }

    fn wait_for_turn(&self, ticket: usize) {
        let mut spin_wait = SpinWait::new();
        loop {
            if self.now_serving.load(Ordering::Acquire) == ticket {
                return;
            }

            if spin_wait.spin() {
                continue;
            }

            // SAFETY:
            // - `key` is the address of a field of this mutex, so it can't collide with keys of other primitives for as long as the mutex is alive.
            // - The callbacks don't call into the parking lot and don't panic.
            unsafe {
                parking_lot_core::park(
                    self.key(),
                    || self.now_serving.load(Ordering::SeqCst) != ticket,
                    || {},
                    |_, _| {},
                    ParkToken(ticket),
                    None
                );
            }
        }
    }

    fn try_lock_inner(&self, thread: ThreadId) -> Result<()> {
        // The mutex is free when no tickets are outstanding, i.e. `next_ticket == now_serving`, in which case we can draw the ticket being served
        let serving = self.now_serving.load(Ordering::Acquire);
        match self.next_ticket.compare_exchange(serving, serving.wrapping_add(1), Ordering::SeqCst, Ordering::Relaxed) {
            Ok(_) => {
                self.set_acquired(thread);
                Ok(())
            },
            Err(_) => Err(ErrorCode::AlreadyLocked),
        }
    }

    fn unlock_inner(&self, thread: ThreadId) -> Result<()> {
        if !self.is_owner(thread) {
            return Err(ErrorCode::NotOwner);
        }

        self.owner.store(0, Ordering::Relaxed);
        self.locked.store(false, Ordering::Relaxed);

        let next = self.now_serving.load(Ordering::Relaxed).wrapping_add(1);
        self.now_serving.store(next, Ordering::SeqCst);

        // Only go through the parking lot when somebody drew a ticket after ours
        if self.next_ticket.load(Ordering::SeqCst) != next {
            self.wake(next);
        }
        Ok(())
    }

    // Unpark the thread holding `ticket`, if it's parked
    fn wake(&self, ticket: usize) {
        let mut woken = false;
        // SAFETY: The callbacks don't call into the parking lot and don't panic.
        unsafe {
            parking_lot_core::unpark_filter(
                self.key(),
                |token| {
                    if woken {
                        FilterOp::Stop
                    } else if token.0 == ticket {
                        woken = true;
                        FilterOp::Unpark
                    } else {
                        FilterOp::Skip
                    }
                },
                |_| DEFAULT_UNPARK_TOKEN
            );
        }
    }
}

impl Default for RawFairMutex {
    fn default() -> Self {
        Self::new()
    }
}

unsafe impl lock_imp::RawMutex for RawFairMutex {
    const INIT : Self = RawFairMutex::new();

    type GuardMarker = GuardNoSend;

    #[inline]
    fn lock(&self, thread: ThreadId) -> Result<()> {
        self.record(self.lock_inner(thread))
    }

    #[inline]
    fn try_lock(&self, thread: ThreadId) -> Result<()> {
        self.record(self.try_lock_inner(thread))
    }

    #[inline]
    fn unlock(&self, thread: ThreadId) -> Result<()> {
        self.record(self.unlock_inner(thread))
    }

    #[inline]
    fn owner(&self) -> Option<ThreadId> {
        ThreadId::from_raw(self.owner.load(Ordering::Relaxed))
    }

    #[inline]
    fn is_locked(&self) -> bool {
        self.locked.load(Ordering::Relaxed)
    }
}

static_assertions::assert_impl_all!(RawFairMutex: Send, Sync);

#[cfg(test)]
mod tests {
    use std::{sync::Arc, thread, time::Duration};
    use parking_lot::Mutex as OrderLog;

    use crate::{error, sync::lock_imp::RawMutex, sys::{get_thread_id, ThreadId}};
    use super::*;

    fn fake_thread(id: u64) -> ThreadId {
        ThreadId::from_raw(id + 1_000_000).unwrap()
    }

    #[test]
    fn lock_unlock() {
        let mutex = RawFairMutex::new();
        let thread = get_thread_id();

        assert!(!mutex.is_locked());
        assert_eq!(mutex.lock(thread), Ok(()));
        assert!(mutex.is_locked());
        assert_eq!(mutex.owner(), Some(thread));
        assert_eq!(mutex.queue_len(), 1);

        assert_eq!(mutex.unlock(thread), Ok(()));
        assert!(!mutex.is_locked());
        assert_eq!(mutex.owner(), None);
        assert_eq!(mutex.queue_len(), 0);
        assert_eq!(mutex.last_error(), None);
    }

    #[test]
    fn relock_by_owner_is_rejected() {
        let mutex = RawFairMutex::new();
        let thread = get_thread_id();

        mutex.lock(thread).unwrap();
        assert_eq!(mutex.lock(thread), Err(ErrorCode::AlreadyLocked));
        assert_eq!(mutex.try_lock(thread), Err(ErrorCode::AlreadyLocked));
        assert_eq!(mutex.last_error(), Some(ErrorCode::AlreadyLocked));
        assert_eq!(error::last_error(), Some(ErrorCode::AlreadyLocked));

        // The failed attempts must not have drawn a ticket
        assert_eq!(mutex.queue_len(), 1);
        assert_eq!(mutex.unlock(thread), Ok(()));
        assert_eq!(mutex.try_lock(thread), Ok(()));
        assert_eq!(mutex.unlock(thread), Ok(()));
    }

    #[test]
    fn try_lock_held_by_other() {
        let mutex = RawFairMutex::new();
        mutex.lock(fake_thread(1)).unwrap();
        assert_eq!(mutex.try_lock(fake_thread(2)), Err(ErrorCode::AlreadyLocked));
        mutex.unlock(fake_thread(1)).unwrap();
        assert_eq!(mutex.try_lock(fake_thread(2)), Ok(()));
        mutex.unlock(fake_thread(2)).unwrap();
    }

    #[test]
    fn unlock_by_non_owner() {
        let mutex = RawFairMutex::new();
        let owner = fake_thread(1);
        let other = fake_thread(2);

        // Not held at all
        assert_eq!(mutex.unlock(other), Err(ErrorCode::NotOwner));
        assert_eq!(mutex.queue_len(), 0);

        mutex.lock(owner).unwrap();
        assert_eq!(mutex.unlock(other), Err(ErrorCode::NotOwner));
        assert_eq!(mutex.last_error(), Some(ErrorCode::NotOwner));

        // State is untouched
        assert_eq!(mutex.owner(), Some(owner));
        assert!(mutex.is_locked());
        assert_eq!(mutex.queue_len(), 1);

        assert_eq!(mutex.unlock(owner), Ok(()));
        assert_eq!(mutex.unlock(owner), Err(ErrorCode::NotOwner));
    }

    #[test]
    fn fifo_order() {
        const NUM_THREADS : usize = 8;

        let mutex = Arc::new(RawFairMutex::new());
        let order = Arc::new(OrderLog::new(Vec::new()));
        let main = get_thread_id();

        mutex.lock(main).unwrap();

        let mut handles = Vec::new();
        for idx in 0..NUM_THREADS {
            let waiter_mutex = mutex.clone();
            let order = order.clone();
            handles.push(thread::spawn(move || {
                let thread = get_thread_id();
                waiter_mutex.lock(thread).unwrap();
                order.lock().push(idx);
                waiter_mutex.unlock(thread).unwrap();
            }));

            // Wait until the thread has drawn its ticket, so tickets are drawn in spawn order
            while mutex.queue_len() != idx + 2 {
                thread::yield_now();
            }
        }

        mutex.unlock(main).unwrap();
        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(*order.lock(), (0..NUM_THREADS).collect::<Vec<_>>());
    }

    #[test]
    fn no_starvation() {
        // A thread re-acquiring the lock right after releasing it must queue behind a waiting thread
        let mutex = Arc::new(RawFairMutex::new());
        let served = Arc::new(core::sync::atomic::AtomicBool::new(false));
        let main = get_thread_id();

        mutex.lock(main).unwrap();
        let waiter = {
            let mutex = mutex.clone();
            let served = served.clone();
            thread::spawn(move || {
                let thread = get_thread_id();
                mutex.lock(thread).unwrap();
                served.store(true, Ordering::Relaxed);
                mutex.unlock(thread).unwrap();
            })
        };
        while mutex.queue_len() != 2 {
            thread::yield_now();
        }

        mutex.unlock(main).unwrap();
        mutex.lock(main).unwrap();
        assert!(served.load(Ordering::Relaxed));
        mutex.unlock(main).unwrap();
        waiter.join().unwrap();
    }

    #[test]
    fn contended_counter() {
        const NUM_THREADS : usize = 4;
        const ITERS : usize = 2_000;

        struct Shared {
            mutex : RawFairMutex,
            count : core::cell::UnsafeCell<usize>,
        }
        unsafe impl Sync for Shared {}

        let shared = Arc::new(Shared { mutex: RawFairMutex::new(), count: core::cell::UnsafeCell::new(0) });
        let handles = (0..NUM_THREADS).map(|_| {
            let shared = shared.clone();
            thread::spawn(move || {
                let thread = get_thread_id();
                for _ in 0..ITERS {
                    shared.mutex.lock(thread).unwrap();
                    unsafe { *shared.count.get() += 1 };
                    shared.mutex.unlock(thread).unwrap();
                }
            })
        }).collect::<Vec<_>>();

        for handle in handles {
            handle.join().unwrap();
        }
        assert_eq!(unsafe { *shared.count.get() }, NUM_THREADS * ITERS);
        assert_eq!(shared.mutex.queue_len(), 0);
    }

    #[test]
    fn parked_waiter_is_woken() {
        let mutex = Arc::new(RawFairMutex::new());
        let main = get_thread_id();
        mutex.lock(main).unwrap();

        let waiter = {
            let mutex = mutex.clone();
            thread::spawn(move || {
                let thread = get_thread_id();
                mutex.lock(thread).unwrap();
                mutex.unlock(thread).unwrap();
            })
        };

        // Give the waiter enough time to exhaust its spins and park
        thread::sleep(Duration::from_millis(50));
        mutex.unlock(main).unwrap();
        waiter.join().unwrap();
        assert!(!mutex.is_locked());
    }
}
