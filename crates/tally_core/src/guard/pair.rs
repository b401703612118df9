use core::{ptr, time::Duration};
use std::thread;

use crate::{
    error::{self, ErrorCode, Result},
    sync::SpinWait,
};
use super::{Guarded, Lifecycle, ThreadSafety, ThreadSafetyGuard};

/// Backoff used by [`lock_pair_with`] when the second lock of a pair is contended.
///
/// The first `spins` retries only spin, after which the thread sleeps for `base_sleep` times the number of sleeping retries, up to `max_sleep`.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct PairBackoff {
    /// Number of retries that spin instead of sleeping
    pub spins      : u32,
    /// Sleep of the first sleeping retry
    pub base_sleep : Duration,
    /// Upper bound of the sleep between retries
    pub max_sleep  : Duration,
}

impl PairBackoff {
    /// Backoff used by [`lock_pair`]
    pub const DEFAULT : PairBackoff = PairBackoff {
        spins: 4,
        base_sleep: Duration::from_micros(20),
        max_sleep: Duration::from_millis(1),
    };

    /// Get the time to sleep for the given sleeping retry, starting at 1
    pub fn sleep_for(&self, retry: u32) -> Duration {
        self.base_sleep.saturating_mul(retry.max(1)).min(self.max_sleep)
    }
}

impl Default for PairBackoff {
    fn default() -> Self {
        Self::DEFAULT
    }
}

/// Lock 2 guarded objects, without deadlocking against other threads locking the same objects in the opposite order.
///
/// The guards are returned in the order of the arguments.
/// When `a` and `b` are the same object, it's only locked once, and the second guard is inert.
///
/// See [`lock_pair_with`] for the details.
pub fn lock_pair<'a, T: Guarded + ?Sized>(a: &'a T, b: &'a T) -> Result<(ThreadSafetyGuard<'a>, ThreadSafetyGuard<'a>)> {
    lock_pair_with(a, b, &PairBackoff::DEFAULT)
}

/// Lock 2 guarded objects, using a custom backoff.
///
/// The objects are always locked in the order of their [`InstanceId`](super::InstanceId)s, so all threads contending for the same pair agree on which lock to take first.
/// The first lock is taken blocking, the second only with a `try_lock`.
/// If the second lock is held by another thread, the first lock is released, and both are retried after a backoff,
/// so a thread never blocks on one lock while holding the other.
///
/// Errors other than [`ErrorCode::AlreadyLocked`] on the second lock are returned immediately, without holding either lock.
/// When the second lock is held by the calling thread itself, retrying can never succeed, so this fails with [`ErrorCode::Deadlock`].
pub fn lock_pair_with<'a, T: Guarded + ?Sized>(a: &'a T, b: &'a T, backoff: &PairBackoff) -> Result<(ThreadSafetyGuard<'a>, ThreadSafetyGuard<'a>)> {
    error::track(lock_both(a.thread_safety(), b.thread_safety(), backoff))
}

/// Lock 2 existing objects for an operation reading or writing both, like an assignment or a comparison.
///
/// Aborts if either object is not initialized, see [`Lifecycle::ensure_assignable`].
pub fn lock_initialized_pair<'a, T: Guarded + ?Sized>(dest: &'a T, src: &'a T, operation: &'static str) -> Result<(ThreadSafetyGuard<'a>, ThreadSafetyGuard<'a>)> {
    Lifecycle::ensure_assignable(dest.lifecycle(), src.lifecycle(), operation);
    lock_pair(dest, src)
}

fn lock_both<'a>(a: &'a ThreadSafety, b: &'a ThreadSafety, backoff: &PairBackoff) -> Result<(ThreadSafetyGuard<'a>, ThreadSafetyGuard<'a>)> {
    if ptr::eq(a, b) {
        let guard = a.lock_scoped()?;
        return Ok((guard, ThreadSafetyGuard::inert()));
    }

    let swapped = b.id() < a.id();
    let (first, second) = if swapped { (b, a) } else { (a, b) };

    let mut spin_wait = SpinWait::new();
    let mut retries = 0u32;
    loop {
        let first_guard = first.lock_scoped()?;
        match second.try_lock_scoped() {
            Ok(second_guard) => {
                return Ok(if swapped { (second_guard, first_guard) } else { (first_guard, second_guard) });
            },
            Err(ErrorCode::AlreadyLocked) if second.is_locked_by_current_thread() => return Err(ErrorCode::Deadlock),
            Err(ErrorCode::AlreadyLocked) => {},
            Err(err) => return Err(err),
        }
        drop(first_guard);

        retries = retries.saturating_add(1);
        if retries <= backoff.spins {
            // Past its threshold, a spin wait only signals to block, so fall back to yielding
            if !spin_wait.spin() {
                thread::yield_now();
            }
        } else {
            thread::sleep(backoff.sleep_for(retries - backoff.spins));
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Barrier};

    use crate::guard::MutexKind;
    use super::*;

    struct Node {
        lifecycle     : Lifecycle,
        thread_safety : ThreadSafety,
    }

    impl Node {
        fn new(kind: Option<MutexKind>) -> Self {
            let mut node = Node { lifecycle: Lifecycle::new(), thread_safety: ThreadSafety::new() };
            node.lifecycle.initialize().unwrap();
            if let Some(kind) = kind {
                node.thread_safety.enable_with(kind).unwrap();
            }
            node
        }
    }

    impl Guarded for Node {
        fn lifecycle(&self) -> &Lifecycle {
            &self.lifecycle
        }

        fn thread_safety(&self) -> &ThreadSafety {
            &self.thread_safety
        }
    }

    #[test]
    fn same_instance_locks_once() {
        let node = Node::new(Some(MutexKind::Fair));
        let (first, second) = lock_pair(&node, &node).unwrap();
        assert!(first.acquired());
        assert!(!second.acquired());
        assert!(node.thread_safety.is_locked_by_current_thread());

        drop(first);
        drop(second);
        assert!(!node.thread_safety.is_locked_by_current_thread());
    }

    #[test]
    fn guards_follow_argument_order() {
        let low = Node::new(Some(MutexKind::Fair));
        let high = Node::new(Some(MutexKind::Fair));

        let (high_guard, low_guard) = lock_pair(&high, &low).unwrap();
        assert!(high_guard.acquired() && low_guard.acquired());

        drop(high_guard);
        assert!(!high.thread_safety.is_locked_by_current_thread());
        assert!(low.thread_safety.is_locked_by_current_thread());
        drop(low_guard);
        assert!(!low.thread_safety.is_locked_by_current_thread());
    }

    #[test]
    fn without_thread_safety() {
        let a = Node::new(None);
        let b = Node::new(None);
        let (a_guard, b_guard) = lock_pair(&a, &b).unwrap();
        assert!(!a_guard.acquired());
        assert!(!b_guard.acquired());
    }

    #[test]
    fn second_held_by_caller() {
        let low = Node::new(Some(MutexKind::Fair));
        let high = Node::new(Some(MutexKind::Fair));

        let held = high.thread_safety.lock_scoped().unwrap();
        assert_eq!(lock_pair(&low, &high).err(), Some(ErrorCode::Deadlock));
        assert_eq!(error::last_error(), Some(ErrorCode::Deadlock));
        assert!(!low.thread_safety.is_locked_by_current_thread());
        drop(held);

        let held = low.thread_safety.lock_scoped().unwrap();
        assert_eq!(lock_pair(&low, &high).err(), Some(ErrorCode::AlreadyLocked));
        assert!(!high.thread_safety.is_locked_by_current_thread());
        drop(held);
    }

    #[test]
    fn reentrant_pair_held_by_caller() {
        let a = Node::new(Some(MutexKind::Reentrant));
        let b = Node::new(Some(MutexKind::Reentrant));

        let held = b.thread_safety.lock_scoped().unwrap();
        let (a_guard, b_guard) = lock_pair(&a, &b).unwrap();
        drop((a_guard, b_guard));
        assert!(b.thread_safety.is_locked_by_current_thread());
        drop(held);
        assert!(!b.thread_safety.is_locked_by_current_thread());
    }

    #[test]
    fn waits_for_other_thread() {
        let a = Arc::new(Node::new(Some(MutexKind::Fair)));
        let b = Arc::new(Node::new(Some(MutexKind::Fair)));
        let locked = Arc::new(Barrier::new(2));

        let handle = {
            let b = b.clone();
            let locked = locked.clone();
            thread::spawn(move || {
                let guard = b.thread_safety.lock_scoped().unwrap();
                locked.wait();
                thread::sleep(Duration::from_millis(20));
                drop(guard);
            })
        };

        locked.wait();
        let (a_guard, b_guard) = lock_pair(&*a, &*b).unwrap();
        assert!(a_guard.acquired() && b_guard.acquired());
        drop((a_guard, b_guard));
        handle.join().unwrap();
    }

    #[test]
    fn opposing_order() {
        const ITERATIONS : usize = 1000;

        let a = Arc::new(Node::new(Some(MutexKind::Fair)));
        let b = Arc::new(Node::new(Some(MutexKind::Fair)));

        let handles = (0..2).map(|i| {
            let a = a.clone();
            let b = b.clone();
            thread::spawn(move || {
                for _ in 0..ITERATIONS {
                    let (x, y) = if i == 0 { (&*a, &*b) } else { (&*b, &*a) };
                    let guards = lock_pair(x, y).unwrap();
                    assert!(guards.0.acquired() && guards.1.acquired());
                }
            })
        }).collect::<Vec<_>>();

        for handle in handles {
            handle.join().unwrap();
        }
    }

    #[test]
    fn backoff_is_bounded() {
        let backoff = PairBackoff {
            spins: 0,
            base_sleep: Duration::from_micros(100),
            max_sleep: Duration::from_micros(250),
        };
        assert_eq!(backoff.sleep_for(1), Duration::from_micros(100));
        assert_eq!(backoff.sleep_for(2), Duration::from_micros(200));
        assert_eq!(backoff.sleep_for(3), Duration::from_micros(250));
        assert_eq!(backoff.sleep_for(u32::MAX), Duration::from_micros(250));
        assert_eq!(PairBackoff::default(), PairBackoff::DEFAULT);
    }
}
