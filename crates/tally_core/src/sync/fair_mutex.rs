// Portions of the project have been copied from parking_lot and is copyrighted by Amanieu d'Antra under the MIT license (located in: '3rd-party-licenses/parking_lot')
use super::raw_fair_mutex::RawFairMutex;
use super::lock_imp;

/// A mutual exclusion primitive that is always fair, useful for protecting shared data.
/// 
/// This mutex will block threads waiting for the lock to become available.
/// The mutex can be statically initialized or created by the `new` constructor.
/// Each mutex has a type parameter which represents the data that it is protecting.
/// The data can only be accessed through the RAII guards returned from `lock` and `try_lock`, which guarantees that the data is only ever accessed when the mutex is locked.
/// 
/// In a fair mutex the waiters form a queue, and the lock is always granted to the next requester in the queue, in first-in first-out order.
/// This ensures that one thread cannot starve others by quickly re-acquiring the lock after releasing it.
/// 
/// A fair mutex may not be interesting if threads have different priorities (this is known as priority inversion)
/// 
/// # Differences from the standard library `Mutex`
/// 
/// - No poisoning, the lock is released normally on panic.
/// - Can be statically constructed.
/// - Locking the mutex from the thread that already holds it returns an error instead of deadlocking.
/// - Guards are tied to the locking thread and can't be sent to another thread.
pub type FairMutex<T> = lock_imp::Mutex<RawFairMutex, T>;

/// An RAII implementation of a "scoped lock" of a mutex.
/// When this structure is dropped (falls out of scope), the lock will be unlocked.
/// 
/// The data protected by the mutex can be accessed through this guard via its `Deref` and `DerefMut` implementations.
pub type FairMutexGuard<'a, T> = lock_imp::MutexGuard<'a, RawFairMutex, T>;
