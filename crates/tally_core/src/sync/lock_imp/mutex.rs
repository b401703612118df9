// Portions of the project have been copied from parking_lot and is copyrighted by Amanieu d'Antra under the MIT license (located in: '3rd-party-licenses/parking_lot')
use core::{
    fmt,
    cell::UnsafeCell,
    marker::PhantomData,
    ops::{Deref, DerefMut}
};
use crate::{
    error::{self, ErrorCode, Result},
    sys::{self, ThreadId},
};

/// Basic operations for a mutex
///
/// Types implementing this trait can be used by `Mutex` to form a safe and fully-functioning mutex type.
///
/// Every operation receives the id of the thread performing it, so the raw mutex can track its owner.
///
/// # Safety
///
/// Implementations of this trait must ensure that the mutex is actually exclusive: a lock can't be acquired while the mutex is already locked,
/// and `unlock` must fail with [`ErrorCode::NotOwner`] when `thread` is not the current owner.
/// A successful `lock` or `try_lock` by a thread that already owns the mutex is not allowed, as `Mutex` hands out mutable references to its data.
pub unsafe trait RawMutex {
    /// Initial value for an unlocked mutex.
    /// A "non-constant" const item is a legacy way to supply an initialized value to downstream static items.
    /// Can hopefully be replaced with `const fn new() -> Self` at some point.
    const INIT : Self;

    /// Marker type which determines whether a lock guard should be `Send`.
    /// Use the `GuardNoSend` helper type here, unless the guard can be unlocked from any thread
    type GuardMarker;

    /// Acquires this mutex, blocking the current thread until it is able to do so.
    ///
    /// Fails with [`ErrorCode::AlreadyLocked`] when `thread` already holds the mutex.
    fn lock(&self, thread: ThreadId) -> Result<()>;

    /// Attempts to acquire this mutex without blocking.
    ///
    /// Fails with [`ErrorCode::AlreadyLocked`] when any thread, including `thread`, holds the mutex.
    fn try_lock(&self, thread: ThreadId) -> Result<()>;

    /// Unlocks the mutex.
    ///
    /// Fails with [`ErrorCode::NotOwner`] when `thread` does not hold the mutex, in which case the mutex is left untouched.
    fn unlock(&self, thread: ThreadId) -> Result<()>;

    /// Get the thread currently holding the mutex, if any.
    fn owner(&self) -> Option<ThreadId>;

    /// Checks whether the mutex is currently locked.
    #[inline]
    fn is_locked(&self) -> bool {
        self.owner().is_some()
    }

    /// Checks whether the mutex is currently held by `thread`.
    #[inline]
    fn is_owned_by(&self, thread: ThreadId) -> bool {
        self.owner() == Some(thread)
    }
}

/// A mutual exclusion primitive useful for protecting shared data.
///
/// This mutex will block threads for the lock to become available.
pub struct Mutex<R, T: ?Sized> {
    raw  : R,
    data : UnsafeCell<T>,
}

unsafe impl<R: RawMutex + Send, T: ?Sized + Send> Send for Mutex<R, T> {}
unsafe impl<R: RawMutex + Sync, T: ?Sized + Send> Sync for Mutex<R, T> {}

impl<R: RawMutex, T> Mutex<R, T> {
    /// Creates a new mutex in an unlocked state ready for use
    #[inline]
    pub const fn new(val: T) -> Mutex<R, T> {
        Mutex {
            raw: R::INIT,
            data: UnsafeCell::new(val)
        }
    }

    /// Consume this mutex, returning the underlying data
    #[inline]
    pub fn into_inner(self) -> T {
        self.data.into_inner()
    }
}

impl<R: RawMutex, T: ?Sized> Mutex<R, T> {
    /// # Safety
    ///
    /// The lock must be held by `thread` when calling this method
    unsafe fn guard(&self, thread: ThreadId) -> MutexGuard<'_, R, T> {
        MutexGuard { mutex: self, thread, marker: PhantomData }
    }

    /// Acquires a mutex, blocking the current thread until it is able to do so
    ///
    /// This function will block the local thread until it is available to acquire the mutex.
    /// Upon returning the thread is the only thread with the mutex held.
    /// An RAII guard is returned to allow scoped unlock of the lock.
    /// When the guard goes out of scope, the mutex will be unlocked.
    ///
    /// Attempts to lock a mutex in the thread which already holds the lock fail with [`ErrorCode::AlreadyLocked`].
    #[inline]
    pub fn lock(&self) -> Result<MutexGuard<'_, R, T>> {
        let thread = sys::get_thread_id();
        let res = self.raw.lock(thread);
        // SAFETY: the lock is held, as required
        error::track(res.map(|_| unsafe { self.guard(thread) }))
    }

    /// Attemps to acquire this lock.
    ///
    /// If the lock could not be acquired at this time, then [`ErrorCode::AlreadyLocked`] is returned.
    /// Otherwise, an RAII guard is returned.
    /// The lock will be unlocked when the guard is dropped.
    ///
    /// This function does not block
    #[inline]
    pub fn try_lock(&self) -> Result<MutexGuard<'_, R, T>> {
        let thread = sys::get_thread_id();
        let res = self.raw.try_lock(thread);
        // SAFETY: The lock is held, as required
        error::track(res.map(|_| unsafe { self.guard(thread) }))
    }

    /// returns a mutable reference to the underlying data
    ///
    /// Since this call borrows the `Mutex` mutably, no actual locking needs to take place --- The mutable borrow statically guarantees no lock exists
    #[inline]
    pub fn get_mut(&mut self) -> &mut T {
        self.data.get_mut()
    }

    /// Checks whether the mutex is currently locked
    #[inline]
    pub fn is_locked(&self) -> bool {
        self.raw.is_locked()
    }

    /// Checks whether the mutex is currently held by the current thread
    #[inline]
    pub fn is_owned_by_current_thread(&self) -> bool {
        self.raw.is_owned_by(sys::get_thread_id())
    }
}

impl<R: RawMutex, T: ?Sized + Default> Default for Mutex<R, T> {
    #[inline]
    fn default() -> Self {
        Mutex::new(Default::default())
    }
}

impl<R: RawMutex, T> From<T> for Mutex<R, T> {
    #[inline]
    fn from(t: T) -> Self {
        Mutex::new(t)
    }
}

impl<R: RawMutex, T: ?Sized + fmt::Debug> fmt::Debug for Mutex<R, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.try_lock() {
            Ok(guard) => f.debug_struct("Mutex").field("data", &&*guard).finish(),
            Err(_) => {
                struct LockedPlaceholder;
                impl fmt::Debug for LockedPlaceholder {
                    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                        f.write_str("<locked>")
                    }
                }

                f.debug_struct("Mutex")
                    .field("data", &LockedPlaceholder)
                .finish()
            }
        }
    }
}

/// An RAII implementation of a "scoped lock" of a mutex.
/// When this structure is dropped (falls out of scope), the lock will be unlocked.
///
/// The data protected by the mutex can be accessed through this guard via its `Deref` and `DerefMut` implementation.
#[must_use = "if unused the mutex will immediataly unlock"]
pub struct MutexGuard<'a, R: RawMutex, T: ?Sized> {
    mutex  : &'a Mutex<R, T>,
    thread : ThreadId,
    marker : PhantomData<(&'a mut T, R::GuardMarker)>,
}

unsafe impl<'a, R: RawMutex + Sync + 'a, T: ?Sized + Sync + 'a> Sync for MutexGuard<'a, R, T> {}

impl<'a, R: RawMutex + 'a, T: ?Sized + 'a> MutexGuard<'a, R, T> {
    /// Temporarily unlocks the mutex to execute the given function.
    ///
    /// This is safe because `&mut` guarantees that there exists no other references to the data protected by this mutex.
    #[inline]
    pub fn unlocked<F, U>(s: &mut Self, f: F) -> U
    where
        F : FnOnce() -> U,
    {
        let mutex = s.mutex;
        let thread = s.thread;
        // A MutexGuard always holds the lock, so the unlock can't fail
        _ = mutex.raw.unlock(thread);
        // Relocking can only fail if `thread` still owned the mutex
        scopeguard::defer!(_ = mutex.raw.lock(thread));
        f()
    }
}

impl<'a, R: RawMutex + 'a, T: ?Sized + 'a> Deref for MutexGuard<'a, R, T> {
    type Target = T;

    fn deref(&self) -> &Self::Target {
        unsafe { &*self.mutex.data.get() }
    }
}

impl<'a, R: RawMutex + 'a, T: ?Sized + 'a> DerefMut for MutexGuard<'a, R, T> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        unsafe { &mut *self.mutex.data.get() }
    }
}

impl<'a, R: RawMutex + 'a, T: ?Sized + 'a> Drop for MutexGuard<'a, R, T> {
    fn drop(&mut self) {
        let res = self.mutex.raw.unlock(self.thread);
        debug_assert_ne!(res, Err(ErrorCode::NotOwner), "MutexGuard dropped by a thread that does not own the mutex");
    }
}

impl<'a, R: RawMutex + 'a, T: ?Sized + fmt::Debug + 'a> fmt::Debug for MutexGuard<'a, R, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(&**self, f)
    }
}

impl<'a, R: RawMutex + 'a, T: ?Sized + fmt::Display + 'a> fmt::Display for MutexGuard<'a, R, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        (**self).fmt(f)
    }
}
