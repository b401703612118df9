use core::{
    fmt,
    marker::PhantomData,
    mem,
    num::NonZeroU64,
    sync::atomic::{AtomicU64, Ordering},
};
use std::alloc::{self, Layout};

use tally_core_macros::EnumDisplay;

use crate::{
    error::{self, ErrorCode, Result},
    sync::{lock_imp::RawMutex, RawFairMutex, RawReentrantMutex},
    sys::{self, ThreadId},
};
use super::Lifecycle;

/// Kind of mutex installed by [`ThreadSafety::enable_with`].
#[derive(Clone, Copy, PartialEq, Eq, Debug, Default, EnumDisplay)]
pub enum MutexKind {
    /// Fair, non-reentrant mutex: re-locking from the owning thread fails with [`ErrorCode::AlreadyLocked`].
    #[default]
    #[display("fair")]
    Fair,
    /// Reentrant mutex: the owning thread may lock it again, and needs a matching number of unlocks.
    #[display("reentrant")]
    Reentrant,
}

/// Stable identity of a guarded object.
///
/// Ids are assigned in increasing order at construction and are never reused, which gives every pair of objects a fixed lock order.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
pub struct InstanceId(NonZeroU64);

impl InstanceId {
    /// Get the next unused id
    pub fn next() -> InstanceId {
        static NEXT_INSTANCE_ID : AtomicU64 = AtomicU64::new(1);
        let id = NEXT_INSTANCE_ID.fetch_add(1, Ordering::Relaxed);
        // The counter starts at 1 and can't realistically wrap
        match NonZeroU64::new(id) {
            Some(id) => InstanceId(id),
            None => std::process::abort(),
        }
    }

    /// Get the id as a u64
    pub const fn as_u64(&self) -> u64 {
        self.0.get()
    }
}

impl fmt::Display for InstanceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

//------------------------------------------------------------------------------------------------------------------------------

enum InstalledMutex {
    Fair(RawFairMutex),
    Reentrant(RawReentrantMutex),
}

impl InstalledMutex {
    fn new(kind: MutexKind) -> Self {
        match kind {
            MutexKind::Fair => InstalledMutex::Fair(RawFairMutex::new()),
            MutexKind::Reentrant => InstalledMutex::Reentrant(RawReentrantMutex::new()),
        }
    }

    // Allocate the mutex on the heap, reporting allocation failure instead of aborting.
    // The parking lot keys waiters on the mutex address, so it must not move while installed.
    fn try_boxed(kind: MutexKind) -> Result<Box<InstalledMutex>> {
        let layout = Layout::new::<InstalledMutex>();
        // SAFETY: `InstalledMutex` is not zero-sized
        let ptr = unsafe { alloc::alloc(layout) } as *mut InstalledMutex;
        if ptr.is_null() {
            return Err(ErrorCode::OutOfMemory);
        }
        // SAFETY: `ptr` is a fresh allocation with the layout of `InstalledMutex`, which `Box` will free with the same layout
        unsafe {
            ptr.write(InstalledMutex::new(kind));
            Ok(Box::from_raw(ptr))
        }
    }

    fn kind(&self) -> MutexKind {
        match self {
            InstalledMutex::Fair(_) => MutexKind::Fair,
            InstalledMutex::Reentrant(_) => MutexKind::Reentrant,
        }
    }

    fn lock(&self, thread: ThreadId) -> Result<()> {
        match self {
            InstalledMutex::Fair(mutex) => mutex.lock(thread),
            InstalledMutex::Reentrant(mutex) => mutex.lock(thread),
        }
    }

    fn try_lock(&self, thread: ThreadId) -> Result<()> {
        match self {
            InstalledMutex::Fair(mutex) => mutex.try_lock(thread),
            InstalledMutex::Reentrant(mutex) => mutex.try_lock(thread),
        }
    }

    fn unlock(&self, thread: ThreadId) -> Result<()> {
        match self {
            InstalledMutex::Fair(mutex) => mutex.unlock(thread),
            InstalledMutex::Reentrant(mutex) => mutex.unlock(thread),
        }
    }

    fn is_owned_by(&self, thread: ThreadId) -> bool {
        match self {
            InstalledMutex::Fair(mutex) => mutex.is_owned_by(thread),
            InstalledMutex::Reentrant(mutex) => mutex.is_owned_by(thread),
        }
    }
}

static_assertions::const_assert!(mem::size_of::<InstalledMutex>() != 0);

/// Opt-in thread-safety for a guarded object.
///
/// Objects start out without a mutex, in which case locking succeeds without doing anything and reports that no lock was acquired.
/// [`enable`](ThreadSafety::enable) installs a mutex, after which every accessor of the owning object locks it before touching its data.
///
/// `lock` reports whether a lock was actually taken, and the result should be passed back to `unlock`, so call sites can lock and unlock symmetrically,
/// regardless of whether thread-safety is enabled.
pub struct ThreadSafety {
    id    : InstanceId,
    mutex : Option<Box<InstalledMutex>>,
}

impl ThreadSafety {
    /// Create a new mixin without a mutex, with a fresh instance id
    pub fn new() -> Self {
        Self { id: InstanceId::next(), mutex: None }
    }

    /// Get the id of the owning object
    #[inline]
    pub fn id(&self) -> InstanceId {
        self.id
    }

    /// Install a fair mutex, see [`enable_with`](ThreadSafety::enable_with).
    pub fn enable(&mut self) -> Result<()> {
        self.enable_with(MutexKind::Fair)
    }

    /// Install a mutex of the given kind.
    ///
    /// Enabling thread-safety when a mutex is already installed succeeds and keeps the existing mutex, whatever its kind.
    /// Fails with [`ErrorCode::OutOfMemory`] if the mutex can't be allocated, in which case no mutex is installed.
    pub fn enable_with(&mut self, kind: MutexKind) -> Result<()> {
        let res = if self.mutex.is_some() {
            Ok(())
        } else {
            InstalledMutex::try_boxed(kind).map(|mutex| self.mutex = Some(mutex))
        };
        error::track(res)
    }

    /// Remove the installed mutex, if any.
    ///
    /// Valid in any lifecycle state.
    pub fn disable(&mut self) {
        self.mutex = None;
    }

    /// Check if a mutex is installed
    #[inline]
    pub fn is_thread_safe(&self) -> bool {
        self.mutex.is_some()
    }

    /// Get the kind of the installed mutex
    pub fn kind(&self) -> Option<MutexKind> {
        self.mutex.as_ref().map(|mutex| mutex.kind())
    }

    /// Lock the installed mutex, blocking until it's available.
    ///
    /// Returns whether a lock was acquired, which is `false` when no mutex is installed.
    pub fn lock(&self) -> Result<bool> {
        let res = match &self.mutex {
            Some(mutex) => mutex.lock(sys::get_thread_id()).map(|_| true),
            None => Ok(false),
        };
        error::track(res)
    }

    /// Try to lock the installed mutex without blocking.
    ///
    /// Returns whether a lock was acquired, which is `false` when no mutex is installed.
    pub fn try_lock(&self) -> Result<bool> {
        let res = match &self.mutex {
            Some(mutex) => mutex.try_lock(sys::get_thread_id()).map(|_| true),
            None => Ok(false),
        };
        error::track(res)
    }

    /// Unlock the mutex, if `acquired` is set.
    ///
    /// `acquired` is the value returned by the matching `lock` or `try_lock`.
    pub fn unlock(&self, acquired: bool) -> Result<()> {
        error::track(self.unlock_raw(acquired))
    }

    fn unlock_raw(&self, acquired: bool) -> Result<()> {
        if !acquired {
            return Ok(());
        }
        match &self.mutex {
            Some(mutex) => mutex.unlock(sys::get_thread_id()),
            None => Err(ErrorCode::NotOwner),
        }
    }

    /// Check if the installed mutex is held by the current thread
    pub fn is_locked_by_current_thread(&self) -> bool {
        self.mutex.as_ref().map_or(false, |mutex| mutex.is_owned_by(sys::get_thread_id()))
    }

    /// Lock the installed mutex, returning a guard which unlocks it when dropped.
    pub fn lock_scoped(&self) -> Result<ThreadSafetyGuard<'_>> {
        self.lock().map(|acquired| ThreadSafetyGuard::new(self, acquired))
    }

    /// Try to lock the installed mutex without blocking, returning a guard which unlocks it when dropped.
    pub fn try_lock_scoped(&self) -> Result<ThreadSafetyGuard<'_>> {
        self.try_lock().map(|acquired| ThreadSafetyGuard::new(self, acquired))
    }
}

impl Default for ThreadSafety {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for ThreadSafety {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ThreadSafety")
            .field("id", &self.id)
            .field("kind", &self.kind())
        .finish()
    }
}

static_assertions::assert_impl_all!(ThreadSafety: Send, Sync);

/// RAII guard of a [`ThreadSafety`] lock.
///
/// The guard may not hold a lock, either because no mutex was installed, or because it's the inert half of a [`lock_pair`](super::lock_pair) on a single object.
///
/// Dropping the guard does not touch the thread's last error, so an operation can drop its guard before tracking its own result.
#[must_use = "if unused the lock will immediately be released"]
pub struct ThreadSafetyGuard<'a> {
    mixin  : Option<&'a ThreadSafety>,
    // Unlocking has to happen on the locking thread
    marker : PhantomData<*mut ()>,
}

impl<'a> ThreadSafetyGuard<'a> {
    fn new(mixin: &'a ThreadSafety, acquired: bool) -> Self {
        Self { mixin: acquired.then_some(mixin), marker: PhantomData }
    }

    /// Create a guard which doesn't hold any lock
    pub fn inert() -> Self {
        Self { mixin: None, marker: PhantomData }
    }

    /// Check if the guard holds a lock
    #[inline]
    pub fn acquired(&self) -> bool {
        self.mixin.is_some()
    }
}

impl Drop for ThreadSafetyGuard<'_> {
    fn drop(&mut self) {
        if let Some(mixin) = self.mixin {
            let last_error = error::last_error();
            let res = mixin.unlock_raw(true);
            error::set_last_error(last_error);
            debug_assert_eq!(res, Ok(()), "ThreadSafetyGuard failed to unlock");
        }
    }
}

impl fmt::Debug for ThreadSafetyGuard<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ThreadSafetyGuard")
            .field("acquired", &self.acquired())
        .finish()
    }
}

/// An object embedding a lifecycle guard and a thread-safety mixin.
pub trait Guarded {
    /// Get the object's lifecycle guard
    fn lifecycle(&self) -> &Lifecycle;

    /// Get the object's thread-safety mixin
    fn thread_safety(&self) -> &ThreadSafety;
}
