use core::{cell::UnsafeCell, mem, ptr};

use tally_core::{
    error::{ErrorCode, Result},
    guard::{lock_initialized_pair, Guarded, InstanceId, Lifecycle, LifecycleState, MutexKind, ThreadSafety, ThreadSafetyGuard},
};
use tally_logging::{log_verbose, log_warning};

use crate::RECORDS;

/// Data of a guarded record, together with its lifecycle guard and thread-safety mixin.
///
/// Access rules for the data:
/// - through `&mut self`, the data can always be accessed directly.
/// - through `&self`, the data is read under the mixin's lock, if one is installed.
/// - through `&self`, the data may only be written while holding the mixin's lock, so writing requires thread-safety to be enabled.
///
/// Enabling and disabling thread-safety needs `&mut self`, so the lock can't appear or disappear while the data is shared.
pub(crate) struct GuardedCell<D> {
    lifecycle     : Lifecycle,
    thread_safety : ThreadSafety,
    data          : UnsafeCell<D>,
}

// SAFETY: Shared writes only happen while holding the installed mutex, see the access rules above
unsafe impl<D: Send + Sync> Sync for GuardedCell<D> {}

impl<D: Default> GuardedCell<D> {
    pub fn new() -> Self {
        Self {
            lifecycle: Lifecycle::new(),
            thread_safety: ThreadSafety::new(),
            data: UnsafeCell::new(D::default()),
        }
    }

    // Coming back from `Destroyed`, the cell is reset to a fresh state, without a mutex
    fn reset(&mut self, previous: LifecycleState, operation: &'static str) {
        if previous == LifecycleState::Destroyed {
            log_verbose!(RECORDS, "{operation}: re-initializing {}", self.id());
            self.thread_safety.disable();
        }
    }

    pub fn initialize(&mut self, operation: &'static str) -> Result<()> {
        self.initialize_with(D::default(), operation)
    }

    pub fn initialize_with(&mut self, data: D, operation: &'static str) -> Result<()> {
        let previous = self.lifecycle.state();
        self.lifecycle.initialize()?;
        self.reset(previous, operation);
        *self.data.get_mut() = data;
        Ok(())
    }

    pub fn initialize_copy(&mut self, src: &Self, operation: &'static str) -> Result<()>
    where
        D: Clone
    {
        Lifecycle::ensure_copyable(&self.lifecycle, &src.lifecycle, operation);
        let data = src.read(operation, |data| Ok(data.clone()))?;
        let previous = self.lifecycle.state();
        self.lifecycle.initialize_from(&src.lifecycle, operation);
        self.reset(previous, operation);
        *self.data.get_mut() = data;
        Ok(())
    }

    pub fn initialize_move(&mut self, src: &mut Self, operation: &'static str) {
        let previous = self.lifecycle.state();
        self.lifecycle.initialize_from(&src.lifecycle, operation);
        self.reset(previous, operation);
        *self.data.get_mut() = mem::take(src.data.get_mut());
    }

    pub fn destroy(&mut self) -> Result<()> {
        self.lifecycle.destroy()?;
        *self.data.get_mut() = D::default();
        Ok(())
    }
}

impl<D> GuardedCell<D> {
    pub fn id(&self) -> InstanceId {
        self.thread_safety.id()
    }

    pub fn state(&self) -> LifecycleState {
        self.lifecycle.state()
    }

    pub fn enable_thread_safety(&mut self, kind: MutexKind, operation: &'static str) -> Result<()> {
        self.lifecycle.ensure_initialized(operation);
        if !self.thread_safety.is_thread_safe() {
            self.thread_safety.enable_with(kind)?;
            log_verbose!(RECORDS, "{operation}: thread-safety enabled for {} ({kind})", self.id());
        }
        Ok(())
    }

    pub fn disable_thread_safety(&mut self, operation: &'static str) {
        if self.thread_safety.is_thread_safe() {
            self.thread_safety.disable();
            log_verbose!(RECORDS, "{operation}: thread-safety disabled for {}", self.id());
        }
    }

    pub fn thread_safety(&self, operation: &'static str) -> &ThreadSafety {
        self.lifecycle.ensure_initialized(operation);
        &self.thread_safety
    }

    pub fn get_mut(&mut self, operation: &'static str) -> &mut D {
        self.lifecycle.ensure_initialized(operation);
        self.data.get_mut()
    }

    /// Read the data under the lock.
    pub fn read<U, F>(&self, operation: &'static str, f: F) -> Result<U>
    where
        F: FnOnce(&D) -> Result<U>
    {
        self.lifecycle.ensure_initialized(operation);
        let _guard = self.thread_safety.lock_scoped()?;
        // SAFETY: Shared writes are excluded by the lock, or impossible without a mutex
        f(unsafe { &*self.data.get() })
    }

    /// Write the data through a shared reference, which requires thread-safety.
    pub fn write<U, F>(&self, operation: &'static str, f: F) -> Result<U>
    where
        F: FnOnce(&mut D) -> Result<U>
    {
        self.lifecycle.ensure_initialized(operation);
        let guard = self.thread_safety.lock_scoped()?;
        if !guard.acquired() {
            return Err(ErrorCode::NotThreadSafe);
        }
        // SAFETY: We hold the lock, and none of our callers keep a reference to the data while calling back into the cell
        f(unsafe { &mut *self.data.get() })
    }

    fn lock_pair_logged<'a>(&'a self, other: &'a Self, operation: &'static str) -> Result<(ThreadSafetyGuard<'a>, ThreadSafetyGuard<'a>)> {
        lock_initialized_pair(self, other, operation).map_err(|err| {
            log_warning!(RECORDS, "{operation}: locking {} and {} failed: {err}", self.id(), other.id());
            err
        })
    }

    /// Read the data of 2 cells, which may be the same.
    pub fn read_pair<U, F>(&self, other: &Self, operation: &'static str, f: F) -> Result<U>
    where
        F: FnOnce(&D, &D) -> U
    {
        let _guards = self.lock_pair_logged(other, operation)?;
        // SAFETY: Both cells are locked, shared references may alias
        let (lhs, rhs) = unsafe { (&*self.data.get(), &*other.data.get()) };
        Ok(f(lhs, rhs))
    }

    /// Update this cell's data from the data of `src`.
    ///
    /// When `src` is this cell, `f` receives a snapshot of the data as source.
    pub fn write_from<F>(&self, src: &Self, operation: &'static str, f: F) -> Result<()>
    where
        D: Clone,
        F: FnOnce(&mut D, &D)
    {
        let (guard, _src_guard) = self.lock_pair_logged(src, operation)?;
        if !guard.acquired() {
            return Err(ErrorCode::NotThreadSafe);
        }

        if ptr::eq(self, src) {
            // SAFETY: We hold the lock
            let data = unsafe { &mut *self.data.get() };
            let snapshot = data.clone();
            f(data, &snapshot);
        } else {
            // SAFETY: Both cells are locked, and `src` is a different cell
            let (dest, src) = unsafe { (&mut *self.data.get(), &*src.data.get()) };
            f(dest, src);
        }
        Ok(())
    }

    /// Swap the data of 2 cells, both need thread-safety.
    pub fn swap(&self, other: &Self, operation: &'static str) -> Result<()> {
        let (guard, other_guard) = self.lock_pair_logged(other, operation)?;
        if ptr::eq(self, other) {
            return if guard.acquired() { Ok(()) } else { Err(ErrorCode::NotThreadSafe) };
        }
        if !guard.acquired() || !other_guard.acquired() {
            return Err(ErrorCode::NotThreadSafe);
        }
        // SAFETY: Both cells are locked and distinct
        unsafe { ptr::swap(self.data.get(), other.data.get()) };
        Ok(())
    }
}

impl<D> Guarded for GuardedCell<D> {
    fn lifecycle(&self) -> &Lifecycle {
        &self.lifecycle
    }

    fn thread_safety(&self) -> &ThreadSafety {
        &self.thread_safety
    }
}

impl<D> Drop for GuardedCell<D> {
    fn drop(&mut self) {
        self.lifecycle.release();
    }
}
