use tally_base::func_name;
use tally_core::{
    error::{self, ErrorCode, Result},
    guard::{Guarded, InstanceId, Lifecycle, LifecycleState, MutexKind, ThreadSafety},
};

use crate::cell::GuardedCell;

/// A guarded, growable list of entries.
pub struct Ledger<T> {
    cell: GuardedCell<Vec<T>>,
}

impl<T: Clone> Ledger<T> {
    /// Create a new, uninitialized ledger
    pub fn new() -> Self {
        Self { cell: GuardedCell::new() }
    }

    /// Get the ledger's instance id
    pub fn id(&self) -> InstanceId {
        self.cell.id()
    }

    /// Get the ledger's lifecycle state, valid in any state
    pub fn state(&self) -> LifecycleState {
        self.cell.state()
    }

    /// Initialize an empty ledger
    pub fn initialize(&mut self) -> Result<()> {
        error::track(self.cell.initialize(func_name!()))
    }

    /// Initialize the ledger as a copy of `src`
    pub fn initialize_copy(&mut self, src: &Ledger<T>) -> Result<()> {
        error::track(self.cell.initialize_copy(&src.cell, func_name!()))
    }

    /// Initialize the ledger by taking the entries of `src`, which is left empty
    pub fn initialize_move(&mut self, src: &mut Ledger<T>) -> Result<()> {
        self.cell.initialize_move(&mut src.cell, func_name!());
        error::track(Ok(()))
    }

    /// Destroy the ledger, dropping all entries
    pub fn destroy(&mut self) -> Result<()> {
        error::track(self.cell.destroy())
    }

    pub fn enable_thread_safety(&mut self) -> Result<()> {
        self.enable_thread_safety_with(MutexKind::Fair)
    }

    pub fn enable_thread_safety_with(&mut self, kind: MutexKind) -> Result<()> {
        error::track(self.cell.enable_thread_safety(kind, func_name!()))
    }

    pub fn disable_thread_safety(&mut self) {
        self.cell.disable_thread_safety(func_name!());
    }

    pub fn is_thread_safe(&self) -> bool {
        self.cell.thread_safety(func_name!()).is_thread_safe()
    }

    pub fn lock(&self) -> Result<bool> {
        self.cell.thread_safety(func_name!()).lock()
    }

    pub fn unlock(&self, acquired: bool) -> Result<()> {
        self.cell.thread_safety(func_name!()).unlock(acquired)
    }

    /// Add an entry
    pub fn push(&mut self, value: T) -> Result<()> {
        let entries = self.cell.get_mut(func_name!());
        let res = entries.try_reserve(1)
            .map(|_| entries.push(value))
            .map_err(|_| ErrorCode::OutOfMemory);
        error::track(res)
    }

    /// Add an entry through a shared reference, which requires thread-safety
    pub fn push_shared(&self, value: T) -> Result<()> {
        let res = self.cell.write(func_name!(), |entries| {
            entries.try_reserve(1).map_err(|_| ErrorCode::OutOfMemory)?;
            entries.push(value);
            Ok(())
        });
        error::track(res)
    }

    /// Get a copy of the entry at `index`, fails with [`ErrorCode::InvalidArgument`] when out of bounds
    pub fn get(&self, index: usize) -> Result<T> {
        error::track(self.cell.read(func_name!(), |entries| entries.get(index).cloned().ok_or(ErrorCode::InvalidArgument)))
    }

    pub fn len(&self) -> Result<usize> {
        error::track(self.cell.read(func_name!(), |entries| Ok(entries.len())))
    }

    pub fn is_empty(&self) -> Result<bool> {
        error::track(self.cell.read(func_name!(), |entries| Ok(entries.is_empty())))
    }

    /// Get a copy of all entries
    pub fn to_vec(&self) -> Result<Vec<T>> {
        error::track(self.cell.read(func_name!(), |entries| Ok(entries.clone())))
    }

    /// Append copies of all entries of `other`.
    ///
    /// Appending a ledger to itself duplicates its entries. Requires thread-safety.
    pub fn append_from(&self, other: &Ledger<T>) -> Result<()> {
        error::track(self.cell.write_from(&other.cell, func_name!(), |dest, src| dest.extend_from_slice(src)))
    }

    /// Replace all entries with copies of the entries of `src`, requires thread-safety.
    pub fn assign_from(&self, src: &Ledger<T>) -> Result<()> {
        error::track(self.cell.write_from(&src.cell, func_name!(), |dest, src| dest.clone_from(src)))
    }

    /// Remove all entries
    pub fn clear(&mut self) {
        self.cell.get_mut(func_name!()).clear();
    }
}

impl<T: Clone + PartialEq> Ledger<T> {
    /// Compare the entries of 2 ledgers
    pub fn equals(&self, other: &Ledger<T>) -> Result<bool> {
        error::track(self.cell.read_pair(&other.cell, func_name!(), |lhs, rhs| lhs == rhs))
    }
}

impl<T: Clone> Default for Ledger<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Guarded for Ledger<T> {
    fn lifecycle(&self) -> &Lifecycle {
        self.cell.lifecycle()
    }

    fn thread_safety(&self) -> &ThreadSafety {
        Guarded::thread_safety(&self.cell)
    }
}

static_assertions::assert_impl_all!(Ledger<u64>: Send, Sync);
