use tally_base::func_name;
use tally_core::{
    error::{self, ErrorCode, Result},
    guard::{Guarded, InstanceId, Lifecycle, LifecycleState, MutexKind, ThreadSafety},
};
use tally_core_macros::EnumDisplay;

use crate::cell::GuardedCell;

/// Item rarity
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug, Default, EnumDisplay)]
pub enum Rarity {
    #[default]
    Common,
    Uncommon,
    Rare,
    Epic,
    Legendary,
}

#[derive(Clone, PartialEq, Eq, Debug, Default)]
struct ItemData {
    name     : String,
    /// Price of a single item, in copper
    value    : u64,
    quantity : u32,
    rarity   : Rarity,
}

/// A stack of items in an economy.
///
/// ```
/// use tally_records::{Item, Rarity};
///
/// let mut item = Item::new();
/// item.initialize_with("Iron sword", 1500, 2, Rarity::Uncommon).unwrap();
/// item.enable_thread_safety().unwrap();
///
/// let acquired = item.lock().unwrap();
/// assert!(acquired);
/// item.unlock(acquired).unwrap();
///
/// assert_eq!(item.add_quantity(3), Ok(5));
/// assert_eq!(item.value(), Ok(1500));
/// ```
pub struct Item {
    cell: GuardedCell<ItemData>,
}

impl Item {
    /// Create a new, uninitialized item
    pub fn new() -> Self {
        Self { cell: GuardedCell::new() }
    }

    /// Get the item's instance id
    pub fn id(&self) -> InstanceId {
        self.cell.id()
    }

    /// Get the item's lifecycle state, valid in any state
    pub fn state(&self) -> LifecycleState {
        self.cell.state()
    }

    /// Initialize the item with an empty, common payload.
    ///
    /// Initializing a destroyed item resets it to a fresh state, with thread-safety disabled.
    pub fn initialize(&mut self) -> Result<()> {
        error::track(self.cell.initialize(func_name!()))
    }

    /// Initialize the item with the given payload
    pub fn initialize_with(&mut self, name: impl Into<String>, value: u64, quantity: u32, rarity: Rarity) -> Result<()> {
        let data = ItemData { name: name.into(), value, quantity, rarity };
        error::track(self.cell.initialize_with(data, func_name!()))
    }

    /// Initialize the item as a copy of `src`.
    ///
    /// Thread-safety is not copied. Aborts if this item is initialized, or if `src` isn't.
    pub fn initialize_copy(&mut self, src: &Item) -> Result<()> {
        error::track(self.cell.initialize_copy(&src.cell, func_name!()))
    }

    /// Initialize the item by moving the payload out of `src`, which keeps an empty payload.
    ///
    /// Aborts if this item is initialized, or if `src` isn't.
    pub fn initialize_move(&mut self, src: &mut Item) -> Result<()> {
        self.cell.initialize_move(&mut src.cell, func_name!());
        error::track(Ok(()))
    }

    /// Create an initialized copy of this item, using the same kind of mutex if thread-safety is enabled
    pub fn try_clone(&self) -> Result<Item> {
        let res = (|| -> Result<Item> {
            let mut item = Item::new();
            item.cell.initialize_copy(&self.cell, func_name!())?;
            if let Some(kind) = self.cell.thread_safety(func_name!()).kind() {
                item.cell.enable_thread_safety(kind, func_name!())?;
            }
            Ok(item)
        })();
        error::track(res)
    }

    /// Destroy the item.
    ///
    /// Fails with [`ErrorCode::InvalidState`] if the item is not initialized.
    pub fn destroy(&mut self) -> Result<()> {
        error::track(self.cell.destroy())
    }

    /// Enable thread-safety with a fair mutex
    pub fn enable_thread_safety(&mut self) -> Result<()> {
        self.enable_thread_safety_with(MutexKind::Fair)
    }

    /// Enable thread-safety with the given kind of mutex
    pub fn enable_thread_safety_with(&mut self, kind: MutexKind) -> Result<()> {
        error::track(self.cell.enable_thread_safety(kind, func_name!()))
    }

    /// Disable thread-safety, valid in any state
    pub fn disable_thread_safety(&mut self) {
        self.cell.disable_thread_safety(func_name!());
    }

    /// Check if thread-safety is enabled
    pub fn is_thread_safe(&self) -> bool {
        self.cell.thread_safety(func_name!()).is_thread_safe()
    }

    /// Lock the item, returning whether a lock was acquired
    pub fn lock(&self) -> Result<bool> {
        self.cell.thread_safety(func_name!()).lock()
    }

    /// Unlock the item, `acquired` is the result of the matching `lock`
    pub fn unlock(&self, acquired: bool) -> Result<()> {
        self.cell.thread_safety(func_name!()).unlock(acquired)
    }

    /// Get the name
    pub fn name(&self) -> Result<String> {
        error::track(self.cell.read(func_name!(), |data| Ok(data.name.clone())))
    }

    /// Get the price of a single item, in copper
    pub fn value(&self) -> Result<u64> {
        error::track(self.cell.read(func_name!(), |data| Ok(data.value)))
    }

    /// Get the number of items in the stack
    pub fn quantity(&self) -> Result<u32> {
        error::track(self.cell.read(func_name!(), |data| Ok(data.quantity)))
    }

    /// Get the rarity
    pub fn rarity(&self) -> Result<Rarity> {
        error::track(self.cell.read(func_name!(), |data| Ok(data.rarity)))
    }

    /// Get the worth of the whole stack, in copper.
    ///
    /// The value and quantity are read through their getters while holding the lock,
    /// so with a fair mutex this fails with [`ErrorCode::AlreadyLocked`], and only a reentrant mutex allows it.
    pub fn worth(&self) -> Result<u64> {
        let res = self.cell.read(func_name!(), |_| {
            let value = self.value()?;
            let quantity = self.quantity()?;
            value.checked_mul(quantity as u64).ok_or(ErrorCode::Overflow)
        });
        error::track(res)
    }

    pub fn set_name(&mut self, name: impl Into<String>) {
        self.cell.get_mut(func_name!()).name = name.into();
    }

    pub fn set_value(&mut self, value: u64) {
        self.cell.get_mut(func_name!()).value = value;
    }

    pub fn set_quantity(&mut self, quantity: u32) {
        self.cell.get_mut(func_name!()).quantity = quantity;
    }

    pub fn set_rarity(&mut self, rarity: Rarity) {
        self.cell.get_mut(func_name!()).rarity = rarity;
    }

    /// Add to the stack through a shared reference, returning the new quantity.
    ///
    /// Requires thread-safety, fails with [`ErrorCode::Overflow`] if the quantity doesn't fit in a `u32`.
    pub fn add_quantity(&self, amount: u32) -> Result<u32> {
        let res = self.cell.write(func_name!(), |data| {
            data.quantity = data.quantity.checked_add(amount).ok_or(ErrorCode::Overflow)?;
            Ok(data.quantity)
        });
        error::track(res)
    }

    /// Overwrite the payload with that of `src`, through a shared reference.
    ///
    /// Both items are locked using the pair protocol, this item requires thread-safety.
    pub fn assign_from(&self, src: &Item) -> Result<()> {
        error::track(self.cell.write_from(&src.cell, func_name!(), |dest, src| dest.clone_from(src)))
    }

    /// Swap the payloads of 2 items, both require thread-safety.
    pub fn swap_with(&self, other: &Item) -> Result<()> {
        error::track(self.cell.swap(&other.cell, func_name!()))
    }

    /// Compare the payloads of 2 items
    pub fn equals(&self, other: &Item) -> Result<bool> {
        error::track(self.cell.read_pair(&other.cell, func_name!(), |lhs, rhs| lhs == rhs))
    }
}

impl Default for Item {
    fn default() -> Self {
        Self::new()
    }
}

impl Guarded for Item {
    fn lifecycle(&self) -> &Lifecycle {
        self.cell.lifecycle()
    }

    fn thread_safety(&self) -> &ThreadSafety {
        Guarded::thread_safety(&self.cell)
    }
}

static_assertions::assert_impl_all!(Item: Send, Sync);

#[cfg(test)]
mod tests {
    use std::{sync::Arc, thread};

    use super::*;

    fn sword() -> Item {
        let mut item = Item::new();
        item.initialize_with("Iron sword", 1500, 2, Rarity::Uncommon).unwrap();
        item
    }

    #[test]
    fn getters() {
        let item = sword();
        assert_eq!(item.name().as_deref(), Ok("Iron sword"));
        assert_eq!(item.value(), Ok(1500));
        assert_eq!(item.quantity(), Ok(2));
        assert_eq!(item.rarity(), Ok(Rarity::Uncommon));
        assert_eq!(item.worth(), Ok(3000));
        assert_eq!(error::last_error(), None);
    }

    #[test]
    fn setters() {
        let mut item = Item::new();
        item.initialize().unwrap();
        assert_eq!(item.name().as_deref(), Ok(""));
        assert_eq!(item.rarity(), Ok(Rarity::Common));

        item.set_name("Gold ring");
        item.set_value(90_000);
        item.set_quantity(1);
        item.set_rarity(Rarity::Epic);
        assert_eq!(item.name().as_deref(), Ok("Gold ring"));
        assert_eq!(item.worth(), Ok(90_000));
        assert_eq!(item.rarity().map(|rarity| rarity.to_string()).as_deref(), Ok("Epic"));
    }

    #[test]
    fn lifecycle_round_trip() {
        let mut item = sword();
        item.enable_thread_safety().unwrap();
        let acquired = item.lock().unwrap();
        assert!(acquired);
        item.unlock(acquired).unwrap();

        assert_eq!(item.destroy(), Ok(()));
        assert_eq!(item.destroy(), Err(ErrorCode::InvalidState));
        assert_eq!(error::last_error(), Some(ErrorCode::InvalidState));
        item.disable_thread_safety();

        assert_eq!(item.initialize(), Ok(()));
        assert_eq!(item.initialize(), Err(ErrorCode::InvalidState));

        let fresh = {
            let mut item = Item::new();
            item.initialize().unwrap();
            item
        };
        assert!(!item.is_thread_safe());
        assert_eq!(item.equals(&fresh), Ok(true));
        assert_eq!(item.lock(), Ok(false));
    }

    #[test]
    fn reinitialize_drops_mutex() {
        let mut item = sword();
        item.enable_thread_safety().unwrap();
        item.destroy().unwrap();
        item.initialize().unwrap();
        assert!(!item.is_thread_safe());
        assert_eq!(item.value(), Ok(0));
    }

    #[test]
    fn copy_and_move() {
        let src = sword();
        let mut copy = Item::new();
        copy.initialize_copy(&src).unwrap();
        assert_eq!(copy.equals(&src), Ok(true));

        let mut src = src;
        let mut moved = Item::new();
        moved.initialize_move(&mut src).unwrap();
        assert_eq!(moved.name().as_deref(), Ok("Iron sword"));
        assert_eq!(src.state(), LifecycleState::Initialized);
        assert_eq!(src.name().as_deref(), Ok(""));
        assert_eq!(src.quantity(), Ok(0));
    }

    #[test]
    fn copy_into_destroyed() {
        let src = sword();
        let mut dest = sword();
        dest.enable_thread_safety().unwrap();
        dest.destroy().unwrap();
        dest.initialize_copy(&src).unwrap();
        assert!(!dest.is_thread_safe());
        assert_eq!(dest.equals(&src), Ok(true));
    }

    #[test]
    fn try_clone_keeps_mutex_kind() {
        let mut item = sword();
        item.enable_thread_safety_with(MutexKind::Reentrant).unwrap();
        let clone = item.try_clone().unwrap();
        assert_ne!(clone.id(), item.id());
        assert_eq!(Guarded::thread_safety(&clone).kind(), Some(MutexKind::Reentrant));
        assert_eq!(clone.equals(&item), Ok(true));
    }

    #[test]
    fn worth_needs_reentrant_mutex() {
        let mut item = sword();
        item.enable_thread_safety().unwrap();
        assert_eq!(item.worth(), Err(ErrorCode::AlreadyLocked));
        assert_eq!(error::last_error(), Some(ErrorCode::AlreadyLocked));
        // The failed nested lock must not leave the item locked
        assert_eq!(item.value(), Ok(1500));

        item.disable_thread_safety();
        item.enable_thread_safety_with(MutexKind::Reentrant).unwrap();
        assert_eq!(item.worth(), Ok(3000));
    }

    #[test]
    fn shared_mutation_requires_thread_safety() {
        let item = sword();
        let other = sword();
        assert_eq!(item.add_quantity(1), Err(ErrorCode::NotThreadSafe));
        assert_eq!(item.assign_from(&other), Err(ErrorCode::NotThreadSafe));
        assert_eq!(item.swap_with(&other), Err(ErrorCode::NotThreadSafe));
        assert_eq!(error::last_error(), Some(ErrorCode::NotThreadSafe));
    }

    #[test]
    fn assign_and_swap() {
        let mut a = sword();
        let mut b = Item::new();
        b.initialize_with("Health potion", 25, 10, Rarity::Common).unwrap();
        a.enable_thread_safety().unwrap();
        b.enable_thread_safety().unwrap();

        a.swap_with(&b).unwrap();
        assert_eq!(a.name().as_deref(), Ok("Health potion"));
        assert_eq!(b.name().as_deref(), Ok("Iron sword"));

        a.assign_from(&b).unwrap();
        assert_eq!(a.equals(&b), Ok(true));

        a.assign_from(&a).unwrap();
        a.swap_with(&a).unwrap();
        assert_eq!(a.equals(&a), Ok(true));
    }

    #[test]
    fn overflow() {
        let mut item = sword();
        item.set_quantity(u32::MAX);
        item.enable_thread_safety_with(MutexKind::Reentrant).unwrap();
        assert_eq!(item.add_quantity(1), Err(ErrorCode::Overflow));
        item.set_value(u64::MAX);
        assert_eq!(item.worth(), Err(ErrorCode::Overflow));
    }

    #[test]
    fn concurrent_add() {
        let mut item = sword();
        item.set_quantity(0);
        item.enable_thread_safety().unwrap();
        let item = Arc::new(item);

        let handles = (0..4).map(|_| {
            let item = item.clone();
            thread::spawn(move || {
                for _ in 0..250 {
                    item.add_quantity(1).unwrap();
                }
            })
        }).collect::<Vec<_>>();

        for handle in handles {
            handle.join().unwrap();
        }
        assert_eq!(item.quantity(), Ok(1000));
    }
}
