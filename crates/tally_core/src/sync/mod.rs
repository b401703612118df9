// Portions of the project have been copied from parking_lot and is copyrighted by Amanieu d'Antra under the MIT license (located in: '3rd-party-licenses/parking_lot')
//! Synchronization primitives
//!
//! ## Fair mutexes
//!
//! The mutexes in this module hand out the lock in the order it was requested.
//! Every thread that wants the lock draws a ticket, and the lock is passed from ticket to ticket in first-in first-out order,
//! so a thread releasing the lock can't starve waiters by immediately re-acquiring it.
//!
//! Unlike most mutex interfaces, every operation reports its outcome as a [`Result`](crate::Result):
//! - locking a mutex that is already held by the calling thread fails with [`AlreadyLocked`](crate::ErrorCode::AlreadyLocked), instead of deadlocking.
//! - unlocking a mutex that is not held by the calling thread fails with [`NotOwner`](crate::ErrorCode::NotOwner), and leaves the mutex untouched.
//!
//! The outcome is also mirrored into the calling thread's last error, see [`last_error`](crate::error::last_error), and into the mutex's own last error.
//!
//! ## Types
//!
//! - [`RawFairMutex`]: the raw ticket lock, which only manages the lock state.
//! - [`RawReentrantMutex`]: a wrapper around a raw mutex which allows the owning thread to lock it multiple times.
//! - [`FairMutex`]: a mutex protecting a value, which can only be accessed through the RAII guard returned when locking it.
//!
//! Custom raw locks can be plugged into the data-carrying [`Mutex`](lock_imp::Mutex) by implementing [`lock_imp::RawMutex`].

pub mod lock_imp;

mod spin_wait;
pub use spin_wait::*;

mod raw_fair_mutex;
pub use raw_fair_mutex::*;

mod fair_mutex;
pub use fair_mutex::*;

mod remutex;
pub use remutex::*;
