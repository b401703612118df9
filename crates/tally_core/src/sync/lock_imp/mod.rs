// Portions of the project have been copied from parking_lot and is copyrighted by Amanieu d'Antra under the MIT license (located in: '3rd-party-licenses/parking_lot')
//! This module provides a type-safe `Mutex` type which wraps a simple raw mutex type.
//! This eliminates a large portion of the work of implementing custom lock types, and allows users to write code which is generic with regards to different lock implementations.
//! 
//! Basic use of this module is very straightforward:
//! 
//! 1. Create a raw lock type. This should only contain the lock state, not any data protected by the lock.
//! 2. Implement the `RawMutex` trait for your custom lock primitive.
//! 3. Export your mutex as a type alias for `lock_imp::Mutex`, and your mutex guard as a type alias for `lock_imp::MutexGuard`.
//! 
//! Unlike the usual raw mutex interfaces, every operation receives the id of the thread performing it and reports failures through [`ErrorCode`]s.
//! This lets the raw lock track its owner, so it can reject unlocks from threads that don't hold it, and re-locks from the thread that does.
//! 
//! # Example
//! 
//! ```
//! use tally_core::{Result, ErrorCode, sys::ThreadId, sync::lock_imp::{RawMutex, Mutex, MutexGuard, GuardNoSend}};
//! use core::sync::atomic::{AtomicU64, Ordering};
//! 
//! // 1. Define our raw lock type
//! pub struct RawSpinLock(AtomicU64);
//! 
//! // 2. Implement RawMutex for this type
//! unsafe impl RawMutex for RawSpinLock {
//!     const INIT: RawSpinLock = RawSpinLock(AtomicU64::new(0));
//! 
//!     type GuardMarker = GuardNoSend;
//! 
//!     fn lock(&self, thread: ThreadId) -> Result<()> {
//!         // Note: This isn't the best way of implementing a spinlock, but it suffices for the sake of this example
//!         loop {
//!             match self.try_lock(thread) {
//!                 Err(ErrorCode::AlreadyLocked) if self.owner() != Some(thread) => core::hint::spin_loop(),
//!                 res => return res,
//!             }
//!         }
//!     }
//! 
//!     fn try_lock(&self, thread: ThreadId) -> Result<()> {
//!         self.0
//!             .compare_exchange(0, thread.as_u64(), Ordering::Acquire, Ordering::Relaxed)
//!             .map(|_| ())
//!             .map_err(|_| ErrorCode::AlreadyLocked)
//!     }
//! 
//!     fn unlock(&self, thread: ThreadId) -> Result<()> {
//!         self.0
//!             .compare_exchange(thread.as_u64(), 0, Ordering::Release, Ordering::Relaxed)
//!             .map(|_| ())
//!             .map_err(|_| ErrorCode::NotOwner)
//!     }
//! 
//!     fn owner(&self) -> Option<ThreadId> {
//!         ThreadId::from_raw(self.0.load(Ordering::Relaxed))
//!     }
//! }
//! 
//! // 3. Export the wrappers. These are the types that your users will actually use.
//! pub type Spinlock<T> = Mutex<RawSpinLock, T>;
//! pub type SpinlockGuard<'a, T> = MutexGuard<'a, RawSpinLock, T>;
//! ```

/// Marker type which indicates that the guard for a lock is not `Send`.
///
/// Raw mutexes track their owner by thread id, so a guard must be unlocked on the thread that locked it.
pub struct GuardNoSend(*mut ());

unsafe impl Sync for GuardNoSend {}

mod mutex;
pub use mutex::*;
