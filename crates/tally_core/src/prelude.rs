//! Commonly used types, imported by `use tally_core::prelude::*`

pub use crate::{
    error::{ErrorCode, Result},
    guard::{lock_initialized_pair, lock_pair, Guarded, Lifecycle, LifecycleState, MutexKind, ThreadSafety, ThreadSafetyGuard},
    sync::{FairMutex, FairMutexGuard},
    sys::{get_thread_id, ThreadId},
};
