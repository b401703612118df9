use core::{
    cell::Cell,
    sync::atomic::{AtomicU8, Ordering},
};
use std::error;

use tally_core_macros::{EnumDisplay, EnumFromRepr};

use crate::os;

/// A specialized [`Result`] type for the synchronization and lifecycle primitives.
///
/// While usual Rust style is to import types directly, aliases of [`Result`] often are not, to make it easier to distinguish between them.
/// Users of this alias will generally write `tally_core::Result` instead of shadowing the prelude's `Result`.
///
/// [`Result`]: core::result::Result
pub type Result<T> = core::result::Result<T, ErrorCode>;

/// Error codes shared by the mutexes, the lifecycle guard, the thread-safety mixin and every type built on them.
///
/// The error codes fall into 3 categories:
/// - contention and ownership errors (`AlreadyLocked`, `NotOwner`, `Deadlock`), which the caller can recover from by retrying or backing off.
/// - state errors (`InvalidState`, `NotThreadSafe`), reported when an operation is not valid for the object's current state.
/// - resource errors (`OutOfMemory`, `Overflow`).
///
/// Lifecycle violations on anything other than `destroy` are not errors, they abort the process, see [`lifecycle_violation`].
///
/// [`lifecycle_violation`]: crate::guard::lifecycle_violation
#[repr(u8)]
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug, EnumDisplay, EnumFromRepr)]
pub enum ErrorCode {
    /// The mutex is already held, either by another thread or by the calling thread itself.
    #[display("already locked")]
    AlreadyLocked = 1,
    /// The calling thread does not own the mutex it tried to release.
    #[display("not owner")]
    NotOwner,
    /// The operation is not valid for the current lifecycle state.
    #[display("invalid state")]
    InvalidState,
    /// A parameter was incorrect.
    #[display("invalid argument")]
    InvalidArgument,
    /// An allocation failed.
    #[display("out of memory")]
    OutOfMemory,
    /// The object needs thread-safety to be enabled for this operation.
    #[display("thread-safety not enabled")]
    NotThreadSafe,
    /// Acquiring the lock would deadlock the calling thread.
    #[display("deadlock")]
    Deadlock,
    /// A counter would overflow.
    #[display("overflow")]
    Overflow,
    /// Any error that's not part of this list, usually an unmapped OS error.
    #[display("uncategorized error")]
    Uncategorized,
}

impl ErrorCode {
    /// Map a raw OS error number to an error code.
    pub fn from_raw_os_error(code: i32) -> ErrorCode {
        os::decode_error_code(code)
    }

    /// Map the calling thread's last OS error to an error code.
    pub fn last_os_error() -> ErrorCode {
        Self::from_raw_os_error(os::errno())
    }
}

impl error::Error for ErrorCode {}

static_assertions::const_assert_eq!(core::mem::size_of::<ErrorCode>(), 1);
static_assertions::const_assert_eq!(core::mem::size_of::<Option<ErrorCode>>(), 1);

//------------------------------------------------------------------------------------------------------------------------------

thread_local! {
    static LAST_ERROR : Cell<Option<ErrorCode>> = const { Cell::new(None) };
}

/// Get the result of the last operation performed on the current thread.
///
/// `None` means the last operation succeeded.
pub fn last_error() -> Option<ErrorCode> {
    LAST_ERROR.with(|slot| slot.get())
}

/// Overwrite the current thread's last error.
pub fn set_last_error(err: Option<ErrorCode>) {
    LAST_ERROR.with(|slot| slot.set(err))
}

/// Clear the current thread's last error.
pub fn clear_last_error() {
    set_last_error(None)
}

/// Mirror a result into the current thread's last error, and return it unchanged.
///
/// Public operations run their final result through this just before returning.
#[inline]
pub fn track<T>(res: Result<T>) -> Result<T> {
    set_last_error(res.as_ref().err().copied());
    res
}

//------------------------------------------------------------------------------------------------------------------------------

/// Atomic per-object last error.
pub struct ErrorSlot(AtomicU8);

impl ErrorSlot {
    /// Create an empty slot
    pub const fn new() -> Self {
        Self(AtomicU8::new(0))
    }

    /// Get the stored error
    pub fn get(&self) -> Option<ErrorCode> {
        ErrorCode::from_repr(self.0.load(Ordering::Relaxed))
    }

    /// Store an error, `None` clears the slot
    pub fn set(&self, err: Option<ErrorCode>) {
        self.0.store(err.map_or(0, |err| err as u8), Ordering::Relaxed);
    }

    /// Store the error of a result and return it unchanged
    #[inline]
    pub fn record<T>(&self, res: Result<T>) -> Result<T> {
        self.set(res.as_ref().err().copied());
        res
    }
}

impl Default for ErrorSlot {
    fn default() -> Self {
        Self::new()
    }
}

impl core::fmt::Debug for ErrorSlot {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_tuple("ErrorSlot").field(&self.get()).finish()
    }
}
