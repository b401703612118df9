use core::fmt;
use std::io::{self, Write};

use parking_lot::RwLock;
use tally_core_macros::{EnumDisplay, EnumFromRepr};

use crate::error::{self, ErrorCode, ErrorSlot, Result};

/// State of a guarded object.
///
/// The zero value is `Uninitialized`, so zeroed storage is a valid, never-initialized object.
#[repr(u8)]
#[derive(Clone, Copy, PartialEq, Eq, Debug, Default, EnumDisplay, EnumFromRepr)]
pub enum LifecycleState {
    /// Constructed, but `initialize` was never called.
    #[default]
    #[display("uninitialized")]
    Uninitialized = 0,
    /// Ready for use.
    #[display("initialized")]
    Initialized,
    /// Torn down by `destroy`, can be brought back with `initialize`.
    #[display("destroyed")]
    Destroyed,
}

/// Lifecycle guard embedded in every guarded object.
///
/// ```text
/// Uninitialized --initialize--> Initialized --destroy--> Destroyed
///                                    ^                        |
///                                    +-------initialize-------+
/// ```
///
/// `initialize` and `destroy` report invalid transitions as [`ErrorCode::InvalidState`].
/// Every other operation on an object that is not initialized is a bug in the calling code, and aborts the process, see [`lifecycle_violation`].
#[derive(Debug, Default)]
pub struct Lifecycle {
    state      : LifecycleState,
    last_error : ErrorSlot,
}

impl Lifecycle {
    /// Create a new, uninitialized guard
    pub const fn new() -> Self {
        Self { state: LifecycleState::Uninitialized, last_error: ErrorSlot::new() }
    }

    /// Get the current state
    #[inline]
    pub fn state(&self) -> LifecycleState {
        self.state
    }

    /// Check if the guard is initialized
    #[inline]
    pub fn is_initialized(&self) -> bool {
        self.state == LifecycleState::Initialized
    }

    /// Get the error of the last `initialize` or `destroy`
    pub fn last_error(&self) -> Option<ErrorCode> {
        self.last_error.get()
    }

    fn record(&self, res: Result<()>) -> Result<()> {
        error::track(self.last_error.record(res))
    }

    /// Move to the initialized state.
    ///
    /// Valid from both `Uninitialized` and `Destroyed`, initializing an initialized object fails with [`ErrorCode::InvalidState`].
    pub fn initialize(&mut self) -> Result<()> {
        let res = match self.state {
            LifecycleState::Initialized => Err(ErrorCode::InvalidState),
            LifecycleState::Uninitialized | LifecycleState::Destroyed => {
                self.state = LifecycleState::Initialized;
                Ok(())
            },
        };
        self.record(res)
    }

    /// Move to the initialized state, as the destination of a copy or move out of the object guarded by `source`.
    ///
    /// Aborts when this object is already initialized, or when `source` is not initialized.
    pub fn initialize_from(&mut self, source: &Lifecycle, operation: &'static str) {
        Self::ensure_copyable(self, source, operation);
        self.state = LifecycleState::Initialized;
        self.last_error.set(None);
    }

    /// Move to the destroyed state.
    ///
    /// Destroying an object that is not initialized fails with [`ErrorCode::InvalidState`], it does not abort.
    pub fn destroy(&mut self) -> Result<()> {
        let res = match self.state {
            LifecycleState::Initialized => {
                self.state = LifecycleState::Destroyed;
                Ok(())
            },
            LifecycleState::Uninitialized | LifecycleState::Destroyed => Err(ErrorCode::InvalidState),
        };
        self.record(res)
    }

    /// Abort unless the object is initialized.
    #[inline]
    pub fn ensure_initialized(&self, operation: &'static str) {
        if self.state != LifecycleState::Initialized {
            lifecycle_violation(operation, "object is not initialized", self.state);
        }
    }

    /// Abort unless `dest` can become a copy of `src`, see [`initialize_from`](Lifecycle::initialize_from).
    ///
    /// Copies which need to read `src` under its lock check this before locking, so a violation is never hidden by a locking error.
    pub fn ensure_copyable(dest: &Lifecycle, src: &Lifecycle, operation: &'static str) {
        if dest.state == LifecycleState::Initialized {
            lifecycle_violation(operation, "destination is already initialized", dest.state);
        }
        src.ensure_initialized(operation);
    }

    /// Abort unless both sides of an assignment between existing objects are initialized.
    pub fn ensure_assignable(dest: &Lifecycle, src: &Lifecycle, operation: &'static str) {
        if dest.state != LifecycleState::Initialized {
            lifecycle_violation(operation, "destination is not initialized", dest.state);
        }
        if src.state != LifecycleState::Initialized {
            lifecycle_violation(operation, "source is not initialized", src.state);
        }
    }

    /// Tear down the guard from a destructor.
    ///
    /// Valid in every state, including on objects that were never initialized.
    pub fn release(&mut self) {
        if self.state == LifecycleState::Initialized {
            self.state = LifecycleState::Destroyed;
        }
    }
}

//------------------------------------------------------------------------------------------------------------------------------

/// Description of a lifecycle violation, handed to the violation reporter right before the process aborts.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct LifecycleViolation {
    /// Operation that was called
    pub operation : &'static str,
    /// Short description of what was wrong
    pub reason    : &'static str,
    /// State of the offending object
    pub state     : LifecycleState,
}

impl fmt::Display for LifecycleViolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "lifecycle violation in `{}`: {} (state: {})", self.operation, self.reason, self.state)
    }
}

/// Function receiving lifecycle violations.
///
/// Returns whether the violation was written anywhere, if not, the default stderr line is written instead.
/// The process aborts as soon as the reporter returns.
pub type ViolationReporter = fn(&LifecycleViolation) -> bool;

static VIOLATION_REPORTER : RwLock<Option<ViolationReporter>> = RwLock::new(None);

/// Set the process-wide violation reporter, returning the previous one.
///
/// Passing `None` restores the default reporter, which writes a single line to stderr.
pub fn set_violation_reporter(reporter: Option<ViolationReporter>) -> Option<ViolationReporter> {
    core::mem::replace(&mut *VIOLATION_REPORTER.write(), reporter)
}

/// Report a lifecycle violation and abort the process.
#[cold]
#[inline(never)]
pub fn lifecycle_violation(operation: &'static str, reason: &'static str, state: LifecycleState) -> ! {
    let violation = LifecycleViolation { operation, reason, state };
    // Don't hold the lock while reporting, the reporter may need to install itself again
    let reporter = *VIOLATION_REPORTER.read();
    let reported = reporter.map_or(false, |reporter| reporter(&violation));
    if !reported {
        let mut stderr = io::stderr().lock();
        _ = writeln!(stderr, "{violation}");
        _ = stderr.flush();
    }
    std::process::abort()
}

static_assertions::const_assert_eq!(core::mem::size_of::<LifecycleState>(), 1);
