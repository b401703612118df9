//! Guarded value types built on the lifecycle guard and the thread-safety mixin of `tally_core`.
//!
//! Every type starts out uninitialized, and has to be initialized before use.
//! Any accessor called on an object that isn't initialized aborts the process, only `destroy` and `initialize` report invalid states as errors.

use tally_logging::LogCategory;

mod cell;

mod item;
pub use item::*;

mod ledger;
pub use ledger::*;

pub(crate) const RECORDS : LogCategory = LogCategory::new("records");
