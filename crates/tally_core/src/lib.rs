//! Core synchronization and lifecycle primitives shared by every guarded type.

mod os;

pub mod error;
pub mod guard;
pub mod prelude;
pub mod sync;
pub mod sys;
pub mod time;

pub use error::{ErrorCode, Result};
