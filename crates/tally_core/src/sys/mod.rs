use crate::os;

pub mod thread_id;
pub use thread_id::*;

/// Get the current OS error
pub fn errno() -> i32 {
    os::errno()
}
