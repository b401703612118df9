//! Module containing OS abstractions.
//! 
//! Direct OS implementations aren't available to the user, usable functionality is exposed through `tally_core::sys`, `tally_core::time` and `tally_core::error`.

use cfg_if::cfg_if;

cfg_if!{
    if #[cfg(windows)] {
        mod windows;
        pub(crate) use self::windows::*;
    } else {
        mod unix;
        pub(crate) use self::unix::*;
    }
}
