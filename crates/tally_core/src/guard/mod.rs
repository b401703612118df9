//! Building blocks of guarded objects.
//!
//! A guarded object embeds a [`Lifecycle`], which gates which operations are valid, and a [`ThreadSafety`] mixin, which optionally protects the object's data with a mutex.
//! Operations touching 2 guarded objects at once, like copies, assignments and comparisons, lock both using [`lock_pair`].

mod lifecycle;
pub use lifecycle::*;

mod thread_safety;
pub use thread_safety::*;

mod pair;
pub use pair::*;
