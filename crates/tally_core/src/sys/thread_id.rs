use core::{
    fmt,
    num::NonZeroU64,
    sync::atomic::{AtomicU64, Ordering},
};

/// Thread ID
/// 
/// Ids are unique for the lifetime of the process and are never 0, a value of 0 is used by the mutexes to mark that they are not held.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
pub struct ThreadId(NonZeroU64);

impl ThreadId {
    /// Create a thread id from a raw value, returns `None` for 0
    pub const fn from_raw(id: u64) -> Option<ThreadId> {
        match NonZeroU64::new(id) {
            Some(id) => Some(ThreadId(id)),
            None => None,
        }
    }

    /// Get the thread id as a u64
    pub const fn as_u64(&self) -> u64 {
        self.0.get()
    }
}

impl fmt::Display for ThreadId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_fmt(format_args!("'Thread {}'", self.0))
    }
}

static NEXT_THREAD_ID : AtomicU64 = AtomicU64::new(1);

/// Get the thread ID of the current thread
pub fn get_thread_id() -> ThreadId {
    thread_local!(static THREAD_ID : ThreadId = {
        let id = NEXT_THREAD_ID.fetch_add(1, Ordering::Relaxed);
        // 2^64 threads will never be spawned in a single process
        ThreadId::from_raw(id).unwrap_or_else(|| std::process::abort())
    });
    THREAD_ID.with(|id| *id)
}
