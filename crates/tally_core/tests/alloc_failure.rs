use std::{
    alloc::{GlobalAlloc, Layout, System},
    cell::Cell,
    ptr,
};

use tally_core::{
    error,
    guard::{MutexKind, ThreadSafety},
    ErrorCode,
};

thread_local! {
    static FAIL_ALLOCATIONS : Cell<bool> = const { Cell::new(false) };
}

/// Allocator that fails every allocation on the current thread while `FAIL_ALLOCATIONS` is set
struct FailingAlloc;

unsafe impl GlobalAlloc for FailingAlloc {
    unsafe fn alloc(&self, layout: Layout) -> *mut u8 {
        if FAIL_ALLOCATIONS.with(|fail| fail.get()) {
            ptr::null_mut()
        } else {
            System.alloc(layout)
        }
    }

    unsafe fn dealloc(&self, ptr: *mut u8, layout: Layout) {
        System.dealloc(ptr, layout)
    }
}

#[global_allocator]
static ALLOCATOR : FailingAlloc = FailingAlloc;

fn with_failing_allocations<T>(f: impl FnOnce() -> T) -> T {
    FAIL_ALLOCATIONS.with(|fail| fail.set(true));
    let res = f();
    FAIL_ALLOCATIONS.with(|fail| fail.set(false));
    res
}

#[test]
fn enable_reports_out_of_memory() {
    for kind in [MutexKind::Fair, MutexKind::Reentrant] {
        let mut mixin = ThreadSafety::new();

        let res = with_failing_allocations(|| mixin.enable_with(kind));
        assert_eq!(res, Err(ErrorCode::OutOfMemory));
        assert_eq!(error::last_error(), Some(ErrorCode::OutOfMemory));
        assert!(!mixin.is_thread_safe());
        assert_eq!(mixin.kind(), None);

        // Without a mutex, locking is still a no-op
        assert_eq!(mixin.lock(), Ok(false));

        assert_eq!(mixin.enable_with(kind), Ok(()));
        assert!(mixin.is_thread_safe());
        assert_eq!(mixin.kind(), Some(kind));
        assert_eq!(mixin.lock(), Ok(true));
        assert_eq!(mixin.unlock(true), Ok(()));
    }
}

#[test]
fn enable_keeps_installed_mutex_when_allocation_fails() {
    let mut mixin = ThreadSafety::new();
    mixin.enable().unwrap();

    // Enabling again doesn't allocate, so it succeeds even if allocations fail
    let res = with_failing_allocations(|| mixin.enable_with(MutexKind::Reentrant));
    assert_eq!(res, Ok(()));
    assert_eq!(mixin.kind(), Some(MutexKind::Fair));
}
