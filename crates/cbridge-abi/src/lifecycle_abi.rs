//! Library lifecycle: `c_init` / `c_cleanup` with an init reference count.

use std::sync::atomic::{AtomicUsize, Ordering};

static INIT_COUNT: AtomicUsize = AtomicUsize::new(0);

/// Current init reference count.
#[must_use]
pub fn init_count() -> usize {
    INIT_COUNT.load(Ordering::Acquire)
}

/// Take one init reference.
///
/// # Safety
///
/// Always safe to call; `unsafe` only to match the surface's primitive type.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn c_init() {
    INIT_COUNT.fetch_add(1, Ordering::AcqRel);
}

/// Drop one init reference. Extra calls saturate at zero.
///
/// # Safety
///
/// Always safe to call.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn c_cleanup() {
    let _ = INIT_COUNT.fetch_update(Ordering::AcqRel, Ordering::Acquire, |n| n.checked_sub(1));
}

/// Force the reference count to zero.
///
/// # Safety
///
/// Always safe to call.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn c_cleanup_all() {
    INIT_COUNT.store(0, Ordering::Release);
}
