//! Allocation primitives. Every pointer the library hands out comes from
//! `c_alloc` and must go back through `c_free`.

use std::ffi::c_void;

/// `malloc` for the foreign side. Null on failure.
///
/// # Safety
///
/// The result must be released with [`c_free`] exactly once.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn c_alloc(size: usize) -> *mut c_void {
    // SAFETY: plain libc allocation.
    unsafe { libc::malloc(size) }
}

/// `free` for the foreign side. Null is a no-op.
///
/// # Safety
///
/// `ptr` must be null or a live pointer from [`c_alloc`].
#[unsafe(no_mangle)]
pub unsafe extern "C" fn c_free(ptr: *mut c_void) {
    // SAFETY: caller contract.
    unsafe { libc::free(ptr) }
}

/// Copy `bytes` into a fresh `c_alloc` block and report its length.
/// Null (with `*out_len = 0`) when `bytes` is empty or allocation fails.
///
/// # Safety
///
/// `out_len` must be null or valid for a write.
pub(crate) unsafe fn export_bytes(bytes: &[u8], out_len: *mut usize) -> *mut u8 {
    let mut written = 0;
    let mut out = std::ptr::null_mut::<u8>();
    if !bytes.is_empty() {
        // SAFETY: allocation of `bytes.len()` bytes.
        out = unsafe { c_alloc(bytes.len()) }.cast();
        if !out.is_null() {
            // SAFETY: `out` holds `bytes.len()` writable bytes.
            unsafe { std::ptr::copy_nonoverlapping(bytes.as_ptr(), out, bytes.len()) };
            written = bytes.len();
        }
    }
    if !out_len.is_null() {
        // SAFETY: caller contract.
        unsafe { *out_len = written };
    }
    out
}
