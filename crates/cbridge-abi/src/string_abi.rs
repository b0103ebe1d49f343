//! String primitives over NUL-terminated `char*`.

use std::ffi::{CStr, c_char, c_int};

fn is_printable(b: u8) -> bool {
    b == b' ' || b.is_ascii_graphic()
}

fn is_control(b: u8) -> bool {
    b.is_ascii_control()
}

/// Bytes of a C string, or `None` for null.
///
/// # Safety
///
/// `s` must be null or NUL-terminated.
unsafe fn c_bytes<'a>(s: *const c_char) -> Option<&'a [u8]> {
    if s.is_null() {
        return None;
    }
    // SAFETY: caller contract.
    Some(unsafe { CStr::from_ptr(s) }.to_bytes())
}

/// `0` ok, `-1` null or empty, `1` when the string holds a control character.
///
/// # Safety
///
/// `s` must be null or NUL-terminated.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn c_process_string(s: *const c_char) -> c_int {
    // SAFETY: caller contract.
    match unsafe { c_bytes(s) } {
        None | Some([]) => -1,
        Some(bytes) if bytes.iter().copied().any(is_control) => 1,
        Some(_) => 0,
    }
}

/// `1` iff `s` is non-empty printable ASCII.
///
/// # Safety
///
/// `s` must be null or NUL-terminated.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn c_validate_input(s: *const c_char) -> c_int {
    // SAFETY: caller contract.
    let bytes = unsafe { c_bytes(s) }.unwrap_or_default();
    c_int::from(!bytes.is_empty() && bytes.iter().copied().all(is_printable))
}

/// Length-delimited variant of [`c_validate_input`].
///
/// # Safety
///
/// `data` must be valid for `len` bytes, or null with `len == 0`.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn c_validate_string(data: *const u8, len: usize) -> bool {
    if data.is_null() || len == 0 {
        return false;
    }
    // SAFETY: caller contract.
    let bytes = unsafe { std::slice::from_raw_parts(data, len) };
    bytes.iter().copied().all(is_printable)
}

/// ASCII upper-case in place.
///
/// # Safety
///
/// `s` must be null or a writable NUL-terminated string.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn c_string_to_upper(s: *mut c_char) {
    if s.is_null() {
        return;
    }
    // SAFETY: caller contract; the length excludes the terminator.
    let len = unsafe { CStr::from_ptr(s) }.to_bytes().len();
    // SAFETY: `len` bytes before the NUL are writable.
    let bytes = unsafe { std::slice::from_raw_parts_mut(s.cast::<u8>(), len) };
    bytes.make_ascii_uppercase();
}
