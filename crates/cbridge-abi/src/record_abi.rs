//! `c_data_t` primitives.

use std::ffi::c_char;

use cbridge_membrane::marshal::RawDataRecord;

/// Zero the whole record, padding included, and set `id = 0`.
///
/// # Safety
///
/// `rec` must be null or valid for a write of one `c_data_t`.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn c_data_init(rec: *mut RawDataRecord) {
    if rec.is_null() {
        return;
    }
    // SAFETY: caller contract; all-zero is a valid `c_data_t`.
    unsafe { std::ptr::write_bytes(rec, 0, 1) };
}

/// Upper-case the name, double the value and mark the record processed.
///
/// # Safety
///
/// `rec` must be null or point to an initialized `c_data_t`.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn c_data_process(rec: *mut RawDataRecord) {
    // SAFETY: caller contract.
    let Some(rec) = (unsafe { rec.as_mut() }) else {
        return;
    };
    for c in rec.name.iter_mut().take_while(|c| **c != 0) {
        // ASCII only; bytes >= 0x80 are left as they are.
        *c = (*c as u8).to_ascii_uppercase() as c_char;
    }
    rec.value *= 2.0;
    rec.processed = true;
}

/// `id >= 0`, NUL inside `name`, finite `value`.
///
/// # Safety
///
/// `rec` must be null or point to an initialized `c_data_t`.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn c_data_validate(rec: *const RawDataRecord) -> bool {
    // SAFETY: caller contract.
    let Some(rec) = (unsafe { rec.as_ref() }) else {
        return false;
    };
    rec.id >= 0 && rec.name.contains(&0) && rec.value.is_finite()
}

/// Zero the record. Memory is released separately with `c_free`.
///
/// # Safety
///
/// `rec` must be null or valid for a write of one `c_data_t`.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn c_data_cleanup(rec: *mut RawDataRecord) {
    if rec.is_null() {
        return;
    }
    // SAFETY: caller contract.
    unsafe { std::ptr::write_bytes(rec, 0, 1) };
}
