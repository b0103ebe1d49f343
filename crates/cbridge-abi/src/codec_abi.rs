//! Run-length codec and Adler-32 checksum.
//!
//! Encoded form is a sequence of `(count, byte)` pairs with `count` in
//! `1..=255`. Results are allocated with `c_alloc`; null means failure and
//! always comes with `*out_len = 0`.

use crate::memory_abi::export_bytes;

const ADLER_MOD: u32 = 65_521;

#[must_use]
pub fn rle_encode(data: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(data.len().min(1024) * 2);
    let mut iter = data.iter().copied().peekable();
    while let Some(byte) = iter.next() {
        let mut count: u8 = 1;
        while count < u8::MAX && iter.peek() == Some(&byte) {
            iter.next();
            count += 1;
        }
        out.push(count);
        out.push(byte);
    }
    out
}

/// `None` for odd-length input or a zero count.
#[must_use]
pub fn rle_decode(data: &[u8]) -> Option<Vec<u8>> {
    if data.len() % 2 != 0 {
        return None;
    }
    let mut out = Vec::new();
    for pair in data.chunks_exact(2) {
        let (count, byte) = (pair[0], pair[1]);
        if count == 0 {
            return None;
        }
        out.extend(std::iter::repeat_n(byte, usize::from(count)));
    }
    Some(out)
}

#[must_use]
pub fn adler32(data: &[u8]) -> u32 {
    let (mut a, mut b) = (1u32, 0u32);
    // 5552 is the largest block for which `b` cannot overflow before reduction.
    for block in data.chunks(5552) {
        for &byte in block {
            a += u32::from(byte);
            b += a;
        }
        a %= ADLER_MOD;
        b %= ADLER_MOD;
    }
    (b << 16) | a
}

/// # Safety
///
/// `data` must be null or valid for `len` bytes.
unsafe fn input<'a>(data: *const u8, len: usize) -> Option<&'a [u8]> {
    if data.is_null() || len == 0 {
        return None;
    }
    // SAFETY: caller contract.
    Some(unsafe { std::slice::from_raw_parts(data, len) })
}

/// # Safety
///
/// `data` must be null or valid for `len` bytes; `out_len` null or writable.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn c_compress(data: *const u8, len: usize, out_len: *mut usize) -> *mut u8 {
    // SAFETY: caller contract.
    let encoded = unsafe { input(data, len) }.map(rle_encode).unwrap_or_default();
    // SAFETY: caller contract for `out_len`.
    unsafe { export_bytes(&encoded, out_len) }
}

/// # Safety
///
/// `data` must be null or valid for `len` bytes; `out_len` null or writable.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn c_decompress(
    data: *const u8,
    len: usize,
    out_len: *mut usize,
) -> *mut u8 {
    // SAFETY: caller contract.
    let decoded = unsafe { input(data, len) }.and_then(rle_decode).unwrap_or_default();
    // SAFETY: caller contract for `out_len`.
    unsafe { export_bytes(&decoded, out_len) }
}

/// Adler-32 of `len` bytes. `1` for empty input.
///
/// # Safety
///
/// `data` must be null or valid for `len` bytes.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn c_checksum(data: *const u8, len: usize) -> u32 {
    // SAFETY: caller contract.
    adler32(unsafe { input(data, len) }.unwrap_or_default())
}
