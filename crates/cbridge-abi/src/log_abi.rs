//! Fire-and-forget logging primitives.
//!
//! Lines land in a bounded in-process log holding the most recent
//! [`LOG_CAPACITY`] entries. Rust callers read it back with [`log_snapshot`].

use std::collections::VecDeque;
use std::ffi::{CStr, c_char};
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::{Mutex, const_mutex};

pub const LOG_CAPACITY: usize = 256;

static LOG: Mutex<VecDeque<String>> = const_mutex(VecDeque::new());

/// Lines ever logged, including those evicted from the ring.
#[unsafe(no_mangle)]
pub static c_log_count: AtomicU64 = AtomicU64::new(0);

fn push(line: String) {
    let mut log = LOG.lock();
    if log.len() == LOG_CAPACITY {
        log.pop_front();
    }
    log.push_back(line);
    c_log_count.fetch_add(1, Ordering::Relaxed);
}

/// # Safety
///
/// `s` must be null or NUL-terminated.
unsafe fn lossy(s: *const c_char) -> String {
    if s.is_null() {
        return "(null)".to_string();
    }
    // SAFETY: caller contract.
    unsafe { CStr::from_ptr(s) }.to_string_lossy().into_owned()
}

/// Retained lines, oldest first.
#[must_use]
pub fn log_snapshot() -> Vec<String> {
    LOG.lock().iter().cloned().collect()
}

#[must_use]
pub fn log_count() -> u64 {
    c_log_count.load(Ordering::Relaxed)
}

pub fn clear_log() {
    LOG.lock().clear();
}

/// # Safety
///
/// `msg` must be null or NUL-terminated.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn c_log_message(msg: *const c_char) {
    // SAFETY: caller contract.
    push(format!("[LOG] {}", unsafe { lossy(msg) }));
}

/// # Safety
///
/// Both arguments must be null or NUL-terminated.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn c_log_file_operation(path: *const c_char, op: *const c_char) {
    // SAFETY: caller contract.
    let (path, op) = unsafe { (lossy(path), lossy(op)) };
    push(format!("[FILE] {op}: {path}"));
}

/// # Safety
///
/// `item` must be null or NUL-terminated.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn c_process_item(item: *const c_char) {
    // SAFETY: caller contract.
    push(format!("[ITEM] {}", unsafe { lossy(item) }));
}
