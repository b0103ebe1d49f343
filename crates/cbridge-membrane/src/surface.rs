//! The foreign call surface as a table of primitive operations.
//!
//! Primitives are grouped into capability sets. [`CoreOps`] is required;
//! every other group is optional and the gateway reports
//! `CapabilityMissing` when a caller needs a group the surface lacks.
//!
//! | Group | Primitives | Failure signal |
//! |---|---|---|
//! | core | `init`, `cleanup`, `alloc`, `free` | null from `alloc` |
//! | text | `process_string`, `validate_input`, `validate_bytes`, `to_upper` | non-zero status |
//! | math | `add`, `multiply`, `complex_calculation` | none |
//! | record | `init`, `process`, `validate`, `cleanup` | none |
//! | codec | `compress`, `decompress`, `checksum` | null buffer |
//! | log | `log_message`, `log_file_operation`, `process_item` | ignored |

use std::ffi::{c_char, c_int, c_void};

use crate::marshal::records::RawDataRecord;

/// Required lifecycle and memory primitives.
#[derive(Debug, Clone, Copy)]
pub struct CoreOps {
    pub init: unsafe extern "C" fn(),
    pub cleanup: unsafe extern "C" fn(),
    /// Returns null on failure.
    pub alloc: unsafe extern "C" fn(usize) -> *mut c_void,
    pub free: unsafe extern "C" fn(*mut c_void),
}

#[derive(Debug, Clone, Copy)]
pub struct TextOps {
    /// 0 on success, non-zero status otherwise.
    pub process_string: unsafe extern "C" fn(*const c_char) -> c_int,
    /// Non-zero means valid.
    pub validate_input: unsafe extern "C" fn(*const c_char) -> c_int,
    pub validate_bytes: unsafe extern "C" fn(*const u8, usize) -> bool,
    /// Upper-cases a NUL-terminated string in place.
    pub to_upper: unsafe extern "C" fn(*mut c_char),
}

#[derive(Debug, Clone, Copy)]
pub struct MathOps {
    pub add: unsafe extern "C" fn(f64, f64) -> f64,
    pub multiply: unsafe extern "C" fn(f64, f64) -> f64,
    pub complex_calculation: unsafe extern "C" fn(f64, f64) -> f64,
}

#[derive(Debug, Clone, Copy)]
pub struct RecordOps {
    pub init: unsafe extern "C" fn(*mut RawDataRecord),
    pub process: unsafe extern "C" fn(*mut RawDataRecord),
    pub validate: unsafe extern "C" fn(*const RawDataRecord) -> bool,
    pub cleanup: unsafe extern "C" fn(*mut RawDataRecord),
}

#[derive(Debug, Clone, Copy)]
pub struct CodecOps {
    /// Returns a buffer from the surface's `alloc` and writes its length, or null.
    pub compress: unsafe extern "C" fn(*const u8, usize, *mut usize) -> *mut u8,
    pub decompress: unsafe extern "C" fn(*const u8, usize, *mut usize) -> *mut u8,
    pub checksum: unsafe extern "C" fn(*const u8, usize) -> u32,
}

#[derive(Debug, Clone, Copy)]
pub struct LogOps {
    pub log_message: unsafe extern "C" fn(*const c_char),
    pub log_file_operation: unsafe extern "C" fn(*const c_char, *const c_char),
    pub process_item: unsafe extern "C" fn(*const c_char),
}

/// A complete foreign surface: the required core plus any optional groups.
#[derive(Debug, Clone, Copy)]
pub struct ForeignSurface {
    pub name: &'static str,
    pub core: CoreOps,
    pub text: Option<TextOps>,
    pub math: Option<MathOps>,
    pub record: Option<RecordOps>,
    pub codec: Option<CodecOps>,
    pub log: Option<LogOps>,
}

impl ForeignSurface {
    /// A surface with only the required core group.
    #[must_use]
    pub const fn core_only(name: &'static str, core: CoreOps) -> Self {
        Self {
            name,
            core,
            text: None,
            math: None,
            record: None,
            codec: None,
            log: None,
        }
    }

    /// Names of the capability groups this surface provides.
    #[must_use]
    pub fn capabilities(&self) -> Vec<&'static str> {
        let mut caps = vec!["core"];
        if self.text.is_some() {
            caps.push("text");
        }
        if self.math.is_some() {
            caps.push("math");
        }
        if self.record.is_some() {
            caps.push("record");
        }
        if self.codec.is_some() {
            caps.push("codec");
        }
        if self.log.is_some() {
            caps.push("log");
        }
        caps
    }
}
