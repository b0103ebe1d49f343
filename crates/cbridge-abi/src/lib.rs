//! # cbridge-abi
//!
//! Reference foreign library for the cbridge membrane: plain `extern "C"`
//! symbols with C semantics (NUL-terminated strings, null-on-failure
//! allocation, status codes, caller-frees results).
//!
//! ```text
//! Rust caller -> membrane Gateway -> ForeignSurface table -> c_* symbol (this crate)
//! ```
//!
//! [`surface`] packages every symbol as a `ForeignSurface` with all capability
//! groups present. The crate also builds as a `cdylib` for C consumers.

#![allow(non_upper_case_globals)]

pub mod codec_abi;
pub mod lifecycle_abi;
pub mod log_abi;
pub mod math_abi;
pub mod memory_abi;
pub mod record_abi;
pub mod string_abi;

use cbridge_membrane::surface::{
    CodecOps, CoreOps, ForeignSurface, LogOps, MathOps, RecordOps, TextOps,
};

#[must_use]
pub fn core_ops() -> CoreOps {
    CoreOps {
        init: lifecycle_abi::c_init,
        cleanup: lifecycle_abi::c_cleanup,
        alloc: memory_abi::c_alloc,
        free: memory_abi::c_free,
    }
}

/// The full surface.
#[must_use]
pub fn surface() -> ForeignSurface {
    ForeignSurface {
        name: "cbridge-abi",
        core: core_ops(),
        text: Some(TextOps {
            process_string: string_abi::c_process_string,
            validate_input: string_abi::c_validate_input,
            validate_bytes: string_abi::c_validate_string,
            to_upper: string_abi::c_string_to_upper,
        }),
        math: Some(MathOps {
            add: math_abi::c_add,
            multiply: math_abi::c_multiply,
            complex_calculation: math_abi::c_complex_calculation,
        }),
        record: Some(RecordOps {
            init: record_abi::c_data_init,
            process: record_abi::c_data_process,
            validate: record_abi::c_data_validate,
            cleanup: record_abi::c_data_cleanup,
        }),
        codec: Some(CodecOps {
            compress: codec_abi::c_compress,
            decompress: codec_abi::c_decompress,
            checksum: codec_abi::c_checksum,
        }),
        log: Some(LogOps {
            log_message: log_abi::c_log_message,
            log_file_operation: log_abi::c_log_file_operation,
            process_item: log_abi::c_process_item,
        }),
    }
}
