//! Call gateway: the single choke point for foreign calls.
//!
//! Every call walks `Idle -> Dispatched -> {Succeeded, Failed}`:
//! - arguments are marshalled and handles/buffers checked live while `Idle`;
//!   a failure there never reaches the foreign side,
//! - `Dispatched` covers the foreign call itself,
//! - a returned resource is wrapped inside the dispatch closure, so no raw
//!   pointer outlives the call without an owner,
//! - failure signals (status codes, null buffers) become typed errors or
//!   absent buffers.
//!
//! Calls are never retried. A foreign call that reports failure while still
//! handing back memory is a leak candidate and is freed on the spot.
//!
//! Opening a gateway calls the surface's `init`; dropping it calls `cleanup`.

#![allow(unsafe_code)]

use std::ffi::{CString, c_char};
use std::mem::size_of;
use std::sync::Arc;
use std::time::Instant;

use parking_lot::Mutex;
use serde::Serialize;

use crate::buffer::{Allocator, ForeignBuffer};
use crate::context::BoundaryContext;
use crate::error::{BoundaryError, ForeignFailure, Result};
use crate::handle::ForeignHandle;
use crate::log::{LogEntry, LogLevel, Outcome};
use crate::marshal::{DataRecord, Marshal, Marshaller, RawDataRecord};
use crate::metrics::BoundaryMetrics;
use crate::surface::{CodecOps, ForeignSurface, LogOps, MathOps, RecordOps, TextOps};

/// Phase of one foreign call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CallPhase {
    Idle,
    Dispatched,
    Succeeded,
    Failed,
}

/// Diagnostic trace of the most recent call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CallRecord {
    pub op: &'static str,
    pub phase: CallPhase,
}

/// How a dispatched call ended.
enum Completion<R> {
    Success(R),
    /// The foreign side signalled failure with a null result; the caller gets
    /// `R` (an absent value) rather than an error.
    Null(R),
    Failure(BoundaryError),
}

/// Record handles own a foreign `c_data_t`.
pub type RecordHandle = ForeignHandle<RawDataRecord>;

pub struct Gateway {
    ctx: Arc<BoundaryContext>,
    surface: ForeignSurface,
    marshaller: Marshaller,
    last_call: Mutex<Option<CallRecord>>,
}

impl Gateway {
    /// Open the surface (`init`) under `ctx`.
    #[must_use]
    pub fn open(ctx: &Arc<BoundaryContext>, surface: ForeignSurface) -> Self {
        // SAFETY: `init` takes no arguments and is infallible by contract.
        unsafe { (surface.core.init)() };
        ctx.log().emit(
            LogEntry::new(String::new(), LogLevel::Info, "gateway_open").with_details(
                serde_json::json!({
                    "surface": surface.name,
                    "capabilities": surface.capabilities(),
                }),
            ),
        );
        Self {
            ctx: Arc::clone(ctx),
            surface,
            marshaller: Marshaller::from_config(ctx.config()),
            last_call: Mutex::new(None),
        }
    }

    #[must_use]
    pub fn context(&self) -> &Arc<BoundaryContext> {
        &self.ctx
    }

    #[must_use]
    pub fn surface(&self) -> &ForeignSurface {
        &self.surface
    }

    #[must_use]
    pub fn marshaller(&self) -> Marshaller {
        self.marshaller
    }

    /// The most recent call made through this gateway, from any thread.
    #[must_use]
    pub fn last_call(&self) -> Option<CallRecord> {
        *self.last_call.lock()
    }

    // -----------------------------------------------------------------------
    // Dispatch machinery
    // -----------------------------------------------------------------------

    fn set_phase(&self, op: &'static str, phase: CallPhase) {
        *self.last_call.lock() = Some(CallRecord { op, phase });
    }

    /// Record an argument failure. The call stays `Idle`.
    fn reject<R>(&self, op: &'static str, err: BoundaryError) -> Result<R> {
        self.set_phase(op, CallPhase::Idle);
        self.ctx.log().emit(
            LogEntry::new(String::new(), LogLevel::Debug, "call_rejected")
                .with_op(op)
                .with_outcome(Outcome::Fail)
                .with_details(serde_json::json!({ "error": err.to_string() })),
        );
        Err(err)
    }

    fn dispatch<R>(&self, op: &'static str, call: impl FnOnce() -> Completion<R>) -> Result<R> {
        self.set_phase(op, CallPhase::Dispatched);
        BoundaryMetrics::inc(&self.ctx.metrics().calls_dispatched);
        let started = Instant::now();
        let completion = call();
        let latency_ns = u64::try_from(started.elapsed().as_nanos()).unwrap_or(u64::MAX);

        let (phase, result) = match completion {
            Completion::Success(value) => (CallPhase::Succeeded, Ok(value)),
            Completion::Null(value) => (CallPhase::Failed, Ok(value)),
            Completion::Failure(err) => (CallPhase::Failed, Err(err)),
        };
        self.set_phase(op, phase);

        let metrics = self.ctx.metrics();
        let entry = if phase == CallPhase::Succeeded {
            BoundaryMetrics::inc(&metrics.calls_succeeded);
            LogEntry::new(String::new(), LogLevel::Debug, "call_succeeded")
                .with_outcome(Outcome::Pass)
        } else {
            BoundaryMetrics::inc(&metrics.calls_failed);
            let mut entry = LogEntry::new(String::new(), LogLevel::Warn, "call_failed")
                .with_outcome(Outcome::Fail);
            if let Err(err) = &result {
                entry = entry.with_details(serde_json::json!({ "error": err.to_string() }));
            }
            entry
        };
        self.ctx
            .log()
            .emit(entry.with_op(op).with_latency_ns(latency_ns));
        result
    }

    /// Resolve an optional capability group, or fail the call while `Idle`.
    fn capability<G: Copy>(
        &self,
        op: &'static str,
        capability: &'static str,
        group: Option<G>,
    ) -> Result<G> {
        match group {
            Some(group) => Ok(group),
            None => self.reject(op, BoundaryError::CapabilityMissing { capability }),
        }
    }

    fn text(&self, op: &'static str) -> Result<TextOps> {
        self.capability(op, "text", self.surface.text)
    }

    fn math(&self, op: &'static str) -> Result<MathOps> {
        self.capability(op, "math", self.surface.math)
    }

    fn records(&self, op: &'static str) -> Result<RecordOps> {
        self.capability(op, "record", self.surface.record)
    }

    fn codec(&self, op: &'static str) -> Result<CodecOps> {
        self.capability(op, "codec", self.surface.codec)
    }

    fn logging(&self, op: &'static str) -> Result<LogOps> {
        self.capability(op, "log", self.surface.log)
    }

    /// Marshal text for a `const char*` parameter.
    fn c_text(&self, op: &'static str, text: &str) -> Result<CString> {
        let max = self.ctx.config().max_text_len;
        if text.len() > max {
            return self.reject(
                op,
                BoundaryError::invalid(op, format!("{} bytes exceeds limit of {max}", text.len())),
            );
        }
        match CString::new(text) {
            Ok(c_text) => Ok(c_text),
            Err(_) => self.reject(op, BoundaryError::invalid(op, "interior NUL byte")),
        }
    }

    /// Copy `text` plus a NUL into a fresh foreign allocation.
    fn foreign_c_string(&self, op: &'static str, text: &str) -> Result<ForeignBuffer> {
        let c_text = self.c_text(op, text)?;
        let bytes = c_text.as_bytes_with_nul();
        let mut buffer = self.allocate(bytes.len())?;
        buffer.as_mut_slice()?.copy_from_slice(bytes);
        Ok(buffer)
    }

    // -----------------------------------------------------------------------
    // Memory
    // -----------------------------------------------------------------------

    /// Allocate `size` bytes with the foreign allocator. The memory is zeroed
    /// before it is handed out.
    pub fn allocate(&self, size: usize) -> Result<ForeignBuffer> {
        const OP: &str = "alloc";
        if size == 0 {
            return self.reject(OP, BoundaryError::invalid(OP, "zero-size allocation"));
        }
        let core = self.surface.core;
        self.dispatch(OP, || {
            // SAFETY: `alloc` returns null or `size` writable bytes owned by us.
            let raw = unsafe { (core.alloc)(size) }.cast::<u8>();
            if !raw.is_null() {
                // SAFETY: `raw` is valid for `size` bytes.
                unsafe { std::ptr::write_bytes(raw, 0, size) };
            }
            // SAFETY: non-null `raw` is `size` initialized bytes from `core.alloc`.
            match unsafe {
                ForeignBuffer::wrap(&self.ctx, OP, raw, size, Allocator::Foreign { free: core.free })
            } {
                Some(buffer) => Completion::Success(buffer),
                None => Completion::Failure(BoundaryError::Acquisition {
                    op: OP,
                    reason: format!("foreign allocator returned null for {size} bytes"),
                }),
            }
        })
    }

    /// A native-origin buffer under this gateway's context.
    #[must_use]
    pub fn native_buffer(&self, bytes: Vec<u8>) -> ForeignBuffer {
        ForeignBuffer::from_vec(&self.ctx, "native", bytes)
    }

    // -----------------------------------------------------------------------
    // Text
    // -----------------------------------------------------------------------

    /// Run the foreign string processor. Non-zero status becomes
    /// `BoundaryError::Foreign`.
    pub fn process_string(&self, text: &str) -> Result<()> {
        const OP: &str = "process_string";
        let ops = self.text(OP)?;
        let c_text = self.c_text(OP, text)?;
        self.dispatch(OP, || {
            // SAFETY: `c_text` is a valid NUL-terminated string for the call.
            let status = unsafe { (ops.process_string)(c_text.as_ptr()) };
            match ForeignFailure::from_status(status) {
                None => Completion::Success(()),
                Some(failure) => Completion::Failure(BoundaryError::Foreign { op: OP, failure }),
            }
        })
    }

    pub fn validate_input(&self, text: &str) -> Result<bool> {
        const OP: &str = "validate_input";
        let ops = self.text(OP)?;
        let c_text = self.c_text(OP, text)?;
        self.dispatch(OP, || {
            // SAFETY: `c_text` is a valid NUL-terminated string for the call.
            Completion::Success(unsafe { (ops.validate_input)(c_text.as_ptr()) } != 0)
        })
    }

    pub fn validate_bytes(&self, bytes: &[u8]) -> Result<bool> {
        const OP: &str = "validate_bytes";
        let ops = self.text(OP)?;
        self.dispatch(OP, || {
            // SAFETY: pointer and length describe a live slice.
            Completion::Success(unsafe { (ops.validate_bytes)(bytes.as_ptr(), bytes.len()) })
        })
    }

    /// Upper-case `text` with the foreign in-place primitive.
    pub fn to_upper(&self, text: &str) -> Result<String> {
        const OP: &str = "to_upper";
        let ops = self.text(OP)?;
        let mut buffer = self.foreign_c_string(OP, text)?;
        let raw = buffer.as_mut_ptr()?;
        self.dispatch(OP, || {
            // SAFETY: `raw` is a live NUL-terminated foreign allocation.
            unsafe { (ops.to_upper)(raw.cast::<c_char>()) };
            Completion::Success(())
        })?;
        let bytes = buffer.as_slice()?;
        let text_len = bytes.len() - 1;
        let out = String::from_utf8(bytes[..text_len].to_vec())
            .map_err(|e| BoundaryError::malformed("text", format!("invalid UTF-8: {e}")));
        buffer.release()?;
        out
    }

    // -----------------------------------------------------------------------
    // Math
    // -----------------------------------------------------------------------

    pub fn add(&self, a: f64, b: f64) -> Result<f64> {
        let ops = self.math("add")?;
        // SAFETY: pure numeric primitive.
        self.dispatch("add", || Completion::Success(unsafe { (ops.add)(a, b) }))
    }

    pub fn multiply(&self, a: f64, b: f64) -> Result<f64> {
        let ops = self.math("multiply")?;
        // SAFETY: pure numeric primitive.
        self.dispatch("multiply", || Completion::Success(unsafe { (ops.multiply)(a, b) }))
    }

    pub fn complex_calculation(&self, x: f64, y: f64) -> Result<f64> {
        let ops = self.math("complex_calculation")?;
        self.dispatch("complex_calculation", || {
            // SAFETY: pure numeric primitive.
            Completion::Success(unsafe { (ops.complex_calculation)(x, y) })
        })
    }

    /// `add(x, y) + multiply(x, y)`.
    pub fn calculate(&self, x: f64, y: f64) -> Result<f64> {
        Ok(self.add(x, y)? + self.multiply(x, y)?)
    }

    // -----------------------------------------------------------------------
    // Records
    // -----------------------------------------------------------------------

    /// Allocate and initialize a foreign `c_data_t`. The handle's destructor
    /// runs the foreign cleanup and then frees the memory.
    pub fn new_record(&self) -> Result<RecordHandle> {
        const OP: &str = "init_record";
        let ops = self.records(OP)?;
        let core = self.surface.core;
        let size = size_of::<RawDataRecord>();
        self.dispatch(OP, || {
            // SAFETY: the destructor undoes exactly what the constructor did.
            let handle = unsafe {
                ForeignHandle::acquire(
                    &self.ctx,
                    OP,
                    size,
                    || {
                        let raw = (core.alloc)(size).cast::<RawDataRecord>();
                        if !raw.is_null() {
                            (ops.init)(raw);
                        }
                        raw
                    },
                    move |raw| {
                        (ops.cleanup)(raw.as_ptr());
                        (core.free)(raw.as_ptr().cast());
                    },
                )
            };
            match handle {
                Ok(handle) => Completion::Success(handle),
                Err(err) => Completion::Failure(err),
            }
        })
    }

    pub fn process_record(&self, handle: &RecordHandle) -> Result<()> {
        const OP: &str = "process_record";
        let ops = self.records(OP)?;
        let raw = handle.get().or_else(|err| self.reject(OP, err))?;
        // SAFETY: `raw` is a live record owned by `handle`.
        self.dispatch(OP, || {
            unsafe { (ops.process)(raw.as_ptr()) };
            Completion::Success(())
        })
    }

    pub fn validate_record(&self, handle: &RecordHandle) -> Result<bool> {
        const OP: &str = "validate_record";
        let ops = self.records(OP)?;
        let raw = handle.get().or_else(|err| self.reject(OP, err))?;
        // SAFETY: `raw` is a live record owned by `handle`.
        self.dispatch(OP, || Completion::Success(unsafe { (ops.validate)(raw.as_ptr()) }))
    }

    /// Marshal the foreign record into a native value.
    pub fn read_record(&self, handle: &RecordHandle) -> Result<DataRecord> {
        self.marshaller.from_foreign(record_bytes(handle)?)
    }

    /// Marshal `record` into the foreign record. Returns the names of fields
    /// truncated under the `truncate` overflow policy.
    pub fn write_record(
        &self,
        handle: &RecordHandle,
        record: &DataRecord,
    ) -> Result<Vec<&'static str>> {
        let raw = handle.get()?;
        let marshalled = self.marshaller.to_foreign(record)?;
        let bytes = marshalled.bytes.as_bytes();
        debug_assert_eq!(bytes.len(), DataRecord::SIZE);
        // SAFETY: `raw` owns `size_of::<RawDataRecord>() == DataRecord::SIZE`
        // bytes, and the handle is not shared.
        unsafe {
            std::ptr::copy_nonoverlapping(bytes.as_ptr(), raw.as_ptr().cast::<u8>(), bytes.len());
        }
        if marshalled.is_truncated() {
            for _ in &marshalled.truncated {
                BoundaryMetrics::inc(&self.ctx.metrics().truncations);
            }
            self.ctx.log().emit(
                LogEntry::new(String::new(), LogLevel::Info, "field_truncated")
                    .with_op("write_record")
                    .with_token(handle.id())
                    .with_details(serde_json::json!({ "fields": marshalled.truncated })),
            );
        }
        Ok(marshalled.truncated)
    }

    /// Create, process, read back and destroy a record.
    pub fn use_record(&self) -> Result<DataRecord> {
        let mut handle = self.new_record()?;
        self.process_record(&handle)?;
        let record = self.read_record(&handle)?;
        handle.release()?;
        Ok(record)
    }

    // -----------------------------------------------------------------------
    // Logging (fire-and-forget)
    // -----------------------------------------------------------------------

    pub fn log_message(&self, msg: &str) -> Result<()> {
        const OP: &str = "log_message";
        let ops = self.logging(OP)?;
        let c_msg = self.c_text(OP, msg)?;
        self.dispatch(OP, || {
            // SAFETY: valid NUL-terminated string for the call.
            unsafe { (ops.log_message)(c_msg.as_ptr()) };
            Completion::Success(())
        })
    }

    pub fn log_file_operation(&self, path: &str, operation: &str) -> Result<()> {
        const OP: &str = "log_file_operation";
        let ops = self.logging(OP)?;
        let c_path = self.c_text(OP, path)?;
        let c_op = self.c_text(OP, operation)?;
        self.dispatch(OP, || {
            // SAFETY: both strings are valid and NUL-terminated.
            unsafe { (ops.log_file_operation)(c_path.as_ptr(), c_op.as_ptr()) };
            Completion::Success(())
        })
    }

    pub fn process_item(&self, item: &str) -> Result<()> {
        const OP: &str = "process_item";
        let ops = self.logging(OP)?;
        let c_item = self.c_text(OP, item)?;
        self.dispatch(OP, || {
            // SAFETY: valid NUL-terminated string for the call.
            unsafe { (ops.process_item)(c_item.as_ptr()) };
            Completion::Success(())
        })
    }

    // -----------------------------------------------------------------------
    // Wrapper workflows
    // -----------------------------------------------------------------------

    /// Copy `input` into foreign memory and run the string processor on it.
    /// Returns whether the processor accepted it.
    pub fn process_data(&self, input: &str) -> Result<bool> {
        const OP: &str = "process_data";
        let ops = self.text(OP)?;
        let mut buffer = self.foreign_c_string(OP, input)?;
        let raw = buffer.as_mut_ptr()?;
        let accepted = self.dispatch("process_string", || {
            // SAFETY: `raw` is a live NUL-terminated foreign allocation.
            let status = unsafe { (ops.process_string)(raw.cast::<c_char>().cast_const()) };
            match ForeignFailure::from_status(status) {
                None => Completion::Success(true),
                Some(failure) => Completion::Failure(BoundaryError::Foreign {
                    op: "process_string",
                    failure,
                }),
            }
        });
        buffer.release()?;
        match accepted {
            Ok(accepted) => Ok(accepted),
            Err(BoundaryError::Foreign { .. }) => Ok(false),
            Err(err) => Err(err),
        }
    }

    /// Log `input` and validate it. The validation result is not used.
    pub fn process_c_data(&self, input: &str) -> Result<()> {
        self.log_message(input)?;
        self.validate_input(input)?;
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Codec
    // -----------------------------------------------------------------------

    /// Compress `data`. A null foreign result is `Ok(None)`.
    pub fn compress(&self, data: &[u8]) -> Result<Option<ForeignBuffer>> {
        let ops = self.codec("compress")?;
        self.transform("compress", ops.compress, data)
    }

    /// Decompress `data`. A null foreign result is `Ok(None)`.
    pub fn decompress(&self, data: &[u8]) -> Result<Option<ForeignBuffer>> {
        let ops = self.codec("decompress")?;
        self.transform("decompress", ops.decompress, data)
    }

    fn transform(
        &self,
        op: &'static str,
        primitive: unsafe extern "C" fn(*const u8, usize, *mut usize) -> *mut u8,
        data: &[u8],
    ) -> Result<Option<ForeignBuffer>> {
        let core = self.surface.core;
        self.dispatch(op, || {
            let mut out_len = 0usize;
            // SAFETY: input slice is live; `out_len` is a valid out-parameter.
            let raw = unsafe { primitive(data.as_ptr(), data.len(), &mut out_len) };
            if raw.is_null() {
                return Completion::Null(None);
            }
            if out_len == 0 {
                // Failure signalled by length while memory came back anyway.
                // SAFETY: non-null results come from `core.alloc`.
                unsafe { (core.free)(raw.cast()) };
                BoundaryMetrics::inc(&self.ctx.metrics().leak_candidates);
                self.ctx.log().emit(
                    LogEntry::new(String::new(), LogLevel::Warn, "leak_candidate_released")
                        .with_op(op),
                );
                return Completion::Null(None);
            }
            // SAFETY: non-null result holds `out_len` bytes from `core.alloc`.
            let buffer = unsafe {
                ForeignBuffer::wrap(&self.ctx, op, raw, out_len, Allocator::Foreign { free: core.free })
            };
            Completion::Success(buffer)
        })
    }

    pub fn checksum(&self, data: &[u8]) -> Result<u32> {
        const OP: &str = "checksum";
        let ops = self.codec(OP)?;
        self.dispatch(OP, || {
            // SAFETY: pointer and length describe a live slice.
            Completion::Success(unsafe { (ops.checksum)(data.as_ptr(), data.len()) })
        })
    }
}

impl Drop for Gateway {
    fn drop(&mut self) {
        // SAFETY: paired with the `init` in `open`.
        unsafe { (self.surface.core.cleanup)() };
        self.ctx.log().emit(
            LogEntry::new(String::new(), LogLevel::Info, "gateway_close")
                .with_details(serde_json::json!({ "live": self.ctx.registry().live_count() })),
        );
    }
}

impl std::fmt::Debug for Gateway {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Gateway")
            .field("surface", &self.surface.name)
            .field("last_call", &self.last_call())
            .finish_non_exhaustive()
    }
}

/// Bytes of the record owned by `handle`, borrowed for as long as the handle.
fn record_bytes(handle: &RecordHandle) -> Result<&[u8]> {
    let raw = handle.get()?;
    // SAFETY: `raw` stays live while `handle` is borrowed, since releasing
    // needs `&mut`. Foreign init zeroes the whole struct, padding included.
    Ok(unsafe { std::slice::from_raw_parts(raw.as_ptr().cast::<u8>(), DataRecord::SIZE) })
}
