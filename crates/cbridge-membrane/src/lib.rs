//! Safe boundary layer between Rust and a C-ABI foreign library.
//!
//! Raw pointers, NUL-terminated strings and hand-managed lifetimes never leak
//! past this crate. Callers see owned handles, origin-tagged buffers, plain
//! native records and typed errors.
//!
//! # Architecture
//!
//! - **Surface** (`surface`): capability groups of foreign `extern "C"` primitives
//! - **Gateway** (`gateway`): the only place foreign calls are made
//! - **Handles** (`handle`): move-only owners with exactly-once destruction
//! - **Buffers** (`buffer`): length-carrying memory tagged with its allocator
//! - **Marshalling** (`marshal`): fixed C layouts to and from native values
//! - **Registry** (`registry`): every live handle and buffer, for leak checks
//! - **Context** (`context`): config, registry, metrics and log for one boundary
//! - **Configuration** (`config`), **metrics** (`metrics`), **logging** (`log`)

#![deny(unsafe_code)]

pub mod buffer;
pub mod config;
pub mod context;
pub mod error;
pub mod gateway;
pub mod handle;
pub mod log;
pub mod marshal;
pub mod metrics;
pub mod registry;
pub mod surface;

pub use buffer::{Allocator, ForeignBuffer};
pub use config::{BoundaryConfig, OverflowPolicy, ViolationMode};
pub use context::BoundaryContext;
pub use error::{BoundaryError, ForeignFailure, Origin, Result};
pub use gateway::{CallPhase, CallRecord, Gateway, RecordHandle};
pub use handle::ForeignHandle;
pub use log::{LogEmitter, LogEntry, LogLevel, Outcome, now_utc};
pub use marshal::{DataRecord, ForeignBytes, Marshal, Marshalled, Marshaller, PersonRecord, Point};
pub use metrics::{BoundaryMetrics, MetricsSnapshot};
pub use registry::{AllocationMeta, BoundaryRegistry, LiveEntry, ResourceKind, TokenId};
pub use surface::{CodecOps, CoreOps, ForeignSurface, LogOps, MathOps, RecordOps, TextOps};
