//! Length-carrying buffers whose memory belongs to one side of the boundary.
//!
//! Every buffer is tagged with its [`Origin`]. Native buffers are freed by the
//! Rust allocator, foreign buffers by the foreign `free` they were allocated
//! against. Releasing through the other side's deallocator is refused with
//! `AllocatorMismatch` and leaves the buffer untouched.

#![allow(unsafe_code)]

use std::ffi::c_void;
use std::fmt;
use std::ops::Range;
use std::ptr::NonNull;
use std::sync::Arc;

use crate::context::BoundaryContext;
use crate::error::{BoundaryError, Origin, Result};
use crate::log::{LogEntry, LogLevel};
use crate::metrics::BoundaryMetrics;
use crate::registry::{AllocationMeta, TokenId};

/// Deallocation primitive chosen when a buffer is wrapped.
#[derive(Clone, Copy)]
pub enum Allocator {
    /// Memory came from `Box<[u8]>` with exactly the buffer's length.
    Native,
    /// Memory came from the foreign allocator paired with `free`.
    Foreign { free: unsafe extern "C" fn(*mut c_void) },
}

impl Allocator {
    #[must_use]
    pub const fn origin(&self) -> Origin {
        match self {
            Self::Native => Origin::Native,
            Self::Foreign { .. } => Origin::Foreign,
        }
    }
}

impl fmt::Debug for Allocator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Native => "Native",
            Self::Foreign { .. } => "Foreign",
        })
    }
}

pub struct ForeignBuffer {
    ctx: Arc<BoundaryContext>,
    id: TokenId,
    site: &'static str,
    ptr: NonNull<u8>,
    len: usize,
    allocator: Allocator,
    live: bool,
}

// SAFETY: the buffer exclusively owns its allocation, like `Box<[u8]>`.
unsafe impl Send for ForeignBuffer {}

impl ForeignBuffer {
    /// Wrap a raw allocation. A null token yields `None`: an absent buffer,
    /// never one with a dangling pointer.
    ///
    /// # Safety
    ///
    /// A non-null `token` must point to `length` initialized bytes allocated
    /// by `allocator`, and ownership passes to the returned buffer.
    pub unsafe fn wrap(
        ctx: &Arc<BoundaryContext>,
        site: &'static str,
        token: *mut u8,
        length: usize,
        allocator: Allocator,
    ) -> Option<Self> {
        let ptr = NonNull::new(token)?;
        Some(Self::track(ctx, site, ptr, length, allocator))
    }

    /// A native-origin buffer that takes ownership of `bytes`.
    #[must_use]
    pub fn from_vec(ctx: &Arc<BoundaryContext>, site: &'static str, bytes: Vec<u8>) -> Self {
        let boxed: &mut [u8] = Box::leak(bytes.into_boxed_slice());
        let len = boxed.len();
        Self::track(ctx, site, NonNull::from(boxed).cast(), len, Allocator::Native)
    }

    fn track(
        ctx: &Arc<BoundaryContext>,
        site: &'static str,
        ptr: NonNull<u8>,
        length: usize,
        allocator: Allocator,
    ) -> Self {
        let id = ctx.registry().issue();
        ctx.registry().record(
            id,
            AllocationMeta::buffer(site, length, allocator.origin()),
        );
        BoundaryMetrics::inc(&ctx.metrics().buffers_wrapped);
        ctx.log().emit(
            LogEntry::new(String::new(), LogLevel::Debug, "buffer_wrapped")
                .with_op(site)
                .with_token(id)
                .with_details(serde_json::json!({
                    "len": length,
                    "origin": allocator.origin(),
                })),
        );
        Self {
            ctx: Arc::clone(ctx),
            id,
            site,
            ptr,
            len: length,
            allocator,
            live: true,
        }
    }

    #[must_use]
    pub fn id(&self) -> TokenId {
        self.id
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.len
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    #[must_use]
    pub fn origin(&self) -> Origin {
        self.allocator.origin()
    }

    #[must_use]
    pub fn is_live(&self) -> bool {
        self.live
    }

    fn check_live(&self) -> Result<()> {
        if self.live {
            Ok(())
        } else {
            Err(self
                .ctx
                .violation(BoundaryError::UseAfterRelease { id: self.id }))
        }
    }

    /// Read-only view, valid while the borrow lasts.
    pub fn as_slice(&self) -> Result<&[u8]> {
        self.check_live()?;
        // SAFETY: live buffers own `len` initialized bytes at `ptr`.
        Ok(unsafe { std::slice::from_raw_parts(self.ptr.as_ptr(), self.len) })
    }

    pub fn as_mut_slice(&mut self) -> Result<&mut [u8]> {
        self.check_live()?;
        // SAFETY: as above, and `&mut self` guarantees exclusivity.
        Ok(unsafe { std::slice::from_raw_parts_mut(self.ptr.as_ptr(), self.len) })
    }

    /// Bounds-checked sub-slice. Out-of-range requests are `InvalidArgument`.
    pub fn get(&self, range: Range<usize>) -> Result<&[u8]> {
        let len = self.len;
        self.as_slice()?.get(range.clone()).ok_or_else(|| {
            BoundaryError::invalid(
                "buffer_get",
                format!("range {range:?} outside buffer of {len} bytes"),
            )
        })
    }

    /// Copy the contents out.
    pub fn to_vec(&self) -> Result<Vec<u8>> {
        Ok(self.as_slice()?.to_vec())
    }

    /// Raw pointer for handing to a foreign call.
    pub(crate) fn as_mut_ptr(&mut self) -> Result<*mut u8> {
        self.check_live()?;
        Ok(self.ptr.as_ptr())
    }

    /// Free through the origin-appropriate deallocator.
    pub fn release(&mut self) -> Result<()> {
        self.release_with(self.origin())
    }

    /// Free through the deallocator of `attempted`. Fails with
    /// `AllocatorMismatch` when that is not the buffer's origin.
    pub fn release_with(&mut self, attempted: Origin) -> Result<()> {
        if !self.live {
            return Err(self.ctx.violation(BoundaryError::DoubleRelease { id: self.id }));
        }
        if attempted != self.origin() {
            return Err(self.ctx.violation(BoundaryError::AllocatorMismatch {
                id: self.id,
                origin: self.origin(),
                attempted,
            }));
        }

        self.live = false;
        match self.allocator {
            Allocator::Native => {
                let slice = std::ptr::slice_from_raw_parts_mut(self.ptr.as_ptr(), self.len);
                // SAFETY: native buffers were created from `Box<[u8]>` of `len`.
                drop(unsafe { Box::from_raw(slice) });
            }
            Allocator::Foreign { free } => {
                // SAFETY: foreign buffers were allocated by the allocator paired
                // with `free`, and `live` guarantees this is the only call.
                unsafe { free(self.ptr.as_ptr().cast()) };
            }
        }
        self.ctx.registry().forget(self.id);
        BoundaryMetrics::inc(&self.ctx.metrics().buffers_released);
        self.ctx.log().emit(
            LogEntry::new(String::new(), LogLevel::Debug, "buffer_released")
                .with_op(self.site)
                .with_token(self.id),
        );
        Ok(())
    }
}

impl Drop for ForeignBuffer {
    fn drop(&mut self) {
        if self.live {
            let _ = self.release();
        }
    }
}

impl fmt::Debug for ForeignBuffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ForeignBuffer")
            .field("id", &self.id)
            .field("site", &self.site)
            .field("len", &self.len)
            .field("origin", &self.origin())
            .field("live", &self.live)
            .finish()
    }
}
