//! Move-only owner of a resource created and destroyed by foreign calls.
//!
//! A [`ForeignHandle`] is the only owner of its raw pointer. It is not
//! `Clone`. The destructor runs exactly once: on [`ForeignHandle::release`]
//! or on drop, whichever comes first. After release the pointer is gone from
//! the handle, so every later access fails with `UseAfterRelease` and a second
//! release fails with `DoubleRelease`.

#![allow(unsafe_code)]

use std::fmt;
use std::ptr::NonNull;
use std::sync::Arc;

use crate::context::BoundaryContext;
use crate::error::{BoundaryError, Result};
use crate::log::{LogEntry, LogLevel};
use crate::metrics::BoundaryMetrics;
use crate::registry::{AllocationMeta, TokenId};

type Destructor<T> = Box<dyn FnOnce(NonNull<T>) + Send>;

enum HandleState<T> {
    Live {
        raw: NonNull<T>,
        destructor: Destructor<T>,
    },
    Released,
    /// Ownership was transferred out with [`ForeignHandle::take`].
    Moved,
}

pub struct ForeignHandle<T> {
    ctx: Arc<BoundaryContext>,
    id: TokenId,
    site: &'static str,
    state: HandleState<T>,
}

// SAFETY: the handle is the sole owner of `raw`; moving it to another thread
// moves ownership with it. It is deliberately not `Sync`.
unsafe impl<T: Send> Send for ForeignHandle<T> {}

impl<T> ForeignHandle<T> {
    /// Run a foreign creation call and take ownership of its result.
    ///
    /// A null result is an `Acquisition` error and leaves no registry entry.
    ///
    /// # Safety
    ///
    /// `destructor` must be the foreign call that destroys what `constructor`
    /// created, and nothing else may free the returned pointer.
    pub unsafe fn acquire<C, D>(
        ctx: &Arc<BoundaryContext>,
        site: &'static str,
        size: usize,
        constructor: C,
        destructor: D,
    ) -> Result<Self>
    where
        C: FnOnce() -> *mut T,
        D: FnOnce(NonNull<T>) + Send + 'static,
    {
        let Some(raw) = NonNull::new(constructor()) else {
            ctx.log().emit(
                LogEntry::new(String::new(), LogLevel::Warn, "acquire_failed").with_op(site),
            );
            return Err(BoundaryError::Acquisition {
                op: site,
                reason: "foreign constructor returned null".to_string(),
            });
        };

        let id = ctx.registry().issue();
        ctx.registry().record(id, AllocationMeta::handle(site, size));
        BoundaryMetrics::inc(&ctx.metrics().handles_acquired);
        ctx.log().emit(
            LogEntry::new(String::new(), LogLevel::Debug, "handle_acquired")
                .with_op(site)
                .with_token(id),
        );

        Ok(Self {
            ctx: Arc::clone(ctx),
            id,
            site,
            state: HandleState::Live {
                raw,
                destructor: Box::new(destructor),
            },
        })
    }

    #[must_use]
    pub fn id(&self) -> TokenId {
        self.id
    }

    #[must_use]
    pub fn site(&self) -> &'static str {
        self.site
    }

    #[must_use]
    pub fn is_live(&self) -> bool {
        matches!(self.state, HandleState::Live { .. })
    }

    /// The raw pointer, for passing to a foreign call.
    pub fn get(&self) -> Result<NonNull<T>> {
        match &self.state {
            HandleState::Live { raw, .. } => Ok(*raw),
            HandleState::Released | HandleState::Moved => Err(self
                .ctx
                .violation(BoundaryError::UseAfterRelease { id: self.id })),
        }
    }

    /// Run the destructor now.
    pub fn release(&mut self) -> Result<()> {
        match std::mem::replace(&mut self.state, HandleState::Released) {
            HandleState::Live { raw, destructor } => {
                destructor(raw);
                self.ctx.registry().forget(self.id);
                BoundaryMetrics::inc(&self.ctx.metrics().handles_released);
                self.ctx.log().emit(
                    LogEntry::new(String::new(), LogLevel::Debug, "handle_released")
                        .with_op(self.site)
                        .with_token(self.id),
                );
                Ok(())
            }
            HandleState::Released => {
                Err(self.ctx.violation(BoundaryError::DoubleRelease { id: self.id }))
            }
            HandleState::Moved => {
                self.state = HandleState::Moved;
                Err(self
                    .ctx
                    .violation(BoundaryError::UseAfterRelease { id: self.id }))
            }
        }
    }

    /// Transfer ownership into a new handle, leaving this one invalid.
    ///
    /// The resource keeps its id; only the owner changes.
    pub fn take(&mut self) -> Result<Self> {
        match std::mem::replace(&mut self.state, HandleState::Moved) {
            live @ HandleState::Live { .. } => Ok(Self {
                ctx: Arc::clone(&self.ctx),
                id: self.id,
                site: self.site,
                state: live,
            }),
            other => {
                self.state = other;
                Err(self
                    .ctx
                    .violation(BoundaryError::UseAfterRelease { id: self.id }))
            }
        }
    }
}

impl<T> Drop for ForeignHandle<T> {
    fn drop(&mut self) {
        if self.is_live() {
            let _ = self.release();
        }
    }
}

impl<T> fmt::Debug for ForeignHandle<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = match self.state {
            HandleState::Live { .. } => "live",
            HandleState::Released => "released",
            HandleState::Moved => "moved",
        };
        f.debug_struct("ForeignHandle")
            .field("id", &self.id)
            .field("site", &self.site)
            .field("state", &state)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{BoundaryConfig, ViolationMode};
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn ctx() -> Arc<BoundaryContext> {
        BoundaryContext::new(BoundaryConfig::default().with_violations(ViolationMode::Report))
    }

    fn boxed(ctx: &Arc<BoundaryContext>, drops: &Arc<AtomicUsize>) -> ForeignHandle<u64> {
        let drops = Arc::clone(drops);
        // SAFETY: the destructor frees exactly what the constructor boxed.
        unsafe {
            ForeignHandle::acquire(
                ctx,
                "boxed",
                8,
                || Box::into_raw(Box::new(7u64)),
                move |p| {
                    drop(Box::from_raw(p.as_ptr()));
                    drops.fetch_add(1, Ordering::SeqCst);
                },
            )
        }
        .expect("acquire")
    }

    #[test]
    fn acquire_registers_and_release_forgets() {
        let ctx = ctx();
        let drops = Arc::new(AtomicUsize::new(0));
        let mut h = boxed(&ctx, &drops);
        assert!(ctx.registry().contains(h.id()));
        // SAFETY: handle is live and points at a boxed u64.
        assert_eq!(unsafe { *h.get().unwrap().as_ptr() }, 7);

        h.release().unwrap();
        assert_eq!(drops.load(Ordering::SeqCst), 1);
        assert!(ctx.leak_report().is_empty());
    }

    #[test]
    fn double_release_and_use_after_release_fail() {
        let ctx = ctx();
        let drops = Arc::new(AtomicUsize::new(0));
        let mut h = boxed(&ctx, &drops);
        let id = h.id();
        h.release().unwrap();

        assert_eq!(h.get().unwrap_err(), BoundaryError::UseAfterRelease { id });
        assert_eq!(h.release().unwrap_err(), BoundaryError::DoubleRelease { id });
        assert_eq!(drops.load(Ordering::SeqCst), 1);

        let snap = ctx.metrics().snapshot();
        assert_eq!(snap.double_releases, 1);
        assert_eq!(snap.use_after_release, 1);
    }

    #[test]
    fn drop_releases_exactly_once() {
        let ctx = ctx();
        let drops = Arc::new(AtomicUsize::new(0));
        {
            let _h = boxed(&ctx, &drops);
        }
        assert_eq!(drops.load(Ordering::SeqCst), 1);

        let mut h = boxed(&ctx, &drops);
        h.release().unwrap();
        drop(h);
        assert_eq!(drops.load(Ordering::SeqCst), 2);
        assert!(ctx.leak_report().is_empty());
    }

    #[test]
    fn null_constructor_is_acquisition_error_without_entry() {
        let ctx = ctx();
        // SAFETY: nothing is created, so nothing is destroyed.
        let err = unsafe {
            ForeignHandle::<u64>::acquire(&ctx, "null_ctor", 8, std::ptr::null_mut, |_| {})
        }
        .unwrap_err();
        assert!(matches!(err, BoundaryError::Acquisition { op: "null_ctor", .. }));
        assert!(ctx.leak_report().is_empty());
        assert_eq!(ctx.metrics().snapshot().handles_acquired, 0);
    }

    #[test]
    fn take_transfers_ownership() {
        let ctx = ctx();
        let drops = Arc::new(AtomicUsize::new(0));
        let mut source = boxed(&ctx, &drops);
        let id = source.id();
        let mut dest = source.take().unwrap();

        assert_eq!(dest.id(), id);
        assert!(!source.is_live());
        assert_eq!(source.get().unwrap_err(), BoundaryError::UseAfterRelease { id });
        assert_eq!(source.release().unwrap_err(), BoundaryError::UseAfterRelease { id });
        assert!(source.take().is_err());
        drop(source);
        assert_eq!(drops.load(Ordering::SeqCst), 0);
        assert!(ctx.registry().contains(id));

        dest.release().unwrap();
        assert_eq!(drops.load(Ordering::SeqCst), 1);
        assert!(ctx.leak_report().is_empty());
    }

    #[test]
    fn handles_move_between_threads() {
        let ctx = ctx();
        let drops = Arc::new(AtomicUsize::new(0));
        let h = boxed(&ctx, &drops);
        std::thread::spawn(move || {
            let mut h = h;
            h.release().unwrap();
        })
        .join()
        .unwrap();
        assert_eq!(drops.load(Ordering::SeqCst), 1);
        assert!(ctx.leak_report().is_empty());
    }
}
