//! Lifecycle-scoped state shared by everything crossing one boundary.
//!
//! A [`BoundaryContext`] replaces process-wide mutable state: each gateway,
//! handle and buffer holds an `Arc` to the context it was created under, so
//! separate contexts (one per test, say) never observe each other.

use std::sync::Arc;

use crate::config::BoundaryConfig;
use crate::error::BoundaryError;
use crate::log::{LogEmitter, LogEntry, LogLevel, Outcome};
use crate::metrics::BoundaryMetrics;
use crate::registry::{BoundaryRegistry, LiveEntry};

#[derive(Debug)]
pub struct BoundaryContext {
    config: BoundaryConfig,
    registry: BoundaryRegistry,
    metrics: BoundaryMetrics,
    log: LogEmitter,
}

impl BoundaryContext {
    /// A context with the given config that discards log output.
    #[must_use]
    pub fn new(config: BoundaryConfig) -> Arc<Self> {
        Self::with_log(config, LogEmitter::discard())
    }

    #[must_use]
    pub fn with_log(config: BoundaryConfig, log: LogEmitter) -> Arc<Self> {
        Arc::new(Self {
            config,
            registry: BoundaryRegistry::new(),
            metrics: BoundaryMetrics::new(),
            log,
        })
    }

    /// Default config, logging to stderr at the configured level.
    #[must_use]
    pub fn from_env() -> Arc<Self> {
        let config = BoundaryConfig::from_env();
        Self::with_log(config, LogEmitter::to_stderr("cbridge", config.log_level))
    }

    #[must_use]
    pub fn config(&self) -> &BoundaryConfig {
        &self.config
    }

    #[must_use]
    pub fn registry(&self) -> &BoundaryRegistry {
        &self.registry
    }

    #[must_use]
    pub fn metrics(&self) -> &BoundaryMetrics {
        &self.metrics
    }

    #[must_use]
    pub fn log(&self) -> &LogEmitter {
        &self.log
    }

    /// Live registry entries. Empty means nothing leaked.
    #[must_use]
    pub fn leak_report(&self) -> Vec<LiveEntry> {
        self.registry.snapshot()
    }

    /// Surface a lifecycle violation: count it, log it, and either hand the
    /// error back or panic, depending on the configured violation mode.
    pub(crate) fn violation(&self, err: BoundaryError) -> BoundaryError {
        let counter = match &err {
            BoundaryError::DoubleRelease { .. } => &self.metrics.double_releases,
            BoundaryError::UseAfterRelease { .. } => &self.metrics.use_after_release,
            BoundaryError::AllocatorMismatch { .. } => &self.metrics.allocator_mismatches,
            _ => return err,
        };
        BoundaryMetrics::inc(counter);

        let mut entry = LogEntry::new(String::new(), LogLevel::Error, "lifecycle_violation")
            .with_outcome(Outcome::Fail)
            .with_details(serde_json::json!({ "error": err.to_string() }));
        if let BoundaryError::DoubleRelease { id }
        | BoundaryError::UseAfterRelease { id }
        | BoundaryError::AllocatorMismatch { id, .. } = &err
        {
            entry = entry.with_token(*id);
        }
        self.log.emit(entry);

        if self.config.violations.is_fatal() {
            let _ = self.log.flush();
            panic!("lifecycle violation: {err}");
        }
        err
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ViolationMode;
    use crate::registry::TokenId;

    #[test]
    fn violation_is_counted_and_logged() {
        let ctx = BoundaryContext::with_log(
            BoundaryConfig::default().with_violations(ViolationMode::Report),
            LogEmitter::to_buffer("ctx", LogLevel::Trace),
        );
        let id = TokenId::from_raw(3);
        let err = ctx.violation(BoundaryError::DoubleRelease { id });
        assert_eq!(err, BoundaryError::DoubleRelease { id });
        assert_eq!(ctx.metrics().snapshot().double_releases, 1);

        let entries = ctx.log().entries();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].event, "lifecycle_violation");
        assert_eq!(entries[0].level, LogLevel::Error);
        assert_eq!(entries[0].token, Some(3));
    }

    #[test]
    fn non_lifecycle_errors_pass_through_untouched() {
        let ctx = BoundaryContext::with_log(
            BoundaryConfig::default().with_violations(ViolationMode::Report),
            LogEmitter::to_buffer("ctx", LogLevel::Trace),
        );
        let err = ctx.violation(BoundaryError::CapabilityMissing { capability: "codec" });
        assert!(matches!(err, BoundaryError::CapabilityMissing { .. }));
        assert!(ctx.log().entries().is_empty());
        assert_eq!(ctx.metrics().snapshot().violations(), 0);
    }

    #[test]
    #[should_panic(expected = "lifecycle violation")]
    fn abort_mode_panics() {
        let ctx = BoundaryContext::new(BoundaryConfig::default().with_violations(ViolationMode::Abort));
        let _ = ctx.violation(BoundaryError::UseAfterRelease {
            id: TokenId::from_raw(1),
        });
    }

    #[test]
    fn fresh_context_has_no_leaks() {
        let ctx = BoundaryContext::new(BoundaryConfig::default());
        assert!(ctx.leak_report().is_empty());
    }
}
