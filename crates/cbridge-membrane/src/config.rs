//! Boundary configuration.
//!
//! Settings can be built in code or read from the environment:
//! - `CBRIDGE_ON_OVERFLOW`: `truncate` (default) or `reject`. Decides what the
//!   marshaller does with a string field longer than its foreign capacity.
//! - `CBRIDGE_VIOLATIONS`: `report` or `abort`. Lifecycle violations are
//!   always logged; `abort` additionally panics after logging. Debug builds
//!   default to `abort`, release builds to `report`.
//! - `CBRIDGE_MAX_TEXT_LEN`: upper bound on text passed to foreign string
//!   primitives (default 4096 bytes).
//! - `CBRIDGE_LOG_LEVEL`: minimum structured log level (default `warn`).
//!
//! There is no process-wide cached value. A config belongs to one
//! [`BoundaryContext`](crate::context::BoundaryContext).

use serde::{Deserialize, Serialize};

use crate::log::LogLevel;

/// What to do with a variable-length field that exceeds its foreign capacity.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OverflowPolicy {
    /// Cut the field to capacity and flag it in the marshalling result.
    #[default]
    Truncate,
    /// Fail with `FieldOverflow`.
    Reject,
}

impl OverflowPolicy {
    /// Parse from string (case-insensitive).
    #[must_use]
    pub fn from_str_loose(s: &str) -> Self {
        match s.to_ascii_lowercase().as_str() {
            "truncate" | "clamp" | "default" => Self::Truncate,
            "reject" | "strict" | "error" => Self::Reject,
            _ => Self::Truncate,
        }
    }
}

/// How lifecycle violations surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ViolationMode {
    /// Return the typed error, count it and log it at `error`.
    Report,
    /// Log, then panic.
    Abort,
}

impl Default for ViolationMode {
    /// Fatal in debug builds, reported in release builds.
    fn default() -> Self {
        if cfg!(debug_assertions) {
            Self::Abort
        } else {
            Self::Report
        }
    }
}

impl ViolationMode {
    /// Parse from string (case-insensitive). Unknown values fall back to the
    /// build default.
    #[must_use]
    pub fn from_str_loose(s: &str) -> Self {
        match s.to_ascii_lowercase().as_str() {
            "report" | "error" => Self::Report,
            "abort" | "panic" | "fatal" => Self::Abort,
            _ => Self::default(),
        }
    }

    #[must_use]
    pub const fn is_fatal(self) -> bool {
        matches!(self, Self::Abort)
    }
}

pub const DEFAULT_MAX_TEXT_LEN: usize = 4096;

/// Complete boundary configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BoundaryConfig {
    pub on_overflow: OverflowPolicy,
    pub violations: ViolationMode,
    /// Longest text (in bytes, excluding the NUL) accepted by string primitives.
    pub max_text_len: usize,
    pub log_level: LogLevel,
}

impl Default for BoundaryConfig {
    fn default() -> Self {
        Self {
            on_overflow: OverflowPolicy::default(),
            violations: ViolationMode::default(),
            max_text_len: DEFAULT_MAX_TEXT_LEN,
            log_level: LogLevel::Warn,
        }
    }
}

impl BoundaryConfig {
    /// Read settings from `CBRIDGE_*` environment variables, falling back to
    /// defaults for anything unset or unparsable.
    #[must_use]
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as [`from_env`](Self::from_env) with an injectable lookup.
    #[must_use]
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();
        if let Some(v) = lookup("CBRIDGE_ON_OVERFLOW") {
            config.on_overflow = OverflowPolicy::from_str_loose(&v);
        }
        if let Some(v) = lookup("CBRIDGE_VIOLATIONS") {
            config.violations = ViolationMode::from_str_loose(&v);
        }
        if let Some(len) = lookup("CBRIDGE_MAX_TEXT_LEN").and_then(|v| v.trim().parse().ok()) {
            config.max_text_len = len;
        }
        if let Some(v) = lookup("CBRIDGE_LOG_LEVEL") {
            config.log_level = LogLevel::from_str_loose(&v);
        }
        config
    }

    #[must_use]
    pub fn with_overflow(mut self, policy: OverflowPolicy) -> Self {
        self.on_overflow = policy;
        self
    }

    #[must_use]
    pub fn with_violations(mut self, mode: ViolationMode) -> Self {
        self.violations = mode;
        self
    }

    #[must_use]
    pub fn with_max_text_len(mut self, len: usize) -> Self {
        self.max_text_len = len;
        self
    }

    #[must_use]
    pub fn with_log_level(mut self, level: LogLevel) -> Self {
        self.log_level = level;
        self
    }
}
