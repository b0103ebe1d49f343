//! Typed error taxonomy for the boundary layer.
//!
//! Lifecycle violations (double release, use after release, allocator
//! mismatch) are programming errors. Marshalling errors are recoverable and
//! left to the caller. Foreign status codes are translated to
//! [`ForeignFailure`] before they reach this type.

use std::fmt;

use thiserror::Error;

use crate::registry::TokenId;

/// Which side of the boundary allocated a buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Origin {
    /// Allocated by the Rust global allocator.
    Native,
    /// Allocated by the foreign library's allocator.
    Foreign,
}

impl fmt::Display for Origin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Native => "native",
            Self::Foreign => "foreign",
        })
    }
}

/// Typed reason a foreign call reported failure through its status channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ForeignFailure {
    /// The call processed the input and refused it.
    Rejected,
    /// The input was unusable (empty, malformed).
    InvalidInput,
    /// The foreign side could not obtain memory or another resource.
    ResourceExhausted,
    /// A status the boundary has no mapping for.
    Unrecognized,
}

impl ForeignFailure {
    /// Translate a C-style status code. Zero is success and maps to `None`.
    #[must_use]
    pub const fn from_status(status: i32) -> Option<Self> {
        match status {
            0 => None,
            -1 => Some(Self::InvalidInput),
            -2 => Some(Self::ResourceExhausted),
            s if s > 0 => Some(Self::Rejected),
            _ => Some(Self::Unrecognized),
        }
    }
}

impl fmt::Display for ForeignFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Rejected => "rejected",
            Self::InvalidInput => "invalid input",
            Self::ResourceExhausted => "resource exhausted",
            Self::Unrecognized => "unrecognized failure",
        })
    }
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum BoundaryError {
    #[error("{op}: acquisition failed: {reason}")]
    Acquisition { op: &'static str, reason: String },
    #[error("token {id} released twice")]
    DoubleRelease { id: TokenId },
    #[error("token {id} used after release")]
    UseAfterRelease { id: TokenId },
    #[error("field `{field}` needs {actual} bytes but the foreign capacity is {capacity}")]
    FieldOverflow {
        field: &'static str,
        capacity: usize,
        actual: usize,
    },
    #[error("malformed record field `{field}`: {reason}")]
    MalformedRecord { field: &'static str, reason: String },
    #[error("token {id} has {origin} origin but was released through the {attempted} deallocator")]
    AllocatorMismatch {
        id: TokenId,
        origin: Origin,
        attempted: Origin,
    },
    #[error("foreign surface does not provide the `{capability}` capability")]
    CapabilityMissing { capability: &'static str },
    #[error("{op}: invalid argument: {reason}")]
    InvalidArgument { op: &'static str, reason: String },
    #[error("{op}: foreign call failed: {failure}")]
    Foreign {
        op: &'static str,
        failure: ForeignFailure,
    },
}

impl BoundaryError {
    /// True for errors that indicate misuse of a handle or buffer.
    #[must_use]
    pub const fn is_lifecycle_violation(&self) -> bool {
        matches!(
            self,
            Self::DoubleRelease { .. } | Self::UseAfterRelease { .. } | Self::AllocatorMismatch { .. }
        )
    }

    /// True for errors raised while converting records.
    #[must_use]
    pub const fn is_marshalling(&self) -> bool {
        matches!(self, Self::FieldOverflow { .. } | Self::MalformedRecord { .. })
    }

    pub(crate) fn invalid(op: &'static str, reason: impl Into<String>) -> Self {
        Self::InvalidArgument {
            op,
            reason: reason.into(),
        }
    }

    pub(crate) fn malformed(field: &'static str, reason: impl Into<String>) -> Self {
        Self::MalformedRecord {
            field,
            reason: reason.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, BoundaryError>;
