//! Harness error type.

use cbridge_membrane::BoundaryError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum HarnessError {
    #[error("io: {0}")]
    Io(#[from] std::io::Error),
    #[error("json: {0}")]
    Json(#[from] serde_json::Error),
    #[error("boundary: {0}")]
    Boundary(#[from] BoundaryError),
    #[error("{live} resources still live after leak check")]
    LeaksRemain { live: usize },
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
}

pub type Result<T> = std::result::Result<T, HarnessError>;
