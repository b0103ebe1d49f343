//! End-to-end harness for the cbridge boundary layer.
//!
//! This crate provides:
//! - The wrapper scenario: every gateway workflow against a foreign surface
//! - Leak checking: concurrent acquire/release with a registry audit
//! - Record marshalling: foreign bytes and the decoded round trip
//! - JSON reports, with a SHA-256 digest of the structured log when one is kept

#![forbid(unsafe_code)]

pub mod error;
pub mod leak_check;
pub mod marshal;
pub mod report;
pub mod scenario;

pub use error::{HarnessError, Result};
pub use report::{LeakCheckReport, MarshalReport, ScenarioReport};
