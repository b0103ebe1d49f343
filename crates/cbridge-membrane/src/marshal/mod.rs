//! Struct marshaller: native values to and from fixed-layout foreign bytes.
//!
//! `to_foreign` zeroes padding and unused string bytes, so bytes produced by
//! this module round-trip exactly through `from_foreign` and back.
//! `from_foreign` rejects records whose strings are not NUL-terminated inside
//! their field, whose `bool` bytes are not 0/1, or whose numeric fields fall
//! outside a declared domain.

pub mod layout;
pub mod records;

use crate::config::{BoundaryConfig, OverflowPolicy};
use crate::error::{BoundaryError, Result};

pub use layout::{RecordReader, RecordWriter};
pub use records::{DataRecord, PersonRecord, Point, RawDataRecord};

/// A native value with a fixed foreign layout.
pub trait Marshal: Sized {
    /// Foreign type name, used in error messages.
    const NAME: &'static str;
    /// `sizeof` on the foreign side.
    const SIZE: usize;
    /// `alignof` on the foreign side.
    const ALIGN: usize;

    fn write_fields(&self, w: &mut RecordWriter) -> Result<()>;
    fn read_fields(r: &mut RecordReader<'_>) -> Result<Self>;
}

/// Bytes laid out exactly as the foreign side stores a record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ForeignBytes(Vec<u8>);

impl ForeignBytes {
    #[must_use]
    pub fn new(bytes: Vec<u8>) -> Self {
        Self(bytes)
    }

    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    #[must_use]
    pub fn into_vec(self) -> Vec<u8> {
        self.0
    }
}

impl From<Vec<u8>> for ForeignBytes {
    fn from(bytes: Vec<u8>) -> Self {
        Self(bytes)
    }
}

impl AsRef<[u8]> for ForeignBytes {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

/// Output of [`Marshaller::to_foreign`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Marshalled {
    pub bytes: ForeignBytes,
    /// Fields cut to their foreign capacity, in write order.
    pub truncated: Vec<&'static str>,
}

impl Marshalled {
    #[must_use]
    pub fn is_truncated(&self) -> bool {
        !self.truncated.is_empty()
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Marshaller {
    policy: OverflowPolicy,
}

impl Marshaller {
    #[must_use]
    pub const fn new(policy: OverflowPolicy) -> Self {
        Self { policy }
    }

    #[must_use]
    pub const fn from_config(config: &BoundaryConfig) -> Self {
        Self::new(config.on_overflow)
    }

    #[must_use]
    pub const fn policy(&self) -> OverflowPolicy {
        self.policy
    }

    /// Serialize `value` into its foreign layout.
    pub fn to_foreign<T: Marshal>(&self, value: &T) -> Result<Marshalled> {
        let mut writer = RecordWriter::new(T::SIZE, self.policy);
        value.write_fields(&mut writer)?;
        let (bytes, truncated) = writer.finish();
        Ok(Marshalled {
            bytes: ForeignBytes(bytes),
            truncated,
        })
    }

    /// Parse a foreign record. `bytes` must be exactly `T::SIZE` long.
    pub fn from_foreign<T: Marshal>(&self, bytes: &[u8]) -> Result<T> {
        if bytes.len() != T::SIZE {
            return Err(BoundaryError::malformed(
                T::NAME,
                format!("expected {} bytes, got {}", T::SIZE, bytes.len()),
            ));
        }
        T::read_fields(&mut RecordReader::new(bytes))
    }
}
