//! Cursor types that read and write C-layout records field by field.
//!
//! Offsets follow the C rules for `#[repr(C)]` structs: every field is
//! aligned to its own size, nested records to their declared alignment, and
//! the writer leaves padding bytes zeroed. Numbers use the host byte order
//! because both sides of the boundary share one address space.

use std::ops::RangeInclusive;

use crate::config::OverflowPolicy;
use crate::error::{BoundaryError, Result};

use super::Marshal;

fn align_up(pos: usize, align: usize) -> usize {
    debug_assert!(align.is_power_of_two());
    (pos + align - 1) & !(align - 1)
}

/// Largest prefix of `s` that fits in `max` bytes without splitting a char.
fn truncate_at_char_boundary(s: &str, max: usize) -> &str {
    if s.len() <= max {
        return s;
    }
    let mut end = max;
    while !s.is_char_boundary(end) {
        end -= 1;
    }
    &s[..end]
}

pub struct RecordWriter {
    buf: Vec<u8>,
    pos: usize,
    policy: OverflowPolicy,
    truncated: Vec<&'static str>,
}

impl RecordWriter {
    pub(crate) fn new(size: usize, policy: OverflowPolicy) -> Self {
        Self {
            buf: vec![0; size],
            pos: 0,
            policy,
            truncated: Vec::new(),
        }
    }

    fn slot(&mut self, field: &'static str, align: usize, len: usize) -> Result<&mut [u8]> {
        let start = align_up(self.pos, align);
        let end = start + len;
        if end > self.buf.len() {
            return Err(BoundaryError::malformed(
                field,
                format!("field ends at byte {end}, record is {} bytes", self.buf.len()),
            ));
        }
        self.pos = end;
        Ok(&mut self.buf[start..end])
    }

    pub fn put_i32(&mut self, field: &'static str, value: i32) -> Result<()> {
        self.slot(field, 4, 4)?.copy_from_slice(&value.to_ne_bytes());
        Ok(())
    }

    /// Write an `i32` that must lie inside its declared domain.
    pub fn put_i32_in(
        &mut self,
        field: &'static str,
        value: i32,
        domain: RangeInclusive<i32>,
    ) -> Result<()> {
        if !domain.contains(&value) {
            return Err(BoundaryError::malformed(
                field,
                format!("{value} outside {}..={}", domain.start(), domain.end()),
            ));
        }
        self.put_i32(field, value)
    }

    pub fn put_f64(&mut self, field: &'static str, value: f64) -> Result<()> {
        self.slot(field, 8, 8)?.copy_from_slice(&value.to_bits().to_ne_bytes());
        Ok(())
    }

    /// C `bool`: one byte, 0 or 1.
    pub fn put_bool(&mut self, field: &'static str, value: bool) -> Result<()> {
        self.slot(field, 1, 1)?[0] = u8::from(value);
        Ok(())
    }

    /// Write a `char[capacity]` field holding a NUL-terminated string.
    ///
    /// At most `capacity - 1` bytes of text fit. Longer input is truncated at
    /// a char boundary and flagged, or rejected, per the overflow policy.
    pub fn put_str(&mut self, field: &'static str, value: &str, capacity: usize) -> Result<()> {
        if value.as_bytes().contains(&0) {
            return Err(BoundaryError::malformed(field, "interior NUL byte"));
        }
        let max = capacity.saturating_sub(1);
        let text = if value.len() > max {
            match self.policy {
                OverflowPolicy::Reject => {
                    return Err(BoundaryError::FieldOverflow {
                        field,
                        capacity: max,
                        actual: value.len(),
                    });
                }
                OverflowPolicy::Truncate => {
                    self.truncated.push(field);
                    truncate_at_char_boundary(value, max)
                }
            }
        } else {
            value
        };
        let slot = self.slot(field, 1, capacity)?;
        slot[..text.len()].copy_from_slice(text.as_bytes());
        Ok(())
    }

    /// Write a nested record at its declared alignment.
    pub fn put_record<T: Marshal>(&mut self, value: &T) -> Result<()> {
        let start = align_up(self.pos, T::ALIGN);
        if start + T::SIZE > self.buf.len() {
            return Err(BoundaryError::malformed(T::NAME, "nested record overruns parent"));
        }
        self.pos = start;
        value.write_fields(self)?;
        self.pos = start + T::SIZE;
        Ok(())
    }

    pub(crate) fn finish(self) -> (Vec<u8>, Vec<&'static str>) {
        (self.buf, self.truncated)
    }
}

pub struct RecordReader<'a> {
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> RecordReader<'a> {
    pub(crate) fn new(bytes: &'a [u8]) -> Self {
        Self { bytes, pos: 0 }
    }

    fn slot(&mut self, field: &'static str, align: usize, len: usize) -> Result<&'a [u8]> {
        let start = align_up(self.pos, align);
        let end = start + len;
        let Some(slot) = self.bytes.get(start..end) else {
            return Err(BoundaryError::malformed(
                field,
                format!("field ends at byte {end}, record is {} bytes", self.bytes.len()),
            ));
        };
        self.pos = end;
        Ok(slot)
    }

    fn array<const N: usize>(&mut self, field: &'static str, align: usize) -> Result<[u8; N]> {
        let slot = self.slot(field, align, N)?;
        let mut out = [0u8; N];
        out.copy_from_slice(slot);
        Ok(out)
    }

    pub fn get_i32(&mut self, field: &'static str) -> Result<i32> {
        Ok(i32::from_ne_bytes(self.array::<4>(field, 4)?))
    }

    /// Read an `i32` and check it against its declared domain.
    pub fn get_i32_in(&mut self, field: &'static str, domain: RangeInclusive<i32>) -> Result<i32> {
        let value = self.get_i32(field)?;
        if !domain.contains(&value) {
            return Err(BoundaryError::malformed(
                field,
                format!("{value} outside {}..={}", domain.start(), domain.end()),
            ));
        }
        Ok(value)
    }

    pub fn get_f64(&mut self, field: &'static str) -> Result<f64> {
        Ok(f64::from_bits(u64::from_ne_bytes(self.array::<8>(field, 8)?)))
    }

    pub fn get_bool(&mut self, field: &'static str) -> Result<bool> {
        match self.slot(field, 1, 1)?[0] {
            0 => Ok(false),
            1 => Ok(true),
            other => Err(BoundaryError::malformed(
                field,
                format!("bool byte {other:#04x} is neither 0 nor 1"),
            )),
        }
    }

    /// Read a `char[capacity]` field. The text must be NUL-terminated within
    /// the field and valid UTF-8.
    pub fn get_str(&mut self, field: &'static str, capacity: usize) -> Result<String> {
        let slot = self.slot(field, 1, capacity)?;
        let Some(nul) = slot.iter().position(|&b| b == 0) else {
            return Err(BoundaryError::malformed(field, "not NUL-terminated"));
        };
        std::str::from_utf8(&slot[..nul])
            .map(str::to_owned)
            .map_err(|e| BoundaryError::malformed(field, format!("invalid UTF-8: {e}")))
    }

    pub fn get_record<T: Marshal>(&mut self) -> Result<T> {
        let start = align_up(self.pos, T::ALIGN);
        if start + T::SIZE > self.bytes.len() {
            return Err(BoundaryError::malformed(T::NAME, "nested record overruns parent"));
        }
        self.pos = start;
        let value = T::read_fields(self)?;
        self.pos = start + T::SIZE;
        Ok(value)
    }
}
