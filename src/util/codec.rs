//! Primitive little-endian codec helpers
//!
//! Every on-disk record of the heap is a run of unsigned little-endian
//! integers whose widths are only known at runtime (they come from the
//! superblock or from other header fields). `Cursor` walks such a record and
//! reports short buffers as errors instead of panicking.

use crate::heap::error::{HeapError, Result};

/// Decode an unsigned little-endian integer of 1..=8 bytes.
///
/// # Panics
/// Panics if `bytes` is longer than 8 bytes; callers validate widths first.
pub fn read_uint_le(bytes: &[u8]) -> u64 {
    assert!(bytes.len() <= 8, "integer field wider than 8 bytes");
    bytes
        .iter()
        .rev()
        .fold(0u64, |acc, &b| (acc << 8) | u64::from(b))
}

/// Extract `len` bits starting at bit `offset` (LSB = bit 0) of a packed byte.
#[inline]
pub fn bits(
    byte: u8,
    offset: u32,
    len: u32,
) -> u8 {
    debug_assert!(offset + len <= 8);
    let mask = if len >= 8 { 0xFF } else { (1u8 << len) - 1 };
    (byte >> offset) & mask
}

/// Whether bit `index` of `byte` is set.
#[inline]
pub fn bit(
    byte: u8,
    index: u32,
) -> bool {
    bits(byte, index, 1) == 1
}

/// Minimum number of bytes needed to represent `value` (at least one).
pub fn bytes_needed(value: u64) -> usize {
    let significant = (u64::BITS - value.leading_zeros()) as usize;
    significant.div_ceil(8).max(1)
}

/// Forward-only reader over one record buffer read from `address`.
#[derive(Debug)]
pub struct Cursor<'a> {
    buf: &'a [u8],
    pos: usize,
    address: u64,
}

impl<'a> Cursor<'a> {
    pub fn new(
        buf: &'a [u8],
        address: u64,
    ) -> Self {
        Self {
            buf,
            pos: 0,
            address,
        }
    }

    /// Current position within the record
    pub fn position(&self) -> usize {
        self.pos
    }

    pub fn remaining(&self) -> usize {
        self.buf.len() - self.pos
    }

    pub fn take(
        &mut self,
        len: usize,
    ) -> Result<&'a [u8]> {
        if self.remaining() < len {
            return Err(HeapError::Malformed {
                address: self.address,
                reason: format!(
                    "record truncated: needed {} bytes at position {}, {} left",
                    len,
                    self.pos,
                    self.remaining()
                ),
            });
        }
        let slice = &self.buf[self.pos..self.pos + len];
        self.pos += len;
        Ok(slice)
    }

    pub fn skip(
        &mut self,
        len: usize,
    ) -> Result<()> {
        self.take(len).map(|_| ())
    }

    pub fn u8(&mut self) -> Result<u8> {
        Ok(self.take(1)?[0])
    }

    pub fn u16(&mut self) -> Result<u16> {
        Ok(read_uint_le(self.take(2)?) as u16)
    }

    pub fn u32(&mut self) -> Result<u32> {
        Ok(read_uint_le(self.take(4)?) as u32)
    }

    /// Read an unsigned integer whose width is decided at runtime.
    pub fn uint(
        &mut self,
        width: usize,
    ) -> Result<u64> {
        if width == 0 || width > 8 {
            return Err(HeapError::Malformed {
                address: self.address,
                reason: format!("unsupported integer width {}", width),
            });
        }
        Ok(read_uint_le(self.take(width)?))
    }

    /// Consume a 4-byte magic and compare it with `expected`.
    pub fn signature(
        &mut self,
        expected: &[u8; 4],
    ) -> Result<()> {
        let found = self.take(4)?;
        if found != expected {
            return Err(HeapError::SignatureMismatch {
                address: self.address,
                expected: String::from_utf8_lossy(expected).into_owned(),
                found: found.to_vec(),
            });
        }
        Ok(())
    }
}
