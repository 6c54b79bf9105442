//! Global field widths supplied by the file superblock
//!
//! Parsing the superblock itself happens elsewhere; the heap only needs the
//! two widths it declares and the undefined-address sentinel they imply.

use serde::Serialize;

use crate::heap::error::{HeapError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Superblock {
    size_of_offsets: u8,
    size_of_lengths: u8,
}

impl Superblock {
    /// Both widths must be between 1 and 8 bytes
    pub fn new(
        size_of_offsets: u8,
        size_of_lengths: u8,
    ) -> Result<Self> {
        for (name, width) in [
            ("size of offsets", size_of_offsets),
            ("size of lengths", size_of_lengths),
        ] {
            if !(1..=8).contains(&width) {
                return Err(HeapError::Malformed {
                    address: 0,
                    reason: format!("{} must be 1..=8 bytes, got {}", name, width),
                });
            }
        }
        Ok(Self {
            size_of_offsets,
            size_of_lengths,
        })
    }

    pub fn size_of_offsets(&self) -> usize {
        self.size_of_offsets as usize
    }

    pub fn size_of_lengths(&self) -> usize {
        self.size_of_lengths as usize
    }

    /// All bits set at the offset width
    pub fn undefined_address(&self) -> u64 {
        if self.size_of_offsets >= 8 {
            u64::MAX
        } else {
            (1u64 << (8 * self.size_of_offsets as u32)) - 1
        }
    }

    pub fn is_undefined(
        &self,
        address: u64,
    ) -> bool {
        address == self.undefined_address()
    }
}

impl Default for Superblock {
    fn default() -> Self {
        Self {
            size_of_offsets: 8,
            size_of_lengths: 8,
        }
    }
}
