//! Heap identifiers
//!
//! Byte 0 of an identifier packs a 2-bit version (bits 6-7) and a 2-bit
//! addressing mode (bits 4-5). Managed identifiers follow it with an offset
//! and a length whose widths are fixed per heap.

use crate::util::codec::{bits, Cursor};

use super::error::{HeapError, Result};

/// Identifiers at least this long never carry legacy inline payloads
pub const LEGACY_INLINE_LIMIT: usize = 19;

/// Per-heap widths needed to decode an identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IdLayout {
    pub id_length: usize,
    pub bytes_to_store_offset: usize,
    pub bytes_to_store_length: usize,
}

/// A decoded heap identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HeapId<'a> {
    /// Object stored in direct-block address space
    Managed { offset: u64, length: u64 },
    /// Object tracked by the huge-object B-tree
    Huge,
    /// Object embedded in the identifier itself
    Tiny,
    /// Mode tag 3, which the format leaves unassigned; carries the bytes
    /// after the flag byte for the legacy inline path
    Reserved { payload: &'a [u8] },
}

impl<'a> HeapId<'a> {
    /// Decode `raw`, which must be exactly `layout.id_length` bytes.
    ///
    /// `heap_address` is only used to label errors.
    pub fn parse(
        raw: &'a [u8],
        layout: &IdLayout,
        heap_address: u64,
    ) -> Result<Self> {
        if raw.len() != layout.id_length {
            return Err(HeapError::MalformedIdentifier {
                address: heap_address,
                reason: format!(
                    "identifiers are {} bytes but got {} bytes",
                    layout.id_length,
                    raw.len()
                ),
            });
        }

        let mut cursor = Cursor::new(raw, heap_address);
        let flags = cursor.u8().map_err(|_| HeapError::MalformedIdentifier {
            address: heap_address,
            reason: "empty identifier".to_string(),
        })?;

        let version = bits(flags, 6, 2);
        if version != 0 {
            return Err(HeapError::UnsupportedVersion {
                address: heap_address,
                structure: "heap identifier",
                version,
            });
        }

        match bits(flags, 4, 2) {
            0 => {
                let offset = cursor.uint(layout.bytes_to_store_offset);
                let length = cursor.uint(layout.bytes_to_store_length);
                match (offset, length) {
                    (Ok(offset), Ok(length)) => Ok(HeapId::Managed { offset, length }),
                    _ => Err(HeapError::MalformedIdentifier {
                        address: heap_address,
                        reason: format!(
                            "{} byte identifier cannot hold a {} byte offset and {} byte length",
                            raw.len(),
                            layout.bytes_to_store_offset,
                            layout.bytes_to_store_length
                        ),
                    }),
                }
            }
            1 => Ok(HeapId::Huge),
            2 => Ok(HeapId::Tiny),
            _ => Ok(HeapId::Reserved { payload: &raw[1..] }),
        }
    }
}
