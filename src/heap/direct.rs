//! Direct blocks ("FHDB"), the leaves holding managed object bytes

use std::fmt;

use bytes::Bytes;
use tracing::trace;

use crate::format::{FileChannel, Superblock};
use crate::util::codec::Cursor;

use super::error::{HeapError, Result};
use super::header::HeapHeader;
use super::{map_region, read_record};

pub const DIRECT_BLOCK_SIGNATURE: &[u8; 4] = b"FHDB";

/// A direct block and a read-only view over all of its bytes.
///
/// Heap offsets inside a block are counted from the start of the block, so
/// `data()` begins with the block's own header.
#[derive(Clone)]
pub struct DirectBlock {
    address: u64,
    block_offset: u64,
    header_len: usize,
    data: Bytes,
}

impl DirectBlock {
    pub fn header_len(
        header: &HeapHeader,
        superblock: &Superblock,
    ) -> usize {
        let checksum = if header.direct_blocks_checksummed() { 4 } else { 0 };
        4 + 1 + superblock.size_of_offsets() + header.bytes_to_store_offset + checksum
    }

    /// Read the block at `address`, whose slot in its parent gives it `size` bytes.
    pub fn read<C: FileChannel + ?Sized>(
        channel: &C,
        header: &HeapHeader,
        superblock: &Superblock,
        address: u64,
        size: u64,
    ) -> Result<Self> {
        let header_len = Self::header_len(header, superblock);
        let size = usize::try_from(size)
            .ok()
            .filter(|&size| size >= header_len)
            .ok_or_else(|| HeapError::Malformed {
                address,
                reason: format!(
                    "direct block size {} cannot hold its {} byte header",
                    size, header_len
                ),
            })?;

        let buf = read_record(channel, address, header_len)?;
        let mut c = Cursor::new(&buf, address);

        c.signature(DIRECT_BLOCK_SIGNATURE)?;
        let version = c.u8()?;
        if version != 0 {
            return Err(HeapError::UnsupportedVersion {
                address,
                structure: "direct block",
                version,
            });
        }

        let heap_address = c.uint(superblock.size_of_offsets())?;
        if heap_address != header.address {
            return Err(HeapError::CorruptReference {
                address,
                reason: format!(
                    "direct block belongs to heap at {} instead of {}",
                    heap_address, header.address
                ),
            });
        }

        let block_offset = c.uint(header.bytes_to_store_offset)?;
        if header.direct_blocks_checksummed() {
            // checksum is not verified
            c.skip(4)?;
        }

        let data = map_region(channel, address, size)?;
        trace!(
            "direct block at {}: offset={} size={}",
            address,
            block_offset,
            size
        );

        Ok(Self {
            address,
            block_offset,
            header_len,
            data,
        })
    }

    pub fn address(&self) -> u64 {
        self.address
    }

    /// Start of this block in heap address space
    pub fn block_offset(&self) -> u64 {
        self.block_offset
    }

    pub fn size(&self) -> u64 {
        self.data.len() as u64
    }

    /// The whole block, header included
    pub fn data(&self) -> &Bytes {
        &self.data
    }

    /// The object storage after the block header
    pub fn payload(&self) -> Bytes {
        self.data.slice(self.header_len..)
    }

    pub fn contains(
        &self,
        offset: u64,
    ) -> bool {
        offset >= self.block_offset && offset - self.block_offset < self.size()
    }

    /// `length` bytes at heap offset `offset`, if they lie inside this block.
    pub fn slice(
        &self,
        offset: u64,
        length: u64,
    ) -> Option<Bytes> {
        if !self.contains(offset) {
            return None;
        }
        let start = usize::try_from(offset - self.block_offset).ok()?;
        let end = start.checked_add(usize::try_from(length).ok()?)?;
        (end <= self.data.len()).then(|| self.data.slice(start..end))
    }
}

impl fmt::Debug for DirectBlock {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        f.debug_struct("DirectBlock")
            .field("address", &self.address)
            .field("block_offset", &self.block_offset)
            .field("size", &self.data.len())
            .finish()
    }
}
