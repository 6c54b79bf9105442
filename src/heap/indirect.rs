//! Indirect blocks ("FHIB"), the inner nodes of the doubling table

use smallvec::SmallVec;

use crate::format::{FileChannel, Superblock};
use crate::util::codec::Cursor;

use super::error::{HeapError, Result};
use super::header::HeapHeader;
use super::read_record;

pub const INDIRECT_BLOCK_SIGNATURE: &[u8; 4] = b"FHIB";

/// Child pointers of one indirect block, in slot order.
///
/// Only used while indexing direct blocks; the heap does not keep these.
#[derive(Debug, Clone)]
pub struct IndirectBlock {
    pub address: u64,
    pub block_offset: u64,
    pub rows: u64,
    /// Stops before the first undefined address
    pub children: SmallVec<[u64; 16]>,
}

impl IndirectBlock {
    fn entry_len(
        header: &HeapHeader,
        superblock: &Superblock,
    ) -> usize {
        let mut size = superblock.size_of_offsets();
        if header.has_io_filters() {
            // filtered size and filter mask
            size += superblock.size_of_lengths() + 4;
        }
        size
    }

    /// Read an indirect block with `rows` rows of `table_width` entries.
    pub fn read<C: FileChannel + ?Sized>(
        channel: &C,
        header: &HeapHeader,
        superblock: &Superblock,
        address: u64,
        rows: u64,
    ) -> Result<Self> {
        let table = header.table();
        if rows > table.max_rows() {
            return Err(HeapError::Malformed {
                address,
                reason: format!(
                    "{} rows exceed the {} rows the heap address space allows",
                    rows,
                    table.max_rows()
                ),
            });
        }

        let entries = (rows * table.width()) as usize;
        let entry_len = Self::entry_len(header, superblock);
        let prefix = 4 + 1 + superblock.size_of_offsets() + header.bytes_to_store_offset;
        let buf = read_record(channel, address, prefix + entries * entry_len)?;
        let mut c = Cursor::new(&buf, address);

        c.signature(INDIRECT_BLOCK_SIGNATURE)?;
        let version = c.u8()?;
        if version != 0 {
            return Err(HeapError::UnsupportedVersion {
                address,
                structure: "indirect block",
                version,
            });
        }

        let heap_address = c.uint(superblock.size_of_offsets())?;
        if heap_address != header.address {
            return Err(HeapError::CorruptReference {
                address,
                reason: format!(
                    "indirect block belongs to heap at {} instead of {}",
                    heap_address, header.address
                ),
            });
        }

        let block_offset = c.uint(header.bytes_to_store_offset)?;

        let mut children = SmallVec::new();
        for _ in 0..entries {
            let child = c.uint(superblock.size_of_offsets())?;
            if superblock.is_undefined(child) {
                break;
            }
            if header.has_io_filters() {
                c.skip(entry_len - superblock.size_of_offsets())?;
            }
            children.push(child);
        }
        // trailing checksum is left unread

        Ok(Self {
            address,
            block_offset,
            rows,
            children,
        })
    }
}
