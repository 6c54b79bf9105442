//! Fractal heap header ("FRHP")
//!
//! Field widths inside the header come from three places: fixed widths, the
//! superblock's offset/length sizes, and values derived from earlier header
//! fields. All of them are decoded here, once, and carried on `HeapHeader`.

use serde::Serialize;
use tracing::trace;

use crate::format::{FileChannel, Superblock};
use crate::util::codec::{bit, bytes_needed, Cursor};

use super::error::{HeapError, Result};
use super::id::IdLayout;
use super::read_record;
use super::table::DoublingTable;

pub const HEAP_SIGNATURE: &[u8; 4] = b"FRHP";

const HUGE_IDS_WRAPPED_BIT: u32 = 0;
const DIRECT_BLOCK_CHECKSUM_BIT: u32 = 1;

/// Decoded heap header plus the widths derived from it
#[derive(Debug, Clone, Serialize)]
pub struct HeapHeader {
    pub address: u64,
    pub version: u8,
    pub id_length: u16,
    pub io_filters_length: u16,
    pub flags: u8,
    pub max_size_of_managed_objects: u32,
    pub next_huge_object_id: u64,
    pub huge_object_btree_address: u64,
    pub free_space_in_managed_blocks: u64,
    pub free_space_manager_address: u64,
    pub managed_space: u64,
    pub allocated_managed_space: u64,
    pub direct_block_allocation_iterator_offset: u64,
    pub managed_object_count: u64,
    pub huge_object_size: u64,
    pub huge_object_count: u64,
    pub tiny_object_size: u64,
    pub tiny_object_count: u64,
    pub table_width: u16,
    pub starting_block_size: u64,
    pub max_direct_block_size: u64,
    /// log2 of the heap address space
    pub max_heap_size: u16,
    pub starting_rows_in_root_indirect_block: u16,
    pub root_block_address: u64,
    pub current_rows_in_root_indirect_block: u16,
    pub bytes_to_store_offset: usize,
    pub bytes_to_store_length: usize,
    #[serde(skip)]
    table: DoublingTable,
    #[serde(skip)]
    undefined_address: u64,
}

impl HeapHeader {
    /// Size of the fixed part of the header for the given superblock widths
    pub fn encoded_len(superblock: &Superblock) -> usize {
        4 + 1 + 2 + 2 + 1 + 4
            + 12 * superblock.size_of_lengths()
            + 3 * superblock.size_of_offsets()
            + 2
            + 2
            + 2
            + 2
    }

    pub fn read<C: FileChannel + ?Sized>(
        channel: &C,
        superblock: &Superblock,
        address: u64,
    ) -> Result<Self> {
        let buf = read_record(channel, address, Self::encoded_len(superblock))?;
        let mut c = Cursor::new(&buf, address);
        let offsets = superblock.size_of_offsets();
        let lengths = superblock.size_of_lengths();

        c.signature(HEAP_SIGNATURE)?;
        let version = c.u8()?;
        if version != 0 {
            return Err(HeapError::UnsupportedVersion {
                address,
                structure: "fractal heap",
                version,
            });
        }

        let id_length = c.u16()?;
        let io_filters_length = c.u16()?;
        let flags = c.u8()?;
        let max_size_of_managed_objects = c.u32()?;
        let next_huge_object_id = c.uint(lengths)?;
        let huge_object_btree_address = c.uint(offsets)?;
        let free_space_in_managed_blocks = c.uint(lengths)?;
        let free_space_manager_address = c.uint(offsets)?;
        let managed_space = c.uint(lengths)?;
        let allocated_managed_space = c.uint(lengths)?;
        let direct_block_allocation_iterator_offset = c.uint(lengths)?;
        let managed_object_count = c.uint(lengths)?;
        let huge_object_size = c.uint(lengths)?;
        let huge_object_count = c.uint(lengths)?;
        let tiny_object_size = c.uint(lengths)?;
        let tiny_object_count = c.uint(lengths)?;
        let table_width = c.u16()?;
        // block sizes are stored at the lengths width
        let starting_block_size = c.uint(lengths)?;
        let max_direct_block_size = c.uint(lengths)?;
        let max_heap_size = c.u16()?;
        let starting_rows_in_root_indirect_block = c.u16()?;
        let root_block_address = c.uint(offsets)?;
        let current_rows_in_root_indirect_block = c.u16()?;

        if io_filters_length > 0 {
            return Err(HeapError::UnsupportedFeature {
                address,
                feature: "I/O filters",
            });
        }

        let table = DoublingTable::new(
            table_width,
            starting_block_size,
            max_direct_block_size,
            max_heap_size,
        )
        .map_err(|e| HeapError::Malformed {
            address,
            reason: e.0,
        })?;

        let bytes_to_store_offset = usize::from(max_heap_size).div_ceil(8);
        if bytes_to_store_offset == 0 {
            return Err(HeapError::Malformed {
                address,
                reason: "maximum heap size of zero bits".to_string(),
            });
        }
        let bytes_to_store_length =
            bytes_needed(max_direct_block_size.min(u64::from(max_size_of_managed_objects)));

        trace!(
            "heap header at {}: id_length={} table_width={} start={} max_direct={}",
            address,
            id_length,
            table_width,
            starting_block_size,
            max_direct_block_size
        );

        Ok(Self {
            address,
            version,
            id_length,
            io_filters_length,
            flags,
            max_size_of_managed_objects,
            next_huge_object_id,
            huge_object_btree_address,
            free_space_in_managed_blocks,
            free_space_manager_address,
            managed_space,
            allocated_managed_space,
            direct_block_allocation_iterator_offset,
            managed_object_count,
            huge_object_size,
            huge_object_count,
            tiny_object_size,
            tiny_object_count,
            table_width,
            starting_block_size,
            max_direct_block_size,
            max_heap_size,
            starting_rows_in_root_indirect_block,
            root_block_address,
            current_rows_in_root_indirect_block,
            bytes_to_store_offset,
            bytes_to_store_length,
            table,
            undefined_address: superblock.undefined_address(),
        })
    }

    pub fn table(&self) -> &DoublingTable {
        &self.table
    }

    /// Root block address, or `None` for an empty heap
    pub fn root(&self) -> Option<u64> {
        (self.root_block_address != self.undefined_address).then_some(self.root_block_address)
    }

    pub fn huge_ids_wrapped(&self) -> bool {
        bit(self.flags, HUGE_IDS_WRAPPED_BIT)
    }

    pub fn direct_blocks_checksummed(&self) -> bool {
        bit(self.flags, DIRECT_BLOCK_CHECKSUM_BIT)
    }

    pub fn has_io_filters(&self) -> bool {
        self.io_filters_length > 0
    }

    pub fn id_layout(&self) -> IdLayout {
        IdLayout {
            id_length: usize::from(self.id_length),
            bytes_to_store_offset: self.bytes_to_store_offset,
            bytes_to_store_length: self.bytes_to_store_length,
        }
    }
}
