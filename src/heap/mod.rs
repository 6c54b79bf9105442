//! Fractal heap reader
//!
//! A fractal heap stores variable-length objects (attribute values, link
//! names, ...) in a tree of direct blocks hung off a doubling table of
//! indirect blocks. Opening a heap reads its header and walks the whole
//! tree once, indexing every direct block by its offset in heap address
//! space. Lookups then decode a heap identifier and slice the owning
//! block's mapped bytes.
//!
//! # Module structure
//!
//! - [`header`] - the "FRHP" header
//! - [`table`] - doubling table geometry
//! - [`indirect`] / [`direct`] - block parsers
//! - [`id`] - heap identifier decoding
//! - [`error`] - error types

pub mod direct;
pub mod error;
pub mod header;
pub mod id;
pub mod indirect;
pub mod table;

pub use direct::DirectBlock;
pub use error::{ErrorKind, HeapError, Result};
pub use header::HeapHeader;
pub use id::{HeapId, IdLayout};
pub use indirect::IndirectBlock;
pub use table::{BlockSize, DoublingTable};

use std::collections::BTreeMap;
use std::fmt;

use bytes::Bytes;
use tracing::debug;

use crate::format::{FileChannel, Superblock};

/// Lookup behaviour that is not recorded in the file
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct HeapOptions {
    /// Resolve identifiers with the unassigned mode tag 3 as inline
    /// payloads when they are shorter than [`id::LEGACY_INLINE_LIMIT`].
    pub legacy_inline_ids: bool,
}

pub(crate) fn read_record<C: FileChannel + ?Sized>(
    channel: &C,
    address: u64,
    len: usize,
) -> Result<Vec<u8>> {
    let mut buf = vec![0u8; len];
    channel
        .read_at(address, &mut buf)
        .map_err(|source| HeapError::Io {
            address,
            len,
            source,
        })?;
    Ok(buf)
}

pub(crate) fn map_region<C: FileChannel + ?Sized>(
    channel: &C,
    address: u64,
    len: usize,
) -> Result<Bytes> {
    channel.map(address, len).map_err(|source| HeapError::Io {
        address,
        len,
        source,
    })
}

/// An opened fractal heap
#[derive(Debug, Clone)]
pub struct FractalHeap {
    header: HeapHeader,
    options: HeapOptions,
    /// Keyed by heap offset for floor lookups
    direct_blocks: BTreeMap<u64, DirectBlock>,
}

impl FractalHeap {
    /// Open the heap whose header is at `address`.
    ///
    /// Any failure while reading the header or any block aborts the open and
    /// is wrapped in [`HeapError::Open`] naming this heap.
    pub fn open<C: FileChannel + ?Sized>(
        channel: &C,
        superblock: &Superblock,
        address: u64,
    ) -> Result<Self> {
        Self::open_with(channel, superblock, address, HeapOptions::default())
    }

    pub fn open_with<C: FileChannel + ?Sized>(
        channel: &C,
        superblock: &Superblock,
        address: u64,
        options: HeapOptions,
    ) -> Result<Self> {
        let header =
            HeapHeader::read(channel, superblock, address).map_err(|e| e.in_heap(address))?;
        let direct_blocks = index_direct_blocks(channel, &header, superblock)
            .map_err(|e| e.in_heap(address))?;

        debug!(
            "Read fractal heap at address {}, loaded {} direct blocks",
            address,
            direct_blocks.len()
        );

        Ok(Self {
            header,
            options,
            direct_blocks,
        })
    }

    pub fn address(&self) -> u64 {
        self.header.address
    }

    pub fn header(&self) -> &HeapHeader {
        &self.header
    }

    pub fn options(&self) -> HeapOptions {
        self.options
    }

    pub fn id_length(&self) -> usize {
        usize::from(self.header.id_length)
    }

    pub fn bytes_to_store_offset(&self) -> usize {
        self.header.bytes_to_store_offset
    }

    pub fn bytes_to_store_length(&self) -> usize {
        self.header.bytes_to_store_length
    }

    /// Direct blocks in heap offset order
    pub fn direct_blocks(&self) -> impl Iterator<Item = &DirectBlock> {
        self.direct_blocks.values()
    }

    pub fn direct_block_count(&self) -> usize {
        self.direct_blocks.len()
    }

    /// The block with the greatest offset not above `offset`
    pub fn floor_block(
        &self,
        offset: u64,
    ) -> Option<&DirectBlock> {
        self.direct_blocks
            .range(..=offset)
            .next_back()
            .map(|(_, block)| block)
    }

    /// Return the bytes named by a heap identifier.
    pub fn resolve(
        &self,
        id: &[u8],
    ) -> Result<Bytes> {
        let address = self.address();
        match HeapId::parse(id, &self.header.id_layout(), address)? {
            HeapId::Managed { offset, length } => {
                debug!("Getting ID at offset={} length={}", offset, length);
                self.resolve_managed(offset, length)
            }
            HeapId::Huge => Err(HeapError::UnsupportedFeature {
                address,
                feature: "huge objects",
            }),
            HeapId::Tiny => Err(HeapError::UnsupportedFeature {
                address,
                feature: "tiny objects",
            }),
            HeapId::Reserved { payload } => self.resolve_legacy_inline(id.len(), payload),
        }
    }

    fn resolve_managed(
        &self,
        offset: u64,
        length: u64,
    ) -> Result<Bytes> {
        let address = self.address();
        let block = self
            .floor_block(offset)
            .ok_or_else(|| HeapError::CorruptReference {
                address,
                reason: format!("no direct block covers heap offset {}", offset),
            })?;

        block
            .slice(offset, length)
            .ok_or_else(|| HeapError::CorruptReference {
                address,
                reason: format!(
                    "object at heap offset {} of {} bytes is outside the {} byte block at offset {}",
                    offset,
                    length,
                    block.size(),
                    block.block_offset()
                ),
            })
    }

    fn resolve_legacy_inline(
        &self,
        id_len: usize,
        payload: &[u8],
    ) -> Result<Bytes> {
        if self.options.legacy_inline_ids && id_len < id::LEGACY_INLINE_LIMIT {
            return Ok(Bytes::copy_from_slice(payload));
        }
        Err(HeapError::MalformedIdentifier {
            address: self.address(),
            reason: "addressing mode 3 is not assigned".to_string(),
        })
    }
}

/// Walk the root block and every reachable indirect block, collecting the
/// direct blocks by heap offset.
///
/// Indirect blocks are visited from an explicit work list. A child indirect
/// block always has fewer rows than its parent, so the walk terminates.
fn index_direct_blocks<C: FileChannel + ?Sized>(
    channel: &C,
    header: &HeapHeader,
    superblock: &Superblock,
) -> Result<BTreeMap<u64, DirectBlock>> {
    let mut blocks = BTreeMap::new();
    let Some(root) = header.root() else {
        return Ok(blocks);
    };
    let table = header.table();

    let root_rows = u64::from(header.current_rows_in_root_indirect_block);
    if root_rows == 0 {
        let block =
            DirectBlock::read(channel, header, superblock, root, table.starting_block_size())?;
        blocks.insert(block.block_offset(), block);
        return Ok(blocks);
    }

    let mut pending = vec![(root, root_rows)];
    while let Some((address, rows)) = pending.pop() {
        let indirect = IndirectBlock::read(channel, header, superblock, address, rows)?;
        debug!(
            "Indirect block at {}: offset={} rows={} children={}",
            address,
            indirect.block_offset,
            indirect.rows,
            indirect.children.len()
        );

        for (slot, &child) in indirect.children.iter().enumerate() {
            let slot = slot as u64;
            match table.block_size(slot) {
                BlockSize::Direct(size) => {
                    let block = DirectBlock::read(channel, header, superblock, child, size)?;
                    if let Some(previous) = blocks.get(&block.block_offset()) {
                        return Err(HeapError::Malformed {
                            address: child,
                            reason: format!(
                                "direct block offset {} already used by block at {}",
                                block.block_offset(),
                                previous.address()
                            ),
                        });
                    }
                    blocks.insert(block.block_offset(), block);
                }
                BlockSize::Indirect => {
                    let row = slot / table.width();
                    let child_rows =
                        table.child_rows(row).ok_or_else(|| HeapError::Malformed {
                            address: child,
                            reason: format!("row {} cannot hold an indirect block", row),
                        })?;
                    pending.push((child, child_rows));
                }
            }
        }
    }

    Ok(blocks)
}

impl fmt::Display for FractalHeap {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        write!(
            f,
            "FractalHeap [address={}, idLength={}, tinyObjects={}, hugeObjects={}, managedObjects={}, directBlocks={}]",
            self.header.address,
            self.header.id_length,
            self.header.tiny_object_count,
            self.header.huge_object_count,
            self.header.managed_object_count,
            self.direct_blocks.len()
        )
    }
}

#[cfg(test)]
mod tests;
