//! Doubling table geometry
//!
//! Heap address space is carved into rows of `width` blocks. The first two
//! rows hold blocks of the starting size, then every row doubles the block
//! size. Once a row's block size reaches the maximum direct block size the
//! row's slots point at indirect blocks (sub-heaps) instead of raw storage.

/// Size class of one slot of an indirect block
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum BlockSize {
    /// A direct block of this many bytes
    Direct(u64),
    /// The slot holds an indirect block
    Indirect,
}

impl BlockSize {
    pub fn direct(self) -> Option<u64> {
        match self {
            BlockSize::Direct(size) => Some(size),
            BlockSize::Indirect => None,
        }
    }
}

/// Parameters of the doubling table, copied from the heap header
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DoublingTable {
    width: u64,
    starting_block_size: u64,
    max_direct_block_size: u64,
    max_heap_size: u16,
}

/// Why a set of table parameters cannot describe a heap
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableError(pub String);

impl DoublingTable {
    pub fn new(
        width: u16,
        starting_block_size: u64,
        max_direct_block_size: u64,
        max_heap_size: u16,
    ) -> Result<Self, TableError> {
        if width == 0 || !width.is_power_of_two() {
            return Err(TableError(format!(
                "table width {} is not a non-zero power of two",
                width
            )));
        }
        if !starting_block_size.is_power_of_two() {
            return Err(TableError(format!(
                "starting block size {} is not a non-zero power of two",
                starting_block_size
            )));
        }
        if !max_direct_block_size.is_power_of_two() {
            return Err(TableError(format!(
                "maximum direct block size {} is not a non-zero power of two",
                max_direct_block_size
            )));
        }
        if max_heap_size > 64 {
            return Err(TableError(format!(
                "maximum heap size of 2^{} bytes exceeds a 64-bit address space",
                max_heap_size
            )));
        }
        Ok(Self {
            width: u64::from(width),
            starting_block_size,
            max_direct_block_size,
            max_heap_size,
        })
    }

    pub fn width(&self) -> u64 {
        self.width
    }

    pub fn starting_block_size(&self) -> u64 {
        self.starting_block_size
    }

    pub fn max_direct_block_size(&self) -> u64 {
        self.max_direct_block_size
    }

    /// Nominal size of every block in `row`, or `None` past 2^64.
    pub fn row_block_size(
        &self,
        row: u64,
    ) -> Option<u64> {
        if row < 2 {
            return Some(self.starting_block_size);
        }
        let shift = u32::try_from(row - 1).ok()?;
        let factor = 1u64.checked_shl(shift)?;
        self.starting_block_size.checked_mul(factor)
    }

    /// Size class of the block at linear slot `index` of an indirect block.
    pub fn block_size(
        &self,
        index: u64,
    ) -> BlockSize {
        let row = index / self.width;
        match self.row_block_size(row) {
            Some(size) if row < 2 || size < self.max_direct_block_size => BlockSize::Direct(size),
            _ => BlockSize::Indirect,
        }
    }

    /// Number of rows of an indirect block living in `row` of its parent.
    ///
    /// The child's rows must together span exactly one block of the parent
    /// row, which makes the count `row - log2(width)`.
    pub fn child_rows(
        &self,
        row: u64,
    ) -> Option<u64> {
        let span = self.row_block_size(row)?;
        let first_row_bits =
            self.starting_block_size.trailing_zeros() + self.width.trailing_zeros();
        let rows = i64::from(span.trailing_zeros()) - i64::from(first_row_bits) + 1;
        u64::try_from(rows).ok().filter(|&rows| rows > 0)
    }

    /// Upper bound on the rows any indirect block of this heap may have
    pub fn max_rows(&self) -> u64 {
        let first_row_bits =
            self.starting_block_size.trailing_zeros() + self.width.trailing_zeros();
        (u64::from(self.max_heap_size) + 1).saturating_sub(u64::from(first_row_bits)).max(1)
    }
}
