//! Random-access byte sources
//!
//! A heap borrows its channel for the duration of `FractalHeap::open` only;
//! the data regions it keeps are `Bytes` views that share ownership of the
//! underlying mapping, so the heap outlives nothing the caller owns.

use std::fs::File;
use std::io;
use std::path::{Path, PathBuf};

use bytes::Bytes;
use memmap2::Mmap;

/// Positioned reads and read-only views over a file
pub trait FileChannel {
    /// Fill `buf` with the bytes starting at `address`.
    fn read_at(
        &self,
        address: u64,
        buf: &mut [u8],
    ) -> io::Result<()>;

    /// A read-only view of `len` bytes starting at `address`.
    fn map(
        &self,
        address: u64,
        len: usize,
    ) -> io::Result<Bytes>;
}

fn range_of(
    total: usize,
    address: u64,
    len: usize,
) -> io::Result<std::ops::Range<usize>> {
    let start = usize::try_from(address).ok();
    let end = start.and_then(|s| s.checked_add(len));
    match (start, end) {
        (Some(start), Some(end)) if end <= total => Ok(start..end),
        _ => Err(io::Error::new(
            io::ErrorKind::UnexpectedEof,
            format!(
                "range {}+{} outside of {} byte source",
                address, len, total
            ),
        )),
    }
}

impl FileChannel for Bytes {
    fn read_at(
        &self,
        address: u64,
        buf: &mut [u8],
    ) -> io::Result<()> {
        let range = range_of(self.len(), address, buf.len())?;
        buf.copy_from_slice(&self[range]);
        Ok(())
    }

    fn map(
        &self,
        address: u64,
        len: usize,
    ) -> io::Result<Bytes> {
        let range = range_of(self.len(), address, len)?;
        Ok(self.slice(range))
    }
}

/// A file on disk, memory-mapped read-only once at open
#[derive(Debug, Clone)]
pub struct MappedFile {
    path: PathBuf,
    data: Bytes,
}

impl MappedFile {
    pub fn open(path: impl AsRef<Path>) -> io::Result<Self> {
        let path = path.as_ref();
        let file = File::open(path)?;
        let data = if file.metadata()?.len() == 0 {
            // zero-length files cannot be mapped on every platform
            Bytes::new()
        } else {
            // SAFETY: the mapping is read-only; the caller must not truncate
            // the file while views into it are alive.
            let mmap = unsafe { Mmap::map(&file)? };
            Bytes::from_owner(mmap)
        };
        Ok(Self {
            path: path.to_path_buf(),
            data,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

impl FileChannel for MappedFile {
    fn read_at(
        &self,
        address: u64,
        buf: &mut [u8],
    ) -> io::Result<()> {
        self.data.read_at(address, buf)
    }

    fn map(
        &self,
        address: u64,
        len: usize,
    ) -> io::Result<Bytes> {
        self.data.map(address, len)
    }
}
