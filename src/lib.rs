//! Fractal heap reader
//!
//! Read-only decoder for the fractal heap of a hierarchical binary data
//! container: the structure that stores attribute values, link names and
//! other variable-length records too large to live inline in object headers.
//!
//! # Example
//!
//! ```no_run
//! use fractal_heap::{FractalHeap, MappedFile, Superblock};
//!
//! fn main() -> anyhow::Result<()> {
//!     let file = MappedFile::open("data.h5")?;
//!     let heap = FractalHeap::open(&file, &Superblock::default(), 0x2A0)?;
//!     let name = heap.resolve(&[0x00, 0x15, 0x00, 0x05, 0x00])?;
//!     println!("{}", String::from_utf8_lossy(&name));
//!     Ok(())
//! }
//! ```

#![doc(html_root_url = "https://docs.rs/fractal-heap")]
#![warn(rust_2018_idioms)]

pub mod format;
pub mod heap;

// Utility modules
pub mod util;

// Re-exports
pub use format::{FileChannel, MappedFile, Superblock};
pub use heap::{
    BlockSize, DirectBlock, ErrorKind, FractalHeap, HeapError, HeapHeader, HeapId, HeapOptions,
    Result,
};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Binary name
pub const NAME: &str = "frhp";
