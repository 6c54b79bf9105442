//! File-level collaborators of the heap reader
//!
//! - [`superblock`] - global offset/length field widths
//! - [`channel`] - positioned reads and mapped views

pub mod channel;
pub mod superblock;

pub use channel::{FileChannel, MappedFile};
pub use superblock::Superblock;
