//! Error types for fractal heap decoding

use std::io;
use thiserror::Error;

/// Which structural guarantee a failure violated
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    SignatureMismatch,
    UnsupportedVersion,
    UnsupportedFeature,
    CorruptReference,
    MalformedIdentifier,
    Malformed,
    Io,
}

#[derive(Error, Debug)]
pub enum HeapError {
    #[error("signature '{expected}' not matched at address {address} (found {found:02x?})")]
    SignatureMismatch {
        address: u64,
        expected: String,
        found: Vec<u8>,
    },

    #[error("unsupported {structure} version {version} at address {address}")]
    UnsupportedVersion {
        address: u64,
        structure: &'static str,
        version: u8,
    },

    #[error("{feature} not supported (heap at address {address})")]
    UnsupportedFeature { address: u64, feature: &'static str },

    #[error("corrupt reference at address {address}: {reason}")]
    CorruptReference { address: u64, reason: String },

    #[error("malformed heap identifier for heap at address {address}: {reason}")]
    MalformedIdentifier { address: u64, reason: String },

    #[error("malformed structure at address {address}: {reason}")]
    Malformed { address: u64, reason: String },

    #[error("I/O error reading {len} bytes at address {address}: {source}")]
    Io {
        address: u64,
        len: usize,
        #[source]
        source: io::Error,
    },

    #[error("error reading fractal heap at address {address}")]
    Open {
        address: u64,
        #[source]
        source: Box<HeapError>,
    },
}

impl HeapError {
    /// The innermost error kind, looking through `Open` wrappers
    pub fn kind(&self) -> ErrorKind {
        match self {
            HeapError::SignatureMismatch { .. } => ErrorKind::SignatureMismatch,
            HeapError::UnsupportedVersion { .. } => ErrorKind::UnsupportedVersion,
            HeapError::UnsupportedFeature { .. } => ErrorKind::UnsupportedFeature,
            HeapError::CorruptReference { .. } => ErrorKind::CorruptReference,
            HeapError::MalformedIdentifier { .. } => ErrorKind::MalformedIdentifier,
            HeapError::Malformed { .. } => ErrorKind::Malformed,
            HeapError::Io { .. } => ErrorKind::Io,
            HeapError::Open { source, .. } => source.kind(),
        }
    }

    /// File address of the structure that failed to decode.
    ///
    /// For `Open` this is the innermost address, which may be a child block
    /// rather than the heap header.
    pub fn address(&self) -> u64 {
        match self {
            HeapError::SignatureMismatch { address, .. }
            | HeapError::UnsupportedVersion { address, .. }
            | HeapError::UnsupportedFeature { address, .. }
            | HeapError::CorruptReference { address, .. }
            | HeapError::MalformedIdentifier { address, .. }
            | HeapError::Malformed { address, .. }
            | HeapError::Io { address, .. } => *address,
            HeapError::Open { source, .. } => source.address(),
        }
    }

    pub(crate) fn in_heap(
        self,
        heap_address: u64,
    ) -> HeapError {
        HeapError::Open {
            address: heap_address,
            source: Box::new(self),
        }
    }
}

pub type Result<T> = std::result::Result<T, HeapError>;
