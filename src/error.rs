//! Error types for blocksync operations.

use thiserror::Error;

use crate::digest::Digest;

/// Errors that can occur during blocksync operations.
#[derive(Error, Debug)]
pub enum SyncError {
    /// I/O error during read/write operations.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Source path missing when a read was required.
    #[error("File not found: {}", path.display())]
    NotFound {
        /// Path that could not be found
        path: std::path::PathBuf,
    },

    /// Invalid block size specified.
    #[error("Invalid block size: {0} (must be greater than zero)")]
    InvalidBlockSize(u32),

    /// Patch violates the protocol contract.
    #[error("Invalid patch: {0}")]
    InvalidPatch(String),

    /// Reuse operation references a block past the end of the old file.
    #[error("Source block {existing} out of range: offset {offset} is past old file size {old_size}")]
    SourceBlockMissing {
        /// Index of the referenced old block
        existing: u32,
        /// Byte offset the reference resolves to
        offset: u64,
        /// Total old file size
        old_size: u64,
    },

    /// Reconstructed content does not hash to the expected digest.
    #[error("Checksum mismatch: expected {expected:?}, got {actual:?}")]
    ChecksumMismatch {
        /// Digest the patch promised
        expected: Digest,
        /// Digest of the reconstructed content
        actual: Digest,
    },

    /// A literal block's data does not match its claimed digest.
    #[error("Block {index} failed validation: expected {expected:?}, got {actual:?}")]
    BlockValidation {
        /// Target index of the offending block
        index: u32,
        /// Digest the block claimed
        expected: Digest,
        /// Digest of the block's actual data
        actual: Digest,
    },

    /// Protocol error during network operations.
    #[error("Protocol error: {0}")]
    Protocol(String),

    /// The server answered a request with an error message.
    #[error("Server error: {0}")]
    Remote(String),
}

impl From<tokio::task::JoinError> for SyncError {
    fn from(e: tokio::task::JoinError) -> Self {
        Self::Io(std::io::Error::new(std::io::ErrorKind::Other, e))
    }
}

/// Result type for blocksync operations.
pub type Result<T> = std::result::Result<T, SyncError>;
