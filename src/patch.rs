//! Patch operations shared by the diff producer and the patch applier.
//!
//! A patch is an ordered sequence of operations, one per block of the file
//! being reconstructed, plus the whole-file digest the result must hash to.
//! Operations address the target by block index; block `i` always lands at
//! byte offset `i * block_size`, so operations never merge or overlap.

use crate::digest::Digest;

/// Single instruction in a patch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PatchOp {
    /// Fill target block `index` by copying block `existing` from the
    /// receiver's old copy.
    Reuse {
        /// Zero-based target block position.
        index: u32,
        /// Block position in the receiver's old file to copy from.
        existing: u32,
    },
    /// Fill target block `index` with transferred bytes.
    Literal {
        /// Zero-based target block position.
        index: u32,
        /// Digest of `data`, for optional pre-write validation.
        digest: Digest,
        /// The block's bytes; only the final block of a file may be short.
        data: Vec<u8>,
    },
}

impl PatchOp {
    /// Create a reuse operation.
    #[must_use]
    pub const fn reuse(index: u32, existing: u32) -> Self {
        Self::Reuse { index, existing }
    }

    /// Create a literal operation.
    #[must_use]
    pub fn literal(index: u32, digest: Digest, data: Vec<u8>) -> Self {
        Self::Literal {
            index,
            digest,
            data,
        }
    }

    /// Check if this is a reuse operation.
    #[must_use]
    pub const fn is_reuse(&self) -> bool {
        matches!(self, Self::Reuse { .. })
    }

    /// Check if this is a literal operation.
    #[must_use]
    pub const fn is_literal(&self) -> bool {
        matches!(self, Self::Literal { .. })
    }

    /// The target block position this operation fills.
    #[must_use]
    pub const fn index(&self) -> u32 {
        match self {
            Self::Reuse { index, .. } | Self::Literal { index, .. } => *index,
        }
    }

    /// Bytes this operation carries over the wire.
    ///
    /// Reuse operations transfer no block data.
    #[must_use]
    pub fn transfer_len(&self) -> u64 {
        match self {
            Self::Reuse { .. } => 0,
            Self::Literal { data, .. } => data.len() as u64,
        }
    }
}

/// Total literal payload carried by a sequence of operations.
#[must_use]
pub fn transfer_total(ops: &[PatchOp]) -> u64 {
    ops.iter().map(PatchOp::transfer_len).sum()
}
