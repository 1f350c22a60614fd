//! Diff production against a peer's block checksum list.

use std::path::{Path, PathBuf};

use crate::block::BlockIter;
use crate::digest::Digest;
use crate::error::{Result, SyncError};
use crate::index::ChecksumIndex;
use crate::patch::PatchOp;

/// Read-only view of an authoritative file offered to peers.
///
/// The whole-file digest is computed once, eagerly, at construction; build
/// a new `ServedFile` to observe changed content. An empty file carries the
/// empty-digest sentinel.
///
/// # Example
///
/// ```rust
/// use blocksync::ServedFile;
///
/// # fn main() -> blocksync::Result<()> {
/// # let dir = tempfile::tempdir()?;
/// # let path = dir.path().join("data.bin");
/// # std::fs::write(&path, vec![7u8; 10_000])?;
/// let served = ServedFile::open(&path, 4096)?;
///
/// // A peer with no blocks at all receives everything as literals.
/// let ops = served.diff(&[])?;
/// assert!(ops.iter().all(blocksync::PatchOp::is_literal));
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct ServedFile {
    path: PathBuf,
    block_size: u32,
    digest: Digest,
}

impl ServedFile {
    /// Open the file at `path` and digest its current content.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if `path` is not an existing file,
    /// `InvalidBlockSize` if `block_size` is zero, or `Io` if reading
    /// fails.
    pub fn open(path: impl Into<PathBuf>, block_size: u32) -> Result<Self> {
        let path = path.into();
        if block_size == 0 {
            return Err(SyncError::InvalidBlockSize(block_size));
        }
        if !path.is_file() {
            return Err(SyncError::NotFound { path });
        }
        let digest = Digest::compute_file(&path)?;
        Ok(Self {
            path,
            block_size,
            digest,
        })
    }

    /// Path of the served file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Block size used for splitting and diffing.
    #[must_use]
    pub const fn block_size(&self) -> u32 {
        self.block_size
    }

    /// Whole-file digest captured at construction.
    #[must_use]
    pub const fn digest(&self) -> &Digest {
        &self.digest
    }

    /// Split the file's current content into `(digest, data)` blocks.
    ///
    /// # Errors
    ///
    /// Returns `Io` if the file cannot be reopened.
    pub fn blocks(&self) -> Result<BlockIter> {
        BlockIter::open(&self.path, self.block_size)
    }

    /// Produce the patch operations that reconstruct this file for a peer
    /// holding blocks with the given checksums.
    ///
    /// Walks this file's own blocks in order: a block whose digest appears
    /// in `peer_checksums` becomes a [`PatchOp::Reuse`] back-reference to
    /// the first peer position holding it, any other block is emitted as a
    /// [`PatchOp::Literal`] with its data. Equal digests are trusted to
    /// mean equal content; no byte comparison happens here.
    ///
    /// Callers wanting the fast path must compare [`ServedFile::digest`]
    /// with the peer's claimed whole-file digest first and skip the diff
    /// when they match.
    ///
    /// # Errors
    ///
    /// Returns `Io` if any read fails; no partial result is returned.
    pub fn diff(&self, peer_checksums: &[Digest]) -> Result<Vec<PatchOp>> {
        let index = ChecksumIndex::build(peer_checksums.iter().cloned());
        let mut ops = Vec::new();

        for (i, block) in self.blocks()?.enumerate() {
            let (digest, data) = block?;
            #[allow(clippy::cast_possible_truncation)]
            let i = i as u32;
            match index.first_index(&digest) {
                Some(existing) => ops.push(PatchOp::reuse(i, existing)),
                None => ops.push(PatchOp::literal(i, digest, data)),
            }
        }
        Ok(ops)
    }
}
