//! Patch application with verify-then-promote semantics.
//!
//! All writes land in a scratch file next to the target; the target path is
//! only ever touched by the final atomic rename, and only after the scratch
//! content hash-matches the digest the patch promised. Readers of the
//! target can observe the old content or the new content, never a mix.

use std::fs;
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::block::checksum_list;
use crate::digest::Digest;
use crate::error::{Result, SyncError};
use crate::patch::PatchOp;

/// Options controlling patch application.
#[derive(Debug, Clone, Copy, Default)]
pub struct ApplyOptions {
    /// Validate each literal block against its claimed digest before
    /// writing it. The whole-file check at the end catches corruption
    /// anyway; this fails earlier, at the first bad block.
    pub validate_blocks: bool,
}

/// Byte accounting for one [`ReceivedFile::apply`] call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ApplyReport {
    /// The target already matched the expected digest; nothing was written.
    pub up_to_date: bool,
    /// Number of literal blocks written.
    pub literal_blocks: u64,
    /// Number of blocks copied from the old file.
    pub reused_blocks: u64,
    /// Bytes written from transferred literal data.
    pub bytes_transferred: u64,
    /// Bytes copied from the old file instead of being transferred.
    pub bytes_reused: u64,
}

/// Target-side view of a file reconstructed from a patch.
///
/// The target path is probed once at construction: `old_digest` reflects
/// the content present at that moment, or the empty sentinel if the path
/// does not exist yet. Build a new `ReceivedFile` to observe later
/// changes.
///
/// # Example
///
/// ```rust
/// use blocksync::{ApplyOptions, Digest, PatchOp, ReceivedFile};
///
/// # fn main() -> blocksync::Result<()> {
/// # let dir = tempfile::tempdir()?;
/// let target = dir.path().join("greeting.txt");
/// let received = ReceivedFile::new(&target, 4)?;
///
/// let patch = vec![
///     PatchOp::literal(0, Digest::compute(b"hell"), b"hell".to_vec()),
///     PatchOp::literal(1, Digest::compute(b"o"), b"o".to_vec()),
/// ];
/// let report = received.apply(&patch, &Digest::compute(b"hello"), ApplyOptions::default())?;
///
/// assert_eq!(std::fs::read(&target)?, b"hello");
/// assert_eq!(report.bytes_transferred, 5);
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct ReceivedFile {
    path: PathBuf,
    block_size: u32,
    old: Option<Digest>,
}

impl ReceivedFile {
    /// Probe `path` and capture the digest of any existing content.
    ///
    /// # Errors
    ///
    /// Returns `InvalidBlockSize` if `block_size` is zero, or `Io` if an
    /// existing file cannot be read.
    pub fn new(path: impl Into<PathBuf>, block_size: u32) -> Result<Self> {
        let path = path.into();
        if block_size == 0 {
            return Err(SyncError::InvalidBlockSize(block_size));
        }
        let old = if path.is_file() {
            Some(Digest::compute_file(&path)?)
        } else {
            None
        };
        Ok(Self {
            path,
            block_size,
            old,
        })
    }

    /// Target path being synchronized.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Block size used for offsets and reuse reads.
    #[must_use]
    pub const fn block_size(&self) -> u32 {
        self.block_size
    }

    /// Whether a prior copy existed when this descriptor was built.
    #[must_use]
    pub const fn has_prior_copy(&self) -> bool {
        self.old.is_some()
    }

    /// Digest of the prior copy, or the empty sentinel if the target path
    /// did not exist. Note an existing empty file also carries the
    /// sentinel; [`ReceivedFile::has_prior_copy`] tells the two apart.
    #[must_use]
    pub fn old_digest(&self) -> Digest {
        self.old.clone().unwrap_or_default()
    }

    /// Ordered per-block checksums of the prior copy, for the sync
    /// request. Empty if the target path did not exist.
    ///
    /// # Errors
    ///
    /// Returns `Io` if the existing file cannot be read.
    pub fn checksums(&self) -> Result<Vec<Digest>> {
        if self.old.is_some() {
            checksum_list(&self.path, self.block_size)
        } else {
            Ok(Vec::new())
        }
    }

    /// Apply a patch and promote the result onto the target path.
    ///
    /// When the prior copy already hashes to `expected`, nothing is
    /// written and the report comes back with `up_to_date` set. Otherwise
    /// every operation is written into a scratch file in the target's
    /// directory, the scratch content is verified against `expected`, and
    /// only then is it renamed over the target. On any failure the scratch
    /// file is removed and the target keeps its pre-apply content.
    ///
    /// Concurrent `apply` calls against the same target path are not
    /// synchronized; callers must serialize per-path access themselves.
    ///
    /// # Errors
    ///
    /// Returns `InvalidPatch` if a reuse operation appears without a prior
    /// copy, `SourceBlockMissing` if a reuse operation points at or past
    /// the old file's end, `BlockValidation` if `validate_blocks` is set
    /// and a literal block does not match its claimed digest,
    /// `ChecksumMismatch` if the reconstructed content does not hash to
    /// `expected`, or `Io` for any read/write failure.
    pub fn apply(
        &self,
        ops: &[PatchOp],
        expected: &Digest,
        options: ApplyOptions,
    ) -> Result<ApplyReport> {
        if let Some(old) = &self.old {
            if old == expected {
                debug!(path = %self.path.display(), "target already matches expected digest");
                return Ok(ApplyReport {
                    up_to_date: true,
                    ..ApplyReport::default()
                });
            }
        }

        // Same directory as the target so the final rename stays on one
        // filesystem; unlinked automatically unless persisted.
        let mut scratch = tempfile::Builder::new()
            .prefix(".blocksync-")
            .suffix(".tmp")
            .tempfile_in(scratch_dir(&self.path))?;

        let mut old_src: Option<(fs::File, u64)> = if self.old.is_some() {
            let file = fs::File::open(&self.path)?;
            let len = file.metadata()?.len();
            Some((file, len))
        } else {
            None
        };

        let block_size = u64::from(self.block_size);
        let mut copy_buf = vec![0u8; self.block_size as usize];
        let mut report = ApplyReport::default();

        for op in ops {
            match op {
                PatchOp::Literal {
                    index,
                    digest,
                    data,
                } => {
                    if options.validate_blocks {
                        let actual = Digest::compute(data);
                        if actual != *digest {
                            return Err(SyncError::BlockValidation {
                                index: *index,
                                expected: digest.clone(),
                                actual,
                            });
                        }
                    }
                    let out = scratch.as_file_mut();
                    out.seek(SeekFrom::Start(u64::from(*index) * block_size))?;
                    out.write_all(data)?;
                    report.literal_blocks += 1;
                    report.bytes_transferred += data.len() as u64;
                }
                PatchOp::Reuse { index, existing } => {
                    let Some((old_file, old_size)) = old_src.as_mut() else {
                        return Err(SyncError::InvalidPatch(format!(
                            "reuse of old block {existing} but no old copy exists"
                        )));
                    };
                    let offset = u64::from(*existing) * block_size;
                    if offset >= *old_size {
                        return Err(SyncError::SourceBlockMissing {
                            existing: *existing,
                            offset,
                            old_size: *old_size,
                        });
                    }
                    // A short copy is only possible for the old file's
                    // final block.
                    #[allow(clippy::cast_possible_truncation)]
                    let len = block_size.min(*old_size - offset) as usize;
                    old_file.seek(SeekFrom::Start(offset))?;
                    old_file.read_exact(&mut copy_buf[..len])?;

                    let out = scratch.as_file_mut();
                    out.seek(SeekFrom::Start(u64::from(*index) * block_size))?;
                    out.write_all(&copy_buf[..len])?;
                    report.reused_blocks += 1;
                    report.bytes_reused += len as u64;
                }
            }
        }

        let actual = Digest::compute_file(scratch.path())?;
        if actual != *expected {
            return Err(SyncError::ChecksumMismatch {
                expected: expected.clone(),
                actual,
            });
        }

        scratch.as_file().sync_all()?;
        scratch
            .persist(&self.path)
            .map_err(|e| SyncError::Io(e.error))?;

        debug!(
            path = %self.path.display(),
            bytes_reused = report.bytes_reused,
            bytes_transferred = report.bytes_transferred,
            "patch applied"
        );
        Ok(report)
    }
}

/// Directory the scratch file must live in for the rename to be atomic.
fn scratch_dir(target: &Path) -> &Path {
    match target.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    }
}
