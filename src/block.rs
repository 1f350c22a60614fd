//! Lazy block splitting for checksum and diff production.
//!
//! A file is split into consecutive `block_size`-byte chunks at fixed
//! offsets; the final chunk may be shorter and is yielded unpadded. Blocks
//! never overlap and never shift, so a single inserted byte at the front of
//! a file moves every later boundary and defeats matching.

use std::fs;
use std::io::{BufReader, Read};
use std::path::Path;

use crate::digest::Digest;
use crate::error::{Result, SyncError};

/// Read-ahead capacity for the underlying file reader.
const READ_BUFFER_SIZE: usize = 64 * 1024;

/// Shared chunking state for the two iterator flavors.
///
/// Owns one block-sized buffer that is refilled in place on every step, so
/// splitting a file never holds more than one block in memory.
#[derive(Debug)]
struct BlockReader {
    reader: BufReader<fs::File>,
    buf: Vec<u8>,
    done: bool,
}

impl BlockReader {
    fn open(path: &Path, block_size: u32) -> Result<Self> {
        if block_size == 0 {
            return Err(SyncError::InvalidBlockSize(block_size));
        }
        let file = fs::File::open(path)?;
        Ok(Self {
            reader: BufReader::with_capacity(READ_BUFFER_SIZE, file),
            buf: vec![0u8; block_size as usize],
            done: false,
        })
    }

    /// Fill the internal buffer with the next block.
    ///
    /// Returns the filled prefix of the buffer, `None` at end-of-file. A
    /// short fill only happens for the final block; the iterator is fused
    /// afterwards, and also after any read error.
    fn next_block(&mut self) -> Result<Option<&[u8]>> {
        if self.done {
            return Ok(None);
        }

        let mut filled = 0;
        while filled < self.buf.len() {
            match self.reader.read(&mut self.buf[filled..]) {
                Ok(0) => break,
                Ok(n) => filled += n,
                Err(e) if e.kind() == std::io::ErrorKind::Interrupted => {}
                Err(e) => {
                    self.done = true;
                    return Err(e.into());
                }
            }
        }

        if filled == 0 {
            self.done = true;
            return Ok(None);
        }
        if filled < self.buf.len() {
            self.done = true;
        }
        Ok(Some(&self.buf[..filled]))
    }
}

/// Lazy iterator over `(digest, data)` pairs of a file's blocks.
///
/// Reads sequentially; the sequence is finite and not restartable (splitting
/// again requires reopening the file). Zero-length files yield nothing.
///
/// # Example
///
/// ```rust
/// use blocksync::BlockIter;
///
/// # fn main() -> blocksync::Result<()> {
/// # let dir = tempfile::tempdir()?;
/// # let path = dir.path().join("data.bin");
/// # std::fs::write(&path, vec![7u8; 5000])?;
/// let mut total = 0;
/// for block in BlockIter::open(&path, 4096)? {
///     let (digest, data) = block?;
///     assert!(!digest.is_empty());
///     total += data.len();
/// }
/// assert_eq!(total, 5000);
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct BlockIter {
    inner: BlockReader,
}

impl BlockIter {
    /// Open `path` for block-wise reading.
    ///
    /// # Errors
    ///
    /// Returns `InvalidBlockSize` if `block_size` is zero, or an I/O error
    /// if the file cannot be opened.
    pub fn open(path: &Path, block_size: u32) -> Result<Self> {
        Ok(Self {
            inner: BlockReader::open(path, block_size)?,
        })
    }
}

impl Iterator for BlockIter {
    type Item = Result<(Digest, Vec<u8>)>;

    fn next(&mut self) -> Option<Self::Item> {
        match self.inner.next_block() {
            Ok(Some(data)) => Some(Ok((Digest::compute(data), data.to_vec()))),
            Ok(None) => None,
            Err(e) => Some(Err(e)),
        }
    }
}

/// Digest-only flavor of [`BlockIter`] for the requester side.
///
/// Yields each block's digest without cloning out the data, reusing one
/// internal buffer across the whole file.
pub struct DigestIter {
    inner: BlockReader,
}

impl DigestIter {
    /// Open `path` for digest-only block reading.
    ///
    /// # Errors
    ///
    /// Returns `InvalidBlockSize` if `block_size` is zero, or an I/O error
    /// if the file cannot be opened.
    pub fn open(path: &Path, block_size: u32) -> Result<Self> {
        Ok(Self {
            inner: BlockReader::open(path, block_size)?,
        })
    }
}

impl Iterator for DigestIter {
    type Item = Result<Digest>;

    fn next(&mut self) -> Option<Self::Item> {
        match self.inner.next_block() {
            Ok(Some(data)) => Some(Ok(Digest::compute(data))),
            Ok(None) => None,
            Err(e) => Some(Err(e)),
        }
    }
}

/// Collect the ordered per-block checksum list of a file.
///
/// This is what a requester sends alongside its whole-file digest.
///
/// # Errors
///
/// Returns `InvalidBlockSize` if `block_size` is zero, or an I/O error if
/// the file cannot be opened or read.
pub fn checksum_list(path: &Path, block_size: u32) -> Result<Vec<Digest>> {
    DigestIter::open(path, block_size)?.collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write_file(dir: &tempfile::TempDir, name: &str, data: &[u8]) -> std::path::PathBuf {
        let path = dir.path().join(name);
        fs::write(&path, data).unwrap();
        path
    }

    // ==========================================================================
    // BLOCK ITERATOR TESTS
    // ==========================================================================

    #[test]
    fn exact_multiple_produces_k_blocks() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_file(&dir, "k.bin", &vec![1u8; 4096 * 3]);

        let blocks: Vec<_> = BlockIter::open(&path, 4096)
            .unwrap()
            .collect::<Result<_>>()
            .unwrap();

        assert_eq!(blocks.len(), 3);
        for (_, data) in &blocks {
            assert_eq!(data.len(), 4096);
        }
    }

    #[test]
    fn remainder_produces_short_final_block() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_file(&dir, "r.bin", &vec![2u8; 4096 * 2 + 100]);

        let blocks: Vec<_> = BlockIter::open(&path, 4096)
            .unwrap()
            .collect::<Result<_>>()
            .unwrap();

        assert_eq!(blocks.len(), 3);
        assert_eq!(blocks[0].1.len(), 4096);
        assert_eq!(blocks[1].1.len(), 4096);
        assert_eq!(blocks[2].1.len(), 100);
    }

    #[test]
    fn empty_file_yields_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_file(&dir, "empty.bin", b"");

        let mut iter = BlockIter::open(&path, 4096).unwrap();
        assert!(iter.next().is_none());
    }

    #[test]
    fn file_smaller_than_block() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_file(&dir, "small.bin", b"tiny");

        let blocks: Vec<_> = BlockIter::open(&path, 4096)
            .unwrap()
            .collect::<Result<_>>()
            .unwrap();

        assert_eq!(blocks.len(), 1);
        assert_eq!(blocks[0].1, b"tiny");
        assert_eq!(blocks[0].0, Digest::compute(b"tiny"));
    }

    #[test]
    fn digests_match_block_content() {
        let dir = tempfile::tempdir().unwrap();
        let data: Vec<u8> = (0..=255u8).cycle().take(1000).collect();
        let path = write_file(&dir, "content.bin", &data);

        for (i, block) in BlockIter::open(&path, 256).unwrap().enumerate() {
            let (digest, bytes) = block.unwrap();
            assert_eq!(bytes, &data[i * 256..((i + 1) * 256).min(data.len())]);
            assert_eq!(digest, Digest::compute(&bytes));
        }
    }

    #[test]
    fn iterator_is_fused_at_end() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_file(&dir, "fused.bin", b"x");

        let mut iter = BlockIter::open(&path, 4096).unwrap();
        assert!(iter.next().is_some());
        assert!(iter.next().is_none());
        assert!(iter.next().is_none());
    }

    #[test]
    fn open_missing_file_errors() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing.bin");
        assert!(BlockIter::open(&path, 4096).is_err());
    }

    #[test]
    fn open_zero_block_size_errors() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_file(&dir, "zero.bin", b"data");

        match BlockIter::open(&path, 0) {
            Err(SyncError::InvalidBlockSize(0)) => {}
            other => panic!("expected InvalidBlockSize, got {other:?}"),
        }
    }

    // ==========================================================================
    // DIGEST ITERATOR TESTS
    // ==========================================================================

    #[test]
    fn digest_iter_matches_block_iter() {
        let dir = tempfile::tempdir().unwrap();
        let data: Vec<u8> = (0..5000).map(|i| (i % 251) as u8).collect();
        let path = write_file(&dir, "both.bin", &data);

        let with_data: Vec<Digest> = BlockIter::open(&path, 512)
            .unwrap()
            .map(|b| b.map(|(d, _)| d))
            .collect::<Result<_>>()
            .unwrap();
        let digest_only: Vec<Digest> = DigestIter::open(&path, 512)
            .unwrap()
            .collect::<Result<_>>()
            .unwrap();

        assert_eq!(with_data, digest_only);
    }

    #[test]
    fn digest_iter_empty_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_file(&dir, "empty.bin", b"");

        let mut iter = DigestIter::open(&path, 512).unwrap();
        assert!(iter.next().is_none());
    }

    #[test]
    fn checksum_list_collects_in_order() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_file(&dir, "list.bin", &vec![9u8; 1024 + 10]);

        let list = checksum_list(&path, 1024).unwrap();
        assert_eq!(list.len(), 2);
        assert_eq!(list[0], Digest::compute(&vec![9u8; 1024]));
        assert_eq!(list[1], Digest::compute(&vec![9u8; 10]));
    }
}
