//! Content digests for block and whole-file checksums.
//!
//! Digests are lowercase hex SHA-256 strings exchanged verbatim between
//! peers, so the hash function and its encoding are part of the wire
//! contract: changing either breaks interoperability with older peers.

use std::fmt;
use std::fs;
use std::io::{BufReader, Read};
use std::path::Path;

use serde::{Deserialize, Serialize};
use sha2::{Digest as _, Sha256};

/// Content fingerprint of a byte buffer.
///
/// Deterministic and unsalted: identical bytes always produce an identical
/// digest, and peers treat equal digests as proof of equal content.
///
/// Whole-file digests of empty files use a distinguished sentinel, the
/// empty string, rather than the SHA-256 of zero bytes. See
/// [`Digest::empty`] and [`Digest::compute_streaming`].
///
/// # Example
///
/// ```rust
/// use blocksync::Digest;
///
/// let hash1 = Digest::compute(b"hello world");
/// let hash2 = Digest::compute(b"hello world");
/// assert_eq!(hash1, hash2);
/// assert_eq!(hash1.as_str().len(), 64);
///
/// let hash3 = Digest::compute(b"different data");
/// assert_ne!(hash1, hash3);
/// ```
#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Digest(String);

impl Digest {
    /// Compute the digest of a byte buffer.
    ///
    /// Used for per-block checksums. Note that hashing zero bytes yields
    /// the well-known SHA-256 of empty input, not the empty-file sentinel.
    ///
    /// # Example
    ///
    /// ```rust
    /// use blocksync::Digest;
    ///
    /// let digest = Digest::compute(b"block data");
    /// assert!(!digest.is_empty());
    /// ```
    #[must_use]
    pub fn compute(data: &[u8]) -> Self {
        Self(hex::encode(Sha256::digest(data)))
    }

    /// Compute a whole-file digest from a reader in streaming fashion.
    ///
    /// Large files are digested in buffered chunks without being loaded
    /// into memory. Content of zero length yields the empty sentinel
    /// rather than the hash of zero bytes; use [`Digest::compute`] when
    /// the literal hash of an empty buffer is required.
    ///
    /// # Errors
    ///
    /// Returns an I/O error if reading fails.
    pub fn compute_streaming<R: Read>(reader: &mut R) -> std::io::Result<Self> {
        let mut hasher = Sha256::new();
        let mut buffer = [0u8; 8192];
        let mut total = 0u64;

        loop {
            let n = reader.read(&mut buffer)?;
            if n == 0 {
                break;
            }
            total += n as u64;
            hasher.update(&buffer[..n]);
        }

        if total == 0 {
            return Ok(Self::empty());
        }
        Ok(Self(hex::encode(hasher.finalize())))
    }

    /// Compute the whole-file digest of the file at `path`.
    ///
    /// Empty files yield the empty sentinel.
    ///
    /// # Errors
    ///
    /// Returns an I/O error if the file cannot be opened or read.
    pub fn compute_file(path: &Path) -> std::io::Result<Self> {
        let mut reader = BufReader::new(fs::File::open(path)?);
        Self::compute_streaming(&mut reader)
    }

    /// The empty-file sentinel.
    ///
    /// Whole-file digests of empty files are the empty string on the wire,
    /// not the SHA-256 of zero bytes. This quirk is wire contract and only
    /// applies to whole-file digests, never to per-block checksums.
    ///
    /// # Example
    ///
    /// ```rust
    /// use blocksync::Digest;
    ///
    /// assert!(Digest::empty().is_empty());
    /// assert_ne!(Digest::empty(), Digest::compute(b""));
    /// ```
    #[must_use]
    pub const fn empty() -> Self {
        Self(String::new())
    }

    /// Whether this digest is the empty-file sentinel.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// The digest as the string exchanged on the wire.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for Digest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0.is_empty() {
            write!(f, "Digest(empty)")
        } else {
            write!(f, "Digest({}...)", &self.0[..16.min(self.0.len())])
        }
    }
}

impl fmt::Display for Digest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl Default for Digest {
    fn default() -> Self {
        Self::empty()
    }
}

impl AsRef<str> for Digest {
    fn as_ref(&self) -> &str {
        &self.0
    }
}
