//! Digest lookup built from a peer's block checksum list.
//!
//! Answers "does the requester already hold a block with this content" in
//! O(1) average time during diff production.

use rustc_hash::FxHashMap;

use crate::digest::Digest;

/// Mapping from block digest to the first peer block index holding it.
///
/// Built in one O(n) pass over the requester's ordered checksum list.
/// Duplicate digests keep the FIRST index; later occurrences are invisible
/// to lookups. Real files repeat content (zero pages, padding), so the
/// first-wins tie-break is part of the protocol's observable behavior.
/// Immutable once built.
///
/// # Example
///
/// ```rust
/// use blocksync::{ChecksumIndex, Digest};
///
/// let a = Digest::compute(b"a");
/// let b = Digest::compute(b"b");
/// let index = ChecksumIndex::build([a.clone(), b, a.clone()]);
///
/// assert_eq!(index.first_index(&a), Some(0));
/// ```
#[derive(Debug, Clone, Default)]
pub struct ChecksumIndex {
    map: FxHashMap<Digest, u32>,
}

impl ChecksumIndex {
    /// Build an index from an ordered digest sequence.
    #[must_use]
    pub fn build<I>(checksums: I) -> Self
    where
        I: IntoIterator<Item = Digest>,
    {
        let mut map = FxHashMap::default();
        for (i, digest) in checksums.into_iter().enumerate() {
            #[allow(clippy::cast_possible_truncation)]
            map.entry(digest).or_insert(i as u32);
        }
        Self { map }
    }

    /// Look up the first peer block index with the given digest.
    #[must_use]
    pub fn first_index(&self, digest: &Digest) -> Option<u32> {
        self.map.get(digest).copied()
    }

    /// Whether any peer block carries the given digest.
    #[must_use]
    pub fn contains(&self, digest: &Digest) -> bool {
        self.map.contains_key(digest)
    }

    /// Number of distinct digests in the index.
    #[must_use]
    pub fn len(&self) -> usize {
        self.map.len()
    }

    /// Whether the index holds no digests.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }
}
