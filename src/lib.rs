//! # Blocksync
//!
//! Fixed-block file synchronization over a checksum exchange.
//!
//! A stale copy is converged onto an authoritative one by transferring
//! only the blocks that differ: the receiver sends per-block checksums of
//! its copy, the sender answers with a patch of reuse references and
//! literal blocks, and the receiver rebuilds the file with
//! verify-then-promote semantics.
//!
//! ## Features
//!
//! - **Fixed-offset blocks**: files are split into non-overlapping
//!   `block_size` chunks and matched by content digest; there is no
//!   rolling window, so an insertion that shifts block alignment
//!   transfers everything after it
//! - **SHA-256 checksums**: lowercase hex digests for per-block matching
//!   and whole-file verification; empty files carry an empty-string
//!   digest sentinel
//! - **Atomic replacement**: patches land in a scratch file that is
//!   renamed over the target only after the content hash-matches
//! - **Single round trip**: one `GetPatch` request per file over a framed
//!   TCP protocol
//!
//! ## Example
//!
//! ```rust
//! use blocksync::{checksum_list, ApplyOptions, ReceivedFile, ServedFile};
//!
//! # fn main() -> blocksync::Result<()> {
//! # let dir = tempfile::tempdir()?;
//! # let source = dir.path().join("source.bin");
//! # let target = dir.path().join("target.bin");
//! # std::fs::write(&source, b"the authoritative content")?;
//! # std::fs::write(&target, b"the stale, outdated content")?;
//! // Sender side: diff the authoritative file against the peer's checksums.
//! let served = ServedFile::open(&source, 8)?;
//! let ops = served.diff(&checksum_list(&target, 8)?)?;
//!
//! // Receiver side: apply the patch with verify-then-promote semantics.
//! let received = ReceivedFile::new(&target, 8)?;
//! let report = received.apply(&ops, served.digest(), ApplyOptions::default())?;
//!
//! assert!(!report.up_to_date);
//! assert_eq!(std::fs::read(&target)?, std::fs::read(&source)?);
//! # Ok(())
//! # }
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all, clippy::pedantic)]

mod block;
mod client;
mod digest;
mod error;
mod index;
mod patch;
mod protocol;
mod received;
mod served;
mod server;

pub use block::{checksum_list, BlockIter, DigestIter};
pub use client::Client;
pub use digest::Digest;
pub use error::{Result, SyncError};
pub use index::ChecksumIndex;
pub use patch::{transfer_total, PatchOp};
pub use protocol::{
    read_message, read_message_or_eof, write_message, Block, FileInfo, FrameHeader, Message,
    MessageType, Patch, MAX_PAYLOAD_SIZE, PROTOCOL_MAGIC, PROTOCOL_VERSION,
};
pub use received::{ApplyOptions, ApplyReport, ReceivedFile};
pub use served::ServedFile;
pub use server::{Server, ServerConfig};
