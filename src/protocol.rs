//! Wire protocol for the checksum exchange.
//!
//! One round trip per file: the client sends a [`Message::GetPatch`]
//! describing its current copy, the server answers with a
//! [`Message::PatchData`] carrying everything needed to reconstruct the
//! server's version, or a [`Message::Error`]. Messages are bincode
//! payloads behind a fixed 12-byte frame header.

use serde::{Deserialize, Serialize};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::digest::Digest;
use crate::error::{Result, SyncError};
use crate::patch::PatchOp;

/// Protocol magic bytes: "BSYN"
pub const PROTOCOL_MAGIC: [u8; 4] = *b"BSYN";

/// Current protocol version.
pub const PROTOCOL_VERSION: u8 = 1;

/// Maximum payload size (256 MB). A patch for a peer with no prior copy
/// carries the whole file as literal data, so this bounds file size.
pub const MAX_PAYLOAD_SIZE: u32 = 256 * 1024 * 1024;

/// Protocol message types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[repr(u8)]
pub enum MessageType {
    /// Patch request carrying the client's file description.
    GetPatch = 0x01,
    /// Patch response.
    PatchData = 0x02,
    /// Error message.
    Error = 0x03,
}

impl MessageType {
    /// Convert from u8.
    ///
    /// # Errors
    ///
    /// Returns `Protocol` if the value is invalid.
    pub fn from_u8(value: u8) -> Result<Self> {
        match value {
            0x01 => Ok(Self::GetPatch),
            0x02 => Ok(Self::PatchData),
            0x03 => Ok(Self::Error),
            _ => Err(SyncError::Protocol(format!(
                "Invalid message type: {value:#x}"
            ))),
        }
    }
}

/// Protocol frame header.
///
/// ```text
/// ┌─────────┬─────────┬─────────┬─────────┬─────────┐
/// │  MAGIC  │ LENGTH  │  TYPE   │ VERSION │  FLAGS  │
/// │ 4 bytes │ 4 bytes │ 1 byte  │ 1 byte  │ 2 bytes │
/// └─────────┴─────────┴─────────┴─────────┴─────────┘
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameHeader {
    /// Magic bytes: "BSYN".
    pub magic: [u8; 4],
    /// Payload length (little-endian).
    pub length: u32,
    /// Message type.
    pub msg_type: MessageType,
    /// Protocol version.
    pub version: u8,
    /// Reserved flags.
    pub flags: u16,
}

impl FrameHeader {
    /// Header size in bytes.
    pub const SIZE: usize = 12;

    /// Create a new frame header.
    #[must_use]
    pub const fn new(msg_type: MessageType, payload_len: u32) -> Self {
        Self {
            magic: PROTOCOL_MAGIC,
            length: payload_len,
            msg_type,
            version: PROTOCOL_VERSION,
            flags: 0,
        }
    }

    /// Validate the header.
    ///
    /// # Errors
    ///
    /// Returns `Protocol` if validation fails.
    pub fn validate(&self) -> Result<()> {
        if self.magic != PROTOCOL_MAGIC {
            return Err(SyncError::Protocol(format!(
                "Invalid magic: expected {:?}, got {:?}",
                PROTOCOL_MAGIC, self.magic
            )));
        }
        if self.version != PROTOCOL_VERSION {
            return Err(SyncError::Protocol(format!(
                "Unsupported version: expected {PROTOCOL_VERSION}, got {}",
                self.version
            )));
        }
        if self.length > MAX_PAYLOAD_SIZE {
            return Err(SyncError::Protocol(format!(
                "Payload too large: {} > {MAX_PAYLOAD_SIZE}",
                self.length
            )));
        }
        Ok(())
    }

    /// Encode header to bytes.
    #[must_use]
    pub fn encode(&self) -> [u8; Self::SIZE] {
        let mut buf = [0u8; Self::SIZE];
        buf[0..4].copy_from_slice(&self.magic);
        buf[4..8].copy_from_slice(&self.length.to_le_bytes());
        buf[8] = self.msg_type as u8;
        buf[9] = self.version;
        buf[10..12].copy_from_slice(&self.flags.to_le_bytes());
        buf
    }

    /// Decode header from bytes.
    ///
    /// # Errors
    ///
    /// Returns `Protocol` if decoding fails.
    pub fn decode(buf: &[u8; Self::SIZE]) -> Result<Self> {
        let magic: [u8; 4] = buf[0..4]
            .try_into()
            .map_err(|_| SyncError::Protocol("Failed to decode magic".to_string()))?;

        let length = u32::from_le_bytes(
            buf[4..8]
                .try_into()
                .map_err(|_| SyncError::Protocol("Failed to decode length".to_string()))?,
        );

        let msg_type = MessageType::from_u8(buf[8])?;
        let version = buf[9];

        let flags = u16::from_le_bytes(
            buf[10..12]
                .try_into()
                .map_err(|_| SyncError::Protocol("Failed to decode flags".to_string()))?,
        );

        let header = Self {
            magic,
            length,
            msg_type,
            version,
            flags,
        };

        header.validate()?;
        Ok(header)
    }
}

/// Client-side description of the file to synchronize.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileInfo {
    /// File name, relative to the server's root.
    pub name: String,
    /// Whole-file digest of the client's current copy, or the empty
    /// sentinel when the client has no copy.
    pub whole_digest: Digest,
    /// Block size the client split its copy with.
    pub block_size: u32,
    /// Ordered per-block checksums of the client's copy.
    pub block_checksums: Vec<Digest>,
}

/// One block of a patch.
///
/// Exactly one of two shapes is valid: a literal block sets `digest` and
/// `data`, a reuse block sets `existing_index`. [`Block::into_op`]
/// enforces this when converting a received block.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Block {
    /// Position of this block in the new file.
    pub index: u32,
    /// Digest of the literal payload.
    pub digest: Option<Digest>,
    /// Literal payload bytes.
    pub data: Option<Vec<u8>>,
    /// Index of an identical block in the client's old copy.
    pub existing_index: Option<u32>,
}

impl Block {
    /// Build a literal block.
    #[must_use]
    pub fn literal(index: u32, digest: Digest, data: Vec<u8>) -> Self {
        Self {
            index,
            digest: Some(digest),
            data: Some(data),
            existing_index: None,
        }
    }

    /// Build a reuse block.
    #[must_use]
    pub const fn reuse(index: u32, existing_index: u32) -> Self {
        Self {
            index,
            digest: None,
            data: None,
            existing_index: Some(existing_index),
        }
    }

    /// Convert a received block into a patch operation, rejecting
    /// malformed field combinations.
    ///
    /// # Errors
    ///
    /// Returns `InvalidPatch` if the block is neither a well-formed
    /// literal nor a well-formed reuse.
    pub fn into_op(self) -> Result<PatchOp> {
        match (self.digest, self.data, self.existing_index) {
            (Some(digest), Some(data), None) => Ok(PatchOp::literal(self.index, digest, data)),
            (None, None, Some(existing)) => Ok(PatchOp::reuse(self.index, existing)),
            (digest, data, existing) => Err(SyncError::InvalidPatch(format!(
                "block {} has digest={}, data={}, existing_index={}",
                self.index,
                digest.is_some(),
                data.is_some(),
                existing.is_some()
            ))),
        }
    }
}

impl From<PatchOp> for Block {
    fn from(op: PatchOp) -> Self {
        match op {
            PatchOp::Literal {
                index,
                digest,
                data,
            } => Self::literal(index, digest, data),
            PatchOp::Reuse { index, existing } => Self::reuse(index, existing),
        }
    }
}

/// Server's reply: everything needed to rebuild its version of the file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Patch {
    /// File name, echoed from the request.
    pub name: String,
    /// Digest the reconstructed file must hash to.
    pub whole_digest: Digest,
    /// Patch blocks. Empty when the request's digest already matched.
    pub blocks: Vec<Block>,
}

impl Patch {
    /// Build a patch from computed operations.
    #[must_use]
    pub fn from_ops(name: impl Into<String>, whole_digest: Digest, ops: Vec<PatchOp>) -> Self {
        Self {
            name: name.into(),
            whole_digest,
            blocks: ops.into_iter().map(Block::from).collect(),
        }
    }

    /// Convert the received blocks into patch operations.
    ///
    /// # Errors
    ///
    /// Returns `InvalidPatch` if any block is malformed.
    pub fn into_ops(self) -> Result<Vec<PatchOp>> {
        self.blocks.into_iter().map(Block::into_op).collect()
    }
}

/// Protocol messages.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Message {
    /// Request a patch for one file.
    GetPatch {
        /// The client's description of its current copy.
        file: FileInfo,
    },
    /// Patch response.
    PatchData {
        /// The computed patch.
        patch: Patch,
    },
    /// Error response.
    Error {
        /// Human-readable failure description.
        message: String,
    },
}

impl Message {
    /// Get the message type.
    #[must_use]
    pub const fn msg_type(&self) -> MessageType {
        match self {
            Self::GetPatch { .. } => MessageType::GetPatch,
            Self::PatchData { .. } => MessageType::PatchData,
            Self::Error { .. } => MessageType::Error,
        }
    }

    /// Encode message to bytes.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn encode(&self) -> Result<Vec<u8>> {
        bincode::serialize(self)
            .map_err(|e| SyncError::Protocol(format!("Failed to encode message: {e}")))
    }

    /// Decode message from bytes.
    ///
    /// # Errors
    ///
    /// Returns an error if deserialization fails.
    pub fn decode(data: &[u8]) -> Result<Self> {
        bincode::deserialize(data)
            .map_err(|e| SyncError::Protocol(format!("Failed to decode message: {e}")))
    }
}

/// Write a framed message to a writer.
///
/// # Errors
///
/// Returns `Protocol` if the payload exceeds [`MAX_PAYLOAD_SIZE`], or
/// `Io` if writing fails.
pub async fn write_message<W: AsyncWrite + Unpin>(writer: &mut W, message: &Message) -> Result<()> {
    let payload = message.encode()?;
    let payload_len = u32::try_from(payload.len())
        .map_err(|_| SyncError::Protocol("Payload too large for u32".to_string()))?;

    if payload_len > MAX_PAYLOAD_SIZE {
        return Err(SyncError::Protocol(format!(
            "Payload exceeds maximum size: {payload_len} > {MAX_PAYLOAD_SIZE}"
        )));
    }

    let header = FrameHeader::new(message.msg_type(), payload_len);
    writer.write_all(&header.encode()).await?;
    writer.write_all(&payload).await?;
    writer.flush().await?;
    Ok(())
}

/// Read the next framed message, or `None` on a clean end of stream.
///
/// # Errors
///
/// Returns `Protocol` if the frame is malformed, or `Io` if reading
/// fails mid-frame.
pub async fn read_message_or_eof<R: AsyncRead + Unpin>(reader: &mut R) -> Result<Option<Message>> {
    let mut header_buf = [0u8; FrameHeader::SIZE];
    match reader.read_exact(&mut header_buf).await {
        Ok(_) => {}
        Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => return Ok(None),
        Err(e) => return Err(e.into()),
    }

    let header = FrameHeader::decode(&header_buf)?;
    let mut payload = vec![0u8; header.length as usize];
    reader.read_exact(&mut payload).await?;
    Message::decode(&payload).map(Some)
}

/// Read the next framed message, treating end of stream as an error.
///
/// # Errors
///
/// Returns `Protocol` if the stream ends or the frame is malformed, or
/// `Io` if reading fails.
pub async fn read_message<R: AsyncRead + Unpin>(reader: &mut R) -> Result<Message> {
    match read_message_or_eof(reader).await? {
        Some(message) => Ok(message),
        None => Err(SyncError::Protocol(
            "Connection closed before a reply arrived".to_string(),
        )),
    }
}
