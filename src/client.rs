//! Patch client: one TCP connection, one `GetPatch` round trip per file.

use std::path::PathBuf;

use tokio::net::{TcpStream, ToSocketAddrs};
use tracing::debug;

use crate::error::{Result, SyncError};
use crate::protocol::{self, FileInfo, Message, Patch};
use crate::received::{ApplyOptions, ApplyReport, ReceivedFile};

/// Client side of the checksum exchange.
#[derive(Debug)]
pub struct Client {
    stream: TcpStream,
}

impl Client {
    /// Connect to a patch server.
    ///
    /// # Errors
    ///
    /// Returns `Io` if the connection cannot be established.
    pub async fn connect(addr: impl ToSocketAddrs) -> Result<Self> {
        let stream = TcpStream::connect(addr).await?;
        debug!(addr = %stream.peer_addr()?, "connected");
        Ok(Self { stream })
    }

    /// Request a patch for one file.
    ///
    /// # Errors
    ///
    /// Returns `Remote` if the server answered with an error message,
    /// `Protocol` on an unexpected reply, or `Io` on transport failure.
    pub async fn get_patch(&mut self, file: FileInfo) -> Result<Patch> {
        protocol::write_message(&mut self.stream, &Message::GetPatch { file }).await?;
        match protocol::read_message(&mut self.stream).await? {
            Message::PatchData { patch } => Ok(patch),
            Message::Error { message } => Err(SyncError::Remote(message)),
            other => Err(SyncError::Protocol(format!(
                "Unexpected reply: {:?}",
                other.msg_type()
            ))),
        }
    }

    /// Converge a local path onto the server's version of `name`.
    ///
    /// Probes the local copy, requests a patch built against its block
    /// checksums, and applies the result with verify-then-promote
    /// semantics. The blocking file work runs off the async runtime.
    ///
    /// # Errors
    ///
    /// Returns any engine error from probing or applying, `Remote` if the
    /// server rejected the request, or `Io`/`Protocol` on transport
    /// failure.
    pub async fn sync(
        &mut self,
        name: &str,
        local_path: impl Into<PathBuf>,
        block_size: u32,
        options: ApplyOptions,
    ) -> Result<ApplyReport> {
        let local_path = local_path.into();

        let (received, file) = {
            let name = name.to_string();
            let path = local_path.clone();
            tokio::task::spawn_blocking(move || -> Result<(ReceivedFile, FileInfo)> {
                let received = ReceivedFile::new(path, block_size)?;
                let file = FileInfo {
                    name,
                    whole_digest: received.old_digest(),
                    block_size,
                    block_checksums: received.checksums()?,
                };
                Ok((received, file))
            })
            .await??
        };

        let patch = self.get_patch(file).await?;
        if patch.name != name {
            return Err(SyncError::Protocol(format!(
                "Patch for wrong file: expected {name:?}, got {:?}",
                patch.name
            )));
        }

        let expected = patch.whole_digest.clone();
        let ops = patch.into_ops()?;
        let report =
            tokio::task::spawn_blocking(move || received.apply(&ops, &expected, options)).await??;

        debug!(
            name,
            path = %local_path.display(),
            up_to_date = report.up_to_date,
            bytes_transferred = report.bytes_transferred,
            bytes_reused = report.bytes_reused,
            "sync complete"
        );
        Ok(report)
    }
}
