//! Patch server: a TCP accept loop over the checksum exchange.
//!
//! Each connection is served on its own task and handled as a strict
//! request/response sequence. The synchronous diff work runs on the
//! blocking thread pool behind a semaphore sized to `max_workers`, so a
//! flood of connections cannot pile up unbounded file I/O.

use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tokio::net::{TcpListener, TcpStream};
use tokio::sync::Semaphore;
use tracing::{debug, info, warn};

use crate::error::{Result, SyncError};
use crate::protocol::{self, FileInfo, Message, Patch};
use crate::served::ServedFile;

/// Server configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Address to bind the TCP listener on.
    pub bind: SocketAddr,
    /// Directory requested file names are resolved under.
    pub root: PathBuf,
    /// Maximum number of concurrently running diffs.
    pub max_workers: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: SocketAddr::from(([127, 0, 0, 1], 50051)),
            root: PathBuf::from("/tmp"),
            max_workers: 2,
        }
    }
}

/// Patch server over plain TCP.
#[derive(Debug)]
pub struct Server {
    listener: TcpListener,
    root: Arc<PathBuf>,
    workers: Arc<Semaphore>,
}

impl Server {
    /// Bind the listener described by `config`.
    ///
    /// # Errors
    ///
    /// Returns `Io` if the address cannot be bound.
    pub async fn bind(config: ServerConfig) -> Result<Self> {
        let listener = TcpListener::bind(config.bind).await?;
        info!(
            addr = %listener.local_addr()?,
            root = %config.root.display(),
            workers = config.max_workers,
            "server listening"
        );
        Ok(Self {
            listener,
            root: Arc::new(config.root),
            workers: Arc::new(Semaphore::new(config.max_workers.max(1))),
        })
    }

    /// Address the listener is bound to.
    ///
    /// # Errors
    ///
    /// Returns `Io` if the local address cannot be read back.
    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }

    /// Run the accept loop until the task is dropped or aborted.
    ///
    /// Accept failures are logged and do not stop the loop.
    ///
    /// # Errors
    ///
    /// Reserved for fatal listener failures.
    pub async fn run(self) -> Result<()> {
        loop {
            match self.listener.accept().await {
                Ok((stream, peer)) => {
                    let root = Arc::clone(&self.root);
                    let workers = Arc::clone(&self.workers);
                    tokio::spawn(async move {
                        debug!(addr = %peer, "connection established");
                        if let Err(e) = handle_connection(stream, root, workers).await {
                            warn!(addr = %peer, error = %e, "connection failed");
                        } else {
                            debug!(addr = %peer, "connection closed");
                        }
                    });
                }
                Err(e) => {
                    warn!(error = %e, "accept failed");
                }
            }
        }
    }
}

/// Serve one connection: framed requests in, framed replies out.
///
/// Engine failures answer the offending request with a wire `Error` and
/// keep the connection alive; transport failures propagate and drop it.
async fn handle_connection(
    mut stream: TcpStream,
    root: Arc<PathBuf>,
    workers: Arc<Semaphore>,
) -> Result<()> {
    while let Some(message) = protocol::read_message_or_eof(&mut stream).await? {
        let reply = match message {
            Message::GetPatch { file } => match build_patch(&root, &workers, file).await {
                Ok(patch) => Message::PatchData { patch },
                Err(e) => {
                    debug!(error = %e, "patch request failed");
                    Message::Error {
                        message: e.to_string(),
                    }
                }
            },
            other => Message::Error {
                message: format!("Unexpected message: {:?}", other.msg_type()),
            },
        };
        protocol::write_message(&mut stream, &reply).await?;
    }
    Ok(())
}

/// Compute the patch for one request on the blocking pool.
async fn build_patch(root: &Path, workers: &Semaphore, file: FileInfo) -> Result<Patch> {
    let name = sanitize_name(&file.name)?;
    let path = root.join(name);

    let _permit = workers
        .acquire()
        .await
        .map_err(|_| SyncError::Protocol("Worker pool closed".to_string()))?;
    debug!(
        name = %file.name,
        peer_blocks = file.block_checksums.len(),
        "servicing patch request"
    );

    tokio::task::spawn_blocking(move || {
        let served = ServedFile::open(path, file.block_size)?;
        if *served.digest() == file.whole_digest {
            debug!(name = %file.name, "peer copy already matches");
            return Ok(Patch::from_ops(file.name, served.digest().clone(), Vec::new()));
        }
        let ops = served.diff(&file.block_checksums)?;
        Ok(Patch::from_ops(file.name, served.digest().clone(), ops))
    })
    .await?
}

/// Reject names that could escape the served root.
fn sanitize_name(name: &str) -> Result<&str> {
    if name.is_empty()
        || name == "."
        || name == ".."
        || name.contains('/')
        || name.contains('\\')
        || name.contains('\0')
    {
        return Err(SyncError::Protocol(format!("Invalid file name: {name:?}")));
    }
    Ok(name)
}
