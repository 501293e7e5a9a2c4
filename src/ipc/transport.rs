//! Exact-byte transport over a connected stream.
//!
//! The transport owns at most one stream. Broken-pipe and reset conditions
//! discard the stream instead of surfacing an error on write; callers
//! observe the loss through [`Transport::is_alive`].

use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::time::Duration;

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::UnixStream;

use crate::ipc::frame::{self, Frame, Opcode, HEADER_LEN};
use crate::ipc::IpcError;

/// Produces freshly connected streams to the IPC peer.
#[async_trait::async_trait]
pub trait Connector: Send + Sync {
    type Stream: AsyncRead + AsyncWrite + Unpin + Send;

    /// Opens a new stream.
    async fn connect(&self) -> std::io::Result<Self::Stream>;

    /// Human readable endpoint, used in logs.
    fn endpoint(&self) -> String;
}

/// Connects to a Unix domain socket path.
#[derive(Debug, Clone)]
pub struct UnixConnector {
    path: PathBuf,
}

impl UnixConnector {
    #[must_use]
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    /// Returns the socket path.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait::async_trait]
impl Connector for UnixConnector {
    type Stream = UnixStream;

    async fn connect(&self) -> std::io::Result<UnixStream> {
        UnixStream::connect(&self.path).await
    }

    fn endpoint(&self) -> String {
        self.path.display().to_string()
    }
}

/// Whether an I/O error means the peer is gone.
pub(crate) fn is_disconnect(kind: ErrorKind) -> bool {
    matches!(
        kind,
        ErrorKind::BrokenPipe
            | ErrorKind::ConnectionReset
            | ErrorKind::ConnectionAborted
            | ErrorKind::NotConnected
            | ErrorKind::UnexpectedEof
    )
}

fn timeout_ms(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}

/// Exact-byte reader/writer around a single stream.
#[derive(Debug)]
pub struct Transport<S> {
    stream: Option<S>,
    io_timeout: Duration,
}

impl<S> Transport<S>
where
    S: AsyncRead + AsyncWrite + Unpin + Send,
{
    #[must_use]
    pub fn new(stream: S, io_timeout: Duration) -> Self {
        Self {
            stream: Some(stream),
            io_timeout,
        }
    }

    /// Whether the transport still holds a stream.
    #[must_use]
    pub fn is_alive(&self) -> bool {
        self.stream.is_some()
    }

    /// Drops the stream, closing the socket.
    pub fn discard(&mut self) {
        if self.stream.take().is_some() {
            tracing::debug!("Transport discarded");
        }
    }

    /// Writes all of `bytes`.
    ///
    /// Broken-pipe and reset errors discard the stream and return `Ok`; the
    /// loss shows up as `!is_alive()`. A missing stream is absorbed the
    /// same way.
    ///
    /// # Errors
    ///
    /// Returns [`IpcError::Timeout`] or [`IpcError::Io`] for other failures,
    /// after discarding the stream.
    pub async fn write_exact(&mut self, bytes: &[u8]) -> Result<(), IpcError> {
        let timeout = self.io_timeout;
        let Some(stream) = self.stream.as_mut() else {
            tracing::debug!("Write on discarded transport");
            return Ok(());
        };

        let result = match tokio::time::timeout(timeout, async {
            stream.write_all(bytes).await?;
            stream.flush().await
        })
        .await
        {
            Ok(result) => result.map_err(IpcError::from),
            Err(_) => Err(IpcError::Timeout(timeout_ms(timeout))),
        };

        match result {
            Ok(()) => Ok(()),
            Err(IpcError::Io(e)) if is_disconnect(e.kind()) => {
                tracing::warn!(error = %e, "Pipe is broken");
                self.discard();
                Ok(())
            }
            Err(e) => {
                self.discard();
                Err(e)
            }
        }
    }

    /// Reads exactly `n` bytes, accumulating partial reads.
    ///
    /// # Errors
    ///
    /// Returns [`IpcError::Disconnected`] if the stream is gone or the peer
    /// closed it, [`IpcError::ConnectionReset`] on reset, and
    /// [`IpcError::Timeout`]/[`IpcError::Io`] otherwise. The stream is
    /// discarded on every error.
    pub async fn read_exact(&mut self, n: usize) -> Result<Vec<u8>, IpcError> {
        let timeout = self.io_timeout;
        let Some(stream) = self.stream.as_mut() else {
            return Err(IpcError::Disconnected);
        };

        let result = match tokio::time::timeout(timeout, read_chunks(stream, n)).await {
            Ok(result) => result,
            Err(_) => Err(IpcError::Timeout(timeout_ms(timeout))),
        };

        if result.is_err() {
            self.discard();
        }
        result
    }

    /// Encodes and writes one frame.
    ///
    /// # Errors
    ///
    /// See [`Transport::write_exact`] and [`frame::encode_json`].
    pub async fn send<T>(&mut self, opcode: Opcode, payload: &T) -> Result<(), IpcError>
    where
        T: serde::Serialize + ?Sized + Sync,
    {
        let bytes = frame::encode_json(opcode, payload)?;
        tracing::debug!(%opcode, len = bytes.len() - HEADER_LEN, "Sending frame");
        self.write_exact(&bytes).await
    }

    /// Reads one frame: header, then exactly the announced payload.
    ///
    /// # Errors
    ///
    /// Returns a protocol error for malformed headers or payloads, after
    /// discarding the stream, or any error from [`Transport::read_exact`].
    pub async fn recv(&mut self) -> Result<Frame, IpcError> {
        let header = self.read_exact(HEADER_LEN).await?;
        let (opcode, len) = match frame::parse_header(&header) {
            Ok(parsed) => parsed,
            Err(e) => {
                self.discard();
                return Err(e);
            }
        };

        let payload = self.read_exact(len).await?;
        match Frame::from_parts(opcode, &payload) {
            Ok(frame) => {
                tracing::debug!(%opcode, payload = %frame.payload, "Received frame");
                Ok(frame)
            }
            Err(e) => {
                self.discard();
                Err(e)
            }
        }
    }

    /// Shuts down the write half and drops the stream.
    pub async fn shutdown(&mut self) {
        if let Some(mut stream) = self.stream.take() {
            if let Err(e) = stream.shutdown().await {
                tracing::debug!(error = %e, "Socket shutdown failed");
            }
        }
    }
}

async fn read_chunks<S>(stream: &mut S, n: usize) -> Result<Vec<u8>, IpcError>
where
    S: AsyncRead + Unpin,
{
    let mut buf = vec![0u8; n];
    let mut filled = 0;
    while filled < n {
        match stream.read(&mut buf[filled..]).await {
            Ok(0) => {
                tracing::warn!(expected = n, received = filled, "Peer closed the socket");
                return Err(IpcError::Disconnected);
            }
            Ok(read) => filled += read,
            Err(e) if e.kind() == ErrorKind::Interrupted => {}
            Err(e) if e.kind() == ErrorKind::ConnectionReset => {
                tracing::warn!(error = %e, "Connection reset while reading");
                return Err(IpcError::ConnectionReset);
            }
            Err(e) if is_disconnect(e.kind()) => {
                tracing::warn!(error = %e, "Pipe is broken");
                return Err(IpcError::Disconnected);
            }
            Err(e) => return Err(e.into()),
        }
    }
    Ok(buf)
}
