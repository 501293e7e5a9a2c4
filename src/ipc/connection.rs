//! Connection manager.
//!
//! Owns the single transport to the Discord client, drives the retry loop
//! and the handshake, and tracks whether the connection is ready for
//! commands.

use std::io::ErrorKind;

use serde::Serialize;
use serde_json::json;

use crate::config::{ConnectionConfig, PresenceConfig};
use crate::ipc::frame::{Frame, Opcode};
use crate::ipc::transport::{Connector, Transport, UnixConnector};
use crate::ipc::{Command, Handshake, IpcError, Response};

/// Lifecycle of the IPC connection.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ConnectionState {
    #[default]
    Disconnected,
    Connecting,
    Handshaking,
    Connected,
}

/// Counters kept across the lifetime of a [`Connection`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ConnectionStats {
    pub connect_attempts: u64,
    pub handshakes: u64,
    pub resets: u64,
}

/// What to do after a failed connect attempt.
enum AttemptFailure {
    Retry,
    GiveUp,
}

/// Single owner of the IPC transport.
pub struct Connection<C: Connector = UnixConnector> {
    connector: C,
    client_id: String,
    config: ConnectionConfig,
    transport: Option<Transport<C::Stream>>,
    state: ConnectionState,
    stats: ConnectionStats,
}

impl Connection<UnixConnector> {
    /// Creates a connection to the socket named by `config`.
    #[must_use]
    pub fn from_config(config: &PresenceConfig) -> Self {
        Self::new(
            UnixConnector::new(config.socket_path()),
            config.client_id.clone(),
            config.connection.clone(),
        )
    }
}

impl<C: Connector> Connection<C> {
    /// Creates a new disconnected connection that dials through `connector`.
    #[must_use]
    pub fn new(connector: C, client_id: impl Into<String>, config: ConnectionConfig) -> Self {
        Self {
            connector,
            client_id: client_id.into(),
            config,
            transport: None,
            state: ConnectionState::Disconnected,
            stats: ConnectionStats::default(),
        }
    }

    /// Returns the current connection state.
    #[must_use]
    pub fn state(&self) -> ConnectionState {
        self.state
    }

    /// Returns the connection counters.
    #[must_use]
    pub fn stats(&self) -> ConnectionStats {
        self.stats
    }

    /// Returns the connector used to open the socket.
    #[must_use]
    pub fn connector(&self) -> &C {
        &self.connector
    }

    /// Whether the handshake completed and the transport is still alive.
    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.state == ConnectionState::Connected
            && self.transport.as_ref().is_some_and(Transport::is_alive)
    }

    fn transition(&mut self, new_state: ConnectionState) {
        if self.state != new_state {
            tracing::debug!(from = ?self.state, to = ?new_state, "Connection state transition");
            self.state = new_state;
        }
    }

    /// Discards the transport and returns to `Disconnected`.
    fn reset(&mut self) {
        if self.transport.take().is_some() {
            self.stats.resets = self.stats.resets.saturating_add(1);
        }
        self.transition(ConnectionState::Disconnected);
    }

    /// Picks up a transport that died since the last call.
    fn sync_state(&mut self) {
        if self.state == ConnectionState::Connected && !self.is_connected() {
            tracing::info!("Transport lost, marking disconnected");
            self.reset();
        }
    }

    async fn open_transport(&self) -> Result<Transport<C::Stream>, IpcError> {
        let timeout = self.config.connect_timeout();
        match tokio::time::timeout(timeout, self.connector.connect()).await {
            Ok(Ok(stream)) => Ok(Transport::new(stream, self.config.io_timeout())),
            Ok(Err(e)) if e.kind() == ErrorKind::ConnectionReset => Err(IpcError::ConnectionReset),
            Ok(Err(e)) if e.kind() == ErrorKind::InvalidInput => Err(IpcError::Io(e)),
            Ok(Err(e)) => Err(IpcError::SocketUnavailable(e)),
            Err(_) => Err(IpcError::Timeout(
                u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX),
            )),
        }
    }

    fn classify_failure(&self, attempt: u32, error: &IpcError) -> AttemptFailure {
        let endpoint = self.connector.endpoint();
        match error {
            IpcError::ConnectionReset => {
                tracing::warn!(attempt, path = %endpoint, "Connection reset while connecting");
                AttemptFailure::Retry
            }
            IpcError::SocketUnavailable(_) | IpcError::Timeout(_) => {
                tracing::error!(attempt, path = %endpoint, error = %error, "Socket not available");
                AttemptFailure::Retry
            }
            _ => {
                tracing::error!(attempt, path = %endpoint, error = %error, "Some other error occurred");
                AttemptFailure::GiveUp
            }
        }
    }

    /// Connects and performs the handshake, retrying up to `max_attempts`
    /// times with `retry_delay` between failed attempts.
    ///
    /// Never fails: the outcome is reported as the resulting connected
    /// state. A rejected handshake ends the call without further attempts.
    pub async fn connect(&mut self) -> bool {
        self.sync_state();
        let mut attempts = 0;

        while !self.is_connected() && attempts < self.config.max_attempts {
            attempts += 1;
            self.stats.connect_attempts = self.stats.connect_attempts.saturating_add(1);
            self.reset();
            self.transition(ConnectionState::Connecting);
            tracing::debug!(attempt = attempts, "Attempting to connect to socket");

            match self.open_transport().await {
                Ok(transport) => {
                    tracing::info!(path = %self.connector.endpoint(), "Connected to IPC socket");
                    self.transport = Some(transport);
                    if let Err(e) = self.handshake().await {
                        tracing::error!(error = %e, "Handshake failed");
                        self.reset();
                        break;
                    }
                }
                Err(e) => {
                    self.transition(ConnectionState::Disconnected);
                    match self.classify_failure(attempts, &e) {
                        AttemptFailure::GiveUp => break,
                        AttemptFailure::Retry if attempts < self.config.max_attempts => {
                            tokio::time::sleep(self.config.retry_delay()).await;
                        }
                        AttemptFailure::Retry => {}
                    }
                }
            }
        }

        if !self.is_connected() {
            tracing::warn!(attempts, "Could not connect to Discord");
        }
        self.is_connected()
    }

    async fn handshake(&mut self) -> Result<(), IpcError> {
        self.transition(ConnectionState::Handshaking);
        let handshake = Handshake::new(self.client_id.clone());
        let frame = self.exchange(Opcode::Handshake, &handshake).await?;

        let response: Response = serde_json::from_value(frame.payload)?;
        if frame.opcode == Opcode::Frame && response.is_ready() {
            self.stats.handshakes = self.stats.handshakes.saturating_add(1);
            self.transition(ConnectionState::Connected);
            tracing::info!("All set");
            Ok(())
        } else {
            Err(IpcError::HandshakeRejected {
                cmd: response.cmd,
                evt: response.evt,
            })
        }
    }

    /// Sends one frame and reads the reply on the current transport.
    async fn exchange<T>(&mut self, opcode: Opcode, payload: &T) -> Result<Frame, IpcError>
    where
        T: Serialize + ?Sized + Sync,
    {
        let transport = self.transport.as_mut().ok_or(IpcError::Disconnected)?;
        transport.send(opcode, payload).await?;
        if !transport.is_alive() {
            return Err(IpcError::Disconnected);
        }

        let frame = transport.recv().await?;
        if frame.opcode == Opcode::Close {
            let code = frame.payload.get("code").and_then(serde_json::Value::as_i64);
            let message = frame.payload.get("message").and_then(serde_json::Value::as_str);
            return Err(IpcError::PeerClosed {
                code: code.unwrap_or_default(),
                message: message.unwrap_or("no reason given").to_string(),
            });
        }
        Ok(frame)
    }

    /// Checks liveness with a PING and reads the PONG, reconnecting if the
    /// PING fails or the connection was already down.
    pub async fn reconnect(&mut self) -> bool {
        self.sync_state();
        if self.is_connected() {
            match self.ping().await {
                Ok(()) => {
                    tracing::debug!("Already connected");
                    return true;
                }
                Err(e) => {
                    tracing::warn!(error = %e, "Liveness check failed");
                    self.reset();
                }
            }
        }

        tracing::info!("Attempting to reconnect");
        self.connect().await
    }

    async fn ping(&mut self) -> Result<(), IpcError> {
        let frame = self.exchange(Opcode::Ping, &json!({})).await?;
        if frame.opcode == Opcode::Pong {
            Ok(())
        } else {
            Err(IpcError::UnexpectedOpcode {
                expected: Opcode::Pong,
                actual: frame.opcode,
            })
        }
    }

    /// Connects only if not already connected.
    pub async fn ensure_connected(&mut self) -> bool {
        self.sync_state();
        if self.is_connected() {
            return true;
        }
        self.connect().await
    }

    /// Sends a command and waits for its response.
    ///
    /// Any failure other than a peer-side command error discards the
    /// transport.
    ///
    /// # Errors
    ///
    /// Returns [`IpcError::Disconnected`] when not connected, a protocol
    /// error for malformed or mismatched replies, or
    /// [`IpcError::CommandFailed`] when the peer rejects the command.
    pub async fn request(&mut self, command: &Command) -> Result<Response, IpcError> {
        let result = self.try_request(command).await;
        if let Err(e) = &result {
            if !e.keeps_connection() {
                tracing::warn!(cmd = %command.cmd, error = %e, "Request failed, dropping connection");
                self.reset();
            }
        }
        result
    }

    async fn try_request(&mut self, command: &Command) -> Result<Response, IpcError> {
        if !self.is_connected() {
            return Err(IpcError::Disconnected);
        }

        let frame = self.exchange(Opcode::Frame, command).await?;
        if frame.opcode != Opcode::Frame {
            return Err(IpcError::UnexpectedOpcode {
                expected: Opcode::Frame,
                actual: frame.opcode,
            });
        }

        let response: Response = serde_json::from_value(frame.payload)?;
        if let Some(actual) = response.nonce.as_deref() {
            if actual != command.nonce {
                return Err(IpcError::NonceMismatch {
                    expected: command.nonce.clone(),
                    actual: actual.to_string(),
                });
            }
        }
        if response.is_error() {
            let (code, message) = response.error_details();
            return Err(IpcError::CommandFailed { code, message });
        }
        Ok(response)
    }

    /// Sends a best-effort CLOSE frame and tears the socket down.
    ///
    /// The transport is moved out before anything is sent, so the socket is
    /// released on every path, including a failed send.
    pub async fn close(&mut self) {
        let Some(mut transport) = self.transport.take() else {
            tracing::info!("Wasn't connected");
            self.transition(ConnectionState::Disconnected);
            return;
        };

        if self.state == ConnectionState::Connected {
            tracing::info!("Closing connection");
            if let Err(e) = transport.send(Opcode::Close, &json!({})).await {
                tracing::warn!(error = %e, "Failed to send CLOSE frame");
            }
        }
        transport.shutdown().await;
        self.transition(ConnectionState::Disconnected);
        tracing::info!("Closed");
    }
}

impl<C: Connector> std::fmt::Debug for Connection<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Connection")
            .field("endpoint", &self.connector.endpoint())
            .field("state", &self.state)
            .field("stats", &self.stats)
            .finish_non_exhaustive()
    }
}
