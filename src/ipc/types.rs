//! IPC message types.
//!
//! This module defines the JSON payloads exchanged with the Discord client
//! and the errors that can occur while doing so.

use serde::{Deserialize, Serialize};

use crate::ipc::Opcode;

/// IPC protocol version sent in the handshake.
pub const PROTOCOL_VERSION: u32 = 1;

/// Payload of the HANDSHAKE frame.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Handshake {
    /// Protocol version, always [`PROTOCOL_VERSION`].
    pub v: u32,
    /// Application client id registered with Discord.
    pub client_id: String,
}

impl Handshake {
    #[must_use]
    pub fn new(client_id: impl Into<String>) -> Self {
        Self {
            v: PROTOCOL_VERSION,
            client_id: client_id.into(),
        }
    }
}

/// A command sent as the payload of a FRAME.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Command {
    /// Command name, e.g. `SET_ACTIVITY`.
    pub cmd: String,
    /// Command arguments.
    pub args: serde_json::Value,
    /// Unique request identifier.
    pub nonce: String,
}

impl Command {
    /// Builds a command with a fresh UUIDv4 nonce.
    #[must_use]
    pub fn new(cmd: impl Into<String>, args: serde_json::Value) -> Self {
        Self {
            cmd: cmd.into(),
            args,
            nonce: uuid::Uuid::new_v4().to_string(),
        }
    }
}

/// A command or event payload received from the peer.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Response {
    pub cmd: Option<String>,
    pub evt: Option<String>,
    pub nonce: Option<String>,
    pub data: Option<serde_json::Value>,
}

impl Response {
    /// Whether this is the `DISPATCH`/`READY` event that completes a handshake.
    #[must_use]
    pub fn is_ready(&self) -> bool {
        self.cmd.as_deref() == Some("DISPATCH") && self.evt.as_deref() == Some("READY")
    }

    /// Whether the peer answered with an `ERROR` event.
    #[must_use]
    pub fn is_error(&self) -> bool {
        self.evt.as_deref() == Some("ERROR")
    }

    /// Error code and message carried by an `ERROR` event, if any.
    #[must_use]
    pub fn error_details(&self) -> (i64, String) {
        let data = self.data.as_ref();
        let code = data
            .and_then(|d| d.get("code"))
            .and_then(serde_json::Value::as_i64)
            .unwrap_or_default();
        let message = data
            .and_then(|d| d.get("message"))
            .and_then(serde_json::Value::as_str)
            .unwrap_or("unknown error")
            .to_string();
        (code, message)
    }
}

/// Errors that can occur during IPC.
#[derive(Debug, thiserror::Error)]
pub enum IpcError {
    /// Unclassified I/O failure on the socket.
    #[error("IPC I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The socket file is missing or nothing is listening on it.
    #[error("Discord IPC socket not available: {0}")]
    SocketUnavailable(#[source] std::io::Error),

    /// The peer reset the connection.
    #[error("Connection reset by peer")]
    ConnectionReset,

    /// The transport has been discarded or the peer closed the stream.
    #[error("Not connected to Discord")]
    Disconnected,

    /// The operation timed out.
    #[error("IPC timeout after {0}ms")]
    Timeout(u64),

    /// A frame header was not exactly 8 bytes.
    #[error("Invalid frame header: expected 8 bytes, got {0}")]
    InvalidHeader(usize),

    /// The header carried an opcode outside the protocol.
    #[error("Unknown opcode {0}")]
    UnknownOpcode(u32),

    /// The header announced a payload above the size limit.
    #[error("Frame payload too large: {0} bytes")]
    FrameTooLarge(u32),

    /// Failed to serialize or deserialize a payload.
    #[error("Failed to (de)serialize payload: {0}")]
    Serialization(#[from] serde_json::Error),

    /// The peer answered the handshake with something other than READY.
    #[error("Handshake rejected (cmd: {cmd:?}, evt: {evt:?})")]
    HandshakeRejected {
        cmd: Option<String>,
        evt: Option<String>,
    },

    /// A reply arrived with an opcode the exchange did not expect.
    #[error("Unexpected opcode: expected {expected}, got {actual}")]
    UnexpectedOpcode { expected: Opcode, actual: Opcode },

    /// The reply nonce does not match the request nonce.
    #[error("Nonce mismatch: expected {expected}, got {actual}")]
    NonceMismatch { expected: String, actual: String },

    /// The peer rejected the command with an ERROR event.
    #[error("Command failed ({code}): {message}")]
    CommandFailed { code: i64, message: String },

    /// The peer sent a CLOSE frame.
    #[error("Connection closed by Discord ({code}): {message}")]
    PeerClosed { code: i64, message: String },
}

impl IpcError {
    /// Whether this is a framing or payload error that leaves the stream
    /// out of sync.
    #[must_use]
    pub fn is_protocol_error(&self) -> bool {
        matches!(
            self,
            Self::InvalidHeader(_)
                | Self::UnknownOpcode(_)
                | Self::FrameTooLarge(_)
                | Self::Serialization(_)
                | Self::UnexpectedOpcode { .. }
                | Self::NonceMismatch { .. }
        )
    }

    /// Whether the connection can stay open after this error.
    #[must_use]
    pub fn keeps_connection(&self) -> bool {
        matches!(self, Self::CommandFailed { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn handshake_serialization() {
        let handshake = Handshake::new("1055680235682672682");
        let serialized = serde_json::to_string(&handshake).unwrap();
        assert_eq!(serialized, r#"{"v":1,"client_id":"1055680235682672682"}"#);
    }

    #[test]
    fn command_gets_unique_nonce() {
        let a = Command::new("SET_ACTIVITY", json!({"pid": 1}));
        let b = Command::new("SET_ACTIVITY", json!({"pid": 1}));
        assert_ne!(a.nonce, b.nonce);
        assert!(uuid::Uuid::parse_str(&a.nonce).is_ok());
    }

    #[test]
    fn command_payload_shape() {
        let command = Command::new("SET_ACTIVITY", json!({"pid": 7}));
        let value = serde_json::to_value(&command).unwrap();
        assert_eq!(value["cmd"], "SET_ACTIVITY");
        assert_eq!(value["args"], json!({"pid": 7}));
        assert_eq!(value["nonce"], command.nonce.as_str());
    }

    #[test]
    fn response_ready_detection() {
        let ready: Response =
            serde_json::from_value(json!({"cmd": "DISPATCH", "evt": "READY", "data": {"v": 1}}))
                .unwrap();
        assert!(ready.is_ready());

        let other: Response =
            serde_json::from_value(json!({"cmd": "DISPATCH", "evt": "ERROR"})).unwrap();
        assert!(!other.is_ready());
        assert!(other.is_error());
    }

    #[test]
    fn response_tolerates_missing_fields() {
        let response: Response = serde_json::from_value(json!({})).unwrap();
        assert_eq!(response, Response::default());
        assert!(!response.is_ready());
    }

    #[test]
    fn response_error_details() {
        let response: Response = serde_json::from_value(json!({
            "cmd": "SET_ACTIVITY",
            "evt": "ERROR",
            "data": {"code": 4000, "message": "child \"activity\" fails"}
        }))
        .unwrap();
        assert_eq!(
            response.error_details(),
            (4000, "child \"activity\" fails".to_string())
        );
    }

    #[test]
    fn ipc_error_display() {
        assert_eq!(IpcError::Disconnected.to_string(), "Not connected to Discord");
        assert_eq!(IpcError::Timeout(5000).to_string(), "IPC timeout after 5000ms");
        assert_eq!(
            IpcError::InvalidHeader(3).to_string(),
            "Invalid frame header: expected 8 bytes, got 3"
        );
    }

    #[test]
    fn ipc_error_classification() {
        assert!(IpcError::UnknownOpcode(7).is_protocol_error());
        assert!(!IpcError::Disconnected.is_protocol_error());
        assert!(!IpcError::ConnectionReset.is_protocol_error());
        assert!(IpcError::CommandFailed {
            code: 4000,
            message: "bad".to_string()
        }
        .keeps_connection());
        assert!(!IpcError::Disconnected.keeps_connection());
    }
}
