//! Frame codec for the Discord IPC wire format.
//!
//! Every message on the socket is one frame:
//!
//! ```text
//! [u32 LE opcode] [u32 LE payload length] [payload: UTF-8 JSON]
//! ```
//!
//! The codec does no compression, checksumming or resynchronization. A
//! malformed header is fatal for the connection it was read from.

use serde::Serialize;

use crate::ipc::IpcError;

/// Size of the frame header in bytes.
pub const HEADER_LEN: usize = 8;

/// Maximum payload size accepted from the peer (16 MiB).
pub const MAX_PAYLOAD_LEN: u32 = 16 * 1024 * 1024;

/// Frame opcodes understood by the IPC peer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u32)]
pub enum Opcode {
    Handshake = 0,
    Frame = 1,
    Close = 2,
    Ping = 3,
    Pong = 4,
}

impl Opcode {
    /// Returns the wire value of this opcode.
    #[must_use]
    pub fn as_u32(self) -> u32 {
        self as u32
    }
}

impl TryFrom<u32> for Opcode {
    type Error = IpcError;

    fn try_from(value: u32) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(Self::Handshake),
            1 => Ok(Self::Frame),
            2 => Ok(Self::Close),
            3 => Ok(Self::Ping),
            4 => Ok(Self::Pong),
            other => Err(IpcError::UnknownOpcode(other)),
        }
    }
}

impl std::fmt::Display for Opcode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Handshake => "HANDSHAKE",
            Self::Frame => "FRAME",
            Self::Close => "CLOSE",
            Self::Ping => "PING",
            Self::Pong => "PONG",
        };
        f.write_str(name)
    }
}

/// A decoded frame: opcode plus the parsed JSON payload.
#[derive(Debug, Clone, PartialEq)]
pub struct Frame {
    pub opcode: Opcode,
    pub payload: serde_json::Value,
}

impl Frame {
    /// Creates a new frame from an opcode and a decoded payload.
    #[must_use]
    pub fn new(opcode: Opcode, payload: serde_json::Value) -> Self {
        Self { opcode, payload }
    }

    /// Parses a frame from its opcode and raw payload bytes.
    ///
    /// # Errors
    ///
    /// Returns [`IpcError::Serialization`] if the payload is not valid JSON.
    pub fn from_parts(opcode: Opcode, payload: &[u8]) -> Result<Self, IpcError> {
        let payload = serde_json::from_slice(payload)?;
        Ok(Self { opcode, payload })
    }
}

/// Packs an opcode and payload length into an 8-byte header.
#[must_use]
pub fn encode_header(opcode: u32, len: u32) -> [u8; HEADER_LEN] {
    let mut header = [0u8; HEADER_LEN];
    header[..4].copy_from_slice(&opcode.to_le_bytes());
    header[4..].copy_from_slice(&len.to_le_bytes());
    header
}

/// Unpacks a header into its raw `(opcode, length)` pair.
///
/// # Errors
///
/// Returns [`IpcError::InvalidHeader`] if `bytes` is not exactly 8 bytes long.
pub fn decode_header(bytes: &[u8]) -> Result<(u32, u32), IpcError> {
    if bytes.len() != HEADER_LEN {
        return Err(IpcError::InvalidHeader(bytes.len()));
    }
    let opcode = u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]);
    let len = u32::from_le_bytes([bytes[4], bytes[5], bytes[6], bytes[7]]);
    Ok((opcode, len))
}

/// Validates a raw header, returning the typed opcode and payload length.
///
/// # Errors
///
/// Returns [`IpcError::UnknownOpcode`] or [`IpcError::FrameTooLarge`].
pub fn parse_header(bytes: &[u8]) -> Result<(Opcode, usize), IpcError> {
    let (opcode, len) = decode_header(bytes)?;
    let opcode = Opcode::try_from(opcode)?;
    if len > MAX_PAYLOAD_LEN {
        return Err(IpcError::FrameTooLarge(len));
    }
    Ok((opcode, len as usize))
}

/// Encodes a header followed by `payload`.
///
/// # Errors
///
/// Returns [`IpcError::FrameTooLarge`] if the payload does not fit in a u32
/// length or exceeds [`MAX_PAYLOAD_LEN`].
pub fn encode(opcode: Opcode, payload: &[u8]) -> Result<Vec<u8>, IpcError> {
    let len = u32::try_from(payload.len()).map_err(|_| IpcError::FrameTooLarge(u32::MAX))?;
    if len > MAX_PAYLOAD_LEN {
        return Err(IpcError::FrameTooLarge(len));
    }
    let mut buf = Vec::with_capacity(HEADER_LEN + payload.len());
    buf.extend_from_slice(&encode_header(opcode.as_u32(), len));
    buf.extend_from_slice(payload);
    Ok(buf)
}

/// Serializes `value` as compact JSON and frames it.
///
/// # Errors
///
/// Returns an error if serialization fails or the payload is too large.
pub fn encode_json<T: Serialize + ?Sized>(opcode: Opcode, value: &T) -> Result<Vec<u8>, IpcError> {
    let payload = serde_json::to_vec(value)?;
    encode(opcode, &payload)
}
