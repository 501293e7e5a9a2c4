//! Discord IPC client.
//!
//! This module talks to the local Discord client over its Unix domain
//! socket: it frames JSON payloads, performs the handshake and runs
//! synchronous request/response exchanges.
//!
//! # Architecture
//!
//! ```text
//! Presence (session API)
//!     |
//!     v
//! Connection ---- retry loop, handshake, state
//!     |
//!     v
//! Transport ----- exact-byte reads/writes
//!     |
//!     v
//! frame --------- [u32 LE opcode][u32 LE length][JSON]
//! ```
//!
//! # Protocol
//!
//! ```text
//! Client                              Discord
//!   |-- HANDSHAKE {v, client_id} ------->|
//!   |<------ FRAME {DISPATCH, READY} ----|
//!   |-- FRAME {cmd, args, nonce} ------->|
//!   |<------ FRAME {cmd, data, nonce} ---|
//!   |-- PING --------------------------->|
//!   |<------------------------- PONG ----|
//!   |-- CLOSE -------------------------->|
//! ```
//!
//! Exactly one request is in flight at a time.

pub mod connection;
pub mod frame;
pub mod transport;
pub mod types;

pub use connection::{Connection, ConnectionState, ConnectionStats};
pub use frame::{Frame, Opcode};
pub use transport::{Connector, Transport, UnixConnector};
pub use types::{Command, Handshake, IpcError, Response, PROTOCOL_VERSION};
