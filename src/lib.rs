//! Deck Presence - Discord Rich Presence over the local IPC socket.

pub mod bridge;
pub mod config;
pub mod ipc;
pub mod presence;
