//! Fake Discord client listening on a Unix socket.

#![allow(dead_code)]

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use deck_presence::config::{ConnectionConfig, PresenceConfig};
use deck_presence::ipc::frame::{encode_json, parse_header, HEADER_LEN};
use deck_presence::ipc::Opcode;
use serde_json::{json, Value};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{UnixListener, UnixStream};
use tokio::task::JoinHandle;

/// How the fake peer treats one accepted connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Behavior {
    /// Answer the handshake with READY and echo commands back.
    Ready,
    /// Answer the handshake with an ERROR event and hang up.
    Reject,
    /// Answer READY, then hang up.
    HangUpAfterHandshake,
}

pub struct FakeDiscord {
    _dir: tempfile::TempDir,
    path: PathBuf,
    frames: Arc<Mutex<Vec<(Opcode, Value)>>>,
    connections: Arc<AtomicUsize>,
    task: JoinHandle<()>,
}

impl FakeDiscord {
    /// Starts a peer that uses `behaviors[n]` for the n-th connection and
    /// the last behavior for any connection after that.
    pub fn start(behaviors: Vec<Behavior>) -> Self {
        let dir = tempfile::tempdir().expect("Failed to create temp dir");
        let path = dir.path().join("discord-ipc-0");
        let listener = UnixListener::bind(&path).expect("Failed to bind fake socket");

        let frames = Arc::new(Mutex::new(Vec::new()));
        let connections = Arc::new(AtomicUsize::new(0));

        let task = {
            let frames = Arc::clone(&frames);
            let connections = Arc::clone(&connections);
            tokio::spawn(async move {
                while let Ok((stream, _)) = listener.accept().await {
                    let index = connections.fetch_add(1, Ordering::SeqCst);
                    let behavior = behaviors
                        .get(index)
                        .or_else(|| behaviors.last())
                        .copied()
                        .unwrap_or(Behavior::Ready);
                    let frames = Arc::clone(&frames);
                    tokio::spawn(serve(stream, behavior, frames));
                }
            })
        };

        Self {
            _dir: dir,
            path,
            frames,
            connections,
            task,
        }
    }

    pub fn ready() -> Self {
        Self::start(vec![Behavior::Ready])
    }

    pub fn socket_path(&self) -> &Path {
        &self.path
    }

    /// Config pointing at this peer, with no delay between retries.
    pub fn config(&self) -> PresenceConfig {
        PresenceConfig {
            client_id: "1055680235682672682".to_string(),
            socket_path: Some(self.path.clone()),
            connection: ConnectionConfig {
                retry_delay_secs: 0,
                ..ConnectionConfig::default()
            },
            ..PresenceConfig::default()
        }
    }

    /// Every frame received so far, across all connections.
    pub fn frames(&self) -> Vec<(Opcode, Value)> {
        self.frames.lock().unwrap().clone()
    }

    /// Received frames with the given opcode.
    pub fn frames_with(&self, opcode: Opcode) -> Vec<Value> {
        self.frames()
            .into_iter()
            .filter(|(op, _)| *op == opcode)
            .map(|(_, payload)| payload)
            .collect()
    }

    pub fn connections(&self) -> usize {
        self.connections.load(Ordering::SeqCst)
    }
}

impl Drop for FakeDiscord {
    fn drop(&mut self) {
        self.task.abort();
    }
}

async fn read_frame(stream: &mut UnixStream) -> Option<(Opcode, Value)> {
    let mut header = [0u8; HEADER_LEN];
    stream.read_exact(&mut header).await.ok()?;
    let (opcode, len) = parse_header(&header).ok()?;
    let mut payload = vec![0u8; len];
    stream.read_exact(&mut payload).await.ok()?;
    Some((opcode, serde_json::from_slice(&payload).ok()?))
}

async fn write_frame(stream: &mut UnixStream, opcode: Opcode, payload: &Value) -> bool {
    let bytes = encode_json(opcode, payload).expect("Failed to encode frame");
    stream.write_all(&bytes).await.is_ok()
}

async fn serve(
    mut stream: UnixStream,
    behavior: Behavior,
    frames: Arc<Mutex<Vec<(Opcode, Value)>>>,
) {
    while let Some((opcode, payload)) = read_frame(&mut stream).await {
        frames.lock().unwrap().push((opcode, payload.clone()));

        match opcode {
            Opcode::Handshake => {
                if behavior == Behavior::Reject {
                    let reply = json!({
                        "cmd": "DISPATCH",
                        "evt": "ERROR",
                        "data": {"code": 4000, "message": "Invalid client ID"}
                    });
                    write_frame(&mut stream, Opcode::Frame, &reply).await;
                    return;
                }
                let ready = json!({
                    "cmd": "DISPATCH",
                    "evt": "READY",
                    "data": {"v": 1, "user": {"id": "1", "username": "deck"}}
                });
                if !write_frame(&mut stream, Opcode::Frame, &ready).await
                    || behavior == Behavior::HangUpAfterHandshake
                {
                    return;
                }
            }
            Opcode::Frame => {
                let reply = json!({
                    "cmd": payload["cmd"],
                    "evt": null,
                    "nonce": payload["nonce"],
                    "data": payload["args"],
                });
                if !write_frame(&mut stream, Opcode::Frame, &reply).await {
                    return;
                }
            }
            Opcode::Ping => {
                if !write_frame(&mut stream, Opcode::Pong, &payload).await {
                    return;
                }
            }
            Opcode::Close | Opcode::Pong => return,
        }
    }
}
