//! Configuration types.

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Discord bundle id the Flatpak client exposes its runtime dir under.
pub const DISCORD_BUNDLE_ID: &str = "com.discordapp.Discord";

/// File name of the first Discord IPC socket.
pub const IPC_SOCKET_NAME: &str = "discord-ipc-0";

/// Runtime dir used when `XDG_RUNTIME_DIR` is not set.
pub const FALLBACK_RUNTIME_DIR: &str = "/run/user/1000";

/// Connection retry and timeout settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ConnectionConfig {
    /// Connection attempts per `connect()` call.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    /// Wait between failed attempts, in seconds.
    #[serde(default = "default_five_secs")]
    pub retry_delay_secs: u64,
    /// Timeout for a single connect attempt, in seconds.
    #[serde(default = "default_five_secs")]
    pub connect_timeout_secs: u64,
    /// Timeout for a single socket read or write, in seconds.
    #[serde(default = "default_five_secs")]
    pub io_timeout_secs: u64,
}

fn default_max_attempts() -> u32 {
    5
}

fn default_five_secs() -> u64 {
    5
}

impl ConnectionConfig {
    #[must_use]
    pub fn retry_delay(&self) -> Duration {
        Duration::from_secs(self.retry_delay_secs)
    }

    #[must_use]
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }

    #[must_use]
    pub fn io_timeout(&self) -> Duration {
        Duration::from_secs(self.io_timeout_secs)
    }
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            retry_delay_secs: default_five_secs(),
            connect_timeout_secs: default_five_secs(),
            io_timeout_secs: default_five_secs(),
        }
    }
}

/// Text and artwork used for the activity payload.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ActivityConfig {
    /// Second line of the status.
    #[serde(default = "default_state")]
    pub state: String,
    /// Small image asset key.
    #[serde(default = "default_small_image")]
    pub small_image: String,
    /// Large image URL; `{app_id}` is replaced with the Steam app id.
    #[serde(default = "default_large_image_url")]
    pub large_image_url: String,
}

fn default_state() -> String {
    "on Steam Deck".to_string()
}

fn default_small_image() -> String {
    "steamdeck-logo".to_string()
}

fn default_large_image_url() -> String {
    "https://cdn.akamai.steamstatic.com/steam/apps/{app_id}/hero_capsule.jpg".to_string()
}

impl ActivityConfig {
    /// Large image URL for `app_id`.
    #[must_use]
    pub fn large_image(&self, app_id: &str) -> String {
        self.large_image_url.replace("{app_id}", app_id)
    }
}

impl Default for ActivityConfig {
    fn default() -> Self {
        Self {
            state: default_state(),
            small_image: default_small_image(),
            large_image_url: default_large_image_url(),
        }
    }
}

/// Top-level configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PresenceConfig {
    /// Discord application id sent in the handshake.
    #[serde(default = "default_client_id")]
    pub client_id: String,
    /// Override for the IPC socket path.
    #[serde(default)]
    pub socket_path: Option<PathBuf>,
    /// Write logs to this file instead of stderr.
    #[serde(default)]
    pub log_file: Option<PathBuf>,
    #[serde(default)]
    pub connection: ConnectionConfig,
    #[serde(default)]
    pub activity: ActivityConfig,
}

fn default_client_id() -> String {
    "1055680235682672682".to_string()
}

impl PresenceConfig {
    /// Socket path to connect to, falling back to [`default_socket_path`].
    #[must_use]
    pub fn socket_path(&self) -> PathBuf {
        self.socket_path.clone().unwrap_or_else(default_socket_path)
    }
}

impl Default for PresenceConfig {
    fn default() -> Self {
        Self {
            client_id: default_client_id(),
            socket_path: None,
            log_file: None,
            connection: ConnectionConfig::default(),
            activity: ActivityConfig::default(),
        }
    }
}

/// `<runtime-dir>/app/com.discordapp.Discord/discord-ipc-0`.
#[must_use]
pub fn default_socket_path() -> PathBuf {
    dirs::runtime_dir()
        .unwrap_or_else(|| PathBuf::from(FALLBACK_RUNTIME_DIR))
        .join("app")
        .join(DISCORD_BUNDLE_ID)
        .join(IPC_SOCKET_NAME)
}
