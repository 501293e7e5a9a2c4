//! Configuration file loader.
//!
//! Settings come from the first TOML file found, then
//! `DECK_PRESENCE_SOCKET` overrides the socket path, then the result is
//! validated.

use std::path::{Path, PathBuf};

use super::PresenceConfig;

/// Environment variable that overrides `socket_path`.
pub const SOCKET_ENV: &str = "DECK_PRESENCE_SOCKET";

/// Finds, reads and checks the presence config.
#[derive(Debug)]
pub struct ConfigLoader {
    /// Candidate files, first match wins.
    candidates: Vec<PathBuf>,
    socket_override: Option<PathBuf>,
}

impl ConfigLoader {
    /// Creates a loader that looks in the working directory, then the user
    /// config directory.
    #[must_use]
    pub fn new() -> Self {
        let mut candidates = vec![PathBuf::from(".deck-presence.toml")];
        if let Some(config_dir) = dirs::config_dir() {
            candidates.push(config_dir.join("deck-presence").join("config.toml"));
        }
        Self::from_candidates(candidates)
    }

    /// Creates a loader for the file given with `--config`.
    #[must_use]
    pub fn with_path(path: PathBuf) -> Self {
        Self::from_candidates(vec![path])
    }

    fn from_candidates(candidates: Vec<PathBuf>) -> Self {
        Self {
            candidates,
            socket_override: std::env::var_os(SOCKET_ENV)
                .filter(|value| !value.is_empty())
                .map(PathBuf::from),
        }
    }

    /// Replaces the socket override taken from the environment.
    #[must_use]
    pub fn socket_override(mut self, path: Option<PathBuf>) -> Self {
        self.socket_override = path;
        self
    }

    /// Loads the first config file found, or the defaults when there is none.
    ///
    /// # Errors
    ///
    /// Returns an error if a config file exists but cannot be read or
    /// parsed, or if the resulting settings are unusable.
    pub fn load(&self) -> Result<PresenceConfig, ConfigError> {
        let mut config = match self.find_config_file() {
            Some(path) => {
                tracing::debug!(path = %path.display(), "Loading config file");
                read_file(&path)?
            }
            None => {
                tracing::debug!("No config file found, using defaults");
                PresenceConfig::default()
            }
        };

        if let Some(socket) = &self.socket_override {
            tracing::debug!(socket = %socket.display(), env = SOCKET_ENV, "Socket path overridden");
            config.socket_path = Some(socket.clone());
        }

        validate(&config)?;
        Ok(config)
    }

    /// Returns the candidate files in search order.
    #[must_use]
    pub fn search_paths(&self) -> &[PathBuf] {
        &self.candidates
    }

    /// Returns the first candidate that exists.
    #[must_use]
    pub fn find_config_file(&self) -> Option<PathBuf> {
        self.candidates.iter().find(|p| p.exists()).cloned()
    }
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}

fn read_file(path: &Path) -> Result<PresenceConfig, ConfigError> {
    let content = std::fs::read_to_string(path).map_err(|source| ConfigError::ReadError {
        path: path.to_path_buf(),
        source,
    })?;

    toml::from_str(&content).map_err(|source| ConfigError::ParseError {
        path: path.to_path_buf(),
        source,
    })
}

/// Rejects settings that would make every connect a no-op.
fn validate(config: &PresenceConfig) -> Result<(), ConfigError> {
    if config.client_id.trim().is_empty() {
        return Err(ConfigError::Invalid {
            field: "client_id",
            reason: "must not be empty".to_string(),
        });
    }
    if config.connection.max_attempts == 0 {
        return Err(ConfigError::Invalid {
            field: "connection.max_attempts",
            reason: "must be at least 1".to_string(),
        });
    }
    if config.socket_path.as_ref().is_some_and(|p| p.as_os_str().is_empty()) {
        return Err(ConfigError::Invalid {
            field: "socket_path",
            reason: "must not be empty".to_string(),
        });
    }
    Ok(())
}

/// Errors that can occur during configuration loading.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    ReadError {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to parse config file {path}: {source}")]
    ParseError {
        path: PathBuf,
        source: toml::de::Error,
    },

    #[error("Invalid config value for {field}: {reason}")]
    Invalid { field: &'static str, reason: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write_config(content: &str) -> (tempfile::TempDir, PathBuf) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, content).unwrap();
        (dir, path)
    }

    #[test]
    fn test_config_loader_default_paths() {
        let loader = ConfigLoader::new();
        assert!(!loader.search_paths().is_empty());
        assert!(loader.search_paths()[0].ends_with(".deck-presence.toml"));
    }

    #[test]
    fn test_config_loader_returns_defaults_when_no_file() {
        let loader =
            ConfigLoader::with_path(PathBuf::from("/nonexistent/path.toml")).socket_override(None);
        let config = loader.load().unwrap();
        assert_eq!(config, PresenceConfig::default());
    }

    #[test]
    fn test_config_loader_reads_file() {
        let (_dir, path) = write_config("client_id = \"99\"\n[connection]\nmax_attempts = 3\n");

        let loader = ConfigLoader::with_path(path.clone()).socket_override(None);
        assert_eq!(loader.find_config_file(), Some(path));
        let config = loader.load().unwrap();
        assert_eq!(config.client_id, "99");
        assert_eq!(config.connection.max_attempts, 3);
    }

    #[test]
    fn test_config_loader_parse_error() {
        let (_dir, path) = write_config("client_id = [");

        let err = ConfigLoader::with_path(path).load().unwrap_err();
        assert!(matches!(err, ConfigError::ParseError { .. }));
        assert!(err.to_string().starts_with("Failed to parse config file"));
    }

    #[test]
    fn test_zero_max_attempts_is_rejected() {
        let (_dir, path) = write_config("[connection]\nmax_attempts = 0\n");

        let err = ConfigLoader::with_path(path).load().unwrap_err();
        assert!(matches!(
            err,
            ConfigError::Invalid {
                field: "connection.max_attempts",
                ..
            }
        ));
        assert_eq!(
            err.to_string(),
            "Invalid config value for connection.max_attempts: must be at least 1"
        );
    }

    #[test]
    fn test_empty_client_id_is_rejected() {
        let (_dir, path) = write_config("client_id = \" \"\n");

        let err = ConfigLoader::with_path(path).load().unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { field: "client_id", .. }));
    }

    #[test]
    fn test_socket_override_wins_over_file() {
        let (_dir, path) = write_config("socket_path = \"/tmp/from-file.sock\"\n");

        let config = ConfigLoader::with_path(path)
            .socket_override(Some(PathBuf::from("/tmp/from-env.sock")))
            .load()
            .unwrap();
        assert_eq!(config.socket_path(), PathBuf::from("/tmp/from-env.sock"));
    }

    #[test]
    fn test_socket_override_applies_without_file() {
        let config = ConfigLoader::with_path(PathBuf::from("/nonexistent/path.toml"))
            .socket_override(Some(PathBuf::from("/tmp/discord-ipc-0")))
            .load()
            .unwrap();
        assert_eq!(config.socket_path(), PathBuf::from("/tmp/discord-ipc-0"));
        assert_eq!(config.connection.max_attempts, 5);
    }
}
