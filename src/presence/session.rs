//! Session API used by the host.

use chrono::Utc;
use tokio::sync::Mutex;

use crate::config::{ActivityConfig, PresenceConfig};
use crate::ipc::{
    Command, Connection, ConnectionStats, Connector, IpcError, Response, UnixConnector,
};

use super::activity::{is_no_app, Activity, GameDetails, SetActivityArgs, SET_ACTIVITY};

struct SessionInner<C: Connector> {
    connection: Connection<C>,
    /// App whose status is currently displayed.
    current_app: Option<String>,
}

/// Rich presence session.
///
/// All state lives behind one async mutex, so at most one exchange with
/// Discord is in flight and the connection has a single owner. Operations
/// never return errors: failures are logged, the connection is reset, and
/// the next call reconnects.
pub struct Presence<C: Connector = UnixConnector> {
    inner: Mutex<SessionInner<C>>,
    activity: ActivityConfig,
    pid: u32,
}

impl Presence<UnixConnector> {
    /// Creates a session for the socket and client id in `config`.
    #[must_use]
    pub fn new(config: &PresenceConfig) -> Self {
        Self::with_connection(Connection::from_config(config), config.activity.clone())
    }
}

impl<C: Connector> Presence<C> {
    /// Creates a session around an existing connection.
    #[must_use]
    pub fn with_connection(connection: Connection<C>, activity: ActivityConfig) -> Self {
        Self {
            inner: Mutex::new(SessionInner {
                connection,
                current_app: None,
            }),
            activity,
            pid: std::process::id(),
        }
    }

    /// Process id reported to Discord with every activity.
    #[must_use]
    pub fn pid(&self) -> u32 {
        self.pid
    }

    pub async fn is_connected(&self) -> bool {
        self.inner.lock().await.connection.is_connected()
    }

    /// App id of the activity currently displayed, if any.
    pub async fn current_app(&self) -> Option<String> {
        self.inner.lock().await.current_app.clone()
    }

    /// Returns the connection counters.
    pub async fn stats(&self) -> ConnectionStats {
        self.inner.lock().await.connection.stats()
    }

    /// Establishes the connection at load time.
    pub async fn start(&self) -> bool {
        tracing::info!(pid = self.pid, "Starting Discord presence");
        self.inner.lock().await.connection.connect().await
    }

    /// Closes the connection. The displayed status goes away with it.
    pub async fn stop(&self) {
        let mut inner = self.inner.lock().await;
        inner.connection.close().await;
        inner.current_app = None;
    }

    /// Checks the connection and reconnects if it is gone.
    pub async fn reconnect(&self) -> bool {
        self.inner.lock().await.connection.reconnect().await
    }

    /// Clears the status for `app_id`.
    ///
    /// Returns `false` without touching the socket when `app_id` is the
    /// "no game" sentinel.
    pub async fn clear_activity(&self, app_id: &str) -> bool {
        if is_no_app(app_id) {
            return false;
        }
        tracing::info!(app_id, "Called clear activity");

        let mut inner = self.inner.lock().await;
        let command = match args_command(&SetActivityArgs::clear(self.pid)) {
            Ok(command) => command,
            Err(e) => {
                tracing::error!(error = %e, "Failed to build clear command");
                return false;
            }
        };
        let ok = send(&mut inner.connection, &command).await;
        inner.current_app = None;
        ok
    }

    /// Shows "Playing <name>" for `app_id`.
    pub async fn update_activity(
        &self,
        action_type: &str,
        app_id: &str,
        action: &str,
        details: &GameDetails,
    ) -> bool {
        tracing::info!(
            action_type,
            app_id,
            action,
            display_name = %details.display_name,
            "Called update activity"
        );

        let activity = Activity::for_game(&self.activity, app_id, details, Utc::now());
        let command = match args_command(&SetActivityArgs::set(self.pid, activity)) {
            Ok(command) => command,
            Err(e) => {
                tracing::error!(error = %e, "Failed to build activity command");
                return false;
            }
        };

        let mut inner = self.inner.lock().await;
        let ok = send(&mut inner.connection, &command).await;
        if ok {
            inner.current_app = Some(app_id.to_string());
        }
        ok
    }
}

impl<C: Connector> std::fmt::Debug for Presence<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Presence")
            .field("pid", &self.pid)
            .field("activity", &self.activity)
            .finish_non_exhaustive()
    }
}

fn args_command(args: &SetActivityArgs) -> Result<Command, IpcError> {
    Ok(Command::new(SET_ACTIVITY, serde_json::to_value(args)?))
}

/// Connects if needed, sends `command` and logs the reply.
async fn send<C: Connector>(connection: &mut Connection<C>, command: &Command) -> bool {
    if !connection.ensure_connected().await {
        tracing::warn!(cmd = %command.cmd, "Not connected, dropping command");
        return false;
    }

    match connection.request(command).await {
        Ok(Response { evt, data, .. }) => {
            tracing::info!(cmd = %command.cmd, evt = ?evt, data = ?data, "result");
            true
        }
        Err(e) => {
            tracing::error!(cmd = %command.cmd, error = %e, "Command failed");
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    use crate::config::ConnectionConfig;

    /// Counts connect calls and never succeeds.
    #[derive(Default)]
    struct CountingConnector {
        calls: Arc<AtomicU32>,
    }

    #[async_trait::async_trait]
    impl Connector for CountingConnector {
        type Stream = tokio::io::DuplexStream;

        async fn connect(&self) -> std::io::Result<Self::Stream> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Err(std::io::Error::from(std::io::ErrorKind::NotFound))
        }

        fn endpoint(&self) -> String {
            "counting".to_string()
        }
    }

    fn presence() -> (Presence<CountingConnector>, Arc<AtomicU32>) {
        let connector = CountingConnector::default();
        let calls = Arc::clone(&connector.calls);
        let config = ConnectionConfig {
            max_attempts: 1,
            ..ConnectionConfig::default()
        };
        let connection = Connection::new(connector, "1", config);
        (
            Presence::with_connection(connection, ActivityConfig::default()),
            calls,
        )
    }

    #[tokio::test]
    async fn clear_activity_none_is_noop() {
        let (presence, calls) = presence();
        assert!(!presence.clear_activity("none").await);
        assert!(!presence.clear_activity("0").await);
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn update_activity_without_discord_fails() {
        let (presence, calls) = presence();
        let ok = presence
            .update_activity("Game", "1145360", "start", &GameDetails::new("Hades"))
            .await;
        assert!(!ok);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(presence.current_app().await, None);
        assert!(!presence.is_connected().await);
        assert_eq!(presence.stats().await.connect_attempts, 1);
    }

    #[tokio::test]
    async fn clear_activity_resets_tracked_app_even_on_failure() {
        let (presence, calls) = presence();
        presence.inner.lock().await.current_app = Some("1145360".to_string());

        assert!(!presence.clear_activity("1145360").await);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(presence.current_app().await, None);
    }

    #[tokio::test]
    async fn stop_without_connection() {
        let (presence, calls) = presence();
        presence.stop().await;
        assert!(!presence.is_connected().await);
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn presence_reports_own_pid() {
        let (presence, _) = presence();
        assert_eq!(presence.pid(), std::process::id());
    }
}
