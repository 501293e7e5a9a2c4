//! Host bridge.
//!
//! Lets a host process drive a [`Presence`] over a line-oriented JSON
//! protocol, typically on stdin/stdout:
//!
//! ```text
//! -> {"method":"start"}
//! <- {"ok":true}
//! -> {"method":"update_activity","action_type":"Game","app_id":"1145360","action":"start","details":{"display_name":"Hades"}}
//! <- {"ok":true}
//! -> {"method":"status"}
//! <- {"ok":true,"connected":true,"app_id":"1145360"}
//! ```
//!
//! End of input stops the session. So does a failed read or write.

use serde::{Deserialize, Serialize};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};

use crate::ipc::Connector;
use crate::presence::{GameDetails, Presence};

/// A request from the host.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "method", rename_all = "snake_case")]
pub enum BridgeRequest {
    Start,
    Stop,
    Reconnect,
    UpdateActivity {
        #[serde(default)]
        action_type: String,
        app_id: String,
        #[serde(default)]
        action: String,
        details: GameDetails,
    },
    ClearActivity {
        app_id: String,
    },
    Status,
}

/// Reply to a [`BridgeRequest`].
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct BridgeResponse {
    pub ok: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub connected: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub app_id: Option<String>,
}

impl BridgeResponse {
    #[must_use]
    pub fn status(ok: bool) -> Self {
        Self {
            ok,
            ..Default::default()
        }
    }

    #[must_use]
    pub fn error(message: impl Into<String>) -> Self {
        Self {
            ok: false,
            error: Some(message.into()),
            ..Default::default()
        }
    }
}

/// Errors that end the bridge loop.
#[derive(Debug, thiserror::Error)]
pub enum BridgeError {
    #[error("Bridge I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to serialize response: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Dispatches one request to the session.
pub async fn handle_request<C: Connector>(
    presence: &Presence<C>,
    request: BridgeRequest,
) -> BridgeResponse {
    match request {
        BridgeRequest::Start => BridgeResponse::status(presence.start().await),
        BridgeRequest::Stop => {
            presence.stop().await;
            BridgeResponse::status(true)
        }
        BridgeRequest::Reconnect => BridgeResponse::status(presence.reconnect().await),
        BridgeRequest::UpdateActivity {
            action_type,
            app_id,
            action,
            details,
        } => BridgeResponse::status(
            presence
                .update_activity(&action_type, &app_id, &action, &details)
                .await,
        ),
        BridgeRequest::ClearActivity { app_id } => {
            BridgeResponse::status(presence.clear_activity(&app_id).await)
        }
        BridgeRequest::Status => BridgeResponse {
            ok: true,
            connected: Some(presence.is_connected().await),
            app_id: presence.current_app().await,
            ..Default::default()
        },
    }
}

/// Serves requests from `reader` until end of input, then stops the session.
///
/// The session is stopped on every exit, including a failed read or write.
///
/// # Errors
///
/// Returns an error if reading a request or writing a response fails.
pub async fn run<C, R, W>(presence: &Presence<C>, reader: R, writer: W) -> Result<(), BridgeError>
where
    C: Connector,
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let result = serve(presence, reader, writer).await;
    match &result {
        Ok(()) => tracing::info!("Bridge input closed"),
        Err(e) => tracing::error!(error = %e, "Bridge stopped"),
    }
    presence.stop().await;
    result
}

async fn serve<C, R, W>(presence: &Presence<C>, mut reader: R, mut writer: W) -> Result<(), BridgeError>
where
    C: Connector,
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut buf = Vec::new();

    loop {
        buf.clear();
        if reader.read_until(b'\n', &mut buf).await? == 0 {
            return Ok(());
        }

        let response = match std::str::from_utf8(&buf) {
            Ok(line) => {
                let line = line.trim();
                if line.is_empty() {
                    continue;
                }
                match serde_json::from_str::<BridgeRequest>(line) {
                    Ok(request) => {
                        tracing::debug!(?request, "Bridge request");
                        handle_request(presence, request).await
                    }
                    Err(e) => {
                        tracing::warn!(error = %e, "Malformed bridge request");
                        BridgeResponse::error(format!("invalid request: {e}"))
                    }
                }
            }
            Err(e) => {
                tracing::warn!(error = %e, "Bridge request is not UTF-8");
                BridgeResponse::error(format!("invalid request: {e}"))
            }
        };

        let mut response_json = serde_json::to_string(&response)?;
        response_json.push('\n');
        writer.write_all(response_json.as_bytes()).await?;
        writer.flush().await?;
    }
}
