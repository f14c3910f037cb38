// ── Remote commands ──
//
// Newline-framed JSON records arriving over the peripheral link are parsed
// into a typed `Command`, executed against the agent, and answered with a
// typed `Reply`. Nothing in here may take the agent down: parse failures,
// execution errors and panics all become error responses.

use std::fmt;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use bytes::Bytes;
use futures_util::FutureExt;
use secrecy::SecretString;
use serde::Serialize;
use serde_json::Value;
use strum::Display;
use tracing::{debug, error, info, warn};

use crate::driver::WifiCredentials;
use crate::error::CoreError;
use crate::model::{OperationMode, TelemetrySnapshot};
use crate::supervisor::Agent;

const INVALID_JSON: &str = "Invalid JSON format";
const INTERNAL_ERROR: &str = "An internal error occurred.";

// ── Command ──────────────────────────────────────────────────────

/// A parsed remote command.
#[derive(Clone)]
pub enum Command {
    WifiConfig {
        ssid: String,
        password: Option<SecretString>,
    },
    WifiDisconnect,
    Restart,
    SetMode {
        mode: String,
    },
    GetSensorData,
    Unknown {
        kind: String,
    },
}

impl fmt::Debug for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::WifiConfig { ssid, .. } => f
                .debug_struct("WifiConfig")
                .field("ssid", ssid)
                .finish_non_exhaustive(),
            Self::WifiDisconnect => f.write_str("WifiDisconnect"),
            Self::Restart => f.write_str("Restart"),
            Self::SetMode { mode } => f.debug_struct("SetMode").field("mode", mode).finish(),
            Self::GetSensorData => f.write_str("GetSensorData"),
            Self::Unknown { kind } => f.debug_struct("Unknown").field("kind", kind).finish(),
        }
    }
}

impl Command {
    /// Parse one framed message.
    ///
    /// The `type` tag is matched case-insensitively; a missing tag is treated
    /// as the empty string and lands in [`Command::Unknown`].
    pub fn parse(raw: &str) -> Result<Self, CoreError> {
        let value: Value = serde_json::from_str(raw).map_err(|e| CoreError::MalformedCommand {
            message: e.to_string(),
        })?;
        let Value::Object(fields) = value else {
            return Err(CoreError::MalformedCommand {
                message: "expected a JSON object".into(),
            });
        };

        let text = |key: &str| fields.get(key).and_then(Value::as_str).map(str::to_owned);
        let kind = text("type").unwrap_or_default().to_lowercase();

        Ok(match kind.as_str() {
            "wifi_config" => Self::WifiConfig {
                ssid: text("ssid").unwrap_or_default(),
                password: text("password").map(SecretString::from),
            },
            "wifi_disconnect" => Self::WifiDisconnect,
            "restart" => Self::Restart,
            "set_mode" => Self::SetMode {
                mode: text("mode").unwrap_or_default(),
            },
            "get_sensor_data" => Self::GetSensorData,
            _ => Self::Unknown { kind },
        })
    }

    /// `type` used in the response to this command.
    pub fn response_type(&self) -> &'static str {
        match self {
            Self::WifiConfig { .. } => "wifi_config_response",
            Self::WifiDisconnect => "wifi_disconnect_response",
            Self::Restart => "restart_response",
            Self::SetMode { .. } => "set_mode_response",
            Self::GetSensorData => "sensor_data",
            Self::Unknown { .. } => "error",
        }
    }
}

// ── Reply ────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, Serialize)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum ResponseStatus {
    Success,
    Error,
    Info,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CommandResponse {
    #[serde(rename = "type")]
    pub kind: String,
    pub status: ResponseStatus,
    pub message: String,
}

/// What goes back to the peer: a status response, or the raw snapshot for
/// `get_sensor_data`.
#[derive(Debug, Clone, PartialEq)]
pub enum Reply {
    Response(CommandResponse),
    Snapshot(Arc<TelemetrySnapshot>),
}

impl Reply {
    pub fn new(kind: &str, status: ResponseStatus, message: impl Into<String>) -> Self {
        Self::Response(CommandResponse {
            kind: kind.to_owned(),
            status,
            message: message.into(),
        })
    }

    pub fn success(kind: &str, message: impl Into<String>) -> Self {
        Self::new(kind, ResponseStatus::Success, message)
    }

    pub fn error(kind: &str, message: impl Into<String>) -> Self {
        Self::new(kind, ResponseStatus::Error, message)
    }

    /// The status response, if this is one.
    pub fn response(&self) -> Option<&CommandResponse> {
        match self {
            Self::Response(r) => Some(r),
            Self::Snapshot(_) => None,
        }
    }

    pub fn status(&self) -> Option<ResponseStatus> {
        self.response().map(|r| r.status)
    }

    /// Encode as a single newline-terminated JSON line.
    pub fn to_line(&self) -> Result<Bytes, serde_json::Error> {
        match self {
            Self::Response(response) => {
                let mut line = serde_json::to_vec(response)?;
                line.push(b'\n');
                Ok(Bytes::from(line))
            }
            Self::Snapshot(snapshot) => snapshot.to_line(),
        }
    }
}

// ── Processing ───────────────────────────────────────────────────

impl Agent {
    /// Parse, execute and answer one framed message. Never fails.
    pub async fn process_command(&mut self, raw: &str) -> Reply {
        let command = match Command::parse(raw) {
            Ok(command) => command,
            Err(e) => {
                warn!(error = %e, "rejecting command");
                return Reply::error("error", INVALID_JSON);
            }
        };
        debug!(?command, "command received");

        let outcome = AssertUnwindSafe(self.execute(command)).catch_unwind().await;
        match outcome {
            Ok(Ok(reply)) => reply,
            Ok(Err(e)) => {
                warn!(error = %e, "command failed");
                Reply::error("error", INTERNAL_ERROR)
            }
            Err(_) => {
                error!("command handler panicked");
                self.recover_from_panic();
                Reply::error("error", INTERNAL_ERROR)
            }
        }
    }

    async fn execute(&mut self, command: Command) -> Result<Reply, CoreError> {
        let kind = command.response_type();
        match command {
            Command::WifiConfig { ssid, password } => {
                self.configure_wifi(kind, WifiCredentials::new(ssid, password))
                    .await
            }

            Command::WifiDisconnect => {
                self.drop_network().await;
                info!("WiFi disconnected by remote command");
                Ok(Reply::success(kind, "WiFi disconnected."))
            }

            Command::Restart => {
                self.state.restart_requested = true;
                info!("restart requested by remote command");
                Ok(Reply::success(kind, "Restarting device..."))
            }

            Command::SetMode { mode } => match OperationMode::from_wire(&mode) {
                Some(next) => {
                    let previous = std::mem::replace(&mut self.state.mode, next);
                    info!(from = %previous, to = %next, "operation mode changed");
                    Ok(Reply::success(kind, format!("Operation mode set to {next}")))
                }
                None => Ok(Reply::error(kind, format!("Invalid mode: {mode}"))),
            },

            Command::GetSensorData => Ok(Reply::Snapshot(self.snapshot())),

            Command::Unknown { kind: unknown } => {
                debug!(kind = %unknown, "unknown command");
                Ok(Reply::error(kind, format!("Unknown command: {unknown}")))
            }
        }
    }

    /// Swap in new credentials, reconnect, and report the outcome.
    async fn configure_wifi(
        &mut self,
        kind: &str,
        credentials: WifiCredentials,
    ) -> Result<Reply, CoreError> {
        if credentials.ssid.is_empty() {
            return Ok(Reply::error(kind, "SSID is required."));
        }
        let ssid = credentials.ssid.clone();
        info!(ssid = %ssid, "configuring WiFi");

        self.send_reply(&Reply::new(
            kind,
            ResponseStatus::Info,
            format!("Attempting to connect to {ssid}..."),
        ))
        .await;

        self.drop_network().await;
        self.state.link.set_credentials(credentials);
        tokio::time::sleep(self.config.timing.disconnect_settle).await;

        if let Err(e) = self.connect_network().await {
            warn!(error = %e, "WiFi reconfiguration did not connect");
        }
        tokio::time::sleep(self.config.timing.association_settle).await;

        if !self.refresh_link().await {
            return Ok(Reply::error(
                kind,
                format!("Failed to connect to {ssid}. Check credentials."),
            ));
        }

        if self.state.mode.uses_broker() && !self.state.broker.is_connected() {
            if let Err(e) = self.connect_broker().await {
                warn!(error = %e, "broker connect after WiFi reconfiguration failed");
            }
        }
        Ok(Reply::success(kind, format!("Successfully connected to {ssid}")))
    }
}
