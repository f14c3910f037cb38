// ── Transport state tracking ──
//
// Pure transition rules for the network link and the broker session.
// No retries and no I/O happen here: the supervisor performs one attempt,
// reports the outcome, and owns all pacing.

use std::time::Duration;

use serde::Serialize;
use strum::{AsRefStr, Display};
use tokio::time::Instant;

use crate::driver::WifiCredentials;

/// Wireless network link state. Serialized as the snapshot's `wifi_status`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Display, AsRefStr, Serialize)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum LinkState {
    #[default]
    Disconnected,
    Connecting,
    Connected,
}

/// Broker session state.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Display, AsRefStr)]
#[strum(serialize_all = "snake_case")]
pub enum SessionState {
    #[default]
    Absent,
    Connected,
}

// ── NetworkLink ──────────────────────────────────────────────────

#[derive(Debug, Clone, Default)]
pub struct NetworkLink {
    state: LinkState,
    credentials: Option<WifiCredentials>,
    last_attempt: Option<Instant>,
}

impl NetworkLink {
    pub fn new(credentials: Option<WifiCredentials>) -> Self {
        Self {
            state: LinkState::Disconnected,
            credentials,
            last_attempt: None,
        }
    }

    pub fn state(&self) -> LinkState {
        self.state
    }

    pub fn is_connected(&self) -> bool {
        self.state == LinkState::Connected
    }

    pub fn credentials(&self) -> Option<&WifiCredentials> {
        self.credentials.as_ref()
    }

    pub fn ssid(&self) -> Option<&str> {
        self.credentials.as_ref().map(|c| c.ssid.as_str())
    }

    pub fn last_attempt(&self) -> Option<Instant> {
        self.last_attempt
    }

    /// `Disconnected → Connecting`. Any other state is left untouched and
    /// `false` is returned.
    pub fn begin_connect(&mut self, now: Instant) -> bool {
        if self.state != LinkState::Disconnected {
            return false;
        }
        self.state = LinkState::Connecting;
        self.last_attempt = Some(now);
        true
    }

    /// `Connecting → Connected`.
    pub fn connect_succeeded(&mut self) -> bool {
        self.transition_from_connecting(LinkState::Connected)
    }

    /// `Connecting → Disconnected`, on driver failure or an exhausted wait budget.
    pub fn connect_failed(&mut self) -> bool {
        self.transition_from_connecting(LinkState::Disconnected)
    }

    /// Explicit disconnect or detected loss. Valid from every state.
    pub fn disconnect(&mut self) {
        self.state = LinkState::Disconnected;
    }

    /// Replace the credentials. The current association is abandoned.
    pub fn set_credentials(&mut self, credentials: WifiCredentials) {
        self.credentials = Some(credentials);
        self.state = LinkState::Disconnected;
    }

    fn transition_from_connecting(&mut self, next: LinkState) -> bool {
        if self.state != LinkState::Connecting {
            return false;
        }
        self.state = next;
        true
    }
}

// ── BrokerSession ────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct BrokerSession {
    state: SessionState,
    client_identity: String,
    last_publish_error: Option<String>,
    last_attempt: Option<Instant>,
}

impl BrokerSession {
    pub fn new(client_identity: impl Into<String>) -> Self {
        Self {
            state: SessionState::Absent,
            client_identity: client_identity.into(),
            last_publish_error: None,
            last_attempt: None,
        }
    }

    /// Stable client identity: `<prefix>-<hex(hardware id)>`.
    pub fn derive_identity(prefix: &str, hardware_id: &[u8]) -> String {
        format!("{prefix}-{}", hex::encode(hardware_id))
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn is_connected(&self) -> bool {
        self.state == SessionState::Connected
    }

    pub fn client_identity(&self) -> &str {
        &self.client_identity
    }

    pub fn last_publish_error(&self) -> Option<&str> {
        self.last_publish_error.as_deref()
    }

    pub fn last_attempt(&self) -> Option<Instant> {
        self.last_attempt
    }

    /// Whether enough time has passed since the previous handshake attempt.
    pub fn attempt_due(&self, now: Instant, backoff: Duration) -> bool {
        self.last_attempt
            .is_none_or(|last| now.saturating_duration_since(last) >= backoff)
    }

    pub fn record_attempt(&mut self, now: Instant) {
        self.last_attempt = Some(now);
    }

    /// `Absent → Connected`, refused unless the network link is up.
    pub fn handshake_succeeded(&mut self, link: &NetworkLink) -> bool {
        if !link.is_connected() {
            return false;
        }
        self.state = SessionState::Connected;
        self.last_publish_error = None;
        true
    }

    /// `Connected → Absent` after a publish/keep-alive failure or an explicit
    /// disconnect.
    pub fn reset(&mut self, error: Option<String>) {
        self.state = SessionState::Absent;
        if error.is_some() {
            self.last_publish_error = error;
        }
    }

    /// Drop the session if the link it rides on is gone. Returns `true`
    /// when the session was torn down by this call.
    pub fn follow_link(&mut self, link: &NetworkLink) -> bool {
        if self.is_connected() && !link.is_connected() {
            self.state = SessionState::Absent;
            return true;
        }
        false
    }
}
