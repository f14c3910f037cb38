// ── Core error types ──
//
// Errors raised inside the agent. Drivers report `DriverError`; the
// supervisor, dispatcher and command processor translate those into the
// variants below at the boundary where they occur, so the failure can be
// turned into a state transition or a response instead of propagating.

use thiserror::Error;

use crate::driver::DriverError;

/// Failure classes the agent distinguishes when deciding what to do next.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Network connect attempt failed or timed out; retried next cycle.
    TransientLink,
    /// Broker handshake or publish failed; session reset, retried after back-off.
    TransientBroker,
    /// A write to the peripheral link failed; peers are re-counted next cycle.
    TransientPeripheral,
    /// Unparseable or invalid remote command; reported to the sender.
    MalformedCommand,
    /// Unterminated peripheral input exceeded the receive cap; discarded.
    BufferOverflow,
    /// Peripheral driver could not be started; the device restarts.
    FatalInit,
}

/// Unified error type for the core crate.
#[derive(Debug, Error)]
pub enum CoreError {
    // ── Network link ─────────────────────────────────────────────────
    #[error("no WiFi credentials configured")]
    NoCredentials,

    #[error("WiFi connect to '{ssid}' timed out after {attempts} attempts")]
    LinkTimeout { ssid: String, attempts: u32 },

    #[error("WiFi connect to '{ssid}' failed: {source}")]
    LinkFailed {
        ssid: String,
        #[source]
        source: DriverError,
    },

    // ── Broker session ───────────────────────────────────────────────
    #[error("broker unavailable: network link is {link}")]
    BrokerUnavailable { link: String },

    #[error("broker handshake failed: {source}")]
    BrokerHandshake {
        #[source]
        source: DriverError,
    },

    #[error("publish to '{topic}' failed: {source}")]
    BrokerPublish {
        topic: String,
        #[source]
        source: DriverError,
    },

    #[error("broker keep-alive lost")]
    BrokerKeepAlive,

    // ── Peripheral link ──────────────────────────────────────────────
    #[error("peripheral driver could not be started: {source}")]
    PeripheralInit {
        #[source]
        source: DriverError,
    },

    #[error("peripheral event channel closed")]
    PeripheralClosed,

    #[error("peripheral write failed: {source}")]
    PeripheralWrite {
        #[source]
        source: DriverError,
    },

    #[error("receive buffer overflow: {len} bytes exceeds cap of {cap}")]
    BufferOverflow { len: usize, cap: usize },

    // ── Commands ─────────────────────────────────────────────────────
    #[error("malformed command: {message}")]
    MalformedCommand { message: String },

    #[error("telemetry encoding failed: {0}")]
    Encode(#[from] serde_json::Error),

    #[error("internal error: {0}")]
    Internal(String),
}

impl CoreError {
    /// Classify this error into the agent's failure taxonomy.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::NoCredentials | Self::LinkTimeout { .. } | Self::LinkFailed { .. } => {
                ErrorKind::TransientLink
            }
            Self::BrokerUnavailable { .. }
            | Self::BrokerHandshake { .. }
            | Self::BrokerPublish { .. }
            | Self::BrokerKeepAlive => ErrorKind::TransientBroker,
            Self::PeripheralWrite { .. } => ErrorKind::TransientPeripheral,
            Self::BufferOverflow { .. } => ErrorKind::BufferOverflow,
            Self::PeripheralInit { .. } | Self::PeripheralClosed => ErrorKind::FatalInit,
            Self::MalformedCommand { .. } | Self::Encode(_) | Self::Internal(_) => {
                ErrorKind::MalformedCommand
            }
        }
    }

    /// Only a peripheral that cannot run at all is worth restarting the device for.
    pub fn is_fatal(&self) -> bool {
        self.kind() == ErrorKind::FatalInit
    }
}
