// ── Driver seams ──
//
// The agent never touches a radio, socket or sensor directly. Platform
// stacks (BLE, WiFi, MQTT client, sensor front-end) plug in behind these
// traits; `aquadata-drivers` provides host implementations and the tests
// provide in-memory ones.

use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use secrecy::SecretString;
use thiserror::Error;
use tokio::sync::mpsc;

use crate::model::SensorReading;

/// Errors reported by driver implementations.
#[derive(Debug, Error)]
pub enum DriverError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("rejected: {reason}")]
    Rejected { reason: String },

    #[error("timed out after {after:?}")]
    Timeout { after: Duration },

    #[error("not connected")]
    NotConnected,

    #[error("driver channel closed")]
    Closed,

    #[error("protocol error: {0}")]
    Protocol(String),
}

/// Credentials for the wireless network.
#[derive(Clone)]
pub struct WifiCredentials {
    pub ssid: String,
    pub password: Option<SecretString>,
}

impl WifiCredentials {
    pub fn new(ssid: impl Into<String>, password: Option<SecretString>) -> Self {
        Self {
            ssid: ssid.into(),
            password,
        }
    }
}

impl fmt::Debug for WifiCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WifiCredentials")
            .field("ssid", &self.ssid)
            .field("password", &self.password.as_ref().map(|_| "[REDACTED]"))
            .finish()
    }
}

/// Message the broker publishes on our behalf if we vanish without a
/// clean disconnect.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LastWill {
    pub topic: String,
    pub payload: Bytes,
    pub retain: bool,
}

/// Activity reported by the peripheral driver.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PeripheralEvent {
    Connected { peer: u64 },
    Disconnected { peer: u64 },
    Data(Bytes),
}

/// Wireless network station.
#[async_trait]
pub trait NetworkDriver: Send + Sync {
    /// Start associating with a network. `Ok` only means the request was
    /// accepted; poll [`is_connected`](Self::is_connected) for the outcome.
    async fn begin_connect(&self, credentials: &WifiCredentials) -> Result<(), DriverError>;

    /// Whether the station currently has a usable link.
    async fn is_connected(&self) -> bool;

    /// Drop the current association. Never fails.
    async fn disconnect(&self);
}

/// Publish/subscribe broker client.
#[async_trait]
pub trait BrokerClient: Send + Sync {
    /// Perform a single handshake attempt, registering `will` with the broker.
    async fn connect(&self, client_id: &str, will: &LastWill) -> Result<(), DriverError>;

    async fn publish(&self, topic: &str, payload: Bytes, retain: bool) -> Result<(), DriverError>;

    /// Whether the client's keep-alive loop still considers the session healthy.
    fn is_alive(&self) -> bool;

    async fn disconnect(&self);
}

/// Short-range peripheral link (BLE UART or a stand-in).
#[async_trait]
pub trait PeripheralLink: Send + Sync {
    /// Start advertising/listening. Inbound activity is pushed into `events`.
    async fn start(&self, events: mpsc::Sender<PeripheralEvent>) -> Result<(), DriverError>;

    /// Number of peers the driver currently holds.
    fn peer_count(&self) -> usize;

    /// Write one frame to every connected peer.
    async fn write(&self, frame: Bytes) -> Result<(), DriverError>;
}

/// Source of water-quality readings.
pub trait SensorSource: Send {
    fn read(&mut self) -> SensorReading;
}

impl<F> SensorSource for F
where
    F: FnMut() -> SensorReading + Send,
{
    fn read(&mut self) -> SensorReading {
        self()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn credentials_debug_hides_password() {
        let creds = WifiCredentials::new("pond-net", Some(SecretString::from("hunter22")));
        let rendered = format!("{creds:?}");
        assert!(rendered.contains("pond-net"));
        assert!(!rendered.contains("hunter22"));
        assert!(rendered.contains("REDACTED"));
    }

    #[test]
    fn closures_are_sensor_sources() {
        let mut source = || SensorReading {
            ph: Some(7.0),
            do_conc: Some(8.0),
            do_sat: Some(90.0),
            temp: Some(21.0),
        };
        assert_eq!(SensorSource::read(&mut source).ph, Some(7.0));
    }
}
