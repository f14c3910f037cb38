//! Simulated WiFi station.
//!
//! Knows a fixed set of networks. A connect request for an unknown SSID
//! is rejected immediately; a known SSID with the wrong password is
//! accepted but never associates, which is how a real station behaves.
//! With no networks configured every SSID associates, modelling a host
//! that is already online.

use std::collections::HashMap;
use std::time::Duration;

use aquadata_core::{DriverError, NetworkDriver, WifiCredentials};
use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Station {
    Idle,
    /// Will report connected from this instant on.
    Associating { ready_at: Instant },
    /// Accepted but the handshake will never complete.
    Stalled,
}

pub struct SimulatedWifi {
    networks: HashMap<String, Option<SecretString>>,
    association_delay: Duration,
    station: Mutex<Station>,
}

impl SimulatedWifi {
    pub fn new(
        networks: impl IntoIterator<Item = (String, Option<SecretString>)>,
        association_delay: Duration,
    ) -> Self {
        Self {
            networks: networks.into_iter().collect(),
            association_delay,
            station: Mutex::new(Station::Idle),
        }
    }

    /// A station that associates with any SSID.
    pub fn open(association_delay: Duration) -> Self {
        Self::new(std::iter::empty(), association_delay)
    }

    fn password_matches(expected: Option<&SecretString>, given: Option<&SecretString>) -> bool {
        match (expected, given) {
            (None, _) => true,
            (Some(expected), Some(given)) => expected.expose_secret() == given.expose_secret(),
            (Some(_), None) => false,
        }
    }
}

#[async_trait]
impl NetworkDriver for SimulatedWifi {
    async fn begin_connect(&self, credentials: &WifiCredentials) -> Result<(), DriverError> {
        let next = if self.networks.is_empty() {
            Station::Associating {
                ready_at: Instant::now() + self.association_delay,
            }
        } else {
            let Some(expected) = self.networks.get(&credentials.ssid) else {
                return Err(DriverError::Rejected {
                    reason: format!("network '{}' not found", credentials.ssid),
                });
            };
            if Self::password_matches(expected.as_ref(), credentials.password.as_ref()) {
                Station::Associating {
                    ready_at: Instant::now() + self.association_delay,
                }
            } else {
                Station::Stalled
            }
        };

        debug!(ssid = %credentials.ssid, station = ?next, "simulated association started");
        *self.station.lock().await = next;
        Ok(())
    }

    async fn is_connected(&self) -> bool {
        match *self.station.lock().await {
            Station::Associating { ready_at } => Instant::now() >= ready_at,
            Station::Idle | Station::Stalled => false,
        }
    }

    async fn disconnect(&self) {
        *self.station.lock().await = Station::Idle;
    }
}
