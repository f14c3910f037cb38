// ── Runtime agent configuration ──
//
// Describes *how* the agent behaves: identities, topics, budgets and
// delays. Never touches disk; `aquadata-config` builds one of these from
// the config file and hands it in.

use std::time::Duration;

use crate::driver::WifiCredentials;
use crate::model::OperationMode;
use crate::peripheral::DEFAULT_RECEIVE_CAP;

/// Network connect budget: `attempts` polls spaced `poll_interval` apart.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkBudget {
    pub attempts: u32,
    pub poll_interval: Duration,
}

impl LinkBudget {
    /// Upper bound on how long a single connect attempt can take.
    pub fn total(&self) -> Duration {
        self.poll_interval.saturating_mul(self.attempts)
    }
}

impl Default for LinkBudget {
    fn default() -> Self {
        Self {
            attempts: 20,
            poll_interval: Duration::from_secs(1),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BrokerSettings {
    /// Prefix for the client identity; the hardware id is appended in hex.
    pub client_prefix: String,
    /// Topic carrying telemetry lines.
    pub stream_topic: String,
    /// Topic carrying retained online/offline announcements.
    pub status_topic: String,
    pub online_payload: String,
    pub offline_payload: String,
    /// Minimum spacing between handshake attempts.
    pub backoff: Duration,
}

impl Default for BrokerSettings {
    fn default() -> Self {
        Self {
            client_prefix: "aquadata-esp32".into(),
            stream_topic: "aquadata/sensor-data".into(),
            status_topic: "aquadata/status".into(),
            online_payload: "online".into(),
            offline_payload: "offline".into(),
            backoff: Duration::from_secs(30),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PeripheralSettings {
    /// Advertised name.
    pub name: String,
    pub receive_cap: usize,
    /// Capacity of the driver → agent event queue.
    pub event_capacity: usize,
    /// Spacing of `status_update` lines while peers are connected. Zero disables them.
    pub keepalive_interval: Duration,
}

impl Default for PeripheralSettings {
    fn default() -> Self {
        Self {
            name: "AQUADATA-2.0".into(),
            receive_cap: DEFAULT_RECEIVE_CAP,
            event_capacity: 64,
            keepalive_interval: Duration::from_secs(10),
        }
    }
}

/// Fixed delays used by the supervisor and command processor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Timing {
    pub cycle_interval: Duration,
    /// Extra pause after a cycle fails.
    pub error_cooldown: Duration,
    /// Pause after forcing the link down during `wifi_config`.
    pub disconnect_settle: Duration,
    /// Pause after requesting a connect during `wifi_config`, before re-reading the link.
    pub association_settle: Duration,
    /// Pause between answering `restart` and ending the run.
    pub restart_flush: Duration,
    /// Pause before restarting after a fatal init failure.
    pub fatal_restart_delay: Duration,
}

impl Default for Timing {
    fn default() -> Self {
        Self {
            cycle_interval: Duration::from_secs(3),
            error_cooldown: Duration::from_secs(5),
            disconnect_settle: Duration::from_secs(2),
            association_settle: Duration::from_secs(5),
            restart_flush: Duration::from_secs(1),
            fatal_restart_delay: Duration::from_secs(5),
        }
    }
}

/// Everything the agent needs to run.
#[derive(Debug, Clone)]
pub struct AgentConfig {
    /// Raw hardware identity; the broker client id is derived from it.
    pub hardware_id: Vec<u8>,
    /// Mode in effect at start.
    pub mode: OperationMode,
    /// Stored credentials for auto-connect at start.
    pub wifi: Option<WifiCredentials>,
    pub link: LinkBudget,
    pub broker: BrokerSettings,
    pub peripheral: PeripheralSettings,
    pub timing: Timing,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            hardware_id: vec![0; 6],
            mode: OperationMode::default(),
            wifi: None,
            link: LinkBudget::default(),
            broker: BrokerSettings::default(),
            peripheral: PeripheralSettings::default(),
            timing: Timing::default(),
        }
    }
}
