//! Configuration for the aquadata agent.
//!
//! A TOML file layered under `AQUADATA_*` environment variables, validated
//! and translated into `aquadata_core::AgentConfig`. Driver settings that
//! the core never sees (broker host, bridge address, simulation knobs) are
//! exposed as plain sections for the binary to wire up.

use std::collections::BTreeMap;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use directories::ProjectDirs;
use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use aquadata_core::{
    AgentConfig, BrokerSettings, LinkBudget, OperationMode, PeripheralSettings, Timing,
    WifiCredentials,
};

/// Prefix for environment overrides; nested keys are split on `__`.
pub const ENV_PREFIX: &str = "AQUADATA_";

const REDACTED: &str = "********";

// ── Error ───────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid {field}: {reason}")]
    Validation { field: String, reason: String },

    #[error("config file not found: {}", path.display())]
    NotFound { path: PathBuf },

    #[error("failed to serialize config: {0}")]
    Serialization(#[from] toml::ser::Error),

    #[error("config loading failed: {0}")]
    Figment(Box<figment::Error>),
}

impl From<figment::Error> for ConfigError {
    fn from(err: figment::Error) -> Self {
        Self::Figment(Box::new(err))
    }
}

fn invalid(field: &str, reason: impl Into<String>) -> ConfigError {
    ConfigError::Validation {
        field: field.into(),
        reason: reason.into(),
    }
}

// ── TOML config structs ─────────────────────────────────────────────

/// Top-level TOML configuration.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct Config {
    pub device: DeviceSection,
    pub wifi: WifiSection,
    pub broker: BrokerSection,
    pub peripheral: PeripheralSection,
    pub timing: TimingSection,
    pub simulation: SimulationSection,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct DeviceSection {
    /// Advertised peripheral name.
    pub name: String,
    /// Hex hardware id. Falls back to the host machine id.
    pub hardware_id: Option<String>,
    /// Initial operation mode: "hybrid", "ble_only" or "mqtt_only".
    pub mode: String,
}

impl Default for DeviceSection {
    fn default() -> Self {
        Self {
            name: "AQUADATA-2.0".into(),
            hardware_id: None,
            mode: OperationMode::default().to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct WifiSection {
    /// Stored network for auto-connect at start.
    pub ssid: Option<String>,
    /// Password for `ssid`. Prefer `AQUADATA_WIFI__PASSWORD` over the file.
    #[serde(serialize_with = "masked::option")]
    pub password: Option<SecretString>,
    pub connect_attempts: u32,
    pub poll_interval_ms: u64,
}

impl Default for WifiSection {
    fn default() -> Self {
        Self {
            ssid: None,
            password: None,
            connect_attempts: 20,
            poll_interval_ms: 1000,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct BrokerSection {
    pub host: String,
    pub port: u16,
    pub client_prefix: String,
    pub stream_topic: String,
    pub status_topic: String,
    pub keep_alive_secs: u64,
    pub backoff_secs: u64,
    pub connect_timeout_secs: u64,
}

impl Default for BrokerSection {
    fn default() -> Self {
        let core = BrokerSettings::default();
        Self {
            host: "broker.hivemq.com".into(),
            port: 1883,
            client_prefix: core.client_prefix,
            stream_topic: core.stream_topic,
            status_topic: core.status_topic,
            keep_alive_secs: 60,
            backoff_secs: core.backoff.as_secs(),
            connect_timeout_secs: 10,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct PeripheralSection {
    /// Listen address of the TCP bridge standing in for BLE.
    pub listen: String,
    pub receive_cap: usize,
    pub event_capacity: usize,
    /// `status_update` interval while peers are connected; 0 disables.
    pub keepalive_secs: u64,
}

impl Default for PeripheralSection {
    fn default() -> Self {
        let core = PeripheralSettings::default();
        Self {
            listen: "127.0.0.1:7878".into(),
            receive_cap: core.receive_cap,
            event_capacity: core.event_capacity,
            keepalive_secs: core.keepalive_interval.as_secs(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct TimingSection {
    pub cycle_interval_secs: u64,
    pub error_cooldown_secs: u64,
    pub disconnect_settle_secs: u64,
    pub association_settle_secs: u64,
    pub restart_flush_secs: u64,
    pub fatal_restart_delay_secs: u64,
}

impl Default for TimingSection {
    fn default() -> Self {
        let core = Timing::default();
        Self {
            cycle_interval_secs: core.cycle_interval.as_secs(),
            error_cooldown_secs: core.error_cooldown.as_secs(),
            disconnect_settle_secs: core.disconnect_settle.as_secs(),
            association_settle_secs: core.association_settle.as_secs(),
            restart_flush_secs: core.restart_flush.as_secs(),
            fatal_restart_delay_secs: core.fatal_restart_delay.as_secs(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct SimulationSection {
    pub association_delay_ms: u64,
    /// Probability of a failed read per metric group.
    pub failure_rate: f64,
    /// Fixed RNG seed for reproducible readings.
    pub seed: Option<u64>,
    /// Networks the simulated station can join (ssid → password, "" for
    /// open). Empty means every SSID associates.
    #[serde(serialize_with = "masked::map")]
    pub networks: BTreeMap<String, SecretString>,
}

impl Default for SimulationSection {
    fn default() -> Self {
        Self {
            association_delay_ms: 1500,
            failure_rate: 0.05,
            seed: None,
            networks: BTreeMap::new(),
        }
    }
}

// ── Config file path ────────────────────────────────────────────────

/// Resolve the config file path via XDG / platform conventions.
pub fn config_path() -> PathBuf {
    ProjectDirs::from("org", "aquadata", "aquadata").map_or_else(
        || {
            let mut p = dirs_fallback();
            p.push("config.toml");
            p
        },
        |dirs| dirs.config_dir().join("config.toml"),
    )
}

fn dirs_fallback() -> PathBuf {
    let mut p = PathBuf::from(std::env::var("HOME").unwrap_or_else(|_| ".".into()));
    p.push(".config");
    p.push("aquadata");
    p
}

// ── Config loading ──────────────────────────────────────────────────

/// Load from `path` (or the default location) plus the environment, then
/// validate.
///
/// An explicit `path` must exist; the default location may be absent.
pub fn load_config(path: Option<&Path>) -> Result<Config, ConfigError> {
    let path = match path {
        Some(p) if !p.exists() => {
            return Err(ConfigError::NotFound {
                path: p.to_path_buf(),
            });
        }
        Some(p) => p.to_path_buf(),
        None => config_path(),
    };

    let config: Config = Figment::new()
        .merge(Serialized::defaults(Config::default()))
        .merge(Toml::file(&path))
        .merge(Env::prefixed(ENV_PREFIX).split("__"))
        .extract()?;

    config.validate()?;
    Ok(config)
}

impl Config {
    // ── Validation ──────────────────────────────────────────────────

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.mode()?;
        self.listen_addr()?;

        if self.device.name.trim().is_empty() {
            return Err(invalid("device.name", "must not be empty"));
        }
        if self.broker.host.trim().is_empty() {
            return Err(invalid("broker.host", "must not be empty"));
        }
        if self.broker.stream_topic.is_empty() || self.broker.status_topic.is_empty() {
            return Err(invalid("broker topics", "must not be empty"));
        }
        if self.broker.keep_alive_secs < 5 {
            return Err(invalid("broker.keep_alive_secs", "must be at least 5"));
        }

        for (field, value) in [
            ("wifi.connect_attempts", u64::from(self.wifi.connect_attempts)),
            ("wifi.poll_interval_ms", self.wifi.poll_interval_ms),
            ("broker.connect_timeout_secs", self.broker.connect_timeout_secs),
            ("timing.cycle_interval_secs", self.timing.cycle_interval_secs),
        ] {
            if value == 0 {
                return Err(invalid(field, "must be greater than zero"));
            }
        }
        if self.peripheral.receive_cap == 0 {
            return Err(invalid("peripheral.receive_cap", "must be greater than zero"));
        }
        if self.peripheral.event_capacity == 0 {
            return Err(invalid("peripheral.event_capacity", "must be greater than zero"));
        }
        if !(0.0..=1.0).contains(&self.simulation.failure_rate) {
            return Err(invalid("simulation.failure_rate", "must be between 0 and 1"));
        }
        Ok(())
    }

    pub fn mode(&self) -> Result<OperationMode, ConfigError> {
        OperationMode::from_str(self.device.mode.trim()).map_err(|_| {
            invalid(
                "device.mode",
                format!(
                    "expected 'hybrid', 'ble_only', or 'mqtt_only', got '{}'",
                    self.device.mode
                ),
            )
        })
    }

    pub fn listen_addr(&self) -> Result<SocketAddr, ConfigError> {
        self.peripheral.listen.parse().map_err(|_| {
            invalid(
                "peripheral.listen",
                format!("not a socket address: {}", self.peripheral.listen),
            )
        })
    }

    /// Stored credentials, if an SSID is configured.
    pub fn wifi_credentials(&self) -> Option<WifiCredentials> {
        let ssid = self.wifi.ssid.as_deref()?.trim();
        if ssid.is_empty() {
            return None;
        }
        Some(WifiCredentials::new(ssid, self.wifi.password.clone()))
    }

    /// Known networks for the simulated station.
    pub fn simulated_networks(&self) -> Vec<(String, Option<SecretString>)> {
        self.simulation
            .networks
            .iter()
            .map(|(ssid, password)| {
                let password = (!password.expose_secret().is_empty()).then(|| password.clone());
                (ssid.clone(), password)
            })
            .collect()
    }

    // ── Translation ─────────────────────────────────────────────────

    /// Build the runtime agent config. `hardware_id` is resolved by the
    /// caller since it may need the host.
    pub fn to_agent_config(&self, hardware_id: Vec<u8>) -> Result<AgentConfig, ConfigError> {
        let broker = &self.broker;
        let timing = &self.timing;

        Ok(AgentConfig {
            hardware_id,
            mode: self.mode()?,
            wifi: self.wifi_credentials(),
            link: LinkBudget {
                attempts: self.wifi.connect_attempts,
                poll_interval: Duration::from_millis(self.wifi.poll_interval_ms),
            },
            broker: BrokerSettings {
                client_prefix: broker.client_prefix.clone(),
                stream_topic: broker.stream_topic.clone(),
                status_topic: broker.status_topic.clone(),
                backoff: Duration::from_secs(broker.backoff_secs),
                ..BrokerSettings::default()
            },
            peripheral: PeripheralSettings {
                name: self.device.name.clone(),
                receive_cap: self.peripheral.receive_cap,
                event_capacity: self.peripheral.event_capacity,
                keepalive_interval: Duration::from_secs(self.peripheral.keepalive_secs),
            },
            timing: Timing {
                cycle_interval: Duration::from_secs(timing.cycle_interval_secs),
                error_cooldown: Duration::from_secs(timing.error_cooldown_secs),
                disconnect_settle: Duration::from_secs(timing.disconnect_settle_secs),
                association_settle: Duration::from_secs(timing.association_settle_secs),
                restart_flush: Duration::from_secs(timing.restart_flush_secs),
                fatal_restart_delay: Duration::from_secs(timing.fatal_restart_delay_secs),
            },
        })
    }

    /// Pretty TOML for display. Passwords always serialize masked.
    pub fn to_redacted_toml(&self) -> Result<String, ConfigError> {
        Ok(toml::to_string_pretty(self)?)
    }
}

// ── Secret serialization ────────────────────────────────────────────

/// Secrets are only ever serialized for display, so they go out masked.
/// Open networks keep their empty password so they still read as open.
mod masked {
    use std::collections::BTreeMap;

    use secrecy::{ExposeSecret, SecretString};
    use serde::Serializer;
    use serde::ser::SerializeMap;

    use super::REDACTED;

    #[allow(clippy::ref_option)]
    pub fn option<S: Serializer>(value: &Option<SecretString>, s: S) -> Result<S::Ok, S::Error> {
        match value {
            Some(_) => s.serialize_some(REDACTED),
            None => s.serialize_none(),
        }
    }

    pub fn map<S: Serializer>(
        value: &BTreeMap<String, SecretString>,
        s: S,
    ) -> Result<S::Ok, S::Error> {
        let mut map = s.serialize_map(Some(value.len()))?;
        for (ssid, password) in value {
            let shown = if password.expose_secret().is_empty() {
                ""
            } else {
                REDACTED
            };
            map.serialize_entry(ssid, shown)?;
        }
        map.end()
    }
}
