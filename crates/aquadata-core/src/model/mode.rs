// ── Operation mode ──

use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumString};

/// Which transports are eligible for outbound telemetry.
///
/// The wire names (`hybrid`, `ble_only`, `mqtt_only`) are what the
/// companion app sends in `set_mode` and what the config file accepts.
#[derive(
    Debug,
    Clone,
    Copy,
    Default,
    PartialEq,
    Eq,
    Hash,
    Display,
    EnumString,
    AsRefStr,
    Serialize,
    Deserialize,
)]
#[strum(ascii_case_insensitive)]
pub enum OperationMode {
    /// Peripheral link and broker both receive telemetry.
    #[default]
    #[strum(serialize = "hybrid")]
    #[serde(rename = "hybrid")]
    Hybrid,
    /// Peripheral link only; the network is left alone.
    #[strum(serialize = "ble_only")]
    #[serde(rename = "ble_only")]
    PeripheralOnly,
    /// Broker only; peripheral peers still get command responses.
    #[strum(serialize = "mqtt_only")]
    #[serde(rename = "mqtt_only")]
    BrokerOnly,
}

impl OperationMode {
    pub const ALL: [Self; 3] = [Self::Hybrid, Self::PeripheralOnly, Self::BrokerOnly];

    /// Exact wire-name lookup for remote commands. Unlike [`FromStr`], which
    /// config and CLI use, case and surrounding whitespace must match.
    ///
    /// [`FromStr`]: std::str::FromStr
    pub fn from_wire(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|mode| mode.as_ref() == name)
    }

    pub fn uses_peripheral(self) -> bool {
        matches!(self, Self::Hybrid | Self::PeripheralOnly)
    }

    /// The broker rides on the network link, so both are needed together.
    pub fn uses_broker(self) -> bool {
        matches!(self, Self::Hybrid | Self::BrokerOnly)
    }

    pub fn uses_network(self) -> bool {
        self.uses_broker()
    }
}
