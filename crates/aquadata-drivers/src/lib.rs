//! Host-side drivers for the aquadata agent.
//!
//! These plug into the seams defined in [`aquadata_core::driver`] so the
//! agent can run on an ordinary machine:
//!
//! - **[`MqttBroker`]**: `rumqttc` client, one handshake per `connect()`.
//! - **[`TcpPeripheral`]**: TCP line bridge in place of the BLE UART.
//! - **[`SimulatedWifi`]**: station with a fixed set of known networks.
//! - **[`SimulatedSensor`]**: seeded pH / DO / temperature generator.
//! - **[`device`]**: hardware id for the broker client identity.

pub mod bridge;
pub mod device;
pub mod mqtt;
pub mod sensor;
pub mod wifi;

pub use bridge::TcpPeripheral;
pub use device::{HARDWARE_ID_LEN, hardware_id, parse_hardware_id};
pub use mqtt::{MqttBroker, MqttSettings};
pub use sensor::{DEFAULT_FAILURE_RATE, SimulatedSensor};
pub use wifi::SimulatedWifi;
