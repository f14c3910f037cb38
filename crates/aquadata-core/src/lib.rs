//! Connectivity supervisor and telemetry agent for aquadata water-quality
//! probes.
//!
//! The crate is transport-agnostic: radios, sockets and sensors sit behind
//! the traits in [`driver`], and everything here is plain state plus one
//! event loop.
//!
//! - **[`Agent`]**: owns [`AgentState`] and runs the loop.
//!   [`run()`](Agent::run) starts the peripheral driver, then interleaves a
//!   fixed-period cycle (network link, broker session, sensor read,
//!   dispatch) with inbound peripheral events until cancelled or a
//!   `restart` command is accepted.
//!
//! - **[`NetworkLink`] / [`BrokerSession`] / [`PeripheralSession`]**: pure
//!   transition rules for each transport. No I/O, no retries.
//!
//! - **[`Command`] / [`Reply`]**: newline-framed JSON commands from a
//!   connected peer and the responses sent back.
//!
//! - **[`Dispatcher`]**: pushes one [`TelemetrySnapshot`] to every eligible
//!   transport, isolating failures per transport.

pub mod command;
pub mod config;
pub mod dispatch;
pub mod driver;
pub mod error;
pub mod link;
pub mod model;
pub mod peripheral;
pub mod state;
pub mod supervisor;

// ── Primary re-exports ──────────────────────────────────────────────
pub use command::{Command, CommandResponse, Reply, ResponseStatus};
pub use config::{AgentConfig, BrokerSettings, LinkBudget, PeripheralSettings, Timing};
pub use dispatch::{DispatchReport, Dispatcher};
pub use driver::{
    BrokerClient, DriverError, LastWill, NetworkDriver, PeripheralEvent, PeripheralLink,
    SensorSource, WifiCredentials,
};
pub use error::{CoreError, ErrorKind};
pub use link::{BrokerSession, LinkState, NetworkLink, SessionState};
pub use model::{
    Counters, MetricCounts, OperationMode, SensorReading, StatusLevel, TelemetrySnapshot,
    format_uptime,
};
pub use peripheral::{DEFAULT_RECEIVE_CAP, PeripheralSession};
pub use state::AgentState;
pub use supervisor::{Agent, CycleReport, Drivers, RunOutcome};
