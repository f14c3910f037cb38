// ── Domain model ──
//
// Plain data shared by the supervisor, dispatcher and command processor.
// Nothing in here performs I/O.

pub mod mode;
pub mod telemetry;

pub use mode::OperationMode;
pub use telemetry::{
    Counters, MetricCounts, SensorReading, StatusLevel, TelemetrySnapshot, format_uptime,
};
