// ── Telemetry domain types ──

use std::time::Duration;

use bytes::Bytes;
use serde::Serialize;

use crate::link::LinkState;

/// One raw reading from the sensor front-end. `None` marks a failed read.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct SensorReading {
    pub ph: Option<f64>,
    pub do_conc: Option<f64>,
    pub do_sat: Option<f64>,
    pub temp: Option<f64>,
}

impl SensorReading {
    pub fn status(&self) -> StatusLevel {
        StatusLevel::classify(self.ph, self.do_conc, self.do_sat)
    }
}

/// Overall water-quality classification, serialized with the labels the
/// companion app renders.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum StatusLevel {
    #[serde(rename = "🟢 All systems normal")]
    Normal,
    #[serde(rename = "🟡 Warning levels detected")]
    Warning,
    #[serde(rename = "🔴 Critical levels detected")]
    Critical,
    #[serde(rename = "⚪ Sensor reading error")]
    SensorError,
}

impl StatusLevel {
    pub fn classify(ph: Option<f64>, do_conc: Option<f64>, do_sat: Option<f64>) -> Self {
        let (Some(ph), Some(do_conc), Some(do_sat)) = (ph, do_conc, do_sat) else {
            return Self::SensorError;
        };

        if !(6.0..=9.0).contains(&ph) || do_conc < 4.0 || do_sat < 60.0 {
            Self::Critical
        } else if !(6.5..=8.5).contains(&ph) || do_conc < 6.0 || do_sat < 80.0 {
            Self::Warning
        } else {
            Self::Normal
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::Normal => "🟢 All systems normal",
            Self::Warning => "🟡 Warning levels detected",
            Self::Critical => "🔴 Critical levels detected",
            Self::SensorError => "⚪ Sensor reading error",
        }
    }
}

/// Per-metric tallies. The `do` metric tracks dissolved-oxygen concentration.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct MetricCounts {
    pub ph: u64,
    #[serde(rename = "do")]
    pub dissolved_oxygen: u64,
}

/// Cumulative success/error counters for the lifetime of the agent.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Counters {
    pub readings: MetricCounts,
    pub errors: MetricCounts,
}

impl Counters {
    /// Count each metric of `reading` as exactly one success or one error.
    pub fn record(&mut self, reading: &SensorReading) {
        tally(&mut self.readings.ph, &mut self.errors.ph, reading.ph);
        tally(
            &mut self.readings.dissolved_oxygen,
            &mut self.errors.dissolved_oxygen,
            reading.do_conc,
        );
    }
}

fn tally(ok: &mut u64, failed: &mut u64, value: Option<f64>) {
    if value.is_some() {
        *ok += 1;
    } else {
        *failed += 1;
    }
}

/// Everything sent to the transports for one cycle. Replaced wholesale,
/// never edited in place.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TelemetrySnapshot {
    pub ph: Option<f64>,
    pub do_conc: Option<f64>,
    pub do_sat: Option<f64>,
    pub temp: Option<f64>,
    pub timestamp: String,
    pub status: StatusLevel,
    pub readings_count: MetricCounts,
    pub errors_count: MetricCounts,
    pub simulation_cycle: u64,
    pub wifi_status: LinkState,
}

impl TelemetrySnapshot {
    /// Placeholder published before the first cycle completes.
    pub fn initial() -> Self {
        Self {
            ph: None,
            do_conc: None,
            do_sat: None,
            temp: None,
            timestamp: "--:--:--".into(),
            status: StatusLevel::SensorError,
            readings_count: MetricCounts::default(),
            errors_count: MetricCounts::default(),
            simulation_cycle: 0,
            wifi_status: LinkState::Disconnected,
        }
    }

    pub fn from_reading(
        reading: &SensorReading,
        counters: &Counters,
        cycle: u64,
        uptime: Duration,
        wifi_status: LinkState,
    ) -> Self {
        Self {
            ph: reading.ph,
            do_conc: reading.do_conc,
            do_sat: reading.do_sat,
            temp: reading.temp,
            timestamp: format_uptime(uptime),
            status: reading.status(),
            readings_count: counters.readings,
            errors_count: counters.errors,
            simulation_cycle: cycle,
            wifi_status,
        }
    }

    /// Encode as a single newline-terminated JSON line.
    pub fn to_line(&self) -> Result<Bytes, serde_json::Error> {
        let mut line = serde_json::to_vec(self)?;
        line.push(b'\n');
        Ok(Bytes::from(line))
    }
}

/// Format an uptime as `HH:MM:SS`. Hours keep counting past 99.
pub fn format_uptime(uptime: Duration) -> String {
    let secs = uptime.as_secs();
    format!("{:02}:{:02}:{:02}", secs / 3600, (secs / 60) % 60, secs % 60)
}
