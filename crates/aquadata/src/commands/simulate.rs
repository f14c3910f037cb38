//! `aquadata simulate`: telemetry lines without any transport.

use std::io::Write;
use std::time::Duration;

use aquadata_core::{Counters, LinkState, SensorSource, TelemetrySnapshot};
use aquadata_drivers::SimulatedSensor;

use crate::cli::{GlobalOpts, SimulateArgs};
use crate::error::CliError;

/// Print one snapshot line per cycle. Timestamps advance by the configured
/// cycle interval, as they would on a running agent.
pub fn handle(args: &SimulateArgs, global: &GlobalOpts) -> Result<(), CliError> {
    let config = super::load(global)?;
    let seed = args.seed.or(config.simulation.seed);
    let mut sensor = SimulatedSensor::new(config.simulation.failure_rate, seed);
    let mut counters = Counters::default();

    let mut out = std::io::stdout().lock();
    for cycle in 1..=args.cycles {
        let reading = sensor.read();
        counters.record(&reading);

        let uptime = Duration::from_secs(config.timing.cycle_interval_secs.saturating_mul(cycle - 1));
        let snapshot = TelemetrySnapshot::from_reading(
            &reading,
            &counters,
            cycle,
            uptime,
            LinkState::Disconnected,
        );
        out.write_all(&snapshot.to_line()?)?;
    }
    out.flush()?;
    Ok(())
}
