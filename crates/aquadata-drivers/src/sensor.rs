//! Simulated water-quality probe.

use aquadata_core::{SensorReading, SensorSource};

/// Default probability that a metric group fails to read.
pub const DEFAULT_FAILURE_RATE: f64 = 0.05;

/// pH, temperature and dissolved oxygen drawn around typical pond values,
/// with occasional read failures.
///
/// pH fails on its own; DO concentration and temperature share a probe
/// and fail together. Saturation is derived, so it is absent whenever
/// either of its inputs is.
pub struct SimulatedSensor {
    rng: fastrand::Rng,
    failure_rate: f64,
}

impl SimulatedSensor {
    pub fn new(failure_rate: f64, seed: Option<u64>) -> Self {
        let rng = seed.map_or_else(fastrand::Rng::new, fastrand::Rng::with_seed);
        Self {
            rng,
            failure_rate: failure_rate.clamp(0.0, 1.0),
        }
    }

    /// Uniform noise in `[-span/2, span/2)`.
    fn jitter(&mut self, span: f64) -> f64 {
        span * (self.rng.f64() - 0.5)
    }

    fn fails(&mut self) -> bool {
        self.rng.f64() < self.failure_rate
    }
}

impl Default for SimulatedSensor {
    fn default() -> Self {
        Self::new(DEFAULT_FAILURE_RATE, None)
    }
}

fn round_to(value: f64, places: i32) -> f64 {
    let scale = 10_f64.powi(places);
    (value * scale).round() / scale
}

/// DO saturation in percent, from concentration and water temperature.
pub fn saturation(do_conc: f64, temp: f64) -> Option<f64> {
    let theoretical_max = 10.5 - (temp - 20.0) * 0.3;
    (theoretical_max > 0.0).then(|| round_to(do_conc / theoretical_max * 100.0, 1))
}

impl SensorSource for SimulatedSensor {
    fn read(&mut self) -> SensorReading {
        let ph = round_to(7.2 + self.jitter(1.5), 2);
        let temp = round_to(22.5 + self.jitter(5.0), 1);
        let do_conc = round_to(10.0 - (temp - 20.0) * 0.4 + self.jitter(2.0), 1);

        let ph = (!self.fails()).then_some(ph);
        let (do_conc, temp) = if self.fails() {
            (None, None)
        } else {
            (Some(do_conc), Some(temp))
        };
        let do_sat = do_conc.zip(temp).and_then(|(c, t)| saturation(c, t));

        SensorReading {
            ph,
            do_conc,
            do_sat,
            temp,
        }
    }
}
