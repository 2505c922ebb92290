//! # Simulation run record
//!
//! A [`SimulationRun`] captures everything about a completed run: the wall
//! and simulated clocks, the full state/command history, and the derived
//! summary statistics. It is created once by the simulation manager at run
//! completion and never mutated afterwards. Starting a new run discards the
//! previous record along with its history.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use serde::Serialize;

// Internal
use crate::ctrl::TimeSeries;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// The record of one completed simulation run.
#[derive(Debug, Clone, Serialize)]
pub struct SimulationRun {
    /// Wall-clock time the run took to execute
    pub wall_time_s: f64,

    /// Simulated time covered by the run
    pub sim_duration_s: f64,

    /// The full state and command history
    pub series: TimeSeries,

    /// Mean of the absolute vehicle speed over the run
    pub avg_speed_ms: f64,

    /// Largest absolute steering command of the run
    pub peak_steer_rad: f64,
}

/// Summary of a run without the bulky time series, for JSON artefacts and
/// operator logs.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct RunSummary {
    pub wall_time_s: f64,
    pub sim_duration_s: f64,
    pub num_steps: usize,
    pub avg_speed_ms: f64,
    pub avg_speed_kmh: f64,
    pub peak_steer_rad: f64,
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl SimulationRun {
    /// Build the run record from a finished time series.
    pub fn from_series(series: TimeSeries, wall_time_s: f64) -> Self {
        let sim_duration_s = series.time_s.last().copied().unwrap_or(0.0);

        let avg_speed_ms = if series.is_empty() {
            0.0
        } else {
            series.speed_ms.iter().map(|v| v.abs()).sum::<f64>() / series.len() as f64
        };

        let peak_steer_rad = series
            .steer_rad
            .iter()
            .map(|d| d.abs())
            .fold(0.0, f64::max);

        Self {
            wall_time_s,
            sim_duration_s,
            series,
            avg_speed_ms,
            peak_steer_rad,
        }
    }

    pub fn summary(&self) -> RunSummary {
        RunSummary {
            wall_time_s: self.wall_time_s,
            sim_duration_s: self.sim_duration_s,
            num_steps: self.series.len(),
            avg_speed_ms: self.avg_speed_ms,
            avg_speed_kmh: self.avg_speed_ms * 3.6,
            peak_steer_rad: self.peak_steer_rad,
        }
    }
}

// ---------------------------------------------------------------------------
// TESTS
// ---------------------------------------------------------------------------

#[cfg(test)]
mod test {
    use super::*;
    use crate::ctrl::VehicleState;

    #[test]
    fn test_summary_statistics() {
        let mut series = TimeSeries::default();
        for (i, (v, d)) in [(1.0, 0.1), (-2.0, -0.4), (3.0, 0.2)].iter().enumerate() {
            let state = VehicleState {
                x_m: i as f64,
                y_m: 0.0,
                heading_rad: 0.0,
                speed_ms: *v,
            };
            series.push(i as f64 * 0.5, &state, *d, 0.0);
        }

        let run = SimulationRun::from_series(series, 0.25);

        assert!((run.sim_duration_s - 1.0).abs() < 1e-12);
        assert!((run.avg_speed_ms - 2.0).abs() < 1e-12);
        assert!((run.peak_steer_rad - 0.4).abs() < 1e-12);
        assert_eq!(run.summary().num_steps, 3);
        assert!((run.summary().avg_speed_kmh - 7.2).abs() < 1e-9);
    }

    #[test]
    fn test_empty_series() {
        let run = SimulationRun::from_series(TimeSeries::default(), 0.0);
        assert_eq!(run.sim_duration_s, 0.0);
        assert_eq!(run.avg_speed_ms, 0.0);
        assert_eq!(run.peak_steer_rad, 0.0);
    }
}
