//! # Tracking control module
//!
//! This module defines the closed-loop controller/simulator seam consumed by
//! the simulation manager, plus the default implementation: a pair of PID
//! controllers (lateral and heading error) producing a curvature demand,
//! converted to a steering command for a kinematic bicycle model.
//!
//! The controller runs the whole closed loop itself: at each time step it
//! computes steering and acceleration commands, integrates the vehicle
//! state, and appends a sample to the returned time series. A cancellation
//! token is checked every step so an operator abort takes effect promptly
//! without forced termination.

// ---------------------------------------------------------------------------
// MODULES
// ---------------------------------------------------------------------------

pub mod bicycle;
pub mod params;
pub mod pid;
pub mod tracker;

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use serde::{Deserialize, Serialize};
use std::sync::atomic::AtomicBool;

// Internal
pub use bicycle::VehicleState;
pub use params::TrackerParams;
pub use pid::PidController;
pub use tracker::PidTracker;

use crate::param_store::{ControllerParameters, VehicleConstraints};
use crate::traj::ReferencePath;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Everything a controller needs to execute one closed-loop run.
///
/// The input is an owned snapshot: the simulation manager builds it at run
/// start, so later parameter or path edits cannot reach an in-flight run.
#[derive(Debug, Clone)]
pub struct RunInput {
    /// The reference path to follow
    pub path: ReferencePath,

    /// Target speed per path sample
    pub speed_profile: Vec<f64>,

    /// The vehicle state at the start of the run
    pub initial_state: VehicleState,

    /// Controller tuning, snapshotted at parameter application
    pub ctrl: ControllerParameters,

    /// Vehicle limits, snapshotted at parameter application
    pub constraints: VehicleConstraints,
}

/// The state and command history of a run, one entry per time step.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TimeSeries {
    pub time_s: Vec<f64>,
    pub x_m: Vec<f64>,
    pub y_m: Vec<f64>,
    pub heading_rad: Vec<f64>,
    pub speed_ms: Vec<f64>,
    pub steer_rad: Vec<f64>,
    pub accel_mss: Vec<f64>,
}

/// One row of a [`TimeSeries`], used for CSV archiving.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct TimeSeriesRecord {
    pub time_s: f64,
    pub x_m: f64,
    pub y_m: f64,
    pub heading_rad: f64,
    pub speed_ms: f64,
    pub steer_rad: f64,
    pub accel_mss: f64,
}

// -----------------------------------------------------------------------------------------------
// ENUMS
// -----------------------------------------------------------------------------------------------

/// How a controller run ended, short of an error.
#[derive(Debug, Clone)]
pub enum RunOutcome {
    /// The run terminated normally with the collected history.
    Finished(TimeSeries),

    /// The run was cancelled by the operator. Partial history is discarded.
    Cancelled,
}

/// Errors raised by a controller during a run.
#[derive(Debug, Clone, thiserror::Error)]
pub enum ControllerError {
    #[error("Vehicle state diverged at t = {time_s:.2} s")]
    Diverged { time_s: f64 },

    #[error("Reference path has too few samples ({count})")]
    PathTooShort { count: usize },

    #[error("Reference path and speed profile lengths differ ({path} vs {profile})")]
    LengthMismatch { path: usize, profile: usize },

    /// The controller stopped without reporting a result, for instance by
    /// panicking inside a collaborator.
    #[error("The controller terminated without reporting a result")]
    Aborted,
}

// ---------------------------------------------------------------------------
// TRAITS
// ---------------------------------------------------------------------------

/// A collaborator which runs the closed-loop controller/simulator.
///
/// Implementations must observe the cancellation token at least once per
/// control step, and must not panic on solver trouble: divergence is
/// reported through [`ControllerError`].
pub trait TrackingController: Send + Sync {
    fn run(&self, input: &RunInput, cancel: &AtomicBool)
        -> Result<RunOutcome, ControllerError>;
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl TimeSeries {
    /// Append one sample.
    pub fn push(
        &mut self,
        time_s: f64,
        state: &VehicleState,
        steer_rad: f64,
        accel_mss: f64,
    ) {
        self.time_s.push(time_s);
        self.x_m.push(state.x_m);
        self.y_m.push(state.y_m);
        self.heading_rad.push(state.heading_rad);
        self.speed_ms.push(state.speed_ms);
        self.steer_rad.push(steer_rad);
        self.accel_mss.push(accel_mss);
    }

    /// Number of samples in the series.
    pub fn len(&self) -> usize {
        self.time_s.len()
    }

    pub fn is_empty(&self) -> bool {
        self.time_s.is_empty()
    }

    /// Iterate the series row by row, for CSV archiving.
    pub fn records(&self) -> impl Iterator<Item = TimeSeriesRecord> + '_ {
        (0..self.len()).map(move |i| TimeSeriesRecord {
            time_s: self.time_s[i],
            x_m: self.x_m[i],
            y_m: self.y_m[i],
            heading_rad: self.heading_rad[i],
            speed_ms: self.speed_ms[i],
            steer_rad: self.steer_rad[i],
            accel_mss: self.accel_mss[i],
        })
    }
}
