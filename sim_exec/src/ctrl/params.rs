//! Tracking controller parameters

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use serde::Deserialize;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Parameters for the default PID tracking controller.
///
/// The base PID gains are scaled at run time by the operator's state cost
/// weights: the lateral gains by the mean of the x/y position weights, the
/// heading gains by the yaw weight, and the speed gain by the speed weight.
/// Raising a weight therefore tightens tracking of that state, loosely
/// mirroring how the weights act in a cost-based controller.
#[derive(Deserialize, Debug, Clone)]
#[serde(default)]
pub struct TrackerParams {
    /// Lateral controller proportional gain
    pub lat_k_p: f64,

    /// Lateral controller integral gain
    pub lat_k_i: f64,

    /// Lateral controller derivative gain
    pub lat_k_d: f64,

    /// Heading controller proportional gain
    pub head_k_p: f64,

    /// Heading controller integral gain
    pub head_k_i: f64,

    /// Heading controller derivative gain
    pub head_k_d: f64,

    /// Speed controller proportional gain
    pub speed_k_p: f64,

    /// Curvature demand saturation limit
    pub max_curv_dem_m: f64,

    /// Radius around the final path point at which the goal counts as
    /// reached, once the vehicle is slow enough
    pub goal_radius_m: f64,

    /// Speed below which the vehicle counts as stopped
    pub stop_speed_ms: f64,

    /// Ceiling on simulated time, runs longer than this are ended where
    /// they stand
    pub max_sim_time_s: f64,

    /// Number of samples ahead of the last match searched for the nearest
    /// path point
    pub nearest_search_len: usize,
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl Default for TrackerParams {
    fn default() -> Self {
        Self {
            lat_k_p: 0.3,
            lat_k_i: 0.0,
            lat_k_d: 0.0,
            head_k_p: 3.0,
            head_k_i: 0.0,
            head_k_d: 0.1,
            speed_k_p: 2.0,
            max_curv_dem_m: 0.5,
            goal_radius_m: 1.5,
            stop_speed_ms: 0.15,
            max_sim_time_s: 500.0,
            nearest_search_len: 10,
        }
    }
}
