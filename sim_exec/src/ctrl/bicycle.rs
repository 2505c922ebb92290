//! # Kinematic bicycle model
//!
//! The simulated vehicle: a kinematic bicycle integrated with forward Euler.
//! Commands are saturated against the vehicle constraints before
//! integration, so the model can never exceed its physical limits no matter
//! what the controller demands.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use serde::{Deserialize, Serialize};

// Internal
use crate::param_store::VehicleConstraints;
use crate::traj::ReferencePath;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// The state of the simulated vehicle.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct VehicleState {
    pub x_m: f64,
    pub y_m: f64,
    pub heading_rad: f64,
    pub speed_ms: f64,
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl VehicleState {
    /// The initial state for a run: position and heading of the first path
    /// sample, at rest.
    pub fn at_path_start(path: &ReferencePath) -> Self {
        Self {
            x_m: path.x_m[0],
            y_m: path.y_m[0],
            heading_rad: path.heading_rad[0],
            speed_ms: 0.0,
        }
    }

    /// Advance the state by one time step under the given commands.
    ///
    /// Steering and acceleration are clamped to the constraint limits, and
    /// the resulting speed is clamped to the speed limit.
    pub fn step(
        &mut self,
        steer_rad: f64,
        accel_mss: f64,
        dt_s: f64,
        constraints: &VehicleConstraints,
    ) {
        let steer = steer_rad.clamp(-constraints.max_steer_rad, constraints.max_steer_rad);
        let accel = accel_mss.clamp(-constraints.max_accel_mss, constraints.max_accel_mss);

        self.x_m += self.speed_ms * self.heading_rad.cos() * dt_s;
        self.y_m += self.speed_ms * self.heading_rad.sin() * dt_s;
        self.heading_rad += self.speed_ms / constraints.wheelbase_m * steer.tan() * dt_s;
        self.speed_ms = (self.speed_ms + accel * dt_s)
            .clamp(-constraints.max_speed_ms, constraints.max_speed_ms);
    }

    /// True if every component of the state is finite.
    pub fn is_finite(&self) -> bool {
        self.x_m.is_finite()
            && self.y_m.is_finite()
            && self.heading_rad.is_finite()
            && self.speed_ms.is_finite()
    }
}

// ---------------------------------------------------------------------------
// TESTS
// ---------------------------------------------------------------------------

#[cfg(test)]
mod test {
    use super::*;

    fn constraints() -> VehicleConstraints {
        VehicleConstraints {
            max_steer_rad: 45f64.to_radians(),
            max_steer_rate_rads: 30f64.to_radians(),
            max_speed_ms: 20.0,
            max_accel_mss: 1.0,
            wheelbase_m: 2.5,
        }
    }

    #[test]
    fn test_straight_line() {
        let mut state = VehicleState {
            x_m: 0.0,
            y_m: 0.0,
            heading_rad: 0.0,
            speed_ms: 2.0,
        };

        for _ in 0..10 {
            state.step(0.0, 0.0, 0.1, &constraints());
        }

        assert!((state.x_m - 2.0).abs() < 1e-9);
        assert!(state.y_m.abs() < 1e-9);
        assert!((state.speed_ms - 2.0).abs() < 1e-9);
    }

    #[test]
    fn test_yaw_rate_matches_kinematics() {
        let c = constraints();
        let mut state = VehicleState {
            x_m: 0.0,
            y_m: 0.0,
            heading_rad: 0.0,
            speed_ms: 5.0,
        };

        let steer = 0.1;
        state.step(steer, 0.0, 0.2, &c);

        let expected = 5.0 / c.wheelbase_m * steer.tan() * 0.2;
        assert!((state.heading_rad - expected).abs() < 1e-12);
    }

    #[test]
    fn test_commands_saturated() {
        let c = constraints();
        let mut state = VehicleState {
            x_m: 0.0,
            y_m: 0.0,
            heading_rad: 0.0,
            speed_ms: 0.0,
        };

        // Far over both limits
        state.step(10.0, 100.0, 1.0, &c);

        assert!((state.speed_ms - c.max_accel_mss).abs() < 1e-12);

        // Heading advance corresponds to the clamped steering angle
        let mut reference = VehicleState {
            x_m: 0.0,
            y_m: 0.0,
            heading_rad: 0.0,
            speed_ms: 0.0,
        };
        reference.step(c.max_steer_rad, c.max_accel_mss, 1.0, &c);
        assert_eq!(state.heading_rad, reference.heading_rad);
    }

    #[test]
    fn test_speed_limited() {
        let c = constraints();
        let mut state = VehicleState {
            x_m: 0.0,
            y_m: 0.0,
            heading_rad: 0.0,
            speed_ms: c.max_speed_ms,
        };

        state.step(0.0, c.max_accel_mss, 1.0, &c);
        assert_eq!(state.speed_ms, c.max_speed_ms);
    }
}
