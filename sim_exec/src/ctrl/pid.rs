//! # PID controller
//!
//! A discrete PID controller over simulated time. The time step is passed in
//! explicitly by the caller, the controller never consults the wall clock.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use serde::Serialize;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// A PID controller
#[derive(Debug, Serialize, Clone)]
pub struct PidController {
    /// Proportional gain
    k_p: f64,

    /// Integral gain
    k_i: f64,

    /// Dervative gain
    k_d: f64,

    /// Previous error
    prev_error: Option<f64>,

    /// The integral accumulation
    integral: f64,
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl PidController {
    /// Create a new controller with the given gains.
    pub fn new(k_p: f64, k_i: f64, k_d: f64) -> Self {
        Self {
            k_p,
            k_i,
            k_d,
            integral: 0f64,
            prev_error: None,
        }
    }

    /// Get the value of the controller for the given error and time step.
    pub fn update(&mut self, error: f64, dt_s: f64) -> f64 {
        self.integral += error * dt_s;

        // On the first update there is no previous error, so no derivative.
        // The alternative of treating the full error as the step change
        // produces a large spike compared to normal operation, so we don't
        // do that.
        let deriv = match self.prev_error {
            Some(e) if dt_s > 0.0 => (error - e) / dt_s,
            _ => 0f64,
        };

        self.prev_error = Some(error);

        self.k_p * error + self.k_i * self.integral + self.k_d * deriv
    }

    /// Clear the accumulated state, keeping the gains.
    pub fn reset(&mut self) {
        self.integral = 0f64;
        self.prev_error = None;
    }
}

// ---------------------------------------------------------------------------
// TESTS
// ---------------------------------------------------------------------------

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_proportional_only() {
        let mut pid = PidController::new(2.0, 0.0, 0.0);

        assert!((pid.update(1.5, 0.1) - 3.0).abs() < 1e-12);
        assert!((pid.update(-0.5, 0.1) + 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_integral_accumulates() {
        let mut pid = PidController::new(0.0, 1.0, 0.0);

        pid.update(1.0, 0.5);
        let out = pid.update(1.0, 0.5);

        // Two half-second steps of unit error
        assert!((out - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_derivative_skips_first_update() {
        let mut pid = PidController::new(0.0, 0.0, 1.0);

        assert_eq!(pid.update(5.0, 0.1), 0.0);
        assert!((pid.update(6.0, 0.1) - 10.0).abs() < 1e-12);
    }

    #[test]
    fn test_reset_clears_state() {
        let mut pid = PidController::new(1.0, 1.0, 1.0);
        pid.update(3.0, 1.0);
        pid.reset();

        // Behaves like a fresh controller again
        assert!((pid.update(1.0, 1.0) - 2.0).abs() < 1e-12);
    }
}
