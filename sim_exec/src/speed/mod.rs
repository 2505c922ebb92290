//! # Speed profiling module
//!
//! A speed profile assigns a target speed to every reference path sample.
//! The default profiler drives at the requested speed, flips the sign on
//! legs where the path heading opposes the direction of travel (reverse
//! driving), and demands a full stop at the final sample.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// Internal
use util::maths::wrap_to_pi;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Default [`SpeedProfiler`].
#[derive(Debug, Clone, Copy, Default)]
pub struct DirectionAwareProfiler;

// ---------------------------------------------------------------------------
// TRAITS
// ---------------------------------------------------------------------------

/// A collaborator which assigns a target speed to each path sample.
pub trait SpeedProfiler {
    /// Compute the profile. The output has the same length as the path.
    fn profile(
        &self,
        x_m: &[f64],
        y_m: &[f64],
        heading_rad: &[f64],
        target_speed_ms: f64,
    ) -> Vec<f64>;
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl SpeedProfiler for DirectionAwareProfiler {
    fn profile(
        &self,
        x_m: &[f64],
        y_m: &[f64],
        heading_rad: &[f64],
        target_speed_ms: f64,
    ) -> Vec<f64> {
        let n = x_m.len();
        let mut profile = vec![target_speed_ms; n];

        let mut direction = 1.0;
        for i in 0..n.saturating_sub(1) {
            let dx = x_m[i + 1] - x_m[i];
            let dy = y_m[i + 1] - y_m[i];

            // The travel direction only flips where the sample-to-sample
            // motion opposes the path heading by more than a quarter turn
            if dx != 0.0 && dy != 0.0 {
                let motion_rad = dy.atan2(dx);
                let dangle = wrap_to_pi(motion_rad - heading_rad[i]).abs();

                direction = if dangle >= std::f64::consts::FRAC_PI_4 {
                    -1.0
                } else {
                    1.0
                };
            }

            profile[i] = direction * target_speed_ms;
        }

        // Always come to rest at the end of the path
        if let Some(last) = profile.last_mut() {
            *last = 0.0;
        }

        profile
    }
}

// ---------------------------------------------------------------------------
// TESTS
// ---------------------------------------------------------------------------

#[cfg(test)]
mod test {
    use super::*;

    const PI: f64 = std::f64::consts::PI;

    #[test]
    fn test_forward_path() {
        let profiler = DirectionAwareProfiler;

        // Straight line along +x with a slight slope so dy is non-zero
        let x: Vec<f64> = (0..10).map(|i| i as f64).collect();
        let y: Vec<f64> = (0..10).map(|i| i as f64 * 0.01).collect();
        let heading = vec![0.01f64.atan2(1.0); 10];

        let profile = profiler.profile(&x, &y, &heading, 2.0);

        assert_eq!(profile.len(), 10);
        for v in profile[..9].iter() {
            assert!((v - 2.0).abs() < 1e-12);
        }
        assert_eq!(profile[9], 0.0);
    }

    #[test]
    fn test_reverse_leg_negated() {
        let profiler = DirectionAwareProfiler;

        // Motion towards -x. With the heading also pointing towards -x the
        // leg is forward, with the heading pointing towards +x (as produced
        // by the reversed-return-leg rotation) it is a reverse leg.
        let x: Vec<f64> = (0..5).map(|i| -(i as f64)).collect();
        let y: Vec<f64> = (0..5).map(|i| -(i as f64) * 0.01).collect();

        let profile_fwd = profiler.profile(&x, &y, &vec![PI + 0.01; 5], 2.0);
        let profile_rev = profiler.profile(&x, &y, &vec![0.0; 5], 2.0);

        for v in profile_fwd[..4].iter() {
            assert!(*v > 0.0);
        }
        for v in profile_rev[..4].iter() {
            assert!(*v < 0.0);
        }
    }

    #[test]
    fn test_terminal_sample_is_zero() {
        let profiler = DirectionAwareProfiler;
        let x = vec![0.0, 1.0, 2.0];
        let y = vec![0.0, 0.1, 0.2];
        let heading = vec![0.1, 0.1, 0.1];

        let profile = profiler.profile(&x, &y, &heading, 5.0);
        assert_eq!(*profile.last().unwrap(), 0.0);
    }
}
