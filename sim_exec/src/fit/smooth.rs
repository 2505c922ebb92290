//! # Heading smoothing
//!
//! Fitted headings come straight from `atan2` and therefore jump by a full
//! turn whenever the path crosses the +-pi boundary. The smoother unwraps
//! those jumps so the controller sees a continuous heading sequence.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// Internal
use util::maths::wrap_to_pi;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Default [`HeadingSmoother`], removes wrap-around discontinuities by
/// shifting each sample by whole turns until consecutive samples differ by
/// less than a half turn.
#[derive(Debug, Clone, Copy, Default)]
pub struct YawUnwrapSmoother;

// ---------------------------------------------------------------------------
// TRAITS
// ---------------------------------------------------------------------------

/// A collaborator which removes artificial discontinuities from a heading
/// sequence. The output always has the same length as the input.
pub trait HeadingSmoother {
    fn smooth(&self, heading_rad: &[f64]) -> Vec<f64>;
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl HeadingSmoother for YawUnwrapSmoother {
    fn smooth(&self, heading_rad: &[f64]) -> Vec<f64> {
        let mut smoothed = heading_rad.to_vec();

        for i in 0..smoothed.len().saturating_sub(1) {
            // Shift the next sample by whole turns until the step is small.
            // The wrapped step is the geometric change, everything beyond it
            // is wrap-around artefact.
            let step = smoothed[i + 1] - smoothed[i];
            let wrapped_step = wrap_to_pi(step);

            smoothed[i + 1] += wrapped_step - step;
        }

        smoothed
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
    fn test_length_preserved() {
        let smoother = YawUnwrapSmoother;
        assert_eq!(smoother.smooth(&[]).len(), 0);
        assert_eq!(smoother.smooth(&[1.0]).len(), 1);
        assert_eq!(smoother.smooth(&[0.0, 1.0, 2.0]).len(), 3);
    }

    #[test]
    fn test_continuous_input_unchanged() {
        let smoother = YawUnwrapSmoother;
        let heading = vec![0.0, 0.1, 0.2, 0.3];
        let smoothed = smoother.smooth(&heading);

        for (a, b) in heading.iter().zip(smoothed.iter()) {
            assert!((a - b).abs() < 1e-12);
        }
    }

    #[test]
    fn test_wrap_jump_removed() {
        let smoother = YawUnwrapSmoother;

        // A heading sweeping through the +-pi boundary: the raw atan2 values
        // jump by nearly a full turn between the second and third samples
        let heading = vec![PI - 0.2, PI - 0.1, -PI + 0.1, -PI + 0.2];
        let smoothed = smoother.smooth(&heading);

        for w in smoothed.windows(2) {
            assert!(
                (w[1] - w[0]).abs() < PI / 2.0,
                "step {} too large",
                w[1] - w[0]
            );
        }

        // The unwrapped sequence keeps increasing past pi
        assert!(smoothed[2] > smoothed[1]);
        assert!(smoothed[3] > smoothed[2]);
    }
}
