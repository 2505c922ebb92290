//! # Reference path builder
//!
//! The builder turns a finalized waypoint snapshot into a dense, arc-length
//! sampled [`ReferencePath`] by driving the curve-fitting and heading
//! smoothing collaborators. A reference path is always rebuilt whole, never
//! patched in place.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use serde::{Deserialize, Serialize};

// Internal
use super::path_def::Waypoint;
use crate::fit::{CubicSplineFitter, CurveFitter, FitError, HeadingSmoother, YawUnwrapSmoother};

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// A dense reference path, ready for speed profiling and tracking.
///
/// All sequences have equal length and are indexed by sample number, with
/// samples spaced `dl_m` metres apart in arc length.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReferencePath {
    /// Sample x positions
    pub x_m: Vec<f64>,

    /// Sample y positions
    pub y_m: Vec<f64>,

    /// Sample headings, smoothed to be free of wrap-around jumps
    pub heading_rad: Vec<f64>,

    /// Sample curvatures
    pub curv_m: Vec<f64>,

    /// The arc-length interval between samples
    pub dl_m: f64,
}

/// Builds reference paths from waypoint snapshots.
pub struct ReferencePathBuilder {
    fitter: Box<dyn CurveFitter>,
    smoother: Box<dyn HeadingSmoother>,
}

// -----------------------------------------------------------------------------------------------
// ENUMS
// -----------------------------------------------------------------------------------------------

#[derive(Debug, Clone, thiserror::Error)]
pub enum PathFitError {
    /// The curve fitting collaborator rejected the waypoints, carrying the
    /// underlying cause.
    #[error("Curve fitting failed: {0}")]
    FitFailed(#[from] FitError),
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl ReferencePath {
    /// Number of samples in the path.
    pub fn num_samples(&self) -> usize {
        self.x_m.len()
    }

    /// Total arc length covered by the path.
    pub fn length_m(&self) -> f64 {
        self.num_samples() as f64 * self.dl_m
    }
}

impl ReferencePathBuilder {
    /// Create a builder using the given collaborators.
    pub fn new(fitter: Box<dyn CurveFitter>, smoother: Box<dyn HeadingSmoother>) -> Self {
        Self { fitter, smoother }
    }

    /// Build a reference path through the given waypoints, sampled every
    /// `dl_m` metres.
    ///
    /// If `reversed_return_leg` is set the fitted heading is rotated by a
    /// half turn at and after the midpoint sample, marking the second half
    /// of an out-and-back course as driven in reverse. Only the heading is
    /// touched, position and curvature keep their fitted values.
    pub fn build(
        &self,
        waypoints: &[Waypoint],
        dl_m: f64,
        reversed_return_leg: bool,
    ) -> Result<ReferencePath, PathFitError> {
        let x_m: Vec<f64> = waypoints.iter().map(|p| p[0]).collect();
        let y_m: Vec<f64> = waypoints.iter().map(|p| p[1]).collect();

        let fitted = self.fitter.fit(&x_m, &y_m, dl_m)?;

        let mut heading_rad = fitted.heading_rad;
        if reversed_return_leg {
            let midpoint = heading_rad.len() / 2;
            for heading in heading_rad[midpoint..].iter_mut() {
                *heading -= std::f64::consts::PI;
            }
        }

        let heading_rad = self.smoother.smooth(&heading_rad);

        Ok(ReferencePath {
            x_m: fitted.x_m,
            y_m: fitted.y_m,
            heading_rad,
            curv_m: fitted.curv_m,
            dl_m,
        })
    }
}

impl Default for ReferencePathBuilder {
    fn default() -> Self {
        Self::new(
            Box::new(CubicSplineFitter::default()),
            Box::new(YawUnwrapSmoother::default()),
        )
    }
}

// ---------------------------------------------------------------------------
// TESTS
// ---------------------------------------------------------------------------

#[cfg(test)]
mod test {
    use super::*;
    use crate::traj::TrajFamily;

    const PI: f64 = std::f64::consts::PI;

    #[test]
    fn test_build_slalom() {
        let builder = ReferencePathBuilder::default();
        let waypoints = TrajFamily::Slalom.waypoints();

        let path = builder.build(&waypoints, 1.0, false).unwrap();

        // Equal length sequences, with roughly one sample per metre of the
        // ~130 m slalom polyline
        let n = path.num_samples();
        assert_eq!(path.y_m.len(), n);
        assert_eq!(path.heading_rad.len(), n);
        assert_eq!(path.curv_m.len(), n);
        assert!(n >= 100 && n <= 150, "unexpected sample count {}", n);

        // Smoothed heading has no wrap jumps
        for w in path.heading_rad.windows(2) {
            assert!((w[1] - w[0]).abs() < PI / 2.0);
        }
    }

    #[test]
    fn test_spacing_guard() {
        let builder = ReferencePathBuilder::default();
        let waypoints = TrajFamily::Slalom.waypoints();

        assert!(matches!(
            builder.build(&waypoints, 0.0, false),
            Err(PathFitError::FitFailed(FitError::NonPositiveSpacing { .. }))
        ));
    }

    #[test]
    fn test_reversed_return_leg_rotates_heading_only() {
        let builder = ReferencePathBuilder::default();
        let waypoints = TrajFamily::Switchback.waypoints();

        let forward = builder.build(&waypoints, 0.5, false).unwrap();
        let reversed = builder.build(&waypoints, 0.5, true).unwrap();

        let n = forward.num_samples();
        assert_eq!(reversed.num_samples(), n);
        let midpoint = n / 2;

        // Position and curvature identical in both builds
        for i in 0..n {
            assert_eq!(forward.x_m[i], reversed.x_m[i]);
            assert_eq!(forward.y_m[i], reversed.y_m[i]);
            assert_eq!(forward.curv_m[i], reversed.curv_m[i]);
        }

        // Before the midpoint the headings agree, from the midpoint onwards
        // they differ by a half turn (modulo full turns introduced by the
        // smoother)
        for i in 0..n {
            let diff = (forward.heading_rad[i] - reversed.heading_rad[i]).abs();
            let wrapped = diff % (2.0 * PI);
            if i < midpoint {
                assert!(
                    wrapped < 1e-9 || (wrapped - 2.0 * PI).abs() < 1e-9,
                    "sample {} unexpectedly rotated",
                    i
                );
            } else {
                assert!(
                    (wrapped - PI).abs() < 1e-9,
                    "sample {} not rotated by a half turn",
                    i
                );
            }
        }
    }
}
