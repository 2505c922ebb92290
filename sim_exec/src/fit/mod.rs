//! # Curve fitting module
//!
//! This module defines the curve-fitting seam used by the reference path
//! builder, plus the default implementations: a natural cubic spline fitter
//! and a heading unwrap smoother.

// ---------------------------------------------------------------------------
// MODULES
// ---------------------------------------------------------------------------

pub mod smooth;
pub mod spline;

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use serde::{Deserialize, Serialize};

// Internal
pub use smooth::{HeadingSmoother, YawUnwrapSmoother};
pub use spline::CubicSplineFitter;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// The raw result of fitting a curve through a waypoint sequence.
///
/// All sequences have the same length and are indexed by sample number, with
/// samples spaced evenly in arc length.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FittedPath {
    /// Sample x positions
    pub x_m: Vec<f64>,

    /// Sample y positions
    pub y_m: Vec<f64>,

    /// Sample headings (angle to the +ve x axis)
    pub heading_rad: Vec<f64>,

    /// Sample curvatures
    pub curv_m: Vec<f64>,

    /// Distance along the curve of each sample
    pub dist_m: Vec<f64>,
}

// -----------------------------------------------------------------------------------------------
// ENUMS
// -----------------------------------------------------------------------------------------------

/// Errors raised by a curve fitter on degenerate input.
#[derive(Debug, Clone, thiserror::Error)]
pub enum FitError {
    #[error("At least 3 waypoints are required to fit a curve, got {count}")]
    TooFewPoints { count: usize },

    #[error("Waypoint {index} is not finite")]
    NonFinitePoint { index: usize },

    #[error("Waypoints {} and {} are coincident", .index - 1, .index)]
    CoincidentPoints { index: usize },

    #[error("Sample spacing must be positive, got {spacing_m}")]
    NonPositiveSpacing { spacing_m: f64 },

    #[error("The spline system is singular and cannot be solved")]
    SingularSystem,
}

// ---------------------------------------------------------------------------
// TRAITS
// ---------------------------------------------------------------------------

/// A collaborator which fits a dense curve through a sparse waypoint
/// sequence.
pub trait CurveFitter {
    /// Fit a curve through the given waypoint coordinates, sampled every
    /// `spacing_m` metres of arc length.
    fn fit(&self, x_m: &[f64], y_m: &[f64], spacing_m: f64) -> Result<FittedPath, FitError>;
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl FittedPath {
    /// Number of samples in the fitted path.
    pub fn num_samples(&self) -> usize {
        self.x_m.len()
    }
}
