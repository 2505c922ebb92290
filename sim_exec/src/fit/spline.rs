//! # Cubic spline curve fitter
//!
//! The default [`CurveFitter`] implementation. Two natural cubic splines are
//! fitted over the cumulative chord length of the waypoint sequence, one for
//! each coordinate, and then sampled at the requested arc-length interval.
//! Heading and curvature at each sample come from the spline derivatives.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use nalgebra::{DMatrix, DVector};

// Internal
use super::{CurveFitter, FitError, FittedPath};
use crate::traj::MIN_WAYPOINTS;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Natural cubic spline curve fitter.
#[derive(Debug, Clone, Copy, Default)]
pub struct CubicSplineFitter;

/// A single-coordinate natural cubic spline over knot positions `t`.
///
/// Within segment `i` the spline evaluates as
/// `a[i] + b[i]*ds + c[i]*ds^2 + d[i]*ds^3` with `ds = t - t[i]`.
struct Spline1d {
    t: Vec<f64>,
    a: Vec<f64>,
    b: Vec<f64>,
    c: Vec<f64>,
    d: Vec<f64>,
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl CurveFitter for CubicSplineFitter {
    fn fit(&self, x_m: &[f64], y_m: &[f64], spacing_m: f64) -> Result<FittedPath, FitError> {
        if !(spacing_m > 0.0) || !spacing_m.is_finite() {
            return Err(FitError::NonPositiveSpacing {
                spacing_m,
            });
        }

        let count = x_m.len().min(y_m.len());
        if count < MIN_WAYPOINTS {
            return Err(FitError::TooFewPoints { count });
        }

        for i in 0..count {
            if !x_m[i].is_finite() || !y_m[i].is_finite() {
                return Err(FitError::NonFinitePoint { index: i });
            }
        }

        // Knot positions are the cumulative chord lengths. A zero-length
        // chord makes the spline system singular, so coincident consecutive
        // waypoints are rejected up front.
        let mut knots_m = Vec::with_capacity(count);
        knots_m.push(0.0);
        for i in 1..count {
            let chord_m = ((x_m[i] - x_m[i - 1]).powi(2) + (y_m[i] - y_m[i - 1]).powi(2)).sqrt();

            if chord_m <= std::f64::EPSILON {
                return Err(FitError::CoincidentPoints { index: i });
            }

            knots_m.push(knots_m[i - 1] + chord_m);
        }

        let spline_x = Spline1d::new(&knots_m, &x_m[..count])?;
        let spline_y = Spline1d::new(&knots_m, &y_m[..count])?;

        // Sample every spacing_m metres along the curve, stopping short of
        // the total length
        let total_m = *knots_m.last().unwrap();
        let num_samples = (total_m / spacing_m).ceil() as usize;

        let mut path = FittedPath::default();
        for i in 0..num_samples {
            let s_m = i as f64 * spacing_m;
            if s_m >= total_m {
                break;
            }

            let dx = spline_x.deriv1(s_m);
            let dy = spline_y.deriv1(s_m);
            let ddx = spline_x.deriv2(s_m);
            let ddy = spline_y.deriv2(s_m);

            path.x_m.push(spline_x.value(s_m));
            path.y_m.push(spline_y.value(s_m));
            path.heading_rad.push(dy.atan2(dx));
            path.curv_m
                .push((ddy * dx - ddx * dy) / (dx * dx + dy * dy).powf(1.5));
            path.dist_m.push(s_m);
        }

        Ok(path)
    }
}

impl Spline1d {
    /// Fit a natural cubic spline through `(t[i], y[i])`.
    ///
    /// The knots must be strictly increasing, which the fitter guarantees by
    /// rejecting coincident waypoints.
    fn new(t: &[f64], y: &[f64]) -> Result<Self, FitError> {
        let n = t.len();
        let h: Vec<f64> = t.windows(2).map(|w| w[1] - w[0]).collect();

        // Second-derivative coefficients come from the tridiagonal natural
        // spline system, with the free-end conditions pinning c[0] and
        // c[n-1] to zero
        let mut a_mat = DMatrix::<f64>::zeros(n, n);
        let mut b_vec = DVector::<f64>::zeros(n);

        a_mat[(0, 0)] = 1.0;
        a_mat[(n - 1, n - 1)] = 1.0;
        for i in 1..n - 1 {
            a_mat[(i, i - 1)] = h[i - 1];
            a_mat[(i, i)] = 2.0 * (h[i - 1] + h[i]);
            a_mat[(i, i + 1)] = h[i];
            b_vec[i] = 3.0 * ((y[i + 1] - y[i]) / h[i] - (y[i] - y[i - 1]) / h[i - 1]);
        }

        let c = match a_mat.lu().solve(&b_vec) {
            Some(c) => c,
            None => return Err(FitError::SingularSystem),
        };

        let mut b = vec![0.0; n - 1];
        let mut d = vec![0.0; n - 1];
        for i in 0..n - 1 {
            b[i] = (y[i + 1] - y[i]) / h[i] - h[i] * (2.0 * c[i] + c[i + 1]) / 3.0;
            d[i] = (c[i + 1] - c[i]) / (3.0 * h[i]);
        }

        Ok(Self {
            t: t.to_vec(),
            a: y.to_vec(),
            b,
            c: c.iter().copied().collect(),
            d,
        })
    }

    /// Index of the segment containing position `s`.
    fn segment(&self, s: f64) -> usize {
        // Last knot at or before s, clamped into the valid segment range
        match self.t.iter().rposition(|&knot| knot <= s) {
            Some(i) => i.min(self.t.len() - 2),
            None => 0,
        }
    }

    fn value(&self, s: f64) -> f64 {
        let i = self.segment(s);
        let ds = s - self.t[i];
        self.a[i] + self.b[i] * ds + self.c[i] * ds.powi(2) + self.d[i] * ds.powi(3)
    }

    fn deriv1(&self, s: f64) -> f64 {
        let i = self.segment(s);
        let ds = s - self.t[i];
        self.b[i] + 2.0 * self.c[i] * ds + 3.0 * self.d[i] * ds.powi(2)
    }

    fn deriv2(&self, s: f64) -> f64 {
        let i = self.segment(s);
        let ds = s - self.t[i];
        2.0 * self.c[i] + 6.0 * self.d[i] * ds
    }
}

// ---------------------------------------------------------------------------
// TESTS
// ---------------------------------------------------------------------------

#[cfg(test)]
mod test {
    use super::*;

    fn slalom() -> (Vec<f64>, Vec<f64>) {
        (
            vec![0.0, 20.0, 40.0, 60.0, 80.0, 100.0],
            vec![0.0, 10.0, -10.0, 10.0, -10.0, 0.0],
        )
    }

    /// Cumulative chord length of a waypoint polyline
    fn chord_length(x: &[f64], y: &[f64]) -> f64 {
        x.windows(2)
            .zip(y.windows(2))
            .map(|(xs, ys)| ((xs[1] - xs[0]).powi(2) + (ys[1] - ys[0]).powi(2)).sqrt())
            .sum()
    }

    #[test]
    fn test_interpolates_waypoints() {
        let x = vec![0.0, 10.0, 20.0, 30.0];
        let y = vec![0.0, 5.0, 0.0, -5.0];
        let fitter = CubicSplineFitter;

        let path = fitter.fit(&x, &y, 0.1).unwrap();

        // The first sample sits exactly on the first waypoint
        assert!((path.x_m[0] - x[0]).abs() < 1e-9);
        assert!((path.y_m[0] - y[0]).abs() < 1e-9);

        // All samples stay finite, with distances spaced by the sampling
        // interval
        for i in 0..path.num_samples() {
            assert!(path.x_m[i].is_finite());
            assert!(path.y_m[i].is_finite());
            assert!(path.heading_rad[i].is_finite());
            assert!(path.curv_m[i].is_finite());
            assert!((path.dist_m[i] - i as f64 * 0.1).abs() < 1e-9);
        }
    }

    #[test]
    fn test_sample_count_tracks_chord_length() {
        let (x, y) = slalom();
        let fitter = CubicSplineFitter;

        let path = fitter.fit(&x, &y, 1.0).unwrap();

        // Sample count times spacing approximates the polyline length (the
        // spline is a little longer than the chords, never shorter by much)
        let chord_m = chord_length(&x, &y);
        let sampled_m = path.num_samples() as f64 * 1.0;
        assert!(
            sampled_m >= chord_m * 0.95 && sampled_m <= chord_m * 1.25,
            "sampled {} m against {} m of chords",
            sampled_m,
            chord_m
        );
    }

    #[test]
    fn test_halving_spacing_doubles_samples() {
        let (x, y) = slalom();
        let fitter = CubicSplineFitter;

        let coarse = fitter.fit(&x, &y, 1.0).unwrap();
        let fine = fitter.fit(&x, &y, 0.5).unwrap();

        let ratio = fine.num_samples() as f64 / coarse.num_samples() as f64;
        assert!(
            (ratio - 2.0).abs() <= 0.02,
            "expected ratio near 2, got {}",
            ratio
        );
    }

    #[test]
    fn test_straight_line_heading_and_curvature() {
        // Colinear points along y = x
        let x = vec![0.0, 1.0, 2.0, 3.0];
        let y = vec![0.0, 1.0, 2.0, 3.0];
        let fitter = CubicSplineFitter;

        let path = fitter.fit(&x, &y, 0.5).unwrap();

        for i in 0..path.num_samples() {
            assert!((path.heading_rad[i] - std::f64::consts::FRAC_PI_4).abs() < 1e-6);
            assert!(path.curv_m[i].abs() < 1e-6);
        }
    }

    #[test]
    fn test_degenerate_inputs_rejected() {
        let fitter = CubicSplineFitter;
        let (x, y) = slalom();

        assert!(matches!(
            fitter.fit(&[0.0, 1.0], &[0.0, 1.0], 1.0),
            Err(FitError::TooFewPoints { count: 2 })
        ));

        assert!(matches!(
            fitter.fit(&x, &y, 0.0),
            Err(FitError::NonPositiveSpacing { .. })
        ));

        assert!(matches!(
            fitter.fit(&x, &y, -1.0),
            Err(FitError::NonPositiveSpacing { .. })
        ));

        // Coincident consecutive points
        assert!(matches!(
            fitter.fit(&[0.0, 1.0, 1.0, 2.0], &[0.0, 0.0, 0.0, 0.0], 0.5),
            Err(FitError::CoincidentPoints { index: 2 })
        ));

        // Non-finite coordinate
        assert!(matches!(
            fitter.fit(&[0.0, 1.0, f64::NAN], &[0.0, 1.0, 2.0], 0.5),
            Err(FitError::NonFinitePoint { index: 2 })
        ));
    }
}
