//! # PID tracking controller
//!
//! The default [`TrackingController`]: lateral and heading errors to the
//! reference path are driven through a pair of PID controllers whose summed
//! output is a curvature demand, converted to a steering angle through the
//! wheelbase. Speed is regulated proportionally towards the profile value,
//! limited by a braking envelope so the vehicle can always stop by the end
//! of the path.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use log::{debug, warn};
use nalgebra::Vector2;
use std::sync::atomic::{AtomicBool, Ordering};

// Internal
use super::{
    ControllerError, PidController, RunInput, RunOutcome, TimeSeries, TrackerParams,
    TrackingController,
};
use util::maths::{norm, wrap_to_pi};

// ---------------------------------------------------------------------------
// CONSTANTS
// ---------------------------------------------------------------------------

/// The goal only counts as reached once the nearest path sample is within
/// this many samples of the end, so that paths which loop back on their
/// start point are not finished at the first step.
const GOAL_INDEX_MARGIN: usize = 5;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// The default PID tracking controller.
pub struct PidTracker {
    params: TrackerParams,
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl PidTracker {
    pub fn new(params: TrackerParams) -> Self {
        Self { params }
    }
}

impl Default for PidTracker {
    fn default() -> Self {
        Self::new(TrackerParams::default())
    }
}

impl TrackingController for PidTracker {
    fn run(
        &self,
        input: &RunInput,
        cancel: &AtomicBool,
    ) -> Result<RunOutcome, ControllerError> {
        let path = &input.path;
        let n = path.num_samples();

        if n < 2 {
            return Err(ControllerError::PathTooShort { count: n });
        }
        if input.speed_profile.len() != n {
            return Err(ControllerError::LengthMismatch {
                path: n,
                profile: input.speed_profile.len(),
            });
        }

        let p = &self.params;
        let ctrl = &input.ctrl;
        let constraints = &input.constraints;

        let dt_s = ctrl.time_step_s;
        let substeps = ctrl.max_iter.max(1);

        // The operator's state cost weights shape the effective gains
        let lat_scale = 0.5 * (ctrl.weight_x + ctrl.weight_y);
        let mut lat_pid = PidController::new(
            p.lat_k_p * lat_scale,
            p.lat_k_i * lat_scale,
            p.lat_k_d * lat_scale,
        );
        let mut head_pid = PidController::new(
            p.head_k_p * ctrl.weight_yaw,
            p.head_k_i * ctrl.weight_yaw,
            p.head_k_d * ctrl.weight_yaw,
        );
        let speed_gain = p.speed_k_p * ctrl.weight_speed;

        // The input rate weights act as first order smoothing on the
        // commands, on top of the hard rate limits
        let steer_alpha = 1.0 / (1.0 + ctrl.weight_steer_rate);
        let accel_alpha = 1.0 / (1.0 + ctrl.weight_accel_rate);

        let mut state = input.initial_state;
        let mut series = TimeSeries::default();
        series.push(0.0, &state, 0.0, 0.0);

        let mut nearest = 0usize;
        let mut prev_steer_rad = 0.0;
        let mut prev_accel_mss = 0.0;
        let mut time_s = 0.0;

        loop {
            // A cancellation must take effect promptly, so the token is
            // checked every control step
            if cancel.load(Ordering::Relaxed) {
                debug!("Tracking run cancelled at t = {:.2} s", time_s);
                return Ok(RunOutcome::Cancelled);
            }

            if time_s >= p.max_sim_time_s {
                warn!(
                    "Simulated time ceiling ({} s) reached before the goal",
                    p.max_sim_time_s
                );
                break;
            }

            let pos = Vector2::new(state.x_m, state.y_m);

            // Advance the nearest sample match. The search window only looks
            // forward so the match cannot jump backwards on self-crossing
            // paths.
            let window_end = (nearest + p.nearest_search_len).min(n - 1);
            for i in nearest..=window_end {
                let d = (Vector2::new(path.x_m[i], path.y_m[i]) - pos).norm();
                let d_near = (Vector2::new(path.x_m[nearest], path.y_m[nearest]) - pos).norm();
                if d < d_near {
                    nearest = i;
                }
            }

            // Goal condition: near the final point, near the end of the
            // sample sequence, and stopped.
            //
            // The unwrap is safe since both points are two dimensional.
            let goal_dist_m = norm(
                &[state.x_m, state.y_m],
                &[path.x_m[n - 1], path.y_m[n - 1]],
            )
            .unwrap();

            if goal_dist_m <= p.goal_radius_m
                && nearest + GOAL_INDEX_MARGIN >= n
                && state.speed_ms.abs() <= p.stop_speed_ms
            {
                debug!("Goal reached at t = {:.2} s", time_s);
                break;
            }

            // Driving direction comes from the speed profile, reverse legs
            // carry negative target speeds
            let direction = if input.speed_profile[nearest] < 0.0 {
                -1.0
            } else {
                1.0
            };

            // ---- STEERING ----

            // Tracking errors against the segment leaving the nearest sample
            let i0 = nearest.min(n - 2);
            let start = Vector2::new(path.x_m[i0], path.y_m[i0]);
            let end = Vector2::new(path.x_m[i0 + 1], path.y_m[i0 + 1]);
            let seg = end - start;
            let seg_len_m = seg.norm();

            // Positive lateral error means the vehicle is to the left of the
            // segment (right hand rule), so the correction curvature is
            // negative
            let lat_err_m = if seg_len_m > std::f64::EPSILON {
                let dir_vec = seg / seg_len_m;
                let rel = pos - start;
                dir_vec[0] * rel[1] - dir_vec[1] * rel[0]
            } else {
                0.0
            };

            let head_err_rad = wrap_to_pi(state.heading_rad - path.heading_rad[nearest]);

            let mut curv_dem_m =
                -(lat_pid.update(lat_err_m, dt_s) + head_pid.update(head_err_rad, dt_s));
            curv_dem_m = curv_dem_m.clamp(-p.max_curv_dem_m, p.max_curv_dem_m);

            // Reversing inverts the effect of curvature on heading
            curv_dem_m *= direction;

            let steer_target_rad = (constraints.wheelbase_m * curv_dem_m).atan();

            let max_dsteer_rad = constraints.max_steer_rate_rads * dt_s;
            let steer_rad = (prev_steer_rad + steer_alpha * (steer_target_rad - prev_steer_rad))
                .clamp(prev_steer_rad - max_dsteer_rad, prev_steer_rad + max_dsteer_rad)
                .clamp(-constraints.max_steer_rad, constraints.max_steer_rad);

            // ---- SPEED ----

            // Braking envelope: never faster than a full-braking stop at the
            // end of the path allows
            let remaining_m = (n - 1 - nearest) as f64 * path.dl_m;
            let allow_ms = (2.0 * constraints.max_accel_mss * remaining_m).sqrt();
            let cmd_ms = input.speed_profile[nearest].abs().min(allow_ms) * direction;

            let accel_target_mss = (speed_gain * (cmd_ms - state.speed_ms))
                .clamp(-constraints.max_accel_mss, constraints.max_accel_mss);
            let accel_mss = prev_accel_mss + accel_alpha * (accel_target_mss - prev_accel_mss);

            // ---- INTEGRATION ----

            let sub_dt_s = dt_s / substeps as f64;
            for _ in 0..substeps {
                state.step(steer_rad, accel_mss, sub_dt_s, constraints);
            }

            if !state.is_finite() {
                return Err(ControllerError::Diverged { time_s });
            }

            time_s += dt_s;
            series.push(time_s, &state, steer_rad, accel_mss);

            prev_steer_rad = steer_rad;
            prev_accel_mss = accel_mss;
        }

        Ok(RunOutcome::Finished(series))
    }
}

// ---------------------------------------------------------------------------
// TESTS
// ---------------------------------------------------------------------------

#[cfg(test)]
mod test {
    use super::*;
    use crate::ctrl::VehicleState;
    use crate::param_store::ParamStore;
    use crate::speed::{DirectionAwareProfiler, SpeedProfiler};
    use crate::traj::{ReferencePathBuilder, TrajFamily};
    use std::sync::atomic::AtomicBool;

    /// Build a run input for the given family with default parameters.
    fn run_input(family: TrajFamily, target_speed_ms: f64) -> RunInput {
        let path = ReferencePathBuilder::default()
            .build(&family.waypoints(), 1.0, family.reversed_return_leg())
            .unwrap();

        let speed_profile = DirectionAwareProfiler.profile(
            &path.x_m,
            &path.y_m,
            &path.heading_rad,
            target_speed_ms,
        );

        let initial_state = VehicleState::at_path_start(&path);
        let active = ParamStore::new().active().clone();

        RunInput {
            path,
            speed_profile,
            initial_state,
            ctrl: active.ctrl,
            constraints: active.constraints,
        }
    }

    #[test]
    fn test_tracks_slalom_to_goal() {
        let input = run_input(TrajFamily::Slalom, 10.0 / 3.6);
        let cancel = AtomicBool::new(false);

        let outcome = PidTracker::default().run(&input, &cancel).unwrap();
        let series = match outcome {
            RunOutcome::Finished(s) => s,
            RunOutcome::Cancelled => panic!("run unexpectedly cancelled"),
        };

        // The vehicle ends near the final path point, well before the
        // simulated time ceiling
        let n = input.path.num_samples();
        let end_dist_m = ((series.x_m.last().unwrap() - input.path.x_m[n - 1]).powi(2)
            + (series.y_m.last().unwrap() - input.path.y_m[n - 1]).powi(2))
        .sqrt();
        assert!(end_dist_m < 3.0, "ended {} m from the goal", end_dist_m);
        assert!(*series.time_s.last().unwrap() < 200.0);

        // Steering stayed inside the vehicle limit
        for steer in series.steer_rad.iter() {
            assert!(steer.abs() <= input.constraints.max_steer_rad + 1e-9);
        }
    }

    #[test]
    fn test_cancellation_observed() {
        let input = run_input(TrajFamily::Slalom, 10.0 / 3.6);
        let cancel = AtomicBool::new(true);

        // A pre-raised token cancels on the very first step, producing no
        // history at all
        match PidTracker::default().run(&input, &cancel).unwrap() {
            RunOutcome::Cancelled => (),
            RunOutcome::Finished(_) => panic!("expected cancellation"),
        }
    }

    #[test]
    fn test_profile_length_checked() {
        let mut input = run_input(TrajFamily::Slalom, 2.0);
        input.speed_profile.pop();

        let cancel = AtomicBool::new(false);
        assert!(matches!(
            PidTracker::default().run(&input, &cancel),
            Err(ControllerError::LengthMismatch { .. })
        ));
    }
}
