//! # Scenario
//!
//! A scenario file describes one simulation request: which trajectory to
//! follow (a named family or custom waypoints), the path sample spacing, the
//! target speed, and any parameter overrides in operator units. Scenarios
//! are TOML files loaded through [`util::params`].

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use serde::Deserialize;
use std::collections::BTreeMap;

// Internal
use crate::traj::TrajFamily;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// A simulation scenario as loaded from file.
#[derive(Debug, Clone, Deserialize)]
pub struct Scenario {
    /// Name of the trajectory family to follow, or `"custom"` to use the
    /// `waypoints` list. Defaults to custom waypoints when omitted.
    #[serde(default)]
    pub trajectory: Option<String>,

    /// Custom waypoints as `[x, y]` pairs, in metres.
    #[serde(default)]
    pub waypoints: Vec<[f64; 2]>,

    /// Arc-length spacing of the reference path samples.
    #[serde(default = "default_dl_m")]
    pub dl_m: f64,

    /// Target speed in operator units.
    #[serde(default = "default_target_speed_kmh")]
    pub target_speed_kmh: f64,

    /// Parameter overrides, staged into the parameter store before the run.
    /// Keys are the operator-facing field names.
    #[serde(default)]
    pub params: BTreeMap<String, f64>,
}

// -----------------------------------------------------------------------------------------------
// ENUMS
// -----------------------------------------------------------------------------------------------

/// Where the scenario's waypoints come from.
#[derive(Debug, Clone)]
pub enum TrajectorySource {
    Family(TrajFamily),
    Custom(Vec<[f64; 2]>),
}

#[derive(Debug, Clone, thiserror::Error)]
pub enum ScenarioError {
    #[error("Unknown trajectory family {0:?}")]
    UnknownTrajectory(String),

    #[error("Scenario selects no trajectory family and defines no waypoints")]
    NoTrajectory,
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl Scenario {
    /// Resolve the trajectory selection.
    pub fn source(&self) -> Result<TrajectorySource, ScenarioError> {
        match self.trajectory.as_deref() {
            Some("custom") | None => {
                if self.waypoints.is_empty() {
                    Err(ScenarioError::NoTrajectory)
                } else {
                    Ok(TrajectorySource::Custom(self.waypoints.clone()))
                }
            }
            Some(name) => TrajFamily::from_name(name)
                .map(TrajectorySource::Family)
                .ok_or_else(|| ScenarioError::UnknownTrajectory(name.to_string())),
        }
    }

    /// Target speed converted to SI.
    pub fn target_speed_ms(&self) -> f64 {
        self.target_speed_kmh / 3.6
    }
}

// ---------------------------------------------------------------------------
// PRIVATE FUNCTIONS
// ---------------------------------------------------------------------------

fn default_dl_m() -> f64 {
    1.0
}

fn default_target_speed_kmh() -> f64 {
    10.0
}

// ---------------------------------------------------------------------------
// TESTS
// ---------------------------------------------------------------------------

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_parse_family_scenario() {
        let scenario: Scenario = toml::from_str(
            r#"
            trajectory = "slalom"
            dl_m = 0.5
            target_speed_kmh = 18.0

            [params]
            max_steer_deg = 40.0
            horizon = 8
            "#,
        )
        .unwrap();

        assert!(matches!(
            scenario.source(),
            Ok(TrajectorySource::Family(TrajFamily::Slalom))
        ));
        assert_eq!(scenario.dl_m, 0.5);
        assert!((scenario.target_speed_ms() - 5.0).abs() < 1e-12);
        assert_eq!(scenario.params.get("horizon"), Some(&8.0));
    }

    #[test]
    fn test_parse_custom_scenario() {
        let scenario: Scenario = toml::from_str(
            r#"
            waypoints = [[0.0, 0.0], [20.0, 10.0], [40.0, -10.0]]
            "#,
        )
        .unwrap();

        match scenario.source() {
            Ok(TrajectorySource::Custom(points)) => assert_eq!(points.len(), 3),
            other => panic!("unexpected source {:?}", other),
        }

        // Defaults fill the rest
        assert_eq!(scenario.dl_m, 1.0);
        assert_eq!(scenario.target_speed_kmh, 10.0);
    }

    #[test]
    fn test_bad_selections_rejected() {
        let unknown: Scenario = toml::from_str(r#"trajectory = "spiral""#).unwrap();
        assert!(matches!(
            unknown.source(),
            Err(ScenarioError::UnknownTrajectory(_))
        ));

        let empty: Scenario = toml::from_str("").unwrap();
        assert!(matches!(empty.source(), Err(ScenarioError::NoTrajectory)));
    }
}
