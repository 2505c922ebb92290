//! # Predefined trajectory families
//!
//! A trajectory family supplies a ready-made waypoint sequence so the
//! operator can run a simulation without placing points by hand. Families
//! always satisfy the minimum waypoint invariant by construction, and are
//! treated identically to a finalized custom path from selection onwards.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use serde::{Deserialize, Serialize};

// Internal
use super::path_def::{PathDefinition, Waypoint};

// -----------------------------------------------------------------------------------------------
// ENUMS
// -----------------------------------------------------------------------------------------------

/// The built-in trajectory families.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrajFamily {
    /// A full circle of 30 m radius centred on (50, 0).
    Circular,

    /// A figure-of-eight with 30 m lobes centred on the origin.
    FigureEight,

    /// A slalom weaving along the x axis.
    Slalom,

    /// An out-and-back course. The return leg is driven in reverse, so the
    /// fitted heading is rotated by a half turn from the midpoint onwards
    /// (see [`crate::traj::builder`]).
    Switchback,
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl TrajFamily {
    /// All built-in families, in presentation order.
    pub const ALL: [TrajFamily; 4] = [
        TrajFamily::Circular,
        TrajFamily::FigureEight,
        TrajFamily::Slalom,
        TrajFamily::Switchback,
    ];

    /// Get the family matching the given name, if any.
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|f| f.name() == name)
    }

    /// The name of the family as used in scenario files and logs.
    pub fn name(&self) -> &'static str {
        match self {
            TrajFamily::Circular => "circular",
            TrajFamily::FigureEight => "figure_eight",
            TrajFamily::Slalom => "slalom",
            TrajFamily::Switchback => "switchback",
        }
    }

    /// True if the second half of the course is driven in reverse, which
    /// requires the fitted heading to be rotated by a half turn at and after
    /// the midpoint sample.
    pub fn reversed_return_leg(&self) -> bool {
        matches!(self, TrajFamily::Switchback)
    }

    /// Generate the family's waypoint sequence.
    pub fn waypoints(&self) -> Vec<Waypoint> {
        match self {
            TrajFamily::Circular => {
                let radius_m = 30.0;
                let (centre_x_m, centre_y_m) = (50.0, 0.0);

                linspace(0.0, std::f64::consts::TAU, 20)
                    .iter()
                    .map(|angle| {
                        Waypoint::new(
                            centre_x_m + radius_m * angle.cos(),
                            centre_y_m + radius_m * angle.sin(),
                        )
                    })
                    .collect()
            }
            TrajFamily::FigureEight => {
                let radius_m = 30.0;

                linspace(0.0, std::f64::consts::TAU, 40)
                    .iter()
                    .map(|angle| {
                        // Lemniscate-style parametrisation, the doubled angle
                        // on y produces the crossover
                        Waypoint::new(
                            radius_m * angle.cos(),
                            radius_m / 2.0 * (2.0 * angle).sin(),
                        )
                    })
                    .collect()
            }
            TrajFamily::Slalom => vec![
                Waypoint::new(0.0, 0.0),
                Waypoint::new(20.0, 10.0),
                Waypoint::new(40.0, -10.0),
                Waypoint::new(60.0, 10.0),
                Waypoint::new(80.0, -10.0),
                Waypoint::new(100.0, 0.0),
            ],
            TrajFamily::Switchback => vec![
                Waypoint::new(0.0, 0.0),
                Waypoint::new(15.0, 4.0),
                Waypoint::new(30.0, 0.0),
                Waypoint::new(40.0, -6.0),
                Waypoint::new(30.0, -14.0),
                Waypoint::new(15.0, -10.0),
                Waypoint::new(0.0, -14.0),
            ],
        }
    }

    /// Produce a finalized [`PathDefinition`] for this family.
    pub fn path_definition(&self) -> PathDefinition {
        PathDefinition::from_waypoints(self.waypoints())
    }
}

impl std::fmt::Display for TrajFamily {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

// -----------------------------------------------------------------------------------------------
// FUNCTIONS
// -----------------------------------------------------------------------------------------------

/// Linearly spaced values from `start` to `end` inclusive.
fn linspace(start: f64, end: f64, num: usize) -> Vec<f64> {
    if num < 2 {
        return vec![start];
    }

    let step = (end - start) / (num - 1) as f64;
    (0..num).map(|i| start + step * i as f64).collect()
}

// ---------------------------------------------------------------------------
// TESTS
// ---------------------------------------------------------------------------
