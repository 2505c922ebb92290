//! # Path definition
//!
//! A [`PathDefinition`] is the ordered list of waypoints the operator is
//! building, either by placing points one at a time or by selecting a
//! predefined trajectory family. Insertion order is significant since it
//! defines the direction of travel along the path.
//!
//! The definition is a tagged variant rather than a list plus a "finalized"
//! boolean: while editable waypoints may be appended freely, and once
//! finalized the sequence is frozen behind a shared immutable snapshot until
//! the definition is cleared.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use log::warn;
use nalgebra::Vector2;
use std::sync::Arc;

// ---------------------------------------------------------------------------
// CONSTANTS
// ---------------------------------------------------------------------------

/// Minimum number of waypoints needed before a path may be finalized and
/// handed to the reference path builder.
pub const MIN_WAYPOINTS: usize = 3;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// A single waypoint in planar coordinates (metres).
pub type Waypoint = Vector2<f64>;

/// The operator's waypoint sequence and its editing state.
#[derive(Clone, Debug)]
pub enum PathDefinition {
    /// The sequence is still being edited, waypoints may be appended.
    Editable(Vec<Waypoint>),

    /// The sequence has been frozen. Downstream stages hold clones of the
    /// snapshot, so later clears cannot pull the points out from under them.
    Finalized(Arc<[Waypoint]>),
}

// -----------------------------------------------------------------------------------------------
// ENUMS
// -----------------------------------------------------------------------------------------------

#[derive(Debug, Clone, thiserror::Error)]
pub enum PathDefError {
    /// Attempted to finalize a path without enough waypoints to fit a curve
    /// through.
    #[error("A path requires at least {MIN_WAYPOINTS} waypoints, got {count}")]
    InsufficientWaypoints { count: usize },
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl PathDefinition {
    /// Create a new empty editable definition.
    pub fn new_empty() -> Self {
        PathDefinition::Editable(Vec::new())
    }

    /// Create a finalized definition directly from a ready-made waypoint
    /// sequence, as supplied by a trajectory family.
    ///
    /// The caller is responsible for the sequence satisfying the
    /// [`MIN_WAYPOINTS`] invariant, which all built-in families do by
    /// construction.
    pub fn from_waypoints(waypoints: Vec<Waypoint>) -> Self {
        PathDefinition::Finalized(waypoints.into())
    }

    /// Append a waypoint to the sequence.
    ///
    /// If the definition has been finalized this is a no-op and a warning is
    /// logged, the operator must `clear` first.
    pub fn add_waypoint(&mut self, x_m: f64, y_m: f64) {
        match self {
            PathDefinition::Editable(points) => points.push(Waypoint::new(x_m, y_m)),
            PathDefinition::Finalized(_) => {
                warn!("Cannot add waypoint ({}, {}): path is finalized", x_m, y_m)
            }
        }
    }

    /// Empty the sequence and return to the editable state.
    pub fn clear(&mut self) {
        *self = PathDefinition::new_empty();
    }

    /// Freeze the sequence and return an immutable snapshot of it.
    ///
    /// Fails if fewer than [`MIN_WAYPOINTS`] waypoints have been placed, in
    /// which case the definition remains editable. Finalizing an already
    /// finalized definition returns the existing snapshot.
    pub fn finalize(&mut self) -> Result<Arc<[Waypoint]>, PathDefError> {
        match self {
            PathDefinition::Editable(points) => {
                if points.len() < MIN_WAYPOINTS {
                    return Err(PathDefError::InsufficientWaypoints {
                        count: points.len(),
                    });
                }

                let snapshot: Arc<[Waypoint]> = std::mem::take(points).into();
                *self = PathDefinition::Finalized(snapshot.clone());
                Ok(snapshot)
            }
            PathDefinition::Finalized(snapshot) => Ok(snapshot.clone()),
        }
    }

    /// Get the waypoints currently in the sequence.
    pub fn waypoints(&self) -> &[Waypoint] {
        match self {
            PathDefinition::Editable(points) => points,
            PathDefinition::Finalized(snapshot) => snapshot,
        }
    }

    /// Get the number of waypoints in the sequence.
    pub fn num_waypoints(&self) -> usize {
        self.waypoints().len()
    }

    pub fn is_finalized(&self) -> bool {
        matches!(self, PathDefinition::Finalized(_))
    }
}

impl Default for PathDefinition {
    fn default() -> Self {
        Self::new_empty()
    }
}

// ---------------------------------------------------------------------------
// TESTS
// ---------------------------------------------------------------------------

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_finalize_requires_min_waypoints() {
        let mut def = PathDefinition::new_empty();
        def.add_waypoint(0.0, 0.0);
        def.add_waypoint(1.0, 1.0);

        // Two points is not enough, and the failure must leave the
        // definition editable
        assert!(matches!(
            def.finalize(),
            Err(PathDefError::InsufficientWaypoints { count: 2 })
        ));
        assert!(!def.is_finalized());

        def.add_waypoint(2.0, 0.0);
        let snapshot = def.finalize().unwrap();
        assert_eq!(snapshot.len(), 3);
        assert!(def.is_finalized());
    }

    #[test]
    fn test_add_after_finalize_is_noop() {
        let mut def = PathDefinition::new_empty();
        def.add_waypoint(0.0, 0.0);
        def.add_waypoint(1.0, 1.0);
        def.add_waypoint(2.0, 0.0);
        def.finalize().unwrap();

        def.add_waypoint(3.0, 3.0);
        assert_eq!(def.num_waypoints(), 3);
    }

    #[test]
    fn test_clear_resets_to_editable() {
        let mut def = PathDefinition::from_waypoints(vec![
            Waypoint::new(0.0, 0.0),
            Waypoint::new(1.0, 0.0),
            Waypoint::new(2.0, 0.0),
        ]);
        assert!(def.is_finalized());

        def.clear();
        assert!(!def.is_finalized());
        assert_eq!(def.num_waypoints(), 0);

        // Editable again after the clear
        def.add_waypoint(5.0, 5.0);
        assert_eq!(def.num_waypoints(), 1);
    }

    #[test]
    fn test_snapshot_isolated_from_clear() {
        let mut def = PathDefinition::new_empty();
        def.add_waypoint(0.0, 0.0);
        def.add_waypoint(1.0, 1.0);
        def.add_waypoint(2.0, 0.0);

        let snapshot = def.finalize().unwrap();
        def.clear();

        assert_eq!(snapshot.len(), 3);
        assert_eq!(snapshot[2], Waypoint::new(2.0, 0.0));
    }
}
