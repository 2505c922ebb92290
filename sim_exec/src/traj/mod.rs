//! # Trajectory definition module
//!
//! This module owns everything needed to turn an operator's intent into a
//! dense reference path for the controller:
//!
//! - [`PathDefinition`] - the ordered waypoint list being edited, and its
//!   finalized form.
//! - [`TrajFamily`] - the predefined trajectory families which bypass manual
//!   editing.
//! - [`ReferencePathBuilder`] - fits the waypoints into an arc-length
//!   sampled [`ReferencePath`].

// ---------------------------------------------------------------------------
// MODULES
// ---------------------------------------------------------------------------

pub mod builder;
pub mod families;
pub mod path_def;

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// Internal
pub use builder::{PathFitError, ReferencePath, ReferencePathBuilder};
pub use families::TrajFamily;
pub use path_def::{PathDefError, PathDefinition, Waypoint, MIN_WAYPOINTS};
