//! # Simulator library.
//!
//! This library holds the trajectory-definition and simulation-orchestration
//! pipeline: waypoint management, reference-path construction, controller
//! parameter handling, and the sequencing of closed-loop simulation runs.

// ------------------------------------------------------------------------------------------------
// MODULES
// ------------------------------------------------------------------------------------------------

/// Tracking controller - the closed-loop controller/simulator collaborators
pub mod ctrl;

/// Event sink - the append-only operator-visible event log
pub mod events;

/// Curve fitting - turns sparse waypoints into dense arc-length sampled paths
pub mod fit;

/// Parameter store - staging, validation and publication of tuning parameters
pub mod param_store;

/// Scenario - the input file describing a single simulation request
pub mod scenario;

/// Simulation manager - sequences a full closed-loop simulation run
pub mod sim_mgr;

/// Speed profiling - assigns a target speed to each reference path sample
pub mod speed;

/// Trajectory definition - waypoints, families, and the reference path builder
pub mod traj;
