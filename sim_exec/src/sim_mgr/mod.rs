//! # SimMgr module
//!
//! This module implements the [`SimMgr`] state machine which sequences a
//! closed-loop simulation run:
//!
//! - `Idle` - nothing prepared yet, parameters and path may be edited
//! - `ParametersApplied` - a validated configuration snapshot exists
//! - `PathBuilt` - the reference path has been fitted
//! - `SpeedProfileReady` - the speed profile and initial state exist
//! - `Running` - the controller is executing on the worker thread
//! - `Completed` / `Failed` / `Cancelled` - terminal outcomes of the run
//!
//! Each transition is guarded, records an operator-visible event, and maps
//! failures into the [`SimError`] taxonomy. Validation failures leave the
//! machine where it stands so the operator can correct the input;
//! collaborator failures move it to `Failed` without corrupting the
//! parameter store or the path definition.

// ------------------------------------------------------------------------------------------------
// MODULES
// ------------------------------------------------------------------------------------------------

pub mod run;
mod worker;

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use std::fmt::Display;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{channel, Receiver, TryRecvError};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Instant;

use log::{error, info, warn};

pub use run::{RunSummary, SimulationRun};
use worker::WorkerSignal;

use crate::ctrl::{
    ControllerError, PidTracker, RunInput, TrackingController, VehicleState,
};
use crate::events::EventSink;
use crate::param_store::{ActiveConfig, ParamError, ParamStore};
use crate::speed::{DirectionAwareProfiler, SpeedProfiler};
use crate::traj::{
    PathDefError, PathDefinition, PathFitError, ReferencePath, ReferencePathBuilder, TrajFamily,
};

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

/// Simulation manager
///
/// Owns the pipeline components and drives them through the run state
/// machine. All operations are issued from the interactive thread; only the
/// closed-loop controller itself executes on a dedicated worker.
pub struct SimMgr {
    param_store: ParamStore,
    path_def: PathDefinition,
    family: Option<TrajFamily>,
    events: EventSink,

    builder: ReferencePathBuilder,
    profiler: Box<dyn SpeedProfiler>,
    controller: Arc<dyn TrackingController>,

    state: RunState,

    /// Configuration snapshot taken at the `ParametersApplied` transition.
    /// The in-flight run only ever sees this snapshot, later edits to the
    /// store cannot reach it.
    active: Option<ActiveConfig>,

    ref_path: Option<ReferencePath>,
    speed_profile: Option<Vec<f64>>,
    initial_state: Option<VehicleState>,
    target_speed_ms: f64,

    worker: Option<Worker>,
    last_run: Option<SimulationRun>,
    failure: Option<SimError>,
}

/// Handle onto the in-flight worker thread.
struct Worker {
    receiver: Receiver<WorkerSignal>,
    cancel: Arc<AtomicBool>,
    handle: JoinHandle<()>,
    started: Instant,
}

// ------------------------------------------------------------------------------------------------
// ENUMS
// ------------------------------------------------------------------------------------------------

/// The states of the simulation run machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    Idle,
    ParametersApplied,
    PathBuilt,
    SpeedProfileReady,
    Running,
    Completed,
    Failed,
    Cancelled,
}

/// Errors that can occur while sequencing a simulation run.
#[derive(Debug, Clone, thiserror::Error)]
pub enum SimError {
    #[error(transparent)]
    InsufficientWaypoints(#[from] PathDefError),

    #[error(transparent)]
    InvalidParameter(#[from] ParamError),

    #[error("Path fitting failed: {0}")]
    PathFitFailure(#[source] PathFitError),

    #[error("Simulation failed: {0}")]
    SimulationFailure(#[source] ControllerError),

    /// Not a failure: the operator cancelled the run. Kept in the taxonomy
    /// so a cancelled outcome is distinguishable from a failed one.
    #[error("The run was cancelled by the operator")]
    OperationCancelled,

    #[error("A simulation run is already in progress")]
    RunInProgress,

    #[error("Operation {op:?} is not valid in state {state}")]
    InvalidTransition { op: &'static str, state: RunState },
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl SimMgr {
    /// Create a manager with the default collaborators.
    pub fn new() -> Self {
        Self::with_controller(Arc::new(PidTracker::default()))
    }

    /// Create a manager driving the given controller. Used to swap the
    /// closed-loop collaborator, for instance in tests.
    pub fn with_controller(controller: Arc<dyn TrackingController>) -> Self {
        Self {
            param_store: ParamStore::new(),
            path_def: PathDefinition::new_empty(),
            family: None,
            events: EventSink::new(),
            builder: ReferencePathBuilder::default(),
            profiler: Box::new(DirectionAwareProfiler::default()),
            controller,
            state: RunState::Idle,
            active: None,
            ref_path: None,
            speed_profile: None,
            initial_state: None,
            target_speed_ms: 0.0,
            worker: None,
            last_run: None,
            failure: None,
        }
    }

    // ---- PATH AND PARAMETER EDITING ----

    /// Select a predefined trajectory family, replacing any custom path.
    pub fn select_family(&mut self, family: TrajFamily) {
        self.path_def = family.path_definition();
        self.family = Some(family);

        info!("Trajectory family selected: {}", family);
        self.events
            .record(format!("Selected trajectory: {}", family));
    }

    /// Append a waypoint to the custom path being edited.
    pub fn add_waypoint(&mut self, x_m: f64, y_m: f64) {
        self.path_def.add_waypoint(x_m, y_m);
    }

    /// Clear the path definition and deselect any family.
    pub fn clear_path(&mut self) {
        self.path_def.clear();
        self.family = None;
        self.events.record("Waypoints cleared");
    }

    /// Stage a parameter edit, surfacing failures in the event log.
    pub fn set_parameter(&mut self, name: &str, raw_value: &str) -> Result<(), SimError> {
        match self.param_store.set_field(name, raw_value) {
            Ok(()) => Ok(()),
            Err(e) => {
                self.events.record(format!("{}", e));
                warn!("{}", e);
                Err(e.into())
            }
        }
    }

    /// Restore the built-in default parameter set.
    pub fn reset_parameters(&mut self) {
        self.param_store.reset_to_defaults();
        self.events.record("Parameters reset to defaults");
        info!("Parameters reset to defaults");
    }

    // ---- STATE MACHINE TRANSITIONS ----

    /// `Idle -> ParametersApplied`: validate and publish the staged
    /// parameter set.
    ///
    /// On failure the machine stays in `Idle` and the previously active
    /// configuration is untouched. Starting a new cycle discards the
    /// previous run record and its history.
    pub fn apply_parameters(&mut self) -> Result<(), SimError> {
        if self.state == RunState::Running {
            return Err(SimError::RunInProgress);
        }

        match self.param_store.apply() {
            Ok(cfg) => {
                self.last_run = None;
                self.failure = None;
                self.ref_path = None;
                self.speed_profile = None;
                self.initial_state = None;

                self.events.record(format!(
                    "Parameters applied: horizon={} steps, dt={} s, max {:.1} m/s, \
                     max steer {:.3} rad",
                    cfg.ctrl.horizon,
                    cfg.ctrl.time_step_s,
                    cfg.constraints.max_speed_ms,
                    cfg.constraints.max_steer_rad,
                ));
                info!("Parameters applied");

                self.active = Some(cfg);
                self.set_state(RunState::ParametersApplied);
                Ok(())
            }
            Err(e) => {
                self.events.record(format!("Parameter application failed: {}", e));
                warn!("Parameter application failed: {}", e);

                self.set_state(RunState::Idle);
                Err(e.into())
            }
        }
    }

    /// `ParametersApplied -> PathBuilt`: finalize the waypoints and fit the
    /// reference path.
    ///
    /// Too few waypoints is a validation error and leaves the machine in
    /// `ParametersApplied`; a fitter failure moves it to `Failed`.
    pub fn build_reference_path(&mut self, dl_m: f64) -> Result<(), SimError> {
        self.guard("build_reference_path", RunState::ParametersApplied)?;

        let snapshot = match self.path_def.finalize() {
            Ok(s) => s,
            Err(e) => {
                self.events
                    .record(format!("Cannot build reference path: {}", e));
                warn!("Cannot build reference path: {}", e);
                return Err(e.into());
            }
        };

        let reversed = self
            .family
            .map(|f| f.reversed_return_leg())
            .unwrap_or(false);

        match self.builder.build(&snapshot, dl_m, reversed) {
            Ok(path) => {
                self.events.record(format!(
                    "Reference path built: {} samples at {} m spacing from {} waypoints",
                    path.num_samples(),
                    dl_m,
                    snapshot.len(),
                ));
                info!("Reference path built ({} samples)", path.num_samples());

                self.ref_path = Some(path);
                self.set_state(RunState::PathBuilt);
                Ok(())
            }
            Err(e) => {
                let err = SimError::PathFitFailure(e);
                self.events.record(format!("{}", err));
                error!("{}", err);

                self.failure = Some(err.clone());
                self.set_state(RunState::Failed);
                Err(err)
            }
        }
    }

    /// `PathBuilt -> SpeedProfileReady`: compute the speed profile and the
    /// initial vehicle state from the first path sample.
    pub fn prepare_speed_profile(&mut self, target_speed_ms: f64) -> Result<(), SimError> {
        self.guard("prepare_speed_profile", RunState::PathBuilt)?;

        if !target_speed_ms.is_finite() || target_speed_ms <= 0.0 {
            let err = SimError::InvalidParameter(ParamError::InvalidParameter {
                field: "target_speed".to_string(),
                reason: format!("{} is not positive", target_speed_ms),
            });
            self.events.record(format!("{}", err));
            return Err(err);
        }

        // The unwrap is safe, PathBuilt guarantees a reference path
        let path = self.ref_path.as_ref().unwrap();

        let profile =
            self.profiler
                .profile(&path.x_m, &path.y_m, &path.heading_rad, target_speed_ms);

        // Position and heading from sample 0, at rest
        let initial = VehicleState::at_path_start(path);

        self.events.record(format!(
            "Speed profile ready: target {:.2} m/s over {} samples, start at ({:.2}, {:.2})",
            target_speed_ms,
            profile.len(),
            initial.x_m,
            initial.y_m,
        ));

        self.speed_profile = Some(profile);
        self.initial_state = Some(initial);
        self.target_speed_ms = target_speed_ms;
        self.set_state(RunState::SpeedProfileReady);
        Ok(())
    }

    /// `SpeedProfileReady -> Running`: hand the snapshotted inputs to the
    /// controller on a dedicated worker thread.
    pub fn start(&mut self) -> Result<(), SimError> {
        if self.state == RunState::Running {
            return Err(SimError::RunInProgress);
        }
        self.guard("start", RunState::SpeedProfileReady)?;

        // The unwraps are safe, SpeedProfileReady guarantees every input
        let cfg = self.active.clone().unwrap();
        let input = RunInput {
            path: self.ref_path.clone().unwrap(),
            speed_profile: self.speed_profile.clone().unwrap(),
            initial_state: self.initial_state.unwrap(),
            ctrl: cfg.ctrl,
            constraints: cfg.constraints,
        };

        self.events.record(format!(
            "Simulation started: {} samples, target {:.2} m/s",
            input.path.num_samples(),
            self.target_speed_ms,
        ));
        info!("Simulation started");

        let cancel = Arc::new(AtomicBool::new(false));
        let (sender, receiver) = channel();

        let controller = self.controller.clone();
        let worker_cancel = cancel.clone();
        let handle =
            thread::spawn(move || worker::worker_thread(controller, input, worker_cancel, sender));

        self.worker = Some(Worker {
            receiver,
            cancel,
            handle,
            started: Instant::now(),
        });
        self.set_state(RunState::Running);
        Ok(())
    }

    /// Request cancellation of the in-flight run.
    ///
    /// The request is observed by the controller at its next step; the
    /// transition to `Cancelled` is reported by `poll`/`wait` once the
    /// worker has actually stopped.
    pub fn cancel(&mut self) {
        match (&self.state, &self.worker) {
            (RunState::Running, Some(worker)) => {
                worker.cancel.store(true, Ordering::Relaxed);
                self.events.record("Cancellation requested");
                info!("Cancellation requested");
            }
            _ => warn!("No simulation in flight to cancel"),
        }
    }

    /// Check for run completion without blocking.
    pub fn poll(&mut self) -> RunState {
        if self.state != RunState::Running {
            return self.state;
        }

        // The unwrap is safe, Running guarantees a worker
        match self.worker.as_ref().unwrap().receiver.try_recv() {
            Ok(signal) => self.conclude(signal),
            Err(TryRecvError::Empty) => RunState::Running,
            Err(TryRecvError::Disconnected) => {
                self.conclude(WorkerSignal::Error(Box::new(ControllerError::Aborted)))
            }
        }
    }

    /// Block until the in-flight run terminates and return the terminal
    /// state.
    pub fn wait(&mut self) -> RunState {
        if self.state != RunState::Running {
            return self.state;
        }

        match self.worker.as_ref().unwrap().receiver.recv() {
            Ok(signal) => self.conclude(signal),
            Err(_) => self.conclude(WorkerSignal::Error(Box::new(ControllerError::Aborted))),
        }
    }

    // ---- RESULTS AND ACCESSORS ----

    /// The outcome of the last run.
    ///
    /// `Completed` yields the run record; `Cancelled` and `Failed` are
    /// reported through the error taxonomy, distinguishably.
    pub fn run_result(&self) -> Result<&SimulationRun, SimError> {
        match self.state {
            // The unwrap is safe, Completed is only set with a run record
            RunState::Completed => Ok(self.last_run.as_ref().unwrap()),
            RunState::Cancelled => Err(SimError::OperationCancelled),
            RunState::Failed => Err(self
                .failure
                .clone()
                .unwrap_or(SimError::SimulationFailure(ControllerError::Aborted))),
            state => Err(SimError::InvalidTransition {
                op: "run_result",
                state,
            }),
        }
    }

    pub fn state(&self) -> RunState {
        self.state
    }

    pub fn param_store(&self) -> &ParamStore {
        &self.param_store
    }

    pub fn param_store_mut(&mut self) -> &mut ParamStore {
        &mut self.param_store
    }

    pub fn path(&self) -> &PathDefinition {
        &self.path_def
    }

    pub fn reference_path(&self) -> Option<&ReferencePath> {
        self.ref_path.as_ref()
    }

    pub fn events(&self) -> &EventSink {
        &self.events
    }

    pub fn last_run(&self) -> Option<&SimulationRun> {
        self.last_run.as_ref()
    }

    // ---- INTERNALS ----

    /// Check the machine is in the state required by an operation.
    fn guard(&self, op: &'static str, required: RunState) -> Result<(), SimError> {
        if self.state == RunState::Running {
            return Err(SimError::RunInProgress);
        }

        if self.state != required {
            return Err(SimError::InvalidTransition {
                op,
                state: self.state,
            });
        }

        Ok(())
    }

    fn set_state(&mut self, state: RunState) {
        if self.state != state {
            info!("SimMgr state change to: {}", state);
            self.state = state;
        }
    }

    /// Fold a worker signal into the terminal state, joining the thread and
    /// producing the run record on success.
    fn conclude(&mut self, signal: WorkerSignal) -> RunState {
        // The unwrap is safe, conclude is only reached from Running
        let worker = self.worker.take().unwrap();
        let wall_time_s = worker.started.elapsed().as_secs_f64();
        let _ = worker.handle.join();

        match signal {
            WorkerSignal::Complete(series) => {
                let run = SimulationRun::from_series(*series, wall_time_s);
                let summary = run.summary();

                self.events.record(format!(
                    "Simulation completed in {:.2} s wall time: {:.2} s simulated, \
                     average speed {:.2} km/h, peak steering {:.4} rad",
                    summary.wall_time_s,
                    summary.sim_duration_s,
                    summary.avg_speed_kmh,
                    summary.peak_steer_rad,
                ));
                info!(
                    "Simulation completed ({:.2} s simulated in {:.2} s)",
                    summary.sim_duration_s, summary.wall_time_s
                );

                self.last_run = Some(run);
                self.set_state(RunState::Completed);
            }
            WorkerSignal::Cancelled => {
                self.events.record("Simulation cancelled, no run recorded");
                info!("Simulation cancelled");

                self.set_state(RunState::Cancelled);
            }
            WorkerSignal::Error(e) => {
                let err = SimError::SimulationFailure(*e);
                self.events.record(format!("{}", err));
                error!("{}", err);

                self.failure = Some(err);
                self.set_state(RunState::Failed);
            }
        }

        self.state
    }
}

impl Default for SimMgr {
    fn default() -> Self {
        Self::new()
    }
}

impl Display for RunState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RunState::Idle => write!(f, "Idle"),
            RunState::ParametersApplied => write!(f, "ParametersApplied"),
            RunState::PathBuilt => write!(f, "PathBuilt"),
            RunState::SpeedProfileReady => write!(f, "SpeedProfileReady"),
            RunState::Running => write!(f, "Running"),
            RunState::Completed => write!(f, "Completed"),
            RunState::Failed => write!(f, "Failed"),
            RunState::Cancelled => write!(f, "Cancelled"),
        }
    }
}

// ------------------------------------------------------------------------------------------------
// TESTS
// ------------------------------------------------------------------------------------------------

#[cfg(test)]
mod test {
    use super::*;
    use crate::ctrl::RunOutcome;
    use std::time::Duration;

    /// A controller which spins until cancelled, for exercising the
    /// cancellation path deterministically.
    struct BlockUntilCancelled;

    impl TrackingController for BlockUntilCancelled {
        fn run(
            &self,
            _input: &RunInput,
            cancel: &AtomicBool,
        ) -> Result<RunOutcome, ControllerError> {
            while !cancel.load(Ordering::Relaxed) {
                thread::sleep(Duration::from_millis(1));
            }
            Ok(RunOutcome::Cancelled)
        }
    }

    /// A controller which always fails.
    struct AlwaysDiverges;

    impl TrackingController for AlwaysDiverges {
        fn run(
            &self,
            _input: &RunInput,
            _cancel: &AtomicBool,
        ) -> Result<RunOutcome, ControllerError> {
            Err(ControllerError::Diverged { time_s: 0.4 })
        }
    }

    /// Drive a manager up to the Running state on the slalom course.
    fn start_slalom(mgr: &mut SimMgr) {
        mgr.select_family(TrajFamily::Slalom);
        mgr.apply_parameters().unwrap();
        mgr.build_reference_path(1.0).unwrap();
        mgr.prepare_speed_profile(10.0 / 3.6).unwrap();
        mgr.start().unwrap();
        assert_eq!(mgr.state(), RunState::Running);
    }

    #[test]
    fn test_end_to_end_slalom() {
        let mut mgr = SimMgr::new();
        let target_ms = 10.0 / 3.6;

        start_slalom(&mut mgr);
        assert_eq!(mgr.wait(), RunState::Completed);

        let run = mgr.run_result().unwrap();
        assert!(run.sim_duration_s > 0.0);
        assert!(!run.series.is_empty());

        // The run includes the standing start and the terminal stop, so the
        // mean sits below the target but not far below
        assert!(
            run.avg_speed_ms >= 0.5 * target_ms && run.avg_speed_ms <= 1.1 * target_ms,
            "average speed {} m/s outside the target band around {} m/s",
            run.avg_speed_ms,
            target_ms
        );

        // Every transition left a trace in the event log
        assert!(mgr.events().len() >= 5);
    }

    #[test]
    fn test_transitions_are_guarded() {
        let mut mgr = SimMgr::new();
        mgr.select_family(TrajFamily::Slalom);

        // Path building before parameter application is rejected
        assert!(matches!(
            mgr.build_reference_path(1.0),
            Err(SimError::InvalidTransition { .. })
        ));
        assert_eq!(mgr.state(), RunState::Idle);

        mgr.apply_parameters().unwrap();
        assert!(matches!(
            mgr.start(),
            Err(SimError::InvalidTransition { .. })
        ));
    }

    #[test]
    fn test_insufficient_waypoints_recoverable() {
        let mut mgr = SimMgr::new();
        mgr.add_waypoint(0.0, 0.0);
        mgr.add_waypoint(10.0, 0.0);
        mgr.apply_parameters().unwrap();

        assert!(matches!(
            mgr.build_reference_path(1.0),
            Err(SimError::InsufficientWaypoints(_))
        ));

        // Validation failure: the machine stays in ParametersApplied and the
        // operator can fix the path and retry
        assert_eq!(mgr.state(), RunState::ParametersApplied);

        mgr.add_waypoint(20.0, 5.0);
        mgr.build_reference_path(1.0).unwrap();
        assert_eq!(mgr.state(), RunState::PathBuilt);
    }

    #[test]
    fn test_fit_failure_is_terminal() {
        let mut mgr = SimMgr::new();
        mgr.add_waypoint(0.0, 0.0);
        mgr.add_waypoint(0.0, 0.0);
        mgr.add_waypoint(10.0, 0.0);
        mgr.apply_parameters().unwrap();

        assert!(matches!(
            mgr.build_reference_path(1.0),
            Err(SimError::PathFitFailure(_))
        ));
        assert_eq!(mgr.state(), RunState::Failed);

        // The parameter store survived the failure untouched
        assert_eq!(mgr.param_store().active().ctrl.horizon, 5);
    }

    #[test]
    fn test_cancellation_produces_no_run() {
        let mut mgr = SimMgr::with_controller(Arc::new(BlockUntilCancelled));
        start_slalom(&mut mgr);

        // Still running until the cancellation is requested
        assert_eq!(mgr.poll(), RunState::Running);

        mgr.cancel();
        assert_eq!(mgr.wait(), RunState::Cancelled);

        assert!(mgr.last_run().is_none());
        assert!(matches!(
            mgr.run_result(),
            Err(SimError::OperationCancelled)
        ));

        // Path definition and parameter store are intact for the next run
        assert!(mgr.path().is_finalized());
        assert_eq!(mgr.param_store().active().ctrl.max_iter, 3);
    }

    #[test]
    fn test_controller_failure_reported() {
        let mut mgr = SimMgr::with_controller(Arc::new(AlwaysDiverges));
        start_slalom(&mut mgr);

        assert_eq!(mgr.wait(), RunState::Failed);
        assert!(matches!(
            mgr.run_result(),
            Err(SimError::SimulationFailure(_))
        ));
    }

    #[test]
    fn test_no_second_run_while_running() {
        let mut mgr = SimMgr::with_controller(Arc::new(BlockUntilCancelled));
        start_slalom(&mut mgr);

        assert!(matches!(mgr.start(), Err(SimError::RunInProgress)));
        assert!(matches!(
            mgr.apply_parameters(),
            Err(SimError::RunInProgress)
        ));

        // Out-of-band parameter application on the store itself is allowed
        // and cannot disturb the in-flight run's snapshot
        mgr.param_store_mut().set_field("max_speed_kmh", "72").unwrap();
        mgr.param_store_mut().apply().unwrap();
        assert_eq!(mgr.poll(), RunState::Running);

        mgr.cancel();
        assert_eq!(mgr.wait(), RunState::Cancelled);
    }

    #[test]
    fn test_parameter_edit_failures_logged() {
        let mut mgr = SimMgr::new();

        assert!(matches!(
            mgr.set_parameter("time_step", "0"),
            Err(SimError::InvalidParameter(_))
        ));

        // The failure reached the operator event log
        assert!(mgr
            .events()
            .entries()
            .any(|e| e.message.contains("time_step")));

        mgr.set_parameter("time_step", "0.1").unwrap();
        mgr.reset_parameters();
        assert_eq!(mgr.param_store().staged_value("time_step"), Some(0.2));
    }

    #[test]
    fn test_new_cycle_discards_previous_run() {
        let mut mgr = SimMgr::new();
        start_slalom(&mut mgr);
        assert_eq!(mgr.wait(), RunState::Completed);
        assert!(mgr.last_run().is_some());

        // Applying parameters begins a new cycle and discards the old record
        mgr.apply_parameters().unwrap();
        assert!(mgr.last_run().is_none());
        assert_eq!(mgr.state(), RunState::ParametersApplied);
    }
}
