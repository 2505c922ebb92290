//! Main simulator executable entry point.
//!
//! # Architecture
//!
//! The executable drives one scenario through the pipeline:
//!
//!     - Initialise the session and logging
//!     - Load the scenario file given on the command line
//!     - Stage any parameter overrides into the parameter store
//!     - Select the trajectory (family or custom waypoints)
//!     - Either preview (fit the reference path only) or run the full
//!       sequence: apply parameters, build the path, compute the speed
//!       profile, run the closed loop, and summarise the result
//!     - Save the reference path, run summary, and time series into the
//!       session directory

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use color_eyre::{
    eyre::{eyre, WrapErr},
    Report,
};
use log::{error, info};
use std::env;

// Internal
use sim_lib::{
    scenario::{Scenario, TrajectorySource},
    sim_mgr::{RunState, SimError, SimMgr},
    traj::{ReferencePathBuilder, Waypoint},
};
use util::{
    archive::Archiver,
    logger::{logger_init, LevelFilter},
    session::Session,
};

// ---------------------------------------------------------------------------
// FUNCTIONS
// ---------------------------------------------------------------------------

/// Executable main function, entry point.
fn main() -> Result<(), Report> {
    // ---- EARLY INITIALISATION ----

    // Initialise session
    let session =
        Session::new("sim_exec", "sessions").wrap_err("Failed to create the session")?;

    // Initialise logger
    logger_init(LevelFilter::Debug, &session).wrap_err("Failed to initialise logging")?;

    info!("Trajectory Tracking Simulator\n");
    info!("Session directory: {:?}\n", session.session_root);

    // ---- LOAD SCENARIO ----

    let args: Vec<String> = env::args().collect();

    let (scenario_path, preview) = match args.len() {
        2 => (args[1].clone(), false),
        3 if args[2] == "--preview" => (args[1].clone(), true),
        _ => {
            return Err(eyre!(
                "Usage: sim_exec <scenario.toml> [--preview]"
            ))
        }
    };

    let scenario: Scenario =
        util::params::load(&scenario_path).wrap_err("Could not load the scenario file")?;

    info!("Scenario loaded from \"{}\"", scenario_path);

    // ---- PREVIEW ----

    if preview {
        preview_path(&session, &scenario)?;
        session.exit();
        return Ok(());
    }

    // ---- FULL RUN ----

    let mut mgr = SimMgr::new();

    // Stage the scenario's parameter overrides
    for (name, value) in scenario.params.iter() {
        mgr.set_parameter(name, &value.to_string())
            .wrap_err_with(|| format!("Invalid parameter override {:?}", name))?;
    }

    match scenario.source()? {
        TrajectorySource::Family(family) => mgr.select_family(family),
        TrajectorySource::Custom(points) => {
            for p in points.iter() {
                mgr.add_waypoint(p[0], p[1]);
            }
            info!("Custom trajectory with {} waypoints set", points.len());
        }
    }

    mgr.apply_parameters()?;
    mgr.build_reference_path(scenario.dl_m)?;

    // The fitted path is an artefact worth keeping for every run
    if let Some(path) = mgr.reference_path() {
        session.save("ref_path.json", path.clone());
    }

    mgr.prepare_speed_profile(scenario.target_speed_ms())?;
    mgr.start()?;

    let terminal = mgr.wait();

    match mgr.run_result() {
        Ok(run) => {
            session.save("run_summary.json", run.summary());

            let mut archiver = Archiver::from_path(&session, "time_series.csv")
                .map_err(|e| eyre!("Could not create the time series archive: {}", e))?;
            for record in run.series.records() {
                archiver
                    .serialise(record)
                    .map_err(|e| eyre!("Could not archive the time series: {}", e))?;
            }

            info!(
                "Run complete: {:.2} s simulated, average speed {:.2} km/h",
                run.sim_duration_s,
                run.avg_speed_ms * 3.6
            );
        }
        Err(SimError::OperationCancelled) => {
            info!("Run cancelled by the operator, no results recorded");
        }
        Err(e) => {
            error!("Run ended in state {}: {}", terminal, e);
        }
    }

    // Replay the operator event log into the session log
    for event in mgr.events().entries() {
        info!("{} | {}", event.timestamp.format("%H:%M:%S%.3f"), event.message);
    }

    let failed = terminal == RunState::Failed;
    session.exit();

    if failed {
        return Err(eyre!("Simulation run failed, see the session log"));
    }

    Ok(())
}

/// Fit and save the reference path without running the simulation.
fn preview_path(session: &Session, scenario: &Scenario) -> Result<(), Report> {
    let (waypoints, reversed): (Vec<Waypoint>, bool) = match scenario.source()? {
        TrajectorySource::Family(family) => (family.waypoints(), family.reversed_return_leg()),
        TrajectorySource::Custom(points) => (
            points.iter().map(|p| Waypoint::new(p[0], p[1])).collect(),
            false,
        ),
    };

    let path = ReferencePathBuilder::default()
        .build(&waypoints, scenario.dl_m, reversed)
        .wrap_err("Preview failed")?;

    info!(
        "Preview: {} samples at {} m spacing, total length {:.1} m",
        path.num_samples(),
        scenario.dl_m,
        path.length_m()
    );

    session.save("ref_path.json", path);

    Ok(())
}
