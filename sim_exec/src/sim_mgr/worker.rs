//! Worker thread running the closed-loop controller so the interactive
//! thread stays free to accept a cancellation.

// -----------------------------------------------------------------------------------------------
// INCLUDES
// -----------------------------------------------------------------------------------------------

use std::sync::{
    atomic::AtomicBool,
    mpsc::Sender,
    Arc,
};

use log::debug;

use crate::ctrl::{ControllerError, RunInput, RunOutcome, TimeSeries, TrackingController};

// -----------------------------------------------------------------------------------------------
// ENUMS
// -----------------------------------------------------------------------------------------------

/// Signals sent from the worker back to the simulation manager.
#[derive(Debug)]
pub enum WorkerSignal {
    /// The controller terminated normally with the collected history.
    Complete(Box<TimeSeries>),

    /// The controller observed the cancellation token and stopped. Partial
    /// history has been discarded.
    Cancelled,

    /// The controller failed.
    Error(Box<ControllerError>),
}

// -----------------------------------------------------------------------------------------------
// FUNCTIONS
// -----------------------------------------------------------------------------------------------

/// Execute one closed-loop run and report the outcome to the manager.
///
/// The controller call is synchronous and may take an unbounded but finite
/// time, which is why it lives on this thread rather than the interactive
/// one.
pub(super) fn worker_thread(
    controller: Arc<dyn TrackingController>,
    input: RunInput,
    cancel: Arc<AtomicBool>,
    sender: Sender<WorkerSignal>,
) {
    debug!(
        "Simulation worker started ({} path samples)",
        input.path.num_samples()
    );

    let signal = match controller.run(&input, &cancel) {
        Ok(RunOutcome::Finished(series)) => WorkerSignal::Complete(Box::new(series)),
        Ok(RunOutcome::Cancelled) => WorkerSignal::Cancelled,
        Err(e) => WorkerSignal::Error(Box::new(e)),
    };

    // If the manager has gone away there is nobody left to report to
    let _ = sender.send(signal);
}
