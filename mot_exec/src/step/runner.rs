//! Synchronous step runner

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use std::sync::atomic::{AtomicBool, Ordering};

use log::{debug, info};

use super::Step;
use crate::robot::Robot;

// ------------------------------------------------------------------------------------------------
// ENUMS
// ------------------------------------------------------------------------------------------------

/// How a run of a step ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunOutcome {
    /// The step reported it was finished.
    Finished,

    /// The run was cancelled before the step finished.
    Cancelled,
}

// ------------------------------------------------------------------------------------------------
// FUNCTIONS
// ------------------------------------------------------------------------------------------------

/// Run a step to completion on the calling task.
///
/// The step is started, then updated once every `tick_ms` until it reports finished, and finally
/// stopped. Returns once `on_stop` has been called.
pub fn run_sync(step: &mut dyn Step, robot: &Robot, tick_ms: u64) -> RunOutcome {
    run_until_cancelled(step, robot, tick_ms, None)
}

/// Run a step like [`run_sync`], additionally ending the run early when `cancel` is raised.
///
/// The flag is checked before every update, so after it is raised the step receives no further
/// updates and is stopped. A cancelled run also stops the chassis, whatever the step commanded.
pub fn run_until_cancelled(
    step: &mut dyn Step,
    robot: &Robot,
    tick_ms: u64,
    cancel: Option<&AtomicBool>,
) -> RunOutcome {
    let cancelled = || cancel.map(|c| c.load(Ordering::SeqCst)).unwrap_or(false);

    let start_ms = robot.now_ms();
    info!("Running {}", step.name());
    step.on_start(robot);

    let outcome = loop {
        if cancelled() {
            break RunOutcome::Cancelled;
        }

        step.on_update(robot);

        if step.check_finished(robot) {
            break RunOutcome::Finished;
        }

        robot.clock.sleep_ms(tick_ms);
    };

    step.on_stop(robot);

    if outcome == RunOutcome::Cancelled {
        robot.chassis.stop();
    }

    match outcome {
        RunOutcome::Finished => info!(
            "{} finished after {} ms",
            step.name(),
            robot.now_ms().saturating_sub(start_ms)
        ),
        RunOutcome::Cancelled => debug!("{} cancelled", step.name()),
    }

    outcome
}
