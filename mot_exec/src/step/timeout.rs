//! Time limited step

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use log::warn;

use super::{BoxedStep, Step};
use crate::robot::Robot;

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

/// Runs a child step, ending it early if it has not finished within a time limit.
pub struct TimeoutStep {
    step: BoxedStep,
    timeout_ms: u64,
    start_ms: u64,
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl TimeoutStep {
    pub fn new(step: BoxedStep, timeout_ms: u64) -> Self {
        Self {
            step,
            timeout_ms,
            start_ms: 0,
        }
    }

    pub fn timeout_ms(&self) -> u64 {
        self.timeout_ms
    }

    fn timed_out(&self, robot: &Robot) -> bool {
        robot.now_ms().saturating_sub(self.start_ms) >= self.timeout_ms
    }
}

impl Step for TimeoutStep {
    fn on_start(&mut self, robot: &Robot) {
        self.start_ms = robot.now_ms();
        self.step.on_start(robot);
    }

    fn on_update(&mut self, robot: &Robot) {
        self.step.on_update(robot);
    }

    fn on_stop(&mut self, robot: &Robot) {
        if !self.step.check_finished(robot) && self.timed_out(robot) {
            warn!(
                "{} timed out after {} ms",
                self.step.name(),
                self.timeout_ms
            );
        }

        self.step.on_stop(robot);
    }

    fn check_finished(&self, robot: &Robot) -> bool {
        self.step.check_finished(robot) || self.timed_out(robot)
    }

    fn name(&self) -> &str {
        "Timeout"
    }
}
