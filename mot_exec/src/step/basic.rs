//! Simple leaf steps: pauses, odometry resets, and user supplied actions.

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use drive_if::Pose;
use log::info;

use super::Step;
use crate::robot::Robot;

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

/// Holds the chassis at neutral for a fixed time.
pub struct WaitStep {
    duration_ms: u64,
    start_ms: u64,
}

/// Overwrites the odometry pose, finishing immediately.
pub struct SetPoseStep {
    pose: Pose,
}

/// A step built from a closure which is called every update and returns true when done.
pub struct FnStep {
    name: String,
    func: Box<dyn FnMut(&Robot) -> bool + Send>,
    finished: bool,
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl WaitStep {
    pub fn new(duration_ms: u64) -> Self {
        Self {
            duration_ms,
            start_ms: 0,
        }
    }
}

impl Step for WaitStep {
    fn on_start(&mut self, robot: &Robot) {
        self.start_ms = robot.now_ms();
        robot.chassis.stop();
    }

    fn on_update(&mut self, _robot: &Robot) {}

    fn on_stop(&mut self, robot: &Robot) {
        robot.chassis.stop();
    }

    fn check_finished(&self, robot: &Robot) -> bool {
        robot.now_ms().saturating_sub(self.start_ms) >= self.duration_ms
    }

    fn name(&self) -> &str {
        "Wait"
    }
}

impl SetPoseStep {
    pub fn new(pose: Pose) -> Self {
        Self { pose }
    }
}

impl Step for SetPoseStep {
    fn on_start(&mut self, robot: &Robot) {
        info!("Odometry pose set to {:?}", self.pose);
        robot.odom.set_pose(self.pose);
    }

    fn on_update(&mut self, _robot: &Robot) {}

    fn on_stop(&mut self, _robot: &Robot) {}

    fn check_finished(&self, _robot: &Robot) -> bool {
        true
    }

    fn name(&self) -> &str {
        "SetPose"
    }
}

impl FnStep {
    pub fn new<F>(name: &str, func: F) -> Self
    where
        F: FnMut(&Robot) -> bool + Send + 'static,
    {
        Self {
            name: name.to_string(),
            func: Box::new(func),
            finished: false,
        }
    }

    /// A step which runs `func` once and finishes.
    pub fn once<F>(name: &str, mut func: F) -> Self
    where
        F: FnMut(&Robot) + Send + 'static,
    {
        Self::new(name, move |robot| {
            func(robot);
            true
        })
    }
}

impl Step for FnStep {
    fn on_start(&mut self, _robot: &Robot) {
        self.finished = false;
    }

    fn on_update(&mut self, robot: &Robot) {
        self.finished = (self.func)(robot);
    }

    fn on_stop(&mut self, _robot: &Robot) {}

    fn check_finished(&self, _robot: &Robot) -> bool {
        self.finished
    }

    fn name(&self) -> &str {
        &self.name
    }
}
