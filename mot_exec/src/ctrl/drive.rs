//! # Drive-to-pose controller
//!
//! Drives the robot to a target position. Progress is measured as the projection of the robot's
//! position onto the line from where the motion started to the target, rather than the straight
//! line distance, so that a robot pushed off the line does not cut the corner back to it. Whether
//! the target lies ahead of or behind the robot picks the direction of travel, so targets behind
//! the robot are reached by reversing.

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use std::f64::consts::PI;

use drive_if::Pose;
use log::{trace, warn};
use serde::Serialize;
use util::maths::{actuator_demand, ang_dist, slew};

use super::{params::DriveOptions, pid::PidController};
use crate::{robot::Robot, step::Step};

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

/// Step driving the robot to a target pose.
pub struct DriveToPose {
    options: DriveOptions,
    target: Pose,
    start_pose: Pose,

    trans_ctrl: PidController,
    rot_ctrl: PidController,

    prev_forward: f64,
    report: DriveReport,
}

/// Values calculated on the last update, for logging and tuning.
#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct DriveReport {
    pub projected_dist: f64,
    pub head_error_rad: f64,
    pub reversing: bool,
    pub forward: f64,
    pub turn: f64,
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl DriveToPose {
    pub fn new(target: Pose, options: DriveOptions) -> Self {
        Self {
            options,
            target,
            start_pose: Pose::default(),
            trans_ctrl: PidController::new(options.translation),
            rot_ctrl: PidController::new(options.rotation),
            prev_forward: 0.0,
            report: DriveReport::default(),
        }
    }

    pub fn target(&self) -> Pose {
        self.target
    }

    /// Move the target without restarting the motion. The start pose is kept.
    pub fn set_target(&mut self, target: Pose) {
        self.target = target;
    }

    /// Replace the pose progress is measured from.
    pub fn set_start_pose(&mut self, start_pose: Pose) {
        self.start_pose = start_pose;
    }

    /// Pose the robot was in when the motion started.
    pub fn start_pose(&self) -> Pose {
        self.start_pose
    }

    pub fn options(&self) -> &DriveOptions {
        &self.options
    }

    pub fn report(&self) -> &DriveReport {
        &self.report
    }

    /// True when the robot is within the goal distance of `target`, measured along the line from
    /// the start pose, and has slowed below the goal speed.
    pub fn at_goal(&self, robot: &Robot, target: &Pose) -> bool {
        let pose = robot.pose();
        projected_distance(&self.start_pose, target, &pose).abs() < self.options.goal_dist
            && robot.speed() < self.options.goal_speed
    }

    /// Calculate the `(forward, turn)` demands for the given pose.
    pub fn calc_demands(&mut self, pose: &Pose, now_ms: u64) -> (f64, f64) {
        if !pose.is_finite() {
            warn!("Non-finite pose {:?}, holding position", pose);
            self.prev_forward = 0.0;
            return (0.0, 0.0);
        }

        let dist = projected_distance(&self.start_pose, &self.target, pose);
        let ahead = is_ahead(pose, &self.target);
        let dir = if ahead { 1.0 } else { -1.0 };

        // Translation
        let max_speed = self.options.max_speed;
        let forward = self
            .trans_ctrl
            .get(dist.abs() * dir, now_ms)
            .clamp(-max_speed, max_speed);
        let forward = slew(self.prev_forward, forward, self.options.slew_rate);
        self.prev_forward = forward;

        // Rotation, only once close enough to be worth it, and not once on top of the target
        // where the heading to it is meaningless.
        let head_error_rad = if ahead {
            ang_dist(pose.rotation, pose.heading_to(&self.target))
        } else {
            ang_dist(pose.rotation, pose.heading_to(&self.target) + PI)
        };

        let turn = if dist.abs() > self.options.min_distance_to_rotate
            || pose.distance_to(&self.target) < self.options.goal_dist
        {
            self.rot_ctrl.reset();
            0.0
        } else {
            let max_turn = self.options.max_turn;
            self.rot_ctrl
                .get(head_error_rad, now_ms)
                .clamp(-max_turn, max_turn)
        };

        self.report = DriveReport {
            projected_dist: dist,
            head_error_rad,
            reversing: !ahead,
            forward,
            turn,
        };
        trace!("DriveToPose: {:?}", self.report);

        (forward, turn)
    }
}

impl Step for DriveToPose {
    fn on_start(&mut self, robot: &Robot) {
        self.start_pose = robot.pose();
        self.trans_ctrl.reset();
        self.rot_ctrl.reset();
        self.prev_forward = 0.0;
    }

    fn on_update(&mut self, robot: &Robot) {
        let pose = robot.pose();
        let (forward, turn) = self.calc_demands(&pose, robot.now_ms());
        robot
            .chassis
            .drive(actuator_demand(forward), actuator_demand(turn), 0.0);
    }

    fn on_stop(&mut self, robot: &Robot) {
        robot.chassis.stop();
    }

    fn check_finished(&self, robot: &Robot) -> bool {
        self.at_goal(robot, &self.target)
    }

    fn name(&self) -> &str {
        "DriveToPose"
    }
}

// ------------------------------------------------------------------------------------------------
// FUNCTIONS
// ------------------------------------------------------------------------------------------------

/// Signed distance remaining to `target`, measured along the line from `start` to `target`.
///
/// Positive while `pose` has not yet reached the target along that line, negative once past it.
/// If `start` and `target` coincide there is no line, and the straight line distance is used.
pub fn projected_distance(start: &Pose, target: &Pose, pose: &Pose) -> f64 {
    let line = target.position() - start.position();
    let len = line.norm();

    if len < 1e-9 {
        return pose.distance_to(target);
    }

    (target.position() - pose.position()).dot(&(line / len))
}

/// True if `target` lies ahead of `pose`, judging by its facing direction. A target exactly
/// abeam counts as ahead.
pub fn is_ahead(pose: &Pose, target: &Pose) -> bool {
    pose.forward2()
        .dot(&(target.position() - pose.position()))
        >= 0.0
}
