//! Rotate-to-heading controller

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use log::{trace, warn};
use util::maths::{actuator_demand, ang_dist, clamp_magnitude};

use super::{params::RotateOptions, pid::PidController};
use crate::{robot::Robot, step::Step};

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

/// Step turning the robot on the spot to a target heading.
pub struct RotateToHeading {
    options: RotateOptions,
    target_rad: f64,
    ctrl: PidController,
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl RotateToHeading {
    pub fn new(target_rad: f64, options: RotateOptions) -> Self {
        Self {
            options,
            target_rad,
            ctrl: PidController::new(options.gains),
        }
    }

    pub fn target_rad(&self) -> f64 {
        self.target_rad
    }

    /// Heading error from `heading_rad` to the target.
    pub fn error(&self, heading_rad: f64) -> f64 {
        if self.options.wrap {
            ang_dist(heading_rad, self.target_rad)
        } else {
            self.target_rad - heading_rad
        }
    }

    /// Calculate the turn demand for the given heading.
    pub fn calc_turn(&mut self, heading_rad: f64, now_ms: u64) -> f64 {
        if !heading_rad.is_finite() {
            warn!("Non-finite heading, holding position");
            return 0.0;
        }

        let error = self.error(heading_rad);
        let out = self.ctrl.get(error, now_ms).abs() * error.signum();

        // signum of zero is one, so a zero error must give a zero demand explicitly
        let turn = if error == 0.0 {
            0.0
        } else {
            clamp_magnitude(out, self.options.min_speed, self.options.max_speed)
        };

        trace!("RotateToHeading: error {:.4} rad, turn {:.3}", error, turn);
        turn
    }
}

impl Step for RotateToHeading {
    fn on_start(&mut self, _robot: &Robot) {
        self.ctrl.reset();
    }

    fn on_update(&mut self, robot: &Robot) {
        let turn = self.calc_turn(robot.pose().rotation, robot.now_ms());
        robot.chassis.drive(0.0, actuator_demand(turn), 0.0);
    }

    fn on_stop(&mut self, robot: &Robot) {
        robot.chassis.stop();
    }

    fn check_finished(&self, robot: &Robot) -> bool {
        self.error(robot.pose().rotation).abs() < self.options.goal_dist
            && robot.odom.get_angular_velocity().abs() < self.options.goal_speed
    }

    fn name(&self) -> &str {
        "RotateToHeading"
    }
}
