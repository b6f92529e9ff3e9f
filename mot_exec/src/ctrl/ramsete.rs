//! # Ramsete controller
//!
//! Tracks a time-parameterised trajectory. The trajectory's velocities are fed forward, and the
//! error between the robot and the setpoint, expressed in the robot's own frame, is fed back with
//! a gain that grows with the setpoint's speed.
//!
//! Odometry lags the true pose by the configured latency, so the feedback compares the measured
//! pose against where the robot should have been that long ago, while the feed-forward uses the
//! current setpoint.

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use std::sync::Arc;

use drive_if::Pose;
use log::trace;
use serde::Serialize;
use util::{
    maths::{actuator_demand, ang_dist, deadband, finite_or_zero, sinc},
    time::ms_to_s,
};

use super::params::RamseteOptions;
use crate::{robot::Robot, step::Step, traj::Trajectory};

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

/// Step following a trajectory.
pub struct Ramsete {
    trajectory: Arc<Trajectory>,
    options: RamseteOptions,
    start_ms: u64,
    report: RamseteReport,
}

/// Values calculated on the last update.
#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct RamseteReport {
    pub elapsed_s: f64,
    pub error_x: f64,
    pub error_y: f64,
    pub error_rad: f64,
    pub gain: f64,
    pub velocity: f64,
    pub angular_velocity: f64,
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl Ramsete {
    pub fn new(trajectory: Arc<Trajectory>, options: RamseteOptions) -> Self {
        Self {
            trajectory,
            options,
            start_ms: 0,
            report: RamseteReport::default(),
        }
    }

    pub fn report(&self) -> &RamseteReport {
        &self.report
    }

    /// Calculate the commanded `(velocity, angular_velocity)` for the measured `pose` at
    /// `elapsed_s` into the trajectory.
    pub fn calc_velocities(&mut self, pose: &Pose, elapsed_s: f64) -> (f64, f64) {
        let ff = self.trajectory.get_state_at(elapsed_s);
        let fb = self
            .trajectory
            .get_state_at(elapsed_s - ms_to_s(self.options.latency_ms));

        // Error in the robot frame
        let dx = fb.pose.x - pose.x;
        let dy = fb.pose.y - pose.y;
        let (sin, cos) = pose.rotation.sin_cos();
        let error_x = cos * dx + sin * dy;
        let error_y = -sin * dx + cos * dy;
        let error_rad = ang_dist(pose.rotation, fb.pose.rotation);

        let v_d = ff.velocity;
        let w_d = ff.angular_velocity;
        let b = self.options.b;

        let gain = 2.0 * self.options.zeta * (w_d * w_d + b * v_d * v_d).sqrt();

        let velocity = v_d * error_rad.cos() + gain * error_x;
        let angular_velocity = w_d + gain * error_rad + b * v_d * sinc(error_rad) * error_y;

        self.report = RamseteReport {
            elapsed_s,
            error_x,
            error_y,
            error_rad,
            gain,
            velocity,
            angular_velocity,
        };
        trace!("Ramsete: {:?}", self.report);

        (finite_or_zero(velocity), finite_or_zero(angular_velocity))
    }

    /// Scale, deadband, and clamp velocities into `(forward, turn)` demands.
    pub fn to_demands(&self, velocity: f64, angular_velocity: f64) -> (f64, f64) {
        let o = &self.options;
        let shape = |v: f64| {
            let max = o.max_output.abs();
            deadband(v, o.deadband).clamp(-max, max)
        };

        (
            shape(velocity * o.k_linear),
            shape(angular_velocity * o.k_angular),
        )
    }

    fn elapsed_s(&self, robot: &Robot) -> f64 {
        ms_to_s(robot.now_ms().saturating_sub(self.start_ms))
    }
}

impl Step for Ramsete {
    fn on_start(&mut self, robot: &Robot) {
        self.start_ms = robot.now_ms();
    }

    fn on_update(&mut self, robot: &Robot) {
        let elapsed_s = self.elapsed_s(robot);
        let (v, w) = self.calc_velocities(&robot.pose(), elapsed_s);
        let (forward, turn) = self.to_demands(v, w);
        robot
            .chassis
            .drive(actuator_demand(forward), actuator_demand(turn), 0.0);
    }

    fn on_stop(&mut self, robot: &Robot) {
        robot.chassis.stop();
    }

    fn check_finished(&self, robot: &Robot) -> bool {
        self.elapsed_s(robot) > self.trajectory.duration_s()
    }

    fn name(&self) -> &str {
        "Ramsete"
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::path::{ControlPoint, SplinePath};
    use crate::sim::{SimParams, SimRover};
    use crate::step::run_sync;
    use crate::traj::{TrajectoryConstraints, TrajectoryGenerator};
    use drive_if::{Clock, Odometry};

    fn trajectory() -> Arc<Trajectory> {
        let path = SplinePath::new(vec![
            ControlPoint::with_handles(Pose::new(0.0, 0.0, 0.0), 0.0, 20.0),
            ControlPoint::with_handles(Pose::new(48.0, 24.0, 0.0), 20.0, 0.0),
        ])
        .unwrap();

        Arc::new(
            TrajectoryGenerator::new(TrajectoryConstraints::default())
                .unwrap()
                .generate(&path)
                .unwrap(),
        )
    }

    #[test]
    fn test_on_trajectory_gives_feed_forward() {
        let traj = trajectory();
        let mut ctrl = Ramsete::new(traj.clone(), RamseteOptions::default());

        let s = traj.get_state_at(0.7);
        let (v, w) = ctrl.calc_velocities(&s.pose, 0.7);
        assert!((v - s.velocity).abs() < 1e-9);
        assert!((w - s.angular_velocity).abs() < 1e-9);
    }

    #[test]
    fn test_zero_heading_error_stays_finite() {
        let traj = trajectory();
        let mut ctrl = Ramsete::new(traj.clone(), RamseteOptions::default());

        // Offset sideways only, heading matches exactly
        let s = traj.get_state_at(1.0);
        let pose = Pose::new(
            s.pose.x - 2.0 * s.pose.rotation.sin(),
            s.pose.y + 2.0 * s.pose.rotation.cos(),
            s.pose.rotation,
        );
        let (v, w) = ctrl.calc_velocities(&pose, 1.0);

        assert!(v.is_finite() && w.is_finite());
        assert_eq!(ctrl.report().error_rad, 0.0);
        assert!((ctrl.report().error_y + 2.0).abs() < 1e-9);

        // Robot is left of the setpoint so it should turn right
        assert!(w < s.angular_velocity);
    }

    #[test]
    fn test_demand_shaping() {
        let ctrl = Ramsete::new(
            trajectory(),
            RamseteOptions {
                k_linear: 0.1,
                k_angular: 0.5,
                deadband: 0.05,
                max_output: 0.8,
                ..Default::default()
            },
        );

        assert_eq!(ctrl.to_demands(100.0, -100.0), (0.8, -0.8));
        assert_eq!(ctrl.to_demands(0.3, 0.05), (0.0, 0.0));
        let (f, t) = ctrl.to_demands(5.0, 1.0);
        assert!((f - 0.5).abs() < 1e-12 && (t - 0.5).abs() < 1e-12);
    }

    #[test]
    fn test_latency_uses_earlier_setpoint() {
        let traj = trajectory();
        let mut ctrl = Ramsete::new(
            traj.clone(),
            RamseteOptions {
                latency_ms: 200,
                ..Default::default()
            },
        );

        // Sat exactly where the robot should have been 200 ms ago: no feedback error
        let earlier = traj.get_state_at(0.8);
        ctrl.calc_velocities(&earlier.pose, 1.0);
        assert!(ctrl.report().error_x.abs() < 1e-9);
        assert!(ctrl.report().error_y.abs() < 1e-9);
    }

    #[test]
    fn test_tracks_in_sim() {
        let traj = trajectory();
        let rover = SimRover::new(SimParams::default(), traj.first().pose);

        let mut step = Ramsete::new(traj.clone(), RamseteOptions::default());
        run_sync(&mut step, &rover.robot(), 10);

        assert!(ms_to_s(rover.now_ms()) > traj.duration_s());
        assert!(rover.get_pose().distance_to(&traj.last().pose) < 2.0);
        assert!(rover.last_dems().is_neutral());
    }
}
