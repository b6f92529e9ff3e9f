//! # Boomerang controller
//!
//! Approaches a target pose along a curve, so the robot arrives facing roughly along the target's
//! heading. Each update the drive-to-pose target is replaced by a "carrot" set back from the true
//! target along the target's heading, by a fraction of the distance still to go. The carrot
//! converges onto the target as the robot closes in.

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use drive_if::Pose;

use super::{drive::is_ahead, params::BoomerangOptions, DriveToPose};
use crate::{robot::Robot, step::Step};

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

/// Step driving to a pose along a curved approach.
pub struct Boomerang {
    target: Pose,
    lead: f64,
    drive: DriveToPose,
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl Boomerang {
    pub fn new(target: Pose, options: BoomerangOptions) -> Self {
        Self {
            target,
            lead: options.lead,
            drive: DriveToPose::new(target, options.drive),
        }
    }

    pub fn target(&self) -> Pose {
        self.target
    }

    /// The carrot most recently chased.
    pub fn carrot(&self) -> Pose {
        self.drive.target()
    }
}

impl Step for Boomerang {
    fn on_start(&mut self, robot: &Robot) {
        self.drive.set_target(carrot_point(&robot.pose(), &self.target, self.lead));
        self.drive.on_start(robot);
    }

    fn on_update(&mut self, robot: &Robot) {
        self.drive
            .set_target(carrot_point(&robot.pose(), &self.target, self.lead));
        self.drive.on_update(robot);
    }

    fn on_stop(&mut self, robot: &Robot) {
        self.drive.on_stop(robot);
    }

    fn check_finished(&self, robot: &Robot) -> bool {
        self.drive.at_goal(robot, &self.target)
    }

    fn name(&self) -> &str {
        "Boomerang"
    }
}

// ------------------------------------------------------------------------------------------------
// FUNCTIONS
// ------------------------------------------------------------------------------------------------

/// The intermediate point chased when approaching `target` from `pose`.
///
/// The carrot is `lead` times the remaining distance back along the target heading, or forward
/// along it if the target is behind the robot and will be reached in reverse.
pub fn carrot_point(pose: &Pose, target: &Pose, lead: f64) -> Pose {
    let offset = target.forward2() * (lead * pose.distance_to(target));

    let position = if is_ahead(pose, target) {
        target.position() - offset
    } else {
        target.position() + offset
    };

    Pose::from_position(position, target.rotation)
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::sim::{SimParams, SimRover};
    use crate::step::{run_sync, TimeoutStep};
    use drive_if::{Clock, Odometry};
    use std::f64::consts::FRAC_PI_2;

    #[test]
    fn test_carrot() {
        let target = Pose::new(20.0, 20.0, FRAC_PI_2);

        // Ahead, carrot is set back below the target
        let carrot = carrot_point(&Pose::new(0.0, 20.0, 0.0), &target, 0.5);
        assert!((carrot.x - 20.0).abs() < 1e-9);
        assert!((carrot.y - 10.0).abs() < 1e-9);
        assert_eq!(carrot.rotation, FRAC_PI_2);

        // Behind, carrot is set beyond it
        let carrot = carrot_point(&Pose::new(40.0, 20.0, 0.0), &target, 0.5);
        assert!((carrot.y - 30.0).abs() < 1e-9);

        // On top of the target the carrot is the target
        let carrot = carrot_point(&target, &target, 0.6);
        assert!(carrot.distance_to(&target) < 1e-12);
    }

    #[test]
    fn test_reaches_true_target() {
        let rover = SimRover::new(SimParams::default(), Pose::default());
        let target = Pose::new(36.0, 24.0, FRAC_PI_2);

        let mut step = TimeoutStep::new(
            Box::new(Boomerang::new(target, BoomerangOptions::default())),
            15_000,
        );
        run_sync(&mut step, &rover.robot(), 10);

        assert!(rover.now_ms() < 15_000);
        let pose = rover.get_pose();
        assert!(pose.distance_to(&target) < 4.0);
    }
}
