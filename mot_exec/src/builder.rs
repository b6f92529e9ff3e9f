//! # Mission builder
//!
//! Missions are written as a chain of motion commands which the builder records and then turns
//! into a [`ListStep`]. Commands may be absolute ("drive to this pose") or relative to wherever
//! the previous command leaves the robot ("drive 24 forward", "turn 90 degrees left"). Relative
//! commands are resolved when the mission is built, by tracking the pose the robot is expected to
//! be in after each command, starting from the builder's start pose.
//!
//! ```ignore
//! let mission = MissionBuilder::new(options)
//!     .set_pose(Pose::new(0.0, 0.0, 0.0))
//!     .drive(24.0)
//!     .rotate(FRAC_PI_2)
//!     .pause(500)
//!     .drive_to(Pose::new(24.0, 24.0, 0.0))
//!     .build()?;
//! ```

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use std::{f64::consts::PI, sync::Arc};

use drive_if::Pose;
use log::debug;
use serde::{Deserialize, Serialize};
use util::maths::ang_dist;

use crate::{
    ctrl::{
        is_ahead, Boomerang, BoomerangOptions, DriveOptions, DriveToPose, PurePursuit,
        PurePursuitOptions, Ramsete, RamseteOptions, RotateOptions, RotateToHeading,
    },
    path::GeneratedPath,
    step::{AsyncStep, BoxedStep, ListStep, SetPoseStep, TimeoutStep, WaitStep},
    traj::Trajectory,
};

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

/// Default options for every kind of motion in a mission.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct MissionOptions {
    pub drive: DriveOptions,
    pub rotate: RotateOptions,
    pub boomerang: BoomerangOptions,
    pub pure_pursuit: PurePursuitOptions,
    pub ramsete: RamseteOptions,

    /// Update period of steps run in the background, in milliseconds
    pub async_tick_ms: u64,
}

/// Records motion commands and builds them into a mission.
pub struct MissionBuilder {
    options: MissionOptions,
    start_pose: Pose,
    cmds: Vec<MotionCmd>,
}

// ------------------------------------------------------------------------------------------------
// ENUMS
// ------------------------------------------------------------------------------------------------

/// Where a drive command goes.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum DriveTarget {
    /// A pose in the field
    To(Pose),

    /// A distance along the expected heading, negative to reverse
    By(f64),
}

/// Where a rotate command turns to.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum RotateTarget {
    /// A heading in the field
    To(f64),

    /// An angle from the expected heading, positive to the left
    By(f64),
}

/// A recorded command.
pub enum MotionCmd {
    Drive {
        target: DriveTarget,
        options: DriveOptions,
    },
    Rotate {
        target: RotateTarget,
        options: RotateOptions,
    },
    JumpTo(Pose),
    Custom {
        step: BoxedStep,

        /// Where the robot is expected to be afterwards, if the step moves it somewhere known
        end_pose: Option<Pose>,

        /// Time limit in milliseconds, zero for none
        timeout_ms: u64,
    },
}

#[derive(Debug, thiserror::Error)]
pub enum BuildError {
    #[error("Command {index} has a non-finite target: {target}")]
    NonFiniteTarget { index: usize, target: String },
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl Default for MissionOptions {
    fn default() -> Self {
        Self {
            drive: DriveOptions::default(),
            rotate: RotateOptions::default(),
            boomerang: BoomerangOptions::default(),
            pure_pursuit: PurePursuitOptions::default(),
            ramsete: RamseteOptions::default(),
            async_tick_ms: 10,
        }
    }
}

impl MissionBuilder {
    pub fn new(options: MissionOptions) -> Self {
        Self {
            options,
            start_pose: Pose::default(),
            cmds: Vec::new(),
        }
    }

    /// Pose the robot is expected to start the mission in. Relative commands before the first
    /// absolute one are resolved from here.
    pub fn starting_at(mut self, pose: Pose) -> Self {
        self.start_pose = pose;
        self
    }

    pub fn options(&self) -> &MissionOptions {
        &self.options
    }

    pub fn commands(&self) -> &[MotionCmd] {
        &self.cmds
    }

    /// Overwrite the odometry pose.
    pub fn set_pose(mut self, pose: Pose) -> Self {
        self.cmds.push(MotionCmd::JumpTo(pose));
        self
    }

    /// Drive to a pose with the default drive options.
    pub fn drive_to(self, pose: Pose) -> Self {
        let options = self.options.drive;
        self.drive_to_with(pose, options)
    }

    pub fn drive_to_with(mut self, pose: Pose, options: DriveOptions) -> Self {
        self.cmds.push(MotionCmd::Drive {
            target: DriveTarget::To(pose),
            options,
        });
        self
    }

    /// Drive a distance along the expected heading, backwards if negative.
    pub fn drive(self, distance: f64) -> Self {
        let options = self.options.drive;
        self.drive_with(distance, options)
    }

    pub fn drive_with(mut self, distance: f64, options: DriveOptions) -> Self {
        self.cmds.push(MotionCmd::Drive {
            target: DriveTarget::By(distance),
            options,
        });
        self
    }

    /// Turn to a heading in the field.
    pub fn rotate_to(self, heading_rad: f64) -> Self {
        let options = self.options.rotate;
        self.rotate_to_with(heading_rad, options)
    }

    pub fn rotate_to_with(mut self, heading_rad: f64, options: RotateOptions) -> Self {
        self.cmds.push(MotionCmd::Rotate {
            target: RotateTarget::To(heading_rad),
            options,
        });
        self
    }

    /// Turn by an angle from the expected heading.
    ///
    /// The turn is made exactly as given, so turning by more than half a revolution goes the
    /// long way round.
    pub fn rotate(self, angle_rad: f64) -> Self {
        let options = RotateOptions {
            wrap: false,
            ..self.options.rotate
        };
        self.rotate_with(angle_rad, options)
    }

    pub fn rotate_with(mut self, angle_rad: f64, options: RotateOptions) -> Self {
        self.cmds.push(MotionCmd::Rotate {
            target: RotateTarget::By(angle_rad),
            options,
        });
        self
    }

    /// Hold still for a time.
    pub fn pause(self, duration_ms: u64) -> Self {
        self.then(Box::new(WaitStep::new(duration_ms)))
    }

    /// Approach a pose along a curve.
    pub fn boomerang_to(self, pose: Pose) -> Self {
        let options = self.options.boomerang;
        let timeout_ms = options.drive.timeout_ms;
        self.push_custom(Box::new(Boomerang::new(pose, options)), Some(pose), timeout_ms)
    }

    /// Follow a generated path with pure pursuit.
    pub fn follow_path(self, path: Arc<GeneratedPath>) -> Self {
        let options = self.options.pure_pursuit;
        self.follow_path_with(PurePursuit::new(path.clone(), options), path)
    }

    /// Follow a generated path with a pure pursuit controller set up by the caller, for example
    /// with an event handler.
    pub fn follow_path_with(self, follower: PurePursuit, path: Arc<GeneratedPath>) -> Self {
        let timeout_ms = self.options.pure_pursuit.drive.timeout_ms;
        self.push_custom(Box::new(follower), path.end_pose(), timeout_ms)
    }

    /// Track a trajectory with Ramsete.
    pub fn follow_trajectory(self, trajectory: Arc<Trajectory>) -> Self {
        let options = self.options.ramsete;
        let end_pose = Some(trajectory.last().pose);
        self.push_custom(
            Box::new(Ramsete::new(trajectory, options)),
            end_pose,
            options.timeout_ms,
        )
    }

    /// Run any step. The expected pose is assumed unchanged by it.
    pub fn then(self, step: BoxedStep) -> Self {
        self.push_custom(step, None, 0)
    }

    /// Run any step, after which the robot is expected to be at `end_pose`.
    pub fn then_ending_at(self, step: BoxedStep, end_pose: Pose) -> Self {
        self.push_custom(step, Some(end_pose), 0)
    }

    /// Start a step in the background and carry straight on with the next command.
    pub fn run_async(self, step: BoxedStep) -> Self {
        let tick_ms = self.options.async_tick_ms;
        self.then(Box::new(AsyncStep::new(step, tick_ms)))
    }

    fn push_custom(mut self, step: BoxedStep, end_pose: Option<Pose>, timeout_ms: u64) -> Self {
        self.cmds.push(MotionCmd::Custom {
            step,
            end_pose,
            timeout_ms,
        });
        self
    }

    /// Resolve relative commands and build the mission.
    pub fn build(self) -> Result<ListStep, BuildError> {
        let mut expected = self.start_pose;
        let mut steps: Vec<BoxedStep> = Vec::with_capacity(self.cmds.len());

        for (index, cmd) in self.cmds.into_iter().enumerate() {
            let step: BoxedStep = match cmd {
                MotionCmd::JumpTo(pose) => {
                    check_pose(index, &pose)?;
                    expected = pose;
                    Box::new(SetPoseStep::new(pose))
                }
                MotionCmd::Drive { target, options } => {
                    let pose = match target {
                        DriveTarget::To(pose) => pose,
                        DriveTarget::By(distance) => Pose::from_position(
                            expected.position() + expected.forward2() * distance,
                            expected.rotation,
                        ),
                    };
                    check_pose(index, &pose)?;
                    debug!("Command {}: drive to {:?}", index, pose);

                    expected = Pose {
                        rotation: heading_after_drive(&expected, &pose),
                        ..pose
                    };
                    with_timeout(Box::new(DriveToPose::new(pose, options)), options.timeout_ms)
                }
                MotionCmd::Rotate { target, options } => {
                    let heading = match target {
                        RotateTarget::To(heading) => heading,
                        RotateTarget::By(angle) => expected.rotation + angle,
                    };
                    if !heading.is_finite() {
                        return Err(BuildError::NonFiniteTarget {
                            index,
                            target: format!("heading {}", heading),
                        });
                    }
                    debug!("Command {}: rotate to {:.3} rad", index, heading);

                    expected.rotation = heading;
                    with_timeout(
                        Box::new(RotateToHeading::new(heading, options)),
                        options.timeout_ms,
                    )
                }
                MotionCmd::Custom {
                    step,
                    end_pose,
                    timeout_ms,
                } => {
                    if let Some(pose) = end_pose {
                        check_pose(index, &pose)?;
                        expected = pose;
                    }
                    with_timeout(step, timeout_ms)
                }
            };

            steps.push(step);
        }

        Ok(ListStep::new(steps))
    }
}

// ------------------------------------------------------------------------------------------------
// FUNCTIONS
// ------------------------------------------------------------------------------------------------

fn check_pose(index: usize, pose: &Pose) -> Result<(), BuildError> {
    if pose.is_finite() {
        Ok(())
    } else {
        Err(BuildError::NonFiniteTarget {
            index,
            target: format!("{:?}", pose),
        })
    }
}

/// Heading the robot is expected to have after driving from `from` to `to`, which is along the
/// line between them, facing away from `from` unless reversing.
fn heading_after_drive(from: &Pose, to: &Pose) -> f64 {
    if from.distance_to(to) < 1e-9 {
        return from.rotation;
    }

    let mut heading = from.heading_to(to);
    if !is_ahead(from, to) {
        heading += PI;
    }

    from.rotation + ang_dist(from.rotation, heading)
}

fn with_timeout(step: BoxedStep, timeout_ms: u64) -> BoxedStep {
    if timeout_ms > 0 {
        Box::new(TimeoutStep::new(step, timeout_ms))
    } else {
        step
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::sim::{SimParams, SimRover};
    use crate::step::{run_sync, FnStep};
    use drive_if::{Clock, Odometry};
    use std::f64::consts::FRAC_PI_2;

    fn options() -> MissionOptions {
        let mut options = MissionOptions::default();
        options.drive.timeout_ms = 10_000;
        options.rotate.timeout_ms = 5_000;
        options
    }

    #[test]
    fn test_relative_square() {
        let rover = SimRover::new(SimParams::default(), Pose::new(100.0, 100.0, 0.0));

        let mut mission = MissionBuilder::new(options())
            .set_pose(Pose::default())
            .drive(24.0)
            .rotate(FRAC_PI_2)
            .drive(24.0)
            .rotate(FRAC_PI_2)
            .drive(-24.0)
            .build()
            .unwrap();
        assert_eq!(mission.len(), 6);

        run_sync(&mut mission, &rover.robot(), 10);

        // Up the right side then reversing away from the top edge
        let pose = rover.get_pose();
        assert!((pose.x - 48.0).abs() < 1.5, "{:?}", pose);
        assert!((pose.y - 24.0).abs() < 1.5, "{:?}", pose);
        assert!(ang_dist(pose.rotation, PI).abs() < 0.1);
    }

    #[test]
    fn test_absolute_then_relative() {
        let rover = SimRover::new(SimParams::default(), Pose::default());

        let mut mission = MissionBuilder::new(options())
            .rotate_to(FRAC_PI_2)
            .drive(12.0)
            .build()
            .unwrap();
        run_sync(&mut mission, &rover.robot(), 10);

        let pose = rover.get_pose();
        assert!(pose.x.abs() < 1.0);
        assert!((pose.y - 12.0).abs() < 1.0);
    }

    #[test]
    fn test_pause_and_custom() {
        let rover = SimRover::new(SimParams::default(), Pose::default());

        let mut mission = MissionBuilder::new(options())
            .pause(200)
            .then(Box::new(FnStep::once("mark", |robot| {
                robot.odom.set_pose(Pose::new(1.0, 1.0, 0.0))
            })))
            .build()
            .unwrap();
        run_sync(&mut mission, &rover.robot(), 10);

        assert!(rover.now_ms() >= 200);
        assert_eq!(rover.get_pose(), Pose::new(1.0, 1.0, 0.0));
    }

    #[test]
    fn test_non_finite_target_rejected() {
        let result = MissionBuilder::new(options())
            .drive(10.0)
            .drive_to(Pose::new(f64::NAN, 0.0, 0.0))
            .build();
        assert!(matches!(
            result,
            Err(BuildError::NonFiniteTarget { index: 1, .. })
        ));

        let result = MissionBuilder::new(options()).rotate(f64::INFINITY).build();
        assert!(matches!(result, Err(BuildError::NonFiniteTarget { .. })));
    }

    #[test]
    fn test_expected_heading_after_drive() {
        let from = Pose::new(0.0, 0.0, 0.1);
        assert!((heading_after_drive(&from, &Pose::new(0.0, 10.0, 0.0)) - FRAC_PI_2).abs() < 1e-9);

        // Reversing keeps facing away from the target
        let h = heading_after_drive(&from, &Pose::new(-10.0, 0.0, 0.0));
        assert!(h.abs() < 1e-9);

        assert_eq!(heading_after_drive(&from, &from), 0.1);
    }

    #[test]
    fn test_timeouts_wrap_steps() {
        let mut opts = options();
        opts.drive.timeout_ms = 100;

        // Would take far longer than the timeout
        let rover = SimRover::new(SimParams::default(), Pose::default());
        let mut mission = MissionBuilder::new(opts).drive(1000.0).build().unwrap();
        run_sync(&mut mission, &rover.robot(), 10);

        assert_eq!(rover.now_ms(), 100);
        assert!(rover.last_dems().is_neutral());
    }
}
