//! # Odometry Equipment Interface

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use nalgebra::Vector2;

use crate::pose::Pose;

// ------------------------------------------------------------------------------------------------
// TRAITS
// ------------------------------------------------------------------------------------------------

/// The robot's pose source.
///
/// The motion core treats every pose it receives as valid, fault detection is the responsibility
/// of the implementation.
pub trait Odometry: Send + Sync {
    /// The current pose of the robot in the field frame.
    fn get_pose(&self) -> Pose;

    /// Overwrite the current pose of the robot.
    fn set_pose(&self, pose: Pose);

    /// The linear velocity of the robot in the field frame, in field units per second.
    fn get_velocity(&self) -> Vector2<f64>;

    /// The angular velocity of the robot in radians per second, positive to the left.
    fn get_angular_velocity(&self) -> f64;
}
