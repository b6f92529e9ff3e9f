//! # Motion controllers
//!
//! Each controller is a [`crate::step::Step`] which reads the robot's pose from odometry and
//! commands the chassis every update, stopping the chassis when it ends.
//!
//! - [`DriveToPose`] - drive to a point, forwards or in reverse,
//! - [`RotateToHeading`] - turn on the spot,
//! - [`Boomerang`] - curved approach to a pose,
//! - [`PurePursuit`] - follow a dense path,
//! - [`Ramsete`] - track a time-parameterised trajectory.

// ------------------------------------------------------------------------------------------------
// MODULES
// ------------------------------------------------------------------------------------------------

mod boomerang;
mod drive;
pub mod params;
mod pid;
mod pure_pursuit;
mod ramsete;
mod rotate;

// ------------------------------------------------------------------------------------------------
// EXPORTS
// ------------------------------------------------------------------------------------------------

pub use boomerang::{carrot_point, Boomerang};
pub use drive::{is_ahead, projected_distance, DriveReport, DriveToPose};
pub use params::{
    BoomerangOptions, DriveOptions, PurePursuitOptions, RamseteOptions, RotateOptions,
};
pub use pid::{PidController, PidGains};
pub use pure_pursuit::{EventHandler, PurePursuit};
pub use ramsete::{Ramsete, RamseteReport};
pub use rotate::RotateToHeading;
