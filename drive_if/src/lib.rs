//! # Drive interface crate.
//!
//! Provides the interfaces between the motion core and the collaborators it runs against: the
//! chassis it commands, the odometry it reads, and the clock of the scheduler it is ticked by.

// ------------------------------------------------------------------------------------------------
// MODULES
// ------------------------------------------------------------------------------------------------

/// Command and sensing interfaces for equipment (chassis and odometry)
pub mod eqpt;

/// Field-frame pose value type
pub mod pose;

/// Scheduler clock interface
pub mod sched;

// ------------------------------------------------------------------------------------------------
// EXPORTS
// ------------------------------------------------------------------------------------------------

pub use eqpt::{
    chassis::{Chassis, DriveDems},
    odom::Odometry,
};
pub use pose::Pose;
pub use sched::{Clock, SystemClock};
