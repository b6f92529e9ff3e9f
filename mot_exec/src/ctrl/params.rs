//! Tuning options for the motion controllers
//!
//! Every options struct can be loaded from a parameter file, with any missing values taking the
//! defaults given here. Distances are in field units and speeds in field units per second, except
//! where a value is a normalised actuator demand.

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use serde::{Deserialize, Serialize};

use super::pid::PidGains;

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

/// Options for [`super::DriveToPose`].
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct DriveOptions {
    /// Gains acting on the signed projected distance to the target
    pub translation: PidGains,

    /// Gains acting on the heading error to the target
    pub rotation: PidGains,

    /// Largest forward demand magnitude
    pub max_speed: f64,

    /// Largest turn demand magnitude
    pub max_turn: f64,

    /// Largest change in forward demand between two updates. Non-positive disables the limit.
    pub slew_rate: f64,

    /// The heading is only corrected once the projected distance is within this range
    pub min_distance_to_rotate: f64,

    /// Projected distance under which the target counts as reached
    pub goal_dist: f64,

    /// Speed under which the robot counts as stopped at the target
    pub goal_speed: f64,

    /// Time limit on the motion in milliseconds, zero for none
    pub timeout_ms: u64,
}

/// Options for [`super::RotateToHeading`].
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct RotateOptions {
    pub gains: PidGains,

    /// Largest turn demand magnitude
    pub max_speed: f64,

    /// Smallest non-zero turn demand magnitude, enough to overcome static friction
    pub min_speed: f64,

    /// Heading error under which the target counts as reached, in radians
    pub goal_dist: f64,

    /// Angular speed under which the robot counts as stopped, in radians per second
    pub goal_speed: f64,

    /// Use the shortest angular distance to the target. When false the raw difference is used,
    /// so a target several turns away is reached by turning that many times.
    pub wrap: bool,

    /// Time limit on the motion in milliseconds, zero for none
    pub timeout_ms: u64,
}

/// Options for [`super::Boomerang`].
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct BoomerangOptions {
    pub drive: DriveOptions,

    /// Fraction of the remaining distance by which the carrot is set back from the target
    pub lead: f64,
}

/// Options for [`super::PurePursuit`].
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct PurePursuitOptions {
    pub drive: DriveOptions,

    /// Distance ahead of the robot at which the path is chased
    pub lookahead: f64,
}

/// Options for [`super::Ramsete`].
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct RamseteOptions {
    /// Proportional gain parameter, larger values converge harder
    pub b: f64,

    /// Damping coefficient, in (0, 1)
    pub zeta: f64,

    /// Delay between the robot's true pose and the odometry reading of it, in milliseconds
    pub latency_ms: u64,

    /// Converts a linear velocity into a forward demand
    pub k_linear: f64,

    /// Converts an angular velocity into a turn demand
    pub k_angular: f64,

    /// Demands with a smaller magnitude than this are sent as zero
    pub deadband: f64,

    /// Largest demand magnitude
    pub max_output: f64,

    /// Time limit on the motion in milliseconds, zero for none
    pub timeout_ms: u64,
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl Default for DriveOptions {
    fn default() -> Self {
        Self {
            translation: PidGains::new(0.05, 0.0, 0.002),
            rotation: PidGains::new(1.0, 0.0, 0.0),
            max_speed: 1.0,
            max_turn: 1.0,
            slew_rate: 0.1,
            min_distance_to_rotate: 48.0,
            goal_dist: 0.5,
            goal_speed: 2.0,
            timeout_ms: 0,
        }
    }
}

impl Default for RotateOptions {
    fn default() -> Self {
        Self {
            gains: PidGains::new(1.0, 0.0, 0.0),
            max_speed: 1.0,
            min_speed: 0.05,
            goal_dist: 0.035,
            goal_speed: 0.5,
            wrap: true,
            timeout_ms: 0,
        }
    }
}

impl Default for BoomerangOptions {
    fn default() -> Self {
        Self {
            drive: DriveOptions::default(),
            lead: 0.6,
        }
    }
}

impl Default for PurePursuitOptions {
    fn default() -> Self {
        Self {
            drive: DriveOptions::default(),
            lookahead: 12.0,
        }
    }
}

impl Default for RamseteOptions {
    fn default() -> Self {
        Self {
            b: 0.002,
            zeta: 0.7,
            latency_ms: 0,
            k_linear: 1.0 / 60.0,
            k_angular: 1.0 / 6.0,
            deadband: 0.0,
            max_output: 1.0,
            timeout_ms: 0,
        }
    }
}
