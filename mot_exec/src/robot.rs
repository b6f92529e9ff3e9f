//! # Robot context
//!
//! Steps do not hold references to the chassis, odometry, or clock. Instead the runner passes a
//! [`Robot`] into every lifecycle call, so the collaborators are owned by whoever runs the mission
//! and a step tree can never outlive or dangle from them.

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use std::sync::Arc;

use drive_if::{Chassis, Clock, Odometry, Pose};

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

/// Handles to the collaborators a step drives and reads.
///
/// Cloning is cheap, clones refer to the same collaborators.
#[derive(Clone)]
pub struct Robot {
    pub chassis: Arc<dyn Chassis>,
    pub odom: Arc<dyn Odometry>,
    pub clock: Arc<dyn Clock>,
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl Robot {
    pub fn new(chassis: Arc<dyn Chassis>, odom: Arc<dyn Odometry>, clock: Arc<dyn Clock>) -> Self {
        Self {
            chassis,
            odom,
            clock,
        }
    }

    /// Current pose from odometry.
    pub fn pose(&self) -> Pose {
        self.odom.get_pose()
    }

    /// Magnitude of the current linear velocity.
    pub fn speed(&self) -> f64 {
        self.odom.get_velocity().norm()
    }

    /// Current scheduler time in milliseconds.
    pub fn now_ms(&self) -> u64 {
        self.clock.now_ms()
    }
}
