//! # Equipment Interface
//!
//! This module defines the interfaces to the equipment the motion core drives and reads: the
//! chassis (actuators) and odometry (pose source). Both are implemented outside of the core, by
//! hardware drivers or by a simulation.

// -----------------------------------------------------------------------------------------------
// MODULES
// -----------------------------------------------------------------------------------------------

pub mod chassis;
pub mod odom;
