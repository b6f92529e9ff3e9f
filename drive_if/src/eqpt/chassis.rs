//! # Chassis Equipment Interface

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use serde::{Deserialize, Serialize};

// ------------------------------------------------------------------------------------------------
// TRAITS
// ------------------------------------------------------------------------------------------------

/// A differential drive chassis.
///
/// Implementations must be safe to share between the synchronous mission task and any
/// asynchronously running steps. At most one step is expected to command the chassis at any
/// instant, which is guaranteed by the structure of the step tree rather than by a lock.
pub trait Chassis: Send + Sync {
    /// Command the chassis.
    ///
    /// All demands are normalised to [-1, 1]:
    /// - `forward` is positive forwards,
    /// - `turn` is positive to the left (right hand rule about Z+),
    /// - `strafe` is positive to the left, and is ignored by non-holonomic chassis.
    fn drive(&self, forward: f64, turn: f64, strafe: f64);

    /// Bring all actuators to neutral.
    fn stop(&self);
}

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

/// A record of a single chassis demand.
#[derive(Debug, Copy, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct DriveDems {
    pub forward: f64,
    pub turn: f64,
    pub strafe: f64,
}

impl DriveDems {
    /// The neutral demand.
    pub const NEUTRAL: DriveDems = DriveDems {
        forward: 0.0,
        turn: 0.0,
        strafe: 0.0,
    };

    pub fn new(forward: f64, turn: f64, strafe: f64) -> Self {
        Self {
            forward,
            turn,
            strafe,
        }
    }

    /// Returns true if all demands are zero.
    pub fn is_neutral(&self) -> bool {
        *self == Self::NEUTRAL
    }
}
