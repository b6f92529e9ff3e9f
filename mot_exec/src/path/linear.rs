//! Straight line path between two poses

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use drive_if::Pose;
use util::maths::{ang_dist, lerp};

use super::{clamp_index, Path};

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

/// A path interpolating linearly from one pose to another over the index domain `[0, 1]`.
///
/// The heading turns the short way round between the two poses.
#[derive(Debug, Clone, Copy)]
pub struct LinearPath {
    start: Pose,
    end: Pose,
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl LinearPath {
    pub fn new(start: Pose, end: Pose) -> Self {
        Self { start, end }
    }
}

impl Path for LinearPath {
    fn get_pose_at(&self, index: f64) -> Pose {
        let t = clamp_index(index, 1.0);

        if t <= 0.0 {
            return self.start;
        }
        if t >= 1.0 {
            return self.end;
        }

        Pose::new(
            lerp(self.start.x, self.end.x, t),
            lerp(self.start.y, self.end.y, t),
            self.start.rotation + ang_dist(self.start.rotation, self.end.rotation) * t,
        )
    }

    fn get_length(&self) -> f64 {
        1.0
    }
}
