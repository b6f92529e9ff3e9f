//! # Field-frame pose

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use nalgebra::Vector2;
use serde::{Deserialize, Serialize};

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

/// The pose (position and heading) of the robot in the field frame.
///
/// Heading follows the right hand rule about the field's Z+ (upwards) axis: zero points along +X
/// and positive rotation turns towards +Y. The rotation is in radians and is unbounded, it is only
/// wrapped when a caller explicitly normalises it.
#[derive(Debug, Copy, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Pose {
    /// X position in field units
    pub x: f64,

    /// Y position in field units
    pub y: f64,

    /// Heading in radians
    pub rotation: f64,
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl Pose {
    pub fn new(x: f64, y: f64, rotation: f64) -> Self {
        Self { x, y, rotation }
    }

    /// Build a pose from a position vector and a heading.
    pub fn from_position(position: Vector2<f64>, rotation: f64) -> Self {
        Self {
            x: position[0],
            y: position[1],
            rotation,
        }
    }

    /// Position of the pose as a 2D vector.
    pub fn position(&self) -> Vector2<f64> {
        Vector2::new(self.x, self.y)
    }

    /// Unit vector pointing in the direction the pose is facing.
    pub fn forward2(&self) -> Vector2<f64> {
        Vector2::new(self.rotation.cos(), self.rotation.sin())
    }

    /// Straight line distance between the positions of two poses.
    pub fn distance_to(&self, other: &Pose) -> f64 {
        (other.position() - self.position()).norm()
    }

    /// Heading of the straight line from this pose to `other`.
    pub fn heading_to(&self, other: &Pose) -> f64 {
        (other.y - self.y).atan2(other.x - self.x)
    }

    /// Return a copy of this pose with the rotation wrapped into [-pi, pi).
    pub fn normalised(&self) -> Self {
        let pi = std::f64::consts::PI;
        let tau = std::f64::consts::TAU;

        let mut rotation = (self.rotation + pi) % tau;
        if rotation < 0.0 {
            rotation += tau;
        }

        Self {
            rotation: rotation - pi,
            ..*self
        }
    }

    /// Returns true if every component of the pose is finite.
    pub fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite() && self.rotation.is_finite()
    }
}
