//! # Spline path
//!
//! A chain of cubic Bezier segments through a list of control points. Each segment leaves its
//! start point along the start point's direction of motion, with a handle of length `exit_delta`,
//! and arrives at its end point along that point's direction of motion, with a handle of length
//! `enter_delta`. Adjacent segments share their tangent direction at the common point, so the
//! curve has no kinks at interior control points.
//!
//! The direction of motion is the control point's heading, turned half a revolution on reversed
//! segments. The pose heading along the curve is the tangent direction, again turned half a
//! revolution when reversed, so the robot always faces along the curve the way it is driven.

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use std::f64::consts::PI;

use drive_if::Pose;
use nalgebra::Vector2;

use super::{clamp_index, ControlPoint, Path, PathError};

// ------------------------------------------------------------------------------------------------
// CONSTANTS
// ------------------------------------------------------------------------------------------------

/// Tangents shorter than this are treated as degenerate
const MIN_TANGENT: f64 = 1e-9;

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

/// A path through control points, with the index domain `[0, n - 1]` for `n` points.
///
/// Integer indices land exactly on the control points.
#[derive(Debug, Clone)]
pub struct SplinePath {
    points: Vec<ControlPoint>,
}

/// The four Bezier points of one segment.
struct Segment {
    p: [Vector2<f64>; 4],
    reversed: bool,
    fallback_rad: f64,
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl SplinePath {
    pub fn new(points: Vec<ControlPoint>) -> Result<Self, PathError> {
        if points.is_empty() {
            return Err(PathError::EmptyPath);
        }

        Ok(Self { points })
    }

    pub fn control_points(&self) -> &[ControlPoint] {
        &self.points
    }

    fn segment(&self, i: usize) -> Segment {
        let a = &self.points[i];
        let b = &self.points[i + 1];
        let reversed = a.is_reversed;
        let turn = if reversed { PI } else { 0.0 };

        let dir_a = unit(a.pose.rotation + turn);
        let dir_b = unit(b.pose.rotation + turn);

        let p0 = a.pose.position();
        let p3 = b.pose.position();

        Segment {
            p: [p0, p0 + dir_a * a.exit_delta, p3 - dir_b * b.enter_delta, p3],
            reversed,
            fallback_rad: a.pose.rotation,
        }
    }
}

impl Segment {
    fn position(&self, t: f64) -> Vector2<f64> {
        let u = 1.0 - t;
        self.p[0] * (u * u * u)
            + self.p[1] * (3.0 * u * u * t)
            + self.p[2] * (3.0 * u * t * t)
            + self.p[3] * (t * t * t)
    }

    fn derivative(&self, t: f64) -> Vector2<f64> {
        let u = 1.0 - t;
        (self.p[1] - self.p[0]) * (3.0 * u * u)
            + (self.p[2] - self.p[1]) * (6.0 * u * t)
            + (self.p[3] - self.p[2]) * (3.0 * t * t)
    }

    fn heading(&self, t: f64) -> f64 {
        let mut tangent = self.derivative(t);

        // Zero length handles give a zero derivative at the ends, fall back on the chord
        if tangent.norm() < MIN_TANGENT {
            tangent = self.p[3] - self.p[0];
        }
        if tangent.norm() < MIN_TANGENT {
            return self.fallback_rad;
        }

        let heading = tangent[1].atan2(tangent[0]);
        if self.reversed {
            heading + PI
        } else {
            heading
        }
    }
}

impl Path for SplinePath {
    fn get_pose_at(&self, index: f64) -> Pose {
        if self.points.len() == 1 {
            return self.points[0].pose;
        }

        let index = clamp_index(index, self.get_length());
        let seg_idx = (index.floor() as usize).min(self.points.len() - 2);
        let t = index - seg_idx as f64;

        let seg = self.segment(seg_idx);
        Pose::from_position(seg.position(t), seg.heading(t))
    }

    fn get_length(&self) -> f64 {
        (self.points.len() - 1) as f64
    }
}

// ------------------------------------------------------------------------------------------------
// FUNCTIONS
// ------------------------------------------------------------------------------------------------

fn unit(angle_rad: f64) -> Vector2<f64> {
    Vector2::new(angle_rad.cos(), angle_rad.sin())
}
