//! # Path generator
//!
//! Densifies a list of control points into a sequence of closely spaced poses for the path
//! followers, remembering where in that sequence each control point landed.

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use drive_if::Pose;
use log::debug;
use serde::Serialize;
use util::maths::{ang_dist, lerp};

use super::{clamp_index, ControlPoint, Path, PathError, SplinePath};

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

/// Generates dense paths from control points.
#[derive(Debug, Clone, Copy)]
pub struct PathGenerator {
    dt: f64,
}

/// A dense path produced by the [`PathGenerator`].
#[derive(Debug, Clone, Serialize)]
pub struct GeneratedPath {
    /// Index step the path was generated with
    pub dt: f64,

    pub control_points: Vec<ControlPoint>,

    /// The dense sequence of poses
    pub path_points: Vec<Pose>,

    /// Index into `path_points` of each control point, in the same order as `control_points`
    pub control_point_indices: Vec<usize>,
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl PathGenerator {
    /// Create a generator sampling each segment at index steps of `dt`, which must be in (0, 1].
    pub fn new(dt: f64) -> Result<Self, PathError> {
        if !(dt > 0.0 && dt <= 1.0) {
            return Err(PathError::InvalidStep(dt));
        }

        Ok(Self { dt })
    }

    pub fn dt(&self) -> f64 {
        self.dt
    }

    /// Generate the dense path through `control_points`.
    pub fn generate(&self, control_points: Vec<ControlPoint>) -> Result<GeneratedPath, PathError> {
        let spline = SplinePath::new(control_points)?;
        let num_segments = spline.control_points().len() - 1;
        let steps_per_segment = (1.0 / self.dt).ceil() as usize;

        let mut path_points = Vec::with_capacity(num_segments * steps_per_segment + 1);
        let mut control_point_indices = Vec::with_capacity(num_segments + 1);

        for seg in 0..num_segments {
            control_point_indices.push(path_points.len());

            // Whole multiples of dt short of the next control point, which starts the next segment
            let mut k = 0;
            loop {
                let t = k as f64 * self.dt;
                if t >= 1.0 - 1e-9 {
                    break;
                }
                path_points.push(spline.get_pose_at(seg as f64 + t));
                k += 1;
            }
        }

        control_point_indices.push(path_points.len());
        path_points.push(spline.get_pose_at(spline.get_length()));

        debug!(
            "Generated path of {} points from {} control points",
            path_points.len(),
            num_segments + 1
        );

        Ok(GeneratedPath {
            dt: self.dt,
            control_points: spline.control_points().to_vec(),
            path_points,
            control_point_indices,
        })
    }
}

impl GeneratedPath {
    pub fn len(&self) -> usize {
        self.path_points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.path_points.is_empty()
    }

    /// The last pose of the path.
    pub fn end_pose(&self) -> Option<Pose> {
        self.path_points.last().copied()
    }

    /// Total length of the polyline through the dense points.
    pub fn distance(&self) -> f64 {
        self.path_points
            .windows(2)
            .map(|w| w[0].distance_to(&w[1]))
            .sum()
    }
}

impl Path for GeneratedPath {
    /// Interpolates between the dense points, with integer indices landing on them.
    fn get_pose_at(&self, index: f64) -> Pose {
        let n = self.path_points.len();
        match n {
            0 => return Pose::default(),
            1 => return self.path_points[0],
            _ => (),
        }

        let index = clamp_index(index, self.get_length());
        let i = (index.floor() as usize).min(n - 2);
        let t = index - i as f64;

        let a = &self.path_points[i];
        let b = &self.path_points[i + 1];

        Pose::new(
            lerp(a.x, b.x, t),
            lerp(a.y, b.y, t),
            a.rotation + ang_dist(a.rotation, b.rotation) * t,
        )
    }

    fn get_length(&self) -> f64 {
        self.path_points.len().saturating_sub(1) as f64
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn control_points() -> Vec<ControlPoint> {
        vec![
            ControlPoint::with_handles(Pose::new(0.0, 0.0, 0.0), 0.0, 5.0),
            ControlPoint::with_handles(Pose::new(20.0, 0.0, 0.0), 5.0, 5.0),
            ControlPoint::with_handles(Pose::new(20.0, 20.0, 1.0), 5.0, 0.0),
        ]
    }

    #[test]
    fn test_invalid_step() {
        assert!(PathGenerator::new(0.0).is_err());
        assert!(PathGenerator::new(-0.1).is_err());
        assert!(PathGenerator::new(1.5).is_err());
        assert!(PathGenerator::new(f64::NAN).is_err());
        assert!(PathGenerator::new(1.0).is_ok());
    }

    #[test]
    fn test_control_point_indices() {
        let cps = control_points();
        let path = PathGenerator::new(0.1).unwrap().generate(cps.clone()).unwrap();

        assert_eq!(path.len(), 21);
        assert_eq!(path.control_point_indices, vec![0, 10, 20]);

        for (cp, &idx) in cps.iter().zip(path.control_point_indices.iter()) {
            assert!(path.path_points[idx].distance_to(&cp.pose) < 1e-9);
        }
    }

    #[test]
    fn test_step_not_dividing_one() {
        let path = PathGenerator::new(0.3)
            .unwrap()
            .generate(control_points())
            .unwrap();

        // 0, 0.3, 0.6, 0.9 per segment then the final point
        assert_eq!(path.len(), 9);
        assert_eq!(path.control_point_indices, vec![0, 4, 8]);
    }

    #[test]
    fn test_single_point() {
        let path = PathGenerator::new(0.5)
            .unwrap()
            .generate(vec![ControlPoint::new(Pose::new(1.0, 1.0, 0.0))])
            .unwrap();

        assert_eq!(path.len(), 1);
        assert_eq!(path.control_point_indices, vec![0]);
        assert_eq!(path.get_length(), 0.0);

        assert!(PathGenerator::new(0.5).unwrap().generate(Vec::new()).is_err());
    }

    #[test]
    fn test_interpolated_sampling() {
        let path = PathGenerator::new(0.5)
            .unwrap()
            .generate(control_points())
            .unwrap();

        let a = path.path_points[1];
        let b = path.path_points[2];
        let mid = path.get_pose_at(1.5);
        assert!((mid.x - (a.x + b.x) / 2.0).abs() < 1e-9);
        assert_eq!(path.get_pose_at(100.0), path.path_points[4]);
    }
}
