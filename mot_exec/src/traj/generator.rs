//! # Trajectory generator
//!
//! Time-parameterises a path under velocity and acceleration limits. The path is sampled at
//! fixed index steps, then:
//!
//! 1. a forward pass limits each sample's speed by how fast the robot could have accelerated
//!    there from the start,
//! 2. a backward pass limits it by how hard the robot must brake to reach the end velocity,
//! 3. the time between samples is solved assuming constant acceleration over each step.
//!
//! Points where the direction of travel flips (cusps between forward and reversed sections) are
//! forced to zero speed in both passes, since the robot has to stop there to change direction.

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use drive_if::Pose;
use log::debug;
use serde::{Deserialize, Serialize};
use util::maths::{ang_dist, finite_or_zero};

use super::{TrajError, TrajState, Trajectory};
use crate::path::Path;

// ------------------------------------------------------------------------------------------------
// CONSTANTS
// ------------------------------------------------------------------------------------------------

/// Distances and velocities below this are treated as zero
const EPSILON: f64 = 1e-9;

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

/// Limits on the motion along a trajectory.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct TrajectoryConstraints {
    /// Largest speed, in field units per second
    pub max_velocity: f64,

    /// Largest rate of speeding up, in field units per second squared
    pub max_acceleration: f64,

    /// Largest rate of slowing down, in field units per second squared
    pub max_deceleration: f64,
}

/// Generates trajectories from paths.
#[derive(Debug, Clone, Copy)]
pub struct TrajectoryGenerator {
    constraints: TrajectoryConstraints,
    index_step: f64,
    start_velocity: f64,
    end_velocity: f64,
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl Default for TrajectoryConstraints {
    fn default() -> Self {
        Self {
            max_velocity: 48.0,
            max_acceleration: 96.0,
            max_deceleration: 96.0,
        }
    }
}

impl TrajectoryConstraints {
    /// Check every limit is positive and finite.
    pub fn validate(&self) -> Result<(), TrajError> {
        let check = |name: &str, value: f64| {
            if value.is_finite() && value > 0.0 {
                Ok(())
            } else {
                Err(TrajError::InvalidConstraints(format!(
                    "{} must be positive and finite, got {}",
                    name, value
                )))
            }
        };

        check("max_velocity", self.max_velocity)?;
        check("max_acceleration", self.max_acceleration)?;
        check("max_deceleration", self.max_deceleration)
    }
}

impl TrajectoryGenerator {
    /// Create a generator starting and ending at rest, sampling paths every 0.01 of an index.
    pub fn new(constraints: TrajectoryConstraints) -> Result<Self, TrajError> {
        constraints.validate()?;

        Ok(Self {
            constraints,
            index_step: 0.01,
            start_velocity: 0.0,
            end_velocity: 0.0,
        })
    }

    /// Set the index step the path is sampled at.
    pub fn with_index_step(mut self, index_step: f64) -> Result<Self, TrajError> {
        if !(index_step.is_finite() && index_step > 0.0) {
            return Err(TrajError::InvalidIndexStep(index_step));
        }

        self.index_step = index_step;
        Ok(self)
    }

    /// Set the speeds at the start and end of the trajectory. They are capped at the maximum
    /// velocity.
    pub fn with_boundary_velocities(mut self, start_velocity: f64, end_velocity: f64) -> Self {
        let max = self.constraints.max_velocity;
        self.start_velocity = finite_or_zero(start_velocity).abs().min(max);
        self.end_velocity = finite_or_zero(end_velocity).abs().min(max);
        self
    }

    pub fn constraints(&self) -> &TrajectoryConstraints {
        &self.constraints
    }

    /// Generate a trajectory following `path`.
    pub fn generate(&self, path: &dyn Path) -> Result<Trajectory, TrajError> {
        let poses = self.sample(path);
        let n = poses.len();

        if n == 1 {
            return Trajectory::from_states(vec![state_at_rest(poses[0])]);
        }

        // Step lengths and travel directions
        let dists: Vec<f64> = poses.windows(2).map(|w| w[0].distance_to(&w[1])).collect();
        let signs = travel_signs(&poses);
        let cusp = |i: usize| i > 0 && i < n - 1 && signs[i - 1] != signs[i];

        // Forward pass
        let c = &self.constraints;
        let mut speeds = vec![0.0; n];
        speeds[0] = self.start_velocity;
        for i in 1..n {
            speeds[i] = if cusp(i) {
                0.0
            } else {
                (speeds[i - 1].powi(2) + 2.0 * c.max_acceleration * dists[i - 1])
                    .sqrt()
                    .min(c.max_velocity)
            };
        }

        // Backward pass
        speeds[n - 1] = speeds[n - 1].min(self.end_velocity);
        for i in (0..n - 1).rev() {
            let reachable = (speeds[i + 1].powi(2) + 2.0 * c.max_deceleration * dists[i]).sqrt();
            speeds[i] = speeds[i].min(reachable);
        }

        // Timing
        let velocity = |i: usize| speeds[i] * signs[i.min(n - 2)];
        let mut states = vec![TrajState {
            velocity: velocity(0),
            ..state_at_rest(poses[0])
        }];
        let mut time_s = 0.0;

        for i in 0..n - 1 {
            let dt = step_time(speeds[i], speeds[i + 1], dists[i]);
            if !(dt > 0.0) {
                // Nothing to gain from a zero length step, merge it into the previous state
                continue;
            }

            time_s += dt;
            states.push(TrajState {
                time_s,
                velocity: velocity(i + 1),
                ..state_at_rest(poses[i + 1])
            });
        }

        fill_derivatives(&mut states);

        debug!(
            "Generated trajectory of {} states lasting {:.2} s from {} samples",
            states.len(),
            time_s,
            n
        );

        Trajectory::from_states(states)
    }

    fn sample(&self, path: &dyn Path) -> Vec<Pose> {
        let length = finite_or_zero(path.get_length()).abs();
        let num_steps = (length / self.index_step).ceil() as usize;

        let mut poses: Vec<Pose> = (0..num_steps)
            .map(|k| path.get_pose_at(k as f64 * self.index_step))
            .collect();
        poses.push(path.get_pose_at(length));

        poses
    }
}

// ------------------------------------------------------------------------------------------------
// FUNCTIONS
// ------------------------------------------------------------------------------------------------

fn state_at_rest(pose: Pose) -> TrajState {
    TrajState {
        time_s: 0.0,
        velocity: 0.0,
        angular_velocity: 0.0,
        acceleration: 0.0,
        angular_acceleration: 0.0,
        pose,
    }
}

/// Direction of travel over each step, +1 forwards and -1 in reverse.
///
/// Zero length steps carry no direction so they take the direction of the step before them, or
/// the first step with a direction if there's none before.
fn travel_signs(poses: &[Pose]) -> Vec<f64> {
    let raw: Vec<Option<f64>> = poses
        .windows(2)
        .map(|w| {
            let delta = w[1].position() - w[0].position();
            if delta.norm() < EPSILON {
                None
            } else if w[0].forward2().dot(&delta) >= 0.0 {
                Some(1.0)
            } else {
                Some(-1.0)
            }
        })
        .collect();

    let mut prev = raw.iter().flatten().next().copied().unwrap_or(1.0);
    raw.iter()
        .map(|s| {
            if let Some(s) = s {
                prev = *s;
            }
            prev
        })
        .collect()
}

/// Time to travel `dist` while changing speed from `v0` to `v1` at constant acceleration.
fn step_time(v0: f64, v1: f64, dist: f64) -> f64 {
    if dist < EPSILON {
        return 0.0;
    }

    let accel = (v1 * v1 - v0 * v0) / (2.0 * dist);

    let dt = if accel.abs() > EPSILON {
        (v1 - v0) / accel
    } else if v0 > EPSILON {
        dist / v0
    } else {
        0.0
    };

    if dt.is_finite() {
        dt
    } else {
        0.0
    }
}

/// Fill in accelerations and angular rates from the velocities, poses, and times.
fn fill_derivatives(states: &mut [TrajState]) {
    let n = states.len();
    if n < 2 {
        return;
    }

    for i in 0..n - 1 {
        let dt = states[i + 1].time_s - states[i].time_s;
        states[i].acceleration = (states[i + 1].velocity - states[i].velocity) / dt;
        states[i].angular_velocity =
            ang_dist(states[i].pose.rotation, states[i + 1].pose.rotation) / dt;
    }

    // The last state keeps turning as it was unless it has come to rest
    states[n - 1].acceleration = states[n - 2].acceleration;
    states[n - 1].angular_velocity = if states[n - 1].velocity.abs() < EPSILON {
        0.0
    } else {
        states[n - 2].angular_velocity
    };

    for i in 0..n - 1 {
        let dt = states[i + 1].time_s - states[i].time_s;
        states[i].angular_acceleration =
            (states[i + 1].angular_velocity - states[i].angular_velocity) / dt;
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::path::{ControlPoint, LinearPath, SplinePath};

    fn constraints(v: f64, a: f64, d: f64) -> TrajectoryConstraints {
        TrajectoryConstraints {
            max_velocity: v,
            max_acceleration: a,
            max_deceleration: d,
        }
    }

    #[test]
    fn test_invalid_constraints() {
        assert!(TrajectoryGenerator::new(constraints(0.0, 1.0, 1.0)).is_err());
        assert!(TrajectoryGenerator::new(constraints(1.0, -1.0, 1.0)).is_err());
        assert!(TrajectoryGenerator::new(constraints(1.0, 1.0, f64::NAN)).is_err());
        assert!(TrajectoryGenerator::new(TrajectoryConstraints::default()).is_ok());
        assert!(TrajectoryGenerator::new(TrajectoryConstraints::default())
            .unwrap()
            .with_index_step(0.0)
            .is_err());
    }

    #[test]
    fn test_triangular_profile() {
        let path = LinearPath::new(Pose::new(0.0, 0.0, 0.0), Pose::new(100.0, 0.0, 0.0));
        let traj = TrajectoryGenerator::new(constraints(1000.0, 50.0, 50.0))
            .unwrap()
            .generate(&path)
            .unwrap();

        let c = constraints(1000.0, 50.0, 50.0);
        let states = traj.states();

        // Starts and ends at rest, never exceeding the limit
        assert_eq!(states[0].velocity, 0.0);
        assert!(states[states.len() - 1].velocity.abs() < 1e-9);
        assert!(states.iter().all(|s| s.velocity <= c.max_velocity + 1e-9));

        // Single peak
        let peak = states
            .iter()
            .enumerate()
            .fold((0, 0.0), |best, (i, s)| if s.velocity > best.1 { (i, s.velocity) } else { best })
            .0;
        assert!(states[..=peak].windows(2).all(|w| w[1].velocity >= w[0].velocity));
        assert!(states[peak..].windows(2).all(|w| w[1].velocity <= w[0].velocity));

        // Peaks halfway along at sqrt(2 a s), with equal time speeding up and slowing down
        assert!((states[peak].velocity - (2.0f64 * 50.0 * 50.0).sqrt()).abs() < 1e-6);
        assert!((traj.duration_s() - 2.0 * (100.0f64 / 50.0).sqrt()).abs() < 0.05);
    }

    #[test]
    fn test_trapezoidal_profile() {
        let path = LinearPath::new(Pose::new(0.0, 0.0, 0.0), Pose::new(100.0, 0.0, 0.0));
        let traj = TrajectoryGenerator::new(constraints(20.0, 40.0, 40.0))
            .unwrap()
            .generate(&path)
            .unwrap();

        let states = traj.states();
        assert!(states.iter().all(|s| s.velocity <= 20.0 + 1e-9));
        assert!(states.iter().any(|s| (s.velocity - 20.0).abs() < 1e-9));

        // 0.5 s up, 0.5 s down covering 10 units, then 90 units at full speed
        assert!((traj.duration_s() - 5.5).abs() < 0.02);

        for w in states.windows(2) {
            assert!(w[1].time_s > w[0].time_s);
            assert!(w[0].acceleration <= 40.0 + 1e-6 && w[0].acceleration >= -40.0 - 1e-6);
        }
    }

    #[test]
    fn test_reversed_path_has_negative_velocity() {
        let path = SplinePath::new(vec![
            ControlPoint::with_handles(Pose::new(0.0, 0.0, 0.0), 0.0, 5.0).reversed(true),
            ControlPoint::with_handles(Pose::new(-30.0, 0.0, 0.0), 5.0, 0.0),
        ])
        .unwrap();

        let traj = TrajectoryGenerator::new(TrajectoryConstraints::default())
            .unwrap()
            .generate(&path)
            .unwrap();

        let mid = traj.get_state_at(traj.duration_s() / 2.0);
        assert!(mid.velocity < 0.0);
        assert!(mid.pose.x < 0.0);
    }

    #[test]
    fn test_angular_velocity_on_arc() {
        // Quarter circle of radius 20 approximated by a spline
        let k = 20.0 * 0.5523;
        let path = SplinePath::new(vec![
            ControlPoint::with_handles(Pose::new(0.0, 0.0, 0.0), 0.0, k),
            ControlPoint::with_handles(Pose::new(20.0, 20.0, std::f64::consts::FRAC_PI_2), k, 0.0),
        ])
        .unwrap();

        let traj = TrajectoryGenerator::new(constraints(10.0, 100.0, 100.0))
            .unwrap()
            .generate(&path)
            .unwrap();

        // Cruising at 10 on a radius of 20 turns at about 0.5 rad/s
        let mid = traj.get_state_at(traj.duration_s() / 2.0);
        assert!((mid.velocity - 10.0).abs() < 1e-6);
        assert!((mid.angular_velocity - 0.5).abs() < 0.05);
    }

    #[test]
    fn test_single_point_path() {
        let path = SplinePath::new(vec![ControlPoint::new(Pose::new(3.0, 4.0, 0.0))]).unwrap();
        let traj = TrajectoryGenerator::new(TrajectoryConstraints::default())
            .unwrap()
            .generate(&path)
            .unwrap();

        assert_eq!(traj.len(), 1);
        assert_eq!(traj.duration_s(), 0.0);
        assert_eq!(traj.get_state_at(1.0).pose, Pose::new(3.0, 4.0, 0.0));
    }

    #[test]
    fn test_cusp_stops() {
        assert_eq!(step_time(0.0, 0.0, 1.0), 0.0);
        assert!((step_time(2.0, 2.0, 4.0) - 2.0).abs() < 1e-12);
        assert!((step_time(0.0, 2.0, 1.0) - 1.0).abs() < 1e-12);

        let poses = vec![
            Pose::new(0.0, 0.0, 0.0),
            Pose::new(1.0, 0.0, 0.0),
            Pose::new(1.0, 0.0, 0.0),
            Pose::new(0.0, 0.0, 0.0),
        ];
        assert_eq!(travel_signs(&poses), vec![1.0, 1.0, -1.0]);
    }
}
