//! # Trajectory module
//!
//! A [`Trajectory`] is a path with time attached: a sequence of states, each giving the pose the
//! robot should be in at a given time along with the velocities and accelerations it should have
//! there. Trajectories are produced from paths by the [`TrajectoryGenerator`] and followed by the
//! Ramsete controller.

// ------------------------------------------------------------------------------------------------
// MODULES
// ------------------------------------------------------------------------------------------------

mod generator;

// ------------------------------------------------------------------------------------------------
// EXPORTS
// ------------------------------------------------------------------------------------------------

pub use generator::{TrajectoryConstraints, TrajectoryGenerator};

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use drive_if::Pose;
use serde::{Deserialize, Serialize};
use util::maths::{ang_dist, lerp};

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

/// The desired state of the robot at one instant of a trajectory.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TrajState {
    /// Time since the start of the trajectory, in seconds
    pub time_s: f64,

    /// Signed linear velocity, negative when reversing
    pub velocity: f64,

    /// Angular velocity in radians per second
    pub angular_velocity: f64,

    /// Signed linear acceleration
    pub acceleration: f64,

    /// Angular acceleration in radians per second squared
    pub angular_acceleration: f64,

    pub pose: Pose,
}

/// A time ordered sequence of states.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Trajectory {
    states: Vec<TrajState>,
}

// ------------------------------------------------------------------------------------------------
// ENUMS
// ------------------------------------------------------------------------------------------------

#[derive(Debug, thiserror::Error)]
pub enum TrajError {
    #[error("Invalid trajectory constraints: {0}")]
    InvalidConstraints(String),

    #[error("The index step must be positive and finite, got {0}")]
    InvalidIndexStep(f64),

    #[error("A trajectory needs at least one state")]
    Empty,

    #[error("State {0} is not later than the state before it")]
    TimeNotIncreasing(usize),

    #[error("State {0} contains a non-finite value")]
    NonFiniteState(usize),
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl TrajState {
    /// Interpolate between two states, `t = 0` giving `self`.
    pub fn interpolate(&self, other: &TrajState, t: f64) -> TrajState {
        TrajState {
            time_s: lerp(self.time_s, other.time_s, t),
            velocity: lerp(self.velocity, other.velocity, t),
            angular_velocity: lerp(self.angular_velocity, other.angular_velocity, t),
            acceleration: lerp(self.acceleration, other.acceleration, t),
            angular_acceleration: lerp(self.angular_acceleration, other.angular_acceleration, t),
            pose: Pose::new(
                lerp(self.pose.x, other.pose.x, t),
                lerp(self.pose.y, other.pose.y, t),
                self.pose.rotation + ang_dist(self.pose.rotation, other.pose.rotation) * t,
            ),
        }
    }

    fn is_finite(&self) -> bool {
        self.time_s.is_finite()
            && self.velocity.is_finite()
            && self.angular_velocity.is_finite()
            && self.acceleration.is_finite()
            && self.angular_acceleration.is_finite()
            && self.pose.is_finite()
    }
}

impl Trajectory {
    /// Build a trajectory from states, which must be finite and strictly increasing in time.
    pub fn from_states(states: Vec<TrajState>) -> Result<Self, TrajError> {
        if states.is_empty() {
            return Err(TrajError::Empty);
        }

        for (i, s) in states.iter().enumerate() {
            if !s.is_finite() {
                return Err(TrajError::NonFiniteState(i));
            }
            if i > 0 && s.time_s <= states[i - 1].time_s {
                return Err(TrajError::TimeNotIncreasing(i));
            }
        }

        Ok(Self { states })
    }

    pub fn states(&self) -> &[TrajState] {
        &self.states
    }

    pub fn len(&self) -> usize {
        self.states.len()
    }

    pub fn is_empty(&self) -> bool {
        self.states.is_empty()
    }

    /// Time of the last state, in seconds.
    pub fn duration_s(&self) -> f64 {
        self.last().time_s
    }

    pub fn first(&self) -> &TrajState {
        &self.states[0]
    }

    pub fn last(&self) -> &TrajState {
        &self.states[self.states.len() - 1]
    }

    /// The state at `time_s`, interpolated between the surrounding states.
    ///
    /// Times before the start give the first state and times after the end give the last.
    pub fn get_state_at(&self, time_s: f64) -> TrajState {
        if !(time_s > self.first().time_s) {
            return *self.first();
        }
        if time_s >= self.duration_s() {
            return *self.last();
        }

        // First state strictly later than the time, which can't be the first
        let i = self.states.partition_point(|s| s.time_s <= time_s);
        let a = &self.states[i - 1];
        let b = &self.states[i];

        a.interpolate(b, (time_s - a.time_s) / (b.time_s - a.time_s))
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn state(time_s: f64, velocity: f64, x: f64) -> TrajState {
        TrajState {
            time_s,
            velocity,
            angular_velocity: 0.0,
            acceleration: 0.0,
            angular_acceleration: 0.0,
            pose: Pose::new(x, 0.0, 0.0),
        }
    }

    #[test]
    fn test_sampling() {
        let traj = Trajectory::from_states(vec![
            state(0.0, 0.0, 0.0),
            state(1.0, 10.0, 5.0),
            state(3.0, 0.0, 15.0),
        ])
        .unwrap();

        assert_eq!(traj.duration_s(), 3.0);

        let s = traj.get_state_at(0.5);
        assert!((s.velocity - 5.0).abs() < 1e-12);
        assert!((s.pose.x - 2.5).abs() < 1e-12);

        let s = traj.get_state_at(2.0);
        assert!((s.velocity - 5.0).abs() < 1e-12);
        assert!((s.pose.x - 10.0).abs() < 1e-12);

        assert_eq!(traj.get_state_at(1.0), traj.states()[1]);
        assert_eq!(traj.get_state_at(-1.0), traj.states()[0]);
        assert_eq!(traj.get_state_at(10.0), traj.states()[2]);
        assert_eq!(traj.get_state_at(f64::NAN), traj.states()[0]);
    }

    #[test]
    fn test_validation() {
        assert!(matches!(Trajectory::from_states(Vec::new()), Err(TrajError::Empty)));
        assert!(matches!(
            Trajectory::from_states(vec![state(0.0, 0.0, 0.0), state(0.0, 1.0, 1.0)]),
            Err(TrajError::TimeNotIncreasing(1))
        ));
        assert!(matches!(
            Trajectory::from_states(vec![state(0.0, f64::NAN, 0.0)]),
            Err(TrajError::NonFiniteState(0))
        ));
    }

    #[test]
    fn test_session_report_format() {
        let traj =
            Trajectory::from_states(vec![state(0.0, 0.0, 0.0), state(2.0, 4.0, 4.0)]).unwrap();

        let json = serde_json::to_value(&traj).unwrap();
        let states = json["states"].as_array().unwrap();

        assert_eq!(states.len(), 2);
        assert_eq!(states[1]["time_s"], 2.0);
        assert_eq!(states[1]["pose"]["x"], 4.0);

        let back: Trajectory = serde_json::from_value(json).unwrap();
        assert_eq!(back.states(), traj.states());
    }
}
