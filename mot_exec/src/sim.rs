//! # Simulated rover
//!
//! [`SimRover`] stands in for the chassis, odometry, and scheduler clock when running missions
//! without hardware. It models an ideal differential drive: the commanded demands map directly to
//! body velocities, which are integrated exactly (as arcs) whenever the clock is slept. Time only
//! moves when something sleeps on the clock, which makes closed loop runs fully deterministic.

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use std::sync::{Arc, Mutex, MutexGuard};

use drive_if::{Chassis, Clock, DriveDems, Odometry, Pose};
use log::trace;
use nalgebra::Vector2;
use serde::Deserialize;
use util::{maths::actuator_demand, time::ms_to_s};

use crate::robot::Robot;

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

/// Parameters of the simulated rover.
#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(default)]
pub struct SimParams {
    /// Linear speed at a forward demand of 1, in field units per second.
    pub max_speed: f64,

    /// Turn rate at a turn demand of 1, in radians per second.
    pub max_turn_rate_rads: f64,
}

/// A simulated differential drive robot.
pub struct SimRover {
    params: SimParams,
    state: Mutex<SimState>,
}

#[derive(Debug, Clone, Copy, Default)]
struct SimState {
    now_ms: u64,
    pose: Pose,
    dems: DriveDems,
    num_drive_cmds: u64,
    num_stop_cmds: u64,
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl Default for SimParams {
    fn default() -> Self {
        Self {
            max_speed: 60.0,
            max_turn_rate_rads: 6.0,
        }
    }
}

impl SimRover {
    pub fn new(params: SimParams, start_pose: Pose) -> Arc<Self> {
        Arc::new(Self {
            params,
            state: Mutex::new(SimState {
                pose: start_pose,
                ..Default::default()
            }),
        })
    }

    /// A robot context using this rover for every collaborator.
    pub fn robot(self: &Arc<Self>) -> Robot {
        Robot::new(self.clone(), self.clone(), self.clone())
    }

    /// The demands most recently applied to the chassis.
    pub fn last_dems(&self) -> DriveDems {
        self.lock().dems
    }

    /// Number of `drive` calls received so far.
    pub fn num_drive_cmds(&self) -> u64 {
        self.lock().num_drive_cmds
    }

    /// Number of `stop` calls received so far.
    pub fn num_stop_cmds(&self) -> u64 {
        self.lock().num_stop_cmds
    }

    /// Advance the simulation by `ms` without going through the clock.
    pub fn advance(&self, ms: u64) {
        let mut state = self.lock();
        self.integrate(&mut state, ms);
    }

    fn lock(&self) -> MutexGuard<'_, SimState> {
        // A panicking test thread must not take the rest of the simulation with it
        match self.state.lock() {
            Ok(s) => s,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    fn body_rates(&self, dems: &DriveDems) -> (f64, f64) {
        (
            dems.forward * self.params.max_speed,
            dems.turn * self.params.max_turn_rate_rads,
        )
    }

    fn integrate(&self, state: &mut SimState, ms: u64) {
        let dt_s = ms_to_s(ms);
        let (v, w) = self.body_rates(&state.dems);
        let p = state.pose;

        // Exact unicycle integration, falling back to a straight line when the turn rate is
        // negligible (the arc radius blows up).
        state.pose = if w.abs() < 1e-9 {
            Pose::new(
                p.x + v * dt_s * p.rotation.cos(),
                p.y + v * dt_s * p.rotation.sin(),
                p.rotation,
            )
        } else {
            let rotation = p.rotation + w * dt_s;
            let r = v / w;
            Pose::new(
                p.x + r * (rotation.sin() - p.rotation.sin()),
                p.y - r * (rotation.cos() - p.rotation.cos()),
                rotation,
            )
        };

        state.now_ms += ms;
    }
}

impl Chassis for SimRover {
    fn drive(&self, forward: f64, turn: f64, strafe: f64) {
        let mut state = self.lock();
        state.dems = DriveDems::new(
            actuator_demand(forward),
            actuator_demand(turn),
            actuator_demand(strafe),
        );
        state.num_drive_cmds += 1;
        trace!("SimRover drive {:?}", state.dems);
    }

    fn stop(&self) {
        let mut state = self.lock();
        state.dems = DriveDems::NEUTRAL;
        state.num_stop_cmds += 1;
    }
}

impl Odometry for SimRover {
    fn get_pose(&self) -> Pose {
        self.lock().pose
    }

    fn set_pose(&self, pose: Pose) {
        self.lock().pose = pose;
    }

    fn get_velocity(&self) -> Vector2<f64> {
        let state = self.lock();
        let (v, _) = self.body_rates(&state.dems);
        state.pose.forward2() * v
    }

    fn get_angular_velocity(&self) -> f64 {
        let state = self.lock();
        self.body_rates(&state.dems).1
    }
}

impl Clock for SimRover {
    fn now_ms(&self) -> u64 {
        self.lock().now_ms
    }

    fn sleep_ms(&self, ms: u64) {
        let mut state = self.lock();
        self.integrate(&mut state, ms);
    }
}
