//! PID controller

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use serde::{Deserialize, Serialize};
use util::time::ms_to_s;

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

/// Gains for a [`PidController`].
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct PidGains {
    /// Proportional gain
    pub k_p: f64,

    /// Integral gain
    pub k_i: f64,

    /// Derivative gain
    pub k_d: f64,

    /// Largest magnitude the integral accumulation may reach. Non-positive disables the limit.
    pub integral_limit: f64,
}

/// A PID controller.
///
/// The controller is time-aware, each call to [`PidController::get`] is given the current
/// scheduler time so no delta-time needs to be tracked by the caller.
#[derive(Debug, Clone, Serialize)]
pub struct PidController {
    gains: PidGains,

    /// Time of the previous call, in milliseconds
    prev_time_ms: Option<u64>,

    /// Previous error
    prev_error: Option<f64>,

    /// The integral accumulation
    integral: f64,
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl PidGains {
    pub fn new(k_p: f64, k_i: f64, k_d: f64) -> Self {
        Self {
            k_p,
            k_i,
            k_d,
            integral_limit: 0.0,
        }
    }
}

impl Default for PidGains {
    fn default() -> Self {
        Self::new(0.0, 0.0, 0.0)
    }
}

impl PidController {
    /// Create a new controller with the given gains.
    pub fn new(gains: PidGains) -> Self {
        Self {
            gains,
            prev_time_ms: None,
            prev_error: None,
            integral: 0.0,
        }
    }

    pub fn gains(&self) -> &PidGains {
        &self.gains
    }

    /// Forget the accumulated integral and previous error.
    pub fn reset(&mut self) {
        self.prev_time_ms = None;
        self.prev_error = None;
        self.integral = 0.0;
    }

    /// Get the value of the controller for the given error at time `now_ms`.
    pub fn get(&mut self, error: f64, now_ms: u64) -> f64 {
        // Calculate dt, treating a repeated timestamp like the first call so that the derivative
        // can't divide by zero.
        let dt = match self.prev_time_ms {
            Some(t0) if now_ms > t0 => Some(ms_to_s(now_ms - t0)),
            _ => None,
        };

        // Accumulate the integral term.
        //
        // If there's no time difference then we don't accumulate the integral, adding the raw
        // error instead would produce a large spike compared to normal operation.
        if let Some(t) = dt {
            self.integral += error * t;
        }
        if self.gains.integral_limit > 0.0 {
            self.integral = self
                .integral
                .clamp(-self.gains.integral_limit, self.gains.integral_limit);
        }

        // Calculate the derivative, again assuming none without a time difference.
        let deriv = match (self.prev_error, dt) {
            (Some(e), Some(t)) => (error - e) / t,
            _ => 0.0,
        };

        let out = self.gains.k_p * error + self.gains.k_i * self.integral + self.gains.k_d * deriv;

        self.prev_error = Some(error);
        self.prev_time_ms = Some(now_ms);

        out
    }
}
