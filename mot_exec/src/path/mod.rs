//! # Path module
//!
//! Paths are continuous curves through the field which are sampled by a floating point index.
//! Each path has a bounded index domain `[0, length]`, and asking for a pose outside it gives the
//! pose at the nearest end rather than extrapolating.
//!
//! Missions describe paths with [`ControlPoint`]s, which carry the tangent handle lengths for the
//! spline through them, a reverse flag, and any [`PathEvent`]s to fire as the robot passes. The
//! [`PathGenerator`] densifies control points into a [`GeneratedPath`] for the path followers.

// ------------------------------------------------------------------------------------------------
// MODULES
// ------------------------------------------------------------------------------------------------

mod file;
mod generator;
mod linear;
mod spline;

// ------------------------------------------------------------------------------------------------
// EXPORTS
// ------------------------------------------------------------------------------------------------

pub use file::{load_path_file, parse_path, save_path_file, write_path, PATH_FORMAT_VERSION};
pub use generator::{GeneratedPath, PathGenerator};
pub use linear::LinearPath;
pub use spline::SplinePath;

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use std::sync::atomic::{AtomicU64, Ordering};

use drive_if::Pose;
use serde::{Deserialize, Serialize};

// ------------------------------------------------------------------------------------------------
// GLOBALS
// ------------------------------------------------------------------------------------------------

static NEXT_EVENT_ID: AtomicU64 = AtomicU64::new(0);

// ------------------------------------------------------------------------------------------------
// TRAITS
// ------------------------------------------------------------------------------------------------

/// A continuous path sampled by index.
pub trait Path: Send + Sync {
    /// The pose at `index`, clamped into `[0, get_length()]`.
    fn get_pose_at(&self, index: f64) -> Pose;

    /// The upper bound of the index domain.
    fn get_length(&self) -> f64;
}

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

/// A point a mission's path must pass through.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ControlPoint {
    pub pose: Pose,

    /// Length of the tangent handle arriving at this point
    pub enter_delta: f64,

    /// Length of the tangent handle leaving this point
    pub exit_delta: f64,

    /// If true the robot drives backwards from this point to the next
    pub is_reversed: bool,

    /// Events fired when the robot passes this point
    pub events: Vec<PathEvent>,
}

/// A named action attached to a control point.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PathEvent {
    /// Unique identifier, assigned on creation
    pub id: u64,

    pub name: String,

    /// Free-form parameters, interpreted by whatever handles the event
    pub params: String,
}

// ------------------------------------------------------------------------------------------------
// ENUMS
// ------------------------------------------------------------------------------------------------

#[derive(Debug, thiserror::Error)]
pub enum PathError {
    #[error("A path needs at least one control point")]
    EmptyPath,

    #[error("The generator step must be in (0, 1], got {0}")]
    InvalidStep(f64),

    #[error("Could not read the path file: {0}")]
    FileReadError(std::io::Error),

    #[error("Could not write the path file: {0}")]
    FileWriteError(std::io::Error),

    #[error("The path file does not start with a valid header, found {0:?}")]
    InvalidHeader(String),

    #[error("Unsupported path file version {0}")]
    UnsupportedVersion(u32),

    #[error("Line {line}: {msg}")]
    ParseError { line: usize, msg: String },

    #[error("The path file ended without an ENDPATH record")]
    MissingEnd,
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl ControlPoint {
    /// A control point with no handles, no events, and driving forwards.
    pub fn new(pose: Pose) -> Self {
        Self::with_handles(pose, 0.0, 0.0)
    }

    pub fn with_handles(pose: Pose, enter_delta: f64, exit_delta: f64) -> Self {
        Self {
            pose,
            enter_delta,
            exit_delta,
            is_reversed: false,
            events: Vec::new(),
        }
    }

    pub fn reversed(mut self, is_reversed: bool) -> Self {
        self.is_reversed = is_reversed;
        self
    }

    pub fn with_event(mut self, event: PathEvent) -> Self {
        self.events.push(event);
        self
    }
}

impl PathEvent {
    /// Create a new event with a fresh identifier.
    pub fn new(name: &str, params: &str) -> Self {
        Self {
            id: NEXT_EVENT_ID.fetch_add(1, Ordering::Relaxed),
            name: name.to_string(),
            params: params.to_string(),
        }
    }
}

// ------------------------------------------------------------------------------------------------
// FUNCTIONS
// ------------------------------------------------------------------------------------------------

/// Clamp a path index into `[0, length]`, mapping NaN to the start.
pub(crate) fn clamp_index(index: f64, length: f64) -> f64 {
    if index.is_nan() {
        return 0.0;
    }

    index.max(0.0).min(length.max(0.0))
}
