//! # Motion library.
//!
//! This library holds the motion core of a differential drive robot: the step framework missions
//! are made of, the closed loop controllers that drive the chassis, path and trajectory generation
//! and grid based route planning. The executables in this crate and other crates in the workspace
//! access it through here.

// ------------------------------------------------------------------------------------------------
// MODULES
// ------------------------------------------------------------------------------------------------

/// Mission builder - turns a sequence of motion commands into a runnable step
pub mod builder;

/// Motion controllers - PID, drive to pose, rotate, boomerang, pure pursuit and Ramsete
pub mod ctrl;

/// Navigation - occupancy grids and A* route finding
pub mod nav;

/// Paths - control points, linear and spline paths, sampling and the path file format
pub mod path;

/// Robot context handed to every step
pub mod robot;

/// Simulated rover used by the executables and tests
pub mod sim;

/// Step framework - the lifecycle trait, composites and the runner
pub mod step;

/// Trajectories - time parameterised paths and their generation
pub mod traj;

// ------------------------------------------------------------------------------------------------
// EXPORTS
// ------------------------------------------------------------------------------------------------

pub use robot::Robot;
