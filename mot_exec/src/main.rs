//! Main motion executable entry point.
//!
//! # Architecture
//!
//! The executable runs a single mission against the simulated rover:
//!
//!     - Initialise the session and logging
//!     - Load the parameters and the path description
//!     - Densify the path and generate a trajectory along it
//!     - Build the mission for the chosen follower
//!     - Run the mission to completion, stopping any background steps
//!     - Save the trajectory and the final pose into the session

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use std::{path::PathBuf, str::FromStr, sync::Arc};

use color_eyre::{
    eyre::{eyre, WrapErr},
    Result,
};
use log::{debug, info, warn};
use serde::Deserialize;
use structopt::StructOpt;

use mot_lib::{
    builder::{MissionBuilder, MissionOptions},
    path::{load_path_file, PathGenerator},
    sim::{SimParams, SimRover},
    step::{self, run_sync, BoxedStep, RunOutcome, TimeoutStep},
    traj::{TrajectoryConstraints, TrajectoryGenerator},
};
use util::{
    host,
    logger::{logger_init, LevelFilter},
    session::Session,
};

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

#[derive(Debug, StructOpt)]
#[structopt(name = "mot_exec", about = "Run a path following mission on the simulated rover")]
struct Args {
    /// Path description file to follow
    #[structopt(parse(from_os_str))]
    path: PathBuf,

    /// Follower used for the mission, one of "pure-pursuit", "ramsete" or "points"
    #[structopt(short, long, default_value = "pure-pursuit")]
    follower: Follower,

    /// Parameter file, relative to the params directory
    #[structopt(short, long, default_value = "mot_exec.toml")]
    params: String,
}

/// Executable parameters.
#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(default)]
struct MotExecParams {
    /// Period of the mission's update loop in milliseconds
    tick_ms: u64,

    /// Longest the mission may run for, in simulated milliseconds, 0 for no limit
    mission_timeout_ms: u64,

    /// Parameter step between dense path points
    path_gen_dt: f64,

    /// Path index step used while generating the trajectory
    traj_index_step: f64,

    sim: SimParams,
    mission: MissionOptions,
    constraints: TrajectoryConstraints,
}

// ------------------------------------------------------------------------------------------------
// ENUMS
// ------------------------------------------------------------------------------------------------

/// The way the mission follows the path.
#[derive(Debug, Clone, Copy, PartialEq)]
enum Follower {
    /// Pure pursuit along the dense path
    PurePursuit,

    /// Ramsete tracking of the generated trajectory
    Ramsete,

    /// Drive to each control point in turn
    Points,
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl Default for MotExecParams {
    fn default() -> Self {
        Self {
            tick_ms: 10,
            mission_timeout_ms: 120_000,
            path_gen_dt: 0.05,
            traj_index_step: 0.01,
            sim: SimParams::default(),
            mission: MissionOptions::default(),
            constraints: TrajectoryConstraints::default(),
        }
    }
}

impl FromStr for Follower {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pure-pursuit" | "pp" => Ok(Follower::PurePursuit),
            "ramsete" => Ok(Follower::Ramsete),
            "points" => Ok(Follower::Points),
            _ => Err(format!(
                "Unknown follower \"{}\", expected pure-pursuit, ramsete or points",
                s
            )),
        }
    }
}

// ------------------------------------------------------------------------------------------------
// MAIN
// ------------------------------------------------------------------------------------------------

fn main() -> Result<()> {
    color_eyre::install()?;

    let args = Args::from_args();

    // ---- EARLY INITIALISATION ----

    // Initialise session
    let session = Session::new("mot_exec", "sessions").wrap_err("Failed to create the session")?;

    // Initialise logger
    logger_init(LevelFilter::Trace, &session).wrap_err("Failed to initialise logging")?;

    // Log information on this execution.
    info!("Motion Executable\n");
    info!(
        "Software root: {:?}",
        host::get_sw_root().wrap_err("Failed to get the software root")?
    );
    info!("Session directory: {:?}\n", session.session_root);
    debug!("CLI arguments: {:?}", args);

    // ---- LOAD PARAMETERS ----

    let params: MotExecParams =
        util::params::load(&args.params).wrap_err("Could not load mot_exec params")?;

    info!("Exec parameters loaded");

    // ---- PATH AND TRAJECTORY ----

    info!("Loading path from {:?}", args.path);

    let control_points = load_path_file(&args.path).wrap_err("Failed to load the path")?;
    let start_pose = control_points
        .first()
        .map(|cp| cp.pose)
        .ok_or_else(|| eyre!("The path file contains no points"))?;

    let path = PathGenerator::new(params.path_gen_dt)
        .and_then(|g| g.generate(control_points.clone()))
        .wrap_err("Failed to generate the dense path")?;

    info!(
        "Generated {} path points over {:.02} units from {} control points",
        path.len(),
        path.distance(),
        control_points.len()
    );

    let trajectory = TrajectoryGenerator::new(params.constraints)
        .and_then(|g| g.with_index_step(params.traj_index_step))
        .and_then(|g| g.generate(&path))
        .wrap_err("Failed to generate the trajectory")?;

    info!(
        "Generated trajectory of {} states lasting {:.02} s",
        trajectory.len(),
        trajectory.duration_s()
    );

    session.save("trajectory.json", trajectory.clone());

    // ---- MISSION ----

    let rover = SimRover::new(params.sim, start_pose);
    let robot = rover.robot();

    let builder = MissionBuilder::new(params.mission).starting_at(start_pose);

    let builder = match args.follower {
        Follower::PurePursuit => builder.follow_path(Arc::new(path)),
        Follower::Ramsete => builder.follow_trajectory(Arc::new(trajectory)),
        Follower::Points => control_points
            .iter()
            .skip(1)
            .fold(builder, |b, cp| b.drive_to(cp.pose)),
    };

    info!(
        "Mission built from {} commands using the {:?} follower",
        builder.commands().len(),
        args.follower
    );

    let mission = builder.build().wrap_err("Failed to build the mission")?;

    let mut mission: BoxedStep = match params.mission_timeout_ms {
        0 => Box::new(mission),
        t => Box::new(TimeoutStep::new(Box::new(mission), t)),
    };

    // ---- RUN ----

    info!("Begining mission\n");

    let outcome = run_sync(&mut mission, &robot, params.tick_ms);

    let num_stopped = step::stop_all();
    if num_stopped > 0 {
        warn!("Stopped {} background steps still running", num_stopped);
    }

    let final_pose = robot.pose().normalised();
    let goal = control_points.last().map(|cp| cp.pose).unwrap_or(start_pose);

    info!(
        "Mission {:?} after {:.02} s at {:?}, {:.03} units from the final control point",
        outcome,
        util::time::ms_to_s(robot.now_ms()),
        final_pose,
        final_pose.distance_to(&goal)
    );

    if outcome != RunOutcome::Finished {
        warn!("Mission did not run to completion");
    }

    session.save("final_pose.json", final_pose);

    // ---- SHUTDOWN ----

    info!("End of execution");

    session.exit();

    Ok(())
}
