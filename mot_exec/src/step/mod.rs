//! # Step module
//!
//! A mission is a tree of [`Step`]s. Every step follows the same lifecycle, driven by a runner:
//!
//! 1. `on_start` once,
//! 2. `on_update` once per scheduler tick until `check_finished` reports true,
//! 3. `on_stop` once, whether the step finished, timed out, or was cancelled.
//!
//! The composite steps in this module (list, branch, timeout, async) arrange other steps without
//! knowing what they do, so controllers, pauses, and user supplied actions all compose freely.

// ------------------------------------------------------------------------------------------------
// MODULES
// ------------------------------------------------------------------------------------------------

mod async_step;
mod basic;
mod branch;
mod list;
mod runner;
mod timeout;

// ------------------------------------------------------------------------------------------------
// EXPORTS
// ------------------------------------------------------------------------------------------------

pub use async_step::{global_registry, stop_all, AsyncRegistry, AsyncStep};
pub use basic::{FnStep, SetPoseStep, WaitStep};
pub use branch::BranchStep;
pub use list::ListStep;
pub use runner::{run_sync, run_until_cancelled, RunOutcome};
pub use timeout::TimeoutStep;

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use crate::robot::Robot;

// ------------------------------------------------------------------------------------------------
// TRAITS
// ------------------------------------------------------------------------------------------------

/// A unit of robot behaviour with a start, a periodic update, and a stop.
pub trait Step: Send {
    /// Called once before the first update.
    fn on_start(&mut self, robot: &Robot);

    /// Called once per scheduler tick while the step is running.
    fn on_update(&mut self, robot: &Robot);

    /// Called once when the step ends for any reason. Must leave the actuators the step
    /// commanded in a safe state.
    fn on_stop(&mut self, robot: &Robot);

    /// Returns true once the step has achieved its goal.
    fn check_finished(&self, robot: &Robot) -> bool;

    /// Short human readable name, used in logs.
    fn name(&self) -> &str {
        "Step"
    }
}

/// A step with its concrete type erased, as held by the composite steps.
pub type BoxedStep = Box<dyn Step>;

impl<S: Step + ?Sized> Step for Box<S> {
    fn on_start(&mut self, robot: &Robot) {
        (**self).on_start(robot)
    }

    fn on_update(&mut self, robot: &Robot) {
        (**self).on_update(robot)
    }

    fn on_stop(&mut self, robot: &Robot) {
        (**self).on_stop(robot)
    }

    fn check_finished(&self, robot: &Robot) -> bool {
        (**self).check_finished(robot)
    }

    fn name(&self) -> &str {
        (**self).name()
    }
}

// ------------------------------------------------------------------------------------------------
// TEST SUPPORT
// ------------------------------------------------------------------------------------------------

/// Steps which record their lifecycle, shared by the tests of the composite steps.
#[cfg(test)]
pub(crate) mod probe {
    use std::sync::{Arc, Mutex};

    use super::{BoxedStep, Step};
    use crate::robot::Robot;

    /// Shared record of lifecycle calls, in the order they happened.
    pub type Journal = Arc<Mutex<Vec<String>>>;

    pub fn journal() -> Journal {
        Arc::new(Mutex::new(Vec::new()))
    }

    pub fn entries(journal: &Journal) -> Vec<String> {
        journal.lock().unwrap().clone()
    }

    /// A step which finishes after a fixed number of updates. `None` never finishes.
    pub struct ProbeStep {
        pub label: String,
        pub updates_to_finish: Option<usize>,
        pub updates: usize,
        pub journal: Journal,
    }

    impl ProbeStep {
        pub fn boxed(label: &str, updates_to_finish: Option<usize>, journal: &Journal) -> BoxedStep {
            Box::new(Self {
                label: label.to_string(),
                updates_to_finish,
                updates: 0,
                journal: journal.clone(),
            })
        }

        fn log(&self, what: &str) {
            self.journal
                .lock()
                .unwrap()
                .push(format!("{}:{}", self.label, what));
        }
    }

    impl Step for ProbeStep {
        fn on_start(&mut self, _robot: &Robot) {
            self.updates = 0;
            self.log("start");
        }

        fn on_update(&mut self, _robot: &Robot) {
            self.updates += 1;
            self.log("update");
        }

        fn on_stop(&mut self, _robot: &Robot) {
            self.log("stop");
        }

        fn check_finished(&self, _robot: &Robot) -> bool {
            match self.updates_to_finish {
                Some(n) => self.updates >= n,
                None => false,
            }
        }

        fn name(&self) -> &str {
            &self.label
        }
    }
}
