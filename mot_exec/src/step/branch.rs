//! Conditional step

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use log::debug;

use super::{BoxedStep, Step};
use crate::robot::Robot;

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

/// Chooses between two steps when it starts and then behaves exactly like the chosen one.
///
/// The condition is evaluated once per start, never during updates.
pub struct BranchStep {
    condition: Box<dyn FnMut(&Robot) -> bool + Send>,
    if_true: BoxedStep,
    if_false: BoxedStep,
    selected: Option<bool>,
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl BranchStep {
    pub fn new<F>(condition: F, if_true: BoxedStep, if_false: BoxedStep) -> Self
    where
        F: FnMut(&Robot) -> bool + Send + 'static,
    {
        Self {
            condition: Box::new(condition),
            if_true,
            if_false,
            selected: None,
        }
    }

    /// The branch chosen at the last start, if the step has started.
    pub fn selected(&self) -> Option<bool> {
        self.selected
    }

    fn active(&mut self) -> Option<&mut BoxedStep> {
        match self.selected {
            Some(true) => Some(&mut self.if_true),
            Some(false) => Some(&mut self.if_false),
            None => None,
        }
    }
}

impl Step for BranchStep {
    fn on_start(&mut self, robot: &Robot) {
        let choice = (self.condition)(robot);
        debug!("Branch taking the {} path", choice);
        self.selected = Some(choice);

        if let Some(step) = self.active() {
            step.on_start(robot);
        }
    }

    fn on_update(&mut self, robot: &Robot) {
        if let Some(step) = self.active() {
            step.on_update(robot);
        }
    }

    fn on_stop(&mut self, robot: &Robot) {
        if let Some(step) = self.active() {
            step.on_stop(robot);
        }
    }

    fn check_finished(&self, robot: &Robot) -> bool {
        match self.selected {
            Some(true) => self.if_true.check_finished(robot),
            Some(false) => self.if_false.check_finished(robot),
            None => false,
        }
    }

    fn name(&self) -> &str {
        "Branch"
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::sim::{SimParams, SimRover};
    use crate::step::probe::{entries, journal, ProbeStep};
    use crate::step::run_sync;
    use drive_if::Pose;
    use std::sync::{
        atomic::{AtomicUsize, Ordering},
        Arc,
    };

    #[test]
    fn test_condition_evaluated_once() {
        let robot = SimRover::new(SimParams::default(), Pose::default()).robot();
        let j = journal();
        let evals = Arc::new(AtomicUsize::new(0));
        let evals_in = evals.clone();

        let mut branch = BranchStep::new(
            move |_| evals_in.fetch_add(1, Ordering::SeqCst) == 0,
            ProbeStep::boxed("t", Some(3), &j),
            ProbeStep::boxed("f", Some(1), &j),
        );

        run_sync(&mut branch, &robot, 10);

        assert_eq!(evals.load(Ordering::SeqCst), 1);
        assert_eq!(branch.selected(), Some(true));
        assert!(entries(&j).iter().all(|e| e.starts_with("t:")));
        assert_eq!(entries(&j).len(), 5);
    }

    #[test]
    fn test_false_branch_uses_robot() {
        let rover = SimRover::new(SimParams::default(), Pose::new(10.0, 0.0, 0.0));
        let j = journal();

        let mut branch = BranchStep::new(
            |robot| robot.pose().x < 5.0,
            ProbeStep::boxed("t", Some(1), &j),
            ProbeStep::boxed("f", Some(1), &j),
        );

        run_sync(&mut branch, &rover.robot(), 10);

        assert_eq!(branch.selected(), Some(false));
        assert_eq!(entries(&j), vec!["f:start", "f:update", "f:stop"]);
    }
}
