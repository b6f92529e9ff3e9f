//! Sequential composition of steps

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use log::debug;

use super::{BoxedStep, Step};
use crate::robot::Robot;

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

/// Runs its children one after another, optionally repeating the whole sequence.
///
/// When a child finishes it is stopped and the next child is started in the same tick, receiving
/// its first update on the following tick. A repeat count of zero repeats forever.
pub struct ListStep {
    steps: Vec<BoxedStep>,
    repeat_count: u32,

    index: usize,
    iteration: u32,
    child_active: bool,
    finished: bool,
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl ListStep {
    /// A list which runs each of its children once.
    pub fn new(steps: Vec<BoxedStep>) -> Self {
        Self::repeating(steps, 1)
    }

    /// A list which runs its children `repeat_count` times, or forever if the count is zero.
    pub fn repeating(steps: Vec<BoxedStep>, repeat_count: u32) -> Self {
        Self {
            steps,
            repeat_count,
            index: 0,
            iteration: 0,
            child_active: false,
            finished: false,
        }
    }

    /// Append a step to the end of the list.
    pub fn push(&mut self, step: BoxedStep) {
        self.steps.push(step);
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// Index of the child currently running.
    pub fn current_index(&self) -> usize {
        self.index
    }

    /// Number of complete passes through the children so far.
    pub fn iterations_done(&self) -> u32 {
        self.iteration
    }

    fn advance(&mut self, robot: &Robot) {
        self.index += 1;

        if self.index >= self.steps.len() {
            self.index = 0;
            self.iteration = self.iteration.saturating_add(1);

            if self.repeat_count != 0 && self.iteration >= self.repeat_count {
                self.finished = true;
                return;
            }
        }

        debug!("List starting child {}", self.index);
        self.steps[self.index].on_start(robot);
        self.child_active = true;
    }
}

impl Step for ListStep {
    fn on_start(&mut self, robot: &Robot) {
        self.index = 0;
        self.iteration = 0;
        self.child_active = false;

        // There's nothing to repeat in an empty list, even forever
        self.finished = self.steps.is_empty();

        if !self.finished {
            self.steps[0].on_start(robot);
            self.child_active = true;
        }
    }

    fn on_update(&mut self, robot: &Robot) {
        if self.finished || !self.child_active {
            return;
        }

        let child = &mut self.steps[self.index];
        child.on_update(robot);

        if child.check_finished(robot) {
            child.on_stop(robot);
            self.child_active = false;
            self.advance(robot);
        }
    }

    fn on_stop(&mut self, robot: &Robot) {
        if self.child_active {
            self.steps[self.index].on_stop(robot);
            self.child_active = false;
        }
    }

    fn check_finished(&self, _robot: &Robot) -> bool {
        self.finished
    }

    fn name(&self) -> &str {
        "List"
    }
}
