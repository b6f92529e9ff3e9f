//! # Pure pursuit controller
//!
//! Follows a dense path by chasing a point a fixed distance ahead of the robot along it, using a
//! drive-to-pose controller to reach that point. The search for the chased point only ever moves
//! forward along the path, so it can't jump back to an earlier section where a path crosses
//! itself.
//!
//! While chasing a point the drive measures progress from the robot's current pose. Once the
//! chased point is the end of the path, progress is measured along the path's final segment, so
//! the path is only finished when the robot has reached its end along the direction it arrives
//! from.

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use std::sync::Arc;

use drive_if::Pose;
use log::info;

use super::{params::PurePursuitOptions, DriveToPose};
use crate::{
    path::{GeneratedPath, PathEvent},
    robot::Robot,
    step::Step,
};

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

/// Handler called with each path event as the robot passes it.
pub type EventHandler = Box<dyn FnMut(&PathEvent, &Robot) + Send>;

/// Step following a generated path.
pub struct PurePursuit {
    path: Arc<GeneratedPath>,
    lookahead: f64,
    drive: DriveToPose,

    /// Index of the point chased on the last update
    last_index: usize,

    /// Index into the path's control points of the next one whose events haven't fired
    next_control_point: usize,

    event_handler: Option<EventHandler>,
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl PurePursuit {
    pub fn new(path: Arc<GeneratedPath>, options: PurePursuitOptions) -> Self {
        let first = path.path_points.first().copied().unwrap_or_default();

        Self {
            path,
            lookahead: options.lookahead,
            drive: DriveToPose::new(first, options.drive),
            last_index: 0,
            next_control_point: 0,
            event_handler: None,
        }
    }

    /// Call `handler` with each path event as the robot passes the control point it belongs to.
    ///
    /// Without a handler events are only logged.
    pub fn with_event_handler<F>(mut self, handler: F) -> Self
    where
        F: FnMut(&PathEvent, &Robot) + Send + 'static,
    {
        self.event_handler = Some(Box::new(handler));
        self
    }

    /// Index of the point chased on the last update.
    pub fn last_index(&self) -> usize {
        self.last_index
    }

    /// Find the index of the point to chase from `pose`.
    ///
    /// This is the first point at or after the previously chased one which is at least the
    /// lookahead distance away, or the final point if none is.
    pub fn find_lookahead(&self, pose: &Pose) -> usize {
        let points = &self.path.path_points;

        (self.last_index..points.len())
            .find(|&i| pose.distance_to(&points[i]) >= self.lookahead)
            .unwrap_or_else(|| points.len().saturating_sub(1))
    }

    fn is_at_end(&self) -> bool {
        self.last_index + 1 >= self.path.path_points.len()
    }

    /// Start of the path's final segment.
    fn final_approach(&self) -> Pose {
        let points = &self.path.path_points;
        points
            .get(points.len().saturating_sub(2))
            .copied()
            .unwrap_or_default()
    }

    /// Fire the events of every control point up to and including `index`, each only once.
    fn fire_events(&mut self, index: usize, robot: &Robot) {
        let path = self.path.clone();

        while self.next_control_point < path.control_point_indices.len()
            && path.control_point_indices[self.next_control_point] <= index
        {
            for event in path.control_points[self.next_control_point].events.iter() {
                info!("Path event {} ({:?}) reached", event.name, event.params);
                if let Some(handler) = self.event_handler.as_mut() {
                    handler(event, robot);
                }
            }
            self.next_control_point += 1;
        }
    }
}

impl Step for PurePursuit {
    fn on_start(&mut self, robot: &Robot) {
        self.last_index = 0;
        self.next_control_point = 0;

        let target = self.find_lookahead(&robot.pose());
        self.drive.set_target(self.path.path_points.get(target).copied().unwrap_or_default());
        self.drive.on_start(robot);
    }

    fn on_update(&mut self, robot: &Robot) {
        if self.path.is_empty() {
            return;
        }

        let index = self.find_lookahead(&robot.pose());
        self.last_index = index;
        self.fire_events(index, robot);

        let start_pose = if self.is_at_end() {
            self.final_approach()
        } else {
            robot.pose()
        };
        self.drive.set_start_pose(start_pose);
        self.drive.set_target(self.path.path_points[index]);
        self.drive.on_update(robot);
    }

    fn on_stop(&mut self, robot: &Robot) {
        self.drive.on_stop(robot);
    }

    fn check_finished(&self, robot: &Robot) -> bool {
        self.path.is_empty() || (self.is_at_end() && self.drive.check_finished(robot))
    }

    fn name(&self) -> &str {
        "PurePursuit"
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::path::{ControlPoint, PathGenerator};
    use crate::sim::{SimParams, SimRover};
    use crate::step::{run_sync, TimeoutStep};
    use drive_if::{Clock, Odometry};
    use std::f64::consts::PI;
    use std::sync::Mutex;

    fn path() -> Arc<GeneratedPath> {
        let cps = vec![
            ControlPoint::with_handles(Pose::new(0.0, 0.0, 0.0), 0.0, 12.0)
                .with_event(PathEvent::new("start", "")),
            ControlPoint::with_handles(Pose::new(36.0, 24.0, 0.5), 12.0, 12.0)
                .with_event(PathEvent::new("middle", "a"))
                .with_event(PathEvent::new("middle", "b")),
            ControlPoint::with_handles(Pose::new(72.0, 24.0, 0.0), 12.0, 0.0)
                .with_event(PathEvent::new("end", "")),
        ];

        Arc::new(PathGenerator::new(0.02).unwrap().generate(cps).unwrap())
    }

    #[test]
    fn test_lookahead_only_moves_forward() {
        let path = path();
        let mut pp = PurePursuit::new(path.clone(), PurePursuitOptions::default());

        let idx = pp.find_lookahead(&Pose::default());
        assert!(idx > 0);
        assert!(path.path_points[idx].distance_to(&Pose::default()) >= 12.0);
        assert!(path.path_points[idx - 1].distance_to(&Pose::default()) < 12.0);

        // From further back the search still doesn't go backwards
        pp.last_index = idx;
        assert!(pp.find_lookahead(&Pose::new(-50.0, 0.0, 0.0)) >= idx);

        // Nothing far enough away, chase the end
        let end = path.end_pose().unwrap();
        assert_eq!(pp.find_lookahead(&end), path.len() - 1);
    }

    #[test]
    fn test_follows_path_and_fires_events_in_order() {
        let path = path();
        let rover = SimRover::new(SimParams::default(), Pose::default());
        let fired = Arc::new(Mutex::new(Vec::new()));
        let fired_in = fired.clone();

        let pp = PurePursuit::new(path.clone(), PurePursuitOptions::default()).with_event_handler(
            move |e, _| fired_in.lock().unwrap().push(format!("{}:{}", e.name, e.params)),
        );
        let mut step = TimeoutStep::new(Box::new(pp), 20_000);
        run_sync(&mut step, &rover.robot(), 10);

        assert!(rover.now_ms() < 20_000);
        assert!(rover.get_pose().distance_to(&path.end_pose().unwrap()) < 2.0);
        assert_eq!(
            *fired.lock().unwrap(),
            vec!["start:", "middle:a", "middle:b", "end:"]
        );
    }

    #[test]
    fn test_u_turn_finishes_at_path_end() {
        let cps = vec![
            ControlPoint::with_handles(Pose::new(0.0, 0.0, 0.0), 0.0, 12.0),
            ControlPoint::with_handles(Pose::new(60.0, 0.0, 0.0), 12.0, 12.0),
            ControlPoint::with_handles(Pose::new(60.0, 48.0, PI), 12.0, 12.0),
            ControlPoint::with_handles(Pose::new(0.0, 48.0, PI), 12.0, 0.0),
        ];
        let path = Arc::new(PathGenerator::new(0.02).unwrap().generate(cps).unwrap());
        let end = path.end_pose().unwrap();

        let rover = SimRover::new(SimParams::default(), Pose::default());
        let mut step = TimeoutStep::new(
            Box::new(PurePursuit::new(path.clone(), PurePursuitOptions::default())),
            30_000,
        );
        run_sync(&mut step, &rover.robot(), 10);

        assert!(rover.now_ms() < 30_000);

        // The end lies off the line from the start of the path, progress towards it must still
        // be complete
        let pose = rover.get_pose();
        assert!(pose.distance_to(&end) < 2.0, "stopped at {:?}", pose);
        assert!(pose.x < 1.0);
    }

    #[test]
    fn test_final_approach() {
        let path = path();
        let pp = PurePursuit::new(path.clone(), PurePursuitOptions::default());

        assert_eq!(pp.final_approach(), path.path_points[path.len() - 2]);
    }
}
