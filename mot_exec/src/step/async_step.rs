//! # Asynchronous steps
//!
//! An [`AsyncStep`] launches its child on a background thread and reports itself finished straight
//! away, so the enclosing sequence carries on while the child runs alongside it. Every async step
//! registers itself with an [`AsyncRegistry`] so that all background work can be cancelled in one
//! call, which the robot must do before handing control back to a human operator.
//!
//! Registry entries are shared (`Arc`) between the registry, the step, and the step's thread. The
//! registry never keeps a finished task whose step has been dropped, so it does not grow over the
//! lifetime of the program.
//!
//! While a stop is in progress no async step of the registry can start a new run. This covers
//! async steps nested inside the children being stopped, which would otherwise be started by a
//! child between its cancellation and its last tick.

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use std::{
    sync::{
        atomic::{AtomicBool, AtomicUsize, Ordering},
        Arc, Mutex, MutexGuard,
    },
    thread::{self, JoinHandle},
};

use conquer_once::Lazy;
use log::{debug, error, info, warn};

use super::{run_until_cancelled, BoxedStep, Step};
use crate::robot::Robot;

// ------------------------------------------------------------------------------------------------
// GLOBALS
// ------------------------------------------------------------------------------------------------

static GLOBAL_REGISTRY: Lazy<Arc<AsyncRegistry>> = Lazy::new(|| Arc::new(AsyncRegistry::new()));

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

/// Tracks every live asynchronous step so they can be stopped together.
#[derive(Default)]
pub struct AsyncRegistry {
    tasks: Mutex<Vec<Arc<AsyncTask>>>,

    /// Number of `stop_all` calls in progress.
    stopping: AtomicUsize,
}

/// Book-keeping for one asynchronous step, shared with its background thread.
struct AsyncTask {
    name: String,

    /// Raised to ask the background run to stop.
    cancel: AtomicBool,

    /// True while a background run is in progress.
    running: AtomicBool,

    /// False once the owning step has been dropped.
    owner_alive: AtomicBool,

    /// Handle of the background thread. Held while a run is started or cancelled so that the two
    /// can't interleave.
    thread: Mutex<Option<JoinHandle<()>>>,
}

/// Ends a stop on the registry when dropped.
struct StoppingGuard<'a>(&'a AtomicUsize);

/// Clears the running flag when a background run ends, even if the child panicked.
struct RunningGuard(Arc<AsyncTask>);

/// Runs a child step in the background, finishing immediately.
///
/// Stopping an async step does not stop its child, the child runs until it finishes by itself or
/// until [`stop_all`] (or [`AsyncRegistry::stop_all`]) cancels it.
pub struct AsyncStep {
    child: Arc<Mutex<BoxedStep>>,
    task: Arc<AsyncTask>,
    registry: Arc<AsyncRegistry>,
    tick_ms: u64,
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl AsyncRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of tasks currently known to the registry.
    pub fn num_registered(&self) -> usize {
        lock(&self.tasks).len()
    }

    /// Number of tasks with a background run in progress.
    pub fn num_running(&self) -> usize {
        lock(&self.tasks)
            .iter()
            .filter(|t| t.running.load(Ordering::SeqCst))
            .count()
    }

    /// Cancel every background run and wait for each to stop.
    ///
    /// When this returns no asynchronous step registered here will command the robot again,
    /// unless it is restarted. Returns the number of runs that were in progress.
    pub fn stop_all(&self) -> usize {
        self.stopping.fetch_add(1, Ordering::SeqCst);
        let _stopping = StoppingGuard(&self.stopping);

        let mut stopped: Vec<Arc<AsyncTask>> = Vec::new();

        // Repeat until nothing is left running, a child may have started an async step of its own
        // before it saw its cancellation.
        loop {
            // Snapshot so the list is not locked while joining
            let tasks: Vec<Arc<AsyncTask>> = lock(&self.tasks).clone();

            let running: Vec<Arc<AsyncTask>> =
                tasks.into_iter().filter(|t| t.request_cancel()).collect();

            if running.is_empty() {
                break;
            }

            for task in running.iter() {
                if !stopped.iter().any(|s| Arc::ptr_eq(s, task)) {
                    stopped.push(task.clone());
                }
            }

            for task in running.iter() {
                task.join();
            }
        }

        self.prune();

        if !stopped.is_empty() {
            info!("Stopped {} asynchronous step(s)", stopped.len());
        }

        stopped.len()
    }

    /// True while a `stop_all` is in progress.
    pub fn is_stopping(&self) -> bool {
        self.stopping.load(Ordering::SeqCst) > 0
    }

    fn register(&self, task: Arc<AsyncTask>) {
        lock(&self.tasks).push(task);
    }

    /// Forget tasks whose step has been dropped and which are no longer running.
    fn prune(&self) {
        lock(&self.tasks).retain(|t| {
            t.owner_alive.load(Ordering::SeqCst) || t.running.load(Ordering::SeqCst)
        });
    }
}

impl AsyncTask {
    fn new(name: String) -> Self {
        Self {
            name,
            cancel: AtomicBool::new(false),
            running: AtomicBool::new(false),
            owner_alive: AtomicBool::new(true),
            thread: Mutex::new(None),
        }
    }

    /// Raise the cancel flag. Returns true if a run is in progress on another thread.
    fn request_cancel(&self) -> bool {
        let slot = lock(&self.thread);
        self.cancel.store(true, Ordering::SeqCst);

        self.running.load(Ordering::SeqCst) && !is_current(&slot)
    }

    /// Wait for the background thread, if there is one.
    fn join(&self) {
        let jh = {
            let mut slot = lock(&self.thread);

            // A child which calls stop_all from its own thread cannot wait for itself
            if is_current(&slot) {
                return;
            }

            slot.take()
        };

        if let Some(jh) = jh {
            if jh.join().is_err() {
                error!("Asynchronous step {} panicked", self.name);
            }
        }
    }
}

impl AsyncStep {
    /// Wrap `child` so that it runs in the background, registered with the global registry.
    pub fn new(child: BoxedStep, tick_ms: u64) -> Self {
        Self::with_registry(child, tick_ms, global_registry())
    }

    /// Wrap `child`, registering it with the given registry.
    pub fn with_registry(child: BoxedStep, tick_ms: u64, registry: Arc<AsyncRegistry>) -> Self {
        let task = Arc::new(AsyncTask::new(format!("Async({})", child.name())));
        registry.register(task.clone());

        Self {
            child: Arc::new(Mutex::new(child)),
            task,
            registry,
            tick_ms,
        }
    }

    /// True while the child is running in the background.
    pub fn is_running(&self) -> bool {
        self.task.running.load(Ordering::SeqCst)
    }

    /// Block until the current background run, if any, has ended.
    pub fn wait(&self) {
        self.task.join();
    }
}

impl Step for AsyncStep {
    fn on_start(&mut self, robot: &Robot) {
        // A previous run must be over before the child is started again
        if self.is_running() {
            debug!("{} restarted while running, cancelling previous run", self.task.name);
            self.task.cancel.store(true, Ordering::SeqCst);
        }
        self.task.join();

        let mut slot = lock(&self.task.thread);

        if self.registry.is_stopping() {
            warn!(
                "{} not started, asynchronous steps are being stopped",
                self.task.name
            );
            return;
        }

        self.task.cancel.store(false, Ordering::SeqCst);
        self.task.running.store(true, Ordering::SeqCst);

        let child = self.child.clone();
        let task = self.task.clone();
        let robot = robot.clone();
        let tick_ms = self.tick_ms;

        *slot = Some(thread::spawn(move || {
            let _running = RunningGuard(task.clone());
            let mut child = lock(&*child);
            run_until_cancelled(&mut *child, &robot, tick_ms, Some(&task.cancel));
        }));
    }

    fn on_update(&mut self, _robot: &Robot) {}

    fn on_stop(&mut self, _robot: &Robot) {}

    fn check_finished(&self, _robot: &Robot) -> bool {
        true
    }

    fn name(&self) -> &str {
        &self.task.name
    }
}

impl Drop for StoppingGuard<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

impl Drop for RunningGuard {
    fn drop(&mut self) {
        self.0.running.store(false, Ordering::SeqCst);
    }
}

impl Drop for AsyncStep {
    fn drop(&mut self) {
        self.task.owner_alive.store(false, Ordering::SeqCst);
        self.registry.prune();
    }
}

// ------------------------------------------------------------------------------------------------
// FUNCTIONS
// ------------------------------------------------------------------------------------------------

/// The registry used by [`AsyncStep::new`].
pub fn global_registry() -> Arc<AsyncRegistry> {
    GLOBAL_REGISTRY.clone()
}

/// Cancel every asynchronous step in the global registry and wait for them to stop.
///
/// Must be called before autonomous control is handed back to the operator.
pub fn stop_all() -> usize {
    GLOBAL_REGISTRY.stop_all()
}

/// True if the handle belongs to the calling thread.
fn is_current(slot: &Option<JoinHandle<()>>) -> bool {
    slot.as_ref()
        .map(|jh| jh.thread().id() == thread::current().id())
        .unwrap_or(false)
}

/// Lock a mutex, carrying on with the data if another thread panicked while holding it.
fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    match mutex.lock() {
        Ok(g) => g,
        Err(poisoned) => poisoned.into_inner(),
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::sim::{SimParams, SimRover};
    use crate::step::probe::{entries, journal, ProbeStep};
    use crate::step::{run_sync, FnStep, ListStep};
    use drive_if::{Pose, SystemClock};
    use std::time::Duration;

    /// Robot with the simulated chassis but a real clock, so background threads really sleep.
    fn robot() -> Robot {
        sim_robot().1
    }

    fn sim_robot() -> (Arc<SimRover>, Robot) {
        let rover = SimRover::new(SimParams::default(), Pose::default());
        let robot = Robot::new(rover.clone(), rover.clone(), Arc::new(SystemClock::new()));
        (rover, robot)
    }

    /// A step which drives the chassis every update and never finishes.
    fn driving(forward: f64, turn: f64) -> BoxedStep {
        Box::new(FnStep::new("Drive", move |robot| {
            robot.chassis.drive(forward, turn, 0.0);
            false
        }))
    }

    /// A step which does nothing for `duration_ms` of clock time.
    fn idle_for(duration_ms: u64) -> BoxedStep {
        let mut start_ms = None;
        Box::new(FnStep::new("Idle", move |robot| {
            let start = *start_ms.get_or_insert(robot.now_ms());
            robot.now_ms() - start >= duration_ms
        }))
    }

    fn sleep_ms(ms: u64) {
        std::thread::sleep(Duration::from_millis(ms));
    }

    #[test]
    fn test_finishes_immediately_and_child_completes() {
        let robot = robot();
        let registry = Arc::new(AsyncRegistry::new());
        let j = journal();

        let mut step =
            AsyncStep::with_registry(ProbeStep::boxed("a", Some(3), &j), 1, registry.clone());

        step.on_start(&robot);
        assert!(step.check_finished(&robot));
        step.on_stop(&robot);

        step.wait();
        assert!(!step.is_running());
        assert_eq!(
            entries(&j),
            vec!["a:start", "a:update", "a:update", "a:update", "a:stop"]
        );
    }

    #[test]
    fn test_stop_all_cancels() {
        let robot = robot();
        let registry = Arc::new(AsyncRegistry::new());
        let j = journal();

        let mut list = ListStep::new(vec![
            Box::new(AsyncStep::with_registry(
                ProbeStep::boxed("bg", None, &j),
                1,
                registry.clone(),
            )),
            ProbeStep::boxed("fg", Some(5), &j),
        ]);

        run_sync(&mut list, &robot, 1);

        // The foreground sequence finished while the background child is still going
        assert_eq!(registry.num_running(), 1);

        assert_eq!(registry.stop_all(), 1);
        assert_eq!(registry.num_running(), 0);

        let log = entries(&j);
        assert_eq!(log.last().map(String::as_str), Some("bg:stop"));

        // No more updates once stopped
        let len = log.len();
        std::thread::sleep(std::time::Duration::from_millis(10));
        assert_eq!(entries(&j).len(), len);
    }

    #[test]
    fn test_registry_pruned_on_drop() {
        let robot = robot();
        let registry = Arc::new(AsyncRegistry::new());
        let j = journal();

        for _ in 0..10 {
            let mut step =
                AsyncStep::with_registry(ProbeStep::boxed("a", Some(1), &j), 1, registry.clone());
            step.on_start(&robot);
            step.wait();
        }

        assert_eq!(registry.num_registered(), 0);

        let _live = AsyncStep::with_registry(ProbeStep::boxed("b", Some(1), &j), 1, registry.clone());
        assert_eq!(registry.num_registered(), 1);
    }

    #[test]
    fn test_restart_cancels_previous_run() {
        let robot = robot();
        let registry = Arc::new(AsyncRegistry::new());
        let j = journal();

        let mut step =
            AsyncStep::with_registry(ProbeStep::boxed("a", None, &j), 1, registry.clone());
        step.on_start(&robot);
        step.on_start(&robot);

        assert_eq!(registry.num_registered(), 1);
        assert_eq!(registry.stop_all(), 1);

        let starts = entries(&j).iter().filter(|e| e.as_str() == "a:start").count();
        let stops = entries(&j).iter().filter(|e| e.as_str() == "a:stop").count();
        assert_eq!(starts, 2);
        assert_eq!(stops, 2);
    }

    #[test]
    fn test_stop_all_neutralises_chassis() {
        let (rover, robot) = sim_robot();
        let registry = Arc::new(AsyncRegistry::new());

        let mut step = AsyncStep::with_registry(driving(0.7, 0.2), 1, registry.clone());
        step.on_start(&robot);

        sleep_ms(20);
        assert!(rover.num_drive_cmds() > 0);

        assert_eq!(registry.stop_all(), 1);
        assert!(rover.last_dems().is_neutral());

        let num_cmds = rover.num_drive_cmds();
        sleep_ms(20);
        assert_eq!(rover.num_drive_cmds(), num_cmds);
    }

    #[test]
    fn test_nested_step_not_started_during_stop() {
        let (rover, robot) = sim_robot();
        let registry = Arc::new(AsyncRegistry::new());
        let j = journal();

        // The inner step is only reached after the outer child has been idle for 100 ms
        let inner = AsyncStep::with_registry(driving(0.5, 0.0), 1, registry.clone());
        let outer_child = ListStep::new(vec![
            idle_for(100),
            Box::new(inner),
            ProbeStep::boxed("idle", None, &j),
        ]);
        let mut outer = AsyncStep::with_registry(Box::new(outer_child), 1, registry.clone());

        outer.on_start(&robot);
        sleep_ms(30);

        assert_eq!(registry.stop_all(), 1);
        assert_eq!(registry.num_running(), 0);

        let num_cmds = rover.num_drive_cmds();
        sleep_ms(150);
        assert_eq!(rover.num_drive_cmds(), num_cmds);
        assert!(rover.last_dems().is_neutral());
        assert_eq!(registry.num_running(), 0);
    }

    #[test]
    fn test_nested_running_step_stopped() {
        let (rover, robot) = sim_robot();
        let registry = Arc::new(AsyncRegistry::new());
        let j = journal();

        let inner = AsyncStep::with_registry(driving(0.5, 0.0), 1, registry.clone());
        let outer_child = ListStep::new(vec![
            Box::new(inner),
            ProbeStep::boxed("idle", None, &j),
        ]);
        let mut outer = AsyncStep::with_registry(Box::new(outer_child), 1, registry.clone());

        outer.on_start(&robot);
        sleep_ms(30);
        assert_eq!(registry.num_running(), 2);
        assert!(rover.num_drive_cmds() > 0);

        assert_eq!(registry.stop_all(), 2);
        assert_eq!(registry.num_running(), 0);

        let num_cmds = rover.num_drive_cmds();
        sleep_ms(30);
        assert_eq!(rover.num_drive_cmds(), num_cmds);
        assert!(rover.last_dems().is_neutral());
    }

    #[test]
    fn test_global_stop_all() {
        let (rover, robot) = sim_robot();

        let mut step = AsyncStep::new(driving(0.7, 0.2), 1);
        step.on_start(&robot);

        sleep_ms(20);
        assert!(step.is_running());

        assert!(stop_all() >= 1);
        assert!(!step.is_running());
        assert!(rover.last_dems().is_neutral());

        let num_cmds = rover.num_drive_cmds();
        sleep_ms(20);
        assert_eq!(rover.num_drive_cmds(), num_cmds);
    }
}
