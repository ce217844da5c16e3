//! Solver contract and the threaded run driver.

use crate::error::JsspError;
use crate::problem::Problem;
use crate::solution::Solution;
use log::{info, warn};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;
use std::thread;
use std::time::{Duration, Instant};

/// Callback invoked on the worker thread for every improved solution. The
/// borrow must not be retained past the call; clone to keep a solution.
pub type ImprovementCallback<'a> = Box<dyn FnMut(&Solution) + Send + 'a>;

/// Re-entry guard shared by all solvers: one run at a time per instance.
#[derive(Debug, Default)]
pub struct RunState {
    running: AtomicBool,
}

impl RunState {
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    fn try_start(&self) -> Result<(), JsspError> {
        if self.running.swap(true, Ordering::SeqCst) {
            return Err(JsspError::AlreadyRunning);
        }
        Ok(())
    }

    fn finish(&self) {
        self.running.store(false, Ordering::SeqCst);
    }
}

/// Shared state of one solving run: the best solution found so far, the
/// improvement callback and the cooperative time budget for external
/// back-ends.
pub struct SolveContext<'a> {
    max_time: Option<Duration>,
    started: Instant,
    incumbent: Mutex<Incumbent<'a>>,
}

struct Incumbent<'a> {
    best: Option<Solution>,
    on_improvement: Option<ImprovementCallback<'a>>,
}

impl<'a> SolveContext<'a> {
    fn new(max_time: Option<Duration>, on_improvement: Option<ImprovementCallback<'a>>) -> Self {
        Self {
            max_time,
            started: Instant::now(),
            incumbent: Mutex::new(Incumbent {
                best: None,
                on_improvement,
            }),
        }
    }

    pub fn max_time(&self) -> Option<Duration> {
        self.max_time
    }

    /// Remaining share of the time budget, if one was given. External
    /// back-ends pass this to their own time-limit option.
    pub fn remaining_time(&self) -> Option<Duration> {
        self.max_time
            .map(|budget| budget.saturating_sub(self.started.elapsed()))
    }

    /// Record `solution` as the incumbent and run the user callback.
    pub fn report_improvement(&self, solution: &Solution) {
        let mut incumbent = self.incumbent.lock().unwrap();
        incumbent.best = Some(solution.clone());
        if let Some(on_improvement) = incumbent.on_improvement.as_mut() {
            on_improvement(solution);
        }
    }

    fn into_best(self) -> Option<Solution> {
        self.incumbent.into_inner().unwrap().best
    }
}

/// Outcome of one `solve` run. On a failed run `status` is false,
/// `user_time` still holds the wall-clock time spent and `solution` is the
/// last improvement, if any was reported.
#[derive(Debug)]
pub struct SolveResult {
    pub status: bool,
    pub user_time: f64,
    pub solution: Option<Solution>,
}

pub trait Solver: Send + Sync {
    fn name(&self) -> &str;

    fn run_state(&self) -> &RunState;

    /// Fresh instance of this solver for an independent run, e.g. one
    /// benchmark case.
    fn duplicate(&self) -> Box<dyn Solver>;

    /// Solver-specific search. Improved solutions are reported through the
    /// context; errors propagate to the driver and mark the run as failed.
    fn do_solve(&self, problem: &Problem, ctx: &SolveContext) -> Result<(), JsspError>;

    /// Run `do_solve` on a worker thread and wait for it. Improvement
    /// callbacks run on that worker thread. Core errors are never swallowed:
    /// a failed run reports `status = false` together with its elapsed time.
    fn solve(
        &self,
        problem: &Problem,
        max_time: Option<Duration>,
        on_improvement: Option<ImprovementCallback<'_>>,
    ) -> Result<SolveResult, JsspError> {
        self.run_state().try_start()?;
        let ctx = SolveContext::new(max_time, on_improvement);
        let clock = Instant::now();

        let outcome = thread::scope(|scope| scope.spawn(|| self.do_solve(problem, &ctx)).join());

        let user_time = clock.elapsed().as_secs_f64();
        self.run_state().finish();

        let status = match outcome {
            Ok(Ok(())) => {
                info!("{} solved {} in {:.1} sec", self.name(), problem.name(), user_time);
                true
            }
            Ok(Err(err)) => {
                warn!("{} failed on {}: {}", self.name(), problem.name(), err);
                false
            }
            Err(_) => {
                warn!("{} panicked on {}", self.name(), problem.name());
                false
            }
        };

        Ok(SolveResult {
            status,
            user_time,
            solution: ctx.into_best(),
        })
    }
}
