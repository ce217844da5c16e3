//! Priority dispatching rules and the solver built on them.
//!
//! A rule maps a frontier step to a comparable key; smaller keys are
//! dispatched first. The catalogue follows Kaban et al., "Comparison of
//! dispatching rules in job-shop scheduling problem using simulation"
//! (Int. J. of Simulation Modelling 11, 2012), plus the HH/IHH composites.

use crate::error::JsspError;
use crate::problem::Problem;
use crate::solution::Solution;
use crate::solver::{RunState, SolveContext, Solver};
use crate::step::StepId;
use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

/// Lexicographic priority key over two floats. Comparison goes through
/// `f64::total_cmp`, so keys are totally ordered.
#[derive(Debug, Clone, Copy)]
pub struct PriorityKey {
    primary: f64,
    secondary: f64,
}

impl PriorityKey {
    pub fn scalar(primary: f64) -> Self {
        Self {
            primary,
            secondary: 0.0,
        }
    }

    pub fn pair(primary: f64, secondary: f64) -> Self {
        Self { primary, secondary }
    }
}

impl PartialEq for PriorityKey {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for PriorityKey {}

impl PartialOrd for PriorityKey {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for PriorityKey {
    fn cmp(&self, other: &Self) -> Ordering {
        self.primary
            .total_cmp(&other.primary)
            .then(self.secondary.total_cmp(&other.secondary))
    }
}

/// Built-in dispatching rules.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchRule {
    /// Shortest processing time.
    Spt,
    /// Longest processing time.
    Lpt,
    /// Shortest process sequence.
    Sps,
    /// Longest process sequence.
    Lps,
    /// Shortest total processing time of the job.
    Stpt,
    /// Longest total processing time of the job.
    Ltpt,
    /// Earliest creation time.
    Ect,
    /// Longest creation time.
    Lct,
    /// Shortest waiting time at the machine.
    Swt,
    /// Longest waiting time at the machine.
    Lwt,
    /// Least total work remaining.
    Ltwr,
    /// Most total work remaining.
    Mtwr,
    /// Earliest estimated start time.
    Est,
    /// Longest estimated start time.
    Lst,
    /// Estimated start time, then remaining work minus 1.5x duration.
    Hh,
    /// Estimated start time, then remaining work per duration unit.
    Ihh,
}

impl DispatchRule {
    pub const ALL: [DispatchRule; 16] = [
        DispatchRule::Spt,
        DispatchRule::Lpt,
        DispatchRule::Sps,
        DispatchRule::Lps,
        DispatchRule::Stpt,
        DispatchRule::Ltpt,
        DispatchRule::Ect,
        DispatchRule::Lct,
        DispatchRule::Swt,
        DispatchRule::Lwt,
        DispatchRule::Ltwr,
        DispatchRule::Mtwr,
        DispatchRule::Est,
        DispatchRule::Lst,
        DispatchRule::Hh,
        DispatchRule::Ihh,
    ];

    pub fn tag(&self) -> &'static str {
        match self {
            DispatchRule::Spt => "SPT",
            DispatchRule::Lpt => "LPT",
            DispatchRule::Sps => "SPS",
            DispatchRule::Lps => "LPS",
            DispatchRule::Stpt => "STPT",
            DispatchRule::Ltpt => "LTPT",
            DispatchRule::Ect => "ECT",
            DispatchRule::Lct => "LCT",
            DispatchRule::Swt => "SWT",
            DispatchRule::Lwt => "LWT",
            DispatchRule::Ltwr => "LTWR",
            DispatchRule::Mtwr => "MTWR",
            DispatchRule::Est => "EST",
            DispatchRule::Lst => "LST",
            DispatchRule::Hh => "HH",
            DispatchRule::Ihh => "IHH",
        }
    }

    /// Priority of dispatching `op` next in `solution`; smaller is better.
    pub fn key(&self, op: StepId, solution: &Solution) -> PriorityKey {
        let duration = solution.step(op).source.duration();
        match self {
            DispatchRule::Spt => PriorityKey::scalar(duration),
            DispatchRule::Lpt => PriorityKey::scalar(-duration),
            DispatchRule::Sps => PriorityKey::scalar(job_sequence_length(solution, op)),
            DispatchRule::Lps => PriorityKey::scalar(-job_sequence_length(solution, op)),
            DispatchRule::Stpt => PriorityKey::scalar(job_total_duration(solution, op)),
            DispatchRule::Ltpt => PriorityKey::scalar(-job_total_duration(solution, op)),
            DispatchRule::Ect => PriorityKey::scalar(creation_time(solution, op)),
            DispatchRule::Lct => PriorityKey::scalar(-creation_time(solution, op)),
            DispatchRule::Swt => PriorityKey::scalar(waiting_time(solution, op)),
            DispatchRule::Lwt => PriorityKey::scalar(-waiting_time(solution, op)),
            DispatchRule::Ltwr => PriorityKey::scalar(work_remaining(solution, op)),
            DispatchRule::Mtwr => PriorityKey::scalar(-work_remaining(solution, op)),
            DispatchRule::Est => PriorityKey::scalar(solution.estimated_start_time(op)),
            DispatchRule::Lst => PriorityKey::scalar(-solution.estimated_start_time(op)),
            DispatchRule::Hh => PriorityKey::pair(
                solution.estimated_start_time(op),
                -(work_remaining(solution, op) - 1.5 * duration),
            ),
            DispatchRule::Ihh => PriorityKey::pair(
                solution.estimated_start_time(op),
                -(work_remaining(solution, op) / duration),
            ),
        }
    }
}

impl fmt::Display for DispatchRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

impl FromStr for DispatchRule {
    type Err = JsspError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let tag = s.to_ascii_uppercase();
        DispatchRule::ALL
            .iter()
            .find(|rule| rule.tag() == tag)
            .copied()
            .ok_or_else(|| JsspError::InvalidRule(s.to_owned()))
    }
}

fn job_of(solution: &Solution, op: StepId) -> u32 {
    solution
        .step(op)
        .source
        .job_id()
        .unwrap_or_else(|| panic!("dispatching rules apply to operation steps"))
}

/// Number of operations in the step's job.
fn job_sequence_length(solution: &Solution, op: StepId) -> f64 {
    let sentinel = solution.job_sentinel(job_of(solution, op));
    let mut count = 0;
    let mut current = solution.step(sentinel).next_job;
    while let Some(id) = current {
        count += 1;
        current = solution.step(id).next_job;
    }
    count as f64
}

/// Total processing time of the step's job.
fn job_total_duration(solution: &Solution, op: StepId) -> f64 {
    let sentinel = solution.job_sentinel(job_of(solution, op));
    let mut total = 0.0;
    let mut current = solution.step(sentinel).next_job;
    while let Some(id) = current {
        total += solution.step(id).source.duration();
        current = solution.step(id).next_job;
    }
    total
}

/// When the step becomes available in its job chain.
fn creation_time(solution: &Solution, op: StepId) -> f64 {
    solution
        .step(op)
        .prev_job
        .map(|pre| solution.step(pre).end_time())
        .unwrap_or(0.0)
}

/// How long the step would sit at its machine before starting; the estimated
/// start time already caps the wait at zero.
fn waiting_time(solution: &Solution, op: StepId) -> f64 {
    solution.estimated_start_time(op) - creation_time(solution, op)
}

/// Processing time still to spend on the job, current step included.
fn work_remaining(solution: &Solution, op: StepId) -> f64 {
    let mut total = 0.0;
    let mut current = Some(op);
    while let Some(id) = current {
        total += solution.step(id).source.duration();
        current = solution.step(id).next_job;
    }
    total
}

/// Rule closure form: also accepts user-defined rules.
pub type RuleFn = dyn Fn(StepId, &Solution) -> PriorityKey + Send + Sync;

/// Iterative constructor: repeatedly dispatches the frontier step with the
/// smallest key until every operation sits in a machine chain.
pub struct PriorityDispatchSolver {
    name: String,
    rule: Arc<RuleFn>,
    run_state: RunState,
}

impl PriorityDispatchSolver {
    pub fn new(rule: DispatchRule) -> Self {
        Self {
            name: format!("PriorityDispatch-{}", rule),
            rule: Arc::new(move |op, solution| rule.key(op, solution)),
            run_state: RunState::default(),
        }
    }

    pub fn from_tag(tag: &str) -> Result<Self, JsspError> {
        Ok(Self::new(tag.parse()?))
    }

    /// Solver over a user-defined rule function.
    pub fn with_rule_fn(
        name: &str,
        rule: impl Fn(StepId, &Solution) -> PriorityKey + Send + Sync + 'static,
    ) -> Self {
        Self {
            name: format!("PriorityDispatch-{}", name),
            rule: Arc::new(rule),
            run_state: RunState::default(),
        }
    }

    fn solving_iteration(&self, solution: &mut Solution) -> Result<(), JsspError> {
        let rule = self.rule.as_ref();
        let mut frontier = solution.imminent_ops();
        while !frontier.is_empty() {
            // stable sort: on equal keys the earlier frontier entry wins
            frontier.sort_by_cached_key(|&op| rule(op, &*solution));
            let op = frontier[0];
            solution.dispatch(op, true)?;
            match solution.step(op).next_job {
                Some(next) => frontier[0] = next,
                None => {
                    frontier.remove(0);
                }
            }
        }
        Ok(())
    }
}

impl Solver for PriorityDispatchSolver {
    fn name(&self) -> &str {
        &self.name
    }

    fn run_state(&self) -> &RunState {
        &self.run_state
    }

    fn duplicate(&self) -> Box<dyn Solver> {
        Box::new(Self {
            name: self.name.clone(),
            rule: Arc::clone(&self.rule),
            run_state: RunState::default(),
        })
    }

    fn do_solve(&self, problem: &Problem, ctx: &SolveContext) -> Result<(), JsspError> {
        let mut solution = Solution::new(problem, false);
        self.solving_iteration(&mut solution)?;
        ctx.report_improvement(&solution);
        Ok(())
    }
}
