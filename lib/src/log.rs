//! Serialisable run records and the per-run YAML log they are written to.

use chrono::Utc;
use log::{info, warn};
use serde::Serialize;
use serde_derive::{Deserialize, Serialize};
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use crate::operation::StepSource;
use crate::problem::{OptimumBound, Problem};
use crate::solution::Solution;
use crate::solver::SolveResult;

/// Append-only YAML log of one (problem, solver) run. Every record becomes a
/// standalone `---` document, so the file stays parseable while problem info,
/// schedule snapshots and the final result accumulate in order.
///
/// Logging never aborts a run: filesystem failures are reported through the
/// `log` facade and the solve continues.
pub struct RunLog {
    path: PathBuf,
}

impl RunLog {
    /// Start a log under `dir`, named after the problem, the solver and the
    /// run's start time. The directory is created on demand; the file itself
    /// appears with the first record.
    pub fn create(dir: impl AsRef<Path>, problem_name: &str, solver_name: &str) -> RunLog {
        let dir = dir.as_ref();
        if let Err(err) = fs::create_dir_all(dir) {
            warn!("cannot create log directory {}: {}", dir.display(), err);
        }
        let stamp = Utc::now().format("%Y%m%d-%H%M%S");
        let path = dir.join(format!("{}_{}_{}.yaml", problem_name, solver_name, stamp));
        info!("run log: {}", path.display());
        RunLog { path }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append one record as its own YAML document.
    pub fn append(&self, record: &impl Serialize) {
        let yaml = match serde_yaml::to_string(record) {
            Ok(yaml) => yaml,
            Err(err) => {
                warn!("cannot serialize record for {}: {}", self.path.display(), err);
                return;
            }
        };
        let written = OpenOptions::new()
            .append(true)
            .create(true)
            .open(&self.path)
            .and_then(|mut file| write!(file, "---\n{}", yaml));
        if let Err(err) = written {
            warn!("cannot append to run log {}: {}", self.path.display(), err);
        }
    }
}

#[derive(Clone, Default, Serialize, Deserialize)]
pub struct ProblemInfo {
    name: String,
    num_jobs: usize,
    num_machines: usize,
    num_ops: usize,
    optimum: Option<f64>,
    bounds: Option<(f64, f64)>,
}

impl ProblemInfo {
    pub fn new(problem: &Problem) -> Self {
        let (optimum, bounds) = match problem.optimum() {
            Some(OptimumBound::Exact(value)) => (Some(*value), None),
            Some(OptimumBound::Bounds { lower, upper }) => (None, Some((*lower, *upper))),
            None => (None, None),
        };
        Self {
            name: problem.name().clone(),
            num_jobs: problem.jobs().len(),
            num_machines: problem.machines().len(),
            num_ops: problem.ops().len(),
            optimum,
            bounds,
        }
    }
}

/// Start and finish of one scheduled operation.
#[derive(Clone, Default, Serialize, Deserialize)]
pub struct StepLog {
    op_id: usize,
    job_id: u32,
    machine_id: u32,
    start_time: f64,
    finish_time: f64,
}

#[derive(Clone, Default, Serialize, Deserialize)]
pub struct MachineLog {
    machine_id: u32,
    utilization: f64,
}

/// Snapshot of a finished schedule.
#[derive(Clone, Default, Serialize, Deserialize)]
pub struct ScheduleInfo {
    makespan: f64,
    critical_path_length: f64,
    machine_logs: Vec<MachineLog>,
    step_logs: Vec<StepLog>,
}

impl ScheduleInfo {
    pub fn new(solution: &Solution) -> Self {
        let step_logs = solution
            .op_steps()
            .filter_map(|id| {
                let step = solution.step(id);
                match step.source {
                    StepSource::Operation(op) => Some(StepLog {
                        op_id: op.id,
                        job_id: op.job,
                        machine_id: op.machine,
                        start_time: step.start_time,
                        finish_time: step.end_time(),
                    }),
                    _ => None,
                }
            })
            .collect();
        let machine_logs = solution
            .machines()
            .iter()
            .map(|&machine| MachineLog {
                machine_id: machine,
                utilization: solution.machine_utilization(machine),
            })
            .collect();
        Self {
            makespan: solution.makespan(),
            critical_path_length: solution.critical_path_length(),
            machine_logs,
            step_logs,
        }
    }
}

/// Final record of one solver run, including failed ones.
#[derive(Clone, Default, Serialize, Deserialize)]
pub struct SolverResultInfo {
    problem: String,
    solver: String,
    makespan: Option<f64>,
    optimum: Option<f64>,
    error_percent: Option<f64>,
    user_time: f64,
    status: bool,
}

impl SolverResultInfo {
    pub fn new(problem: &Problem, solver_name: &str, result: &SolveResult) -> Self {
        let makespan = result
            .solution
            .as_ref()
            .filter(|_| result.status)
            .map(|solution| solution.makespan());
        let reference = problem
            .optimum()
            .as_ref()
            .map(|optimum| optimum.reference());
        let error_percent = match (makespan, reference) {
            (Some(makespan), Some(reference)) => Some((makespan / reference - 1.0) * 100.0),
            _ => None,
        };
        Self {
            problem: problem.name().clone(),
            solver: solver_name.to_owned(),
            makespan,
            optimum: reference,
            error_percent,
            user_time: result.user_time,
            status: result.status,
        }
    }
}
