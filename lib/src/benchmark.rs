//! Benchmark harness: fan (problem, solver) pairs onto a fixed pool of
//! worker threads and tabulate the outcomes.

use crate::problem::{OptimumBound, Problem};
use crate::solver::{SolveResult, Solver};
use log::info;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

/// One solved (problem, solver) pair. `case_id` preserves the enqueue order.
pub struct SolvedCase {
    pub case_id: usize,
    pub problem: Arc<Problem>,
    pub solver_name: String,
    pub result: SolveResult,
}

pub struct BenchmarkRunner {
    problems: Vec<Arc<Problem>>,
    solvers: Vec<Box<dyn Solver>>,
    num_threads: usize,
    max_time: Option<Duration>,
}

impl BenchmarkRunner {
    /// Solve every problem with every solver. Problems are shared across
    /// workers by reference; each case runs on its own solver duplicate.
    pub fn new(problems: Vec<Problem>, solvers: Vec<Box<dyn Solver>>, num_threads: usize) -> Self {
        Self {
            problems: problems.into_iter().map(Arc::new).collect(),
            solvers,
            num_threads: num_threads.max(1),
            max_time: None,
        }
    }

    pub fn with_max_time(mut self, max_time: Duration) -> Self {
        self.max_time = Some(max_time);
        self
    }

    /// Run all cases and return them sorted back into enqueue order. Failed
    /// runs are kept in the list so summaries can mark them unsolved.
    pub fn run(&self) -> Vec<SolvedCase> {
        let mut pending = VecDeque::new();
        for problem in &self.problems {
            for solver in &self.solvers {
                pending.push_back((pending.len(), Arc::clone(problem), solver.duplicate()));
            }
        }
        let num_cases = pending.len();
        let queue = Mutex::new(pending);
        let results = Mutex::new(Vec::with_capacity(num_cases));

        thread::scope(|scope| {
            for _ in 0..self.num_threads {
                scope.spawn(|| loop {
                    let case = queue.lock().unwrap().pop_front();
                    let Some((case_id, problem, solver)) = case else {
                        break;
                    };
                    info!("start solving {} with {}", problem.name(), solver.name());
                    let result = solver
                        .solve(&problem, self.max_time, None)
                        .unwrap_or_else(|_| SolveResult {
                            status: false,
                            user_time: 0.0,
                            solution: None,
                        });
                    info!(
                        "{} to solve {} with {} in {:.1} sec",
                        if result.status { "succeeded" } else { "failed" },
                        problem.name(),
                        solver.name(),
                        result.user_time
                    );
                    results.lock().unwrap().push(SolvedCase {
                        case_id,
                        problem,
                        solver_name: solver.name().to_owned(),
                        result,
                    });
                });
            }
        });

        let mut cases = results.into_inner().unwrap();
        cases.sort_by_key(|case| case.case_id);
        cases
    }

    /// Tabulate results; failed cases show up as `unsolved`.
    pub fn summary(cases: &[SolvedCase]) -> String {
        let mut rows: Vec<Vec<String>> = vec![[
            "ID", "Problem", "Solver", "job x machine", "Optimum", "Makespan", "Error %", "Time",
        ]
        .iter()
        .map(|cell| cell.to_string())
        .collect()];

        for case in cases {
            let optimum = match case.problem.optimum() {
                Some(OptimumBound::Exact(value)) => format!("{}", value),
                Some(OptimumBound::Bounds { lower, upper }) => format!("[{}, {}]", lower, upper),
                None => "-".to_owned(),
            };
            let (makespan, error) = match (&case.result.solution, case.result.status) {
                (Some(solution), true) => {
                    let makespan = solution.makespan();
                    let error = case
                        .problem
                        .optimum()
                        .as_ref()
                        .map(|optimum| {
                            format!("{:.1}", (makespan / optimum.reference() - 1.0) * 100.0)
                        })
                        .unwrap_or_else(|| "-".to_owned());
                    (format!("{}", makespan), error)
                }
                _ => ("unsolved".to_owned(), "-".to_owned()),
            };
            rows.push(vec![
                format!("{}", case.case_id + 1),
                case.problem.name().clone(),
                case.solver_name.clone(),
                format!(
                    "{} x {}",
                    case.problem.jobs().len(),
                    case.problem.machines().len()
                ),
                optimum,
                makespan,
                error,
                format!("{:.1}", case.result.user_time),
            ]);
        }

        let widths: Vec<usize> = (0..rows[0].len())
            .map(|col| rows.iter().map(|row| row[col].len()).max().unwrap_or(0))
            .collect();
        rows.iter()
            .map(|row| {
                row.iter()
                    .zip(&widths)
                    .map(|(cell, width)| format!("{:<width$}", cell, width = *width))
                    .collect::<Vec<_>>()
                    .join("  ")
                    .trim_end()
                    .to_owned()
            })
            .collect::<Vec<_>>()
            .join("\n")
    }
}
