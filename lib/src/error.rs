use std::path::PathBuf;
use thiserror::Error;

/// Errors surfaced by the scheduling core and its solvers.
///
/// Chain and feasibility errors are runtime errors of the disjunctive graph
/// model; the remaining kinds occur while constructing problems and solvers.
#[derive(Debug, Error)]
pub enum JsspError {
    #[error("cannot link steps across different {0} ids")]
    ChainMismatch(&'static str),

    #[error("cannot find benchmark name: {0}")]
    BenchmarkNotFound(String),

    #[error("cannot find data file: {}", .0.display())]
    FileNotFound(PathBuf),

    #[error("malformed instance data: {0}")]
    MalformedInput(String),

    #[error("invalid dispatching rule: {0}")]
    InvalidRule(String),

    #[error("no feasible schedule: the disjunctive graph contains a cycle")]
    Infeasible,

    #[error("a solving run is already in progress")]
    AlreadyRunning,
}
