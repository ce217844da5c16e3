//! Job-shop problem instances: explicit, random, or loaded from benchmark
//! files in the classic line-based text format.

use crate::error::JsspError;
use crate::operation::Operation;
use getset::Getters;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use serde_derive::Deserialize;
use std::env;
use std::fmt::Write as _;
use std::fs;
use std::ops::RangeInclusive;
use std::path::{Path, PathBuf};

/// Benchmark reference value: the proven optimum, or known bounds on it.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum OptimumBound {
    Exact(f64),
    Bounds { lower: f64, upper: f64 },
}

impl OptimumBound {
    /// Single reference value for error percentages: the exact optimum, or
    /// the midpoint of the bounds.
    pub fn reference(&self) -> f64 {
        match self {
            OptimumBound::Exact(value) => *value,
            OptimumBound::Bounds { lower, upper } => (lower + upper) / 2.0,
        }
    }
}

/// Immutable problem instance: operations in dispatching order within each
/// job, plus the derived unique-sorted job and machine id lists.
#[derive(Debug, Clone, Getters)]
#[getset(get = "pub")]
pub struct Problem {
    name: String,
    ops: Vec<Operation>,
    jobs: Vec<u32>,
    machines: Vec<u32>,
    optimum: Option<OptimumBound>,
}

impl Problem {
    pub fn new(name: &str, ops: Vec<Operation>) -> Self {
        let (jobs, machines) = collect_jobs_and_machines(&ops);
        Self {
            name: name.to_owned(),
            ops,
            jobs,
            machines,
            optimum: None,
        }
    }

    pub fn with_optimum(mut self, optimum: OptimumBound) -> Self {
        self.optimum = Some(optimum);
        self
    }

    /// Random instance: every job visits every machine exactly once in a
    /// shuffled order, with durations drawn uniformly from `dur_range`.
    pub fn random(
        num_jobs: usize,
        num_machines: usize,
        seed: u64,
        dur_range: RangeInclusive<u32>,
    ) -> Self {
        let mut rng = StdRng::seed_from_u64(seed);
        let mut machines: Vec<u32> = (0..num_machines as u32).collect();
        let mut ops = Vec::with_capacity(num_jobs * num_machines);
        for job in 0..num_jobs as u32 {
            machines.shuffle(&mut rng);
            for &machine in &machines {
                let duration = rng.gen_range(dur_range.clone()) as f64;
                ops.push(Operation::new(ops.len(), job, machine, duration));
            }
        }
        Self::new(&format!("random_{}x{}", num_jobs, num_machines), ops)
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, JsspError> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)
            .map_err(|_| JsspError::FileNotFound(path.to_path_buf()))?;
        let name = path
            .file_stem()
            .and_then(|stem| stem.to_str())
            .unwrap_or("instance");
        Ok(Self::new(name, parse_instance(&content)?))
    }

    /// Look up `name` in the default benchmark directory (see
    /// [`default_benchmark_dir`]).
    pub fn from_benchmark(name: &str) -> Result<Self, JsspError> {
        Self::from_benchmark_in_dir(default_benchmark_dir(), name)
    }

    /// Look up `name` in `dir/instances.json` and load the referenced
    /// instance file together with its optimum value or bounds.
    pub fn from_benchmark_in_dir(dir: impl AsRef<Path>, name: &str) -> Result<Self, JsspError> {
        let dir = dir.as_ref();
        let index_path = dir.join("instances.json");
        let content = fs::read_to_string(&index_path)
            .map_err(|_| JsspError::FileNotFound(index_path.clone()))?;
        let entries: Vec<BenchmarkEntry> = serde_json::from_str(&content)
            .map_err(|err| JsspError::MalformedInput(format!("{}: {}", index_path.display(), err)))?;

        let entry = entries
            .into_iter()
            .find(|entry| entry.name == name)
            .ok_or_else(|| JsspError::BenchmarkNotFound(name.to_owned()))?;

        let mut problem = Self::from_file(dir.join(&entry.path))?;
        problem.name = name.to_owned();
        problem.optimum = entry.optimum_bound();
        Ok(problem)
    }

    /// Serialise back to the benchmark text format. Re-parsing the output
    /// yields an identical operation list.
    pub fn to_instance_string(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "{} {}", self.jobs.len(), self.machines.len());
        for &job in &self.jobs {
            let fields: Vec<String> = self
                .ops
                .iter()
                .filter(|op| op.job == job)
                .flat_map(|op| [op.machine.to_string(), op.duration.to_string()])
                .collect();
            let _ = writeln!(out, "{}", fields.join(" "));
        }
        out
    }
}

fn collect_jobs_and_machines(ops: &[Operation]) -> (Vec<u32>, Vec<u32>) {
    let mut jobs: Vec<u32> = ops.iter().map(|op| op.job).collect();
    let mut machines: Vec<u32> = ops.iter().map(|op| op.machine).collect();
    jobs.sort_unstable();
    jobs.dedup();
    machines.sort_unstable();
    machines.dedup();
    (jobs, machines)
}

/// Directory holding `instances.json` and the instance files:
/// `JSSP_BENCHMARK_DIR` if set, otherwise the workspace `benchmark/`
/// directory.
pub fn default_benchmark_dir() -> PathBuf {
    if let Some(dir) = env::var_os("JSSP_BENCHMARK_DIR") {
        return PathBuf::from(dir);
    }
    Path::new(env!("CARGO_MANIFEST_DIR")).join("..").join("benchmark")
}

#[derive(Deserialize)]
struct BenchmarkEntry {
    name: String,
    path: String,
    #[serde(default)]
    optimum: Option<f64>,
    #[serde(default)]
    bounds: Option<BoundsEntry>,
}

#[derive(Deserialize)]
struct BoundsEntry {
    lower: f64,
    upper: f64,
}

impl BenchmarkEntry {
    fn optimum_bound(&self) -> Option<OptimumBound> {
        match (self.optimum, &self.bounds) {
            (Some(value), _) => Some(OptimumBound::Exact(value)),
            (None, Some(bounds)) => Some(OptimumBound::Bounds {
                lower: bounds.lower,
                upper: bounds.upper,
            }),
            (None, None) => None,
        }
    }
}

/// Parse the line-based instance format: a `n_jobs n_machines` header, then
/// one line of `machine duration` pairs per job. Lines starting with `#` are
/// comments.
fn parse_instance(content: &str) -> Result<Vec<Operation>, JsspError> {
    let mut lines = content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'));

    let header = lines
        .next()
        .ok_or_else(|| JsspError::MalformedInput("empty instance file".to_owned()))?;
    let mut header_fields = header.split_whitespace();
    let num_jobs = parse_field::<usize>(header_fields.next(), "job count")?;
    let num_machines = parse_field::<usize>(header_fields.next(), "machine count")?;

    let mut ops = Vec::with_capacity(num_jobs * num_machines);
    for job in 0..num_jobs {
        let line = lines
            .next()
            .ok_or_else(|| JsspError::MalformedInput(format!("missing operations for job {}", job)))?;
        let fields: Vec<&str> = line.split_whitespace().collect();
        if fields.len() != 2 * num_machines {
            return Err(JsspError::MalformedInput(format!(
                "job {} defines {} fields, expected {}",
                job,
                fields.len(),
                2 * num_machines
            )));
        }
        for pair in fields.chunks(2) {
            let machine = parse_field::<u32>(Some(pair[0]), "machine id")?;
            if machine as usize >= num_machines {
                return Err(JsspError::MalformedInput(format!(
                    "machine id {} out of range for {} machines",
                    machine, num_machines
                )));
            }
            let duration = parse_field::<f64>(Some(pair[1]), "duration")?;
            ops.push(Operation::new(ops.len(), job as u32, machine, duration));
        }
    }
    Ok(ops)
}

fn parse_field<T: std::str::FromStr>(field: Option<&str>, what: &str) -> Result<T, JsspError> {
    let raw = field.ok_or_else(|| JsspError::MalformedInput(format!("missing {}", what)))?;
    raw.parse()
        .map_err(|_| JsspError::MalformedInput(format!("invalid {}: {:?}", what, raw)))
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = "\
# two jobs, two machines
2 2
0 3 1 2
1 4 0 1
";

    #[test]
    fn test_parse_instance_skips_comments() {
        let ops = parse_instance(SAMPLE).unwrap();
        assert_eq!(ops.len(), 4);
        assert_eq!(ops[0], Operation::new(0, 0, 0, 3.0));
        assert_eq!(ops[1], Operation::new(1, 0, 1, 2.0));
        assert_eq!(ops[2], Operation::new(2, 1, 1, 4.0));
        assert_eq!(ops[3], Operation::new(3, 1, 0, 1.0));
    }

    #[test]
    fn test_parse_instance_rejects_short_job_line() {
        let result = parse_instance("2 2\n0 3 1 2\n1 4\n");
        assert!(matches!(result, Err(JsspError::MalformedInput(_))));
    }

    #[test]
    fn test_parse_instance_rejects_machine_out_of_range() {
        let result = parse_instance("1 2\n0 3 5 2\n");
        assert!(matches!(result, Err(JsspError::MalformedInput(_))));
    }

    #[test]
    fn test_parse_instance_rejects_garbage_header() {
        let result = parse_instance("two two\n");
        assert!(matches!(result, Err(JsspError::MalformedInput(_))));
    }

    #[test]
    fn test_derived_job_and_machine_lists_are_sorted_unique() {
        let problem = Problem::new("sample", parse_instance(SAMPLE).unwrap());
        assert_eq!(problem.jobs(), &vec![0, 1]);
        assert_eq!(problem.machines(), &vec![0, 1]);
    }

    #[test]
    fn test_instance_round_trip() {
        let problem = Problem::new("sample", parse_instance(SAMPLE).unwrap());
        let reparsed = parse_instance(&problem.to_instance_string()).unwrap();
        assert_eq!(&reparsed, problem.ops());
    }

    #[test]
    fn test_random_is_deterministic_per_seed() {
        let a = Problem::random(4, 3, 42, 10..=50);
        let b = Problem::random(4, 3, 42, 10..=50);
        assert_eq!(a.ops(), b.ops());
    }

    #[test]
    fn test_random_each_job_visits_every_machine_once() {
        let problem = Problem::random(5, 4, 7, 10..=50);
        assert_eq!(problem.ops().len(), 20);
        for &job in problem.jobs() {
            let mut visited: Vec<u32> = problem
                .ops()
                .iter()
                .filter(|op| op.job == job)
                .map(|op| op.machine)
                .collect();
            visited.sort_unstable();
            assert_eq!(visited, vec![0, 1, 2, 3]);
        }
        for op in problem.ops() {
            assert!((10.0..=50.0).contains(&op.duration));
        }
    }

    #[test]
    fn test_from_benchmark_loads_optimum() {
        let problem = Problem::from_benchmark("ft06").unwrap();
        assert_eq!(problem.jobs().len(), 6);
        assert_eq!(problem.machines().len(), 6);
        assert_eq!(problem.ops().len(), 36);
        assert_eq!(problem.optimum(), &Some(OptimumBound::Exact(55.0)));
    }

    #[test]
    fn test_from_benchmark_unknown_name() {
        let result = Problem::from_benchmark("no_such_instance");
        assert!(matches!(result, Err(JsspError::BenchmarkNotFound(_))));
    }

    #[test]
    fn test_from_benchmark_bounds_entry() {
        let problem = Problem::from_benchmark("demo4x3").unwrap();
        match problem.optimum() {
            Some(OptimumBound::Bounds { lower, upper }) => {
                assert!(lower <= upper);
            }
            other => panic!("expected bounds, got {:?}", other),
        }
    }

    #[test]
    fn test_optimum_reference_value() {
        assert_eq!(OptimumBound::Exact(55.0).reference(), 55.0);
        assert_eq!(
            OptimumBound::Bounds {
                lower: 600.0,
                upper: 700.0
            }
            .reference(),
            650.0
        );
    }
}
