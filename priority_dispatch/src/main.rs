mod outputs_result;

use clap::{ArgGroup, Parser};
use lib::dispatch_rule::PriorityDispatchSolver;
use lib::error::JsspError;
use lib::log::{ProblemInfo, RunLog, ScheduleInfo, SolverResultInfo};
use lib::problem::Problem;
use lib::solver::Solver;
use log::info;
use outputs_result::dump_priority_dispatch_result_to_yaml;
use std::process::ExitCode;

#[derive(Parser)]
#[clap(
    name = "priority_dispatch",
    version = "1.0",
    about = "About:
    Construct a job-shop schedule with a priority dispatching rule.
    The instance comes from the benchmark index or from a file in the
    classic line-based format; the result log is written as YAML.",
    group(ArgGroup::new("instance").required(true).args(["benchmark", "file"]))
)]
struct ArgParser {
    ///Benchmark instance name from the instances.json index.
    #[clap(short = 'b', long = "benchmark")]
    benchmark: Option<String>,
    ///Path to an instance file in the benchmark text format.
    #[clap(short = 'f', long = "file")]
    file: Option<String>,
    ///Directory containing instances.json. Defaults to the workspace benchmark directory.
    #[clap(long = "benchmark_dir")]
    benchmark_dir: Option<String>,
    ///Dispatching rule tag, e.g. SPT, LPT, EST, HH, IHH.
    #[clap(short = 'r', long = "rule", default_value = "HH")]
    rule: String,
    ///Path to output directory.
    #[clap(short = 'o', long = "output_dir_path", default_value = "../outputs")]
    output_dir_path: String,
}

fn load_problem(arg: &ArgParser) -> Result<Problem, JsspError> {
    if let Some(name) = &arg.benchmark {
        return match &arg.benchmark_dir {
            Some(dir) => Problem::from_benchmark_in_dir(dir, name),
            None => Problem::from_benchmark(name),
        };
    }
    if let Some(file) = &arg.file {
        return Problem::from_file(file);
    }
    unreachable!("clap enforces an instance source");
}

fn run(arg: &ArgParser) -> Result<(), JsspError> {
    let problem = load_problem(arg)?;
    let solver = PriorityDispatchSolver::from_tag(&arg.rule)?;

    let run_log = RunLog::create(&arg.output_dir_path, problem.name(), solver.name());
    run_log.append(&ProblemInfo::new(&problem));

    let result = solver.solve(&problem, None, None)?;
    run_log.append(&SolverResultInfo::new(&problem, solver.name(), &result));

    match (&result.solution, result.status) {
        (Some(solution), true) => {
            run_log.append(&ScheduleInfo::new(solution));
            let makespan = solution.makespan();
            let error_percent = problem
                .optimum()
                .as_ref()
                .map(|optimum| (makespan / optimum.reference() - 1.0) * 100.0);
            dump_priority_dispatch_result_to_yaml(
                &run_log,
                &arg.rule,
                Some(makespan),
                error_percent,
                result.user_time,
                true,
            );
            info!(
                "solved {} with rule {}: makespan {} in {:.1} sec",
                problem.name(),
                arg.rule,
                makespan,
                result.user_time
            );
            Ok(())
        }
        _ => {
            dump_priority_dispatch_result_to_yaml(
                &run_log,
                &arg.rule,
                None,
                None,
                result.user_time,
                false,
            );
            Err(JsspError::Infeasible)
        }
    }
}

fn main() -> ExitCode {
    env_logger::init();

    let arg = match ArgParser::try_parse() {
        Ok(arg) => arg,
        Err(err) => {
            let _ = err.print();
            return ExitCode::from(1);
        }
    };

    match run(&arg) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err @ JsspError::InvalidRule(_)) => {
            eprintln!("{}", err);
            ExitCode::from(1)
        }
        Err(
            err @ (JsspError::BenchmarkNotFound(_)
            | JsspError::FileNotFound(_)
            | JsspError::MalformedInput(_)),
        ) => {
            eprintln!("{}", err);
            ExitCode::from(2)
        }
        Err(err) => {
            eprintln!("{}", err);
            ExitCode::from(3)
        }
    }
}
