use lib::log::RunLog;
use serde_derive::{Deserialize, Serialize};

#[derive(Serialize, Deserialize)]
struct ResultInfo {
    rule: String,
    makespan: Option<f64>,
    error_percent: Option<f64>,
    user_time: f64,
    status: bool,
}

pub fn dump_priority_dispatch_result_to_yaml(
    run_log: &RunLog,
    rule: &str,
    makespan: Option<f64>,
    error_percent: Option<f64>,
    user_time: f64,
    status: bool,
) {
    let result_info = ResultInfo {
        rule: rule.to_owned(),
        makespan,
        error_percent,
        user_time,
        status,
    };
    run_log.append(&result_info);
}
