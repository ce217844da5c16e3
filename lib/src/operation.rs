use serde_derive::{Deserialize, Serialize};

/// Static description of one processing step of a job: the machine it runs on
/// and how long it takes. `id` is the position in the problem operation list.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Operation {
    pub id: usize,
    pub job: u32,
    pub machine: u32,
    pub duration: f64,
}

impl Operation {
    pub fn new(id: usize, job: u32, machine: u32, duration: f64) -> Self {
        Self {
            id,
            job,
            machine,
            duration,
        }
    }
}

/// What a schedule step stands for: a real operation, or the zero-duration
/// head of a job chain or machine chain.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum StepSource {
    Operation(Operation),
    JobSentinel(u32),
    MachineSentinel(u32),
}

impl StepSource {
    pub fn duration(&self) -> f64 {
        match self {
            StepSource::Operation(op) => op.duration,
            _ => 0.0,
        }
    }

    /// Job the step belongs to. Undefined for machine sentinels.
    pub fn job_id(&self) -> Option<u32> {
        match self {
            StepSource::Operation(op) => Some(op.job),
            StepSource::JobSentinel(job) => Some(*job),
            StepSource::MachineSentinel(_) => None,
        }
    }

    /// Machine the step runs on. Undefined for job sentinels.
    pub fn machine_id(&self) -> Option<u32> {
        match self {
            StepSource::Operation(op) => Some(op.machine),
            StepSource::JobSentinel(_) => None,
            StepSource::MachineSentinel(machine) => Some(*machine),
        }
    }

    pub fn operation(&self) -> Option<&Operation> {
        match self {
            StepSource::Operation(op) => Some(op),
            _ => None,
        }
    }

    pub fn is_sentinel(&self) -> bool {
        !matches!(self, StepSource::Operation(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_operation_source_ids() {
        let source = StepSource::Operation(Operation::new(0, 2, 5, 7.0));
        assert_eq!(source.job_id(), Some(2));
        assert_eq!(source.machine_id(), Some(5));
        assert_eq!(source.duration(), 7.0);
        assert!(!source.is_sentinel());
    }

    #[test]
    fn test_sentinel_sources_have_zero_duration() {
        let job = StepSource::JobSentinel(3);
        let machine = StepSource::MachineSentinel(1);
        assert_eq!(job.duration(), 0.0);
        assert_eq!(machine.duration(), 0.0);
        assert_eq!(job.job_id(), Some(3));
        assert_eq!(job.machine_id(), None);
        assert_eq!(machine.machine_id(), Some(1));
        assert_eq!(machine.job_id(), None);
        assert!(job.is_sentinel());
        assert!(machine.is_sentinel());
    }
}
