//! Schedule steps and the arena that owns them.
//!
//! Every step of a solution lives in one [`StepArena`]; the four chain links
//! are arena indices, so severing and re-linking are plain index assignments
//! and a memberwise clone of the arena is a deep copy of the whole chain
//! structure.

use crate::error::JsspError;
use crate::operation::StepSource;
use std::ops::{Index, IndexMut};

/// Stable handle of a step inside its arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct StepId(pub usize);

/// Mutable schedule node wrapping a [`StepSource`], linked into its job chain
/// and, once dispatched, into a machine chain.
#[derive(Debug, Clone, PartialEq)]
pub struct Step {
    pub source: StepSource,
    pub prev_job: Option<StepId>,
    pub next_job: Option<StepId>,
    pub prev_machine: Option<StepId>,
    pub next_machine: Option<StepId>,
    pub start_time: f64,
}

impl Step {
    pub fn new(source: StepSource) -> Self {
        Self {
            source,
            prev_job: None,
            next_job: None,
            prev_machine: None,
            next_machine: None,
            start_time: 0.0,
        }
    }

    pub fn end_time(&self) -> f64 {
        self.start_time + self.source.duration()
    }

    /// An operation step is dispatched once it has a machine predecessor
    /// (the machine sentinel counts).
    pub fn is_dispatched(&self) -> bool {
        self.prev_machine.is_some()
    }
}

/// Single owner of all steps of a schedule.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StepArena {
    steps: Vec<Step>,
}

impl StepArena {
    pub fn push(&mut self, source: StepSource) -> StepId {
        let id = StepId(self.steps.len());
        self.steps.push(Step::new(source));
        id
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// Create a job-chain link `from -> to`. Existing links touching the new
    /// link ends are severed first; on a job-id mismatch nothing is changed.
    pub fn connect_job(&mut self, from: StepId, to: StepId) -> Result<(), JsspError> {
        match (self[from].source.job_id(), self[to].source.job_id()) {
            (Some(a), Some(b)) if a == b => {}
            _ => return Err(JsspError::ChainMismatch("job")),
        }
        if let Some(next) = self[from].next_job {
            self[next].prev_job = None;
        }
        if let Some(prev) = self[to].prev_job {
            self[prev].next_job = None;
        }
        self[from].next_job = Some(to);
        self[to].prev_job = Some(from);
        Ok(())
    }

    /// Create a machine-chain link `from -> to`, severing existing links the
    /// same way as [`connect_job`](Self::connect_job). Connecting a step to
    /// itself is a no-op.
    pub fn connect_machine(&mut self, from: StepId, to: StepId) -> Result<(), JsspError> {
        if from == to {
            return Ok(());
        }
        match (self[from].source.machine_id(), self[to].source.machine_id()) {
            (Some(a), Some(b)) if a == b => {}
            _ => return Err(JsspError::ChainMismatch("machine")),
        }
        if let Some(next) = self[from].next_machine {
            self[next].prev_machine = None;
        }
        if let Some(prev) = self[to].prev_machine {
            self[prev].next_machine = None;
        }
        self[from].next_machine = Some(to);
        self[to].prev_machine = Some(from);
        Ok(())
    }

    pub fn head_job(&self, id: StepId) -> StepId {
        self.walk(id, |step| step.prev_job)
    }

    pub fn tail_job(&self, id: StepId) -> StepId {
        self.walk(id, |step| step.next_job)
    }

    pub fn head_machine(&self, id: StepId) -> StepId {
        self.walk(id, |step| step.prev_machine)
    }

    pub fn tail_machine(&self, id: StepId) -> StepId {
        self.walk(id, |step| step.next_machine)
    }

    fn walk(&self, id: StepId, next: impl Fn(&Step) -> Option<StepId>) -> StepId {
        let mut current = id;
        while let Some(neighbor) = next(&self[current]) {
            current = neighbor;
        }
        current
    }

    pub fn end_time(&self, id: StepId) -> f64 {
        self[id].end_time()
    }

    pub fn set_start_time(&mut self, id: StepId, start_time: f64) {
        self[id].start_time = start_time;
    }

    /// Sequence-based update: a dispatched step starts when both its job
    /// predecessor and its machine predecessor are done. Undispatched steps
    /// and sentinels are left unchanged.
    pub fn refresh_start_time(&mut self, id: StepId) {
        if let Some(machine_pre) = self[id].prev_machine {
            let job_ready = self[id]
                .prev_job
                .map(|pre| self.end_time(pre))
                .unwrap_or(0.0);
            let machine_ready = self.end_time(machine_pre);
            self[id].start_time = job_ready.max(machine_ready);
        }
    }

    /// Utilization of a machine chain: total service time over the chain's
    /// tail end time, 1.0 for an empty chain. Idle time before the first
    /// operation counts against utilization.
    pub fn machine_utilization(&self, id: StepId) -> f64 {
        if !matches!(self[id].source, StepSource::MachineSentinel(_)) {
            panic!("machine_utilization is only defined for machine sentinels");
        }
        let mut service_time = 0.0;
        let mut total_time = 0.0;
        let mut current = self[id].next_machine;
        while let Some(op) = current {
            service_time += self[op].source.duration();
            total_time = self.end_time(op);
            current = self[op].next_machine;
        }
        if total_time > 0.0 {
            service_time / total_time
        } else {
            1.0
        }
    }
}

impl Index<StepId> for StepArena {
    type Output = Step;

    fn index(&self, id: StepId) -> &Step {
        &self.steps[id.0]
    }
}

impl IndexMut<StepId> for StepArena {
    fn index_mut(&mut self, id: StepId) -> &mut Step {
        &mut self.steps[id.0]
    }
}
