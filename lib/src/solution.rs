//! Candidate schedules over a disjunctive graph: fixed job chains, mutable
//! machine chains, and incremental start-time propagation.

use crate::error::JsspError;
use crate::graph_extension::GraphExtension;
use crate::operation::StepSource;
use crate::problem::Problem;
use crate::step::{Step, StepArena, StepId};
use petgraph::graph::{Graph, NodeIndex};
use std::collections::HashMap;

/// A candidate schedule: one step per operation linked into its fixed job
/// chain, plus one sentinel step per job and per machine. Machine chains are
/// built up by dispatching and are the solver's decision variable.
///
/// In direct mode start times are assigned externally (mathematical-model
/// back-ends); otherwise they are deduced from the chains by propagation in
/// topological order.
#[derive(Debug, Clone)]
pub struct Solution {
    direct_mode: bool,
    arena: StepArena,
    num_ops: usize,
    jobs: Vec<u32>,
    machines: Vec<u32>,
    job_sentinels: Vec<StepId>,
    machine_sentinels: Vec<StepId>,
}

impl Solution {
    /// Materialise the steps of `problem` with every job chain linked behind
    /// its sentinel and every operation step undispatched.
    pub fn new(problem: &Problem, direct_mode: bool) -> Self {
        let mut arena = StepArena::default();
        let num_ops = problem.ops().len();
        for &op in problem.ops() {
            arena.push(StepSource::Operation(op));
        }

        let jobs = problem.jobs().clone();
        let machines = problem.machines().clone();
        let job_sentinels: Vec<StepId> = jobs
            .iter()
            .map(|&job| arena.push(StepSource::JobSentinel(job)))
            .collect();
        let machine_sentinels: Vec<StepId> = machines
            .iter()
            .map(|&machine| arena.push(StepSource::MachineSentinel(machine)))
            .collect();

        // job chains follow the problem operation order and never change again
        let mut tails: HashMap<u32, StepId> = jobs
            .iter()
            .copied()
            .zip(job_sentinels.iter().copied())
            .collect();
        for id in (0..num_ops).map(StepId) {
            let job = arena[id]
                .source
                .job_id()
                .expect("operation steps carry a job id");
            let tail = tails[&job];
            arena
                .connect_job(tail, id)
                .expect("job chain links steps of a single job");
            tails.insert(job, id);
        }

        Self {
            direct_mode,
            arena,
            num_ops,
            jobs,
            machines,
            job_sentinels,
            machine_sentinels,
        }
    }

    pub fn direct_mode(&self) -> bool {
        self.direct_mode
    }

    pub fn num_ops(&self) -> usize {
        self.num_ops
    }

    pub fn jobs(&self) -> &[u32] {
        &self.jobs
    }

    pub fn machines(&self) -> &[u32] {
        &self.machines
    }

    pub fn step(&self, id: StepId) -> &Step {
        &self.arena[id]
    }

    /// Handles of the operation steps, in problem order.
    pub fn op_steps(&self) -> impl Iterator<Item = StepId> {
        (0..self.num_ops).map(StepId)
    }

    pub fn job_sentinel(&self, job: u32) -> StepId {
        let pos = self
            .jobs
            .binary_search(&job)
            .expect("job id belongs to this problem");
        self.job_sentinels[pos]
    }

    pub fn machine_sentinel(&self, machine: u32) -> StepId {
        let pos = self
            .machines
            .binary_search(&machine)
            .expect("machine id belongs to this problem");
        self.machine_sentinels[pos]
    }

    /// Direct-mode assignment used by external back-ends.
    pub fn set_start_time(&mut self, id: StepId, start_time: f64) {
        self.arena.set_start_time(id, start_time);
    }

    /// The frontier: per job, the first step whose predecessors are all
    /// dispatched but which is not dispatched itself. At most one step per
    /// job; fully dispatched jobs contribute nothing.
    pub fn imminent_ops(&self) -> Vec<StepId> {
        let mut frontier = Vec::new();
        for &sentinel in &self.job_sentinels {
            let mut current = self.arena[sentinel].next_job;
            while let Some(id) = current {
                if !self.arena[id].is_dispatched() {
                    break;
                }
                current = self.arena[id].next_job;
            }
            if let Some(id) = current {
                frontier.push(id);
            }
        }
        frontier
    }

    /// Append `step` to the tail of its machine chain. A step that already
    /// sits in a machine chain is moved there. With `update_time`, start
    /// times are re-propagated from `step` onward; a propagation failure
    /// means the new machine edge closed a cycle and surfaces as
    /// [`JsspError::Infeasible`].
    pub fn dispatch(&mut self, step: StepId, update_time: bool) -> Result<(), JsspError> {
        let machine = self.arena[step]
            .source
            .machine_id()
            .unwrap_or_else(|| panic!("only operation steps can be dispatched"));
        let sentinel = self.machine_sentinel(machine);
        let tail = self.arena.tail_machine(sentinel);
        self.arena.connect_machine(tail, step)?;
        if update_time && !self.update_start_time(Some(step)) {
            return Err(JsspError::Infeasible);
        }
        Ok(())
    }

    /// The disjunctive graph of the current chains, with synthetic source and
    /// sink nodes: source -> first step of each job, job edges, machine edges
    /// (skipped when they duplicate a job edge), last step of each job ->
    /// sink.
    fn disjunctive_graph(&self) -> (Graph<Option<StepId>, ()>, NodeIndex, NodeIndex) {
        let mut graph: Graph<Option<StepId>, ()> = Graph::new();
        let nodes: Vec<NodeIndex> = self
            .op_steps()
            .map(|id| graph.add_node(Some(id)))
            .collect();
        let source = graph.add_node(None);
        let sink = graph.add_node(None);

        for id in self.op_steps() {
            let step = &self.arena[id];
            let node = nodes[id.0];

            let prev_job = step
                .prev_job
                .expect("operation steps are headed by a job sentinel");
            if self.arena[prev_job].source.is_sentinel() {
                graph.add_edge(source, node, ());
            }
            match step.next_job {
                Some(next) => {
                    graph.add_edge(node, nodes[next.0], ());
                }
                None => {
                    graph.add_edge(node, sink, ());
                }
            }
            if let Some(next) = step.next_machine {
                if step.next_job != Some(next) {
                    graph.add_edge(node, nodes[next.0], ());
                }
            }
        }
        (graph, source, sink)
    }

    /// Topological order of the operation steps, or `None` when the machine
    /// chains close a cycle.
    pub fn topological_sort(&self) -> Option<Vec<StepId>> {
        let (graph, _, _) = self.disjunctive_graph();
        let order = graph.kahn_topological_sort()?;
        Some(order.into_iter().filter_map(|node| graph[node]).collect())
    }

    /// Re-deduce start times in topological order, starting at `from` (or at
    /// the beginning). Returns `false` when no topological order exists; the
    /// schedule then still contains the cycle the last dispatch introduced.
    pub fn update_start_time(&mut self, from: Option<StepId>) -> bool {
        let Some(order) = self.topological_sort() else {
            return false;
        };
        let pos = from
            .and_then(|id| order.iter().position(|&step| step == id))
            .unwrap_or(0);
        for &id in &order[pos..] {
            self.arena.refresh_start_time(id);
        }
        true
    }

    /// Maximum end time over all operation steps; 0 for an empty problem.
    pub fn makespan(&self) -> f64 {
        self.op_steps()
            .map(|id| self.arena.end_time(id))
            .fold(0.0, f64::max)
    }

    /// Validate the schedule: within each job chain and on each machine
    /// (steps sorted by start time) no operation may start before its
    /// predecessor ends. Outside direct mode start times are refreshed
    /// first, so a cyclic chain structure also reports infeasible.
    pub fn is_feasible(&mut self) -> bool {
        if !self.direct_mode && !self.update_start_time(None) {
            return false;
        }

        for &sentinel in &self.job_sentinels {
            let mut ref_time = 0.0;
            let mut current = self.arena[sentinel].next_job;
            while let Some(id) = current {
                if self.arena[id].start_time < ref_time {
                    return false;
                }
                ref_time = self.arena.end_time(id);
                current = self.arena[id].next_job;
            }
        }

        for &machine in &self.machines {
            let mut steps: Vec<StepId> = self
                .op_steps()
                .filter(|&id| self.arena[id].source.machine_id() == Some(machine))
                .collect();
            steps.sort_by(|&a, &b| {
                self.arena[a]
                    .start_time
                    .total_cmp(&self.arena[b].start_time)
            });
            let mut ref_time = 0.0;
            for id in steps {
                if self.arena[id].start_time < ref_time {
                    return false;
                }
                ref_time = self.arena.end_time(id);
            }
        }
        true
    }

    /// Start time `op` would get if dispatched next on its machine: ready
    /// time in its job chain versus the machine tail's end time.
    pub fn estimated_start_time(&self, op: StepId) -> f64 {
        let job_ready = self.arena[op]
            .prev_job
            .map(|pre| self.arena.end_time(pre))
            .unwrap_or(0.0);
        let machine = self.arena[op]
            .source
            .machine_id()
            .unwrap_or_else(|| panic!("only operation steps have an estimated start time"));
        let tail = self.arena.tail_machine(self.machine_sentinel(machine));
        job_ready.max(self.arena.end_time(tail))
    }

    /// Longest source-to-sink path of the disjunctive graph weighted by
    /// operation durations. Equals the makespan once start times are
    /// propagated; infinite when the chains contain a cycle.
    pub fn critical_path_length(&self) -> f64 {
        let (graph, source, sink) = self.disjunctive_graph();
        graph.longest_path(source, sink, |node| {
            graph[node]
                .map(|id| self.arena[id].source.duration())
                .unwrap_or(0.0)
        })
    }

    pub fn machine_utilization(&self, machine: u32) -> f64 {
        self.arena.machine_utilization(self.machine_sentinel(machine))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::operation::Operation;

    fn two_by_two() -> Problem {
        // J0 = [(M0,3), (M1,2)], J1 = [(M1,4), (M0,1)]
        Problem::new(
            "2x2",
            vec![
                Operation::new(0, 0, 0, 3.0),
                Operation::new(1, 0, 1, 2.0),
                Operation::new(2, 1, 1, 4.0),
                Operation::new(3, 1, 0, 1.0),
            ],
        )
    }

    #[test]
    fn test_construction_links_job_chains_only() {
        let solution = Solution::new(&two_by_two(), false);
        for id in solution.op_steps() {
            let step = solution.step(id);
            assert!(step.prev_job.is_some());
            assert!(!step.is_dispatched());
            assert_eq!(step.start_time, 0.0);
        }
        let head = solution.job_sentinel(0);
        assert_eq!(solution.step(head).next_job, Some(StepId(0)));
        assert_eq!(solution.step(StepId(0)).next_job, Some(StepId(1)));
        assert_eq!(solution.step(StepId(1)).next_job, None);
    }

    #[test]
    fn test_trivial_one_by_one_makespan() {
        let problem = Problem::new("1x1", vec![Operation::new(0, 0, 0, 5.0)]);
        let mut solution = Solution::new(&problem, false);
        solution.dispatch(StepId(0), false).unwrap();
        assert!(solution.update_start_time(None));
        assert_eq!(solution.makespan(), 5.0);
        assert!(solution.is_feasible());
    }

    #[test]
    fn test_two_by_two_dispatch_sequence() {
        let mut solution = Solution::new(&two_by_two(), false);
        for id in [StepId(0), StepId(2), StepId(1), StepId(3)] {
            solution.dispatch(id, true).unwrap();
        }
        // J0.op1 waits for J1.op0 on M1; J1.op1 waits for its own job chain
        assert_eq!(solution.step(StepId(1)).start_time, 4.0);
        assert_eq!(solution.step(StepId(3)).start_time, 4.0);
        assert_eq!(solution.makespan(), 6.0);
        assert!(solution.is_feasible());
        assert_eq!(solution.critical_path_length(), 6.0);
    }

    #[test]
    fn test_imminent_ops_one_per_job() {
        let mut solution = Solution::new(&two_by_two(), false);
        assert_eq!(solution.imminent_ops(), vec![StepId(0), StepId(2)]);

        solution.dispatch(StepId(0), true).unwrap();
        assert_eq!(solution.imminent_ops(), vec![StepId(1), StepId(2)]);

        solution.dispatch(StepId(1), true).unwrap();
        assert_eq!(solution.imminent_ops(), vec![StepId(2)]);

        solution.dispatch(StepId(2), true).unwrap();
        solution.dispatch(StepId(3), true).unwrap();
        assert!(solution.imminent_ops().is_empty());
    }

    #[test]
    fn test_dispatch_counts_dispatched_steps() {
        let mut solution = Solution::new(&two_by_two(), false);
        let dispatched = |solution: &Solution| {
            solution
                .op_steps()
                .filter(|&id| solution.step(id).is_dispatched())
                .count()
        };
        assert_eq!(dispatched(&solution), 0);
        solution.dispatch(StepId(0), false).unwrap();
        solution.dispatch(StepId(2), false).unwrap();
        assert_eq!(dispatched(&solution), 2);
        solution.dispatch(StepId(1), false).unwrap();
        solution.dispatch(StepId(3), false).unwrap();
        assert_eq!(dispatched(&solution), 4);
    }

    #[test]
    fn test_reversed_machine_edge_is_a_cycle() {
        // both operations of the job run on machine 0; dispatching them in
        // reverse order opposes the job edge
        let problem = Problem::new(
            "cycle",
            vec![
                Operation::new(0, 0, 0, 3.0),
                Operation::new(1, 0, 0, 2.0),
            ],
        );
        let mut solution = Solution::new(&problem, false);
        solution.dispatch(StepId(1), false).unwrap();
        assert_eq!(
            solution.topological_sort(),
            Some(vec![StepId(0), StepId(1)])
        );

        solution.dispatch(StepId(0), false).unwrap();
        assert_eq!(solution.topological_sort(), None);
        assert!(!solution.update_start_time(None));
        assert_eq!(solution.critical_path_length(), f64::INFINITY);
    }

    #[test]
    fn test_dispatch_with_update_surfaces_cycle() {
        let problem = Problem::new(
            "cycle",
            vec![
                Operation::new(0, 0, 0, 3.0),
                Operation::new(1, 0, 0, 2.0),
            ],
        );
        let mut solution = Solution::new(&problem, false);
        solution.dispatch(StepId(1), true).unwrap();
        assert!(matches!(
            solution.dispatch(StepId(0), true),
            Err(JsspError::Infeasible)
        ));
    }

    #[test]
    fn test_empty_problem_is_feasible_with_zero_makespan() {
        let problem = Problem::new("empty", Vec::new());
        let mut solution = Solution::new(&problem, false);
        assert_eq!(solution.topological_sort(), Some(Vec::new()));
        assert!(solution.update_start_time(None));
        assert_eq!(solution.makespan(), 0.0);
        assert!(solution.is_feasible());
    }

    #[test]
    fn test_update_start_time_is_idempotent() {
        let mut solution = Solution::new(&two_by_two(), false);
        for id in [StepId(0), StepId(2), StepId(1), StepId(3)] {
            solution.dispatch(id, true).unwrap();
        }
        let first: Vec<f64> = solution
            .op_steps()
            .map(|id| solution.step(id).start_time)
            .collect();
        assert!(solution.update_start_time(None));
        let second: Vec<f64> = solution
            .op_steps()
            .map(|id| solution.step(id).start_time)
            .collect();
        assert_eq!(first, second);
    }

    #[test]
    fn test_clone_matches_original_makespan() {
        let mut solution = Solution::new(&two_by_two(), false);
        for id in [StepId(0), StepId(2), StepId(1), StepId(3)] {
            solution.dispatch(id, true).unwrap();
        }
        let mut copy = solution.clone();
        assert!(solution.update_start_time(None));
        assert!(copy.update_start_time(None));
        assert_eq!(solution.makespan(), copy.makespan());
    }

    #[test]
    fn test_clone_is_independent_of_original() {
        let mut solution = Solution::new(&two_by_two(), false);
        solution.dispatch(StepId(0), true).unwrap();
        solution.dispatch(StepId(2), true).unwrap();
        let copy = solution.clone();
        let makespan = copy.makespan();

        // extending the original's machine chains must not touch the clone
        solution.dispatch(StepId(1), true).unwrap();
        assert!(solution.makespan() > makespan);
        assert_eq!(copy.makespan(), makespan);
    }

    #[test]
    fn test_direct_mode_feasibility_checks_assigned_times() {
        let mut solution = Solution::new(&two_by_two(), true);
        solution.set_start_time(StepId(0), 0.0);
        solution.set_start_time(StepId(1), 4.0);
        solution.set_start_time(StepId(2), 0.0);
        solution.set_start_time(StepId(3), 4.0);
        assert!(solution.is_feasible());
        assert_eq!(solution.makespan(), 6.0);

        // J1.op1 now overlaps J0.op0 on machine 0
        solution.set_start_time(StepId(3), 2.0);
        assert!(!solution.is_feasible());
    }

    #[test]
    fn test_direct_mode_job_chain_violation() {
        let mut solution = Solution::new(&two_by_two(), true);
        solution.set_start_time(StepId(0), 0.0);
        solution.set_start_time(StepId(1), 1.0); // starts before J0.op0 ends
        solution.set_start_time(StepId(2), 0.0);
        solution.set_start_time(StepId(3), 5.0);
        assert!(!solution.is_feasible());
    }

    #[test]
    fn test_estimated_start_time_previews_dispatch() {
        let mut solution = Solution::new(&two_by_two(), false);
        solution.dispatch(StepId(0), true).unwrap();
        solution.dispatch(StepId(2), true).unwrap();
        // J0.op1 joins M1 behind J1.op0 (ends at 4), its job feeds it at 3
        assert_eq!(solution.estimated_start_time(StepId(1)), 4.0);

        let estimate = solution.estimated_start_time(StepId(1));
        solution.dispatch(StepId(1), true).unwrap();
        assert_eq!(solution.step(StepId(1)).start_time, estimate);
    }

    #[test]
    fn test_machine_utilization_after_schedule() {
        let mut solution = Solution::new(&two_by_two(), false);
        for id in [StepId(0), StepId(2), StepId(1), StepId(3)] {
            solution.dispatch(id, true).unwrap();
        }
        // M0: J0.op0 [0,3), J1.op1 [4,5) -> 4 units of work in 5
        assert_eq!(solution.machine_utilization(0), 4.0 / 5.0);
        // M1: J1.op0 [0,4), J0.op1 [4,6) -> fully busy
        assert_eq!(solution.machine_utilization(1), 1.0);
    }
}
