//! Topological order and longest path over petgraph graphs.

use petgraph::graph::{Graph, NodeIndex};
use petgraph::Direction::{Incoming, Outgoing};
use std::collections::VecDeque;

pub trait GraphExtension {
    fn kahn_topological_sort(&self) -> Option<Vec<NodeIndex>>;
    fn longest_path<F>(&self, src: NodeIndex, dst: NodeIndex, edge_weight_into: F) -> f64
    where
        F: Fn(NodeIndex) -> f64;
}

impl<N> GraphExtension for Graph<N, ()> {
    /// Kahn's algorithm with a FIFO seed queue in node-insertion order, so
    /// the output is deterministic for a deterministic build sequence.
    /// Returns `None` if any in-degree remains positive, i.e. on a cycle.
    fn kahn_topological_sort(&self) -> Option<Vec<NodeIndex>> {
        let mut in_degrees: Vec<usize> = self
            .node_indices()
            .map(|node| self.neighbors_directed(node, Incoming).count())
            .collect();

        let mut queue: VecDeque<NodeIndex> = self
            .node_indices()
            .filter(|node| in_degrees[node.index()] == 0)
            .collect();

        let mut order = Vec::with_capacity(self.node_count());
        while let Some(node) = queue.pop_front() {
            order.push(node);
            for suc in self.neighbors_directed(node, Outgoing) {
                in_degrees[suc.index()] -= 1;
                if in_degrees[suc.index()] == 0 {
                    queue.push_back(suc);
                }
            }
        }

        if order.len() == self.node_count() {
            Some(order)
        } else {
            None
        }
    }

    /// Longest path length from `src` to `dst` over a DAG, where
    /// `edge_weight_into(node)` is the weight of any edge entering `node`.
    /// Distances are relaxed along the topological order; returns
    /// `f64::INFINITY` when no order exists.
    fn longest_path<F>(&self, src: NodeIndex, dst: NodeIndex, edge_weight_into: F) -> f64
    where
        F: Fn(NodeIndex) -> f64,
    {
        let Some(order) = self.kahn_topological_sort() else {
            return f64::INFINITY;
        };

        let mut dist = vec![f64::NEG_INFINITY; self.node_count()];
        dist[src.index()] = 0.0;

        for node in order {
            if dist[node.index()] == f64::NEG_INFINITY {
                continue;
            }
            if node == dst {
                break;
            }
            for suc in self.neighbors_directed(node, Outgoing) {
                let length = dist[node.index()] + edge_weight_into(suc);
                if dist[suc.index()] < length {
                    dist[suc.index()] = length;
                }
            }
        }

        dist[dst.index()]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn diamond() -> (Graph<f64, ()>, [NodeIndex; 4]) {
        // node weight = weight of the edge entering that node
        let mut graph = Graph::<f64, ()>::new();
        let s = graph.add_node(0.0);
        let a = graph.add_node(3.0);
        let b = graph.add_node(7.0);
        let t = graph.add_node(2.0);
        graph.add_edge(s, a, ());
        graph.add_edge(s, b, ());
        graph.add_edge(a, t, ());
        graph.add_edge(b, t, ());
        (graph, [s, a, b, t])
    }

    #[test]
    fn test_kahn_topological_sort_chain() {
        let mut graph = Graph::<(), ()>::new();
        let n0 = graph.add_node(());
        let n1 = graph.add_node(());
        let n2 = graph.add_node(());
        graph.add_edge(n0, n1, ());
        graph.add_edge(n1, n2, ());

        assert_eq!(graph.kahn_topological_sort(), Some(vec![n0, n1, n2]));
    }

    #[test]
    fn test_kahn_topological_sort_respects_insertion_order_on_ties() {
        let mut graph = Graph::<(), ()>::new();
        let n0 = graph.add_node(());
        let n1 = graph.add_node(());
        let n2 = graph.add_node(());
        graph.add_edge(n0, n2, ());
        graph.add_edge(n1, n2, ());

        assert_eq!(graph.kahn_topological_sort(), Some(vec![n0, n1, n2]));
    }

    #[test]
    fn test_kahn_topological_sort_cycle_returns_none() {
        let mut graph = Graph::<(), ()>::new();
        let n0 = graph.add_node(());
        let n1 = graph.add_node(());
        let n2 = graph.add_node(());
        graph.add_edge(n0, n1, ());
        graph.add_edge(n1, n2, ());
        graph.add_edge(n2, n1, ());

        assert_eq!(graph.kahn_topological_sort(), None);
    }

    #[test]
    fn test_kahn_topological_sort_no_seed_node_returns_none() {
        let mut graph = Graph::<(), ()>::new();
        let n0 = graph.add_node(());
        let n1 = graph.add_node(());
        graph.add_edge(n0, n1, ());
        graph.add_edge(n1, n0, ());

        assert_eq!(graph.kahn_topological_sort(), None);
    }

    #[test]
    fn test_kahn_topological_sort_empty_graph() {
        let graph = Graph::<(), ()>::new();
        assert_eq!(graph.kahn_topological_sort(), Some(Vec::new()));
    }

    #[test]
    fn test_longest_path_picks_heavier_branch() {
        let (graph, [s, _, _, t]) = diamond();
        assert_eq!(graph.longest_path(s, t, |node| graph[node]), 9.0);
    }

    #[test]
    fn test_longest_path_unreachable_is_negative_infinity() {
        let mut graph = Graph::<f64, ()>::new();
        let s = graph.add_node(0.0);
        let t = graph.add_node(1.0);
        assert_eq!(
            graph.longest_path(s, t, |node| graph[node]),
            f64::NEG_INFINITY
        );
    }

    #[test]
    fn test_longest_path_cycle_is_infinity() {
        let mut graph = Graph::<f64, ()>::new();
        let s = graph.add_node(0.0);
        let t = graph.add_node(1.0);
        graph.add_edge(s, t, ());
        graph.add_edge(t, s, ());
        assert_eq!(graph.longest_path(s, t, |node| graph[node]), f64::INFINITY);
    }
}
