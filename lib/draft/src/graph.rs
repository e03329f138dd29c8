//! Graph view over a draft for structural checks.

use crate::draft::{DraftConnection, WorkflowDraft};
use flowwright_core::NodeId;
use petgraph::Direction;
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::visit::EdgeRef;
use std::collections::HashMap;

/// A draft's nodes and connections loaded into a petgraph graph.
///
/// Connections whose endpoints are not in the draft are kept aside as
/// dangling instead of being added as edges.
#[derive(Debug)]
pub struct DraftGraph<'a> {
    graph: DiGraph<NodeId, usize>,
    node_index_map: HashMap<NodeId, NodeIndex>,
    dangling: Vec<&'a DraftConnection>,
}

impl<'a> DraftGraph<'a> {
    #[must_use]
    pub fn new(draft: &'a WorkflowDraft) -> Self {
        let mut graph = DiGraph::new();
        let mut node_index_map = HashMap::new();
        for node in &draft.nodes {
            let index = graph.add_node(node.id);
            node_index_map.insert(node.id, index);
        }

        let mut dangling = Vec::new();
        for connection in &draft.connections {
            match (
                node_index_map.get(&connection.from),
                node_index_map.get(&connection.to),
            ) {
                (Some(&source), Some(&target)) => {
                    graph.add_edge(source, target, connection.from_output);
                }
                _ => dangling.push(connection),
            }
        }

        Self {
            graph,
            node_index_map,
            dangling,
        }
    }

    /// Connections referencing nodes that do not exist.
    #[must_use]
    pub fn dangling(&self) -> &[&'a DraftConnection] {
        &self.dangling
    }

    #[must_use]
    pub fn incoming_count(&self, id: NodeId) -> usize {
        self.degree(id, Direction::Incoming)
    }

    #[must_use]
    pub fn outgoing_count(&self, id: NodeId) -> usize {
        self.degree(id, Direction::Outgoing)
    }

    fn degree(&self, id: NodeId, direction: Direction) -> usize {
        self.node_index_map
            .get(&id)
            .map_or(0, |&index| self.graph.edges_directed(index, direction).count())
    }

    /// Returns true if the graph has any cycle.
    #[must_use]
    pub fn is_cyclic(&self) -> bool {
        petgraph::algo::is_cyclic_directed(&self.graph)
    }

    /// Cycles found by depth-first search, one per back edge.
    ///
    /// Each cycle lists the node ids along the loop and repeats the first
    /// one at the end, so `A -> B -> A` is reported once as `[A, B, A]`.
    #[must_use]
    pub fn cycles(&self) -> Vec<Vec<NodeId>> {
        let mut state = vec![Visit::New; self.graph.node_count()];
        let mut path = Vec::new();
        let mut cycles = Vec::new();
        for start in self.graph.node_indices() {
            if state[start.index()] == Visit::New {
                self.visit(start, &mut state, &mut path, &mut cycles);
            }
        }
        cycles
    }

    fn visit(
        &self,
        index: NodeIndex,
        state: &mut [Visit],
        path: &mut Vec<NodeIndex>,
        cycles: &mut Vec<Vec<NodeId>>,
    ) {
        state[index.index()] = Visit::OnPath;
        path.push(index);

        for edge in self.graph.edges_directed(index, Direction::Outgoing) {
            let target = edge.target();
            match state[target.index()] {
                Visit::New => self.visit(target, state, path, cycles),
                Visit::OnPath => {
                    if let Some(start) = path.iter().position(|&i| i == target) {
                        let mut cycle: Vec<NodeId> =
                            path[start..].iter().map(|&i| self.graph[i]).collect();
                        cycle.push(self.graph[target]);
                        cycles.push(cycle);
                    }
                }
                Visit::Done => {}
            }
        }

        path.pop();
        state[index.index()] = Visit::Done;
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Visit {
    New,
    OnPath,
    Done,
}

#[cfg(test)]
mod tests {
    use super::*;
    use flowwright_schema::{NodeKind, NodeTypeRegistry};
    use serde_json::Map;

    fn draft_with(count: usize) -> (WorkflowDraft, Vec<NodeId>) {
        let registry = NodeTypeRegistry::builtin();
        let spec = registry.get(NodeKind::NoOp).expect("registered");
        let mut draft = WorkflowDraft::new("graph");
        let ids = (0..count)
            .map(|_| draft.add_node(spec, None, &Map::new(), None).id)
            .collect();
        (draft, ids)
    }

    fn link(from: NodeId, to: NodeId) -> DraftConnection {
        DraftConnection {
            from,
            to,
            from_output: 0,
            to_input: 0,
        }
    }

    #[test]
    fn two_node_loop_is_one_cycle() {
        let (mut draft, ids) = draft_with(2);
        draft.connections = vec![link(ids[0], ids[1]), link(ids[1], ids[0])];
        let graph = DraftGraph::new(&draft);
        assert!(graph.is_cyclic());
        assert_eq!(graph.cycles(), vec![vec![ids[0], ids[1], ids[0]]]);
    }

    #[test]
    fn diamond_has_no_cycle() {
        let (mut draft, ids) = draft_with(4);
        draft.connections = vec![
            link(ids[0], ids[1]),
            link(ids[0], ids[2]),
            link(ids[1], ids[3]),
            link(ids[2], ids[3]),
        ];
        let graph = DraftGraph::new(&draft);
        assert!(!graph.is_cyclic());
        assert!(graph.cycles().is_empty());
        assert_eq!(graph.incoming_count(ids[3]), 2);
        assert_eq!(graph.outgoing_count(ids[0]), 2);
    }

    #[test]
    fn missing_endpoints_are_dangling() {
        let (mut draft, ids) = draft_with(1);
        draft.connections = vec![link(ids[0], NodeId::new())];
        let graph = DraftGraph::new(&draft);
        assert_eq!(graph.dangling().len(), 1);
        assert_eq!(graph.outgoing_count(ids[0]), 0);
    }
}
