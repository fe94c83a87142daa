//! Structural sharing across an interner.
//!
//! Every node is a graph vertex with an edge to its continuation. Since nodes
//! are immutable and point only at nodes built before them, the graph is a
//! forest of in-trees: heads have no incoming edge, shared tails have several.

use crate::chain::Chain;
use crate::store::{Interner, NodeId, TypeTag};
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::Direction;
use serde::Serialize;
use std::collections::HashMap;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SharedTail {
    pub id: NodeId,
    pub kind: &'static str,
    /// Number of distinct nodes continuing into this one.
    pub parents: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SharingReport {
    pub nodes: usize,
    /// Nodes nothing continues into.
    pub heads: Vec<NodeId>,
    pub shared: Vec<SharedTail>,
    pub longest_chain: usize,
    pub acyclic: bool,
}

/// The continuation graph of every node in `interner`.
pub fn graph(interner: &Interner) -> (DiGraph<Chain, ()>, HashMap<NodeId, NodeIndex>) {
    let nodes = interner.snapshot();
    let mut graph = DiGraph::with_capacity(nodes.len(), nodes.len());
    let mut index = HashMap::with_capacity(nodes.len());

    // 1. Vertices, in creation order
    for node in &nodes {
        index.insert(node.id(), graph.add_node(node.clone()));
    }

    // 2. One edge per continuation
    for node in &nodes {
        if let Some(next) = node.next() {
            if let (Some(&from), Some(&to)) = (index.get(&node.id()), index.get(&next.id())) {
                graph.add_edge(from, to, ());
            }
        }
    }

    (graph, index)
}

pub fn analyze(interner: &Interner) -> SharingReport {
    let (graph, _) = graph(interner);

    let mut heads = Vec::new();
    let mut shared = Vec::new();
    let mut longest_chain = 0;

    for ix in graph.node_indices() {
        let node = &graph[ix];
        let parents = graph.neighbors_directed(ix, Direction::Incoming).count();
        match parents {
            0 => {
                heads.push(node.id());
                longest_chain = longest_chain.max(node.len());
            }
            1 => {}
            n => shared.push(SharedTail { id: node.id(), kind: node.tag().short_name(), parents: n }),
        }
    }

    tracing::debug!(nodes = graph.node_count(), heads = heads.len(), shared = shared.len(), "sharing: analyzed interner");

    SharingReport {
        nodes: graph.node_count(),
        heads,
        shared,
        longest_chain,
        acyclic: !petgraph::algo::is_cyclic_directed(&graph),
    }
}

/// Kinds along the longest chain rooted at any head, head first.
pub fn longest(interner: &Interner) -> Vec<TypeTag> {
    let (graph, _) = graph(interner);
    graph
        .node_indices()
        .filter(|ix| graph.neighbors_directed(*ix, Direction::Incoming).next().is_none())
        .map(|ix| &graph[ix])
        .max_by_key(|head| (head.len(), std::cmp::Reverse(head.id())))
        .map(|head| head.kinds())
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{Even, Positive, Threshold};

    #[test]
    fn test_empty_interner() {
        let report = analyze(&Interner::new());
        assert_eq!(report.nodes, 0);
        assert!(report.heads.is_empty());
        assert_eq!(report.longest_chain, 0);
        assert!(report.acyclic);
    }

    #[test]
    fn test_shared_suffix_is_reported() {
        let interner = Interner::new();
        let even = interner.node(Even).unwrap();
        let a = interner.node(Positive).unwrap() & even.clone();
        let b = interner.node(Threshold(3.0)).unwrap() & even.clone();

        let report = analyze(&interner);
        // Positive, Threshold, Even, Positive&Even, Threshold&Even
        assert_eq!(report.nodes, 5);
        assert_eq!(report.heads.len(), 4);
        assert!(report.heads.contains(&a.id()));
        assert!(report.heads.contains(&b.id()));
        assert_eq!(report.shared, vec![SharedTail { id: even.id(), kind: "Even", parents: 2 }]);
        assert_eq!(report.longest_chain, 2);
        assert!(report.acyclic);
    }

    #[test]
    fn test_longest_lists_kinds_head_first() {
        let interner = Interner::new();
        let _ = interner.node(Positive).unwrap() & interner.node(Even).unwrap() & interner.node(Threshold(1.0)).unwrap();
        assert_eq!(
            longest(&interner),
            vec![TypeTag::of::<Positive>(), TypeTag::of::<Even>(), TypeTag::of::<Threshold>()]
        );
    }
}
