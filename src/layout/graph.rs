use std::collections::HashMap;

use super::types::{LayoutEdge, PositionedNode};

/// An edge resolved to node indices.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Link {
    pub(crate) edge: usize,
    pub(crate) from: usize,
    pub(crate) to: usize,
}

/// Index view over a layout's nodes and edges. Dangling edges and self-loops
/// are left out of `links`; parallel edges are kept.
#[derive(Debug, Clone, Default)]
pub(crate) struct LayoutGraph {
    index: HashMap<String, usize>,
    pub(crate) links: Vec<Link>,
    pub(crate) outgoing: Vec<Vec<usize>>,
    pub(crate) incoming: Vec<Vec<usize>>,
}

impl LayoutGraph {
    pub(crate) fn new(nodes: &[PositionedNode], edges: &[LayoutEdge]) -> Self {
        let mut index = HashMap::with_capacity(nodes.len());
        for (idx, node) in nodes.iter().enumerate() {
            index.entry(node.id.clone()).or_insert(idx);
        }
        let mut links = Vec::with_capacity(edges.len());
        let mut outgoing = vec![Vec::new(); nodes.len()];
        let mut incoming = vec![Vec::new(); nodes.len()];
        for (edge_idx, edge) in edges.iter().enumerate() {
            let (Some(&from), Some(&to)) = (index.get(&edge.from), index.get(&edge.to)) else {
                continue;
            };
            if from == to {
                continue;
            }
            links.push(Link {
                edge: edge_idx,
                from,
                to,
            });
            outgoing[from].push(to);
            incoming[to].push(from);
        }
        Self {
            index,
            links,
            outgoing,
            incoming,
        }
    }

    pub(crate) fn len(&self) -> usize {
        self.outgoing.len()
    }

    pub(crate) fn index_of(&self, id: &str) -> Option<usize> {
        self.index.get(id).copied()
    }

    pub(crate) fn neighbors(&self, node: usize) -> impl Iterator<Item = usize> + '_ {
        self.outgoing[node]
            .iter()
            .chain(self.incoming[node].iter())
            .copied()
    }

    pub(crate) fn is_isolated(&self, node: usize) -> bool {
        self.outgoing[node].is_empty() && self.incoming[node].is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::{Edge, Node};

    #[test]
    fn drops_dangling_edges_and_self_loops() {
        let nodes: Vec<PositionedNode> = ["a", "b"]
            .iter()
            .map(|id| PositionedNode::from_node(&Node::new(*id, *id), 10.0, 10.0))
            .collect();
        let edges: Vec<LayoutEdge> = [("a", "b"), ("a", "ghost"), ("b", "b"), ("a", "b")]
            .iter()
            .map(|(from, to)| LayoutEdge::from_edge(&Edge::new(*from, *to)))
            .collect();
        let graph = LayoutGraph::new(&nodes, &edges);
        assert_eq!(graph.links.len(), 2);
        assert_eq!(graph.links[1].edge, 3);
        assert_eq!(graph.neighbors(1).collect::<Vec<_>>(), vec![0, 0]);
        assert!(!graph.is_isolated(0));
        assert_eq!(graph.index_of("ghost"), None);
    }
}
