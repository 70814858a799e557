use std::collections::HashSet;
use std::panic::{AssertUnwindSafe, catch_unwind};

use dagre_rust::{
    GraphConfig as DagreConfig, GraphEdge as DagreEdge, GraphNode as DagreNode,
    layout as dagre_layout,
};
use graphlib_rust::{Graph as DagreGraph, GraphOption};

use crate::config::LayoutConfig;
use crate::ir::{DiagramType, Edge, Node, RankDirection};

use super::error::{LayoutError, Result, panic_message};
use super::fallback::FallbackStrategy;
use super::routing::route_edges;
use super::strategy::{LayoutStrategy, center_on_canvas, seed_layout};
use super::types::DiagramLayout;

/// Layered placement through dagre. `try_layout` reports failure;
/// `apply_layout` substitutes the fallback heuristics instead.
#[derive(Debug, Clone, Copy, Default)]
pub struct DagreStrategy {
    fallback: FallbackStrategy,
}

impl DagreStrategy {
    pub fn new() -> Self {
        Self {
            fallback: FallbackStrategy::new(),
        }
    }

    /// Whether the layered algorithm has anything to say about this type.
    pub fn handles(diagram_type: DiagramType) -> bool {
        !matches!(diagram_type, DiagramType::Cycle | DiagramType::Matrix)
    }

    pub fn try_layout(
        &self,
        nodes: &[Node],
        edges: &[Edge],
        diagram_type: DiagramType,
        config: &LayoutConfig,
    ) -> Result<DiagramLayout> {
        let mut layout = seed_layout(nodes, edges, config);
        match layout.nodes.len() {
            0 => {}
            1 => {
                let node = &mut layout.nodes[0];
                node.x = (config.width - node.width) / 2.0;
                node.y = (config.height - node.height) / 2.0;
            }
            _ => {
                assign_positions_dagre(&mut layout, diagram_type, config)?;
                center_on_canvas(&mut layout, config);
            }
        }
        route_edges(&mut layout, diagram_type, config);
        Ok(layout)
    }
}

impl LayoutStrategy for DagreStrategy {
    fn name(&self) -> &'static str {
        "dagre"
    }

    fn apply_layout(
        &self,
        nodes: &[Node],
        edges: &[Edge],
        diagram_type: DiagramType,
        config: &LayoutConfig,
    ) -> Result<DiagramLayout> {
        match self.try_layout(nodes, edges, diagram_type, config) {
            Ok(layout) => Ok(layout),
            Err(err) => {
                tracing::warn!(
                    error = %err,
                    fallback = self.fallback.name(),
                    "dagre layout unusable, using fallback"
                );
                Ok(self.fallback.layout(nodes, edges, diagram_type, config))
            }
        }
    }
}

fn dagre_rankdir(direction: RankDirection) -> &'static str {
    match direction {
        RankDirection::TopBottom => "tb",
        RankDirection::BottomTop => "bt",
        RankDirection::LeftRight => "lr",
        RankDirection::RightLeft => "rl",
    }
}

fn rank_direction_for(diagram_type: DiagramType, config: &LayoutConfig) -> RankDirection {
    match diagram_type {
        DiagramType::Timeline => RankDirection::LeftRight,
        _ => config.rank_direction,
    }
}

fn assign_positions_dagre(
    layout: &mut DiagramLayout,
    diagram_type: DiagramType,
    config: &LayoutConfig,
) -> Result<()> {
    let mut dagre_graph: DagreGraph<DagreConfig, DagreNode, DagreEdge> =
        DagreGraph::new(Some(GraphOption {
            directed: Some(true),
            multigraph: Some(false),
            compound: Some(false),
        }));

    let mut graph_config = DagreConfig::default();
    graph_config.rankdir = Some(dagre_rankdir(rank_direction_for(diagram_type, config)).to_string());
    graph_config.nodesep = Some(config.node_separation);
    graph_config.ranksep = Some(config.rank_separation);
    graph_config.marginx = Some(config.margin_x);
    graph_config.marginy = Some(config.margin_y);
    dagre_graph.set_graph(graph_config);

    for (order, node) in layout.nodes.iter().enumerate() {
        let mut dagre_node = DagreNode::default();
        dagre_node.width = node.width;
        dagre_node.height = node.height;
        dagre_node.order = Some(order);
        dagre_graph.set_node(node.id.clone(), Some(dagre_node));
    }

    let node_set: HashSet<&str> = layout.nodes.iter().map(|node| node.id.as_str()).collect();
    let mut edge_set: HashSet<(String, String)> = HashSet::new();
    for edge in &layout.edges {
        if !node_set.contains(edge.from.as_str()) || !node_set.contains(edge.to.as_str()) {
            continue;
        }
        if edge.from == edge.to {
            continue;
        }
        let from = edge.from.clone();
        let to = edge.to.clone();
        if !edge_set.insert((from.clone(), to.clone())) {
            continue;
        }
        let edge_label = DagreEdge::default();
        let _ = dagre_graph.set_edge(&from, &to, Some(edge_label), None);
    }

    catch_unwind(AssertUnwindSafe(|| dagre_layout::run_layout(&mut dagre_graph))).map_err(
        |payload| LayoutError::Dagre {
            message: panic_message(payload.as_ref()),
        },
    )?;

    let mut placed = 0;
    for node in &mut layout.nodes {
        let Some(dagre_node) = dagre_graph.node(&node.id) else {
            continue;
        };
        if !dagre_node.x.is_finite() || !dagre_node.y.is_finite() {
            continue;
        }
        node.x = dagre_node.x - node.width / 2.0;
        node.y = dagre_node.y - node.height / 2.0;
        placed += 1;
    }

    if placed < layout.nodes.len() {
        return Err(LayoutError::IncompleteLayout {
            expected: layout.nodes.len(),
            placed,
        });
    }
    Ok(())
}
