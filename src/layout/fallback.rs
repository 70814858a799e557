//! Deterministic placement heuristics used when the layered layout is
//! skipped or fails. Always succeeds for any finite input.

use std::f32::consts::PI;

use crate::config::LayoutConfig;
use crate::ir::{DiagramType, Edge, Node};

use super::error::Result;
use super::graph::LayoutGraph;
use super::ranking::{compute_ranks, median_position, rank_buckets};
use super::routing::route_edges;
use super::strategy::{
    LayoutStrategy, apply_direction_mirror, center_on_canvas, place_center, seed_layout,
};
use super::types::DiagramLayout;

#[derive(Debug, Clone, Copy, Default)]
pub struct FallbackStrategy;

impl FallbackStrategy {
    pub fn new() -> Self {
        Self
    }

    pub fn layout(
        &self,
        nodes: &[Node],
        edges: &[Edge],
        diagram_type: DiagramType,
        config: &LayoutConfig,
    ) -> DiagramLayout {
        let mut layout = seed_layout(nodes, edges, config);
        self.place(&mut layout, diagram_type, config);
        layout
    }

    /// Positions the nodes of an already seeded layout and routes its edges.
    pub(crate) fn place(&self, layout: &mut DiagramLayout, diagram_type: DiagramType, config: &LayoutConfig) {
        if layout.nodes.is_empty() {
            route_edges(layout, diagram_type, config);
            return;
        }
        match diagram_type {
            DiagramType::Flow => {
                place_rows(layout, config);
                apply_direction_mirror(config.rank_direction, layout);
            }
            DiagramType::Tree => {
                place_tree(layout, config);
                apply_direction_mirror(config.rank_direction, layout);
            }
            DiagramType::Timeline => place_timeline(layout, config),
            DiagramType::Cycle => place_cycle(layout, config),
            DiagramType::Matrix => place_grid(layout, config),
        }
        center_on_canvas(layout, config);
        route_edges(layout, diagram_type, config);
    }
}

impl LayoutStrategy for FallbackStrategy {
    fn name(&self) -> &'static str {
        "fallback"
    }

    fn apply_layout(
        &self,
        nodes: &[Node],
        edges: &[Edge],
        diagram_type: DiagramType,
        config: &LayoutConfig,
    ) -> Result<DiagramLayout> {
        Ok(self.layout(nodes, edges, diagram_type, config))
    }
}

fn widest(layout: &DiagramLayout) -> f32 {
    layout.nodes.iter().map(|node| node.width).fold(0.0, f32::max)
}

fn tallest(layout: &DiagramLayout) -> f32 {
    layout.nodes.iter().map(|node| node.height).fold(0.0, f32::max)
}

fn flow_columns(layout: &DiagramLayout, config: &LayoutConfig) -> usize {
    if let Some(columns) = config.fallback.flow_columns {
        return columns.max(1);
    }
    let usable = config.width - config.margin_x * 2.0 + config.node_separation;
    let per_node = widest(layout) + config.node_separation;
    if per_node <= 0.0 {
        return 1;
    }
    ((usable / per_node).floor() as usize).max(1)
}

/// Left-to-right rows, wrapping every `flow_columns` nodes.
fn place_rows(layout: &mut DiagramLayout, config: &LayoutConfig) {
    let columns = flow_columns(layout, config);
    let row_height = tallest(layout);
    let mut x = 0.0;
    for (idx, node) in layout.nodes.iter_mut().enumerate() {
        let col = idx % columns;
        let row = idx / columns;
        if col == 0 {
            x = 0.0;
        }
        node.x = x;
        node.y = row as f32 * (row_height + config.rank_separation);
        x += node.width + config.node_separation;
    }
}

/// Roots on the first rank, each rank centred under the previous one and
/// ordered by the median position of its parents.
fn place_tree(layout: &mut DiagramLayout, config: &LayoutConfig) {
    let graph = LayoutGraph::new(&layout.nodes, &layout.edges);
    let ranks = compute_ranks(&graph);
    let mut buckets = rank_buckets(&ranks);
    let vertical = config.rank_direction.is_vertical();

    let mut slot = vec![0.0_f32; layout.nodes.len()];
    for rank in 0..buckets.len() {
        if rank > 0 {
            let mut keyed: Vec<(f32, usize, usize)> = buckets[rank]
                .iter()
                .enumerate()
                .map(|(pos, &idx)| {
                    let mut parents: Vec<f32> = graph.incoming[idx]
                        .iter()
                        .filter(|&&parent| ranks[parent] < rank)
                        .map(|&parent| slot[parent])
                        .collect();
                    (median_position(&mut parents, f32::MAX), pos, idx)
                })
                .collect();
            keyed.sort_by(|a, b| a.0.total_cmp(&b.0).then(a.1.cmp(&b.1)));
            buckets[rank] = keyed.into_iter().map(|(_, _, idx)| idx).collect();
        }
        for (pos, &idx) in buckets[rank].iter().enumerate() {
            slot[idx] = pos as f32 - (buckets[rank].len() as f32 - 1.0) / 2.0;
        }
    }

    let cross_step = if vertical {
        widest(layout) + config.node_separation
    } else {
        tallest(layout) + config.node_separation
    };
    let rank_step = if vertical {
        tallest(layout) + config.rank_separation
    } else {
        widest(layout) + config.rank_separation
    };
    for (idx, node) in layout.nodes.iter_mut().enumerate() {
        let main = ranks[idx] as f32 * rank_step;
        let cross = slot[idx] * cross_step;
        if vertical {
            place_center(node, cross, main);
        } else {
            place_center(node, main, cross);
        }
    }
}

/// A single row; odd entries sit above the axis, even ones below.
fn place_timeline(layout: &mut DiagramLayout, config: &LayoutConfig) {
    let offset = config.fallback.timeline_offset;
    let mut x = 0.0;
    for (idx, node) in layout.nodes.iter_mut().enumerate() {
        let dy = if idx % 2 == 0 { -offset } else { offset };
        place_center(node, x + node.width / 2.0, dy);
        x += node.width + config.node_separation;
    }
}

/// Even spacing on a circle, starting at twelve o'clock and running clockwise.
fn place_cycle(layout: &mut DiagramLayout, config: &LayoutConfig) {
    let n = layout.nodes.len();
    if n == 1 {
        place_center(&mut layout.nodes[0], 0.0, 0.0);
        return;
    }
    let radius = cycle_radius(n, widest(layout), config);
    for (idx, node) in layout.nodes.iter_mut().enumerate() {
        let angle = -PI / 2.0 + 2.0 * PI * idx as f32 / n as f32;
        place_center(node, radius * angle.cos(), radius * angle.sin());
    }
}

/// Configured radius, grown until neighbouring nodes cannot touch.
pub(crate) fn cycle_radius(n: usize, widest: f32, config: &LayoutConfig) -> f32 {
    if n < 2 {
        return config.fallback.cycle_radius;
    }
    let chord = widest + config.node_separation.max(config.overlap_margin);
    let needed = chord / (2.0 * (PI / n as f32).sin());
    config.fallback.cycle_radius.max(needed)
}

/// `ceil(sqrt(n))` columns of uniform cells.
fn place_grid(layout: &mut DiagramLayout, config: &LayoutConfig) {
    let n = layout.nodes.len();
    let columns = ((n as f32).sqrt().ceil() as usize).max(1);
    let cell_w = widest(layout) + config.node_separation;
    let cell_h = tallest(layout) + config.rank_separation;
    for (idx, node) in layout.nodes.iter_mut().enumerate() {
        let col = idx % columns;
        let row = idx / columns;
        place_center(node, col as f32 * cell_w, row as f32 * cell_h);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::RankDirection;

    fn nodes(n: usize) -> Vec<Node> {
        (0..n).map(|i| Node::new(format!("n{i}"), format!("Node {i}"))).collect()
    }

    fn chain(n: usize) -> Vec<Edge> {
        (1..n).map(|i| Edge::new(format!("n{}", i - 1), format!("n{i}"))).collect()
    }

    fn assert_no_overlap(layout: &DiagramLayout, margin: f32) {
        assert_eq!(layout.overlap_count(margin), 0, "overlaps in {:?}", layout.nodes);
    }

    #[test]
    fn empty_input_for_every_type() {
        let strategy = FallbackStrategy::new();
        for ty in [
            DiagramType::Flow,
            DiagramType::Tree,
            DiagramType::Timeline,
            DiagramType::Cycle,
            DiagramType::Matrix,
        ] {
            let layout = strategy.layout(&[], &[Edge::new("a", "b")], ty, &LayoutConfig::default());
            assert!(layout.nodes.is_empty());
            assert!(layout.edges[0].points.is_empty());
        }
    }

    #[test]
    fn flow_wraps_rows() {
        let config = LayoutConfig {
            fallback: crate::config::FallbackConfig {
                flow_columns: Some(3),
                ..Default::default()
            },
            ..Default::default()
        };
        let layout = FallbackStrategy::new().layout(&nodes(7), &chain(7), DiagramType::Flow, &config);
        let rows: Vec<f32> = layout.nodes.iter().map(|n| n.y).collect();
        assert_eq!(rows[0], rows[2]);
        assert!(rows[3] > rows[2]);
        assert!(rows[6] > rows[5]);
        assert!(layout.nodes[1].x > layout.nodes[0].x);
        assert_no_overlap(&layout, config.overlap_margin);
    }

    #[test]
    fn tree_root_sits_above_centred_children() {
        let config = LayoutConfig::default();
        let edges = vec![Edge::new("n0", "n1"), Edge::new("n0", "n2"), Edge::new("n0", "n3")];
        let layout = FallbackStrategy::new().layout(&nodes(4), &edges, DiagramType::Tree, &config);
        let root = layout.nodes[0].center();
        let kids: Vec<_> = layout.nodes[1..].iter().map(|n| n.center()).collect();
        assert!(kids.iter().all(|c| c.y > root.y));
        let mean_x = kids.iter().map(|c| c.x).sum::<f32>() / 3.0;
        assert!((mean_x - root.x).abs() < 1e-3);
        assert_no_overlap(&layout, config.overlap_margin);
    }

    #[test]
    fn tree_bottom_top_puts_root_last() {
        let config = LayoutConfig {
            rank_direction: RankDirection::BottomTop,
            ..Default::default()
        };
        let layout = FallbackStrategy::new().layout(&nodes(3), &chain(3), DiagramType::Tree, &config);
        assert!(layout.nodes[0].y > layout.nodes[2].y);
    }

    #[test]
    fn timeline_alternates_around_one_row() {
        let config = LayoutConfig::default();
        let layout = FallbackStrategy::new().layout(&nodes(4), &chain(4), DiagramType::Timeline, &config);
        assert!(layout.nodes[0].y < layout.nodes[1].y);
        assert_eq!(layout.nodes[0].y, layout.nodes[2].y);
        assert!(layout.nodes.windows(2).all(|w| w[1].x > w[0].x));
        assert_no_overlap(&layout, config.overlap_margin);
    }

    #[test]
    fn cycle_nodes_share_a_radius() {
        let config = LayoutConfig::default();
        let layout = FallbackStrategy::new().layout(&nodes(12), &chain(12), DiagramType::Cycle, &config);
        let center = layout.bounding_rect().unwrap().center();
        let radii: Vec<f32> = layout.nodes.iter().map(|n| n.center().distance(center)).collect();
        let spread = radii.iter().cloned().fold(f32::MIN, f32::max) - radii.iter().cloned().fold(f32::MAX, f32::min);
        assert!(spread < 40.0);
        assert!(radii[0] >= config.fallback.cycle_radius - 40.0);
        assert_no_overlap(&layout, config.overlap_margin);
    }

    #[test]
    fn matrix_uses_square_grid() {
        let config = LayoutConfig::default();
        let layout = FallbackStrategy::new().layout(&nodes(10), &[], DiagramType::Matrix, &config);
        // 10 nodes -> 4 columns, so node 4 starts the second row.
        assert_eq!(layout.nodes[0].y, layout.nodes[3].y);
        assert!(layout.nodes[4].y > layout.nodes[3].y);
        assert_no_overlap(&layout, config.overlap_margin);
    }

    #[test]
    fn placement_is_deterministic() {
        let config = LayoutConfig::default();
        let a = FallbackStrategy::new().layout(&nodes(9), &chain(9), DiagramType::Tree, &config);
        let b = FallbackStrategy::new().layout(&nodes(9), &chain(9), DiagramType::Tree, &config);
        assert_eq!(a, b);
    }
}
