use std::collections::HashSet;

use crate::config::LayoutConfig;
use crate::ir::{DiagramType, Edge, Node, RankDirection};

use super::error::Result;
use super::geometry::Point;
use super::types::{DiagramLayout, LayoutEdge, PositionedNode};

/// Produces an initial placement for a graph.
pub trait LayoutStrategy {
    fn name(&self) -> &'static str;

    fn apply_layout(
        &self,
        nodes: &[Node],
        edges: &[Edge],
        diagram_type: DiagramType,
        config: &LayoutConfig,
    ) -> Result<DiagramLayout>;
}

/// Sized, unplaced layout for the input. Later duplicates of a node id are
/// dropped; every edge is kept, dangling or not.
pub(crate) fn seed_layout(nodes: &[Node], edges: &[Edge], config: &LayoutConfig) -> DiagramLayout {
    let mut seen: HashSet<&str> = HashSet::with_capacity(nodes.len());
    let mut positioned = Vec::with_capacity(nodes.len());
    for node in nodes {
        if !seen.insert(node.id.as_str()) {
            tracing::warn!(id = %node.id, "duplicate node id dropped");
            continue;
        }
        let (width, height) = config.node_size(&node.label);
        positioned.push(PositionedNode::from_node(node, width, height));
    }
    DiagramLayout {
        nodes: positioned,
        edges: edges.iter().map(LayoutEdge::from_edge).collect(),
    }
}

/// Moves the layout so its bounding box is centred on the canvas.
pub(crate) fn center_on_canvas(layout: &mut DiagramLayout, config: &LayoutConfig) {
    let Some(bounds) = layout.bounding_rect() else {
        return;
    };
    let center = bounds.center();
    layout.translate(config.width / 2.0 - center.x, config.height / 2.0 - center.y);
}

/// Places the layout inside the canvas margins: centred when it fits,
/// otherwise pinned to the top-left margin on the overflowing axis.
pub(crate) fn fit_to_canvas(layout: &mut DiagramLayout, config: &LayoutConfig) {
    let Some(bounds) = layout.bounding_rect() else {
        return;
    };
    let avail_w = config.width - config.margin_x * 2.0;
    let avail_h = config.height - config.margin_y * 2.0;
    let target_x = if bounds.width <= avail_w {
        config.margin_x + (avail_w - bounds.width) / 2.0
    } else {
        config.margin_x
    };
    let target_y = if bounds.height <= avail_h {
        config.margin_y + (avail_h - bounds.height) / 2.0
    } else {
        config.margin_y
    };
    layout.translate(target_x - bounds.x, target_y - bounds.y);
}

/// Flips node positions for bottom-up and right-to-left rank directions.
pub(crate) fn apply_direction_mirror(direction: RankDirection, layout: &mut DiagramLayout) {
    let Some(bounds) = layout.bounding_rect() else {
        return;
    };
    match direction {
        RankDirection::RightLeft => {
            for node in &mut layout.nodes {
                node.x = bounds.right() - (node.x - bounds.x) - node.width;
            }
        }
        RankDirection::BottomTop => {
            for node in &mut layout.nodes {
                node.y = bounds.bottom() - (node.y - bounds.y) - node.height;
            }
        }
        RankDirection::TopBottom | RankDirection::LeftRight => {}
    }
}

pub(crate) fn place_center(node: &mut PositionedNode, x: f32, y: f32) {
    node.set_center(Point::new(x, y));
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn seed_drops_duplicates_but_keeps_edges() {
        let nodes = vec![Node::new("a", "A"), Node::new("a", "again"), Node::new("b", "B")];
        let edges = vec![Edge::new("a", "b"), Edge::new("a", "ghost")];
        let layout = seed_layout(&nodes, &edges, &LayoutConfig::default());
        assert_eq!(layout.nodes.len(), 2);
        assert_eq!(layout.nodes[0].label, "A");
        assert_eq!(layout.edges.len(), 2);
    }

    #[test]
    fn fit_centres_small_layouts() {
        let config = LayoutConfig::default();
        let mut layout = seed_layout(&[Node::new("a", "A")], &[], &config);
        fit_to_canvas(&mut layout, &config);
        let c = layout.nodes[0].center();
        assert!((c.x - 960.0).abs() < 1e-3 && (c.y - 540.0).abs() < 1e-3);
    }

    #[test]
    fn mirror_flips_bottom_top() {
        let config = LayoutConfig::default();
        let mut layout = seed_layout(&[Node::new("a", "A"), Node::new("b", "B")], &[], &config);
        layout.nodes[1].y = 200.0;
        apply_direction_mirror(RankDirection::BottomTop, &mut layout);
        assert_eq!(layout.nodes[0].y, 200.0);
        assert_eq!(layout.nodes[1].y, 0.0);
    }
}
