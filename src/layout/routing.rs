use std::collections::HashMap;

use crate::config::LayoutConfig;
use crate::ir::DiagramType;

use super::geometry::{Point, Rect, polyline_length};
use super::graph::LayoutGraph;
use super::types::{DiagramLayout, LayoutEdge, PositionedNode};

/// Fraction of node size used for the self-loop bulge.
const SELF_LOOP_RATIO: f32 = 0.4;
/// Minimum self-loop bulge.
const SELF_LOOP_MIN: f32 = 16.0;
/// How far a cycle edge bends away from the ring centre, as a fraction of its length.
const CYCLE_BEND_RATIO: f32 = 0.15;

/// Recomputes every edge path from the current node positions.
pub fn route_edges(layout: &mut DiagramLayout, diagram_type: DiagramType, config: &LayoutConfig) {
    let graph = LayoutGraph::new(&layout.nodes, &layout.edges);
    let centroid = centroid(&layout.nodes);
    let fan = parallel_fan_offsets(&layout.edges, config.edge_separation);

    for (edge_idx, edge) in layout.edges.iter_mut().enumerate() {
        let (Some(from), Some(to)) = (graph.index_of(&edge.from), graph.index_of(&edge.to)) else {
            edge.points.clear();
            continue;
        };
        let source = &layout.nodes[from];
        let target = &layout.nodes[to];
        edge.points = if from == to {
            self_loop_points(source.rect())
        } else {
            let offset = fan.get(&edge_idx).copied().unwrap_or(0.0);
            edge_points(source, target, diagram_type, config, centroid, offset)
        };
    }
}

fn edge_points(
    source: &PositionedNode,
    target: &PositionedNode,
    diagram_type: DiagramType,
    config: &LayoutConfig,
    centroid: Point,
    fan_offset: f32,
) -> Vec<Point> {
    let from_rect = source.rect();
    let to_rect = target.rect();
    let from_center = from_rect.center();
    let to_center = to_rect.center();

    if fan_offset.abs() > f32::EPSILON {
        let mid = offset_midpoint(from_center, to_center, fan_offset);
        return vec![
            from_rect.boundary_point(mid),
            mid,
            to_rect.boundary_point(mid),
        ];
    }

    match diagram_type {
        DiagramType::Tree => elbow_points(&from_rect, &to_rect, config),
        DiagramType::Cycle => {
            let straight_mid = from_center.midpoint(to_center);
            let dx = straight_mid.x - centroid.x;
            let dy = straight_mid.y - centroid.y;
            let len = (dx * dx + dy * dy).sqrt();
            let bend = from_center.distance(to_center) * CYCLE_BEND_RATIO;
            let mid = if len > 1e-3 {
                Point::new(straight_mid.x + dx / len * bend, straight_mid.y + dy / len * bend)
            } else {
                offset_midpoint(from_center, to_center, bend)
            };
            vec![
                from_rect.boundary_point(mid),
                mid,
                to_rect.boundary_point(mid),
            ]
        }
        _ => vec![
            from_rect.boundary_point(to_center),
            to_rect.boundary_point(from_center),
        ],
    }
}

/// Orthogonal parent-to-child connector through the gap between ranks.
fn elbow_points(from: &Rect, to: &Rect, config: &LayoutConfig) -> Vec<Point> {
    let fc = from.center();
    let tc = to.center();
    if config.rank_direction.is_vertical() {
        let (start, end) = if tc.y >= fc.y {
            (Point::new(fc.x, from.bottom()), Point::new(tc.x, to.y))
        } else {
            (Point::new(fc.x, from.y), Point::new(tc.x, to.bottom()))
        };
        if (start.x - end.x).abs() < 0.5 {
            return vec![start, end];
        }
        let mid_y = (start.y + end.y) / 2.0;
        vec![start, Point::new(start.x, mid_y), Point::new(end.x, mid_y), end]
    } else {
        let (start, end) = if tc.x >= fc.x {
            (Point::new(from.right(), fc.y), Point::new(to.x, tc.y))
        } else {
            (Point::new(from.x, fc.y), Point::new(to.right(), tc.y))
        };
        if (start.y - end.y).abs() < 0.5 {
            return vec![start, end];
        }
        let mid_x = (start.x + end.x) / 2.0;
        vec![start, Point::new(mid_x, start.y), Point::new(mid_x, end.y), end]
    }
}

fn self_loop_points(rect: Rect) -> Vec<Point> {
    let pad = (rect.width.min(rect.height) * SELF_LOOP_RATIO).max(SELF_LOOP_MIN);
    let start = Point::new(rect.right(), rect.y + rect.height * 0.25);
    let end = Point::new(rect.right() - rect.width * 0.25, rect.y);
    vec![
        start,
        Point::new(rect.right() + pad, start.y),
        Point::new(rect.right() + pad, rect.y - pad),
        Point::new(end.x, rect.y - pad),
        end,
    ]
}

fn offset_midpoint(a: Point, b: Point, offset: f32) -> Point {
    let mid = a.midpoint(b);
    let dx = b.x - a.x;
    let dy = b.y - a.y;
    let len = (dx * dx + dy * dy).sqrt();
    if len <= 1e-3 {
        return Point::new(mid.x + offset, mid.y);
    }
    Point::new(mid.x - dy / len * offset, mid.y + dx / len * offset)
}

fn centroid(nodes: &[PositionedNode]) -> Point {
    if nodes.is_empty() {
        return Point::default();
    }
    let (sx, sy) = nodes.iter().fold((0.0, 0.0), |(sx, sy), node| {
        let c = node.center();
        (sx + c.x, sy + c.y)
    });
    Point::new(sx / nodes.len() as f32, sy / nodes.len() as f32)
}

/// Perpendicular offsets for edges that share an unordered endpoint pair.
/// The first edge of a group stays straight only when the group is a single edge.
fn parallel_fan_offsets(edges: &[LayoutEdge], separation: f32) -> HashMap<usize, f32> {
    let mut groups: HashMap<(&str, &str), Vec<usize>> = HashMap::new();
    for (idx, edge) in edges.iter().enumerate() {
        if edge.from == edge.to {
            continue;
        }
        let key = if edge.from <= edge.to {
            (edge.from.as_str(), edge.to.as_str())
        } else {
            (edge.to.as_str(), edge.from.as_str())
        };
        groups.entry(key).or_default().push(idx);
    }
    let step = separation.max(4.0) * 2.0;
    let mut offsets = HashMap::new();
    for (key, members) in groups {
        if members.len() < 2 {
            continue;
        }
        let center = (members.len() - 1) as f32 / 2.0;
        for (slot, edge_idx) in members.iter().enumerate() {
            // Offsets are expressed in the canonical (low id -> high id) frame.
            let mut offset = (slot as f32 - center) * step;
            if edges[*edge_idx].from.as_str() != key.0 {
                offset = -offset;
            }
            offsets.insert(*edge_idx, offset);
        }
    }
    offsets
}

/// Re-routes straight edges that cut through a third node with a single
/// perpendicular detour, keeping the detour only when it hits fewer nodes.
pub fn avoid_obstacles(layout: &mut DiagramLayout, margin: f32) {
    let graph = LayoutGraph::new(&layout.nodes, &layout.edges);
    let rects: Vec<Rect> = layout.nodes.iter().map(PositionedNode::rect).collect();
    for link in &graph.links {
        let edge = &mut layout.edges[link.edge];
        if edge.points.len() != 2 {
            continue;
        }
        let hits = |points: &[Point]| -> usize {
            rects
                .iter()
                .enumerate()
                .filter(|(idx, _)| *idx != link.from && *idx != link.to)
                .filter(|(_, rect)| points.windows(2).any(|seg| rect.segment_hits(seg[0], seg[1])))
                .count()
        };
        let current_hits = hits(&edge.points);
        if current_hits == 0 {
            continue;
        }
        let from_rect = rects[link.from];
        let to_rect = rects[link.to];
        let base = polyline_length(&edge.points);
        let mut best: Option<(usize, f32, Vec<Point>)> = None;
        for step in 1..=3 {
            for sign in [1.0_f32, -1.0] {
                let offset = sign * step as f32 * (from_rect.height.max(to_rect.height) + margin);
                let mid = offset_midpoint(from_rect.center(), to_rect.center(), offset);
                let candidate = vec![
                    from_rect.boundary_point(mid),
                    mid,
                    to_rect.boundary_point(mid),
                ];
                let candidate_hits = hits(&candidate);
                if candidate_hits >= current_hits {
                    continue;
                }
                let length = polyline_length(&candidate) - base;
                let better = match &best {
                    None => true,
                    Some((best_hits, best_len, _)) => {
                        candidate_hits < *best_hits
                            || (candidate_hits == *best_hits && length < *best_len)
                    }
                };
                if better {
                    best = Some((candidate_hits, length, candidate));
                }
            }
        }
        if let Some((_, _, points)) = best {
            edge.points = points;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::{Edge, Node};

    fn node(id: &str, x: f32, y: f32) -> PositionedNode {
        let mut node = PositionedNode::from_node(&Node::new(id, id), 100.0, 50.0);
        node.x = x;
        node.y = y;
        node
    }

    fn layout(nodes: Vec<PositionedNode>, edges: &[(&str, &str)]) -> DiagramLayout {
        DiagramLayout {
            nodes,
            edges: edges
                .iter()
                .map(|(from, to)| LayoutEdge::from_edge(&Edge::new(*from, *to)))
                .collect(),
        }
    }

    #[test]
    fn dangling_edge_gets_empty_path() {
        let mut layout = layout(vec![node("a", 0.0, 0.0)], &[("a", "ghost")]);
        route_edges(&mut layout, DiagramType::Flow, &LayoutConfig::default());
        assert!(layout.edges[0].points.is_empty());
    }

    #[test]
    fn straight_edge_touches_both_borders() {
        let mut layout = layout(vec![node("a", 0.0, 0.0), node("b", 300.0, 0.0)], &[("a", "b")]);
        route_edges(&mut layout, DiagramType::Flow, &LayoutConfig::default());
        let points = &layout.edges[0].points;
        assert_eq!(points.len(), 2);
        assert!((points[0].x - 100.0).abs() < 1e-3);
        assert!((points[1].x - 300.0).abs() < 1e-3);
    }

    #[test]
    fn tree_edges_are_elbows() {
        let mut layout = layout(vec![node("root", 100.0, 0.0), node("kid", 0.0, 150.0)], &[("root", "kid")]);
        route_edges(&mut layout, DiagramType::Tree, &LayoutConfig::default());
        let points = &layout.edges[0].points;
        assert_eq!(points.len(), 4);
        assert_eq!(points[0], Point::new(150.0, 50.0));
        assert_eq!(points[3], Point::new(50.0, 150.0));
        assert_eq!(points[1].y, points[2].y);
    }

    #[test]
    fn parallel_edges_fan_out_and_self_loops_route() {
        let mut layout = layout(
            vec![node("a", 0.0, 0.0), node("b", 300.0, 0.0)],
            &[("a", "b"), ("b", "a"), ("a", "a")],
        );
        route_edges(&mut layout, DiagramType::Flow, &LayoutConfig::default());
        assert_eq!(layout.edges[0].points.len(), 3);
        assert_eq!(layout.edges[1].points.len(), 3);
        assert_ne!(layout.edges[0].points[1], layout.edges[1].points[1]);
        assert_eq!(layout.edges[2].points.len(), 5);
    }

    #[test]
    fn obstacle_detour_clears_blocking_node() {
        let mut layout = layout(
            vec![node("a", 0.0, 0.0), node("b", 600.0, 0.0), node("wall", 250.0, 0.0)],
            &[("a", "b")],
        );
        route_edges(&mut layout, DiagramType::Flow, &LayoutConfig::default());
        avoid_obstacles(&mut layout, 10.0);
        let points = &layout.edges[0].points;
        assert_eq!(points.len(), 3);
        let wall = layout.nodes[2].rect();
        assert!(points.windows(2).all(|seg| !wall.segment_hits(seg[0], seg[1])));
    }
}
