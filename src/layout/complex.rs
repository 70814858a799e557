//! Cluster-aware force-directed layout for large graphs.

use std::collections::BTreeMap;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::time::Instant;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::config::LayoutConfig;
use crate::ir::{DiagramType, Edge, Node};

use super::error::{LayoutError, Result, panic_message};
use super::evaluate::LayoutEvaluator;
use super::geometry::Point;
use super::graph::LayoutGraph;
use super::overlap::OverlapResolver;
use super::routing::{avoid_obstacles, route_edges};
use super::strategy::{fit_to_canvas, seed_layout};
use super::types::{DiagramLayout, LayoutPath, LayoutResult, OverlapReport, StrategyKind};

/// Sizes closer than this count as equal for position swaps.
const SIZE_EPS: f32 = 0.01;

#[derive(Debug, Clone)]
pub struct ComplexLayoutEngine {
    config: LayoutConfig,
    resolver: OverlapResolver,
    evaluator: LayoutEvaluator,
}

struct ComplexOutcome {
    layout: DiagramLayout,
    report: OverlapReport,
    clusters: usize,
}

impl ComplexLayoutEngine {
    pub fn new(config: &LayoutConfig) -> Self {
        Self {
            config: config.clone(),
            resolver: OverlapResolver::from_config(config),
            evaluator: LayoutEvaluator::new(config),
        }
    }

    /// Runs clustering, force simulation, overlap resolution and edge
    /// optimisation. Never panics; failures come back as an unsuccessful
    /// result.
    pub fn generate_complex_layout(
        &self,
        nodes: &[Node],
        edges: &[Edge],
        diagram_type: DiagramType,
    ) -> LayoutResult {
        let start = Instant::now();
        let outcome = catch_unwind(AssertUnwindSafe(|| self.run(nodes, edges, diagram_type)))
            .unwrap_or_else(|payload| Err(LayoutError::Panicked(panic_message(payload.as_ref()))));
        let elapsed = start.elapsed().as_secs_f64() * 1000.0;

        match outcome {
            Ok(outcome) => {
                let confidence =
                    self.evaluator
                        .calculate_layout_confidence(&outcome.layout, diagram_type, elapsed);
                let mut metrics = self.evaluator.measure(
                    &outcome.layout,
                    LayoutPath::Complex,
                    StrategyKind::Force,
                    1,
                    elapsed,
                    outcome.report,
                );
                metrics.cluster_count = Some(outcome.clusters);
                tracing::debug!(
                    nodes = outcome.layout.nodes.len(),
                    clusters = outcome.clusters,
                    elapsed_ms = elapsed,
                    "complex layout finished"
                );
                LayoutResult::success(outcome.layout, elapsed, confidence, metrics)
            }
            Err(err) => {
                tracing::warn!(error = %err, "complex layout failed");
                LayoutResult::failure(err.to_string(), elapsed)
            }
        }
    }

    fn run(&self, nodes: &[Node], edges: &[Edge], diagram_type: DiagramType) -> Result<ComplexOutcome> {
        let mut layout = seed_layout(nodes, edges, &self.config);
        if layout.nodes.is_empty() {
            route_edges(&mut layout, diagram_type, &self.config);
            return Ok(ComplexOutcome {
                layout,
                report: OverlapReport {
                    resolved: true,
                    ..Default::default()
                },
                clusters: 0,
            });
        }

        let graph = LayoutGraph::new(&layout.nodes, &layout.edges);
        let clusters = label_propagation(&graph, self.config.complex.cluster_rounds);
        let cluster_count = clusters.iter().copied().max().map_or(0, |max| max + 1);
        tracing::debug!(clusters = cluster_count, "clustered graph");

        self.seed_clusters(&mut layout, &clusters, cluster_count);
        self.simulate(&mut layout, &graph, &clusters, cluster_count)?;

        let (layout, _) = self.resolver.ensure_zero_overlaps(layout, diagram_type);
        let (mut layout, report) = self.resolver.final_overlap_resolution(layout);

        swap_for_shorter_edges(&mut layout, &graph, self.config.complex.swap_passes);
        fit_to_canvas(&mut layout, &self.config);
        route_edges(&mut layout, diagram_type, &self.config);
        avoid_obstacles(&mut layout, self.config.overlap_margin);
        layout.ensure_finite()?;

        Ok(ComplexOutcome {
            layout,
            report,
            clusters: cluster_count,
        })
    }

    /// Clusters on a `ceil(sqrt(k))` grid of equal cells, members gridded
    /// inside their cell, then a seeded jitter to break symmetry.
    fn seed_clusters(&self, layout: &mut DiagramLayout, clusters: &[usize], cluster_count: usize) {
        let mut members: Vec<Vec<usize>> = vec![Vec::new(); cluster_count];
        for (idx, cluster) in clusters.iter().enumerate() {
            members[*cluster].push(idx);
        }
        let widest = layout.nodes.iter().map(|node| node.width).fold(0.0, f32::max);
        let tallest = layout.nodes.iter().map(|node| node.height).fold(0.0, f32::max);
        let step_x = widest + self.config.node_separation;
        let step_y = tallest + self.config.node_separation;

        let inner_columns: Vec<usize> = members
            .iter()
            .map(|group| ((group.len() as f32).sqrt().ceil() as usize).max(1))
            .collect();
        let inner_rows: Vec<usize> = members
            .iter()
            .zip(&inner_columns)
            .map(|(group, columns)| group.len().div_ceil(*columns).max(1))
            .collect();
        let padding = self.config.complex.cluster_padding;
        let cell_w = inner_columns.iter().copied().max().unwrap_or(1) as f32 * step_x + padding;
        let cell_h = inner_rows.iter().copied().max().unwrap_or(1) as f32 * step_y + padding;
        let outer_columns = ((cluster_count as f32).sqrt().ceil() as usize).max(1);

        for (cluster, group) in members.iter().enumerate() {
            let origin_x = (cluster % outer_columns) as f32 * cell_w;
            let origin_y = (cluster / outer_columns) as f32 * cell_h;
            for (slot, &idx) in group.iter().enumerate() {
                let col = slot % inner_columns[cluster];
                let row = slot / inner_columns[cluster];
                layout.nodes[idx].set_center(Point::new(
                    origin_x + col as f32 * step_x,
                    origin_y + row as f32 * step_y,
                ));
            }
        }

        let jitter = self.config.force.jitter;
        if jitter > 0.0 {
            let mut rng = StdRng::seed_from_u64(self.config.force.seed);
            for node in &mut layout.nodes {
                node.x += rng.gen_range(-jitter..=jitter);
                node.y += rng.gen_range(-jitter..=jitter);
            }
        }
    }

    fn simulate(
        &self,
        layout: &mut DiagramLayout,
        graph: &LayoutGraph,
        clusters: &[usize],
        cluster_count: usize,
    ) -> Result<()> {
        let force = &self.config.force;
        let n = layout.nodes.len();
        let anchor = Point::new(self.config.width / 2.0, self.config.height / 2.0);
        let mut positions: Vec<Point> = layout.nodes.iter().map(|node| node.center()).collect();
        let mut velocities = vec![Point::default(); n];

        let mut steps = 0;
        for _ in 0..force.iterations {
            steps += 1;
            let mut forces = vec![Point::default(); n];

            for i in 0..n {
                for j in (i + 1)..n {
                    let mut dx = positions[j].x - positions[i].x;
                    let mut dy = positions[j].y - positions[i].y;
                    if dx.abs() < 1e-3 && dy.abs() < 1e-3 {
                        dx = 1.0;
                        dy = 0.0;
                    }
                    let dist = (dx * dx + dy * dy).sqrt().max(1.0);
                    let magnitude = force.repulsion / (dist * dist);
                    let (fx, fy) = (dx / dist * magnitude, dy / dist * magnitude);
                    forces[i].x -= fx;
                    forces[i].y -= fy;
                    forces[j].x += fx;
                    forces[j].y += fy;
                }
            }

            for link in &graph.links {
                let dx = positions[link.to].x - positions[link.from].x;
                let dy = positions[link.to].y - positions[link.from].y;
                let dist = (dx * dx + dy * dy).sqrt().max(1e-3);
                let stretch = force.spring_strength * (dist - force.spring_length);
                let (fx, fy) = (dx / dist * stretch, dy / dist * stretch);
                forces[link.from].x += fx;
                forces[link.from].y += fy;
                forces[link.to].x -= fx;
                forces[link.to].y -= fy;
            }

            if cluster_count > 1 {
                let centroids = cluster_centroids(&positions, clusters, cluster_count);
                for (idx, cluster) in clusters.iter().enumerate() {
                    let c = centroids[*cluster];
                    forces[idx].x += (c.x - positions[idx].x) * force.cluster_strength;
                    forces[idx].y += (c.y - positions[idx].y) * force.cluster_strength;
                }
            }

            let mut max_movement = 0.0_f32;
            for idx in 0..n {
                forces[idx].x += (anchor.x - positions[idx].x) * force.gravity;
                forces[idx].y += (anchor.y - positions[idx].y) * force.gravity;

                let velocity = &mut velocities[idx];
                velocity.x = (velocity.x + forces[idx].x) * force.damping;
                velocity.y = (velocity.y + forces[idx].y) * force.damping;
                let speed = (velocity.x * velocity.x + velocity.y * velocity.y).sqrt();
                if speed > force.max_step {
                    velocity.x *= force.max_step / speed;
                    velocity.y *= force.max_step / speed;
                }
                positions[idx].x += velocity.x;
                positions[idx].y += velocity.y;
                max_movement = max_movement.max(speed.min(force.max_step));
            }

            if let Some(idx) = positions.iter().position(|p| !p.is_finite()) {
                return Err(LayoutError::NonFiniteGeometry {
                    node: layout.nodes[idx].id.clone(),
                });
            }
            if max_movement < force.min_movement {
                break;
            }
        }
        tracing::debug!(steps, "force simulation settled");

        for (node, position) in layout.nodes.iter_mut().zip(positions) {
            node.set_center(position);
        }
        Ok(())
    }
}

/// Deterministic label propagation. Nodes update in index order, adopting
/// the most common neighbour label with ties going to the smaller label.
/// Returns dense cluster ids numbered by first appearance.
fn label_propagation(graph: &LayoutGraph, rounds: usize) -> Vec<usize> {
    let n = graph.len();
    let mut labels: Vec<usize> = (0..n).collect();
    for _ in 0..rounds {
        let mut changed = false;
        for idx in 0..n {
            let mut counts: BTreeMap<usize, usize> = BTreeMap::new();
            for neighbor in graph.neighbors(idx) {
                *counts.entry(labels[neighbor]).or_default() += 1;
            }
            let Some(best) = counts
                .iter()
                .max_by(|a, b| a.1.cmp(b.1).then(b.0.cmp(a.0)))
                .map(|(label, _)| *label)
            else {
                continue;
            };
            if best != labels[idx] {
                labels[idx] = best;
                changed = true;
            }
        }
        if !changed {
            break;
        }
    }

    let mut dense: BTreeMap<usize, usize> = BTreeMap::new();
    let mut out = Vec::with_capacity(n);
    for label in labels {
        let next = dense.len();
        out.push(*dense.entry(label).or_insert(next));
    }
    out
}

fn cluster_centroids(positions: &[Point], clusters: &[usize], cluster_count: usize) -> Vec<Point> {
    let mut sums = vec![(0.0_f32, 0.0_f32, 0usize); cluster_count];
    for (position, cluster) in positions.iter().zip(clusters) {
        let entry = &mut sums[*cluster];
        entry.0 += position.x;
        entry.1 += position.y;
        entry.2 += 1;
    }
    sums.into_iter()
        .map(|(x, y, count)| {
            let count = count.max(1) as f32;
            Point::new(x / count, y / count)
        })
        .collect()
}

/// Swaps equally sized nodes when that shortens the edges touching them.
/// Equal sizes mean a swap can never create an overlap.
fn swap_for_shorter_edges(layout: &mut DiagramLayout, graph: &LayoutGraph, passes: usize) {
    let n = layout.nodes.len();
    let mut incident: Vec<Vec<(usize, usize)>> = vec![Vec::new(); n];
    for link in &graph.links {
        incident[link.from].push((link.from, link.to));
        incident[link.to].push((link.from, link.to));
    }

    let cost = |layout: &DiagramLayout, a: usize, b: usize| -> f32 {
        incident[a]
            .iter()
            .chain(incident[b].iter())
            .map(|&(from, to)| layout.nodes[from].center().distance(layout.nodes[to].center()))
            .sum()
    };

    let mut swaps = 0;
    for _ in 0..passes {
        let mut improved = false;
        for a in 0..n {
            for b in (a + 1)..n {
                if incident[a].is_empty() && incident[b].is_empty() {
                    continue;
                }
                let (na, nb) = (&layout.nodes[a], &layout.nodes[b]);
                if (na.width - nb.width).abs() > SIZE_EPS || (na.height - nb.height).abs() > SIZE_EPS {
                    continue;
                }
                let before = cost(layout, a, b);
                swap_positions(layout, a, b);
                if cost(layout, a, b) + 1e-3 < before {
                    improved = true;
                    swaps += 1;
                } else {
                    swap_positions(layout, a, b);
                }
            }
        }
        if !improved {
            break;
        }
    }
    tracing::debug!(swaps, "edge length swaps");
}

fn swap_positions(layout: &mut DiagramLayout, a: usize, b: usize) {
    let (ax, ay) = (layout.nodes[a].x, layout.nodes[a].y);
    layout.nodes[a].x = layout.nodes[b].x;
    layout.nodes[a].y = layout.nodes[b].y;
    layout.nodes[b].x = ax;
    layout.nodes[b].y = ay;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layout::types::{LayoutEdge, PositionedNode};

    fn nodes(n: usize) -> Vec<Node> {
        (0..n).map(|i| Node::new(format!("n{i}"), format!("Node {i}"))).collect()
    }

    fn tree_edges(n: usize) -> Vec<Edge> {
        (1..n).map(|i| Edge::new(format!("n{}", (i - 1) / 2), format!("n{i}"))).collect()
    }

    fn graph_of(n: usize, edges: &[(usize, usize)]) -> LayoutGraph {
        let nodes: Vec<PositionedNode> = nodes(n)
            .iter()
            .map(|node| PositionedNode::from_node(node, 10.0, 10.0))
            .collect();
        let edges: Vec<LayoutEdge> = edges
            .iter()
            .map(|(a, b)| LayoutEdge::from_edge(&Edge::new(format!("n{a}"), format!("n{b}"))))
            .collect();
        LayoutGraph::new(&nodes, &edges)
    }

    #[test]
    fn chain_collapses_into_one_cluster() {
        let graph = graph_of(5, &[(0, 1), (1, 2), (2, 3), (3, 4)]);
        assert_eq!(label_propagation(&graph, 10), vec![0; 5]);
    }

    #[test]
    fn disjoint_triangles_form_two_clusters() {
        let graph = graph_of(6, &[(0, 1), (1, 2), (2, 0), (3, 4), (4, 5), (5, 3)]);
        assert_eq!(label_propagation(&graph, 10), vec![0, 0, 0, 1, 1, 1]);
    }

    #[test]
    fn isolated_nodes_keep_their_own_cluster() {
        let graph = graph_of(3, &[]);
        assert_eq!(label_propagation(&graph, 10), vec![0, 1, 2]);
    }

    #[test]
    fn twenty_five_node_tree_is_overlap_free() {
        let config = LayoutConfig::default();
        let engine = ComplexLayoutEngine::new(&config);
        let result = engine.generate_complex_layout(&nodes(25), &tree_edges(25), DiagramType::Tree);
        assert!(result.success, "{:?}", result.error);
        assert_eq!(result.layout.nodes.len(), 25);
        assert_eq!(result.layout.overlap_count(config.overlap_margin), 0);
        assert!(result.layout.edges.iter().all(|edge| edge.points.len() >= 2));
        let metrics = result.metrics.unwrap();
        assert_eq!(metrics.path, LayoutPath::Complex);
        assert!(metrics.cluster_count.unwrap() >= 1);
        assert!(result.confidence.unwrap() > 0.0);
    }

    #[test]
    fn large_sparse_graph_finishes() {
        let config = LayoutConfig::default();
        let engine = ComplexLayoutEngine::new(&config);
        let mut edges = tree_edges(200);
        edges.push(Edge::new("n199", "n0"));
        edges.push(Edge::new("n5", "n5"));
        edges.push(Edge::new("n7", "missing"));
        let result = engine.generate_complex_layout(&nodes(200), &edges, DiagramType::Flow);
        assert!(result.success, "{:?}", result.error);
        assert_eq!(result.layout.nodes.len(), 200);
        assert_eq!(result.layout.overlap_count(config.overlap_margin), 0);
        assert!(result.layout.edges.last().unwrap().points.is_empty());
    }

    #[test]
    fn same_input_same_layout() {
        let engine = ComplexLayoutEngine::new(&LayoutConfig::default());
        let a = engine.generate_complex_layout(&nodes(30), &tree_edges(30), DiagramType::Flow);
        let b = engine.generate_complex_layout(&nodes(30), &tree_edges(30), DiagramType::Flow);
        assert_eq!(a.layout, b.layout);
        assert_eq!(a.bounds, b.bounds);
    }

    #[test]
    fn empty_input_succeeds() {
        let engine = ComplexLayoutEngine::new(&LayoutConfig::default());
        let result = engine.generate_complex_layout(&[], &[], DiagramType::Flow);
        assert!(result.success);
        assert!(result.layout.nodes.is_empty());
        assert_eq!(result.metrics.unwrap().cluster_count, Some(0));
    }

    #[test]
    fn swaps_only_shorten_edges() {
        let mut layout = DiagramLayout {
            nodes: nodes(3)
                .iter()
                .enumerate()
                .map(|(i, node)| {
                    let mut placed = PositionedNode::from_node(node, 100.0, 50.0);
                    placed.x = i as f32 * 300.0;
                    placed
                })
                .collect(),
            edges: vec![LayoutEdge::from_edge(&Edge::new("n0", "n2"))],
        };
        let graph = LayoutGraph::new(&layout.nodes, &layout.edges);
        let before = layout.nodes[0].center().distance(layout.nodes[2].center());
        swap_for_shorter_edges(&mut layout, &graph, 3);
        let after = layout.nodes[0].center().distance(layout.nodes[2].center());
        assert!(after < before);
        assert_eq!(layout.overlap_count(10.0), 0);
    }
}
