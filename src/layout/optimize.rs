//! Iteration-driven refinements applied after the initial placement.
//!
//! Each step works on bands: groups of nodes whose padded cross-axis extents
//! overlap. A step runs on a copy and is kept only when it adds neither a
//! padded overlap nor an edge crossing, so a higher iteration never scores
//! worse than a lower one.

use std::f32::consts::PI;

use crate::config::LayoutConfig;
use crate::ir::DiagramType;

use super::fallback::cycle_radius;
use super::geometry::{Point, count_crossings};
use super::graph::LayoutGraph;
use super::ranking::compute_ranks;
use super::routing::route_edges;
use super::types::{DiagramLayout, PositionedNode};

/// Displacements below this are treated as already optimal.
const TOLERANCE: f32 = 0.5;
/// Iterations past this level add nothing.
const MAX_LEVEL: u32 = 4;

#[derive(Debug, Clone)]
pub struct OptimizationPipeline {
    config: LayoutConfig,
}

impl OptimizationPipeline {
    pub fn new(config: &LayoutConfig) -> Self {
        Self {
            config: config.clone(),
        }
    }

    /// Applies every refinement enabled at `iteration`. Iteration 1 (or 0)
    /// returns the layout untouched.
    pub fn apply_optimizations(
        &self,
        layout: DiagramLayout,
        diagram_type: DiagramType,
        iteration: u32,
    ) -> DiagramLayout {
        let level = iteration.min(MAX_LEVEL);
        if level < 2 || layout.nodes.len() < 2 {
            return layout;
        }
        if !layout.nodes.iter().all(PositionedNode::is_finite) {
            tracing::debug!("skipping optimisation of non-finite layout");
            return layout;
        }

        let rows = bands_are_rows(diagram_type, &self.config);
        let mut current = layout;
        let mut changed = false;

        let spaced = self.normalize_spacing(&current, rows);
        changed |= self.keep_if_safe(&mut current, spaced, "spacing");

        if level >= 3 {
            let reordered = self.reduce_crossings(&current, rows);
            changed |= self.keep_if_safe(&mut current, reordered, "crossings");
        }

        if level >= 4 {
            let balanced = match diagram_type {
                DiagramType::Tree => self.center_parents(&current, rows),
                DiagramType::Cycle => self.respace_ring(&current),
                _ => None,
            };
            changed |= self.keep_if_safe(&mut current, balanced, "symmetry");
        }

        if changed {
            route_edges(&mut current, diagram_type, &self.config);
        }
        current
    }

    fn gap(&self) -> f32 {
        self.config
            .node_separation
            .max(self.config.overlap_margin + 1.0)
    }

    fn keep_if_safe(&self, current: &mut DiagramLayout, candidate: Option<DiagramLayout>, step: &str) -> bool {
        let Some(candidate) = candidate else {
            return false;
        };
        let margin = self.config.overlap_margin;
        if candidate.overlap_count(margin) > current.overlap_count(margin) {
            tracing::debug!(step, "refinement rejected: it would add overlaps");
            return false;
        }
        let before = edge_crossings(current);
        let after = edge_crossings(&candidate);
        if after > before {
            tracing::debug!(step, before, after, "refinement rejected: it would add crossings");
            return false;
        }
        tracing::debug!(step, "refinement applied");
        *current = candidate;
        true
    }

    /// Equalises the gaps between neighbours in each band to the band's mean
    /// gap, never below the minimum gap, then re-centres the band on its old
    /// midpoint.
    fn normalize_spacing(&self, layout: &DiagramLayout, rows: bool) -> Option<DiagramLayout> {
        let min_gap = self.gap();
        let mut out = layout.clone();
        let mut moved = false;
        for band in bands(&out, rows, self.config.overlap_margin) {
            if band.len() < 2 {
                continue;
            }
            let gaps: Vec<f32> = band
                .windows(2)
                .map(|pair| {
                    let prev = &out.nodes[pair[0]];
                    main_start(&out.nodes[pair[1]], rows) - (main_start(prev, rows) + main_size(prev, rows))
                })
                .collect();
            let target = (gaps.iter().sum::<f32>() / gaps.len() as f32).max(min_gap);
            if gaps.iter().all(|gap| (gap - target).abs() <= TOLERANCE) {
                continue;
            }

            let before = band_span(&out, &band, rows);
            let mut cursor = before.0;
            for &idx in &band {
                let node = &mut out.nodes[idx];
                let delta = cursor - main_start(node, rows);
                shift_main(node, rows, delta);
                cursor += main_size(node, rows) + target;
            }
            recentre(&mut out, &band, rows, before);
            moved = true;
        }
        moved.then_some(out)
    }

    /// One barycentre sweep in each direction; the better result is kept
    /// only if it strictly lowers the crossing count.
    fn reduce_crossings(&self, layout: &DiagramLayout, rows: bool) -> Option<DiagramLayout> {
        let graph = LayoutGraph::new(&layout.nodes, &layout.edges);
        let before = edge_crossings_in(layout, &graph);
        if before == 0 {
            return None;
        }
        let bands = bands(layout, rows, self.config.overlap_margin);
        let mut band_of = vec![0usize; layout.nodes.len()];
        for (band_idx, band) in bands.iter().enumerate() {
            for &idx in band {
                band_of[idx] = band_idx;
            }
        }

        let mut best: Option<(usize, DiagramLayout)> = None;
        for reverse in [false, true] {
            let candidate = self.barycentre_sweep(layout, &graph, &bands, &band_of, rows, reverse);
            let crossings = edge_crossings_in(&candidate, &graph);
            if crossings < before && best.as_ref().is_none_or(|(best_crossings, _)| crossings < *best_crossings) {
                best = Some((crossings, candidate));
            }
        }
        let (after, layout) = best?;
        tracing::debug!(before, after, "crossings reduced");
        Some(layout)
    }

    fn barycentre_sweep(
        &self,
        layout: &DiagramLayout,
        graph: &LayoutGraph,
        bands: &[Vec<usize>],
        band_of: &[usize],
        rows: bool,
        reverse: bool,
    ) -> DiagramLayout {
        let gap = self.gap();
        let mut out = layout.clone();
        let order: Vec<usize> = if reverse {
            (0..bands.len()).rev().collect()
        } else {
            (0..bands.len()).collect()
        };
        for band_idx in order {
            let band = &bands[band_idx];
            if band.len() < 2 {
                continue;
            }
            let mut keyed: Vec<(f32, usize, usize)> = band
                .iter()
                .enumerate()
                .map(|(pos, &idx)| {
                    let positions: Vec<f32> = graph
                        .neighbors(idx)
                        .filter(|&other| band_of[other] != band_idx)
                        .map(|other| main_center(&out.nodes[other], rows))
                        .collect();
                    let bary = if positions.is_empty() {
                        main_center(&out.nodes[idx], rows)
                    } else {
                        positions.iter().sum::<f32>() / positions.len() as f32
                    };
                    (bary, pos, idx)
                })
                .collect();
            keyed.sort_by(|a, b| a.0.total_cmp(&b.0).then(a.1.cmp(&b.1)));
            let reordered: Vec<usize> = keyed.into_iter().map(|(_, _, idx)| idx).collect();
            if reordered == *band {
                continue;
            }
            let before = band_span(&out, band, rows);
            let mut cursor = before.0;
            for &idx in &reordered {
                let node = &mut out.nodes[idx];
                let delta = cursor - main_start(node, rows);
                shift_main(node, rows, delta);
                cursor += main_size(node, rows) + gap;
            }
            recentre(&mut out, &reordered, rows, before);
        }
        out
    }

    /// Moves each parent toward the mean of its children, deepest ranks
    /// first, without closing the gap to its band neighbours.
    fn center_parents(&self, layout: &DiagramLayout, rows: bool) -> Option<DiagramLayout> {
        let gap = self.gap();
        let graph = LayoutGraph::new(&layout.nodes, &layout.edges);
        let ranks = compute_ranks(&graph);
        let bands = bands(layout, rows, self.config.overlap_margin);
        let mut slot = vec![(0usize, 0usize); layout.nodes.len()];
        for (band_idx, band) in bands.iter().enumerate() {
            for (pos, &idx) in band.iter().enumerate() {
                slot[idx] = (band_idx, pos);
            }
        }

        let mut order: Vec<usize> = (0..layout.nodes.len()).collect();
        order.sort_by(|&a, &b| ranks[b].cmp(&ranks[a]).then(a.cmp(&b)));

        let mut out = layout.clone();
        let mut moved = false;
        for idx in order {
            let (band_idx, pos) = slot[idx];
            let children: Vec<f32> = graph.outgoing[idx]
                .iter()
                .filter(|&&child| slot[child].0 != band_idx)
                .map(|&child| main_center(&out.nodes[child], rows))
                .collect();
            if children.is_empty() {
                continue;
            }
            let target = children.iter().sum::<f32>() / children.len() as f32;
            let node = &out.nodes[idx];
            let start = main_start(node, rows);
            let end = start + main_size(node, rows);
            let band = &bands[band_idx];
            let lower = match pos.checked_sub(1).map(|p| band[p]) {
                Some(prev) => {
                    let prev = &out.nodes[prev];
                    (main_start(prev, rows) + main_size(prev, rows) + gap - start).min(0.0)
                }
                None => f32::NEG_INFINITY,
            };
            let upper = match band.get(pos + 1) {
                Some(&next) => (main_start(&out.nodes[next], rows) - gap - end).max(0.0),
                None => f32::INFINITY,
            };
            let delta = (target - main_center(node, rows)).clamp(lower, upper);
            if delta.abs() < TOLERANCE {
                continue;
            }
            shift_main(&mut out.nodes[idx], rows, delta);
            moved = true;
        }
        moved.then_some(out)
    }

    /// Evenly spaced ring around the current centroid, keeping the angular
    /// order and the first node's angle.
    fn respace_ring(&self, layout: &DiagramLayout) -> Option<DiagramLayout> {
        let n = layout.nodes.len();
        let centers: Vec<Point> = layout.nodes.iter().map(PositionedNode::center).collect();
        let centroid = Point::new(
            centers.iter().map(|c| c.x).sum::<f32>() / n as f32,
            centers.iter().map(|c| c.y).sum::<f32>() / n as f32,
        );
        let angle_of = |c: &Point| (c.y - centroid.y).atan2(c.x - centroid.x);
        let mut order: Vec<usize> = (0..n).collect();
        order.sort_by(|&a, &b| angle_of(&centers[a]).total_cmp(&angle_of(&centers[b])).then(a.cmp(&b)));

        let largest = layout
            .nodes
            .iter()
            .map(|node| node.width.max(node.height))
            .fold(0.0, f32::max);
        let mean_radius = centers.iter().map(|c| c.distance(centroid)).sum::<f32>() / n as f32;
        let radius = mean_radius.max(cycle_radius(n, largest, &self.config));
        let start = angle_of(&centers[order[0]]);

        let mut out = layout.clone();
        let mut max_move = 0.0_f32;
        for (k, &idx) in order.iter().enumerate() {
            let angle = start + 2.0 * PI * k as f32 / n as f32;
            let target = Point::new(centroid.x + radius * angle.cos(), centroid.y + radius * angle.sin());
            max_move = max_move.max(target.distance(centers[idx]));
            out.nodes[idx].set_center(target);
        }
        (max_move >= TOLERANCE).then_some(out)
    }
}

/// Number of crossing pairs among straight centre-to-centre edge segments.
pub(crate) fn edge_crossings(layout: &DiagramLayout) -> usize {
    let graph = LayoutGraph::new(&layout.nodes, &layout.edges);
    edge_crossings_in(layout, &graph)
}

fn edge_crossings_in(layout: &DiagramLayout, graph: &LayoutGraph) -> usize {
    let segments: Vec<(usize, usize, Point, Point)> = graph
        .links
        .iter()
        .map(|link| {
            (
                link.from,
                link.to,
                layout.nodes[link.from].center(),
                layout.nodes[link.to].center(),
            )
        })
        .collect();
    count_crossings(&segments)
}

fn bands_are_rows(diagram_type: DiagramType, config: &LayoutConfig) -> bool {
    match diagram_type {
        DiagramType::Flow | DiagramType::Tree => config.rank_direction.is_vertical(),
        DiagramType::Timeline | DiagramType::Cycle | DiagramType::Matrix => true,
    }
}

/// Bands ordered along the cross axis; members ordered along the main axis.
fn bands(layout: &DiagramLayout, rows: bool, margin: f32) -> Vec<Vec<usize>> {
    let mut order: Vec<usize> = (0..layout.nodes.len()).collect();
    order.sort_by(|&a, &b| {
        cross_start(&layout.nodes[a], rows)
            .total_cmp(&cross_start(&layout.nodes[b], rows))
            .then(a.cmp(&b))
    });

    let mut bands: Vec<Vec<usize>> = Vec::new();
    let mut band_end = f32::NEG_INFINITY;
    for idx in order {
        let node = &layout.nodes[idx];
        let start = cross_start(node, rows);
        let end = start + cross_size(node, rows);
        match bands.last_mut() {
            Some(band) if start < band_end + margin => {
                band.push(idx);
                band_end = band_end.max(end);
            }
            _ => {
                bands.push(vec![idx]);
                band_end = end;
            }
        }
    }
    for band in &mut bands {
        band.sort_by(|&a, &b| {
            main_start(&layout.nodes[a], rows)
                .total_cmp(&main_start(&layout.nodes[b], rows))
                .then(a.cmp(&b))
        });
    }
    bands
}

fn band_span(layout: &DiagramLayout, band: &[usize], rows: bool) -> (f32, f32) {
    band.iter().fold((f32::INFINITY, f32::NEG_INFINITY), |(lo, hi), &idx| {
        let node = &layout.nodes[idx];
        let start = main_start(node, rows);
        (lo.min(start), hi.max(start + main_size(node, rows)))
    })
}

fn recentre(layout: &mut DiagramLayout, band: &[usize], rows: bool, before: (f32, f32)) {
    let after = band_span(layout, band, rows);
    let delta = (before.0 + before.1) / 2.0 - (after.0 + after.1) / 2.0;
    for &idx in band {
        shift_main(&mut layout.nodes[idx], rows, delta);
    }
}

fn main_start(node: &PositionedNode, rows: bool) -> f32 {
    if rows { node.x } else { node.y }
}

fn main_size(node: &PositionedNode, rows: bool) -> f32 {
    if rows { node.width } else { node.height }
}

fn main_center(node: &PositionedNode, rows: bool) -> f32 {
    main_start(node, rows) + main_size(node, rows) / 2.0
}

fn cross_start(node: &PositionedNode, rows: bool) -> f32 {
    if rows { node.y } else { node.x }
}

fn cross_size(node: &PositionedNode, rows: bool) -> f32 {
    if rows { node.height } else { node.width }
}

fn shift_main(node: &mut PositionedNode, rows: bool, delta: f32) {
    if rows {
        node.x += delta;
    } else {
        node.y += delta;
    }
}
