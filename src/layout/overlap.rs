use crate::config::LayoutConfig;
use crate::ir::DiagramType;

use super::types::{DiagramLayout, OverlapReport};

/// Extra distance added to every displacement so separated boxes do not sit
/// exactly on the margin boundary.
const NUDGE: f32 = 0.5;
/// Centre distance below which two nodes count as coincident.
const COINCIDENT_EPS: f32 = 1e-3;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Axis {
    X,
    Y,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum AxisPreference {
    LeastOverlap,
    Horizontal,
}

/// Separates nodes until no two margin-padded boxes intersect.
///
/// Only node positions change; edge paths are left for the caller to
/// re-route.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OverlapResolver {
    margin: f32,
    max_iterations: usize,
    final_iterations: usize,
}

impl OverlapResolver {
    pub fn new(margin: f32, max_iterations: usize, final_iterations: usize) -> Self {
        Self {
            margin,
            max_iterations,
            final_iterations,
        }
    }

    pub fn from_config(config: &LayoutConfig) -> Self {
        Self::new(
            config.overlap_margin,
            config.max_overlap_iterations,
            config.final_overlap_iterations,
        )
    }

    /// Tolerant first pass. Timeline and tree layouts are only pushed
    /// sideways so rows and ranks stay intact; may stop at the iteration cap
    /// with overlaps left for [`Self::final_overlap_resolution`].
    pub fn ensure_zero_overlaps(
        &self,
        mut layout: DiagramLayout,
        diagram_type: DiagramType,
    ) -> (DiagramLayout, OverlapReport) {
        let preference = match diagram_type {
            DiagramType::Timeline | DiagramType::Tree => AxisPreference::Horizontal,
            _ => AxisPreference::LeastOverlap,
        };
        let iterations = self.relax(&mut layout, preference, self.max_iterations);
        let report = self.report(&layout, iterations);
        tracing::debug!(
            iterations,
            remaining = report.remaining,
            "overlap pass finished"
        );
        (layout, report)
    }

    /// Last pass before output. Relaxes first, then sweeps whatever is left,
    /// which always establishes the invariant for finite coordinates.
    pub fn final_overlap_resolution(&self, mut layout: DiagramLayout) -> (DiagramLayout, OverlapReport) {
        let mut iterations = self.relax(&mut layout, AxisPreference::LeastOverlap, self.final_iterations);
        if layout.overlap_count(self.margin) > 0 {
            tracing::debug!(iterations, "relaxation hit its cap, sweeping remaining overlaps");
            iterations += self.sweep(&mut layout);
        }
        let report = self.report(&layout, iterations);
        if !report.resolved {
            tracing::warn!(
                remaining = report.remaining,
                "overlap resolution is best effort: layout has non-finite geometry"
            );
        }
        (layout, report)
    }

    fn report(&self, layout: &DiagramLayout, iterations: usize) -> OverlapReport {
        let finite = layout.nodes.iter().all(|node| node.is_finite());
        let remaining = layout.overlap_count(self.margin);
        OverlapReport {
            resolved: finite && remaining == 0,
            iterations,
            remaining,
        }
    }

    /// Pairwise displacement passes. Returns the number of passes run.
    fn relax(&self, layout: &mut DiagramLayout, preference: AxisPreference, cap: usize) -> usize {
        let n = layout.nodes.len();
        if n < 2 {
            return 0;
        }
        for pass in 0..cap {
            let mut moved = false;
            for i in 0..n {
                for j in (i + 1)..n {
                    let a = layout.nodes[i].rect();
                    let b = layout.nodes[j].rect();
                    let (overlap_x, overlap_y) = a.padded_overlap(&b, self.margin);
                    if !(overlap_x > 0.0 && overlap_y > 0.0) {
                        continue;
                    }
                    let ca = a.center();
                    let cb = b.center();
                    let dx = cb.x - ca.x;
                    let dy = cb.y - ca.y;
                    let coincident = dx.abs() < COINCIDENT_EPS && dy.abs() < COINCIDENT_EPS;
                    let axis = if coincident || preference == AxisPreference::Horizontal {
                        Axis::X
                    } else if overlap_x <= overlap_y {
                        Axis::X
                    } else {
                        Axis::Y
                    };
                    let node = &mut layout.nodes[j];
                    match axis {
                        Axis::X => {
                            let sign = if dx >= 0.0 { 1.0 } else { -1.0 };
                            node.x += sign * (overlap_x + NUDGE);
                        }
                        Axis::Y => {
                            let sign = if dy >= 0.0 { 1.0 } else { -1.0 };
                            node.y += sign * (overlap_y + NUDGE);
                        }
                    }
                    moved = true;
                }
            }
            if !moved {
                return pass;
            }
        }
        cap
    }

    /// Left-to-right sweep: each node, in `(x, y, index)` order, is pushed
    /// right past every already placed node it still overlaps. Placed nodes
    /// never move again, so this terminates after at most `n²` pushes.
    fn sweep(&self, layout: &mut DiagramLayout) -> usize {
        let n = layout.nodes.len();
        let mut order: Vec<usize> = (0..n).collect();
        order.sort_by(|&a, &b| {
            let na = &layout.nodes[a];
            let nb = &layout.nodes[b];
            na.x.total_cmp(&nb.x)
                .then(na.y.total_cmp(&nb.y))
                .then(a.cmp(&b))
        });

        let mut pushes = 0;
        let mut placed: Vec<usize> = Vec::with_capacity(n);
        for idx in order {
            for _ in 0..=placed.len() {
                let rect = layout.nodes[idx].rect();
                let blocking_right = placed
                    .iter()
                    .map(|&other| layout.nodes[other].rect())
                    .filter(|other| other.overlaps_with_margin(&rect, self.margin))
                    .map(|other| other.right())
                    .reduce(f32::max);
                let Some(right) = blocking_right else {
                    break;
                };
                layout.nodes[idx].x = right + self.margin + NUDGE;
                pushes += 1;
            }
            placed.push(idx);
        }
        pushes
    }
}
