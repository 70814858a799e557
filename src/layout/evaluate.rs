use crate::config::LayoutConfig;
use crate::ir::DiagramType;

use super::graph::LayoutGraph;
use super::optimize::edge_crossings;
use super::types::{DiagramLayout, LayoutMetrics, LayoutPath, LayoutResult, OverlapReport, StrategyKind};

const OVERLAP_WEIGHT: f32 = 0.4;
const TIME_WEIGHT: f32 = 0.2;
const CONNECTIVITY_WEIGHT: f32 = 0.25;
const EDGE_WEIGHT: f32 = 0.15;

/// Observational scoring of a finished layout. Nothing here changes
/// geometry.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LayoutEvaluator {
    budget_ms: f64,
    margin: f32,
}

impl LayoutEvaluator {
    pub fn new(config: &LayoutConfig) -> Self {
        Self {
            budget_ms: config.time_budget_ms,
            margin: config.overlap_margin,
        }
    }

    pub fn budget_ms(&self) -> f64 {
        self.budget_ms
    }

    pub fn within_budget(&self, processing_ms: f64) -> bool {
        processing_ms <= self.budget_ms
    }

    /// Weighted score in `[0, 1]` from overlap freedom, time against the
    /// budget, node connectivity and the share of routed edges.
    pub fn calculate_layout_confidence(
        &self,
        layout: &DiagramLayout,
        diagram_type: DiagramType,
        processing_ms: f64,
    ) -> f32 {
        let n = layout.nodes.len();

        let pairs = n * n.saturating_sub(1) / 2;
        let overlap = if pairs == 0 {
            1.0
        } else {
            1.0 - layout.overlap_count(self.margin) as f32 / pairs as f32
        };

        let time = if processing_ms <= self.budget_ms || processing_ms <= 0.0 {
            1.0
        } else {
            (self.budget_ms / processing_ms) as f32
        };

        let connectivity = if n < 2 || !diagram_type.expects_connectivity() {
            1.0
        } else {
            let graph = LayoutGraph::new(&layout.nodes, &layout.edges);
            let isolated = (0..n).filter(|&idx| graph.is_isolated(idx)).count();
            1.0 - isolated as f32 / n as f32
        };

        let edges = if layout.edges.is_empty() {
            1.0
        } else {
            let routed = layout.edges.iter().filter(|edge| edge.points.len() >= 2).count();
            routed as f32 / layout.edges.len() as f32
        };

        let score = OVERLAP_WEIGHT * overlap
            + TIME_WEIGHT * time
            + CONNECTIVITY_WEIGHT * connectivity
            + EDGE_WEIGHT * edges;
        if score.is_finite() { score.clamp(0.0, 1.0) } else { 0.0 }
    }

    pub fn measure(
        &self,
        layout: &DiagramLayout,
        path: LayoutPath,
        initial_strategy: StrategyKind,
        iteration: u32,
        processing_ms: f64,
        overlap_resolution: OverlapReport,
    ) -> LayoutMetrics {
        LayoutMetrics {
            path,
            initial_strategy,
            iteration,
            overlap_count: layout.overlap_count(self.margin),
            edge_crossings: edge_crossings(layout),
            total_edge_length: layout.total_edge_length(),
            within_budget: self.within_budget(processing_ms),
            overlap_resolution,
            cluster_count: None,
        }
    }

    /// Human-readable findings about a result, one per line.
    pub fn evaluation_notes(&self, result: &LayoutResult, diagram_type: DiagramType) -> Vec<String> {
        let mut notes = Vec::new();
        if !result.success {
            notes.push(format!(
                "layout failed: {}",
                result.error.as_deref().unwrap_or("unknown error")
            ));
            return notes;
        }

        if self.within_budget(result.processing_time) {
            notes.push(format!(
                "processed in {:.1}ms within the {:.0}ms budget",
                result.processing_time, self.budget_ms
            ));
        } else {
            notes.push(format!(
                "processing took {:.1}ms, over the {:.0}ms budget",
                result.processing_time, self.budget_ms
            ));
        }

        let layout = &result.layout;
        let overlaps = layout.overlap_count(self.margin);
        if overlaps > 0 {
            notes.push(format!("{overlaps} overlapping node pairs remain"));
        }

        let n = layout.nodes.len();
        let graph = LayoutGraph::new(&layout.nodes, &layout.edges);
        let edge_count = graph.links.len();
        match diagram_type {
            DiagramType::Tree if n > 0 && edge_count != n - 1 => {
                notes.push(format!("tree with {n} nodes has {edge_count} edges, expected {}", n - 1));
            }
            DiagramType::Cycle if n > 1 && edge_count < n => {
                notes.push(format!("cycle with {n} nodes has only {edge_count} edges"));
            }
            _ => {}
        }

        if diagram_type.expects_connectivity() && n > 1 {
            let isolated = (0..n).filter(|&idx| graph.is_isolated(idx)).count();
            if isolated > 0 {
                notes.push(format!("{isolated} of {n} nodes have no edges"));
            }
        }

        let dangling = layout.edges.iter().filter(|edge| edge.points.is_empty()).count();
        if dangling > 0 {
            notes.push(format!("{dangling} edges reference missing nodes"));
        }

        if let Some(confidence) = result.confidence {
            notes.push(format!("confidence {confidence:.2}"));
        }
        notes
    }

    /// Logs the findings for a result.
    pub fn evaluate_layout_with_custom_instructions(&self, result: &LayoutResult, diagram_type: DiagramType) {
        let within_budget = self.within_budget(result.processing_time);
        for note in self.evaluation_notes(result, diagram_type) {
            if result.success && within_budget {
                tracing::info!(diagram = %diagram_type, "{note}");
            } else {
                tracing::warn!(diagram = %diagram_type, "{note}");
            }
        }
    }
}
