mod complex;
mod dagre;
mod error;
mod evaluate;
mod fallback;
pub mod geometry;
mod graph;
mod optimize;
mod overlap;
mod ranking;
mod routing;
mod strategy;
pub(crate) mod types;

pub use complex::ComplexLayoutEngine;
pub use dagre::DagreStrategy;
pub use error::LayoutError;
pub use evaluate::LayoutEvaluator;
pub use fallback::FallbackStrategy;
pub use geometry::{Point, Rect};
pub use optimize::OptimizationPipeline;
pub use overlap::OverlapResolver;
pub use routing::{avoid_obstacles, route_edges};
pub use strategy::LayoutStrategy;
pub use types::*;

use std::panic::{AssertUnwindSafe, catch_unwind};
use std::time::Instant;

use crate::config::{LayoutConfig, LayoutConfigPatch};
use crate::ir::{DiagramType, Edge, Graph, Node};

use error::{Result, panic_message};
use strategy::fit_to_canvas;

/// Which pipeline `generate_layout` runs.
#[derive(Debug, Clone)]
pub enum EngineMode {
    /// Fallback placement plus the final overlap pass only.
    Simple,
    Standard,
    /// Standard below the size threshold, the complex engine at or above it.
    Complex(Box<ComplexLayoutEngine>),
}

impl EngineMode {
    fn for_config(config: &LayoutConfig) -> Self {
        if config.is_simple_mode {
            EngineMode::Simple
        } else if config.enable_complex_engine {
            EngineMode::Complex(Box::new(ComplexLayoutEngine::new(config)))
        } else {
            EngineMode::Standard
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            EngineMode::Simple => "simple",
            EngineMode::Standard => "standard",
            EngineMode::Complex(_) => "complex",
        }
    }
}

/// Entry point: turns a node/edge graph into an overlap-free layout.
///
/// `generate_layout` takes `&self` and never panics, so one engine can be
/// shared across threads.
#[derive(Debug, Clone)]
pub struct LayoutEngine {
    config: LayoutConfig,
    mode: EngineMode,
    dagre: DagreStrategy,
    fallback: FallbackStrategy,
    resolver: OverlapResolver,
    pipeline: OptimizationPipeline,
    evaluator: LayoutEvaluator,
}

impl Default for LayoutEngine {
    fn default() -> Self {
        Self::new(LayoutConfig::default())
    }
}

impl LayoutEngine {
    pub fn new(config: LayoutConfig) -> Self {
        Self {
            mode: EngineMode::for_config(&config),
            dagre: DagreStrategy::new(),
            fallback: FallbackStrategy::new(),
            resolver: OverlapResolver::from_config(&config),
            pipeline: OptimizationPipeline::new(&config),
            evaluator: LayoutEvaluator::new(&config),
            config,
        }
    }

    pub fn config(&self) -> &LayoutConfig {
        &self.config
    }

    pub fn mode(&self) -> &EngineMode {
        &self.mode
    }

    /// Merges `patch` into the current config. An invalid result is rejected
    /// and the engine keeps its previous config.
    pub fn update_config(&mut self, patch: LayoutConfigPatch) -> std::result::Result<(), LayoutError> {
        let mut next = self.config.clone();
        patch.apply_to(&mut next);
        next.validate()?;

        let previous = self.mode.name();
        *self = Self::new(next);
        if previous != self.mode.name() {
            tracing::debug!(from = previous, to = self.mode.name(), "layout engine mode changed");
        }
        Ok(())
    }

    /// Convenience wrapper over [`Self::generate_layout`] for a parsed graph.
    pub fn layout_graph(&self, graph: &Graph, iteration: u32) -> LayoutResult {
        self.generate_layout(&graph.nodes, &graph.edges, graph.diagram_type, iteration)
    }

    /// Lays out the graph. Any error or panic inside the pipeline comes back
    /// as `success: false` with an empty layout.
    pub fn generate_layout(
        &self,
        nodes: &[Node],
        edges: &[Edge],
        diagram_type: DiagramType,
        iteration: u32,
    ) -> LayoutResult {
        let start = Instant::now();
        let iteration = iteration.max(1);
        tracing::debug!(
            nodes = nodes.len(),
            edges = edges.len(),
            diagram = %diagram_type,
            iteration,
            mode = self.mode.name(),
            "generating layout"
        );

        let outcome = catch_unwind(AssertUnwindSafe(|| {
            self.generate(nodes, edges, diagram_type, iteration, start)
        }))
        .unwrap_or_else(|payload| Err(LayoutError::Panicked(panic_message(payload.as_ref()))));

        let result = match outcome {
            Ok(result) => result,
            Err(err) => {
                tracing::warn!(error = %err, "layout failed");
                LayoutResult::failure(err.to_string(), elapsed_ms(start))
            }
        };

        if self.evaluator.within_budget(result.processing_time) {
            tracing::info!(
                elapsed_ms = result.processing_time,
                success = result.success,
                "layout generated"
            );
        } else {
            tracing::warn!(
                elapsed_ms = result.processing_time,
                budget_ms = self.evaluator.budget_ms(),
                "layout exceeded its time budget"
            );
        }
        self.evaluator
            .evaluate_layout_with_custom_instructions(&result, diagram_type);
        result
    }

    fn generate(
        &self,
        nodes: &[Node],
        edges: &[Edge],
        diagram_type: DiagramType,
        iteration: u32,
        start: Instant,
    ) -> Result<LayoutResult> {
        self.config.validate()?;
        match &self.mode {
            EngineMode::Simple => self.simple_layout(nodes, edges, diagram_type, iteration, start),
            EngineMode::Complex(engine) if nodes.len() >= self.config.complex_threshold => {
                let mut result = engine.generate_complex_layout(nodes, edges, diagram_type);
                result.processing_time = elapsed_ms(start);
                if result.success {
                    result.confidence = Some(self.evaluator.calculate_layout_confidence(
                        &result.layout,
                        diagram_type,
                        result.processing_time,
                    ));
                }
                if let Some(metrics) = result.metrics.as_mut() {
                    metrics.iteration = iteration;
                    metrics.within_budget = self.evaluator.within_budget(result.processing_time);
                }
                Ok(result)
            }
            EngineMode::Complex(_) | EngineMode::Standard => {
                self.standard_layout(nodes, edges, diagram_type, iteration, start)
            }
        }
    }

    fn simple_layout(
        &self,
        nodes: &[Node],
        edges: &[Edge],
        diagram_type: DiagramType,
        iteration: u32,
        start: Instant,
    ) -> Result<LayoutResult> {
        let layout = self.fallback.layout(nodes, edges, diagram_type, &self.config);
        let (layout, report) = self.resolver.final_overlap_resolution(layout);
        self.finish(
            layout,
            diagram_type,
            LayoutPath::Simple,
            StrategyKind::Fallback,
            iteration,
            report,
            start,
        )
    }

    fn standard_layout(
        &self,
        nodes: &[Node],
        edges: &[Edge],
        diagram_type: DiagramType,
        iteration: u32,
        start: Instant,
    ) -> Result<LayoutResult> {
        let (layout, initial) = self.initial_layout(nodes, edges, diagram_type);
        let (layout, first) = self.resolver.ensure_zero_overlaps(layout, diagram_type);
        tracing::debug!(remaining = first.remaining, "first overlap pass done");
        let layout = self
            .pipeline
            .apply_optimizations(layout, diagram_type, iteration);
        let (layout, report) = self.resolver.final_overlap_resolution(layout);
        self.finish(
            layout,
            diagram_type,
            LayoutPath::Standard,
            initial,
            iteration,
            report,
            start,
        )
    }

    /// Dagre when enabled and meaningful for the type, otherwise (or when
    /// dagre fails) the fallback heuristics.
    fn initial_layout(
        &self,
        nodes: &[Node],
        edges: &[Edge],
        diagram_type: DiagramType,
    ) -> (DiagramLayout, StrategyKind) {
        if self.config.use_dagre && DagreStrategy::handles(diagram_type) {
            match self.dagre.try_layout(nodes, edges, diagram_type, &self.config) {
                Ok(layout) => {
                    tracing::debug!(strategy = self.dagre.name(), "initial placement");
                    return (layout, StrategyKind::Dagre);
                }
                Err(err) => {
                    tracing::warn!(
                        error = %err,
                        fallback = self.fallback.name(),
                        "dagre layout unusable, using fallback"
                    );
                }
            }
        }
        tracing::debug!(strategy = self.fallback.name(), "initial placement");
        (
            self.fallback.layout(nodes, edges, diagram_type, &self.config),
            StrategyKind::Fallback,
        )
    }

    #[allow(clippy::too_many_arguments)]
    fn finish(
        &self,
        mut layout: DiagramLayout,
        diagram_type: DiagramType,
        path: LayoutPath,
        initial: StrategyKind,
        iteration: u32,
        report: OverlapReport,
        start: Instant,
    ) -> Result<LayoutResult> {
        fit_to_canvas(&mut layout, &self.config);
        route_edges(&mut layout, diagram_type, &self.config);
        layout.ensure_finite()?;

        let elapsed = elapsed_ms(start);
        let confidence = self
            .evaluator
            .calculate_layout_confidence(&layout, diagram_type, elapsed);
        let metrics = self
            .evaluator
            .measure(&layout, path, initial, iteration, elapsed, report);
        Ok(LayoutResult::success(layout, elapsed, confidence, metrics))
    }
}

fn elapsed_ms(start: Instant) -> f64 {
    start.elapsed().as_secs_f64() * 1000.0
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

    #[test]
    fn engine_is_shareable() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<LayoutEngine>();
    }

    #[test]
    fn empty_graph_gives_empty_layout() {
        let result = LayoutEngine::default().generate_layout(&[], &[], DiagramType::Flow, 1);
        assert!(result.success);
        assert!(result.layout.nodes.is_empty());
        assert_eq!(result.bounds, LayoutBounds::default());
    }

    #[test]
    fn single_node_lands_in_the_canvas_centre() {
        let result = LayoutEngine::default().generate_layout(&nodes(1), &[], DiagramType::Flow, 1);
        assert!(result.success);
        let c = result.layout.nodes[0].center();
        assert!((c.x - 960.0).abs() < 1e-3);
        assert!((c.y - 540.0).abs() < 1e-3);
    }

    #[test]
    fn standard_path_below_threshold() {
        let engine = LayoutEngine::default();
        let result = engine.generate_layout(&nodes(5), &chain(5), DiagramType::Flow, 3);
        assert!(result.success);
        assert_eq!(result.layout.overlap_count(engine.config().overlap_margin), 0);
        let metrics = result.metrics.unwrap();
        assert_eq!(metrics.path, LayoutPath::Standard);
        assert_eq!(metrics.iteration, 3);
        assert!(metrics.overlap_resolution.resolved);
    }

    #[test]
    fn complex_path_at_threshold() {
        let engine = LayoutEngine::default();
        let result = engine.generate_layout(&nodes(20), &chain(20), DiagramType::Flow, 2);
        assert!(result.success);
        let metrics = result.metrics.unwrap();
        assert_eq!(metrics.path, LayoutPath::Complex);
        assert_eq!(metrics.iteration, 2);
        assert!(metrics.cluster_count.is_some());
    }

    #[test]
    fn complex_confidence_matches_reported_time() {
        let engine = LayoutEngine::new(LayoutConfig {
            time_budget_ms: 1e-6,
            ..Default::default()
        });
        let result = engine.generate_layout(&nodes(24), &chain(24), DiagramType::Flow, 1);
        assert!(result.success);
        let expected = LayoutEvaluator::new(engine.config()).calculate_layout_confidence(
            &result.layout,
            DiagramType::Flow,
            result.processing_time,
        );
        assert_eq!(result.confidence, Some(expected));
        assert!(!result.metrics.unwrap().within_budget);
    }

    #[test]
    fn cycle_and_matrix_use_fallback_placement() {
        let engine = LayoutEngine::default();
        for ty in [DiagramType::Cycle, DiagramType::Matrix] {
            let result = engine.generate_layout(&nodes(6), &chain(6), ty, 1);
            assert_eq!(result.metrics.unwrap().initial_strategy, StrategyKind::Fallback);
        }
    }

    #[test]
    fn mode_follows_config_updates() {
        let mut engine = LayoutEngine::default();
        assert!(matches!(engine.mode(), EngineMode::Complex(_)));

        engine.update_config(LayoutConfigPatch::simple_mode(true)).unwrap();
        assert!(matches!(engine.mode(), EngineMode::Simple));
        let result = engine.generate_layout(&nodes(30), &chain(30), DiagramType::Tree, 4);
        assert_eq!(result.metrics.unwrap().path, LayoutPath::Simple);

        engine
            .update_config(LayoutConfigPatch {
                is_simple_mode: Some(false),
                enable_complex_engine: Some(false),
                ..Default::default()
            })
            .unwrap();
        assert!(matches!(engine.mode(), EngineMode::Standard));
        let result = engine.generate_layout(&nodes(30), &chain(30), DiagramType::Tree, 1);
        assert_eq!(result.metrics.unwrap().path, LayoutPath::Standard);
    }

    #[test]
    fn invalid_patch_is_rejected_and_config_kept() {
        let mut engine = LayoutEngine::default();
        let err = engine
            .update_config(LayoutConfigPatch {
                width: Some(-5.0),
                ..Default::default()
            })
            .unwrap_err();
        assert!(matches!(err, LayoutError::InvalidConfig(_)));
        assert_eq!(engine.config().width, 1920.0);
    }

    #[test]
    fn invalid_config_fails_without_panicking() {
        let engine = LayoutEngine::new(LayoutConfig {
            node_height: f32::NAN,
            ..Default::default()
        });
        let result = engine.generate_layout(&nodes(3), &chain(3), DiagramType::Flow, 1);
        assert!(!result.success);
        assert!(result.error.unwrap().contains("nodeHeight"));
        assert!(result.layout.nodes.is_empty());
        assert_eq!(result.bounds, LayoutBounds::default());
    }

    #[test]
    fn rank_direction_is_honoured_by_fallback_tree() {
        let engine = LayoutEngine::new(LayoutConfig {
            use_dagre: false,
            rank_direction: RankDirection::LeftRight,
            ..Default::default()
        });
        let result = engine.generate_layout(&nodes(3), &chain(3), DiagramType::Tree, 1);
        let xs: Vec<f32> = result.layout.nodes.iter().map(|n| n.x).collect();
        assert!(xs[0] < xs[1] && xs[1] < xs[2]);
    }

    #[test]
    fn iteration_zero_counts_as_one() {
        let result = LayoutEngine::default().generate_layout(&nodes(3), &chain(3), DiagramType::Flow, 0);
        assert_eq!(result.metrics.unwrap().iteration, 1);
    }
}
