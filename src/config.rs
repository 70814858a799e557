use crate::ir::RankDirection;
use crate::layout::LayoutError;
use serde::{Deserialize, Serialize};
use std::path::Path;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct FallbackConfig {
    /// Nodes per row for flow diagrams. Derived from the canvas width when unset.
    pub flow_columns: Option<usize>,
    pub cycle_radius: f32,
    pub timeline_offset: f32,
}

impl Default for FallbackConfig {
    fn default() -> Self {
        Self {
            flow_columns: None,
            cycle_radius: 300.0,
            timeline_offset: 40.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ForceConfig {
    pub iterations: usize,
    pub repulsion: f32,
    pub spring_length: f32,
    pub spring_strength: f32,
    pub cluster_strength: f32,
    pub gravity: f32,
    pub damping: f32,
    pub max_step: f32,
    pub min_movement: f32,
    pub jitter: f32,
    pub seed: u64,
}

impl Default for ForceConfig {
    fn default() -> Self {
        Self {
            iterations: 200,
            repulsion: 40_000.0,
            spring_length: 200.0,
            spring_strength: 0.04,
            cluster_strength: 0.02,
            gravity: 0.005,
            damping: 0.85,
            max_step: 40.0,
            min_movement: 0.5,
            jitter: 4.0,
            seed: 0x5eed,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ComplexConfig {
    pub cluster_rounds: usize,
    pub swap_passes: usize,
    pub cluster_padding: f32,
}

impl Default for ComplexConfig {
    fn default() -> Self {
        Self {
            cluster_rounds: 10,
            swap_passes: 3,
            cluster_padding: 80.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct LayoutConfig {
    pub width: f32,
    pub height: f32,
    pub node_width: f32,
    pub node_height: f32,
    pub max_node_width: f32,
    pub char_width: f32,
    pub label_padding: f32,
    /// Distance kept between the layout and the canvas edge.
    pub margin_x: f32,
    pub margin_y: f32,
    /// Minimum gap between any two nodes.
    pub overlap_margin: f32,
    pub rank_direction: RankDirection,
    pub node_separation: f32,
    pub edge_separation: f32,
    pub rank_separation: f32,
    pub is_simple_mode: bool,
    pub enable_complex_engine: bool,
    pub use_dagre: bool,
    pub complex_threshold: usize,
    pub time_budget_ms: f64,
    pub max_overlap_iterations: usize,
    pub final_overlap_iterations: usize,
    pub fallback: FallbackConfig,
    pub force: ForceConfig,
    pub complex: ComplexConfig,
}

impl Default for LayoutConfig {
    fn default() -> Self {
        Self {
            width: 1920.0,
            height: 1080.0,
            node_width: 120.0,
            node_height: 60.0,
            max_node_width: 240.0,
            char_width: 8.0,
            label_padding: 12.0,
            margin_x: 50.0,
            margin_y: 50.0,
            overlap_margin: 10.0,
            rank_direction: RankDirection::TopBottom,
            node_separation: 50.0,
            edge_separation: 10.0,
            rank_separation: 80.0,
            is_simple_mode: false,
            enable_complex_engine: true,
            use_dagre: true,
            complex_threshold: 20,
            time_budget_ms: 5000.0,
            max_overlap_iterations: 100,
            final_overlap_iterations: 500,
            fallback: FallbackConfig::default(),
            force: ForceConfig::default(),
            complex: ComplexConfig::default(),
        }
    }
}

impl LayoutConfig {
    pub fn simple() -> Self {
        Self {
            is_simple_mode: true,
            ..Default::default()
        }
    }

    pub fn validate(&self) -> Result<(), LayoutError> {
        let positive = [
            ("width", self.width),
            ("height", self.height),
            ("nodeWidth", self.node_width),
            ("nodeHeight", self.node_height),
        ];
        for (name, value) in positive {
            if !value.is_finite() || value <= 0.0 {
                return Err(LayoutError::InvalidConfig(format!(
                    "{name} must be a positive number, got {value}"
                )));
            }
        }
        let non_negative = [
            ("maxNodeWidth", self.max_node_width),
            ("charWidth", self.char_width),
            ("labelPadding", self.label_padding),
            ("marginX", self.margin_x),
            ("marginY", self.margin_y),
            ("overlapMargin", self.overlap_margin),
            ("nodeSeparation", self.node_separation),
            ("edgeSeparation", self.edge_separation),
            ("rankSeparation", self.rank_separation),
            ("fallback.cycleRadius", self.fallback.cycle_radius),
            ("fallback.timelineOffset", self.fallback.timeline_offset),
            ("force.repulsion", self.force.repulsion),
            ("force.springLength", self.force.spring_length),
            ("force.maxStep", self.force.max_step),
            ("complex.clusterPadding", self.complex.cluster_padding),
        ];
        for (name, value) in non_negative {
            if !value.is_finite() || value < 0.0 {
                return Err(LayoutError::InvalidConfig(format!(
                    "{name} must be a finite non-negative number, got {value}"
                )));
            }
        }
        if !(0.0..=1.0).contains(&self.force.damping) {
            return Err(LayoutError::InvalidConfig(format!(
                "force.damping must be within 0..=1, got {}",
                self.force.damping
            )));
        }
        if !self.time_budget_ms.is_finite() || self.time_budget_ms <= 0.0 {
            return Err(LayoutError::InvalidConfig(format!(
                "timeBudgetMs must be positive, got {}",
                self.time_budget_ms
            )));
        }
        Ok(())
    }

    /// Size of a node box for the given label.
    pub fn node_size(&self, label: &str) -> (f32, f32) {
        let chars = label.chars().count() as f32;
        let wanted = chars * self.char_width + self.label_padding * 2.0;
        let cap = self.max_node_width.max(self.node_width);
        (wanted.clamp(self.node_width, cap), self.node_height)
    }
}

/// Partial configuration merged by `LayoutEngine::update_config` and by
/// [`load_config`]. Absent fields keep their current value.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LayoutConfigPatch {
    pub width: Option<f32>,
    pub height: Option<f32>,
    pub node_width: Option<f32>,
    pub node_height: Option<f32>,
    pub max_node_width: Option<f32>,
    pub margin_x: Option<f32>,
    pub margin_y: Option<f32>,
    /// Sets both canvas margins.
    pub margin: Option<f32>,
    pub overlap_margin: Option<f32>,
    pub rank_direction: Option<RankDirection>,
    pub node_separation: Option<f32>,
    pub edge_separation: Option<f32>,
    pub rank_separation: Option<f32>,
    pub is_simple_mode: Option<bool>,
    pub enable_complex_engine: Option<bool>,
    pub use_dagre: Option<bool>,
    pub complex_threshold: Option<usize>,
    pub time_budget_ms: Option<f64>,
    pub max_overlap_iterations: Option<usize>,
    pub final_overlap_iterations: Option<usize>,
    pub fallback: Option<FallbackConfig>,
    pub force: Option<ForceConfig>,
    pub complex: Option<ComplexConfig>,
}

impl LayoutConfigPatch {
    pub fn apply_to(self, config: &mut LayoutConfig) {
        if let Some(v) = self.width {
            config.width = v;
        }
        if let Some(v) = self.height {
            config.height = v;
        }
        if let Some(v) = self.node_width {
            config.node_width = v;
        }
        if let Some(v) = self.node_height {
            config.node_height = v;
        }
        if let Some(v) = self.max_node_width {
            config.max_node_width = v;
        }
        if let Some(v) = self.margin {
            config.margin_x = v;
            config.margin_y = v;
        }
        if let Some(v) = self.margin_x {
            config.margin_x = v;
        }
        if let Some(v) = self.margin_y {
            config.margin_y = v;
        }
        if let Some(v) = self.overlap_margin {
            config.overlap_margin = v;
        }
        if let Some(v) = self.rank_direction {
            config.rank_direction = v;
        }
        if let Some(v) = self.node_separation {
            config.node_separation = v;
        }
        if let Some(v) = self.edge_separation {
            config.edge_separation = v;
        }
        if let Some(v) = self.rank_separation {
            config.rank_separation = v;
        }
        if let Some(v) = self.is_simple_mode {
            config.is_simple_mode = v;
        }
        if let Some(v) = self.enable_complex_engine {
            config.enable_complex_engine = v;
        }
        if let Some(v) = self.use_dagre {
            config.use_dagre = v;
        }
        if let Some(v) = self.complex_threshold {
            config.complex_threshold = v;
        }
        if let Some(v) = self.time_budget_ms {
            config.time_budget_ms = v;
        }
        if let Some(v) = self.max_overlap_iterations {
            config.max_overlap_iterations = v;
        }
        if let Some(v) = self.final_overlap_iterations {
            config.final_overlap_iterations = v;
        }
        if let Some(v) = self.fallback {
            config.fallback = v;
        }
        if let Some(v) = self.force {
            config.force = v;
        }
        if let Some(v) = self.complex {
            config.complex = v;
        }
    }

    pub fn simple_mode(enabled: bool) -> Self {
        Self {
            is_simple_mode: Some(enabled),
            ..Default::default()
        }
    }
}

pub fn parse_config_patch(contents: &str) -> anyhow::Result<LayoutConfigPatch> {
    match serde_json::from_str::<LayoutConfigPatch>(contents) {
        Ok(patch) => Ok(patch),
        Err(json_err) => json5::from_str::<LayoutConfigPatch>(contents)
            .map_err(|_| anyhow::anyhow!("invalid layout config: {json_err}")),
    }
}

pub fn load_config(path: Option<&Path>) -> anyhow::Result<LayoutConfig> {
    let mut config = LayoutConfig::default();
    let Some(path) = path else {
        return Ok(config);
    };

    let contents = std::fs::read_to_string(path)?;
    let patch = parse_config_patch(&contents)?;
    patch.apply_to(&mut config);
    config.validate()?;
    Ok(config)
}
