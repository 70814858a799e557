use serde::{Deserialize, Serialize};

use super::error::{LayoutError, Result};
use super::geometry::{Point, Rect, bounding_rect, polyline_length};
use crate::ir::{Edge, Node};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PositionedNode {
    pub id: String,
    pub label: String,
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payload: Option<serde_json::Value>,
}

impl PositionedNode {
    pub fn from_node(node: &Node, width: f32, height: f32) -> Self {
        Self {
            id: node.id.clone(),
            label: node.label.clone(),
            x: 0.0,
            y: 0.0,
            width,
            height,
            payload: node.payload.clone(),
        }
    }

    pub fn rect(&self) -> Rect {
        Rect::new(self.x, self.y, self.width, self.height)
    }

    pub fn center(&self) -> Point {
        self.rect().center()
    }

    pub fn set_center(&mut self, center: Point) {
        self.x = center.x - self.width / 2.0;
        self.y = center.y - self.height / 2.0;
    }

    pub fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite() && self.width.is_finite() && self.height.is_finite()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LayoutEdge {
    pub from: String,
    pub to: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    /// Empty when either endpoint is missing from the layout.
    pub points: Vec<Point>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payload: Option<serde_json::Value>,
}

impl LayoutEdge {
    pub fn from_edge(edge: &Edge) -> Self {
        Self {
            from: edge.from.clone(),
            to: edge.to.clone(),
            label: edge.label.clone(),
            points: Vec::new(),
            payload: edge.payload.clone(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DiagramLayout {
    pub nodes: Vec<PositionedNode>,
    pub edges: Vec<LayoutEdge>,
}

impl DiagramLayout {
    pub fn bounding_rect(&self) -> Option<Rect> {
        bounding_rect(self.nodes.iter().map(PositionedNode::rect))
    }

    pub fn translate(&mut self, dx: f32, dy: f32) {
        if dx == 0.0 && dy == 0.0 {
            return;
        }
        for node in &mut self.nodes {
            node.x += dx;
            node.y += dy;
        }
        for edge in &mut self.edges {
            for point in &mut edge.points {
                point.x += dx;
                point.y += dy;
            }
        }
    }

    /// Node pairs whose margin-padded boxes intersect.
    pub fn overlapping_pairs(&self, margin: f32) -> Vec<(usize, usize)> {
        let mut pairs = Vec::new();
        for i in 0..self.nodes.len() {
            let a = self.nodes[i].rect();
            for j in (i + 1)..self.nodes.len() {
                if a.overlaps_with_margin(&self.nodes[j].rect(), margin) {
                    pairs.push((i, j));
                }
            }
        }
        pairs
    }

    pub fn overlap_count(&self, margin: f32) -> usize {
        self.overlapping_pairs(margin).len()
    }

    /// Sum of all routed edge path lengths.
    pub fn total_edge_length(&self) -> f32 {
        self.edges.iter().map(|edge| polyline_length(&edge.points)).sum()
    }

    pub fn ensure_finite(&self) -> Result<()> {
        for node in &self.nodes {
            if !node.is_finite() {
                return Err(LayoutError::NonFiniteGeometry {
                    node: node.id.clone(),
                });
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LayoutBounds {
    pub width: f32,
    pub height: f32,
    pub min_x: f32,
    pub min_y: f32,
    pub max_x: f32,
    pub max_y: f32,
}

impl LayoutBounds {
    pub fn from_nodes(nodes: &[PositionedNode]) -> Self {
        let Some(rect) = bounding_rect(nodes.iter().map(PositionedNode::rect)) else {
            return Self::default();
        };
        Self {
            width: rect.width,
            height: rect.height,
            min_x: rect.x,
            min_y: rect.y,
            max_x: rect.right(),
            max_y: rect.bottom(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LayoutPath {
    Simple,
    Standard,
    Complex,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StrategyKind {
    Dagre,
    Fallback,
    Force,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OverlapReport {
    /// False only when the invariant could not be established.
    pub resolved: bool,
    pub iterations: usize,
    pub remaining: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LayoutMetrics {
    pub path: LayoutPath,
    pub initial_strategy: StrategyKind,
    pub iteration: u32,
    pub overlap_count: usize,
    pub edge_crossings: usize,
    pub total_edge_length: f32,
    pub within_budget: bool,
    pub overlap_resolution: OverlapReport,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cluster_count: Option<usize>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LayoutResult {
    pub layout: DiagramLayout,
    pub bounds: LayoutBounds,
    pub processing_time: f64,
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub confidence: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metrics: Option<LayoutMetrics>,
}

impl LayoutResult {
    pub fn success(
        layout: DiagramLayout,
        processing_time: f64,
        confidence: f32,
        metrics: LayoutMetrics,
    ) -> Self {
        Self {
            bounds: LayoutBounds::from_nodes(&layout.nodes),
            layout,
            processing_time,
            success: true,
            confidence: Some(confidence),
            error: None,
            metrics: Some(metrics),
        }
    }

    pub fn failure(message: impl Into<String>, processing_time: f64) -> Self {
        Self {
            layout: DiagramLayout::default(),
            bounds: LayoutBounds::default(),
            processing_time,
            success: false,
            confidence: None,
            error: Some(message.into()),
            metrics: None,
        }
    }
}
