use serde::{Deserialize, Serialize};

/// Rank direction handed to the layered layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum RankDirection {
    #[default]
    #[serde(rename = "TB", alias = "TD")]
    TopBottom,
    #[serde(rename = "BT")]
    BottomTop,
    #[serde(rename = "LR")]
    LeftRight,
    #[serde(rename = "RL")]
    RightLeft,
}

impl RankDirection {
    /// Ranks stacked vertically, i.e. each rank is a row.
    pub fn is_vertical(self) -> bool {
        matches!(self, Self::TopBottom | Self::BottomTop)
    }
}

/// Layout family selected by the content analyzer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum DiagramType {
    #[default]
    Flow,
    Tree,
    Timeline,
    Cycle,
    Matrix,
}

impl DiagramType {
    /// Parses an analyzer tag. Unknown tags fall back to [`DiagramType::Flow`].
    pub fn from_token(token: &str) -> Self {
        match token.trim().to_ascii_lowercase().as_str() {
            "flow" | "flowchart" | "process" => Self::Flow,
            "tree" | "hierarchy" | "org" | "mindmap" => Self::Tree,
            "timeline" | "sequence" | "history" => Self::Timeline,
            "cycle" | "circular" | "loop" => Self::Cycle,
            "matrix" | "grid" | "table" => Self::Matrix,
            _ => Self::Flow,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Flow => "flow",
            Self::Tree => "tree",
            Self::Timeline => "timeline",
            Self::Cycle => "cycle",
            Self::Matrix => "matrix",
        }
    }

    /// Types whose readability depends on every node being connected.
    pub fn expects_connectivity(self) -> bool {
        !matches!(self, Self::Matrix)
    }
}

impl From<String> for DiagramType {
    fn from(value: String) -> Self {
        Self::from_token(&value)
    }
}

impl From<DiagramType> for String {
    fn from(value: DiagramType) -> Self {
        value.as_str().to_string()
    }
}

impl std::fmt::Display for DiagramType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Node {
    pub id: String,
    #[serde(default)]
    pub label: String,
    /// Renderer metadata, carried through layout untouched.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payload: Option<serde_json::Value>,
}

impl Node {
    pub fn new(id: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            label: label.into(),
            payload: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Edge {
    pub from: String,
    pub to: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payload: Option<serde_json::Value>,
}

impl Edge {
    pub fn new(from: impl Into<String>, to: impl Into<String>) -> Self {
        Self {
            from: from.into(),
            to: to.into(),
            label: None,
            payload: None,
        }
    }
}

/// Graph produced by the content-analysis step.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Graph {
    #[serde(default)]
    pub nodes: Vec<Node>,
    #[serde(default)]
    pub edges: Vec<Edge>,
    #[serde(default)]
    pub diagram_type: DiagramType,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_diagram_type_defaults_to_flow() {
        assert_eq!(DiagramType::from_token("venn"), DiagramType::Flow);
        assert_eq!(DiagramType::from_token(" Hierarchy "), DiagramType::Tree);
        assert_eq!(DiagramType::from_token("CYCLE"), DiagramType::Cycle);
    }

    #[test]
    fn graph_json_accepts_tags_and_missing_fields() {
        let input = r#"{
            "nodes": [{"id": "a", "label": "Start"}, {"id": "b"}],
            "edges": [{"from": "a", "to": "b", "label": "next"}],
            "diagramType": "process"
        }"#;
        let graph: Graph = serde_json::from_str(input).unwrap();
        assert_eq!(graph.diagram_type, DiagramType::Flow);
        assert_eq!(graph.nodes[1].label, "");
        assert_eq!(graph.edges[0].label.as_deref(), Some("next"));

        let out = serde_json::to_value(&graph).unwrap();
        assert_eq!(out["diagramType"], "flow");
    }

    #[test]
    fn rank_direction_tokens() {
        let td: RankDirection = serde_json::from_str(r#""TD""#).unwrap();
        assert_eq!(td, RankDirection::TopBottom);
        let rl: RankDirection = serde_json::from_str(r#""RL""#).unwrap();
        assert_eq!(rl, RankDirection::RightLeft);
        assert!(serde_json::from_str::<RankDirection>(r#""XY""#).is_err());
        assert!(!RankDirection::LeftRight.is_vertical());
    }
}
