use diagram_layout::{DiagramType, Graph, LayoutConfigPatch, LayoutEngine};
use serde::Deserialize;
use wasm_bindgen::prelude::*;

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct LayoutOptions {
    iteration: Option<u32>,
    diagram_type: Option<String>,
    #[serde(flatten)]
    config: LayoutConfigPatch,
}

fn build_engine(options: LayoutOptions) -> Result<(LayoutEngine, Option<DiagramType>, u32), String> {
    let mut engine = LayoutEngine::default();
    engine
        .update_config(options.config)
        .map_err(|error| error.to_string())?;
    let diagram_type = options.diagram_type.as_deref().map(DiagramType::from_token);
    Ok((engine, diagram_type, options.iteration.unwrap_or(1)))
}

fn layout_json(graph_json: &str, options: LayoutOptions) -> Result<String, String> {
    let mut graph: Graph = serde_json::from_str(graph_json).map_err(|error| error.to_string())?;
    let (engine, diagram_type, iteration) = build_engine(options)?;
    if let Some(diagram_type) = diagram_type {
        graph.diagram_type = diagram_type;
    }
    let result = engine.layout_graph(&graph, iteration);
    serde_json::to_string(&result).map_err(|error| error.to_string())
}

#[wasm_bindgen]
pub fn layout_diagram_json(graph_json: &str, options_json: Option<String>) -> Result<String, JsValue> {
    let options = if let Some(raw_options) = options_json {
        serde_json::from_str::<LayoutOptions>(&raw_options)
            .map_err(|error| JsValue::from_str(&error.to_string()))?
    } else {
        LayoutOptions::default()
    };

    layout_json(graph_json, options).map_err(|error| JsValue::from_str(&error))
}

#[cfg(test)]
mod tests {
    use crate::{LayoutOptions, layout_json};

    const GRAPH: &str = r#"{
        "nodes": [{"id": "a", "label": "Plan"}, {"id": "b", "label": "Build"}, {"id": "c", "label": "Ship"}],
        "edges": [{"from": "a", "to": "b"}, {"from": "b", "to": "c"}, {"from": "c", "to": "a"}],
        "diagramType": "flow"
    }"#;

    #[test]
    fn lays_out_graph_with_options() {
        let options: LayoutOptions =
            serde_json::from_str(r#"{"diagramType": "cycle", "iteration": 4, "width": 800, "isSimpleMode": true}"#)
                .unwrap();
        let json = layout_json(GRAPH, options).expect("cycle layout should succeed");
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();

        assert_eq!(value["success"], true);
        assert_eq!(value["layout"]["nodes"].as_array().unwrap().len(), 3);
        assert_eq!(value["metrics"]["path"], "simple");
    }

    #[test]
    fn rejects_invalid_config() {
        let options: LayoutOptions = serde_json::from_str(r#"{"height": -1}"#).unwrap();
        assert!(layout_json(GRAPH, options).unwrap_err().contains("height"));
    }
}
