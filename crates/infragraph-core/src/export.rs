//! Renderer element list and JSON output

use crate::graph::Graph;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Default output file for `infragraph build`.
pub const DEFAULT_OUTPUT: &str = "infragraph.json";

/// One renderer element: `{"group": "nodes"|"edges", "data": {...}}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "group", content = "data", rename_all = "lowercase")]
pub enum Element {
    Nodes(NodeData),
    Edges(EdgeData),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeData {
    pub id: String,
    /// Only set when the parent node is itself part of the graph.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent: Option<String>,
    pub name: String,
    #[serde(rename = "type")]
    pub node_type: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EdgeData {
    pub id: String,
    pub name: String,
    pub source: String,
    pub target: String,
}

/// Flatten the graph into elements: nodes first, then edges, each sorted by id.
pub fn elements(graph: &Graph) -> Vec<Element> {
    let nodes = graph.sorted_nodes().into_iter().map(|node| {
        Element::Nodes(NodeData {
            id: node.id.to_string(),
            parent: node
                .parent
                .as_ref()
                .filter(|p| graph.contains(p))
                .map(ToString::to_string),
            name: node.name.clone(),
            node_type: node.node_type.clone(),
        })
    });
    let edges = graph.sorted_edges().into_iter().map(|edge| {
        Element::Edges(EdgeData {
            id: edge.id().to_string(),
            name: edge.name.clone().unwrap_or_default(),
            source: edge.source.to_string(),
            target: edge.target.to_string(),
        })
    });
    nodes.chain(edges).collect()
}

/// Write the element list, wrapped with counts and a timestamp, as pretty JSON.
pub fn write_elements(graph: &Graph, path: &Path) -> anyhow::Result<()> {
    if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
        std::fs::create_dir_all(dir)?;
    }

    let document = serde_json::json!({
        "version": env!("CARGO_PKG_VERSION"),
        "generatedAt": chrono::Utc::now().to_rfc3339(),
        "nodeCount": graph.node_count(),
        "edgeCount": graph.edge_count(),
        "elements": elements(graph),
    });
    std::fs::write(path, serde_json::to_string_pretty(&document)?)?;

    tracing::debug!("Graph elements written to: {}", path.display());
    Ok(())
}
