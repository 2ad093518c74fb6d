//! Core data structures for the infrastructure graph

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Metadata key carrying the service a node was scanned from.
pub const SERVICE_TAG: &str = "service";

/// Metadata key carrying how many nodes an aggregate absorbed.
pub const COUNT_TAG: &str = "count";

/// Free-form node/edge metadata. Ordered so serialized output is stable.
pub type Metadata = BTreeMap<String, Value>;

/// Unique identifier for a node, usually a provider resource id or ARN.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default)]
#[serde(transparent)]
pub struct NodeId(pub String);

impl NodeId {
    pub fn new(id: impl Into<String>) -> Self {
        NodeId(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for NodeId {
    fn from(id: &str) -> Self {
        NodeId(id.to_string())
    }
}

impl From<String> for NodeId {
    fn from(id: String) -> Self {
        NodeId(id)
    }
}

impl From<&NodeId> for NodeId {
    fn from(id: &NodeId) -> Self {
        id.clone()
    }
}

/// Edge identifier. Derived from the ordered endpoint pair, so a graph holds
/// at most one edge per `(source, target)`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct EdgeId {
    pub source: NodeId,
    pub target: NodeId,
}

impl EdgeId {
    pub fn between(source: &NodeId, target: &NodeId) -> Self {
        EdgeId {
            source: source.clone(),
            target: target.clone(),
        }
    }
}

impl fmt::Display for EdgeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} -> {}", self.source, self.target)
    }
}

/// A single resource in the graph.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct GraphNode {
    pub id: NodeId,
    pub name: String,
    pub node_type: String,
    /// Weak reference to the containing node; it need not exist in the graph.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent: Option<NodeId>,
    /// Maintained by the graph from the `parent` ids of other nodes.
    /// Whatever the caller puts here is replaced on insert.
    #[serde(default)]
    pub children: BTreeSet<NodeId>,
    #[serde(default)]
    pub metadata: Metadata,
}

impl GraphNode {
    pub fn new(id: impl Into<NodeId>, name: impl Into<String>, node_type: impl Into<String>) -> Self {
        GraphNode {
            id: id.into(),
            name: name.into(),
            node_type: node_type.into(),
            parent: None,
            children: BTreeSet::new(),
            metadata: Metadata::new(),
        }
    }

    pub fn with_parent(mut self, parent: impl Into<NodeId>) -> Self {
        self.parent = Some(parent.into());
        self
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    pub fn with_service(self, service: impl Into<String>) -> Self {
        self.with_metadata(SERVICE_TAG, service.into())
    }

    /// The `service` tag, if the node carries one.
    pub fn service(&self) -> Option<&str> {
        self.metadata.get(SERVICE_TAG).and_then(Value::as_str)
    }

    pub fn is_leaf(&self) -> bool {
        self.children.is_empty()
    }
}

/// A directed relationship between two resources.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct GraphEdge {
    pub source: NodeId,
    pub target: NodeId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default)]
    pub metadata: Metadata,
}

impl GraphEdge {
    pub fn new(source: impl Into<NodeId>, target: impl Into<NodeId>) -> Self {
        GraphEdge {
            source: source.into(),
            target: target.into(),
            name: None,
            metadata: Metadata::new(),
        }
    }

    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    pub fn id(&self) -> EdgeId {
        EdgeId::between(&self.source, &self.target)
    }

    /// Same name and metadata, new endpoints.
    pub fn rehomed(&self, source: NodeId, target: NodeId) -> GraphEdge {
        GraphEdge {
            source,
            target,
            name: self.name.clone(),
            metadata: self.metadata.clone(),
        }
    }
}
