//! Graph store using petgraph::StableDiGraph with id-keyed node/edge maps

use crate::model::*;
use petgraph::stable_graph::{EdgeIndex, NodeIndex, StableDiGraph};
use petgraph::visit::EdgeRef;
use petgraph::Direction;
use std::collections::{BTreeSet, HashMap, HashSet};
use std::fmt;
use tracing::debug;

/// Structural violations raised by the graph store. The store never
/// recovers from these itself.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GraphError {
    #[error("node '{0}' already exists")]
    NodeConflict(NodeId),

    #[error("edge '{0}' already exists")]
    EdgeConflict(EdgeId),

    #[error("node '{0}' not found")]
    NodeNotFound(NodeId),

    #[error("edge '{0}' not found")]
    EdgeNotFound(EdgeId),
}

/// Edges incident on a node that is about to be split.
#[derive(Debug)]
pub struct Incident<'a> {
    pub incoming: Vec<&'a GraphEdge>,
    pub outgoing: Vec<&'a GraphEdge>,
}

/// A node produced by [`Graph::map_nodes_by_id`], with the ids of the
/// original node's edges it takes over.
#[derive(Debug, Clone)]
pub struct Replacement {
    pub node: GraphNode,
    pub inherits: Vec<EdgeId>,
}

impl Replacement {
    pub fn new(node: GraphNode) -> Self {
        Replacement {
            node,
            inherits: Vec::new(),
        }
    }

    pub fn inheriting(mut self, edges: impl IntoIterator<Item = EdgeId>) -> Self {
        self.inherits.extend(edges);
        self
    }
}

/// The infrastructure graph: a directed graph with at most one edge per
/// ordered node pair.
pub struct Graph {
    inner: StableDiGraph<GraphNode, GraphEdge>,
    nodes: HashMap<NodeId, NodeIndex>,
    edges: HashMap<EdgeId, EdgeIndex>,
    /// Children whose parent id is not currently in the graph.
    pending_children: HashMap<NodeId, BTreeSet<NodeId>>,
}

impl fmt::Debug for Graph {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Graph")
            .field("node_count", &self.inner.node_count())
            .field("edge_count", &self.inner.edge_count())
            .finish()
    }
}

impl Graph {
    pub fn new() -> Self {
        Graph {
            inner: StableDiGraph::new(),
            nodes: HashMap::new(),
            edges: HashMap::new(),
            pending_children: HashMap::new(),
        }
    }

    /// Insert a node. Fails if the id is taken; the graph is untouched then.
    pub fn add_node(&mut self, mut node: GraphNode) -> Result<(), GraphError> {
        if self.nodes.contains_key(&node.id) {
            return Err(GraphError::NodeConflict(node.id));
        }

        node.children = self.pending_children.remove(&node.id).unwrap_or_default();
        if let Some(parent) = node.parent.as_ref().filter(|p| **p != node.id) {
            match self.nodes.get(parent) {
                Some(&idx) => {
                    self.inner[idx].children.insert(node.id.clone());
                }
                None => {
                    self.pending_children
                        .entry(parent.clone())
                        .or_default()
                        .insert(node.id.clone());
                }
            }
        }

        debug!("Adding node {}", node.id);
        let id = node.id.clone();
        let idx = self.inner.add_node(node);
        self.nodes.insert(id, idx);
        Ok(())
    }

    /// Insert an edge between two existing nodes. Returns its derived id.
    pub fn add_edge(&mut self, edge: GraphEdge) -> Result<EdgeId, GraphError> {
        let source = self.index_of(&edge.source)?;
        let target = self.index_of(&edge.target)?;
        let id = edge.id();
        if self.edges.contains_key(&id) {
            return Err(GraphError::EdgeConflict(id));
        }

        debug!("Adding edge {}", id);
        let idx = self.inner.add_edge(source, target, edge);
        self.edges.insert(id.clone(), idx);
        Ok(id)
    }

    /// Get a node by id.
    pub fn node(&self, id: &NodeId) -> Option<&GraphNode> {
        self.nodes.get(id).and_then(|&idx| self.inner.node_weight(idx))
    }

    /// Get an edge by id.
    pub fn edge(&self, id: &EdgeId) -> Option<&GraphEdge> {
        self.edges.get(id).and_then(|&idx| self.inner.edge_weight(idx))
    }

    pub fn contains(&self, id: &NodeId) -> bool {
        self.nodes.contains_key(id)
    }

    /// Total number of nodes.
    pub fn node_count(&self) -> usize {
        self.inner.node_count()
    }

    /// Total number of edges.
    pub fn edge_count(&self) -> usize {
        self.inner.edge_count()
    }

    /// Iterate over all nodes, in no particular order.
    pub fn nodes(&self) -> impl Iterator<Item = &GraphNode> {
        self.inner.node_weights()
    }

    /// Iterate over all edges, in no particular order.
    pub fn edges(&self) -> impl Iterator<Item = &GraphEdge> {
        self.inner.edge_weights()
    }

    /// Edges pointing at `id`. Empty when the node does not exist.
    pub fn incoming(&self, id: &NodeId) -> impl Iterator<Item = &GraphEdge> + '_ {
        self.directed(id, Direction::Incoming)
    }

    /// Edges leaving `id`. Empty when the node does not exist.
    pub fn outgoing(&self, id: &NodeId) -> impl Iterator<Item = &GraphEdge> + '_ {
        self.directed(id, Direction::Outgoing)
    }

    /// Remove an edge by id.
    pub fn remove_edge(&mut self, id: &EdgeId) -> Result<GraphEdge, GraphError> {
        let idx = self
            .edges
            .remove(id)
            .ok_or_else(|| GraphError::EdgeNotFound(id.clone()))?;
        debug!("Removing edge {}", id);
        self.inner
            .remove_edge(idx)
            .ok_or_else(|| GraphError::EdgeNotFound(id.clone()))
    }

    /// Remove a node and, before it, every edge incident on it.
    pub fn remove_node(&mut self, id: &NodeId) -> Result<GraphNode, GraphError> {
        let idx = self.index_of(id)?;

        let incident: BTreeSet<EdgeId> = self
            .inner
            .edges_directed(idx, Direction::Incoming)
            .chain(self.inner.edges_directed(idx, Direction::Outgoing))
            .map(|e| e.weight().id())
            .collect();
        for edge_id in &incident {
            self.remove_edge(edge_id)?;
        }

        debug!("Removing node {} ({} edges)", id, incident.len());
        self.nodes.remove(id);
        let node = self
            .inner
            .remove_node(idx)
            .ok_or_else(|| GraphError::NodeNotFound(id.clone()))?;

        if let Some(parent) = &node.parent {
            match self.nodes.get(parent) {
                Some(&pidx) => {
                    self.inner[pidx].children.remove(id);
                }
                None => {
                    if let Some(siblings) = self.pending_children.get_mut(parent) {
                        siblings.remove(id);
                        if siblings.is_empty() {
                            self.pending_children.remove(parent);
                        }
                    }
                }
            }
        }
        if !node.children.is_empty() {
            self.pending_children
                .entry(id.clone())
                .or_default()
                .extend(node.children.iter().cloned());
        }

        Ok(node)
    }

    /// Split one node into replacements while keeping its external edges.
    ///
    /// `mapper` sees the node and its incident edges and returns the
    /// replacements. Each incident edge is re-created against exactly one
    /// replacement: the first one listing it in `inherits`, otherwise the
    /// first replacement. The far endpoint, name and metadata are kept. New
    /// nodes and edges are staged before the original is removed, since the
    /// removal cascades away the edges needed to reconnect them. An empty
    /// replacement list just removes the node.
    pub fn map_nodes_by_id<F>(&mut self, id: &NodeId, mapper: F) -> Result<Vec<NodeId>, GraphError>
    where
        F: FnOnce(&GraphNode, &Incident<'_>) -> Vec<Replacement>,
    {
        let idx = self.index_of(id)?;
        let (replacements, incident) = {
            let incident = Incident {
                incoming: self
                    .inner
                    .edges_directed(idx, Direction::Incoming)
                    .map(|e| e.weight())
                    .collect(),
                outgoing: self
                    .inner
                    .edges_directed(idx, Direction::Outgoing)
                    .map(|e| e.weight())
                    .collect(),
            };
            let replacements = mapper(&self.inner[idx], &incident);

            let mut seen = HashSet::new();
            let edges: Vec<GraphEdge> = incident
                .incoming
                .iter()
                .chain(incident.outgoing.iter())
                .filter(|e| seen.insert(e.id()))
                .map(|e| (*e).clone())
                .collect();
            (replacements, edges)
        };

        let mut fresh = HashSet::new();
        for replacement in &replacements {
            let new_id = &replacement.node.id;
            if self.nodes.contains_key(new_id) || !fresh.insert(new_id.clone()) {
                return Err(GraphError::NodeConflict(new_id.clone()));
            }
        }

        let mut heirs: HashMap<EdgeId, &NodeId> = HashMap::new();
        for replacement in &replacements {
            for edge_id in &replacement.inherits {
                heirs.entry(edge_id.clone()).or_insert(&replacement.node.id);
            }
        }
        let staged: Vec<GraphEdge> = match replacements.first() {
            None => Vec::new(),
            Some(first) => incident
                .iter()
                .map(|edge| {
                    let heir = heirs.get(&edge.id()).copied().unwrap_or(&first.node.id);
                    let swap = |end: &NodeId| if end == id { heir.clone() } else { end.clone() };
                    edge.rehomed(swap(&edge.source), swap(&edge.target))
                })
                .collect(),
        };

        let new_ids: Vec<NodeId> = replacements.iter().map(|r| r.node.id.clone()).collect();
        debug!("Splitting node {} into {} nodes", id, new_ids.len());
        for replacement in replacements {
            self.add_node(replacement.node)?;
        }
        self.remove_node(id)?;
        for edge in staged {
            self.add_edge(edge)?;
        }

        Ok(new_ids)
    }

    /// Deterministic, human-readable listing of nodes then edges.
    pub fn serialize(&self) -> String {
        self.to_string()
    }

    /// Nodes sorted by id.
    pub fn sorted_nodes(&self) -> Vec<&GraphNode> {
        let mut nodes: Vec<&GraphNode> = self.nodes().collect();
        nodes.sort_by(|a, b| a.id.cmp(&b.id));
        nodes
    }

    /// Edges sorted by id.
    pub fn sorted_edges(&self) -> Vec<&GraphEdge> {
        let mut edges: Vec<&GraphEdge> = self.edges().collect();
        edges.sort_by_key(|e| e.id());
        edges
    }

    fn index_of(&self, id: &NodeId) -> Result<NodeIndex, GraphError> {
        self.nodes
            .get(id)
            .copied()
            .ok_or_else(|| GraphError::NodeNotFound(id.clone()))
    }

    fn directed(&self, id: &NodeId, direction: Direction) -> impl Iterator<Item = &GraphEdge> + '_ {
        self.nodes
            .get(id)
            .copied()
            .into_iter()
            .flat_map(move |idx| self.inner.edges_directed(idx, direction).map(|e| e.weight()))
    }
}

impl fmt::Display for Graph {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for node in self.sorted_nodes() {
            write!(f, "node {} [{}] {:?}", node.id, node.node_type, node.name)?;
            if let Some(parent) = &node.parent {
                write!(f, " parent={}", parent)?;
            }
            writeln!(f)?;
        }
        for edge in self.sorted_edges() {
            write!(f, "edge {}", edge.id())?;
            if let Some(name) = &edge.name {
                write!(f, " {:?}", name)?;
            }
            writeln!(f)?;
        }
        Ok(())
    }
}

impl Default for Graph {
    fn default() -> Self {
        Self::new()
    }
}
