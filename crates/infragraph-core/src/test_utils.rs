//! Graph fixtures shared by the core tests

use crate::graph::Graph;
use crate::model::{GraphEdge, GraphNode, NodeId};

/// Leaf node with a service tag.
pub fn service_node(id: &str, parent: &str, service: &str) -> GraphNode {
    GraphNode::new(id, id, service).with_parent(parent).with_service(service)
}

/// The account with three lambdas, three buckets and one ECS task:
///
/// ```text
/// ecs-task   -> function-1
/// ecs-task   -> serverless-2
/// function-2 -> serverless-0
/// ```
pub fn collapse_fixture() -> Graph {
    let mut graph = Graph::new();
    graph.add_node(GraphNode::new("account", "account", "account")).unwrap();
    for i in 0..3 {
        graph
            .add_node(service_node(&format!("function-{i}"), "account", "lambda"))
            .unwrap();
        graph
            .add_node(service_node(&format!("serverless-{i}"), "account", "s3"))
            .unwrap();
    }
    graph
        .add_node(GraphNode::new("ecs-task", "ecs-task", "ecs").with_parent("account"))
        .unwrap();

    graph.add_edge(GraphEdge::new("ecs-task", "function-1")).unwrap();
    graph.add_edge(GraphEdge::new("ecs-task", "serverless-2")).unwrap();
    graph.add_edge(GraphEdge::new("function-2", "serverless-0")).unwrap();
    graph
}

/// A hub node with `incoming` sources and `outgoing` targets.
pub fn hub_fixture(incoming: usize, outgoing: usize) -> Graph {
    let mut graph = Graph::new();
    graph.add_node(GraphNode::new("hub", "hub", "vpc")).unwrap();
    for i in 0..incoming {
        let id = format!("in-{i}");
        graph.add_node(GraphNode::new(id.as_str(), id.as_str(), "subnet")).unwrap();
        graph.add_edge(GraphEdge::new(id.as_str(), "hub").named("in")).unwrap();
    }
    for i in 0..outgoing {
        let id = format!("out-{i}");
        graph.add_node(GraphNode::new(id.as_str(), id.as_str(), "igw")).unwrap();
        graph.add_edge(GraphEdge::new("hub", id.as_str()).named("out")).unwrap();
    }
    graph
}

/// True when no edge in the graph mentions `id`.
pub fn no_edge_mentions(graph: &Graph, id: &NodeId) -> bool {
    graph.edges().all(|e| &e.source != id && &e.target != id)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_collapse_fixture_shape() {
        let graph = collapse_fixture();
        assert_eq!(graph.node_count(), 8);
        assert_eq!(graph.edge_count(), 3);
        assert_eq!(graph.node(&NodeId::from("account")).unwrap().children.len(), 7);
    }

    #[test]
    fn test_hub_fixture_shape() {
        let graph = hub_fixture(2, 3);
        assert_eq!(graph.node_count(), 6);
        assert_eq!(graph.incoming(&NodeId::from("hub")).count(), 2);
        assert_eq!(graph.outgoing(&NodeId::from("hub")).count(), 3);
    }
}
