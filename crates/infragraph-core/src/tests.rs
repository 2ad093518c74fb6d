//! Unit tests for infragraph-core

use crate::test_utils::*;
use crate::*;
use proptest::prelude::*;

fn id(s: &str) -> NodeId {
    NodeId::from(s)
}

#[test]
fn test_edge_id_is_derived_from_endpoints() {
    let edge = GraphEdge::new("a", "b").named("feeds");
    assert_eq!(edge.id(), EdgeId::between(&id("a"), &id("b")));
    assert_ne!(edge.id(), EdgeId::between(&id("b"), &id("a")));
    assert_eq!(edge.id().to_string(), "a -> b");
}

#[test]
fn test_duplicate_node_is_rejected() {
    let mut graph = Graph::new();
    graph.add_node(GraphNode::new("a", "first", "vpc")).unwrap();
    let before = graph.serialize();

    let err = graph.add_node(GraphNode::new("a", "second", "vpc")).unwrap_err();
    assert_eq!(err, GraphError::NodeConflict(id("a")));
    assert_eq!(graph.serialize(), before);
    assert_eq!(graph.node(&id("a")).unwrap().name, "first");
}

#[test]
fn test_edge_requires_both_endpoints() {
    let mut graph = Graph::new();
    graph.add_node(GraphNode::new("a", "a", "vpc")).unwrap();

    let err = graph.add_edge(GraphEdge::new("a", "missing")).unwrap_err();
    assert_eq!(err, GraphError::NodeNotFound(id("missing")));
    let err = graph.add_edge(GraphEdge::new("missing", "a")).unwrap_err();
    assert_eq!(err, GraphError::NodeNotFound(id("missing")));
    assert_eq!(graph.edge_count(), 0);
}

#[test]
fn test_second_edge_between_same_pair_conflicts() {
    let mut graph = Graph::new();
    graph.add_node(GraphNode::new("a", "a", "vpc")).unwrap();
    graph.add_node(GraphNode::new("b", "b", "vpc")).unwrap();

    graph.add_edge(GraphEdge::new("a", "b")).unwrap();
    let err = graph.add_edge(GraphEdge::new("a", "b").named("other")).unwrap_err();
    assert_eq!(err, GraphError::EdgeConflict(EdgeId::between(&id("a"), &id("b"))));

    // The reverse direction is a different edge.
    graph.add_edge(GraphEdge::new("b", "a")).unwrap();
    assert_eq!(graph.edge_count(), 2);
}

#[test]
fn test_get_missing_node_is_none() {
    let graph = Graph::new();
    assert!(graph.node(&id("nope")).is_none());
    assert_eq!(graph.incoming(&id("nope")).count(), 0);
}

#[test]
fn test_remove_edge() {
    let mut graph = hub_fixture(1, 1);
    let edge_id = EdgeId::between(&id("in-0"), &id("hub"));

    let removed = graph.remove_edge(&edge_id).unwrap();
    assert_eq!(removed.name.as_deref(), Some("in"));
    assert!(graph.edge(&edge_id).is_none());
    assert_eq!(graph.incoming(&id("hub")).count(), 0);
    assert_eq!(graph.outgoing(&id("in-0")).count(), 0);

    assert_eq!(graph.remove_edge(&edge_id).unwrap_err(), GraphError::EdgeNotFound(edge_id));
}

#[test]
fn test_remove_node_cascades_edges() {
    let mut graph = hub_fixture(2, 2);
    let removed = graph.remove_node(&id("hub")).unwrap();

    assert_eq!(removed.id, id("hub"));
    assert!(graph.node(&id("hub")).is_none());
    assert_eq!(graph.edge_count(), 0);
    assert!(no_edge_mentions(&graph, &id("hub")));
    assert_eq!(graph.remove_node(&id("hub")).unwrap_err(), GraphError::NodeNotFound(id("hub")));
}

#[test]
fn test_remove_node_with_self_loop() {
    let mut graph = Graph::new();
    graph.add_node(GraphNode::new("a", "a", "sg")).unwrap();
    graph.add_edge(GraphEdge::new("a", "a")).unwrap();

    graph.remove_node(&id("a")).unwrap();
    assert_eq!(graph.edge_count(), 0);
}

#[test]
fn test_children_follow_parent_ids_in_any_order() {
    let mut graph = Graph::new();
    graph.add_node(GraphNode::new("subnet", "subnet", "subnet").with_parent("vpc")).unwrap();
    graph.add_node(GraphNode::new("vpc", "vpc", "vpc")).unwrap();
    graph.add_node(GraphNode::new("other", "other", "subnet").with_parent("vpc")).unwrap();

    let vpc = graph.node(&id("vpc")).unwrap();
    assert_eq!(vpc.children.iter().map(NodeId::as_str).collect::<Vec<_>>(), ["other", "subnet"]);

    graph.remove_node(&id("other")).unwrap();
    assert_eq!(graph.node(&id("vpc")).unwrap().children.len(), 1);

    // Parent goes away and comes back: the surviving child re-attaches.
    graph.remove_node(&id("vpc")).unwrap();
    assert_eq!(graph.node(&id("subnet")).unwrap().parent, Some(id("vpc")));
    graph.add_node(GraphNode::new("vpc", "vpc again", "vpc")).unwrap();
    assert!(graph.node(&id("vpc")).unwrap().children.contains(&id("subnet")));
}

#[test]
fn test_split_rehomes_edges_to_claiming_replacement() {
    let mut graph = hub_fixture(2, 1);
    let in_0 = EdgeId::between(&id("in-0"), &id("hub"));

    let new_ids = graph
        .map_nodes_by_id(&id("hub"), |node, incident| {
            assert_eq!(node.id, id("hub"));
            assert_eq!(incident.incoming.len(), 2);
            assert_eq!(incident.outgoing.len(), 1);
            vec![
                Replacement::new(GraphNode::new("hub-a", "a", "vpc")),
                Replacement::new(GraphNode::new("hub-b", "b", "vpc")).inheriting([in_0.clone()]),
            ]
        })
        .unwrap();

    assert_eq!(new_ids, vec![id("hub-a"), id("hub-b")]);
    assert!(graph.node(&id("hub")).is_none());
    assert!(no_edge_mentions(&graph, &id("hub")));

    let moved = graph.edge(&EdgeId::between(&id("in-0"), &id("hub-b"))).unwrap();
    assert_eq!(moved.name.as_deref(), Some("in"));
    assert!(graph.edge(&EdgeId::between(&id("in-1"), &id("hub-a"))).is_some());
    assert!(graph.edge(&EdgeId::between(&id("hub-a"), &id("out-0"))).is_some());
    assert_eq!(graph.edge_count(), 3);
}

#[test]
fn test_split_keeps_self_loop_on_heir() {
    let mut graph = Graph::new();
    graph.add_node(GraphNode::new("sg", "sg", "sg")).unwrap();
    graph.add_edge(GraphEdge::new("sg", "sg").named("self")).unwrap();

    graph
        .map_nodes_by_id(&id("sg"), |_, _| {
            vec![Replacement::new(GraphNode::new("sg-1", "sg", "sg"))]
        })
        .unwrap();

    assert_eq!(graph.edge_count(), 1);
    assert!(graph.edge(&EdgeId::between(&id("sg-1"), &id("sg-1"))).is_some());
}

#[test]
fn test_split_conflict_leaves_graph_unchanged() {
    let mut graph = hub_fixture(1, 1);
    let before = graph.serialize();

    let err = graph
        .map_nodes_by_id(&id("hub"), |_, _| {
            vec![
                Replacement::new(GraphNode::new("hub-a", "a", "vpc")),
                Replacement::new(GraphNode::new("in-0", "clash", "vpc")),
            ]
        })
        .unwrap_err();

    assert_eq!(err, GraphError::NodeConflict(id("in-0")));
    assert_eq!(graph.serialize(), before);
}

#[test]
fn test_split_into_nothing_removes_node() {
    let mut graph = hub_fixture(1, 1);
    let new_ids = graph.map_nodes_by_id(&id("hub"), |_, _| Vec::new()).unwrap();

    assert!(new_ids.is_empty());
    assert!(graph.node(&id("hub")).is_none());
    assert_eq!(graph.edge_count(), 0);
}

#[test]
fn test_serialize_is_deterministic() {
    let graph = collapse_fixture();
    assert_eq!(graph.serialize(), graph.serialize());

    let mut small = Graph::new();
    small.add_node(GraphNode::new("b", "bucket", "s3").with_parent("a")).unwrap();
    small.add_node(GraphNode::new("a", "account", "account")).unwrap();
    small.add_edge(GraphEdge::new("b", "a").named("owned by")).unwrap();
    insta::assert_snapshot!(small.serialize(), @r###"
    node a [account] "account"
    node b [s3] "bucket" parent=a
    edge b -> a "owned by"
    "###);
}

#[test]
fn test_collapse_scenario() {
    let mut graph = collapse_fixture();
    let rules = vec![
        ReduceRule::glob("lambda-rule", "lambda", "function-*").unwrap(),
        ReduceRule::regex("s3-rule", "s3", "^serverless-").unwrap(),
    ];

    let report = reduce(&mut graph, &rules).unwrap();

    for i in 0..3 {
        assert!(graph.node(&id(&format!("function-{i}"))).is_none());
        assert!(graph.node(&id(&format!("serverless-{i}"))).is_none());
    }
    let lambdas = id("account-lambda-rule");
    let buckets = id("account-s3-rule");
    assert_eq!(graph.node_count(), 4);
    assert_eq!(graph.node(&lambdas).unwrap().metadata[COUNT_TAG], 3);
    assert_eq!(graph.node(&buckets).unwrap().metadata[COUNT_TAG], 3);
    assert_eq!(graph.node(&lambdas).unwrap().parent, Some(id("account")));

    assert!(graph.edge(&EdgeId::between(&id("ecs-task"), &lambdas)).is_some());
    assert!(graph.edge(&EdgeId::between(&id("ecs-task"), &buckets)).is_some());
    assert!(graph.edge(&EdgeId::between(&lambdas, &buckets)).is_some());
    assert_eq!(graph.edge_count(), 3);

    assert_eq!(report.aggregates.len(), 2);
    assert_eq!(report.collapsed(), 6);
    let children = &graph.node(&id("account")).unwrap().children;
    assert_eq!(children.len(), 3);
}

#[test]
fn test_collapse_deduplicates_converging_edges() {
    let mut graph = collapse_fixture();
    graph.add_edge(GraphEdge::new("ecs-task", "function-0")).unwrap();
    graph.add_edge(GraphEdge::new("ecs-task", "function-2")).unwrap();

    let rules = vec![ReduceRule::glob("fns", "lambda", "function-*").unwrap()];
    reduce(&mut graph, &rules).unwrap();

    let to_aggregate = graph
        .incoming(&id("account-fns"))
        .filter(|e| e.source == id("ecs-task"))
        .count();
    assert_eq!(to_aggregate, 1);
}

#[test]
fn test_collapse_skips_non_leaf_and_parentless_nodes() {
    let mut graph = Graph::new();
    graph.add_node(GraphNode::new("account", "account", "account")).unwrap();
    graph.add_node(service_node("function-0", "account", "lambda")).unwrap();
    graph.add_node(service_node("function-1", "account", "lambda")).unwrap();
    graph.add_node(service_node("function-1-alias", "function-1", "lambda")).unwrap();
    graph.add_node(GraphNode::new("function-9", "orphan", "lambda").with_service("lambda")).unwrap();

    let rules = vec![ReduceRule::glob("fns", "lambda", "function-?").unwrap()];
    let report = reduce(&mut graph, &rules).unwrap();

    assert_eq!(report.aggregates.len(), 1);
    assert_eq!(report.aggregates[0].count, 1);
    assert!(graph.node(&id("function-0")).is_none());
    assert!(graph.node(&id("function-1")).is_some());
    assert!(graph.node(&id("function-9")).is_some());
}

#[test]
fn test_collapse_drops_edges_inside_the_group() {
    let mut graph = collapse_fixture();
    graph.add_edge(GraphEdge::new("function-0", "function-1")).unwrap();

    let rules = vec![ReduceRule::glob("fns", "lambda", "function-*").unwrap()];
    reduce(&mut graph, &rules).unwrap();

    let aggregate = id("account-fns");
    assert!(graph.edge(&EdgeId::between(&aggregate, &aggregate)).is_none());
}

#[test]
fn test_collapse_propagates_other_errors() {
    let mut graph = collapse_fixture();
    // Occupy the aggregate id so inserting it conflicts.
    graph.add_node(GraphNode::new("account-fns", "taken", "lambda")).unwrap();

    let rules = vec![ReduceRule::glob("fns", "lambda", "function-*").unwrap()];
    let err = reduce(&mut graph, &rules).unwrap_err();
    assert!(matches!(
        err,
        ReduceError::Graph { source: GraphError::NodeConflict(_), .. }
    ));
}

proptest! {
    #![proptest_config(ProptestConfig {
        cases: 64,
        .. ProptestConfig::default()
    })]

    /// PROPERTY: removing a node never leaves an edge that mentions it.
    #[test]
    fn property_cascade_removal(incoming in 0usize..6, outgoing in 0usize..6) {
        let mut graph = hub_fixture(incoming, outgoing);
        graph.remove_node(&id("hub")).unwrap();

        prop_assert!(graph.node(&id("hub")).is_none());
        prop_assert!(no_edge_mentions(&graph, &id("hub")));
        prop_assert_eq!(graph.node_count(), incoming + outgoing);
    }

    /// PROPERTY: a split keeps exactly k + m edges to the unchanged far ends.
    #[test]
    fn property_split_preserves_external_topology(
        incoming in 0usize..5,
        outgoing in 0usize..5,
        parts in 1usize..4,
        assignment in proptest::collection::vec(0usize..4, 10),
    ) {
        let mut graph = hub_fixture(incoming, outgoing);

        graph.map_nodes_by_id(&id("hub"), |_, incident| {
            let mut replacements: Vec<Replacement> = (0..parts)
                .map(|p| Replacement::new(GraphNode::new(format!("hub-{p}"), "hub", "vpc")))
                .collect();
            let all = incident.incoming.iter().chain(incident.outgoing.iter());
            for (n, edge) in all.enumerate() {
                let heir = assignment[n] % parts;
                replacements[heir].inherits.push(edge.id());
            }
            replacements
        }).unwrap();

        prop_assert!(graph.node(&id("hub")).is_none());
        let far_ends_kept = graph
            .edges()
            .filter(|e| e.source.as_str().starts_with("in-") || e.target.as_str().starts_with("out-"))
            .count();
        prop_assert_eq!(far_ends_kept, incoming + outgoing);
        prop_assert_eq!(graph.edge_count(), incoming + outgoing);
    }
}
