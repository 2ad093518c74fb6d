//! Rule-driven collapsing of sibling leaf nodes into aggregate nodes

use crate::graph::{Graph, GraphError};
use crate::model::{GraphEdge, GraphNode, NodeId, COUNT_TAG};
use globset::{Glob, GlobMatcher};
use regex::Regex;
use std::collections::{BTreeMap, HashSet};
use tracing::{debug, info};

#[derive(Debug, thiserror::Error)]
pub enum ReduceError {
    #[error("invalid glob '{pattern}' in rule '{rule}': {source}")]
    Glob {
        rule: String,
        pattern: String,
        #[source]
        source: globset::Error,
    },

    #[error("invalid regex '{pattern}' in rule '{rule}': {source}")]
    Regex {
        rule: String,
        pattern: String,
        #[source]
        source: regex::Error,
    },

    #[error("rule '{rule}' must set exactly one of `glob` or `regex`")]
    Pattern { rule: String },

    #[error("reducing rule '{rule}' failed: {source}")]
    Graph {
        rule: String,
        #[source]
        source: GraphError,
    },
}

/// How a rule matches node ids.
#[derive(Debug, Clone)]
pub enum RulePattern {
    Glob(GlobMatcher),
    Regex(Regex),
}

impl RulePattern {
    pub fn is_match(&self, id: &str) -> bool {
        match self {
            RulePattern::Glob(glob) => glob.is_match(id),
            RulePattern::Regex(regex) => regex.is_match(id),
        }
    }
}

/// Collapse nodes of `service` whose id matches `pattern`.
#[derive(Debug, Clone)]
pub struct ReduceRule {
    pub id: String,
    pub service: String,
    pub pattern: RulePattern,
}

impl ReduceRule {
    pub fn glob(id: impl Into<String>, service: impl Into<String>, pattern: &str) -> Result<Self, ReduceError> {
        let id = id.into();
        let matcher = Glob::new(pattern)
            .map_err(|source| ReduceError::Glob {
                rule: id.clone(),
                pattern: pattern.to_string(),
                source,
            })?
            .compile_matcher();
        Ok(ReduceRule {
            id,
            service: service.into(),
            pattern: RulePattern::Glob(matcher),
        })
    }

    pub fn regex(id: impl Into<String>, service: impl Into<String>, pattern: &str) -> Result<Self, ReduceError> {
        let id = id.into();
        let regex = Regex::new(pattern).map_err(|source| ReduceError::Regex {
            rule: id.clone(),
            pattern: pattern.to_string(),
            source,
        })?;
        Ok(ReduceRule {
            id,
            service: service.into(),
            pattern: RulePattern::Regex(regex),
        })
    }

    /// Id of the aggregate this rule creates under `parent`.
    pub fn aggregate_id(&self, parent: &NodeId) -> NodeId {
        NodeId(format!("{}-{}", parent, self.id))
    }
}

/// One aggregate node created by [`reduce`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Aggregate {
    pub id: NodeId,
    pub rule: String,
    pub parent: NodeId,
    pub count: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReductionReport {
    pub aggregates: Vec<Aggregate>,
}

impl ReductionReport {
    /// Total number of nodes folded into aggregates.
    pub fn collapsed(&self) -> usize {
        self.aggregates.iter().map(|a| a.count).sum()
    }
}

/// Apply every rule once, in order.
///
/// Only leaf nodes with a parent are collapsed; everything else that
/// matches is left alone. Duplicate edges produced while re-homing onto an
/// aggregate are expected and dropped; any other graph error aborts.
pub fn reduce(graph: &mut Graph, rules: &[ReduceRule]) -> Result<ReductionReport, ReduceError> {
    let mut by_service: BTreeMap<String, Vec<NodeId>> = BTreeMap::new();
    for node in graph.sorted_nodes() {
        if let Some(service) = node.service() {
            by_service.entry(service.to_string()).or_default().push(node.id.clone());
        }
    }

    let mut report = ReductionReport::default();
    for rule in rules {
        let Some(candidates) = by_service.get(&rule.service) else {
            debug!("Rule {} has no nodes of service {}", rule.id, rule.service);
            continue;
        };

        let mut by_parent: BTreeMap<NodeId, Vec<NodeId>> = BTreeMap::new();
        for id in candidates {
            let Some(node) = graph.node(id) else { continue };
            if !node.is_leaf() || !rule.pattern.is_match(id.as_str()) {
                continue;
            }
            match &node.parent {
                Some(parent) => by_parent.entry(parent.clone()).or_default().push(id.clone()),
                None => debug!("Rule {} skips parentless node {}", rule.id, id),
            }
        }

        for (parent, members) in by_parent {
            let aggregate = collapse(graph, rule, &parent, &members)
                .map_err(|source| ReduceError::Graph {
                    rule: rule.id.clone(),
                    source,
                })?;
            report.aggregates.push(aggregate);
        }
    }

    info!(
        "Reduced {} nodes into {} aggregates",
        report.collapsed(),
        report.aggregates.len()
    );
    Ok(report)
}

fn collapse(graph: &mut Graph, rule: &ReduceRule, parent: &NodeId, members: &[NodeId]) -> Result<Aggregate, GraphError> {
    let aggregate_id = rule.aggregate_id(parent);
    let node_type = members
        .first()
        .and_then(|id| graph.node(id))
        .map(|n| n.node_type.clone())
        .unwrap_or_default();
    graph.add_node(
        GraphNode::new(aggregate_id.clone(), rule.id.clone(), node_type)
            .with_parent(parent.clone())
            .with_service(rule.service.clone())
            .with_metadata(COUNT_TAG, members.len())
            .with_metadata("rule", rule.id.clone()),
    )?;

    let member_set: HashSet<&NodeId> = members.iter().collect();
    for member in members {
        let migrated: Vec<GraphEdge> = graph
            .incoming(member)
            .filter(|e| !member_set.contains(&e.source))
            .map(|e| e.rehomed(e.source.clone(), aggregate_id.clone()))
            .chain(
                graph
                    .outgoing(member)
                    .filter(|e| !member_set.contains(&e.target))
                    .map(|e| e.rehomed(aggregate_id.clone(), e.target.clone())),
            )
            .collect();

        for edge in migrated {
            match graph.add_edge(edge) {
                Ok(_) => {}
                Err(GraphError::EdgeConflict(id)) => debug!("Edge {} already migrated", id),
                Err(e) => return Err(e),
            }
        }
    }

    for member in members {
        graph.remove_node(member)?;
    }

    debug!("Collapsed {} nodes into {}", members.len(), aggregate_id);
    Ok(Aggregate {
        id: aggregate_id,
        rule: rule.id.clone(),
        parent: parent.clone(),
        count: members.len(),
    })
}
