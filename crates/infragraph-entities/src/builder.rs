//! Two-phase graph construction
//!
//! Edges may only reference nodes that already exist, and a relationship's
//! target can come from any translator, so every entity becomes a node
//! before any relationship is resolved.

use std::collections::BTreeMap;

use infragraph_core::{EdgeId, Graph, GraphEdge, GraphError, NodeId, ScopeConfig};
use infragraph_state::{Query, QueryError, StateError, StateStore};
use serde_json::Value;
use tracing::{debug, info};

use crate::catalog::account;
use crate::entity::{Entity, TenantComponent};
use crate::translator::EntityRegistry;

#[derive(Debug, thiserror::Error)]
pub enum BuildError {
    #[error("reading state for {entity_type}: {source}")]
    State {
        entity_type: String,
        #[source]
        source: StateError,
    },

    #[error(transparent)]
    Graph(#[from] GraphError),

    #[error("cannot serialize entity {id}: {source}")]
    Document {
        id: String,
        #[source]
        source: serde_json::Error,
    },
}

/// Joins entities of two types on matching key values.
///
/// Both keys are queries over [`Entity::document`]; every string (or
/// number) value the source key yields is looked up among the values of
/// the target key, and each hit becomes a `source -> target` edge.
#[derive(Debug, Clone, PartialEq)]
pub struct Relationship {
    pub name: String,
    pub source_type: String,
    pub source_key: Query,
    pub target_type: String,
    pub target_key: Query,
}

impl Relationship {
    pub fn new(
        name: impl Into<String>,
        source_type: impl Into<String>,
        source_key: &str,
        target_type: impl Into<String>,
        target_key: &str,
    ) -> Result<Self, QueryError> {
        Ok(Relationship {
            name: name.into(),
            source_type: source_type.into(),
            source_key: Query::parse(source_key)?,
            target_type: target_type.into(),
            target_key: Query::parse(target_key)?,
        })
    }
}

/// Summary of one build.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BuildReport {
    /// Entities per entity type, synthesised accounts included.
    pub entities: BTreeMap<String, usize>,
    pub nodes: usize,
    pub edges: usize,
}

pub struct GraphBuilder<'a> {
    registry: &'a EntityRegistry,
    relationships: Vec<Relationship>,
    scope: ScopeConfig,
}

impl<'a> GraphBuilder<'a> {
    pub fn new(registry: &'a EntityRegistry) -> Self {
        GraphBuilder {
            registry,
            relationships: Vec::new(),
            scope: ScopeConfig::default(),
        }
    }

    pub fn with_relationships(mut self, relationships: Vec<Relationship>) -> Self {
        self.relationships = relationships;
        self
    }

    pub fn with_scope(mut self, scope: ScopeConfig) -> Self {
        self.scope = scope;
        self
    }

    /// Translate every registered entity type from `store`, in entity type
    /// order, and add an account entity for every tenant seen.
    pub async fn collect(&self, store: &dyn StateStore) -> Result<Vec<Entity>, BuildError> {
        let mut entities = Vec::new();
        for translator in self.registry.translators() {
            let entity_type = translator.entity_type().to_string();
            let records = translator
                .raw_state(store, &self.scope)
                .await
                .map_err(|source| BuildError::State {
                    entity_type: entity_type.clone(),
                    source,
                })?;
            let before = entities.len();
            for record in &records {
                entities.extend(translator.entities(record));
            }
            debug!(
                "Translated {} records into {} {} entities",
                records.len(),
                entities.len() - before,
                entity_type
            );
        }

        // One account per tenant id, whatever partition each record reported.
        let mut tenants: BTreeMap<String, TenantComponent> = BTreeMap::new();
        for entity in &entities {
            tenants
                .entry(entity.tenant.tenant_id.clone())
                .or_insert_with(|| entity.tenant.clone());
        }
        entities.extend(tenants.values().map(account::account_entity));
        Ok(entities)
    }

    /// Read, translate and insert everything, then resolve relationships.
    pub async fn build(&self, store: &dyn StateStore) -> Result<(Graph, BuildReport), BuildError> {
        let entities = self.collect(store).await?;
        let mut graph = Graph::new();
        let report = self.insert(&mut graph, &entities)?;
        Ok((graph, report))
    }

    /// Phase one adds every entity as a node, phase two adds the edges.
    pub fn insert(&self, graph: &mut Graph, entities: &[Entity]) -> Result<BuildReport, BuildError> {
        let mut report = BuildReport::default();
        for entity in entities {
            graph.add_node(entity.to_node())?;
            *report.entities.entry(entity.entity_type().to_string()).or_default() += 1;
        }
        report.nodes = graph.node_count();

        let documents = entities
            .iter()
            .map(|e| {
                e.document().map_err(|source| BuildError::Document {
                    id: e.id().to_string(),
                    source,
                })
            })
            .collect::<Result<Vec<Value>, BuildError>>()?;

        for relationship in &self.relationships {
            let added = self.connect(graph, relationship, entities, &documents)?;
            debug!("Relationship {} added {} edges", relationship.name, added);
        }
        report.edges = graph.edge_count();

        info!(
            "Built graph with {} nodes and {} edges from {} entity types",
            report.nodes,
            report.edges,
            report.entities.len()
        );
        Ok(report)
    }

    fn connect(
        &self,
        graph: &mut Graph,
        relationship: &Relationship,
        entities: &[Entity],
        documents: &[Value],
    ) -> Result<usize, BuildError> {
        let mut targets: BTreeMap<String, Vec<&str>> = BTreeMap::new();
        for (entity, document) in entities.iter().zip(documents) {
            if entity.entity_type() != relationship.target_type {
                continue;
            }
            for key in key_values(&relationship.target_key, document) {
                targets.entry(key).or_default().push(entity.id());
            }
        }

        let mut added = 0;
        for (entity, document) in entities.iter().zip(documents) {
            if entity.entity_type() != relationship.source_type {
                continue;
            }
            for key in key_values(&relationship.source_key, document) {
                for target in targets.get(&key).into_iter().flatten() {
                    if *target == entity.id() {
                        continue;
                    }
                    let source = NodeId::new(entity.id());
                    let target = NodeId::new(*target);
                    if graph.edge(&EdgeId::between(&source, &target)).is_some() {
                        debug!("Edge {} -> {} already present, skipping", source, target);
                        continue;
                    }
                    graph.add_edge(GraphEdge::new(source, target).named(relationship.name.as_str()))?;
                    added += 1;
                }
            }
        }
        Ok(added)
    }
}

/// String forms of the scalar values a key query yields.
fn key_values(query: &Query, document: &Value) -> Vec<String> {
    let values = match query.search(document) {
        Value::Array(items) => items,
        Value::Null => Vec::new(),
        other => vec![other],
    };
    values
        .into_iter()
        .filter_map(|value| match value {
            Value::String(s) => Some(s),
            Value::Number(n) => Some(n.to_string()),
            _ => None,
        })
        .collect()
}
