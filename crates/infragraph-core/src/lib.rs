//! Infragraph Core: Graph store, node reducer, configuration and element export

pub mod config;
pub mod export;
pub mod graph;
pub mod model;
pub mod reduce;

#[cfg(test)]
mod tests;

#[cfg(test)]
pub mod test_utils;

pub use config::{Config, ReducerConfig, RuleConfig, ScopeConfig, CONFIG_FILE};
pub use export::{elements, write_elements, Element, DEFAULT_OUTPUT};
pub use graph::{Graph, GraphError, Incident, Replacement};
pub use model::{EdgeId, GraphEdge, GraphNode, Metadata, NodeId, COUNT_TAG, SERVICE_TAG};
pub use reduce::{reduce, Aggregate, ReduceError, ReduceRule, ReductionReport, RulePattern};
