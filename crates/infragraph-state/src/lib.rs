//! Scanned state access: the store boundary, the selector query language
//! and parameter resolution for dependent provider calls.

pub mod params;
pub mod query;
pub mod selector;
pub mod state;


pub use params::{resolve, ParamObject, ParamResolver, ResolverError, ResolverSource};
pub use query::{Query, QueryError};
pub use selector::{evaluate, evaluate_globally, Selector, SelectorError, SelectorRegistry};
pub use state::{MemoryStateStore, SnapshotEntry, StateError, StateMetadata, StateRecord, StateStore};
