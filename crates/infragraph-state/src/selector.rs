//! `Service|Function|query` selectors and their evaluation against a store

use crate::query::{Query, QueryError};
use crate::state::{StateError, StateRecord, StateStore};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SelectorError {
    #[error("selector '{0}' must look like Service|Function|query")]
    Malformed(String),

    #[error("selector '{selector}': {source}")]
    Query {
        selector: String,
        #[source]
        source: QueryError,
    },

    #[error("unknown function {service}|{function}")]
    UnknownFunction { service: String, function: String },
}

/// A parsed selector: which call's state to read and how to query it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Selector {
    pub service: String,
    pub function: String,
    pub query: Query,
}

impl Selector {
    /// Parse and check the service/function pair against `registry`.
    pub fn parse_checked(s: &str, registry: &SelectorRegistry) -> Result<Self, SelectorError> {
        let selector: Selector = s.parse()?;
        registry.validate(&selector)?;
        Ok(selector)
    }

    /// Run the query over already-fetched records.
    pub fn apply(&self, records: &[StateRecord]) -> Result<Vec<Value>, StateError> {
        let state = serde_json::to_value(records)?;
        Ok(into_results(self.query.search(&state)))
    }
}

impl FromStr for Selector {
    type Err = SelectorError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut parts = s.split('|');
        let (Some(service), Some(function)) = (parts.next(), parts.next()) else {
            return Err(SelectorError::Malformed(s.to_string()));
        };
        let rest: Vec<&str> = parts.collect();
        if service.trim().is_empty() || function.trim().is_empty() || rest.is_empty() {
            return Err(SelectorError::Malformed(s.to_string()));
        }

        let query = Query::parse(&rest.join("|")).map_err(|source| SelectorError::Query {
            selector: s.to_string(),
            source,
        })?;
        Ok(Selector {
            service: service.trim().to_string(),
            function: function.trim().to_string(),
            query,
        })
    }
}

impl TryFrom<String> for Selector {
    type Error = SelectorError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl From<Selector> for String {
    fn from(selector: Selector) -> Self {
        selector.to_string()
    }
}

impl fmt::Display for Selector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}|{}|{}", self.service, self.function, self.query)
    }
}

/// Known service/function pairs that selectors may reference.
#[derive(Debug, Clone, Default)]
pub struct SelectorRegistry {
    functions: BTreeMap<String, BTreeSet<String>>,
}

impl SelectorRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, service: impl Into<String>, function: impl Into<String>) -> &mut Self {
        self.functions
            .entry(service.into())
            .or_default()
            .insert(function.into());
        self
    }

    pub fn contains(&self, service: &str, function: &str) -> bool {
        self.functions
            .get(service)
            .is_some_and(|functions| functions.contains(function))
    }

    pub fn validate(&self, selector: &Selector) -> Result<(), SelectorError> {
        if self.contains(&selector.service, &selector.function) {
            Ok(())
        } else {
            Err(SelectorError::UnknownFunction {
                service: selector.service.clone(),
                function: selector.function.clone(),
            })
        }
    }
}

/// Evaluate `selector` against the state of one account/region.
pub async fn evaluate<S>(account: &str, region: &str, selector: &Selector, store: &S) -> Result<Vec<Value>, StateError>
where
    S: StateStore + ?Sized,
{
    let records = store
        .resolve_state_for_service_function(account, region, &selector.service, &selector.function)
        .await?;
    tracing::debug!(
        "Selector {} matched {} records in {}/{}",
        selector,
        records.len(),
        account,
        region
    );
    selector.apply(&records)
}

/// Evaluate `selector` against its state across every account and region.
pub async fn evaluate_globally<S>(selector: &Selector, store: &S) -> Result<Vec<Value>, StateError>
where
    S: StateStore + ?Sized,
{
    let records = store
        .global_state_for_service_function(&selector.service, &selector.function)
        .await?;
    tracing::debug!("Selector {} matched {} records globally", selector, records.len());
    selector.apply(&records)
}

/// Arrays give their elements, `null` gives nothing, anything else itself.
fn into_results(value: Value) -> Vec<Value> {
    match value {
        Value::Array(items) => items,
        Value::Null => Vec::new(),
        other => vec![other],
    }
}
