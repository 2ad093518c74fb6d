//! Parameter resolution for dependent provider calls
//!
//! A dependent call ("describe each thing listed earlier") gets one
//! parameter object per discovered value. Selector-backed resolvers are
//! zipped by position; constants are broadcast onto every object.

use crate::selector::{evaluate, Selector};
use crate::state::{StateError, StateStore};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::{debug, warn};

/// One set of request parameters.
pub type ParamObject = Map<String, Value>;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ResolverError {
    #[error("resolver '{0}' needs a selector or a value")]
    Empty(String),
}

/// Where a parameter's values come from.
#[derive(Debug, Clone, PartialEq)]
pub enum ResolverSource {
    Selector(Selector),
    Value(Value),
}

/// Produces the values of one parameter key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawResolver", into = "RawResolver")]
pub struct ParamResolver {
    pub key: String,
    pub source: ResolverSource,
}

/// Wire shape: `{key, selector?, value?}`. A selector wins over a value.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawResolver {
    key: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    selector: Option<Selector>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    value: Option<Value>,
}

impl TryFrom<RawResolver> for ParamResolver {
    type Error = ResolverError;

    fn try_from(raw: RawResolver) -> Result<Self, Self::Error> {
        let source = match (raw.selector, raw.value) {
            (Some(selector), _) => ResolverSource::Selector(selector),
            (None, Some(value)) => ResolverSource::Value(value),
            (None, None) => return Err(ResolverError::Empty(raw.key)),
        };
        Ok(ParamResolver { key: raw.key, source })
    }
}

impl From<ParamResolver> for RawResolver {
    fn from(resolver: ParamResolver) -> Self {
        let (selector, value) = match resolver.source {
            ResolverSource::Selector(selector) => (Some(selector), None),
            ResolverSource::Value(value) => (None, Some(value)),
        };
        RawResolver {
            key: resolver.key,
            selector,
            value,
        }
    }
}

impl ParamResolver {
    pub fn selector(key: impl Into<String>, selector: Selector) -> Self {
        ParamResolver {
            key: key.into(),
            source: ResolverSource::Selector(selector),
        }
    }

    pub fn value(key: impl Into<String>, value: impl Into<Value>) -> Self {
        ParamResolver {
            key: key.into(),
            source: ResolverSource::Value(value.into()),
        }
    }
}

/// Build the parameter objects for one dependent call in `account`/`region`.
///
/// Selector resolvers are assumed to return equally long lists in matching
/// order; value *i* of every selector lands in object *i*. Lists of
/// different lengths are zipped as-is (and logged), so objects past the
/// shortest list miss a key and are dropped.
pub async fn resolve<S>(
    account: &str,
    region: &str,
    resolvers: &[ParamResolver],
    store: &S,
) -> Result<Vec<ParamObject>, StateError>
where
    S: StateStore + ?Sized,
{
    let mut params: Vec<ParamObject> = Vec::new();
    let mut lengths: Vec<(&str, usize)> = Vec::new();

    for resolver in resolvers {
        let ResolverSource::Selector(selector) = &resolver.source else {
            continue;
        };
        let values = evaluate(account, region, selector, store).await?;
        lengths.push((resolver.key.as_str(), values.len()));
        for (i, value) in values.into_iter().enumerate() {
            if params.len() <= i {
                params.resize_with(i + 1, ParamObject::new);
            }
            params[i].insert(resolver.key.clone(), value);
        }
    }

    if lengths.windows(2).any(|w| w[0].1 != w[1].1) {
        warn!(
            "Selector resolvers returned lists of different lengths in {}/{}: {:?}",
            account, region, lengths
        );
    }

    for resolver in resolvers {
        let ResolverSource::Value(value) = &resolver.source else {
            continue;
        };
        if params.is_empty() {
            let mut object = ParamObject::new();
            object.insert(resolver.key.clone(), value.clone());
            params.push(object);
        } else {
            for object in &mut params {
                object.insert(resolver.key.clone(), value.clone());
            }
        }
    }

    let total = params.len();
    params.retain(|object| resolvers.iter().all(|r| object.contains_key(&r.key)));
    debug!(
        "Resolved {} parameter sets in {}/{} ({} incomplete dropped)",
        params.len(),
        account,
        region,
        total - params.len()
    );
    Ok(params)
}
