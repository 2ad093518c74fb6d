//! Raw state records to canonical entities
//!
//! A [`Translator`] reads the state of one provider call, fans each record
//! out into intermediate items and runs a [`ComponentSet`] over every item
//! to assemble one [`Entity`] per item.

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use infragraph_core::ScopeConfig;
use infragraph_state::{SelectorRegistry, StateError, StateMetadata, StateRecord, StateStore};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use tracing::debug;

use crate::entity::{
    Audit, Dns, Encryption, Entity, GraphComponent, Healthcheck, Iam, LoadBalancerRef, Location,
    Network, ResourceComponent, Tags, TenantComponent,
};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TranslatorError {
    #[error("component set is missing required component '{0}'")]
    MissingComponent(&'static str),

    #[error("translator for '{0}' is already registered")]
    DuplicateEntity(String),
}

/// An intermediate item together with the context of the call it came from.
#[derive(Debug, Clone, PartialEq)]
pub struct Translated<T> {
    pub item: T,
    pub metadata: StateMetadata,
    pub parameters: Option<Value>,
}

/// Derives one component from a translated item. `None` omits it.
pub type Component<T, C> = Box<dyn Fn(&Translated<T>) -> Option<C> + Send + Sync>;

/// The fixed set of component functions of one entity type.
pub struct ComponentSet<T> {
    graph: Component<T, GraphComponent>,
    resource: Component<T, ResourceComponent>,
    tenant: Component<T, TenantComponent>,
    location: Option<Component<T, Location>>,
    dns: Option<Component<T, Dns>>,
    network: Option<Component<T, Network>>,
    iam: Option<Component<T, Iam>>,
    tags: Option<Component<T, Tags>>,
    audit: Option<Component<T, Audit>>,
    encryption: Option<Component<T, Encryption>>,
    healthcheck: Option<Component<T, Healthcheck>>,
    load_balancers: Option<Component<T, Vec<LoadBalancerRef>>>,
}

pub struct ComponentSetBuilder<T> {
    graph: Option<Component<T, GraphComponent>>,
    resource: Option<Component<T, ResourceComponent>>,
    tenant: Option<Component<T, TenantComponent>>,
    location: Option<Component<T, Location>>,
    dns: Option<Component<T, Dns>>,
    network: Option<Component<T, Network>>,
    iam: Option<Component<T, Iam>>,
    tags: Option<Component<T, Tags>>,
    audit: Option<Component<T, Audit>>,
    encryption: Option<Component<T, Encryption>>,
    healthcheck: Option<Component<T, Healthcheck>>,
    load_balancers: Option<Component<T, Vec<LoadBalancerRef>>>,
}

impl<T> ComponentSet<T> {
    pub fn builder() -> ComponentSetBuilder<T> {
        ComponentSetBuilder {
            graph: None,
            resource: None,
            tenant: None,
            location: None,
            dns: None,
            network: None,
            iam: None,
            tags: None,
            audit: None,
            encryption: None,
            healthcheck: None,
            load_balancers: None,
        }
    }

    /// Apply every component. Returns the name of the first required
    /// component that produced nothing.
    pub fn apply(&self, value: &Translated<T>) -> Result<Entity, &'static str> {
        let graph = (self.graph)(value).ok_or("graph")?;
        let resource = (self.resource)(value).ok_or("resource")?;
        let tenant = (self.tenant)(value).ok_or("tenant")?;

        let mut entity = Entity::new(graph, resource, tenant);
        entity.location = optional(&self.location, value);
        entity.dns = optional(&self.dns, value);
        entity.network = optional(&self.network, value);
        entity.iam = optional(&self.iam, value);
        entity.tags = optional(&self.tags, value);
        entity.audit = optional(&self.audit, value);
        entity.encryption = optional(&self.encryption, value);
        entity.healthcheck = optional(&self.healthcheck, value);
        entity.load_balancers = optional(&self.load_balancers, value);
        Ok(entity)
    }
}

fn optional<T, C>(component: &Option<Component<T, C>>, value: &Translated<T>) -> Option<C> {
    component.as_ref().and_then(|f| f(value))
}

impl<T> ComponentSetBuilder<T> {
    pub fn graph(mut self, f: impl Fn(&Translated<T>) -> Option<GraphComponent> + Send + Sync + 'static) -> Self {
        self.graph = Some(Box::new(f));
        self
    }

    pub fn resource(
        mut self,
        f: impl Fn(&Translated<T>) -> Option<ResourceComponent> + Send + Sync + 'static,
    ) -> Self {
        self.resource = Some(Box::new(f));
        self
    }

    pub fn tenant(mut self, f: impl Fn(&Translated<T>) -> Option<TenantComponent> + Send + Sync + 'static) -> Self {
        self.tenant = Some(Box::new(f));
        self
    }

    pub fn location(mut self, f: impl Fn(&Translated<T>) -> Option<Location> + Send + Sync + 'static) -> Self {
        self.location = Some(Box::new(f));
        self
    }

    pub fn dns(mut self, f: impl Fn(&Translated<T>) -> Option<Dns> + Send + Sync + 'static) -> Self {
        self.dns = Some(Box::new(f));
        self
    }

    pub fn network(mut self, f: impl Fn(&Translated<T>) -> Option<Network> + Send + Sync + 'static) -> Self {
        self.network = Some(Box::new(f));
        self
    }

    pub fn iam(mut self, f: impl Fn(&Translated<T>) -> Option<Iam> + Send + Sync + 'static) -> Self {
        self.iam = Some(Box::new(f));
        self
    }

    pub fn tags(mut self, f: impl Fn(&Translated<T>) -> Option<Tags> + Send + Sync + 'static) -> Self {
        self.tags = Some(Box::new(f));
        self
    }

    pub fn audit(mut self, f: impl Fn(&Translated<T>) -> Option<Audit> + Send + Sync + 'static) -> Self {
        self.audit = Some(Box::new(f));
        self
    }

    pub fn encryption(mut self, f: impl Fn(&Translated<T>) -> Option<Encryption> + Send + Sync + 'static) -> Self {
        self.encryption = Some(Box::new(f));
        self
    }

    pub fn healthcheck(
        mut self,
        f: impl Fn(&Translated<T>) -> Option<Healthcheck> + Send + Sync + 'static,
    ) -> Self {
        self.healthcheck = Some(Box::new(f));
        self
    }

    pub fn load_balancers(
        mut self,
        f: impl Fn(&Translated<T>) -> Option<Vec<LoadBalancerRef>> + Send + Sync + 'static,
    ) -> Self {
        self.load_balancers = Some(Box::new(f));
        self
    }

    /// Fails when any of `graph`, `resource` or `tenant` is missing.
    pub fn build(self) -> Result<ComponentSet<T>, TranslatorError> {
        Ok(ComponentSet {
            graph: self.graph.ok_or(TranslatorError::MissingComponent("graph"))?,
            resource: self.resource.ok_or(TranslatorError::MissingComponent("resource"))?,
            tenant: self.tenant.ok_or(TranslatorError::MissingComponent("tenant"))?,
            location: self.location,
            dns: self.dns,
            network: self.network,
            iam: self.iam,
            tags: self.tags,
            audit: self.audit,
            encryption: self.encryption,
            healthcheck: self.healthcheck,
            load_balancers: self.load_balancers,
        })
    }
}

/// Tenant from the record context: the account, on the `aws` provider.
pub fn aws_tenant<T>(value: &Translated<T>) -> Option<TenantComponent> {
    if value.metadata.account.is_empty() {
        return None;
    }
    Some(TenantComponent {
        tenant_id: value.metadata.account.clone(),
        provider: "aws".to_string(),
        partition: value.metadata.partition.clone(),
    })
}

/// Location from the record context.
pub fn region_location<T>(value: &Translated<T>) -> Option<Location> {
    Some(Location {
        region: value.metadata.region.clone(),
        zone: None,
    })
}

/// Deserialize a record's `result`. Partial or unexpected responses are
/// logged and translate to nothing.
pub fn decode<R: DeserializeOwned>(record: &StateRecord) -> Option<R> {
    match serde_json::from_value(record.result.clone()) {
        Ok(response) => Some(response),
        Err(e) => {
            debug!(
                "Skipping undecodable record from {}/{}: {}",
                record.metadata.account, record.metadata.region, e
            );
            None
        }
    }
}

/// Decode every element of the `field` list in a record's result.
///
/// Elements are decoded one at a time; an element missing a required field
/// is skipped without dropping its siblings.
pub fn decode_items<R: DeserializeOwned>(record: &StateRecord, field: &str) -> Vec<R> {
    let items = match record.result.get(field) {
        Some(Value::Array(items)) => items,
        None | Some(Value::Null) => return Vec::new(),
        Some(_) => {
            debug!(
                "Skipping record from {}/{}: {} is not a list",
                record.metadata.account, record.metadata.region, field
            );
            return Vec::new();
        }
    };
    items
        .iter()
        .enumerate()
        .filter_map(|(index, item)| match R::deserialize(item) {
            Ok(decoded) => Some(decoded),
            Err(e) => {
                debug!(
                    "Skipping undecodable {}[{}] from {}/{}: {}",
                    field, index, record.metadata.account, record.metadata.region, e
                );
                None
            }
        })
        .collect()
}

/// Object-safe view of a translator, as held by the [`EntityRegistry`].
#[async_trait]
pub trait EntityTranslator: Send + Sync {
    fn entity_type(&self) -> &str;

    /// The provider call whose state this translator reads.
    fn source(&self) -> (&str, &str);

    /// Records to translate. Defaults to the global state of [`source`],
    /// restricted to `scope`.
    ///
    /// [`source`]: EntityTranslator::source
    async fn raw_state(&self, store: &dyn StateStore, scope: &ScopeConfig) -> Result<Vec<StateRecord>, StateError> {
        let (service, function) = self.source();
        let records = store.global_state_for_service_function(service, function).await?;
        Ok(records
            .into_iter()
            .filter(|r| scope.includes(&r.metadata.account, &r.metadata.region))
            .collect())
    }

    /// One record to zero or more entities.
    fn entities(&self, record: &StateRecord) -> Vec<Entity>;
}

/// Translator for one entity type backed by an intermediate item type `T`.
pub struct Translator<T> {
    entity_type: String,
    service: String,
    function: String,
    fan_out: Box<dyn Fn(&StateRecord) -> Vec<T> + Send + Sync>,
    components: ComponentSet<T>,
}

impl<T> Translator<T> {
    pub fn new(
        entity_type: impl Into<String>,
        service: impl Into<String>,
        function: impl Into<String>,
        fan_out: impl Fn(&StateRecord) -> Vec<T> + Send + Sync + 'static,
        components: ComponentSet<T>,
    ) -> Self {
        Translator {
            entity_type: entity_type.into(),
            service: service.into(),
            function: function.into(),
            fan_out: Box::new(fan_out),
            components,
        }
    }

    /// Fan one record out into intermediate items, each carrying the
    /// record's context.
    pub fn translate(&self, record: &StateRecord) -> Vec<Translated<T>> {
        (self.fan_out)(record)
            .into_iter()
            .map(|item| Translated {
                item,
                metadata: record.metadata.clone(),
                parameters: record.parameters.clone(),
            })
            .collect()
    }
}

#[async_trait]
impl<T> EntityTranslator for Translator<T>
where
    T: Serialize + Send + Sync,
{
    fn entity_type(&self) -> &str {
        &self.entity_type
    }

    fn source(&self) -> (&str, &str) {
        (&self.service, &self.function)
    }

    fn entities(&self, record: &StateRecord) -> Vec<Entity> {
        let mut entities = Vec::new();
        for translated in self.translate(record) {
            match self.components.apply(&translated) {
                Ok(mut entity) => match serde_json::to_value(&translated.item) {
                    Ok(raw) => {
                        entity.raw = raw;
                        entities.push(entity);
                    }
                    Err(e) => debug!("Skipping {} {}: cannot serialize raw item: {}", self.entity_type, entity.id(), e),
                },
                Err(component) => debug!(
                    "Skipping {} item in {}/{}: no {} component",
                    self.entity_type, translated.metadata.account, translated.metadata.region, component
                ),
            }
        }
        entities
    }
}

/// Translators by entity type.
#[derive(Default, Clone)]
pub struct EntityRegistry {
    translators: BTreeMap<String, Arc<dyn EntityTranslator>>,
}

impl EntityRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, translator: impl EntityTranslator + 'static) -> Result<(), TranslatorError> {
        let entity_type = translator.entity_type().to_string();
        if self.translators.contains_key(&entity_type) {
            return Err(TranslatorError::DuplicateEntity(entity_type));
        }
        self.translators.insert(entity_type, Arc::new(translator));
        Ok(())
    }

    pub fn get(&self, entity_type: &str) -> Option<&Arc<dyn EntityTranslator>> {
        self.translators.get(entity_type)
    }

    /// Translators in entity type order.
    pub fn translators(&self) -> impl Iterator<Item = &Arc<dyn EntityTranslator>> {
        self.translators.values()
    }

    pub fn len(&self) -> usize {
        self.translators.len()
    }

    pub fn is_empty(&self) -> bool {
        self.translators.is_empty()
    }

    /// Every provider call a registered translator reads.
    pub fn selector_registry(&self) -> SelectorRegistry {
        let mut registry = SelectorRegistry::new();
        for translator in self.translators.values() {
            let (service, function) = translator.source();
            registry.register(service, function);
        }
        registry
    }
}
