//! Canonical entity schema
//!
//! Every translator produces [`Entity`] values of the same shape, whatever
//! the provider response looked like. The three identity components are
//! always present; the rest are omitted from serialized output when a
//! translator cannot derive them.

use std::collections::BTreeMap;

use infragraph_core::{GraphNode, NodeId};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Graph identity: how the entity appears as a node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GraphComponent {
    pub id: String,
    pub label: String,
    pub node_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub coords: Option<Coords>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coords {
    pub x: f64,
    pub y: f64,
}

/// Provider resource identity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceComponent {
    pub id: String,
    pub name: String,
    /// Service the resource belongs to, e.g. `lambda`. Becomes the node's
    /// `service` tag.
    pub category: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subcategory: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub policy: Option<Value>,
}

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TenantComponent {
    pub tenant_id: String,
    pub provider: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub partition: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Location {
    pub region: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub zone: Option<String>,
}

/// DNS names are stored lowercase without the trailing root dot.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Dns {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub names: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub alias_targets: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Network {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vpc_id: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub subnet_ids: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub security_group_ids: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cidr_block: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub public: Option<bool>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Iam {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role_arn: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub policy: Option<Value>,
}

pub type Tags = BTreeMap<String, String>;

/// Provider timestamps, kept in the provider's own format.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Audit {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Encryption {
    pub enabled: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Healthcheck {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub protocol: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub port: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
}

/// A load balancer the entity routes through or registers with.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoadBalancerRef {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub arn: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dns_name: Option<String>,
}

/// One canonical resource record, ready for graph insertion.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Entity {
    #[serde(rename = "$graph")]
    pub graph: GraphComponent,
    pub resource: ResourceComponent,
    pub tenant: TenantComponent,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<Location>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dns: Option<Dns>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub network: Option<Network>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub iam: Option<Iam>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tags: Option<Tags>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub audit: Option<Audit>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub encryption: Option<Encryption>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub healthcheck: Option<Healthcheck>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub load_balancers: Option<Vec<LoadBalancerRef>>,
    /// The translated provider item the components were derived from.
    #[serde(skip)]
    pub raw: Value,
}

impl Entity {
    /// An entity with only the required components.
    pub fn new(graph: GraphComponent, resource: ResourceComponent, tenant: TenantComponent) -> Self {
        Entity {
            graph,
            resource,
            tenant,
            location: None,
            dns: None,
            network: None,
            iam: None,
            tags: None,
            audit: None,
            encryption: None,
            healthcheck: None,
            load_balancers: None,
            raw: Value::Null,
        }
    }

    pub fn id(&self) -> &str {
        &self.graph.id
    }

    pub fn entity_type(&self) -> &str {
        &self.graph.node_type
    }

    /// The JSON document relationship keys are evaluated against: the
    /// serialized entity plus the raw item under `raw`.
    pub fn document(&self) -> Result<Value, serde_json::Error> {
        let mut document = serde_json::to_value(self)?;
        if let Value::Object(map) = &mut document {
            map.insert("raw".to_string(), self.raw.clone());
        }
        Ok(document)
    }

    pub fn to_node(&self) -> GraphNode {
        let mut node = GraphNode::new(self.graph.id.as_str(), self.graph.label.as_str(), self.graph.node_type.as_str())
            .with_service(self.resource.category.as_str())
            .with_metadata("account", self.tenant.tenant_id.as_str())
            .with_metadata("provider", self.tenant.provider.as_str());
        if let Some(parent) = &self.graph.parent {
            node.parent = Some(NodeId::new(parent.as_str()));
        }
        if let Some(location) = &self.location {
            node = node.with_metadata("region", location.region.as_str());
        }
        if let Some(subcategory) = &self.resource.subcategory {
            node = node.with_metadata("subcategory", subcategory.as_str());
        }
        node
    }
}
