//! Application and network load balancers

use serde::{Deserialize, Serialize};

use super::normalize_dns;
use crate::entity::{Audit, Dns, GraphComponent, Network, ResourceComponent};
use crate::translator::{aws_tenant, decode_items, region_location, ComponentSet, Translated, Translator, TranslatorError};

pub const ENTITY_TYPE: &str = "aws-elbv2-load-balancer";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct AvailabilityZone {
    #[serde(default)]
    pub zone_name: Option<String>,
    #[serde(default)]
    pub subnet_id: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct LoadBalancer {
    pub load_balancer_arn: String,
    pub load_balancer_name: String,
    #[serde(default, rename = "DNSName")]
    pub dns_name: Option<String>,
    #[serde(default)]
    pub scheme: Option<String>,
    #[serde(default)]
    pub vpc_id: Option<String>,
    #[serde(default, rename = "Type")]
    pub lb_type: Option<String>,
    #[serde(default)]
    pub created_time: Option<String>,
    #[serde(default)]
    pub availability_zones: Vec<AvailabilityZone>,
    #[serde(default)]
    pub security_groups: Vec<String>,
}

pub fn translator() -> Result<Translator<LoadBalancer>, TranslatorError> {
    let components = ComponentSet::builder()
        .graph(|v: &Translated<LoadBalancer>| {
            let parent = v.item.vpc_id.clone().unwrap_or_else(|| v.metadata.account.clone());
            Some(GraphComponent {
                id: v.item.load_balancer_arn.clone(),
                label: v.item.load_balancer_name.clone(),
                node_type: ENTITY_TYPE.to_string(),
                parent: Some(parent),
                coords: None,
            })
        })
        .resource(|v: &Translated<LoadBalancer>| {
            Some(ResourceComponent {
                id: v.item.load_balancer_arn.clone(),
                name: v.item.load_balancer_name.clone(),
                category: "elbv2".to_string(),
                subcategory: v.item.lb_type.clone(),
                description: v.item.scheme.clone(),
                policy: None,
            })
        })
        .tenant(aws_tenant)
        .location(region_location)
        .dns(|v: &Translated<LoadBalancer>| {
            let name = v.item.dns_name.as_deref()?;
            Some(Dns {
                names: vec![normalize_dns(name)],
                alias_targets: Vec::new(),
            })
        })
        .network(|v: &Translated<LoadBalancer>| {
            Some(Network {
                vpc_id: v.item.vpc_id.clone(),
                subnet_ids: v
                    .item
                    .availability_zones
                    .iter()
                    .filter_map(|az| az.subnet_id.clone())
                    .collect(),
                security_group_ids: v.item.security_groups.clone(),
                public: v.item.scheme.as_deref().map(|s| s == "internet-facing"),
                ..Network::default()
            })
        })
        .audit(|v: &Translated<LoadBalancer>| {
            Some(Audit {
                created_at: Some(v.item.created_time.clone()?),
                updated_at: None,
            })
        })
        .build()?;

    Ok(Translator::new(
        ENTITY_TYPE,
        "ELBv2",
        "describeLoadBalancers",
        |record| decode_items::<LoadBalancer>(record, "LoadBalancers"),
        components,
    ))
}
