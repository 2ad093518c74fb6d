//! Route 53 record sets
//!
//! Records are read per hosted zone; the zone id comes from the call
//! parameters. Alias records pointing at an ELB hostname carry a load
//! balancer reference so they can be joined to the balancer in any region.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::normalize_dns;
use crate::entity::{Dns, GraphComponent, LoadBalancerRef, ResourceComponent};
use crate::translator::{aws_tenant, decode_items, ComponentSet, Translated, Translator, TranslatorError};

pub const ENTITY_TYPE: &str = "aws-route53-record";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct AliasTarget {
    #[serde(default)]
    pub hosted_zone_id: Option<String>,
    #[serde(rename = "DNSName")]
    pub dns_name: String,
    #[serde(default)]
    pub evaluate_target_health: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ResourceRecord {
    pub value: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct RecordSet {
    pub name: String,
    #[serde(rename = "Type")]
    pub record_type: String,
    #[serde(default, rename = "TTL")]
    pub ttl: Option<u64>,
    #[serde(default)]
    pub resource_records: Vec<ResourceRecord>,
    #[serde(default)]
    pub alias_target: Option<AliasTarget>,
    /// Filled from the call parameters, not the response.
    #[serde(default)]
    pub hosted_zone_id: Option<String>,
}

impl RecordSet {
    fn id(&self) -> String {
        let zone = self.hosted_zone_id.as_deref().unwrap_or("unknown-zone");
        format!("{}/{}/{}", zone, normalize_dns(&self.name), self.record_type)
    }
}

fn is_load_balancer_host(name: &str) -> bool {
    name.ends_with(".elb.amazonaws.com")
}

fn record_sets(record: &infragraph_state::StateRecord) -> Vec<RecordSet> {
    let zone = record
        .parameters
        .as_ref()
        .and_then(|p| p.get("HostedZoneId"))
        .and_then(Value::as_str);
    decode_items::<RecordSet>(record, "ResourceRecordSets")
        .into_iter()
        .map(|mut set| {
            set.hosted_zone_id = zone.map(str::to_string);
            set
        })
        .collect()
}

pub fn translator() -> Result<Translator<RecordSet>, TranslatorError> {
    let components = ComponentSet::builder()
        .graph(|v: &Translated<RecordSet>| {
            Some(GraphComponent {
                id: v.item.id(),
                label: normalize_dns(&v.item.name),
                node_type: ENTITY_TYPE.to_string(),
                parent: Some(v.metadata.account.clone()),
                coords: None,
            })
        })
        .resource(|v: &Translated<RecordSet>| {
            Some(ResourceComponent {
                id: v.item.id(),
                name: normalize_dns(&v.item.name),
                category: "route53".to_string(),
                subcategory: Some(v.item.record_type.clone()),
                description: None,
                policy: None,
            })
        })
        .tenant(aws_tenant)
        .dns(|v: &Translated<RecordSet>| {
            let mut alias_targets: Vec<String> = v
                .item
                .resource_records
                .iter()
                .map(|r| normalize_dns(&r.value))
                .collect();
            if let Some(alias) = &v.item.alias_target {
                alias_targets.push(normalize_dns(&alias.dns_name));
            }
            Some(Dns {
                names: vec![normalize_dns(&v.item.name)],
                alias_targets,
            })
        })
        .load_balancers(|v: &Translated<RecordSet>| {
            let target = normalize_dns(&v.item.alias_target.as_ref()?.dns_name);
            if !is_load_balancer_host(&target) {
                return None;
            }
            Some(vec![LoadBalancerRef {
                arn: None,
                dns_name: Some(target),
            }])
        })
        .build()?;

    Ok(Translator::new(
        ENTITY_TYPE,
        "Route53",
        "listResourceRecordSets",
        record_sets,
        components,
    ))
}
