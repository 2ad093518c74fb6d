//! EC2 VPCs and subnets

use serde::{Deserialize, Serialize};

use crate::entity::{GraphComponent, Network, ResourceComponent, Tags};
use crate::translator::{aws_tenant, decode_items, region_location, ComponentSet, Translated, Translator, TranslatorError};

pub const VPC_TYPE: &str = "aws-vpc";
pub const SUBNET_TYPE: &str = "aws-subnet";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Tag {
    pub key: String,
    #[serde(default)]
    pub value: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Vpc {
    pub vpc_id: String,
    #[serde(default)]
    pub cidr_block: Option<String>,
    #[serde(default)]
    pub is_default: bool,
    #[serde(default)]
    pub tags: Vec<Tag>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Subnet {
    pub subnet_id: String,
    pub vpc_id: String,
    #[serde(default)]
    pub cidr_block: Option<String>,
    #[serde(default)]
    pub availability_zone: Option<String>,
    #[serde(default)]
    pub map_public_ip_on_launch: Option<bool>,
    #[serde(default)]
    pub tags: Vec<Tag>,
}

fn tag_map(tags: &[Tag]) -> Option<Tags> {
    if tags.is_empty() {
        return None;
    }
    Some(tags.iter().map(|t| (t.key.clone(), t.value.clone())).collect())
}

fn name_tag(tags: &[Tag]) -> Option<&str> {
    tags.iter().find(|t| t.key == "Name").map(|t| t.value.as_str())
}

pub fn vpc_translator() -> Result<Translator<Vpc>, TranslatorError> {
    let components = ComponentSet::builder()
        .graph(|v: &Translated<Vpc>| {
            Some(GraphComponent {
                id: v.item.vpc_id.clone(),
                label: name_tag(&v.item.tags).unwrap_or(v.item.vpc_id.as_str()).to_string(),
                node_type: VPC_TYPE.to_string(),
                parent: Some(v.metadata.account.clone()),
                coords: None,
            })
        })
        .resource(|v: &Translated<Vpc>| {
            Some(ResourceComponent {
                id: v.item.vpc_id.clone(),
                name: name_tag(&v.item.tags).unwrap_or(v.item.vpc_id.as_str()).to_string(),
                category: "ec2".to_string(),
                subcategory: Some("vpc".to_string()),
                description: v.item.is_default.then(|| "default VPC".to_string()),
                policy: None,
            })
        })
        .tenant(aws_tenant)
        .location(region_location)
        .network(|v: &Translated<Vpc>| {
            Some(Network {
                vpc_id: Some(v.item.vpc_id.clone()),
                cidr_block: v.item.cidr_block.clone(),
                ..Network::default()
            })
        })
        .tags(|v: &Translated<Vpc>| tag_map(&v.item.tags))
        .build()?;

    Ok(Translator::new(
        VPC_TYPE,
        "EC2",
        "describeVpcs",
        |record| decode_items::<Vpc>(record, "Vpcs"),
        components,
    ))
}

pub fn subnet_translator() -> Result<Translator<Subnet>, TranslatorError> {
    let components = ComponentSet::builder()
        .graph(|v: &Translated<Subnet>| {
            Some(GraphComponent {
                id: v.item.subnet_id.clone(),
                label: name_tag(&v.item.tags).unwrap_or(v.item.subnet_id.as_str()).to_string(),
                node_type: SUBNET_TYPE.to_string(),
                parent: Some(v.item.vpc_id.clone()),
                coords: None,
            })
        })
        .resource(|v: &Translated<Subnet>| {
            Some(ResourceComponent {
                id: v.item.subnet_id.clone(),
                name: name_tag(&v.item.tags).unwrap_or(v.item.subnet_id.as_str()).to_string(),
                category: "ec2".to_string(),
                subcategory: Some("subnet".to_string()),
                description: None,
                policy: None,
            })
        })
        .tenant(aws_tenant)
        .location(|v: &Translated<Subnet>| {
            let mut location = region_location(v)?;
            location.zone = v.item.availability_zone.clone();
            Some(location)
        })
        .network(|v: &Translated<Subnet>| {
            Some(Network {
                vpc_id: Some(v.item.vpc_id.clone()),
                subnet_ids: vec![v.item.subnet_id.clone()],
                cidr_block: v.item.cidr_block.clone(),
                public: v.item.map_public_ip_on_launch,
                ..Network::default()
            })
        })
        .tags(|v: &Translated<Subnet>| tag_map(&v.item.tags))
        .build()?;

    Ok(Translator::new(
        SUBNET_TYPE,
        "EC2",
        "describeSubnets",
        |record| decode_items::<Subnet>(record, "Subnets"),
        components,
    ))
}
