//! Lambda functions

use serde::{Deserialize, Serialize};

use crate::entity::{Audit, Encryption, GraphComponent, Iam, Network, ResourceComponent};
use crate::translator::{aws_tenant, decode_items, region_location, ComponentSet, Translated, Translator, TranslatorError};

pub const ENTITY_TYPE: &str = "aws-lambda-function";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct VpcConfig {
    #[serde(default)]
    pub vpc_id: Option<String>,
    #[serde(default)]
    pub subnet_ids: Vec<String>,
    #[serde(default)]
    pub security_group_ids: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct DeadLetterConfig {
    #[serde(default)]
    pub target_arn: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Function {
    pub function_name: String,
    pub function_arn: String,
    #[serde(default)]
    pub runtime: Option<String>,
    #[serde(default)]
    pub role: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub last_modified: Option<String>,
    #[serde(default, rename = "KMSKeyArn")]
    pub kms_key_arn: Option<String>,
    #[serde(default)]
    pub vpc_config: Option<VpcConfig>,
    #[serde(default)]
    pub dead_letter_config: Option<DeadLetterConfig>,
}

impl Function {
    /// VPC the function is attached to, if any. Lambda reports an empty
    /// `VpcId` for functions outside a VPC.
    fn vpc_id(&self) -> Option<&str> {
        self.vpc_config
            .as_ref()
            .and_then(|c| c.vpc_id.as_deref())
            .filter(|id| !id.is_empty())
    }
}

pub fn translator() -> Result<Translator<Function>, TranslatorError> {
    let components = ComponentSet::builder()
        .graph(|v: &Translated<Function>| {
            let parent = v.item.vpc_id().unwrap_or(v.metadata.account.as_str());
            Some(GraphComponent {
                id: v.item.function_arn.clone(),
                label: v.item.function_name.clone(),
                node_type: ENTITY_TYPE.to_string(),
                parent: Some(parent.to_string()),
                coords: None,
            })
        })
        .resource(|v: &Translated<Function>| {
            Some(ResourceComponent {
                id: v.item.function_arn.clone(),
                name: v.item.function_name.clone(),
                category: "lambda".to_string(),
                subcategory: v.item.runtime.clone(),
                description: v.item.description.clone().filter(|d| !d.is_empty()),
                policy: None,
            })
        })
        .tenant(aws_tenant)
        .location(region_location)
        .network(|v: &Translated<Function>| {
            let vpc_id = v.item.vpc_id()?;
            let config = v.item.vpc_config.clone().unwrap_or_default();
            Some(Network {
                vpc_id: Some(vpc_id.to_string()),
                subnet_ids: config.subnet_ids,
                security_group_ids: config.security_group_ids,
                ..Network::default()
            })
        })
        .iam(|v: &Translated<Function>| {
            Some(Iam {
                role_arn: Some(v.item.role.clone()?),
                policy: None,
            })
        })
        .audit(|v: &Translated<Function>| {
            Some(Audit {
                created_at: None,
                updated_at: Some(v.item.last_modified.clone()?),
            })
        })
        .encryption(|v: &Translated<Function>| {
            let key_id = v.item.kms_key_arn.clone()?;
            Some(Encryption {
                enabled: true,
                key_id: Some(key_id),
            })
        })
        .build()?;

    Ok(Translator::new(
        ENTITY_TYPE,
        "Lambda",
        "listFunctions",
        |record| decode_items::<Function>(record, "Functions"),
        components,
    ))
}
