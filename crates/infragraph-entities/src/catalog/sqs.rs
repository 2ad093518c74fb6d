//! SQS queues, from per-queue `getQueueAttributes` calls
//!
//! Each record is one dependent call whose parameters carry the
//! `QueueUrl` resolved from `listQueues`.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::arn_name;
use crate::entity::{Audit, Encryption, GraphComponent, ResourceComponent};
use crate::translator::{aws_tenant, decode, region_location, ComponentSet, Translated, Translator, TranslatorError};

pub const ENTITY_TYPE: &str = "aws-sqs-queue";

/// The attributes are all strings on the wire, JSON documents included.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct QueueAttributes {
    #[serde(default)]
    pub queue_arn: Option<String>,
    #[serde(default)]
    pub kms_master_key_id: Option<String>,
    #[serde(default)]
    pub sqs_managed_sse_enabled: Option<String>,
    #[serde(default)]
    pub redrive_policy: Option<String>,
    #[serde(default)]
    pub policy: Option<String>,
    #[serde(default)]
    pub created_timestamp: Option<String>,
    #[serde(default)]
    pub last_modified_timestamp: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct GetQueueAttributes {
    #[serde(default)]
    attributes: QueueAttributes,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RedrivePolicy {
    dead_letter_target_arn: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct Queue {
    pub queue_url: Option<String>,
    pub attributes: QueueAttributes,
    pub dead_letter_target_arn: Option<String>,
}

fn queue(record: &infragraph_state::StateRecord) -> Option<Queue> {
    let response = decode::<GetQueueAttributes>(record)?;
    let queue_url = record
        .parameters
        .as_ref()
        .and_then(|p| p.get("QueueUrl"))
        .and_then(Value::as_str)
        .map(str::to_string);
    let dead_letter_target_arn = response
        .attributes
        .redrive_policy
        .as_deref()
        .and_then(|policy| serde_json::from_str::<RedrivePolicy>(policy).ok())
        .map(|policy| policy.dead_letter_target_arn);
    Some(Queue {
        queue_url,
        attributes: response.attributes,
        dead_letter_target_arn,
    })
}

pub fn translator() -> Result<Translator<Queue>, TranslatorError> {
    let components = ComponentSet::builder()
        .graph(|v: &Translated<Queue>| {
            let arn = v.item.attributes.queue_arn.as_deref()?;
            Some(GraphComponent {
                id: arn.to_string(),
                label: arn_name(arn).to_string(),
                node_type: ENTITY_TYPE.to_string(),
                parent: Some(v.metadata.account.clone()),
                coords: None,
            })
        })
        .resource(|v: &Translated<Queue>| {
            let arn = v.item.attributes.queue_arn.as_deref()?;
            Some(ResourceComponent {
                id: arn.to_string(),
                name: arn_name(arn).to_string(),
                category: "sqs".to_string(),
                subcategory: Some(if arn.ends_with(".fifo") { "fifo" } else { "standard" }.to_string()),
                description: v.item.queue_url.clone(),
                policy: v
                    .item
                    .attributes
                    .policy
                    .as_deref()
                    .and_then(|p| serde_json::from_str(p).ok()),
            })
        })
        .tenant(aws_tenant)
        .location(region_location)
        .audit(|v: &Translated<Queue>| {
            let attributes = &v.item.attributes;
            if attributes.created_timestamp.is_none() && attributes.last_modified_timestamp.is_none() {
                return None;
            }
            Some(Audit {
                created_at: attributes.created_timestamp.clone(),
                updated_at: attributes.last_modified_timestamp.clone(),
            })
        })
        .encryption(|v: &Translated<Queue>| {
            let attributes = &v.item.attributes;
            let managed = attributes.sqs_managed_sse_enabled.as_deref() == Some("true");
            Some(Encryption {
                enabled: managed || attributes.kms_master_key_id.is_some(),
                key_id: attributes.kms_master_key_id.clone(),
            })
        })
        .build()?;

    Ok(Translator::new(
        ENTITY_TYPE,
        "SQS",
        "getQueueAttributes",
        |record| queue(record).into_iter().collect(),
        components,
    ))
}
